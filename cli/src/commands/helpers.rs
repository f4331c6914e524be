use serde::Serialize;
use std::path::Path;
use std::process;

use recipebox_core::image_ref::ImageRef;
use recipebox_core::models::Recipe;

/// Look a recipe up by id, unique id prefix, or title (case-insensitive).
pub(crate) fn find_recipe<'a>(recipes: &'a [Recipe], key: &str) -> Option<&'a Recipe> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    if let Some(r) = recipes.iter().find(|r| r.id == key) {
        return Some(r);
    }
    if let Some(r) = recipes
        .iter()
        .find(|r| !r.is_deleted() && r.title.eq_ignore_ascii_case(key))
    {
        return Some(r);
    }
    let mut by_prefix = recipes.iter().filter(|r| r.id.starts_with(key));
    match (by_prefix.next(), by_prefix.next()) {
        (Some(r), None) => Some(r),
        _ => None,
    }
}

/// Print a not-found message and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// First 8 characters of an id, enough to pass back on the command line.
pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

/// Parse an image given on the command line. Relative local paths are made
/// absolute so the reference still points somewhere if the upload fails.
pub(crate) fn image_arg(value: &str) -> ImageRef {
    let image = ImageRef::parse(value.trim());
    match &image {
        ImageRef::Local(raw) if !raw.starts_with("file://") && Path::new(raw).is_relative() => {
            std::path::absolute(raw)
                .map(|p| ImageRef::Local(p.display().to_string()))
                .unwrap_or(image)
        }
        _ => image,
    }
}

/// Treat an empty flag value as "clear this field".
pub(crate) fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
