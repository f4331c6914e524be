use anyhow::{Result, bail};

use recipebox_core::models::{Phase, Recipe, validate_recipe};

use super::Workspace;
use super::helpers::{exit_not_found, find_recipe, image_arg, short_id};
use super::ingredient::find_ingredient_id;

/// Build a phase, resolving ingredient references against `recipe`.
pub(crate) fn build_phase(
    recipe: &Recipe,
    name: &str,
    instructions: &str,
    ingredients: &[String],
    photos: &[String],
) -> Result<Phase> {
    if name.trim().is_empty() {
        bail!("Phase name must not be empty");
    }
    let mut phase = Phase::new(name.trim(), instructions.trim());
    for key in ingredients {
        let Some(id) = find_ingredient_id(recipe, key) else {
            let title = &recipe.title;
            bail!("Ingredient '{key}' not found in {title}");
        };
        if !phase.ingredient_ids.contains(&id) {
            phase.ingredient_ids.push(id);
        }
    }
    phase.photo_uris = photos.iter().map(|p| image_arg(p)).collect();
    Ok(phase)
}

/// Resolve a phase by full id or unique id prefix.
fn find_phase_id(recipe: &Recipe, key: &str) -> Option<String> {
    if let Some(phase) = recipe.phase(key) {
        return Some(phase.id.clone());
    }
    let mut matches = recipe
        .phases
        .iter()
        .filter(|p| !key.is_empty() && p.id.starts_with(key));
    match (matches.next(), matches.next()) {
        (Some(phase), None) => Some(phase.id.clone()),
        _ => None,
    }
}

pub(crate) async fn cmd_phase_add(
    ws: &Workspace,
    recipe_key: &str,
    name: &str,
    instructions: &str,
    ingredients: &[String],
    photos: &[String],
    json: bool,
) -> Result<()> {
    let recipes = ws.store.recipes();
    let Some(found) = find_recipe(&recipes, recipe_key) else {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    };

    let phase = build_phase(found, name, instructions, ingredients, photos)?;
    let phase_id = phase.id.clone();
    let mut recipe = found.clone();
    recipe.phases.push(phase);
    validate_recipe(&recipe)?;

    let Some(saved) = ws.store.edit_recipe(recipe).await else {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    };
    let Some(phase) = saved.phase(&phase_id) else {
        bail!("Phase disappeared while saving");
    };
    for photo in phase.photo_uris.iter().filter(|p| p.needs_upload()) {
        eprintln!("Warning: could not upload {photo}; it is saved as a local reference");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(phase)?);
    } else {
        let n = saved.phases.len();
        println!(
            "Added phase {n} \"{}\" to {} (phase id: {})",
            phase.name,
            saved.title,
            short_id(&phase.id)
        );
    }
    Ok(())
}

pub(crate) async fn cmd_phase_remove(
    ws: &Workspace,
    recipe_key: &str,
    phase_key: &str,
    json: bool,
) -> Result<()> {
    let recipes = ws.store.recipes();
    let Some(found) = find_recipe(&recipes, recipe_key) else {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    };
    let Some(id) = find_phase_id(found, phase_key) else {
        let title = &found.title;
        exit_not_found(&format!("Phase '{phase_key}' not found in {title}"), json);
    };

    let mut recipe = found.clone();
    recipe.remove_phase(&id);
    if ws.store.edit_recipe(recipe).await.is_none() {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "removed": id }));
    } else {
        println!("Removed phase {} from {}", short_id(&id), found.title);
    }
    Ok(())
}
