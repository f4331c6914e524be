use anyhow::Result;
use clap::Args;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use recipebox_core::models::{COOKING_UNITS, Recipe, validate_recipe};

use super::Workspace;
use super::helpers::{exit_not_found, find_recipe, image_arg, non_empty, short_id, truncate};

/// Optional recipe fields shared by `add` and `edit`. An empty value clears
/// the field.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct RecipeFields {
    /// Short description
    #[arg(long)]
    pub description: Option<String>,
    /// Cover image: a local path, an http(s) URL, or google-drive-id:<id>
    #[arg(long)]
    pub image: Option<String>,
    /// Where the recipe came from
    #[arg(long)]
    pub source_url: Option<String>,
    /// Calories, as free text (e.g. "450")
    #[arg(long)]
    pub calories: Option<String>,
    /// Serving size, as free text (e.g. "4 bowls")
    #[arg(long)]
    pub serving_size: Option<String>,
}

impl RecipeFields {
    pub(crate) fn apply(self, recipe: &mut Recipe) {
        if let Some(description) = self.description {
            recipe.description = description.trim().to_string();
        }
        if let Some(image) = self.image {
            recipe.image = image_arg(&image);
        }
        if let Some(url) = self.source_url {
            recipe.source_url = non_empty(url);
        }
        if let Some(calories) = self.calories {
            recipe.calories = non_empty(calories);
        }
        if let Some(size) = self.serving_size {
            recipe.serving_size = non_empty(size);
        }
    }
}

fn warn_if_image_kept_local(recipe: &Recipe) {
    for image in recipe.images().filter(|i| i.needs_upload()) {
        eprintln!("Warning: could not upload {image}; it is saved as a local reference");
    }
}

pub(crate) async fn cmd_add(
    ws: &Workspace,
    title: &str,
    fields: RecipeFields,
    json: bool,
) -> Result<()> {
    let mut recipe = Recipe::new(title.trim());
    fields.apply(&mut recipe);
    validate_recipe(&recipe)?;

    let recipe = ws.store.add_recipe(recipe).await;
    warn_if_image_kept_local(&recipe);

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let (title, id) = (&recipe.title, &recipe.id);
        println!("Added recipe: {title} (id: {id})");
        println!("Add ingredients with: recipebox ingredient add \"{title}\" <name> <quantity>");
    }
    Ok(())
}

pub(crate) async fn cmd_edit(
    ws: &Workspace,
    key: &str,
    title: Option<String>,
    fields: RecipeFields,
    json: bool,
) -> Result<()> {
    let recipes = ws.store.recipes();
    let Some(found) = find_recipe(&recipes, key) else {
        exit_not_found(&format!("Recipe '{key}' not found"), json);
    };

    let mut recipe = found.clone();
    if let Some(title) = title {
        recipe.title = title.trim().to_string();
    }
    fields.apply(&mut recipe);
    validate_recipe(&recipe)?;

    let Some(recipe) = ws.store.edit_recipe(recipe).await else {
        exit_not_found(&format!("Recipe '{key}' not found"), json);
    };
    warn_if_image_kept_local(&recipe);

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!("Updated recipe: {}", recipe.title);
    }
    Ok(())
}

pub(crate) async fn cmd_delete(ws: &Workspace, key: &str, soft: bool, json: bool) -> Result<()> {
    let recipes = ws.store.recipes();
    let Some(found) = find_recipe(&recipes, key) else {
        exit_not_found(&format!("Recipe '{key}' not found"), json);
    };
    let (id, title) = (found.id.clone(), found.title.clone());

    let removed = if soft {
        let mut recipe = found.clone();
        recipe.deleted = Some(true);
        ws.store.edit_recipe(recipe).await.is_some()
    } else {
        ws.store.delete_recipe(&id)
    };
    if !removed {
        exit_not_found(&format!("Recipe '{key}' not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id, "soft": soft }));
    } else if soft {
        println!("Marked {title} as deleted");
    } else {
        println!("Deleted {title}");
    }
    Ok(())
}

#[derive(Tabled)]
struct RecipeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Ingredients")]
    ingredients: usize,
    #[tabled(rename = "Phases")]
    phases: usize,
    #[tabled(rename = "Calories")]
    calories: String,
    #[tabled(rename = "Serving")]
    serving: String,
}

fn recipe_rows(recipes: &[Recipe], all: bool) -> Vec<RecipeRow> {
    recipes
        .iter()
        .filter(|r| all || !r.is_deleted())
        .map(|r| RecipeRow {
            id: short_id(&r.id).to_string(),
            title: if r.is_deleted() {
                format!("{} (deleted)", truncate(&r.title, 30))
            } else {
                truncate(&r.title, 40)
            },
            ingredients: r.ingredients.len(),
            phases: r.phases.len(),
            calories: r.calories.clone().unwrap_or_else(|| "-".into()),
            serving: r
                .serving_size
                .as_deref()
                .map_or_else(|| "-".into(), |s| truncate(s, 20)),
        })
        .collect()
}

pub(crate) fn cmd_list(ws: &Workspace, all: bool, json: bool) -> Result<()> {
    let recipes: Vec<Recipe> = ws
        .store
        .recipes()
        .into_iter()
        .filter(|r| all || !r.is_deleted())
        .collect();

    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let table = Table::new(recipe_rows(&recipes, all))
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_show(ws: &Workspace, key: &str, json: bool) -> Result<()> {
    let recipes = ws.store.recipes();
    let Some(recipe) = find_recipe(&recipes, key) else {
        exit_not_found(&format!("Recipe '{key}' not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
        return Ok(());
    }

    print!("{}", render_recipe(recipe));
    Ok(())
}

fn render_recipe(recipe: &Recipe) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let title = &recipe.title;
    let _ = writeln!(out, "=== {title} ===");
    let _ = writeln!(out, "  ID: {}", recipe.id);
    if recipe.is_deleted() {
        let _ = writeln!(out, "  (deleted)");
    }
    if !recipe.description.is_empty() {
        let _ = writeln!(out, "  {}", recipe.description);
    }
    if !recipe.image.is_empty() {
        let _ = writeln!(out, "  Image: {}", recipe.image);
    }
    if let Some(url) = &recipe.source_url {
        let _ = writeln!(out, "  Source: {url}");
    }
    if let Some(cal) = &recipe.calories {
        let _ = writeln!(out, "  Calories: {cal}");
    }
    if let Some(size) = &recipe.serving_size {
        let _ = writeln!(out, "  Serving size: {size}");
    }

    let _ = writeln!(out, "\n  INGREDIENTS:");
    if recipe.ingredients.is_empty() {
        let _ = writeln!(out, "    (none)");
    }
    for ing in &recipe.ingredients {
        let amount = format!("{} {}", ing.quantity, ing.unit);
        let _ = writeln!(
            out,
            "    [{}] {} - {}",
            short_id(&ing.id),
            ing.name,
            amount.trim()
        );
    }

    for (i, phase) in recipe.phases.iter().enumerate() {
        let n = i + 1;
        let _ = writeln!(out, "\n  PHASE {n}: {} [{}]", phase.name, short_id(&phase.id));
        let names: Vec<&str> = recipe
            .phase_ingredients(phase)
            .iter()
            .map(|ing| ing.name.as_str())
            .collect();
        if !names.is_empty() {
            let _ = writeln!(out, "    Uses: {}", names.join(", "));
        }
        for line in phase.instructions.lines() {
            let _ = writeln!(out, "    {line}");
        }
        for photo in &phase.photo_uris {
            let _ = writeln!(out, "    Photo: {photo}");
        }
    }
    out
}

pub(crate) fn cmd_units(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(COOKING_UNITS)?);
    } else {
        for unit in COOKING_UNITS {
            println!("{unit}");
        }
    }
    Ok(())
}
