use anyhow::Result;

use recipebox_core::models::{DEFAULT_UNIT, Ingredient, Quantity, Recipe, is_known_unit};

use super::Workspace;
use super::helpers::{exit_not_found, find_recipe, short_id};

/// Build an ingredient from command-line text. "250g" with no unit flag
/// reads as 250 of the default unit.
pub(crate) fn parse_ingredient(name: &str, quantity: &str, unit: Option<&str>) -> Ingredient {
    let quantity = Quantity::parse(quantity);
    let unit = unit.map_or(DEFAULT_UNIT, str::trim);
    Ingredient::new(name.trim(), quantity, unit)
}

/// Resolve an ingredient by full id, name, or unique id prefix.
pub(crate) fn find_ingredient_id(recipe: &Recipe, key: &str) -> Option<String> {
    let key = key.trim();
    if let Some(ing) = recipe.ingredient(key) {
        return Some(ing.id.clone());
    }
    if let Some(ing) = recipe
        .ingredients
        .iter()
        .find(|i| !key.is_empty() && i.name.eq_ignore_ascii_case(key))
    {
        return Some(ing.id.clone());
    }
    let mut matches = recipe
        .ingredients
        .iter()
        .filter(|i| !key.is_empty() && i.id.starts_with(key));
    match (matches.next(), matches.next()) {
        (Some(ing), None) => Some(ing.id.clone()),
        _ => None,
    }
}

pub(crate) async fn cmd_ingredient_add(
    ws: &Workspace,
    recipe_key: &str,
    name: &str,
    quantity: &str,
    unit: Option<&str>,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Ingredient name must not be empty");
    }
    let recipes = ws.store.recipes();
    let Some(found) = find_recipe(&recipes, recipe_key) else {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    };

    let ingredient = parse_ingredient(name, quantity, unit);
    if !ingredient.unit.is_empty() && !is_known_unit(&ingredient.unit) {
        let unit = &ingredient.unit;
        eprintln!("Note: '{unit}' is not a standard unit (see `recipebox units`)");
    }

    let mut recipe = found.clone();
    recipe.ingredients.push(ingredient.clone());
    if ws.store.edit_recipe(recipe).await.is_none() {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let amount = format!("{} {}", ingredient.quantity, ingredient.unit);
        println!(
            "Added {} of {} to {} (ingredient id: {})",
            amount.trim(),
            ingredient.name,
            found.title,
            short_id(&ingredient.id)
        );
    }
    Ok(())
}

pub(crate) async fn cmd_ingredient_remove(
    ws: &Workspace,
    recipe_key: &str,
    ingredient_key: &str,
    json: bool,
) -> Result<()> {
    let recipes = ws.store.recipes();
    let Some(found) = find_recipe(&recipes, recipe_key) else {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    };
    let Some(id) = find_ingredient_id(found, ingredient_key) else {
        let title = &found.title;
        exit_not_found(
            &format!("Ingredient '{ingredient_key}' not found in {title}"),
            json,
        );
    };

    let mut recipe = found.clone();
    recipe.remove_ingredient(&id);
    if ws.store.edit_recipe(recipe).await.is_none() {
        exit_not_found(&format!("Recipe '{recipe_key}' not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "removed": id }));
    } else {
        println!("Removed ingredient {} from {}", short_id(&id), found.title);
    }
    Ok(())
}
