use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use recipebox_core::models::{Ingredient, Phase, Quantity, Recipe, validate_recipe};

use super::Workspace;

/// Convert Cooklang source into a recipe. Ingredients are grouped by name and
/// every step becomes a phase that links the ingredients it mentions.
pub(crate) fn recipe_from_cooklang(
    input: &str,
    file_stem: Option<&str>,
    title_override: Option<String>,
) -> Result<Recipe> {
    let (parsed, _report) = cooklang::parse(input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let title = title_override
        .or_else(|| parsed.metadata.title().map(String::from))
        .or_else(|| file_stem.map(String::from))
        .context("Could not determine recipe title. Use --title to specify one")?;

    let mut recipe = Recipe::new(title.trim());
    recipe.serving_size = parsed
        .metadata
        .servings()
        .and_then(|s| s.as_number())
        .map(|n| n.to_string());

    let converter = cooklang::Converter::default();
    let mut ids_by_name: HashMap<String, String> = HashMap::new();
    for gi in parsed.group_ingredients(&converter) {
        let ingredient = cooklang_ingredient(&gi);
        let key = ingredient.name.to_lowercase();
        // Plain repeated mentions ("@milk" twice) are separate entries in
        // cooklang; fold them into one ingredient
        if let Some(id) = ids_by_name.get(&key) {
            if let Some(existing) = recipe.ingredients.iter_mut().find(|i| &i.id == id) {
                merge_quantity(existing, &ingredient);
            }
            continue;
        }
        ids_by_name.insert(key, ingredient.id.clone());
        recipe.ingredients.push(ingredient);
    }

    for section in &parsed.sections {
        for content in &section.content {
            let cooklang::Content::Step(step) = content else {
                continue;
            };
            let mut instructions = String::new();
            let mut ingredient_ids: Vec<String> = Vec::new();
            for item in &step.items {
                match item {
                    cooklang::Item::Text { value } => instructions.push_str(value),
                    cooklang::Item::Ingredient { index } => {
                        let name = parsed.ingredients[*index].display_name();
                        instructions.push_str(&name);
                        if let Some(id) = ids_by_name.get(&name.to_lowercase()) {
                            if !ingredient_ids.contains(id) {
                                ingredient_ids.push(id.clone());
                            }
                        }
                    }
                    cooklang::Item::Cookware { index } => {
                        instructions.push_str(&parsed.cookware[*index].name);
                    }
                    cooklang::Item::Timer { index } => {
                        let timer = &parsed.timers[*index];
                        match (&timer.quantity, &timer.name) {
                            (Some(q), _) => instructions.push_str(&q.to_string()),
                            (None, Some(name)) => instructions.push_str(name),
                            (None, None) => {}
                        }
                    }
                    _ => {}
                }
            }

            let n = recipe.phases.len() + 1;
            let name = match &section.name {
                Some(section_name) => format!("{section_name} {n}"),
                None => format!("Step {n}"),
            };
            let mut phase = Phase::new(&name, instructions.trim());
            phase.ingredient_ids = ingredient_ids;
            recipe.phases.push(phase);
        }
    }

    validate_recipe(&recipe)?;
    Ok(recipe)
}

fn cooklang_ingredient(gi: &cooklang::ingredient_list::GroupedIngredient<'_>) -> Ingredient {
    // First grouped quantity only
    let (quantity, unit) = gi.quantity.iter().next().map_or_else(
        || (Quantity::Text(String::new()), String::new()),
        |qty: &cooklang::Quantity| {
            let quantity = match qty.value() {
                cooklang::Value::Number(n) => Quantity::Number(n.value()),
                cooklang::Value::Range { start, .. } => Quantity::Number(start.value()),
                cooklang::Value::Text(t) => Quantity::parse(t),
            };
            (quantity, qty.unit().unwrap_or_default().to_string())
        },
    );
    Ingredient::new(&gi.ingredient.display_name(), quantity, &unit)
}

/// Amounts in the same unit add up. Otherwise the first amount stands.
fn merge_quantity(into: &mut Ingredient, other: &Ingredient) {
    match (&into.quantity, &other.quantity) {
        (Quantity::Number(a), Quantity::Number(b)) if into.unit == other.unit => {
            into.quantity = Quantity::Number(a + b);
        }
        (Quantity::Text(t), _) if t.is_empty() => {
            into.quantity = other.quantity.clone();
            into.unit.clone_from(&other.unit);
        }
        _ => {}
    }
}

pub(crate) async fn cmd_import(
    ws: &Workspace,
    file: &Path,
    title: Option<String>,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let stem = file.file_stem().and_then(|s| s.to_str());
    let recipe = recipe_from_cooklang(&input, stem, title)?;
    if recipe.ingredients.is_empty() && recipe.phases.is_empty() {
        bail!("No ingredients or steps found in recipe");
    }

    let recipe = ws.store.add_recipe(recipe).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let title = &recipe.title;
        let ing_count = recipe.ingredients.len();
        let phase_count = recipe.phases.len();
        println!(
            "Imported recipe: {title} ({ing_count} ingredients, {phase_count} phases, id: {})",
            recipe.id
        );
    }
    Ok(())
}

/// Parse a full recipe list, as written by `export` or found in Drive.
pub(crate) fn parse_backup(raw: &str) -> Result<Vec<Recipe>> {
    let recipes: Vec<Recipe> =
        serde_json::from_str(raw).context("Backup is not a JSON list of recipes")?;
    for recipe in &recipes {
        validate_recipe(recipe).with_context(|| format!("Invalid recipe '{}'", recipe.title))?;
    }
    Ok(recipes)
}

/// Replace the whole list with the contents of a backup file.
pub(crate) fn cmd_restore(ws: &Workspace, file: &Path, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let recipes = parse_backup(&raw)?;
    let count = recipes.len();
    let replaced = ws.store.len();
    ws.store.set_recipes(recipes);

    if json {
        println!(
            "{}",
            serde_json::json!({ "restored": count, "replaced": replaced })
        );
    } else {
        println!("Restored {count} recipes (replaced {replaced})");
    }
    Ok(())
}

pub(crate) fn cmd_export(ws: &Workspace, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(&ws.store.recipes())?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            eprintln!("Exported {} recipes to {}", ws.store.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANCAKES: &str = "\
---
title: Pancakes
servings: 4
---

Whisk @flour{250%g} with @milk{500%ml} and @eggs{2}.

Heat a #pan{} and fry each pancake for ~{2%minutes}. Add a little more @milk{50%ml} if needed.
";

    #[test]
    fn test_cooklang_metadata() {
        let recipe = recipe_from_cooklang(PANCAKES, Some("file"), None).unwrap();
        assert_eq!(recipe.title, "Pancakes");
        assert_eq!(recipe.serving_size.as_deref(), Some("4"));
    }

    #[test]
    fn test_cooklang_title_fallbacks() {
        let recipe =
            recipe_from_cooklang(PANCAKES, Some("file"), Some("Sunday Pancakes".into())).unwrap();
        assert_eq!(recipe.title, "Sunday Pancakes");

        let untitled = "Mix @salt{1%tsp} into @water{1%l}.\n";
        let recipe = recipe_from_cooklang(untitled, Some("brine"), None).unwrap();
        assert_eq!(recipe.title, "brine");
        assert!(recipe_from_cooklang(untitled, None, None).is_err());
    }

    #[test]
    fn test_cooklang_ingredients_grouped() {
        let recipe = recipe_from_cooklang(PANCAKES, None, None).unwrap();
        let names: Vec<&str> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["flour", "milk", "eggs"]);

        let flour = &recipe.ingredients[0];
        assert_eq!(flour.quantity, Quantity::Number(250.0));
        assert_eq!(flour.unit, "g");
        let milk = &recipe.ingredients[1];
        assert_eq!(milk.quantity, Quantity::Number(550.0));
        assert_eq!(milk.unit, "ml");
        let eggs = &recipe.ingredients[2];
        assert_eq!(eggs.quantity, Quantity::Number(2.0));
        assert_eq!(eggs.unit, "");
    }

    #[test]
    fn test_cooklang_steps_become_phases() {
        let recipe = recipe_from_cooklang(PANCAKES, None, None).unwrap();
        assert_eq!(recipe.phases.len(), 2);

        let first = &recipe.phases[0];
        assert_eq!(first.name, "Step 1");
        assert_eq!(first.instructions, "Whisk flour with milk and eggs.");
        assert_eq!(recipe.phase_ingredients(first).len(), 3);

        let second = &recipe.phases[1];
        assert_eq!(second.name, "Step 2");
        assert!(second.instructions.starts_with("Heat a pan and fry"));
        let names: Vec<&str> = recipe
            .phase_ingredients(second)
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["milk"]);
    }

    #[test]
    fn test_cooklang_repeated_ingredient_with_other_unit() {
        let input = "Melt @butter{2%tbsp}.\n\nFold in @butter{30%g} and @sugar{}.\n";
        let recipe = recipe_from_cooklang(input, Some("glaze"), None).unwrap();
        let names: Vec<&str> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["butter", "sugar"]);
        assert_eq!(recipe.ingredients[0].quantity, Quantity::Number(2.0));
        assert_eq!(recipe.ingredients[0].unit, "tbsp");

        let butter_id = &recipe.ingredients[0].id;
        assert!(recipe.phases.iter().all(|p| p.ingredient_ids.contains(butter_id)));
    }

    #[test]
    fn test_parse_backup() {
        let raw = r#"[
            {"id":"1","title":"Tea","ingredients":[{"id":"i1","name":"Leaves","quantity":"2","unit":"tsp"}]},
            {"id":"2","title":"Toast","deleted":true}
        ]"#;
        let recipes = parse_backup(raw).unwrap();
        assert_eq!(recipes.len(), 2);
        assert!(recipes[1].is_deleted());
    }

    #[test]
    fn test_parse_backup_rejects_bad_input() {
        assert!(parse_backup(r#"{"id":"1"}"#).is_err());
        assert!(parse_backup(r#"[{"id":"1","title":""}]"#).is_err());
        assert!(parse_backup("[]").unwrap().is_empty());
    }
}
