use std::collections::HashSet;
use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::image_ref::ImageRef;

/// Units offered when entering an ingredient. Not enforced on stored data.
pub const COOKING_UNITS: &[&str] = &[
    // Volume
    "cup", "tbsp", "tsp", "ml", "l", "cl", "fl oz", "pint", "quart", "gallon",
    // Weight
    "g", "kg", "oz", "lb",
    // Count/Misc
    "pinch", "dash", "piece", "slice", "clove", "can", "jar", "package", "bag", "stick", "sprig",
    "bunch", "head", "stalk", "fillet",
];

pub const DEFAULT_UNIT: &str = "g";

/// Generate a fresh identifier for a recipe, ingredient or phase.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[must_use]
pub fn is_known_unit(unit: &str) -> bool {
    COOKING_UNITS.iter().any(|u| u.eq_ignore_ascii_case(unit.trim()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Free text as entered, e.g. "450".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
}

impl Recipe {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            description: String::new(),
            image: ImageRef::Empty,
            ingredients: Vec::new(),
            phases: Vec::new(),
            deleted: None,
            source_url: None,
            calories: None,
            serving_size: None,
        }
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }

    #[must_use]
    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Ingredients used by `phase`, in the phase's order. Ids that no longer
    /// name an ingredient of this recipe are skipped.
    #[must_use]
    pub fn phase_ingredients<'a>(&'a self, phase: &'a Phase) -> Vec<&'a Ingredient> {
        phase
            .ingredient_ids
            .iter()
            .filter_map(|id| self.ingredient(id))
            .collect()
    }

    /// Remove an ingredient and every phase reference to it.
    pub fn remove_ingredient(&mut self, id: &str) -> bool {
        let before = self.ingredients.len();
        self.ingredients.retain(|i| i.id != id);
        if self.ingredients.len() == before {
            return false;
        }
        for phase in &mut self.phases {
            phase.ingredient_ids.retain(|i| i != id);
        }
        true
    }

    pub fn remove_phase(&mut self, id: &str) -> bool {
        let before = self.phases.len();
        self.phases.retain(|p| p.id != id);
        self.phases.len() != before
    }

    /// Every image reference held by this recipe: the cover image first, then
    /// phase photos in order.
    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        std::iter::once(&self.image).chain(self.phases.iter().flat_map(|p| p.photo_uris.iter()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub quantity: Quantity,
    #[serde(default)]
    pub unit: String,
}

impl Ingredient {
    #[must_use]
    pub fn new(name: &str, quantity: Quantity, unit: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub ingredient_ids: Vec<String>,
    #[serde(default)]
    pub photo_uris: Vec<ImageRef>,
}

impl Phase {
    #[must_use]
    pub fn new(name: &str, instructions: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            instructions: instructions.to_string(),
            ingredient_ids: Vec::new(),
            photo_uris: Vec::new(),
        }
    }
}

/// An ingredient amount. Amounts that don't read as a number ("a handful")
/// are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Text(String),
}

impl Quantity {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match leading_number(trimmed) {
            Some(n) => Quantity::Number(n),
            None => Quantity::Text(trimmed.to_string()),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Quantity::Number(n) => Some(*n),
            Quantity::Text(_) => None,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Number(n) => write!(f, "{n}"),
            Quantity::Text(t) => f.write_str(t),
        }
    }
}

/// Longest numeric prefix of `s`, so "250g" reads as 250 and "1e3" as 1000.
/// A zero result counts as unparsable and the text is kept instead.
fn leading_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        has_digits |= frac_end > end + 1;
        end = frac_end;
    }
    if !has_digits {
        return None;
    }
    // Exponent only counts with at least one digit: "1e" is 1
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    let n: f64 = s[..end].parse().ok()?;
    (n.is_finite() && n != 0.0).then_some(n)
}

pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.title.trim().is_empty() {
        bail!("Recipe title must not be empty");
    }
    if recipe.id.trim().is_empty() {
        bail!("Recipe id must not be empty");
    }

    let mut ingredient_ids = HashSet::new();
    for ing in &recipe.ingredients {
        if !ingredient_ids.insert(ing.id.as_str()) {
            let id = &ing.id;
            bail!("Duplicate ingredient id '{id}'");
        }
    }

    let mut phase_ids = HashSet::new();
    for phase in &recipe.phases {
        if !phase_ids.insert(phase.id.as_str()) {
            let id = &phase.id;
            bail!("Duplicate phase id '{id}'");
        }
        if let Some(missing) = phase
            .ingredient_ids
            .iter()
            .find(|id| !ingredient_ids.contains(id.as_str()))
        {
            let name = &phase.name;
            bail!("Phase '{name}' references unknown ingredient '{missing}'");
        }
    }
    Ok(())
}
