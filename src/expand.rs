use crate::models::{MatchKind, Nutrients, Recipe, ResolvedItem};
use crate::resolver::or_miss;
use crate::store::NutrientStore;

/// Decompose a composite dish into its weighted components and sum their
/// nutrients.
///
/// Components are scaled by `target_grams / base_total` before lookup, so a
/// request for 300 g of a 500 g recipe weighs every component by 0.6.
/// Component lookup is a plain by-id read: recipe rows are pre-linked, so
/// the alias/fallback chain does not apply. A component whose row is missing
/// (or whose lookup fails) contributes zero and is noted.
pub async fn expand<S: NutrientStore>(
    store: &S,
    input_name: &str,
    recipe: &Recipe,
    target_grams: Option<f64>,
) -> ResolvedItem {
    let base_total: f64 = recipe.components.iter().map(|c| c.grams).sum();
    let scale = match target_grams {
        Some(target) if base_total > 0.0 => target / base_total,
        _ => 1.0,
    };

    let mut sum = Nutrients::default();
    let mut notes = Vec::new();
    for component in &recipe.components {
        let grams = component.grams * scale;
        match or_miss(
            store.lookup_food(&component.food_id).await,
            input_name,
            "recipe component",
        ) {
            Some(food) => sum.add(&food.per100g.scaled(grams)),
            None => notes.push(format!("component {} not found", component.food_id)),
        }
    }
    notes.push(format!(
        "expanded {} components at scale {scale}",
        recipe.components.len()
    ));

    ResolvedItem {
        input_name: input_name.to_string(),
        canonical_name: Some(recipe.name.clone()),
        match_kind: MatchKind::Recipe,
        grams_effective: target_grams.unwrap_or(base_total),
        kcal: sum.kcal,
        protein_g: sum.protein_g,
        fat_g: sum.fat_g,
        carbs_g: sum.carbs_g,
        fiber_g: sum.fiber_g,
        sodium_mg: sum.sodium_mg,
        notes,
    }
}
