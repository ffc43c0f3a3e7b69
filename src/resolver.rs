use std::collections::HashMap;

use anyhow::Result;
use tracing::warn;

use crate::fallback::{FallbackEntry, FallbackTable};
use crate::models::{FoodId, FoodItemInput, MatchKind, Per100g, PrepState, Recipe};
use crate::store::NutrientStore;

/// A matched nutrient source, before quantity conversion. Fallback rows
/// carry no store id, so the conversion stage skips the per-id lookups.
#[derive(Debug, Clone)]
pub struct MatchedFood {
    pub id: Option<FoodId>,
    pub name: String,
    pub state: Option<PrepState>,
    pub per100g: Per100g,
}

impl MatchedFood {
    fn from_fallback(entry: &FallbackEntry) -> Self {
        Self {
            id: None,
            name: entry.canonical.clone(),
            state: entry.state,
            per100g: entry.per100g,
        }
    }
}

/// Outcome of the matching precedence chain for one item.
#[derive(Debug, Clone)]
pub enum Resolution {
    Food {
        matched: MatchedFood,
        kind: MatchKind,
        notes: Vec<String>,
    },
    /// The name matched a composite dish; expansion happens separately.
    Dish(Recipe),
    None,
}

impl Resolution {
    pub fn kind(&self) -> MatchKind {
        match self {
            Resolution::Food { kind, .. } => *kind,
            Resolution::Dish(_) => MatchKind::Recipe,
            Resolution::None => MatchKind::None,
        }
    }

    pub fn food_id(&self) -> Option<&FoodId> {
        match self {
            Resolution::Food { matched, .. } => matched.id.as_ref(),
            _ => None,
        }
    }
}

/// Run the fixed precedence chain: alias, canonical exact, static fallback,
/// recipe, none. Short-circuits on the first hit. A store error at one stage
/// is logged and treated as a miss for that stage only.
pub async fn resolve<S: NutrientStore>(
    store: &S,
    fallback: &FallbackTable,
    alias_hits: &HashMap<String, FoodId>,
    input: &FoodItemInput,
    normalized: &str,
) -> Resolution {
    let declared = input.state();

    // 1) Alias, against the prefetched batch map.
    if !normalized.is_empty() {
        if let Some(food_id) = alias_hits.get(normalized) {
            match or_miss(store.lookup_food(food_id).await, input.name(), "alias food") {
                Some(food) => {
                    let matched = MatchedFood {
                        id: Some(food.id),
                        name: food.name,
                        state: food.state,
                        per100g: food.per100g,
                    };
                    return finish(fallback, normalized, declared, matched, MatchKind::Alias);
                }
                None => {
                    warn!(alias = normalized, food_id = %food_id, "alias points at a missing food row");
                }
            }
        }
    }

    // 2) Canonical exact, on the original name.
    if let Some(food) = or_miss(
        store.lookup_canonical_exact(input.name()).await,
        input.name(),
        "canonical",
    ) {
        let matched = MatchedFood {
            id: Some(food.id),
            name: food.name,
            state: food.state,
            per100g: food.per100g,
        };
        return finish(fallback, normalized, declared, matched, MatchKind::Canonical);
    }

    // 3) Static fallback table.
    if let Some(entry) = fallback.get(normalized) {
        let base = entry.base_key().to_string();
        let matched = MatchedFood::from_fallback(entry);
        let mut resolution = finish(fallback, &base, declared, matched, MatchKind::Fallback);
        if let Resolution::Food { notes, .. } = &mut resolution {
            notes.push("static fallback entry".to_string());
        }
        return resolution;
    }

    // 4) Recipe expansion.
    if let Some(recipe) = or_miss(
        store.lookup_recipe(input.name()).await,
        input.name(),
        "recipe",
    ) {
        return Resolution::Dish(recipe);
    }

    Resolution::None
}

/// Apply the raw/cooked consistency rule before returning a match: when the
/// declared state and the matched record's state sit on opposite sides of
/// the raw/cooked divide and the fallback table carries a state-consistent
/// row for the food, that row wins. Raw and cooked legumes differ ~2-3x per
/// 100 g, so honoring the declared state beats trusting the lookup.
fn finish(
    fallback: &FallbackTable,
    base: &str,
    declared: Option<PrepState>,
    matched: MatchedFood,
    kind: MatchKind,
) -> Resolution {
    let mut notes = Vec::new();

    if let (Some(declared), Some(have)) = (declared, matched.state) {
        let conflicting = matches!(
            (have, declared),
            (PrepState::Raw, PrepState::Cooked) | (PrepState::Cooked, PrepState::Raw)
        );
        if conflicting {
            if let Some(entry) = fallback.state_variant(base, declared) {
                notes.push(format!(
                    "matched {} entry replaced by {} variant for declared state",
                    have.as_str(),
                    declared.as_str()
                ));
                return Resolution::Food {
                    matched: MatchedFood::from_fallback(entry),
                    kind: MatchKind::Fallback,
                    notes,
                };
            }
        }
    }

    Resolution::Food {
        matched,
        kind,
        notes,
    }
}

pub(crate) fn or_miss<T>(result: Result<Option<T>>, item: &str, stage: &str) -> Option<T> {
    match result {
        Ok(v) => v,
        Err(err) => {
            warn!(item, stage, error = %err, "store lookup failed; treating as no match");
            None
        }
    }
}
