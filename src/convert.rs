use crate::models::{ConversionStep, FoodItemInput, PrepState};
use crate::resolver::{or_miss, MatchedFood};
use crate::store::NutrientStore;

/// Result of turning an input quantity into effective edible grams.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub grams_effective: f64,
    pub notes: Vec<String>,
    pub steps: Vec<ConversionStep>,
}

/// Compute the effective edible mass for a matched food.
///
/// Order is fixed: volume times density, then yield for a declared state
/// transition, then edible portion factor. Each multiplier defaults to a
/// no-op when its data is absent. An input with no quantity at all is pinned
/// to exactly 100 g so the per-100g values pass through unscaled.
pub async fn to_effective_grams<S: NutrientStore>(
    store: &S,
    input: &FoodItemInput,
    matched: &MatchedFood,
) -> Conversion {
    let mut notes = Vec::new();
    let mut steps = Vec::new();
    let step = |kind: &str, factor: f64| ConversionStep {
        input: input.name().to_string(),
        kind: kind.to_string(),
        factor,
    };

    let mut grams = match input {
        FoodItemInput::ByNameAndMass { grams, .. } => *grams,
        FoodItemInput::ByNameAndVolume { ml, .. } => {
            let density = match &matched.id {
                Some(id) => {
                    or_miss(store.lookup_density(id).await, input.name(), "density")
                        .unwrap_or(1.0)
                }
                None => 1.0,
            };
            steps.push(step("density", density));
            ml * density
        }
        FoodItemInput::ByName { .. } => {
            notes.push("no quantity given; assumed 100 g".to_string());
            return Conversion {
                grams_effective: 100.0,
                notes,
                steps,
            };
        }
    };

    if let (Some(id), Some(declared), Some(native)) =
        (&matched.id, input.state(), matched.state)
    {
        if declared != native {
            if let Some(factor) = or_miss(
                store.lookup_yield(id, native, declared).await,
                input.name(),
                "yield",
            ) {
                if factor > 0.0 {
                    grams *= factor;
                    notes.push(format!(
                        "yield {} -> {} x{factor}",
                        native.as_str(),
                        declared.as_str()
                    ));
                    steps.push(step("yield", factor));
                }
            }
        }
    }

    if let Some(id) = &matched.id {
        if let Some(epf) = or_miss(store.lookup_epf(id).await, input.name(), "epf") {
            if epf > 0.0 && epf <= 1.0 {
                grams *= epf;
                notes.push(format!("edible portion x{epf}"));
                steps.push(step("epf", epf));
            }
        }
    }

    Conversion {
        grams_effective: grams,
        notes,
        steps,
    }
}

/// Grams of absorbed frying oil for the whole portion, when the effective
/// preparation state is fried and the store has an absorption factor.
/// The caller adds this to fat and nine times it to kcal.
pub async fn fried_oil_grams<S: NutrientStore>(
    store: &S,
    declared: Option<PrepState>,
    matched: &MatchedFood,
    grams: f64,
) -> Option<f64> {
    let id = matched.id.as_ref()?;
    let effective = declared.or(matched.state)?;
    if effective != PrepState::Fried {
        return None;
    }
    let per_100g = or_miss(
        store.lookup_oil_absorption(id).await,
        &matched.name,
        "oil absorption",
    )?;
    (per_100g > 0.0).then_some(per_100g * grams / 100.0)
}
