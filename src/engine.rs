use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::warn;

use crate::aggregate;
use crate::convert::{self, Conversion};
use crate::expand;
use crate::fallback::FallbackTable;
use crate::models::{
    AnalysisRequest, ConversionStep, DebugTrace, FoodItemInput, LookupStep, MealReport,
    NormalizationStep, RawItem, ResolvedItem, Unmatched,
};
use crate::normalize::normalize;
use crate::resolver::{self, Resolution};
use crate::score::{self, Assessment};
use crate::store::NutrientStore;

/// Engine-level options. Request-independent; read once at startup.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Emit the debug trace on every response, regardless of the request flag.
    pub always_debug: bool,
}

impl EngineOptions {
    /// Read options from the environment (`NUTRI_ENGINE_DEBUG=true`).
    pub fn from_env() -> Self {
        let always_debug = std::env::var("NUTRI_ENGINE_DEBUG")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self { always_debug }
    }
}

/// The resolution and aggregation pipeline over a nutrient store.
///
/// Items are processed sequentially, in input order, so traces and results
/// are deterministic for a given store snapshot. The engine never writes to
/// the store.
pub struct Engine<S> {
    store: S,
    fallback: FallbackTable,
    options: EngineOptions,
}

impl<S: NutrientStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            fallback: FallbackTable::builtin().clone(),
            options: EngineOptions::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackTable) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// JSON-boundary entry point: parses the request, runs the pipeline and
    /// folds any fatal error into `{ "success": false, "error": ... }`.
    pub async fn analyze_value(&self, value: Value) -> Value {
        let request: AnalysisRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(err) => {
                return json!({ "success": false, "error": format!("malformed request: {err}") })
            }
        };
        match self.analyze(request).await {
            Ok(report) => serde_json::to_value(&report)
                .unwrap_or_else(|err| json!({ "success": false, "error": err.to_string() })),
            Err(err) => json!({ "success": false, "error": err.to_string() }),
        }
    }

    /// Run the full pipeline. Per-item store failures are recovered locally
    /// (the item resolves as unmatched); only a store that cannot serve the
    /// batch at all is fatal.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<MealReport> {
        let debug_enabled = request.debug || self.options.always_debug;
        let inputs: Vec<FoodItemInput> =
            request.items.into_iter().map(RawItem::into_input).collect();

        let mut trace = DebugTrace::default();
        let normalized: Vec<String> = inputs.iter().map(|i| normalize(i.name())).collect();
        for (input, norm) in inputs.iter().zip(&normalized) {
            trace.normalization.push(NormalizationStep {
                from: input.name().to_string(),
                to: norm.clone(),
            });
        }

        // One alias round trip for the whole request. This is also the only
        // call allowed to fail the batch: if the store cannot answer it, no
        // per-item recovery is meaningful.
        let alias_hits = if inputs.is_empty() {
            HashMap::new()
        } else {
            let mut keys: Vec<String> = normalized
                .iter()
                .filter(|k| !k.is_empty())
                .cloned()
                .collect();
            keys.sort();
            keys.dedup();
            self.store
                .lookup_alias_batch(&keys)
                .await
                .map_err(|err| anyhow!("nutrient store unavailable: {err}"))?
        };

        let mut items_detailed = Vec::with_capacity(inputs.len());
        let mut unmatched = Vec::new();

        for (input, norm) in inputs.iter().zip(&normalized) {
            let resolution =
                resolver::resolve(&self.store, &self.fallback, &alias_hits, input, norm).await;
            trace.lookups.push(LookupStep {
                input: input.name().to_string(),
                matched_by: resolution.kind(),
                food_id: resolution.food_id().cloned(),
            });

            let item = match resolution {
                Resolution::None => {
                    unmatched.push(Unmatched {
                        input_name: input.name().to_string(),
                        reason: "not_found".to_string(),
                    });
                    ResolvedItem::unmatched(input.name().to_string())
                }
                Resolution::Dish(recipe) => {
                    let mut item =
                        expand::expand(&self.store, input.name(), &recipe, input.grams()).await;
                    if matches!(input, FoodItemInput::ByNameAndVolume { .. }) {
                        item.notes
                            .push("volume ignored for composite dish".to_string());
                    }
                    item
                }
                Resolution::Food {
                    matched,
                    kind,
                    mut notes,
                } => {
                    let Conversion {
                        grams_effective,
                        notes: conversion_notes,
                        steps,
                    } = convert::to_effective_grams(&self.store, input, &matched).await;
                    notes.extend(conversion_notes);
                    trace.conversions.extend(steps);

                    let mut nutrients = matched.per100g.scaled(grams_effective);
                    if let Some(oil) =
                        convert::fried_oil_grams(&self.store, input.state(), &matched, grams_effective)
                            .await
                    {
                        nutrients.fat_g += oil;
                        nutrients.kcal += 9.0 * oil;
                        notes.push(format!("fried: +{oil:.1} g absorbed oil"));
                        trace.conversions.push(ConversionStep {
                            input: input.name().to_string(),
                            kind: "oil_absorption_g".to_string(),
                            factor: oil,
                        });
                    }

                    ResolvedItem {
                        input_name: input.name().to_string(),
                        canonical_name: Some(matched.name),
                        match_kind: kind,
                        grams_effective,
                        kcal: nutrients.kcal,
                        protein_g: nutrients.protein_g,
                        fat_g: nutrients.fat_g,
                        carbs_g: nutrients.carbs_g,
                        fiber_g: nutrients.fiber_g,
                        sodium_mg: nutrients.sodium_mg,
                        notes,
                    }
                }
            };
            items_detailed.push(item);
        }

        if !unmatched.is_empty() {
            warn!(count = unmatched.len(), "request has unmatched items");
        }

        let totals = aggregate::totals(&items_detailed);
        let assessment = if items_detailed.is_empty() {
            Assessment::empty_meal()
        } else {
            score::assess(&totals)
        };

        Ok(MealReport {
            success: unmatched.is_empty(),
            summary_text: summary(&items_detailed),
            totals,
            meal_score: assessment.score,
            warnings: assessment.warnings,
            suggestions: assessment.suggestions,
            unmatched,
            debug: debug_enabled.then_some(trace),
            items_detailed,
        })
    }
}

fn summary(items: &[ResolvedItem]) -> String {
    if items.is_empty() {
        return "No items identified".to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|item| {
            let name = item.canonical_name.as_deref().unwrap_or(&item.input_name);
            if item.grams_effective > 0.0 {
                format!("{} {:.0}g", name, item.grams_effective)
            } else {
                name.to_string()
            }
        })
        .collect();
    format!("Identified: {}", parts.join(", "))
}
