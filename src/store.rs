use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{CanonicalFood, FoodId, Per100g, PrepState, Recipe, RecipeComponent};

/// Read-only query contract against the food-composition store.
///
/// The engine never writes; timeouts and retries are the implementation's
/// concern. Every method returns `Ok(None)` for "no such row" and `Err` only
/// for transport/store failures, which callers downgrade to a miss per item.
#[async_trait]
pub trait NutrientStore: Send + Sync {
    /// Exact match on a normalized alias key.
    async fn lookup_alias(&self, normalized: &str) -> Result<Option<FoodId>>;

    /// One round trip for a whole request's alias keys. The default loops
    /// over `lookup_alias`; network-backed stores override it.
    async fn lookup_alias_batch(&self, normalized: &[String]) -> Result<HashMap<String, FoodId>> {
        let mut out = HashMap::new();
        for key in normalized {
            if let Some(id) = self.lookup_alias(key).await? {
                out.insert(key.clone(), id);
            }
        }
        Ok(out)
    }

    /// Case-insensitive exact match on the original (non-normalized) name.
    async fn lookup_canonical_exact(&self, name: &str) -> Result<Option<CanonicalFood>>;

    /// Food row (name, state, per-100g nutrients) by id.
    async fn lookup_food(&self, food_id: &str) -> Result<Option<CanonicalFood>>;

    /// Density in g/ml, for volume inputs.
    async fn lookup_density(&self, food_id: &str) -> Result<Option<f64>>;

    /// Edible portion factor in (0, 1].
    async fn lookup_epf(&self, food_id: &str) -> Result<Option<f64>>;

    /// Mass multiplier for a state transition.
    async fn lookup_yield(
        &self,
        food_id: &str,
        from: PrepState,
        to: PrepState,
    ) -> Result<Option<f64>>;

    /// Grams of oil absorbed per 100 g when the food is fried.
    async fn lookup_oil_absorption(&self, food_id: &str) -> Result<Option<f64>>;

    /// Composite dish by name (case-insensitive).
    async fn lookup_recipe(&self, name: &str) -> Result<Option<Recipe>>;
}

/// PostgREST-backed store client.
///
/// One struct owning a `reqwest::Client`; each lookup is a single GET with
/// PostgREST filter operators in the query string. Food rows are cached per
/// client since recipe expansion re-reads the same ids.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    food_cache: Arc<RwLock<HashMap<FoodId, CanonicalFood>>>,
}

#[derive(Debug, Deserialize)]
struct AliasRow {
    #[serde(default)]
    alias_normalized: Option<String>,
    food_id: FoodId,
}

#[derive(Debug, Deserialize)]
struct FoodRow {
    id: FoodId,
    name: String,
    state: Option<String>,
    kcal: Option<f64>,
    #[serde(default)]
    carbs_g: f64,
    #[serde(default)]
    protein_g: f64,
    #[serde(default)]
    fat_g: f64,
    #[serde(default)]
    fiber_g: f64,
    #[serde(default)]
    sodium_mg: f64,
}

impl FoodRow {
    fn into_food(self) -> CanonicalFood {
        CanonicalFood {
            id: self.id,
            name: self.name,
            state: self.state.as_deref().and_then(PrepState::parse),
            per100g: Per100g {
                kcal: self.kcal,
                carbs_g: self.carbs_g,
                protein_g: self.protein_g,
                fat_g: self.fat_g,
                fiber_g: self.fiber_g,
                sodium_mg: self.sodium_mg,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct FactorRow {
    #[serde(alias = "grams_per_ml", alias = "epf", alias = "oil_absorption_g_per_100g")]
    factor: f64,
}

#[derive(Debug, Deserialize)]
struct RecipeRow {
    id: FoodId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ComponentRow {
    food_id: FoodId,
    grams: f64,
}

const FOOD_COLUMNS: &str = "id,name,state,kcal,carbs_g,protein_g,fat_g,fiber_g,sodium_mg";

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            food_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a client from `NUTRI_STORE_URL` and `NUTRI_STORE_KEY`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("NUTRI_STORE_URL")
            .map_err(|_| anyhow!("NUTRI_STORE_URL is not set"))?;
        let key = std::env::var("NUTRI_STORE_KEY")
            .map_err(|_| anyhow!("NUTRI_STORE_KEY is not set"))?;
        Ok(Self::new(url, key))
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.base_url, table);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("GET {} failed: {} - {}", table, status, body));
        }

        Ok(resp.json().await?)
    }

    async fn single_factor(&self, table: &str, food_id: &str, select: &str) -> Result<Option<f64>> {
        let rows: Vec<FactorRow> = self
            .get_rows(
                table,
                &[
                    ("select", select.to_string()),
                    ("food_id", format!("eq.{food_id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(|r| r.factor))
    }
}

#[async_trait]
impl NutrientStore for RestStore {
    async fn lookup_alias(&self, normalized: &str) -> Result<Option<FoodId>> {
        let rows: Vec<AliasRow> = self
            .get_rows(
                "nutrition_aliases",
                &[
                    ("select", "food_id".to_string()),
                    ("alias_normalized", format!("eq.{normalized}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(|r| r.food_id))
    }

    async fn lookup_alias_batch(&self, normalized: &[String]) -> Result<HashMap<String, FoodId>> {
        if normalized.is_empty() {
            return Ok(HashMap::new());
        }
        let quoted: Vec<String> = normalized.iter().map(|k| format!("\"{k}\"")).collect();
        let rows: Vec<AliasRow> = self
            .get_rows(
                "nutrition_aliases",
                &[
                    ("select", "alias_normalized,food_id".to_string()),
                    ("alias_normalized", format!("in.({})", quoted.join(","))),
                ],
            )
            .await?;
        debug!(requested = normalized.len(), hits = rows.len(), "alias batch lookup");
        Ok(rows
            .into_iter()
            .filter_map(|r| r.alias_normalized.map(|a| (a, r.food_id)))
            .collect())
    }

    async fn lookup_canonical_exact(&self, name: &str) -> Result<Option<CanonicalFood>> {
        // ilike without wildcards: exact match, case-insensitive.
        let rows: Vec<FoodRow> = self
            .get_rows(
                "nutrition_foods",
                &[
                    ("select", FOOD_COLUMNS.to_string()),
                    ("name", format!("ilike.{name}")),
                    ("order", "id".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(FoodRow::into_food))
    }

    async fn lookup_food(&self, food_id: &str) -> Result<Option<CanonicalFood>> {
        {
            let cache = self.food_cache.read().await;
            if let Some(food) = cache.get(food_id) {
                return Ok(Some(food.clone()));
            }
        }

        let rows: Vec<FoodRow> = self
            .get_rows(
                "nutrition_foods",
                &[
                    ("select", FOOD_COLUMNS.to_string()),
                    ("id", format!("eq.{food_id}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let food = rows.into_iter().next().map(FoodRow::into_food);
        if let Some(ref f) = food {
            self.food_cache
                .write()
                .await
                .insert(f.id.clone(), f.clone());
        }
        Ok(food)
    }

    async fn lookup_density(&self, food_id: &str) -> Result<Option<f64>> {
        self.single_factor("nutrition_densities", food_id, "grams_per_ml")
            .await
    }

    async fn lookup_epf(&self, food_id: &str) -> Result<Option<f64>> {
        self.single_factor("nutrition_epf", food_id, "epf").await
    }

    async fn lookup_yield(
        &self,
        food_id: &str,
        from: PrepState,
        to: PrepState,
    ) -> Result<Option<f64>> {
        let rows: Vec<FactorRow> = self
            .get_rows(
                "nutrition_yields",
                &[
                    ("select", "factor".to_string()),
                    ("food_id", format!("eq.{food_id}")),
                    ("from_state", format!("eq.{}", from.as_str())),
                    ("to_state", format!("eq.{}", to.as_str())),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(|r| r.factor))
    }

    async fn lookup_oil_absorption(&self, food_id: &str) -> Result<Option<f64>> {
        self.single_factor(
            "nutrition_oil_absorption",
            food_id,
            "oil_absorption_g_per_100g",
        )
        .await
    }

    async fn lookup_recipe(&self, name: &str) -> Result<Option<Recipe>> {
        let rows: Vec<RecipeRow> = self
            .get_rows(
                "nutrition_recipes",
                &[
                    ("select", "id,name".to_string()),
                    ("name", format!("ilike.{name}")),
                    ("order", "id".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        let Some(recipe) = rows.into_iter().next() else {
            return Ok(None);
        };

        let components: Vec<ComponentRow> = self
            .get_rows(
                "nutrition_recipe_components",
                &[
                    ("select", "food_id,grams".to_string()),
                    ("recipe_id", format!("eq.{}", recipe.id)),
                    ("order", "food_id".to_string()),
                ],
            )
            .await?;
        if components.is_empty() {
            return Ok(None);
        }

        Ok(Some(Recipe {
            name: recipe.name,
            components: components
                .into_iter()
                .map(|c| RecipeComponent {
                    food_id: c.food_id,
                    grams: c.grams,
                })
                .collect(),
        }))
    }
}

/// In-process store backed by plain maps. Used by the test suites and by
/// callers embedding a snapshot of the food tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    foods: HashMap<FoodId, CanonicalFood>,
    aliases: HashMap<String, FoodId>,
    densities: HashMap<FoodId, f64>,
    epf: HashMap<FoodId, f64>,
    yields: HashMap<(FoodId, PrepState, PrepState), f64>,
    oil_absorption: HashMap<FoodId, f64>,
    recipes: HashMap<String, Recipe>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_food(&mut self, food: CanonicalFood) {
        self.foods.insert(food.id.clone(), food);
    }

    pub fn add_alias(&mut self, alias_normalized: impl Into<String>, food_id: impl Into<String>) {
        self.aliases.insert(alias_normalized.into(), food_id.into());
    }

    pub fn add_density(&mut self, food_id: impl Into<String>, grams_per_ml: f64) {
        self.densities.insert(food_id.into(), grams_per_ml);
    }

    pub fn add_epf(&mut self, food_id: impl Into<String>, epf: f64) {
        self.epf.insert(food_id.into(), epf);
    }

    pub fn add_yield(
        &mut self,
        food_id: impl Into<String>,
        from: PrepState,
        to: PrepState,
        factor: f64,
    ) {
        self.yields.insert((food_id.into(), from, to), factor);
    }

    pub fn add_oil_absorption(&mut self, food_id: impl Into<String>, grams_per_100g: f64) {
        self.oil_absorption.insert(food_id.into(), grams_per_100g);
    }

    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.name.to_lowercase(), recipe);
    }
}

#[async_trait]
impl NutrientStore for MemoryStore {
    async fn lookup_alias(&self, normalized: &str) -> Result<Option<FoodId>> {
        Ok(self.aliases.get(normalized).cloned())
    }

    async fn lookup_canonical_exact(&self, name: &str) -> Result<Option<CanonicalFood>> {
        let wanted = name.to_lowercase();
        // Smallest id wins so repeated lookups stay deterministic.
        Ok(self
            .foods
            .values()
            .filter(|f| f.name.to_lowercase() == wanted)
            .min_by(|a, b| a.id.cmp(&b.id))
            .cloned())
    }

    async fn lookup_food(&self, food_id: &str) -> Result<Option<CanonicalFood>> {
        Ok(self.foods.get(food_id).cloned())
    }

    async fn lookup_density(&self, food_id: &str) -> Result<Option<f64>> {
        Ok(self.densities.get(food_id).copied())
    }

    async fn lookup_epf(&self, food_id: &str) -> Result<Option<f64>> {
        Ok(self.epf.get(food_id).copied())
    }

    async fn lookup_yield(
        &self,
        food_id: &str,
        from: PrepState,
        to: PrepState,
    ) -> Result<Option<f64>> {
        Ok(self
            .yields
            .get(&(food_id.to_string(), from, to))
            .copied())
    }

    async fn lookup_oil_absorption(&self, food_id: &str) -> Result<Option<f64>> {
        Ok(self.oil_absorption.get(food_id).copied())
    }

    async fn lookup_recipe(&self, name: &str) -> Result<Option<Recipe>> {
        Ok(self.recipes.get(&name.to_lowercase()).cloned())
    }
}
