use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{Per100g, PrepState};

static BUILTIN: LazyLock<FallbackTable> = LazyLock::new(|| {
    FallbackTable::parse(include_str!("../data/fallback_foods.json"))
        .expect("embedded fallback table parses")
});

/// One row of the static fallback table, keyed by normalized name.
///
/// The lowest-trust source in the precedence chain: consulted only after the
/// alias and canonical lookups both miss, and always flagged as such in the
/// result. `base` groups preparation-state variants of the same food
/// ("feijao preto cru" / "feijao preto cozido" share base "feijao preto").
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackEntry {
    pub key: String,
    #[serde(default)]
    pub base: Option<String>,
    pub canonical: String,
    #[serde(default)]
    pub state: Option<PrepState>,
    pub per100g: Per100g,
}

impl FallbackEntry {
    pub fn base_key(&self) -> &str {
        self.base.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Deserialize)]
struct FallbackFile {
    version: String,
    foods: Vec<FallbackEntry>,
}

/// Static name -> per-100g table, shipped as versioned JSON data so
/// corrections land without a rebuild.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    version: String,
    by_key: HashMap<String, FallbackEntry>,
    by_state: HashMap<(String, PrepState), String>,
}

impl FallbackTable {
    /// The table embedded in the crate (`data/fallback_foods.json`).
    pub fn builtin() -> &'static FallbackTable {
        &BUILTIN
    }

    /// Load an override table from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fallback table {}", path.display()))?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Self> {
        let file: FallbackFile = serde_json::from_str(raw).context("parsing fallback table")?;

        let mut by_key = HashMap::new();
        for entry in file.foods {
            by_key.insert(entry.key.clone(), entry);
        }

        // Sorted so the variant index is insensitive to file order.
        let mut keys: Vec<&String> = by_key.keys().collect();
        keys.sort();
        let mut by_state = HashMap::new();
        for key in keys {
            let entry = &by_key[key];
            if let Some(state) = entry.state {
                by_state
                    .entry((entry.base_key().to_string(), state))
                    .or_insert_with(|| key.clone());
            }
        }

        Ok(Self {
            version: file.version,
            by_key,
            by_state,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Exact lookup by normalized key.
    pub fn get(&self, key: &str) -> Option<&FallbackEntry> {
        self.by_key.get(key)
    }

    /// The entry for `base` measured at `state`, if the table carries one.
    pub fn state_variant(&self, base: &str, state: PrepState) -> Option<&FallbackEntry> {
        let key = self.by_state.get(&(base.to_string(), state))?;
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
