use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque food identifier assigned by the nutrient store.
pub type FoodId = String;

/// Preparation state of a food, as declared by the caller or recorded in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepState {
    Raw,
    Cooked,
    Grilled,
    Fried,
}

impl PrepState {
    /// Parse a caller-supplied state string. Accepts the English names and the
    /// pt-BR forms used by upstream producers. Anything else is treated as
    /// "not declared", never as an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "cru" | "crua" => Some(Self::Raw),
            "cooked" | "cozido" | "cozida" => Some(Self::Cooked),
            "grilled" | "grelhado" | "grelhada" => Some(Self::Grilled),
            "fried" | "frito" | "frita" => Some(Self::Fried),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Cooked => "cooked",
            Self::Grilled => "grilled",
            Self::Fried => "fried",
        }
    }
}

/// Nutrient values per 100 g of edible mass, as stored in the food table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Per100g {
    /// Calories (kcal). Absent rows derive kcal from the macros.
    pub kcal: Option<f64>,
    /// Carbohydrates (g)
    pub carbs_g: f64,
    /// Protein (g)
    pub protein_g: f64,
    /// Fat (g)
    pub fat_g: f64,
    /// Fiber (g)
    #[serde(default)]
    pub fiber_g: f64,
    /// Sodium (mg)
    #[serde(default)]
    pub sodium_mg: f64,
}

impl Per100g {
    /// Stored kcal, or the Atwater derivation `4*carbs + 4*protein + 9*fat`
    /// when the row has none.
    pub fn kcal_or_derived(&self) -> f64 {
        self.kcal
            .unwrap_or(4.0 * self.carbs_g + 4.0 * self.protein_g + 9.0 * self.fat_g)
    }

    /// Scale to an effective edible mass. Strictly linear: `field * grams / 100`.
    pub fn scaled(&self, grams: f64) -> Nutrients {
        let factor = grams / 100.0;
        Nutrients {
            kcal: self.kcal_or_derived() * factor,
            protein_g: self.protein_g * factor,
            fat_g: self.fat_g * factor,
            carbs_g: self.carbs_g * factor,
            fiber_g: self.fiber_g * factor,
            sodium_mg: self.sodium_mg * factor,
        }
    }
}

/// Resolved nutrient quantities for a concrete mass. Unrounded; rounding
/// happens once, at the totals level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub sodium_mg: f64,
}

impl Nutrients {
    pub fn add(&mut self, other: &Nutrients) {
        self.kcal += other.kcal;
        self.protein_g += other.protein_g;
        self.fat_g += other.fat_g;
        self.carbs_g += other.carbs_g;
        self.fiber_g += other.fiber_g;
        self.sodium_mg += other.sodium_mg;
    }
}

/// A row of the canonical food table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFood {
    pub id: FoodId,
    pub name: String,
    /// Preparation state the per-100g values were measured at, when the
    /// store records one.
    pub state: Option<PrepState>,
    pub per100g: Per100g,
}

/// One weighted component of a composite dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeComponent {
    pub food_id: FoodId,
    pub grams: f64,
}

/// A named composite dish. Natural total mass is the sum of component grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub components: Vec<RecipeComponent>,
}

/// Which lookup path produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Alias,
    Canonical,
    Fallback,
    Recipe,
    None,
}

/// A single input item after boundary resolution. The wire format accepts
/// `string | object`; that union is collapsed here, once, so the pipeline
/// never branches on field presence.
#[derive(Debug, Clone, PartialEq)]
pub enum FoodItemInput {
    ByName {
        name: String,
        state: Option<PrepState>,
    },
    ByNameAndMass {
        name: String,
        grams: f64,
        state: Option<PrepState>,
    },
    ByNameAndVolume {
        name: String,
        ml: f64,
        state: Option<PrepState>,
    },
}

impl FoodItemInput {
    pub fn name(&self) -> &str {
        match self {
            Self::ByName { name, .. }
            | Self::ByNameAndMass { name, .. }
            | Self::ByNameAndVolume { name, .. } => name,
        }
    }

    pub fn state(&self) -> Option<PrepState> {
        match self {
            Self::ByName { state, .. }
            | Self::ByNameAndMass { state, .. }
            | Self::ByNameAndVolume { state, .. } => *state,
        }
    }

    pub fn grams(&self) -> Option<f64> {
        match self {
            Self::ByNameAndMass { grams, .. } => Some(*grams),
            _ => None,
        }
    }
}

/// Wire shape of one request item: either a bare name or a detail object.
/// Field aliases cover the pt-BR producers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawItem {
    Name(String),
    Detailed {
        #[serde(alias = "nome")]
        name: String,
        #[serde(default, alias = "quantidade")]
        grams: Option<Value>,
        #[serde(default, alias = "volume_ml")]
        ml: Option<Value>,
        #[serde(default)]
        state: Option<String>,
    },
}

impl RawItem {
    /// Collapse the union into the tagged input type. Malformed quantities
    /// (non-numeric, non-finite, zero or negative) are treated as absent.
    /// When both grams and ml are present, grams wins.
    pub fn into_input(self) -> FoodItemInput {
        match self {
            RawItem::Name(name) => FoodItemInput::ByName { name, state: None },
            RawItem::Detailed {
                name,
                grams,
                ml,
                state,
            } => {
                let state = state.as_deref().and_then(PrepState::parse);
                if let Some(g) = grams.as_ref().and_then(positive_number) {
                    FoodItemInput::ByNameAndMass {
                        name,
                        grams: g,
                        state,
                    }
                } else if let Some(v) = ml.as_ref().and_then(positive_number) {
                    FoodItemInput::ByNameAndVolume { name, ml: v, state }
                } else {
                    FoodItemInput::ByName { name, state }
                }
            }
        }
    }
}

fn positive_number(v: &Value) -> Option<f64> {
    let n = v
        .as_f64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))?;
    (n.is_finite() && n > 0.0).then_some(n)
}

/// Top-level request.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub items: Vec<RawItem>,
    #[serde(default)]
    pub debug: bool,
}

/// One resolved input item, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedItem {
    pub input_name: String,
    pub canonical_name: Option<String>,
    pub match_kind: MatchKind,
    /// Effective edible mass in grams. Zero only for unmatched items.
    pub grams_effective: f64,
    pub kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub sodium_mg: f64,
    pub notes: Vec<String>,
}

impl ResolvedItem {
    pub fn unmatched(input_name: String) -> Self {
        Self {
            input_name,
            canonical_name: None,
            match_kind: MatchKind::None,
            grams_effective: 0.0,
            kcal: 0.0,
            protein_g: 0.0,
            fat_g: 0.0,
            carbs_g: 0.0,
            fiber_g: 0.0,
            sodium_mg: 0.0,
            notes: Vec::new(),
        }
    }

    pub fn nutrients(&self) -> Nutrients {
        Nutrients {
            kcal: self.kcal,
            protein_g: self.protein_g,
            fat_g: self.fat_g,
            carbs_g: self.carbs_g,
            fiber_g: self.fiber_g,
            sodium_mg: self.sodium_mg,
        }
    }
}

/// Aggregate totals, rounded once: grams to one decimal, kcal and sodium to
/// the nearest integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sodium_mg: f64,
}

/// An input item no lookup path matched.
#[derive(Debug, Clone, Serialize)]
pub struct Unmatched {
    pub input_name: String,
    pub reason: String,
}

/// Debug trace: what the normalizer did, which lookup path matched each
/// item, and which conversion factors were applied.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugTrace {
    pub normalization: Vec<NormalizationStep>,
    pub lookups: Vec<LookupStep>,
    pub conversions: Vec<ConversionStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationStep {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupStep {
    pub input: String,
    pub matched_by: MatchKind,
    pub food_id: Option<FoodId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionStep {
    pub input: String,
    pub kind: String,
    pub factor: f64,
}

/// The assembled analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct MealReport {
    pub success: bool,
    pub items_detailed: Vec<ResolvedItem>,
    pub totals: Totals,
    pub summary_text: String,
    pub meal_score: u32,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub unmatched: Vec<Unmatched>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}
