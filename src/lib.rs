//! Deterministic nutrient resolution and aggregation over a read-only
//! food-composition store: free-text item lists in, per-item nutrient
//! detail, aggregate totals and a meal quality assessment out.

pub mod aggregate;
pub mod convert;
pub mod engine;
pub mod expand;
pub mod fallback;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod score;
pub mod store;

pub use engine::{Engine, EngineOptions};
pub use models::{AnalysisRequest, MealReport};
pub use store::{MemoryStore, NutrientStore, RestStore};
