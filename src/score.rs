use crate::models::Totals;

const KCAL_HIGH: f64 = 900.0;
const KCAL_LOW: f64 = 300.0;
const FIBER_LOW_G: f64 = 5.0;
const SODIUM_HIGH_MG: f64 = 1200.0;
const PROTEIN_PER_KCAL_LOW: f64 = 0.10;
const FAT_HIGH_G: f64 = 35.0;
const CARBS_HIGH_G: f64 = 120.0;

const PENALTY_KCAL_HIGH: u32 = 15;
const PENALTY_KCAL_LOW: u32 = 10;
const PENALTY_FIBER_LOW: u32 = 15;
const PENALTY_SODIUM_HIGH: u32 = 20;
const PENALTY_PROTEIN_LOW: u32 = 20;

/// Meal quality assessment derived from aggregate totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// 0-100; starts at 100, penalties are independent and additive.
    pub score: u32,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Assessment {
    /// An empty meal has nothing to warn about.
    pub fn empty_meal() -> Self {
        Self {
            score: 100,
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Evaluate the fixed rule table against rounded totals.
pub fn assess(totals: &Totals) -> Assessment {
    let mut warnings = Vec::new();
    let mut suggestions = Vec::new();
    let mut penalty: u32 = 0;

    if totals.kcal > KCAL_HIGH {
        warnings.push("calories elevated".to_string());
        penalty += PENALTY_KCAL_HIGH;
    }
    if totals.kcal < KCAL_LOW {
        warnings.push("calories very low".to_string());
        penalty += PENALTY_KCAL_LOW;
    }
    if totals.fiber_g < FIBER_LOW_G {
        warnings.push("low fiber".to_string());
        penalty += PENALTY_FIBER_LOW;
        suggestions.push("add vegetables or whole grains to raise fiber".to_string());
    }
    if totals.sodium_mg > SODIUM_HIGH_MG {
        warnings.push("sodium elevated".to_string());
        penalty += PENALTY_SODIUM_HIGH;
        suggestions.push("reduce salt and processed sauces".to_string());
    }
    if totals.protein_g / totals.kcal.max(1.0) < PROTEIN_PER_KCAL_LOW {
        warnings.push("low protein density".to_string());
        penalty += PENALTY_PROTEIN_LOW;
    }
    if totals.fat_g > FAT_HIGH_G {
        suggestions.push("prefer grilled or baked preparations".to_string());
    }
    if totals.carbs_g > CARBS_HIGH_G {
        suggestions.push("swap part of the refined carbs for whole-grain versions".to_string());
    }

    Assessment {
        score: 100u32.saturating_sub(penalty),
        warnings,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A totals profile that trips no rule.
    fn balanced() -> Totals {
        Totals {
            kcal: 600.0,
            protein_g: 70.0,
            carbs_g: 60.0,
            fat_g: 15.0,
            fiber_g: 8.0,
            sodium_mg: 400.0,
        }
    }

    #[test]
    fn balanced_meal_scores_100() {
        let a = assess(&balanced());
        assert_eq!(a.score, 100);
        assert!(a.warnings.is_empty());
        assert!(a.suggestions.is_empty());
    }

    #[test]
    fn sodium_rule_costs_exactly_20() {
        let mut t = balanced();
        t.sodium_mg = 1500.0;
        let a = assess(&t);
        assert_eq!(a.score, 80);
        assert!(a.warnings.iter().any(|w| w.contains("sodium")));
        assert!(a.suggestions.iter().any(|s| s.contains("salt")));

        t.sodium_mg = 1200.0;
        assert_eq!(assess(&t).score, 100);
    }

    #[test]
    fn penalties_are_additive() {
        let t = Totals {
            kcal: 950.0,
            protein_g: 200.0,
            carbs_g: 60.0,
            fat_g: 15.0,
            fiber_g: 2.0,
            sodium_mg: 1300.0,
        };
        // kcal high (15) + low fiber (15) + sodium (20).
        let a = assess(&t);
        assert_eq!(a.score, 50);
        assert_eq!(a.warnings.len(), 3);
    }

    #[test]
    fn low_protein_density_is_relative_to_kcal() {
        let mut t = balanced();
        t.protein_g = 30.0; // 30 / 600 = 0.05 < 0.10
        let a = assess(&t);
        assert!(a.warnings.iter().any(|w| w.contains("protein")));
        assert_eq!(a.score, 80);
    }

    #[test]
    fn fat_and_carbs_only_suggest() {
        let mut t = balanced();
        t.fat_g = 40.0;
        t.carbs_g = 130.0;
        let a = assess(&t);
        assert_eq!(a.score, 100);
        assert_eq!(a.suggestions.len(), 2);
    }

    #[test]
    fn zero_totals_stay_in_bounds() {
        let a = assess(&Totals::default());
        // kcal very low + low fiber + low protein density.
        assert_eq!(a.score, 55);
        assert!(a.score <= 100);
    }

    #[test]
    fn empty_meal_is_perfect() {
        let a = Assessment::empty_meal();
        assert_eq!(a.score, 100);
        assert!(a.warnings.is_empty());
    }
}
