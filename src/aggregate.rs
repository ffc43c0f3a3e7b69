use crate::models::{Nutrients, ResolvedItem, Totals};

/// Sum every resolved item's nutrients and round once, at the total level.
/// Per-item values stay unrounded so rounding error never compounds.
pub fn totals(items: &[ResolvedItem]) -> Totals {
    let mut sum = Nutrients::default();
    for item in items {
        sum.add(&item.nutrients());
    }
    Totals {
        kcal: round_int(sum.kcal),
        protein_g: round_tenth(sum.protein_g),
        carbs_g: round_tenth(sum.carbs_g),
        fat_g: round_tenth(sum.fat_g),
        fiber_g: round_tenth(sum.fiber_g),
        sodium_mg: round_int(sum.sodium_mg),
    }
}

fn round_int(v: f64) -> f64 {
    v.round()
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
