use crate::core::{Category, RiskScores};
use crate::signals::thresholds::CategoryWeights;

/// Weighted overall score (0-100) from the seven category scores.
pub fn compute_overall(scores: &RiskScores, weights: &CategoryWeights) -> f64 {
    Category::ALL
        .iter()
        .map(|c| scores.score(*c) * weights.weight(*c))
        .sum::<f64>()
        .clamp(0.0, 100.0)
}

/// Score reliability from the number of readings behind it.
pub fn confidence(reading_count: usize) -> f64 {
    match reading_count {
        0..100 => 0.5,
        100..500 => 0.7,
        500..1000 => 0.85,
        _ => 0.95,
    }
}
