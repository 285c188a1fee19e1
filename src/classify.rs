use crate::models::Classification;

pub const WEAK_BELOW: f64 = 50.0;
pub const EXCELLENT_FROM: f64 = 90.0;

/// Mean of the scores that are present; `None` when every score is missing.
pub fn mean_of_present(scores: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = scores.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// The end-of-term score decides the tier when present, otherwise the
/// cross-period average does.
///
/// | Base        | Tier      |
/// |-------------|-----------|
/// | missing     | no-data   |
/// | < 50        | weak      |
/// | >= 90       | excellent |
/// | otherwise   | average   |
pub fn classify(end_of_term: Option<f64>, average_score: Option<f64>) -> Classification {
    let base = end_of_term.or(average_score);
    match base {
        None => Classification::NoData,
        Some(b) if b < WEAK_BELOW => Classification::Weak,
        Some(b) if b >= EXCELLENT_FROM => Classification::Excellent,
        Some(_) => Classification::Average,
    }
}
