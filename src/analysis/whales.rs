//! Whale selection by voting-power quantile.

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::Vote;

/// Default quantile at and above which voters count as whales.
pub const DEFAULT_WHALE_QUANTILE: f64 = 0.95;

/// Reject quantiles outside the open interval (0, 1).
pub fn validate_quantile(quantile: f64) -> AnalysisResult<()> {
    if quantile > 0.0 && quantile < 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidParameter(format!(
            "quantile must be in (0, 1), got {}",
            quantile
        )))
    }
}

/// Linearly interpolated quantile of `values`.
///
/// Uses the closest-ranks definition `h = (n - 1) * q`, interpolating between
/// the values at `floor(h)` and `floor(h) + 1`. `q` is clamped to [0, 1].
/// Returns `None` for an empty slice.
fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = h - lower as f64;

    Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
}

/// Voting power threshold for whales among `votes`.
pub fn whale_threshold(votes: &[Vote], q: f64) -> AnalysisResult<Option<f64>> {
    validate_quantile(q)?;
    let powers: Vec<f64> = votes.iter().map(|v| v.voting_power).collect();
    Ok(quantile(&powers, q))
}

/// Whales of a vote set and the threshold they were selected at.
#[derive(Debug, Clone, PartialEq)]
pub struct WhaleSelection {
    /// `None` when there were no votes.
    pub threshold: Option<f64>,
    pub whales: Vec<Vote>,
}

/// Select every vote whose voting power is at or above the `q` quantile.
pub fn select_whales(votes: &[Vote], q: f64) -> AnalysisResult<WhaleSelection> {
    let threshold = whale_threshold(votes, q)?;

    let whales = match threshold {
        Some(threshold) => votes
            .iter()
            .filter(|v| v.voting_power >= threshold)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    Ok(WhaleSelection { threshold, whales })
}
