//! Outcome comparison between original and whale-adjusted scores.

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{ComparisonResult, Proposal, VotingScheme};

/// Index of the highest score. Ties resolve to the first maximal index.
pub fn winner_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }

    best.map(|(i, _)| i)
}

/// Per-choice difference `original[i] - adjusted[i]`.
pub fn score_deltas(original: &[f64], adjusted: &[f64]) -> Vec<f64> {
    original
        .iter()
        .zip(adjusted)
        .map(|(before, after)| before - after)
        .collect()
}

/// Share of the proposal's total voting power that came from whales.
///
/// Approval deltas overlap across choices, so the first choice's delta
/// stands in for whale power there. Returns `None` when the total is zero.
pub fn whale_vp_proportion(
    scheme: &VotingScheme,
    deltas: &[f64],
    total_voting_power: f64,
) -> Option<f64> {
    if total_voting_power == 0.0 || !total_voting_power.is_finite() {
        return None;
    }

    let whale_power = match scheme {
        VotingScheme::Approval => *deltas.first()?,
        _ => deltas.iter().sum(),
    };

    Some(whale_power / total_voting_power)
}

/// Compare `original` against its whale-adjusted scores.
pub fn compare(original: &Proposal, adjusted_scores: &[f64]) -> AnalysisResult<ComparisonResult> {
    if original.choice_labels.is_empty() {
        return Err(AnalysisError::EmptyChoiceSet(original.id.clone()));
    }

    let choices = original.choice_labels.len();
    if original.scores.len() != choices || adjusted_scores.len() != choices {
        return Err(AnalysisError::InvalidVoteData(format!(
            "proposal {} has {} choices but {} original and {} adjusted scores",
            original.id,
            choices,
            original.scores.len(),
            adjusted_scores.len()
        )));
    }

    let empty = || AnalysisError::EmptyChoiceSet(original.id.clone());
    let original_winner_index = winner_index(&original.scores).ok_or_else(empty)?;
    let adjusted_winner_index = winner_index(adjusted_scores).ok_or_else(empty)?;

    let deltas = score_deltas(&original.scores, adjusted_scores);
    let proportion = whale_vp_proportion(
        &original.voting_scheme,
        &deltas,
        original.total_voting_power,
    );

    Ok(ComparisonResult {
        proposal_id: original.id.clone(),
        title: original.title.clone(),
        start: original.start_time(),
        end: original.end_time(),
        original_winner_index,
        adjusted_winner_index,
        original_winner_label: original.choice_labels[original_winner_index].clone(),
        adjusted_winner_label: original.choice_labels[adjusted_winner_index].clone(),
        outcome_changed: original_winner_index != adjusted_winner_index,
        score_deltas: deltas,
        whale_vp_proportion: proportion,
        total_voting_power: original.total_voting_power,
        voter_count: original.votes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn proposal(scheme: VotingScheme, scores: Vec<f64>, total: f64) -> Proposal {
        Proposal {
            id: "0xprop".to_string(),
            title: Some("Test proposal".to_string()),
            start: None,
            end: None,
            voting_scheme: scheme,
            choice_labels: (0..scores.len()).map(|i| format!("Option {}", i)).collect(),
            scores,
            total_voting_power: total,
            votes: Vec::new(),
        }
    }

    #[test]
    fn test_winner_ties_resolve_to_first() {
        assert_eq!(winner_index(&[50.0, 50.0]), Some(0));
        assert_eq!(winner_index(&[10.0, 30.0, 30.0]), Some(1));
        assert_eq!(winner_index(&[]), None);
    }

    #[test]
    fn test_outcome_changed() {
        let p = proposal(VotingScheme::SingleChoice, vec![40.0, 60.0], 100.0);
        let result = compare(&p, &[40.0, 20.0]).unwrap();

        assert_eq!(result.original_winner_index, 1);
        assert_eq!(result.adjusted_winner_index, 0);
        assert!(result.outcome_changed);
        assert_eq!(result.score_deltas, vec![0.0, 40.0]);
        assert_eq!(result.whale_vp_proportion, Some(0.4));
        assert_eq!(result.original_winner_label, "Option 1");
        assert_eq!(result.adjusted_winner_label, "Option 0");
    }

    #[test]
    fn test_outcome_unchanged() {
        let p = proposal(VotingScheme::Weighted, vec![100.0, 80.0], 180.0);
        let result = compare(&p, &[95.0, 75.0]).unwrap();

        assert!(!result.outcome_changed);
        assert_eq!(result.original_winner_index, result.adjusted_winner_index);
    }

    #[test]
    fn test_approval_uses_first_delta() {
        let p = proposal(VotingScheme::Approval, vec![50.0, 30.0], 60.0);
        let result = compare(&p, &[40.0, 20.0]).unwrap();

        assert_eq!(result.score_deltas, vec![10.0, 10.0]);
        let proportion = result.whale_vp_proportion.unwrap();
        assert!((proportion - 10.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_total_power_is_unknown() {
        let p = proposal(VotingScheme::SingleChoice, vec![0.0, 0.0], 0.0);
        let result = compare(&p, &[0.0, 0.0]).unwrap();

        assert_eq!(result.whale_vp_proportion, None);
        assert_eq!(result.original_winner_index, 0);
    }

    #[test]
    fn test_empty_choice_set() {
        let p = proposal(VotingScheme::SingleChoice, vec![], 10.0);
        assert_eq!(
            compare(&p, &[]),
            Err(AnalysisError::EmptyChoiceSet("0xprop".to_string()))
        );
    }

    #[test]
    fn test_length_mismatch() {
        let p = proposal(VotingScheme::SingleChoice, vec![1.0, 2.0], 3.0);
        assert!(matches!(
            compare(&p, &[1.0]),
            Err(AnalysisError::InvalidVoteData(_))
        ));
    }
}
