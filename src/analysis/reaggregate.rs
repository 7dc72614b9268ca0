//! Vote reaggregation without whales.
//!
//! Each voting scheme removes a whale's power from the tallied scores in its
//! own way. The strategies never touch the proposal: they work on an owned
//! copy of its score vector and return it.

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{ChoiceSelector, Proposal, Vote, VotingScheme};
use std::collections::BTreeMap;

/// Reaggregation strategy, one per supported voting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaggregator {
    /// Single-choice and basic proposals: a vote backs exactly one choice.
    SingleChoice,
    /// A vote backs every approved choice with its full power.
    Approval,
    /// A vote splits its power by normalized weights.
    Weighted,
}

impl Reaggregator {
    /// Pick the strategy for a voting scheme.
    pub fn for_scheme(scheme: &VotingScheme) -> AnalysisResult<Self> {
        match scheme {
            VotingScheme::SingleChoice | VotingScheme::Basic => Ok(Reaggregator::SingleChoice),
            VotingScheme::Approval => Ok(Reaggregator::Approval),
            VotingScheme::Weighted => Ok(Reaggregator::Weighted),
            VotingScheme::Other(name) => {
                Err(AnalysisError::UnsupportedVotingScheme(name.clone()))
            }
        }
    }

    /// Return `proposal.scores` with the contributions of `whales` removed.
    pub fn reaggregate(&self, proposal: &Proposal, whales: &[Vote]) -> AnalysisResult<Vec<f64>> {
        let mut scores = proposal.scores.clone();

        for whale in whales {
            for (index, amount) in self.contribution(whale, scores.len())? {
                scores[index] -= amount;
            }
        }

        Ok(scores)
    }

    /// Per-choice power a vote added to the tally, as `(0-based index, amount)`.
    fn contribution(&self, vote: &Vote, choices: usize) -> AnalysisResult<Vec<(usize, f64)>> {
        match self {
            Reaggregator::SingleChoice => {
                let choice = single_choice_index(vote)?;
                Ok(vec![(to_index(choice, choices, vote)?, vote.voting_power)])
            }
            Reaggregator::Approval => {
                let ChoiceSelector::Approval(approved) = &vote.choice else {
                    return Err(mismatch(vote, "a list of approved choices"));
                };
                approved
                    .iter()
                    .map(|&choice| {
                        to_index(choice, choices, vote).map(|index| (index, vote.voting_power))
                    })
                    .collect()
            }
            Reaggregator::Weighted => {
                let ChoiceSelector::Weighted(weights) = &vote.choice else {
                    return Err(mismatch(vote, "a map of choice weights"));
                };
                weighted_shares(vote, weights, choices)
            }
        }
    }
}

/// Reaggregate `proposal` without `whales` using its scheme's strategy.
pub fn reaggregate(proposal: &Proposal, whales: &[Vote]) -> AnalysisResult<Vec<f64>> {
    Reaggregator::for_scheme(&proposal.voting_scheme)?.reaggregate(proposal, whales)
}

/// Resolve the chosen index of a single-choice vote.
///
/// Some sources hand single-choice votes over as a one-entry map; its only
/// value is the choice.
fn single_choice_index(vote: &Vote) -> AnalysisResult<usize> {
    match &vote.choice {
        ChoiceSelector::Single(choice) => Ok(*choice),
        ChoiceSelector::Weighted(map) if map.len() == 1 => {
            let value = map.values().next().copied().unwrap_or(f64::NAN);
            if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
                Ok(value as usize)
            } else {
                Err(AnalysisError::InvalidVoteData(format!(
                    "vote by {} has non-integer choice {}",
                    vote.voter, value
                )))
            }
        }
        _ => Err(mismatch(vote, "a single choice")),
    }
}

fn weighted_shares(
    vote: &Vote,
    weights: &BTreeMap<String, f64>,
    choices: usize,
) -> AnalysisResult<Vec<(usize, f64)>> {
    let mut parsed = Vec::with_capacity(weights.len());
    for (key, &weight) in weights {
        let choice: usize = key.trim().parse().map_err(|_| {
            AnalysisError::InvalidVoteData(format!(
                "vote by {} has non-numeric choice key '{}'",
                vote.voter, key
            ))
        })?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(AnalysisError::InvalidVoteData(format!(
                "vote by {} has invalid weight {} for choice {}",
                vote.voter, weight, choice
            )));
        }
        parsed.push((to_index(choice, choices, vote)?, weight));
    }

    let total: f64 = parsed.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Err(AnalysisError::InvalidVoteData(format!(
            "vote by {} has weights summing to zero",
            vote.voter
        )));
    }

    Ok(parsed
        .into_iter()
        .map(|(index, weight)| (index, weight / total * vote.voting_power))
        .collect())
}

/// Convert a 1-based choice into a checked 0-based index.
fn to_index(choice: usize, choices: usize, vote: &Vote) -> AnalysisResult<usize> {
    if choice == 0 || choice > choices {
        return Err(AnalysisError::InvalidVoteData(format!(
            "vote by {} selects choice {} of {}",
            vote.voter, choice, choices
        )));
    }
    Ok(choice - 1)
}

fn mismatch(vote: &Vote, expected: &str) -> AnalysisError {
    AnalysisError::InvalidVoteData(format!(
        "vote by {} should carry {}, got {:?}",
        vote.voter, expected, vote.choice
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn proposal(scheme: VotingScheme, scores: Vec<f64>) -> Proposal {
        Proposal {
            id: "0xprop".to_string(),
            title: None,
            start: None,
            end: None,
            voting_scheme: scheme,
            choice_labels: (1..=scores.len()).map(|i| format!("Choice {}", i)).collect(),
            total_voting_power: scores.iter().sum(),
            scores,
            votes: Vec::new(),
        }
    }

    fn vote(choice: ChoiceSelector, voting_power: f64) -> Vote {
        Vote {
            voter: "0xwhale".to_string(),
            choice,
            voting_power,
        }
    }

    fn weights(entries: &[(&str, f64)]) -> ChoiceSelector {
        ChoiceSelector::Weighted(
            entries
                .iter()
                .map(|(k, w)| (k.to_string(), *w))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_single_choice() {
        let p = proposal(VotingScheme::SingleChoice, vec![20.0, 40.0, 10.0]);
        let whales = vec![vote(ChoiceSelector::Single(2), 15.0)];
        assert_eq!(reaggregate(&p, &whales).unwrap(), vec![20.0, 25.0, 10.0]);
    }

    #[test]
    fn test_basic_accumulates_whales_on_same_choice() {
        let p = proposal(VotingScheme::Basic, vec![50.0, 30.0, 20.0]);
        let whales = vec![
            vote(ChoiceSelector::Single(1), 10.0),
            vote(ChoiceSelector::Single(1), 15.0),
            vote(ChoiceSelector::Single(3), 5.0),
        ];
        assert_eq!(reaggregate(&p, &whales).unwrap(), vec![25.0, 30.0, 15.0]);
    }

    #[test]
    fn test_single_choice_from_one_entry_map() {
        let p = proposal(VotingScheme::SingleChoice, vec![20.0, 40.0]);
        let whales = vec![vote(weights(&[("0", 2.0)]), 15.0)];
        assert_eq!(reaggregate(&p, &whales).unwrap(), vec![20.0, 25.0]);
    }

    #[test]
    fn test_approval_subtracts_full_power() {
        let p = proposal(VotingScheme::Approval, vec![50.0, 30.0]);
        let whales = vec![vote(ChoiceSelector::Approval(vec![1, 2]), 10.0)];
        assert_eq!(reaggregate(&p, &whales).unwrap(), vec![40.0, 20.0]);
    }

    #[test]
    fn test_weighted_normalizes() {
        let p = proposal(VotingScheme::Weighted, vec![100.0, 80.0]);
        let whales = vec![vote(weights(&[("1", 2.0), ("2", 2.0)]), 10.0)];
        assert_eq!(reaggregate(&p, &whales).unwrap(), vec![95.0, 75.0]);
    }

    #[test]
    fn test_weighted_partial_choices() {
        let p = proposal(VotingScheme::Weighted, vec![100.0, 80.0, 60.0]);
        let whales = vec![vote(weights(&[("1", 3.0), ("3", 1.0)]), 20.0)];
        assert_eq!(reaggregate(&p, &whales).unwrap(), vec![85.0, 80.0, 55.0]);
    }

    #[test]
    fn test_weighted_zero_sum_is_invalid() {
        let p = proposal(VotingScheme::Weighted, vec![100.0, 80.0]);
        let whales = vec![vote(weights(&[("1", 0.0), ("2", 0.0)]), 10.0)];
        assert!(matches!(
            reaggregate(&p, &whales),
            Err(AnalysisError::InvalidVoteData(_))
        ));
    }

    #[test]
    fn test_empty_whales_keep_scores() {
        for scheme in [
            VotingScheme::SingleChoice,
            VotingScheme::Basic,
            VotingScheme::Approval,
            VotingScheme::Weighted,
        ] {
            let p = proposal(scheme, vec![12.5, 7.0, 0.5]);
            assert_eq!(reaggregate(&p, &[]).unwrap(), p.scores);
        }
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let p = proposal(VotingScheme::Approval, vec![50.0, 30.0, 20.0]);
        let whales = vec![
            vote(ChoiceSelector::Approval(vec![1, 3]), 5.0),
            vote(ChoiceSelector::Approval(vec![2]), 7.0),
        ];

        let first = reaggregate(&p, &whales).unwrap();
        let second = reaggregate(&p, &whales).unwrap();
        assert_eq!(first, second);
        assert_eq!(p.scores, vec![50.0, 30.0, 20.0]);
    }

    #[test]
    fn test_unsupported_scheme() {
        let p = proposal(VotingScheme::Other("quadratic".to_string()), vec![1.0]);
        assert_eq!(
            reaggregate(&p, &[]),
            Err(AnalysisError::UnsupportedVotingScheme("quadratic".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_choice() {
        let p = proposal(VotingScheme::SingleChoice, vec![1.0, 2.0]);
        for choice in [0, 3] {
            let whales = vec![vote(ChoiceSelector::Single(choice), 1.0)];
            assert!(matches!(
                reaggregate(&p, &whales),
                Err(AnalysisError::InvalidVoteData(_))
            ));
        }
    }

    #[test]
    fn test_selector_mismatch() {
        let p = proposal(VotingScheme::Approval, vec![1.0, 2.0]);
        let whales = vec![vote(ChoiceSelector::Single(1), 1.0)];
        assert!(matches!(
            reaggregate(&p, &whales),
            Err(AnalysisError::InvalidVoteData(_))
        ));
    }
}
