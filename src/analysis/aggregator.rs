//! Cross-organization aggregation and ordering.
//!
//! This module provides utilities for ranking proposal comparisons and
//! tallying organization reports for the final report.

use crate::error::SkipKind;
use crate::models::{ComparisonResult, OrganizationReport};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sort comparisons by whale voting-power share, then total voting power,
/// both descending. Unknown shares go last.
pub fn sort_by_whale_influence(comparisons: &mut [ComparisonResult]) {
    comparisons.sort_by(|a, b| {
        match (a.whale_vp_proportion, b.whale_vp_proportion) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| {
            b.total_voting_power
                .partial_cmp(&a.total_voting_power)
                .unwrap_or(Ordering::Equal)
        })
    });
}

/// Comparisons whose winning choice changed without whales.
pub fn changed_outcomes(comparisons: &[ComparisonResult]) -> Vec<&ComparisonResult> {
    comparisons.iter().filter(|c| c.outcome_changed).collect()
}

/// Total compared and skipped proposals across organizations.
pub fn proposal_totals(reports: &[OrganizationReport]) -> (usize, usize) {
    reports.iter().fold((0, 0), |(compared, skipped), r| {
        (
            compared + r.summary.proposals_compared,
            skipped + r.summary.proposals_skipped,
        )
    })
}

/// Count skipped proposals by reason across organizations.
pub fn skip_breakdown(reports: &[OrganizationReport]) -> BTreeMap<SkipKind, usize> {
    let mut breakdown = BTreeMap::new();

    for skipped in reports.iter().flat_map(|r| &r.skipped) {
        *breakdown.entry(skipped.kind).or_insert(0) += 1;
    }

    breakdown
}

/// Organizations ranked by changed-outcome proportion (highest first).
pub fn most_whale_decided(reports: &[OrganizationReport], n: usize) -> Vec<&OrganizationReport> {
    let mut ranked: Vec<&OrganizationReport> = reports
        .iter()
        .filter(|r| r.summary.proposals_compared > 0)
        .collect();

    ranked.sort_by(|a, b| {
        b.summary
            .changed_outcome_proportion
            .partial_cmp(&a.summary.changed_outcome_proportion)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(n);

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrganizationSummary, RunState, SkippedProposal};
    use crate::error::AnalysisError;

    fn comparison(id: &str, proportion: Option<f64>, total: f64, changed: bool) -> ComparisonResult {
        ComparisonResult {
            proposal_id: id.to_string(),
            title: None,
            start: None,
            end: None,
            original_winner_index: 0,
            adjusted_winner_index: if changed { 1 } else { 0 },
            original_winner_label: "Yes".to_string(),
            adjusted_winner_label: if changed { "No" } else { "Yes" }.to_string(),
            outcome_changed: changed,
            score_deltas: vec![0.0, 0.0],
            whale_vp_proportion: proportion,
            total_voting_power: total,
            voter_count: 3,
        }
    }

    fn report(name: &str, changed: f64, compared: usize, skipped: Vec<SkippedProposal>) -> OrganizationReport {
        OrganizationReport {
            summary: OrganizationSummary {
                organization_name: name.to_string(),
                whale_count_delta: 1,
                total_voters: 10,
                whale_to_voter_ratio: Some(0.1),
                mean_voting_power_filtered: Some(1.0),
                mean_voting_power_whales: Some(50.0),
                changed_outcome_proportion: changed,
                proposals_compared: compared,
                proposals_skipped: skipped.len(),
            },
            state: RunState::Summarized,
            comparisons: Vec::new(),
            skipped,
            filtered: Vec::new(),
        }
    }

    #[test]
    fn test_sort_by_whale_influence() {
        let mut comparisons = vec![
            comparison("low", Some(0.1), 500.0, false),
            comparison("unknown", None, 900.0, false),
            comparison("high-small", Some(0.8), 10.0, true),
            comparison("high-large", Some(0.8), 1000.0, true),
        ];

        sort_by_whale_influence(&mut comparisons);

        let ids: Vec<_> = comparisons.iter().map(|c| c.proposal_id.as_str()).collect();
        assert_eq!(ids, vec!["high-large", "high-small", "low", "unknown"]);
    }

    #[test]
    fn test_changed_outcomes() {
        let comparisons = vec![
            comparison("a", Some(0.5), 1.0, true),
            comparison("b", Some(0.5), 1.0, false),
        ];
        let changed = changed_outcomes(&comparisons);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].proposal_id, "a");
    }

    #[test]
    fn test_totals_and_breakdown() {
        let unsupported = AnalysisError::UnsupportedVotingScheme("quadratic".to_string());
        let missing = AnalysisError::MissingCounterpart("0x9".to_string());
        let reports = vec![
            report("A", 0.5, 4, vec![SkippedProposal::new("0x1", &unsupported)]),
            report(
                "B",
                0.0,
                2,
                vec![
                    SkippedProposal::new("0x2", &unsupported),
                    SkippedProposal::new("0x9", &missing),
                ],
            ),
        ];

        assert_eq!(proposal_totals(&reports), (6, 3));

        let breakdown = skip_breakdown(&reports);
        assert_eq!(breakdown.get(&SkipKind::UnsupportedVotingScheme), Some(&2));
        assert_eq!(breakdown.get(&SkipKind::MissingCounterpart), Some(&1));
    }

    #[test]
    fn test_most_whale_decided() {
        let reports = vec![
            report("A", 0.1, 4, Vec::new()),
            report("B", 0.6, 2, Vec::new()),
            report("C", 0.9, 0, Vec::new()),
            report("D", 0.3, 5, Vec::new()),
        ];

        let top: Vec<_> = most_whale_decided(&reports, 2)
            .into_iter()
            .map(|r| r.summary.organization_name.as_str())
            .collect();
        assert_eq!(top, vec!["B", "D"]);
    }
}
