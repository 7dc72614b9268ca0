//! Data models for the whale analysis.
//!
//! This module contains the normalized governance records consumed by the
//! engine and the comparison and summary structures it produces.

use crate::error::{AnalysisError, AnalysisResult, SkipKind};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Rule set governing how a vote's power is distributed among choices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VotingScheme {
    SingleChoice,
    Basic,
    Approval,
    Weighted,
    /// Any scheme the engine cannot reaggregate (quadratic, ranked-choice, ...).
    Other(String),
}

impl From<String> for VotingScheme {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "single-choice" | "single_choice" => VotingScheme::SingleChoice,
            "basic" => VotingScheme::Basic,
            "approval" => VotingScheme::Approval,
            "weighted" => VotingScheme::Weighted,
            _ => VotingScheme::Other(s),
        }
    }
}

impl From<VotingScheme> for String {
    fn from(scheme: VotingScheme) -> Self {
        scheme.to_string()
    }
}

impl fmt::Display for VotingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotingScheme::SingleChoice => write!(f, "single-choice"),
            VotingScheme::Basic => write!(f, "basic"),
            VotingScheme::Approval => write!(f, "approval"),
            VotingScheme::Weighted => write!(f, "weighted"),
            VotingScheme::Other(s) => write!(f, "{}", s),
        }
    }
}

/// The choice a voter made, shaped by the proposal's voting scheme.
///
/// All indices are 1-based. Weighted map keys arrive as strings from the
/// upstream JSON and are parsed when the vote is reaggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceSelector {
    Single(usize),
    Approval(Vec<usize>),
    Weighted(BTreeMap<String, f64>),
}

/// A single vote cast on a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Voter address.
    pub voter: String,
    /// Selected choice(s).
    pub choice: ChoiceSelector,
    /// Voting power behind the vote.
    #[serde(alias = "vp")]
    pub voting_power: f64,
}

/// A governance proposal with its tallied scores and individual votes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Voting start, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Voting end, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(alias = "type")]
    pub voting_scheme: VotingScheme,
    #[serde(alias = "choices")]
    pub choice_labels: Vec<String>,
    pub scores: Vec<f64>,
    #[serde(alias = "scores_total")]
    pub total_voting_power: f64,
    #[serde(default)]
    pub votes: Vec<Vote>,
}

impl Proposal {
    /// Check the structural invariants the engine relies on.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.choice_labels.is_empty() {
            return Err(AnalysisError::EmptyChoiceSet(self.id.clone()));
        }

        if self.scores.len() != self.choice_labels.len() {
            return Err(AnalysisError::InvalidVoteData(format!(
                "proposal {} has {} scores for {} choices",
                self.id,
                self.scores.len(),
                self.choice_labels.len()
            )));
        }

        if self.scores.iter().any(|s| !s.is_finite()) {
            return Err(AnalysisError::InvalidVoteData(format!(
                "proposal {} has a non-finite score",
                self.id
            )));
        }

        if let Some(vote) = self
            .votes
            .iter()
            .find(|v| !v.voting_power.is_finite() || v.voting_power < 0.0)
        {
            return Err(AnalysisError::InvalidVoteData(format!(
                "vote by {} on {} has invalid voting power {}",
                vote.voter, self.id, vote.voting_power
            )));
        }

        Ok(())
    }

    /// Voting start as a timestamp.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start.and_then(|s| Utc.timestamp_opt(s, 0).single())
    }

    /// Voting end as a timestamp.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end.and_then(|s| Utc.timestamp_opt(s, 0).single())
    }
}

/// An organization (DAO) and its proposals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
}

/// The normalized input dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

/// A proposal's scores after whale contributions were removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredProposal {
    pub organization: String,
    pub proposal_id: String,
    /// Quantile the whales were selected at.
    pub quantile: f64,
    /// Voting power threshold; `None` when the proposal had no votes.
    pub threshold: Option<f64>,
    /// Addresses classified as whales.
    pub whale_voters: BTreeSet<String>,
    pub adjusted_scores: Vec<f64>,
}

/// Outcome of comparing original and whale-adjusted scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub proposal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub original_winner_index: usize,
    pub adjusted_winner_index: usize,
    pub original_winner_label: String,
    pub adjusted_winner_label: String,
    pub outcome_changed: bool,
    /// `original[i] - adjusted[i]` per choice.
    pub score_deltas: Vec<f64>,
    /// Share of total voting power held by whales; `None` when unknown.
    pub whale_vp_proportion: Option<f64>,
    pub total_voting_power: f64,
    /// Number of votes cast on the proposal.
    pub voter_count: usize,
}

/// A proposal that could not be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedProposal {
    pub proposal_id: String,
    pub kind: SkipKind,
    pub reason: String,
}

impl SkippedProposal {
    pub fn new(proposal_id: impl Into<String>, err: &AnalysisError) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// Lifecycle of an organization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Loaded,
    Compared,
    Summarized,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Loaded => write!(f, "loaded"),
            RunState::Compared => write!(f, "compared"),
            RunState::Summarized => write!(f, "summarized"),
        }
    }
}

/// Organization-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub organization_name: String,
    /// Distinct voters removed by whale filtering.
    pub whale_count_delta: usize,
    /// Distinct voters across all proposals.
    pub total_voters: usize,
    /// `whale_count_delta / total_voters`; `None` without voters.
    pub whale_to_voter_ratio: Option<f64>,
    /// Mean voting power of the votes left after filtering.
    pub mean_voting_power_filtered: Option<f64>,
    /// Mean voting power of whale votes.
    pub mean_voting_power_whales: Option<f64>,
    /// Share of compared proposals whose winner changed.
    pub changed_outcome_proportion: f64,
    pub proposals_compared: usize,
    pub proposals_skipped: usize,
}

/// Everything produced for one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationReport {
    pub summary: OrganizationSummary,
    pub state: RunState,
    pub comparisons: Vec<ComparisonResult>,
    pub skipped: Vec<SkippedProposal>,
    /// Adjusted results, kept for the cache.
    #[serde(skip)]
    pub filtered: Vec<FilteredProposal>,
}

/// An organization whose whole run was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationFailure {
    pub organization: String,
    pub error: String,
}

/// Metadata about the analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed dataset.
    pub input: String,
    pub analysis_date: DateTime<Utc>,
    pub whale_quantile: f64,
    pub organizations_analyzed: usize,
    pub organizations_failed: usize,
    pub proposals_compared: usize,
    pub proposals_skipped: usize,
    pub duration_seconds: f64,
}

/// The complete whale analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub organizations: Vec<OrganizationReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<OrganizationFailure>,
}
