//! Error types for the reaggregation engine.
//!
//! Every variant is scoped to a single proposal except for an invalid
//! organization-wide quantile, which the driver treats as fatal for that
//! organization.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while selecting whales, reaggregating or comparing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid vote data: {0}")]
    InvalidVoteData(String),

    #[error("Unsupported voting scheme: {0}")]
    UnsupportedVotingScheme(String),

    #[error("Proposal {0} has no choices")]
    EmptyChoiceSet(String),

    #[error("No unfiltered proposal matches {0}")]
    MissingCounterpart(String),
}

impl AnalysisError {
    /// Returns the reportable kind of this error.
    pub fn kind(&self) -> SkipKind {
        match self {
            AnalysisError::InvalidParameter(_) => SkipKind::InvalidParameter,
            AnalysisError::InvalidVoteData(_) => SkipKind::InvalidVoteData,
            AnalysisError::UnsupportedVotingScheme(_) => SkipKind::UnsupportedVotingScheme,
            AnalysisError::EmptyChoiceSet(_) => SkipKind::EmptyChoiceSet,
            AnalysisError::MissingCounterpart(_) => SkipKind::MissingCounterpart,
        }
    }
}

/// Serializable error kind attached to skipped proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    InvalidParameter,
    InvalidVoteData,
    UnsupportedVotingScheme,
    EmptyChoiceSet,
    MissingCounterpart,
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipKind::InvalidParameter => write!(f, "Invalid parameter"),
            SkipKind::InvalidVoteData => write!(f, "Invalid vote data"),
            SkipKind::UnsupportedVotingScheme => write!(f, "Unsupported voting scheme"),
            SkipKind::EmptyChoiceSet => write!(f, "Empty choice set"),
            SkipKind::MissingCounterpart => write!(f, "Missing counterpart"),
        }
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
