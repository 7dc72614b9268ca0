//! Organization-level aggregation.
//!
//! The driver runs whale selection, reaggregation and comparison for every
//! proposal of an organization, then summarizes the organization. A proposal
//! that fails any step is skipped on its own; only an invalid quantile
//! rejects the whole organization.

use super::compare::compare;
use super::reaggregate::reaggregate;
use super::whales::{select_whales, validate_quantile};
use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{
    ComparisonResult, FilteredProposal, Organization, OrganizationReport, OrganizationSummary,
    Proposal, RunState, SkippedProposal,
};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the whale analysis for organizations.
#[derive(Debug, Clone)]
pub struct Driver {
    quantile: f64,
}

/// Work item for one organization.
#[derive(Debug, Clone)]
pub struct OrganizationJob {
    pub organization: Organization,
    /// Previously adjusted proposals; recomputed when `None`.
    pub cached: Option<Vec<FilteredProposal>>,
}

/// Result of running one organization.
#[derive(Debug)]
pub struct OrganizationOutcome {
    pub organization: String,
    pub result: AnalysisResult<OrganizationReport>,
}

/// Tracks an organization through `Pending -> Loaded -> Compared -> Summarized`.
struct OrganizationRun<'a> {
    organization: &'a str,
    state: RunState,
}

impl<'a> OrganizationRun<'a> {
    fn new(organization: &'a str) -> Self {
        Self {
            organization,
            state: RunState::Pending,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!("{}: {} -> {}", self.organization, self.state, next);
        self.state = next;
    }
}

impl Driver {
    /// Create a driver selecting whales at `quantile`.
    pub fn new(quantile: f64) -> AnalysisResult<Self> {
        validate_quantile(quantile)?;
        Ok(Self { quantile })
    }

    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    /// Select whales on a proposal and remove their votes from its scores.
    pub fn filter_proposal(
        &self,
        organization: &str,
        proposal: &Proposal,
    ) -> AnalysisResult<FilteredProposal> {
        proposal.validate()?;

        let selection = select_whales(&proposal.votes, self.quantile)?;
        let adjusted_scores = reaggregate(proposal, &selection.whales)?;

        Ok(FilteredProposal {
            organization: organization.to_string(),
            proposal_id: proposal.id.clone(),
            quantile: self.quantile,
            threshold: selection.threshold,
            whale_voters: selection.whales.into_iter().map(|w| w.voter).collect(),
            adjusted_scores,
        })
    }

    /// Filter every proposal of an organization.
    ///
    /// Returns the adjusted proposals and the proposals that were skipped.
    pub fn filter_organization(
        &self,
        organization: &Organization,
    ) -> (Vec<FilteredProposal>, Vec<SkippedProposal>) {
        self.filter_with_cache(organization, Vec::new())
    }

    /// Filter an organization, reusing `cached` entries made at this quantile.
    ///
    /// Every proposal without a usable entry is filtered afresh. Entries whose
    /// proposal is gone from the organization are passed through so the
    /// comparison step reports them as missing counterparts.
    fn filter_with_cache(
        &self,
        organization: &Organization,
        cached: Vec<FilteredProposal>,
    ) -> (Vec<FilteredProposal>, Vec<SkippedProposal>) {
        let known: HashSet<&str> = organization
            .proposals
            .iter()
            .map(|p| p.id.as_str())
            .collect();

        let mut reusable = HashMap::new();
        let mut orphans = Vec::new();
        for entry in cached {
            if !known.contains(entry.proposal_id.as_str()) {
                orphans.push(entry);
            } else if entry.quantile == self.quantile {
                reusable.insert(entry.proposal_id.clone(), entry);
            } else {
                debug!(
                    "{}: cached proposal {} was filtered at quantile {}, recomputing",
                    organization.name, entry.proposal_id, entry.quantile
                );
            }
        }

        let mut filtered = Vec::with_capacity(organization.proposals.len() + orphans.len());
        let mut skipped = Vec::new();
        let mut reused = 0;

        for proposal in &organization.proposals {
            if let Some(entry) = reusable.remove(&proposal.id) {
                filtered.push(entry);
                reused += 1;
                continue;
            }

            match self.filter_proposal(&organization.name, proposal) {
                Ok(adjusted) => filtered.push(adjusted),
                Err(e) => {
                    warn!("{}: skipping proposal {}: {}", organization.name, proposal.id, e);
                    skipped.push(SkippedProposal::new(&proposal.id, &e));
                }
            }
        }

        if reused > 0 {
            debug!("{}: reused {} cached proposals", organization.name, reused);
        }
        orphans.sort_by(|a, b| a.proposal_id.cmp(&b.proposal_id));
        filtered.extend(orphans);

        (filtered, skipped)
    }

    /// Run the full analysis for one organization.
    pub fn run(&self, organization: &Organization) -> AnalysisResult<OrganizationReport> {
        self.run_with(organization, None)
    }

    /// Run an organization, reusing `cached` adjusted proposals when given.
    pub fn run_with(
        &self,
        organization: &Organization,
        cached: Option<Vec<FilteredProposal>>,
    ) -> AnalysisResult<OrganizationReport> {
        let mut run = OrganizationRun::new(&organization.name);

        validate_quantile(self.quantile)?;

        let (filtered, mut skipped) =
            self.filter_with_cache(organization, cached.unwrap_or_default());
        run.advance(RunState::Loaded);

        let mut comparisons = Vec::with_capacity(filtered.len());
        let mut compared = Vec::with_capacity(filtered.len());
        let unfiltered: HashMap<&str, &Proposal> = organization
            .proposals
            .iter()
            .map(|p| (p.id.as_str(), p))
            .collect();

        for adjusted in &filtered {
            match compare_one(&unfiltered, adjusted) {
                Ok((proposal, result)) => {
                    comparisons.push(result);
                    compared.push((proposal, adjusted));
                }
                Err(e) => {
                    warn!(
                        "{}: skipping proposal {}: {}",
                        organization.name, adjusted.proposal_id, e
                    );
                    skipped.push(SkippedProposal::new(&adjusted.proposal_id, &e));
                }
            }
        }
        run.advance(RunState::Compared);

        let summary = summarize(&organization.name, &compared, &comparisons, skipped.len());
        run.advance(RunState::Summarized);

        info!(
            "{}: compared {} proposals, skipped {}, {:.2}% changed outcome",
            organization.name,
            summary.proposals_compared,
            summary.proposals_skipped,
            summary.changed_outcome_proportion * 100.0
        );

        Ok(OrganizationReport {
            summary,
            state: run.state,
            comparisons,
            skipped,
            filtered,
        })
    }

    fn run_job(&self, job: OrganizationJob) -> OrganizationOutcome {
        let result = self.run_with(&job.organization, job.cached);
        OrganizationOutcome {
            organization: job.organization.name,
            result,
        }
    }
}

fn compare_one<'a>(
    unfiltered: &HashMap<&str, &'a Proposal>,
    adjusted: &FilteredProposal,
) -> AnalysisResult<(&'a Proposal, ComparisonResult)> {
    let proposal = unfiltered
        .get(adjusted.proposal_id.as_str())
        .copied()
        .ok_or_else(|| AnalysisError::MissingCounterpart(adjusted.proposal_id.clone()))?;

    proposal.validate()?;
    let result = compare(proposal, &adjusted.adjusted_scores)?;
    Ok((proposal, result))
}

/// Build the organization summary from its compared proposals.
fn summarize(
    organization: &str,
    compared: &[(&Proposal, &FilteredProposal)],
    comparisons: &[ComparisonResult],
    skipped: usize,
) -> OrganizationSummary {
    let mut all_voters = BTreeSet::new();
    let mut remaining_voters = BTreeSet::new();
    let mut remaining_power = Vec::new();
    let mut whale_power = Vec::new();

    for (proposal, adjusted) in compared {
        for vote in &proposal.votes {
            all_voters.insert(vote.voter.as_str());
            if adjusted.whale_voters.contains(&vote.voter) {
                whale_power.push(vote.voting_power);
            } else {
                remaining_voters.insert(vote.voter.as_str());
                remaining_power.push(vote.voting_power);
            }
        }
    }

    let total_voters = all_voters.len();
    let whale_count_delta = total_voters - remaining_voters.len();
    let changed = comparisons.iter().filter(|c| c.outcome_changed).count();

    OrganizationSummary {
        organization_name: organization.to_string(),
        whale_count_delta,
        total_voters,
        whale_to_voter_ratio: ratio(whale_count_delta, total_voters),
        mean_voting_power_filtered: mean(&remaining_power),
        mean_voting_power_whales: mean(&whale_power),
        changed_outcome_proportion: ratio(changed, comparisons.len()).unwrap_or(0.0),
        proposals_compared: comparisons.len(),
        proposals_skipped: skipped,
    }
}

fn ratio(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Run organizations in parallel, at most `concurrency` at a time.
///
/// Outcomes are returned in the order of `jobs`.
pub async fn run_all(
    driver: Arc<Driver>,
    jobs: Vec<OrganizationJob>,
    concurrency: usize,
    progress: ProgressBar,
) -> Result<Vec<OrganizationOutcome>> {
    let mut outcomes: Vec<(usize, OrganizationOutcome)> = Vec::with_capacity(jobs.len());

    let mut results = stream::iter(jobs.into_iter().enumerate())
        .map(|(position, job)| {
            let driver = Arc::clone(&driver);
            let progress = progress.clone();
            let name = job.organization.name.clone();
            async move {
                let outcome = tokio::task::spawn_blocking(move || driver.run_job(job)).await;
                progress.inc(1);
                (position, name, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((position, name, outcome)) = results.next().await {
        let outcome = outcome.with_context(|| format!("Analysis task for {} failed", name))?;
        outcomes.push((position, outcome));
    }

    progress.finish_and_clear();
    outcomes.sort_by_key(|(position, _)| *position);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}
