//! Markdown and JSON report generation.
//!
//! This module renders the organization overview and per-proposal
//! comparisons of a whale analysis.

use crate::analysis::{changed_outcomes, most_whale_decided, skip_breakdown, sort_by_whale_influence};
use crate::config::ReportConfig;
use crate::models::{ComparisonResult, OrganizationReport, Report, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, config: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Whale Decisiveness Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    // Organization overview
    output.push_str(&generate_overview_section(&report.organizations));

    // Skips and failures
    output.push_str(&generate_skipped_section(report));

    // Per-organization detail
    output.push_str("## Proposals by Organization\n\n");
    for organization in &report.organizations {
        output.push_str(&generate_organization_section(organization, config));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Whale Quantile:** {}\n",
        metadata.whale_quantile
    ));
    section.push_str(&format!(
        "- **Organizations Analyzed:** {}\n",
        metadata.organizations_analyzed
    ));
    if metadata.organizations_failed > 0 {
        section.push_str(&format!(
            "- **Organizations Failed:** {}\n",
            metadata.organizations_failed
        ));
    }
    section.push_str(&format!(
        "- **Proposals Compared:** {}\n",
        metadata.proposals_compared
    ));
    section.push_str(&format!(
        "- **Proposals Skipped:** {}\n",
        metadata.proposals_skipped
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the organization overview table.
fn generate_overview_section(organizations: &[OrganizationReport]) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");

    if organizations.is_empty() {
        section.push_str("No organizations were analyzed.\n\n");
        return section;
    }

    section.push_str(
        "| DAO | # of whales | all voters | changed outcomes % | mean vp (filtered) | mean vp (whales) | skipped |\n",
    );
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|:---:|\n");

    for organization in organizations {
        let s = &organization.summary;
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            escape_pipes(&s.organization_name),
            s.whale_count_delta,
            s.total_voters,
            format_percent(Some(s.changed_outcome_proportion)),
            format_power(s.mean_voting_power_filtered),
            format_power(s.mean_voting_power_whales),
            s.proposals_skipped,
        ));
    }
    section.push('\n');

    let decided = most_whale_decided(organizations, 5);
    if !decided.is_empty() {
        section.push_str("### Most Whale-Decided Organizations\n\n");
        for (i, organization) in decided.iter().enumerate() {
            section.push_str(&format!(
                "{}. **{}**: {} of proposal outcomes change after filtering out whale voting power\n",
                i + 1,
                escape_pipes(&organization.summary.organization_name),
                format_percent(Some(organization.summary.changed_outcome_proportion)),
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the skipped proposals section.
fn generate_skipped_section(report: &Report) -> String {
    let breakdown = skip_breakdown(&report.organizations);
    if breakdown.is_empty() && report.failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Skipped\n\n");

    if !breakdown.is_empty() {
        section.push_str("| Reason | Proposals |\n");
        section.push_str("|:---|:---:|\n");
        for (kind, count) in &breakdown {
            section.push_str(&format!("| {} | {} |\n", kind, count));
        }
        section.push('\n');
    }

    for failure in &report.failures {
        section.push_str(&format!(
            "- **{}** was not analyzed: {}\n",
            escape_pipes(&failure.organization),
            failure.error
        ));
    }
    if !report.failures.is_empty() {
        section.push('\n');
    }

    section
}

/// Generate the proposal table for one organization.
fn generate_organization_section(organization: &OrganizationReport, config: &ReportConfig) -> String {
    let mut section = String::new();
    let summary = &organization.summary;

    section.push_str(&format!("### {}\n\n", escape_pipes(&summary.organization_name)));
    section.push_str(&format!(
        "*Compared: {} | Skipped: {} | Whale-to-voter ratio: {}*\n\n",
        summary.proposals_compared,
        summary.proposals_skipped,
        format_percent(summary.whale_to_voter_ratio),
    ));

    let mut comparisons: Vec<ComparisonResult> = if config.only_changed {
        changed_outcomes(&organization.comparisons)
            .into_iter()
            .cloned()
            .collect()
    } else {
        organization.comparisons.clone()
    };

    if comparisons.is_empty() {
        section.push_str("No proposals to list.\n\n");
        return section;
    }

    sort_by_whale_influence(&mut comparisons);
    let hidden = comparisons
        .len()
        .saturating_sub(config.max_proposals_per_organization);
    comparisons.truncate(config.max_proposals_per_organization);

    section.push_str("| Proposal | Whale vp % | Total vp | Voters | Changed | Outcome (old) | Outcome (new) |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---|:---|\n");
    for comparison in &comparisons {
        section.push_str(&generate_comparison_row(comparison));
    }
    section.push('\n');

    if hidden > 0 {
        section.push_str(&format!("*{} more proposals not shown.*\n\n", hidden));
    }

    section
}

/// Generate a single comparison table row.
fn generate_comparison_row(comparison: &ComparisonResult) -> String {
    let mut name = match comparison.title {
        Some(ref title) => format!("{} (`{}`)", title, short_id(&comparison.proposal_id)),
        None => format!("`{}`", short_id(&comparison.proposal_id)),
    };
    if let Some(end) = comparison.end {
        name.push_str(&format!(", ended {}", end.format("%Y-%m-%d")));
    }

    format!(
        "| {} | {} | {:.9} | {} | {} | {} | {} |\n",
        escape_pipes(&name),
        format_percent(comparison.whale_vp_proportion),
        comparison.total_voting_power,
        comparison.voter_count,
        if comparison.outcome_changed { "**yes**" } else { "no" },
        escape_pipes(&comparison.original_winner_label),
        escape_pipes(&comparison.adjusted_winner_label),
    )
}

/// First nine characters of a proposal id.
fn short_id(id: &str) -> &str {
    match id.char_indices().nth(9) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Escape `|` so text can't break a Markdown table row.
fn escape_pipes(text: &str) -> String {
    text.replace('|', "\\|")
}

fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn format_power(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(
        "*Whales are voters at or above the configured voting-power quantile of each proposal.*\n",
    );

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
