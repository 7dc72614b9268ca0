//! Cache of whale-adjusted proposals.
//!
//! Entries are keyed by organization and proposal id. Inserting an entry for
//! an existing key replaces it; the tool never removes entries.

use crate::models::FilteredProposal;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// On-disk cache of adjusted proposals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustedCache {
    #[serde(default)]
    organizations: BTreeMap<String, BTreeMap<String, FilteredProposal>>,
}

impl AdjustedCache {
    /// Load the cache from `path`, starting empty if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No cache at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))
    }

    /// Write the cache to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize cache")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))
    }

    /// Insert or replace the entry for `(organization, proposal_id)`.
    pub fn insert(&mut self, entry: FilteredProposal) {
        self.organizations
            .entry(entry.organization.clone())
            .or_default()
            .insert(entry.proposal_id.clone(), entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = FilteredProposal>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    /// All cached entries of an organization, `None` if it was never cached.
    pub fn organization(&self, organization: &str) -> Option<Vec<FilteredProposal>> {
        self.organizations
            .get(organization)
            .map(|entries| entries.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.organizations.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
