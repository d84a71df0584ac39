//! Normalized claims and their provenance records.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::claim::Claim;

/// Record of one raw claim that fed a normalized claim.
///
/// Captures the original source, timestamp, raw line, confidence, and
/// metadata before calibration and merging touched them, so every
/// normalized edge can be audited back to its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source tag of the originating parser.
    pub source: String,
    /// Observation instant of the raw claim.
    pub observed_at: DateTime<Utc>,
    /// The originating line/record.
    pub raw_data: String,
    /// Confidence before calibration.
    pub original_confidence: f64,
    /// Metadata before normalization.
    pub original_metadata: BTreeMap<String, String>,
}

impl Provenance {
    /// Capture provenance from a raw claim.
    pub fn from_claim(claim: &Claim) -> Self {
        Self {
            source: claim.source().to_string(),
            observed_at: claim.timestamp(),
            raw_data: claim.raw_data().to_string(),
            original_confidence: claim.confidence(),
            original_metadata: claim.metadata().clone(),
        }
    }
}

/// Error constructing a normalized claim.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NormalizedClaimError {
    /// Every normalized claim must carry at least one provenance entry.
    #[error("Normalized claim requires at least one provenance entry")]
    NoProvenance,
}

/// A canonicalized claim plus the provenance of every raw claim merged in.
///
/// Provenance entries are kept in stable input order; the first entry
/// corresponds to the base claim the merge selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedClaim {
    claim: Claim,
    provenance: Vec<Provenance>,
}

impl NormalizedClaim {
    /// Wrap a canonical claim with its provenance records.
    pub fn new(claim: Claim, provenance: Vec<Provenance>) -> Result<Self, NormalizedClaimError> {
        if provenance.is_empty() {
            return Err(NormalizedClaimError::NoProvenance);
        }
        Ok(Self { claim, provenance })
    }

    /// The canonical claim.
    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    /// Consume into the canonical claim.
    pub fn into_claim(self) -> Claim {
        self.claim
    }

    /// Provenance records in stable input order.
    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    /// How many raw claims were merged into this one.
    pub fn merged_count(&self) -> usize {
        self.provenance.len()
    }
}
