//! Ingestion result reporting.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Outcome counters for one ingestion batch.
///
/// A partially bad batch is still a success: skipped lines and dropped
/// claims surface here as counters, not as an error to the caller.
///
/// Every extracted claim lands in exactly one bucket, so the accounting
/// identity
///
/// ```text
/// raw_claims_extracted = claims_saved + claims_merged + error_count
/// ```
///
/// holds for every batch ([`IngestionResult::is_balanced`]). Lines that
/// matched a grammar but failed to parse never became claims; they are
/// tallied separately as `lines_skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    /// Source type (adapter name) that handled the batch.
    pub source_type: String,
    /// Caller-supplied identifier for the batch origin (file name, request id).
    pub source_id: String,
    /// Raw claims the adapter extracted.
    pub raw_claims_extracted: usize,
    /// Claims remaining after canonicalization and merging.
    pub claims_after_normalization: usize,
    /// Claims actually persisted (one per surviving canonical edge).
    pub claims_saved: usize,
    /// Raw claims absorbed into a persisted claim by duplicate merging.
    pub claims_merged: usize,
    /// Raw claims lost: dropped during normalization or part of a failed
    /// save.
    pub error_count: usize,
    /// Input lines that matched a grammar shape but failed field parsing.
    pub lines_skipped: usize,
    /// Wall-clock duration of the batch in milliseconds.
    pub processing_time_ms: u64,
    /// When the batch started.
    pub start_time: DateTime<Utc>,
}

impl IngestionResult {
    /// Result for an empty or whitespace-only input: nothing extracted,
    /// nothing persisted, no error.
    pub fn empty(source_type: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            source_id: source_id.into(),
            raw_claims_extracted: 0,
            claims_after_normalization: 0,
            claims_saved: 0,
            claims_merged: 0,
            error_count: 0,
            lines_skipped: 0,
            processing_time_ms: 0,
            start_time: Utc::now(),
        }
    }

    /// Whether the claim accounting identity holds: every extracted claim
    /// was saved, merged into a saved claim, or counted as an error.
    pub fn is_balanced(&self) -> bool {
        self.raw_claims_extracted == self.claims_saved + self.claims_merged + self.error_count
    }
}
