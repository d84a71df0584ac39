//! Ingestion orchestration.
//!
//! One batch runs detect → parse → normalize → persist and reports
//! counters in an [`IngestionResult`]. Per-line and per-claim failures are
//! recovered locally and counted; a parser failure aborts the batch with a
//! typed error carrying the source id. The cancellation token is honored
//! at I/O boundaries and between pipeline stages.
//!
//! Every extracted claim is accounted for exactly once: persisted as a
//! canonical edge (`claims_saved`), absorbed into one by duplicate
//! merging (`claims_merged`), or lost to a normalization drop or save
//! failure (`error_count`). Skipped input lines never became claims and
//! count separately.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterError, AdapterRegistry};
use crate::normalize::Normalizer;
use crate::store::EvidenceStore;
use crate::types::IngestionResult;

/// Error type for a failed ingestion batch.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The parser failed structurally.
    #[error("Ingestion of {source_id} failed: {source}")]
    Adapter {
        /// Identifier of the batch that failed.
        source_id: String,
        /// The adapter failure.
        #[source]
        source: AdapterError,
    },
    /// The batch was cancelled by the caller.
    #[error("Ingestion of {source_id} cancelled")]
    Cancelled {
        /// Identifier of the batch that was cancelled.
        source_id: String,
    },
}

/// Options for one ingestion batch.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Explicit adapter hint (bypasses detection when it names a
    /// registered adapter).
    pub source_type: Option<String>,
    /// Caller-side identifier for the batch (defaults to the filename or
    /// `inline`).
    pub source_id: Option<String>,
}

impl IngestOptions {
    /// Default options: autodetect, anonymous source id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the adapter hint.
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    /// Set the batch identifier.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// End-to-end ingestion pipeline over an evidence store.
pub struct IngestionPipeline<S> {
    store: Arc<S>,
    registry: AdapterRegistry,
    normalizer: Normalizer,
}

impl<S: EvidenceStore> IngestionPipeline<S> {
    /// Create a pipeline.
    pub fn new(store: Arc<S>, registry: AdapterRegistry, normalizer: Normalizer) -> Self {
        Self {
            store,
            registry,
            normalizer,
        }
    }

    /// The adapter registry.
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Ingest raw text.
    pub async fn ingest(
        &self,
        raw: &str,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult, IngestError> {
        self.ingest_inner(raw, None, options, cancel).await
    }

    /// Ingest a file. A missing or unreadable file surfaces as an
    /// adapter error.
    pub async fn ingest_file(
        &self,
        path: &Path,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult, IngestError> {
        let source_id = options
            .source_id
            .clone()
            .unwrap_or_else(|| path.display().to_string());

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled { source_id });
        }

        let raw = std::fs::read_to_string(path).map_err(|e| IngestError::Adapter {
            source_id: source_id.clone(),
            source: AdapterError::io(
                options.source_type.as_deref().unwrap_or("unknown"),
                e,
            ),
        })?;

        let filename = path.file_name().map(|f| f.to_string_lossy().to_string());
        let options = options.with_source_id(source_id);
        self.ingest_inner(&raw, filename.as_deref(), options, cancel).await
    }

    async fn ingest_inner(
        &self,
        raw: &str,
        filename: Option<&str>,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult, IngestError> {
        let start_time = Utc::now();
        let started = Instant::now();
        let source_id = options.source_id.unwrap_or_else(|| "inline".to_string());

        // Tolerate a UTF-8 BOM.
        let raw = raw.trim_start_matches('\u{feff}');

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled { source_id });
        }

        // Whitespace-only input: nothing extracted, nothing persisted.
        if raw.trim().is_empty() {
            tracing::debug!(source_id = %source_id, "empty input, nothing to ingest");
            let source_type = options.source_type.unwrap_or_else(|| "unknown".to_string());
            return Ok(IngestionResult {
                start_time,
                ..IngestionResult::empty(source_type, source_id)
            });
        }

        let adapter = self
            .registry
            .detect(options.source_type.as_deref(), filename, raw);
        let source_type = adapter.name().to_string();
        tracing::info!(source_id = %source_id, adapter = %source_type, "ingestion started");

        let parsed = adapter.process(raw).map_err(|source| IngestError::Adapter {
            source_id: source_id.clone(),
            source,
        })?;
        let raw_claims_extracted = parsed.claims.len();
        let lines_skipped = parsed.malformed_lines;

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled { source_id });
        }

        let normalized = self.normalizer.normalize(parsed.claims);
        let claims_after_normalization = normalized.len();

        // Raw claims still represented after merging; the difference was
        // dropped by normalization (e.g. alias-collapsed self-loops).
        let represented: usize = normalized.iter().map(|n| n.merged_count()).sum();
        let mut error_count = raw_claims_extracted.saturating_sub(represented);

        let mut claims_saved = 0usize;
        let mut claims_merged = 0usize;
        for claim in &normalized {
            if cancel.is_cancelled() {
                // Abandon the batch; what already reached the store stays.
                return Err(IngestError::Cancelled { source_id });
            }
            match self.store.save(claim).await {
                Ok(_) => {
                    claims_saved += 1;
                    claims_merged += claim.merged_count() - 1;
                }
                Err(e) => {
                    tracing::warn!(
                        source_id = %source_id,
                        edge = %crate::types::EdgeKey::of(claim.claim()),
                        error = %e,
                        "dropping claim after save failure"
                    );
                    // A failed save loses every raw claim merged into it.
                    error_count += claim.merged_count();
                }
            }
        }

        let result = IngestionResult {
            source_type,
            source_id,
            raw_claims_extracted,
            claims_after_normalization,
            claims_saved,
            claims_merged,
            error_count,
            lines_skipped,
            processing_time_ms: started.elapsed().as_millis() as u64,
            start_time,
        };
        debug_assert!(result.is_balanced());
        tracing::info!(
            source_id = %result.source_id,
            adapter = %result.source_type,
            raw = result.raw_claims_extracted,
            normalized = result.claims_after_normalization,
            saved = result.claims_saved,
            merged = result.claims_merged,
            errors = result.error_count,
            lines_skipped = result.lines_skipped,
            elapsed_ms = result.processing_time_ms,
            "ingestion finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEvidenceStore;

    fn pipeline() -> IngestionPipeline<InMemoryEvidenceStore> {
        IngestionPipeline::new(
            Arc::new(InMemoryEvidenceStore::new()),
            AdapterRegistry::with_defaults(),
            Normalizer::new(),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_counts() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest(
                "a -> b\nb -> c\na -> b\n",
                IngestOptions::new().with_source_type("custom-text").with_source_id("batch"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.source_type, "custom-text");
        assert_eq!(result.source_id, "batch");
        assert_eq!(result.raw_claims_extracted, 3);
        // a->b twice merges: one raw claim is absorbed, none is an error.
        assert_eq!(result.claims_after_normalization, 2);
        assert_eq!(result.claims_saved, 2);
        assert_eq!(result.claims_merged, 1);
        assert_eq!(result.error_count, 0);
        assert_eq!(result.lines_skipped, 0);
        assert!(result.is_balanced());

        assert_eq!(pipeline.store.claim_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest("   \n\n", IngestOptions::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.raw_claims_extracted, 0);
        assert_eq!(result.claims_saved, 0);
        assert_eq!(result.error_count, 0);
        assert_eq!(result.lines_skipped, 0);
        assert!(result.is_balanced());
        assert_eq!(pipeline.store.claim_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bom_tolerated() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest(
                "\u{feff}a -> b\n",
                IngestOptions::new().with_source_type("custom-text"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.claims_saved, 1);
    }

    #[tokio::test]
    async fn test_crlf_tolerated() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest(
                "a -> b\r\nb -> c\r\n",
                IngestOptions::new().with_source_type("custom-text"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.claims_saved, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_adapter_error() {
        let pipeline = pipeline();
        let err = pipeline
            .ingest_file(
                Path::new("/definitely/not/here.log"),
                IngestOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Adapter { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_before_start() {
        let pipeline = pipeline();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline
            .ingest("a -> b\n", IngestOptions::new(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Cancelled { .. }));
        assert_eq!(pipeline.store.claim_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_lines_counted_not_fatal() {
        let pipeline = pipeline();
        let result = pipeline
            .ingest(
                "a -> b\nx -> \n",
                IngestOptions::new().with_source_type("custom-text"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        // The broken line never became a claim, so it skews no claim
        // bucket.
        assert_eq!(result.raw_claims_extracted, 1);
        assert_eq!(result.claims_saved, 1);
        assert_eq!(result.lines_skipped, 1);
        assert_eq!(result.error_count, 0);
        assert!(result.is_balanced());
    }

    #[tokio::test]
    async fn test_alias_collapse_counts_as_error() {
        let pipeline = pipeline();
        // `auth -> auth-service` canonicalizes to the same service on
        // both ends and is dropped during normalization.
        let result = pipeline
            .ingest(
                "auth -> auth-service\nweb -> auth\n",
                IngestOptions::new().with_source_type("custom-text"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.raw_claims_extracted, 2);
        assert_eq!(result.claims_saved, 1);
        assert_eq!(result.claims_merged, 0);
        assert_eq!(result.error_count, 1);
        assert!(result.is_balanced());
    }
}
