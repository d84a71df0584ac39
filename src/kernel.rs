//! Kernel facade: the programmatic surface over any evidence store.
//!
//! Wires the ingestion pipeline, conflict resolver, reliability tracker,
//! and analytics behind one handle. Concurrent ingestions share the store
//! through `Arc`; resolution and analytics are pure computations over a
//! snapshot and may run alongside them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterRegistry;
use crate::analytics::{
    bottlenecks, cascade_impact, criticality_scores, dependency_cycles, dependency_health,
    network_topology, AnalysisKind, Analytics, GraphView,
};
use crate::closure::transitive_closure;
use crate::config::KernelConfig;
use crate::export::{write_graphml, ExportError};
use crate::ingest::{IngestError, IngestOptions, IngestionPipeline};
use crate::normalize::Normalizer;
use crate::reliability::ReliabilityTracker;
use crate::resolver::ConflictResolver;
use crate::store::EvidenceStore;
use crate::types::{IngestionResult, ResolvedGraph, ServiceName};

/// The dependency kernel: ingest evidence, resolve one weighted graph,
/// derive analytics.
pub struct ServiceGraphKernel<S: EvidenceStore> {
    store: Arc<S>,
    pipeline: IngestionPipeline<S>,
    resolver: ConflictResolver,
    reliability: ReliabilityTracker,
    snapshot_dir: Option<PathBuf>,
}

impl<S: EvidenceStore> ServiceGraphKernel<S> {
    /// Kernel over `store` with the given configuration.
    pub fn new(store: Arc<S>, config: KernelConfig) -> Self {
        let registry = AdapterRegistry::with_enabled(&config.adapters);
        let pipeline = IngestionPipeline::new(Arc::clone(&store), registry, Normalizer::new());
        Self {
            store,
            pipeline,
            resolver: ConflictResolver::new(config.resolver),
            reliability: ReliabilityTracker::new(),
            snapshot_dir: config.snapshot_dir,
        }
    }

    /// Kernel with default configuration.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, KernelConfig::default())
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The reliability tracker.
    pub fn reliability(&self) -> &ReliabilityTracker {
        &self.reliability
    }

    /// Ingest raw text.
    pub async fn ingest(
        &self,
        raw: &str,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult, IngestError> {
        self.pipeline.ingest(raw, options, cancel).await
    }

    /// Ingest a file from disk.
    pub async fn ingest_file(
        &self,
        path: &Path,
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult, IngestError> {
        self.pipeline.ingest_file(path, options, cancel).await
    }

    /// Resolve the evidence into the winning-claim graph.
    pub async fn resolve(&self) -> Result<ResolvedGraph, S::Error> {
        let snapshot = self.store.claims_by_edge().await?;
        let reliability = self.reliability.snapshot();
        Ok(self.resolver.resolve(&snapshot, &reliability, Utc::now()))
    }

    /// Transitive closure of the resolved graph.
    pub async fn transitive(&self) -> Result<BTreeMap<ServiceName, Vec<ServiceName>>, S::Error> {
        Ok(transitive_closure(&self.resolve().await?))
    }

    /// Run one analysis over the current resolved graph.
    pub async fn analyze(&self, kind: AnalysisKind) -> Result<Analytics, S::Error> {
        let graph = self.resolve().await?;
        let view = GraphView::from_graph(&graph);

        Ok(match kind {
            AnalysisKind::Criticality => Analytics::Criticality(criticality_scores(&view)),
            AnalysisKind::Topology => Analytics::Topology(network_topology(&view)),
            AnalysisKind::Bottlenecks => Analytics::Bottlenecks(bottlenecks(&view)),
            AnalysisKind::Health => {
                let snapshot = self.store.claims_by_edge().await?;
                let reliability = self.reliability.snapshot();
                Analytics::Health(dependency_health(&snapshot, &reliability))
            }
            AnalysisKind::Cycles => Analytics::Cycles(dependency_cycles(&view)),
            AnalysisKind::Impact(service) => {
                Analytics::Impact(cascade_impact(&view, &service))
            }
        })
    }

    /// Record operator feedback about a source's claim.
    pub fn record_feedback(&self, source: &str, correct: bool) {
        self.reliability.update(source, correct);
    }

    /// Export a GraphML snapshot to the configured directory.
    ///
    /// Returns `Ok(None)` when no snapshot directory is configured.
    pub fn export(&self, graph: &ResolvedGraph) -> Result<Option<PathBuf>, ExportError> {
        match &self.snapshot_dir {
            Some(dir) => write_graphml(graph, dir).map(Some),
            None => Ok(None),
        }
    }
}
