//! # servicemap-kernel
//!
//! Multi-source dependency claims, one conflict-resolved service graph.
//!
//! The kernel ingests dependency assertions about inter-service
//! relationships from heterogeneous observational sources (access logs,
//! configuration files, network scans, CI/CD pipelines, gateway configs,
//! telemetry, Kubernetes manifests, free text), normalizes them into
//! canonical claims with provenance, stores them as multi-source evidence,
//! and resolves the evidence into a single weighted dependency graph with
//! transitive closure and graph-analytic derivatives.
//!
//! ## Pipeline
//!
//! ```text
//! raw text → adapter → raw claims → normalizer → canonical claims → store
//!                                                                     ↓
//!                 analytics ← closure ← resolved graph ← resolver ←──┘
//! ```
//!
//! ## Guarantees
//!
//! - Claims are immutable once created; the store is append-only.
//! - Service-name canonicalization is idempotent.
//! - Resolution is deterministic given identical store state,
//!   configuration, reliability snapshot, and clock.
//! - Cycles are preserved; closure and analytics tolerate them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod adapter;
pub mod normalize;
pub mod store;
pub mod reliability;
pub mod resolver;
pub mod closure;
pub mod analytics;
pub mod ingest;
pub mod kernel;
pub mod config;
pub mod export;

// Re-exports
pub use types::{
    Claim, ClaimError, ClaimId, ConfidenceBand, DependencyType, EdgeKey, IngestionResult,
    NormalizedClaim, Provenance, ResolvedGraph, ServiceName,
};
pub use adapter::{AdapterError, AdapterRegistry, ParsedClaims, SourceAdapter};
pub use normalize::Normalizer;
pub use store::{EvidenceStore, InMemoryEvidenceStore, ServiceCache, ServiceRecord};
#[cfg(feature = "postgres")]
pub use store::PostgresEvidenceStore;
pub use reliability::{ReliabilityRecord, ReliabilityTracker, DEFAULT_RELIABILITY};
pub use resolver::{ConflictResolver, ResolverConfig};
pub use closure::transitive_closure;
pub use analytics::{
    bottlenecks, cascade_impact, criticality_scores, dependency_cycles, dependency_health,
    network_topology, AnalysisKind, Analytics, Bottleneck, CascadeImpact, CriticalityScore,
    DependencyCycle, DependencyHealth, GraphView, HealthStatus, NetworkTopology, RiskLevel,
};
pub use ingest::{IngestError, IngestOptions, IngestionPipeline};
pub use kernel::ServiceGraphKernel;
pub use config::{ConfigError, KernelConfig};
pub use export::{to_graphml, write_graphml, ExportError};

/// Schema version for persisted kernel types.
/// Increment on breaking changes to any stored shape.
pub const KERNEL_SCHEMA_VERSION: &str = "1.0.0";
