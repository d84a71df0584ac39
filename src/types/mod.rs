//! Core types for the dependency kernel.

pub mod service;
pub mod confidence;
pub mod claim;
pub mod normalized;
pub mod graph;
pub mod ingestion;

pub use service::ServiceName;
pub use confidence::ConfidenceBand;
pub use claim::{Claim, ClaimError, ClaimId, DependencyType};
pub use normalized::{NormalizedClaim, NormalizedClaimError, Provenance};
pub use graph::{EdgeKey, ResolvedGraph};
pub use ingestion::IngestionResult;
