//! Claim types: the canonical record of one dependency assertion.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::confidence::ConfidenceBand;
use super::service::ServiceName;

/// Kind of dependency asserted by a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    /// Observed at runtime (traffic, discovery).
    Runtime,
    /// Explicit API call between services.
    ApiCall,
    /// Data flowing between services (metrics, pipelines).
    DataFlow,
    /// Declared at build/deploy time.
    BuildTime,
    /// Health-check probe.
    HealthCheck,
    /// Declared in configuration.
    Configuration,
}

impl DependencyType {
    /// Intrinsic default confidence for this dependency type.
    ///
    /// Build-time declarations are the strongest signal, health checks the
    /// weakest.
    pub fn default_confidence(&self) -> f64 {
        match self {
            Self::BuildTime => 1.0,
            Self::Configuration => 0.95,
            Self::ApiCall => 0.90,
            Self::DataFlow => 0.85,
            Self::Runtime => 0.80,
            Self::HealthCheck => 0.60,
        }
    }

    /// Parse a dependency type from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "runtime" => Some(Self::Runtime),
            "api_call" | "apicall" => Some(Self::ApiCall),
            "data_flow" | "dataflow" => Some(Self::DataFlow),
            "build_time" | "buildtime" => Some(Self::BuildTime),
            "health_check" | "healthcheck" => Some(Self::HealthCheck),
            "configuration" => Some(Self::Configuration),
            _ => None,
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime => write!(f, "runtime"),
            Self::ApiCall => write!(f, "api_call"),
            Self::DataFlow => write!(f, "data_flow"),
            Self::BuildTime => write!(f, "build_time"),
            Self::HealthCheck => write!(f, "health_check"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Unique identifier for a persisted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimId(Uuid);

impl ClaimId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error constructing a claim.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClaimError {
    /// A service cannot depend on itself.
    #[error("Self-loop rejected: {0} -> {0}")]
    SelfLoop(ServiceName),
    /// A service name was empty after cleaning.
    #[error("Empty service name in claim")]
    EmptyService,
}

/// A single dependency assertion with metadata and provenance fields.
///
/// Claims are immutable once created: all fields are private, construction
/// validates the edge, and the fluent `with_*` setters consume `self` so a
/// claim cannot be altered after it is shared or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    id: ClaimId,
    from_service: ServiceName,
    to_service: ServiceName,
    dependency_type: DependencyType,
    confidence: f64,
    source: String,
    timestamp: DateTime<Utc>,
    raw_data: String,
    metadata: BTreeMap<String, String>,
}

impl Claim {
    /// Create a claim. Rejects self-loops and empty service names.
    ///
    /// The timestamp defaults to `now` (observation instant); adapters that
    /// parse a timestamp out of the raw data override it with
    /// [`Claim::with_timestamp`].
    pub fn new(
        from_service: ServiceName,
        to_service: ServiceName,
        dependency_type: DependencyType,
        confidence: f64,
        source: impl Into<String>,
    ) -> Result<Self, ClaimError> {
        if from_service.is_empty() || to_service.is_empty() {
            return Err(ClaimError::EmptyService);
        }
        if from_service == to_service {
            return Err(ClaimError::SelfLoop(from_service));
        }
        Ok(Self {
            id: ClaimId::generate(),
            from_service,
            to_service,
            dependency_type,
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            timestamp: Utc::now(),
            raw_data: String::new(),
            metadata: BTreeMap::new(),
        })
    }

    /// Set the observation timestamp (parsed from the raw data).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the originating line/record for audit.
    pub fn with_raw_data(mut self, raw: impl Into<String>) -> Self {
        self.raw_data = raw.into();
        self
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the metadata map wholesale.
    pub fn with_metadata_map(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Restore the persisted id when rehydrating from storage.
    pub(crate) fn with_id(mut self, id: ClaimId) -> Self {
        self.id = id;
        self
    }

    /// Replace the confidence (used by normalization calibration).
    pub(crate) fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Replace the endpoint names (used by normalization canonicalization).
    pub(crate) fn with_edge(mut self, from: ServiceName, to: ServiceName) -> Self {
        self.from_service = from;
        self.to_service = to;
        self
    }

    /// Claim identifier.
    pub fn id(&self) -> ClaimId {
        self.id
    }

    /// Depending service (the edge origin).
    pub fn from_service(&self) -> &ServiceName {
        &self.from_service
    }

    /// Depended-upon service (the edge target).
    pub fn to_service(&self) -> &ServiceName {
        &self.to_service
    }

    /// Asserted dependency kind.
    pub fn dependency_type(&self) -> DependencyType {
        self.dependency_type
    }

    /// Continuous confidence in [0, 1].
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Banded view of the confidence.
    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence)
    }

    /// Source tag of the parser that produced this claim.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Observation instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The originating line/record.
    pub fn raw_data(&self) -> &str {
        &self.raw_data
    }

    /// Ordered metadata map.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(from: &str, to: &str) -> Result<Claim, ClaimError> {
        Claim::new(
            ServiceName::new(from),
            ServiceName::new(to),
            DependencyType::Runtime,
            0.8,
            "test",
        )
    }

    #[test]
    fn test_self_loop_rejected() {
        assert!(matches!(claim("a", "a"), Err(ClaimError::SelfLoop(_))));
        // Names that clean to the same identifier are still self-loops.
        assert!(matches!(claim("Auth_Service", "auth-service"), Err(ClaimError::SelfLoop(_))));
    }

    #[test]
    fn test_empty_service_rejected() {
        assert!(matches!(claim("", "b"), Err(ClaimError::EmptyService)));
        assert!(matches!(claim("a", "   "), Err(ClaimError::EmptyService)));
    }

    #[test]
    fn test_confidence_clamped() {
        let c = Claim::new(
            ServiceName::new("a"),
            ServiceName::new("b"),
            DependencyType::ApiCall,
            1.7,
            "test",
        )
        .unwrap();
        assert_eq!(c.confidence(), 1.0);
        assert_eq!(c.confidence_band(), ConfidenceBand::VeryHigh);
    }

    #[test]
    fn test_builder_chain() {
        let ts = DateTime::parse_from_rfc3339("2024-07-04T10:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        let c = claim("a", "b")
            .unwrap()
            .with_timestamp(ts)
            .with_raw_data("a -> b")
            .with_metadata("target_port", "8080");
        assert_eq!(c.timestamp(), ts);
        assert_eq!(c.raw_data(), "a -> b");
        assert_eq!(c.metadata().get("target_port").map(String::as_str), Some("8080"));
    }

    #[test]
    fn test_dependency_type_defaults() {
        assert_eq!(DependencyType::BuildTime.default_confidence(), 1.0);
        assert_eq!(DependencyType::HealthCheck.default_confidence(), 0.6);
        // Endpoints bound every other type.
        for ty in [
            DependencyType::Runtime,
            DependencyType::ApiCall,
            DependencyType::DataFlow,
            DependencyType::Configuration,
        ] {
            assert!(ty.default_confidence() > DependencyType::HealthCheck.default_confidence());
            assert!(ty.default_confidence() < DependencyType::BuildTime.default_confidence());
        }
    }

    #[test]
    fn test_type_parse_round_trip() {
        for ty in [
            DependencyType::Runtime,
            DependencyType::ApiCall,
            DependencyType::DataFlow,
            DependencyType::BuildTime,
            DependencyType::HealthCheck,
            DependencyType::Configuration,
        ] {
            assert_eq!(DependencyType::parse(&ty.to_string()), Some(ty));
        }
    }
}
