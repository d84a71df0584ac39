//! PostgreSQL evidence store for production use.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE services (
//!     id          UUID PRIMARY KEY,
//!     name        TEXT NOT NULL UNIQUE,
//!     first_seen  TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE claims (
//!     id              UUID PRIMARY KEY,
//!     from_service    TEXT NOT NULL,
//!     to_service      TEXT NOT NULL,
//!     dependency_type TEXT NOT NULL,
//!     confidence      DOUBLE PRECISION NOT NULL,
//!     source          TEXT NOT NULL,
//!     observed_at     TIMESTAMPTZ NOT NULL,
//!     raw_data        TEXT NOT NULL,
//!     metadata        JSONB NOT NULL,
//!     provenance      JSONB NOT NULL,
//!     seq             BIGSERIAL
//! );
//! CREATE INDEX claims_edge_idx ON claims (from_service, to_service);
//! CREATE INDEX claims_source_idx ON claims (source);
//!
//! CREATE TABLE source_reliability (
//!     source        TEXT PRIMARY KEY,
//!     claim_count   BIGINT NOT NULL,
//!     correct_count BIGINT NOT NULL
//! );
//! ```
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::reliability::ReliabilityRecord;
use crate::store::ServiceCache;
use crate::types::{
    Claim, ClaimId, DependencyType, NormalizedClaim, Provenance, ServiceName,
};
use super::{EvidenceStore, ServiceRecord};

/// Configuration for the PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/servicemap".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for the PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Stored row could not be decoded back into a claim.
    #[error("Corrupt claim row {id}: {reason}")]
    CorruptRow {
        /// Row id.
        id: Uuid,
        /// Decode failure description.
        reason: String,
    },
}

/// PostgreSQL evidence store.
///
/// A service-record cache avoids duplicate service inserts within an
/// ingestion batch.
pub struct PostgresEvidenceStore {
    pool: PgPool,
    service_cache: ServiceCache,
}

impl PostgresEvidenceStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, PostgresError> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool,
            service_cache: ServiceCache::default(),
        })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, PostgresError> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Insert a service row unless the cache has seen the name already.
    async fn register_service(&self, name: &ServiceName) -> Result<(), PostgresError> {
        if self.service_cache.get(name).is_some() {
            return Ok(());
        }
        let record = ServiceRecord {
            name: name.clone(),
            first_seen: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO services (id, name, first_seen) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name.as_str())
        .bind(record.first_seen)
        .execute(&self.pool)
        .await?;
        self.service_cache.insert_if_absent(record);
        Ok(())
    }

    /// Load the persisted reliability counters.
    pub async fn load_reliability(
        &self,
    ) -> Result<BTreeMap<String, ReliabilityRecord>, PostgresError> {
        let rows = sqlx::query("SELECT source, claim_count, correct_count FROM source_reliability")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let claim_count: i64 = row.get("claim_count");
                let correct_count: i64 = row.get("correct_count");
                (
                    row.get::<String, _>("source"),
                    ReliabilityRecord {
                        claim_count: claim_count.max(0) as u64,
                        correct_count: correct_count.max(0) as u64,
                    },
                )
            })
            .collect())
    }

    /// Persist the current reliability counters (upsert per source).
    pub async fn save_reliability(
        &self,
        records: &BTreeMap<String, ReliabilityRecord>,
    ) -> Result<(), PostgresError> {
        for (source, record) in records {
            sqlx::query(
                "INSERT INTO source_reliability (source, claim_count, correct_count) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (source) DO UPDATE \
                 SET claim_count = EXCLUDED.claim_count, \
                     correct_count = EXCLUDED.correct_count",
            )
            .bind(source)
            .bind(record.claim_count as i64)
            .bind(record.correct_count as i64)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    fn parse_claim_row(row: &sqlx::postgres::PgRow) -> Result<NormalizedClaim, PostgresError> {
        let id: Uuid = row.try_get("id")?;
        let corrupt = |reason: &str| PostgresError::CorruptRow {
            id,
            reason: reason.to_string(),
        };

        let from: String = row.try_get("from_service")?;
        let to: String = row.try_get("to_service")?;
        let type_str: String = row.try_get("dependency_type")?;
        let confidence: f64 = row.try_get("confidence")?;
        let source: String = row.try_get("source")?;
        let observed_at: DateTime<Utc> = row.try_get("observed_at")?;
        let raw_data: String = row.try_get("raw_data")?;
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let provenance_json: serde_json::Value = row.try_get("provenance")?;

        let dependency_type = DependencyType::parse(&type_str)
            .ok_or_else(|| corrupt("unknown dependency type"))?;
        let metadata: BTreeMap<String, String> = serde_json::from_value(metadata_json)
            .map_err(|_| corrupt("unreadable metadata"))?;
        let provenance: Vec<Provenance> = serde_json::from_value(provenance_json)
            .map_err(|_| corrupt("unreadable provenance"))?;

        let claim = Claim::new(
            ServiceName::new(from),
            ServiceName::new(to),
            dependency_type,
            confidence,
            source,
        )
        .map_err(|_| corrupt("invalid edge"))?
        .with_id(ClaimId::new(id))
        .with_timestamp(observed_at)
        .with_raw_data(raw_data)
        .with_metadata_map(metadata);

        NormalizedClaim::new(claim, provenance).map_err(|_| corrupt("empty provenance"))
    }

    async fn fetch(&self, query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>) -> Result<Vec<NormalizedClaim>, PostgresError> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_claim_row).collect()
    }
}

#[async_trait]
impl EvidenceStore for PostgresEvidenceStore {
    type Error = PostgresError;

    async fn save(&self, claim: &NormalizedClaim) -> Result<ClaimId, Self::Error> {
        let inner = claim.claim();
        self.register_service(inner.from_service()).await?;
        self.register_service(inner.to_service()).await?;

        let metadata = serde_json::to_value(inner.metadata()).unwrap_or_default();
        let provenance = serde_json::to_value(claim.provenance()).unwrap_or_default();

        sqlx::query(
            "INSERT INTO claims \
             (id, from_service, to_service, dependency_type, confidence, source, \
              observed_at, raw_data, metadata, provenance) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(inner.id().as_uuid())
        .bind(inner.from_service().as_str())
        .bind(inner.to_service().as_str())
        .bind(inner.dependency_type().to_string())
        .bind(inner.confidence())
        .bind(inner.source())
        .bind(inner.timestamp())
        .bind(inner.raw_data())
        .bind(metadata)
        .bind(provenance)
        .execute(&self.pool)
        .await?;

        Ok(inner.id())
    }

    async fn find_all(&self) -> Result<Vec<NormalizedClaim>, Self::Error> {
        self.fetch(sqlx::query(
            "SELECT id, from_service, to_service, dependency_type, confidence, source, \
             observed_at, raw_data, metadata, provenance \
             FROM claims ORDER BY seq",
        ))
        .await
    }

    async fn find_by_edge(
        &self,
        from: &ServiceName,
        to: &ServiceName,
    ) -> Result<Vec<NormalizedClaim>, Self::Error> {
        self.fetch(
            sqlx::query(
                "SELECT id, from_service, to_service, dependency_type, confidence, source, \
                 observed_at, raw_data, metadata, provenance \
                 FROM claims WHERE from_service = $1 AND to_service = $2 ORDER BY seq",
            )
            .bind(from.as_str())
            .bind(to.as_str()),
        )
        .await
    }

    async fn find_by_source(&self, source: &str) -> Result<Vec<NormalizedClaim>, Self::Error> {
        self.fetch(
            sqlx::query(
                "SELECT id, from_service, to_service, dependency_type, confidence, source, \
                 observed_at, raw_data, metadata, provenance \
                 FROM claims WHERE source = $1 ORDER BY seq",
            )
            .bind(source),
        )
        .await
    }

    async fn services(&self) -> Result<Vec<ServiceRecord>, Self::Error> {
        let rows = sqlx::query("SELECT name, first_seen FROM services ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| ServiceRecord {
                name: ServiceName::new(row.get::<String, _>("name")),
                first_seen: row.get("first_seen"),
            })
            .collect())
    }

    async fn claim_count(&self) -> Result<usize, Self::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM claims")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("n");
        Ok(count as usize)
    }
}
