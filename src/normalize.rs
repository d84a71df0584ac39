//! Claim normalization.
//!
//! Pipeline for each incoming batch:
//!
//! 1. Canonicalize service names (alias table, then suffix rules).
//! 2. Calibrate confidence by a fixed per-source weight.
//! 3. Normalize metadata keys/values and inject standard keys.
//! 4. Capture provenance from the raw claim.
//! 5. Merge duplicates per canonical edge.
//!
//! Canonicalization is idempotent: every alias target and every suffixed
//! name is a fixed point of the pipeline.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::types::{Claim, EdgeKey, NormalizedClaim, Provenance, ServiceName};

/// Suffixes that mark a name as already classified.
const RECOGNIZED_SUFFIXES: &[&str] = &[
    "-service",
    "-database",
    "-db",
    "-broker",
    "-kafka",
    "-cache",
    "-gateway",
    "-queue",
];

/// Substring cues that trigger suffixing, with the suffix they imply.
const SUFFIX_CUES: &[(&str, &str)] = &[
    ("sql", "-database"),
    ("db", "-database"),
    ("cache", "-database"),
    ("redis", "-database"),
    ("kafka", "-broker"),
    ("queue", "-broker"),
    ("broker", "-broker"),
];

/// Default alias table: alternate spellings to canonical names.
///
/// Every target must be a fixed point of canonicalization.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("mysql-primary", "mysql-database"),
    ("mysql-primary-database", "mysql-database"),
    ("postgres-primary", "postgres-database"),
    ("auth", "authentication-service"),
    ("auth-service", "authentication-service"),
];

/// Per-source calibration weights. Sources not listed take
/// [`DEFAULT_SOURCE_WEIGHT`].
const SOURCE_WEIGHTS: &[(&str, f64)] = &[
    ("configuration-file", 1.0),
    ("router-log", 0.9),
    ("network-discovery", 0.7),
];

/// Calibration weight for sources without an entry in the table.
pub const DEFAULT_SOURCE_WEIGHT: f64 = 0.5;

/// Metadata key marking a claim as already normalized. Calibration is
/// skipped when present so re-normalization cannot re-dampen confidence.
const NORMALIZED_AT_KEY: &str = "normalized_at";

/// Append `suffix` unless the name already ends in a recognized suffix.
pub(crate) fn ensure_suffix(name: &str, suffix: &str) -> String {
    if RECOGNIZED_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Service-name canonicalizer and claim normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    aliases: BTreeMap<String, String>,
    source_weights: BTreeMap<String, f64>,
}

impl Normalizer {
    /// Normalizer with the built-in alias and weight tables.
    pub fn new() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            source_weights: SOURCE_WEIGHTS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// Add or replace an alias. The target should be canonical already.
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases
            .insert(ServiceName::new(from.into()).to_string(), ServiceName::new(to.into()).to_string());
        self
    }

    /// Add or replace a source calibration weight.
    pub fn with_source_weight(mut self, source: impl Into<String>, weight: f64) -> Self {
        self.source_weights.insert(source.into(), weight.clamp(0.0, 1.0));
        self
    }

    /// Calibration weight for a source.
    pub fn weight_for(&self, source: &str) -> f64 {
        self.source_weights.get(source).copied().unwrap_or(DEFAULT_SOURCE_WEIGHT)
    }

    /// Canonicalize a service name: alias lookup first, then suffix rules.
    ///
    /// Idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`.
    pub fn canonicalize(&self, name: &ServiceName) -> ServiceName {
        // ServiceName construction already lowercased, trimmed, and hyphenated.
        let key = name.as_str();
        if let Some(target) = self.aliases.get(key) {
            return ServiceName::new(target);
        }
        if RECOGNIZED_SUFFIXES.iter().any(|s| key.ends_with(s)) {
            return name.clone();
        }
        for (cue, suffix) in SUFFIX_CUES {
            if key.contains(cue) {
                return ServiceName::new(format!("{key}{suffix}"));
            }
        }
        name.clone()
    }

    /// Normalize a batch of raw claims into canonical, merged claims.
    ///
    /// Output order is the first-appearance order of each canonical edge in
    /// the input. Claims whose endpoints collapse to the same canonical
    /// name are dropped with a warning.
    pub fn normalize(&self, claims: Vec<Claim>) -> Vec<NormalizedClaim> {
        let mut order: Vec<EdgeKey> = Vec::new();
        let mut groups: BTreeMap<EdgeKey, Vec<(Claim, Provenance)>> = BTreeMap::new();

        for raw in claims {
            let provenance = Provenance::from_claim(&raw);
            let canonical = self.canonicalize_claim(raw);

            if canonical.from_service() == canonical.to_service() {
                tracing::warn!(
                    service = %canonical.from_service(),
                    "dropping claim whose endpoints canonicalize to the same service"
                );
                continue;
            }

            let key = EdgeKey::of(&canonical);
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push((canonical, provenance));
        }

        order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .filter_map(|group| self.merge_group(group))
            .collect()
    }

    /// Steps 1–3 for a single claim.
    fn canonicalize_claim(&self, claim: Claim) -> Claim {
        let from = self.canonicalize(claim.from_service());
        let to = self.canonicalize(claim.to_service());

        let already_normalized = claim.metadata().contains_key(NORMALIZED_AT_KEY);
        let confidence = if already_normalized {
            claim.confidence()
        } else {
            claim.confidence() * self.weight_for(claim.source())
        };

        let metadata = Self::normalize_metadata(claim.metadata(), claim.source());

        claim
            .with_edge(from, to)
            .with_confidence(confidence)
            .with_metadata_map(metadata)
    }

    /// Lowercase keys, map spaces/hyphens to underscores, backfill empty
    /// values, and inject the standard keys.
    fn normalize_metadata(
        metadata: &BTreeMap<String, String>,
        source: &str,
    ) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in metadata {
            let key: String = key
                .trim()
                .to_lowercase()
                .chars()
                .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
                .collect();
            let value = if value.trim().is_empty() {
                "unknown".to_string()
            } else {
                value.clone()
            };
            out.entry(key).or_insert(value);
        }
        out.entry("source_type".to_string()).or_insert_with(|| source.to_string());
        out.entry(NORMALIZED_AT_KEY.to_string())
            .or_insert_with(|| Utc::now().to_rfc3339());
        out
    }

    /// Step 5: collapse one canonical-edge group to a single claim.
    fn merge_group(&self, group: Vec<(Claim, Provenance)>) -> Option<NormalizedClaim> {
        let merged_from = group.len();

        // Base claim: maximum original confidence, first on ties.
        let base_idx = group
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.1.original_confidence
                    .partial_cmp(&b.1.original_confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(i, _)| i)?;

        let mut all_sources: Vec<String> = Vec::new();
        for (_, prov) in &group {
            if !all_sources.contains(&prov.source) {
                all_sources.push(prov.source.clone());
            }
        }

        let mut metadata = group[base_idx].0.metadata().clone();
        for (i, (claim, _)) in group.iter().enumerate() {
            if i == base_idx {
                continue;
            }
            for (key, value) in claim.metadata() {
                match metadata.get(key) {
                    None => {
                        metadata.insert(key.clone(), value.clone());
                    }
                    Some(existing) if existing == "unknown" && value != "unknown" => {
                        metadata.insert(key.clone(), value.clone());
                    }
                    Some(_) => {}
                }
            }
        }
        if merged_from > 1 {
            metadata.insert("merged_from_sources".to_string(), merged_from.to_string());
            metadata.insert("all_sources".to_string(), all_sources.join(","));
        }

        let mut provenance = Vec::with_capacity(group.len());
        let mut base_claim = None;
        for (i, (claim, prov)) in group.into_iter().enumerate() {
            if i == base_idx {
                base_claim = Some(claim);
            }
            provenance.push(prov);
        }

        let claim = base_claim?.with_metadata_map(metadata);
        NormalizedClaim::new(claim, provenance).ok()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}
