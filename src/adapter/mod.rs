//! Source adapter framework.
//!
//! Each supported evidence format gets one adapter: a side-effect-free
//! parser from raw UTF-8 text to a list of [`Claim`]s tagged with the
//! adapter's source label. Adapters are independent values behind a shared
//! trait, selected through a registry by source tag, filename pattern, or
//! content probe.
//!
//! ## Contract
//!
//! - Deterministic on identical input; timestamps default to "now" only
//!   when absent from the data.
//! - Malformed lines are skipped (with a warning) and counted; they never
//!   abort the batch.
//! - Structural failures (unreadable input) surface as a single
//!   [`AdapterError`] wrapping the adapter name and cause.
//! - Self-loop lines are silently dropped.

pub mod router_log;
pub mod config_file;
pub mod network_scan;
pub mod cicd;
pub mod api_gateway;
pub mod observability;
pub mod kubernetes;
pub mod custom_text;

use std::sync::Arc;

use crate::types::{Claim, ClaimError};

pub use router_log::RouterLogAdapter;
pub use config_file::ConfigFileAdapter;
pub use network_scan::NetworkScanAdapter;
pub use cicd::CicdPipelineAdapter;
pub use api_gateway::ApiGatewayAdapter;
pub use observability::ObservabilityAdapter;
pub use kubernetes::KubernetesAdapter;
pub use custom_text::CustomTextAdapter;

/// Error type for adapter failures.
///
/// Carries the adapter name so batch errors can be attributed to the
/// parser that raised them.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Reading the raw input failed.
    #[error("adapter {adapter}: {source}")]
    Io {
        /// Name of the failing adapter.
        adapter: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The input is structurally unusable for this adapter.
    #[error("adapter {adapter}: {reason}")]
    Structural {
        /// Name of the failing adapter.
        adapter: String,
        /// What went wrong.
        reason: String,
    },
}

impl AdapterError {
    /// Create a structural error.
    pub fn structural(adapter: &str, reason: impl Into<String>) -> Self {
        Self::Structural {
            adapter: adapter.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error.
    pub fn io(adapter: &str, source: std::io::Error) -> Self {
        Self::Io {
            adapter: adapter.to_string(),
            source,
        }
    }

    /// Name of the adapter that raised this error.
    pub fn adapter(&self) -> &str {
        match self {
            Self::Io { adapter, .. } | Self::Structural { adapter, .. } => adapter,
        }
    }
}

/// Output of one adapter run: the extracted claims plus how many lines
/// looked like the grammar but failed to parse.
#[derive(Debug, Default)]
pub struct ParsedClaims {
    /// Extracted claims, in input order.
    pub claims: Vec<Claim>,
    /// Lines that matched a grammar prefix but failed field parsing.
    pub malformed_lines: usize,
}

impl ParsedClaims {
    /// Push a constructed claim, silently dropping self-loops.
    ///
    /// Empty service names count as malformed; self-loops do not.
    pub fn push(&mut self, claim: Result<Claim, ClaimError>) {
        match claim {
            Ok(claim) => self.claims.push(claim),
            Err(ClaimError::SelfLoop(service)) => {
                tracing::debug!(service = %service, "dropping self-loop claim");
            }
            Err(ClaimError::EmptyService) => {
                self.malformed_lines += 1;
            }
        }
    }
}

/// A parser from raw source data to dependency claims.
pub trait SourceAdapter: Send + Sync {
    /// Source tag this adapter registers under (e.g. `router-log`).
    fn name(&self) -> &'static str;

    /// Baseline confidence this adapter assigns when a line carries no
    /// stronger signal.
    fn default_confidence(&self) -> f64;

    /// Cheap content probe: does this input look like our format?
    fn can_process(&self, raw: &str) -> bool;

    /// Parse raw input into claims.
    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError>;
}

/// Registry of adapters, keyed by source tag.
///
/// Registration order doubles as content-probe order.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Registry with every built-in adapter.
    ///
    /// Registration runs specific grammars before permissive ones so the
    /// content probe cannot be shadowed (e.g. Istio configs are YAML, but
    /// the gateway adapter must see them first).
    pub fn with_defaults() -> Self {
        let mut registry = Self { adapters: Vec::new() };
        registry.register(Arc::new(RouterLogAdapter::new()));
        registry.register(Arc::new(NetworkScanAdapter::new()));
        registry.register(Arc::new(ObservabilityAdapter::new()));
        registry.register(Arc::new(ApiGatewayAdapter::new()));
        registry.register(Arc::new(CicdPipelineAdapter::new()));
        registry.register(Arc::new(KubernetesAdapter::new()));
        registry.register(Arc::new(ConfigFileAdapter::new()));
        registry.register(Arc::new(CustomTextAdapter::new()));
        registry
    }

    /// Registry restricted to the named adapters (unknown names are
    /// skipped with a warning). An empty or entirely-unknown list means
    /// all defaults.
    pub fn with_enabled(names: &[String]) -> Self {
        if names.is_empty() {
            return Self::with_defaults();
        }
        let all = Self::with_defaults();
        let mut registry = Self { adapters: Vec::new() };
        for name in names {
            match all.get(name) {
                Some(adapter) => registry.adapters.push(adapter),
                None => tracing::warn!(adapter = %name, "unknown adapter name in configuration"),
            }
        }
        if registry.adapters.is_empty() {
            tracing::warn!("no configured adapter names resolved, keeping defaults");
            return all;
        }
        registry
    }

    /// Register an adapter. Later registrations with the same name shadow
    /// earlier ones for `get`, but probe order keeps first registration.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Look up an adapter by source tag.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        let name = name.trim().to_lowercase();
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Registered source tags, in probe order.
    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Choose an adapter for a batch.
    ///
    /// Order: explicit caller hint, filename pattern, content probe, then
    /// the router-log fallback (with a warning).
    pub fn detect(
        &self,
        hint: Option<&str>,
        filename: Option<&str>,
        raw: &str,
    ) -> Arc<dyn SourceAdapter> {
        if let Some(hint) = hint {
            if let Some(adapter) = self.get(hint) {
                return adapter;
            }
            tracing::warn!(hint = %hint, "unknown source type hint, falling back to detection");
        }

        if let Some(name) = filename.and_then(|f| Self::match_filename(f, raw)) {
            if let Some(adapter) = self.get(name) {
                return adapter;
            }
        }

        for adapter in &self.adapters {
            if adapter.can_process(raw) {
                return Arc::clone(adapter);
            }
        }

        tracing::warn!("no adapter matched input, falling back to router-log");
        self.get("router-log")
            .unwrap_or_else(|| Arc::clone(&self.adapters[0]))
    }

    /// Filename-pattern half of detection.
    fn match_filename(filename: &str, raw: &str) -> Option<&'static str> {
        let lower = filename.to_lowercase();
        let base = lower.rsplit('/').next().unwrap_or(&lower);

        if base.contains("docker-compose") || base == "jenkinsfile" || base.contains("gitlab-ci") {
            return Some("cicd-pipeline");
        }
        if base.ends_with(".log") {
            return Some("router-log");
        }
        if base.ends_with(".properties") || base.ends_with(".conf") || base.ends_with(".ini") {
            return Some("configuration-file");
        }
        if base.ends_with(".yaml") || base.ends_with(".yml") {
            if raw.lines().any(|l| l.trim_start().starts_with("kind:")) {
                return Some("kubernetes");
            }
            return None;
        }
        None
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// First DNS label of a hostname (`payment.internal.corp` -> `payment`).
pub(crate) fn host_label(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Whether a target string is a bare IPv4 address.
pub(crate) fn is_ipv4(s: &str) -> bool {
    let mut octets = 0;
    for part in s.split('.') {
        if part.is_empty() || part.len() > 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        octets += 1;
    }
    octets == 4
}
