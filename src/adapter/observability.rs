//! Observability adapter.
//!
//! Three line grammars, each tagging claims with its own source label so
//! reliability and priorities can be tuned per telemetry kind:
//!
//! ```text
//! http_client_requests_total{service="web-portal",target_service="user-service"} 1500
//! 1720088400 3f2a91bc "checkout-service" -> "payment-service" 250ms
//! span_id:a1b2 service:order-service downstream:inventory-service duration:95ms status:OK
//! ```

use chrono::{DateTime, Utc};
use regex_lite::Regex;

use crate::types::{Claim, DependencyType, ServiceName};
use super::{AdapterError, ParsedClaims, SourceAdapter};

/// Source label for Prometheus-style metric lines.
pub const PROMETHEUS_SOURCE: &str = "prometheus-metrics";
/// Source label for Jaeger-style trace lines.
pub const JAEGER_SOURCE: &str = "jaeger-traces";
/// Source label for OpenTelemetry-style span lines.
pub const OTEL_SOURCE: &str = "otel-spans";

/// Adapter for observability exports (metrics, traces, spans).
pub struct ObservabilityAdapter {
    prometheus: Regex,
    label_pair: Regex,
    jaeger: Regex,
    otel: Regex,
}

impl ObservabilityAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self {
            prometheus: Regex::new(
                r"^(?P<metric>[a-zA-Z_:][a-zA-Z0-9_:]*)\{(?P<labels>[^}]*)\}\s+(?P<value>[0-9.eE+-]+)\s*$",
            )
            .expect("prometheus grammar"),
            label_pair: Regex::new(r#"(?P<key>[a-zA-Z_][a-zA-Z0-9_]*)="(?P<value>[^"]*)""#)
                .expect("label grammar"),
            jaeger: Regex::new(
                r#"^(?P<ts>\d{10,13})\s+(?P<trace>[A-Za-z0-9_-]+)\s+"(?P<from>[^"]+)"\s*->\s*"(?P<to>[^"]+)"\s+(?P<dur>\d+)ms\s*$"#,
            )
            .expect("jaeger grammar"),
            otel: Regex::new(
                r"^span_id:(?P<span>\S+)\s+service:(?P<from>\S+)\s+downstream:(?P<to>\S+)\s+duration:(?P<dur>\d+)ms\s+status:(?P<status>\S+)\s*$",
            )
            .expect("otel grammar"),
        }
    }

    /// Metric-name/value heuristic for Prometheus lines.
    fn prometheus_confidence(metric: &str, value: f64) -> f64 {
        let lower = metric.to_lowercase();
        if lower.contains("error") || lower.contains("fail") {
            0.70
        } else if value >= 1000.0 {
            0.90
        } else {
            0.85
        }
    }

    /// Duration heuristic for Jaeger lines.
    fn jaeger_confidence(duration_ms: u64) -> f64 {
        if duration_ms < 100 {
            0.95
        } else if duration_ms < 1000 {
            0.90
        } else {
            0.80
        }
    }

    /// Status/duration heuristic for OpenTelemetry lines.
    fn otel_confidence(status: &str, duration_ms: u64) -> f64 {
        match status.to_uppercase().as_str() {
            "OK" if duration_ms < 500 => 0.95,
            "OK" => 0.90,
            "ERROR" => 0.70,
            _ => 0.85,
        }
    }

    fn parse_epoch(ts: &str) -> Option<DateTime<Utc>> {
        let raw: i64 = ts.parse().ok()?;
        if ts.len() > 10 {
            DateTime::from_timestamp_millis(raw)
        } else {
            DateTime::from_timestamp(raw, 0)
        }
    }
}

impl Default for ObservabilityAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for ObservabilityAdapter {
    fn name(&self) -> &'static str {
        "observability"
    }

    fn default_confidence(&self) -> f64 {
        0.85
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines().take(100).any(|line| {
            let line = line.trim();
            self.otel.is_match(line)
                || self.jaeger.is_match(line)
                || (self.prometheus.is_match(line) && line.contains("target_service="))
        })
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.prometheus.captures(line) {
                let mut service = None;
                let mut target = None;
                for pair in self.label_pair.captures_iter(&caps["labels"]) {
                    match &pair["key"] {
                        "service" => service = Some(pair["value"].to_string()),
                        "target_service" => target = Some(pair["value"].to_string()),
                        _ => {}
                    }
                }
                let (Some(service), Some(target)) = (service, target) else {
                    // Metric without the edge labels is not a dependency line.
                    continue;
                };
                let value: f64 = match caps["value"].parse() {
                    Ok(v) => v,
                    Err(_) => {
                        out.malformed_lines += 1;
                        continue;
                    }
                };
                out.push(
                    Claim::new(
                        ServiceName::new(service),
                        ServiceName::new(target),
                        DependencyType::DataFlow,
                        Self::prometheus_confidence(&caps["metric"], value),
                        PROMETHEUS_SOURCE,
                    )
                    .map(|c| {
                        c.with_raw_data(line)
                            .with_metadata("metric", &caps["metric"])
                            .with_metadata("value", &caps["value"])
                    }),
                );
                continue;
            }

            if let Some(caps) = self.jaeger.captures(line) {
                let duration_ms: u64 = caps["dur"].parse().unwrap_or(0);
                let mut claim = Claim::new(
                    ServiceName::new(&caps["from"]),
                    ServiceName::new(&caps["to"]),
                    DependencyType::ApiCall,
                    Self::jaeger_confidence(duration_ms),
                    JAEGER_SOURCE,
                )
                .map(|c| {
                    c.with_raw_data(line)
                        .with_metadata("trace_id", &caps["trace"])
                        .with_metadata("duration_ms", duration_ms.to_string())
                });
                if let Some(ts) = Self::parse_epoch(&caps["ts"]) {
                    claim = claim.map(|c| c.with_timestamp(ts));
                } else {
                    tracing::warn!(line = line_no + 1, "trace line with unusable timestamp");
                    out.malformed_lines += 1;
                    continue;
                }
                out.push(claim);
                continue;
            }

            if let Some(caps) = self.otel.captures(line) {
                let duration_ms: u64 = caps["dur"].parse().unwrap_or(0);
                out.push(
                    Claim::new(
                        ServiceName::new(&caps["from"]),
                        ServiceName::new(&caps["to"]),
                        DependencyType::ApiCall,
                        Self::otel_confidence(&caps["status"], duration_ms),
                        OTEL_SOURCE,
                    )
                    .map(|c| {
                        c.with_raw_data(line)
                            .with_metadata("span_id", &caps["span"])
                            .with_metadata("duration_ms", duration_ms.to_string())
                            .with_metadata("status", &caps["status"])
                    }),
                );
                continue;
            }

            if line.starts_with("span_id:") || line.contains("target_service=") {
                tracing::warn!(line = line_no + 1, "skipping malformed telemetry line");
                out.malformed_lines += 1;
            }
        }

        Ok(out)
    }
}
