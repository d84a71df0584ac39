//! Router/access-log adapter.
//!
//! Parses two line shapes:
//!
//! ```text
//! 2024-07-04 10:30:45 [INFO] 192.168.1.100 -> 192.168.1.200:8080 GET /api/users 200 125ms
//! web-portal->user-management-service
//! ```
//!
//! IPs map to service names through a small static table, falling back to
//! `service-<ip-with-dashes>`.

use chrono::NaiveDateTime;
use regex_lite::Regex;

use crate::types::{Claim, ConfidenceBand, DependencyType, ServiceName};
use super::{AdapterError, ParsedClaims, SourceAdapter};

/// Known IP → service assignments for the lab network.
const IP_SERVICE_TABLE: &[(&str, &str)] = &[
    ("192.168.1.100", "web-portal"),
    ("192.168.1.101", "order-service"),
    ("192.168.1.102", "payment-service"),
    ("192.168.1.200", "user-management-service"),
    ("192.168.1.201", "inventory-service"),
    ("192.168.1.210", "mysql-database"),
    ("10.0.0.50", "authentication-service"),
];

/// Adapter for router/access logs.
pub struct RouterLogAdapter {
    full_line: Regex,
    compact_line: Regex,
}

impl RouterLogAdapter {
    /// Create the adapter (compiles the line grammars once).
    pub fn new() -> Self {
        let full_line = Regex::new(
            r"^(?P<ts>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2})\s+\[\w+\]\s+(?P<src>\d{1,3}(?:\.\d{1,3}){3})\s*->\s*(?P<dst>\d{1,3}(?:\.\d{1,3}){3}):(?P<port>\d+)\s+(?P<method>[A-Z]+)\s+(?P<path>\S+)\s+(?P<status>\d{3})\s+(?P<latency>\d+)ms\s*$",
        )
        .expect("router log grammar");
        let compact_line = Regex::new(
            r"^(?P<from>[A-Za-z][A-Za-z0-9_.-]*)\s*->\s*(?P<to>[A-Za-z][A-Za-z0-9_.-]*)\s*$",
        )
        .expect("compact router grammar");
        Self { full_line, compact_line }
    }

    fn service_for_ip(ip: &str) -> ServiceName {
        IP_SERVICE_TABLE
            .iter()
            .find(|(known, _)| *known == ip)
            .map(|(_, name)| ServiceName::new(*name))
            .unwrap_or_else(|| ServiceName::from_ip(ip))
    }

    /// Status/latency confidence ladder.
    fn confidence_for(status: u16, latency_ms: u64) -> f64 {
        match status {
            200..=299 if latency_ms < 1000 => ConfidenceBand::VeryHigh.nominal(),
            200..=299 => ConfidenceBand::High.nominal(),
            400..=499 => ConfidenceBand::Medium.nominal(),
            _ => ConfidenceBand::Low.nominal(),
        }
    }
}

impl Default for RouterLogAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for RouterLogAdapter {
    fn name(&self) -> &'static str {
        "router-log"
    }

    fn default_confidence(&self) -> f64 {
        ConfidenceBand::High.nominal()
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines()
            .take(100)
            .any(|line| self.full_line.is_match(line) || self.compact_line.is_match(line.trim()))
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.full_line.captures(line) {
                let status: u16 = match caps["status"].parse() {
                    Ok(v) => v,
                    Err(_) => {
                        out.malformed_lines += 1;
                        continue;
                    }
                };
                let latency_ms: u64 = caps["latency"].parse().unwrap_or(0);
                let port = &caps["port"];

                let mut claim = Claim::new(
                    Self::service_for_ip(&caps["src"]),
                    Self::service_for_ip(&caps["dst"]),
                    DependencyType::Runtime,
                    Self::confidence_for(status, latency_ms),
                    self.name(),
                );

                let ts = NaiveDateTime::parse_from_str(&caps["ts"], "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(&caps["ts"], "%Y-%m-%dT%H:%M:%S"));
                if let Ok(ts) = ts {
                    claim = claim.map(|c| c.with_timestamp(ts.and_utc()));
                }

                out.push(claim.map(|c| {
                    c.with_raw_data(line)
                        .with_metadata("target_port", port)
                        .with_metadata("http_status", status.to_string())
                        .with_metadata("response_time_ms", latency_ms.to_string())
                        .with_metadata("http_method", &caps["method"])
                        .with_metadata("target_ip", &caps["dst"])
                }));
                continue;
            }

            if let Some(caps) = self.compact_line.captures(line) {
                out.push(
                    Claim::new(
                        ServiceName::new(&caps["from"]),
                        ServiceName::new(&caps["to"]),
                        DependencyType::Runtime,
                        ConfidenceBand::High.nominal(),
                        self.name(),
                    )
                    .map(|c| c.with_raw_data(line)),
                );
                continue;
            }

            // Lines with an arrow were meant for us but did not parse.
            if line.contains("->") {
                tracing::warn!(line = line_no + 1, "skipping malformed router log line");
                out.malformed_lines += 1;
            }
        }

        Ok(out)
    }
}
