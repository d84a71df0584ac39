//! Network-discovery adapter.
//!
//! Two-phase parse of scanner output:
//!
//! ```text
//! HOST: 192.168.1.10 (web-frontend)
//! PORT: 80/tcp open http
//! PORT: 443/tcp open https nginx 1.21
//! HOST: 192.168.1.20 (db-server)
//! PORT: 3306/tcp open mysql MySQL 8.0
//! ```
//!
//! Pass one collects hosts and their open services; pass two pairs every
//! service on one host with every service on each other host and grades
//! the pairing: HIGH for a web tier talking to a SQL store, MEDIUM for
//! any other rule-table pattern, LOW for everything else.

use regex_lite::Regex;

use crate::types::{Claim, ConfidenceBand, DependencyType, ServiceName};
use super::{AdapterError, ParsedClaims, SourceAdapter};

/// Which backing services a given service type is known to consume.
const DEPENDENCY_RULES: &[(&str, &[&str])] = &[
    ("http", &["mysql", "postgresql", "redis", "mongodb", "memcached"]),
    ("https", &["mysql", "postgresql", "redis", "mongodb", "memcached"]),
    ("tomcat", &["mysql", "postgresql"]),
    ("nodejs", &["mongodb", "redis"]),
    ("php", &["mysql"]),
];

const WEB_TIER: &[&str] = &["http", "https"];
const SQL_SERVICES: &[&str] = &["mysql", "postgresql"];

#[derive(Debug)]
struct OpenPort {
    port: u16,
    proto: String,
    service: String,
    version: Option<String>,
}

#[derive(Debug)]
struct HostRecord {
    ip: String,
    name: ServiceName,
    ports: Vec<OpenPort>,
}

/// Adapter for network scan reports.
pub struct NetworkScanAdapter {
    host_line: Regex,
    port_line: Regex,
}

impl NetworkScanAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self {
            host_line: Regex::new(
                r"^HOST:\s*(?P<ip>\d{1,3}(?:\.\d{1,3}){3})\s*\((?P<name>[^)]+)\)\s*$",
            )
            .expect("host grammar"),
            port_line: Regex::new(
                r"^PORT:\s*(?P<port>\d+)/(?P<proto>\w+)\s+open\s+(?P<svc>[A-Za-z0-9_-]+)(?:\s+(?P<ver>.+))?$",
            )
            .expect("port grammar"),
        }
    }

    fn rule_targets(service: &str) -> Option<&'static [&'static str]> {
        DEPENDENCY_RULES
            .iter()
            .find(|(ty, _)| *ty == service)
            .map(|(_, targets)| *targets)
    }

    /// Three-way confidence partition for a cross-host service pairing.
    fn confidence_for(source_service: &str, target_service: &str) -> f64 {
        if WEB_TIER.contains(&source_service) && SQL_SERVICES.contains(&target_service) {
            ConfidenceBand::High.nominal()
        } else if Self::rule_targets(source_service)
            .is_some_and(|targets| targets.contains(&target_service))
        {
            ConfidenceBand::Medium.nominal()
        } else {
            ConfidenceBand::Low.nominal()
        }
    }

    /// Phase one: collect HOST blocks with their PORT lines.
    fn collect_hosts(&self, raw: &str, out: &mut ParsedClaims) -> Vec<HostRecord> {
        let mut hosts: Vec<HostRecord> = Vec::new();

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.host_line.captures(line) {
                hosts.push(HostRecord {
                    ip: caps["ip"].to_string(),
                    name: ServiceName::new(&caps["name"]),
                    ports: Vec::new(),
                });
                continue;
            }

            if let Some(caps) = self.port_line.captures(line) {
                let Some(host) = hosts.last_mut() else {
                    tracing::warn!(line = line_no + 1, "PORT line before any HOST block");
                    out.malformed_lines += 1;
                    continue;
                };
                let port: u16 = match caps["port"].parse() {
                    Ok(p) => p,
                    Err(_) => {
                        out.malformed_lines += 1;
                        continue;
                    }
                };
                host.ports.push(OpenPort {
                    port,
                    proto: caps["proto"].to_string(),
                    service: caps["svc"].to_lowercase(),
                    version: caps.name("ver").map(|v| v.as_str().trim().to_string()),
                });
                continue;
            }

            if line.starts_with("HOST:") || line.starts_with("PORT:") {
                tracing::warn!(line = line_no + 1, "skipping malformed scan line");
                out.malformed_lines += 1;
            }
        }

        hosts
    }
}

impl Default for NetworkScanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for NetworkScanAdapter {
    fn name(&self) -> &'static str {
        "network-discovery"
    }

    fn default_confidence(&self) -> f64 {
        ConfidenceBand::Medium.nominal()
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines().take(100).any(|line| self.host_line.is_match(line.trim()))
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();
        let hosts = self.collect_hosts(raw, &mut out);

        // Phase two: grade every cross-host service pairing.
        for source in &hosts {
            for target in &hosts {
                if source.ip == target.ip {
                    continue;
                }
                for sp in &source.ports {
                    for tp in &target.ports {
                        let mut claim = Claim::new(
                            source.name.clone(),
                            target.name.clone(),
                            DependencyType::Runtime,
                            Self::confidence_for(&sp.service, &tp.service),
                            self.name(),
                        )
                        .map(|c| {
                            c.with_raw_data(format!(
                                "{} ({}) -> {} ({}:{})",
                                source.name, sp.service, target.name, tp.service, tp.port
                            ))
                            .with_metadata("source_ip", &source.ip)
                            .with_metadata("target_ip", &target.ip)
                            .with_metadata("target_port", tp.port.to_string())
                            .with_metadata("protocol", &tp.proto)
                            .with_metadata("service", &tp.service)
                        });
                        if let Some(version) = &tp.version {
                            claim = claim.map(|c| c.with_metadata("version", version));
                        }
                        out.push(claim);
                    }
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = "HOST: 192.168.1.10 (web-frontend)\n\
                        PORT: 80/tcp open http\n\
                        PORT: 443/tcp open https nginx 1.21\n\
                        HOST: 192.168.1.20 (db-server)\n\
                        PORT: 3306/tcp open mysql MySQL 8.0\n";

    fn claims_between<'a>(parsed: &'a ParsedClaims, from: &str, to: &str) -> Vec<&'a Claim> {
        parsed
            .claims
            .iter()
            .filter(|c| c.from_service().as_str() == from && c.to_service().as_str() == to)
            .collect()
    }

    #[test]
    fn test_web_to_sql_is_high() {
        let adapter = NetworkScanAdapter::new();
        let parsed = adapter.process(SCAN).unwrap();

        // http->mysql and https->mysql
        let forward = claims_between(&parsed, "web-frontend", "db-server");
        assert_eq!(forward.len(), 2);
        for claim in &forward {
            assert_eq!(claim.confidence_band(), ConfidenceBand::High);
            assert_eq!(claim.metadata().get("target_port").map(String::as_str), Some("3306"));
        }

        // The reverse pairing has no known pattern and grades LOW.
        let reverse = claims_between(&parsed, "db-server", "web-frontend");
        assert_eq!(reverse.len(), 2);
        for claim in &reverse {
            assert_eq!(claim.confidence_band(), ConfidenceBand::Low);
        }

        assert_eq!(parsed.claims.len(), 4);
    }

    #[test]
    fn test_other_known_pattern_is_medium() {
        let adapter = NetworkScanAdapter::new();
        let raw = "HOST: 10.0.0.1 (api-node)\n\
                   PORT: 3000/tcp open nodejs\n\
                   HOST: 10.0.0.2 (cache-node)\n\
                   PORT: 6379/tcp open redis\n";
        let parsed = adapter.process(raw).unwrap();

        let forward = claims_between(&parsed, "api-node", "cache-node");
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].confidence_band(), ConfidenceBand::Medium);

        let reverse = claims_between(&parsed, "cache-node", "api-node");
        assert_eq!(reverse.len(), 1);
        assert_eq!(reverse[0].confidence_band(), ConfidenceBand::Low);
    }

    #[test]
    fn test_target_outside_rule_set_is_low() {
        let adapter = NetworkScanAdapter::new();
        // php's rule set is only mysql; mongodb falls outside it.
        let raw = "HOST: 10.0.0.1 (legacy-app)\n\
                   PORT: 80/tcp open php\n\
                   HOST: 10.0.0.2 (doc-store)\n\
                   PORT: 27017/tcp open mongodb\n";
        let parsed = adapter.process(raw).unwrap();

        let forward = claims_between(&parsed, "legacy-app", "doc-store");
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].confidence_band(), ConfidenceBand::Low);
    }

    #[test]
    fn test_unknown_service_types_still_claim_low() {
        let adapter = NetworkScanAdapter::new();
        // Neither ssh nor ftp appears anywhere in the rule table; the
        // pairing still yields a LOW claim in each direction.
        let raw = "HOST: 10.0.0.1 (bastion)\n\
                   PORT: 22/tcp open ssh\n\
                   HOST: 10.0.0.2 (file-drop)\n\
                   PORT: 21/tcp open ftp\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 2);
        for claim in &parsed.claims {
            assert_eq!(claim.confidence_band(), ConfidenceBand::Low);
        }
        assert_eq!(claims_between(&parsed, "bastion", "file-drop").len(), 1);
        assert_eq!(claims_between(&parsed, "file-drop", "bastion").len(), 1);
    }

    #[test]
    fn test_unknown_source_to_known_store_is_low() {
        let adapter = NetworkScanAdapter::new();
        // ssh has no rule entry; the mysql target still gets its LOW claim.
        let raw = "HOST: 10.0.0.1 (bastion)\n\
                   PORT: 22/tcp open ssh\n\
                   HOST: 10.0.0.2 (db-server)\n\
                   PORT: 3306/tcp open mysql\n";
        let parsed = adapter.process(raw).unwrap();

        let forward = claims_between(&parsed, "bastion", "db-server");
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].confidence_band(), ConfidenceBand::Low);
    }

    #[test]
    fn test_orphan_port_counted() {
        let adapter = NetworkScanAdapter::new();
        let parsed = adapter.process("PORT: 80/tcp open http\n").unwrap();
        assert!(parsed.claims.is_empty());
        assert_eq!(parsed.malformed_lines, 1);
    }

    #[test]
    fn test_no_cross_host_within_same_host() {
        let adapter = NetworkScanAdapter::new();
        let raw = "HOST: 10.0.0.1 (all-in-one)\n\
                   PORT: 80/tcp open http\n\
                   PORT: 3306/tcp open mysql\n";
        let parsed = adapter.process(raw).unwrap();
        assert!(parsed.claims.is_empty());
    }
}
