//! Configuration-file adapter.
//!
//! Line-oriented mining of properties-style configuration for four
//! dependency patterns: JDBC URLs, HTTP(S) endpoint URLs, bare host/server
//! references, and Kafka broker lists. The depending service comes from an
//! application-name key when the file declares one.

use regex_lite::Regex;

use crate::normalize::ensure_suffix;
use crate::types::{Claim, ConfidenceBand, DependencyType, ServiceName};
use super::{host_label, is_ipv4, AdapterError, ParsedClaims, SourceAdapter};

/// Adapter for configuration files.
pub struct ConfigFileAdapter {
    jdbc_url: Regex,
    http_url: Regex,
    app_name_key: Regex,
    host_key: Regex,
    hostname: Regex,
}

impl ConfigFileAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self {
            jdbc_url: Regex::new(
                r"jdbc:(?P<engine>[a-z0-9]+)://(?P<host>[A-Za-z0-9_.-]+)(?::(?P<port>\d+))?(?:/(?P<db>[A-Za-z0-9_-]+))?",
            )
            .expect("jdbc grammar"),
            http_url: Regex::new(
                r"(?P<proto>https?)://(?P<host>[A-Za-z0-9_.-]+)(?::(?P<port>\d+))?",
            )
            .expect("http grammar"),
            app_name_key: Regex::new(
                r"^(?:spring\.application\.name|application\.name|service\.name|app\.name)\s*[=:]\s*(?P<name>\S+)",
            )
            .expect("app name grammar"),
            host_key: Regex::new(r"(?:host|server|address)\s*$").expect("host key grammar"),
            hostname: Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").expect("hostname grammar"),
        }
    }

    /// Split a properties/yaml-ish line into key and value.
    fn split_key_value(line: &str) -> Option<(&str, &str)> {
        if let Some(idx) = line.find('=') {
            return Some((line[..idx].trim(), line[idx + 1..].trim()));
        }
        if let Some(idx) = line.find(": ") {
            return Some((line[..idx].trim(), line[idx + 2..].trim()));
        }
        None
    }

    fn is_ignored_target(host: &str) -> bool {
        host.eq_ignore_ascii_case("localhost") || is_ipv4(host)
    }
}

impl Default for ConfigFileAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for ConfigFileAdapter {
    fn name(&self) -> &'static str {
        "configuration-file"
    }

    fn default_confidence(&self) -> f64 {
        ConfidenceBand::High.nominal()
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines().take(200).any(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return false;
            }
            if line.contains("jdbc:") {
                return true;
            }
            let Some((key, _)) = Self::split_key_value(line) else {
                return false;
            };
            let key_lower = key.to_lowercase();
            line.contains("://")
                || (key_lower.contains("kafka")
                    && (key_lower.contains("broker") || key_lower.contains("servers")))
                // Bare host references only in properties form; scanner
                // output also spells `HOST: ...`.
                || (line.contains('=') && self.host_key.is_match(&key_lower))
        })
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        // The application-name key names the depending service, wherever it
        // appears in the file.
        let from_service = raw
            .lines()
            .filter_map(|l| self.app_name_key.captures(l.trim()))
            .map(|caps| ServiceName::new(&caps["name"]))
            .next()
            .unwrap_or_else(|| ServiceName::new("application"));

        let mut in_block_comment = false;

        for line in raw.lines() {
            let line = line.trim();

            if in_block_comment {
                if line.contains("*/") {
                    in_block_comment = false;
                }
                continue;
            }
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with("//")
                || line.starts_with('*')
            {
                continue;
            }
            if line.starts_with("/*") {
                in_block_comment = !line.contains("*/");
                continue;
            }

            let Some((key, value)) = Self::split_key_value(line) else {
                continue;
            };
            let key_lower = key.to_lowercase();

            // JDBC URL: jdbc:mysql://mysql-primary:3306/portal
            if let Some(caps) = self.jdbc_url.captures(value) {
                if Self::is_ignored_target(&caps["host"]) {
                    continue;
                }
                let host = host_label(&caps["host"]);
                let mut claim = Claim::new(
                    from_service.clone(),
                    ServiceName::new(ensure_suffix(host, "-database")),
                    DependencyType::Configuration,
                    ConfidenceBand::VeryHigh.nominal(),
                    self.name(),
                )
                .map(|c| c.with_raw_data(line).with_metadata("engine", &caps["engine"]));
                if let Some(port) = caps.name("port") {
                    claim = claim.map(|c| c.with_metadata("target_port", port.as_str()));
                }
                if let Some(db) = caps.name("db") {
                    claim = claim.map(|c| c.with_metadata("database", db.as_str()));
                }
                out.push(claim);
                continue;
            }

            // Kafka broker list: kafka.brokers=kafka-service:9092,kafka-2:9092
            if key_lower.contains("kafka")
                && (key_lower.contains("broker") || key_lower.contains("servers"))
            {
                for entry in value.split(',') {
                    let entry = entry.trim();
                    if entry.is_empty() {
                        continue;
                    }
                    let (host, port) = match entry.rsplit_once(':') {
                        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => (h, Some(p)),
                        _ => (entry, None),
                    };
                    if Self::is_ignored_target(host) {
                        continue;
                    }
                    let host = host_label(host);
                    let mut claim = Claim::new(
                        from_service.clone(),
                        ServiceName::new(ensure_suffix(host, "-kafka")),
                        DependencyType::Configuration,
                        ConfidenceBand::VeryHigh.nominal(),
                        self.name(),
                    )
                    .map(|c| c.with_raw_data(line));
                    if let Some(port) = port {
                        claim = claim.map(|c| c.with_metadata("target_port", port));
                    }
                    out.push(claim);
                }
                continue;
            }

            // HTTP(S) endpoint: payment.url=https://payment.internal:8443/api
            if let Some(caps) = self.http_url.captures(value) {
                if Self::is_ignored_target(&caps["host"]) {
                    continue;
                }
                let host = host_label(&caps["host"]);
                let mut claim = Claim::new(
                    from_service.clone(),
                    ServiceName::new(ensure_suffix(host, "-service")),
                    DependencyType::Configuration,
                    ConfidenceBand::VeryHigh.nominal(),
                    self.name(),
                )
                .map(|c| c.with_raw_data(line).with_metadata("protocol", &caps["proto"]));
                if let Some(port) = caps.name("port") {
                    claim = claim.map(|c| c.with_metadata("target_port", port.as_str()));
                }
                out.push(claim);
                continue;
            }

            // Bare host/server reference: inventory.service.host=inventory.internal
            if self.host_key.is_match(&key_lower) && self.hostname.is_match(value) {
                if Self::is_ignored_target(value) {
                    continue;
                }
                let host = host_label(value);
                out.push(
                    Claim::new(
                        from_service.clone(),
                        ServiceName::new(ensure_suffix(host, "-service")),
                        DependencyType::Configuration,
                        ConfidenceBand::High.nominal(),
                        self.name(),
                    )
                    .map(|c| c.with_raw_data(line)),
                );
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jdbc_and_kafka() {
        let adapter = ConfigFileAdapter::new();
        let raw = "kafka.brokers=kafka-service:9092\n\
                   spring.datasource.url=jdbc:mysql://mysql-primary:3306/portal\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 2);

        let kafka = &parsed.claims[0];
        assert_eq!(kafka.to_service().as_str(), "kafka-service");
        assert_eq!(kafka.confidence_band(), ConfidenceBand::VeryHigh);
        assert_eq!(kafka.metadata().get("target_port").map(String::as_str), Some("9092"));

        let jdbc = &parsed.claims[1];
        assert_eq!(jdbc.to_service().as_str(), "mysql-primary-database");
        assert_eq!(jdbc.confidence_band(), ConfidenceBand::VeryHigh);
        assert_eq!(jdbc.metadata().get("database").map(String::as_str), Some("portal"));
    }

    #[test]
    fn test_application_name_sets_from() {
        let adapter = ConfigFileAdapter::new();
        let raw = "spring.application.name=web-portal\n\
                   user.service.url=http://user-management-service:8080\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 1);
        assert_eq!(parsed.claims[0].from_service().as_str(), "web-portal");
        assert_eq!(parsed.claims[0].to_service().as_str(), "user-management-service");
    }

    #[test]
    fn test_bare_host_reference() {
        let adapter = ConfigFileAdapter::new();
        let parsed = adapter.process("inventory.service.host=inventory.internal\n").unwrap();
        assert_eq!(parsed.claims.len(), 1);
        assert_eq!(parsed.claims[0].to_service().as_str(), "inventory-service");
        assert_eq!(parsed.claims[0].confidence_band(), ConfidenceBand::High);
    }

    #[test]
    fn test_localhost_and_ip_ignored() {
        let adapter = ConfigFileAdapter::new();
        let raw = "cache.host=localhost\n\
                   db.url=jdbc:mysql://127.0.0.1:3306/test\n\
                   api.url=http://10.0.0.1:8080\n";
        let parsed = adapter.process(raw).unwrap();
        assert!(parsed.claims.is_empty());
    }

    #[test]
    fn test_comments_skipped() {
        let adapter = ConfigFileAdapter::new();
        let raw = "# db.url=jdbc:mysql://a:3306/x\n\
                   // service.host=b\n\
                   /* block\n\
                   kafka.brokers=inside-comment:9092\n\
                   */\n\
                   * continued\n\
                   real.host=payment.internal\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 1);
        assert_eq!(parsed.claims[0].to_service().as_str(), "payment-service");
    }
}
