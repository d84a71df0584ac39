//! API-gateway adapter.
//!
//! Recognizes route declarations from Kong, AWS API Gateway, NGINX
//! upstreams, Istio VirtualServices, and a generic `route: A -> B weight:n`
//! form. Routes are strong evidence: all claims carry 0.95.

use regex_lite::Regex;

use crate::normalize::ensure_suffix;
use crate::types::{Claim, DependencyType, ServiceName};
use super::{host_label, is_ipv4, AdapterError, ParsedClaims, SourceAdapter};

const GATEWAY_CONFIDENCE: f64 = 0.95;

/// Adapter for API-gateway configuration and logs.
pub struct ApiGatewayAdapter {
    generic_route: Regex,
    upstream_open: Regex,
    upstream_server: Regex,
    url_value: Regex,
    istio_host: Regex,
    aws_uri: Regex,
}

impl ApiGatewayAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self {
            generic_route: Regex::new(
                r"route:\s*(?P<from>[A-Za-z0-9_.-]+)\s*->\s*(?P<to>[A-Za-z0-9_.-]+)(?:\s+weight:(?P<weight>\d+))?",
            )
            .expect("route grammar"),
            upstream_open: Regex::new(r"^\s*upstream\s+(?P<name>[A-Za-z0-9_-]+)\s*\{")
                .expect("upstream grammar"),
            upstream_server: Regex::new(
                r"^\s*server\s+(?P<host>[A-Za-z0-9_.-]+)(?::(?P<port>\d+))?\s*;",
            )
            .expect("server grammar"),
            url_value: Regex::new(r"url:\s*https?://(?P<host>[A-Za-z0-9_.-]+)(?::(?P<port>\d+))?")
                .expect("url grammar"),
            istio_host: Regex::new(r"^\s*host:\s*(?P<host>[A-Za-z0-9_.-]+)\s*$")
                .expect("istio grammar"),
            aws_uri: Regex::new(r"uri:\s*\S*https?://(?P<host>[A-Za-z0-9_.-]+)(?::(?P<port>\d+))?")
                .expect("aws grammar"),
        }
    }

    fn push_route(
        &self,
        out: &mut ParsedClaims,
        from: ServiceName,
        host: &str,
        port: Option<&str>,
        gateway: &str,
        raw: &str,
    ) {
        if host.eq_ignore_ascii_case("localhost") || is_ipv4(host) {
            return;
        }
        let label = host_label(host);
        let mut claim = Claim::new(
            from,
            ServiceName::new(ensure_suffix(label, "-service")),
            DependencyType::ApiCall,
            GATEWAY_CONFIDENCE,
            self.name(),
        )
        .map(|c| c.with_raw_data(raw.trim()).with_metadata("gateway", gateway));
        if let Some(port) = port {
            claim = claim.map(|c| c.with_metadata("target_port", port));
        }
        out.push(claim);
    }
}

impl Default for ApiGatewayAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for ApiGatewayAdapter {
    fn name(&self) -> &'static str {
        "api-gateway"
    }

    fn default_confidence(&self) -> f64 {
        GATEWAY_CONFIDENCE
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines().take(200).any(|l| self.generic_route.is_match(l))
            || raw.contains("upstream ")
            || raw.contains("x-amazon-apigateway")
            || raw.contains("VirtualService")
            || (raw.contains("kong") && raw.contains("url:"))
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        let is_istio = raw.contains("VirtualService");
        let is_aws = raw.contains("x-amazon-apigateway") || raw.contains("arn:aws:apigateway");
        let is_kong = raw.contains("kong");

        let mut upstream: Option<ServiceName> = None;

        for line in raw.lines() {
            // Generic form carries its own endpoints.
            if let Some(caps) = self.generic_route.captures(line) {
                let mut claim = Claim::new(
                    ServiceName::new(&caps["from"]),
                    ServiceName::new(&caps["to"]),
                    DependencyType::ApiCall,
                    GATEWAY_CONFIDENCE,
                    self.name(),
                )
                .map(|c| c.with_raw_data(line.trim()).with_metadata("gateway", "generic"));
                if let Some(weight) = caps.name("weight") {
                    claim = claim.map(|c| c.with_metadata("weight", weight.as_str()));
                }
                out.push(claim);
                continue;
            }

            // NGINX upstream blocks: the gateway fronts each server entry.
            if let Some(caps) = self.upstream_open.captures(line) {
                upstream = Some(ServiceName::new(&caps["name"]));
                continue;
            }
            if let Some(caps) = self.upstream_server.captures(line) {
                if upstream.is_some() {
                    self.push_route(
                        &mut out,
                        ServiceName::new("nginx-gateway"),
                        &caps["host"],
                        caps.name("port").map(|p| p.as_str()),
                        "nginx",
                        line,
                    );
                }
                continue;
            }
            if line.trim() == "}" {
                upstream = None;
                continue;
            }

            if is_aws {
                if let Some(caps) = self.aws_uri.captures(line) {
                    self.push_route(
                        &mut out,
                        ServiceName::new("aws-api-gateway"),
                        &caps["host"],
                        caps.name("port").map(|p| p.as_str()),
                        "aws",
                        line,
                    );
                    continue;
                }
            }

            if is_istio {
                if let Some(caps) = self.istio_host.captures(line) {
                    self.push_route(&mut out, ServiceName::new("istio-gateway"), &caps["host"], None, "istio", line);
                    continue;
                }
            }

            if is_kong {
                if let Some(caps) = self.url_value.captures(line) {
                    self.push_route(
                        &mut out,
                        ServiceName::new("kong-gateway"),
                        &caps["host"],
                        caps.name("port").map(|p| p.as_str()),
                        "kong",
                        line,
                    );
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfidenceBand;

    #[test]
    fn test_generic_route() {
        let adapter = ApiGatewayAdapter::new();
        let parsed = adapter.process("route: web-portal -> user-service weight:80\n").unwrap();
        assert_eq!(parsed.claims.len(), 1);
        let claim = &parsed.claims[0];
        assert_eq!(claim.from_service().as_str(), "web-portal");
        assert_eq!(claim.to_service().as_str(), "user-service");
        assert_eq!(claim.confidence(), 0.95);
        assert_eq!(claim.confidence_band(), ConfidenceBand::VeryHigh);
        assert_eq!(claim.metadata().get("weight").map(String::as_str), Some("80"));
    }

    #[test]
    fn test_nginx_upstream() {
        let adapter = ApiGatewayAdapter::new();
        let raw = "upstream backend {\n    server user-service:8080;\n    server order.internal:8081;\n}\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 2);
        assert_eq!(parsed.claims[0].from_service().as_str(), "nginx-gateway");
        assert_eq!(parsed.claims[0].to_service().as_str(), "user-service");
        assert_eq!(parsed.claims[1].to_service().as_str(), "order-service");
        assert_eq!(parsed.claims[1].metadata().get("target_port").map(String::as_str), Some("8081"));
    }

    #[test]
    fn test_istio_virtual_service() {
        let adapter = ApiGatewayAdapter::new();
        let raw = "kind: VirtualService\nspec:\n  http:\n    - route:\n      - destination:\n          host: payment-service\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 1);
        assert_eq!(parsed.claims[0].from_service().as_str(), "istio-gateway");
        assert_eq!(parsed.claims[0].to_service().as_str(), "payment-service");
    }

    #[test]
    fn test_kong_url() {
        let adapter = ApiGatewayAdapter::new();
        let raw = "# kong declarative config\nservices:\n  - name: users\n    url: http://user-management-service:8080\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 1);
        assert_eq!(parsed.claims[0].from_service().as_str(), "kong-gateway");
        assert_eq!(parsed.claims[0].to_service().as_str(), "user-management-service");
    }

    #[test]
    fn test_aws_integration_uri() {
        let adapter = ApiGatewayAdapter::new();
        let raw = "x-amazon-apigateway-integration:\n  uri: http://billing.internal:9000/invoke\n";
        let parsed = adapter.process(raw).unwrap();
        assert_eq!(parsed.claims.len(), 1);
        assert_eq!(parsed.claims[0].from_service().as_str(), "aws-api-gateway");
        assert_eq!(parsed.claims[0].to_service().as_str(), "billing-service");
    }
}
