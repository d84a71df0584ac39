//! Kubernetes manifest adapter.
//!
//! Splits multi-document YAML on `---`, classifies each document by
//! `kind:`, and mines dependency hints:
//!
//! - Deployment/StatefulSet env vars (`*_URL`, `*_HOST`, `*_SERVICE`,
//!   `*_ENDPOINT`) and configMap/secret refs
//! - Service selector `app:` labels
//! - Ingress `host` → backend service name
//!
//! Parsing is line-oriented and tolerant: manifests are mined for hints,
//! not schema-validated.

use regex_lite::Regex;

use crate::types::{Claim, ConfidenceBand, DependencyType, ServiceName};
use super::{host_label, is_ipv4, AdapterError, ParsedClaims, SourceAdapter};

/// Adapter for Kubernetes manifests.
pub struct KubernetesAdapter {
    kind_line: Regex,
    name_line: Regex,
    env_name: Regex,
    env_value: Regex,
    ref_name: Regex,
    app_label: Regex,
    ingress_host: Regex,
    backend_name: Regex,
    url_host: Regex,
}

impl KubernetesAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self {
            kind_line: Regex::new(r"^kind:\s*(?P<kind>\w+)\s*$").expect("kind grammar"),
            name_line: Regex::new(r"^\s*name:\s*(?P<name>[A-Za-z0-9_.-]+)\s*$").expect("name grammar"),
            env_name: Regex::new(
                r"-\s*name:\s*(?P<var>[A-Z][A-Z0-9_]*(?:_URL|_HOST|_SERVICE|_ENDPOINT))\s*$",
            )
            .expect("env grammar"),
            env_value: Regex::new(r"^\s*value:\s*['\x22]?(?P<value>[^'\x22\s]+)['\x22]?\s*$")
                .expect("env value grammar"),
            ref_name: Regex::new(
                r"(?:configMapKeyRef|secretKeyRef|configMapRef|secretRef):\s*$",
            )
            .expect("ref grammar"),
            app_label: Regex::new(r"^\s*app(?:\.kubernetes\.io/name)?:\s*(?P<app>[A-Za-z0-9_.-]+)\s*$")
                .expect("app label grammar"),
            ingress_host: Regex::new(r"^\s*-?\s*host:\s*(?P<host>[A-Za-z0-9_.-]+)\s*$")
                .expect("ingress host grammar"),
            backend_name: Regex::new(r"^\s*(?:serviceName|name):\s*(?P<name>[A-Za-z0-9_.-]+)\s*$")
                .expect("backend grammar"),
            url_host: Regex::new(r"https?://(?P<host>[A-Za-z0-9_.-]+)").expect("url grammar"),
        }
    }

    /// Derive a service name from an env var value, falling back to the
    /// var name itself (`USER_SERVICE_URL` -> `user-service`).
    fn target_from_env(&self, var: &str, value: &str) -> Option<ServiceName> {
        if let Some(caps) = self.url_host.captures(value) {
            let host = &caps["host"];
            if host.eq_ignore_ascii_case("localhost") || is_ipv4(host) {
                return None;
            }
            return Some(ServiceName::new(host_label(host)));
        }
        // Bare hostname value.
        if value.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            let label = host_label(value.split(':').next().unwrap_or(value));
            if !label.eq_ignore_ascii_case("localhost") {
                return Some(ServiceName::new(label));
            }
            return None;
        }
        // Fall back to the variable name minus its hint suffix.
        let stripped = var
            .strip_suffix("_URL")
            .or_else(|| var.strip_suffix("_HOST"))
            .or_else(|| var.strip_suffix("_SERVICE"))
            .or_else(|| var.strip_suffix("_ENDPOINT"))?;
        if stripped.is_empty() {
            return None;
        }
        Some(ServiceName::new(stripped))
    }

    fn document_name(&self, doc: &str) -> Option<ServiceName> {
        let mut in_metadata = false;
        for line in doc.lines() {
            let trimmed = line.trim_end();
            if trimmed == "metadata:" {
                in_metadata = true;
                continue;
            }
            if in_metadata {
                if let Some(caps) = self.name_line.captures(trimmed) {
                    return Some(ServiceName::new(&caps["name"]));
                }
                if !trimmed.starts_with(' ') && !trimmed.is_empty() {
                    in_metadata = false;
                }
            }
        }
        None
    }

    fn process_workload(&self, doc: &str, out: &mut ParsedClaims) {
        let Some(workload) = self.document_name(doc) else {
            return;
        };

        let mut pending_env: Option<String> = None;
        let mut pending_ref = false;

        for line in doc.lines() {
            if let Some(caps) = self.env_name.captures(line) {
                pending_env = Some(caps["var"].to_string());
                pending_ref = false;
                continue;
            }
            if let Some(var) = pending_env.take() {
                if let Some(caps) = self.env_value.captures(line) {
                    if let Some(target) = self.target_from_env(&var, &caps["value"]) {
                        out.push(
                            Claim::new(
                                workload.clone(),
                                target,
                                DependencyType::Configuration,
                                ConfidenceBand::High.nominal(),
                                self.name(),
                            )
                            .map(|c| c.with_raw_data(line.trim()).with_metadata("env_var", &var)),
                        );
                    }
                    continue;
                }
                // Value may come from a ref on the following lines; keep scanning.
            }
            if self.ref_name.is_match(line) {
                pending_ref = true;
                continue;
            }
            if pending_ref {
                if let Some(caps) = self.name_line.captures(line) {
                    out.push(
                        Claim::new(
                            workload.clone(),
                            ServiceName::new(&caps["name"]),
                            DependencyType::Configuration,
                            ConfidenceBand::Medium.nominal(),
                            self.name(),
                        )
                        .map(|c| c.with_raw_data(line.trim()).with_metadata("ref", "configmap")),
                    );
                }
                pending_ref = false;
            }
        }
    }

    fn process_service(&self, doc: &str, out: &mut ParsedClaims) {
        let Some(service) = self.document_name(doc) else {
            return;
        };
        let mut in_selector = false;
        for line in doc.lines() {
            let trimmed = line.trim_end();
            if trimmed.trim() == "selector:" {
                in_selector = true;
                continue;
            }
            if in_selector {
                if let Some(caps) = self.app_label.captures(trimmed) {
                    out.push(
                        Claim::new(
                            service.clone(),
                            ServiceName::new(&caps["app"]),
                            DependencyType::Runtime,
                            ConfidenceBand::High.nominal(),
                            self.name(),
                        )
                        .map(|c| c.with_raw_data(trimmed.trim()).with_metadata("selector", "app")),
                    );
                    in_selector = false;
                } else if !trimmed.trim().contains(':') {
                    in_selector = false;
                }
            }
        }
    }

    fn process_ingress(&self, doc: &str, out: &mut ParsedClaims) {
        let mut current_host: Option<String> = None;
        let mut in_backend = false;
        for line in doc.lines() {
            if let Some(caps) = self.ingress_host.captures(line) {
                current_host = Some(caps["host"].to_string());
                in_backend = false;
                continue;
            }
            if line.trim_start().starts_with("backend:") || line.trim_start().starts_with("service:") {
                in_backend = true;
                continue;
            }
            if in_backend {
                if let Some(caps) = self.backend_name.captures(line) {
                    if let Some(host) = &current_host {
                        out.push(
                            Claim::new(
                                ServiceName::new(host.replace('.', "-")),
                                ServiceName::new(&caps["name"]),
                                DependencyType::ApiCall,
                                ConfidenceBand::VeryHigh.nominal(),
                                self.name(),
                            )
                            .map(|c| c.with_raw_data(line.trim()).with_metadata("ingress_host", host)),
                        );
                    }
                    in_backend = false;
                }
            }
        }
    }
}

impl Default for KubernetesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for KubernetesAdapter {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    fn default_confidence(&self) -> f64 {
        ConfidenceBand::High.nominal()
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines().any(|l| self.kind_line.is_match(l.trim_end()))
            && (raw.contains("apiVersion") || raw.contains("metadata:"))
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        for doc in raw.split("\n---").map(|d| d.trim_start_matches("---")) {
            let kind = doc
                .lines()
                .find_map(|l| self.kind_line.captures(l.trim_end()))
                .map(|caps| caps["kind"].to_string());

            match kind.as_deref() {
                Some("Deployment") | Some("StatefulSet") => self.process_workload(doc, &mut out),
                Some("Service") => self.process_service(doc, &mut out),
                Some("Ingress") => self.process_ingress(doc, &mut out),
                // ConfigMaps carry no dependency edges of their own.
                _ => {}
            }
        }

        Ok(out)
    }
}
