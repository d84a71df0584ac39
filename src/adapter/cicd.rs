//! CI/CD pipeline adapter.
//!
//! Extracts `service X depends on [list]` assertions from four pipeline
//! dialects: Jenkins logs, GitLab CI, docker-compose, and Helm charts. All
//! claims carry the fixed 0.8 confidence of declared build-time wiring.

use regex_lite::Regex;

use crate::types::{Claim, DependencyType, ServiceName};
use super::{AdapterError, ParsedClaims, SourceAdapter};

const CICD_CONFIDENCE: f64 = 0.8;

/// Adapter for CI/CD pipeline definitions and logs.
pub struct CicdPipelineAdapter {
    depends_phrase: Regex,
    compose_service: Regex,
    list_item: Regex,
    helm_dep_name: Regex,
    gitlab_needs: Regex,
    jenkins_stage: Regex,
    jenkins_depends: Regex,
}

impl CicdPipelineAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self {
            // Jenkins/GitLab log phrasing: "user-service depends on [a, b]"
            depends_phrase: Regex::new(
                r"(?P<from>[A-Za-z0-9_.-]+)\s+depends\s+on\s+\[(?P<deps>[^\]]*)\]",
            )
            .expect("depends phrase grammar"),
            // docker-compose: two-space-indented service key under services:
            compose_service: Regex::new(r"^  (?P<name>[A-Za-z0-9_-]+):\s*$")
                .expect("compose service grammar"),
            // "- item" list entries
            list_item: Regex::new(r"^\s*-\s*(?P<item>[A-Za-z0-9_.-]+)\s*$").expect("list grammar"),
            // Helm dependency blocks: "- name: postgresql"
            helm_dep_name: Regex::new(r"^\s*-\s*name:\s*(?P<name>[A-Za-z0-9_.-]+)\s*$")
                .expect("helm grammar"),
            // GitLab inline needs: needs: ["build-auth", "build-db"]
            gitlab_needs: Regex::new(r#"needs:\s*\[(?P<deps>[^\]]*)\]"#).expect("needs grammar"),
            // Jenkins groovy: stage('Deploy user-service') { ... }
            jenkins_stage: Regex::new(
                r#"stage\s*\(\s*['\x22](?:Build|Deploy|Test)?\s*(?P<name>[A-Za-z0-9_.-]+)\s*['\x22]\s*\)"#,
            )
            .expect("stage grammar"),
            // Jenkins groovy: dependsOn = ['auth-service', 'db-service']
            jenkins_depends: Regex::new(r"dependsOn\s*=\s*\[(?P<deps>[^\]]*)\]")
                .expect("dependsOn grammar"),
        }
    }

    /// Jenkins groovy: `dependsOn` lists attach to the enclosing stage.
    fn parse_jenkins(&self, raw: &str, out: &mut ParsedClaims) {
        let mut current_stage: Option<ServiceName> = None;
        for line in raw.lines() {
            if let Some(caps) = self.jenkins_stage.captures(line) {
                current_stage = Some(ServiceName::new(&caps["name"]));
                continue;
            }
            if let Some(caps) = self.jenkins_depends.captures(line) {
                if let Some(from) = &current_stage {
                    for dep in Self::split_list(&caps["deps"]) {
                        self.push_claim(out, from.clone(), dep, line);
                    }
                }
            }
        }
    }

    /// Parse a bracketed, comma-separated dependency list.
    fn split_list(deps: &str) -> impl Iterator<Item = ServiceName> + '_ {
        deps.split(',')
            .map(|d| d.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|d| !d.is_empty())
            .map(ServiceName::new)
    }

    /// docker-compose: map each service to its `depends_on` entries.
    fn parse_compose(&self, raw: &str, out: &mut ParsedClaims) {
        let mut current_service: Option<ServiceName> = None;
        let mut in_depends = false;

        for line in raw.lines() {
            if let Some(caps) = self.compose_service.captures(line) {
                current_service = Some(ServiceName::new(&caps["name"]));
                in_depends = false;
                continue;
            }

            let trimmed = line.trim();
            if trimmed.starts_with("depends_on:") {
                if let Some(from) = &current_service {
                    // Inline form: depends_on: [db, cache]
                    if let Some(open) = trimmed.find('[') {
                        if let Some(close) = trimmed.rfind(']') {
                            for dep in Self::split_list(&trimmed[open + 1..close]) {
                                self.push_claim(out, from.clone(), dep, line);
                            }
                            continue;
                        }
                    }
                    in_depends = true;
                }
                continue;
            }

            if in_depends {
                if let Some(caps) = self.list_item.captures(line) {
                    if let Some(from) = &current_service {
                        self.push_claim(out, from.clone(), ServiceName::new(&caps["item"]), line);
                    }
                    continue;
                }
                in_depends = false;
            }
        }
    }

    /// Helm: chart name plus `dependencies:` block names.
    fn parse_helm(&self, raw: &str, out: &mut ParsedClaims) {
        let chart_name = raw
            .lines()
            .map(str::trim)
            .find_map(|l| l.strip_prefix("name:"))
            .map(|n| ServiceName::new(n.trim()));
        let Some(from) = chart_name else {
            return;
        };

        let mut in_dependencies = false;
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed == "dependencies:" {
                in_dependencies = true;
                continue;
            }
            if in_dependencies {
                if let Some(caps) = self.helm_dep_name.captures(line) {
                    self.push_claim(out, from.clone(), ServiceName::new(&caps["name"]), line);
                } else if !trimmed.is_empty()
                    && !trimmed.starts_with('-')
                    && !line.starts_with(' ')
                {
                    in_dependencies = false;
                }
            }
        }
    }

    /// GitLab: job names with inline `needs:` lists.
    fn parse_gitlab(&self, raw: &str, out: &mut ParsedClaims) {
        let mut current_job: Option<ServiceName> = None;
        for line in raw.lines() {
            if !line.starts_with(' ') && line.ends_with(':') && !line.trim().is_empty() {
                let job = line.trim_end_matches(':');
                if !job.contains(' ') && job != "stages" && job != "variables" {
                    current_job = Some(ServiceName::new(job));
                }
                continue;
            }
            if let Some(caps) = self.gitlab_needs.captures(line) {
                if let Some(from) = &current_job {
                    for dep in Self::split_list(&caps["deps"]) {
                        self.push_claim(out, from.clone(), dep, line);
                    }
                }
            }
        }
    }

    fn push_claim(&self, out: &mut ParsedClaims, from: ServiceName, to: ServiceName, raw: &str) {
        out.push(
            Claim::new(from, to, DependencyType::BuildTime, CICD_CONFIDENCE, self.name())
                .map(|c| c.with_raw_data(raw.trim())),
        );
    }
}

impl Default for CicdPipelineAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for CicdPipelineAdapter {
    fn name(&self) -> &'static str {
        "cicd-pipeline"
    }

    fn default_confidence(&self) -> f64 {
        CICD_CONFIDENCE
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.contains("depends on [")
            || (raw.contains("services:") && raw.contains("depends_on"))
            || (raw.contains("dependencies:") && raw.contains("- name:"))
            || raw.contains("needs:")
            || raw.contains("dependsOn")
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        // The phrase form appears in Jenkins and GitLab logs regardless of
        // the surrounding dialect.
        for line in raw.lines() {
            if let Some(caps) = self.depends_phrase.captures(line) {
                let from = ServiceName::new(&caps["from"]);
                for dep in Self::split_list(&caps["deps"]) {
                    self.push_claim(&mut out, from.clone(), dep, line);
                }
            }
        }

        if raw.contains("services:") && raw.contains("depends_on") {
            self.parse_compose(raw, &mut out);
        }
        if raw.contains("dependencies:") {
            self.parse_helm(raw, &mut out);
        }
        if raw.contains("needs:") {
            self.parse_gitlab(raw, &mut out);
        }
        if raw.contains("dependsOn") {
            self.parse_jenkins(raw, &mut out);
        }

        Ok(out)
    }
}
