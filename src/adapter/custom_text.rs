//! Free-text adapter.
//!
//! One dependency per line:
//!
//! ```text
//! FROM -> TO [confidence] [source] [timestamp]
//! ```
//!
//! Confidence defaults to 0.8; an explicit source token re-tags the claim;
//! the timestamp is RFC 3339. Comment lines start with `#`.

use chrono::{DateTime, Utc};

use crate::types::{Claim, DependencyType, ServiceName};
use super::{AdapterError, ParsedClaims, SourceAdapter};

const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Adapter for the simple free-text grammar.
pub struct CustomTextAdapter;

impl CustomTextAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }

    /// Parse the optional trailing `[confidence] [source] [timestamp]` tokens.
    fn parse_tail(tokens: &[&str]) -> Option<(f64, Option<String>, Option<DateTime<Utc>>)> {
        let mut confidence = DEFAULT_CONFIDENCE;
        let mut source = None;
        let mut timestamp = None;

        for token in tokens {
            if let Ok(value) = token.parse::<f64>() {
                if !(0.0..=1.0).contains(&value) {
                    return None;
                }
                confidence = value;
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
                timestamp = Some(ts.with_timezone(&Utc));
            } else if token.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                source = Some(token.to_string());
            } else {
                return None;
            }
        }

        Some((confidence, source, timestamp))
    }
}

impl Default for CustomTextAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for CustomTextAdapter {
    fn name(&self) -> &'static str {
        "custom-text"
    }

    fn default_confidence(&self) -> f64 {
        DEFAULT_CONFIDENCE
    }

    fn can_process(&self, raw: &str) -> bool {
        raw.lines().take(100).any(|line| {
            let line = line.trim();
            !line.starts_with('#') && line.contains("->") && line.split("->").count() == 2
        })
    }

    fn process(&self, raw: &str) -> Result<ParsedClaims, AdapterError> {
        let mut out = ParsedClaims::default();

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((from_part, rest)) = line.split_once("->") else {
                continue;
            };
            let from = from_part.trim();
            let mut rest_tokens = rest.split_whitespace();
            let Some(to) = rest_tokens.next() else {
                tracing::warn!(line = line_no + 1, "dependency line missing target");
                out.malformed_lines += 1;
                continue;
            };
            let tail: Vec<&str> = rest_tokens.collect();

            let Some((confidence, source, timestamp)) = Self::parse_tail(&tail) else {
                tracing::warn!(line = line_no + 1, "unparseable dependency annotations");
                out.malformed_lines += 1;
                continue;
            };

            if from.is_empty() || from.contains(char::is_whitespace) {
                out.malformed_lines += 1;
                continue;
            }

            let mut claim = Claim::new(
                ServiceName::new(from),
                ServiceName::new(to),
                DependencyType::Runtime,
                confidence,
                source.as_deref().unwrap_or(self.name()),
            )
            .map(|c| c.with_raw_data(line));
            if let Some(ts) = timestamp {
                claim = claim.map(|c| c.with_timestamp(ts));
            }
            out.push(claim);
        }

        Ok(out)
    }
}
