//! Custom pattern rules loaded from a JSON or YAML document.
//!
//! Accepted shapes:
//!
//! ```yaml
//! # a bare list
//! - pattern: "\\bguaranteed\\b"
//!   reason: guarantee_claim
//!   severity: warn
//!   require_citation: true
//! ```
//!
//! ```json
//! {"rules": [{"pattern": "TODO", "reason": "todo_found", "severity": "block"}]}
//! ```
//!
//! YAML is parsed into a `serde_json::Value` first, so both formats go
//! through the same shape checks.

use std::path::Path;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::detection::{Detection, Severity};
use crate::detector::{Detector, DetectorList, has_citation, shared};
use crate::error::DetectError;

/// Serialization format of a rule document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Json,
    Yaml,
}

impl RuleFormat {
    /// Pick the format from a file extension (`.json`, `.yaml`, `.yml`).
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::UnsupportedRuleFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, DetectError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for RuleFormat {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(DetectError::UnsupportedRuleFormat(s.to_owned())),
        }
    }
}

/// One entry of a rule document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    /// Regular expression, matched case-insensitively.
    pub pattern: String,
    /// Reason tag emitted on a match.
    pub reason: String,
    #[serde(default = "default_rule_severity")]
    pub severity: Severity,
    /// Only fire when the text carries no citation marker.
    #[serde(default)]
    pub require_citation: bool,
    /// Label for logs; defaults to `rule_<index>`.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_rule_severity() -> Severity {
    Severity::Warn
}

/// Detector built from one [`RuleSpec`].
#[derive(Debug, Clone)]
pub struct RuleDetector {
    name: String,
    regex: Regex,
    reason: String,
    severity: Severity,
    require_citation: bool,
}

impl RuleDetector {
    /// Compile `spec`; `index` is used for the default name and messages.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::MalformedRules`] for an empty pattern or reason,
    /// or [`DetectError::InvalidRulePattern`] when the pattern does not compile.
    pub fn new(index: usize, spec: RuleSpec) -> Result<Self, DetectError> {
        if spec.pattern.is_empty() {
            return Err(DetectError::MalformedRules(format!(
                "rule #{index} has an empty pattern"
            )));
        }
        if spec.reason.trim().is_empty() {
            return Err(DetectError::MalformedRules(format!(
                "rule #{index} has an empty reason"
            )));
        }
        let regex = RegexBuilder::new(&spec.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DetectError::InvalidRulePattern {
                pattern: spec.pattern.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            name: spec.name.unwrap_or_else(|| format!("rule_{index}")),
            regex,
            reason: spec.reason,
            severity: spec.severity,
            require_citation: spec.require_citation,
        })
    }
}

impl Detector for RuleDetector {
    fn detect(&self, text: &str) -> Detection {
        if self.regex.is_match(text) && (!self.require_citation || !has_citation(text)) {
            return Detection::fail([self.reason.as_str()], self.severity);
        }
        Detection::pass()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Parse a rule document and build one detector per rule, in document order.
///
/// Every rule is validated before any detector is returned, so a single bad
/// entry fails the whole load.
///
/// # Errors
///
/// Returns [`DetectError::MalformedRules`] when the document does not parse
/// or has the wrong shape, and [`DetectError::InvalidRulePattern`] when a
/// pattern is not a valid regular expression.
pub fn load_custom_rules(source: &str, format: RuleFormat) -> Result<DetectorList, DetectError> {
    let value: Value = match format {
        RuleFormat::Json => serde_json::from_str(source)
            .map_err(|e| DetectError::MalformedRules(format!("JSON parse error: {e}")))?,
        RuleFormat::Yaml => serde_saphyr::from_str(source)
            .map_err(|e| DetectError::MalformedRules(format!("YAML parse error: {e}")))?,
    };

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("rules") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(DetectError::MalformedRules(
                    "object document needs a `rules` list".to_owned(),
                ));
            }
        },
        other => {
            return Err(DetectError::MalformedRules(format!(
                "expected a list of rules or an object with a `rules` list, found {}",
                json_kind(&other)
            )));
        }
    };

    let detectors = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let spec: RuleSpec = serde_json::from_value(entry)
                .map_err(|e| DetectError::MalformedRules(format!("rule #{index}: {e}")))?;
            RuleDetector::new(index, spec).map(shared)
        })
        .collect::<Result<DetectorList, _>>()?;
    tracing::debug!(count = detectors.len(), ?format, "loaded custom rules");
    Ok(detectors)
}
