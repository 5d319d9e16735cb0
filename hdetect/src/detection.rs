//! The uniform result type shared by every detector and by the aggregate run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DetectError;

/// Ordered importance of a detection: `Info < Warn < Block`.
///
/// The derived ordering follows declaration order, so `max` gives the
/// escalation result directly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; never fails a pipeline on its own.
    #[default]
    Info,
    /// Suspicious content that should be reviewed.
    Warn,
    /// Content that must not be passed downstream.
    Block,
}

impl Severity {
    /// Lowercase wire name (`"info"`, `"warn"`, `"block"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "block" => Ok(Self::Block),
            _ => Err(DetectError::UnknownSeverity(s.to_owned())),
        }
    }
}

/// Result of one check, or the merged result of many.
///
/// `ok` is true exactly when `reasons` is empty. The fields are private so the
/// only way to build a value is through [`Detection::pass`] and
/// [`Detection::fail`], which keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    ok: bool,
    reasons: Vec<String>,
    severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    patches: Option<Map<String, Value>>,
}

impl Default for Detection {
    fn default() -> Self {
        Self::pass()
    }
}

impl Detection {
    /// A passing detection: no reasons, severity `info`, no patches.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            ok: true,
            reasons: Vec::new(),
            severity: Severity::Info,
            patches: None,
        }
    }

    /// A failing detection carrying `reasons` at `severity`.
    ///
    /// Repeated reasons are dropped, keeping the first occurrence. An empty
    /// reason list yields [`Detection::pass`].
    #[must_use]
    pub fn fail<I, S>(reasons: I, severity: Severity) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for reason in reasons {
            let reason = reason.into();
            if !unique.contains(&reason) {
                unique.push(reason);
            }
        }
        if unique.is_empty() {
            return Self::pass();
        }
        Self {
            ok: false,
            reasons: unique,
            severity,
            patches: None,
        }
    }

    /// Attach a remediation hint under `key`, replacing any previous value.
    #[must_use]
    pub fn with_patch(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.patches
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Raise the severity of a failing detection to at least `floor`.
    ///
    /// Passing detections are returned unchanged, and a severity above
    /// `floor` is kept as is.
    #[must_use]
    pub fn escalate(mut self, floor: Severity) -> Self {
        if !self.ok {
            self.severity = self.severity.max(floor);
        }
        self
    }

    /// Assemble a detection from already-merged parts.
    pub(crate) fn from_parts(
        reasons: Vec<String>,
        severity: Severity,
        patches: Map<String, Value>,
    ) -> Self {
        let ok = reasons.is_empty();
        Self {
            ok,
            reasons,
            severity: if ok { Severity::Info } else { severity },
            patches: if patches.is_empty() { None } else { Some(patches) },
        }
    }

    /// True when no reasons were produced.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Reason tags in emission order.
    #[must_use]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Remediation hints, if any were attached.
    #[must_use]
    pub fn patches(&self) -> Option<&Map<String, Value>> {
        self.patches.as_ref()
    }

    /// A single patch entry by key.
    #[must_use]
    pub fn patch(&self, key: &str) -> Option<&Value> {
        self.patches.as_ref().and_then(|p| p.get(key))
    }

    /// Whether `reason` is among this detection's reasons.
    #[must_use]
    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason)
    }
}
