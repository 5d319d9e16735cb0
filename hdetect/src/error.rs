//! Error types for detector construction and registration.
//!
//! Problems with the *input text* are never errors: they are reported as
//! reasons on a [`Detection`](crate::Detection). The variants here cover
//! configuration that cannot be turned into detectors at all, and are raised
//! before any detection runs.

use thiserror::Error;

/// Construction-time failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DetectError {
    /// The crate was built without the `schema` feature.
    #[error("JSON Schema validation is unavailable: hdetect was built without the `schema` feature")]
    SchemaUnavailable,

    /// The supplied document does not satisfy the JSON Schema meta-schema.
    #[error("Provided schema is not a valid JSON Schema: {reason}")]
    InvalidSchema {
        /// Compiler message for the first problem found.
        reason: String,
    },

    /// A detector was registered under an empty name.
    #[error("Detector name must be a non-empty string")]
    InvalidName,

    /// A rule file extension that maps to no known parser.
    #[error("Unsupported rule file format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedRuleFormat(String),

    /// The rule document could not be parsed or has the wrong shape.
    #[error("Malformed rule document: {0}")]
    MalformedRules(String),

    /// A rule pattern is not a valid regular expression.
    #[error("Invalid rule pattern '{pattern}': {reason}")]
    InvalidRulePattern {
        /// The offending pattern as written in the rule document.
        pattern: String,
        /// Regex compiler message.
        reason: String,
    },

    /// A severity string other than `info`, `warn` or `block`.
    #[error("Unknown severity '{0}' (expected info, warn or block)")]
    UnknownSeverity(String),

    /// The batch worker pool could not be started.
    #[error("Failed to start batch worker pool: {0}")]
    WorkerPool(String),
}
