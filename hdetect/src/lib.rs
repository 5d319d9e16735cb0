//! # hdetect
//!
//! Heuristic detector engine for spotting unsupported claims in LLM output.
//!
//! A [`Detector`] is a pure check from text to [`Detection`]. The crate ships
//! six built-ins, JSON Schema guards and regex rules loaded from JSON/YAML.
//! A [`Registry`] selects, orders and re-grades them, and [`detect_text`]
//! merges their results into a single verdict.
//!
//! ## Quick Start
//!
//! ```rust
//! use hdetect::{BuildSpec, Detection, Registry, Severity, detect_text, shared};
//!
//! let registry = Registry::new();
//! registry
//!     .register("no_todo", shared(|text: &str| {
//!         if text.contains("TODO") {
//!             Detection::fail(["todo_found"], Severity::Warn)
//!         } else {
//!             Detection::pass()
//!         }
//!     }))
//!     .unwrap();
//!
//! let checks = registry.build(
//!     &BuildSpec::new()
//!         .include(["json", "no_todo"])
//!         .override_severity("no_todo", Severity::Block),
//! );
//!
//! let result = detect_text(r#"{"x":"TODO: fill this"}"#, &checks);
//! assert!(!result.ok());
//! assert_eq!(result.reasons(), ["todo_found"]);
//! assert_eq!(result.severity(), Severity::Block);
//! ```

mod batch;
pub mod builtin;
mod config;
mod detection;
mod detector;
mod engine;
mod error;
pub mod output;
mod registry;
mod report;
mod rules;
mod schema_guard;

pub use batch::detect_batch;
pub use builtin::{BUILTIN_ORDER, ConfidenceKeywords, DEFAULT_CONFIDENCE_KEYWORDS};
pub use config::{BatchConfig, DetectConfig};
pub use detection::{Detection, Severity};
pub use detector::{
    CITATION_MARKERS, Detector, DetectorList, SharedDetector, has_citation, shared,
};
pub use engine::{detect, detect_text, detect_with_defaults};
pub use error::DetectError;
pub use registry::{BuildSpec, EscalatedDetector, Registry};
pub use report::Report;
pub use rules::{RuleDetector, RuleFormat, RuleSpec, load_custom_rules};
pub use schema_guard::{ValidatorCache, canonical_key, make_schema_guard};
