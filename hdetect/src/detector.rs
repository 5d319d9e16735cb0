//! The single capability every check implements.

use std::sync::Arc;

use crate::detection::Detection;

/// Substrings that mark a verifiable source. Matched case-sensitively.
pub const CITATION_MARKERS: &[&str] = &["http://", "https://", "doi.org"];

/// A pure check from text to [`Detection`].
///
/// Implementations must not panic on malformed input; problems with the text
/// are reported as reasons. Plain closures implement this trait, so
/// user-supplied checks need no wrapper type:
///
/// ```rust
/// use hdetect::{Detection, Detector, Severity};
///
/// let no_todo = |text: &str| {
///     if text.contains("TODO") {
///         Detection::fail(["todo_found"], Severity::Warn)
///     } else {
///         Detection::pass()
///     }
/// };
/// assert!(!no_todo.detect(r#"{"x":"TODO"}"#).ok());
/// ```
pub trait Detector: Send + Sync {
    /// Run the check over `text`.
    fn detect(&self, text: &str) -> Detection;

    /// Short label used in log output.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> Detector for F
where
    F: Fn(&str) -> Detection + Send + Sync,
{
    fn detect(&self, text: &str) -> Detection {
        self(text)
    }
}

/// Shared handle to any detector.
pub type SharedDetector = Arc<dyn Detector>;

/// An ordered list of detectors, as produced by the registry and consumed by
/// the aggregator.
pub type DetectorList = Vec<SharedDetector>;

/// Wrap a detector value into a [`SharedDetector`].
#[must_use]
pub fn shared<D: Detector + 'static>(detector: D) -> SharedDetector {
    Arc::new(detector)
}

/// Whether `text` contains any citation marker.
#[must_use]
pub fn has_citation(text: &str) -> bool {
    CITATION_MARKERS.iter().any(|marker| text.contains(marker))
}
