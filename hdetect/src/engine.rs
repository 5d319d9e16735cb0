//! The aggregator: runs an ordered detector list and merges the results.

use std::collections::HashSet;

use serde_json::Map;

use crate::config::DetectConfig;
use crate::detection::{Detection, Severity};
use crate::detector::SharedDetector;
use crate::registry::Registry;

/// Run `detectors` over `text` in order and merge their detections.
///
/// - every detector runs; there is no short-circuit on failure;
/// - reasons keep their first-seen order across the whole list, later
///   repeats are dropped;
/// - severity is the maximum over failing detections, `info` if all pass;
/// - patches are merged in detector order, a later key overwrites an
///   earlier one.
#[must_use]
pub fn detect_text(text: &str, detectors: &[SharedDetector]) -> Detection {
    let mut reasons: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut severity = Severity::Info;
    let mut patches = Map::new();

    for detector in detectors {
        let result = detector.detect(text);
        if let Some(found) = result.patches() {
            for (key, value) in found {
                patches.insert(key.clone(), value.clone());
            }
        }
        if result.ok() {
            continue;
        }
        tracing::trace!(
            detector = detector.name(),
            reasons = ?result.reasons(),
            severity = %result.severity(),
            "detector flagged input"
        );
        for reason in result.reasons() {
            if seen.insert(reason.clone()) {
                reasons.push(reason.clone());
            }
        }
        severity = severity.max(result.severity());
    }

    Detection::from_parts(reasons, severity, patches)
}

/// Resolve `config` against `registry` and run the result over `text`.
#[must_use]
pub fn detect(registry: &Registry, text: &str, config: &DetectConfig) -> Detection {
    detect_text(text, &config.checks(registry))
}

/// Run the canonical built-in list with default keywords.
#[must_use]
pub fn detect_with_defaults(text: &str) -> Detection {
    detect_text(text, &Registry::new().default_checks(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::Overconfidence;
    use crate::detector::shared;
    use serde_json::json;

    fn fixed(result: Detection) -> SharedDetector {
        shared(move |_: &str| result.clone())
    }

    #[test]
    fn test_empty_list_passes() {
        let d = detect_text("anything", &[]);
        assert!(d.ok());
        assert_eq!(d.severity(), Severity::Info);
        assert!(d.patches().is_none());
    }

    #[test]
    fn test_same_detector_twice_reports_once() {
        let det = shared(Overconfidence::default());
        let text = json!({"x": "This is definitely true."}).to_string();
        let d = detect_text(&text, &[det.clone(), det]);
        assert_eq!(d.reasons(), ["overconfident_no_citations"]);
    }

    #[test]
    fn test_first_seen_order_and_max_severity() {
        let detectors = vec![
            fixed(Detection::fail(["b", "a"], Severity::Info)),
            fixed(Detection::pass()),
            fixed(Detection::fail(["c", "b"], Severity::Block)),
            fixed(Detection::fail(["a", "d"], Severity::Warn)),
        ];
        let d = detect_text("", &detectors);
        assert!(!d.ok());
        assert_eq!(d.reasons(), ["b", "a", "c", "d"]);
        assert_eq!(d.severity(), Severity::Block);
    }

    #[test]
    fn test_info_only_failure_is_not_ok() {
        let d = detect_text("", &[fixed(Detection::fail(["hint"], Severity::Info))]);
        assert!(!d.ok());
        assert_eq!(d.severity(), Severity::Info);
    }

    #[test]
    fn test_patches_last_write_wins() {
        let detectors = vec![
            fixed(Detection::fail(["a"], Severity::Warn).with_patch("suggestion", "first")),
            fixed(
                Detection::fail(["b"], Severity::Warn)
                    .with_patch("suggestion", "second")
                    .with_patch("extra", 1),
            ),
        ];
        let d = detect_text("", &detectors);
        assert_eq!(d.patch("suggestion"), Some(&json!("second")));
        assert_eq!(d.patch("extra"), Some(&json!(1)));
    }

    #[test]
    fn test_passing_detection_patches_are_kept() {
        let detectors = vec![
            fixed(Detection::pass().with_patch("hint", "x")),
            fixed(Detection::pass()),
        ];
        let d = detect_text("", &detectors);
        assert!(d.ok());
        assert!(d.reasons().is_empty());
        assert_eq!(d.patch("hint"), Some(&json!("x")));
    }

    #[test]
    fn test_defaults_scenarios() {
        let d = detect_with_defaults("not json definitely 95%");
        assert_eq!(d.severity(), Severity::Block);
        assert_eq!(
            d.reasons()[..3],
            [
                "invalid_json",
                "overconfident_no_citations",
                "numeric_claims_without_citation"
            ]
        );

        let d = detect_with_defaults(r#"{"msg":"This is definitely true."}"#);
        assert!(!d.ok());
        assert_eq!(d.severity(), Severity::Warn);
        assert_eq!(d.reasons(), ["overconfident_no_citations"]);

        assert!(detect_with_defaults(r#"{"msg":"This is definitely true https://example.com"}"#).ok());
    }
}
