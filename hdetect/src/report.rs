//! Summary counts over a collection of detections.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::detection::{Detection, Severity};

/// Outcome counts for a set of aggregate detections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Report {
    /// Number of detections folded in.
    pub total: usize,
    /// Detections with no reasons.
    pub ok: usize,
    /// Detections whose severity is `warn`.
    pub warn: usize,
    /// Detections whose severity is `block`.
    pub block: usize,
    /// Occurrences of each reason tag across all detections.
    pub reasons: BTreeMap<String, usize>,
}

impl Report {
    #[must_use]
    pub fn from_detections<'a, I>(detections: I) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        let mut report = Self::default();
        for detection in detections {
            report.add(detection);
        }
        report
    }

    /// Fold one more detection into the counts.
    pub fn add(&mut self, detection: &Detection) {
        self.total += 1;
        if detection.ok() {
            self.ok += 1;
        }
        match detection.severity() {
            Severity::Warn => self.warn += 1,
            Severity::Block => self.block += 1,
            Severity::Info => {}
        }
        for reason in detection.reasons() {
            *self.reasons.entry(reason.clone()).or_insert(0) += 1;
        }
    }

    /// Number of detections that were not ok.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total - self.ok
    }

    /// True when every detection passed (vacuously true when empty).
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.ok == self.total
    }
}
