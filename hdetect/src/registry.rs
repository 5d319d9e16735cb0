//! Catalog of named detectors and assembly of ordered detector lists.
//!
//! Two tiers:
//! - built-ins, fixed at construction, in [`BUILTIN_ORDER`];
//! - user detectors, in registration order. Re-registering a name replaces
//!   the detector in its original slot.
//!
//! A user detector registered under a built-in name shadows that built-in in
//! [`Registry::build`]; it then runs in the built-in's slot.
//!
//! The user tier sits behind one `RwLock`. [`Registry::build`] resolves the
//! whole list under a single read guard, so it never sees a half-applied
//! registration.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::builtin::{BUILTIN_ORDER, ConfidenceKeywords, JSON, builtin_detectors};
use crate::detection::{Detection, Severity};
use crate::detector::{Detector, DetectorList, SharedDetector, shared};
use crate::error::DetectError;

/// Which detectors to run, in which order, and at what minimum severity.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct BuildSpec {
    /// Exact names and order to use. Unknown names are dropped.
    /// `None` means built-ins then user detectors.
    pub include: Option<Vec<String>>,
    /// Names removed after ordering.
    pub exclude: Vec<String>,
    /// Per-name severity floor. Only raises the severity of failing results.
    pub severity_overrides: HashMap<String, Severity>,
}

impl BuildSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn override_severity(mut self, name: impl Into<String>, severity: Severity) -> Self {
        self.severity_overrides.insert(name.into(), severity);
        self
    }

    /// True when no include, exclude or override was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_empty() && self.severity_overrides.is_empty()
    }
}

/// Raises the severity of the wrapped detector's failures to a floor.
///
/// Passing results go through untouched, and a failure already above the
/// floor keeps its severity.
#[derive(Clone)]
pub struct EscalatedDetector {
    name: String,
    inner: SharedDetector,
    floor: Severity,
}

impl EscalatedDetector {
    #[must_use]
    pub fn new(name: impl Into<String>, inner: SharedDetector, floor: Severity) -> Self {
        Self {
            name: name.into(),
            inner,
            floor,
        }
    }
}

impl Detector for EscalatedDetector {
    fn detect(&self, text: &str) -> Detection {
        self.inner.detect(text).escalate(self.floor)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Detector catalog. Construct one at startup and pass it by reference.
pub struct Registry {
    builtins: Vec<(&'static str, SharedDetector)>,
    user: RwLock<Vec<(String, SharedDetector)>>,
    keywords: ConfidenceKeywords,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("detectors", &self.list(true))
            .field("keywords", &self.keywords.get())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// A registry with the built-ins, no user detectors and the default
    /// confidence keywords.
    #[must_use]
    pub fn new() -> Self {
        Self::with_keywords(ConfidenceKeywords::default())
    }

    /// A registry whose overconfidence check reads `keywords`.
    #[must_use]
    pub fn with_keywords(keywords: ConfidenceKeywords) -> Self {
        Self {
            builtins: builtin_detectors(&keywords),
            user: RwLock::new(Vec::new()),
            keywords,
        }
    }

    /// Register or replace a user detector.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidName`] when `name` is empty or blank.
    pub fn register(&self, name: &str, detector: SharedDetector) -> Result<(), DetectError> {
        if name.trim().is_empty() {
            return Err(DetectError::InvalidName);
        }
        let mut user = self.user.write();
        if let Some(slot) = user.iter_mut().find(|(existing, _)| existing == name) {
            slot.1 = detector;
            tracing::debug!(name, "replaced user detector");
        } else {
            user.push((name.to_owned(), detector));
            tracing::debug!(name, "registered user detector");
        }
        Ok(())
    }

    /// Register a plain value or closure; see [`Registry::register`].
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidName`] when `name` is empty or blank.
    pub fn register_fn<D: Detector + 'static>(
        &self,
        name: &str,
        detector: D,
    ) -> Result<(), DetectError> {
        self.register(name, shared(detector))
    }

    /// Remove every user detector. Built-ins stay.
    pub fn clear(&self) {
        self.user.write().clear();
        tracing::debug!("user detectors cleared");
    }

    /// Detector names: built-ins first (when requested), then user detectors in
    /// registration order.
    #[must_use]
    pub fn list(&self, include_builtin: bool) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if include_builtin {
            names.extend(BUILTIN_ORDER.iter().map(|n| (*n).to_owned()));
        }
        names.extend(self.user.read().iter().map(|(name, _)| name.clone()));
        names
    }

    /// Whether `name` resolves to a built-in or user detector.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        BUILTIN_ORDER.contains(&name) || self.user.read().iter().any(|(n, _)| n == name)
    }

    /// Shared keyword list read by the `overconfidence` built-in.
    #[must_use]
    pub fn keywords(&self) -> &ConfidenceKeywords {
        &self.keywords
    }

    /// Replace the confidence keywords; visible to lists built earlier too.
    pub fn set_confidence_keywords<I, S>(&self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.set(keywords);
    }

    /// Build the ordered detector list described by `spec`.
    #[must_use]
    pub fn build(&self, spec: &BuildSpec) -> DetectorList {
        self.build_named(spec)
            .into_iter()
            .map(|(_, detector)| detector)
            .collect()
    }

    /// Like [`Registry::build`], keeping the resolved name of each entry.
    #[must_use]
    pub fn build_named(&self, spec: &BuildSpec) -> Vec<(String, SharedDetector)> {
        let user = self.user.read();
        let lookup = |name: &str| -> Option<SharedDetector> {
            user.iter()
                .find(|(n, _)| n == name)
                .map(|(_, d)| d.clone())
                .or_else(|| {
                    self.builtins
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, d)| d.clone())
                })
        };

        let ordered: Vec<String> = match &spec.include {
            Some(include) => include
                .iter()
                .filter(|name| {
                    let known = lookup(name.as_str()).is_some();
                    if !known {
                        tracing::warn!(name = name.as_str(), "ignoring unknown detector name");
                    }
                    known
                })
                .cloned()
                .collect(),
            None => BUILTIN_ORDER
                .iter()
                .map(|n| (*n).to_owned())
                .chain(
                    user.iter()
                        .map(|(n, _)| n.clone())
                        .filter(|n| !BUILTIN_ORDER.contains(&n.as_str())),
                )
                .collect(),
        };

        let excluded: HashSet<&str> = spec.exclude.iter().map(String::as_str).collect();
        let built: Vec<(String, SharedDetector)> = ordered
            .into_iter()
            .filter(|name| !excluded.contains(name.as_str()))
            .filter_map(|name| {
                let detector = lookup(name.as_str())?;
                let detector = match spec.severity_overrides.get(&name) {
                    Some(&floor) => shared(EscalatedDetector::new(name.clone(), detector, floor)),
                    None => detector,
                };
                Some((name, detector))
            })
            .collect();

        tracing::debug!(
            detectors = ?built.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            "built detector list"
        );
        built
    }

    /// The canonical built-in list, or every built-in except `json` when
    /// `skip_json` is set (for raw, non-JSON text).
    ///
    /// User detectors, including ones that shadow a built-in name, are not
    /// part of this list.
    #[must_use]
    pub fn default_checks(&self, skip_json: bool) -> DetectorList {
        self.builtins
            .iter()
            .filter(|(name, _)| !(skip_json && *name == JSON))
            .map(|(_, detector)| detector.clone())
            .collect()
    }
}
