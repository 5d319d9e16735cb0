//! Run configuration for single and batch detection.
//!
//! The core never reads files, environment variables or argv; callers fill
//! these structs (the CLI from its flags) and pass them in.

use crate::builtin::JSON;
use crate::detector::DetectorList;
use crate::registry::{BuildSpec, Registry};

/// What to run for one [`detect`](crate::detect) call.
#[derive(Clone, Default)]
#[non_exhaustive]
pub struct DetectConfig {
    /// Drop the `json` well-formedness check (for raw, non-JSON text).
    pub skip_json: bool,
    /// Registry selection. An empty spec means the canonical built-in list.
    pub build: BuildSpec,
    /// Detectors appended after the registry list, e.g. loaded rule files.
    pub extra: DetectorList,
}

impl std::fmt::Debug for DetectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectConfig")
            .field("skip_json", &self.skip_json)
            .field("build", &self.build)
            .field("extra", &self.extra.len())
            .finish()
    }
}

impl DetectConfig {
    /// Resolve the ordered detector list against `registry`.
    ///
    /// With an empty [`BuildSpec`] this is [`Registry::default_checks`];
    /// otherwise the registry builds the list and `skip_json` excludes `json`
    /// from it. `extra` detectors always run last.
    #[must_use]
    pub fn checks(&self, registry: &Registry) -> DetectorList {
        let mut checks = if self.build.is_empty() {
            registry.default_checks(self.skip_json)
        } else if self.skip_json {
            registry.build(&self.build.clone().exclude([JSON]))
        } else {
            registry.build(&self.build)
        };
        checks.extend(self.extra.iter().cloned());
        checks
    }
}

/// Options for [`detect_batch`](crate::detect_batch).
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct BatchConfig {
    /// Worker threads. `None` uses the available parallelism.
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Detection, Severity};
    use crate::detector::shared;

    #[test]
    fn test_empty_build_uses_default_checks() {
        let registry = Registry::new();
        registry
            .register_fn("custom", |_: &str| Detection::fail(["c"], Severity::Warn))
            .unwrap();

        let config = DetectConfig::default();
        assert_eq!(config.checks(&registry).len(), 6);

        let mut skip = DetectConfig::default();
        skip.skip_json = true;
        assert_eq!(skip.checks(&registry).len(), 5);
    }

    #[test]
    fn test_skip_json_applies_to_explicit_build() {
        let registry = Registry::new();
        let mut config = DetectConfig::default();
        config.build = BuildSpec::new().include(["json", "overconfidence"]);
        config.skip_json = true;

        let checks = config.checks(&registry);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name(), "overconfidence");
    }

    #[test]
    fn test_extra_detectors_run_last() {
        let registry = Registry::new();
        let mut config = DetectConfig::default();
        config.extra = vec![shared(|_: &str| Detection::fail(["rule"], Severity::Info))];

        let checks = config.checks(&registry);
        assert_eq!(checks.len(), 7);
        assert!(checks[6].detect("{}").has_reason("rule"));
    }
}
