//! Built-in detectors.
//!
//! Every built-in is stateless except [`Overconfidence`], which reads the
//! shared [`ConfidenceKeywords`] list on each call so a keyword update is
//! visible to detector lists that were built earlier.

use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;

use crate::detection::{Detection, Severity};
use crate::detector::{Detector, SharedDetector, has_citation, shared};

/// Canonical order of the built-in detectors.
pub const BUILTIN_ORDER: [&str; 6] = [
    JSON,
    OVERCONFIDENCE,
    CONTRADICTIONS,
    LOGICAL_FALLACIES,
    FACT_CHECK,
    NUMERIC_CLAIMS,
];

pub const JSON: &str = "json";
pub const OVERCONFIDENCE: &str = "overconfidence";
pub const CONTRADICTIONS: &str = "contradictions";
pub const LOGICAL_FALLACIES: &str = "logical_fallacies";
pub const FACT_CHECK: &str = "fact_check";
pub const NUMERIC_CLAIMS: &str = "numeric_claims";

/// Keywords the overconfidence check looks for unless replaced.
pub const DEFAULT_CONFIDENCE_KEYWORDS: &[&str] = &["definitely", "certainly", "undeniably"];

const SUGGESTION: &str = "suggestion";

const CONTRADICTION_PATTERNS: &[&str] = &[
    r"\b(?:always|never)\b[^.!?]*\b(?:sometimes|occasionally|rarely)\b",
    r"\b(?:is|are|was|were)\s+(?:both\s+)?true\s+and\s+(?:also\s+)?false\b",
    r"\bcontrary to what (?:i|we) (?:said|stated|claimed)\b",
    r"\bbut (?:also|at the same time) (?:not|never)\b",
    r"\b(?:impossible|cannot happen)\b[^.!?]*\b(?:happened|occurred)\b",
];

const FALLACY_PATTERNS: &[&str] = &[
    // appeal to popularity
    r"\beveryone knows\b",
    r"\b(?:all|most) experts agree\b",
    // false dichotomy
    r"\beither\b[^.!?]{1,80}\bor\b",
    // ad hominem
    r"\byou can(?:not|'t|\x{2019}t) trust\b",
    // appeal to obviousness
    r"\bobviously\b",
    r"\bslippery slope\b",
    r"\bbecause (?:i|we|they) said so\b",
];

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| match Regex::new(&format!("(?i){p}")) {
            Ok(regex) => regex,
            Err(err) => panic!("Invalid built-in detector regex {p}: {err}"),
        })
        .collect()
}

static CONTRADICTIONS_RE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(CONTRADICTION_PATTERNS));

static FALLACIES_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_all(FALLACY_PATTERNS));

static FACT_RE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"(?i)\bfacts?\b") {
    Ok(regex) => regex,
    Err(err) => panic!("Invalid fact regex: {err}"),
});

/// A four-digit number, or a number followed by `%` that is not itself
/// followed by a word character.
static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"\b\d{4}\b|\b\d+(?:\.\d+)?%(?:\W|$)") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid numeric claim regex: {err}"),
    });

/// Process-wide list of overconfidence keywords, shared by handle.
///
/// Cloning the handle shares the list; [`ConfidenceKeywords::set`] is last
/// write wins and visible to every holder.
#[derive(Debug, Clone)]
pub struct ConfidenceKeywords {
    inner: Arc<RwLock<Vec<String>>>,
}

impl Default for ConfidenceKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_KEYWORDS.iter().copied())
    }
}

impl ConfidenceKeywords {
    /// A new list holding `keywords` (lowercased, blanks dropped).
    #[must_use]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            inner: Arc::new(RwLock::new(normalize_keywords(keywords))),
        }
    }

    /// Replace the keyword list for all holders of this handle.
    pub fn set<I, S>(&self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = normalize_keywords(keywords);
        tracing::debug!(keywords = ?normalized, "confidence keywords replaced");
        *self.inner.write() = normalized;
    }

    /// Restore [`DEFAULT_CONFIDENCE_KEYWORDS`].
    pub fn reset(&self) {
        self.set(DEFAULT_CONFIDENCE_KEYWORDS.iter().copied());
    }

    /// Snapshot of the current list.
    #[must_use]
    pub fn get(&self) -> Vec<String> {
        self.inner.read().clone()
    }

    fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.inner.read().iter().any(|k| lowered.contains(k.as_str()))
    }
}

fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Flags input that does not parse as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWellFormed;

impl Detector for JsonWellFormed {
    fn detect(&self, text: &str) -> Detection {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(_) => Detection::pass(),
            Err(_) => Detection::fail(["invalid_json"], Severity::Block),
        }
    }

    fn name(&self) -> &str {
        JSON
    }
}

/// Flags confident wording with no citation marker.
#[derive(Debug, Clone, Default)]
pub struct Overconfidence {
    keywords: ConfidenceKeywords,
}

impl Overconfidence {
    #[must_use]
    pub fn new(keywords: ConfidenceKeywords) -> Self {
        Self { keywords }
    }
}

impl Detector for Overconfidence {
    fn detect(&self, text: &str) -> Detection {
        if self.keywords.matches(text) && !has_citation(text) {
            return Detection::fail(["overconfident_no_citations"], Severity::Warn).with_patch(
                SUGGESTION,
                "Add a citation (URL or DOI) supporting the claim, or soften the wording.",
            );
        }
        Detection::pass()
    }

    fn name(&self) -> &str {
        OVERCONFIDENCE
    }
}

/// Flags phrases that usually signal a self-contradiction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contradictions;

impl Detector for Contradictions {
    fn detect(&self, text: &str) -> Detection {
        if CONTRADICTIONS_RE.iter().any(|re| re.is_match(text)) {
            return Detection::fail(["possible_contradiction"], Severity::Warn);
        }
        Detection::pass()
    }

    fn name(&self) -> &str {
        CONTRADICTIONS
    }
}

/// Flags common rhetorical fallacies. Informational only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalFallacies;

impl Detector for LogicalFallacies {
    fn detect(&self, text: &str) -> Detection {
        if FALLACIES_RE.iter().any(|re| re.is_match(text)) {
            return Detection::fail(["possible_logical_fallacy"], Severity::Info);
        }
        Detection::pass()
    }

    fn name(&self) -> &str {
        LOGICAL_FALLACIES
    }
}

/// Stub fact check: anything presented as "fact" needs a citation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactCheck;

impl Detector for FactCheck {
    fn detect(&self, text: &str) -> Detection {
        if FACT_RE.is_match(text) && !has_citation(text) {
            return Detection::fail(["unverified_fact"], Severity::Warn)
                .with_patch(SUGGESTION, "Cite a source for statements presented as fact.");
        }
        Detection::pass()
    }

    fn name(&self) -> &str {
        FACT_CHECK
    }
}

/// Flags years and percentages with no citation marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericClaims;

impl Detector for NumericClaims {
    fn detect(&self, text: &str) -> Detection {
        if NUMERIC_RE.is_match(text) && !has_citation(text) {
            return Detection::fail(["numeric_claims_without_citation"], Severity::Warn)
                .with_patch(
                    SUGGESTION,
                    "Cite a source (URL or DOI) for numeric and percentage claims.",
                );
        }
        Detection::pass()
    }

    fn name(&self) -> &str {
        NUMERIC_CLAIMS
    }
}

/// Built-in detectors in canonical order, with the overconfidence check bound
/// to `keywords`.
#[must_use]
pub fn builtin_detectors(keywords: &ConfidenceKeywords) -> Vec<(&'static str, SharedDetector)> {
    vec![
        (JSON, shared(JsonWellFormed)),
        (OVERCONFIDENCE, shared(Overconfidence::new(keywords.clone()))),
        (CONTRADICTIONS, shared(Contradictions)),
        (LOGICAL_FALLACIES, shared(LogicalFallacies)),
        (FACT_CHECK, shared(FactCheck)),
        (NUMERIC_CLAIMS, shared(NumericClaims)),
    ]
}
