//! Rule-based safety and quality checks applied to generated text.
//!
//! The engine runs two independent evaluations — a keyword-based safety
//! check and a length-based quality check — and then applies a single
//! remediation policy:
//!
//! 1. Everything passed → the text is returned unchanged.
//! 2. Safety failed → a fixed disclaimer line is prepended; the text itself
//!    is not rewritten.
//! 3. Only quality failed → the text is returned unchanged. Quality issues
//!    are informational.
//!
//! The keyword matching is deliberately crude (case-insensitive substring
//! search). It is a demonstration stand-in for a real moderation backend,
//! and the matching behavior is part of the observable contract.

use serde::{Deserialize, Serialize};

use crate::config::GuardrailConfig;

/// Disclaimer line prepended when a safety rule fires.
pub const SAFETY_DISCLAIMER: &str =
    "Note: Some requested content was modified to adhere to safety guidelines.";

/// Fixed set of safety rule categories.
///
/// Ordered as declared; evaluation and issue ordering follow this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    HarmfulContent,
    SensitiveTopics,
    PersonalData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One safety rule hit.
#[derive(Debug, Clone, Serialize)]
pub struct SafetyIssue {
    pub category: SafetyCategory,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    MinLength,
    MaxLength,
}

/// One quality rule hit.
#[derive(Debug, Clone, Serialize)]
pub struct QualityIssue {
    pub check: QualityCheck,
    pub message: String,
    pub severity: Severity,
}

/// Combined result of one evaluation pass. Recomputed on every call;
/// carries no identity across requests.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub safety_passed: bool,
    pub safety_issues: Vec<SafetyIssue>,
    pub quality_passed: bool,
    pub quality_issues: Vec<QualityIssue>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.safety_passed && self.quality_passed
    }
}

/// Evaluates generated text against the configured rule set.
///
/// Holds no per-request state; safe to share across concurrent requests.
pub struct GuardrailEngine {
    rules: GuardrailConfig,
}

impl GuardrailEngine {
    pub fn new(rules: GuardrailConfig) -> Self {
        Self { rules }
    }

    /// Run the safety rules: case-insensitive substring search of every
    /// configured keyword. Each match produces one high-severity issue.
    pub fn evaluate_safety(&self, text: &str) -> Vec<SafetyIssue> {
        let text_lower = text.to_lowercase();
        let mut issues = Vec::new();

        for (category, keywords) in &self.rules.safety_rules {
            for keyword in keywords {
                if text_lower.contains(&keyword.to_lowercase()) {
                    issues.push(SafetyIssue {
                        category: *category,
                        message: format!("Contains potentially problematic term: {}", keyword),
                        severity: Severity::High,
                    });
                }
            }
        }

        issues
    }

    /// Run the quality rules: character length against the configured
    /// bounds. The coherence threshold is reserved and not evaluated.
    pub fn evaluate_quality(&self, text: &str) -> Vec<QualityIssue> {
        let len = text.chars().count();
        let mut issues = Vec::new();

        if len < self.rules.quality.min_length {
            issues.push(QualityIssue {
                check: QualityCheck::MinLength,
                message: "Response is too short".to_string(),
                severity: Severity::Medium,
            });
        }

        if len > self.rules.quality.max_length {
            issues.push(QualityIssue {
                check: QualityCheck::MaxLength,
                message: "Response is too long".to_string(),
                severity: Severity::Low,
            });
        }

        issues
    }

    /// Evaluate both rule sets and return the full report.
    pub fn report(&self, text: &str) -> ValidationReport {
        let safety_issues = self.evaluate_safety(text);
        let quality_issues = self.evaluate_quality(text);

        ValidationReport {
            safety_passed: safety_issues.is_empty(),
            quality_passed: quality_issues.is_empty(),
            safety_issues,
            quality_issues,
        }
    }

    /// Apply the remediation policy and return the text to hand back to the
    /// caller. Content issues never produce an error.
    ///
    /// A safety failure prepends [`SAFETY_DISCLAIMER`]; a quality-only
    /// failure leaves the text untouched. Re-validating a remediated text
    /// adds a second disclaimer — the disclaimer line itself is clean, but
    /// the original offending content still trips the rules.
    pub fn validate(&self, text: &str) -> String {
        let report = self.report(text);

        if report.passed() {
            return text.to_string();
        }

        if !report.safety_passed {
            return format!("{}\n\n{}", SAFETY_DISCLAIMER, text);
        }

        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GuardrailEngine {
        GuardrailEngine::new(GuardrailConfig::default())
    }

    const CLEAN: &str = "Kubernetes groups containers into logical units for easy management.";

    #[test]
    fn test_clean_text_passes_unchanged() {
        let out = engine().validate(CLEAN);
        assert_eq!(out, CLEAN);
    }

    #[test]
    fn test_safety_hit_prepends_disclaimer_verbatim() {
        let text = "This response discusses violence in historical context.";
        let out = engine().validate(text);
        assert_eq!(out, format!("{}\n\n{}", SAFETY_DISCLAIMER, text));
    }

    #[test]
    fn test_safety_matching_is_case_insensitive() {
        let issues = engine().evaluate_safety("Never share your PASSWORDS with anyone at all.");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, SafetyCategory::PersonalData);
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn test_one_issue_per_matching_keyword() {
        let issues = engine().evaluate_safety("violence and politics and passwords");
        assert_eq!(issues.len(), 3);
        // Issues arrive in category order: harmful, sensitive, personal.
        assert_eq!(issues[0].category, SafetyCategory::HarmfulContent);
        assert_eq!(issues[1].category, SafetyCategory::SensitiveTopics);
        assert_eq!(issues[2].category, SafetyCategory::PersonalData);
    }

    #[test]
    fn test_short_text_fails_quality_but_passes_through() {
        let text = "Too short.";
        let e = engine();
        let report = e.report(text);
        assert!(!report.quality_passed);
        assert!(report.safety_passed);
        assert_eq!(report.quality_issues[0].check, QualityCheck::MinLength);
        assert_eq!(report.quality_issues[0].severity, Severity::Medium);
        // Quality failures are informational only.
        assert_eq!(e.validate(text), text);
    }

    #[test]
    fn test_long_text_flagged_low_severity() {
        let text = "x".repeat(1001);
        let report = engine().report(&text);
        assert!(!report.quality_passed);
        assert_eq!(report.quality_issues[0].check, QualityCheck::MaxLength);
        assert_eq!(report.quality_issues[0].severity, Severity::Low);
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let e = engine();
        assert!(e.report(&"x".repeat(20)).quality_passed);
        assert!(e.report(&"x".repeat(1000)).quality_passed);
        assert!(!e.report(&"x".repeat(19)).quality_passed);
    }

    #[test]
    fn test_disclaimer_is_not_idempotent() {
        let text = "A sentence mentioning violence, long enough to pass the length rule.";
        let e = engine();
        let once = e.validate(text);
        let twice = e.validate(&once);
        assert_ne!(once, twice);
        assert!(twice.starts_with(&format!("{}\n\n{}", SAFETY_DISCLAIMER, SAFETY_DISCLAIMER)));
    }

    #[test]
    fn test_disclaimer_alone_is_clean() {
        let report = engine().report(SAFETY_DISCLAIMER);
        assert!(report.safety_passed);
    }
}
