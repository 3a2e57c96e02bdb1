//! Build report for a course conversion

use crate::options::ReferenceErrorPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of warning raised during a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// A reference solution failed and its output was replaced
    ReferenceSolutionFailed,
    /// Worked examples are only produced for Python exercises
    UnsupportedLanguage,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::ReferenceSolutionFailed => write!(f, "reference_solution_failed"),
            WarningKind::UnsupportedLanguage => write!(f, "unsupported_language"),
        }
    }
}

/// A warning generated during a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildWarning {
    pub kind: WarningKind,
    /// Question the warning is about
    pub item: String,
    /// Human-readable message
    pub message: String,
}

impl BuildWarning {
    pub fn new(kind: WarningKind, item: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            item: item.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Question {}: {}", self.item, self.message)
    }
}

/// Statistics about the build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStatistics {
    pub assignments: usize,
    /// Top-level questions written
    pub questions: usize,
    /// Count of each question variant, sub-exercises included
    pub variant_counts: HashMap<String, usize>,
    pub assets_copied: usize,
    pub examples_run: usize,
    pub example_failures: usize,
    pub warning_count: usize,
}

impl BuildStatistics {
    pub fn increment_variant(&mut self, variant: &str) {
        *self.variant_counts.entry(variant.to_string()).or_insert(0) += 1;
    }
}

/// Complete build report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub input: String,
    pub output: String,
    pub on_reference_error: ReferenceErrorPolicy,
    pub timestamp: String,
    pub duration_ms: u64,
    pub statistics: BuildStatistics,
    pub warnings: Vec<BuildWarning>,
}

impl BuildReport {
    pub fn new(input: &str, output: &str, on_reference_error: ReferenceErrorPolicy) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            on_reference_error,
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_ms: 0,
            statistics: BuildStatistics::default(),
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, warning: BuildWarning) {
        self.statistics.warning_count += 1;
        self.warnings.push(warning);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("PreTeXt Build Report\n");
        output.push_str("====================\n");
        output.push_str(&format!("Input:  {}\n", self.input));
        output.push_str(&format!("Output: {}\n", self.output));
        output.push_str(&format!("Policy: {}\n", self.on_reference_error));
        output.push_str(&format!("Date:   {}\n", self.timestamp));
        output.push_str(&format!("Time:   {}ms\n\n", self.duration_ms));

        output.push_str("Statistics\n");
        output.push_str("----------\n");
        output.push_str(&format!("Assignments:     {}\n", self.statistics.assignments));
        output.push_str(&format!("Questions:       {}\n", self.statistics.questions));
        output.push_str(&format!("Assets copied:   {}\n", self.statistics.assets_copied));
        output.push_str(&format!(
            "Examples run:    {} ({} failed)\n",
            self.statistics.examples_run, self.statistics.example_failures
        ));
        output.push_str(&format!("Warnings:        {}\n\n", self.statistics.warning_count));

        if !self.statistics.variant_counts.is_empty() {
            output.push_str("Question types\n");
            output.push_str("--------------\n");
            let mut variants: Vec<_> = self.statistics.variant_counts.iter().collect();
            variants.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (variant, count) in variants {
                output.push_str(&format!("✓ {}: {}\n", variant, count));
            }
            output.push('\n');
        }

        if !self.warnings.is_empty() {
            output.push_str("Warnings\n");
            output.push_str("--------\n");
            for warning in &self.warnings {
                output.push_str(&format!("⚠ [{}] {}\n", warning.kind, warning));
            }
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_counted() {
        let mut report = BuildReport::new("course.mbz", "out", ReferenceErrorPolicy::Placeholder);
        report.add_warning(BuildWarning::new(
            WarningKind::UnsupportedLanguage,
            "301",
            "no worked examples for java",
        ));
        assert_eq!(report.statistics.warning_count, 1);
        assert_eq!(report.warnings[0].to_string(), "Question 301: no worked examples for java");
    }

    #[test]
    fn text_report_lists_variants_and_warnings() {
        let mut report = BuildReport::new("course.mbz", "out", ReferenceErrorPolicy::Fail);
        report.statistics.increment_variant("fill-in");
        report.statistics.increment_variant("fill-in");
        report.statistics.increment_variant("matching");
        report.add_warning(BuildWarning::new(
            WarningKind::ReferenceSolutionFailed,
            "12",
            "exited with exit status: 1",
        ));

        let text = report.to_text();
        assert!(text.contains("Policy: fail"));
        assert!(text.contains("✓ fill-in: 2\n✓ matching: 1"));
        assert!(text.contains("⚠ [reference_solution_failed] Question 12"));
    }

    #[test]
    fn json_report_round_trips() {
        let report = BuildReport::new("in", "out", ReferenceErrorPolicy::Placeholder);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"on_reference_error\": \"placeholder\""));
        let parsed: BuildReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.statistics, report.statistics);
    }
}
