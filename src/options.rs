//! Build options for course conversion

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when a reference solution fails while producing worked examples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceErrorPolicy {
    /// Abort the whole build
    Fail,
    /// Show `error` as the example output and record a warning
    #[default]
    Placeholder,
}

impl std::fmt::Display for ReferenceErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceErrorPolicy::Fail => write!(f, "fail"),
            ReferenceErrorPolicy::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Options for a conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub on_reference_error: ReferenceErrorPolicy,
    /// Run reference solutions to fill in worked examples
    pub run_examples: bool,
    pub book_title: String,
    pub chapter_title: String,
    /// Interpreter used for reference solutions
    pub interpreter: String,
    /// Wall-clock limit for one reference run
    pub timeout: Duration,
    /// Allow writing into a non-empty output directory
    pub overwrite: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            on_reference_error: ReferenceErrorPolicy::default(),
            run_examples: true,
            book_title: "Exercises".to_string(),
            chapter_title: "Chapter Title".to_string(),
            interpreter: "python3".to_string(),
            timeout: Duration::from_secs(10),
            overwrite: false,
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_error_policy(mut self, policy: ReferenceErrorPolicy) -> Self {
        self.on_reference_error = policy;
        self
    }

    pub fn with_examples(mut self, run_examples: bool) -> Self {
        self.run_examples = run_examples;
        self
    }

    pub fn with_titles(mut self, book_title: &str, chapter_title: &str) -> Self {
        self.book_title = book_title.to_string();
        self.chapter_title = chapter_title.to_string();
        self
    }

    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.interpreter = interpreter.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}
