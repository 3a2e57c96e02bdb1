use std::collections::BTreeMap;

use roxmltree::Node;

use super::{Question, QuestionKind};
use crate::error::Result;
use crate::record::{first_text, get_all};

/// Where the student's code is spliced into a per-question template.
pub const STUDENT_ANSWER_MARKER: &str = "{{ STUDENT_ANSWER }}";

/// Moodle's null marker for "no template of its own".
pub const NO_TEMPLATE: &str = "$@NULL@$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub test_code: String,
    pub expected: String,
    pub std_input: String,
    pub use_as_example: bool,
    pub show: bool,
}

impl TestCase {
    pub fn new(test_code: &str, expected: &str, std_input: &str) -> Self {
        Self {
            test_code: test_code.to_string(),
            expected: expected.to_string(),
            std_input: std_input.to_string(),
            use_as_example: false,
            show: true,
        }
    }

    fn from_record(case: Node) -> Result<Self> {
        Ok(Self {
            test_code: first_text(case, "testcode")?,
            expected: first_text(case, "expected")?,
            std_input: first_text(case, "stdin")?,
            use_as_example: first_text(case, "useasexample")?.trim() == "1",
            show: first_text(case, "display")?.trim() == "SHOW",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeRunnerQuestion {
    pub language: String,
    pub preload: String,
    /// Reference solution.
    pub answer: String,
    pub preamble: Option<String>,
    pub test_cases: Vec<TestCase>,
    /// File name to contents; filled in once the asset store is available.
    pub datafiles: Option<BTreeMap<String, String>>,
}

impl CodeRunnerQuestion {
    pub fn from_record(question: Node) -> Result<Question> {
        let code = Self {
            language: first_text(question, "coderunnertype")?.trim().to_string(),
            preload: first_text(question, "answerpreload")?,
            answer: first_text(question, "answer")?,
            preamble: extract_preamble(&first_text(question, "template")?),
            test_cases: get_all(question, "coderunner_testcase")
                .into_iter()
                .map(TestCase::from_record)
                .collect::<Result<_>>()?,
            datafiles: None,
        };
        Question::from_record(question, QuestionKind::CodeRunner(code))
    }

    pub fn example_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|case| case.use_as_example)
    }

    /// Template preamble followed by the reference answer.
    pub fn reference_code(&self) -> String {
        [self.preamble.as_deref().unwrap_or_default(), &self.answer].join("\n")
    }

    pub fn is_python(&self) -> bool {
        self.language.starts_with("python")
    }
}

/// The part of a template before the student answer marker.
pub fn extract_preamble(template: &str) -> Option<String> {
    if template.is_empty() || template == NO_TEMPLATE {
        return None;
    }
    template
        .find(STUDENT_ANSWER_MARKER)
        .map(|index| template[..index].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_stops_at_the_marker() {
        assert_eq!(
            extract_preamble("import math\n{{ STUDENT_ANSWER }}\nprint(1)").as_deref(),
            Some("import math\n")
        );
        assert_eq!(extract_preamble(NO_TEMPLATE), None);
        assert_eq!(extract_preamble(""), None);
        assert_eq!(extract_preamble("no marker here"), None);
    }

    #[test]
    fn reference_code_joins_preamble_and_answer() {
        let mut code = CodeRunnerQuestion {
            language: "python3".to_string(),
            preload: String::new(),
            answer: "print('Haris')".to_string(),
            preamble: None,
            test_cases: vec![TestCase::new("", "Haris", "")],
            datafiles: None,
        };
        assert_eq!(code.reference_code(), "\nprint('Haris')");
        code.preamble = Some("x = 1".to_string());
        assert_eq!(code.reference_code(), "x = 1\nprint('Haris')");
        assert!(code.is_python());
        assert_eq!(code.example_cases().count(), 0);
    }
}
