//! Typed question model built from question-bank records.
//!
//! Every question shares an id, a name, normalized question text and an
//! optional title hoisted from a leading heading. The variant-specific data
//! lives in [`QuestionKind`]; [`question_from_entry`] picks the variant from
//! the record's `qtype`.

mod coderunner;
mod fillin;
mod group;
mod matching;
mod multichoice;

use std::collections::BTreeMap;

use roxmltree::Node;

use crate::error::{ConvertError, Result};
use crate::html::{pretextify, Dom, NodeId};
use crate::record::{attribute, first_text, get_last};

pub use coderunner::{extract_preamble, CodeRunnerQuestion, TestCase, NO_TEMPLATE, STUDENT_ANSWER_MARKER};
pub use fillin::{Condition, FillInAnswer, FillInQuestion};
pub use group::ExerciseGroupQuestion;
pub use matching::{Match, MatchingQuestion};
pub use multichoice::{Choice, MultipleChoiceQuestion};

pub const PLACEHOLDER_TITLE: &str = "((Placeholder title))";

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub name: String,
    /// Normalized markup, without the hoisted title heading.
    pub question_text: String,
    pub title: Option<String>,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    Description,
    FillIn(FillInQuestion),
    Matching(MatchingQuestion),
    MultipleChoice(MultipleChoiceQuestion),
    CodeRunner(CodeRunnerQuestion),
    ExerciseGroup(ExerciseGroupQuestion),
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::Description => "description",
            QuestionKind::FillIn(_) => "fill-in",
            QuestionKind::Matching(_) => "matching",
            QuestionKind::MultipleChoice(_) => "multiple-choice",
            QuestionKind::CodeRunner(_) => "code-runner",
            QuestionKind::ExerciseGroup(_) => "exercise-group",
        }
    }
}

impl Question {
    /// Build a question from raw question text; the text is normalized and a
    /// leading heading becomes the title.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        question_text: &str,
        kind: QuestionKind,
    ) -> Result<Self> {
        let (question_text, title) = process_question_text(question_text)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            question_text,
            title,
            kind,
        })
    }

    /// Build from a `question` record, reading id, name and question text.
    pub fn from_record(question: Node, kind: QuestionKind) -> Result<Self> {
        Self::new(
            attribute(question, "id")?,
            first_text(question, "name")?,
            &first_text(question, "questiontext")?,
            kind,
        )
    }

    pub fn title_or_placeholder(&self) -> &str {
        self.title.as_deref().unwrap_or(PLACEHOLDER_TITLE)
    }

    pub fn as_code_runner(&self) -> Option<&CodeRunnerQuestion> {
        match &self.kind {
            QuestionKind::CodeRunner(code) => Some(code),
            _ => None,
        }
    }

    /// Give a code-runner question its data files. Other variants ignore them.
    pub fn attach_datafiles(&mut self, files: BTreeMap<String, String>) -> bool {
        match &mut self.kind {
            QuestionKind::CodeRunner(code) => {
                code.datafiles = Some(files);
                true
            }
            _ => false,
        }
    }
}

/// Create the question described by a `question_bank_entry` record.
/// The last `question` in the entry is its newest version.
pub fn question_from_entry(entry: Node) -> Result<Question> {
    let question = get_last(entry, "question")?;
    let qtype = first_text(question, "qtype")?;
    log::debug!(
        "building {} question {}",
        qtype,
        question.attribute("id").unwrap_or("?")
    );
    match qtype.trim() {
        "description" => Question::from_record(question, QuestionKind::Description),
        "coderunner" => CodeRunnerQuestion::from_record(question),
        "matchwiris" | "ddmatch" => MatchingQuestion::from_record(question),
        "match" => ExerciseGroupQuestion::from_matching_record(question),
        "shortanswer" => FillInQuestion::from_short_answer_record(question),
        "numerical" => FillInQuestion::from_numerical_record(question),
        "multichoice" => MultipleChoiceQuestion::from_record(question),
        _ => Err(ConvertError::UnknownQuestionType(qtype)),
    }
}

/// Normalize question text and pull out a leading `h3` as the title.
/// A heading left in front after that is demoted to a paragraph.
pub fn process_question_text(text: &str) -> Result<(String, Option<String>)> {
    let simplified = pretextify(text, None)?;
    let mut dom = Dom::parse(&simplified);
    let Some(heading) = leading_heading(&dom) else {
        return Ok((simplified, None));
    };
    let title = dom.text_content(heading);
    dom.detach(heading);
    if let Some(next) = leading_heading(&dom) {
        dom.set_name(next, "p");
    }
    Ok((dom.to_string().trim().to_string(), Some(title)))
}

fn leading_heading(dom: &Dom) -> Option<NodeId> {
    dom.children(Dom::ROOT)
        .first()
        .copied()
        .filter(|&first| dom.is_element(first, &["h3"]))
}
