//! Quiz activities (`activities/quiz_<n>/quiz.xml`).

use roxmltree::Document;

use crate::bank::QuestionBank;
use crate::error::Result;
use crate::html::pretextify;
use crate::question::Question;
use crate::record::{attribute, first_text, get_all, get_first, text};

/// What a quiz record says before its questions are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub id: String,
    pub name: String,
    pub intro: String,
    /// Question-bank entry ids in quiz order.
    pub question_refs: Vec<String>,
}

impl AssignmentRecord {
    pub fn from_document(document: &Document) -> Result<Self> {
        let root = document.root();
        let id = attribute(get_first(root, "activity")?, "moduleid")?;
        let quiz = get_first(root, "quiz")?;
        Ok(Self {
            id,
            name: first_text(quiz, "name")?,
            intro: first_text(quiz, "intro")?,
            question_refs: get_all(quiz, "questionbankentryid")
                .into_iter()
                .map(|entry| text(entry).trim().to_string())
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub name: String,
    /// Normalized markup.
    pub intro: String,
    pub questions: Vec<Question>,
}

impl Assignment {
    pub fn new(id: &str, name: &str, intro: &str, questions: Vec<Question>) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            intro: pretextify(intro, None)?,
            questions,
        })
    }

    /// Resolve a record's references against the bank, keeping quiz order.
    pub fn from_record(record: &AssignmentRecord, bank: &QuestionBank) -> Result<Self> {
        let questions = record
            .question_refs
            .iter()
            .map(|entry| bank.get(entry).cloned())
            .collect::<Result<Vec<_>>>()?;
        Self::new(&record.id, &record.name, &record.intro, questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<activity id="3" moduleid="42" modulename="quiz" contextid="77">
  <quiz id="3">
    <name>Week 1</name>
    <intro>&lt;p&gt;Read &lt;b&gt;carefully&lt;/b&gt;&lt;/p&gt;</intro>
    <question_instances>
      <question_instance id="1"><slot>1</slot>
        <question_reference id="5"><questionbankentryid>11</questionbankentryid></question_reference>
      </question_instance>
      <question_instance id="2"><slot>2</slot>
        <question_reference id="6"><questionbankentryid> 10 </questionbankentryid></question_reference>
      </question_instance>
    </question_instances>
  </quiz>
</activity>"#;

    #[test]
    fn reads_id_name_intro_and_references() {
        let document = Document::parse(QUIZ).unwrap();
        let record = AssignmentRecord::from_document(&document).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.name, "Week 1");
        assert_eq!(record.question_refs, vec!["11", "10"]);
    }

    #[test]
    fn intro_is_normalized() {
        let assignment = Assignment::new("1", "a", "Read <b>carefully</b>", Vec::new()).unwrap();
        assert_eq!(assignment.intro, "<p>Read <alert>carefully</alert></p>");
    }
}
