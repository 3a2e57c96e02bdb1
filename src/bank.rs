//! The course question bank (`questions.xml`).

use std::collections::{HashMap, HashSet};

use roxmltree::Document;

use crate::error::{ConvertError, Result};
use crate::question::{question_from_entry, Question};
use crate::record::attribute;

pub const QUESTIONS_MEMBER: &str = "questions.xml";

/// Questions keyed by question-bank entry id.
///
/// Only entries that something references are built, so the bank can hold
/// question types this converter does not understand.
#[derive(Debug, Default)]
pub struct QuestionBank {
    questions: HashMap<String, Question>,
}

impl QuestionBank {
    pub fn from_xml(xml: &str, wanted: &HashSet<String>) -> Result<Self> {
        let document = Document::parse(xml).map_err(|source| ConvertError::Xml {
            member: QUESTIONS_MEMBER.to_string(),
            source,
        })?;
        Self::from_document(&document, wanted)
    }

    pub fn from_document(document: &Document, wanted: &HashSet<String>) -> Result<Self> {
        let mut questions = HashMap::new();
        let entries = document
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "question_bank_entry");
        for entry in entries {
            let id = attribute(entry, "id")?;
            if !wanted.contains(&id) || questions.contains_key(&id) {
                continue;
            }
            let question = question_from_entry(entry)?;
            questions.insert(id, question);
        }
        log::debug!("built {} of {} referenced questions", questions.len(), wanted.len());
        Ok(Self { questions })
    }

    pub fn get(&self, entry_id: &str) -> Result<&Question> {
        self.questions
            .get(entry_id)
            .ok_or_else(|| ConvertError::MissingQuestionBankEntry(entry_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
