use std::collections::HashMap;

use roxmltree::Node;

use super::{Question, QuestionKind};
use crate::error::{ConvertError, Result};
use crate::record::{attribute, first_f64, first_text, get_all, get_first};

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact text; `*` matches any run of characters.
    Text(String),
    Numeric { value: f64, tolerance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillInAnswer {
    /// Record id of the answer; owns the images in its feedback.
    pub id: String,
    pub condition: Condition,
    /// Feedback as stored in the record; normalized when written out.
    pub feedback: String,
}

impl FillInAnswer {
    pub fn text(id: &str, text: &str, feedback: &str) -> Self {
        Self {
            id: id.to_string(),
            condition: Condition::Text(text.to_string()),
            feedback: feedback.to_string(),
        }
    }

    pub fn numeric(id: &str, value: f64, tolerance: f64, feedback: &str) -> Self {
        Self {
            id: id.to_string(),
            condition: Condition::Numeric { value, tolerance },
            feedback: feedback.to_string(),
        }
    }
}

/// Answers ordered by descending weight; the first one is the correct answer.
#[derive(Debug, Clone, PartialEq)]
pub struct FillInQuestion {
    pub answers: Vec<FillInAnswer>,
}

impl FillInQuestion {
    pub fn correct_answer(&self) -> Option<&FillInAnswer> {
        self.answers.first()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.correct_answer().map(|answer| &answer.condition),
            Some(Condition::Numeric { .. })
        )
    }

    pub fn from_short_answer_record(question: Node) -> Result<Question> {
        let answers = weighted_answers(question)?
            .into_iter()
            .map(|answer| FillInAnswer::text(&answer.id, &answer.text, &answer.feedback))
            .collect();
        Question::from_record(question, QuestionKind::FillIn(Self { answers }))
    }

    pub fn from_numerical_record(question: Node) -> Result<Question> {
        let mut tolerances = HashMap::new();
        for record in get_all(get_first(question, "numerical_records")?, "numerical_record") {
            let answer_id = first_text(record, "answer")?.trim().to_string();
            tolerances.insert(answer_id, first_f64(record, "tolerance")?);
        }

        let mut answers = Vec::new();
        for answer in weighted_answers(question)? {
            let tolerance = *tolerances
                .get(&answer.id)
                .ok_or_else(|| ConvertError::MissingTolerance(answer.id.clone()))?;
            let value = answer
                .text
                .trim()
                .parse()
                .map_err(|_| ConvertError::InvalidNumber {
                    tag: "answertext".to_string(),
                    value: answer.text.clone(),
                })?;
            answers.push(FillInAnswer::numeric(&answer.id, value, tolerance, &answer.feedback));
        }
        Question::from_record(question, QuestionKind::FillIn(Self { answers }))
    }
}

struct WeightedAnswer {
    id: String,
    text: String,
    weight: f64,
    feedback: String,
}

/// The question's answers, heaviest first; ties keep record order.
fn weighted_answers(question: Node) -> Result<Vec<WeightedAnswer>> {
    let mut answers = get_all(get_first(question, "answers")?, "answer")
        .into_iter()
        .map(|answer| {
            Ok(WeightedAnswer {
                id: attribute(answer, "id")?,
                text: first_text(answer, "answertext")?,
                weight: first_f64(answer, "fraction")?,
                feedback: first_text(answer, "feedback")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    answers.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    Ok(answers)
}
