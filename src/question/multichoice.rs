use roxmltree::Node;

use super::{Question, QuestionKind};
use crate::error::Result;
use crate::record::{first_f64, first_i64, first_markup, get_all, get_first};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub statement: String,
    pub feedback: String,
    pub is_correct: bool,
}

impl Choice {
    pub fn new(statement: &str, feedback: &str, is_correct: bool) -> Self {
        Self {
            statement: statement.to_string(),
            feedback: feedback.to_string(),
            is_correct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleChoiceQuestion {
    pub choices: Vec<Choice>,
    pub allows_multiple_answers: bool,
}

impl MultipleChoiceQuestion {
    pub fn from_record(question: Node) -> Result<Question> {
        let answers = get_first(question, "plugin_qtype_multichoice_question/answers")?;
        let choices = get_all(answers, "answer")
            .into_iter()
            .map(|answer| {
                let owner = answer.attribute("id");
                Ok(Choice {
                    statement: first_markup(answer, "answertext", owner)?,
                    feedback: first_markup(answer, "feedback", owner)?,
                    is_correct: first_f64(answer, "fraction")? > 0.0,
                })
            })
            .collect::<Result<_>>()?;
        let single = first_i64(question, "plugin_qtype_multichoice_question/multichoice/single")?;
        Question::from_record(
            question,
            QuestionKind::MultipleChoice(Self {
                choices,
                allows_multiple_answers: single == 0,
            }),
        )
    }

    pub fn correct_count(&self) -> usize {
        self.choices.iter().filter(|choice| choice.is_correct).count()
    }
}
