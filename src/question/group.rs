use roxmltree::Node;

use super::{Choice, MultipleChoiceQuestion, Question, QuestionKind};
use crate::error::Result;
use crate::record::{attribute, first_markup, first_text, get_all, get_first, is_blank, text};

/// A matching question rendered as one multiple-choice exercise per premise,
/// every exercise offering the full pool of responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseGroupQuestion {
    pub exercises: Vec<Question>,
}

impl ExerciseGroupQuestion {
    pub fn from_matching_record(question: Node) -> Result<Question> {
        let id = attribute(question, "id")?;
        let name = first_text(question, "name")?;
        let exercises = sub_exercises(get_first(question, "matches")?, &id, &name)?;
        Question::new(
            id,
            name,
            &first_text(question, "questiontext")?,
            QuestionKind::ExerciseGroup(Self { exercises }),
        )
    }
}

fn sub_exercises(matches: Node, id: &str, name: &str) -> Result<Vec<Question>> {
    // Responses are plain text.
    let mut pool: Vec<String> = Vec::new();
    for response in get_all(matches, "answertext").into_iter().map(text) {
        if !pool.contains(&response) {
            pool.push(response);
        }
    }

    let mut exercises = Vec::new();
    for entry in get_all(matches, "match") {
        // Entries without a premise are distractors only.
        if is_blank(get_first(entry, "questiontext")?) {
            continue;
        }
        let index = exercises.len();
        let correct = first_text(entry, "answertext")?;
        let choices = pool
            .iter()
            .map(|response| {
                Choice::new(&html_escape::encode_text(response), "", *response == correct)
            })
            .collect();
        exercises.push(Question::new(
            format!("{id}-{index}"),
            format!("{name}-{index}"),
            &first_markup(entry, "questiontext", entry.attribute("id"))?,
            QuestionKind::MultipleChoice(MultipleChoiceQuestion {
                choices,
                allows_multiple_answers: false,
            }),
        )?);
    }
    Ok(exercises)
}
