use roxmltree::Node;

use super::{Question, QuestionKind};
use crate::error::Result;
use crate::record::{first_markup, get_all, get_first};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub premise: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingQuestion {
    pub matches: Vec<Match>,
}

impl MatchingQuestion {
    pub fn from_record(question: Node) -> Result<Question> {
        let matches = get_all(get_first(question, "matches")?, "match")
            .into_iter()
            .map(|entry| {
                let owner = entry.attribute("id");
                Ok(Match {
                    premise: first_markup(entry, "questiontext", owner)?,
                    response: first_markup(entry, "answertext", owner)?,
                })
            })
            .collect::<Result<_>>()?;
        Question::from_record(question, QuestionKind::Matching(Self { matches }))
    }
}
