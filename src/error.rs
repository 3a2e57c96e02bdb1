//! Error type shared by the course loader, the question factory and the writer.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::html::HtmlError;
use crate::runner::RunError;

/// Errors raised while turning a backup into a PreTeXt project.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("No child tag: {tag} (while looking up {path})")]
    MissingTag { tag: String, path: String },

    #[error("missing attribute `{attribute}` on <{tag}>")]
    MissingAttribute { tag: String, attribute: String },

    #[error("invalid number in <{tag}>: {value:?}")]
    InvalidNumber { tag: String, value: String },

    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error("failed to parse {member}: {source}")]
    Xml {
        member: String,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Unknown question type ({0})!")]
    UnknownQuestionType(String),

    #[error("question bank entry {0} is referenced but not present in questions.xml")]
    MissingQuestionBankEntry(String),

    #[error("no tolerance recorded for numerical answer {0}")]
    MissingTolerance(String),

    #[error("Cannot find: {owner} {path}")]
    AssetNotFound { owner: String, path: String },

    #[error("asset path {0:?} is not valid percent-encoded UTF-8")]
    InvalidAssetPath(String),

    #[error("reference solution of question {question} failed: {source}")]
    ReferenceSolution {
        question: String,
        #[source]
        source: RunError,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
