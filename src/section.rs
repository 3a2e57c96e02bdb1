//! Course sections (`sections/section_<n>/section.xml`).

use roxmltree::Document;

use crate::error::Result;
use crate::html::simplify_html;
use crate::record::{first_i64, first_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub number: i64,
    pub name: String,
    pub summary: String,
    /// Course-module ids in display order. Most point at activities other
    /// than quizzes.
    pub contents: Vec<String>,
}

impl Section {
    pub fn from_document(document: &Document) -> Result<Self> {
        let root = document.root();
        Ok(Self {
            number: first_i64(root, "number")?,
            name: first_text(root, "name")?,
            summary: simplify_html(&first_text(root, "summary")?)?,
            contents: first_text(root, "sequence")?
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}
