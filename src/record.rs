//! Lookups over parsed Moodle backup records.
//!
//! Paths are `/`-separated tag names; each step takes the first (or last)
//! matching descendant, not only direct children.

use roxmltree::Node;

use crate::error::{ConvertError, Result};
use crate::html::pretextify;

/// Every descendant element named `tag`, in document order.
pub fn get_all<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Vec<Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .filter(|n| n.is_element() && n.tag_name().name() == tag)
        .collect()
}

pub fn get_first<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Result<Node<'a, 'input>> {
    walk(node, path, false)
}

pub fn get_last<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Result<Node<'a, 'input>> {
    walk(node, path, true)
}

fn walk<'a, 'input>(node: Node<'a, 'input>, path: &str, last: bool) -> Result<Node<'a, 'input>> {
    let mut current = node;
    for tag in path.split('/') {
        let found = get_all(current, tag);
        let next = if last { found.last() } else { found.first() };
        current = next.copied().ok_or_else(|| ConvertError::MissingTag {
            tag: tag.to_string(),
            path: path.to_string(),
        })?;
    }
    Ok(current)
}

/// Concatenated text of a record, CDATA included.
pub fn text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

pub fn first_text(node: Node, path: &str) -> Result<String> {
    get_first(node, path).map(text)
}

/// Text of the first match for `path`, normalized for PreTeXt.
pub fn first_markup(node: Node, path: &str, item_id: Option<&str>) -> Result<String> {
    Ok(pretextify(&first_text(node, path)?, item_id)?)
}

pub fn first_f64(node: Node, path: &str) -> Result<f64> {
    let raw = first_text(node, path)?;
    raw.trim().parse().map_err(|_| ConvertError::InvalidNumber {
        tag: path.to_string(),
        value: raw,
    })
}

pub fn first_i64(node: Node, path: &str) -> Result<i64> {
    let raw = first_text(node, path)?;
    raw.trim().parse().map_err(|_| ConvertError::InvalidNumber {
        tag: path.to_string(),
        value: raw,
    })
}

/// True when the record holds nothing but whitespace.
pub fn is_blank(node: Node) -> bool {
    text(node).trim().is_empty()
}

pub fn attribute(node: Node, name: &str) -> Result<String> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or_else(|| ConvertError::MissingAttribute {
            tag: node.tag_name().name().to_string(),
            attribute: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    const RECORD: &str = r#"<question id="7">
        <name>first</name>
        <answers>
            <answer id="1"><answertext>a</answertext><fraction>1.0000000</fraction></answer>
            <answer id="2"><answertext><![CDATA[<b>b</b>]]></answertext><fraction>0.0</fraction></answer>
        </answers>
        <version><name>second</name></version>
    </question>"#;

    #[test]
    fn first_and_last_follow_document_order() {
        let doc = Document::parse(RECORD).unwrap();
        let root = doc.root_element();
        assert_eq!(first_text(root, "name").unwrap(), "first");
        assert_eq!(text(get_last(root, "name").unwrap()), "second");
        assert_eq!(attribute(get_last(root, "answers/answer").unwrap(), "id").unwrap(), "2");
    }

    #[test]
    fn cdata_is_part_of_the_text() {
        let doc = Document::parse(RECORD).unwrap();
        let answer = get_last(doc.root_element(), "answer").unwrap();
        assert_eq!(first_text(answer, "answertext").unwrap(), "<b>b</b>");
        assert_eq!(
            first_markup(answer, "answertext", None).unwrap(),
            "<alert>b</alert>"
        );
    }

    #[test]
    fn numbers_are_parsed() {
        let doc = Document::parse(RECORD).unwrap();
        let answer = get_first(doc.root_element(), "answer").unwrap();
        assert_eq!(first_f64(answer, "fraction").unwrap(), 1.0);
        assert!(matches!(
            first_i64(answer, "answertext"),
            Err(ConvertError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn missing_tag_is_reported_with_path() {
        let doc = Document::parse(RECORD).unwrap();
        let err = get_first(doc.root_element(), "answers/hint").unwrap_err();
        assert_eq!(err.to_string(), "No child tag: hint (while looking up answers/hint)");
        assert!(!is_blank(doc.root_element()));
    }
}
