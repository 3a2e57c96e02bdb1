//! Pretty-printing of generated PreTeXt.

use crate::html::{Dom, NodeId};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Structural elements that get their children on separate, indented lines
/// when they hold no loose text.
const BLOCK_ELEMENTS: &[&str] = &[
    "pretext",
    "book",
    "chapter",
    "section",
    "introduction",
    "exercises",
    "exercise",
    "exercisegroup",
    "statement",
    "choices",
    "choice",
    "matches",
    "match",
    "premise",
    "response",
    "feedback",
    "evaluation",
    "evaluate",
    "test",
    "program",
    "tabular",
    "row",
];

/// Turns a raw markup string into its final textual form.
pub trait MarkupFormatter {
    fn format(&self, markup: &str) -> String;
}

/// Indents block structure and leaves inline content and code untouched.
#[derive(Debug, Clone)]
pub struct PretextFormatter {
    indent: String,
}

impl Default for PretextFormatter {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
        }
    }
}

impl PretextFormatter {
    pub fn new(indent: &str) -> Self {
        Self {
            indent: indent.to_string(),
        }
    }

    fn is_block(&self, dom: &Dom, id: NodeId) -> bool {
        dom.is_element(id, BLOCK_ELEMENTS)
            && !dom.children(id).is_empty()
            && dom
                .children(id)
                .iter()
                .all(|&child| dom.text(child).map_or(true, |text| text.trim().is_empty()))
    }

    fn write_node(&self, dom: &Dom, id: NodeId, depth: usize, out: &mut String) {
        let indent = self.indent.repeat(depth);
        if let Some(text) = dom.text(id) {
            if !text.trim().is_empty() {
                out.push_str(&indent);
                out.push_str(&html_escape::encode_text(text.trim()));
                out.push('\n');
            }
            return;
        }
        if !self.is_block(dom, id) {
            out.push_str(&indent);
            out.push_str(&dom.outer_html(id));
            out.push('\n');
            return;
        }
        out.push_str(&indent);
        out.push_str(&dom.open_tag(id));
        out.push('\n');
        for &child in dom.children(id) {
            self.write_node(dom, child, depth + 1, out);
        }
        out.push_str(&indent);
        out.push_str("</");
        out.push_str(dom.name(id).unwrap_or_default());
        out.push_str(">\n");
    }
}

impl MarkupFormatter for PretextFormatter {
    fn format(&self, markup: &str) -> String {
        let dom = Dom::parse(markup);
        let mut out = String::new();
        for &child in dom.children(Dom::ROOT) {
            self.write_node(&dom, child, 0, &mut out);
        }
        out
    }
}

/// Leaves markup exactly as generated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFormatter;

impl MarkupFormatter for RawFormatter {
    fn format(&self, markup: &str) -> String {
        markup.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_indented_and_inline_content_kept() {
        let formatted = PretextFormatter::default().format(
            "<exercise xml:id=\"e\"><title>T</title><statement><p>a <c>b</c></p></statement></exercise>",
        );
        assert_eq!(
            formatted,
            "<exercise xml:id=\"e\">\n  <title>T</title>\n  <statement>\n    <p>a <c>b</c></p>\n  </statement>\n</exercise>\n"
        );
    }

    #[test]
    fn code_is_not_reflowed() {
        let markup = "<program language=\"python\"><code>def f():\n    return 1 &lt; 2\n</code></program>";
        let formatted = PretextFormatter::new("\t").format(markup);
        assert_eq!(
            formatted,
            "<program language=\"python\">\n\t<code>def f():\n    return 1 &lt; 2\n</code>\n</program>\n"
        );
    }

    #[test]
    fn statements_with_loose_text_stay_inline() {
        let formatted = PretextFormatter::default().format("<statement>True</statement>");
        assert_eq!(formatted, "<statement>True</statement>\n");
        assert_eq!(RawFormatter.format("<x/>"), "<x/>");
    }
}
