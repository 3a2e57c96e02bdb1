//! Rich-text normalization.
//!
//! Moodle's editor produces loosely structured HTML. [`simplify_html`]
//! rewrites it into a small PreTeXt-flavoured vocabulary (`p`, `c`, `em`,
//! `alert`, `url`, `image`, `h3`, lists, `pre`) and [`pretextify`] also
//! arranges the top level into paragraphs so the result can be placed
//! directly inside a `statement` or `introduction`.
//!
//! Both operations are idempotent.

pub mod dom;

use std::fmt;

use thiserror::Error;

pub use dom::{Dom, NodeId, NodeKind, SCOPE_BOUNDARIES};

/// Attribute stamped on images to remember which record owns them.
pub const ITEM_ID_ATTR: &str = "itemid";

const CODE: &str = "c";
const ALERT: &str = "alert";
const EMPHASIS: &str = "em";
const HEADING: &str = "h3";
const IMAGE_WIDTH: &str = "90%";
const EDITOR_INDENT: &str = "editor-indent";
const LISTS: &[&str] = &["ol", "ul"];
const LIST_BLANKS: &[char] = &[' ', '\t', '\n'];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HtmlError {
    #[error("sublist appears in <{0}> without a preceding <li> to hold it")]
    OrphanSublist(String),
}

/// Simplify a rich-text fragment.
pub fn simplify_html(html: &str) -> Result<String, HtmlError> {
    let mut simplifier = HtmlSimplifier::new(html);
    simplifier.simplify()?;
    Ok(simplifier.to_string())
}

/// Simplify a fragment and arrange its top level into paragraphs.
/// With `item_id`, every image is stamped with its owning record id.
pub fn pretextify(html: &str, item_id: Option<&str>) -> Result<String, HtmlError> {
    let mut simplifier = HtmlSimplifier::new(html);
    simplifier.simplify()?;
    simplifier.pretextify();
    if let Some(id) = item_id {
        simplifier.add_item_id_to_images(id);
    }
    Ok(simplifier.to_string())
}

/// In-place rewriter over a parsed fragment.
#[derive(Debug, Clone)]
pub struct HtmlSimplifier {
    dom: Dom,
}

impl HtmlSimplifier {
    pub fn new(html: &str) -> Self {
        Self {
            dom: Dom::parse(html),
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn into_dom(self) -> Dom {
        self.dom
    }

    pub fn simplify(&mut self) -> Result<(), HtmlError> {
        self.rename_code();
        self.collapse_bold();
        self.rename_emphasis();
        self.remove_breaks();
        self.normalize_lists()?;
        self.normalize_divs();
        self.normalize_headings();
        self.convert_anchors();
        self.convert_images();
        self.convert_teletype();
        self.spell_out_scripts();
        self.normalize_spans();
        self.remove_styles();
        self.dom.smooth(Dom::ROOT);
        self.wrap_lone_text();
        Ok(())
    }

    pub fn pretextify(&mut self) {
        self.dom.smooth(Dom::ROOT);
        self.remove_blank_top_level_text();
        self.gather_inline_runs();
        self.attach_top_level_lists();
        for pre in self.dom.find_all(Dom::ROOT, &["pre"]) {
            for code in self.dom.find_all(pre, &[CODE]) {
                self.dom.unwrap(code);
            }
        }
        // Children come before their parents in reverse document order, so
        // a paragraph emptied by this loop is still seen afterwards.
        for p in self.dom.find_all(Dom::ROOT, &["p"]).into_iter().rev() {
            if self.dom.is_attached(p) && self.dom.children(p).is_empty() {
                self.dom.detach(p);
            }
        }
    }

    pub fn add_item_id_to_images(&mut self, item_id: &str) {
        for image in self.dom.find_all(Dom::ROOT, &["image"]) {
            self.dom.set_attr(image, ITEM_ID_ATTR, item_id);
        }
    }

    fn live(&self, names: &[&str]) -> Vec<NodeId> {
        self.dom.find_all(Dom::ROOT, names)
    }

    fn style_contains(&self, id: NodeId, needle: &str) -> bool {
        self.dom
            .attr(id, "style")
            .is_some_and(|style| style.contains(needle))
    }

    /// Replace `id` by a new element holding only its flattened text.
    fn flatten_into(&mut self, id: NodeId, name: &str) -> NodeId {
        let text = self.dom.text_content(id);
        let replacement = self.dom.create_element(name);
        if !text.is_empty() {
            let content = self.dom.create_text(&text);
            self.dom.append(replacement, content);
        }
        self.dom.replace_with(id, replacement);
        replacement
    }

    fn rename_code(&mut self) {
        for code in self.live(&["code"]) {
            self.dom.set_name(code, CODE);
        }
    }

    fn collapse_bold(&mut self) {
        for bold in self.live(&["strong", "b"]) {
            if !self.dom.is_attached(bold) {
                continue;
            }
            let only_span = match self.dom.children(bold) {
                [child] if self.dom.is_element(*child, &["span"]) => Some(*child),
                _ => None,
            };
            let in_lone_span = self.dom.parent(bold).is_some_and(|parent| {
                self.dom.is_element(parent, &["span"]) && self.dom.children(parent).len() == 1
            });

            if let Some(span) = only_span {
                self.dom.replace_with(bold, span);
            } else if self.style_contains(bold, "mono") {
                self.dom.set_name(bold, CODE);
                self.dom.remove_attr(bold, "style");
            } else if in_lone_span {
                self.dom.unwrap(bold);
            } else {
                self.dom.set_name(bold, ALERT);
            }
        }
    }

    fn rename_emphasis(&mut self) {
        for tag in self.live(&["i", "u"]) {
            self.dom.set_name(tag, EMPHASIS);
        }
    }

    fn remove_breaks(&mut self) {
        for tag in self.live(&["br", "hr"]) {
            self.dom.detach(tag);
        }
    }

    fn normalize_lists(&mut self) -> Result<(), HtmlError> {
        for list in self.live(LISTS) {
            if !self.dom.is_attached(list) {
                continue;
            }
            self.strip_blanks(list);
            let only_list = match self.dom.children(list) {
                [child] if self.dom.is_element(*child, LISTS) => Some(*child),
                _ => None,
            };
            if self.dom.children(list).is_empty() {
                self.dom.detach(list);
            } else if let Some(inner) = only_list {
                self.dom.replace_with(list, inner);
            } else {
                self.rehome_sublists(list)?;
                self.strip_blanks(list);
            }
        }
        Ok(())
    }

    fn strip_blanks(&mut self, list: NodeId) {
        for from_end in [false, true] {
            let children = self.dom.children(list);
            let edge = if from_end {
                children.last()
            } else {
                children.first()
            };
            let Some(&edge) = edge else {
                return;
            };
            let Some(text) = self.dom.text(edge) else {
                continue;
            };
            let stripped = text.trim_matches(LIST_BLANKS).to_string();
            if stripped.is_empty() {
                self.dom.detach(edge);
            } else if stripped.len() != text.len() {
                self.dom.set_text(edge, &stripped);
            }
        }
    }

    /// Moves a list nested directly in another list into the preceding item.
    fn rehome_sublists(&mut self, list: NodeId) -> Result<(), HtmlError> {
        let sublists: Vec<NodeId> = self
            .dom
            .children(list)
            .iter()
            .copied()
            .filter(|&child| self.dom.is_element(child, LISTS))
            .collect();

        for sublist in sublists {
            let mut previous = self.dom.previous_sibling(sublist);
            while let Some(candidate) = previous.filter(|&node| self.dom.is_text(node)) {
                previous = self.dom.previous_sibling(candidate);
            }
            let item = match previous {
                Some(item) if self.dom.is_element(item, &["li"]) => item,
                _ => {
                    let name = self.dom.name(list).unwrap_or_default().to_string();
                    return Err(HtmlError::OrphanSublist(name));
                }
            };

            self.dom.append(item, sublist);
            let paragraph = self.dom.wrap(sublist, "p");
            if let Some(before) = self.dom.previous_sibling(paragraph) {
                if self.dom.is_text(before) {
                    self.dom.insert_before(sublist, before);
                }
            }
        }
        Ok(())
    }

    /// Blocks become paragraphs. One inside a paragraph, or holding one, is
    /// unwrapped instead.
    fn normalize_divs(&mut self) {
        for div in self.live(&["div"]) {
            if self.dom.has_class(div, EDITOR_INDENT) {
                self.dom.unwrap(div);
            }
        }
        for block in self.live(&["div", "h5"]) {
            if !self.dom.is_attached(block) {
                continue;
            }
            if self.dom.is_element(block, &["div"]) && self.dom.children(block).is_empty() {
                self.dom.detach(block);
            } else if self.in_paragraph(block) || self.holds_paragraph(block) {
                self.dom.unwrap(block);
            } else {
                self.dom.set_name(block, "p");
            }
        }
    }

    /// True if a `p` encloses `id` with no list or table cell in between.
    fn in_paragraph(&self, id: NodeId) -> bool {
        let mut current = self.dom.parent(id);
        while let Some(node) = current {
            if self.dom.is_element(node, &["p"]) {
                return true;
            }
            if self.dom.is_element(node, SCOPE_BOUNDARIES) {
                return false;
            }
            current = self.dom.parent(node);
        }
        false
    }

    /// True if `id` is a `p` or holds one that [`Self::in_paragraph`] would
    /// place in an enclosing paragraph.
    fn holds_paragraph(&self, id: NodeId) -> bool {
        if self.dom.is_element(id, &["p"]) {
            return true;
        }
        self.dom.find_all(id, &["p"]).into_iter().any(|p| {
            let mut current = self.dom.parent(p);
            while let Some(node) = current.filter(|&node| node != id) {
                if self.dom.is_element(node, SCOPE_BOUNDARIES) {
                    return false;
                }
                current = self.dom.parent(node);
            }
            !self.dom.is_element(id, SCOPE_BOUNDARIES)
        })
    }

    fn normalize_headings(&mut self) {
        for heading in self.live(&["h3", "h4"]) {
            if !self.dom.is_attached(heading) {
                continue;
            }
            if self.dom.text_content(heading).is_empty() {
                self.dom.detach(heading);
            } else {
                self.flatten_into(heading, HEADING);
            }
        }
    }

    fn convert_anchors(&mut self) {
        for anchor in self.live(&["a"]) {
            if !self.dom.is_attached(anchor) {
                continue;
            }
            let href = self.dom.attr(anchor, "href").map(str::to_string);
            let url = self.flatten_into(anchor, "url");
            if let Some(href) = href {
                self.dom.set_attr(url, "href", &href);
            }
        }
    }

    fn convert_images(&mut self) {
        for img in self.live(&["img"]) {
            if !self.dom.is_attached(img) {
                continue;
            }
            let source = self.dom.attr(img, "src").unwrap_or_default().to_string();
            let alt = self.dom.attr(img, "alt").unwrap_or_default().to_string();
            let image = self.flatten_into(img, "image");
            self.dom.set_attr(image, "source", &source);
            self.dom.set_attr(image, "width", IMAGE_WIDTH);
            if alt.is_empty() {
                self.dom.set_attr(image, "decorative", "yes");
            } else {
                let description = self.dom.create_element("shortdescription");
                let text = self.dom.create_text(&alt);
                self.dom.append(description, text);
                self.dom.append(image, description);
            }
        }
    }

    fn convert_teletype(&mut self) {
        for tt in self.live(&["tt"]) {
            if self.dom.is_attached(tt) {
                self.flatten_into(tt, CODE);
            }
        }
    }

    /// PreTeXt has no super/subscript markup; keep the tags readable as text.
    fn spell_out_scripts(&mut self) {
        for tag in self.live(&["sup", "sub"]) {
            if !self.dom.is_attached(tag) {
                continue;
            }
            let name = self.dom.name(tag).unwrap_or_default().to_string();
            let text = self.dom.text_content(tag);
            let spelled = self
                .dom
                .create_text(&format!("&lt;{name}&rt;{text}&lt;/{name}&rt;"));
            self.dom.replace_with(tag, spelled);
        }
    }

    fn normalize_spans(&mut self) {
        for span in self.live(&["span"]) {
            if !self.dom.is_attached(span) {
                continue;
            }
            if self.dom.text_content(span).is_empty() {
                self.dom.detach(span);
            } else if self.style_contains(span, "mono") {
                self.flatten_into(span, CODE);
            } else if self.style_contains(span, "x-large") {
                self.flatten_into(span, HEADING);
            } else {
                self.dom.unwrap(span);
            }
        }
    }

    fn remove_styles(&mut self) {
        for node in self.dom.descendants(Dom::ROOT) {
            self.dom.remove_attr(node, "style");
        }
    }

    fn wrap_lone_text(&mut self) {
        if let [only] = self.dom.children(Dom::ROOT) {
            let only = *only;
            if self.dom.is_text(only) {
                self.flatten_into(only, "p");
            }
        }
    }

    fn remove_blank_top_level_text(&mut self) {
        for child in self.dom.children(Dom::ROOT).to_vec() {
            let blank = self
                .dom
                .text(child)
                .is_some_and(|text| text.chars().all(char::is_whitespace));
            if blank {
                self.dom.detach(child);
            }
        }
    }

    /// A top-level text node starts a paragraph that takes in its following
    /// siblings up to the next `pre` or anything holding a paragraph.
    fn gather_inline_runs(&mut self) {
        let mut index = 0;
        while let Some(&node) = self.dom.children(Dom::ROOT).get(index) {
            if self.dom.is_text(node) {
                let paragraph = self.dom.create_element("p");
                self.dom.insert(Dom::ROOT, index, paragraph);
                while let Some(&next) = self.dom.children(Dom::ROOT).get(index + 1) {
                    if self.dom.is_element(next, &["pre"]) || self.holds_paragraph(next) {
                        break;
                    }
                    self.dom.append(paragraph, next);
                }
            }
            index += 1;
        }
    }

    fn attach_top_level_lists(&mut self) {
        for child in self.dom.children(Dom::ROOT).to_vec() {
            if !self.dom.is_element(child, LISTS) {
                continue;
            }
            match self.dom.previous_sibling(child) {
                Some(previous) if self.dom.is_element(previous, &["p"]) => {
                    self.dom.append(previous, child);
                }
                _ => {
                    self.dom.wrap(child, "p");
                }
            }
        }
    }
}

impl fmt::Display for HtmlSimplifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.dom, f)
    }
}
