//! Arena-backed markup tree.
//!
//! Nodes live in one `Vec` and refer to each other by index. Detached
//! nodes stay in the arena, so ids held across a rewrite never dangle;
//! callers iterating over a snapshot check [`Dom::is_attached`] before
//! touching a node.

use std::fmt;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

pub type NodeId = usize;

/// Elements that never carry content even when written as `<br>`.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<NodeData>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse a markup fragment the way a browser tokenizes HTML. Never fails:
    /// stray end tags are dropped and a bare `<` stays text.
    pub fn parse(markup: &str) -> Self {
        let mut dom = Self::new();
        dom.parse_into(Self::ROOT, markup);
        dom
    }

    /// Parse `markup` and append the resulting nodes to `parent`.
    pub fn parse_into(&mut self, parent: NodeId, markup: &str) {
        let mut input = BufferQueue::default();
        input.push_back(StrTendril::from_slice(markup));
        let builder = FragmentBuilder {
            dom: self,
            open: vec![parent],
        };
        let mut tokenizer = Tokenizer::new(builder, TokenizerOpts::default());
        let _ = tokenizer.feed(&mut input);
        tokenizer.end();
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent].children.last() {
            if let NodeKind::Text(previous) = &mut self.nodes[last].kind {
                previous.push_str(text);
                return;
            }
        }
        let node = self.create_text(text);
        self.append(parent, node);
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_element_with_attrs(name, &[])
    }

    pub fn create_element_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push(NodeKind::Element {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn set_name(&mut self, id: NodeId, new_name: &str) {
        if let NodeKind::Element { name, .. } = &mut self.nodes[id].kind {
            *name = new_name.to_string();
        }
    }

    /// True when `id` is an element whose name is one of `names`.
    pub fn is_element(&self, id: NodeId, names: &[&str]) -> bool {
        self.name(id).is_some_and(|name| names.contains(&name))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Text(_))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let NodeKind::Text(text) = &mut self.nodes[id].kind {
            *text = value.to_string();
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attrs.push((key.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> Option<String> {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            let index = attrs.iter().position(|(k, _)| k == key)?;
            return Some(attrs.remove(index).1);
        }
        None
    }

    /// Whitespace-separated class list membership.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.name(child).is_some())
            .collect()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .map(|previous| self.children(parent)[previous])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// True if `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == Self::ROOT {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&child| child != id);
        }
    }

    /// Insert `child` into `parent` at `index`, moving it from wherever it was.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child].parent = Some(parent);
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.insert(parent, index, node);
        }
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.insert(parent, index + 1, node);
        }
    }

    /// Put `replacement` where `old` was and detach `old`.
    /// `replacement` may be a descendant of `old`.
    pub fn replace_with(&mut self, old: NodeId, replacement: NodeId) {
        self.detach(replacement);
        let (Some(parent), Some(index)) = (self.parent(old), self.index_in_parent(old)) else {
            return;
        };
        self.insert(parent, index, replacement);
        self.detach(old);
    }

    /// Replace an element by its children.
    pub fn unwrap(&mut self, id: NodeId) {
        let (Some(parent), Some(index)) = (self.parent(id), self.index_in_parent(id)) else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id].children);
        for &child in &children {
            self.nodes[child].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent].children;
        siblings.remove(index);
        for (offset, child) in children.into_iter().enumerate() {
            siblings.insert(index + offset, child);
        }
        self.nodes[id].parent = None;
    }

    /// Wrap `id` in a new element called `name` and return the wrapper.
    pub fn wrap(&mut self, id: NodeId, name: &str) -> NodeId {
        let wrapper = self.create_element(name);
        self.replace_with(id, wrapper);
        self.append(wrapper, id);
        wrapper
    }

    /// All descendants of `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            found.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        found
    }

    /// Snapshot of descendant elements named in `names`, in document order.
    pub fn find_all(&self, id: NodeId, names: &[&str]) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.is_element(node, names))
            .collect()
    }

    pub fn find_first(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|&node| self.name(node) == Some(name))
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Merge adjacent text nodes and drop empty ones, recursively.
    pub fn smooth(&mut self, id: NodeId) {
        let children = self.nodes[id].children.clone();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            if let Some(text) = self.text(child).map(str::to_string) {
                if text.is_empty() {
                    self.nodes[child].parent = None;
                    continue;
                }
                if let Some(&last) = kept.last() {
                    if let NodeKind::Text(previous) = &mut self.nodes[last].kind {
                        previous.push_str(&text);
                        self.nodes[child].parent = None;
                        continue;
                    }
                }
            } else {
                self.smooth(child);
            }
            kept.push(child);
        }
        self.nodes[id].children = kept;
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// The start tag of an element, attributes included.
    pub fn open_tag(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Element { name, attrs } = &self.nodes[id].kind {
            write_start(name, attrs, &mut out);
            out.push('>');
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Root => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Element { name, attrs } => {
                write_start(name, attrs, out);
                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

fn write_start(name: &str, attrs: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Start tags that end an open `p`.
const PARAGRAPH_CLOSERS: &[&str] = &["div", "p"];

/// Elements an implied end tag never reaches past.
pub const SCOPE_BOUNDARIES: &[&str] = &["caption", "li", "ol", "table", "td", "th", "ul"];

/// Tree construction over the HTML tokenizer, limited to the implied end
/// tags of paragraphs and list items. Unknown elements are kept as written.
struct FragmentBuilder<'a> {
    dom: &'a mut Dom,
    /// Open elements; the first entry is the node being filled.
    open: Vec<NodeId>,
}

impl FragmentBuilder<'_> {
    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(Dom::ROOT)
    }

    /// Close the innermost open `name` unless a scope boundary comes first.
    fn close_implied(&mut self, name: &str, boundaries: &[&str]) {
        for position in (1..self.open.len()).rev() {
            let id = self.open[position];
            if self.dom.name(id) == Some(name) {
                self.open.truncate(position);
                return;
            }
            if self.dom.is_element(id, boundaries) {
                return;
            }
        }
    }

    fn start(&mut self, tag: Tag) {
        let name = tag.name.to_string();
        if PARAGRAPH_CLOSERS.contains(&name.as_str()) {
            self.close_implied("p", SCOPE_BOUNDARIES);
        }
        if name == "li" {
            self.close_implied("li", &["ol", "ul"]);
        }
        let attrs = tag
            .attrs
            .iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();
        let element = self.dom.push(NodeKind::Element {
            name: name.clone(),
            attrs,
        });
        let parent = self.current();
        self.dom.append(parent, element);
        if !tag.self_closing && !is_void(&name) {
            self.open.push(element);
        }
    }

    fn end(&mut self, tag: Tag) {
        let name = tag.name.to_string();
        let matching = self
            .open
            .iter()
            .skip(1)
            .rposition(|&id| self.dom.name(id) == Some(name.as_str()));
        if let Some(position) = matching {
            self.open.truncate(position + 1);
        }
    }
}

impl TokenSink for FragmentBuilder<'_> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => self.start(tag),
                TagKind::EndTag => self.end(tag),
            },
            Token::CharacterTokens(text) => {
                let parent = self.current();
                self.dom.append_text(parent, &text);
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

impl fmt::Display for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner_html(Self::ROOT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let dom = Dom::parse("<p>Hello <b>world</b>!</p>");
        let p = dom.children(Dom::ROOT)[0];
        assert_eq!(dom.name(p), Some("p"));
        assert_eq!(dom.children(p).len(), 3);
        assert_eq!(dom.text_content(p), "Hello world!");
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let dom = Dom::parse("<p>a<br>b<img src=\"x.png\">c</p>");
        let p = dom.children(Dom::ROOT)[0];
        assert_eq!(dom.children(p).len(), 5);
        assert_eq!(dom.to_string(), "<p>a<br/>b<img src=\"x.png\"/>c</p>");
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let dom = Dom::parse("<p>one</span>two</p></div>");
        assert_eq!(dom.to_string(), "<p>onetwo</p>");
    }

    #[test]
    fn unclosed_elements_are_closed_by_ancestors() {
        let dom = Dom::parse("<ul><li>one<li>two</ul><p>after</p>");
        assert_eq!(dom.children(Dom::ROOT).len(), 2);
        assert_eq!(
            dom.to_string(),
            "<ul><li>one</li><li>two</li></ul><p>after</p>"
        );
    }

    #[test]
    fn open_paragraphs_end_at_the_next_block() {
        let dom = Dom::parse("<p>first<p>second<b>bold<div>block</div>");
        assert_eq!(
            dom.to_string(),
            "<p>first</p><p>second<b>bold</b></p><div>block</div>"
        );
    }

    #[test]
    fn lists_stay_inside_paragraphs() {
        let dom = Dom::parse("<p>intro<ul><li>a</li></ul></p>");
        assert_eq!(dom.to_string(), "<p>intro<ul><li>a</li></ul></p>");
    }

    #[test]
    fn nested_lists_keep_their_items() {
        let dom = Dom::parse("<ul><li>a<ol><li>b<li>c</ol><li>d</ul>");
        assert_eq!(
            dom.to_string(),
            "<ul><li>a<ol><li>b</li><li>c</li></ol></li><li>d</li></ul>"
        );
    }

    #[test]
    fn bare_less_than_is_text() {
        let dom = Dom::parse("<p>if x < 3 and 2<3</p>");
        let p = dom.children(Dom::ROOT)[0];
        assert_eq!(dom.children(p).len(), 1);
        assert_eq!(dom.text_content(p), "if x < 3 and 2<3");
        assert_eq!(dom.to_string(), "<p>if x &lt; 3 and 2&lt;3</p>");
    }

    #[test]
    fn self_closing_and_prefixed_names_survive() {
        let dom = Dom::parse(r#"<exercise xml:id="e-1"><fillin mode="string"/>after</exercise>"#);
        let exercise = dom.children(Dom::ROOT)[0];
        assert_eq!(dom.attr(exercise, "xml:id"), Some("e-1"));
        assert_eq!(
            dom.to_string(),
            r#"<exercise xml:id="e-1"><fillin mode="string"/>after</exercise>"#
        );
    }

    #[test]
    fn entities_are_decoded_and_reencoded() {
        let dom = Dom::parse("<p>a &lt; b &amp;&nbsp;c</p>");
        let p = dom.children(Dom::ROOT)[0];
        assert_eq!(dom.text_content(p), "a < b &\u{a0}c");
        assert_eq!(dom.to_string(), "<p>a &lt; b &amp;\u{a0}c</p>");
    }

    #[test]
    fn attributes_round_trip_with_escaping() {
        let dom = Dom::parse(r#"<a href="x?a=1&amp;b=&quot;2&quot;">t</a>"#);
        let a = dom.children(Dom::ROOT)[0];
        assert_eq!(dom.attr(a, "href"), Some("x?a=1&b=\"2\""));
        assert_eq!(
            dom.to_string(),
            r#"<a href="x?a=1&amp;b=&quot;2&quot;">t</a>"#
        );
    }

    #[test]
    fn unwrap_splices_children_in_place() {
        let mut dom = Dom::parse("<p>a<span>b<i>c</i></span>d</p>");
        let span = dom.find_first(Dom::ROOT, "span").unwrap();
        dom.unwrap(span);
        assert_eq!(dom.to_string(), "<p>ab<i>c</i>d</p>");
        assert!(!dom.is_attached(span));
    }

    #[test]
    fn replace_with_accepts_a_descendant() {
        let mut dom = Dom::parse("<p><b><span>x</span></b></p>");
        let b = dom.find_first(Dom::ROOT, "b").unwrap();
        let span = dom.find_first(b, "span").unwrap();
        dom.replace_with(b, span);
        assert_eq!(dom.to_string(), "<p><span>x</span></p>");
    }

    #[test]
    fn wrap_and_insert_before() {
        let mut dom = Dom::parse("one<ul><li>x</li></ul>");
        let list = dom.find_first(Dom::ROOT, "ul").unwrap();
        let text = dom.children(Dom::ROOT)[0];
        let wrapper = dom.wrap(list, "p");
        dom.insert_before(list, text);
        assert_eq!(dom.children(Dom::ROOT), &[wrapper]);
        assert_eq!(dom.to_string(), "<p>one<ul><li>x</li></ul></p>");
    }

    #[test]
    fn smooth_merges_adjacent_text() {
        let mut dom = Dom::new();
        let p = dom.create_element("p");
        dom.append(Dom::ROOT, p);
        for piece in ["a", "", "b", "c"] {
            let text = dom.create_text(piece);
            dom.append(p, text);
        }
        dom.smooth(Dom::ROOT);
        assert_eq!(dom.children(p).len(), 1);
        assert_eq!(dom.text_content(p), "abc");
    }

    #[test]
    fn childless_elements_serialize_self_closing() {
        let mut dom = Dom::new();
        let fillin = dom.create_element_with_attrs("fillin", &[("mode", "string")]);
        dom.append(Dom::ROOT, fillin);
        assert_eq!(dom.to_string(), "<fillin mode=\"string\"/>");
    }
}
