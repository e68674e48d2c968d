//! Markup tree shared by the reading layer and the highlight layer
//!
//! The reading converter hands back HTML (`<ruby>漢字<rt>かんじ</rt></ruby>`),
//! which is parsed into [`MarkupNode`]s with `scraper`. Compositing works on
//! these trees as plain values and [`render`] turns the result back into HTML.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

/// Tag of reading-annotated elements
pub const READING_TAG: &str = "ruby";

/// Tags holding the reading itself (or its fallback parentheses)
const READING_TEXT_TAGS: &[&str] = &["rt", "rp"];

/// Elements rendered without a closing tag
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

/// A node in a rendered subtitle tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarkupNode {
    /// Literal text
    Text { content: String },
    /// Element with ordered children
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<MarkupNode>,
    },
}

impl MarkupNode {
    /// Text leaf
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Element without attributes
    #[must_use]
    pub fn element(tag: impl Into<String>, children: Vec<MarkupNode>) -> Self {
        Self::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children,
        }
    }

    /// Add an attribute (no-op on text leaves)
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Element tag, `None` for text
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element { tag, .. } => Some(tag),
            Self::Text { .. } => None,
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            Self::Text { .. } => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[MarkupNode] {
        match self {
            Self::Element { children, .. } => children,
            Self::Text { .. } => &[],
        }
    }

    /// Is this a `ruby`-style reading element
    #[must_use]
    pub fn is_reading_element(&self) -> bool {
        self.tag()
            .is_some_and(|t| t.eq_ignore_ascii_case(READING_TAG))
    }

    fn is_reading_text(&self) -> bool {
        self.tag()
            .is_some_and(|t| READING_TEXT_TAGS.iter().any(|r| t.eq_ignore_ascii_case(r)))
    }

    /// All text beneath this node, readings included
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(std::slice::from_ref(self), false, &mut out);
        out
    }

    /// Text beneath this node with `rt`/`rp` readings left out
    #[must_use]
    pub fn base_text(&self) -> String {
        let mut out = String::new();
        collect_text(std::slice::from_ref(self), true, &mut out);
        out
    }

    /// The reading carried by an `rt` child, if any
    #[must_use]
    pub fn reading_text(&self) -> Option<String> {
        self.children()
            .iter()
            .find(|c| c.tag().is_some_and(|t| t.eq_ignore_ascii_case("rt")))
            .map(MarkupNode::text_content)
    }
}

fn collect_text(nodes: &[MarkupNode], skip_readings: bool, out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text { content } => out.push_str(content),
            MarkupNode::Element { children, .. } => {
                if skip_readings && node.is_reading_text() {
                    continue;
                }
                collect_text(children, skip_readings, out);
            }
        }
    }
}

/// Concatenated text of a fragment without `rt`/`rp` readings.
///
/// For a converter tree this reproduces the source subtitle text.
#[must_use]
pub fn fragment_base_text(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    collect_text(nodes, true, &mut out);
    out
}

/// Whether any node in the fragment is a reading element
#[must_use]
pub fn contains_reading(nodes: &[MarkupNode]) -> bool {
    nodes
        .iter()
        .any(|n| n.is_reading_element() || contains_reading(n.children()))
}

/// Parse an HTML fragment into markup nodes.
///
/// Comments and other non-content nodes are dropped. html5ever recovers from
/// malformed input, so this never fails.
#[must_use]
pub fn parse_fragment(html: &str) -> Vec<MarkupNode> {
    let document = Html::parse_fragment(html);
    convert_children(document.root_element())
}

fn convert_children(parent: ElementRef<'_>) -> Vec<MarkupNode> {
    parent
        .children()
        .filter_map(|child| {
            if let Some(element) = ElementRef::wrap(child) {
                let value = element.value();
                return Some(MarkupNode::Element {
                    tag: value.name().to_string(),
                    attributes: value
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    children: convert_children(element),
                });
            }
            child.value().as_text().map(|text| MarkupNode::text(&**text))
        })
        .collect()
}

/// Render a fragment as HTML
#[must_use]
pub fn render(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, &mut out);
    }
    out
}

fn render_node(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text { content } => out.push_str(&escape_text(content)),
        MarkupNode::Element {
            tag,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                // Writing to String never fails
                let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
            }
            out.push('>');
            if VOID_TAGS.iter().any(|v| tag.eq_ignore_ascii_case(v)) {
                return;
            }
            for child in children {
                render_node(child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

/// Escape text for use as HTML element content
#[must_use]
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
