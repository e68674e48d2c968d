//! Highlight overlay on plain text leaves
//!
//! Each text leaf is matched against the source text, continuing from where
//! the previous leaf ended, to learn which character range it covers. Words
//! intersecting that range are cut out of the leaf and wrapped in highlight
//! elements; the rest stays as plain text. A word crossing a leaf boundary is
//! wrapped once per leaf, truncated to the part inside it.

use std::cmp::Reverse;

use super::align::{find_from, AnnotatedWord};
use super::compositor::{ComposeError, CompositorConfig};
use super::markup::MarkupNode;

/// Element wrapping a highlighted word
pub const HIGHLIGHT_TAG: &str = "span";

/// Class marking highlight wrappers
pub const HIGHLIGHT_CLASS: &str = "word-highlight";

/// Popup text when a word has neither reading nor meaning
pub const NO_MEANING: &str = "No meaning available";

/// Popup text for a word: reading and meaning, whichever are present
#[must_use]
pub fn popup_text(word: &AnnotatedWord, separator: &str) -> String {
    let parts: Vec<&str> = [word.reading.as_str(), word.meaning.as_deref().unwrap_or("")]
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect();

    if parts.is_empty() {
        NO_MEANING.to_string()
    } else {
        parts.join(separator)
    }
}

/// Wrap `children` in a highlight element for `word`
#[must_use]
pub fn highlight(word: &AnnotatedWord, children: Vec<MarkupNode>, separator: &str) -> MarkupNode {
    MarkupNode::element(HIGHLIGHT_TAG, children)
        .with_attr("class", HIGHLIGHT_CLASS)
        .with_attr("data-word", &word.word)
        .with_attr("data-popup", popup_text(word, separator))
}

/// Is this node a highlight wrapper
#[must_use]
pub fn is_highlight(node: &MarkupNode) -> bool {
    node.attr("class") == Some(HIGHLIGHT_CLASS)
}

/// Order words for wrapping: by position, longer first on ties, unlocated last
pub(crate) fn priority_order(words: &[AnnotatedWord]) -> Vec<&AnnotatedWord> {
    let mut ordered: Vec<&AnnotatedWord> = words.iter().collect();
    ordered.sort_by_key(|w| (w.position.unwrap_or(usize::MAX), Reverse(w.length)));
    ordered
}

/// Follows successive pieces of text through the source string
pub(crate) struct SourceCursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> SourceCursor<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Character range of `piece`, searching from the end of the last match.
    ///
    /// `None` if the piece does not occur; the cursor then stays put.
    pub(crate) fn advance(&mut self, piece: &str) -> Option<(usize, usize)> {
        if piece.is_empty() {
            return Some((self.pos, self.pos));
        }
        let start = find_from(self.source, piece, self.pos)?;
        let end = start + piece.chars().count();
        self.pos = end;
        Some((start, end))
    }
}

/// Source offsets already covered by a highlight
pub(crate) struct Claims {
    taken: Vec<bool>,
}

impl Claims {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            taken: vec![false; source.chars().count()],
        }
    }

    pub(crate) fn is_free(&self, start: usize, end: usize) -> bool {
        end <= self.taken.len() && !self.taken[start..end].iter().any(|&t| t)
    }

    pub(crate) fn claim(&mut self, start: usize, end: usize) {
        let end = end.min(self.taken.len());
        for slot in self.taken.iter_mut().take(end).skip(start) {
            *slot = true;
        }
    }
}

/// Split one text leaf covering `range` into plain and highlighted fragments.
///
/// `words` must be in [`priority_order`]. A word is skipped for this leaf if
/// it does not intersect it or if any offset it would cover is already
/// claimed.
pub(crate) fn split_leaf(
    content: &str,
    range: (usize, usize),
    words: &[&AnnotatedWord],
    claims: &mut Claims,
    separator: &str,
) -> Vec<MarkupNode> {
    let chars: Vec<char> = content.chars().collect();
    let (leaf_start, leaf_end) = range;
    let slice = |a: usize, b: usize| -> String { chars[a..b].iter().collect() };

    let mut fragments = Vec::new();
    let mut cursor = 0;

    for word in words {
        let Some((word_start, word_end)) = word.range() else {
            continue;
        };
        let start = word_start.max(leaf_start);
        let end = word_end.min(leaf_end);
        if start >= end {
            continue;
        }
        let (a, b) = (start - leaf_start, end - leaf_start);
        if a < cursor || !claims.is_free(start, end) {
            continue;
        }

        if a > cursor {
            fragments.push(MarkupNode::text(slice(cursor, a)));
        }
        fragments.push(highlight(word, vec![MarkupNode::text(slice(a, b))], separator));
        claims.claim(start, end);
        cursor = b;
    }

    if cursor < chars.len() || fragments.is_empty() {
        fragments.push(MarkupNode::text(slice(cursor, chars.len())));
    }
    fragments
}

/// Overlay mode: highlight words across every text leaf of `nodes`.
///
/// Reading sub-nodes (`rt`, `rp`) are not part of the source text and are
/// copied through untouched.
pub fn overlay(
    source: &str,
    nodes: &[MarkupNode],
    words: &[AnnotatedWord],
    config: &CompositorConfig,
) -> Result<Vec<MarkupNode>, ComposeError> {
    let ordered = priority_order(words);
    let mut walk = OverlayWalk {
        cursor: SourceCursor::new(source),
        claims: Claims::new(source),
        words: &ordered,
        config,
    };
    walk.nodes(nodes, 0)
}

struct OverlayWalk<'a, 'w> {
    cursor: SourceCursor<'a>,
    claims: Claims,
    words: &'a [&'w AnnotatedWord],
    config: &'a CompositorConfig,
}

impl OverlayWalk<'_, '_> {
    fn nodes(&mut self, nodes: &[MarkupNode], depth: usize) -> Result<Vec<MarkupNode>, ComposeError> {
        if depth > self.config.max_depth {
            return Err(ComposeError::TooDeep(self.config.max_depth));
        }

        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                MarkupNode::Text { content } => match self.cursor.advance(content) {
                    Some(range) => out.extend(split_leaf(
                        content,
                        range,
                        self.words,
                        &mut self.claims,
                        &self.config.popup_separator,
                    )),
                    None => out.push(node.clone()),
                },
                MarkupNode::Element { .. } if node.tag().is_some_and(is_reading_text_tag) => {
                    out.push(node.clone());
                }
                MarkupNode::Element {
                    tag,
                    attributes,
                    children,
                } => out.push(MarkupNode::Element {
                    tag: tag.clone(),
                    attributes: attributes.clone(),
                    children: self.nodes(children, depth + 1)?,
                }),
            }
        }
        Ok(out)
    }
}

pub(crate) fn is_reading_text_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("rt") || tag.eq_ignore_ascii_case("rp")
}
