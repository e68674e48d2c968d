//! Merge word highlights into a reading-annotated tree
//!
//! Two modes share one priority rule (position ascending, longer first) and
//! one set of claimed source offsets:
//!
//! - **overlay** when the tree has no reading elements: every text leaf is
//!   split around the words it contains ([`overlay`](super::overlay::overlay)).
//! - **tree merge** when it does: a reading element is kept whole and wrapped
//!   in a highlight if it matches a word, never split; plain leaves between
//!   reading elements are split as in overlay mode.
//!
//! # Example
//!
//! ```rust
//! use subgloss::annotate::{AnnotatedWord, Compositor, MarkupNode};
//!
//! let tree = vec![MarkupNode::text("猫です")];
//! let words = vec![AnnotatedWord::new("猫", "ねこ").at(0)];
//!
//! let merged = Compositor::new().compose("猫です", &tree, &words).unwrap();
//! assert_eq!(merged.len(), 2);
//! ```

use thiserror::Error;
use tracing::{debug, trace};

use super::align::AnnotatedWord;
use super::markup::{contains_reading, MarkupNode};
use super::overlay::{
    highlight, is_reading_text_tag, overlay, priority_order, split_leaf, Claims, SourceCursor,
};

/// Compositing failures; callers fall back to plain text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("markup nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Compositing mode picked for a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeMode {
    Overlay,
    TreeMerge,
}

impl ComposeMode {
    /// Tree merge whenever a reading element is present
    #[must_use]
    pub fn for_tree(nodes: &[MarkupNode]) -> Self {
        if contains_reading(nodes) {
            Self::TreeMerge
        } else {
            Self::Overlay
        }
    }
}

/// Configuration for the compositor
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Joins reading and meaning in the popup text
    pub popup_separator: String,
    /// Deepest element nesting accepted
    pub max_depth: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            popup_separator: " - ".to_string(),
            max_depth: 64,
        }
    }
}

impl CompositorConfig {
    /// Use a different popup separator
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.popup_separator = separator.into();
        self
    }
}

/// Highlight compositor
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: CompositorConfig,
}

impl Compositor {
    /// Compositor with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compositor with custom configuration
    #[must_use]
    pub fn with_config(config: CompositorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Merge `words` into `tree`, the rendering of `source`.
    ///
    /// With no words the tree is returned unchanged. The base text of the
    /// result (reading sub-nodes excluded) always equals that of `tree`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::TooDeep`] for trees nested beyond
    /// [`CompositorConfig::max_depth`].
    pub fn compose(
        &self,
        source: &str,
        tree: &[MarkupNode],
        words: &[AnnotatedWord],
    ) -> Result<Vec<MarkupNode>, ComposeError> {
        if words.is_empty() {
            return Ok(tree.to_vec());
        }

        let mode = ComposeMode::for_tree(tree);
        debug!(?mode, words = words.len(), "Compositing highlights");
        match mode {
            ComposeMode::Overlay => overlay(source, tree, words, &self.config),
            ComposeMode::TreeMerge => merge_tree(source, tree, words, &self.config),
        }
    }
}

/// Tree-merge mode: wrap matching reading elements whole, split plain leaves
pub fn merge_tree(
    source: &str,
    tree: &[MarkupNode],
    words: &[AnnotatedWord],
    config: &CompositorConfig,
) -> Result<Vec<MarkupNode>, ComposeError> {
    let ordered = priority_order(words);
    let mut walk = MergeWalk {
        cursor: SourceCursor::new(source),
        claims: Claims::new(source),
        words: &ordered,
        config,
    };
    walk.nodes(tree, 0)
}

struct MergeWalk<'a, 'w> {
    cursor: SourceCursor<'a>,
    claims: Claims,
    words: &'a [&'w AnnotatedWord],
    config: &'a CompositorConfig,
}

impl<'w> MergeWalk<'_, 'w> {
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
                _ if node.is_reading_element() => out.push(self.reading_element(node)),
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

    fn reading_element(&mut self, node: &MarkupNode) -> MarkupNode {
        let base = node.base_text();
        let range = self.cursor.advance(&base);

        if let Some((start, end)) = range {
            if !self.claims.is_free(start, end) {
                return node.clone();
            }
        }

        match self.match_word(&base, range) {
            Some(word) => {
                trace!(base = %base, word = %word.word, "Wrapping reading element");
                if let Some((start, end)) = range {
                    self.claims.claim(start, end);
                }
                highlight(word, vec![node.clone()], &self.config.popup_separator)
            }
            None => node.clone(),
        }
    }

    /// Word for a reading element: same text, or one text containing the
    /// other. Words overlapping the element's source range are preferred.
    fn match_word(&self, base: &str, range: Option<(usize, usize)>) -> Option<&'w AnnotatedWord> {
        if base.is_empty() {
            return None;
        }
        let text_matches = |w: &&&'w AnnotatedWord| {
            !w.word.is_empty() && (w.word == base || w.word.contains(base) || base.contains(w.word.as_str()))
        };
        let overlaps = |w: &&&'w AnnotatedWord| match (range, w.range()) {
            (Some((start, end)), Some((w_start, w_end))) => w_start < end && start < w_end,
            _ => false,
        };

        self.words
            .iter()
            .filter(text_matches)
            .find(overlaps)
            .or_else(|| self.words.iter().find(text_matches))
            .copied()
    }
}
