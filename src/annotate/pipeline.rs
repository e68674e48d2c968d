//! Per-subtitle annotation pass
//!
//! Orchestrates the collaborators for one subtitle line:
//!
//! 1. Whitespace-only text hides the display.
//! 2. Text with kanji goes through the reading converter; its markup becomes
//!    the reading tree. Without kanji, or on converter failure, the tree is
//!    the plain text.
//! 3. Words come from the analyzer (aligned against the text) or from the
//!    reading tree's own reading elements, depending on configuration.
//! 4. Glosses are resolved sequentially through the dictionary.
//! 5. The compositor merges the highlights into the tree; if that fails the
//!    raw text is shown.
//!
//! No step is fatal: every failure degrades to less annotation.
//!
//! # Example
//!
//! ```rust,no_run
//! use subgloss::annotate::AnnotationPipeline;
//! use subgloss::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = AnnotationPipeline::from_config(&Config::load(None)?)?;
//!     let view = pipeline.annotate("東京に行く").await;
//!     println!("{}", view.to_html());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::align::{align_tokens, collect_reading_words, AnnotatedWord};
use super::compositor::{Compositor, CompositorConfig};
use super::markup::{parse_fragment, render, MarkupNode};
use crate::config::{Config, WordSource};
use crate::dictionary::cache::GlossCache;
use crate::dictionary::http::HttpDictionary;
use crate::dictionary::DictionaryResolver;
use crate::external::{
    has_kanji, Analyzer, CommandAnalyzer, CommandConverter, ConvertOptions, NoAnalyzer,
    PassthroughConverter, ReadingConverter,
};

/// What to show for one subtitle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum SubtitleView {
    /// Nothing visible; the display is hidden
    Hidden,
    /// Composited tree
    Annotated(Vec<MarkupNode>),
    /// Raw text, shown when compositing failed
    Plain(String),
}

impl SubtitleView {
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }

    /// HTML for the display; empty when hidden
    #[must_use]
    pub fn to_html(&self) -> String {
        match self {
            Self::Hidden => String::new(),
            Self::Annotated(nodes) => render(nodes),
            Self::Plain(text) => render(&[MarkupNode::text(text.as_str())]),
        }
    }
}

/// Anything that turns subtitle text into a view
#[async_trait]
pub trait Annotate: Send + Sync {
    async fn annotate(&self, text: &str) -> SubtitleView;
}

/// Annotation pass over the configured collaborators
pub struct AnnotationPipeline {
    analyzer: Arc<dyn Analyzer>,
    converter: Arc<dyn ReadingConverter>,
    resolver: Arc<DictionaryResolver>,
    compositor: Compositor,
    word_source: WordSource,
}

impl AnnotationPipeline {
    /// Create a pipeline with the default compositor and analyzer word source
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        converter: Arc<dyn ReadingConverter>,
        resolver: Arc<DictionaryResolver>,
    ) -> Self {
        Self {
            analyzer,
            converter,
            resolver,
            compositor: Compositor::new(),
            word_source: WordSource::default(),
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// Unset helper commands fall back to [`NoAnalyzer`] and
    /// [`PassthroughConverter`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = HttpDictionary::new(&config.dictionary)?;
        let cache = GlossCache::new(config.cache.capacity, config.cache.ttl());
        let resolver = DictionaryResolver::with_cache(backend, cache)
            .with_partial_limit(config.dictionary.partial_limit);

        let analyzer: Arc<dyn Analyzer> = match CommandAnalyzer::from_config(&config.analyzer) {
            Some(analyzer) => Arc::new(analyzer),
            None => {
                debug!("No analyzer configured");
                Arc::new(NoAnalyzer)
            }
        };
        let converter: Arc<dyn ReadingConverter> =
            match CommandConverter::from_config(&config.converter) {
                Some(converter) => Arc::new(converter),
                None => {
                    debug!("No reading converter configured");
                    Arc::new(PassthroughConverter)
                }
            };

        Ok(Self::new(analyzer, converter, Arc::new(resolver))
            .with_word_source(config.pipeline.word_source)
            .with_compositor(Compositor::with_config(
                CompositorConfig::default().with_separator(&config.pipeline.popup_separator),
            )))
    }

    #[must_use]
    pub fn with_word_source(mut self, source: WordSource) -> Self {
        self.word_source = source;
        self
    }

    #[must_use]
    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    /// Dictionary resolver shared with lookups outside a pass
    #[must_use]
    pub fn resolver(&self) -> &Arc<DictionaryResolver> {
        &self.resolver
    }

    /// Run one annotation pass
    #[instrument(skip(self), fields(chars = text.chars().count()))]
    pub async fn annotate(&self, text: &str) -> SubtitleView {
        if text.trim().is_empty() {
            return SubtitleView::Hidden;
        }

        let tree = self.reading_tree(text).await;
        let mut words = self.words(text, &tree).await;
        self.resolver.resolve_all(&mut words).await;

        match self.compositor.compose(text, &tree, &words) {
            Ok(nodes) => SubtitleView::Annotated(nodes),
            Err(e) => {
                warn!(error = %e, "Compositing failed, showing plain text");
                SubtitleView::Plain(text.to_string())
            }
        }
    }

    /// Reading tree for `text`; the plain text when there is nothing to read
    pub async fn reading_tree(&self, text: &str) -> Vec<MarkupNode> {
        if !has_kanji(text) {
            return vec![MarkupNode::text(text)];
        }
        match self.converter.convert(text, ConvertOptions::default()).await {
            Ok(markup) => parse_fragment(&markup),
            Err(e) => {
                warn!(error = %e, "Reading conversion failed");
                vec![MarkupNode::text(text)]
            }
        }
    }

    /// Located words for `text`, not yet glossed
    pub async fn words(&self, text: &str, tree: &[MarkupNode]) -> Vec<AnnotatedWord> {
        match self.word_source {
            WordSource::ReadingTree => collect_reading_words(text, tree),
            WordSource::Analyzer => match self.analyzer.parse(text).await {
                Ok(tokens) => align_tokens(text, &tokens),
                Err(e) => {
                    warn!(error = %e, "Analyzer failed, showing readings only");
                    Vec::new()
                }
            },
        }
    }
}

#[async_trait]
impl Annotate for AnnotationPipeline {
    async fn annotate(&self, text: &str) -> SubtitleView {
        AnnotationPipeline::annotate(self, text).await
    }
}
