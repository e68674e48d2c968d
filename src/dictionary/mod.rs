//! Dictionary resolution with tiered fallback
//!
//! A word is looked up through three tiers, each consulted only when the
//! previous one produced nothing usable:
//!
//! 1. **Inflected** search (handles conjugated forms)
//! 2. **Direct** search
//! 3. **Partial** search, capped to a few results
//!
//! A failing tier counts as an empty one. Resolution itself never errors:
//! callers get a gloss or one of the [`NO_DEFINITION`] / [`LOOKUP_ERROR`]
//! sentinels.
//!
//! # Example
//!
//! ```rust,no_run
//! use subgloss::dictionary::{DictionaryResolver, HttpDictionary};
//! use subgloss::config::DictionaryConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let backend = HttpDictionary::new(&DictionaryConfig::default())?;
//! let resolver = DictionaryResolver::new(backend);
//! println!("{}", resolver.resolve("食べる").await);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod http;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use cache::{CacheStats, GlossCache};
pub use http::HttpDictionary;

use crate::annotate::align::AnnotatedWord;

/// Gloss shown when no tier has a usable meaning
pub const NO_DEFINITION: &str = "No definition found";

/// Gloss shown when the lookup could not be attempted at all
pub const LOOKUP_ERROR: &str = "Error fetching meaning";

/// Default result cap for partial search
pub const DEFAULT_PARTIAL_LIMIT: usize = 5;

/// Dictionary lookup errors
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned HTTP {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The query could not be turned into a request; no tier can succeed
    #[error("cannot build query for '{0}'")]
    InvalidQuery(String),
}

impl LookupError {
    /// Whether this failure aborts the whole resolution instead of one tier
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }
}

/// Search endpoint tiers, in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTier {
    Inflected,
    Direct,
    Partial { limit: usize },
}

impl fmt::Display for SearchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inflected => write!(f, "inflected"),
            Self::Direct => write!(f, "direct"),
            Self::Partial { limit } => write!(f, "partial(limit={limit})"),
        }
    }
}

/// One dictionary record; absent fields are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryMatch {
    pub word: String,
    pub meaning: String,
    pub hiragana: String,
}

impl DictionaryMatch {
    #[must_use]
    pub fn new(
        word: impl Into<String>,
        meaning: impl Into<String>,
        hiragana: impl Into<String>,
    ) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
            hiragana: hiragana.into(),
        }
    }

    fn has_meaning(&self) -> bool {
        !self.meaning.trim().is_empty()
    }
}

/// A searchable dictionary
#[async_trait]
pub trait DictionaryBackend: Send + Sync {
    /// Query one tier for `word`
    async fn search(
        &self,
        tier: SearchTier,
        word: &str,
    ) -> Result<Vec<DictionaryMatch>, LookupError>;
}

/// Pick from one tier's matches.
///
/// Prefers an exact surface match with a meaning, then any match with a
/// meaning. With `accept_first` (inflected tier only) the first match is
/// taken even when its meaning is empty.
fn pick_match(
    word: &str,
    matches: Vec<DictionaryMatch>,
    accept_first: bool,
) -> Option<DictionaryMatch> {
    if let Some(exact) = matches.iter().find(|m| m.word == word && m.has_meaning()) {
        return Some(exact.clone());
    }
    if let Some(any) = matches.iter().find(|m| m.has_meaning()) {
        return Some(any.clone());
    }
    if accept_first {
        return matches.into_iter().next();
    }
    None
}

/// Outcome of running the tiers for one word
enum TierOutcome {
    Found(DictionaryMatch),
    /// Nothing found; `answered` is false when every tier errored
    Exhausted { answered: bool },
}

/// Tiered resolver with a session cache
pub struct DictionaryResolver {
    backend: Box<dyn DictionaryBackend>,
    cache: Mutex<GlossCache>,
    partial_limit: usize,
}

impl DictionaryResolver {
    /// Create a resolver with a default-sized cache
    pub fn new(backend: impl DictionaryBackend + 'static) -> Self {
        Self::with_cache(backend, GlossCache::default())
    }

    /// Create a resolver with a custom cache
    pub fn with_cache(backend: impl DictionaryBackend + 'static, cache: GlossCache) -> Self {
        Self {
            backend: Box::new(backend),
            cache: Mutex::new(cache),
            partial_limit: DEFAULT_PARTIAL_LIMIT,
        }
    }

    /// Set the partial-search result cap
    #[must_use]
    pub fn with_partial_limit(mut self, limit: usize) -> Self {
        self.partial_limit = limit;
        self
    }

    /// Resolve a word to its best match, consulting the cache first.
    ///
    /// `Ok(None)` means every tier came back empty.
    pub async fn lookup(
        &self,
        word: &str,
    ) -> Result<Option<DictionaryMatch>, LookupError> {
        let cached = self.cache().get(word);
        if let Some(cached) = cached {
            debug!(word, "Gloss cache hit");
            return Ok(cached);
        }

        match self.run_tiers(word).await? {
            TierOutcome::Found(found) => {
                self.cache().insert(word, Some(found.clone()));
                Ok(Some(found))
            }
            TierOutcome::Exhausted { answered } => {
                // A total outage is not remembered as "no definition"
                if answered {
                    self.cache().insert(word, None);
                }
                Ok(None)
            }
        }
    }

    async fn run_tiers(&self, word: &str) -> Result<TierOutcome, LookupError> {
        let tiers = [
            SearchTier::Inflected,
            SearchTier::Direct,
            SearchTier::Partial {
                limit: self.partial_limit,
            },
        ];
        let mut answered = false;

        for tier in tiers {
            match self.backend.search(tier, word).await {
                Ok(matches) => {
                    answered = true;
                    let accept_first = tier == SearchTier::Inflected;
                    if let Some(found) = pick_match(word, matches, accept_first) {
                        debug!(word, %tier, "Dictionary match");
                        return Ok(TierOutcome::Found(found));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(word, %tier, error = %e, "Dictionary tier failed, falling through");
                }
            }
        }

        Ok(TierOutcome::Exhausted { answered })
    }

    /// Resolve a word to display text. Never fails.
    pub async fn resolve(&self, word: &str) -> String {
        match self.lookup(word).await {
            Ok(Some(found)) if found.has_meaning() => found.meaning,
            Ok(_) => NO_DEFINITION.to_string(),
            Err(e) => {
                warn!(word, error = %e, "Dictionary lookup aborted");
                LOOKUP_ERROR.to_string()
            }
        }
    }

    /// Fill in meanings (and missing readings) for a batch of words.
    ///
    /// Words are resolved one after another, so an earlier lookup's cache
    /// entry serves a later duplicate.
    pub async fn resolve_all(&self, words: &mut [AnnotatedWord]) {
        for word in words.iter_mut() {
            match self.lookup(&word.word).await {
                Ok(Some(found)) => {
                    if word.reading.is_empty() && found.hiragana != word.word {
                        word.reading.clone_from(&found.hiragana);
                    }
                    word.meaning = Some(if found.has_meaning() {
                        found.meaning
                    } else {
                        NO_DEFINITION.to_string()
                    });
                }
                Ok(None) => word.meaning = Some(NO_DEFINITION.to_string()),
                Err(e) => {
                    warn!(word = %word.word, error = %e, "Dictionary lookup aborted");
                    word.meaning = Some(LOOKUP_ERROR.to_string());
                }
            }
        }
    }

    /// Snapshot of cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, GlossCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted backend: per-tier responses, counting every call
    #[derive(Default, Clone)]
    pub(crate) struct MockBackend {
        pub responses: HashMap<(&'static str, String), Vec<DictionaryMatch>>,
        pub failing: Vec<&'static str>,
        pub calls: Arc<AtomicUsize>,
        pub tier_calls: Arc<Mutex<Vec<&'static str>>>,
    }

    pub(crate) fn tier_key(tier: SearchTier) -> &'static str {
        match tier {
            SearchTier::Inflected => "inflected",
            SearchTier::Direct => "direct",
            SearchTier::Partial { .. } => "partial",
        }
    }

    impl MockBackend {
        pub fn with(mut self, tier: &'static str, word: &str, matches: Vec<DictionaryMatch>) -> Self {
            self.responses.insert((tier, word.to_string()), matches);
            self
        }

        pub fn failing(mut self, tier: &'static str) -> Self {
            self.failing.push(tier);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DictionaryBackend for MockBackend {
        async fn search(
            &self,
            tier: SearchTier,
            word: &str,
        ) -> Result<Vec<DictionaryMatch>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = tier_key(tier);
            self.tier_calls.lock().unwrap().push(key);
            if word.contains('\0') {
                return Err(LookupError::InvalidQuery(word.to_string()));
            }
            if self.failing.contains(&key) {
                return Err(LookupError::Status(503));
            }
            Ok(self
                .responses
                .get(&(key, word.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn m(word: &str, meaning: &str) -> DictionaryMatch {
        DictionaryMatch::new(word, meaning, "")
    }

    #[tokio::test]
    async fn exact_inflected_match_skips_later_tiers() {
        let backend = MockBackend::default().with("inflected", "食べた", vec![m("食べた", "ate")]);
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        assert_eq!(resolver.resolve("食べた").await, "ate");
        assert_eq!(calls.call_count(), 1);
    }

    #[tokio::test]
    async fn prefers_exact_surface_match() {
        let backend = MockBackend::default().with(
            "inflected",
            "行く",
            vec![m("行き", "going"), m("行く", "to go")],
        );
        let resolver = DictionaryResolver::new(backend);
        assert_eq!(resolver.resolve("行く").await, "to go");
    }

    #[tokio::test]
    async fn falls_back_to_any_match_with_meaning() {
        let backend = MockBackend::default().with(
            "inflected",
            "行った",
            vec![m("行った", ""), m("行く", "to go")],
        );
        let resolver = DictionaryResolver::new(backend);
        assert_eq!(resolver.resolve("行った").await, "to go");
    }

    #[tokio::test]
    async fn inflected_tier_accepts_first_match_without_meaning() {
        let backend = MockBackend::default()
            .with("inflected", "ぬ", vec![m("ぬ", "")])
            .with("direct", "ぬ", vec![m("ぬ", "negative")]);
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        assert_eq!(resolver.resolve("ぬ").await, NO_DEFINITION);
        assert_eq!(calls.call_count(), 1);
    }

    #[tokio::test]
    async fn direct_tier_requires_a_meaning() {
        let backend = MockBackend::default()
            .with("direct", "猫", vec![m("猫", "")])
            .with("partial", "猫", vec![m("猫舌", "sensitive to heat")]);
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        assert_eq!(resolver.resolve("猫").await, "sensitive to heat");
        assert_eq!(*calls.tier_calls.lock().unwrap(), vec!["inflected", "direct", "partial"]);
    }

    #[tokio::test]
    async fn failing_tier_falls_through() {
        let backend = MockBackend::default()
            .failing("inflected")
            .with("direct", "犬", vec![m("犬", "dog")]);
        let resolver = DictionaryResolver::new(backend);
        assert_eq!(resolver.resolve("犬").await, "dog");
    }

    #[tokio::test]
    async fn exhausted_tiers_give_sentinel_and_are_cached() {
        let backend = MockBackend::default();
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        assert_eq!(resolver.resolve("ゑ").await, NO_DEFINITION);
        assert_eq!(calls.call_count(), 3);
        assert_eq!(resolver.resolve("ゑ").await, NO_DEFINITION);
        assert_eq!(calls.call_count(), 3);
    }

    #[tokio::test]
    async fn total_outage_is_not_cached() {
        let backend = MockBackend::default()
            .failing("inflected")
            .failing("direct")
            .failing("partial");
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        assert_eq!(resolver.resolve("猫").await, NO_DEFINITION);
        assert_eq!(resolver.resolve("猫").await, NO_DEFINITION);
        assert_eq!(calls.call_count(), 6);
    }

    #[tokio::test]
    async fn fatal_error_gives_error_sentinel() {
        let backend = MockBackend::default();
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        assert_eq!(resolver.resolve("bad\0word").await, LOOKUP_ERROR);
        assert_eq!(calls.call_count(), 1);
    }

    #[tokio::test]
    async fn batch_resolution_reuses_cache_for_duplicates() {
        let backend = MockBackend::default().with(
            "inflected",
            "猫",
            vec![DictionaryMatch::new("猫", "cat", "ねこ")],
        );
        let calls = backend.clone();
        let resolver = DictionaryResolver::new(backend);

        let mut words = vec![
            AnnotatedWord::new("猫", "").at(0),
            AnnotatedWord::new("猫", "").at(2),
        ];
        resolver.resolve_all(&mut words).await;

        assert_eq!(calls.call_count(), 1);
        assert_eq!(words[1].meaning.as_deref(), Some("cat"));
        assert_eq!(words[0].reading, "ねこ");
        assert_eq!(resolver.cache_stats().hits, 1);
    }

    #[test]
    fn missing_fields_deserialize_as_empty() {
        let parsed: DictionaryMatch = serde_json::from_str(r#"{"word": "猫"}"#).unwrap();
        assert_eq!(parsed, DictionaryMatch::new("猫", "", ""));
    }
}
