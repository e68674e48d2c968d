//! HTTP dictionary service client
//!
//! All three tiers are GET requests built from URL templates in
//! [`DictionaryConfig`]; the response body is `{"matches": [...]}` with
//! best-effort `word` / `meaning` / `hiragana` fields.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{DictionaryBackend, DictionaryMatch, LookupError, SearchTier};
use crate::config::DictionaryConfig;

/// Dictionary backend talking to the HTTP service
pub struct HttpDictionary {
    client: Client,
    base_url: Url,
    config: DictionaryConfig,
}

impl HttpDictionary {
    /// Create a client for the configured service
    pub fn new(config: &DictionaryConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid dictionary base_url '{}'", config.base_url))?;

        let client = Client::builder()
            // Lookups are sequential and short; a small pool is plenty
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .user_agent(format!("subgloss/{}", crate::VERSION))
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.timeout())
            .build()
            .context("failed to build dictionary HTTP client")?;

        Ok(Self {
            client,
            base_url,
            config: config.clone(),
        })
    }

    /// Request URL for one tier
    pub fn endpoint(&self, tier: SearchTier, word: &str) -> Result<Url, LookupError> {
        if word.trim().is_empty() {
            return Err(LookupError::InvalidQuery(word.to_string()));
        }

        let (template, limit) = match tier {
            SearchTier::Inflected => (&self.config.inflected, None),
            SearchTier::Direct => (&self.config.direct, None),
            SearchTier::Partial { limit } => (&self.config.partial, Some(limit)),
        };

        let mut path = template.replace("{query}", &urlencoding::encode(word));
        if let Some(limit) = limit {
            path = path.replace("{limit}", &limit.to_string());
        }

        self.base_url
            .join(&path)
            .map_err(|_| LookupError::InvalidQuery(word.to_string()))
    }
}

#[async_trait]
impl DictionaryBackend for HttpDictionary {
    #[instrument(skip(self), fields(tier = %tier))]
    async fn search(&self, tier: SearchTier, word: &str) -> Result<Vec<DictionaryMatch>, LookupError> {
        let url = self.endpoint(tier, word)?;
        debug!(%url, "Dictionary request");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_matches(&body)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    matches: Option<Vec<RawMatch>>,
}

#[derive(Deserialize)]
struct RawMatch {
    word: Option<String>,
    meaning: Option<String>,
    hiragana: Option<String>,
}

/// Decode a search response; missing or null fields become empty strings.
pub(crate) fn parse_matches(body: &str) -> Result<Vec<DictionaryMatch>, LookupError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .matches
        .unwrap_or_default()
        .into_iter()
        .map(|m| DictionaryMatch {
            word: m.word.unwrap_or_default(),
            meaning: m.meaning.unwrap_or_default(),
            hiragana: m.hiragana.unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> HttpDictionary {
        HttpDictionary::new(&DictionaryConfig::default()).unwrap()
    }

    #[test]
    fn builds_encoded_endpoints() {
        let dict = dictionary();
        let url = dict.endpoint(SearchTier::Inflected, "食べる").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/search/inflected?query=%E9%A3%9F%E3%81%B9%E3%82%8B"
        );
    }

    #[test]
    fn partial_endpoint_carries_limit() {
        let dict = dictionary();
        let url = dict.endpoint(SearchTier::Partial { limit: 5 }, "a b&c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/search/partial?query=a%20b%26c&limit=5"
        );
    }

    #[test]
    fn blank_word_is_an_invalid_query() {
        let err = dictionary().endpoint(SearchTier::Direct, "  ").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let config = DictionaryConfig {
            base_url: "not a url".to_string(),
            ..DictionaryConfig::default()
        };
        assert!(HttpDictionary::new(&config).is_err());
    }

    #[test]
    fn parses_best_effort_fields() {
        let body = r#"{"matches": [
            {"word": "猫", "meaning": "cat", "hiragana": "ねこ"},
            {"word": "猫舌", "meaning": null},
            {}
        ]}"#;
        let matches = parse_matches(body).unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0], DictionaryMatch::new("猫", "cat", "ねこ"));
        assert_eq!(matches[1], DictionaryMatch::new("猫舌", "", ""));
        assert_eq!(matches[2], DictionaryMatch::default());
    }

    #[test]
    fn missing_matches_is_empty() {
        assert!(parse_matches("{}").unwrap().is_empty());
        assert!(parse_matches(r#"{"matches": null}"#).unwrap().is_empty());
        assert!(parse_matches("<html>").is_err());
    }
}
