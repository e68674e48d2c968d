//! External collaborators: morphological analyzer and reading converter.
//!
//! Both are traits so the annotation pass can run against in-process fakes in
//! tests and against helper programs in the CLI.
//!
//! # Protocol
//!
//! Helper programs receive JSON on stdin and answer with JSON on stdout.
//!
//! Analyzer:
//! ```json
//! {"text": "東京に行く"}
//! ```
//! ```json
//! [{"surfaceForm": "東京", "reading": "トウキョウ", "partOfSpeech": "名詞"}]
//! ```
//!
//! Converter:
//! ```json
//! {"text": "東京に行く", "mode": "furigana", "to": "hiragana"}
//! ```
//! ```json
//! {"markup": "<ruby>東京<rt>とうきょう</rt></ruby>に行く"}
//! ```

pub mod runner;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use runner::{CommandAnalyzer, CommandConverter};

use crate::annotate::align::Token;
use crate::annotate::markup::escape_text;

/// Helper program failures
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("{0} is not configured")]
    Unavailable(&'static str),

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("'{program}' returned invalid output: {source}")]
    Output {
        program: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Converter output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertMode {
    Furigana,
}

/// Target syllabary for readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Syllabary {
    Hiragana,
}

/// Options passed to the reading converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvertOptions {
    pub mode: ConvertMode,
    pub to: Syllabary,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            mode: ConvertMode::Furigana,
            to: Syllabary::Hiragana,
        }
    }
}

/// Splits text into tokens
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn parse(&self, text: &str) -> Result<Vec<Token>, ExternalError>;
}

/// Produces reading-annotated markup for text containing kanji
#[async_trait]
pub trait ReadingConverter: Send + Sync {
    async fn convert(&self, text: &str, options: ConvertOptions) -> Result<String, ExternalError>;
}

/// Stand-in when no analyzer is configured; every call fails so the pass
/// degrades to reading-only display.
pub struct NoAnalyzer;

#[async_trait]
impl Analyzer for NoAnalyzer {
    async fn parse(&self, _text: &str) -> Result<Vec<Token>, ExternalError> {
        Err(ExternalError::Unavailable("analyzer"))
    }
}

/// Stand-in when no converter is configured.
///
/// The text comes back escaped, so the parsed tree is a single text leaf
/// equal to the input: tags and entities in subtitles stay literal.
pub struct PassthroughConverter;

#[async_trait]
impl ReadingConverter for PassthroughConverter {
    async fn convert(&self, text: &str, _options: ConvertOptions) -> Result<String, ExternalError> {
        Ok(escape_text(text))
    }
}

/// Whether `c` is a CJK ideograph (unified, extension A, or compatibility)
#[must_use]
pub fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}' | '々')
}

/// Whether the text contains any kanji
#[must_use]
pub fn has_kanji(text: &str) -> bool {
    text.chars().any(is_kanji)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kanji() {
        assert!(has_kanji("東京に行く"));
        assert!(has_kanji("時々"));
        assert!(!has_kanji("ひらがなとカタカナ"));
        assert!(!has_kanji("plain text"));
    }

    #[test]
    fn options_serialize_lowercase() {
        let json = serde_json::to_string(&ConvertOptions::default()).unwrap();
        assert_eq!(json, r#"{"mode":"furigana","to":"hiragana"}"#);
    }

    #[test]
    fn stand_ins_behave() {
        let analyzer = NoAnalyzer;
        assert!(tokio_test::block_on(analyzer.parse("猫")).is_err());

        let converter = PassthroughConverter;
        let out = tokio_test::block_on(converter.convert("猫", ConvertOptions::default())).unwrap();
        assert_eq!(out, "猫");
    }

    #[test]
    fn passthrough_keeps_markup_literal() {
        let text = "東京 <i>a</i> &amp; b";
        let markup =
            tokio_test::block_on(PassthroughConverter.convert(text, ConvertOptions::default()))
                .unwrap();
        let nodes = crate::annotate::markup::parse_fragment(&markup);
        assert_eq!(nodes, vec![crate::annotate::markup::MarkupNode::text(text)]);
    }
}
