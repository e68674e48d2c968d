//! Mapping analyzer output back onto subtitle text
//!
//! All offsets are in characters (Unicode scalar values) of the subtitle
//! text, not bytes: `"東京に行く"` puts `行く` at position 3.
//!
//! A single forward cursor is threaded through one pass. Each word is looked
//! up from the cursor first; if that fails the search restarts from the
//! beginning of the text. The fallback keeps reordered or merged tokens from
//! being dropped but can anchor a repeated surface form to an earlier
//! occurrence.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::markup::MarkupNode;

/// Morphological analyzer output for one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub surface_form: String,
    #[serde(default)]
    pub reading: String,
    #[serde(default)]
    pub part_of_speech: String,
}

impl Token {
    #[must_use]
    pub fn new(
        surface_form: impl Into<String>,
        reading: impl Into<String>,
        part_of_speech: impl Into<String>,
    ) -> Self {
        Self {
            surface_form: surface_form.into(),
            reading: reading.into(),
            part_of_speech: part_of_speech.into(),
        }
    }
}

/// A word located in the subtitle text, with its gloss once resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedWord {
    /// Surface form
    pub word: String,
    /// Character offset into the subtitle text, `None` if not located
    pub position: Option<usize>,
    /// Length in characters
    pub length: usize,
    /// Reading in hiragana, empty if unknown
    pub reading: String,
    /// Dictionary gloss, filled in by resolution
    pub meaning: Option<String>,
}

impl AnnotatedWord {
    /// Unlocated word
    #[must_use]
    pub fn new(word: impl Into<String>, reading: impl Into<String>) -> Self {
        let word = word.into();
        Self {
            length: word.chars().count(),
            word,
            position: None,
            reading: reading.into(),
            meaning: None,
        }
    }

    /// Set the located position
    #[must_use]
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Character range `[start, end)` if located
    #[must_use]
    pub fn range(&self) -> Option<(usize, usize)> {
        self.position.map(|p| (p, p + self.length))
    }
}

/// Where a search landed and where the cursor goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub position: usize,
    pub next_cursor: usize,
}

/// Find `surface` in `text` at or after character offset `cursor`, falling
/// back to a search from the start.
#[must_use]
pub fn locate(text: &str, surface: &str, cursor: usize) -> Option<Located> {
    let length = surface.chars().count();
    let position =
        find_from(text, surface, cursor).or_else(|| find_from(text, surface, 0))?;
    Some(Located {
        position,
        next_cursor: position + length,
    })
}

/// Character offset of `needle` in `haystack`, searching from character `from`
pub(crate) fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let start = byte_offset(haystack, from)?;
    let found = haystack[start..].find(needle)?;
    Some(from + haystack[start..start + found].chars().count())
}

/// Byte offset of character index `chars`; `None` past the end
fn byte_offset(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(chars)
}

/// Align analyzer tokens with the text they came from.
///
/// Empty and whitespace-only tokens are skipped; tokens not found anywhere in
/// the text are dropped.
#[must_use]
pub fn align_tokens(text: &str, tokens: &[Token]) -> Vec<AnnotatedWord> {
    let mut cursor = 0;
    let mut words = Vec::with_capacity(tokens.len());

    for token in tokens {
        if token.surface_form.trim().is_empty() {
            continue;
        }
        let Some(found) = locate(text, &token.surface_form, cursor) else {
            debug!(word = %token.surface_form, "Token not found in subtitle text");
            continue;
        };
        cursor = found.next_cursor;
        words.push(
            AnnotatedWord::new(&token.surface_form, katakana_to_hiragana(&token.reading))
                .at(found.position),
        );
    }

    words
}

/// Collect words from the reading elements of a converter tree.
///
/// Each distinct base text is kept once: a surface form recurring later in
/// the text does not get a second entry.
#[must_use]
pub fn collect_reading_words(text: &str, nodes: &[MarkupNode]) -> Vec<AnnotatedWord> {
    let mut candidates = Vec::new();
    gather_readings(nodes, &mut candidates);

    let mut cursor = 0;
    let mut words: Vec<AnnotatedWord> = Vec::new();
    for (base, reading) in candidates {
        if base.trim().is_empty() || words.iter().any(|w| w.word == base) {
            continue;
        }
        let Some(found) = locate(text, &base, cursor) else {
            debug!(word = %base, "Reading base not found in subtitle text");
            continue;
        };
        cursor = found.next_cursor;
        words.push(AnnotatedWord::new(base, reading).at(found.position));
    }
    words
}

fn gather_readings(nodes: &[MarkupNode], out: &mut Vec<(String, String)>) {
    for node in nodes {
        if node.is_reading_element() {
            out.push((node.base_text(), node.reading_text().unwrap_or_default()));
        } else {
            gather_readings(node.children(), out);
        }
    }
}

/// Convert katakana to hiragana, leaving everything else untouched.
///
/// Analyzers usually report readings in katakana; the reading layer uses
/// hiragana.
#[must_use]
pub fn katakana_to_hiragana(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ァ'..='ヶ' | 'ヽ' | 'ヾ' => {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_tokens_in_order() {
        let tokens = vec![
            Token::new("東京", "トウキョウ", "名詞"),
            Token::new("行く", "イク", "動詞"),
        ];
        let words = align_tokens("東京に行く", &tokens);

        assert_eq!(words.len(), 2);
        assert_eq!((words[0].word.as_str(), words[0].position, words[0].length), ("東京", Some(0), 2));
        assert_eq!((words[1].word.as_str(), words[1].position, words[1].length), ("行く", Some(3), 2));
        assert_eq!(words[0].reading, "とうきょう");
    }

    #[test]
    fn skips_blank_tokens() {
        let tokens = vec![
            Token::new(" ", "", "記号"),
            Token::new("", "", ""),
            Token::new("猫", "ネコ", "名詞"),
        ];
        let words = align_tokens("猫 です", &tokens);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].position, Some(0));
    }

    #[test]
    fn drops_tokens_missing_from_text() {
        let tokens = vec![Token::new("犬", "イヌ", "名詞"), Token::new("猫", "ネコ", "名詞")];
        let words = align_tokens("猫がいる", &tokens);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "猫");
    }

    #[test]
    fn repeated_surface_forms_advance_the_cursor() {
        let tokens = vec![Token::new("猫", "", ""), Token::new("と", "", ""), Token::new("猫", "", "")];
        let words = align_tokens("猫と猫", &tokens);
        let positions: Vec<_> = words.iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn reordered_tokens_fall_back_to_start() {
        // "東京" is already behind the cursor; the fallback re-anchors it at 0
        // and the cursor moves back to just after it.
        let tokens = vec![
            Token::new("行く", "", ""),
            Token::new("東京", "", ""),
            Token::new("に", "", ""),
        ];
        let words = align_tokens("東京に行く", &tokens);
        let positions: Vec<_> = words.iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![Some(3), Some(0), Some(2)]);
    }

    #[test]
    fn fallback_can_mis_anchor_a_duplicate() {
        // The second "猫" is not present after the cursor, so it lands on the
        // first occurrence again.
        let tokens = vec![Token::new("猫と猫", "", ""), Token::new("猫", "", "")];
        let words = align_tokens("猫と猫", &tokens);
        assert_eq!(words[1].position, Some(0));
    }

    #[test]
    fn positions_stay_within_text() {
        let text = "abcあいう";
        let tokens = vec![Token::new("う", "", ""), Token::new("abc", "", ""), Token::new("いう", "", "")];
        let len = text.chars().count();
        for w in align_tokens(text, &tokens) {
            assert!(w.position.unwrap() + w.length <= len);
        }
    }

    #[test]
    fn locate_reports_next_cursor() {
        assert_eq!(
            locate("あいあい", "あい", 1),
            Some(Located { position: 2, next_cursor: 4 })
        );
        assert_eq!(locate("あい", "う", 0), None);
        assert_eq!(locate("あい", "あ", 10), Some(Located { position: 0, next_cursor: 1 }));
    }

    #[test]
    fn reading_words_are_deduplicated() {
        let ruby = |base: &str, reading: &str| {
            MarkupNode::element(
                "ruby",
                vec![
                    MarkupNode::text(base),
                    MarkupNode::element("rt", vec![MarkupNode::text(reading)]),
                ],
            )
        };
        let nodes = vec![
            ruby("猫", "ねこ"),
            MarkupNode::text("と"),
            ruby("猫", "ねこ"),
            MarkupNode::text("と"),
            ruby("犬", "いぬ"),
        ];
        let words = collect_reading_words("猫と猫と犬", &nodes);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], AnnotatedWord::new("猫", "ねこ").at(0));
        assert_eq!(words[1], AnnotatedWord::new("犬", "いぬ").at(4));
    }

    #[test]
    fn converts_katakana_readings() {
        assert_eq!(katakana_to_hiragana("トウキョウ"), "とうきょう");
        assert_eq!(katakana_to_hiragana("ガッコウー"), "がっこうー");
        assert_eq!(katakana_to_hiragana("abc"), "abc");
    }
}
