//! Subtitle timing and Japanese text annotation
//!
//! Two layers are produced independently for each subtitle line and then
//! merged into one tree:
//!
//! - **Readings** - the reading converter wraps kanji in `<ruby>` elements
//! - **Glosses** - analyzer tokens are located in the text and resolved
//!   against the dictionary, becoming highlight wrappers with popup text
//!
//! # Example
//!
//! ```rust
//! use subgloss::annotate::{align_tokens, parse_srt, Timeline, Token};
//!
//! let timeline = Timeline::from_entries(parse_srt("1\n00:00:01,000 --> 00:00:02,500\n東京に行く\n"));
//! let entry = timeline.active_at(1_200).unwrap();
//!
//! let words = align_tokens(
//!     &entry.text,
//!     &[Token::new("東京", "トウキョウ", "名詞"), Token::new("行く", "イク", "動詞")],
//! );
//! assert_eq!(words[1].position, Some(3));
//! ```

pub mod align;
pub mod compositor;
pub mod markup;
pub mod overlay;
pub mod pipeline;
pub mod subtitle;

pub use align::{
    align_tokens, collect_reading_words, katakana_to_hiragana, locate, AnnotatedWord, Located,
    Token,
};
pub use compositor::{ComposeError, ComposeMode, Compositor, CompositorConfig};
pub use markup::{contains_reading, fragment_base_text, parse_fragment, render, MarkupNode};
pub use overlay::{popup_text, NO_MEANING};
pub use pipeline::{Annotate, AnnotationPipeline, SubtitleView};
pub use subtitle::{millis_from_secs, parse_srt, SubtitleEntry, Timeline};
