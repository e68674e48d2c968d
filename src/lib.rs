//! `subgloss` - Annotated Japanese subtitles
//!
//! # Features
//!
//! - **Timeline**: SRT parsing and active-subtitle lookup by playback time
//! - **Readings**: furigana from an external converter, kept as `<ruby>` trees
//! - **Glosses**: tiered dictionary lookups (inflected, direct, partial) with a
//!   bounded cache
//! - **Compositing**: word highlights merged into the reading tree without
//!   splitting readings or double-covering text
//! - **Playback**: generation-stamped passes so stale results never display
//!
//! # Example
//!
//! ```rust,no_run
//! use subgloss::annotate::{parse_srt, AnnotationPipeline, Timeline};
//! use subgloss::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let timeline = Timeline::from_entries(parse_srt(&std::fs::read_to_string("movie.srt")?));
//!     let pipeline = AnnotationPipeline::from_config(&Config::load(None)?)?;
//!
//!     if let Some(entry) = timeline.active_at(61_000) {
//!         println!("{}", pipeline.annotate(&entry.text).await.to_html());
//!     }
//!     Ok(())
//! }
//! ```

pub mod annotate;
pub mod config;
pub mod dictionary;
pub mod external;
pub mod playback;

pub use annotate::{AnnotatedWord, AnnotationPipeline, MarkupNode, SubtitleEntry, SubtitleView, Timeline};
pub use config::Config;
pub use dictionary::{DictionaryResolver, LookupError, LOOKUP_ERROR, NO_DEFINITION};
pub use playback::{PlaybackDriver, PlaybackSession};

/// Version of subgloss
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
