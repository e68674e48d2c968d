pub mod active;
pub mod annotate;
pub mod entries;
pub mod lookup;
pub mod play;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use subgloss::annotate::{parse_srt, Timeline};

/// Read and parse an SRT file; `-` reads stdin
pub async fn read_timeline(path: &str) -> Result<Timeline> {
    let content = if path == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read subtitles from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {path}"))?
    };

    let timeline = Timeline::from_entries(parse_srt(&content));
    tracing::debug!(entries = timeline.len(), "Loaded subtitles");
    Ok(timeline)
}
