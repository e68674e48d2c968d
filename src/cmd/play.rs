use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use subgloss::annotate::AnnotationPipeline;
use subgloss::config::Config;
use subgloss::playback::{simulated_clock, DisplayUpdate, PlaybackDriver, PlaybackSession};

use super::read_timeline;
use crate::OutputFormat;

pub async fn cmd_play(
    config: &Config,
    path: &str,
    start: f64,
    speed: f64,
    stdin_clock: bool,
    format: OutputFormat,
) -> Result<()> {
    if stdin_clock && path == "-" {
        bail!("--stdin-clock needs stdin for times; pass the SRT as a file");
    }
    if !(speed.is_finite() && speed > 0.0) {
        bail!("speed must be a positive number, got {speed}");
    }

    let timeline = read_timeline(path).await?;
    if timeline.is_empty() {
        bail!("no subtitle entries in {path}");
    }
    let end_secs = Duration::from_millis(timeline.end_ms()).as_secs_f64();

    eprintln!("🎬 Playing {} entries ({end_secs:.1}s)", timeline.len());

    let pipeline = AnnotationPipeline::from_config(config)?;
    let session = Arc::new(PlaybackSession::new(timeline));
    let driver = PlaybackDriver::new(session, Arc::new(pipeline));

    let times = if stdin_clock {
        stdin_times()
    } else {
        simulated_clock(
            Duration::from_millis(config.playback.tick_ms.max(1)),
            start,
            end_secs,
            speed,
        )
    };

    let (update_tx, mut update_rx) = mpsc::channel(16);
    let printer = tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            print_update(&update, format);
        }
    });

    let stats = driver.run(times, update_tx).await;
    printer.await?;

    eprintln!(
        "   {} passes, {} shown, {} superseded",
        stats.started, stats.applied, stats.discarded
    );
    Ok(())
}

fn print_update(update: &DisplayUpdate, format: OutputFormat) {
    match (update, format) {
        (DisplayUpdate::Show { entry, view, .. }, OutputFormat::Html) => {
            if !view.is_hidden() {
                println!("[{}] {}", entry.time_range(), view.to_html());
            }
        }
        (DisplayUpdate::Show { index, entry, view, .. }, OutputFormat::Json) => {
            let line = serde_json::json!({
                "index": index,
                "start_ms": entry.start_ms,
                "end_ms": entry.end_ms,
                "view": view,
            });
            println!("{line}");
        }
        (DisplayUpdate::Clear, OutputFormat::Json) => println!("{}", serde_json::json!({ "view": null })),
        (DisplayUpdate::Clear, OutputFormat::Html) => {}
    }
}

/// Playback times read from stdin, one number of seconds per line
fn stdin_times() -> mpsc::Receiver<f64> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<f64>() {
                        Ok(secs) => {
                            if tx.send(secs).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => warn!(line, "Ignoring invalid playback time"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read playback times");
                    break;
                }
            }
        }
    });
    rx
}
