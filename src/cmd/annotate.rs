use anyhow::Result;

use subgloss::annotate::AnnotationPipeline;
use subgloss::config::Config;

use crate::OutputFormat;

pub async fn cmd_annotate(config: &Config, text: &str, format: OutputFormat) -> Result<()> {
    let pipeline = AnnotationPipeline::from_config(config)?;
    let view = pipeline.annotate(text).await;

    match format {
        OutputFormat::Html => println!("{}", view.to_html()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
    }

    let stats = pipeline.resolver().cache_stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "Gloss cache");
    Ok(())
}
