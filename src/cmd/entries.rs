use anyhow::Result;

use super::read_timeline;

pub async fn cmd_entries(path: &str, json: bool) -> Result<()> {
    let timeline = read_timeline(path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(timeline.entries())?);
        return Ok(());
    }

    for (i, entry) in timeline.entries().iter().enumerate() {
        println!("{:>4}  {}  {}", i + 1, entry.time_range(), entry.text);
    }
    eprintln!("📄 {} entries", timeline.len());
    Ok(())
}
