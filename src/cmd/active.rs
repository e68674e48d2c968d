use anyhow::Result;

use subgloss::annotate::millis_from_secs;

use super::read_timeline;

pub async fn cmd_active(path: &str, seconds: f64, json: bool) -> Result<()> {
    let timeline = read_timeline(path).await?;
    let time_ms = millis_from_secs(seconds);

    let Some(index) = timeline.active_index(time_ms) else {
        eprintln!("No subtitle at {seconds}s");
        if json {
            println!("null");
        }
        return Ok(());
    };
    let Some(entry) = timeline.get(index) else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        println!("{}", entry.text);
        eprintln!("   #{} {}", index + 1, entry.time_range());
    }
    Ok(())
}
