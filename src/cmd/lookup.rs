use anyhow::Result;
use serde_json::json;

use subgloss::config::Config;
use subgloss::dictionary::{
    DictionaryResolver, GlossCache, HttpDictionary, LOOKUP_ERROR, NO_DEFINITION,
};

pub async fn cmd_lookup(config: &Config, word: &str, json: bool) -> Result<()> {
    let backend = HttpDictionary::new(&config.dictionary)?;
    let resolver = DictionaryResolver::with_cache(backend, GlossCache::new(1, None))
        .with_partial_limit(config.dictionary.partial_limit);

    if !json {
        println!("{}", resolver.resolve(word).await);
        return Ok(());
    }

    let value = match resolver.lookup(word).await {
        Ok(Some(found)) => {
            let meaning = if found.meaning.trim().is_empty() {
                NO_DEFINITION
            } else {
                found.meaning.as_str()
            };
            json!({
                "word": word,
                "match": found.word,
                "meaning": meaning,
                "hiragana": found.hiragana,
            })
        }
        Ok(None) => json!({ "word": word, "meaning": NO_DEFINITION }),
        Err(e) => json!({ "word": word, "meaning": LOOKUP_ERROR, "error": e.to_string() }),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
