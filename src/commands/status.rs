use anyhow::Result;
use colored::Colorize;
use geogenie::AppContext;
use serde_json::json;

pub fn execute(ctx: &AppContext, list: bool, json: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let config = ctx.config();

    if json {
        let mut status = json!({
            "data_dir": engine.store().dir(),
            "dimension": engine.dimension(),
            "count": engine.len(),
            "model": config.embeddings.model,
            "threshold": config.recognition.threshold,
        });
        if list {
            status["entries"] = serde_json::to_value(engine.entries())?;
        }
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "GeoGenie index".bold());
    println!("  data dir:  {}", engine.store().dir().display());
    println!("  places:    {}", engine.len());
    println!("  dimension: {}", engine.dimension());
    println!("  model:     {}", config.embeddings.model);
    println!("  threshold: {}", config.recognition.threshold);

    if list {
        println!();
        for entry in engine.entries() {
            println!(
                "  {:>5}  {:<32} {}",
                entry.ordinal,
                entry.place_name,
                entry.source_ref.dimmed()
            );
        }
    }
    Ok(())
}
