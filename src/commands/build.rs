use anyhow::Result;
use colored::Colorize;
use geogenie::ingest::build_from_directory;
use geogenie::AppContext;
use std::path::Path;

pub fn execute(ctx: &AppContext, dir: &Path, json: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let embedder = ctx.embedder();

    if !json {
        println!("Building reference index from {}...", dir.display());
    }
    let report = build_from_directory(&engine, embedder.as_ref(), dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("  {} {} added", "✓".green(), report.added);
    if report.already_present > 0 {
        println!("  • {} already indexed", report.already_present);
    }
    if report.skipped_empty > 0 {
        println!("  • {} folders without images", report.skipped_empty);
    }
    for failure in &report.failures {
        println!("  {} {}: {}", "✗".red(), failure.path.display(), failure.reason);
    }
    println!(
        "Index now holds {} places ({})",
        engine.len(),
        engine.store().dir().display()
    );
    Ok(())
}
