use anyhow::Result;
use colored::Colorize;
use geogenie::eval::evaluate;
use geogenie::AppContext;
use std::path::Path;

pub fn execute(ctx: &AppContext, dir: &Path, json: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let embedder = ctx.embedder();
    let report = evaluate(&engine, embedder.as_ref(), dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📊 Top-1 accuracy on {}\n", dir.display());
    for (label, tally) in &report.per_label {
        println!(
            "  {:<32} {:>3}/{:<3} {:>6.1}%",
            label,
            tally.correct,
            tally.total,
            tally.accuracy() * 100.0
        );
    }
    println!(
        "\n  {} {}/{} correct ({:.2}%), {} skipped",
        "Overall:".bold(),
        report.correct,
        report.total,
        report.accuracy() * 100.0,
        report.skipped
    );
    Ok(())
}
