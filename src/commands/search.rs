use anyhow::Result;
use colored::Colorize;
use geogenie::AppContext;
use std::path::Path;

pub fn execute(ctx: &AppContext, image: &Path, k: usize, json: bool) -> Result<()> {
    let bytes = super::read_image(image)?;
    let engine = ctx.engine()?;
    let embedding = ctx.embedder().embed(&bytes)?;
    let matches = engine.search(&embedding, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No reference places indexed yet. Run 'geogenie build <dir>' first.");
        return Ok(());
    }

    for (rank, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. {:<32} {:>6.1}%  {}",
            rank + 1,
            m.place_name.bold(),
            m.confidence * 100.0,
            format!("d={:.4}", m.distance).dimmed()
        );
    }
    Ok(())
}
