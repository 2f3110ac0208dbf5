use anyhow::Result;
use colored::Colorize;
use geogenie::ingest::{ingest_image, normalize_place_name};
use geogenie::{AddOutcome, AppContext};
use serde_json::json;
use std::path::Path;

pub fn execute(
    ctx: &AppContext,
    image: &Path,
    place: &str,
    source_ref: Option<String>,
    json: bool,
) -> Result<()> {
    let bytes = super::read_image(image)?;
    let source_ref = source_ref.unwrap_or_else(|| image.display().to_string());
    let place_name = normalize_place_name(place);

    let engine = ctx.engine()?;
    let embedder = ctx.embedder();
    let outcome = ingest_image(&engine, embedder.as_ref(), &bytes, place, &source_ref)?;

    if json {
        let report = json!({
            "place_name": place_name,
            "ordinal": outcome.ordinal(),
            "added": outcome.is_added(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome {
        AddOutcome::Added { ordinal } => {
            println!("{} Added {} (#{})", "✓".green(), place_name.bold(), ordinal);
        }
        AddOutcome::AlreadyExists { ordinal } => {
            println!(
                "{} {} already has a reference (#{}), nothing changed",
                "•".yellow(),
                place_name.bold(),
                ordinal
            );
        }
    }
    Ok(())
}
