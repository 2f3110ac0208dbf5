use anyhow::{bail, Result};
use colored::Colorize;
use geogenie::{AppContext, GeoPoint, RecognitionOutcome, Source};
use std::path::Path;

pub fn execute(
    ctx: &AppContext,
    image: &Path,
    coordinates: Option<GeoPoint>,
    threshold: Option<f32>,
    json: bool,
) -> Result<()> {
    let bytes = super::read_image(image)?;

    let mut pipeline = ctx.pipeline()?;
    if let Some(threshold) = threshold {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("--threshold must be within [0, 1], got {}", threshold);
        }
        pipeline = pipeline.with_threshold(threshold);
    }

    let outcome = pipeline.recognize(&bytes, coordinates)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        display(&outcome);
    }
    Ok(())
}

fn display(outcome: &RecognitionOutcome) {
    if outcome.is_unknown() {
        println!("{} no confident match", "?".yellow());
    } else {
        let source = match outcome.source {
            Source::Gps => "gps".cyan(),
            Source::Visual => "visual".magenta(),
        };
        println!(
            "{} {} ({:.1}% via {})",
            "✓".green(),
            outcome.place_name.bold(),
            outcome.confidence * 100.0,
            source
        );
    }
    if let Some(point) = outcome.coordinates {
        println!("  coordinates: {}", point);
    }
}
