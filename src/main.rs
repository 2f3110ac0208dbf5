use anyhow::Result;
use clap::{Parser, Subcommand};
use geogenie::{AppContext, Config, GeoPoint};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Recognize places in photos from GPS metadata and visual similarity", long_about = None)]
struct Cli {
    /// Config file (default: ~/.geogenie/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize the place shown in a photo
    Recognize {
        /// Image file (JPEG or PNG)
        image: PathBuf,

        /// Latitude in decimal degrees (overrides EXIF)
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude in decimal degrees (overrides EXIF)
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Minimum visual confidence (default from config)
        #[arg(long)]
        threshold: Option<f32>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a reference photo for a place
    Add {
        /// Image file (JPEG or PNG)
        image: PathBuf,

        /// Place name (normalized, e.g. "eiffel tower" -> Eiffel_Tower)
        #[arg(long)]
        place: String,

        /// Reference stored with the entry (default: the image path)
        #[arg(long)]
        source_ref: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Rank reference places by visual similarity
    Search {
        /// Image file (JPEG or PNG)
        image: PathBuf,

        /// Number of results
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Build the reference index from a directory of place folders
    Build {
        /// Directory laid out as <dir>/<place>/<images>
        dir: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Measure top-1 accuracy on a labeled test directory
    Evaluate {
        /// Directory laid out as <dir>/<label>/<images>
        dir: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show index size, dimension, and location
    Status {
        /// List every catalog entry
        #[arg(long)]
        list: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Logging is opt-in: GEOGENIE_LOG=debug (or any EnvFilter directive)
fn init_logging() {
    let filter = EnvFilter::try_from_env("GEOGENIE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config);

    match cli.command {
        Commands::Recognize {
            image,
            lat,
            lon,
            threshold,
            json,
        } => {
            let coordinates = lat.zip(lon).map(|(lat, lon)| GeoPoint::new(lat, lon));
            commands::recognize::execute(&ctx, &image, coordinates, threshold, json)?;
        }
        Commands::Add {
            image,
            place,
            source_ref,
            json,
        } => {
            commands::add::execute(&ctx, &image, &place, source_ref, json)?;
        }
        Commands::Search { image, k, json } => {
            commands::search::execute(&ctx, &image, k, json)?;
        }
        Commands::Build { dir, json } => {
            commands::build::execute(&ctx, &dir, json)?;
        }
        Commands::Evaluate { dir, json } => {
            commands::evaluate::execute(&ctx, &dir, json)?;
        }
        Commands::Status { list, json } => {
            commands::status::execute(&ctx, list, json)?;
        }
    }

    Ok(())
}
