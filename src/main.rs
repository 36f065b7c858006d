mod codec;
mod compositor;
mod config;
mod error;
mod pixel_buffer;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};

use error::Error;
use pixel_buffer::ImageInfo;

const BACKGROUND_PATH: &str = "in.jpg";
const WATERMARK_PATH: &str = "watermark.jpg";
const OUTPUT_PATH: &str = "out.jpg";

#[derive(Parser)]
#[command(
    name = "jpegmark",
    version,
    about = "Blend watermark.jpg onto in.jpg and write out.jpg"
)]
struct Cli {
    /// Horizontal watermark offset in pixels
    #[arg(short = 'x', default_value_t = 0, allow_negative_numbers = true)]
    x: i64,

    /// Vertical watermark offset in pixels
    #[arg(short = 'y', default_value_t = 0, allow_negative_numbers = true)]
    y: i64,

    /// Path to config file (defaults to ./jpegmark.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print image info as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct InfoReport {
    background: ImageInfo,
    watermark: ImageInfo,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load_or_default(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        "jpegmark v{} starting, watermark offset ({}, {})",
        env!("CARGO_PKG_VERSION"),
        cli.x,
        cli.y
    );

    let background_bytes = read_file(BACKGROUND_PATH)?;
    let watermark_bytes = read_file(WATERMARK_PATH)?;

    let mut background = codec::decode(&background_bytes)
        .with_context(|| format!("Failed to decode {}", BACKGROUND_PATH))?;
    let watermark = codec::decode(&watermark_bytes)
        .with_context(|| format!("Failed to decode {}", WATERMARK_PATH))?;

    print_info(background.info(), watermark.info(), cli.json)?;

    let region = compositor::composite(&mut background, &watermark, cli.x, cli.y);

    let jpeg = codec::encode(&background, config.output.quality)
        .with_context(|| format!("Failed to encode {}", OUTPUT_PATH))?;
    std::fs::write(OUTPUT_PATH, &jpeg).map_err(|e| Error::io(OUTPUT_PATH, e))?;

    tracing::info!(
        "Wrote {} ({} bytes, {}x{} region blended at ({}, {}))",
        OUTPUT_PATH,
        jpeg.len(),
        region.width,
        region.height,
        region.x,
        region.y
    );
    Ok(())
}

fn read_file(path: &str) -> Result<Vec<u8>, Error> {
    std::fs::read(Path::new(path)).map_err(|e| Error::io(path, e))
}

fn print_info(background: ImageInfo, watermark: ImageInfo, json: bool) -> anyhow::Result<()> {
    if json {
        let report = InfoReport {
            background,
            watermark,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Input file data:\n{}", background);
        println!("\nWatermark file data:\n{}", watermark);
    }
    Ok(())
}
