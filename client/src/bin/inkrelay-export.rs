use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use inkrelay_client::{
    export_raster, export_vector, parse_history_bytes, sanitize_background, BoardConfig,
    ExportError, RasterFormat, Surfaces, Viewport, DEFAULT_BACKGROUND,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Png,
    Jpeg,
    Svg,
}

/// Renders a saved stroke history to PNG, JPEG or SVG.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// History file: a stroke array, `{"strokes": [...]}`, or a binary history frame.
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = Format::Png)]
    format: Format,
    #[arg(long, default_value_t = 1280.0)]
    width: f64,
    #[arg(long, default_value_t = 720.0)]
    height: f64,
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f64,
    #[arg(long)]
    background: Option<String>,
    #[arg(long)]
    quality: Option<f32>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} does not contain a stroke history")]
    NotHistory(PathBuf),
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn run(args: Args) -> Result<(), CliError> {
    let config = BoardConfig::from_env();
    let bytes = std::fs::read(&args.input).map_err(|source| CliError::Read {
        path: args.input.clone(),
        source,
    })?;
    let strokes =
        parse_history_bytes(&bytes).ok_or_else(|| CliError::NotHistory(args.input.clone()))?;
    log::info!("loaded {} strokes from {}", strokes.len(), args.input.display());

    let background = args
        .background
        .as_deref()
        .and_then(sanitize_background)
        .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());

    let viewport = Viewport::new(args.width, args.height, args.pixel_ratio);

    let data = match args.format {
        Format::Svg => export_vector(&strokes, viewport, &background).into_bytes(),
        Format::Png | Format::Jpeg => {
            let format = match args.format {
                Format::Jpeg => RasterFormat::Jpeg,
                _ => RasterFormat::Png,
            };
            let surfaces = Surfaces::replay(viewport, &strokes, &background);
            let quality = args.quality.unwrap_or(config.jpeg_quality);
            export_raster(surfaces.base_layer(), viewport, format, quality)?.data
        }
    };

    std::fs::write(&args.output, &data).map_err(|source| CliError::Write {
        path: args.output.clone(),
        source,
    })?;
    log::info!("wrote {} bytes to {}", data.len(), args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("inkrelay-export: {error}");
            ExitCode::FAILURE
        }
    }
}
