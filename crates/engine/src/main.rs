//! `melody-generate` -- run a single generation without the job service.
//!
//! # Environment variables
//!
//! | Variable            | Default                 | Description                              |
//! |---------------------|-------------------------|------------------------------------------|
//! | `GEN_PROMPT`        | `peaceful ambient pads` | Text prompt describing the music style   |
//! | `GEN_DURATION_SECS` | `60`                    | Length in seconds (must be > 0)          |
//! | `GEN_OUT`           | `outputs/music.wav`     | Output file path                         |
//! | `GEN_FORMAT`        | from `GEN_OUT` extension, else `wav` | `wav`, `flac` or `mp3`      |
//! | `GEN_GAIN_DB`       | `0`                     | Gain adjustment in dB                    |
//!
//! Engine settings (`CONTAINER_RUNTIME`, `MAGENTA_*`, ...) are read by
//! [`MagentaConfig::from_env`].

use std::path::PathBuf;

use anyhow::Context;
use melody_core::job::{JobRequest, OutputFormat};
use melody_engine::{GenerationEngine, GenerationRequest, MagentaConfig, MagentaEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PROMPT: &str = "peaceful ambient pads";
const DEFAULT_DURATION_SECS: f64 = 60.0;
const DEFAULT_OUT: &str = "outputs/music.wav";

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "melody_engine=info,melody_generate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prompt = std::env::var("GEN_PROMPT").unwrap_or_else(|_| DEFAULT_PROMPT.into());

    let duration_s = match std::env::var("GEN_DURATION_SECS") {
        Ok(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("GEN_DURATION_SECS must be a number (got '{raw}')"))?,
        Err(_) => DEFAULT_DURATION_SECS,
    };

    let gain_db = match std::env::var("GEN_GAIN_DB") {
        Ok(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("GEN_GAIN_DB must be a number (got '{raw}')"))?,
        Err(_) => 0.0,
    };

    let out_path = PathBuf::from(std::env::var("GEN_OUT").unwrap_or_else(|_| DEFAULT_OUT.into()));

    let format = match std::env::var("GEN_FORMAT") {
        Ok(raw) => raw.parse::<OutputFormat>()?,
        Err(_) => out_path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(OutputFormat::from_extension)
            .unwrap_or(OutputFormat::Wav),
    };

    let request = JobRequest {
        prompt,
        duration_s,
        gain_db,
        format,
    };
    request.validate()?;

    let engine = MagentaEngine::new(MagentaConfig::from_env()?);
    engine.initialize()?;

    let written = engine.generate(&GenerationRequest::from(&request), &out_path)?;
    tracing::info!(path = %written.display(), "Generated file");

    Ok(())
}
