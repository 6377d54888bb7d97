use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use melody_core::audio;

use crate::container::{self, ContainerInvocation};
use crate::engine::{GenerationEngine, GenerationRequest};
use crate::error::EngineError;
use crate::ffmpeg;

pub const DEFAULT_IMAGE: &str = "us-docker.pkg.dev/brain-magenta/magenta-rt/magenta-rt:gpu";
pub const DEFAULT_DEVICE: &str = "nvidia.com/gpu=all";

/// Extra seconds requested from the generator so trimming never runs short.
pub const DEFAULT_SAFE_MARGIN_SECS: f64 = 6.0;

const MODEL_CACHE_NAME: &str = "magenta_rt";

/// Settings for [`MagentaEngine`].
#[derive(Debug, Clone)]
pub struct MagentaConfig {
    /// Container runtime binary; detected from `PATH` when `None`.
    pub runtime: Option<String>,
    pub image: String,
    pub device: String,
    /// Host directory holding downloaded model weights.
    pub cache_dir: PathBuf,
    pub safe_margin_secs: f64,
}

impl MagentaConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                        |
    /// |-------------------------------|--------------------------------|
    /// | `CONTAINER_RUNTIME`           | first of `podman`, `docker`    |
    /// | `MAGENTA_IMAGE`               | [`DEFAULT_IMAGE`]              |
    /// | `MAGENTA_DEVICE`              | `nvidia.com/gpu=all`           |
    /// | `MAGENTA_CACHE_DIR`           | `<user cache dir>/magenta_rt`  |
    /// | `GENERATION_SAFE_MARGIN_SECS` | `6`                            |
    pub fn from_env() -> Result<Self, EngineError> {
        let runtime = std::env::var("CONTAINER_RUNTIME")
            .ok()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let image = std::env::var("MAGENTA_IMAGE").unwrap_or_else(|_| DEFAULT_IMAGE.into());
        let device = std::env::var("MAGENTA_DEVICE").unwrap_or_else(|_| DEFAULT_DEVICE.into());

        let cache_dir = match std::env::var_os("MAGENTA_CACHE_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir().ok_or_else(|| {
                EngineError::InvalidConfig(
                    "cannot resolve the user cache directory; set MAGENTA_CACHE_DIR".into(),
                )
            })?,
        };

        let safe_margin_secs = match std::env::var("GENERATION_SAFE_MARGIN_SECS") {
            Ok(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|m| m.is_finite() && *m >= 0.0)
                .ok_or_else(|| {
                    EngineError::InvalidConfig(format!(
                        "GENERATION_SAFE_MARGIN_SECS must be a non-negative number (got '{raw}')"
                    ))
                })?,
            Err(_) => DEFAULT_SAFE_MARGIN_SECS,
        };

        Ok(Self {
            runtime,
            image,
            device,
            cache_dir,
            safe_margin_secs,
        })
    }

    /// Whole seconds to ask the generator for, margin included.
    pub fn requested_secs(&self, duration_ms: u64) -> u64 {
        (duration_ms as f64 / 1000.0 + self.safe_margin_secs) as u64
    }
}

impl Default for MagentaConfig {
    fn default() -> Self {
        Self {
            runtime: None,
            image: DEFAULT_IMAGE.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            cache_dir: default_cache_dir()
                .unwrap_or_else(|| std::env::temp_dir().join(MODEL_CACHE_NAME)),
            safe_margin_secs: DEFAULT_SAFE_MARGIN_SECS,
        }
    }
}

/// `magenta_rt` under the platform cache directory (`~/.cache` on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(MODEL_CACHE_NAME))
}

/// Container-backed MagentaRT engine.
///
/// [`initialize`](GenerationEngine::initialize) must succeed before any
/// generation; until then every call fails with
/// [`EngineError::NotInitialized`].
pub struct MagentaEngine {
    config: MagentaConfig,
    runtime: OnceLock<String>,
}

impl MagentaEngine {
    pub fn new(config: MagentaConfig) -> Self {
        Self {
            config,
            runtime: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &MagentaConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.get().is_some()
    }
}

impl GenerationEngine for MagentaEngine {
    fn initialize(&self) -> Result<(), EngineError> {
        if self.is_initialized() {
            return Ok(());
        }

        let runtime = match &self.config.runtime {
            Some(runtime) => runtime.clone(),
            None => container::detect_runtime()?,
        };
        std::fs::create_dir_all(&self.config.cache_dir)?;

        tracing::info!(
            runtime = %runtime,
            image = %self.config.image,
            device = %self.config.device,
            cache_dir = %self.config.cache_dir.display(),
            "MagentaRT engine initialized",
        );
        let _ = self.runtime.set(runtime);
        Ok(())
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        out_path: &Path,
    ) -> Result<PathBuf, EngineError> {
        let runtime = self.runtime.get().ok_or(EngineError::NotInitialized)?;

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let scratch = tempfile::tempdir()?;
        let invocation = ContainerInvocation {
            runtime,
            image: &self.config.image,
            device: &self.config.device,
            cache_dir: &self.config.cache_dir,
            io_dir: scratch.path(),
            prompt: &request.prompt,
            duration_secs: self.config.requested_secs(request.duration_ms),
        };

        tracing::info!(
            prompt = %request.prompt,
            duration_ms = request.duration_ms,
            requested_secs = invocation.duration_secs,
            "Starting generation",
        );
        let raw_path = invocation.run()?;

        let info = ffmpeg::probe_audio(&raw_path)?;
        let mut samples = ffmpeg::decode_pcm(&raw_path, &info)?;

        audio::apply_gain(&mut samples, request.gain_db);
        let frames = audio::exact_frame_count(request.duration_ms, info.sample_rate);
        audio::trim_to_frames(&mut samples, info.channels, frames);

        ffmpeg::encode_pcm(&samples, &info, request.format, out_path)?;

        tracing::info!(
            out_path = %out_path.display(),
            sample_rate = info.sample_rate,
            channels = info.channels,
            frames,
            "Generation complete",
        );
        Ok(out_path.to_path_buf())
    }
}
