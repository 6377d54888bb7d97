use std::path::{Path, PathBuf};

use melody_core::job::{JobRequest, OutputFormat};

use crate::error::EngineError;

/// A fully-resolved generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Exact length of the produced audio.
    pub duration_ms: u64,
    pub format: OutputFormat,
    pub gain_db: f64,
}

impl From<&JobRequest> for GenerationRequest {
    fn from(request: &JobRequest) -> Self {
        Self {
            prompt: request.prompt.clone(),
            duration_ms: request.duration_ms(),
            format: request.format,
            gain_db: request.gain_db,
        }
    }
}

/// Produces one audio artifact per call.
///
/// Implementations may block for minutes and hold no internal lock: the
/// caller guarantees at most one `generate` is in flight.
pub trait GenerationEngine: Send + Sync + 'static {
    /// Load models / resolve tooling. Called once before the first
    /// `generate`, on a blocking thread.
    fn initialize(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Write the audio for `request` to `out_path` and return that path.
    fn generate(&self, request: &GenerationRequest, out_path: &Path)
        -> Result<PathBuf, EngineError>;
}
