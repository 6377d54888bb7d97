use crate::ffmpeg::FfmpegError;

/// Failure of a single generation. The worker records every variant the
/// same way: the job becomes `FAILED` with the rendered message.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("generation engine is not initialized")]
    NotInitialized,

    #[error("no container runtime found (tried: {tried})")]
    RuntimeNotFound { tried: String },

    #[error("{program} failed (exit code {exit_code:?}): {stderr}")]
    ProcessFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("audio processing failed: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
