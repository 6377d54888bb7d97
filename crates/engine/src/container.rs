//! Container invocation of the MagentaRT generator.
//!
//! The generator image writes an MP3 into a scratch directory that is
//! bind-mounted at `/io`; model weights persist in a host cache directory
//! mounted at `/magenta-realtime/cache`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::EngineError;

/// Runtimes tried, in order, when none is configured.
pub const RUNTIME_CANDIDATES: [&str; 2] = ["podman", "docker"];

/// File name the generator writes inside the scratch directory.
pub const RAW_OUTPUT_NAME: &str = "raw.mp3";

const CONTAINER_CACHE_DIR: &str = "/magenta-realtime/cache";
const CONTAINER_IO_DIR: &str = "/io";

/// Return the first candidate runtime found on `PATH`.
pub fn detect_runtime() -> Result<String, EngineError> {
    RUNTIME_CANDIDATES
        .iter()
        .find(|name| find_on_path(name).is_some())
        .map(|name| name.to_string())
        .ok_or_else(|| EngineError::RuntimeNotFound {
            tried: RUNTIME_CANDIDATES.join(", "),
        })
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// One run of the generator container.
#[derive(Debug, Clone)]
pub struct ContainerInvocation<'a> {
    pub runtime: &'a str,
    pub image: &'a str,
    pub device: &'a str,
    pub cache_dir: &'a Path,
    pub io_dir: &'a Path,
    pub prompt: &'a str,
    /// Whole seconds requested from the generator.
    pub duration_secs: u64,
}

impl ContainerInvocation<'_> {
    /// Arguments passed to the runtime binary (the runtime itself excluded).
    pub fn args(&self) -> Vec<String> {
        vec![
            "container".to_string(),
            "run".to_string(),
            "--rm".to_string(),
            "--interactive".to_string(),
            "--device".to_string(),
            self.device.to_string(),
            "--volume".to_string(),
            format!("{}:{CONTAINER_CACHE_DIR}:rw,Z", self.cache_dir.display()),
            "--volume".to_string(),
            format!("{}:{CONTAINER_IO_DIR}:rw,Z", self.io_dir.display()),
            self.image.to_string(),
            "python3.12".to_string(),
            "-m".to_string(),
            "magenta_rt.generate".to_string(),
            format!("--prompt={}", self.prompt),
            format!("--output={CONTAINER_IO_DIR}/{RAW_OUTPUT_NAME}"),
            format!("--duration={}", self.duration_secs),
        ]
    }

    /// Run the container to completion. Blocks.
    pub fn run(&self) -> Result<PathBuf, EngineError> {
        let output = Command::new(self.runtime)
            .args(self.args())
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(EngineError::ProcessFailed {
                program: self.runtime.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(self.io_dir.join(RAW_OUTPUT_NAME))
    }
}
