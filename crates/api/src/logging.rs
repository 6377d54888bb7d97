//! Rolling log file behind the stdout subscriber.

use std::path::Path;

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Open a daily-rotated appender for `path`.
///
/// Rotated files are named `{file name}.{date}` next to `path`; only the
/// newest `max_files` are kept. The parent directory is created if needed.
pub fn rolling_file_appender(path: &Path, max_files: usize) -> anyhow::Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("LOG_FILE '{}' has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(max_files)
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
