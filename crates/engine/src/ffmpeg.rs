//! FFmpeg/FFprobe wrappers for audio post-processing.
//!
//! Audio is moved between files and memory as raw interleaved
//! little-endian `f32` PCM over the child's stdin/stdout. All calls block.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use melody_core::job::OutputFormat;
use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("audio file not found: {0}")]
    AudioNotFound(String),
}

/// Sample layout of a decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub channels: Option<u16>,
    /// ffprobe reports this as a string, e.g. `"48000"`.
    pub sample_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on an audio file and return the first audio stream's layout.
pub fn probe_audio(path: &Path) -> Result<AudioInfo, FfmpegError> {
    ensure_exists(path)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "a",
        ])
        .arg(path)
        .output()
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let probe = serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))?;
    parse_audio_info(&probe)
}

/// Extract the layout of the first audio stream from probe output.
pub fn parse_audio_info(probe: &FfprobeOutput) -> Result<AudioInfo, FfmpegError> {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| FfmpegError::ParseError("no audio stream found".to_string()))?;

    let sample_rate = stream
        .sample_rate
        .as_deref()
        .and_then(|sr| sr.parse::<u32>().ok())
        .filter(|sr| *sr > 0)
        .ok_or_else(|| FfmpegError::ParseError("missing or invalid sample_rate".to_string()))?;

    let channels = stream
        .channels
        .filter(|c| *c > 0)
        .ok_or_else(|| FfmpegError::ParseError("missing or invalid channel count".to_string()))?;

    Ok(AudioInfo {
        sample_rate,
        channels,
    })
}

/// Decode `path` to interleaved `f32` samples in its native layout.
pub fn decode_pcm(path: &Path, info: &AudioInfo) -> Result<Vec<f32>, FfmpegError> {
    ensure_exists(path)?;

    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &info.channels.to_string(),
            "-ar",
            &info.sample_rate.to_string(),
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .output()
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(bytes_to_samples(&output.stdout))
}

/// Encode interleaved `f32` samples to `out_path` in the requested format.
///
/// Overwrites an existing file.
pub fn encode_pcm(
    samples: &[f32],
    info: &AudioInfo,
    format: OutputFormat,
    out_path: &Path,
) -> Result<(), FfmpegError> {
    let mut child = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "f32le",
            "-ar",
            &info.sample_rate.to_string(),
            "-ac",
            &info.channels.to_string(),
            "-i",
            "pipe:0",
        ])
        .args(codec_args(format))
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(FfmpegError::NotFound)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| FfmpegError::IoError(std::io::Error::other("ffmpeg stdin unavailable")))?;
    let bytes = samples_to_bytes(samples);

    // Feed stdin from a second thread so a chatty stderr cannot deadlock us.
    let (write_result, output) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || stdin.write_all(&bytes));
        let output = child.wait_with_output();
        (writer.join(), output)
    });
    let output = output?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    match write_result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(FfmpegError::IoError(e)),
        Err(_) => Err(FfmpegError::IoError(std::io::Error::other(
            "ffmpeg stdin writer panicked",
        ))),
    }
}

/// Output codec arguments per format.
pub fn codec_args(format: OutputFormat) -> &'static [&'static str] {
    match format {
        OutputFormat::Wav => &["-c:a", "pcm_s16le", "-f", "wav"],
        OutputFormat::Flac => &["-c:a", "flac", "-f", "flac"],
        OutputFormat::Mp3 => &["-c:a", "libmp3lame", "-q:a", "2", "-f", "mp3"],
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_exists(path: &Path) -> Result<(), FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::AudioNotFound(
            path.to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

fn bytes_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(json: &str) -> FfprobeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_first_audio_stream() {
        let output = probe(
            r#"{"streams":[
                {"index":0,"codec_name":"mjpeg","codec_type":"video"},
                {"index":1,"codec_name":"mp3","codec_type":"audio","channels":2,"sample_rate":"48000"}
            ]}"#,
        );
        let info = parse_audio_info(&output).unwrap();
        assert_eq!(
            info,
            AudioInfo {
                sample_rate: 48_000,
                channels: 2
            }
        );
    }

    #[test]
    fn missing_audio_stream_is_parse_error() {
        let output = probe(r#"{"streams":[{"index":0,"codec_type":"video"}]}"#);
        assert!(matches!(
            parse_audio_info(&output),
            Err(FfmpegError::ParseError(_))
        ));
    }

    #[test]
    fn empty_probe_is_parse_error() {
        let output = probe("{}");
        assert!(parse_audio_info(&output).is_err());
    }

    #[test]
    fn invalid_sample_rate_is_parse_error() {
        let output = probe(
            r#"{"streams":[{"index":0,"codec_type":"audio","channels":1,"sample_rate":"N/A"}]}"#,
        );
        assert!(parse_audio_info(&output).is_err());
    }

    #[test]
    fn pcm_byte_conversion_is_lossless() {
        let samples = vec![0.0f32, 0.5, -1.0, 0.123_456];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_samples(&bytes), samples);
    }

    #[test]
    fn trailing_partial_sample_is_dropped() {
        let mut bytes = samples_to_bytes(&[0.25]);
        bytes.push(0xff);
        assert_eq!(bytes_to_samples(&bytes), vec![0.25]);
    }

    #[test]
    fn wav_is_sixteen_bit_pcm() {
        assert!(codec_args(OutputFormat::Wav).contains(&"pcm_s16le"));
        assert!(codec_args(OutputFormat::Mp3).contains(&"libmp3lame"));
    }

    #[test]
    fn probe_missing_file_reports_not_found() {
        let err = probe_audio(Path::new("/definitely/not/here.mp3")).unwrap_err();
        assert!(matches!(err, FfmpegError::AudioNotFound(_)));
    }
}
