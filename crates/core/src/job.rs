//! The canonical job record, its lifecycle, and the views derived from it.
//!
//! A [`JobRecord`] carries its status-specific data inside [`JobState`], so
//! an artifact name only exists on a completed job and an error message only
//! exists on a failed one. Transitions only move forward:
//!
//! ```text
//! QUEUED -> PROCESSING -> COMPLETED
//!                      \-> FAILED
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Longest accepted generation, in seconds (ten hours).
pub const MAX_DURATION_SECS: f64 = 36_000.0;

/// Entity label used in not-found errors.
pub const JOB_ENTITY: &str = "Job";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(Self::Queued),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!("Unknown job status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Output format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Flac,
    #[default]
    Mp3,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::Wav, Self::Flac, Self::Mp3];

    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
        }
    }

    /// MIME type used when serving the artifact.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Infer the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| {
            CoreError::Validation(format!(
                "Unsupported output format '{s}' (expected one of: wav, flac, mp3)"
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Parameters of a generation request, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub prompt: String,
    pub duration_s: f64,
    #[serde(default)]
    pub gain_db: f64,
    #[serde(default)]
    pub format: OutputFormat,
}

impl JobRequest {
    /// Reject requests the engine could never satisfy.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation("Prompt must not be empty".to_string()));
        }
        if !self.duration_s.is_finite() || self.duration_s <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Duration must be greater than zero (got {})",
                self.duration_s
            )));
        }
        if self.duration_s > MAX_DURATION_SECS {
            return Err(CoreError::Validation(format!(
                "Duration exceeds maximum of {MAX_DURATION_SECS} seconds (got {})",
                self.duration_s
            )));
        }
        if !self.gain_db.is_finite() {
            return Err(CoreError::Validation("Gain must be a finite number".to_string()));
        }
        Ok(())
    }

    /// Requested duration rounded to whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.duration_s * 1000.0).round() as u64
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Status together with the data that only exists in that status.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Queued,
    Processing,
    Completed { output_name: String },
    Failed { error: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Queued => JobStatus::Queued,
            Self::Processing => JobStatus::Processing,
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// The stored state of one generation request.
///
/// `id`, the request parameters and `created_at` are fixed at construction;
/// only the lifecycle methods below change the record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    id: JobId,
    request: JobRequest,
    created_at: Timestamp,
    state: JobState,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl JobRecord {
    /// Create a new `QUEUED` record with a fresh id.
    pub fn new(request: JobRequest) -> Self {
        Self::with_id(JobId::new_v4(), request, chrono::Utc::now())
    }

    pub fn with_id(id: JobId, request: JobRequest, created_at: Timestamp) -> Self {
        Self {
            id,
            request,
            created_at,
            state: JobState::Queued,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn prompt(&self) -> &str {
        &self.request.prompt
    }

    pub fn format(&self) -> OutputFormat {
        self.request.format
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Artifact file name; only present once `COMPLETED`.
    pub fn output_name(&self) -> Option<&str> {
        match &self.state {
            JobState::Completed { output_name } => Some(output_name),
            _ => None,
        }
    }

    /// Failure message; only present once `FAILED`.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// `QUEUED -> PROCESSING`.
    pub fn start_processing(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_status(JobStatus::Queued, "start")?;
        self.state = JobState::Processing;
        self.started_at = Some(now);
        Ok(())
    }

    /// `PROCESSING -> COMPLETED`.
    pub fn complete(&mut self, output_name: String, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_status(JobStatus::Processing, "complete")?;
        self.state = JobState::Completed { output_name };
        self.finished_at = Some(now);
        Ok(())
    }

    /// `PROCESSING -> FAILED`.
    pub fn fail(&mut self, error: String, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_status(JobStatus::Processing, "fail")?;
        self.state = JobState::Failed { error };
        self.finished_at = Some(now);
        Ok(())
    }

    fn ensure_status(&self, expected: JobStatus, action: &'static str) -> Result<(), CoreError> {
        let status = self.status();
        if status != expected {
            return Err(CoreError::InvalidState {
                id: self.id,
                status,
                action,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Returned to the caller that submitted a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobAcknowledgment {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: Timestamp,
}

/// One row of a job listing.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub prompt: String,
    pub format: OutputFormat,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub output_name: Option<String>,
}

/// Everything known about a single job.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    pub id: JobId,
    pub prompt: String,
    pub duration_s: f64,
    pub gain_db: f64,
    pub format: OutputFormat,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub output_name: Option<String>,
    pub error: Option<String>,
}

impl From<&JobRecord> for JobAcknowledgment {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id,
            status: job.status(),
            created_at: job.created_at,
        }
    }
}

impl From<&JobRecord> for JobSummary {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id,
            prompt: job.request.prompt.clone(),
            format: job.request.format,
            status: job.status(),
            created_at: job.created_at,
            output_name: job.output_name().map(str::to_string),
        }
    }
}

impl From<&JobRecord> for JobDetail {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id,
            prompt: job.request.prompt.clone(),
            duration_s: job.request.duration_s,
            gain_db: job.request.gain_db,
            format: job.request.format,
            status: job.status(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            output_name: job.output_name().map(str::to_string),
            error: job.error().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            prompt: "warm lofi piano".to_string(),
            duration_s: 12.5,
            gain_db: -3.0,
            format: OutputFormat::Flac,
        }
    }

    #[test]
    fn new_record_is_queued_without_output_or_error() {
        let job = JobRecord::new(request());
        assert_eq!(job.status(), JobStatus::Queued);
        assert!(job.output_name().is_none());
        assert!(job.error().is_none());
        assert!(job.started_at().is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut job = JobRecord::new(request());
        let now = chrono::Utc::now();
        job.start_processing(now).unwrap();
        assert_eq!(job.status(), JobStatus::Processing);
        assert_eq!(job.started_at(), Some(now));

        job.complete("warm-lofi-piano-1234abcd.flac".into(), now)
            .unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.output_name(), Some("warm-lofi-piano-1234abcd.flac"));
        assert!(job.error().is_none());
        assert_eq!(job.finished_at(), Some(now));
    }

    #[test]
    fn failure_sets_error_only() {
        let mut job = JobRecord::new(request());
        let now = chrono::Utc::now();
        job.start_processing(now).unwrap();
        job.fail("container exited with 137".into(), now).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error(), Some("container exited with 137"));
        assert!(job.output_name().is_none());
    }

    #[test]
    fn transitions_never_go_backward() {
        let mut job = JobRecord::new(request());
        let now = chrono::Utc::now();

        // Cannot complete or fail before processing.
        assert!(matches!(
            job.complete("x.mp3".into(), now),
            Err(CoreError::InvalidState { status: JobStatus::Queued, .. })
        ));
        assert!(job.fail("boom".into(), now).is_err());

        job.start_processing(now).unwrap();
        assert!(job.start_processing(now).is_err());

        job.complete("x.mp3".into(), now).unwrap();
        assert!(job.start_processing(now).is_err());
        assert!(job.fail("late".into(), now).is_err());
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn validate_accepts_reasonable_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_prompt() {
        let req = JobRequest {
            prompt: "   ".into(),
            ..request()
        };
        assert!(matches!(req.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn validate_rejects_bad_durations() {
        for duration_s in [0.0, -1.0, f64::NAN, MAX_DURATION_SECS + 1.0] {
            let req = JobRequest {
                duration_s,
                ..request()
            };
            assert!(req.validate().is_err(), "duration {duration_s} should fail");
        }
        let at_limit = JobRequest {
            duration_s: MAX_DURATION_SECS,
            ..request()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_finite_gain() {
        let req = JobRequest {
            gain_db: f64::INFINITY,
            ..request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn duration_ms_rounds() {
        let req = JobRequest {
            duration_s: 1.2345,
            ..request()
        };
        assert_eq!(req.duration_ms(), 1235);
    }

    #[test]
    fn request_defaults_to_mp3_and_zero_gain() {
        let req: JobRequest =
            serde_json::from_str(r#"{"prompt":"rain","duration_s":5}"#).unwrap();
        assert_eq!(req.format, OutputFormat::Mp3);
        assert_eq!(req.gain_db, 0.0);
    }

    #[test]
    fn request_rejects_unknown_format() {
        let parsed: Result<JobRequest, _> =
            serde_json::from_str(r#"{"prompt":"rain","duration_s":5,"format":"ogg"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn format_parsing_and_metadata() {
        assert_eq!("WAV".parse::<OutputFormat>().unwrap(), OutputFormat::Wav);
        assert_eq!(OutputFormat::from_extension("flac"), Some(OutputFormat::Flac));
        assert_eq!(OutputFormat::from_extension("ogg"), None);
        assert_eq!(OutputFormat::Mp3.content_type(), "audio/mpeg");
        assert!("aiff".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        assert_eq!("completed".parse::<JobStatus>().unwrap(), JobStatus::Completed);
    }

    #[test]
    fn detail_view_reflects_terminal_state() {
        let mut job = JobRecord::new(request());
        let now = chrono::Utc::now();
        job.start_processing(now).unwrap();
        job.fail("engine not initialized".into(), now).unwrap();

        let detail = JobDetail::from(&job);
        assert_eq!(detail.status, JobStatus::Failed);
        assert_eq!(detail.error.as_deref(), Some("engine not initialized"));
        assert!(detail.output_name.is_none());
        assert_eq!(detail.gain_db, -3.0);

        let ack = JobAcknowledgment::from(&job);
        assert_eq!(ack.id, job.id());
        assert_eq!(ack.created_at, job.created_at());
    }
}
