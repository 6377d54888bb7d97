#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use melody_core::job::{JobRequest, JobStatus, OutputFormat};
use melody_core::types::JobId;
use melody_engine::{EngineError, GenerationEngine, GenerationRequest};
use melody_worker::{JobManager, ManagerSettings};

/// Prompts containing this word make [`FakeEngine`] fail.
pub const FAIL_MARKER: &str = "fail";

/// Prompts containing this word make [`FakeEngine`] panic.
pub const PANIC_MARKER: &str = "panic";

/// Engine that writes a few bytes per job and records what it saw.
///
/// With a gate installed, each `generate` blocks until the test sends a
/// release on the paired [`mpsc::Sender`].
#[derive(Default)]
pub struct FakeEngine {
    pub initialized: AtomicUsize,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
    delay: Duration,
    init_delay: Duration,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// An engine whose `initialize` blocks for `init_delay`.
    pub fn with_init_delay(init_delay: Duration) -> Self {
        Self {
            init_delay,
            ..Self::default()
        }
    }

    pub fn gated() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let engine = Self {
            gate: Some(Mutex::new(rx)),
            ..Self::default()
        };
        (engine, tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationEngine for FakeEngine {
    fn initialize(&self) -> Result<(), EngineError> {
        if !self.init_delay.is_zero() {
            std::thread::sleep(self.init_delay);
        }
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn generate(&self, request: &GenerationRequest, out_path: &Path) -> Result<PathBuf, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = if request.prompt.contains(PANIC_MARKER) {
            self.active.fetch_sub(1, Ordering::SeqCst);
            panic!("engine exploded");
        } else if request.prompt.contains(FAIL_MARKER) {
            Err(EngineError::ProcessFailed {
                program: "fake".to_string(),
                exit_code: Some(1),
                stderr: "out of memory".to_string(),
            })
        } else {
            std::fs::write(out_path, request.prompt.as_bytes())
                .map(|()| out_path.to_path_buf())
                .map_err(EngineError::from)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn request(prompt: &str) -> JobRequest {
    JobRequest {
        prompt: prompt.to_string(),
        duration_s: 2.0,
        gain_db: 0.0,
        format: OutputFormat::Wav,
    }
}

pub fn settings(output_dir: &Path, capacity: usize) -> ManagerSettings {
    ManagerSettings {
        output_dir: output_dir.to_path_buf(),
        queue_capacity: NonZeroUsize::new(capacity).unwrap(),
        fault_backoff: Duration::from_millis(10),
        ..ManagerSettings::default()
    }
}

pub fn manager(engine: Arc<FakeEngine>, output_dir: &Path, capacity: usize) -> Arc<JobManager> {
    Arc::new(JobManager::new(engine, settings(output_dir, capacity)))
}

/// Poll until the job reaches `status`, failing the test after 5 seconds.
pub async fn wait_for_status(manager: &JobManager, id: JobId, status: JobStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(job) = manager.get(id).await {
            if job.status() == status {
                return;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} never reached {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for the queue to drain, failing the test after 5 seconds.
pub async fn drain(manager: &JobManager) {
    tokio::time::timeout(Duration::from_secs(5), manager.queue().join())
        .await
        .expect("queue did not drain");
}
