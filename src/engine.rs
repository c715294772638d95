use crate::model::AnalysisModel;
use crate::normalize::UploadedImage;
use crate::pipeline::{AnalysisOutcome, analyze_medical_image};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

/// Represents the current state of the analysis engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisEngineState {
    /// Waiting for the next analysis.
    Idle,
    /// An analysis is running on the worker thread.
    Processing,
}

impl AnalysisEngineState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisEngineState::Idle => "idle",
            AnalysisEngineState::Processing => "processing",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("analysis engine is not running")]
    Stopped,
    #[error("analysis worker exited before replying")]
    WorkerGone,
}

struct EngineJob {
    id: u64,
    image: Option<UploadedImage>,
    reply: oneshot::Sender<EngineResponse>,
}

/// A finished analysis together with its timing.
#[derive(Debug)]
pub struct EngineResponse {
    /// Identifier assigned when the job was scheduled.
    pub id: u64,
    /// When the worker picked the job up.
    pub start_time: Instant,
    /// Time spent normalizing, calling the model and validating.
    pub duration: Duration,
    pub outcome: AnalysisOutcome,
}

/// Runs analyses one at a time on a dedicated thread that owns the model.
///
/// The model call is blocking, so it never runs on an async worker. Jobs queue
/// up in arrival order and each caller gets its own reply channel.
pub struct AnalysisEngine {
    processing: Arc<AtomicBool>,
    req_tx: Option<mpsc::Sender<EngineJob>>,
    worker: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

impl AnalysisEngine {
    /// Moves the model onto a new worker thread.
    ///
    /// Temporary images for each job are written inside `scratch_dir`.
    pub fn new<M>(mut model: M, scratch_dir: PathBuf) -> Self
    where
        M: AnalysisModel + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<EngineJob>();
        let processing = Arc::new(AtomicBool::new(false));

        let worker = std::thread::spawn({
            let processing = processing.clone();
            move || {
                while let Ok(job) = req_rx.recv() {
                    log::debug!("Starting analysis #{}", job.id);

                    processing.store(true, Ordering::SeqCst);
                    let start_time = Instant::now();

                    let outcome = analyze_medical_image(&mut model, &scratch_dir, job.image);
                    let duration = start_time.elapsed();

                    log::info!(
                        "Analysis #{} finished in {:.2?}: {}",
                        job.id,
                        duration,
                        outcome.error.map_or("success", |kind| kind.as_str())
                    );

                    processing.store(false, Ordering::SeqCst);

                    if job
                        .reply
                        .send(EngineResponse {
                            id: job.id,
                            start_time,
                            duration,
                            outcome,
                        })
                        .is_err()
                    {
                        log::debug!("Caller of analysis #{} went away", job.id);
                    }
                }
                log::debug!("Analysis worker stopped");
            }
        });

        Self {
            processing,
            req_tx: Some(req_tx),
            worker: Some(worker),
            id_counter: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> AnalysisEngineState {
        if self.processing.load(Ordering::SeqCst) {
            AnalysisEngineState::Processing
        } else {
            AnalysisEngineState::Idle
        }
    }

    /// Queues an analysis and returns the channel its response arrives on.
    pub fn schedule_analysis(
        &self,
        image: Option<UploadedImage>,
    ) -> Result<oneshot::Receiver<EngineResponse>, EngineError> {
        let tx = self.req_tx.as_ref().ok_or(EngineError::Stopped)?;
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        tx.send(EngineJob { id, image, reply })
            .map_err(|_| EngineError::Stopped)?;
        log::debug!("Scheduled analysis #{id}");
        Ok(rx)
    }

    /// Queues an analysis and waits for it to finish.
    pub async fn analyze(&self, image: Option<UploadedImage>) -> Result<EngineResponse, EngineError> {
        let rx = self.schedule_analysis(image)?;
        rx.await.map_err(|_| EngineError::WorkerGone)
    }

    /// Closes the queue and waits for the worker to drain it.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Analysis worker panicked");
            }
        }
    }
}

impl Drop for AnalysisEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
