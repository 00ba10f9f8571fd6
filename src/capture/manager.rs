use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::source::{Sample, SampleSource, SourceError, SourceFactory};

/// Idle flag states. `fetch_frame` resets to fresh; each reaper tick flips
/// fresh -> pending; a tick that finds pending stops the source. Two
/// consecutive silent intervals are required before teardown, so a single
/// missed interval due to scheduling jitter never flaps the pipeline.
const IDLE_FRESH: u8 = 0;
const IDLE_PENDING: u8 = 1;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// When false the manager never starts a pipeline; fetches fail with
    /// [`CaptureError::NotEnabled`].
    pub enabled: bool,
    /// Pipeline descriptor handed to the source factory.
    pub pipeline: String,
    /// Bounded wait for the first frame after starting the pipeline.
    pub start_timeout: Duration,
    /// Reaper wake-up interval. A source idles out after two of these.
    pub idle_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pipeline: String::new(),
            start_timeout: Duration::from_secs(1),
            idle_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture is not enabled")]
    NotEnabled,

    #[error("capture pipeline already running")]
    AlreadyRunning,

    #[error("timed out waiting for the first frame")]
    StartTimeout,

    #[error("pipeline closed before producing a frame")]
    SourceClosed,

    #[error("no frame available")]
    NoFrameYet,

    #[error(transparent)]
    Source(#[from] SourceError),
}

struct Inner {
    enabled: bool,
    pipeline: String,
    start_timeout: Duration,
    factory: Arc<dyn SourceFactory>,
    /// Serializes start/stop transitions. Held across the first-frame wait,
    /// so it must be an async mutex.
    state: tokio::sync::Mutex<()>,
    /// Written only under the state lock; read lock-free by `is_started`.
    started: AtomicBool,
    /// Guards handle creation/destruction. Acquired after the state lock on
    /// every path that takes both, never the other way around.
    source: tokio::sync::Mutex<Option<Box<dyn SampleSource>>>,
    /// Last received frame, replaced wholesale by the feeder and snapshotted
    /// by fetch callers.
    latest: parking_lot::RwLock<Option<Sample>>,
    idle: AtomicU8,
    tasks: TaskTracker,
    cancelled: CancellationToken,
}

/// Owns zero-or-one live sample source and the background workers around it:
/// one reaper for the manager's lifetime, and one feeder per live source.
///
/// `fetch_frame` lazily starts the source and serves the cached latest frame;
/// the reaper stops a source that nobody has fetched from for two consecutive
/// intervals. All handles to one manager share state via `Clone`.
#[derive(Clone)]
pub struct CaptureManager {
    inner: Arc<Inner>,
}

impl CaptureManager {
    pub fn new(config: CaptureConfig, factory: Arc<dyn SourceFactory>) -> Self {
        let manager = Self {
            inner: Arc::new(Inner {
                enabled: config.enabled,
                pipeline: config.pipeline,
                start_timeout: config.start_timeout,
                factory,
                state: tokio::sync::Mutex::new(()),
                started: AtomicBool::new(false),
                source: tokio::sync::Mutex::new(None),
                latest: parking_lot::RwLock::new(None),
                idle: AtomicU8::new(IDLE_FRESH),
                tasks: TaskTracker::new(),
                cancelled: CancellationToken::new(),
            }),
        };

        manager.spawn_reaper(config.idle_interval);
        manager
    }

    fn spawn_reaper(&self, interval: Duration) {
        let reaper = self.clone();
        self.inner.tasks.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; skip it so the
            // first real check happens one full interval from now.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = reaper.inner.cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if reaper.is_started()
                            && reaper
                                .inner
                                .idle
                                .compare_exchange(
                                    IDLE_FRESH,
                                    IDLE_PENDING,
                                    Ordering::AcqRel,
                                    Ordering::Acquire,
                                )
                                .is_err()
                        {
                            tracing::debug!("capture source idle for two intervals, stopping");
                            reaper.stop().await;
                        }
                    }
                }
            }
        });
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Return the latest frame, starting the source if necessary.
    ///
    /// Marks the manager as recently accessed before attempting the start,
    /// so a reaper tick racing this call sees a fresh flag and cannot stop
    /// the source it just started. Blocks at most `start_timeout` waiting
    /// for a cold pipeline's first frame; never waits for subsequent frames.
    pub async fn fetch_frame(&self) -> Result<Bytes, CaptureError> {
        self.inner.idle.store(IDLE_FRESH, Ordering::Release);

        self.start().await?;

        let sample = self.inner.latest.read().clone();
        sample.map(|s| s.data).ok_or(CaptureError::NoFrameYet)
    }

    /// Ensure a source is running. A concurrent caller winning the creation
    /// race is success: the pipeline exists, which is all we wanted.
    async fn start(&self) -> Result<(), CaptureError> {
        let _state = self.inner.state.lock().await;

        if !self.inner.enabled {
            return Err(CaptureError::NotEnabled);
        }

        match self.create_source().await {
            Ok(()) | Err(CaptureError::AlreadyRunning) => {}
            Err(e) => return Err(e),
        }

        self.inner.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Create the source, wait (bounded) for its first frame, and hand the
    /// frame channel to a feeder task. On any failure no handle is left
    /// installed, so the next fetch attempts a clean start.
    async fn create_source(&self) -> Result<(), CaptureError> {
        let mut guard = self.inner.source.lock().await;

        if guard.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        tracing::info!(pipeline = %self.inner.pipeline, "creating capture source");

        let mut source = self.inner.factory.create(&self.inner.pipeline)?;
        let mut frames = source.frames();
        source.play()?;

        let first = match tokio::time::timeout(self.inner.start_timeout, frames.recv()).await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                source.destroy();
                return Err(CaptureError::SourceClosed);
            }
            Err(_) => {
                source.destroy();
                return Err(CaptureError::StartTimeout);
            }
        };

        *self.inner.latest.write() = Some(first);

        // Feeder: overwrites the cache until the frame channel closes, which
        // happens when the source is destroyed.
        let feeder = self.clone();
        self.inner.tasks.spawn(async move {
            tracing::debug!("started receiving samples");
            while let Some(sample) = frames.recv().await {
                *feeder.inner.latest.write() = Some(sample);
            }
            tracing::debug!("stopped receiving samples");
        });

        *guard = Some(source);
        Ok(())
    }

    /// Stop the live source, if any. Reaper-driven; failures here are logged
    /// by the source itself since no caller is waiting.
    async fn stop(&self) {
        let _state = self.inner.state.lock().await;
        self.inner.started.store(false, Ordering::Release);
        self.destroy_source().await;
    }

    async fn destroy_source(&self) {
        let mut guard = self.inner.source.lock().await;
        if let Some(mut source) = guard.take() {
            tracing::info!("destroying capture source");
            source.destroy();
        }
    }

    /// Terminal teardown: stop any live source, halt the reaper, and wait
    /// for the reaper and all feeders to finish. Idempotent; no calls are
    /// valid afterwards.
    pub async fn shutdown(&self) {
        tracing::info!("capture manager shutting down");
        self.stop().await;
        self.inner.cancelled.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}
