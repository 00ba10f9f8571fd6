use std::process::Stdio;
use std::time::Instant;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;

/// One timestamped frame emitted by a sample source.
#[derive(Debug, Clone)]
pub struct Sample {
    pub data: Bytes,
    pub timestamp: Instant,
}

impl Sample {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to spawn capture pipeline: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("capture pipeline has no output stream")]
    NoOutput,

    #[error("capture engine error: {0}")]
    Engine(#[source] anyhow::Error),
}

/// An opaque, expensive streaming resource. Once played it emits samples on
/// its frame channel until destroyed; destroying it closes the channel and
/// releases everything it holds.
///
/// The manager owns at most one live source and is the only component
/// allowed to destroy it.
pub trait SampleSource: Send {
    /// Begin emitting samples.
    fn play(&mut self) -> Result<(), SourceError>;

    /// Take the frame channel. The first call returns the live receiver;
    /// subsequent calls return an already-closed one.
    fn frames(&mut self) -> mpsc::Receiver<Sample>;

    /// Stop emission and release the underlying resource. The frame channel
    /// closes once the source's producer has wound down.
    fn destroy(&mut self);
}

/// Creates sample sources from a pipeline descriptor string.
pub trait SourceFactory: Send + Sync {
    fn create(&self, descriptor: &str) -> Result<Box<dyn SampleSource>, SourceError>;
}

/// Frame channel depth. The feeder only ever keeps the newest frame, so a
/// shallow buffer is enough; a stalled feeder backpressures the reader.
const FRAME_CHANNEL_CAPACITY: usize = 16;

const READ_CHUNK: usize = 64 * 1024;

/// Reference [`SampleSource`] that runs the pipeline descriptor as a child
/// process (`sh -c <descriptor>`) and emits each stdout read as one sample.
///
/// Suitable for single-image pipelines (e.g. ffmpeg or gst-launch writing
/// JPEG frames to stdout). Engine internals stay outside this crate; anything
/// that satisfies the create/play/frames/destroy contract can replace it.
pub struct CommandSource {
    child: Child,
    stdout: Option<ChildStdout>,
    frames_tx: Option<mpsc::Sender<Sample>>,
    frames_rx: Option<mpsc::Receiver<Sample>>,
}

impl CommandSource {
    pub fn spawn(descriptor: &str) -> Result<Self, SourceError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(descriptor)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(SourceError::Spawn)?;

        let stdout = child.stdout.take().ok_or(SourceError::NoOutput)?;
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        Ok(Self {
            child,
            stdout: Some(stdout),
            frames_tx: Some(frames_tx),
            frames_rx: Some(frames_rx),
        })
    }
}

impl SampleSource for CommandSource {
    fn play(&mut self) -> Result<(), SourceError> {
        let mut stdout = self.stdout.take().ok_or(SourceError::NoOutput)?;
        let tx = self.frames_tx.take().ok_or(SourceError::NoOutput)?;

        // Reader task: owns stdout and the sender. Killing the child makes
        // the read fail or hit EOF, the task exits, the sender drops, and
        // the frame channel closes.
        tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let sample = Sample::new(Bytes::copy_from_slice(&buf[..n]));
                        if tx.send(sample).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "pipeline stdout read failed");
                        break;
                    }
                }
            }
            tracing::debug!("pipeline output ended");
        });

        Ok(())
    }

    fn frames(&mut self) -> mpsc::Receiver<Sample> {
        self.frames_rx
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1)
    }

    fn destroy(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "capture pipeline already gone");
        }
    }
}

/// Factory for [`CommandSource`] pipelines.
#[derive(Debug, Clone, Default)]
pub struct CommandSourceFactory;

impl SourceFactory for CommandSourceFactory {
    fn create(&self, descriptor: &str) -> Result<Box<dyn SampleSource>, SourceError> {
        Ok(Box::new(CommandSource::spawn(descriptor)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn emits_stdout_as_samples() {
        let mut source = CommandSource::spawn("printf 'hello'").unwrap();
        let mut frames = source.frames();
        source.play().unwrap();

        let sample = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("frame should arrive within timeout")
            .expect("channel should produce a frame");
        assert_eq!(sample.data, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn channel_closes_when_pipeline_exits() {
        let mut source = CommandSource::spawn("printf 'one'").unwrap();
        let mut frames = source.frames();
        source.play().unwrap();

        let first = frames.recv().await.expect("first frame");
        assert_eq!(first.data, Bytes::from_static(b"one"));

        // Process exited after the single write; the reader sees EOF and
        // drops the sender.
        let next = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("close should happen within timeout");
        assert!(next.is_none(), "channel should close after pipeline exit");
    }

    #[tokio::test]
    async fn destroy_closes_frame_channel() {
        // A pipeline that would run forever without emitting anything.
        let mut source = CommandSource::spawn("sleep 30").unwrap();
        let mut frames = source.frames();
        source.play().unwrap();

        source.destroy();

        let next = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("destroy should close the channel promptly");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn second_frames_call_returns_closed_receiver() {
        let mut source = CommandSource::spawn("printf 'x'").unwrap();
        let _live = source.frames();
        let mut dead = source.frames();
        assert!(dead.recv().await.is_none());
    }

    #[tokio::test]
    async fn play_twice_fails() {
        let mut source = CommandSource::spawn("printf 'x'").unwrap();
        source.play().unwrap();
        assert!(matches!(source.play(), Err(SourceError::NoOutput)));
    }
}
