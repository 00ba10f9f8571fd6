//! On-demand capture pipeline: source contract, lifecycle manager, reaper.

mod manager;
mod source;

pub use manager::{CaptureConfig, CaptureError, CaptureManager};
pub use source::{CommandSource, CommandSourceFactory, Sample, SampleSource, SourceError, SourceFactory};
