use std::time::Duration;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Pipeline configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Pipeline stalled: {0}")]
    Stall(#[from] StallError),
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
    #[error("Pipeline task failed: {0}")]
    Task(String),
}

// Topology assembly errors, raised before any frame is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Node names must not be empty")]
    EmptyName,
    #[error("A source is already registered as '{existing}', cannot add '{name}'")]
    DuplicateSource { existing: String, name: String },
    #[error("No frame source has been registered")]
    MissingSource,
    #[error("Parent '{parent}' of '{name}' is not a registered {expected}")]
    UnknownParent {
        parent: String,
        name: String,
        expected: &'static str,
    },
    #[error("Name '{0}' is already used by another node")]
    NameInUse(String),
    #[error("Sink '{0}' has not been registered")]
    UnknownSink(String),
    #[error("Edge '{parent}' --> '{child}' already exists")]
    DuplicateEdge { parent: String, child: String },
    #[error("Invalid scheduler settings: {0}")]
    InvalidSettings(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("The frame source has no more frames")]
    EndOfStream,
    #[error("Failed to read frame: {0}")]
    ReadFailed(String),
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{outstanding} request(s) still outstanding after {waited:?}")]
pub struct StallError {
    pub outstanding: usize,
    pub waited: Duration,
}

impl CaptureError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, CaptureError::EndOfStream)
    }
}
