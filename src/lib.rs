pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod telemetry;

pub use crate::common::{Detection, DetectionKind, Frame, FrameView, Region};
pub use crate::config::{Configuration, LoggingSettings, SchedulerSettings};
pub use crate::coordinator::{Coordinator, CoordinatorBuilder, RunSummary};
pub use crate::error::{AppError, CaptureError, ConfigError, StallError};
pub use crate::pipeline::{PipelineBuilder, Scheduler, Sink, Stage};
