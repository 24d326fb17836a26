pub mod barrier;
pub mod metrics;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod stage;
pub mod topology;

#[cfg(test)]
pub(crate) mod testing;

pub use barrier::FrameBarrier;
pub use metrics::{ThroughputMonitor, ThroughputStats};
pub use scheduler::{CycleReport, PipelineBuilder, Scheduler};
pub use sink::{BroadcastSink, FrameReport, LogSink, Sink};
pub use source::{FrameSource, ImageFileSource};
pub use stage::{CompletionCallback, RequestPhase, RequestState, Stage};
pub use topology::{NodeKind, Topology};
