use crate::common::{Detection, Frame};
use crate::config::SchedulerSettings;
use crate::error::{AppError, ConfigError};
use crate::pipeline::barrier::FrameBarrier;
use crate::pipeline::metrics::{ThroughputMonitor, ThroughputStats};
use crate::pipeline::sink::Sink;
use crate::pipeline::source::FrameSource;
use crate::pipeline::stage::Stage;
use crate::pipeline::topology::{NodeKind, Topology};
use indexmap::IndexMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

/// Assembles a pipeline. Nodes must be registered parents first.
pub struct PipelineBuilder {
    settings: SchedulerSettings,
    topology: Topology,
    source: Option<Box<dyn FrameSource>>,
    stages: IndexMap<String, Box<dyn Stage>>,
    sinks: IndexMap<String, Box<dyn Sink>>,
    barrier: FrameBarrier,
}

impl PipelineBuilder {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            topology: Topology::new(),
            source: None,
            stages: IndexMap::new(),
            sinks: IndexMap::new(),
            barrier: FrameBarrier::new(),
        }
    }

    pub fn register_source(
        &mut self,
        name: &str,
        source: Box<dyn FrameSource>,
    ) -> Result<&mut Self, ConfigError> {
        self.topology.add_source(name)?;
        self.source = Some(source);
        Ok(self)
    }

    pub fn register_stage(
        &mut self,
        parent: &str,
        name: &str,
        mut stage: Box<dyn Stage>,
    ) -> Result<&mut Self, ConfigError> {
        self.topology.add_stage(parent, name)?;
        stage.on_completion(self.barrier.completion_callback(name));
        self.stages.insert(name.to_string(), stage);
        Ok(self)
    }

    /// Registers `sink` under `parent`. If a sink called `name` already
    /// exists, only the edge is added and `sink` is dropped.
    pub fn register_sink(
        &mut self,
        parent: &str,
        name: &str,
        sink: Box<dyn Sink>,
    ) -> Result<&mut Self, ConfigError> {
        if self.topology.add_sink(parent, name)? {
            self.sinks.insert(name.to_string(), sink);
        } else {
            debug!("Sink '{}' already registered, adding edge from '{}'", name, parent);
        }
        Ok(self)
    }

    pub fn register_edge_only(
        &mut self,
        parent: &str,
        existing_sink: &str,
    ) -> Result<&mut Self, ConfigError> {
        self.topology.add_sink_edge(parent, existing_sink)?;
        Ok(self)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn build(self) -> Result<Scheduler, ConfigError> {
        self.settings.validate()?;
        let source = self.source.ok_or(ConfigError::MissingSource)?;
        for edge in self.topology.describe() {
            debug!("Pipeline edge: {}", edge);
        }

        Ok(Scheduler {
            stall_timeout: self.settings.stall_timeout(),
            throughput: ThroughputMonitor::new(self.settings.throughput_smoothing),
            topology: self.topology,
            source,
            stages: self.stages,
            sinks: self.sinks,
            barrier: self.barrier,
        })
    }
}

/// Outcome of one drive cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub frame_id: Uuid,
    pub elapsed: Duration,
    pub requests_submitted: usize,
    pub completions_routed: usize,
    pub detections_routed: usize,
    pub summary: String,
}

#[derive(Debug, Default)]
struct CycleCounters {
    requests_submitted: usize,
    completions_routed: usize,
    detections_routed: usize,
}

/// Drives frames from the source through the stage graph to the sinks.
pub struct Scheduler {
    topology: Topology,
    source: Box<dyn FrameSource>,
    stages: IndexMap<String, Box<dyn Stage>>,
    sinks: IndexMap<String, Box<dyn Sink>>,
    barrier: FrameBarrier,
    throughput: ThroughputMonitor,
    stall_timeout: Option<Duration>,
}

impl Scheduler {
    pub fn builder(settings: SchedulerSettings) -> PipelineBuilder {
        PipelineBuilder::new(settings)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn throughput(&self) -> &ThroughputStats {
        self.throughput.stats()
    }

    pub fn outstanding(&self) -> usize {
        self.barrier.outstanding()
    }

    /// Reads one frame and runs it through the whole graph. Returns once
    /// every request issued for the frame has completed and been routed.
    #[instrument(skip(self))]
    pub async fn drive_one_cycle(&mut self) -> Result<CycleReport, AppError> {
        let frame = self.source.read().await?;
        for sink in self.sinks.values_mut() {
            sink.feed_frame(&frame);
        }

        let started = Instant::now();
        let stale = self.barrier.reset();
        if !stale.is_empty() {
            warn!("Discarded {} stale completion(s) from an earlier cycle", stale.len());
        }
        for stage_name in &stale {
            self.discard_results(stage_name);
        }

        let mut counters = CycleCounters::default();
        let whole_frame = frame.bounds();
        for name in self.topology.root_stages() {
            let Some(stage) = self.stages.get_mut(name) else {
                continue;
            };
            if stage.enqueue(frame.full_view(), whole_frame) {
                Self::submit(&mut self.barrier, &mut counters, name, stage.as_mut());
            } else {
                debug!("Root stage '{}' refused the frame", name);
            }
        }

        let deadline = self.stall_timeout.map(|timeout| started + timeout);
        while !self.barrier.is_settled() {
            let completed = match self.barrier.next_completion(started, deadline).await {
                Ok(completed) => completed,
                Err(stall) => {
                    warn!("Frame {} stalled: {}", frame.id(), stall);
                    self.throughput.record_stall();
                    return Err(stall.into());
                }
            };
            self.route_completion(&completed, &frame, &mut counters);
        }

        let elapsed = started.elapsed();
        let summary = self
            .throughput
            .record_cycle(elapsed, counters.detections_routed);
        for sink in self.sinks.values_mut() {
            sink.finish(&summary);
        }

        debug!(
            "Frame {} finished: {} request(s), {} result(s) routed {}",
            frame.id(),
            counters.requests_submitted,
            counters.detections_routed,
            summary
        );

        Ok(CycleReport {
            frame_id: frame.id(),
            elapsed,
            requests_submitted: counters.requests_submitted,
            completions_routed: counters.completions_routed,
            detections_routed: counters.detections_routed,
            summary,
        })
    }

    /// Handles one completed request of `stage_name`: results go to sink
    /// children first, then fan out to stage children, and only then is the
    /// request released from the barrier.
    fn route_completion(&mut self, stage_name: &str, frame: &Frame, counters: &mut CycleCounters) {
        if !self.barrier.is_in_flight(stage_name) {
            warn!("Ignoring completion from '{}' with no request in flight", stage_name);
            self.discard_results(stage_name);
            return;
        }
        let Some(stage) = self.stages.get_mut(stage_name) else {
            warn!("Completion from unknown stage '{}'", stage_name);
            return;
        };

        if !stage.fetch_results() {
            trace!("Results of '{}' were already fetched", stage_name);
        }
        let results: Vec<Detection> = (0..stage.result_count())
            .filter_map(|index| stage.result_at(index))
            .collect();
        debug!("Stage '{}' completed with {} result(s)", stage_name, results.len());

        let (sink_children, stage_children): (Vec<&String>, Vec<&String>) = self
            .topology
            .children(stage_name)
            .iter()
            .partition(|child| self.topology.kind_of(child) == Some(NodeKind::Sink));

        let mut delivered = false;
        for name in sink_children {
            let Some(sink) = self.sinks.get_mut(name.as_str()) else {
                continue;
            };
            for result in &results {
                sink.accept(result);
            }
            delivered = true;
        }
        if delivered {
            counters.detections_routed += results.len();
        }

        if !results.is_empty() {
            for name in stage_children {
                let Some(child) = self.stages.get_mut(name.as_str()) else {
                    continue;
                };
                if Self::enqueue_results(name, child.as_mut(), &results, frame) > 0 {
                    Self::submit(&mut self.barrier, counters, name, child.as_mut());
                }
            }
        }

        self.barrier.settle(stage_name);
        counters.completions_routed += 1;
    }

    /// Fetches and drops the results of a request whose completion arrived
    /// after its cycle gave up on it, so the stage accepts input again.
    fn discard_results(&mut self, stage_name: &str) {
        let Some(stage) = self.stages.get_mut(stage_name) else {
            return;
        };
        if stage.fetch_results() {
            debug!(
                "Dropped {} late result(s) of '{}'",
                stage.result_count(),
                stage_name
            );
        }
    }

    /// Feeds each result into `child` as a clipped view of the frame, tagged
    /// with the unclipped location. Returns how many were accepted.
    fn enqueue_results(
        name: &str,
        child: &mut dyn Stage,
        results: &[Detection],
        frame: &Frame,
    ) -> usize {
        let mut accepted = 0;
        for result in results {
            let Some(view) = frame.view(&result.location) else {
                debug!(
                    "Result {} lies outside the frame, not forwarded to '{}'",
                    result.location, name
                );
                continue;
            };
            if child.enqueue(view, result.location) {
                accepted += 1;
            } else {
                debug!("Stage '{}' refused input {}", name, result.location);
            }
        }
        accepted
    }

    fn submit(
        barrier: &mut FrameBarrier,
        counters: &mut CycleCounters,
        name: &str,
        stage: &mut dyn Stage,
    ) {
        barrier.arm(name);
        if stage.submit_request() {
            counters.requests_submitted += 1;
        } else {
            warn!("Stage '{}' refused to submit its batch, skipping it this frame", name);
            barrier.disarm(name);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("topology", &self.topology)
            .field("outstanding", &self.barrier.outstanding())
            .field("stall_timeout", &self.stall_timeout)
            .finish()
    }
}
