use crate::{
    config::Configuration,
    error::{AppError, CaptureError},
    pipeline::scheduler::Scheduler,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Totals for one run of the drive loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub requests_submitted: usize,
    pub detections_routed: usize,
    pub cancelled: bool,
}

/// Runs the scheduler on its own task, one cycle after another, until the
/// source runs dry, a cycle fails or the coordinator is stopped.
pub struct Coordinator {
    pipeline_task: Option<JoinHandle<Result<RunSummary, AppError>>>,
    cancel_token: CancellationToken,
}

impl Coordinator {
    fn new(scheduler: Scheduler, max_cycles: Option<usize>) -> Self {
        let cancel_token = CancellationToken::new();

        Self {
            pipeline_task: Some(Self::start_pipeline_task(
                scheduler,
                max_cycles,
                cancel_token.clone(),
            )),
            cancel_token,
        }
    }

    fn start_pipeline_task(
        mut scheduler: Scheduler,
        max_cycles: Option<usize>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<Result<RunSummary, AppError>> {
        tokio::spawn(async move {
            let mut summary = RunSummary::default();
            loop {
                if max_cycles.is_some_and(|max| summary.cycles >= max) {
                    break;
                }
                let cycle = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    cycle = scheduler.drive_one_cycle() => cycle,
                };
                match cycle {
                    Ok(report) => {
                        summary.cycles += 1;
                        summary.requests_submitted += report.requests_submitted;
                        summary.detections_routed += report.detections_routed;
                    }
                    Err(AppError::Capture(CaptureError::EndOfStream)) => {
                        tracing::info!("Frame source exhausted after {} cycle(s)", summary.cycles);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Pipeline error: {}", e);
                        return Err(e);
                    }
                }
            }
            tracing::info!("Pipeline stopped: {:?}", summary);
            Ok(summary)
        })
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for the drive loop to end.
    pub async fn join(mut self) -> Result<RunSummary, AppError> {
        let Some(task) = self.pipeline_task.take() else {
            return Ok(RunSummary::default());
        };
        task.await.map_err(|e| AppError::Task(e.to_string()))?
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
    scheduler: Option<Scheduler>,
    max_cycles: Option<usize>,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            scheduler: None,
            max_cycles: None,
        }
    }

    // Stops after this many frames, even if the source has more.
    pub fn max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn build(self) -> Result<Coordinator, AppError> {
        self.configuration.scheduler.validate()?;
        let scheduler = self
            .scheduler
            .ok_or_else(|| AppError::InvalidSettings("Scheduler not set".to_string()))?;
        Ok(Coordinator::new(scheduler, self.max_cycles))
    }
}
