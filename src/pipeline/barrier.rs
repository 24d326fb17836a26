use crate::error::StallError;
use crate::pipeline::stage::CompletionCallback;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Frame-level completion barrier.
///
/// Counts requests that were submitted but have not completed yet. Stages
/// report completion through callbacks that post the stage name on a channel;
/// the driving task drains that channel, so the counter itself is only ever
/// touched by one task.
pub struct FrameBarrier {
    outstanding: usize,
    in_flight: IndexMap<String, usize>,
    completion_tx: mpsc::UnboundedSender<String>,
    completion_rx: mpsc::UnboundedReceiver<String>,
}

impl Default for FrameBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBarrier {
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            outstanding: 0,
            in_flight: IndexMap::new(),
            completion_tx,
            completion_rx,
        }
    }

    /// Callback for `stage` to fire when one of its requests completes.
    pub fn completion_callback(&self, stage: &str) -> CompletionCallback {
        let completion_tx = self.completion_tx.clone();
        let stage = stage.to_string();
        Arc::new(move || {
            if completion_tx.send(stage.clone()).is_err() {
                debug!("Completion for '{}' after the pipeline was dropped", stage);
            }
        })
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_settled(&self) -> bool {
        self.outstanding == 0
    }

    /// Starts a new cycle. Returns the stages whose stale completions were
    /// discarded, one entry per notification.
    pub fn reset(&mut self) -> Vec<String> {
        if self.outstanding > 0 {
            warn!(
                "Resetting barrier with {} request(s) still outstanding",
                self.outstanding
            );
        }
        self.outstanding = 0;
        self.in_flight.clear();

        let mut stale = Vec::new();
        while let Ok(stage) = self.completion_rx.try_recv() {
            debug!("Discarding stale completion from '{}'", stage);
            stale.push(stage);
        }
        stale
    }

    /// Whether `stage` has at least one request awaiting completion.
    pub fn is_in_flight(&self, stage: &str) -> bool {
        self.in_flight.get(stage).is_some_and(|count| *count > 0)
    }

    /// Records a request about to be submitted to `stage`.
    pub fn arm(&mut self, stage: &str) {
        self.outstanding += 1;
        *self.in_flight.entry(stage.to_string()).or_insert(0) += 1;
    }

    /// Undoes [`arm`](Self::arm) for a submit that was refused.
    pub fn disarm(&mut self, stage: &str) {
        self.release(stage);
    }

    /// Records the completion of one request of `stage`. Returns `false` and
    /// leaves the count untouched when `stage` had nothing in flight.
    pub fn settle(&mut self, stage: &str) -> bool {
        self.release(stage)
    }

    fn release(&mut self, stage: &str) -> bool {
        match self.in_flight.get_mut(stage) {
            Some(count) if *count > 0 => {
                *count -= 1;
                self.outstanding -= 1;
                true
            }
            _ => false,
        }
    }

    /// Waits for the next completion notification. With a deadline, running
    /// past it reports a stall.
    pub async fn next_completion(
        &mut self,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<String, StallError> {
        let received = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.completion_rx.recv())
                .await
                .ok()
                .flatten(),
            None => self.completion_rx.recv().await,
        };

        received.ok_or_else(|| StallError {
            outstanding: self.outstanding,
            waited: started.elapsed(),
        })
    }
}
