use crate::common::{Detection, FrameView, Region};
use std::sync::Arc;

/// Invoked by a stage when a submitted request has completed. May be called
/// from any thread and never blocks.
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// One asynchronous analysis unit in the pipeline, typically a detector
/// backed by an inference engine.
///
/// The scheduler enqueues inputs, submits them as one batched request and
/// waits for the completion callback before fetching results. None of these
/// calls may block on the request itself.
pub trait Stage: Send {
    /// Adds one input to the pending batch. `location` is the region the
    /// input was cut from, in frame coordinates, and may extend past the
    /// frame; `input` is the in-bounds pixel view.
    fn enqueue(&mut self, input: FrameView, location: Region) -> bool;

    /// Starts asynchronous work on the pending batch. The completion callback
    /// must fire exactly once for every request that returns `true`.
    fn submit_request(&mut self) -> bool;

    /// Makes the results of the last completed request available. Calling
    /// it twice for the same request is a no-op returning `false`.
    fn fetch_results(&mut self) -> bool;

    fn result_count(&self) -> usize;

    fn result_at(&self, index: usize) -> Option<Detection>;

    fn on_completion(&mut self, callback: CompletionCallback);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Enqueued,
    Submitted,
}

/// Per-request bookkeeping shared by stage implementations: batch limit,
/// submit guard and fetch-once semantics.
#[derive(Debug, Clone)]
pub struct RequestState {
    max_batch_size: usize,
    enqueued: usize,
    phase: RequestPhase,
    results_fetched: bool,
}

impl RequestState {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            enqueued: 0,
            phase: RequestPhase::Idle,
            results_fetched: true,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// True when the next accepted input starts a new batch.
    pub fn is_batch_start(&self) -> bool {
        self.enqueued == 0 && self.phase != RequestPhase::Submitted
    }

    /// Reserves a slot in the pending batch. Refused while a request is in
    /// flight or when the batch is full.
    pub fn try_enqueue(&mut self) -> bool {
        if self.phase == RequestPhase::Submitted || self.enqueued >= self.max_batch_size {
            return false;
        }
        self.enqueued += 1;
        self.phase = RequestPhase::Enqueued;
        true
    }

    /// Moves the pending batch in flight. Refused for an empty batch or while
    /// another request is in flight.
    pub fn try_submit(&mut self) -> bool {
        if self.phase != RequestPhase::Enqueued || self.enqueued == 0 {
            return false;
        }
        self.enqueued = 0;
        self.results_fetched = false;
        self.phase = RequestPhase::Submitted;
        true
    }

    /// Marks the in-flight request's results as consumed. Only the first call
    /// after a submit returns `true`.
    pub fn try_fetch(&mut self) -> bool {
        if self.results_fetched {
            return false;
        }
        self.results_fetched = true;
        if self.phase == RequestPhase::Submitted {
            self.phase = RequestPhase::Idle;
        }
        true
    }

    /// Drops any pending or in-flight request.
    pub fn reset(&mut self) {
        self.enqueued = 0;
        self.phase = RequestPhase::Idle;
        self.results_fetched = true;
    }
}
