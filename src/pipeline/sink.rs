use crate::common::{Detection, Frame};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// Terminal consumer of pipeline results.
///
/// Per cycle a sink sees one `feed_frame`, any number of `accept` calls and
/// exactly one `finish`. A sink registered under several stages receives the
/// results of all of them through the same `accept`.
pub trait Sink: Send {
    fn feed_frame(&mut self, frame: &Frame);
    fn accept(&mut self, detection: &Detection);
    fn finish(&mut self, summary: &str);
}

/// Writes every result and the per-frame summary to the log.
#[derive(Debug, Default)]
pub struct LogSink {
    frame_id: Option<Uuid>,
    accepted: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for LogSink {
    fn feed_frame(&mut self, frame: &Frame) {
        self.frame_id = Some(frame.id());
        self.accepted = 0;
        debug!(
            "Frame {} ({}x{}) entered the pipeline",
            frame.id(),
            frame.width(),
            frame.height()
        );
    }

    fn accept(&mut self, detection: &Detection) {
        self.accepted += 1;
        info!(kind = detection.kind.name(), "{}", detection);
    }

    fn finish(&mut self, summary: &str) {
        info!(
            frame_id = ?self.frame_id,
            results = self.accepted,
            "Frame done {}",
            summary
        );
    }
}

/// Everything one sink saw for one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub summary: String,
}

/// Collects a frame's results and publishes them to presentation
/// subscribers once the frame is finished.
pub struct BroadcastSink {
    report_tx: broadcast::Sender<Arc<FrameReport>>,
    frame: Option<Frame>,
    detections: Vec<Detection>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Arc<FrameReport>>) {
        let (report_tx, report_rx) = broadcast::channel(capacity.max(1));
        (
            Self {
                report_tx,
                frame: None,
                detections: Vec::new(),
            },
            report_rx,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FrameReport>> {
        self.report_tx.subscribe()
    }
}

impl Sink for BroadcastSink {
    fn feed_frame(&mut self, frame: &Frame) {
        self.frame = Some(frame.clone());
        self.detections.clear();
    }

    fn accept(&mut self, detection: &Detection) {
        self.detections.push(detection.clone());
    }

    fn finish(&mut self, summary: &str) {
        let Some(frame) = self.frame.take() else {
            debug!("finish called without a frame, nothing to publish");
            return;
        };
        let report = FrameReport {
            frame,
            detections: std::mem::take(&mut self.detections),
            summary: summary.to_string(),
        };
        // No subscribers is fine, the report is simply dropped.
        let _ = self.report_tx.send(Arc::new(report));
    }
}
