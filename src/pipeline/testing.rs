//! Test doubles for the scheduler: a scriptable stage that completes on its
//! own thread, a recording sink and an in-memory source.

use crate::common::{Detection, Frame, FrameView, Region};
use crate::error::CaptureError;
use crate::pipeline::sink::Sink;
use crate::pipeline::source::FrameSource;
use crate::pipeline::stage::{CompletionCallback, RequestState, Stage};
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct StageLog {
    /// `(view bounds, carried location)` per accepted input.
    pub enqueued: Vec<(Region, Region)>,
    pub submits: usize,
    pub fetches: usize,
}

enum Responder {
    /// One result list per submitted request.
    Script(VecDeque<Vec<Detection>>),
    /// One result per input of the batch.
    PerInput(fn(Region) -> Detection),
}

#[derive(Clone, Copy, PartialEq)]
enum Completion {
    Thread(Duration),
    Twice,
    Inline,
    Never,
}

pub struct ScriptedStage {
    state: RequestState,
    responder: Responder,
    completion: Completion,
    slow_requests: VecDeque<Duration>,
    refuse_enqueue: bool,
    refuse_submit: bool,
    pending: Vec<Region>,
    in_flight: Vec<Region>,
    results: Vec<Detection>,
    callback: Option<CompletionCallback>,
    log: Arc<Mutex<StageLog>>,
}

impl ScriptedStage {
    /// Stage answering its n-th request with `script[n]`, e.g. a face detector.
    pub fn scripted(script: Vec<Vec<Detection>>) -> (Self, Arc<Mutex<StageLog>>) {
        Self::with_responder(Responder::Script(script.into()))
    }

    /// Stage answering every input with `respond(location)`, e.g. an emotion
    /// classifier run on face crops.
    pub fn per_input(respond: fn(Region) -> Detection) -> (Self, Arc<Mutex<StageLog>>) {
        Self::with_responder(Responder::PerInput(respond))
    }

    fn with_responder(responder: Responder) -> (Self, Arc<Mutex<StageLog>>) {
        let log = Arc::new(Mutex::new(StageLog::default()));
        (
            Self {
                state: RequestState::new(16),
                responder,
                completion: Completion::Thread(Duration::from_millis(2)),
                slow_requests: VecDeque::new(),
                refuse_enqueue: false,
                refuse_submit: false,
                pending: Vec::new(),
                in_flight: Vec::new(),
                results: Vec::new(),
                callback: None,
                log: log.clone(),
            },
            log,
        )
    }

    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.state = RequestState::new(max_batch_size);
        self
    }

    pub fn completion_delay(mut self, delay: Duration) -> Self {
        self.completion = Completion::Thread(delay);
        self
    }

    /// Delays for the first requests, in submit order. Later requests use the
    /// regular completion delay.
    pub fn slow_requests(mut self, delays: Vec<Duration>) -> Self {
        self.slow_requests = delays.into();
        self
    }

    /// Fires the completion callback twice per request.
    pub fn completes_twice(mut self) -> Self {
        self.completion = Completion::Twice;
        self
    }

    pub fn completes_inline(mut self) -> Self {
        self.completion = Completion::Inline;
        self
    }

    pub fn never_completes(mut self) -> Self {
        self.completion = Completion::Never;
        self
    }

    pub fn refuses_enqueue(mut self) -> Self {
        self.refuse_enqueue = true;
        self
    }

    pub fn refuses_submit(mut self) -> Self {
        self.refuse_submit = true;
        self
    }
}

impl Stage for ScriptedStage {
    fn enqueue(&mut self, input: FrameView, location: Region) -> bool {
        if self.refuse_enqueue || !self.state.try_enqueue() {
            return false;
        }
        self.pending.push(location);
        self.log.lock().unwrap().enqueued.push((input.bounds(), location));
        true
    }

    fn submit_request(&mut self) -> bool {
        if self.refuse_submit || !self.state.try_submit() {
            return false;
        }
        self.in_flight = std::mem::take(&mut self.pending);
        self.log.lock().unwrap().submits += 1;

        let Some(callback) = self.callback.clone() else {
            return true;
        };
        match self.completion {
            Completion::Thread(delay) => {
                let delay = self.slow_requests.pop_front().unwrap_or(delay);
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    callback();
                });
            }
            Completion::Twice => {
                std::thread::spawn(move || {
                    callback();
                    callback();
                });
            }
            Completion::Inline => callback(),
            Completion::Never => {}
        }
        true
    }

    fn fetch_results(&mut self) -> bool {
        if !self.state.try_fetch() {
            return false;
        }
        self.log.lock().unwrap().fetches += 1;
        self.results = match &mut self.responder {
            Responder::Script(script) => script.pop_front().unwrap_or_default(),
            Responder::PerInput(respond) => self.in_flight.iter().map(|r| respond(*r)).collect(),
        };
        true
    }

    fn result_count(&self) -> usize {
        self.results.len()
    }

    fn result_at(&self, index: usize) -> Option<Detection> {
        self.results.get(index).cloned()
    }

    fn on_completion(&mut self, callback: CompletionCallback) {
        self.callback = Some(callback);
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub frames_fed: usize,
    pub accepted: Vec<Detection>,
    pub finished: Vec<String>,
}

pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl Sink for RecordingSink {
    fn feed_frame(&mut self, _frame: &Frame) {
        self.log.lock().unwrap().frames_fed += 1;
    }

    fn accept(&mut self, detection: &Detection) {
        self.log.lock().unwrap().accepted.push(detection.clone());
    }

    fn finish(&mut self, summary: &str) {
        self.log.lock().unwrap().finished.push(summary.to_string());
    }
}

pub struct ScriptedSource {
    frames: VecDeque<Result<DynamicImage, String>>,
}

impl ScriptedSource {
    /// `count` blank frames of the given size, then end of stream.
    pub fn blank(count: usize, width: u32, height: u32) -> Self {
        Self {
            frames: (0..count).map(|_| Ok(blank_image(width, height))).collect(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            frames: VecDeque::from([Err(message.to_string())]),
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read(&mut self) -> Result<Frame, CaptureError> {
        match self.frames.pop_front() {
            Some(Ok(image)) => Ok(Frame::new(image)),
            Some(Err(message)) => Err(CaptureError::ReadFailed(message)),
            None => Err(CaptureError::EndOfStream),
        }
    }
}

pub fn blank_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([0, 0, 0])))
}

pub fn face(x: i32, y: i32, size: i32) -> Detection {
    Detection::face(Region::new(x, y, size, size), 0.95)
}

pub fn happy(location: Region) -> Detection {
    Detection::emotion(location, "happy")
}

pub fn adult(location: Region) -> Detection {
    Detection::age_gender(location, 35.0, 0.2)
}
