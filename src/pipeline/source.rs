use crate::common::Frame;
use crate::error::CaptureError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::debug;

/// Produces frames on demand. Reaching the end of the input is reported as
/// [`CaptureError::EndOfStream`].
#[async_trait]
pub trait FrameSource: Send {
    async fn read(&mut self) -> Result<Frame, CaptureError>;
}

/// Replays a fixed list of image files, one per read.
pub struct ImageFileSource {
    paths: VecDeque<PathBuf>,
}

impl ImageFileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

#[async_trait]
impl FrameSource for ImageFileSource {
    async fn read(&mut self) -> Result<Frame, CaptureError> {
        let path = self.paths.pop_front().ok_or(CaptureError::EndOfStream)?;
        debug!("Decoding frame from {}", path.display());

        let image = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))??;
        Ok(Frame::new(image))
    }
}
