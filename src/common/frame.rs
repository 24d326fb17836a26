use crate::common::region::Region;
use chrono::{DateTime, Utc};
use image::{DynamicImage, SubImage, imageops};
use std::sync::Arc;
use uuid::Uuid;

/// One captured image. The pixel buffer is shared, so clones are cheap and
/// every clone sees the same immutable data.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    captured_at: DateTime<Utc>,
    frame_id: Uuid,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self::with_metadata(image, Utc::now(), Uuid::new_v4())
    }

    pub fn with_metadata(image: DynamicImage, captured_at: DateTime<Utc>, frame_id: Uuid) -> Self {
        Self {
            image: Arc::new(image),
            captured_at,
            frame_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.frame_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bounds(&self) -> Region {
        Region::whole(self.width(), self.height())
    }

    /// View of the whole frame.
    pub fn full_view(&self) -> FrameView {
        FrameView {
            frame: self.clone(),
            bounds: self.bounds(),
        }
    }

    /// View of `region` clipped to the frame. `None` when nothing of the
    /// region lies inside the frame.
    pub fn view(&self, region: &Region) -> Option<FrameView> {
        let bounds = region.clip_to(self.width(), self.height());
        if bounds.is_empty() {
            return None;
        }
        Some(FrameView {
            frame: self.clone(),
            bounds,
        })
    }

    pub fn shares_buffer_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

/// A rectangular window into a [`Frame`].
///
/// Holds a clone of the frame, so the buffer stays alive for as long as any
/// downstream stage keeps the view. `bounds` is always inside the frame.
#[derive(Debug, Clone)]
pub struct FrameView {
    frame: Frame,
    bounds: Region,
}

impl FrameView {
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn bounds(&self) -> Region {
        self.bounds
    }

    pub fn width(&self) -> u32 {
        self.bounds.width as u32
    }

    pub fn height(&self) -> u32 {
        self.bounds.height as u32
    }

    /// Borrowed pixel view, no copy.
    pub fn pixels(&self) -> SubImage<&DynamicImage> {
        imageops::crop_imm(
            self.frame.image(),
            self.bounds.x as u32,
            self.bounds.y as u32,
            self.width(),
            self.height(),
        )
    }

    /// Copies the viewed pixels into an owned image.
    pub fn to_image(&self) -> DynamicImage {
        DynamicImage::from(self.pixels().to_image())
    }
}
