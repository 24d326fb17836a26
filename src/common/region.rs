use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in frame coordinates.
///
/// Detections may report regions that reach past the frame edges, so the
/// origin is signed and nothing here assumes the rectangle is in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole `width` x `height` frame.
    pub fn whole(width: u32, height: u32) -> Self {
        Self::new(0, 0, saturate(width), saturate(height))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            i64::from(self.width) * i64::from(self.height)
        }
    }

    /// Overlap of two regions. Disjoint regions yield the empty region.
    pub fn intersect(&self, other: &Region) -> Region {
        let left = i64::from(self.x).max(i64::from(other.x));
        let top = i64::from(self.y).max(i64::from(other.y));
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return Region::default();
        }

        Region::new(
            left as i32,
            top as i32,
            (right - left) as i32,
            (bottom - top) as i32,
        )
    }

    /// Restrict the region to a `width` x `height` frame.
    pub fn clip_to(&self, width: u32, height: u32) -> Region {
        self.intersect(&Region::whole(width, height))
    }

    fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width.max(0))
    }

    fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height.max(0))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}x{} at ({}, {})]",
            self.width, self.height, self.x, self.y
        )
    }
}

fn saturate(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
