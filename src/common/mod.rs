pub mod detection;
pub mod frame;
pub mod region;

pub use detection::{Detection, DetectionKind};
pub use frame::{Frame, FrameView};
pub use region::Region;
