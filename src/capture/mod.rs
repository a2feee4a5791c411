//! Live capture: frames from an external source instead of the raycaster.
//!
//! A [`LiveCaptureService`] owns a [`FrameSource`], retains a bounded
//! history of frames on disk and forwards each frame to the display.

mod browser;
mod errors;
mod retention;
mod service;
mod source;

pub use browser::{crop, BrowserSource, ClipRegion};
pub use errors::CaptureError;
pub use retention::{parse_frame_name, FrameStore, LATEST_FILE};
pub use service::{CaptureLoop, LiveCaptureService, ServiceState};
pub use source::{FrameSource, RendererSource};
