//! Pixel buffers, colors and drawing surfaces.

mod backend;
mod buffer;
mod canvas;
mod color;

pub use backend::{create_surface, BackendError, BackendKind, DEFAULT_BACKENDS};
pub use buffer::PixelBuffer;
pub use canvas::{PlaceholderCanvas, SoftwareCanvas, Surface};
pub use color::{parse_color, try_parse_color, Rgba};
