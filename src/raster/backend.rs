//! Surface backend selection with ordered fallback.

use std::fmt;

use log::{info, warn};
use thiserror::Error;

use super::canvas::{PlaceholderCanvas, SoftwareCanvas, Surface};

/// A drawing backend the renderer can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process RGBA rasterizer.
    Software,
    /// Draws nothing, reads black. Always available.
    Placeholder,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Software => write!(f, "software"),
            BackendKind::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Default attempt order.
pub const DEFAULT_BACKENDS: &[BackendKind] = &[BackendKind::Software, BackendKind::Placeholder];

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("no drawing backend available (tried: {tried})")]
    NoBackend { tried: String },
}

/// Try each backend in order and return the first that initializes.
pub fn create_surface(
    order: &[BackendKind],
    width: u32,
    height: u32,
) -> Result<Box<dyn Surface>, BackendError> {
    let mut tried = Vec::new();

    for &kind in order {
        match init_backend(kind, width, height) {
            Ok(surface) => {
                info!("Drawing backend: {} ({}x{})", kind, width, height);
                return Ok(surface);
            }
            Err(e) => {
                warn!("Backend {} unavailable: {}", kind, e);
                tried.push(kind.to_string());
            }
        }
    }

    Err(BackendError::NoBackend {
        tried: tried.join(", "),
    })
}

fn init_backend(
    kind: BackendKind,
    width: u32,
    height: u32,
) -> Result<Box<dyn Surface>, BackendError> {
    match kind {
        BackendKind::Software => {
            if width == 0 || height == 0 {
                return Err(BackendError::InvalidSize { width, height });
            }
            Ok(Box::new(SoftwareCanvas::new(width, height)))
        }
        BackendKind::Placeholder => Ok(Box::new(PlaceholderCanvas::new(width, height))),
    }
}
