//! Error types for frame capture.

use std::time::Duration;

use thiserror::Error;

use crate::png::PngError;
use crate::raycast::RenderError;

/// Errors that can occur while opening a source or capturing a frame.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("browser executable '{browser}' not found; install Chromium or set live.browser")]
    BrowserNotFound { browser: String },

    #[error("browser failed: {0}")]
    BrowserFailed(String),

    #[error("capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("clip region {clip} lies outside the {width}x{height} viewport")]
    EmptyClip {
        clip: String,
        width: u32,
        height: u32,
    },

    #[error("screenshot could not be decoded: {0}")]
    Decode(#[from] PngError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("frame source is not open")]
    NotOpen,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_not_found_names_binary() {
        let err = CaptureError::BrowserNotFound {
            browser: "chromium".to_string(),
        };
        assert!(err.to_string().contains("'chromium'"));
    }

    #[test]
    fn test_empty_clip_message() {
        let err = CaptureError::EmptyClip {
            clip: "2000,0 10x10".to_string(),
            width: 1200,
            height: 650,
        };
        assert_eq!(
            err.to_string(),
            "clip region 2000,0 10x10 lies outside the 1200x650 viewport"
        );
    }

    #[test]
    fn test_png_errors_convert() {
        let err: CaptureError = PngError::BadSignature.into();
        assert!(matches!(err, CaptureError::Decode(_)));
    }
}
