//! Headless browser screenshots as a frame source.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use super::errors::CaptureError;
use super::source::FrameSource;
use crate::config::LiveConfig;
use crate::png::decode_png;
use crate::raster::PixelBuffer;

/// Rectangle of the page that becomes the frame, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClipRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ClipRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with a `width` x `height` viewport. `None` when nothing is
    /// left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<ClipRegion> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(ClipRegion::new(self.x, self.y, w, h))
    }
}

impl fmt::Display for ClipRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Copy a region out of an RGBA buffer. The region must lie inside it.
pub fn crop(image: &PixelBuffer, region: ClipRegion) -> PixelBuffer {
    let mut out = PixelBuffer::new(region.width, region.height);
    let src_stride = image.width() as usize * 4;
    let row_len = region.width as usize * 4;
    for row in 0..region.height as usize {
        let start = (region.y as usize + row) * src_stride + region.x as usize * 4;
        out.data_mut()[row * row_len..(row + 1) * row_len]
            .copy_from_slice(&image.data()[start..start + row_len]);
    }
    out
}

/// Runs `<browser> --headless --screenshot` once per frame.
pub struct BrowserSource {
    browser: String,
    url: String,
    viewport: (u32, u32),
    clip: Option<ClipRegion>,
    timeout: Duration,
    screenshot_path: PathBuf,
    opened: bool,
}

impl BrowserSource {
    pub fn new(config: &LiveConfig) -> Self {
        let screenshot_path = std::env::temp_dir().join(format!(
            "flipdot-caster-{}.png",
            std::process::id()
        ));
        Self {
            browser: config.browser.clone(),
            url: config.url.clone(),
            viewport: (config.viewport_width, config.viewport_height),
            clip: config.clip,
            timeout: Duration::from_millis(config.capture_timeout_ms),
            screenshot_path,
            opened: false,
        }
    }

    /// Clip region clamped to the viewport. An empty region is an error.
    pub fn effective_clip(&self) -> Result<Option<ClipRegion>, CaptureError> {
        let (width, height) = self.viewport;
        match self.clip {
            None => Ok(None),
            Some(clip) => clip
                .clamp_to(width, height)
                .map(Some)
                .ok_or(CaptureError::EmptyClip {
                    clip: clip.to_string(),
                    width,
                    height,
                }),
        }
    }

    fn command(&self) -> Command {
        let (width, height) = self.viewport;
        let mut cmd = Command::new(&self.browser);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg(format!("--window-size={},{}", width, height))
            .arg(format!("--screenshot={}", self.screenshot_path.display()))
            .arg(&self.url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn map_spawn_error(&self, e: std::io::Error) -> CaptureError {
        if e.kind() == ErrorKind::NotFound {
            CaptureError::BrowserNotFound {
                browser: self.browser.clone(),
            }
        } else {
            CaptureError::Io(e)
        }
    }
}

impl FrameSource for BrowserSource {
    fn name(&self) -> &str {
        "browser"
    }

    async fn open(&mut self) -> Result<(), CaptureError> {
        self.effective_clip()?;

        let version_check = Command::new(&self.browser)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, version_check)
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout))?
            .map_err(|e| self.map_spawn_error(e))?;
        if !output.status.success() {
            return Err(CaptureError::BrowserFailed(format!(
                "{} --version exited with {}",
                self.browser, output.status
            )));
        }

        info!(
            "Capturing {} with {}",
            self.url,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        self.opened = true;
        Ok(())
    }

    async fn capture(&mut self) -> Result<PixelBuffer, CaptureError> {
        if !self.opened {
            return Err(CaptureError::NotOpen);
        }

        // A stale screenshot must never pass for this frame
        if let Err(e) = tokio::fs::remove_file(&self.screenshot_path).await {
            if e.kind() != ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        let output = tokio::time::timeout(self.timeout, self.command().output())
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout))?
            .map_err(|e| self.map_spawn_error(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::BrowserFailed(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let bytes = match tokio::fs::read(&self.screenshot_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CaptureError::BrowserFailed(format!(
                    "no screenshot written to {}",
                    self.screenshot_path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let image = decode_png(&bytes)?;
        debug!("Screenshot {}x{}", image.width(), image.height());

        // The browser may hand back a smaller image than the window size
        match self.effective_clip()? {
            None => Ok(image),
            Some(clip) => {
                let clip = clip.clamp_to(image.width(), image.height()).ok_or(
                    CaptureError::EmptyClip {
                        clip: clip.to_string(),
                        width: image.width(),
                        height: image.height(),
                    },
                )?;
                Ok(crop(&image, clip))
            }
        }
    }

    async fn close(&mut self) {
        self.opened = false;
        if let Err(e) = tokio::fs::remove_file(&self.screenshot_path).await {
            if e.kind() != ErrorKind::NotFound {
                debug!("Could not remove {}: {}", self.screenshot_path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config(browser: &str, clip: Option<ClipRegion>) -> LiveConfig {
        LiveConfig {
            browser: browser.to_string(),
            clip,
            ..LiveConfig::default()
        }
    }

    #[test]
    fn test_clip_clamps_to_viewport() {
        let clip = ClipRegion::new(1100, 600, 200, 200);
        assert_eq!(clip.clamp_to(1200, 650), Some(ClipRegion::new(1100, 600, 100, 50)));
        assert_eq!(ClipRegion::new(1200, 0, 10, 10).clamp_to(1200, 650), None);
        assert_eq!(ClipRegion::new(0, 0, 0, 10).clamp_to(1200, 650), None);
    }

    #[test]
    fn test_crop_copies_rows() {
        let mut image = PixelBuffer::new(4, 3);
        image.set(2, 1, [9, 8, 7, 255]);
        let out = crop(&image, ClipRegion::new(1, 1, 2, 2));
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.get(1, 0), Some([9, 8, 7, 255]));
        assert_eq!(out.get(0, 0), Some([0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_empty_clip_fails_open() {
        let config = live_config("chromium", Some(ClipRegion::new(5000, 0, 10, 10)));
        let mut source = BrowserSource::new(&config);
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, CaptureError::EmptyClip { .. }));
    }

    #[tokio::test]
    async fn test_missing_browser_is_reported() {
        let config = live_config("flipdot-caster-no-such-browser", None);
        let mut source = BrowserSource::new(&config);
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, CaptureError::BrowserNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_screenshot_is_an_error_not_a_stale_frame() {
        let dir = tempfile::tempdir().unwrap();
        // `true` accepts any arguments, exits 0 and writes nothing
        let mut source = BrowserSource::new(&live_config("true", None));
        source.screenshot_path = dir.path().join("shot.png");
        source.open().await.unwrap();

        let stale = crate::png::encode_png(
            &PixelBuffer::filled(4, 4, [255, 255, 255, 255]),
            crate::png::ColorType::Rgb,
        )
        .unwrap();
        std::fs::write(&source.screenshot_path, stale).unwrap();

        let err = source.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::BrowserFailed(ref msg) if msg.contains("no screenshot")));
        assert!(!source.screenshot_path.exists());
    }

    #[tokio::test]
    async fn test_capture_before_open_fails() {
        let mut source = BrowserSource::new(&live_config("chromium", None));
        assert!(matches!(
            source.capture().await.unwrap_err(),
            CaptureError::NotOpen
        ));
    }
}
