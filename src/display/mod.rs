//! Display abstraction: fans one binarized frame out to every configured
//! target.
//!
//! Targets are flushed concurrently, each bounded by its own timeout. A
//! failing target is reported and stays dirty; it never holds up the others.

mod encoding;
mod frame;
mod serial;
mod target;
pub mod terminal;
mod transport;

use std::time::Duration;

use futures_util::future::join_all;
use log::{info, warn};
use thiserror::Error;

pub use encoding::{pack_bits, FrameEncoding, PanelLayout};
pub use frame::MonoFrame;
pub use serial::SerialPort;
pub use target::DisplayTarget;
pub use transport::{EmulatorHandle, EmulatorState, Transport, TransportError};

use crate::config::DisplayConfig;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("target {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: TransportError,
    },

    #[error("target {target}: send timed out after {after:?}")]
    Timeout { target: String, after: Duration },
}

impl DisplayError {
    pub fn target(&self) -> &str {
        match self {
            DisplayError::Transport { target, .. } | DisplayError::Timeout { target, .. } => {
                target
            }
        }
    }
}

/// Outcome of one [`Display::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Ids of targets that accepted a frame.
    pub sent: Vec<String>,
    pub failures: Vec<DisplayError>,
}

impl FlushReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Display {
    targets: Vec<DisplayTarget>,
    timeout: Duration,
}

impl Display {
    pub fn new(targets: Vec<DisplayTarget>, timeout: Duration) -> Self {
        Self { targets, timeout }
    }

    /// Build every configured target. Construction errors are fatal.
    pub fn from_config(config: &DisplayConfig) -> Result<Self, DisplayError> {
        let mut targets = Vec::with_capacity(config.targets.len());
        for (index, target_config) in config.targets.iter().enumerate() {
            if let Some(target) = DisplayTarget::from_config(
                target_config,
                index,
                &config.layout,
                config.width,
                config.height,
            )? {
                info!(
                    "Display target {} ({})",
                    target.id(),
                    target.transport().kind()
                );
                targets.push(target);
            }
        }
        if targets.is_empty() {
            info!("No display targets configured, frames will not be sent");
        }
        Ok(Self::new(
            targets,
            Duration::from_millis(config.flush_timeout_ms),
        ))
    }

    pub fn targets(&self) -> &[DisplayTarget] {
        &self.targets
    }

    /// Emulator handle for the target with this id, if it is one.
    pub fn emulator(&self, id: &str) -> Option<EmulatorHandle> {
        self.targets
            .iter()
            .find(|t| t.id() == id)
            .and_then(DisplayTarget::emulator)
    }

    /// Stage a frame on every target.
    pub fn set_image_data(&mut self, frame: &MonoFrame) {
        for target in &mut self.targets {
            target.stage(frame);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.targets.iter().any(DisplayTarget::is_dirty)
    }

    /// Send the staged frame to every dirty target concurrently.
    pub async fn flush(&mut self) -> FlushReport {
        let timeout = self.timeout;
        let results = join_all(
            self.targets
                .iter_mut()
                .filter(|t| t.is_dirty())
                .map(|target| async move {
                    let result = target.flush(timeout).await;
                    (target.id().to_string(), result)
                }),
        )
        .await;

        let mut report = FlushReport::default();
        for (id, result) in results {
            match result {
                Ok(true) => report.sent.push(id),
                Ok(false) => {}
                Err(e) => {
                    warn!("Display flush failed: {}", e);
                    report.failures.push(e);
                }
            }
        }
        report
    }
}
