use std::time::Duration;

use log::debug;

use super::encoding::{FrameEncoding, PanelLayout};
use super::frame::MonoFrame;
use super::transport::{EmulatorHandle, Transport};
use super::DisplayError;
use crate::config::{EncodingKind, TargetConfig, TargetMode};

/// One output device plus its dirty-tracking state.
#[derive(Debug)]
pub struct DisplayTarget {
    id: String,
    transport: Transport,
    encoding: FrameEncoding,
    width: u32,
    height: u32,
    force_flush: bool,
    staged: Option<MonoFrame>,
    last_sent: Option<MonoFrame>,
}

impl DisplayTarget {
    pub fn new(
        id: impl Into<String>,
        transport: Transport,
        encoding: FrameEncoding,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            transport,
            encoding,
            width,
            height,
            force_flush: false,
            staged: None,
            last_sent: None,
        }
    }

    /// Send every staged frame, even when it matches the last one.
    pub fn with_force_flush(mut self, force: bool) -> Self {
        self.force_flush = force;
        self
    }

    /// Build a target from its configuration. `Off` targets yield `None`.
    pub fn from_config(
        config: &TargetConfig,
        index: usize,
        layout: &PanelLayout,
        width: u32,
        height: u32,
    ) -> Result<Option<Self>, DisplayError> {
        let transport = match &config.mode {
            TargetMode::Off => return Ok(None),
            TargetMode::Serial { path, baud_rate } => Transport::serial(path, *baud_rate),
            TargetMode::Tcp { host, port } => Transport::tcp(host.clone(), *port),
            TargetMode::Http { url } => {
                Transport::http(url.clone()).map_err(|source| DisplayError::Transport {
                    target: config.mode.name().to_string(),
                    source,
                })?
            }
            TargetMode::Stdout => Transport::Stdout,
            TargetMode::Emulator => Transport::Emulator(EmulatorHandle::new()),
        };

        let kind = config.encoding.unwrap_or_else(|| config.mode.default_encoding());
        let encoding = match kind {
            EncodingKind::Panel => FrameEncoding::Panel(layout.clone()),
            EncodingKind::Packed => FrameEncoding::Packed {
                invert: config.invert,
            },
        };

        let id = config
            .id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", config.mode.name(), index));

        Ok(Some(
            DisplayTarget::new(id, transport, encoding, width, height)
                .with_force_flush(config.force_flush),
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn emulator(&self) -> Option<EmulatorHandle> {
        match &self.transport {
            Transport::Emulator(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Stage a frame, fitted to this target's size.
    pub fn stage(&mut self, frame: &MonoFrame) {
        self.staged = Some(frame.fitted(self.width, self.height));
    }

    /// True when the staged frame has not been delivered yet.
    pub fn is_dirty(&self) -> bool {
        match &self.staged {
            None => false,
            Some(_) if self.force_flush => true,
            Some(staged) => self.last_sent.as_ref() != Some(staged),
        }
    }

    /// Send the staged frame if dirty. Returns whether anything was sent.
    /// On failure the target stays dirty.
    pub async fn flush(&mut self, timeout: Duration) -> Result<bool, DisplayError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let Some(frame) = self.staged.clone() else {
            return Ok(false);
        };

        let payload = self.encoding.encode(&frame);
        debug!(
            "Flushing {} bytes to {} ({})",
            payload.len(),
            self.id,
            self.transport.kind()
        );

        match tokio::time::timeout(timeout, self.transport.send(&payload, &frame, &self.id)).await
        {
            Ok(Ok(())) => {
                self.last_sent = Some(frame);
                Ok(true)
            }
            Ok(Err(source)) => Err(DisplayError::Transport {
                target: self.id.clone(),
                source,
            }),
            Err(_) => Err(DisplayError::Timeout {
                target: self.id.clone(),
                after: timeout,
            }),
        }
    }
}
