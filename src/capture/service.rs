//! Live capture loop: source -> retention -> binarize -> display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::errors::CaptureError;
use super::retention::FrameStore;
use super::source::FrameSource;
use crate::config::Config;
use crate::display::{Display, DisplayError, FlushReport};
use crate::dither::Binarizer;
use crate::png::{encode_or_placeholder, ColorType};
use crate::resample::resize_cover;
use crate::telemetry::{unix_millis, StatusReport, Telemetry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Everything one capture cycle touches. Owned by the running task, handed
/// back to the service when it stops.
pub struct CaptureLoop<S> {
    source: S,
    store: FrameStore,
    display: Display,
    binarizer: Binarizer,
    board: (u32, u32),
    telemetry: Telemetry,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        store: FrameStore,
        display: Display,
        binarizer: Binarizer,
        board: (u32, u32),
        telemetry: Telemetry,
    ) -> Self {
        Self {
            source,
            store,
            display,
            binarizer,
            board,
            telemetry,
        }
    }

    /// Build the store, display and binarizer from configuration.
    pub fn from_config(
        source: S,
        config: &Config,
        telemetry: Telemetry,
    ) -> Result<Self, DisplayError> {
        Ok(Self::new(
            source,
            FrameStore::new(&config.live.output_dir, config.live.retain_frames),
            Display::from_config(&config.display)?,
            Binarizer::new(config.display.dither, config.display.threshold),
            (config.display.width, config.display.height),
            telemetry,
        ))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Run one cycle. Failures are logged and counted, never returned.
    pub async fn run_cycle(&mut self) {
        match self.cycle().await {
            Ok(report) => {
                for failure in &report.failures {
                    warn!("Display dispatch failed: {}", failure);
                }
                self.telemetry.record_flush(&report);
            }
            Err(e) => {
                warn!("Capture from {} failed: {}", self.source.name(), e);
                self.telemetry.record_error(e.to_string());
            }
        }
    }

    async fn cycle(&mut self) -> Result<FlushReport, CaptureError> {
        let image = self.source.capture().await?;
        self.telemetry.record_capture();

        let (png, encode_error) = encode_or_placeholder(&image, ColorType::Rgb);
        if let Some(e) = encode_error {
            self.telemetry.record_error(format!("encode: {}", e));
        }
        match self.store.persist(png, unix_millis()) {
            Ok(frame) => self.telemetry.set_latest(frame),
            Err(e) => {
                warn!("Failed to retain frame in {}: {}", self.store.dir().display(), e);
                self.telemetry.record_error(format!("retention: {}", e));
            }
        }

        let (width, height) = self.board;
        let board = resize_cover(&image, width, height);
        self.display.set_image_data(&self.binarizer.to_mono(&board));
        if !self.display.is_dirty() {
            return Ok(FlushReport::default());
        }
        Ok(self.display.flush().await)
    }
}

async fn run_loop<S: FrameSource>(
    mut parts: CaptureLoop<S>,
    interval: Duration,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
) -> CaptureLoop<S> {
    while !stop.load(Ordering::SeqCst) {
        let started = Instant::now();
        parts.run_cycle().await;

        if stop.load(Ordering::SeqCst) {
            break;
        }
        let remaining = interval.saturating_sub(started.elapsed());
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = wake.notified() => {}
        }
    }
    parts
}

/// Owns the capture loop and its lifecycle.
pub struct LiveCaptureService<S: FrameSource + 'static> {
    state: ServiceState,
    idle: Option<CaptureLoop<S>>,
    task: Option<JoinHandle<CaptureLoop<S>>>,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    telemetry: Telemetry,
}

impl<S: FrameSource + 'static> LiveCaptureService<S> {
    pub fn new(parts: CaptureLoop<S>) -> Self {
        let telemetry = parts.telemetry.clone();
        Self {
            state: ServiceState::Stopped,
            idle: Some(parts),
            task: None,
            stop: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            telemetry,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Counters plus frame interval and uptime.
    pub fn stats(&self) -> StatusReport {
        self.telemetry.status()
    }

    /// Loop parts while stopped.
    pub fn parts(&self) -> Option<&CaptureLoop<S>> {
        self.idle.as_ref()
    }

    /// Open the source, prepare retention and spawn the loop.
    ///
    /// Returns `Ok(false)` when the service is not stopped.
    pub async fn start(&mut self) -> Result<bool, CaptureError> {
        if self.state != ServiceState::Stopped {
            return Ok(false);
        }
        let Some(mut parts) = self.idle.take() else {
            return Err(CaptureError::NotOpen);
        };
        self.state = ServiceState::Starting;

        if let Err(e) = parts.source.open().await {
            self.idle = Some(parts);
            self.state = ServiceState::Stopped;
            return Err(e);
        }
        if let Err(e) = parts.store.prepare() {
            parts.source.close().await;
            self.idle = Some(parts);
            self.state = ServiceState::Stopped;
            return Err(e.into());
        }

        let interval = self.telemetry.frame_interval();
        info!(
            "Live capture from {} every {:?}, retaining {} frames in {}",
            parts.source.name(),
            interval,
            parts.store.retain(),
            parts.store.dir().display()
        );

        self.stop.store(false, Ordering::SeqCst);
        self.task = Some(tokio::spawn(run_loop(
            parts,
            interval,
            Arc::clone(&self.stop),
            Arc::clone(&self.wake),
        )));
        self.state = ServiceState::Running;
        Ok(true)
    }

    /// Signal the loop, wait for the in-flight cycle and close the source.
    ///
    /// Returns `false` when the service was not running.
    pub async fn stop(&mut self) -> bool {
        if self.state != ServiceState::Running {
            return false;
        }
        self.state = ServiceState::Stopping;
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(mut parts) => {
                    parts.source.close().await;
                    self.idle = Some(parts);
                }
                Err(e) => error!("Capture loop ended abnormally: {}", e),
            }
        }
        self.state = ServiceState::Stopped;
        info!("Live capture stopped");
        true
    }
}

impl<S: FrameSource + 'static> Drop for LiveCaptureService<S> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }
}
