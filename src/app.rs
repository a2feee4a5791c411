//! The gallery loop: the context object the scheduler drives each tick.

use log::{debug, warn};
use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::{Config, ConfigError};
use crate::display::{Display, DisplayError, MonoFrame};
use crate::dither::Binarizer;
use crate::input::Controls;
use crate::png::{encode_or_placeholder, ColorType};
use crate::raster::{create_surface, BackendError, Surface, DEFAULT_BACKENDS};
use crate::raycast::{draw_fallback, Raycaster};
use crate::scheduler::{Tick, TickHandler};
use crate::server::ServerError;
use crate::telemetry::{unix_millis, CapturedFrame, Telemetry};
use crate::world::{gallery_markers, FrameMarker, Player, TileMap};

/// Anything that stops the binary from starting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no drawing backend: {0}")]
    Backend(#[from] BackendError),

    #[error("display setup failed: {0}")]
    Display(#[from] DisplayError),

    #[error("live capture failed to start: {0}")]
    Capture(#[from] CaptureError),

    #[error("status server: {0}")]
    Server(#[from] ServerError),

    #[error("cannot install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct GalleryLoop {
    map: TileMap,
    markers: Vec<FrameMarker>,
    player: Player,
    raycaster: Raycaster,
    surface: Box<dyn Surface>,
    binarizer: Binarizer,
    display: Display,
    controls: Controls,
    telemetry: Telemetry,
}

impl GalleryLoop {
    pub fn new(
        config: &Config,
        surface: Box<dyn Surface>,
        display: Display,
        controls: Controls,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            map: TileMap::gallery(),
            markers: gallery_markers(),
            player: Player::new(&config.player),
            raycaster: Raycaster::new(config.render.clone()),
            surface,
            binarizer: Binarizer::new(config.display.dither, config.display.threshold),
            display,
            controls,
            telemetry,
        }
    }

    /// Surface from the first working backend, display from the target list.
    pub fn from_config(
        config: &Config,
        controls: Controls,
        telemetry: Telemetry,
    ) -> Result<Self, AppError> {
        let surface = create_surface(
            DEFAULT_BACKENDS,
            config.display.width,
            config.display.height,
        )?;
        let display = Display::from_config(&config.display)?;
        Ok(Self::new(config, surface, display, controls, telemetry))
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Render the current pose and binarize it. Render errors are counted
    /// and paint the fallback pattern instead.
    pub fn render_frame(&mut self) -> MonoFrame {
        let surface = self.surface.as_mut();
        if let Err(e) = self
            .raycaster
            .render(surface, &self.map, self.player.pose(), &self.markers)
        {
            warn!("Render failed, showing fallback: {}", e);
            self.telemetry.record_error(format!("render: {}", e));
            draw_fallback(surface);
        }
        let (width, height) = (surface.width(), surface.height());
        let image = surface.get_image_data(0, 0, width, height);
        self.binarizer.to_mono(&image)
    }

    /// Render one binarized frame as greyscale PNG.
    pub fn snapshot_png(&mut self) -> Vec<u8> {
        let frame = self.render_frame();
        self.encode(&frame)
    }

    fn encode(&self, frame: &MonoFrame) -> Vec<u8> {
        let (png, error) = encode_or_placeholder(&frame.to_rgba(), ColorType::Grayscale);
        if let Some(e) = error {
            self.telemetry.record_error(format!("encode: {}", e));
        }
        png
    }

    /// One full pipeline pass: input, movement, render, dispatch.
    pub async fn step(&mut self, tick: Tick) {
        self.controls.apply_to(&mut self.player);
        self.player.update(tick.delta_time, &self.map);

        let frame = self.render_frame();
        self.telemetry.record_capture();
        self.telemetry.set_latest(CapturedFrame {
            png: self.encode(&frame),
            captured_at: unix_millis(),
            file_path: None,
        });

        self.display.set_image_data(&frame);
        if !self.display.is_dirty() {
            return;
        }
        let report = self.display.flush().await;
        for failure in &report.failures {
            warn!("Display dispatch failed: {}", failure);
        }
        if !report.sent.is_empty() {
            debug!("Frame sent to {}", report.sent.join(", "));
        }
        self.telemetry.record_flush(&report);
    }
}

impl TickHandler for GalleryLoop {
    async fn on_tick(&mut self, tick: Tick) {
        self.step(tick).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::display::{DisplayTarget, EmulatorHandle, FrameEncoding, Transport};
    use crate::raster::{PlaceholderCanvas, SoftwareCanvas};
    use crate::world::PlayerInput;

    fn tick() -> Tick {
        Tick {
            delta_time: 1.0,
            elapsed: Duration::from_millis(67),
        }
    }

    fn gallery(surface: Box<dyn Surface>) -> (GalleryLoop, EmulatorHandle, Controls) {
        let emulator = EmulatorHandle::new();
        let target = DisplayTarget::new(
            "emu",
            Transport::Emulator(emulator.clone()),
            FrameEncoding::Packed { invert: false },
            84,
            28,
        );
        let controls = Controls::new();
        let gallery = GalleryLoop::new(
            &Config::default(),
            surface,
            Display::new(vec![target], Duration::from_secs(1)),
            controls.clone(),
            Telemetry::new(15.0),
        );
        (gallery, emulator, controls)
    }

    #[tokio::test]
    async fn test_step_renders_and_dispatches() {
        let (mut gallery, emulator, _) = gallery(Box::new(SoftwareCanvas::new(84, 28)));
        gallery.step(tick()).await;

        let state = emulator.snapshot();
        assert_eq!(state.frames_received, 1);
        let frame = state.last_frame.unwrap();
        assert_eq!((frame.width(), frame.height()), (84, 28));
        assert!(frame.count_on() > 0);

        let stats = gallery.telemetry.stats();
        assert_eq!(stats.frames_captured, 1);
        assert_eq!(stats.frames_dispatched, 1);
        assert!(gallery.telemetry.latest().is_some());
    }

    #[tokio::test]
    async fn test_unchanged_frame_is_not_resent() {
        let (mut gallery, emulator, _) = gallery(Box::new(SoftwareCanvas::new(84, 28)));
        gallery.step(tick()).await;
        gallery.step(tick()).await;
        assert_eq!(emulator.frames_received(), 1);
        assert_eq!(gallery.telemetry.stats().frames_captured, 2);
    }

    #[tokio::test]
    async fn test_controls_steer_player() {
        let (mut gallery, _, controls) = gallery(Box::new(SoftwareCanvas::new(84, 28)));
        let start = gallery.player().pose();
        controls.submit(PlayerInput::new(0.0, 0.0, 1.0));
        gallery.step(tick()).await;
        assert!(gallery.player().pose().angle > start.angle);
    }

    #[tokio::test]
    async fn test_render_error_is_counted() {
        let mut config = Config::default();
        config.render.ray_step = 0.0;
        let telemetry = Telemetry::new(15.0);
        let mut gallery = GalleryLoop::new(
            &config,
            Box::new(SoftwareCanvas::new(84, 28)),
            Display::new(Vec::new(), Duration::from_secs(1)),
            Controls::new(),
            telemetry.clone(),
        );

        gallery.step(tick()).await;
        let stats = telemetry.stats();
        assert_eq!(stats.frames_captured, 1);
        assert_eq!(stats.errors, 1);
        assert!(stats.last_error.unwrap().starts_with("render:"));
        // The fallback frame is still published
        assert!(telemetry.latest().is_some());
    }

    #[tokio::test]
    async fn test_empty_surface_counts_render_and_encode_errors() {
        let (mut gallery, _, _) = gallery(Box::new(PlaceholderCanvas::new(0, 0)));
        let png = gallery.snapshot_png();
        assert_eq!(png, crate::png::placeholder_png());

        let stats = gallery.telemetry.stats();
        assert_eq!(stats.errors, 2);
        assert!(stats.last_error.unwrap().starts_with("encode:"));
    }

    #[tokio::test]
    async fn test_placeholder_surface_still_produces_frames() {
        let (mut gallery, _, _) = gallery(Box::new(PlaceholderCanvas::new(84, 28)));
        let frame = gallery.render_frame();
        assert_eq!(frame.count_on(), 0);
        let png = gallery.snapshot_png();
        assert_eq!(&png[..8], crate::png::SIGNATURE.as_slice());
    }
}
