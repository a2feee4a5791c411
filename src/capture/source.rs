//! Where live frames come from.

use std::future::Future;

use log::warn;

use super::errors::CaptureError;
use crate::config::PlayerConfig;
use crate::raster::{PixelBuffer, SoftwareCanvas, Surface};
use crate::raycast::{draw_fallback, Raycaster, RenderConfig};
use crate::world::{gallery_markers, FrameMarker, Player, TileMap};

/// A producer of RGBA frames for the capture loop.
///
/// `open` runs once before the loop starts and its failure is fatal;
/// `capture` failures are counted and retried on the next cycle.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> impl Future<Output = Result<(), CaptureError>> + Send;

    fn capture(&mut self) -> impl Future<Output = Result<PixelBuffer, CaptureError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Frames from the internal raycaster, with the player on autopilot.
pub struct RendererSource {
    raycaster: Raycaster,
    map: TileMap,
    markers: Vec<FrameMarker>,
    player: Player,
    canvas: SoftwareCanvas,
}

impl RendererSource {
    pub fn new(render: RenderConfig, player: &PlayerConfig, width: u32, height: u32) -> Self {
        let mut player = Player::new(player);
        player.set_autopilot(true);
        Self {
            raycaster: Raycaster::new(render),
            map: TileMap::gallery(),
            markers: gallery_markers(),
            player,
            canvas: SoftwareCanvas::new(width, height),
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }
}

impl FrameSource for RendererSource {
    fn name(&self) -> &str {
        "renderer"
    }

    async fn open(&mut self) -> Result<(), CaptureError> {
        self.player.reset();
        Ok(())
    }

    async fn capture(&mut self) -> Result<PixelBuffer, CaptureError> {
        self.player.update(1.0, &self.map);
        if let Err(e) = self.raycaster.render(
            &mut self.canvas,
            &self.map,
            self.player.pose(),
            &self.markers,
        ) {
            warn!("Render failed, showing fallback: {}", e);
            draw_fallback(&mut self.canvas);
        }
        let (width, height) = (self.canvas.width(), self.canvas.height());
        Ok(self.canvas.get_image_data(0, 0, width, height))
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_renderer_source_moves_between_captures() {
        let mut source =
            RendererSource::new(RenderConfig::default(), &PlayerConfig::default(), 84, 28);
        source.open().await.unwrap();
        let start = source.player().pose();

        let frame = source.capture().await.unwrap();
        assert_eq!((frame.width(), frame.height()), (84, 28));
        for _ in 0..10 {
            source.capture().await.unwrap();
        }
        assert_ne!(source.player().pose(), start);
        assert!(source.player().autopilot());
    }
}
