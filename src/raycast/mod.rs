//! Column raycaster projecting the tile map into a pseudo-3D frame.
//!
//! One ray per screen column gives the wall slice; corner points and picture
//! markers are projected with the same angle-to-column mapping and drawn on
//! top, followed by wall edges and ceiling/floor shading.

mod cast;
mod columns;
mod overlay;

use serde::Deserialize;
use thiserror::Error;

pub use cast::{cast_ray, RayHit, MIN_DISTANCE};
pub use columns::{sample_columns, smooth_columns, ColumnSample, FADE_DISTANCE};
pub use overlay::{angle_to_column, edge_thickness, wrap_angle};

use crate::raster::{Rgba, Surface};
use crate::world::{FrameMarker, FramePose, TileMap};

const SMOOTHING_PASSES: usize = 2;
const FALLBACK_SQUARE: i64 = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Horizontal field of view in radians.
    pub fov: f64,
    pub ray_step: f64,
    pub max_ray_steps: u32,
    pub pillar_thickness: u32,
    pub frame_thickness: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fov: std::f64::consts::FRAC_PI_3,
            ray_step: 0.05,
            max_ray_steps: 256,
            pillar_thickness: 2,
            frame_thickness: 3,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("camera pose is not finite: {0:?}")]
    InvalidPose(FramePose),

    #[error("surface has zero size ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },

    #[error("invalid render settings: {0}")]
    InvalidConfig(String),
}

/// Renders the gallery from a pose onto any [`Surface`].
#[derive(Debug, Clone)]
pub struct Raycaster {
    config: RenderConfig,
}

impl Raycaster {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn check(&self, surface: &dyn Surface, pose: FramePose) -> Result<(), RenderError> {
        if !pose.is_finite() {
            return Err(RenderError::InvalidPose(pose));
        }
        let (width, height) = (surface.width(), surface.height());
        if width == 0 || height == 0 {
            return Err(RenderError::EmptySurface { width, height });
        }
        let c = &self.config;
        if !(c.fov.is_finite() && c.fov > 0.0 && c.fov < std::f64::consts::TAU) {
            return Err(RenderError::InvalidConfig(format!("fov {}", c.fov)));
        }
        if !(c.ray_step.is_finite() && c.ray_step > 0.0) || c.max_ray_steps == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "ray step {} x {}",
                c.ray_step, c.max_ray_steps
            )));
        }
        Ok(())
    }

    /// Paint one frame. Returns the smoothed column samples.
    pub fn render(
        &self,
        surface: &mut dyn Surface,
        map: &TileMap,
        pose: FramePose,
        markers: &[FrameMarker],
    ) -> Result<Vec<ColumnSample>, RenderError> {
        self.check(surface, pose)?;
        let (width, height) = (surface.width(), surface.height());

        surface.clear(Rgba::BLACK);

        let mut columns = sample_columns(map, pose, width, height, &self.config);
        for (x, column) in columns.iter().enumerate() {
            surface.fill_rect(
                x as i64,
                column.top_y,
                1,
                column.line_height,
                Rgba::gray(column.brightness()),
            );
        }

        smooth_columns(&mut columns, SMOOTHING_PASSES);

        let pillars = overlay::mark_pillars(map, pose, width, &self.config);
        let frames = overlay::mark_frames(map, pose, markers, width, &self.config);
        overlay::draw_pillars(surface, &columns, &pillars);
        overlay::draw_frames(surface, &columns, &frames);
        overlay::draw_edges(surface, &columns);
        overlay::draw_shading(surface);

        Ok(columns)
    }
}

/// Fixed pattern shown when a frame cannot be rendered: black, a white
/// square top-left and a grey square bottom-right.
pub fn draw_fallback(surface: &mut dyn Surface) {
    let width = surface.width() as i64;
    let height = surface.height() as i64;
    surface.clear(Rgba::BLACK);
    surface.fill_rect(0, 0, FALLBACK_SQUARE, FALLBACK_SQUARE, Rgba::WHITE);
    surface.fill_rect(
        width - FALLBACK_SQUARE,
        height - FALLBACK_SQUARE,
        FALLBACK_SQUARE,
        FALLBACK_SQUARE,
        Rgba::gray(0x88),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{PlaceholderCanvas, SoftwareCanvas};
    use crate::world::gallery_markers;

    #[test]
    fn test_render_rejects_non_finite_pose() {
        let mut canvas = SoftwareCanvas::new(84, 28);
        let pose = FramePose::new(f64::NAN, 1.0, 0.0);
        let err = Raycaster::new(RenderConfig::default())
            .render(&mut canvas, &TileMap::gallery(), pose, &[])
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidPose(_)));
    }

    #[test]
    fn test_render_rejects_empty_surface() {
        let mut canvas = PlaceholderCanvas::new(0, 28);
        let err = Raycaster::new(RenderConfig::default())
            .render(&mut canvas, &TileMap::gallery(), FramePose::new(6.5, 6.5, 0.0), &[])
            .unwrap_err();
        assert_eq!(err, RenderError::EmptySurface { width: 0, height: 28 });
    }

    #[test]
    fn test_render_rejects_bad_config() {
        let mut canvas = SoftwareCanvas::new(8, 8);
        let config = RenderConfig {
            ray_step: 0.0,
            ..RenderConfig::default()
        };
        let err = Raycaster::new(config)
            .render(&mut canvas, &TileMap::gallery(), FramePose::new(6.5, 6.5, 0.0), &[])
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }

    #[test]
    fn test_render_gallery_produces_columns() {
        let mut canvas = SoftwareCanvas::new(84, 28);
        let columns = Raycaster::new(RenderConfig::default())
            .render(
                &mut canvas,
                &TileMap::gallery(),
                FramePose::new(6.5, 6.5, 0.0),
                &gallery_markers(),
            )
            .unwrap();
        assert_eq!(columns.len(), 84);
        // Something bright was drawn (edges at least)
        assert!(canvas.buffer().data().chunks_exact(4).any(|p| p[0] > 128));
    }

    #[test]
    fn test_fallback_pattern() {
        let mut canvas = SoftwareCanvas::new(84, 28);
        draw_fallback(&mut canvas);
        assert_eq!(canvas.buffer().get(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(canvas.buffer().get(83, 27), Some([0x88, 0x88, 0x88, 255]));
        assert_eq!(canvas.buffer().get(40, 14), Some([0, 0, 0, 255]));
    }
}
