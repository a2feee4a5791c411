//! Pillars, picture frames, wall edges and shading drawn over the walls.

use super::cast::cast_ray;
use super::columns::ColumnSample;
use super::RenderConfig;
use crate::raster::{Rgba, Surface};
use crate::world::{FrameMarker, FramePose, Point, TileMap};

/// Nudge applied to feature points so rays aimed at grid vertices do not
/// graze exactly along a cell edge.
const POINT_NUDGE: f64 = 1e-4;
/// Corner points lie flush with walls; allow this much overshoot.
const CORNER_TOLERANCE: f64 = 0.03;
/// Markers sit inside their wall cell.
const MARKER_TOLERANCE: f64 = 2.0;
/// Markers stay visible slightly beyond the field of view.
const MARKER_FOV_SCALE: f64 = 1.2;

const CEILING_SHADE: Rgba = Rgba::rgba(51, 51, 51, 128);
const FLOOR_SHADE: Rgba = Rgba::rgba(102, 102, 102, 128);

/// Wrap an angle to `(-PI, PI]`.
pub fn wrap_angle(a: f64) -> f64 {
    a.sin().atan2(a.cos())
}

/// Screen column for a view-relative angle.
pub fn angle_to_column(delta: f64, half_fov: f64, width: u32) -> i64 {
    let half_w = width as f64 / 2.0;
    (delta / half_fov * half_w + half_w).round() as i64
}

/// Project a point and run the occlusion test. Returns its screen column
/// when visible.
fn project(
    map: &TileMap,
    pose: FramePose,
    point: Point,
    width: u32,
    config: &RenderConfig,
    fov_scale: f64,
    tolerance: f64,
) -> Option<i64> {
    let half_fov = config.fov / 2.0;
    let dx = point.x + POINT_NUDGE - pose.x;
    let dy = point.y + POINT_NUDGE - pose.y;
    let delta = wrap_angle(dy.atan2(dx) - pose.angle);
    if delta.abs() > half_fov * fov_scale {
        return None;
    }

    let hit = cast_ray(map, pose.x, pose.y, pose.angle + delta, config);
    if hit.distance + tolerance < dx.hypot(dy) {
        return None;
    }
    Some(angle_to_column(delta, half_fov, width))
}

/// Set `thickness` columns around `center`, clipped to the row.
fn mark_band(marks: &mut [bool], center: i64, thickness: u32) {
    let t = thickness as i64;
    for offset in -(t / 2)..=((t - 1) / 2) {
        let col = center + offset;
        if col >= 0 && (col as usize) < marks.len() {
            marks[col as usize] = true;
        }
    }
}

/// Columns covered by visible wall corners.
pub fn mark_pillars(
    map: &TileMap,
    pose: FramePose,
    width: u32,
    config: &RenderConfig,
) -> Vec<bool> {
    let mut marks = vec![false; width as usize];
    for &corner in map.non_corner_points() {
        if let Some(col) = project(map, pose, corner, width, config, 1.0, CORNER_TOLERANCE) {
            mark_band(&mut marks, col, config.pillar_thickness);
        }
    }
    marks
}

/// Columns covered by visible picture markers.
pub fn mark_frames(
    map: &TileMap,
    pose: FramePose,
    markers: &[FrameMarker],
    width: u32,
    config: &RenderConfig,
) -> Vec<bool> {
    let mut marks = vec![false; width as usize];
    for marker in markers {
        let point = Point::new(marker.x, marker.y);
        if let Some(col) = project(
            map,
            pose,
            point,
            width,
            config,
            MARKER_FOV_SCALE,
            MARKER_TOLERANCE,
        ) {
            mark_band(&mut marks, col, config.frame_thickness);
        }
    }
    marks
}

/// Column's wall span clipped to the surface.
fn clipped_span(column: &ColumnSample, height: i64) -> (i64, i64) {
    (column.top_y.max(0), column.bottom_y.min(height))
}

/// Pillars: full-height white slices between the smoothed top and bottom.
pub fn draw_pillars(surface: &mut dyn Surface, columns: &[ColumnSample], marks: &[bool]) {
    let height = surface.height() as i64;
    for (x, column) in columns.iter().enumerate() {
        if !marks.get(x).copied().unwrap_or(false) {
            continue;
        }
        let (y0, y1) = clipped_span(column, height);
        if y1 > y0 {
            surface.fill_rect(x as i64, y0, 1, y1 - y0, Rgba::WHITE);
        }
    }
}

/// Picture frames: each contiguous run of marked columns is filled with an
/// inset white panel and closed with a border line above and below.
pub fn draw_frames(surface: &mut dyn Surface, columns: &[ColumnSample], marks: &[bool]) {
    let height = surface.height() as i64;
    let mut x = 0;
    while x < columns.len() {
        if !marks.get(x).copied().unwrap_or(false) {
            x += 1;
            continue;
        }

        let start = x;
        let mut top = i64::MAX;
        let mut bottom = i64::MIN;
        while x < columns.len() && marks.get(x).copied().unwrap_or(false) {
            let (y0, y1) = clipped_span(&columns[x], height);
            let inset = ((y1 - y0) as f64 * 0.2).floor().max(1.0) as i64;
            let (sy0, sy1) = (y0 + inset, y1 - inset);
            if sy1 > sy0 {
                surface.fill_rect(x as i64, sy0, 1, sy1 - sy0, Rgba::WHITE);
            }
            top = top.min(sy0);
            bottom = bottom.max(sy1);
            x += 1;
        }

        let run = (x - start) as i64;
        if bottom > top {
            surface.fill_rect(start as i64, top - 1, run, 1, Rgba::WHITE);
            surface.fill_rect(start as i64, bottom, run, 1, Rgba::WHITE);
        }
    }
}

/// Edge thickness from how much of the screen the wall slice fills.
pub fn edge_thickness(line_height: i64, height: u32) -> i64 {
    let s = line_height as f64 / height as f64;
    if s > 0.66 {
        3
    } else if s > 0.33 {
        2
    } else {
        1
    }
}

/// Bright lines along the top and bottom of every wall slice.
pub fn draw_edges(surface: &mut dyn Surface, columns: &[ColumnSample]) {
    let height = surface.height();
    let max_y = height as i64 - 1;
    for (x, column) in columns.iter().enumerate() {
        let top_y = column.top_y.clamp(0, max_y);
        let bot_y = (column.bottom_y - 1).clamp(0, max_y);
        let t = edge_thickness(column.line_height, height);

        surface.fill_rect(x as i64, (top_y - (t - 1) / 2).max(0), 1, t, Rgba::WHITE);
        surface.fill_rect(x as i64, (bot_y - t / 2).max(0), 1, t, Rgba::WHITE);
    }
}

/// Translucent ceiling and floor tints over the whole frame.
pub fn draw_shading(surface: &mut dyn Surface) {
    let width = surface.width() as i64;
    let height = surface.height() as i64;
    let half = height / 2;
    surface.fill_rect(0, 0, width, half, CEILING_SHADE);
    surface.fill_rect(0, half, width, height - half, FLOOR_SHADE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::SoftwareCanvas;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * std::f64::consts::PI) - std::f64::consts::PI).abs() < 1e-9);
        assert!((wrap_angle(-0.5) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_angle_to_column() {
        let half_fov = std::f64::consts::PI / 6.0;
        assert_eq!(angle_to_column(0.0, half_fov, 84), 42);
        assert_eq!(angle_to_column(-half_fov, half_fov, 84), 0);
        assert_eq!(angle_to_column(half_fov, half_fov, 84), 84);
    }

    #[test]
    fn test_mark_band_widths() {
        let mut marks = vec![false; 10];
        mark_band(&mut marks, 5, 2);
        assert_eq!(marks.iter().filter(|&&m| m).count(), 2);
        assert!(marks[4] && marks[5]);

        let mut marks = vec![false; 10];
        mark_band(&mut marks, 5, 3);
        assert!(marks[4] && marks[5] && marks[6]);

        let mut marks = vec![false; 3];
        mark_band(&mut marks, 0, 3);
        assert_eq!(marks, vec![true, true, false]);
    }

    #[test]
    fn test_visible_corner_is_marked() {
        let map = TileMap::empty_room(10, 10);
        // Looking straight at the far room corner (9, 9)
        let pose = FramePose::new(5.0, 5.0, std::f64::consts::FRAC_PI_4);
        let marks = mark_pillars(&map, pose, 84, &RenderConfig::default());
        assert!(marks[41] || marks[42]);
    }

    #[test]
    fn test_corner_behind_camera_is_not_marked() {
        let map = TileMap::empty_room(10, 10);
        let pose = FramePose::new(5.0, 5.0, std::f64::consts::FRAC_PI_4 + std::f64::consts::PI);
        let marks = mark_pillars(&map, pose, 84, &RenderConfig::default());
        // The far corner is behind; the corner ahead (1,1) is visible instead
        assert!(marks.iter().any(|&m| m));
        let pose = FramePose::new(5.0, 5.0, 0.0);
        let marks = mark_pillars(&map, pose, 84, &RenderConfig::default());
        // Facing +x, corners (9,1) and (9,9) sit at +-45 degrees, outside
        // the 30 degree half field of view
        assert!(marks.iter().all(|&m| !m));
    }

    #[test]
    fn test_occluded_marker_is_hidden() {
        let map = TileMap::from_rows(&[
            "#######", //
            "#.....#",
            "#..#..#",
            "#.....#",
            "#######",
        ])
        .unwrap();
        let pose = FramePose::new(1.5, 2.5, 0.0);
        let config = RenderConfig::default();
        // Marker on the far wall, straight behind the pillar at cell (3, 2)
        let hidden = [FrameMarker::new(6.0, 2.5, "far")];
        assert!(mark_frames(&map, pose, &hidden, 84, &config)
            .iter()
            .all(|&m| !m));

        let visible = [FrameMarker::new(3.0, 2.5, "pillar face")];
        assert!(mark_frames(&map, pose, &visible, 84, &config)
            .iter()
            .any(|&m| m));
    }

    #[test]
    fn test_frame_run_draws_border() {
        let mut canvas = SoftwareCanvas::new(6, 20);
        let columns = vec![
            ColumnSample {
                top_y: 0,
                bottom_y: 20,
                depth: 0.0,
                line_height: 20,
            };
            6
        ];
        let marks = [false, true, true, true, false, false];
        draw_frames(&mut canvas, &columns, &marks);

        let white = Some([255, 255, 255, 255]);
        // inset = floor(20 * 0.2) = 4: fill rows 4..16, borders at 3 and 16
        assert_eq!(canvas.buffer().get(2, 3), white);
        assert_eq!(canvas.buffer().get(2, 10), white);
        assert_eq!(canvas.buffer().get(2, 16), white);
        assert_eq!(canvas.buffer().get(2, 2), Some([0, 0, 0, 255]));
        assert_eq!(canvas.buffer().get(0, 10), Some([0, 0, 0, 255]));
        assert_eq!(canvas.buffer().get(4, 10), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_edge_thickness() {
        assert_eq!(edge_thickness(20, 28), 3);
        assert_eq!(edge_thickness(10, 28), 2);
        assert_eq!(edge_thickness(4, 28), 1);
    }

    #[test]
    fn test_shading_halves() {
        let mut canvas = SoftwareCanvas::new(1, 4);
        canvas.clear(Rgba::WHITE);
        draw_shading(&mut canvas);
        let top = canvas.buffer().get(0, 0).unwrap()[0];
        let bottom = canvas.buffer().get(0, 3).unwrap()[0];
        assert!(top < bottom);
    }
}
