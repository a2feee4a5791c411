use super::cast::{cast_ray, MIN_DISTANCE};
use super::RenderConfig;
use crate::world::{FramePose, TileMap};

/// Perpendicular distance at which walls fade to black.
pub const FADE_DISTANCE: f64 = 8.0;

/// Vertical extent and shade of one screen column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSample {
    pub top_y: i64,
    pub bottom_y: i64,
    /// 0 = nearest, 1 = at or beyond the fade distance.
    pub depth: f64,
    pub line_height: i64,
}

impl ColumnSample {
    /// Wall gray level for this column.
    pub fn brightness(&self) -> u8 {
        (255.0 * (1.0 - self.depth)).round().clamp(0.0, 255.0) as u8
    }
}

/// Cast one ray per column and derive the wall slice for each.
pub fn sample_columns(
    map: &TileMap,
    pose: FramePose,
    width: u32,
    height: u32,
    config: &RenderConfig,
) -> Vec<ColumnSample> {
    let half_fov = config.fov / 2.0;
    let h = height as f64;

    (0..width)
        .map(|x| {
            let cam_x = (x as f64 / width as f64) * 2.0 - 1.0;
            let ray_angle = pose.angle + cam_x * half_fov;
            let hit = cast_ray(map, pose.x, pose.y, ray_angle, config);

            let perp = (hit.distance * (ray_angle - pose.angle).cos()).max(MIN_DISTANCE);
            let line_height = (h / perp).round().clamp(1.0, h) as i64;
            let top_y = (height as i64 - line_height).div_euclid(2);

            ColumnSample {
                top_y,
                bottom_y: top_y + line_height,
                depth: (perp / FADE_DISTANCE).clamp(0.0, 1.0),
                line_height,
            }
        })
        .collect()
}

/// Average each interior column's top and bottom with its neighbours.
///
/// Runs in place, left to right, so each column sees its already smoothed
/// left neighbour. Line heights and depths are left untouched.
pub fn smooth_columns(columns: &mut [ColumnSample], passes: usize) {
    if columns.len() < 3 {
        return;
    }
    let avg3 = |a: i64, b: i64, c: i64| ((a + b + c) as f64 / 3.0).round() as i64;

    for _ in 0..passes {
        for x in 1..columns.len() - 1 {
            columns[x].top_y = avg3(columns[x - 1].top_y, columns[x].top_y, columns[x + 1].top_y);
            columns[x].bottom_y = avg3(
                columns[x - 1].bottom_y,
                columns[x].bottom_y,
                columns[x + 1].bottom_y,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(top: i64, bottom: i64) -> ColumnSample {
        ColumnSample {
            top_y: top,
            bottom_y: bottom,
            depth: 0.0,
            line_height: bottom - top,
        }
    }

    #[test]
    fn test_center_column_matches_distance() {
        let map = TileMap::empty_room(10, 10);
        let pose = FramePose::new(1.0, 1.0, 0.0);
        let cols = sample_columns(&map, pose, 84, 28, &RenderConfig::default());

        let center = cols[42];
        // 28 / 8 = 3.5, which may round either way at the step boundary
        assert!((3..=4).contains(&center.line_height), "{:?}", center);
        assert_eq!(center.bottom_y - center.top_y, center.line_height);
        assert!(center.depth > 0.99);
    }

    #[test]
    fn test_line_height_is_clamped_to_buffer() {
        let map = TileMap::empty_room(10, 10);
        // Standing right against the wall
        let pose = FramePose::new(8.99, 5.0, 0.0);
        let cols = sample_columns(&map, pose, 10, 20, &RenderConfig::default());
        assert!(cols.iter().all(|c| c.line_height <= 20 && c.line_height >= 1));
        assert_eq!(cols[5].line_height, 20);
        assert_eq!(cols[5].top_y, 0);
    }

    #[test]
    fn test_brightness_fades_with_depth() {
        let mut c = column(0, 10);
        assert_eq!(c.brightness(), 255);
        c.depth = 1.0;
        assert_eq!(c.brightness(), 0);
    }

    #[test]
    fn test_smoothing_is_in_place_left_to_right() {
        let mut cols = vec![column(0, 10), column(3, 10), column(6, 10), column(0, 10)];
        smooth_columns(&mut cols, 1);
        // x=1: round((0+3+6)/3) = 3; x=2 sees the new x=1: round((3+6+0)/3) = 3
        assert_eq!(cols[1].top_y, 3);
        assert_eq!(cols[2].top_y, 3);
        // Edge columns never change
        assert_eq!(cols[0].top_y, 0);
        assert_eq!(cols[3].top_y, 0);
        // Line heights are untouched
        assert_eq!(cols[2].line_height, 4);
    }

    #[test]
    fn test_smoothing_short_rows_is_noop() {
        let mut cols = vec![column(0, 10), column(5, 10)];
        smooth_columns(&mut cols, 2);
        assert_eq!(cols[1].top_y, 5);
    }
}
