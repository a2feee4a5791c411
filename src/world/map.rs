use thiserror::Error;

use super::Point;

/// The built-in gallery: a 12x12 room with four free-standing pillars.
const GALLERY_ROWS: [&str; 12] = [
    "############",
    "#..........#",
    "#..........#",
    "#..#....#..#",
    "#..........#",
    "#..........#",
    "#..........#",
    "#..........#",
    "#..#....#..#",
    "#..........#",
    "#..........#",
    "############",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("map has no rows")]
    Empty,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

/// Immutable grid of solid and empty cells.
///
/// Cell `(cx, cy)` covers `[cx, cx + 1) x [cy, cy + 1)` in map units.
/// Everything outside the grid is solid.
#[derive(Debug, Clone)]
pub struct TileMap {
    width: u32,
    height: u32,
    cells: Vec<bool>,
    corners: Vec<Point>,
}

impl TileMap {
    /// Build from ASCII rows: `#` is solid, anything else is empty.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, MapError> {
        let expected = rows.first().ok_or(MapError::Empty)?.as_ref().chars().count();
        if expected == 0 {
            return Err(MapError::Empty);
        }

        let mut cells = Vec::with_capacity(expected * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != expected {
                return Err(MapError::RaggedRow {
                    row,
                    expected,
                    found,
                });
            }
            cells.extend(line.chars().map(|c| c == '#'));
        }

        let mut map = Self {
            width: expected as u32,
            height: rows.len() as u32,
            cells,
            corners: Vec::new(),
        };
        map.corners = map.find_corners();
        Ok(map)
    }

    pub fn gallery() -> Self {
        // The built-in rows are rectangular
        Self::from_rows(&GALLERY_ROWS).unwrap_or_else(|_| Self::empty_room(12, 12))
    }

    /// A room of the given size with solid border cells only.
    pub fn empty_room(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(3), height.max(3));
        let rows: Vec<String> = (0..h)
            .map(|y| {
                (0..w)
                    .map(|x| {
                        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                            '#'
                        } else {
                            '.'
                        }
                    })
                    .collect()
            })
            .collect();
        let cells = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        let mut map = Self {
            width: w,
            height: h,
            cells,
            corners: Vec::new(),
        };
        map.corners = map.find_corners();
        map
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            width: self.width,
            height: self.height,
        }
    }

    /// Whether the point lies in a solid cell (or outside the map).
    pub fn is_wall(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return true;
        }
        self.cell(x.floor() as i64, y.floor() as i64)
    }

    /// Grid vertices where walls form a convex or concave corner.
    pub fn non_corner_points(&self) -> &[Point] {
        &self.corners
    }

    fn cell(&self, cx: i64, cy: i64) -> bool {
        if cx < 0 || cy < 0 || cx >= self.width as i64 || cy >= self.height as i64 {
            return true;
        }
        self.cells[cy as usize * self.width as usize + cx as usize]
    }

    /// A vertex is a corner when its four surrounding cells are neither all
    /// alike nor split into two straight halves.
    fn find_corners(&self) -> Vec<Point> {
        let mut corners = Vec::new();
        for vy in 1..self.height as i64 {
            for vx in 1..self.width as i64 {
                let tl = self.cell(vx - 1, vy - 1);
                let tr = self.cell(vx, vy - 1);
                let bl = self.cell(vx - 1, vy);
                let br = self.cell(vx, vy);
                let solid = [tl, tr, bl, br].iter().filter(|&&s| s).count();
                let straight = solid == 2 && (tl == tr || tl == bl);
                if solid != 0 && solid != 4 && !straight {
                    corners.push(Point::new(vx as f64, vy as f64));
                }
            }
        }
        corners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = TileMap::from_rows(&["###", "#.", "###"]).unwrap_err();
        assert_eq!(
            err,
            MapError::RaggedRow {
                row: 1,
                expected: 3,
                found: 2
            }
        );
        assert_eq!(TileMap::from_rows::<&str>(&[]).unwrap_err(), MapError::Empty);
    }

    #[test]
    fn test_is_wall_and_outside() {
        let map = TileMap::from_rows(&["###", "#.#", "###"]).unwrap();
        assert!(!map.is_wall(1.5, 1.5));
        assert!(map.is_wall(0.5, 1.5));
        assert!(map.is_wall(-0.1, 1.5));
        assert!(map.is_wall(1.5, 3.0));
        assert!(map.is_wall(f64::NAN, 1.0));
    }

    #[test]
    fn test_corners_of_single_room() {
        // Interior is one cell: its four vertices are concave corners
        let map = TileMap::from_rows(&["###", "#.#", "###"]).unwrap();
        let corners = map.non_corner_points();
        assert_eq!(corners.len(), 4);
        assert!(corners.contains(&Point::new(1.0, 1.0)));
        assert!(corners.contains(&Point::new(2.0, 2.0)));
    }

    #[test]
    fn test_straight_walls_are_not_corners() {
        let map = TileMap::empty_room(5, 4);
        // Only the four inner room corners qualify
        assert_eq!(map.non_corner_points().len(), 4);
        assert!(map.non_corner_points().contains(&Point::new(4.0, 3.0)));
    }

    #[test]
    fn test_gallery_pillars_add_convex_corners() {
        let map = TileMap::gallery();
        assert_eq!(map.bounds(), Bounds { width: 12, height: 12 });
        // 4 room corners + 4 pillars with 4 corners each
        assert_eq!(map.non_corner_points().len(), 20);
        assert!(map.is_wall(3.5, 3.5));
        assert!(!map.is_wall(6.5, 6.5));
    }
}
