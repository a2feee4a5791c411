//! The gallery world: tile map, player pose and picture markers.

mod map;
mod player;

use serde::{Deserialize, Serialize};

pub use map::{Bounds, MapError, TileMap};
pub use player::{FramePose, Player, PlayerInput};

/// A point in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A picture hung on a wall, drawn as a framed rectangle when visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMarker {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

impl FrameMarker {
    pub fn new(x: f64, y: f64, label: impl Into<String>) -> Self {
        Self {
            x,
            y,
            label: label.into(),
        }
    }
}

/// Wall slots of the built-in gallery, one per wall plus two extras.
pub fn gallery_markers() -> Vec<FrameMarker> {
    [(11, 6), (1, 6), (6, 1), (6, 11), (3, 1), (8, 11)]
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| FrameMarker::new(x as f64, y as f64, format!("slot-{}", i + 1)))
        .collect()
}
