use super::RenderConfig;
use crate::world::TileMap;

/// Smallest distance reported for a hit, keeps perspective division finite.
pub const MIN_DISTANCE: f64 = 1e-4;

/// Where a ray stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    /// False when the step budget ran out before a wall was found.
    pub hit_wall: bool,
}

/// March a ray from (ox, oy) in fixed steps until it enters a solid cell.
///
/// Positions are computed from the step index rather than accumulated, so
/// long rays do not pick up rounding drift. Running out of steps is not an
/// error: the ray reports a hit at its maximum range.
pub fn cast_ray(map: &TileMap, ox: f64, oy: f64, angle: f64, config: &RenderConfig) -> RayHit {
    let (dy, dx) = angle.sin_cos();
    let step = config.ray_step;

    for i in 1..=config.max_ray_steps {
        let d = i as f64 * step;
        let x = ox + dx * d;
        let y = oy + dy * d;
        if map.is_wall(x, y) {
            return RayHit {
                distance: d.max(MIN_DISTANCE),
                x,
                y,
                hit_wall: true,
            };
        }
    }

    let d = config.max_ray_steps as f64 * step;
    RayHit {
        distance: d.max(MIN_DISTANCE),
        x: ox + dx * d,
        y: oy + dy * d,
        hit_wall: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_far_wall() {
        let map = TileMap::empty_room(10, 10);
        let hit = cast_ray(&map, 1.0, 1.0, 0.0, &RenderConfig::default());
        assert!(hit.hit_wall);
        assert!((hit.distance - 8.0).abs() < 0.051, "{}", hit.distance);
    }

    #[test]
    fn test_step_budget_exhaustion_returns_max_range() {
        let map = TileMap::empty_room(100, 100);
        let config = RenderConfig {
            max_ray_steps: 10,
            ..RenderConfig::default()
        };
        let hit = cast_ray(&map, 5.0, 5.0, 0.0, &config);
        assert!(!hit.hit_wall);
        assert!((hit.distance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_floored() {
        let map = TileMap::empty_room(10, 10);
        let config = RenderConfig {
            ray_step: 0.0,
            ..RenderConfig::default()
        };
        let hit = cast_ray(&map, 0.5, 0.5, 0.0, &config);
        assert_eq!(hit.distance, MIN_DISTANCE);
    }
}
