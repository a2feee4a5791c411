use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::map::TileMap;
use crate::config::PlayerConfig;

/// Ticks spent in each leg of the autopilot patrol.
const PATROL_LEG_TICKS: f64 = 120.0;

/// Camera position and heading in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FramePose {
    pub x: f64,
    pub y: f64,
    /// Radians, 0 = +x, increasing towards +y.
    pub angle: f64,
}

impl FramePose {
    pub fn new(x: f64, y: f64, angle: f64) -> Self {
        Self { x, y, angle }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.angle.is_finite()
    }
}

/// Movement request, each axis in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerInput {
    pub forward: f64,
    pub strafe: f64,
    pub turn: f64,
}

impl PlayerInput {
    pub fn new(forward: f64, strafe: f64, turn: f64) -> Self {
        Self {
            forward,
            strafe,
            turn,
        }
    }

    /// Clamp each axis to `[-1, 1]`; non-finite values become 0.
    pub fn clamped(self) -> Self {
        let c = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self::new(c(self.forward), c(self.strafe), c(self.turn))
    }

    pub fn is_idle(&self) -> bool {
        self.forward == 0.0 && self.strafe == 0.0 && self.turn == 0.0
    }
}

/// Owns the pose and applies input or the autopilot patrol each tick.
#[derive(Debug, Clone)]
pub struct Player {
    pose: FramePose,
    spawn: FramePose,
    input: PlayerInput,
    autopilot: bool,
    patrol_timer: f64,
    move_speed: f64,
    rotation_speed: f64,
}

impl Player {
    pub fn new(config: &PlayerConfig) -> Self {
        let spawn = FramePose::new(config.spawn_x, config.spawn_y, config.spawn_angle);
        Self {
            pose: spawn,
            spawn,
            input: PlayerInput::default(),
            autopilot: config.autopilot,
            patrol_timer: 0.0,
            move_speed: config.move_speed,
            rotation_speed: config.rotation_speed,
        }
    }

    pub fn pose(&self) -> FramePose {
        self.pose
    }

    pub fn autopilot(&self) -> bool {
        self.autopilot
    }

    pub fn set_autopilot(&mut self, enabled: bool) {
        self.autopilot = enabled;
    }

    /// Queue input for the next tick. Manual input disables the autopilot.
    pub fn set_input(&mut self, input: PlayerInput) {
        self.input = input.clamped();
        self.autopilot = false;
    }

    pub fn reset(&mut self) {
        self.pose = self.spawn;
        self.input = PlayerInput::default();
        self.patrol_timer = 0.0;
    }

    /// Advance one tick. `dt` is in units of the target frame interval.
    ///
    /// Each axis is moved separately so the player slides along walls
    /// instead of sticking to them.
    pub fn update(&mut self, dt: f64, map: &TileMap) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        if self.autopilot {
            self.patrol_timer += dt;
            self.input = patrol_input(self.patrol_timer);
        }

        let input = self.input;
        if input.turn != 0.0 {
            self.pose.angle += input.turn * self.rotation_speed * dt;
        }

        if input.forward != 0.0 || input.strafe != 0.0 {
            let angle = self.pose.angle;
            let side = angle + FRAC_PI_2;
            let step = self.move_speed * dt;
            let mx = (angle.cos() * input.forward + side.cos() * input.strafe) * step;
            let my = (angle.sin() * input.forward + side.sin() * input.strafe) * step;

            let nx = self.pose.x + mx;
            if !map.is_wall(nx, self.pose.y) {
                self.pose.x = nx;
            }
            let ny = self.pose.y + my;
            if !map.is_wall(self.pose.x, ny) {
                self.pose.y = ny;
            }
        }

        // Manual input is an impulse consumed by one tick
        if !self.autopilot {
            self.input = PlayerInput::default();
        }
    }
}

/// Forward, turn left, forward, turn right; each leg lasts 120 ticks.
fn patrol_input(timer: f64) -> PlayerInput {
    match (timer / PATROL_LEG_TICKS).floor() as i64 % 4 {
        0 | 2 => PlayerInput::new(1.0, 0.0, 0.0),
        1 => PlayerInput::new(0.0, 0.0, 1.0),
        _ => PlayerInput::new(0.0, 0.0, -1.0),
    }
}
