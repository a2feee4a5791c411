//! flipdot-caster library crate.
//!
//! Renders a raycast gallery (or captures a live page), binarizes each
//! frame and pushes it to flip-dot and LED boards. Exposed as a library for
//! the binary and the integration tests.

pub mod app;
pub mod capture;
pub mod config;
pub mod display;
pub mod dither;
pub mod input;
pub mod png;
pub mod raster;
pub mod raycast;
pub mod resample;
pub mod scheduler;
pub mod server;
pub mod telemetry;
pub mod world;
