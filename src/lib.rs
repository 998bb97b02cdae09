//! Route playback for simulated device location
//!
//! Walks a device's reported GPS position along a densified route at a
//! configurable, slightly varying speed, with optional positional jitter and
//! looping. Positions are pushed through a [`telemetry::PositionSink`];
//! progress is published as [`telemetry::RunEvent`]s.

pub mod core;
pub mod error;
pub mod input;
pub mod playback;
pub mod route;
pub mod storage;
pub mod telemetry;

pub use crate::core::{CoordSystem, Coordinate};
pub use error::{EngineError, EngineResult};
pub use playback::{PlaybackConfig, PlaybackEngine, PlaybackSnapshot, PlaybackState};
pub use route::{densify, Route, RouteStats, DEFAULT_MAX_SEGMENT_METERS};
