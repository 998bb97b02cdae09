use crate::playback::PlaybackState;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by route preparation and the playback engine
///
/// Validation errors are returned synchronously and never start a run.
/// Sink failures during a run are reported as run events instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("invalid playback config: {0}")]
    InvalidConfig(String),

    #[error("no route configured")]
    NoRouteConfigured,

    #[error("playback already running")]
    AlreadyRunning,

    #[error("cannot {action} while {from}")]
    InvalidStateTransition {
        from: PlaybackState,
        action: &'static str,
    },

    #[error("position sink unavailable: {0}")]
    SinkUnavailable(String),
}
