// One error type for the whole crate.
// Every variant states *where* things went wrong; the tracker is the only
// place that decides whether an error is retried (recovery) or surfaced.
use thiserror::Error;

use crate::types::TrackerState;

#[derive(Debug, Error)]
pub enum Error {
    /// A primitive that needs at least one element got none.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Curve fitting could not produce a real result (too few points, imaginary radius).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// The region locator failed on every frame it was given.
    #[error("eye region not found after {tries} tries")]
    RegionNotFound { tries: u32 },

    /// Recovery after repeated misses could not re-locate the eye region.
    #[error("tracking lost: recovery failed after {tries} tries")]
    TrackingLost { tries: u32 },

    /// An operation was invoked in a state that does not allow it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        state: TrackerState,
        operation: &'static str,
    },

    #[error("camera init error: {0}")]
    CameraInit(String), // Opening/starting the camera failed
    #[error("camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed
    #[error("window init error: {0}")]
    WindowInit(String), // Creating the preview window failed
    #[error("window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed

    #[error("config error: {0}")]
    Config(String),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
