//! Glint-based eye tracking core.
//!
//! A [`tracker::EyeTracker`] pulls grayscale frames from a [`tracker::FrameSource`],
//! crops them to the current eye region, finds the two corneal reflections with
//! [`glints::GlintDetector`], and keeps the region centered on them. When glints
//! stay missing it asks its [`tracker::RegionLocator`] to find the eye again.

pub mod camera;
pub mod config;
pub mod draw;
pub mod error;
pub mod geometry;
pub mod glints;
pub mod locator;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{CenterStrategy, Config, GlintConfig, LocatorConfig, TrackerConfig};
pub use error::{Error, Result};
pub use glints::GlintDetector;
pub use locator::CenterRegionLocator;
pub use tracker::{
    EyeTracker, FrameSource, RegionLocator, StepOutcome, TrackerControl, TrackerEvent,
};
pub use types::{Frame, GlintCandidate, Point, Point2f, Region, TrackerState};
