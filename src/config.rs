// Tunable parameters for the detector, the tracker and the manual locator.
// Passed by value into constructors; nothing here is global.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Glint detection thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlintConfig {
    /// Nominal glint diameter in pixels; drives the adaptive threshold.
    pub glint_diameter: u32,
    /// Blobs with raster area at or above this are rejected.
    pub area_upper_bound: f64,
    /// Inter-glint distance band used by the pair filter.
    pub min_pair_distance: f64,
    pub max_pair_distance: f64,
    pub pair_filter: bool,
}

impl Default for GlintConfig {
    fn default() -> Self {
        Self {
            glint_diameter: 4,
            area_upper_bound: 10.0,
            min_pair_distance: 5.0,
            max_pair_distance: 50.0,
            pair_filter: true,
        }
    }
}

/// How the tracker turns an accepted glint set into the next FrameCenter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterStrategy {
    /// Arithmetic mean of the glints.
    #[default]
    Mean,
    /// Distance-rank median around the previous center.
    Median,
    /// Least-squares circle center (falls back to `Mean` below 3 glints).
    CircleFit,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames handed to the region locator before giving up.
    pub max_init_tries: u32,
    /// Consecutive empty detections tolerated before recovery kicks in.
    pub max_consecutive_misses: u32,
    /// Minimum time per loop iteration; 0 runs as fast as frames arrive.
    pub poll_interval_ms: u64,
    pub center_strategy: CenterStrategy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_init_tries: 5,
            max_consecutive_misses: 5,
            poll_interval_ms: 0,
            center_strategy: CenterStrategy::Mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Located regions smaller than this are treated as not found.
    pub min_region_width: i32,
    pub min_region_height: i32,
    /// Size of the window the manual center locator proposes.
    pub region_width: i32,
    pub region_height: i32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_region_width: 20,
            min_region_height: 20,
            region_width: 96,
            region_height: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub glints: GlintConfig,
    pub tracker: TrackerConfig,
    pub locator: LocatorConfig,
}

impl Config {
    /// Parse and validate a TOML document. Missing tables/keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.glints;
        if g.glint_diameter == 0 {
            return Err(Error::Config("glints.glint_diameter must be > 0".into()));
        }
        if g.area_upper_bound <= 0.0 {
            return Err(Error::Config("glints.area_upper_bound must be > 0".into()));
        }
        if g.min_pair_distance < 0.0 || g.min_pair_distance > g.max_pair_distance {
            return Err(Error::Config(format!(
                "glints pair distance band [{}, {}] is empty",
                g.min_pair_distance, g.max_pair_distance
            )));
        }
        if self.tracker.max_init_tries == 0 {
            return Err(Error::Config("tracker.max_init_tries must be > 0".into()));
        }
        let l = &self.locator;
        if l.region_width <= 0 || l.region_height <= 0 {
            return Err(Error::Config("locator region size must be positive".into()));
        }
        Ok(())
    }
}
