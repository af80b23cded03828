// Core types shared by the detector, the tracker and the preview window.

use std::fmt;

/// Single-channel 8-bit intensity frame. Sources deliver these already grayscale.
pub type Frame = image::GrayImage;

/// Integer 2-D coordinate (pixel position).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Floating 2-D coordinate (sub-pixel estimates, fitted centers).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Drop the fractional part of both coordinates (toward zero).
    pub fn truncate(self) -> Point {
        Point::new(self.x as i32, self.y as i32)
    }

    /// Nearest pixel; halves round away from zero.
    pub fn round(self) -> Point {
        Point::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl From<Point> for Point2f {
    fn from(p: Point) -> Self {
        Self::new(p.x as f32, p.y as f32)
    }
}

/// Axis-aligned search window in frame coordinates.
/// The origin is never negative; width/height are whatever the locator reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// Build a region, clamping the origin to non-negative coordinates.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x: x.max(0),
            y: y.max(0),
            width,
            height,
        }
    }

    /// Geometric center; integer division truncates.
    pub fn barycenter(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Shift the region so its center lands on `center` (given in region-local
    /// coordinates), keeping the size and clamping the origin at zero.
    pub fn recentered(&self, center: Point) -> Self {
        Self::new(
            self.x + center.x - self.width / 2,
            self.y + center.y - self.height / 2,
            self.width,
            self.height,
        )
    }
}

/// A detected bright blob: integer centroid (region-local) and pixel area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlintCandidate {
    pub center: Point,
    pub area: f64,
}

/// Lifecycle of the eye tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackerState {
    #[default]
    Idle,
    Initializing,
    Tracking,
    Recovering,
    Stopped,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackerState::Idle => "idle",
            TrackerState::Initializing => "initializing",
            TrackerState::Tracking => "tracking",
            TrackerState::Recovering => "recovering",
            TrackerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// RGB preview buffer pushed to the debug window.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,     // how wide the frame is on screen (pixels)
    pub height: usize,    // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>, // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u32; width * height],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_origin_is_clamped() {
        let r = Region::new(-4, -1, 10, 8);
        assert_eq!((r.x, r.y, r.width, r.height), (0, 0, 10, 8));
    }

    #[test]
    fn recentering_keeps_size_and_clamps() {
        let r = Region::new(10, 10, 40, 20);
        let moved = r.recentered(Point::new(25, 12));
        assert_eq!(moved, Region::new(15, 12, 40, 20));

        let clamped = r.recentered(Point::new(0, 0));
        assert_eq!(clamped, Region::new(0, 0, 40, 20));
    }

    #[test]
    fn truncate_goes_toward_zero() {
        assert_eq!(Point2f::new(2.9, -1.7).truncate(), Point::new(2, -1));
        assert_eq!(Point2f::new(19.9999, 2.5).round(), Point::new(20, 3));
    }
}
