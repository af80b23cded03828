// Manual eye-region locator: proposes a fixed-size window centered in the frame.
// Used by the demo (user puts their eye in the middle of the picture) and by tests.
// Any other locator (cascade, model) plugs into the tracker through `RegionLocator`.

use crate::config::LocatorConfig;
use crate::tracker::RegionLocator;
use crate::types::{Frame, Region};

pub struct CenterRegionLocator {
    width: i32,
    height: i32,
}

impl CenterRegionLocator {
    pub fn new(config: &LocatorConfig) -> Self {
        Self {
            width: config.region_width,
            height: config.region_height,
        }
    }
}

impl RegionLocator for CenterRegionLocator {
    /// Fails when the frame is smaller than the window.
    fn locate(&mut self, frame: &Frame) -> Option<Region> {
        let (fw, fh) = (frame.width() as i32, frame.height() as i32);
        if fw < self.width || fh < self.height {
            return None;
        }
        Some(Region::new(
            (fw - self.width) / 2,
            (fh - self.height) / 2,
            self.width,
            self.height,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::flat_frame;

    #[test]
    fn window_is_centered() {
        let mut locator = CenterRegionLocator::new(&LocatorConfig::default());
        let region = locator.locate(&flat_frame(640, 480, 0)).unwrap();
        assert_eq!(region, Region::new(272, 208, 96, 64));
        assert_eq!(region.barycenter().x, 320);
    }

    #[test]
    fn frame_smaller_than_window_is_not_found() {
        let mut locator = CenterRegionLocator::new(&LocatorConfig::default());
        assert_eq!(locator.locate(&flat_frame(64, 48, 0)), None);
    }
}
