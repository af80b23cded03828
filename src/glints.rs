// Glint detection inside one cropped eye region.
// Output: glint centers in the crop's own coordinates, in contour discovery order.
// An empty result is normal (no glints visible); the tracker counts it as a miss.
use std::f64::consts::PI;

use image::Luma;
use imageproc::contours::{BorderType, find_contours};
use imageproc::region_labelling::{Connectivity, connected_components};
use imageproc::stats::histogram;
use log::debug;

use crate::config::GlintConfig;
use crate::geometry::distance;
use crate::types::{Frame, GlintCandidate, Point};

/// Adaptive-threshold glint finder. Holds only its configuration, so one
/// detector can be reused across frames; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct GlintDetector {
    config: GlintConfig,
}

/// Raster moments of one connected blob.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    m00: f64,
    m10: f64,
    m01: f64,
}

impl GlintDetector {
    pub fn new(config: GlintConfig) -> Self {
        Self { config }
    }

    /// Bright-pixel budget for two glints of the nominal diameter, with an 8× margin.
    pub fn expected_area(&self) -> f64 {
        let d = self.config.glint_diameter as f64;
        d * d * PI * 8.0
    }

    /// Pick the intensity cut so that roughly `expected_area` pixels survive.
    /// Scans from 255 downward; the first level whose cumulative count exceeds
    /// the budget wins. If none does, only the brightest level (255) survives.
    pub fn threshold_for(&self, frame: &Frame) -> u8 {
        let hist = histogram(frame);
        let bins = &hist.channels[0];
        let budget = self.expected_area();

        let mut cumulative = 0u64;
        for level in (0..bins.len()).rev() {
            cumulative += bins[level] as u64;
            if cumulative as f64 > budget {
                return level as u8;
            }
        }
        u8::MAX
    }

    /// Glint centers only; see [`GlintDetector::detect_candidates`].
    pub fn detect(&self, frame: &Frame) -> Vec<Point> {
        self.detect_candidates(frame)
            .into_iter()
            .map(|c| c.center)
            .collect()
    }

    /// Run the full pipeline on one region and return the accepted blobs.
    pub fn detect_candidates(&self, frame: &Frame) -> Vec<GlintCandidate> {
        if frame.width() == 0 || frame.height() == 0 {
            return Vec::new();
        }

        // 1) Histogram-driven threshold, recomputed for every frame (lighting changes).
        let threshold = self.threshold_for(frame);

        // 2) "To-zero" threshold on a working copy: dim pixels go to 0,
        //    bright ones keep their intensity.
        let binarized = threshold_to_zero(frame, threshold);

        // 3) Outer borders only; contours nested in holes are ignored.
        //    Labelling runs on the support mask so a glint's intensity gradient
        //    stays one component.
        let support = support_mask(&binarized);
        let contours = find_contours::<i32>(&support);
        let labels = connected_components(&support, Connectivity::Eight, Luma([0u8]));
        let moments = blob_moments(&labels);

        // 4) One candidate per external contour, sized by its blob's raster area.
        let mut candidates = Vec::new();
        let mut external = 0usize;
        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        {
            external += 1;
            let Some(start) = contour.points.first() else {
                continue;
            };
            let label = labels.get_pixel(start.x as u32, start.y as u32)[0] as usize;
            let Some(m) = moments.get(label).copied() else {
                continue;
            };

            if !(m.m00 > 0.0 && m.m00 < self.config.area_upper_bound) {
                continue; // oversized (or empty) blob
            }

            let cx = (m.m10 / m.m00) as i32;
            let cy = (m.m01 / m.m00) as i32;
            // Blobs whose centroid sits on the crop's top/left border are dropped.
            if cx > 0 && cy > 0 {
                candidates.push(GlintCandidate {
                    center: Point::new(cx, cy),
                    area: m.m00,
                });
            }
        }

        debug!(
            "glints: threshold={threshold} external_contours={external} accepted={}",
            candidates.len()
        );

        // 5) Optional inter-glint distance filter.
        if self.config.pair_filter {
            candidates = self.filter_pairs(candidates);
        }
        candidates
    }

    /// Keep candidates that belong to at least one pair whose distance lies in
    /// `[min_pair_distance, max_pair_distance]`. Two or fewer candidates pass unchanged.
    fn filter_pairs(&self, candidates: Vec<GlintCandidate>) -> Vec<GlintCandidate> {
        if candidates.len() <= 2 {
            return candidates;
        }

        let (lo, hi) = (self.config.min_pair_distance, self.config.max_pair_distance);
        let mut paired = vec![false; candidates.len()];
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                let d = distance(candidates[i].center, candidates[j].center) as f64;
                if d >= lo && d <= hi {
                    paired[i] = true;
                    paired[j] = true;
                }
            }
        }

        let kept: Vec<GlintCandidate> = candidates
            .into_iter()
            .zip(paired)
            .filter_map(|(c, ok)| ok.then_some(c))
            .collect();
        debug!("glints: {} candidates left after pair filter", kept.len());
        kept
    }
}

/// Zero every pixel below `threshold`; keep the rest unchanged.
fn threshold_to_zero(frame: &Frame, threshold: u8) -> Frame {
    let mut out = frame.clone();
    for px in out.pixels_mut() {
        if px[0] < threshold {
            px[0] = 0;
        }
    }
    out
}

/// 255 wherever `frame` is non-zero.
fn support_mask(frame: &Frame) -> Frame {
    let mut mask = frame.clone();
    for px in mask.pixels_mut() {
        if px[0] > 0 {
            px[0] = u8::MAX;
        }
    }
    mask
}

/// Accumulate m00/m10/m01 per component label (index = label, 0 = background).
fn blob_moments(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<Moments> {
    let mut moments: Vec<Moments> = Vec::new();
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px[0] as usize;
        if label == 0 {
            continue;
        }
        if moments.len() <= label {
            moments.resize(label + 1, Moments::default());
        }
        let m = &mut moments[label];
        m.m00 += 1.0;
        m.m10 += x as f64;
        m.m01 += y as f64;
    }
    moments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{flat_frame, glint_frame, paint_blob};

    fn detector() -> GlintDetector {
        GlintDetector::new(GlintConfig::default())
    }

    #[test]
    fn expected_area_uses_eight_fold_margin() {
        let area = detector().expected_area();
        assert!((area - 16.0 * PI * 8.0).abs() < 1e-9);
    }

    #[test]
    fn two_separated_glints_are_found() {
        let frame = glint_frame(60, 40, &[(20, 15), (40, 15)]);
        let glints = detector().detect(&frame);
        assert_eq!(glints, vec![Point::new(20, 15), Point::new(40, 15)]);
    }

    #[test]
    fn candidates_report_pixel_area() {
        let frame = glint_frame(60, 40, &[(20, 15), (40, 15)]);
        let candidates = detector().detect_candidates(&frame);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.area == 9.0));
    }

    #[test]
    fn oversized_blob_is_rejected() {
        let mut frame = flat_frame(60, 40, 0);
        paint_blob(&mut frame, 20, 10, 5, 5, 255);
        assert!(detector().detect(&frame).is_empty());
    }

    #[test]
    fn area_bound_is_configurable() {
        let mut frame = flat_frame(60, 40, 0);
        paint_blob(&mut frame, 20, 10, 5, 5, 255);
        let detector = GlintDetector::new(GlintConfig {
            area_upper_bound: 30.0,
            ..GlintConfig::default()
        });
        assert_eq!(detector.detect(&frame), vec![Point::new(22, 12)]);
    }

    #[test]
    fn glint_with_intensity_falloff_is_one_blob() {
        let mut frame = flat_frame(60, 40, 0);
        paint_blob(&mut frame, 19, 14, 3, 3, 200);
        frame.put_pixel(20, 15, Luma([255]));
        assert_eq!(detector().detect(&frame), vec![Point::new(20, 15)]);
    }

    #[test]
    fn dark_frame_yields_nothing() {
        assert!(detector().detect(&flat_frame(40, 30, 0)).is_empty());
    }

    #[test]
    fn threshold_tracks_bright_pixel_budget() {
        let mut frame = flat_frame(100, 100, 10);
        paint_blob(&mut frame, 0, 0, 50, 10, 200); // 500 bright pixels > 402 budget
        assert_eq!(detector().threshold_for(&frame), 200);
    }

    #[test]
    fn threshold_defaults_to_max_when_budget_never_exceeded() {
        let frame = flat_frame(10, 10, 255); // 100 pixels < 402 budget
        assert_eq!(detector().threshold_for(&frame), 255);
    }

    #[test]
    fn background_below_threshold_is_discarded() {
        let mut frame = flat_frame(80, 60, 40);
        paint_blob(&mut frame, 9, 9, 3, 3, 255);
        paint_blob(&mut frame, 24, 9, 3, 3, 255);
        // A large mid-bright patch pulls the threshold down to 120 but is too big to pass.
        paint_blob(&mut frame, 45, 40, 30, 15, 120);

        let d = detector();
        assert_eq!(d.threshold_for(&frame), 120);
        assert_eq!(d.detect(&frame), vec![Point::new(10, 10), Point::new(25, 10)]);
    }

    #[test]
    fn order_follows_raster_discovery() {
        let frame = glint_frame(60, 40, &[(10, 20), (40, 5)]);
        assert_eq!(
            detector().detect(&frame),
            vec![Point::new(40, 5), Point::new(10, 20)]
        );
    }

    #[test]
    fn unpaired_third_glint_is_dropped() {
        let frame = glint_frame(80, 60, &[(10, 10), (20, 10), (70, 50)]);
        assert_eq!(
            detector().detect(&frame),
            vec![Point::new(10, 10), Point::new(20, 10)]
        );
    }

    #[test]
    fn pair_filter_can_be_disabled() {
        let frame = glint_frame(80, 60, &[(10, 10), (20, 10), (70, 50)]);
        let detector = GlintDetector::new(GlintConfig {
            pair_filter: false,
            ..GlintConfig::default()
        });
        assert_eq!(detector.detect(&frame).len(), 3);
    }

    #[test]
    fn two_far_glints_skip_the_pair_filter() {
        let frame = glint_frame(120, 40, &[(10, 10), (100, 10)]);
        assert_eq!(detector().detect(&frame).len(), 2);
    }

    #[test]
    fn glint_on_left_border_is_dropped() {
        let mut frame = flat_frame(60, 40, 0);
        paint_blob(&mut frame, 0, 10, 1, 3, 255);
        paint_blob(&mut frame, 29, 9, 3, 3, 255);
        assert_eq!(detector().detect(&frame), vec![Point::new(30, 10)]);
    }
}
