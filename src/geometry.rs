//! Point/rectangle primitives and the algebraic circle fit.
//!
//! Everything here is pure. The only failures are empty input to
//! [`average`]/[`median_by_distance`] and degenerate input to [`fit_circle`].

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::types::{Point, Point2f, Region};

const SVD_MAX_ITERATIONS: usize = 1000;

/// Euclidean distance between two pixel positions, truncated to an integer.
pub fn distance(p1: Point, p2: Point) -> i32 {
    let dx = (p1.x - p2.x) as f64;
    let dy = (p1.y - p2.y) as f64;
    (dx * dx + dy * dy).sqrt() as i32
}

/// Euclidean distance between two floating points.
pub fn distance_f(p1: Point2f, p2: Point2f) -> f32 {
    let dx = p1.x - p2.x;
    let dy = p1.y - p2.y;
    (dx * dx + dy * dy).sqrt()
}

/// Geometric center of `rect`; integer division truncates.
pub fn barycenter(rect: &Region) -> Point {
    rect.barycenter()
}

/// Angle of the vector `start - end` in degrees, in (-180, 180].
pub fn angle_degrees(start: Point, end: Point) -> f64 {
    let dy = (start.y - end.y) as f64;
    let dx = (start.x - end.x) as f64;
    dy.atan2(dx).to_degrees()
}

/// Arithmetic mean of `points`.
pub fn average(points: &[Point2f]) -> Result<Point2f> {
    if points.is_empty() {
        return Err(Error::InvalidArgument(
            "cannot average an empty point set".into(),
        ));
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Ok(Point2f::new(sx / n, sy / n))
}

/// Median by distance rank around `reference`.
///
/// Points are ordered by ascending distance to `reference` (ties keep input
/// order). An odd count returns the middle element as-is; an even count
/// returns the mean of the two middle elements.
pub fn median_by_distance(reference: Point2f, points: &[Point2f]) -> Result<Point2f> {
    if points.is_empty() {
        return Err(Error::InvalidArgument(
            "cannot take the median of an empty point set".into(),
        ));
    }
    let mut ranked = points.to_vec();
    // sort_by is stable, so equal distances stay in input order.
    ranked.sort_by(|a, b| distance_f(reference, *a).total_cmp(&distance_f(reference, *b)));

    let n = ranked.len();
    if n % 2 == 0 {
        let p1 = ranked[n / 2 - 1];
        let p2 = ranked[n / 2];
        Ok(Point2f::new((p1.x + p2.x) / 2.0, (p1.y + p2.y) / 2.0))
    } else {
        Ok(ranked[n / 2])
    }
}

/// Heuristic: are the pairwise angles between `points` close to multiples of 90°?
///
/// A pair violates when `(|angle| + tolerance) mod 90 > 2 * tolerance`.
/// Returns false as soon as more than two pairs violate. The modulo window is
/// asymmetric around 0° and 90°, so treat this as a coarse filter.
pub fn is_approximately_rectangular(points: &[Point], tolerance: f64) -> bool {
    let mut errors = 0;
    for (i, &a) in points.iter().enumerate() {
        for &b in &points[i + 1..] {
            let angle = angle_degrees(a, b);
            if (angle.abs() + tolerance) % 90.0 > 2.0 * tolerance {
                errors += 1;
            }
            if errors > 2 {
                return false;
            }
        }
    }
    true
}

/// Algebraic least-squares circle fit.
///
/// Each point contributes a row `[2x, 2y, 1]` to `M` and `x² + y²` to `v`;
/// `M·p ≈ v` is solved by SVD for `p = (x0, y0, c)`. The circle has center
/// `(x0, y0)` and radius `sqrt(x0² + y0² + c)`.
///
/// Fails with [`Error::DegenerateInput`] for fewer than 3 points, non-finite
/// coordinates, collinear points, or a negative radicand.
pub fn fit_circle(points: &[Point2f]) -> Result<(Point2f, f32)> {
    let n = points.len();
    if n < 3 {
        return Err(Error::DegenerateInput(format!(
            "circle fit needs at least 3 points, got {n}"
        )));
    }
    if let Some(p) = points.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::DegenerateInput(format!(
            "circle fit point ({}, {}) is not finite",
            p.x, p.y
        )));
    }

    let m = DMatrix::<f64>::from_fn(n, 3, |row, col| {
        let p = points[row];
        match col {
            0 => 2.0 * p.x as f64,
            1 => 2.0 * p.y as f64,
            _ => 1.0,
        }
    });
    let v = DVector::<f64>::from_iterator(
        n,
        points
            .iter()
            .map(|p| (p.x as f64).powi(2) + (p.y as f64).powi(2)),
    );

    // `solve` needs both U and V^T; the iteration cap keeps a bad matrix from spinning.
    let svd = m
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| Error::DegenerateInput("circle fit SVD did not converge".into()))?;
    let eps = svd.singular_values.max() * 1e-9;
    if svd.rank(eps) < 3 {
        return Err(Error::DegenerateInput(
            "circle fit points are collinear or coincident".into(),
        ));
    }
    let pars = svd
        .solve(&v, eps)
        .map_err(|e| Error::DegenerateInput(format!("circle fit solve failed: {e}")))?;

    let (x0, y0, c) = (pars[0], pars[1], pars[2]);
    let radicand = x0 * x0 + y0 * y0 + c;
    if !radicand.is_finite() || radicand < 0.0 {
        return Err(Error::DegenerateInput(format!(
            "imaginary radius (squared radius {radicand})"
        )));
    }

    Ok((Point2f::new(x0 as f32, y0 as f32), radicand.sqrt() as f32))
}
