//! Douglas–Peucker simplification.

use glam::DVec2;

/// Drops points that deviate from the simplified path by at most `tolerance`.
///
/// Returns a subsequence of `points` that always keeps the first and last point.
/// Deviation is measured perpendicular to the infinite line through the chord
/// of each range. Ranges are processed from an explicit stack, so very long
/// paths cannot exhaust the call stack.
pub fn simplify(points: &[DVec2], tolerance: f64) -> Vec<DVec2> {
    assert!(tolerance >= 0.0, "tolerance must be non-negative, got {tolerance}");

    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut ranges = vec![(0, last)];
    while let Some((start, end)) = ranges.pop() {
        if end - start < 2 {
            continue;
        }

        let (index, distance) = farthest_from_chord(points, start, end);
        if distance > tolerance {
            keep[index] = true;
            // Left half on top, to walk the path in order
            ranges.push((index, end));
            ranges.push((start, index));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

/// Interior point of `start..=end` farthest from the chord, first one on ties.
fn farthest_from_chord(points: &[DVec2], start: usize, end: usize) -> (usize, f64) {
    let (a, b) = (points[start], points[end]);
    let mut best = (start, 0.0);

    for (i, &point) in points.iter().enumerate().take(end).skip(start + 1) {
        let distance = perpendicular_distance(point, a, b);
        if distance > best.1 {
            best = (i, distance);
        }
    }

    best
}

pub(crate) fn perpendicular_distance(point: DVec2, a: DVec2, b: DVec2) -> f64 {
    let direction = b - a;
    let length = direction.length();

    if length == 0.0 {
        // Closed chord: fall back to the distance to its single point
        return point.distance(a);
    }

    direction.perp_dot(point - a).abs() / length
}
