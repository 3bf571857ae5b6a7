//! Extraction of a sub-path by relative distance.

use glam::DVec2;

use super::path_length;

/// Consecutive output points closer than this are merged.
pub const MIN_POINT_SPACING: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SliceError {
    #[error("cannot slice a polyline of {0} point(s)")]
    TooFewPoints(usize),

    #[error("cannot slice a polyline of zero length")]
    ZeroLength,
}

/// Part of `points` between `relative_from` and `relative_to` of its length.
///
/// The result starts and ends with points interpolated at the exact cuts and
/// keeps every original vertex in between. Points closer than
/// [`MIN_POINT_SPACING`] to their predecessor are dropped.
///
/// # Panics
///
/// When the bounds are outside `[0, 1]` or in the wrong order.
pub fn slice(
    points: &[DVec2],
    relative_from: f64,
    relative_to: f64,
) -> Result<Vec<DVec2>, SliceError> {
    assert!(
        (0.0..=1.0).contains(&relative_from)
            && (0.0..=1.0).contains(&relative_to)
            && relative_from <= relative_to,
        "invalid slice bounds {relative_from}..{relative_to}"
    );

    if points.len() < 2 {
        return Err(SliceError::TooFewPoints(points.len()));
    }

    let total = path_length(points);
    if total <= 0.0 {
        return Err(SliceError::ZeroLength);
    }

    let from = relative_from * total;
    let to = relative_to * total;

    let mut sliced = Vec::new();
    let mut travelled = 0.0;
    let mut reached_end = false;

    for segment in points.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let length = a.distance(b);
        if length == 0.0 {
            continue;
        }

        let end = travelled + length;
        let at = |distance: f64| a.lerp(b, ((distance - travelled) / length).clamp(0.0, 1.0));

        if sliced.is_empty() && from <= end {
            sliced.push(at(from));
        }

        if !sliced.is_empty() {
            if to <= end {
                sliced.push(at(to));
                reached_end = true;
                break;
            }
            sliced.push(b);
        }

        travelled = end;
    }

    if !reached_end {
        // Rounding left `to` a hair past the accumulated length
        if let Some(&last) = points.last() {
            sliced.push(last);
        }
    }

    Ok(dedup_close(sliced))
}

fn dedup_close(points: Vec<DVec2>) -> Vec<DVec2> {
    let mut kept: Vec<DVec2> = Vec::with_capacity(points.len());
    for point in points {
        if kept
            .last()
            .is_none_or(|last| last.distance(point) >= MIN_POINT_SPACING)
        {
            kept.push(point);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pts(coords: &[(f64, f64)]) -> Vec<DVec2> {
        coords.iter().map(|&(x, y)| DVec2::new(x, y)).collect()
    }

    fn track() -> Vec<DVec2> {
        pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0), (20.0, 30.0)])
    }

    #[test]
    fn test_full_slice_is_identity() {
        let line = track();
        assert_eq!(slice(&line, 0.0, 1.0).unwrap(), line);
    }

    #[test]
    fn test_interpolated_cuts() {
        // Total length is 50
        let sliced = slice(&track(), 0.1, 0.5).unwrap();
        assert_eq!(sliced, pts(&[(5.0, 0.0), (10.0, 0.0), (10.0, 10.0), (15.0, 10.0)]));
    }

    #[test]
    fn test_cut_inside_one_segment() {
        let sliced = slice(&track(), 0.62, 0.78).unwrap();
        assert_eq!(sliced.len(), 2);
        assert_abs_diff_eq!(sliced[0].y, 11.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sliced[1].y, 19.0, epsilon = 1e-9);
    }

    #[test]
    fn test_slice_length() {
        let line = track();
        let total = path_length(&line);

        for (a, b) in [(0.0, 0.3), (0.25, 0.75), (0.4, 0.41), (0.9, 1.0)] {
            let sliced = slice(&line, a, b).unwrap();
            assert_abs_diff_eq!(path_length(&sliced), (b - a) * total, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_halves_reassemble() {
        let line = track();
        let mut first = slice(&line, 0.0, 0.5).unwrap();
        let second = slice(&line, 0.5, 1.0).unwrap();

        assert_abs_diff_eq!(first.last().unwrap().distance(second[0]), 0.0, epsilon = 1e-9);
        first.extend_from_slice(&second[1..]);
        // Same path, with the cut point kept as an extra vertex
        assert_eq!(
            first,
            pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (15.0, 10.0), (20.0, 10.0), (20.0, 30.0)])
        );
        assert_abs_diff_eq!(path_length(&first), path_length(&line), epsilon = 1e-9);
    }

    #[test]
    fn test_empty_range_is_single_point() {
        let sliced = slice(&track(), 0.2, 0.2).unwrap();
        assert_eq!(sliced, pts(&[(10.0, 0.0)]));
    }

    #[test]
    fn test_merges_near_duplicates() {
        let line = pts(&[(0.0, 0.0), (0.0, 0.0), (4.0, 0.0), (4.00048828125, 0.0), (8.0, 0.0)]);
        let sliced = slice(&line, 0.0, 1.0).unwrap();
        assert_eq!(sliced, pts(&[(0.0, 0.0), (4.0, 0.0), (8.0, 0.0)]));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(slice(&[], 0.0, 1.0), Err(SliceError::TooFewPoints(0)));
        assert_eq!(slice(&pts(&[(1.0, 1.0)]), 0.0, 1.0), Err(SliceError::TooFewPoints(1)));
        assert_eq!(
            slice(&pts(&[(1.0, 1.0), (1.0, 1.0)]), 0.0, 1.0),
            Err(SliceError::ZeroLength)
        );
    }

    #[test]
    #[should_panic]
    fn test_reversed_bounds() {
        let _ = slice(&track(), 0.6, 0.4);
    }
}
