//! Douglas-Peucker simplification and coordinate rounding.

use geo_types::Coord;

/// Simplify an ordered point sequence with the Douglas-Peucker algorithm.
///
/// Sequences of two points or fewer are returned unchanged. Closed rings have
/// a zero-length chord, which falls back to point-to-point distance.
pub fn douglas_peucker(points: &[Coord<f64>], tolerance: f64) -> Vec<Coord<f64>> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

fn mark_kept(points: &[Coord<f64>], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }

    let (split, distance) = (first + 1..last)
        .map(|i| (i, perpendicular_distance(points[i], points[first], points[last])))
        .fold((first, -1.0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    if distance > tolerance {
        keep[split] = true;
        mark_kept(points, first, split, tolerance, keep);
        mark_kept(points, split, last, tolerance, keep);
    }
}

/// Distance from `point` to the line through `start` and `end`
fn perpendicular_distance(point: Coord<f64>, start: Coord<f64>, end: Coord<f64>) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let chord = (dx * dx + dy * dy).sqrt();

    if chord == 0.0 {
        let px = point.x - start.x;
        let py = point.y - start.y;
        return (px * px + py * py).sqrt();
    }

    ((point.x - start.x) * dy - (point.y - start.y) * dx).abs() / chord
}

/// Round a value to `precision` decimal digits
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Round a coordinate and emit it as a `[lng, lat]` pair
pub fn round_coord(coord: Coord<f64>, precision: u32) -> [f64; 2] {
    [round_to(coord.x, precision), round_to(coord.y, precision)]
}
