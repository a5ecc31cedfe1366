//! Polygon simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Reduces vertex count in closed contours by removing vertices that are
//! within a given tolerance of the chord between their neighbours.
//!
//! A closed contour has no natural endpoints, so it is split into two
//! open chains at its first vertex and the vertex farthest from it; each
//! chain is simplified independently and the two are stitched back
//! together. Surviving vertices are a subset of the input, so integer
//! coordinates stay integer.

use crate::types::{Point, Polygon};

/// Simplify a single closed polygon.
///
/// Every removed vertex lies within `tolerance` pixels of the simplified
/// outline. A tolerance of 0.0 only removes exactly collinear vertices.
///
/// The result may have fewer than 3 vertices (e.g. a contour traced
/// around a one-pixel-wide line); callers that emit paths should drop
/// those, as [`simplify_polygons`] does.
#[must_use = "returns the simplified polygon"]
pub fn simplify_closed(polygon: &Polygon, tolerance: f64) -> Polygon {
    let points = polygon.points();
    if points.len() < 3 {
        return polygon.clone();
    }

    let first = points[0];
    let far = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, distance_squared(*p, first)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0;
    if far == 0 {
        // Every vertex coincides with the first.
        return Polygon::new(vec![first]);
    }

    // Close the ring so the second chain ends back at the first vertex.
    let mut ring = points.to_vec();
    ring.push(first);
    let closing = ring.len() - 1;

    let mut kept = vec![false; ring.len()];
    kept[0] = true;
    kept[far] = true;

    rdp_recurse(&ring, 0, far, tolerance, &mut kept);
    rdp_recurse(&ring, far, closing, tolerance, &mut kept);

    let simplified: Vec<Point> = ring[..closing]
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    Polygon::new(simplified)
}

/// Simplify multiple polygons, dropping any left with fewer than 3 vertices.
#[must_use = "returns the simplified polygons"]
pub fn simplify_polygons(polygons: &[Polygon], tolerance: f64) -> Vec<Polygon> {
    polygons
        .iter()
        .map(|pg| simplify_closed(pg, tolerance))
        .filter(Polygon::is_valid)
        .collect()
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

fn distance_squared(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    dx.mul_add(dx, dy * dy)
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = (f64::from(p.x), f64::from(p.y));
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let dx = f64::from(b.x) - ax;
    let dy = f64::from(b.y) - ay;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return distance_squared(p, a).sqrt();
    }

    let cross = dx.mul_add(ay - py, -(dy * (ax - px)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon(points: &[(u32, u32)]) -> Polygon {
        Polygon::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    /// Border pixels of a `w` x `h` rectangle at the origin, clockwise
    /// from the top-left, the way border following emits them.
    fn rectangle_border(w: u32, h: u32) -> Polygon {
        let mut pts = Vec::new();
        for x in 0..w {
            pts.push((x, 0));
        }
        for y in 1..h {
            pts.push((w - 1, y));
        }
        for x in (0..w - 1).rev() {
            pts.push((x, h - 1));
        }
        for y in (1..h - 1).rev() {
            pts.push((0, y));
        }
        polygon(&pts)
    }

    #[test]
    fn empty_polygon_unchanged() {
        let pg = Polygon::new(vec![]);
        assert!(simplify_closed(&pg, 1.0).is_empty());
    }

    #[test]
    fn two_points_unchanged() {
        let pg = polygon(&[(0, 0), (10, 0)]);
        assert_eq!(simplify_closed(&pg, 1.0).len(), 2);
    }

    #[test]
    fn rectangle_border_collapses_to_corners() {
        let result = simplify_closed(&rectangle_border(50, 100), 1.5);
        assert_eq!(
            result,
            polygon(&[(0, 0), (49, 0), (49, 99), (0, 99)]),
        );
    }

    #[test]
    fn zero_tolerance_keeps_corners_drops_collinear() {
        let result = simplify_closed(&rectangle_border(5, 5), 0.0);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn staircase_within_tolerance_is_straightened() {
        // A one-pixel staircase diagonal deviates at most ~0.7px.
        let pg = polygon(&[(0, 0), (1, 0), (1, 1), (2, 1), (2, 2), (3, 2), (3, 3), (0, 3)]);
        let result = simplify_closed(&pg, 1.5);
        assert!(result.len() < pg.len());
        assert!(result.is_valid());
    }

    #[test]
    fn notch_larger_than_tolerance_is_kept() {
        // Square with a 4px deep notch cut into the top edge.
        let pg = polygon(&[
            (0, 0),
            (4, 0),
            (5, 4),
            (6, 0),
            (10, 0),
            (10, 10),
            (0, 10),
        ]);
        let result = simplify_closed(&pg, 1.5);
        assert!(result.points().contains(&Point::new(5, 4)));
    }

    #[test]
    fn thin_line_contour_degenerates() {
        // Border following around a one-pixel-wide horizontal run goes
        // out and back along the same row.
        let pg = polygon(&[(0, 0), (1, 0), (2, 0), (3, 0), (2, 0), (1, 0)]);
        let result = simplify_closed(&pg, 1.5);
        assert!(!result.is_valid());
        assert!(simplify_polygons(&[pg], 1.5).is_empty());
    }

    #[test]
    fn coincident_points_collapse_to_one() {
        let pg = polygon(&[(3, 3), (3, 3), (3, 3)]);
        assert_eq!(simplify_closed(&pg, 1.0).len(), 1);
    }

    #[test]
    fn simplification_is_deterministic() {
        let pg = rectangle_border(13, 7);
        assert_eq!(simplify_closed(&pg, 1.5), simplify_closed(&pg, 1.5));
    }

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(Point::new(1, 3), Point::new(0, 0), Point::new(2, 0));
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_diagonal_segment() {
        // Point (2, 0) is 2 / sqrt(2) from the line y = x.
        let d = perpendicular_distance(Point::new(2, 0), Point::new(0, 0), Point::new(4, 4));
        let expected = 2.0 / 2.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}");
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(Point::new(3, 4), Point::new(0, 0), Point::new(0, 0));
        assert!((d - 5.0).abs() < 1e-10);
    }
}
