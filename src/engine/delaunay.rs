//! Delaunay triangulation of the fracture points, backed by `delaunator`.

use delaunator::Point;

fn signed_area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Triangulates `points` over their whole convex hull, returning index
/// triples into the input slice with counter-clockwise winding. Duplicate
/// points are skipped; fewer than three distinct, non-collinear points yield
/// an empty result.
pub fn triangulate(points: &[[f64; 2]]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }

    let input: Vec<Point> = points.iter().map(|p| Point { x: p[0], y: p[1] }).collect();
    let triangulation = delaunator::triangulate(&input);

    triangulation
        .triangles
        .chunks_exact(3)
        .filter_map(|t| {
            let (a, b, c) = (t[0], t[1], t[2]);
            let area = signed_area(points[a], points[b], points[c]);
            if area.abs() < 1e-9 {
                None
            } else if area > 0.0 {
                Some([a, b, c])
            } else {
                Some([a, c, b])
            }
        })
        .collect()
}
