use glam::{Mat4, Vec3};
use std::collections::HashSet;

use super::color::Rgb;
use crate::config::{OrbitConfig, ShellConfig};

/// Wireframe icosphere that spins about the vertical axis.
#[derive(Debug, Clone)]
pub struct Shell {
    vertices: Vec<Vec3>,
    edges: Vec<[u32; 2]>,
    spin: f32,
    rotation: f32,
    pub color: Rgb,
}

impl Shell {
    /// Icosahedron of `radius` with every face split into `(detail + 1)^2`
    /// triangles and pushed back onto the sphere.
    pub fn icosphere(radius: f32, detail: u32, spin: f32, color: Rgb) -> Self {
        let mut vertices: Vec<Vec3> = Vec::new();
        let mut edges: HashSet<(u32, u32)> = HashSet::new();

        let base = icosahedron();
        let n = detail + 1;

        for [a, b, c] in ICOSAHEDRON_FACES {
            let (a, b, c) = (base[a], base[b], base[c]);

            // Row i holds n - i + 1 points between the a-c and b-c edges.
            let mut rows: Vec<Vec<u32>> = Vec::with_capacity(n as usize + 1);
            for i in 0..=n {
                let t = i as f32 / n as f32;
                let left = a.lerp(c, t);
                let right = b.lerp(c, t);
                let cols = n - i;
                let row = (0..=cols)
                    .map(|j| {
                        let p = if cols == 0 {
                            left
                        } else {
                            left.lerp(right, j as f32 / cols as f32)
                        };
                        vertices.push(p.normalize() * radius);
                        (vertices.len() - 1) as u32
                    })
                    .collect();
                rows.push(row);
            }

            for i in 0..n as usize {
                for j in 0..rows[i].len() - 1 {
                    let (p, q, r) = (rows[i][j], rows[i][j + 1], rows[i + 1][j]);
                    for (u, v) in [(p, q), (q, r), (r, p)] {
                        edges.insert(edge_key(&vertices, u, v));
                    }
                }
            }
        }

        let mut edges: Vec<[u32; 2]> = edges.into_iter().map(|(u, v)| [u, v]).collect();
        edges.sort_unstable();

        Self {
            vertices,
            edges,
            spin,
            rotation: 0.0,
            color,
        }
    }

    pub fn spin(&mut self) {
        self.rotation += self.spin;
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn reset(&mut self) {
        self.rotation = 0.0;
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.rotation)
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }
}

/// Shared corners get duplicated per face, so edges are keyed on the
/// lowest index of the first vertex at the same position.
fn edge_key(vertices: &[Vec3], u: u32, v: u32) -> (u32, u32) {
    let canon = |i: u32| {
        let p = vertices[i as usize];
        vertices
            .iter()
            .position(|q| q.distance_squared(p) < 1e-6)
            .map_or(i, |k| k as u32)
    };
    let (u, v) = (canon(u), canon(v));
    (u.min(v), u.max(v))
}

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn icosahedron() -> [Vec3; 12] {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
}

/// Outer and inner shells around the orbits.
#[derive(Debug, Clone)]
pub struct ShellPair {
    pub outer: Shell,
    pub inner: Shell,
}

impl ShellPair {
    pub fn new(orbit: &OrbitConfig, config: &ShellConfig, outer: Rgb, inner: Rgb) -> Self {
        Self {
            outer: Shell::icosphere(
                orbit.radius * config.outer_radius_factor,
                config.outer_detail,
                config.outer_spin,
                outer,
            ),
            inner: Shell::icosphere(
                orbit.radius * config.inner_radius_factor,
                config.inner_detail,
                config.inner_spin,
                inner,
            ),
        }
    }

    pub fn spin(&mut self) {
        self.outer.spin();
        self.inner.spin();
    }

    pub fn set_colors(&mut self, outer: Rgb, inner: Rgb) {
        self.outer.color = outer;
        self.inner.color = inner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_icosahedron_has_thirty_edges() {
        let shell = Shell::icosphere(1.0, 0, 0.0, Rgb::WHITE);
        assert_eq!(shell.edges().len(), 30);
    }

    #[test]
    fn subdivision_multiplies_edges() {
        // Each level-n face carries 3n(n+1)/2 edges, shared edges counted once.
        let shell = Shell::icosphere(1.0, 1, 0.0, Rgb::WHITE);
        assert_eq!(shell.edges().len(), 120);
        let shell = Shell::icosphere(1.0, 2, 0.0, Rgb::WHITE);
        assert_eq!(shell.edges().len(), 270);
    }

    #[test]
    fn vertices_sit_on_the_sphere() {
        let shell = Shell::icosphere(4800.0, 1, 0.0, Rgb::WHITE);
        for v in shell.vertices() {
            assert!((v.length() - 4800.0).abs() < 0.5);
        }
    }

    #[test]
    fn pair_spins_in_opposite_directions() {
        let mut pair = ShellPair::new(
            &OrbitConfig::default(),
            &ShellConfig::default(),
            Rgb::WHITE,
            Rgb::WHITE,
        );
        pair.spin();
        pair.spin();
        assert!((pair.outer.rotation() - 0.001).abs() < 1e-7);
        assert!((pair.inner.rotation() + 0.004).abs() < 1e-7);
    }
}
