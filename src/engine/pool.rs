use glam::{Mat4, Vec3};
use log::info;
use rand::Rng;

use super::color::{Hsl, Rgb};
use super::delaunay;
use crate::config::FractureConfig;
use crate::error::EngineError;

/// Outline drawn over a fracture triangle; shares the owner's transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wireframe {
    pub color: Rgb,
}

/// One fracture triangle.
#[derive(Debug, Clone)]
pub struct SceneObject {
    /// Triangle corners in object space (z = 0 plane)
    pub vertices: [Vec3; 3],
    /// Fixed placement before the per-frame offset is applied
    pub translation: Vec3,
    /// Resting height along the lift axis
    pub base_depth: f32,
    pub color: Hsl,
    pub wireframe: Wireframe,
}

/// Arena of fracture triangles.
///
/// Membership and placement are fixed at construction. Only colours and the
/// per-object offsets change afterwards; other components refer to objects by
/// index.
#[derive(Debug, Clone)]
pub struct SceneObjectPool {
    objects: Vec<SceneObject>,
    offsets: Vec<f32>,
    rotation: f32,
    base_color: Hsl,
}

impl SceneObjectPool {
    /// Scatters `config.points` integer points over the fracture extent and
    /// turns their Delaunay triangulation into the pool.
    pub fn fracture<R: Rng>(
        config: &FractureConfig,
        base_color: Hsl,
        wireframe: Rgb,
        rng: &mut R,
    ) -> Result<Self, EngineError> {
        let width = config.width as i64;
        let height = config.height as i64;
        let points: Vec<[f64; 2]> = (0..config.points)
            .map(|_| [rng.random_range(0..width) as f64, rng.random_range(0..height) as f64])
            .collect();

        let triangles = delaunay::triangulate(&points);
        let tilt = config.angle / 90.0;
        let translation = Vec3::new(-config.width / 2.0, 0.0, tilt * (-config.width / 2.0));

        let objects: Vec<SceneObject> = triangles
            .iter()
            .enumerate()
            .map(|(i, tri)| {
                let corner = |k: usize| {
                    let p = points[tri[k]];
                    Vec3::new(p[0] as f32, p[1] as f32, 0.0)
                };
                SceneObject {
                    vertices: [corner(0), corner(1), corner(2)],
                    translation,
                    base_depth: stacked_depth(i, tilt, config.depth),
                    color: base_color,
                    wireframe: Wireframe { color: wireframe },
                }
            })
            .collect();

        info!(
            "Fracture pool: {} points -> {} triangles",
            config.points,
            objects.len()
        );

        Self::from_objects(objects, config.angle.to_radians(), base_color)
    }

    pub fn from_objects(
        objects: Vec<SceneObject>,
        rotation: f32,
        base_color: Hsl,
    ) -> Result<Self, EngineError> {
        if objects.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        let offsets = vec![0.0; objects.len()];
        Ok(Self {
            objects,
            offsets,
            rotation,
            base_color,
        })
    }

    /// Plain pool of `count` unit triangles, handy for driving the animators
    /// without a real scene.
    pub fn uniform(count: usize, base_color: Hsl) -> Result<Self, EngineError> {
        let objects = (0..count)
            .map(|i| SceneObject {
                vertices: [Vec3::ZERO, Vec3::X, Vec3::Y],
                translation: Vec3::new(i as f32, 0.0, 0.0),
                base_depth: 0.0,
                color: base_color,
                wireframe: Wireframe { color: Rgb::WHITE },
            })
            .collect();
        Self::from_objects(objects, 0.0, base_color)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn color(&self, index: usize) -> Hsl {
        self.objects[index].color
    }

    pub fn set_color(&mut self, index: usize, color: Hsl) {
        self.objects[index].color = color;
    }

    pub fn base_color(&self) -> Hsl {
        self.base_color
    }

    /// Recolours every object to the new base. Callers that track in-flight
    /// animations reapply their blend on the next frame.
    pub fn set_base_color(&mut self, color: Hsl) {
        self.base_color = color;
        for object in &mut self.objects {
            object.color = color;
        }
    }

    pub fn set_wireframe_color(&mut self, color: Rgb) {
        for object in &mut self.objects {
            object.wireframe.color = color;
        }
    }

    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    pub fn offsets_mut(&mut self) -> &mut [f32] {
        &mut self.offsets
    }

    /// Object-to-world transform including the current offset.
    pub fn model_matrix(&self, index: usize) -> Mat4 {
        let object = &self.objects[index];
        let lift = Vec3::Y * (object.base_depth + self.offsets[index]);
        Mat4::from_translation(object.translation + lift) * Mat4::from_rotation_x(self.rotation)
    }

    pub fn world_vertices(&self, index: usize) -> [Vec3; 3] {
        let model = self.model_matrix(index);
        self.objects[index]
            .vertices
            .map(|v| model.transform_point3(v))
    }
}

/// Cubic stacking that fans the floor away from the middle of the pool.
fn stacked_depth(index: usize, tilt: f32, depth: f32) -> f32 {
    -tilt * ((index as f32 - 50.0) / 4.0).powi(3) + depth
}
