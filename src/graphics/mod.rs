pub mod engine;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use engine::{GraphicsEngine, SceneGeometry};
pub use shader::ShaderManager;
pub use vertex::{ParticleInstance, Vertex, VertexBuffer};
