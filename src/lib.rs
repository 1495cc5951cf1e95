pub mod attributes;
pub mod gpu;
pub mod mesh;
pub mod model;
pub mod shader;
pub mod texture;
pub mod vertex;
pub mod weld;

// Re-export commonly used items
pub use attributes::{AttributeKind, AttributeStore, FaceIndex, MissingAttribute};
pub use gpu::{GpuContext, GpuError, MeshBuffers, ModelBuffers};
pub use mesh::{IndexedMesh, LoadedTexture, Mesh, Model, TextureRef};
pub use model::{LoadError, LoadOptions, ModelLoader};
pub use shader::{ShaderError, ShaderSources, ShaderStage, StageSource};
pub use texture::{TextureCache, TextureData, TextureError, TextureFormat};
pub use vertex::Vertex;
pub use weld::{
  KeyAttributes,
  VertexInterner,
  VertexKey,
  WeldError,
  weld,
  weld_vertices,
  weld_with_hasher,
};
