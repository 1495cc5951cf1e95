use std::path::PathBuf;
use std::sync::Arc;

use glam::Vec3;

use crate::texture::TextureData;
use crate::vertex::Vertex;

/// Unique vertices plus a triangle list indexing into them, three indices per
/// triangle in face order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
  pub vertices: Vec<Vertex>,
  pub indices:  Vec<u32>,
}

impl IndexedMesh {
  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn vertex_count(&self) -> usize {
    self.vertices.len()
  }

  pub fn index_count(&self) -> usize {
    self.indices.len()
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  pub fn vertex_bytes(&self) -> &[u8] {
    bytemuck::cast_slice(&self.vertices)
  }

  pub fn index_bytes(&self) -> &[u8] {
    bytemuck::cast_slice(&self.indices)
  }

  /// Vertices of each triangle, in index order.
  ///
  /// Yields nothing for an index that is out of range.
  pub fn triangles(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
    self.indices.chunks_exact(3).filter_map(|tri| {
      Some([
        *self.vertices.get(tri[0] as usize)?,
        *self.vertices.get(tri[1] as usize)?,
        *self.vertices.get(tri[2] as usize)?,
      ])
    })
  }

  /// Axis-aligned bounds of all vertex positions, `None` for an empty mesh.
  pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
    let mut positions = self.vertices.iter().map(Vertex::position_vec);
    let first = positions.next()?;
    Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
  }

  /// Fraction of corners that reused an existing vertex.
  pub fn reuse_ratio(&self) -> f32 {
    if self.indices.is_empty() {
      return 0.0;
    }
    1.0 - self.vertices.len() as f32 / self.indices.len() as f32
  }
}

/// A welded shape from a model file.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
  pub name:        String,
  pub geometry:    IndexedMesh,
  /// Index into the model's material list, if the shape has one.
  pub material_id: Option<usize>,
}

/// Diffuse texture referenced by a model's materials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
  /// Name as written in the material file.
  pub name: String,
  /// `name` resolved against the model's directory.
  pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadedTexture {
  pub reference: TextureRef,
  pub data:      Arc<TextureData>,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
  pub name:     String,
  pub meshes:   Vec<Mesh>,
  pub textures: Vec<LoadedTexture>,
}

impl Model {
  pub fn vertex_count(&self) -> usize {
    self.meshes.iter().map(|m| m.geometry.vertex_count()).sum()
  }

  pub fn index_count(&self) -> usize {
    self.meshes.iter().map(|m| m.geometry.index_count()).sum()
  }

  pub fn triangle_count(&self) -> usize {
    self.meshes.iter().map(|m| m.geometry.triangle_count()).sum()
  }

  pub fn mesh(&self, name: &str) -> Option<&Mesh> {
    self.meshes.iter().find(|m| m.name == name)
  }
}
