//! Flat per-component attribute arrays and the per-corner indices into them.
//!
//! This is the shape the `.obj` parser hands back: positions, normals, colors
//! and texture coordinates stored as packed `f32` runs, plus one [`FaceIndex`]
//! per triangle corner. Every three consecutive face indices form a triangle.

use std::fmt;

use crate::vertex::Vertex;

/// Which vertex attribute an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
  Position,
  Normal,
  Color,
  TexCoord,
}

impl AttributeKind {
  /// Number of `f32` components per element.
  pub const fn stride(self) -> usize {
    match self {
      AttributeKind::Position | AttributeKind::Normal | AttributeKind::Color => 3,
      AttributeKind::TexCoord => 2,
    }
  }
}

impl fmt::Display for AttributeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AttributeKind::Position => f.write_str("position"),
      AttributeKind::Normal => f.write_str("normal"),
      AttributeKind::Color => f.write_str("color"),
      AttributeKind::TexCoord => f.write_str("texture coordinate"),
    }
  }
}

/// One triangle corner's references into an [`AttributeStore`].
///
/// Colors have no index of their own: `.obj` vertex colors are stored next to
/// the position and share its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceIndex {
  pub position:  u32,
  pub normal:    Option<u32>,
  pub tex_coord: Option<u32>,
}

impl FaceIndex {
  pub fn new(position: u32) -> Self {
    Self {
      position,
      normal: None,
      tex_coord: None,
    }
  }

  pub fn with_normal(mut self, normal: u32) -> Self {
    self.normal = Some(normal);
    self
  }

  pub fn with_tex_coord(mut self, tex_coord: u32) -> Self {
    self.tex_coord = Some(tex_coord);
    self
  }
}

/// A corner that could not be resolved because one of its indices points past
/// the end of the matching attribute array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingAttribute {
  pub kind:  AttributeKind,
  pub index: u32,
  /// Number of elements (not floats) available for `kind`.
  pub len:   usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
  pub positions:  Vec<f32>,
  pub normals:    Vec<f32>,
  pub colors:     Vec<f32>,
  pub tex_coords: Vec<f32>,
}

impl AttributeStore {
  pub fn new(positions: Vec<f32>) -> Self {
    Self {
      positions,
      ..Default::default()
    }
  }

  pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
    self.normals = normals;
    self
  }

  pub fn with_colors(mut self, colors: Vec<f32>) -> Self {
    self.colors = colors;
    self
  }

  pub fn with_tex_coords(mut self, tex_coords: Vec<f32>) -> Self {
    self.tex_coords = tex_coords;
    self
  }

  /// Copies the attribute arrays and per-corner indices out of a triangulated
  /// `tobj` mesh.
  ///
  /// `flip_v` turns OBJ texture coordinates (origin bottom-left) into Vulkan
  /// image coordinates (origin top-left).
  pub fn from_tobj(mesh: &tobj::Mesh, flip_v: bool) -> (Self, Vec<FaceIndex>) {
    let mut tex_coords = mesh.texcoords.clone();
    if flip_v {
      for uv in tex_coords.chunks_exact_mut(2) {
        uv[1] = 1.0 - uv[1];
      }
    }

    let store = Self {
      positions: mesh.positions.clone(),
      normals: mesh.normals.clone(),
      colors: mesh.vertex_color.clone(),
      tex_coords,
    };

    let faces = mesh
      .indices
      .iter()
      .enumerate()
      .map(|(corner, &position)| FaceIndex {
        position,
        normal: mesh.normal_indices.get(corner).copied(),
        tex_coord: mesh.texcoord_indices.get(corner).copied(),
      })
      .collect();

    (store, faces)
  }

  pub fn position_count(&self) -> usize {
    self.positions.len() / AttributeKind::Position.stride()
  }

  pub fn normal_count(&self) -> usize {
    self.normals.len() / AttributeKind::Normal.stride()
  }

  pub fn color_count(&self) -> usize {
    self.colors.len() / AttributeKind::Color.stride()
  }

  pub fn tex_coord_count(&self) -> usize {
    self.tex_coords.len() / AttributeKind::TexCoord.stride()
  }

  pub fn count(&self, kind: AttributeKind) -> usize {
    match kind {
      AttributeKind::Position => self.position_count(),
      AttributeKind::Normal => self.normal_count(),
      AttributeKind::Color => self.color_count(),
      AttributeKind::TexCoord => self.tex_coord_count(),
    }
  }

  pub fn position(&self, index: u32) -> Option<[f32; 3]> {
    fetch(&self.positions, index)
  }

  pub fn normal(&self, index: u32) -> Option<[f32; 3]> {
    fetch(&self.normals, index)
  }

  pub fn color(&self, index: u32) -> Option<[f32; 3]> {
    fetch(&self.colors, index)
  }

  pub fn tex_coord(&self, index: u32) -> Option<[f32; 2]> {
    fetch(&self.tex_coords, index)
  }

  /// Builds the vertex a corner refers to.
  ///
  /// Optional arrays that are empty are treated as absent and leave the
  /// attribute at its default, as does a corner without a normal or texture
  /// coordinate index. Any index into a non-empty array must be in range.
  pub fn resolve(&self, face: FaceIndex) -> Result<Vertex, MissingAttribute> {
    let position = self
      .position(face.position)
      .ok_or_else(|| self.missing(AttributeKind::Position, face.position))?;
    let mut vertex = Vertex::new(position);

    if !self.normals.is_empty() {
      if let Some(index) = face.normal {
        vertex.normal = self
          .normal(index)
          .ok_or_else(|| self.missing(AttributeKind::Normal, index))?;
      }
    }

    if !self.colors.is_empty() {
      vertex.color = self
        .color(face.position)
        .ok_or_else(|| self.missing(AttributeKind::Color, face.position))?;
    }

    if !self.tex_coords.is_empty() {
      if let Some(index) = face.tex_coord {
        vertex.tex_coord = self
          .tex_coord(index)
          .ok_or_else(|| self.missing(AttributeKind::TexCoord, index))?;
      }
    }

    Ok(vertex)
  }

  fn missing(&self, kind: AttributeKind, index: u32) -> MissingAttribute {
    MissingAttribute {
      kind,
      index,
      len: self.count(kind),
    }
  }
}

fn fetch<const N: usize>(data: &[f32], index: u32) -> Option<[f32; N]> {
  let start = usize::try_from(index).ok()?.checked_mul(N)?;
  let end = start.checked_add(N)?;
  data.get(start..end)?.try_into().ok()
}
