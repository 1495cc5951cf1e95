use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Color given to vertices whose source file carries no vertex colors.
pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Interleaved vertex as it is laid out in the GPU vertex buffer.
///
/// Every attribute is always present; the ones missing from the source data
/// hold their defaults (zero normal, zero texture coordinate, [`DEFAULT_COLOR`]).
#[derive(
  vulkano::pipeline::graphics::vertex_input::Vertex,
  Pod,
  Zeroable,
  Clone,
  Copy,
  Debug,
  PartialEq,
)]
#[repr(C)]
pub struct Vertex {
  #[format(R32G32B32_SFLOAT)]
  pub position:  [f32; 3],
  #[format(R32G32B32_SFLOAT)]
  pub normal:    [f32; 3],
  #[format(R32G32B32_SFLOAT)]
  pub color:     [f32; 3],
  #[format(R32G32_SFLOAT)]
  pub tex_coord: [f32; 2],
}

impl Vertex {
  pub fn new(position: [f32; 3]) -> Self {
    Self {
      position,
      normal: [0.0; 3],
      color: DEFAULT_COLOR,
      tex_coord: [0.0; 2],
    }
  }

  pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
    self.normal = normal;
    self
  }

  pub fn with_color(mut self, color: [f32; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn with_tex_coord(mut self, tex_coord: [f32; 2]) -> Self {
    self.tex_coord = tex_coord;
    self
  }

  pub fn position_vec(&self) -> Vec3 {
    Vec3::from_array(self.position)
  }

  pub fn normal_vec(&self) -> Vec3 {
    Vec3::from_array(self.normal)
  }

  pub fn tex_coord_vec(&self) -> Vec2 {
    Vec2::from_array(self.tex_coord)
  }
}

impl Default for Vertex {
  fn default() -> Self {
    Self::new([0.0; 3])
  }
}
