//! Vertex welding: turns a per-corner attribute stream into a unique vertex
//! list plus a triangle index list.
//!
//! Each corner is resolved into a [`Vertex`], looked up in a map keyed by the
//! tracked attributes of that vertex, and either reuses the index of the first
//! equal vertex or appends a new one. The map is only ever queried, so the
//! output order depends on the input order alone and never on the hasher.
//!
//! # Example
//! ```
//! use meshweld::{AttributeStore, FaceIndex, KeyAttributes, weld};
//!
//! let store = AttributeStore::new(vec![
//!   0.0, 0.0, 0.0,
//!   1.0, 0.0, 0.0,
//!   1.0, 1.0, 0.0,
//!   0.0, 1.0, 0.0,
//! ]);
//! let faces = [0, 1, 2, 0, 2, 3].map(FaceIndex::new);
//!
//! let mesh = weld(&store, &faces, KeyAttributes::all()).unwrap();
//! assert_eq!(mesh.vertices.len(), 4);
//! assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
//! ```

use std::collections::HashMap;
use std::collections::hash_map::{Entry, RandomState};
use std::hash::BuildHasher;

use bitflags::bitflags;

use crate::attributes::{AttributeKind, AttributeStore, FaceIndex};
use crate::mesh::IndexedMesh;
use crate::vertex::Vertex;

bitflags! {
  /// Vertex attributes that take part in the welding key.
  ///
  /// Position is always part of the key. An attribute left out of the key is
  /// ignored when comparing vertices: the first vertex seen wins and later
  /// corners that differ only in that attribute reuse its index.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct KeyAttributes: u8 {
    const NORMAL = 1 << 0;
    const COLOR = 1 << 1;
    const TEX_COORD = 1 << 2;
  }
}

impl Default for KeyAttributes {
  fn default() -> Self {
    Self::all()
  }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum WeldError {
  #[error(
    "triangle {triangle} corner {corner}: {kind} index {index} is out of range (have {len})"
  )]
  IndexOutOfRange {
    triangle: usize,
    corner:   usize,
    kind:     AttributeKind,
    index:    u32,
    len:      usize,
  },
  #[error("face list has {corners} corners, which is not a whole number of triangles")]
  IncompleteTriangle { corners: usize },
  #[error("mesh has more unique vertices than a 32-bit index can address")]
  TooManyVertices,
}

/// Hashable identity of a vertex under a given [`KeyAttributes`] set.
///
/// Components are compared by bit pattern after folding `-0.0` into `0.0`, so
/// value-equal zeros collapse while `NaN` stays equal to itself. Untracked
/// attributes are zeroed out before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexKey {
  position:  [u32; 3],
  normal:    [u32; 3],
  color:     [u32; 3],
  tex_coord: [u32; 2],
}

impl VertexKey {
  pub fn new(vertex: &Vertex, attributes: KeyAttributes) -> Self {
    Self {
      position:  canonical(vertex.position),
      normal:    tracked(attributes, KeyAttributes::NORMAL, vertex.normal),
      color:     tracked(attributes, KeyAttributes::COLOR, vertex.color),
      tex_coord: tracked(attributes, KeyAttributes::TEX_COORD, vertex.tex_coord),
    }
  }
}

fn canonical<const N: usize>(components: [f32; N]) -> [u32; N] {
  // -0.0 + 0.0 == +0.0, every other value is unchanged.
  components.map(|c| (c + 0.0).to_bits())
}

fn tracked<const N: usize>(
  attributes: KeyAttributes,
  flag: KeyAttributes,
  components: [f32; N],
) -> [u32; N] {
  if attributes.contains(flag) {
    canonical(components)
  } else {
    [0; N]
  }
}

/// Interns vertices and records the triangle index stream.
///
/// The hashing policy is the `S` type parameter; pass any [`BuildHasher`] to
/// [`VertexInterner::with_hasher`]. It only affects lookup speed.
#[derive(Debug, Clone)]
pub struct VertexInterner<S = RandomState> {
  attributes: KeyAttributes,
  lookup:     HashMap<VertexKey, u32, S>,
  vertices:   Vec<Vertex>,
  indices:    Vec<u32>,
}

impl VertexInterner<RandomState> {
  pub fn new(attributes: KeyAttributes) -> Self {
    Self::with_hasher(attributes, RandomState::new())
  }
}

impl<S: BuildHasher> VertexInterner<S> {
  pub fn with_hasher(attributes: KeyAttributes, hasher: S) -> Self {
    Self {
      attributes,
      lookup: HashMap::with_hasher(hasher),
      vertices: Vec::new(),
      indices: Vec::new(),
    }
  }

  pub fn attributes(&self) -> KeyAttributes {
    self.attributes
  }

  pub fn vertices(&self) -> &[Vertex] {
    &self.vertices
  }

  pub fn indices(&self) -> &[u32] {
    &self.indices
  }

  pub fn reserve(&mut self, corners: usize) {
    self.indices.reserve(corners);
  }

  /// Returns the index of the first vertex equal to `vertex` under the key,
  /// appending `vertex` if there is none yet. Does not touch the index stream.
  pub fn intern(&mut self, vertex: Vertex) -> Result<u32, WeldError> {
    match self.lookup.entry(VertexKey::new(&vertex, self.attributes)) {
      Entry::Occupied(slot) => Ok(*slot.get()),
      Entry::Vacant(slot) => {
        let index = u32::try_from(self.vertices.len()).map_err(|_| WeldError::TooManyVertices)?;
        self.vertices.push(vertex);
        slot.insert(index);
        Ok(index)
      }
    }
  }

  /// Interns one triangle corner and appends its index to the index stream.
  pub fn push_corner(&mut self, vertex: Vertex) -> Result<u32, WeldError> {
    let index = self.intern(vertex)?;
    self.indices.push(index);
    Ok(index)
  }

  /// Resolves and pushes every corner of `faces`.
  ///
  /// Triangle numbers in errors count from the first triangle of this call.
  /// Nothing is pushed when `faces` is not a whole number of triangles or any
  /// corner fails to resolve.
  pub fn push_faces(
    &mut self,
    store: &AttributeStore,
    faces: &[FaceIndex],
  ) -> Result<(), WeldError> {
    if faces.len() % 3 != 0 {
      return Err(WeldError::IncompleteTriangle {
        corners: faces.len(),
      });
    }

    let corners = faces
      .iter()
      .enumerate()
      .map(|(i, &face)| {
        store
          .resolve(face)
          .map_err(|missing| WeldError::IndexOutOfRange {
            triangle: i / 3,
            corner:   i % 3,
            kind:     missing.kind,
            index:    missing.index,
            len:      missing.len,
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    self.reserve(corners.len());
    let vertices_before = self.vertices.len();
    let indices_before = self.indices.len();
    for vertex in corners {
      if let Err(err) = self.push_corner(vertex) {
        self.truncate(vertices_before, indices_before);
        return Err(err);
      }
    }
    Ok(())
  }

  fn truncate(&mut self, vertices: usize, indices: usize) {
    self.vertices.truncate(vertices);
    self.indices.truncate(indices);
    self.lookup.retain(|_, index| (*index as usize) < vertices);
  }

  pub fn finish(self) -> Result<IndexedMesh, WeldError> {
    if self.indices.len() % 3 != 0 {
      return Err(WeldError::IncompleteTriangle {
        corners: self.indices.len(),
      });
    }
    Ok(IndexedMesh {
      vertices: self.vertices,
      indices:  self.indices,
    })
  }
}

/// Welds a triangulated face list into an [`IndexedMesh`] using the default
/// hasher.
pub fn weld(
  store: &AttributeStore,
  faces: &[FaceIndex],
  attributes: KeyAttributes,
) -> Result<IndexedMesh, WeldError> {
  weld_with_hasher(store, faces, attributes, RandomState::new())
}

pub fn weld_with_hasher<S: BuildHasher>(
  store: &AttributeStore,
  faces: &[FaceIndex],
  attributes: KeyAttributes,
  hasher: S,
) -> Result<IndexedMesh, WeldError> {
  let mut interner = VertexInterner::with_hasher(attributes, hasher);
  interner.push_faces(store, faces)?;
  interner.finish()
}

/// Re-welds an already resolved vertex stream, one entry per corner.
///
/// Feeding the vertices of a welded mesh back in yields the same vertices in
/// the same order with the identity index mapping. Only the number of unique
/// vertices is bounded here; a stream whose length is not a multiple of three
/// still produces one index per entry.
pub fn weld_vertices<I>(vertices: I, attributes: KeyAttributes) -> Result<IndexedMesh, WeldError>
where
  I: IntoIterator<Item = Vertex>,
{
  let mut interner = VertexInterner::new(attributes);
  for vertex in vertices {
    interner.push_corner(vertex)?;
  }
  Ok(IndexedMesh {
    vertices: interner.vertices,
    indices:  interner.indices,
  })
}

#[cfg(test)]
mod tests {
  use std::hash::{BuildHasherDefault, Hasher};

  use quickcheck::{Arbitrary, Gen};
  use quickcheck_macros::quickcheck;

  use super::*;
  use crate::vertex::DEFAULT_COLOR;

  /// Sends every key to the same bucket.
  #[derive(Default)]
  struct CollidingHasher;

  impl Hasher for CollidingHasher {
    fn finish(&self) -> u64 {
      0
    }

    fn write(&mut self, _bytes: &[u8]) {}
  }

  type Colliding = BuildHasherDefault<CollidingHasher>;

  fn triangle_store() -> AttributeStore {
    AttributeStore::new(vec![
      0.0, 0.0, 0.0, //
      1.0, 0.0, 0.0, //
      0.0, 1.0, 0.0,
    ])
  }

  fn quad_store() -> AttributeStore {
    AttributeStore::new(vec![
      0.0, 0.0, 0.0, //
      1.0, 0.0, 0.0, //
      1.0, 1.0, 0.0, //
      0.0, 1.0, 0.0,
    ])
  }

  #[test]
  fn single_triangle() {
    let faces = [0, 1, 2].map(FaceIndex::new);
    let mesh = weld(&triangle_store(), &faces, KeyAttributes::all()).unwrap();

    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(mesh.vertices.len(), 3);
    for vertex in &mesh.vertices {
      assert_eq!(vertex.color, DEFAULT_COLOR);
      assert_eq!(vertex.normal, [0.0; 3]);
      assert_eq!(vertex.tex_coord, [0.0; 2]);
    }
  }

  #[test]
  fn shared_edge_reuses_vertices() {
    let faces = [0, 1, 2, 2, 3, 0].map(FaceIndex::new);
    let mesh = weld(&quad_store(), &faces, KeyAttributes::all()).unwrap();

    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
  }

  #[test]
  fn position_one_past_the_end_fails() {
    let store = quad_store();
    let faces = [0, 1, 2, 2, 3, 4].map(FaceIndex::new);
    let err = weld(&store, &faces, KeyAttributes::all()).unwrap_err();

    assert_eq!(
      err,
      WeldError::IndexOutOfRange {
        triangle: 1,
        corner:   2,
        kind:     AttributeKind::Position,
        index:    4,
        len:      4,
      }
    );
  }

  #[test]
  fn failed_push_leaves_interner_untouched() {
    let store = quad_store();
    let mut interner = VertexInterner::new(KeyAttributes::all());
    interner
      .push_faces(&store, &[0, 1, 2].map(FaceIndex::new))
      .unwrap();

    let err = interner.push_faces(&store, &[2, 3, 9].map(FaceIndex::new));
    assert!(matches!(err, Err(WeldError::IndexOutOfRange { triangle: 0, .. })));
    assert_eq!(interner.vertices().len(), 3);
    assert_eq!(interner.indices(), &[0, 1, 2]);
  }

  #[test]
  fn empty_face_list_is_an_empty_mesh() {
    let mesh = weld(&quad_store(), &[], KeyAttributes::all()).unwrap();
    assert!(mesh.vertices.is_empty());
    assert!(mesh.indices.is_empty());
  }

  #[test]
  fn partial_triangle_is_rejected() {
    let faces = [0, 1].map(FaceIndex::new);
    let err = weld(&quad_store(), &faces, KeyAttributes::all()).unwrap_err();
    assert_eq!(err, WeldError::IncompleteTriangle { corners: 2 });
  }

  #[test]
  fn normals_split_vertices_only_when_tracked() {
    // Two triangles meeting at a hard edge: same positions, different normals.
    let store = quad_store().with_normals(vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    let faces = [
      FaceIndex::new(0).with_normal(0),
      FaceIndex::new(1).with_normal(0),
      FaceIndex::new(2).with_normal(0),
      FaceIndex::new(2).with_normal(1),
      FaceIndex::new(3).with_normal(1),
      FaceIndex::new(0).with_normal(1),
    ];

    let full = weld(&store, &faces, KeyAttributes::all()).unwrap();
    assert_eq!(full.vertices.len(), 6);
    assert_eq!(full.indices, vec![0, 1, 2, 3, 4, 5]);

    let position_only = weld(&store, &faces, KeyAttributes::empty()).unwrap();
    assert_eq!(position_only.vertices.len(), 4);
    assert_eq!(position_only.indices, vec![0, 1, 2, 2, 3, 0]);
    assert_eq!(position_only.vertices[2].normal, [0.0, 0.0, 1.0]);
  }

  #[test]
  fn tex_coords_split_vertices_only_when_tracked() {
    let store = triangle_store().with_tex_coords(vec![0.0, 0.0, 1.0, 1.0]);
    let faces = [
      FaceIndex::new(0).with_tex_coord(0),
      FaceIndex::new(1).with_tex_coord(0),
      FaceIndex::new(2).with_tex_coord(0),
      FaceIndex::new(0).with_tex_coord(1),
      FaceIndex::new(1).with_tex_coord(0),
      FaceIndex::new(2).with_tex_coord(0),
    ];

    let tracked = weld(&store, &faces, KeyAttributes::TEX_COORD).unwrap();
    assert_eq!(tracked.vertices.len(), 4);
    assert_eq!(tracked.indices, vec![0, 1, 2, 3, 1, 2]);

    let untracked = weld(&store, &faces, KeyAttributes::NORMAL).unwrap();
    assert_eq!(untracked.vertices.len(), 3);
  }

  #[test]
  fn signed_zero_collapses() {
    let store = AttributeStore::new(vec![
      0.0, 0.0, 0.0, //
      -0.0, 0.0, -0.0, //
      1.0, 0.0, 0.0,
    ]);
    let faces = [0, 1, 2].map(FaceIndex::new);
    let mesh = weld(&store, &faces, KeyAttributes::all()).unwrap();
    assert_eq!(mesh.indices, vec![0, 0, 1]);
  }

  #[test]
  fn colliding_hasher_gives_identical_output() {
    let store = quad_store().with_colors(vec![
      1.0, 0.0, 0.0, //
      0.0, 1.0, 0.0, //
      0.0, 0.0, 1.0, //
      1.0, 1.0, 1.0,
    ]);
    let faces = [0, 1, 2, 2, 3, 0, 3, 2, 1].map(FaceIndex::new);

    let default = weld(&store, &faces, KeyAttributes::all()).unwrap();
    let colliding =
      weld_with_hasher(&store, &faces, KeyAttributes::all(), Colliding::default()).unwrap();
    assert_eq!(default, colliding);
  }

  #[test]
  fn reweld_is_identity() {
    let faces = [0, 1, 2, 2, 3, 0].map(FaceIndex::new);
    let mesh = weld(&quad_store(), &faces, KeyAttributes::all()).unwrap();

    let again = weld_vertices(mesh.vertices.iter().copied(), KeyAttributes::all()).unwrap();
    assert_eq!(again.vertices, mesh.vertices);
    assert_eq!(again.indices, vec![0, 1, 2, 3]);
  }

  /// Small attribute store plus a face list whose indices are all in range,
  /// drawn from a tiny value pool so that duplicates are common.
  #[derive(Debug, Clone)]
  struct Input {
    store:      AttributeStore,
    faces:      Vec<FaceIndex>,
    attributes: KeyAttributes,
  }

  fn pool_value(g: &mut Gen) -> f32 {
    *g.choose(&[0.0, -0.0, 0.5, 1.0, -1.0]).unwrap_or(&0.0)
  }

  fn floats(g: &mut Gen, count: usize) -> Vec<f32> {
    (0..count).map(|_| pool_value(g)).collect()
  }

  impl Arbitrary for Input {
    fn arbitrary(g: &mut Gen) -> Self {
      let positions = 1 + usize::arbitrary(g) % 6;
      let normals = usize::arbitrary(g) % 4;
      let tex_coords = usize::arbitrary(g) % 4;
      let with_colors = bool::arbitrary(g);

      let mut store = AttributeStore::new(floats(g, positions * 3))
        .with_normals(floats(g, normals * 3))
        .with_tex_coords(floats(g, tex_coords * 2));
      if with_colors {
        store.colors = floats(g, positions * 3);
      }

      let triangles = usize::arbitrary(g) % 8;
      let faces = (0..triangles * 3)
        .map(|_| FaceIndex {
          position:  (usize::arbitrary(g) % positions) as u32,
          normal:    (normals > 0).then(|| (usize::arbitrary(g) % normals) as u32),
          tex_coord: (tex_coords > 0).then(|| (usize::arbitrary(g) % tex_coords) as u32),
        })
        .collect();

      let attributes = KeyAttributes::from_bits_truncate(u8::arbitrary(g));

      Input {
        store,
        faces,
        attributes,
      }
    }
  }

  #[quickcheck]
  fn welded_vertices_are_unique(input: Input) -> bool {
    let mesh = weld(&input.store, &input.faces, input.attributes).unwrap();
    let mut seen = std::collections::HashSet::new();
    mesh
      .vertices
      .iter()
      .all(|v| seen.insert(VertexKey::new(v, input.attributes)))
  }

  #[quickcheck]
  fn indices_are_in_bounds(input: Input) -> bool {
    let mesh = weld(&input.store, &input.faces, input.attributes).unwrap();
    mesh.indices.len() == input.faces.len()
      && mesh.indices.len() % 3 == 0
      && mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len())
  }

  #[quickcheck]
  fn indices_point_at_the_resolved_corner(input: Input) -> bool {
    let mesh = weld(&input.store, &input.faces, KeyAttributes::all()).unwrap();
    input
      .faces
      .iter()
      .zip(&mesh.indices)
      .all(|(&face, &index)| {
        let expected = input.store.resolve(face).unwrap();
        VertexKey::new(&mesh.vertices[index as usize], KeyAttributes::all())
          == VertexKey::new(&expected, KeyAttributes::all())
      })
  }

  #[quickcheck]
  fn untracked_attributes_keep_the_first_corner(input: Input) -> bool {
    let mesh = weld(&input.store, &input.faces, input.attributes).unwrap();
    input
      .faces
      .iter()
      .zip(&mesh.indices)
      .all(|(&face, &index)| {
        let expected = input.store.resolve(face).unwrap();
        VertexKey::new(&mesh.vertices[index as usize], input.attributes)
          == VertexKey::new(&expected, input.attributes)
      })
  }

  #[quickcheck]
  fn out_of_range_position_fails_without_output(input: Input, pick: usize) -> bool {
    if input.faces.is_empty() {
      return true;
    }

    let bad = pick % input.faces.len();
    let len = input.store.position_count();
    let mut faces = input.faces.clone();
    faces[bad].position = len as u32;

    let mut interner = VertexInterner::new(input.attributes);
    let err = interner.push_faces(&input.store, &faces);

    err
      == Err(WeldError::IndexOutOfRange {
        triangle: bad / 3,
        corner:   bad % 3,
        kind:     AttributeKind::Position,
        index:    len as u32,
        len,
      })
      && interner.vertices().is_empty()
      && interner.indices().is_empty()
  }

  #[quickcheck]
  fn welding_is_deterministic(input: Input) -> bool {
    let a = weld(&input.store, &input.faces, input.attributes).unwrap();
    let b = weld_with_hasher(&input.store, &input.faces, input.attributes, Colliding::default())
      .unwrap();
    a.vertex_bytes() == b.vertex_bytes() && a.indices == b.indices
  }

  #[quickcheck]
  fn rewelding_output_is_a_no_op(input: Input) -> bool {
    let mesh = weld(&input.store, &input.faces, input.attributes).unwrap();
    let again = weld_vertices(mesh.vertices.iter().copied(), input.attributes).unwrap();
    let identity: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    again.vertex_bytes() == mesh.vertex_bytes() && again.indices == identity
  }
}
