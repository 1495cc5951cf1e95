//! Wavefront `.obj` model loading.
//!
//! This module turns an `.obj` file into welded meshes:
//! 1. Parses and triangulates the file with `tobj`
//! 2. Copies each shape's attribute arrays into an [`AttributeStore`]
//! 3. Welds the per-corner indices into unique vertices and a triangle list
//! 4. Resolves diffuse textures named by the materials and decodes them once
//!    through the loader's [`TextureCache`]
//!
//! Material files are optional: a missing or broken `.mtl` is logged and the
//! model loads without textures. A texture that fails to decode is skipped the
//! same way. Only a parse failure or a bad face index fails the load.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::attributes::AttributeStore;
use crate::mesh::{IndexedMesh, LoadedTexture, Mesh, Model, TextureRef};
use crate::texture::TextureCache;
use crate::weld::{KeyAttributes, VertexInterner, WeldError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
  #[error("failed to load {path}: {source}")]
  Parse {
    path:   PathBuf,
    #[source]
    source: tobj::LoadError,
  },
  #[error("shape {shape:?} in {path}: {source}")]
  Weld {
    path:   PathBuf,
    shape:  String,
    #[source]
    source: WeldError,
  },
}

/// How a model is turned into meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
  /// Attributes that keep otherwise equal vertices apart.
  pub key:           KeyAttributes,
  /// Weld every shape into a single mesh instead of one mesh per shape.
  pub merge_shapes:  bool,
  /// Flip the V texture coordinate for a top-left image origin.
  pub flip_v:        bool,
  /// Decode the diffuse textures named by the materials.
  pub load_textures: bool,
}

impl Default for LoadOptions {
  fn default() -> Self {
    Self {
      key:           KeyAttributes::all(),
      merge_shapes:  false,
      flip_v:        true,
      load_textures: true,
    }
  }
}

fn tobj_options() -> tobj::LoadOptions {
  tobj::LoadOptions {
    triangulate: true,
    ignore_points: true,
    ignore_lines: true,
    ..Default::default()
  }
}

/// Loads models and owns the texture cache shared between them.
#[derive(Debug, Default)]
pub struct ModelLoader {
  options:  LoadOptions,
  textures: TextureCache,
}

impl ModelLoader {
  pub fn new(options: LoadOptions) -> Self {
    Self {
      options,
      textures: TextureCache::new(),
    }
  }

  pub fn options(&self) -> &LoadOptions {
    &self.options
  }

  pub fn textures(&self) -> &TextureCache {
    &self.textures
  }

  pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<Model, LoadError> {
    let path = path.as_ref();
    log::info!("loading {}", path.display());

    let (shapes, materials) =
      tobj::load_obj(path, &tobj_options()).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
      })?;

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    self.build_model(path, &shapes, materials, Some(&base_dir))
  }

  /// Loads a model from an in-memory `.obj` stream.
  ///
  /// `name` labels the model and its errors. Material libraries and textures
  /// are resolved against `base_dir`; without one, materials are skipped.
  pub fn load_model_from_reader<R: BufRead>(
    &mut self,
    name: &str,
    reader: &mut R,
    base_dir: Option<&Path>,
  ) -> Result<Model, LoadError> {
    let label = PathBuf::from(name);
    log::info!("loading {name}");

    let (shapes, materials) = tobj::load_obj_buf(reader, &tobj_options(), |mtl| match base_dir {
      Some(dir) => tobj::load_mtl(dir.join(mtl)),
      None => Ok((Vec::new(), Default::default())),
    })
    .map_err(|source| LoadError::Parse {
      path: label.clone(),
      source,
    })?;

    self.build_model(&label, &shapes, materials, base_dir)
  }

  fn build_model(
    &mut self,
    path: &Path,
    shapes: &[tobj::Model],
    materials: Result<Vec<tobj::Material>, tobj::LoadError>,
    base_dir: Option<&Path>,
  ) -> Result<Model, LoadError> {
    let materials = materials.unwrap_or_else(|err| {
      log::warn!("{}: materials not loaded: {err}", path.display());
      Vec::new()
    });

    log::debug!("- shapes: {}", shapes.len());
    log::debug!("- materials: {}", materials.len());

    let meshes = if self.options.merge_shapes {
      vec![self.weld_merged(path, shapes)?]
    } else {
      shapes
        .iter()
        .map(|shape| self.weld_shape(path, shape))
        .collect::<Result<Vec<_>, _>>()?
    };

    let textures = match base_dir {
      Some(dir) if self.options.load_textures => self.load_textures(dir, &materials),
      _ => Vec::new(),
    };

    let model = Model {
      name: model_name(path),
      meshes,
      textures,
    };

    log::info!(
      "loaded {}: {} meshes, {} vertices, {} triangles, {} textures",
      model.name,
      model.meshes.len(),
      model.vertex_count(),
      model.triangle_count(),
      model.textures.len()
    );

    Ok(model)
  }

  fn weld_shape(&self, path: &Path, shape: &tobj::Model) -> Result<Mesh, LoadError> {
    let (store, faces) = AttributeStore::from_tobj(&shape.mesh, self.options.flip_v);
    log_shape(shape, &store, faces.len());

    let mut interner = VertexInterner::new(self.options.key);
    interner
      .push_faces(&store, &faces)
      .map_err(weld_error(path, &shape.name))?;
    let geometry = interner.finish().map_err(weld_error(path, &shape.name))?;
    log_welded(&shape.name, &geometry);

    Ok(Mesh {
      name: shape.name.clone(),
      geometry,
      material_id: shape.mesh.material_id,
    })
  }

  /// Welds every shape through one interner so vertices shared between shapes
  /// are stored once.
  fn weld_merged(&self, path: &Path, shapes: &[tobj::Model]) -> Result<Mesh, LoadError> {
    let mut interner = VertexInterner::new(self.options.key);
    for shape in shapes {
      let (store, faces) = AttributeStore::from_tobj(&shape.mesh, self.options.flip_v);
      log_shape(shape, &store, faces.len());
      interner
        .push_faces(&store, &faces)
        .map_err(weld_error(path, &shape.name))?;
    }

    let name = model_name(path);
    let geometry = interner.finish().map_err(weld_error(path, &name))?;
    log_welded(&name, &geometry);

    Ok(Mesh {
      name,
      geometry,
      material_id: shapes.iter().find_map(|s| s.mesh.material_id),
    })
  }

  fn load_textures(&mut self, base_dir: &Path, materials: &[tobj::Material]) -> Vec<LoadedTexture> {
    let mut seen = HashSet::new();
    let mut textures = Vec::new();

    for name in materials
      .iter()
      .filter_map(|m| m.diffuse_texture.as_deref())
      .filter(|name| !name.is_empty())
    {
      if !seen.insert(name) {
        continue;
      }

      let reference = TextureRef {
        name: name.to_owned(),
        path: base_dir.join(name),
      };
      match self.textures.load(&reference.path) {
        Ok(data) => textures.push(LoadedTexture { reference, data }),
        Err(err) => log::error!("{err}"),
      }
    }

    textures
  }
}

fn weld_error<'a>(path: &'a Path, shape: &'a str) -> impl Fn(WeldError) -> LoadError + 'a {
  move |source| LoadError::Weld {
    path: path.to_path_buf(),
    shape: shape.to_owned(),
    source,
  }
}

fn model_name(path: &Path) -> String {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default()
}

fn log_shape(shape: &tobj::Model, store: &AttributeStore, corners: usize) {
  log::debug!(
    "- shape {:?}: {} positions, {} normals, {} colors, {} texcoords, {} corners",
    shape.name,
    store.position_count(),
    store.normal_count(),
    store.color_count(),
    store.tex_coord_count(),
    corners
  );
}

fn log_welded(name: &str, mesh: &IndexedMesh) {
  log::debug!(
    "- welded {name:?}: {} unique vertices, {} indices ({:.0}% reused)",
    mesh.vertex_count(),
    mesh.index_count(),
    mesh.reuse_ratio() * 100.0
  );
}
