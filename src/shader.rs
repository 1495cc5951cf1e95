//! GLSL shader source loading.
//!
//! Reads the text of each shader stage from disk. Compiling the sources is
//! left to whichever backend consumes them; a stage that cannot be read is
//! reported with its path so the caller can decide whether that is fatal.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
  Vertex,
  Fragment,
  Geometry,
}

impl fmt::Display for ShaderStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShaderStage::Vertex => f.write_str("vertex"),
      ShaderStage::Fragment => f.write_str("fragment"),
      ShaderStage::Geometry => f.write_str("geometry"),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
  #[error("failed to read {stage} shader {path}: {source}")]
  Read {
    stage:  ShaderStage,
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("{stage} shader {path} is empty")]
  Empty { stage: ShaderStage, path: PathBuf },
}

impl ShaderError {
  pub fn stage(&self) -> ShaderStage {
    match self {
      ShaderError::Read { stage, .. } | ShaderError::Empty { stage, .. } => *stage,
    }
  }
}

/// Source text of one stage and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSource {
  pub path:   PathBuf,
  pub source: String,
}

/// GLSL sources for a vertex/fragment pair plus an optional geometry stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
  pub vertex:   StageSource,
  pub fragment: StageSource,
  pub geometry: Option<StageSource>,
}

impl ShaderSources {
  pub fn load(
    vertex: impl AsRef<Path>,
    fragment: impl AsRef<Path>,
    geometry: Option<&Path>,
  ) -> Result<Self, ShaderError> {
    let vertex = read_stage(ShaderStage::Vertex, vertex.as_ref())?;
    let fragment = read_stage(ShaderStage::Fragment, fragment.as_ref())?;
    let geometry = geometry
      .map(|path| read_stage(ShaderStage::Geometry, path))
      .transpose()?;

    log::debug!(
      "loaded shaders {} / {}{}",
      vertex.path.display(),
      fragment.path.display(),
      geometry
        .as_ref()
        .map(|g| format!(" / {}", g.path.display()))
        .unwrap_or_default()
    );

    Ok(Self {
      vertex,
      fragment,
      geometry,
    })
  }

  pub fn stage(&self, stage: ShaderStage) -> Option<&StageSource> {
    match stage {
      ShaderStage::Vertex => Some(&self.vertex),
      ShaderStage::Fragment => Some(&self.fragment),
      ShaderStage::Geometry => self.geometry.as_ref(),
    }
  }
}

fn read_stage(stage: ShaderStage, path: &Path) -> Result<StageSource, ShaderError> {
  let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Read {
    stage,
    path: path.to_path_buf(),
    source,
  })?;

  if source.trim().is_empty() {
    return Err(ShaderError::Empty {
      stage,
      path: path.to_path_buf(),
    });
  }

  Ok(StageSource {
    path: path.to_path_buf(),
    source,
  })
}
