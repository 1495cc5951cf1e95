//! Texture decoding and a per-path cache of decoded images.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
  #[error("failed to decode texture {path}: {source}")]
  Decode {
    path:   PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("texture {path} has {channels} channels, expected 1 to 4")]
  UnsupportedChannels { path: PathBuf, channels: u8 },
}

/// Channel layout of the source image before it is expanded to RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
  R8,
  Rg8,
  Rgb8,
  Rgba8,
}

impl TextureFormat {
  pub fn from_channels(channels: u8) -> Option<Self> {
    match channels {
      1 => Some(TextureFormat::R8),
      2 => Some(TextureFormat::Rg8),
      3 => Some(TextureFormat::Rgb8),
      4 => Some(TextureFormat::Rgba8),
      _ => None,
    }
  }

  pub fn channels(self) -> u8 {
    match self {
      TextureFormat::R8 => 1,
      TextureFormat::Rg8 => 2,
      TextureFormat::Rgb8 => 3,
      TextureFormat::Rgba8 => 4,
    }
  }
}

/// A decoded image, expanded to 8-bit RGBA for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
  pub path:          PathBuf,
  pub source_format: TextureFormat,
  pub width:         u32,
  pub height:        u32,
  /// Row-major RGBA8 pixels, `width * height * 4` bytes.
  pub pixels:        Vec<u8>,
}

impl TextureData {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, TextureError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| TextureError::Decode {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_image(path.to_path_buf(), image)
  }

  /// Decodes an in-memory image; `path` is only used to label the result.
  pub fn from_memory(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, TextureError> {
    let path = path.into();
    match image::load_from_memory(bytes) {
      Ok(image) => Self::from_image(path, image),
      Err(source) => Err(TextureError::Decode { path, source }),
    }
  }

  fn from_image(path: PathBuf, image: image::DynamicImage) -> Result<Self, TextureError> {
    let channels = image.color().channel_count();
    let source_format = TextureFormat::from_channels(channels)
      .ok_or(TextureError::UnsupportedChannels {
        path: path.clone(),
        channels,
      })?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(Self {
      path,
      source_format,
      width,
      height,
      pixels: rgba.into_raw(),
    })
  }

  pub fn extent(&self) -> [u32; 3] {
    [self.width, self.height, 1]
  }
}

/// Decodes each texture path once and hands out shared copies afterwards.
#[derive(Debug, Default)]
pub struct TextureCache {
  loaded: HashMap<PathBuf, Arc<TextureData>>,
}

impl TextureCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Arc<TextureData>, TextureError> {
    let path = path.as_ref();
    if let Some(texture) = self.loaded.get(path) {
      log::debug!("texture cache hit: {}", path.display());
      return Ok(texture.clone());
    }

    let texture = Arc::new(TextureData::load(path)?);
    log::debug!(
      "loaded texture {} ({}x{}, {:?})",
      path.display(),
      texture.width,
      texture.height,
      texture.source_format
    );
    self.loaded.insert(path.to_path_buf(), texture.clone());
    Ok(texture)
  }

  pub fn get(&self, path: impl AsRef<Path>) -> Option<&Arc<TextureData>> {
    self.loaded.get(path.as_ref())
  }

  pub fn len(&self) -> usize {
    self.loaded.len()
  }

  pub fn is_empty(&self) -> bool {
    self.loaded.is_empty()
  }

  pub fn clear(&mut self) {
    self.loaded.clear();
  }
}
