use std::path::PathBuf;

use clap::ValueHint;
use meshweld::{KeyAttributes, LoadOptions};

#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
pub struct Cli {
  /// Logging output filters; comma-separated
  #[arg(short, long, default_value = "info", env = "MESHWELD_LOG")]
  pub log_filter:   String,
  /// Attributes that keep vertices apart besides position; `none` welds on position alone
  #[arg(short, long, default_value = "all", value_parser = parse_key, value_name = "ATTRS")]
  pub key:          KeyAttributes,
  /// Weld all shapes of a file into one mesh
  #[arg(long)]
  pub merge_shapes: bool,
  /// Keep texture coordinates as written in the file
  #[arg(long)]
  pub no_flip_v:    bool,
  /// Skip decoding material textures
  #[arg(long)]
  pub no_textures:  bool,
  /// Upload the welded meshes through a headless Vulkan device
  #[arg(long)]
  pub upload:       bool,
  /// Model files to load
  #[arg(num_args = 1.., required = true, value_hint = ValueHint::FilePath)]
  pub files:        Vec<PathBuf>,
}

impl Cli {
  pub fn load_options(&self) -> LoadOptions {
    LoadOptions {
      key:           self.key,
      merge_shapes:  self.merge_shapes,
      flip_v:        !self.no_flip_v,
      load_textures: !self.no_textures,
    }
  }
}

fn parse_key(s: &str) -> Result<KeyAttributes, String> {
  let mut key = KeyAttributes::empty();
  for name in s.split(',').map(str::trim).filter(|name| !name.is_empty()) {
    key |= match name.to_ascii_lowercase().as_str() {
      "all" => KeyAttributes::all(),
      "none" | "position" => KeyAttributes::empty(),
      "normal" => KeyAttributes::NORMAL,
      "color" => KeyAttributes::COLOR,
      "tex-coord" | "texcoord" | "uv" => KeyAttributes::TEX_COORD,
      other => {
        return Err(format!(
          "unknown attribute {other:?}, expected normal, color, tex-coord, all or none"
        ));
      }
    };
  }
  Ok(key)
}

pub(crate) fn initialize_logging(log_filter: &str) {
  env_logger::Builder::new()
    .parse_filters(log_filter)
    .format_timestamp(None)
    .init();
}
