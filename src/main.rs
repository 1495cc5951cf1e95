use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use meshweld::{GpuContext, ModelBuffers, ModelLoader};

mod cli;

fn main() -> Result<ExitCode, Box<dyn Error>> {
  let cli = cli::Cli::parse();
  cli::initialize_logging(&cli.log_filter);

  let mut loader = ModelLoader::new(cli.load_options());
  let gpu = if cli.upload { Some(GpuContext::headless()?) } else { None };

  let mut failed = 0;
  for path in &cli.files {
    let model = match loader.load_model(path) {
      Ok(model) => model,
      Err(err) => {
        log::error!("{err}");
        failed += 1;
        continue;
      }
    };

    for mesh in &model.meshes {
      let bounds = mesh
        .geometry
        .bounds()
        .map(|(min, max)| format!("{min} .. {max}"))
        .unwrap_or_else(|| "empty".to_owned());
      log::info!(
        "{}/{}: {} vertices, {} triangles, bounds {bounds}",
        model.name,
        mesh.name,
        mesh.geometry.vertex_count(),
        mesh.geometry.triangle_count()
      );
    }

    if let Some(gpu) = &gpu {
      if let Err(err) = ModelBuffers::upload(gpu, &model) {
        log::error!("{}: upload failed: {err}", path.display());
        failed += 1;
      }
    }
  }

  if failed > 0 {
    log::error!("{failed} of {} files failed", cli.files.len());
    return Ok(ExitCode::FAILURE);
  }

  Ok(ExitCode::SUCCESS)
}
