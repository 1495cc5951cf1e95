//! Vulkan upload of welded meshes and decoded textures.
//!
//! This module owns the minimum of Vulkan state needed to get geometry onto a
//! device:
//! * A headless instance and logical device with one graphics queue
//! * Standard memory and command buffer allocators
//! * Vertex/index buffer creation for [`IndexedMesh`] values
//! * Staged texture upload for [`TextureData`] values
//!
//! There is no surface or swapchain; drawing the uploaded buffers is left to
//! the application.
//!
//! # Example
//! ```no_run
//! use meshweld::{GpuContext, LoadOptions, ModelBuffers, ModelLoader};
//!
//! let model = ModelLoader::new(LoadOptions::default()).load_model("models/cube.obj")?;
//! let gpu = GpuContext::headless()?;
//! let buffers = ModelBuffers::upload(&gpu, &model)?;
//!
//! // Bind like any other vertex/index pair
//! // builder.bind_vertex_buffers(0, buffers.meshes[0].vertices.clone())?;
//! // builder.bind_index_buffer(buffers.meshes[0].indices.clone())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use vulkano::{
  DeviceSize,
  LoadingError,
  Validated,
  ValidationError,
  VulkanError,
  VulkanLibrary,
  buffer::{AllocateBufferError, Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
  command_buffer::{
    AutoCommandBufferBuilder,
    CommandBufferExecError,
    CommandBufferUsage,
    CopyBufferToImageInfo,
    PrimaryCommandBufferAbstract,
    allocator::StandardCommandBufferAllocator,
  },
  device::{
    Device,
    DeviceCreateInfo,
    Queue,
    QueueCreateInfo,
    QueueFlags,
    physical::{PhysicalDevice, PhysicalDeviceType},
  },
  format::Format,
  image::{AllocateImageError, Image, ImageCreateInfo, ImageType, ImageUsage, view::ImageView},
  instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
  sync::GpuFuture,
};

use crate::mesh::{IndexedMesh, Model};
use crate::texture::TextureData;
use crate::vertex::Vertex;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
  #[error("failed to load the Vulkan library: {0}")]
  Loading(#[from] LoadingError),
  #[error(transparent)]
  Vulkan(#[from] Validated<VulkanError>),
  #[error(transparent)]
  VulkanRuntime(#[from] VulkanError),
  #[error(transparent)]
  Validation(#[from] Box<ValidationError>),
  #[error("failed to allocate buffer: {0}")]
  AllocateBuffer(#[from] Validated<AllocateBufferError>),
  #[error("failed to allocate image: {0}")]
  AllocateImage(#[from] Validated<AllocateImageError>),
  #[error("failed to execute command buffer: {0}")]
  Execute(#[from] CommandBufferExecError),
  #[error("no Vulkan device with a graphics queue is available")]
  NoSuitableDevice,
  #[error("cannot upload an empty mesh")]
  EmptyMesh,
}

/// Vulkan objects shared by every upload.
pub struct GpuContext {
  pub instance:                 Arc<Instance>,
  pub device:                   Arc<Device>,
  pub queue:                    Arc<Queue>,
  pub memory_allocator:         Arc<StandardMemoryAllocator>,
  pub command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
}

impl GpuContext {
  /// Creates an instance and device without any presentation support.
  ///
  /// Picks the first device with a graphics queue, preferring discrete GPUs.
  pub fn headless() -> Result<Self, GpuError> {
    let library = VulkanLibrary::new()?;
    let instance = Instance::new(
      library,
      InstanceCreateInfo {
        flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
        ..Default::default()
      },
    )?;

    let (physical_device, queue_family_index) = instance
      .enumerate_physical_devices()?
      .filter_map(|p| graphics_queue_family(&p).map(|i| (p, i)))
      .min_by_key(|(p, _)| device_type_rank(p.properties().device_type))
      .ok_or(GpuError::NoSuitableDevice)?;

    log::info!(
      "using device: {} (type: {:?})",
      physical_device.properties().device_name,
      physical_device.properties().device_type,
    );

    let (device, mut queues) = Device::new(
      physical_device,
      DeviceCreateInfo {
        queue_create_infos: vec![QueueCreateInfo {
          queue_family_index,
          ..Default::default()
        }],
        ..Default::default()
      },
    )?;
    let queue = queues.next().ok_or(GpuError::NoSuitableDevice)?;

    let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
    let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
      device.clone(),
      Default::default(),
    ));

    Ok(Self {
      instance,
      device,
      queue,
      memory_allocator,
      command_buffer_allocator,
    })
  }

  /// Uploads RGBA8 pixels into a sampled sRGB image through a staging buffer.
  ///
  /// Blocks until the copy has finished on the device.
  pub fn upload_texture(&self, texture: &TextureData) -> Result<Arc<ImageView>, GpuError> {
    let image = Image::new(
      self.memory_allocator.clone(),
      ImageCreateInfo {
        image_type: ImageType::Dim2d,
        format: Format::R8G8B8A8_SRGB,
        extent: texture.extent(),
        usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
        ..Default::default()
      },
    )?;

    let staging_buffer = Buffer::from_iter(
      self.memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::TRANSFER_SRC,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_HOST | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
        ..Default::default()
      },
      texture.pixels.iter().copied(),
    )?;

    let mut upload = AutoCommandBufferBuilder::primary(
      self.command_buffer_allocator.clone(),
      self.queue.queue_family_index(),
      CommandBufferUsage::OneTimeSubmit,
    )?;
    upload.copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(
      staging_buffer,
      image.clone(),
    ))?;

    upload
      .build()?
      .execute(self.queue.clone())?
      .then_signal_fence_and_flush()?
      .wait(None)?;

    log::debug!(
      "uploaded texture {} ({}x{})",
      texture.path.display(),
      texture.width,
      texture.height
    );

    Ok(ImageView::new_default(image)?)
  }
}

fn graphics_queue_family(device: &PhysicalDevice) -> Option<u32> {
  device
    .queue_family_properties()
    .iter()
    .position(|q| q.queue_flags.intersects(QueueFlags::GRAPHICS))
    .and_then(|i| u32::try_from(i).ok())
}

fn device_type_rank(device_type: PhysicalDeviceType) -> u8 {
  match device_type {
    PhysicalDeviceType::DiscreteGpu => 0,
    PhysicalDeviceType::IntegratedGpu => 1,
    PhysicalDeviceType::VirtualGpu => 2,
    PhysicalDeviceType::Cpu => 3,
    PhysicalDeviceType::Other => 4,
    _ => 5,
  }
}

/// Device-side copy of one [`IndexedMesh`].
///
/// # Memory Layout
/// * vertices: interleaved [`Vertex`] values (position, normal, color, texcoord)
/// * indices: `[i1, i2, i3, i1, i2, i3, ...]` - 3 u32s per triangle
pub struct MeshBuffers {
  pub vertices: Subbuffer<[Vertex]>,
  pub indices:  Subbuffer<[u32]>,
}

impl MeshBuffers {
  pub fn upload(gpu: &GpuContext, mesh: &IndexedMesh) -> Result<Self, GpuError> {
    if mesh.is_empty() {
      return Err(GpuError::EmptyMesh);
    }

    let vertices = Buffer::from_iter(
      gpu.memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::VERTEX_BUFFER,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
          | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
        ..Default::default()
      },
      mesh.vertices.iter().copied(),
    )?;

    let indices = Buffer::from_iter(
      gpu.memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::INDEX_BUFFER,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
          | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
        ..Default::default()
      },
      mesh.indices.iter().copied(),
    )?;

    Ok(Self { vertices, indices })
  }

  pub fn index_count(&self) -> DeviceSize {
    self.indices.len()
  }
}

/// Device-side copy of a whole [`Model`].
pub struct ModelBuffers {
  pub meshes:   Vec<MeshBuffers>,
  pub textures: Vec<Arc<ImageView>>,
}

impl ModelBuffers {
  /// Uploads every non-empty mesh and every texture of `model`.
  pub fn upload(gpu: &GpuContext, model: &Model) -> Result<Self, GpuError> {
    let meshes = model
      .meshes
      .iter()
      .filter(|mesh| !mesh.geometry.is_empty())
      .map(|mesh| MeshBuffers::upload(gpu, &mesh.geometry))
      .collect::<Result<Vec<_>, _>>()?;

    let textures = model
      .textures
      .iter()
      .map(|texture| gpu.upload_texture(&texture.data))
      .collect::<Result<Vec<_>, _>>()?;

    log::info!(
      "uploaded {}: {} meshes, {} textures",
      model.name,
      meshes.len(),
      textures.len()
    );

    Ok(Self { meshes, textures })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::texture::TextureFormat;

  fn gpu() -> Option<GpuContext> {
    match GpuContext::headless() {
      Ok(gpu) => Some(gpu),
      Err(err) => {
        eprintln!("skipping GPU test: {err}");
        None
      }
    }
  }

  #[test]
  fn device_ranking_prefers_discrete() {
    let discrete = device_type_rank(PhysicalDeviceType::DiscreteGpu);
    let integrated = device_type_rank(PhysicalDeviceType::IntegratedGpu);
    assert!(discrete < integrated);
    assert!(integrated < device_type_rank(PhysicalDeviceType::Cpu));
  }

  #[test]
  fn mesh_upload_keeps_lengths() {
    let Some(gpu) = gpu() else { return };
    let mesh = IndexedMesh {
      vertices: vec![
        Vertex::new([0.0, 0.0, 0.0]),
        Vertex::new([1.0, 0.0, 0.0]),
        Vertex::new([0.0, 1.0, 0.0]),
      ],
      indices:  vec![0, 1, 2],
    };

    let buffers = MeshBuffers::upload(&gpu, &mesh).unwrap();
    assert_eq!(buffers.vertices.len(), 3);
    assert_eq!(buffers.index_count(), 3);
  }

  #[test]
  fn empty_mesh_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let err = MeshBuffers::upload(&gpu, &IndexedMesh::default());
    assert!(matches!(err, Err(GpuError::EmptyMesh)));
  }

  #[test]
  fn texture_upload_produces_an_image_view() {
    let Some(gpu) = gpu() else { return };
    let texture = TextureData {
      path:          "checker".into(),
      source_format: TextureFormat::Rgba8,
      width:         2,
      height:        2,
      pixels:        vec![255; 16],
    };

    let view = gpu.upload_texture(&texture).unwrap();
    assert_eq!(view.image().extent(), [2, 2, 1]);
  }
}
