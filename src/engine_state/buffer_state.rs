//! # Buffer State Module
//!
//! Backing storage for the shared vertex and index buffers that chunk meshes are packed into.
//!
//! ## Key Features
//!
//! * One [`MeshBuffer`] trait over CPU memory and `wgpu` buffers
//! * Buffer usage analytics and memory tracking
//! * Bounds-checked writes
//!
//! The buffers never grow: their sizes come from the world configuration and placement
//! inside them is decided by the mesh manager's allocators.

use log::info;
use wgpu::{Buffer, Device, Queue};

use crate::{
    core::StResource,
    engine_state::{config::WorldConfig, error::EngineError},
};

/// Name of the shared vertex buffer
pub const VERTEX_BUFFER_NAME: &str = "Chunk Vertex Buffer";
/// Name of the shared index buffer
pub const INDEX_BUFFER_NAME: &str = "Chunk Index Buffer";

/// Analytics data for a mesh buffer
///
/// Tracks allocation size, the highest byte written and the number of writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    pub allocated_memory: u64,
    /// High-water mark of written bytes
    pub used_memory: u64,
    /// Number of times the buffer has been written to
    pub times_written: u64,
}

impl BufferAnalytics {
    fn new(allocated_memory: u64) -> Self {
        BufferAnalytics {
            allocated_memory,
            ..Default::default()
        }
    }

    fn record_write(&mut self, label: &str, offset: u64, data_size: u64) {
        if offset + data_size > self.allocated_memory {
            panic!(
                "Buffer write out of bounds for buffer name '{}': {}..{} exceeds {}",
                label,
                offset,
                offset + data_size,
                self.allocated_memory
            );
        }
        self.used_memory = self.used_memory.max(offset + data_size);
        self.times_written += 1;
    }
}

/// A fixed-size byte buffer that mesh data is copied into.
pub trait MeshBuffer {
    /// Name used in logs
    fn label(&self) -> &'static str;

    /// Size of the buffer in bytes
    fn size(&self) -> u64;

    /// Copies `data` into the buffer at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the write would exceed buffer bounds
    fn write(&mut self, offset: u64, data: &[u8]);

    /// Usage analytics of this buffer
    fn analytics(&self) -> BufferAnalytics;

    /// The GPU buffer to bind when drawing, if the data lives on a device
    fn gpu_buffer(&self) -> Option<&Buffer> {
        None
    }
}

/// Mesh buffer held in host memory.
///
/// Used when no GPU is available and by tests, which can read the written bytes back.
pub struct CpuMeshBuffer {
    label: &'static str,
    bytes: Vec<u8>,
    analytics: BufferAnalytics,
}

impl CpuMeshBuffer {
    /// Creates a zero-filled buffer of `size` bytes.
    pub fn new(label: &'static str, size: u64) -> Self {
        CpuMeshBuffer {
            label,
            bytes: vec![0; size as usize],
            analytics: BufferAnalytics::new(size),
        }
    }

    /// Current buffer contents.
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }
}

impl MeshBuffer for CpuMeshBuffer {
    fn label(&self) -> &'static str {
        self.label
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn write(&mut self, offset: u64, data: &[u8]) {
        self.analytics
            .record_write(self.label, offset, data.len() as u64);
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    fn analytics(&self) -> BufferAnalytics {
        self.analytics
    }
}

/// Mesh buffer living on the GPU, written through the device queue.
pub struct WgpuMeshBuffer {
    label: &'static str,
    buffer: Buffer,
    queue: StResource<Queue>,
    analytics: BufferAnalytics,
}

impl WgpuMeshBuffer {
    /// Creates a GPU buffer with the given usage plus `COPY_DST`.
    pub fn new(
        device: &Device,
        queue: StResource<Queue>,
        label: &'static str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        WgpuMeshBuffer {
            label,
            buffer,
            queue,
            analytics: BufferAnalytics::new(size),
        }
    }

    /// The underlying buffer, for binding in a render pass.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

impl MeshBuffer for WgpuMeshBuffer {
    fn label(&self) -> &'static str {
        self.label
    }

    fn size(&self) -> u64 {
        self.buffer.size()
    }

    fn write(&mut self, offset: u64, data: &[u8]) {
        self.analytics
            .record_write(self.label, offset, data.len() as u64);
        self.queue.get().write_buffer(&self.buffer, offset, data);
    }

    fn analytics(&self) -> BufferAnalytics {
        self.analytics
    }

    fn gpu_buffer(&self) -> Option<&Buffer> {
        Some(&self.buffer)
    }
}

/// The pair of shared buffers chunk meshes are packed into, plus the device owning them
/// when they live on a GPU.
pub struct MeshBuffers {
    /// Shared vertex buffer
    pub vertex: Box<dyn MeshBuffer>,
    /// Shared index buffer
    pub index: Box<dyn MeshBuffer>,
    device: Option<Device>,
}

impl MeshBuffers {
    /// Pairs two buffers that need no device.
    pub fn new(vertex: Box<dyn MeshBuffer>, index: Box<dyn MeshBuffer>) -> Self {
        MeshBuffers {
            vertex,
            index,
            device: None,
        }
    }

    /// Host-memory buffers sized from `config`.
    pub fn cpu(config: &WorldConfig) -> Self {
        Self::new(
            Box::new(CpuMeshBuffer::new(
                VERTEX_BUFFER_NAME,
                config.vertex_buffer_size,
            )),
            Box::new(CpuMeshBuffer::new(
                INDEX_BUFFER_NAME,
                config.index_buffer_size,
            )),
        )
    }

    /// The device the buffers were created on, for building pipelines and bind groups
    /// against them.
    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    /// GPU buffers on a headless device (no surface).
    ///
    /// # Errors
    ///
    /// [`EngineError::Gpu`] if no adapter or device is available, or if the configured
    /// sizes exceed the device's buffer limit.
    pub async fn wgpu_headless(config: &WorldConfig) -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::empty(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EngineError::Gpu(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                label: Some("Chunk Streaming Device"),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| EngineError::Gpu(e.to_string()))?;

        let max_buffer_size = device.limits().max_buffer_size;
        let largest = config.vertex_buffer_size.max(config.index_buffer_size);
        if largest > max_buffer_size {
            return Err(EngineError::Gpu(format!(
                "buffer size {} exceeds device limit {}",
                largest, max_buffer_size
            )));
        }

        info!(
            "Using adapter '{}' for shared mesh buffers",
            adapter.get_info().name
        );

        let queue = StResource::new(queue);
        Ok(MeshBuffers {
            vertex: Box::new(WgpuMeshBuffer::new(
                &device,
                queue.clone(),
                VERTEX_BUFFER_NAME,
                config.vertex_buffer_size,
                wgpu::BufferUsages::VERTEX,
            )),
            index: Box::new(WgpuMeshBuffer::new(
                &device,
                queue,
                INDEX_BUFFER_NAME,
                config.index_buffer_size,
                wgpu::BufferUsages::INDEX,
            )),
            device: Some(device),
        })
    }
}
