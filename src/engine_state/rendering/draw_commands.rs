//! Indirect draw commands for the chunks inside the render window.
//!
//! Each uploaded subchunk pass becomes one `DrawIndexedIndirectArgs` into the shared vertex
//! and index buffers, paired with the world-space origin of its subchunk so the vertex
//! shader can place the chunk-local packed positions.

use cgmath::Vector3;
use wgpu::util::DrawIndexedIndirectArgs;

use super::meshing::GpuMeshHandle;
use crate::engine_state::voxels::chunk::{Chunk, ChunkCoord, SUBCHUNK_SIZE_Y};

/// Draw lists for the solid and water passes, rebuilt once per frame.
#[derive(Default)]
pub struct DrawCommandBuilder {
    solid: Vec<DrawIndexedIndirectArgs>,
    solid_origins: Vec<[i32; 4]>,
    water: Vec<DrawIndexedIndirectArgs>,
    water_origins: Vec<[i32; 4]>,
}

impl DrawCommandBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the draw lists with every handle of the chunks within `render_radius` of
    /// `center`, in iteration order of `chunks`.
    pub fn rebuild<'a>(
        &mut self,
        chunks: impl IntoIterator<Item = (&'a ChunkCoord, &'a Chunk)>,
        center: ChunkCoord,
        render_radius: i32,
    ) {
        self.clear();

        for (coord, chunk) in chunks {
            if coord.chebyshev_distance(&center) > render_radius {
                continue;
            }
            let Some(gpu_mesh) = chunk.gpu_mesh() else {
                continue;
            };

            let chunk_origin = coord.block_origin();
            for (index, subchunk) in gpu_mesh.subchunks().enumerate() {
                let origin = chunk_origin + Vector3::new(0, (index * SUBCHUNK_SIZE_Y) as i32, 0);
                let origin = [origin.x, origin.y, origin.z, 0];

                if let Some(command) = subchunk.solid.as_ref().and_then(draw_command) {
                    self.solid.push(command);
                    self.solid_origins.push(origin);
                }
                if let Some(command) = subchunk.water.as_ref().and_then(draw_command) {
                    self.water.push(command);
                    self.water_origins.push(origin);
                }
            }
        }
    }

    /// Drops every command.
    pub fn clear(&mut self) {
        self.solid.clear();
        self.solid_origins.clear();
        self.water.clear();
        self.water_origins.clear();
    }

    /// Opaque-pass commands.
    pub fn solid_commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.solid
    }

    /// Subchunk origins matching [`solid_commands`](Self::solid_commands).
    pub fn solid_origins(&self) -> &[[i32; 4]] {
        &self.solid_origins
    }

    /// Water-pass commands.
    pub fn water_commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.water
    }

    /// Subchunk origins matching [`water_commands`](Self::water_commands).
    pub fn water_origins(&self) -> &[[i32; 4]] {
        &self.water_origins
    }

    /// Total commands over both passes.
    pub fn command_count(&self) -> usize {
        self.solid.len() + self.water.len()
    }

    /// Opaque-pass commands laid out for an indirect buffer.
    pub fn solid_bytes(&self) -> Vec<u8> {
        as_bytes(&self.solid)
    }

    /// Water-pass commands laid out for an indirect buffer.
    pub fn water_bytes(&self) -> Vec<u8> {
        as_bytes(&self.water)
    }
}

fn draw_command(handle: &GpuMeshHandle) -> Option<DrawIndexedIndirectArgs> {
    let index = handle.index_region()?;
    let index_size = std::mem::size_of::<u32>() as u64;

    Some(DrawIndexedIndirectArgs {
        index_count: (index.size / index_size) as u32,
        instance_count: 1,
        first_index: (index.offset / index_size) as u32,
        base_vertex: (handle.vertex_region().offset / handle.vertex_stride()) as i32,
        first_instance: 0,
    })
}

fn as_bytes(commands: &[DrawIndexedIndirectArgs]) -> Vec<u8> {
    commands
        .iter()
        .flat_map(|command| command.as_bytes())
        .copied()
        .collect()
}
