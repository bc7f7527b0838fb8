//! Vertex data structures and layouts for terrain rendering.
//!
//! Terrain vertices are bit-packed into two `u32` words so a chunk's geometry uploads as
//! 8 bytes per vertex. The shader unpacks them with the layout documented on
//! [`TerrainVertex`].

use crate::engine_state::voxels::block::block_side::BlockSide;

/// A bit-packed terrain vertex.
///
/// # Memory Layout
/// `data1`:
/// - bits 0-4: X inside the subchunk (0-16)
/// - bits 5-9: Y inside the subchunk (0-16)
/// - bits 10-14: Z inside the subchunk (0-16)
/// - bits 15-18: sub-block Y offset (0-15, lowers liquid surfaces)
///
/// `data2`:
/// - bits 0-2: face normal id (`BlockSide as u32`)
/// - bits 3-7: U in sixteenths of the texture (0-16)
/// - bits 8-12: V in sixteenths of the texture (0-16)
/// - bits 13-22: texture id (0-1023)
///
/// Total size: 8 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    data1: u32,
    data2: u32,
}

impl TerrainVertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: wgpu::BufferAddress = std::mem::size_of::<TerrainVertex>() as wgpu::BufferAddress;

    /// Packs a vertex. Out-of-range fields are truncated to their bit width.
    ///
    /// # Arguments
    /// * `x`, `y`, `z` - Corner position inside the subchunk
    /// * `y_offset` - Downward sub-block offset
    /// * `u`, `v` - Texture coordinates in sixteenths
    /// * `texture_id` - Index into the texture array
    /// * `normal` - Face the vertex belongs to
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x: u32,
        y: u32,
        z: u32,
        y_offset: u32,
        u: u32,
        v: u32,
        texture_id: u32,
        normal: BlockSide,
    ) -> Self {
        let data1 = (x & 0x1F) | ((y & 0x1F) << 5) | ((z & 0x1F) << 10) | ((y_offset & 0xF) << 15);
        let data2 = (normal as u32 & 0x7)
            | ((u & 0x1F) << 3)
            | ((v & 0x1F) << 8)
            | ((texture_id & 0x3FF) << 13);
        TerrainVertex { data1, data2 }
    }

    /// X inside the subchunk.
    pub fn x(&self) -> u32 {
        self.data1 & 0x1F
    }

    /// Y inside the subchunk.
    pub fn y(&self) -> u32 {
        (self.data1 >> 5) & 0x1F
    }

    /// Z inside the subchunk.
    pub fn z(&self) -> u32 {
        (self.data1 >> 10) & 0x1F
    }

    /// Sub-block Y offset.
    pub fn y_offset(&self) -> u32 {
        (self.data1 >> 15) & 0xF
    }

    /// Face normal id.
    pub fn normal_id(&self) -> u32 {
        self.data2 & 0x7
    }

    /// U in sixteenths.
    pub fn u(&self) -> u32 {
        (self.data2 >> 3) & 0x1F
    }

    /// V in sixteenths.
    pub fn v(&self) -> u32 {
        (self.data2 >> 8) & 0x1F
    }

    /// Texture id.
    pub fn texture_id(&self) -> u32 {
        (self.data2 >> 13) & 0x3FF
    }

    /// Returns the vertex buffer layout description for the terrain pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: data1 (u32)
    /// - `location = 1`: data2 (u32)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Uint32,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<u32>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Uint32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_layout() {
        let vertex = TerrainVertex::new(16, 3, 15, 2, 16, 8, 1023, BlockSide::NORTH);
        assert_eq!(vertex.x(), 16);
        assert_eq!(vertex.y(), 3);
        assert_eq!(vertex.z(), 15);
        assert_eq!(vertex.y_offset(), 2);
        assert_eq!(vertex.normal_id(), 5);
        assert_eq!(vertex.u(), 16);
        assert_eq!(vertex.v(), 8);
        assert_eq!(vertex.texture_id(), 1023);

        let raw: [u32; 2] = bytemuck::cast(vertex);
        assert_eq!(raw[0], 16 | (3 << 5) | (15 << 10) | (2 << 15));
        assert_eq!(raw[1], 5 | (16 << 3) | (8 << 8) | (1023 << 13));
    }

    #[test]
    fn test_layout_stride() {
        assert_eq!(TerrainVertex::STRIDE, 8);
        assert_eq!(TerrainVertex::desc().array_stride, 8);
        assert_eq!(TerrainVertex::desc().attributes.len(), 2);
    }
}
