use crate::engine_state::{
    rendering::vertex::TerrainVertex, voxels::chunk::SUBCHUNK_COUNT,
};

/// Index pattern of one quad: two triangles over corners `0..4`.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// CPU-side indexed geometry made of packed terrain vertices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedTerrainMesh {
    /// Packed vertices, four per face
    pub vertices: Vec<TerrainVertex>,
    /// Triangle list indices into `vertices`, six per face
    pub indices: Vec<u32>,
}

impl PackedTerrainMesh {
    /// Appends one quad given its corners in winding order.
    pub fn add_face(&mut self, corners: [TerrainVertex; 4]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&corners);
        self.indices.extend(QUAD_INDICES.iter().map(|index| base + index));
    }

    /// Whether the mesh has no geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of quads.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Vertex data as raw bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes for upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Solid-pass and water-pass geometry of one subchunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubchunkMeshes {
    /// Opaque geometry
    pub solid: PackedTerrainMesh,
    /// Water geometry, drawn in a separate translucent pass
    pub water: PackedTerrainMesh,
}

/// Generated geometry for a whole column, one entry per subchunk slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkMeshes {
    /// Subchunk meshes, bottom to top
    pub subchunks: Vec<SubchunkMeshes>,
}

impl ChunkMeshes {
    /// A column with no geometry in any subchunk.
    pub fn empty() -> Self {
        ChunkMeshes {
            subchunks: vec![SubchunkMeshes::default(); SUBCHUNK_COUNT],
        }
    }

    /// Total quads across all subchunks and both passes.
    pub fn face_count(&self) -> usize {
        self.subchunks
            .iter()
            .map(|mesh| mesh.solid.face_count() + mesh.water.face_count())
            .sum()
    }
}
