//! # Block Module
//!
//! Block values stored in chunks and the registry describing how each block type behaves.
//!
//! Chunks store nothing but a compact [`Block`] per voxel. Everything else (solidity,
//! water, textures, UVs) is resolved through a [`BlockRegistry`], a read-only context object
//! built once at startup and shared with worker tasks through `Arc`.
//!
//! ## Registry files
//!
//! ```json
//! {
//!   "blocks": [
//!     { "name": "stone", "solid": true, "textures": { "all": "stone" } },
//!     { "name": "grass", "solid": true,
//!       "textures": { "top": "grass_top", "bottom": "dirt", "sides": "grass_side" } },
//!     { "name": "water", "water": true, "textures": { "all": "water" } }
//!   ]
//! }
//! ```
//!
//! Face textures resolve as: explicit face, then `sides` (for the four vertical faces), then
//! `all`. Texture names are interned into dense ids in first-seen order.

use std::{collections::HashMap, path::Path};

use block_side::BlockSide;
use block_type::BlockType;
use serde::Deserialize;

use crate::engine_state::error::EngineError;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in chunk storage.
pub type BlockTypeSize = u16;

/// Largest texture id that fits the packed vertex format (10 bits).
pub const MAX_TEXTURE_ID: u32 = 0x3FF;

/// Packed UV units per texture edge (0 = 0.0, 16 = 1.0).
pub const UV_UNITS: u8 = 16;

/// Per-corner UVs of one face, in packed units.
pub type FaceUv = [[u8; 2]; 4];

const DEFAULT_FACE_UV: FaceUv = [[0, 0], [UV_UNITS, 0], [UV_UNITS, UV_UNITS], [0, UV_UNITS]];

/// A single voxel.
///
/// `#[repr(transparent)]` over the type id so chunk storage can be viewed as raw bytes.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Block(BlockTypeSize);

impl Block {
    /// The empty block.
    pub const AIR: Block = Block(BlockType::AIR as BlockTypeSize);

    /// Creates a block of the given type.
    pub const fn new(block_type: BlockType) -> Self {
        Block(block_type as BlockTypeSize)
    }

    /// The stored type id.
    pub fn id(&self) -> BlockTypeSize {
        self.0
    }

    /// The block type, treating unknown ids as air.
    pub fn block_type(&self) -> BlockType {
        BlockType::from_int(self.0).unwrap_or(BlockType::AIR)
    }

    /// Whether the block produces geometry at all. Unknown ids are air, as in the registry.
    pub fn has_mesh(&self) -> bool {
        self.block_type() != BlockType::AIR
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::AIR
    }
}

/// Resolved properties of one block type.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockData {
    /// Occludes neighbouring solid faces
    pub is_solid: bool,
    /// Rendered in the water pass and culled against other water
    pub is_water: bool,
    /// Texture id per face, indexed by `BlockSide as usize`
    pub face_textures: [u32; 6],
    /// Corner UVs per face, indexed by `BlockSide as usize`
    pub face_uvs: [FaceUv; 6],
}

impl BlockData {
    fn air() -> Self {
        BlockData {
            is_solid: false,
            is_water: false,
            face_textures: [0; 6],
            face_uvs: [DEFAULT_FACE_UV; 6],
        }
    }
}

/// Read-only table of block properties, indexed by block type.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    blocks: Vec<BlockData>,
    texture_names: Vec<String>,
}

#[derive(Deserialize)]
struct RegistryDefinition {
    blocks: Vec<BlockDefinition>,
}

#[derive(Deserialize)]
struct BlockDefinition {
    name: String,
    #[serde(default)]
    solid: bool,
    #[serde(default)]
    water: bool,
    #[serde(default)]
    textures: FaceTextureNames,
    /// Corner UVs in 0.0..=1.0, shared by every face.
    #[serde(default)]
    uv: Option<[[f32; 2]; 4]>,
}

#[derive(Deserialize, Default)]
struct FaceTextureNames {
    all: Option<String>,
    sides: Option<String>,
    top: Option<String>,
    bottom: Option<String>,
    east: Option<String>,
    west: Option<String>,
    south: Option<String>,
    north: Option<String>,
}

impl FaceTextureNames {
    fn resolve(&self, side: BlockSide) -> Option<&str> {
        let explicit = match side {
            BlockSide::TOP => &self.top,
            BlockSide::BOTTOM => &self.bottom,
            BlockSide::EAST => &self.east,
            BlockSide::WEST => &self.west,
            BlockSide::SOUTH => &self.south,
            BlockSide::NORTH => &self.north,
        };
        explicit
            .as_deref()
            .or_else(|| side.is_horizontal().then(|| self.sides.as_deref()).flatten())
            .or(self.all.as_deref())
    }
}

impl BlockRegistry {
    /// The registry used when no registry file is supplied.
    pub fn builtin() -> Self {
        let json = r#"{
            "blocks": [
                { "name": "bedrock", "solid": true, "textures": { "all": "bedrock" } },
                { "name": "water", "water": true, "textures": { "all": "water" } },
                { "name": "dirt", "solid": true, "textures": { "all": "dirt" } },
                { "name": "grass", "solid": true,
                  "textures": { "top": "grass_top", "bottom": "dirt", "sides": "grass_side" } },
                { "name": "stone", "solid": true, "textures": { "all": "stone" } }
            ]
        }"#;
        match Self::from_json_str(json) {
            Ok(registry) => registry,
            Err(err) => unreachable!("built-in block registry is invalid: {}", err),
        }
    }

    /// Loads a registry file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parses a registry definition.
    ///
    /// # Errors
    /// Unknown or duplicate block names, missing non-air blocks, faces without a texture
    /// and more textures than the vertex format can address.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let definition: RegistryDefinition = serde_json::from_str(json)?;

        let mut blocks: Vec<Option<BlockData>> = vec![None; BlockType::COUNT];
        blocks[BlockType::AIR as usize] = Some(BlockData::air());

        let mut texture_names: Vec<String> = Vec::new();
        let mut texture_ids: HashMap<String, u32> = HashMap::new();

        for block in definition.blocks {
            let block_type = BlockType::from_name(&block.name).ok_or_else(|| {
                EngineError::Registry(format!("unknown block '{}'", block.name))
            })?;
            if block_type == BlockType::AIR {
                continue;
            }
            if blocks[block_type as usize].is_some() {
                return Err(EngineError::Registry(format!(
                    "block '{}' defined twice",
                    block.name
                )));
            }

            let mut face_textures = [0u32; 6];
            for side in BlockSide::all() {
                let texture = block.textures.resolve(side).ok_or_else(|| {
                    EngineError::Registry(format!(
                        "block '{}' has no texture for its {:?} face",
                        block.name, side
                    ))
                })?;
                let next_id = texture_names.len() as u32;
                let id = *texture_ids.entry(texture.to_owned()).or_insert_with(|| {
                    texture_names.push(texture.to_owned());
                    next_id
                });
                if id > MAX_TEXTURE_ID {
                    return Err(EngineError::Registry(format!(
                        "more than {} textures",
                        MAX_TEXTURE_ID + 1
                    )));
                }
                face_textures[side as usize] = id;
            }

            let uv = block.uv.map(pack_uv).unwrap_or(DEFAULT_FACE_UV);

            blocks[block_type as usize] = Some(BlockData {
                is_solid: block.solid,
                is_water: block.water,
                face_textures,
                face_uvs: [uv; 6],
            });
        }

        let blocks = blocks
            .into_iter()
            .zip(BlockType::all())
            .map(|(data, block_type)| {
                data.ok_or_else(|| {
                    EngineError::Registry(format!("block '{}' is not defined", block_type.name()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BlockRegistry {
            blocks,
            texture_names,
        })
    }

    /// Resolved properties of a block.
    pub fn data(&self, block: Block) -> &BlockData {
        &self.blocks[block.block_type() as usize]
    }

    /// Whether the block occludes neighbouring solid faces.
    pub fn is_solid(&self, block: Block) -> bool {
        self.data(block).is_solid
    }

    /// Whether the block belongs to the water pass.
    pub fn is_water(&self, block: Block) -> bool {
        self.data(block).is_water
    }

    /// Whether the block produces geometry at all.
    pub fn has_mesh(&self, block: Block) -> bool {
        block.has_mesh()
    }

    /// Texture id of one face.
    pub fn face_texture(&self, block: Block, side: BlockSide) -> u32 {
        self.data(block).face_textures[side as usize]
    }

    /// Corner UVs of one face.
    pub fn face_uv(&self, block: Block, side: BlockSide) -> &FaceUv {
        &self.data(block).face_uvs[side as usize]
    }

    /// Interned texture names; a texture id indexes this slice.
    pub fn texture_names(&self) -> &[String] {
        &self.texture_names
    }
}

fn pack_uv(uv: [[f32; 2]; 4]) -> FaceUv {
    uv.map(|corner| corner.map(|c| (c.clamp(0.0, 1.0) * UV_UNITS as f32).round() as u8))
}
