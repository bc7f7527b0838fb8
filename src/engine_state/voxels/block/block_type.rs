//! # Block Type Module
//!
//! The closed set of block types the world is built from, with conversions from the compact
//! storage integer and from the names used in block registry files.

use num_derive::FromPrimitive;
use phf::phf_map;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The discriminant is the value stored in chunk voxel arrays. `FromPrimitive` converts it
/// back when reading voxels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Never meshed.
    AIR = 0,

    /// Indestructible floor layer at the bottom of every column.
    BEDROCK = 1,

    /// Translucent liquid, meshed into the separate water pass.
    WATER = 2,

    /// Plain dirt, found just below the surface.
    DIRT = 3,

    /// Dirt with grass on top. Top, bottom and sides use different textures.
    GRASS = 4,

    /// Bulk rock below the dirt layer.
    STONE = 5,
}

/// Lookup from registry file names to block types.
static BLOCK_TYPE_NAMES: phf::Map<&'static str, BlockType> = phf_map! {
    "air" => BlockType::AIR,
    "bedrock" => BlockType::BEDROCK,
    "water" => BlockType::WATER,
    "dirt" => BlockType::DIRT,
    "grass" => BlockType::GRASS,
    "stone" => BlockType::STONE,
};

impl BlockType {
    /// Number of block types.
    pub const COUNT: usize = 6;

    /// Every block type in discriminant order.
    pub fn all() -> [BlockType; Self::COUNT] {
        [
            BlockType::AIR,
            BlockType::BEDROCK,
            BlockType::WATER,
            BlockType::DIRT,
            BlockType::GRASS,
            BlockType::STONE,
        ]
    }

    /// Converts a stored `BlockTypeSize` back into a `BlockType`.
    ///
    /// # Returns
    /// `None` if the value does not name a block type.
    pub fn from_int(btype: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u16(btype)
    }

    /// Resolves a registry name (case-insensitive) to a block type.
    pub fn from_name(name: &str) -> Option<Self> {
        BLOCK_TYPE_NAMES
            .get(name.to_ascii_lowercase().as_str())
            .copied()
    }

    /// The registry name of this block type.
    pub fn name(&self) -> &'static str {
        match self {
            BlockType::AIR => "air",
            BlockType::BEDROCK => "bedrock",
            BlockType::WATER => "water",
            BlockType::DIRT => "dirt",
            BlockType::GRASS => "grass",
            BlockType::STONE => "stone",
        }
    }
}
