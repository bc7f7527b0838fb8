//! # Block Side Module
//!
//! The six faces of a voxel block and the direction each one faces.

use cgmath::Vector3;

/// One of the six axis-aligned faces of a block.
///
/// The discriminant is the normal id packed into terrain vertices, so the order is fixed:
/// [TOP, BOTTOM, EAST, WEST, SOUTH, NORTH]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// Facing positive Y
    TOP = 0,

    /// Facing negative Y
    BOTTOM = 1,

    /// Facing positive X
    EAST = 2,

    /// Facing negative X
    WEST = 3,

    /// Facing positive Z
    SOUTH = 4,

    /// Facing negative Z
    NORTH = 5,
}

impl BlockSide {
    /// Returns all six faces in normal-id order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::TOP,
            BlockSide::BOTTOM,
            BlockSide::EAST,
            BlockSide::WEST,
            BlockSide::SOUTH,
            BlockSide::NORTH,
        ]
    }

    /// Offset from a block to the neighbour this face looks at.
    pub fn neighbor_offset(&self) -> Vector3<i32> {
        match self {
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::EAST => Vector3::new(1, 0, 0),
            BlockSide::WEST => Vector3::new(-1, 0, 0),
            BlockSide::SOUTH => Vector3::new(0, 0, 1),
            BlockSide::NORTH => Vector3::new(0, 0, -1),
        }
    }

    /// Whether this is one of the four vertical faces.
    pub fn is_horizontal(&self) -> bool {
        !matches!(self, BlockSide::TOP | BlockSide::BOTTOM)
    }
}
