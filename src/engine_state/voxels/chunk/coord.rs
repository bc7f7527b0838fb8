use std::fmt;

use cgmath::Point3;

use super::{CHUNK_SIZE_X, CHUNK_SIZE_Z};

/// Horizontal position of a chunk column, in chunks.
///
/// The sole identity key for chunks. Ordered by `x`, then `z`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Column index along the world X axis
    pub x: i32,
    /// Column index along the world Z axis
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a coordinate from chunk indices.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The column containing the given world-space position.
    pub fn from_world(position: Point3<f32>) -> Self {
        Self::from_block(position.x.floor() as i32, position.z.floor() as i32)
    }

    /// The column containing the given world block coordinates.
    pub fn from_block(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE_X as i32),
            z: block_z.div_euclid(CHUNK_SIZE_Z as i32),
        }
    }

    /// World block coordinates of this column's minimum corner (y = 0).
    pub fn block_origin(&self) -> Point3<i32> {
        Point3::new(
            self.x * CHUNK_SIZE_X as i32,
            0,
            self.z * CHUNK_SIZE_Z as i32,
        )
    }

    /// Chebyshev (chessboard) distance in chunks.
    pub fn chebyshev_distance(&self, other: &ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// The four horizontal neighbours, ordered north (-Z), south (+Z), east (+X), west (-X).
    pub fn neighbors(&self) -> [ChunkCoord; 4] {
        [
            Self::new(self.x, self.z - 1),
            Self::new(self.x, self.z + 1),
            Self::new(self.x + 1, self.z),
            Self::new(self.x - 1, self.z),
        ]
    }

    /// Every coordinate within `radius` chunks (Chebyshev) of `self`, X-major.
    pub fn square_around(&self, radius: i32) -> impl Iterator<Item = ChunkCoord> {
        let center = *self;
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius).map(move |dz| ChunkCoord::new(center.x + dx, center.z + dz))
        })
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
