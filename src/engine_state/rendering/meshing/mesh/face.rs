use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

/// Corners of the unit cube.
///
/// ```text
///     7 ------ 6
///    /|       /|
///   3 ------ 2 |
///   | 4 -----|-5
///   |/       |/
///   0 ------ 1
/// ```
/// Index 0 is the origin, X grows to the right, Y up, Z away from the viewer.
pub const CUBE_CORNERS: [Point3<u32>; 8] = [
    Point3 { x: 0, y: 0, z: 0 },
    Point3 { x: 1, y: 0, z: 0 },
    Point3 { x: 1, y: 1, z: 0 },
    Point3 { x: 0, y: 1, z: 0 },
    Point3 { x: 0, y: 0, z: 1 },
    Point3 { x: 1, y: 0, z: 1 },
    Point3 { x: 1, y: 1, z: 1 },
    Point3 { x: 0, y: 1, z: 1 },
];

/// Corner indices of each face, indexed by `BlockSide as usize`, wound so that the
/// triangles `(0, 1, 2)` and `(2, 3, 0)` face outward.
pub const CUBE_FACE_CORNERS: [[usize; 4]; 6] = [
    [3, 7, 6, 2], // TOP
    [0, 1, 5, 4], // BOTTOM
    [1, 2, 6, 5], // EAST
    [4, 7, 3, 0], // WEST
    [5, 6, 7, 4], // SOUTH
    [0, 3, 2, 1], // NORTH
];

/// The four corner positions of `side` for the block at `(x, y, z)`.
pub fn face_corners(x: u32, y: u32, z: u32, side: BlockSide) -> [Point3<u32>; 4] {
    CUBE_FACE_CORNERS[side as usize].map(|corner| {
        let offset = CUBE_CORNERS[corner];
        Point3::new(x + offset.x, y + offset.y, z + offset.z)
    })
}
