//! Coordinate bit-fiddling for the tile grid.
//!
//! Three coordinate spaces are in play:
//!
//! - A **tile coordinate** (tc) identifies a single tile anywhere in the
//!   (conceptually unbounded) signed 32-bit plane.
//! - A **chunk coordinate** (cc) identifies a `CHUNK_WIDTH`-by-`CHUNK_WIDTH`
//!   square of tiles; `tc >> CHUNK_BITS == cc`.
//! - A **region coordinate** (rc) identifies a `REGION_WIDTH`-by-`REGION_WIDTH`
//!   square of chunks, used only by the on-disk region format.
//!
//! Chunk coordinates pack into a single `u64` key for use as a hash map key
//! and for region-list ordering; the x component occupies the low half so
//! that ascending key order matches row-major (y-major, x-minor) iteration.

use vek::Vec2;

/// Width (and height) of a chunk, in tiles. Must be a power of two.
pub const CHUNK_WIDTH: i32 = 32;

/// log2(CHUNK_WIDTH).
pub const CHUNK_BITS: u32 = 5;

/// Number of tiles in a chunk.
pub const TILES_PER_CHUNK: usize = (CHUNK_WIDTH * CHUNK_WIDTH) as usize;

/// Width (and height) of a region, in chunks. Must be a power of two.
pub const REGION_WIDTH: i32 = 32;

/// log2(REGION_WIDTH).
pub const REGION_BITS: u32 = 5;

/// A tile coordinate: identifies a single tile in the signed 32-bit plane.
pub type TileCoord = Vec2<i32>;

/// A chunk coordinate: identifies a `CHUNK_WIDTH`-square of tiles.
pub type ChunkCoord = Vec2<i32>;

/// A region coordinate: identifies a `REGION_WIDTH`-square of chunks.
pub type RegionCoord = Vec2<i32>;

/// Arithmetic right shift that rounds toward negative infinity, matching the
/// "tile coordinate arithmetic-shifted right by log2(CHUNK_WIDTH)" wording of
/// the chunk-coordinate definition.
fn shift_floor(n: i32, bits: u32) -> i32 {
    n >> bits
}

/// Get the chunk coordinate containing a tile coordinate.
pub fn tc_get_cc(tc: TileCoord) -> ChunkCoord {
    Vec2::new(shift_floor(tc.x, CHUNK_BITS), shift_floor(tc.y, CHUNK_BITS))
}

/// Get the in-chunk local coordinate of a tile coordinate, in `0..CHUNK_WIDTH`.
pub fn tc_get_local(tc: TileCoord) -> Vec2<i32> {
    let mask = CHUNK_WIDTH - 1;
    Vec2::new(tc.x & mask, tc.y & mask)
}

/// Get the in-chunk local tile index (row-major: `x + y * CHUNK_WIDTH`) of a
/// tile coordinate, in `0..TILES_PER_CHUNK`.
pub fn tc_get_lti(tc: TileCoord) -> u16 {
    let local = tc_get_local(tc);
    (local.x + local.y * CHUNK_WIDTH) as u16
}

/// Convert a local tile index back to its in-chunk local coordinate.
pub fn lti_to_local(lti: u16) -> Vec2<i32> {
    let lti = lti as i32;
    Vec2::new(lti % CHUNK_WIDTH, lti / CHUNK_WIDTH)
}

/// Combine a chunk coordinate and an in-chunk local coordinate into a tile
/// coordinate.
pub fn cc_local_to_tc(cc: ChunkCoord, local: Vec2<i32>) -> TileCoord {
    debug_assert!(local.x >= 0 && local.x < CHUNK_WIDTH);
    debug_assert!(local.y >= 0 && local.y < CHUNK_WIDTH);
    Vec2::new((cc.x << CHUNK_BITS) | local.x, (cc.y << CHUNK_BITS) | local.y)
}

/// Combine a chunk coordinate and a local tile index into a tile coordinate.
pub fn cc_lti_to_tc(cc: ChunkCoord, lti: u16) -> TileCoord {
    cc_local_to_tc(cc, lti_to_local(lti))
}

/// Pack a chunk coordinate into its 64-bit key. X occupies the low half, so
/// ascending key order iterates row-major (y-major, x-minor).
pub fn cc_to_key(cc: ChunkCoord) -> u64 {
    ((cc.y as u32 as u64) << 32) | (cc.x as u32 as u64)
}

/// Unpack a 64-bit chunk key back into a chunk coordinate.
pub fn key_to_cc(key: u64) -> ChunkCoord {
    Vec2::new((key & 0xffff_ffff) as u32 as i32, (key >> 32) as u32 as i32)
}

/// Get the region coordinate containing a chunk coordinate.
pub fn cc_get_rc(cc: ChunkCoord) -> RegionCoord {
    Vec2::new(shift_floor(cc.x, REGION_BITS), shift_floor(cc.y, REGION_BITS))
}

/// Get the in-region local chunk coordinate, in `0..REGION_WIDTH`.
pub fn cc_get_local(cc: ChunkCoord) -> Vec2<i32> {
    let mask = REGION_WIDTH - 1;
    Vec2::new(cc.x & mask, cc.y & mask)
}

/// Get the in-region header index (row-major) of a chunk coordinate.
pub fn cc_get_region_index(cc: ChunkCoord) -> usize {
    let local = cc_get_local(cc);
    (local.x + local.y * REGION_WIDTH) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_to_chunk_round_trips() {
        for &(x, y) in &[(0, 0), (31, 31), (32, 0), (-1, -1), (-32, -32), (-33, 5)] {
            let tc = Vec2::new(x, y);
            let cc = tc_get_cc(tc);
            let lti = tc_get_lti(tc);
            assert_eq!(cc_lti_to_tc(cc, lti), tc);
        }
    }

    #[test]
    fn negative_coords_shift_toward_negative_infinity() {
        assert_eq!(tc_get_cc(Vec2::new(-1, -1)), Vec2::new(-1, -1));
        assert_eq!(tc_get_cc(Vec2::new(-32, -32)), Vec2::new(-1, -1));
        assert_eq!(tc_get_cc(Vec2::new(-33, 0)), Vec2::new(-2, 0));
    }

    #[test]
    fn lti_is_row_major() {
        assert_eq!(tc_get_lti(Vec2::new(0, 0)), 0);
        assert_eq!(tc_get_lti(Vec2::new(1, 0)), 1);
        assert_eq!(tc_get_lti(Vec2::new(0, 1)), CHUNK_WIDTH as u16);
    }

    #[test]
    fn chunk_key_orders_row_major() {
        let a = cc_to_key(Vec2::new(0, 0));
        let b = cc_to_key(Vec2::new(1, 0));
        let c = cc_to_key(Vec2::new(0, 1));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn chunk_key_round_trips() {
        for &(x, y) in &[(0, 0), (-5, 3), (i32::MIN, i32::MAX), (i32::MAX, i32::MIN)] {
            let cc = Vec2::new(x, y);
            assert_eq!(key_to_cc(cc_to_key(cc)), cc);
        }
    }

    #[test]
    fn region_grouping() {
        assert_eq!(cc_get_rc(Vec2::new(31, 31)), Vec2::new(0, 0));
        assert_eq!(cc_get_rc(Vec2::new(32, 0)), Vec2::new(1, 0));
        assert_eq!(cc_get_rc(Vec2::new(-1, 0)), Vec2::new(-1, 0));
    }
}
