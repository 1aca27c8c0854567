//! Binary encode/decode of a single `Chunk`'s tiles — the payload that
//! `RegionStore` wraps with a length prefix and sector padding (spec §4.4,
//! "Chunk serialization wire format" in spec §6).
//!
//! Version-tagged so a future format change can be detected rather than
//! silently misinterpreted; round-trips every `TileData` field.

use tile_grid::chunk::Chunk;
use tile_grid::coord::{ChunkCoord, TILES_PER_CHUNK};
use tile_grid::tile::{TileData, TileKind};
use tile_grid::{Direction, SignalState, CHUNK_WIDTH};

use crate::error::{CircuitError, Result};

const CHUNK_FORMAT_VERSION: u8 = 1;

/// Bytes used per tile: kind, direction, state1, state2, highlight, meta.
const BYTES_PER_TILE: usize = 6;

pub fn encode_chunk(chunk: &Chunk) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + TILES_PER_CHUNK * BYTES_PER_TILE);
    out.push(CHUNK_FORMAT_VERSION);
    out.push(CHUNK_WIDTH as u8);
    for tile in chunk.tiles() {
        out.push(tile.kind as u8);
        out.push(tile.direction as u8);
        out.push(tile.state1 as u8);
        out.push(tile.state2 as u8);
        out.push(tile.highlight as u8);
        out.push(tile.meta);
    }
    out
}

pub fn decode_chunk(coords: ChunkCoord, bytes: &[u8], filename: &str) -> Result<Chunk> {
    if bytes.len() < 2 {
        return Err(storage_error(filename, "chunk payload shorter than its format header"));
    }
    let version = bytes[0];
    if version != CHUNK_FORMAT_VERSION {
        return Err(storage_error(filename, &format!("unsupported chunk format version {}", version)));
    }
    let width = bytes[1] as i32;
    if width != CHUNK_WIDTH {
        return Err(storage_error(
            filename,
            &format!("chunk width {} does not match this build's {}", width, CHUNK_WIDTH),
        ));
    }
    let expected = 2 + TILES_PER_CHUNK * BYTES_PER_TILE;
    if bytes.len() != expected {
        return Err(storage_error(
            filename,
            &format!("expected {} bytes of chunk payload, found {}", expected, bytes.len()),
        ));
    }

    let mut tiles = Box::new([TileData::blank(); TILES_PER_CHUNK]);
    for (i, tile) in tiles.iter_mut().enumerate() {
        let base = 2 + i * BYTES_PER_TILE;
        let kind = TileKind::from_u8(bytes[base])
            .ok_or_else(|| storage_error(filename, &format!("invalid tile kind byte {} at tile {}", bytes[base], i)))?;
        let direction = Direction::from_u8(bytes[base + 1]).ok_or_else(|| {
            storage_error(filename, &format!("invalid direction byte {} at tile {}", bytes[base + 1], i))
        })?;
        let state1 = decode_state(bytes[base + 2], i, filename)?;
        let state2 = decode_state(bytes[base + 3], i, filename)?;
        *tile = TileData {
            kind,
            direction,
            state1,
            state2,
            highlight: bytes[base + 4] != 0,
            meta: bytes[base + 5],
        };
    }
    Ok(Chunk::from_tiles(coords, tiles))
}

fn decode_state(byte: u8, tile_index: usize, filename: &str) -> Result<SignalState> {
    match byte {
        0 => Ok(SignalState::Disconnected),
        1 => Ok(SignalState::Low),
        2 => Ok(SignalState::High),
        3 => Ok(SignalState::Middle),
        other => Err(storage_error(filename, &format!("invalid signal state byte {} at tile {}", other, tile_index))),
    }
}

fn storage_error(filename: &str, locator: &str) -> CircuitError {
    CircuitError::FileStorageError { filename: filename.to_string(), locator: locator.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_grid::chunk::UpdateCategory;
    use vek::Vec2;

    #[test]
    fn chunk_round_trips_through_bytes() {
        let mut chunk = Chunk::new_blank(Vec2::new(3, -2));
        chunk.set_tile(
            5,
            TileData {
                kind: TileKind::GateXnor,
                direction: Direction::West,
                state1: SignalState::Middle,
                state2: SignalState::Low,
                highlight: true,
                meta: 42,
            },
        );
        chunk.enqueue(UpdateCategory::Gate, 5);

        let bytes = encode_chunk(&chunk);
        let decoded = decode_chunk(chunk.coords, &bytes, "test").unwrap();

        assert_eq!(decoded.coords, chunk.coords);
        for i in 0..TILES_PER_CHUNK as u16 {
            assert_eq!(decoded.tile(i), chunk.tile(i));
        }
    }

    #[test]
    fn bad_version_byte_is_rejected() {
        let chunk = Chunk::new_blank(Vec2::new(0, 0));
        let mut bytes = encode_chunk(&chunk);
        bytes[0] = 99;
        assert!(decode_chunk(chunk.coords, &bytes, "test").is_err());
    }
}
