//! Chunked tile-grid storage for the circuit sandbox.
//!
//! This crate owns the "geometry and storage" half of the simulation: tile
//! coordinate math, the `Chunk` container, and the pure per-tile `TileData`
//! operations (`rotate`/`flip`/`alternative_form`/`check_output`). It knows
//! nothing about ticks, traversal, or persistence — those live in
//! `circuit_sim`, which depends on this crate the way the teacher's
//! `minecraft` package depends on `chunk_data`.
//!
//! Three coordinate spaces compose: tile coordinate (tc) -> chunk coordinate
//! (cc) -> region coordinate (rc), each a right-shift by the next width's
//! log2. See `coord` for the bit math and `chunk`/`tile` for the data these
//! coordinates index into.

pub mod chunk;
pub mod coord;
pub mod direction;
pub mod state;
pub mod tile;

pub use chunk::{Chunk, UpdateCategory};
pub use coord::{ChunkCoord, RegionCoord, TileCoord, CHUNK_WIDTH, REGION_WIDTH, TILES_PER_CHUNK};
pub use direction::Direction;
pub use state::SignalState;
pub use tile::{evaluate_gate, wire_connects, TileData, TileKind};
