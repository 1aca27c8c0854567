//! Crate-wide error type. `StateConflict` is deliberately not a variant here:
//! spec calls it out as "not an error" — it surfaces instead through
//! `TickSummary::conflicts` and `TraversalEngine::paused`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CircuitError {
    /// Tile access outside the board's configured `max_size`.
    #[error("coordinate ({x}, {y}) is outside the board's bounds")]
    InvalidCoordinate { x: i32, y: i32 },

    /// Any structural problem with a legacy or region file.
    #[error("{filename}: {locator}")]
    FileStorageError { filename: String, locator: String },

    /// Invariant violation while allocating or freeing sectors. Always a
    /// bug in the pool's own bookkeeping, never user-caused.
    #[error("sector pool invariant violated: {0}")]
    SectorPoolError(String),

    /// Two input tiles in the same board share a keycode at load time; the
    /// second occurrence is dropped rather than failing the whole load.
    #[error("duplicate input keycode {keycode} at ({x}, {y}), tile dropped")]
    DuplicateInputKey { keycode: u8, x: i32, y: i32 },

    /// A chunk's serialized form exceeds the 255-sector cap.
    #[error("chunk at ({cx}, {cy}) serializes to {sectors} sectors, exceeding the 255-sector cap")]
    ChunkTooLarge { cx: i32, cy: i32, sectors: u32 },
}

pub type Result<T> = std::result::Result<T, CircuitError>;
