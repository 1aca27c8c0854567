//! `Chunk`: a fixed `CHUNK_WIDTH`-by-`CHUNK_WIDTH` square of tiles, stored
//! contiguously in a boxed array (mirroring the teacher's `PerTile<T>`
//! pattern of a `Box<[T; N]>` rather than a `Vec`, since the length is fixed
//! and known at the type level).

use std::collections::HashSet;

use crate::coord::{ChunkCoord, TILES_PER_CHUNK};
use crate::tile::TileData;

/// Which per-tick update-pending category a tile index belongs to. A chunk
/// tracks one small set per category rather than the teacher's bitset +
/// queue (`BlockUpdateQueue`): the traversal engine's own invariant that
/// final per-tile state must not depend on visitation order makes a plain
/// unordered set sufficient, and considerably simpler.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UpdateCategory {
    Wire,
    InputSwitch,
    InputButton,
    Led,
    Gate,
    Cosmetic,
}

pub const UPDATE_CATEGORIES: [UpdateCategory; 6] = [
    UpdateCategory::Wire,
    UpdateCategory::InputSwitch,
    UpdateCategory::InputButton,
    UpdateCategory::Led,
    UpdateCategory::Gate,
    UpdateCategory::Cosmetic,
];

/// A chunk of tiles plus its lifecycle flags and pending-update sets.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub coords: ChunkCoord,
    tiles: Box<[TileData; TILES_PER_CHUNK]>,
    /// True iff every tile is blank and unhighlighted.
    empty: bool,
    /// True iff any tile has changed since the chunk was last persisted.
    pub unsaved: bool,
    wire: HashSet<u16>,
    input_switch: HashSet<u16>,
    input_button: HashSet<u16>,
    led: HashSet<u16>,
    gate: HashSet<u16>,
    cosmetic: HashSet<u16>,
}

impl Chunk {
    /// A freshly allocated, all-blank chunk at `coords`.
    pub fn new_blank(coords: ChunkCoord) -> Chunk {
        Chunk {
            coords,
            tiles: Box::new([TileData::blank(); TILES_PER_CHUNK]),
            empty: true,
            unsaved: false,
            wire: HashSet::new(),
            input_switch: HashSet::new(),
            input_button: HashSet::new(),
            led: HashSet::new(),
            gate: HashSet::new(),
            cosmetic: HashSet::new(),
        }
    }

    /// Rebuild a chunk from a fully populated tile array (used by region and
    /// legacy loading). The caller is responsible for marking the relevant
    /// tiles dirty afterward if the chunk needs an immediate tick pass.
    pub fn from_tiles(coords: ChunkCoord, tiles: Box<[TileData; TILES_PER_CHUNK]>) -> Chunk {
        let empty = tiles.iter().all(TileData::is_blank);
        Chunk {
            coords,
            tiles,
            empty,
            unsaved: false,
            wire: HashSet::new(),
            input_switch: HashSet::new(),
            input_button: HashSet::new(),
            led: HashSet::new(),
            gate: HashSet::new(),
            cosmetic: HashSet::new(),
        }
    }

    pub fn tile(&self, lti: u16) -> &TileData {
        &self.tiles[lti as usize]
    }

    pub fn tile_mut(&mut self, lti: u16) -> &mut TileData {
        &mut self.tiles[lti as usize]
    }

    pub fn tiles(&self) -> &[TileData; TILES_PER_CHUNK] {
        &self.tiles
    }

    /// Overwrite a tile, update the `empty` flag, and mark the chunk unsaved.
    /// Does not itself enqueue an update set entry — callers that know the
    /// new tile's category do that via `enqueue`.
    pub fn set_tile(&mut self, lti: u16, tile: TileData) {
        self.tiles[lti as usize] = tile;
        self.unsaved = true;
        self.recompute_empty();
    }

    fn recompute_empty(&mut self) {
        self.empty = self.tiles.iter().all(TileData::is_blank);
    }

    /// True iff every tile is blank and unhighlighted.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// A chunk with no tiles differing from blank and no unsaved changes is
    /// eligible for pruning once no renderer has it pinned (spec §4.6).
    pub fn prunable(&self) -> bool {
        self.empty && !self.unsaved
    }

    fn set_for(&mut self, category: UpdateCategory) -> &mut HashSet<u16> {
        match category {
            UpdateCategory::Wire => &mut self.wire,
            UpdateCategory::InputSwitch => &mut self.input_switch,
            UpdateCategory::InputButton => &mut self.input_button,
            UpdateCategory::Led => &mut self.led,
            UpdateCategory::Gate => &mut self.gate,
            UpdateCategory::Cosmetic => &mut self.cosmetic,
        }
    }

    fn set_for_ref(&self, category: UpdateCategory) -> &HashSet<u16> {
        match category {
            UpdateCategory::Wire => &self.wire,
            UpdateCategory::InputSwitch => &self.input_switch,
            UpdateCategory::InputButton => &self.input_button,
            UpdateCategory::Led => &self.led,
            UpdateCategory::Gate => &self.gate,
            UpdateCategory::Cosmetic => &self.cosmetic,
        }
    }

    pub fn enqueue(&mut self, category: UpdateCategory, lti: u16) {
        self.set_for(category).insert(lti);
    }

    pub fn dequeue(&mut self, category: UpdateCategory, lti: u16) {
        self.set_for(category).remove(&lti);
    }

    pub fn pending(&self, category: UpdateCategory) -> impl Iterator<Item = u16> + '_ {
        self.set_for_ref(category).iter().copied()
    }

    pub fn has_pending(&self, category: UpdateCategory) -> bool {
        !self.set_for_ref(category).is_empty()
    }

    pub fn clear_category(&mut self, category: UpdateCategory) {
        self.set_for(category).clear();
    }

    pub fn any_pending(&self) -> bool {
        UPDATE_CATEGORIES.iter().any(|&c| self.has_pending(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vek::Vec2;

    #[test]
    fn fresh_chunk_is_empty() {
        let chunk = Chunk::new_blank(Vec2::new(0, 0));
        assert!(chunk.is_empty());
        assert!(chunk.prunable());
    }

    #[test]
    fn setting_a_tile_clears_empty_and_prunable() {
        let mut chunk = Chunk::new_blank(Vec2::new(0, 0));
        let mut tile = TileData::blank();
        tile.highlight = true;
        chunk.set_tile(0, tile);
        assert!(!chunk.is_empty());
        assert!(!chunk.prunable());
    }

    #[test]
    fn update_sets_are_independent_per_category() {
        let mut chunk = Chunk::new_blank(Vec2::new(0, 0));
        chunk.enqueue(UpdateCategory::Gate, 5);
        chunk.enqueue(UpdateCategory::Wire, 5);
        assert!(chunk.has_pending(UpdateCategory::Gate));
        chunk.dequeue(UpdateCategory::Gate, 5);
        assert!(!chunk.has_pending(UpdateCategory::Gate));
        assert!(chunk.has_pending(UpdateCategory::Wire));
    }
}
