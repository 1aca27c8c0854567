//! `Board`: the sparse chunk map plus board-level flags and bounds. Mirrors
//! the teacher's convention of a flat `HashMap` keyed by a packed coordinate
//! (the reference architecture's `LoadedChunks` adds a slab and 26-neighbor
//! link cache for 3D rendering locality that this 2D, render-free core has
//! no use for — see DESIGN.md).

use std::collections::HashMap;

use tile_grid::{ChunkCoord, Direction, TileCoord, CHUNK_WIDTH};
use tile_grid::chunk::{Chunk, UpdateCategory};
use tile_grid::tile::TileData;
use tile_grid::tile::TileKind;
use vek::Vec2;

use crate::error::{CircuitError, Result};

/// Owns every loaded chunk and the board-wide flags that apply across all of
/// them.
#[derive(Debug)]
pub struct Board {
    chunks: HashMap<ChunkCoord, Chunk>,
    /// Tile-space width/height, rounded up to a `CHUNK_WIDTH` multiple;
    /// `None` means the domain is the full signed 32-bit range.
    max_size: Option<i32>,
    pub extra_logic_states: bool,
    pub notes_text: String,
    /// Cumulative count of tri-state conflicts detected since the board was
    /// created or last reset by `new_board`.
    pub conflict_count: u64,
    /// Set by the traversal engine when `pause_on_conflict` is enabled and a
    /// tick records at least one conflict.
    pub paused: bool,
}

impl Board {
    pub fn new(max_size: Option<i32>) -> Board {
        Board {
            chunks: HashMap::new(),
            max_size: max_size.map(round_up_to_chunk_width),
            extra_logic_states: false,
            notes_text: String::new(),
            conflict_count: 0,
            paused: false,
        }
    }

    /// Release every loaded chunk and reset board-level flags, including the
    /// conflict counter and paused flag.
    pub fn new_board(&mut self, max_size: Option<i32>) {
        info!(dropped_chunks = self.chunks.len(), ?max_size, "resetting board");
        self.chunks.clear();
        self.max_size = max_size.map(round_up_to_chunk_width);
        self.extra_logic_states = false;
        self.notes_text.clear();
        self.conflict_count = 0;
        self.paused = false;
    }

    pub fn max_size(&self) -> Option<i32> {
        self.max_size
    }

    /// Is `tc` inside the configured domain?
    pub fn in_bounds(&self, tc: TileCoord) -> bool {
        match self.max_size {
            None => true,
            Some(size) => tc.x >= 0 && tc.y >= 0 && tc.x < size && tc.y < size,
        }
    }

    fn check_bounds(&self, tc: TileCoord) -> Result<()> {
        if self.in_bounds(tc) {
            Ok(())
        } else {
            Err(CircuitError::InvalidCoordinate { x: tc.x, y: tc.y })
        }
    }

    pub fn chunk(&self, cc: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&cc)
    }

    pub fn chunk_mut(&mut self, cc: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&cc)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    pub fn chunk_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    pub fn contains_chunk(&self, cc: ChunkCoord) -> bool {
        self.chunks.contains_key(&cc)
    }

    /// Insert a chunk that was loaded or constructed elsewhere (demand-fault
    /// from a `RegionStore`, legacy load, or paste). The caller upholds the
    /// invariant that `chunk.coords == cc`.
    pub fn insert_chunk(&mut self, cc: ChunkCoord, chunk: Chunk) {
        debug_assert_eq!(chunk.coords, cc);
        trace!(cx = cc.x, cy = cc.y, "chunk inserted");
        self.chunks.insert(cc, chunk);
    }

    pub fn remove_chunk(&mut self, cc: ChunkCoord) -> Option<Chunk> {
        let removed = self.chunks.remove(&cc);
        if removed.is_some() {
            trace!(cx = cc.x, cy = cc.y, "chunk removed");
        }
        removed
    }

    /// Fault in the chunk containing `cc`, allocating a blank one if it
    /// isn't already loaded. Demand-loading from a `RegionStore` happens one
    /// layer up (see `region::store::load_missing_chunks`), keeping this
    /// crate's persistence concern decoupled from the in-memory map.
    fn ensure_chunk_mut(&mut self, cc: ChunkCoord) -> &mut Chunk {
        self.chunks.entry(cc).or_insert_with(|| Chunk::new_blank(cc))
    }

    /// Look up the tile at `tc`, allocating its chunk (blank) if necessary.
    /// Never returns an invalid handle for an in-domain coordinate.
    pub fn tile_at(&mut self, tc: TileCoord) -> Result<&TileData> {
        self.check_bounds(tc)?;
        let cc = tile_grid::coord::tc_get_cc(tc);
        let lti = tile_grid::coord::tc_get_lti(tc);
        Ok(self.ensure_chunk_mut(cc).tile(lti))
    }

    /// Read a tile without allocating its chunk; out-of-bounds or unloaded
    /// coordinates read as a blank tile.
    pub fn peek_tile(&self, tc: TileCoord) -> TileData {
        if !self.in_bounds(tc) {
            return TileData::blank();
        }
        let cc = tile_grid::coord::tc_get_cc(tc);
        let lti = tile_grid::coord::tc_get_lti(tc);
        self.chunk(cc).map(|c| *c.tile(lti)).unwrap_or_else(TileData::blank)
    }

    /// Replace the tile at `tc`, marking its chunk unsaved and enqueuing the
    /// appropriate update-category entry so the next tick picks it up.
    ///
    /// Also wakes any gate adjacent to `tc` for re-evaluation next tick: a
    /// direct edit (as opposed to a state change the traversal engine itself
    /// produces mid-tick, which wakes neighboring gates on its own) would
    /// otherwise sit invisible to a gate reading it as an input until some
    /// unrelated event re-queued that gate.
    pub fn set_tile(&mut self, tc: TileCoord, tile: TileData) -> Result<()> {
        self.check_bounds(tc)?;
        let cc = tile_grid::coord::tc_get_cc(tc);
        let lti = tile_grid::coord::tc_get_lti(tc);
        let chunk = self.ensure_chunk_mut(cc);
        chunk.set_tile(lti, tile);
        if let Some(category) = update_category_for(tile.kind) {
            chunk.enqueue(category, lti);
        }
        chunk.enqueue(UpdateCategory::Cosmetic, lti);
        self.wake_adjacent_gates(tc);
        Ok(())
    }

    /// Enqueue the `Gate` update category for every gate tile in the four
    /// neighbors of `tc`. Slightly over-approximates when `tc` sits on a
    /// neighboring gate's output side rather than an input side, which costs
    /// a redundant evaluation next tick, never a wrong one.
    fn wake_adjacent_gates(&mut self, tc: TileCoord) {
        for d in [Direction::North, Direction::East, Direction::South, Direction::West] {
            let (dx, dy) = d.step();
            let neighbor_tc = Vec2::new(tc.x + dx, tc.y + dy);
            if !self.in_bounds(neighbor_tc) {
                continue;
            }
            if !self.peek_tile(neighbor_tc).kind.is_gate() {
                continue;
            }
            let cc = tile_grid::coord::tc_get_cc(neighbor_tc);
            let lti = tile_grid::coord::tc_get_lti(neighbor_tc);
            if let Some(chunk) = self.chunk_mut(cc) {
                chunk.enqueue(UpdateCategory::Gate, lti);
            }
        }
    }

    /// Mark `rect` (inclusive lo, exclusive hi, in tile coordinates)
    /// highlighted or not. Purely visual: never touches `state1`/`state2`.
    pub fn highlight_area(&mut self, lo: TileCoord, hi: TileCoord, highlighted: bool) {
        let mut y = lo.y;
        while y < hi.y {
            let mut x = lo.x;
            while x < hi.x {
                let tc = Vec2::new(x, y);
                if self.in_bounds(tc) {
                    let cc = tile_grid::coord::tc_get_cc(tc);
                    let lti = tile_grid::coord::tc_get_lti(tc);
                    let chunk = self.ensure_chunk_mut(cc);
                    let mut tile = *chunk.tile(lti);
                    tile.highlight = highlighted;
                    chunk.set_tile(lti, tile);
                }
                x += 1;
            }
            y += 1;
        }
    }

    /// Clear every highlight flag on every loaded chunk.
    pub fn remove_all_highlights(&mut self) {
        for chunk in self.chunks.values_mut() {
            for lti in 0..tile_grid::TILES_PER_CHUNK as u16 {
                let mut tile = *chunk.tile(lti);
                if tile.highlight {
                    tile.highlight = false;
                    chunk.set_tile(lti, tile);
                }
            }
        }
    }

    /// Drop every loaded chunk that is empty, unsaved-clean, and not present
    /// in `pinned` (a chunk newly allocated by viewport or load with no tiles
    /// differing from blank is retained briefly but subject to pruning once
    /// `empty && !unsaved` hold after a tick and no renderer has pinned it).
    /// Returns the number of chunks removed.
    pub fn prune_empty_chunks(&mut self, pinned: &std::collections::HashSet<ChunkCoord>) -> usize {
        let victims: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(cc, chunk)| chunk.prunable() && !pinned.contains(cc))
            .map(|(cc, _)| *cc)
            .collect();
        for cc in &victims {
            self.chunks.remove(cc);
        }
        if !victims.is_empty() {
            debug!(count = victims.len(), "pruned empty chunks");
        }
        victims.len()
    }

    /// The tight bounding box (lo inclusive, hi exclusive, in tile
    /// coordinates) of every highlighted tile across loaded chunks, or
    /// `None` if nothing is highlighted.
    pub fn highlighted_bounds(&self) -> Option<(TileCoord, TileCoord)> {
        let mut bounds: Option<(TileCoord, TileCoord)> = None;
        for chunk in self.chunks.values() {
            for lti in 0..tile_grid::TILES_PER_CHUNK as u16 {
                if chunk.tile(lti).highlight {
                    let tc = tile_grid::coord::cc_lti_to_tc(chunk.coords, lti);
                    bounds = Some(match bounds {
                        None => (tc, tc + Vec2::new(1, 1)),
                        Some((lo, hi)) => (
                            Vec2::new(lo.x.min(tc.x), lo.y.min(tc.y)),
                            Vec2::new(hi.x.max(tc.x + 1), hi.y.max(tc.y + 1)),
                        ),
                    });
                }
            }
        }
        bounds
    }
}

fn round_up_to_chunk_width(size: i32) -> i32 {
    if size <= 0 {
        return 0;
    }
    ((size + CHUNK_WIDTH - 1) / CHUNK_WIDTH) * CHUNK_WIDTH
}

/// Which update set a freshly written tile belongs in, if any (cosmetic is
/// enqueued unconditionally by `set_tile` regardless of this result).
fn update_category_for(kind: TileKind) -> Option<UpdateCategory> {
    match kind {
        k if k.is_wire() => Some(UpdateCategory::Wire),
        TileKind::InSwitch => Some(UpdateCategory::InputSwitch),
        TileKind::InButton => Some(UpdateCategory::InputButton),
        TileKind::OutLed => Some(UpdateCategory::Led),
        k if k.is_gate() => Some(UpdateCategory::Gate),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_grid::{Direction, SignalState};

    #[test]
    fn writes_outside_max_size_fail() {
        let mut board = Board::new(Some(32));
        assert!(board.set_tile(Vec2::new(31, 31), TileData::blank()).is_ok());
        assert!(matches!(
            board.set_tile(Vec2::new(32, 0), TileData::blank()),
            Err(CircuitError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn tile_at_never_fails_in_domain_and_allocates_blank_chunk() {
        let mut board = Board::new(None);
        let tile = board.tile_at(Vec2::new(1000, -2000)).unwrap();
        assert!(tile.is_blank());
        assert!(board.contains_chunk(tile_grid::coord::tc_get_cc(Vec2::new(1000, -2000))));
    }

    #[test]
    fn set_tile_enqueues_category_and_cosmetic() {
        let mut board = Board::new(None);
        let tc = Vec2::new(5, 5);
        let tile = TileData {
            kind: TileKind::InSwitch,
            direction: Direction::North,
            state1: SignalState::High,
            ..TileData::blank()
        };
        board.set_tile(tc, tile).unwrap();
        let cc = tile_grid::coord::tc_get_cc(tc);
        let lti = tile_grid::coord::tc_get_lti(tc);
        let chunk = board.chunk(cc).unwrap();
        assert!(chunk.pending(UpdateCategory::InputSwitch).any(|i| i == lti));
        assert!(chunk.pending(UpdateCategory::Cosmetic).any(|i| i == lti));
    }

    #[test]
    fn new_board_resets_conflict_and_paused() {
        let mut board = Board::new(None);
        board.conflict_count = 3;
        board.paused = true;
        board.new_board(None);
        assert_eq!(board.conflict_count, 0);
        assert!(!board.paused);
        assert!(board.chunks.is_empty());
    }

    #[test]
    fn prune_empty_chunks_drops_blank_unpinned_chunks_only() {
        let mut board = Board::new(None);
        board.tile_at(Vec2::new(0, 0)).unwrap();
        board.tile_at(Vec2::new(100, 100)).unwrap();
        board
            .set_tile(Vec2::new(200, 200), TileData { kind: TileKind::InSwitch, ..TileData::blank() })
            .unwrap();
        let pinned_cc = tile_grid::coord::tc_get_cc(Vec2::new(100, 100));
        let mut pinned = std::collections::HashSet::new();
        pinned.insert(pinned_cc);

        let removed = board.prune_empty_chunks(&pinned);

        assert_eq!(removed, 1);
        assert!(board.contains_chunk(pinned_cc));
        assert!(board.contains_chunk(tile_grid::coord::tc_get_cc(Vec2::new(200, 200))));
        assert!(!board.contains_chunk(tile_grid::coord::tc_get_cc(Vec2::new(0, 0))));
    }

    #[test]
    fn highlight_round_trip() {
        let mut board = Board::new(None);
        board.highlight_area(Vec2::new(0, 0), Vec2::new(2, 2), true);
        let (lo, hi) = board.highlighted_bounds().unwrap();
        assert_eq!(lo, Vec2::new(0, 0));
        assert_eq!(hi, Vec2::new(2, 2));
        board.remove_all_highlights();
        assert!(board.highlighted_bounds().is_none());
    }
}
