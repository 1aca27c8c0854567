//! `TraversalEngine`: the tick scheduler and wire-follow algorithm.
//!
//! The reference implementation keeps the traversed-wire list and work stack
//! as function-local state inside a mutually recursive `followWire`; this
//! keeps the same explicit, non-recursive work stack but as a true local
//! (never a static), so a tick is reentrant with respect to any number of
//! `Board` instances (Design Note, spec §9: "lift these into a per-engine
//! struct").
//!
//! Conflict detection does not need a literal "Phase 2 runs before Phase 3"
//! ordering to be correct here: each `traverse` call independently discovers
//! every driver touching its component by scanning neighbors live off the
//! board, so a component is resolved identically regardless of which
//! control source happens to seed it first. The two phases are kept as
//! separate passes to mirror the spec's structure and for `TickSummary`
//! bookkeeping, not because correctness depends on their order.

use std::collections::HashSet;

use tile_grid::chunk::UpdateCategory;
use tile_grid::coord::{cc_lti_to_tc, tc_get_cc, tc_get_lti};
use tile_grid::tile::evaluate_gate;
use tile_grid::{ChunkCoord, Direction, SignalState, TileCoord, TileKind};
use vek::Vec2;

use crate::board::Board;

const DIRECTIONS: [Direction; 4] =
    [Direction::North, Direction::East, Direction::South, Direction::West];

fn step(tc: TileCoord, d: Direction) -> TileCoord {
    let (dx, dy) = d.step();
    Vec2::new(tc.x + dx, tc.y + dy)
}

/// Structured result of one tick, replacing reliance on out-of-band global
/// counters (Design Note, spec §9).
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct TickSummary {
    pub gates_evaluated: u32,
    pub wires_traversed: u32,
    pub conflicts: u32,
    pub chunks_touched: u32,
}

/// Which signal channel a traversal is writing: `Primary` for every wire
/// kind except a crossover entered along the east/west axis, which writes
/// `Secondary` (`state2`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum Channel {
    Primary,
    Secondary,
}

pub struct TraversalEngine {
    current_update_time: u64,
    pending_button_release: HashSet<(ChunkCoord, u16)>,
    /// Mirrors `Simulator::Configuration::pauseOnConflict`; when set, a tick
    /// that records a conflict sets `Board::paused`. The engine does not
    /// enforce the pause itself — that is an application-level concern.
    pub pause_on_conflict: bool,
}

impl Default for TraversalEngine {
    fn default() -> Self {
        TraversalEngine {
            current_update_time: 0,
            pending_button_release: HashSet::new(),
            pause_on_conflict: true,
        }
    }
}

impl TraversalEngine {
    pub fn new() -> TraversalEngine {
        TraversalEngine::default()
    }

    pub fn current_update_time(&self) -> u64 {
        self.current_update_time
    }

    /// Run one complete tick over `board`, returning a summary of what
    /// happened. A tick runs to completion; there are no suspension points
    /// inside it (spec §5).
    pub fn tick(&mut self, board: &mut Board) -> TickSummary {
        let mut summary = TickSummary::default();
        self.release_decayed_buttons(board);

        let (touched, low_seed_gates, high_seed_gates) = self.phase1_evaluate_gates(board, &mut summary);
        let mut visited: HashSet<(ChunkCoord, u16, Channel)> = HashSet::new();

        // Phase 2: off-turning control sources (driven Low).
        for (cc, lti) in &low_seed_gates {
            let tc = cc_lti_to_tc(*cc, *lti);
            let tile = board.peek_tile(tc);
            self.seed_from_gate(board, tc, tile.direction, SignalState::Low, &mut visited, &mut summary);
        }
        self.process_control_sources(board, UpdateCategory::InputSwitch, SignalState::Low, &mut visited, &mut summary);
        self.process_control_sources(board, UpdateCategory::InputButton, SignalState::Low, &mut visited, &mut summary);

        // Phase 3: on-turning control sources (driven High or Middle).
        for (cc, lti) in &high_seed_gates {
            let tc = cc_lti_to_tc(*cc, *lti);
            let tile = board.peek_tile(tc);
            self.seed_from_gate(board, tc, tile.direction, tile.state1, &mut visited, &mut summary);
        }
        self.process_control_sources(board, UpdateCategory::InputSwitch, SignalState::High, &mut visited, &mut summary);
        self.process_control_sources(board, UpdateCategory::InputButton, SignalState::High, &mut visited, &mut summary);

        self.phase4_led_propagation(board);

        self.clear_processed_sets(board);

        board.conflict_count += summary.conflicts as u64;
        if summary.conflicts > 0 {
            warn!(conflicts = summary.conflicts, update_time = self.current_update_time, "tri-state conflict detected");
            if self.pause_on_conflict {
                board.paused = true;
            }
        }
        summary.chunks_touched = touched.len() as u32;

        self.current_update_time = self.current_update_time.wrapping_add(1);
        if self.current_update_time == u64::MAX {
            self.current_update_time = 0;
        }
        trace!(
            gates = summary.gates_evaluated,
            wires = summary.wires_traversed,
            chunks = summary.chunks_touched,
            "tick complete"
        );
        summary
    }

    fn release_decayed_buttons(&mut self, board: &mut Board) {
        for (cc, lti) in self.pending_button_release.drain() {
            if let Some(chunk) = board.chunk_mut(cc) {
                let mut tile = *chunk.tile(lti);
                if tile.kind == TileKind::InButton {
                    tile.state1 = SignalState::Low;
                    chunk.set_tile(lti, tile);
                    chunk.enqueue(UpdateCategory::InputButton, lti);
                }
            }
        }
    }

    /// Phase 1. Returns the set of chunks a changed gate lives in, plus the
    /// positions of gates that transitioned to Low and to High/Middle
    /// (seeds for phases 2 and 3 respectively).
    fn phase1_evaluate_gates(
        &mut self,
        board: &mut Board,
        summary: &mut TickSummary,
    ) -> (HashSet<ChunkCoord>, Vec<(ChunkCoord, u16)>, Vec<(ChunkCoord, u16)>) {
        let mut touched = HashSet::new();
        let mut low_seeds = Vec::new();
        let mut high_seeds = Vec::new();

        let pending: Vec<(ChunkCoord, u16)> = board
            .chunks()
            .flat_map(|c| c.pending(UpdateCategory::Gate).map(move |lti| (c.coords, lti)))
            .collect();

        for (cc, lti) in pending {
            let tc = cc_lti_to_tc(cc, lti);
            let tile = board.peek_tile(tc);
            if !tile.kind.is_gate() {
                if let Some(chunk) = board.chunk_mut(cc) {
                    chunk.dequeue(UpdateCategory::Gate, lti);
                }
                continue;
            }

            let output_side = tile.direction.opposite();
            let (mut total, mut high, mut middle) = (0u32, 0u32, 0u32);
            for d in DIRECTIONS {
                if d == output_side {
                    continue;
                }
                let neighbor_tc = step(tc, d);
                if !board.in_bounds(neighbor_tc) {
                    continue;
                }
                let neighbor = board.peek_tile(neighbor_tc);
                match neighbor.check_output(d.opposite()) {
                    SignalState::High => {
                        total += 1;
                        high += 1;
                    }
                    SignalState::Low => total += 1,
                    SignalState::Middle if board.extra_logic_states => {
                        total += 1;
                        middle += 1;
                    }
                    _ => {}
                }
            }

            summary.gates_evaluated += 1;
            let next = evaluate_gate(tile.kind, total, high, middle);

            let (right_connector, left_connector) = connector_flags(board, tc, tile.direction);
            let mut new_tile = tile;
            new_tile.meta = pack_connectors(tile.kind, right_connector, left_connector);

            if next == tile.state1 {
                if let Some(chunk) = board.chunk_mut(cc) {
                    chunk.set_tile(lti, new_tile);
                    chunk.dequeue(UpdateCategory::Gate, lti);
                }
                continue;
            }

            new_tile.state1 = next;
            if let Some(chunk) = board.chunk_mut(cc) {
                chunk.set_tile(lti, new_tile);
                chunk.dequeue(UpdateCategory::Gate, lti);
            }
            touched.insert(cc);
            wake_adjacent_gates(board, tc);
            match next {
                SignalState::Low => low_seeds.push((cc, lti)),
                _ => high_seeds.push((cc, lti)),
            }
        }

        (touched, low_seeds, high_seeds)
    }

    fn seed_from_gate(
        &mut self,
        board: &mut Board,
        tc: TileCoord,
        direction: Direction,
        driven_state: SignalState,
        visited: &mut HashSet<(ChunkCoord, u16, Channel)>,
        summary: &mut TickSummary,
    ) {
        let out_dir = direction.opposite();
        self.try_seed(board, tc, out_dir, driven_state, visited, summary);
    }

    fn process_control_sources(
        &mut self,
        board: &mut Board,
        category: UpdateCategory,
        bucket: SignalState,
        visited: &mut HashSet<(ChunkCoord, u16, Channel)>,
        summary: &mut TickSummary,
    ) {
        let pending: Vec<(ChunkCoord, u16)> = board
            .chunks()
            .flat_map(|c| c.pending(category).map(move |lti| (c.coords, lti)))
            .collect();

        for (cc, lti) in pending {
            let tc = cc_lti_to_tc(cc, lti);
            let tile = board.peek_tile(tc);
            if !tile.kind.is_input() {
                if let Some(chunk) = board.chunk_mut(cc) {
                    chunk.dequeue(category, lti);
                }
                continue;
            }
            let matches_bucket = match bucket {
                SignalState::Low => tile.state1 == SignalState::Low,
                _ => tile.state1 != SignalState::Low,
            };
            if !matches_bucket {
                continue;
            }
            for d in DIRECTIONS {
                self.try_seed(board, tc, d, tile.state1, visited, summary);
            }
            wake_adjacent_gates(board, tc);
            if tile.kind == TileKind::InButton && tile.state1 == SignalState::High {
                self.pending_button_release.insert((cc, lti));
            }
        }
    }

    /// Step from a source tile at `tc` toward its `side` neighbor; if that
    /// neighbor is a wire tile that connects back, begin a traversal.
    fn try_seed(
        &mut self,
        board: &mut Board,
        tc: TileCoord,
        side: Direction,
        driven_state: SignalState,
        visited: &mut HashSet<(ChunkCoord, u16, Channel)>,
        summary: &mut TickSummary,
    ) {
        let neighbor_tc = step(tc, side);
        if !board.in_bounds(neighbor_tc) {
            return;
        }
        let neighbor = board.peek_tile(neighbor_tc);
        if !neighbor.kind.is_wire() {
            return;
        }
        let entry = side.opposite();
        if !connects_on_side(neighbor.kind, neighbor.direction, entry) {
            return;
        }
        self.traverse(board, neighbor_tc, entry, driven_state, visited, summary);
    }

    /// Iterative depth-first traversal of one wire component (or, for a
    /// crossover, one of its two independent channels), using an explicit
    /// stack of `(position, entry direction)` pairs rather than recursion.
    fn traverse(
        &mut self,
        board: &mut Board,
        start: TileCoord,
        entry: Direction,
        driven_state: SignalState,
        visited: &mut HashSet<(ChunkCoord, u16, Channel)>,
        summary: &mut TickSummary,
    ) {
        let extra_logic_states = board.extra_logic_states;
        let mut stack = vec![(start, entry)];
        let mut traversed: Vec<(TileCoord, Channel)> = Vec::new();
        let mut effective_state = driven_state;
        let mut conflict_recorded = false;

        while let Some((tc, entry_dir)) = stack.pop() {
            let tile = board.peek_tile(tc);
            if !tile.kind.is_wire() {
                continue;
            }
            let channel = channel_for(tile.kind, entry_dir);
            let key = (tc_get_cc(tc), tc_get_lti(tc), channel);
            if visited.contains(&key) {
                continue;
            }
            visited.insert(key);
            summary.wires_traversed += 1;
            traversed.push((tc, channel));

            for d in DIRECTIONS {
                if d == entry_dir {
                    continue;
                }
                if !exits_toward(tile.kind, tile.direction, entry_dir, d) {
                    continue;
                }
                let neighbor_tc = step(tc, d);
                if !board.in_bounds(neighbor_tc) {
                    continue;
                }
                let neighbor = board.peek_tile(neighbor_tc);
                if neighbor.kind.is_wire() {
                    if connects_on_side(neighbor.kind, neighbor.direction, d.opposite()) {
                        stack.push((neighbor_tc, d.opposite()));
                    }
                    continue;
                }
                if !(neighbor.kind.is_gate() || neighbor.kind.is_input()) {
                    continue;
                }
                let driven = neighbor.check_output(d.opposite());
                if driven == SignalState::Disconnected {
                    continue;
                }
                if driven.is_definite() && effective_state.is_definite() && driven != effective_state {
                    if extra_logic_states {
                        if !conflict_recorded {
                            summary.conflicts += 1;
                            conflict_recorded = true;
                        }
                        effective_state = SignalState::Middle;
                    } else if effective_state == SignalState::Low && driven == SignalState::High {
                        effective_state = SignalState::High;
                    }
                    // else: High traversal meeting a stale Low source under
                    // the legacy two-state model keeps the High value.
                } else if driven.is_middle() && extra_logic_states && effective_state.is_definite() {
                    if !conflict_recorded {
                        summary.conflicts += 1;
                        conflict_recorded = true;
                    }
                    effective_state = SignalState::Middle;
                }
            }
        }

        for (tc, channel) in &traversed {
            let cc = tc_get_cc(*tc);
            let lti = tc_get_lti(*tc);
            if let Some(chunk) = board.chunk_mut(cc) {
                let mut tile = *chunk.tile(lti);
                match channel {
                    Channel::Primary => tile.state1 = effective_state,
                    Channel::Secondary => tile.state2 = effective_state,
                }
                chunk.set_tile(lti, tile);
                chunk.dequeue(UpdateCategory::Wire, lti);
            }
        }
        // Flag any LED adjacent to a tile this traversal touched for
        // re-evaluation by phase 4, which samples live board state rather
        // than a value threaded through the traversal, and any adjacent gate
        // whose input this traversal just drove.
        for (tc, _) in &traversed {
            for d in DIRECTIONS {
                let neighbor_tc = step(*tc, d);
                if !board.in_bounds(neighbor_tc) {
                    continue;
                }
                let neighbor = board.peek_tile(neighbor_tc);
                if neighbor.kind.is_led() {
                    let cc = tc_get_cc(neighbor_tc);
                    let lti = tc_get_lti(neighbor_tc);
                    if let Some(chunk) = board.chunk_mut(cc) {
                        chunk.enqueue(UpdateCategory::Led, lti);
                    }
                }
            }
            wake_adjacent_gates(board, *tc);
        }
    }

    /// Phase 4. LEDs form clusters under 4-neighborhood adjacency; each
    /// cluster adopts the strongest state (High > Middle > Low >
    /// Disconnected) seen on its boundary. LEDs are pure sinks: this never
    /// writes back into a wire.
    fn phase4_led_propagation(&mut self, board: &mut Board) {
        let pending: Vec<(ChunkCoord, u16)> = board
            .chunks()
            .flat_map(|c| c.pending(UpdateCategory::Led).map(move |lti| (c.coords, lti)))
            .collect();

        let mut cluster_visited: HashSet<(ChunkCoord, u16)> = HashSet::new();
        for (cc, lti) in pending {
            if cluster_visited.contains(&(cc, lti)) {
                continue;
            }
            let tc = cc_lti_to_tc(cc, lti);
            if !board.peek_tile(tc).kind.is_led() {
                if let Some(chunk) = board.chunk_mut(cc) {
                    chunk.dequeue(UpdateCategory::Led, lti);
                }
                continue;
            }

            let mut stack = vec![tc];
            let mut cluster = Vec::new();
            let mut strongest = SignalState::Disconnected;
            while let Some(pos) = stack.pop() {
                let key = (tc_get_cc(pos), tc_get_lti(pos));
                if cluster_visited.contains(&key) {
                    continue;
                }
                if !board.peek_tile(pos).kind.is_led() {
                    continue;
                }
                cluster_visited.insert(key);
                cluster.push(pos);

                for d in DIRECTIONS {
                    let neighbor_tc = step(pos, d);
                    if !board.in_bounds(neighbor_tc) {
                        continue;
                    }
                    let neighbor = board.peek_tile(neighbor_tc);
                    if neighbor.kind.is_led() {
                        stack.push(neighbor_tc);
                    } else if neighbor.kind.is_wire() || neighbor.kind.is_gate() || neighbor.kind.is_input() {
                        let driven = neighbor.check_output(d.opposite());
                        strongest = strongest_of(strongest, driven);
                    }
                }
            }

            for pos in cluster {
                let cc = tc_get_cc(pos);
                let lti = tc_get_lti(pos);
                if let Some(chunk) = board.chunk_mut(cc) {
                    let mut tile = *chunk.tile(lti);
                    tile.state1 = strongest;
                    chunk.set_tile(lti, tile);
                    chunk.dequeue(UpdateCategory::Led, lti);
                }
            }
        }
    }

    fn clear_processed_sets(&mut self, board: &mut Board) {
        for chunk in board.chunks_mut() {
            chunk.clear_category(UpdateCategory::Gate);
            chunk.clear_category(UpdateCategory::InputSwitch);
            chunk.clear_category(UpdateCategory::InputButton);
            chunk.clear_category(UpdateCategory::Wire);
            chunk.clear_category(UpdateCategory::Led);
        }
    }
}

/// Enqueue the `Gate` category for every gate tile adjacent to `tc`, since
/// whatever just happened at `tc` may have changed one of that gate's
/// inputs. Over-approximates slightly when the changed neighbor sits on the
/// gate's output side rather than an input side, but `phase1_evaluate_gates`
/// already skips the output side when reading inputs, so a spurious wake-up
/// costs a redundant evaluation, never a wrong one.
fn wake_adjacent_gates(board: &mut Board, tc: TileCoord) {
    for d in DIRECTIONS {
        let neighbor_tc = step(tc, d);
        if !board.in_bounds(neighbor_tc) {
            continue;
        }
        if !board.peek_tile(neighbor_tc).kind.is_gate() {
            continue;
        }
        let cc = tc_get_cc(neighbor_tc);
        let lti = tc_get_lti(neighbor_tc);
        if let Some(chunk) = board.chunk_mut(cc) {
            chunk.enqueue(UpdateCategory::Gate, lti);
        }
    }
}

fn strongest_of(a: SignalState, b: SignalState) -> SignalState {
    fn rank(s: SignalState) -> u8 {
        match s {
            SignalState::Disconnected => 0,
            SignalState::Low => 1,
            SignalState::Middle => 2,
            SignalState::High => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

fn channel_for(kind: TileKind, entry: Direction) -> Channel {
    if kind == TileKind::WireCrossover && (entry == Direction::East || entry == Direction::West) {
        Channel::Secondary
    } else {
        Channel::Primary
    }
}

/// Does a wire tile of `kind`/`direction` have a connection on `side`? For a
/// crossover this restricts to the two sides on the axis opposite the
/// implicit channel split, which is resolved per-call via `exits_toward`
/// rather than here; `wire_connects` (from `tile_grid`) already reports
/// "every side" for a crossover, which is correct for `check_output` but not
/// for deciding traversal continuation, so traversal uses `exits_toward`
/// instead of this for crossover exit decisions.
fn connects_on_side(kind: TileKind, direction: Direction, side: Direction) -> bool {
    tile_grid::wire_connects(kind, direction, side)
}

/// Given a wire tile of `kind`/`direction` entered via `entry`, is `exit` a
/// valid continuation? Crossover restricts to the straight-through opposite
/// side per axis, so its two channels never mix; every other wire kind
/// continues through any other connected side.
fn exits_toward(kind: TileKind, direction: Direction, entry: Direction, exit: Direction) -> bool {
    if kind == TileKind::WireCrossover {
        return exit == entry.opposite();
    }
    connects_on_side(kind, direction, exit)
}

/// Right/left connector flags (cosmetic only) derived from whether the
/// tile's two side-neighbors report a non-Disconnected output.
fn connector_flags(board: &Board, tc: TileCoord, direction: Direction) -> (bool, bool) {
    let right_tc = step(tc, direction.rotate_cw());
    let left_tc = step(tc, direction.rotate_ccw());
    let right = board.in_bounds(right_tc)
        && board.peek_tile(right_tc).check_output(direction.rotate_cw().opposite()) != SignalState::Disconnected;
    let left = board.in_bounds(left_tc)
        && board.peek_tile(left_tc).check_output(direction.rotate_ccw().opposite()) != SignalState::Disconnected;
    (right, left)
}

fn pack_connectors(kind: TileKind, right: bool, left: bool) -> u8 {
    let (mut right, mut left) = (right, left);
    if matches!(kind, TileKind::GateDiode | TileKind::GateBuffer) && right && left {
        right = false;
        left = false;
    }
    (right as u8) | ((left as u8) << 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_grid::TileData;

    #[test]
    fn basic_propagation() {
        let mut board = Board::new(None);
        let mut engine = TraversalEngine::new();

        board
            .set_tile(
                Vec2::new(5, 5),
                TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::High, ..TileData::blank() },
            )
            .unwrap();
        for x in 6..=10 {
            board
                .set_tile(
                    Vec2::new(x, 5),
                    TileData { kind: TileKind::WireStraight, direction: Direction::East, ..TileData::blank() },
                )
                .unwrap();
        }
        board.set_tile(Vec2::new(11, 5), TileData { kind: TileKind::OutLed, ..TileData::blank() }).unwrap();

        engine.tick(&mut board);

        for x in 6..=10 {
            assert_eq!(board.peek_tile(Vec2::new(x, 5)).state1, SignalState::High);
        }
        assert_eq!(board.peek_tile(Vec2::new(11, 5)).state1, SignalState::High);

        board.set_tile(Vec2::new(5, 5), TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::Low, ..TileData::blank() }).unwrap();
        engine.tick(&mut board);
        for x in 6..=10 {
            assert_eq!(board.peek_tile(Vec2::new(x, 5)).state1, SignalState::Low);
        }
        assert_eq!(board.peek_tile(Vec2::new(11, 5)).state1, SignalState::Low);
    }

    #[test]
    fn quiescence_is_a_fixed_point() {
        let mut board = Board::new(None);
        let mut engine = TraversalEngine::new();
        board.set_tile(Vec2::new(0, 0), TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::High, ..TileData::blank() }).unwrap();
        engine.tick(&mut board);
        let snapshot: Vec<SignalState> = (0..4).map(|x| board.peek_tile(Vec2::new(x, 0)).state1).collect();
        engine.tick(&mut board);
        let snapshot2: Vec<SignalState> = (0..4).map(|x| board.peek_tile(Vec2::new(x, 0)).state1).collect();
        assert_eq!(snapshot, snapshot2);
    }

    #[test]
    fn conflict_detection_drives_middle_and_counts_once() {
        let mut board = Board::new(None);
        board.extra_logic_states = true;
        let mut engine = TraversalEngine::new();

        board.set_tile(Vec2::new(5, 4), TileData { kind: TileKind::InSwitch, direction: Direction::South, state1: SignalState::Low, ..TileData::blank() }).unwrap();
        board.set_tile(Vec2::new(5, 6), TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::High, ..TileData::blank() }).unwrap();
        board.set_tile(Vec2::new(5, 5), TileData { kind: TileKind::WireJunction, ..TileData::blank() }).unwrap();

        let summary = engine.tick(&mut board);
        assert_eq!(board.peek_tile(Vec2::new(5, 5)).state1, SignalState::Middle);
        assert_eq!(summary.conflicts, 1);
        assert_eq!(board.conflict_count, 1);
    }
}
