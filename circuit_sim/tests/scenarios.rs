//! Black-box end-to-end scenarios exercising a `Board` through
//! `TraversalEngine::tick` alone, with no knowledge of either's internals.
//! Covers the scenarios not already exercised by in-module unit tests:
//! basic propagation and conflict detection live in `traversal.rs`, region
//! round-tripping in `region/region_store.rs`, the sector pool stress case
//! in `region/sector_pool.rs`.

use circuit_sim::{Board, TraversalEngine};
use tile_grid::{Direction, SignalState, TileData, TileKind};
use vek::Vec2;

#[test]
fn gate_delay_takes_one_tick_to_propagate() {
    let mut board = Board::new(None);
    let mut engine = TraversalEngine::new();

    // Gate facing east (its output side is the opposite of `direction`, so
    // `direction: West` drives the tile to its east, (3, 0)).
    board
        .set_tile(
            Vec2::new(1, 0),
            TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::High, ..TileData::blank() },
        )
        .unwrap();
    board
        .set_tile(
            Vec2::new(2, 1),
            TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::High, ..TileData::blank() },
        )
        .unwrap();
    board
        .set_tile(
            Vec2::new(2, 0),
            TileData { kind: TileKind::GateAnd, direction: Direction::West, state1: SignalState::Low, ..TileData::blank() },
        )
        .unwrap();
    board
        .set_tile(
            Vec2::new(3, 0),
            TileData { kind: TileKind::WireStraight, direction: Direction::East, ..TileData::blank() },
        )
        .unwrap();

    assert_eq!(board.peek_tile(Vec2::new(2, 0)).state1, SignalState::Low);

    engine.tick(&mut board);
    assert_eq!(board.peek_tile(Vec2::new(2, 0)).state1, SignalState::High, "gate settles high on its first tick");
    assert_eq!(
        board.peek_tile(Vec2::new(3, 0)).state1,
        SignalState::High,
        "the same tick seeds the output wire from the gate's new state"
    );

    board
        .set_tile(
            Vec2::new(1, 0),
            TileData { kind: TileKind::InSwitch, direction: Direction::North, state1: SignalState::Low, ..TileData::blank() },
        )
        .unwrap();
    engine.tick(&mut board);
    assert_eq!(board.peek_tile(Vec2::new(2, 0)).state1, SignalState::Low);
    assert_eq!(board.peek_tile(Vec2::new(3, 0)).state1, SignalState::Low);
}

#[test]
fn crossover_channels_stay_independent() {
    let mut board = Board::new(None);
    let mut engine = TraversalEngine::new();

    board.set_tile(Vec2::new(5, 5), TileData { kind: TileKind::WireCrossover, ..TileData::blank() }).unwrap();

    // Vertical driver to the north, high.
    board
        .set_tile(
            Vec2::new(5, 4),
            TileData { kind: TileKind::InSwitch, direction: Direction::South, state1: SignalState::High, ..TileData::blank() },
        )
        .unwrap();
    // Horizontal driver to the west, low.
    board
        .set_tile(
            Vec2::new(4, 5),
            TileData { kind: TileKind::InSwitch, direction: Direction::East, state1: SignalState::Low, ..TileData::blank() },
        )
        .unwrap();

    engine.tick(&mut board);

    let crossover = board.peek_tile(Vec2::new(5, 5));
    assert_eq!(crossover.state1, SignalState::High, "vertical channel carries the north driver");
    assert_eq!(crossover.state2, SignalState::Low, "horizontal channel carries the west driver, unmixed");

    // Sample each channel on its far exit: south for vertical, east for
    // horizontal. Neither exit should see the other channel's value.
    assert_eq!(crossover.check_output(Direction::South), SignalState::High);
    assert_eq!(crossover.check_output(Direction::East), SignalState::Low);
}
