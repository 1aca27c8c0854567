//! `LegacyCodec`: the older fixed-grid ASCII save format, kept for read/write
//! compatibility alongside the sector-based region format (spec §4.5/§6).
//!
//! A save is a flat text document: a `width:`/`height:` header, a `data: {`
//! block carrying an `extraLogicStates:` flag followed by exactly `height`
//! rows of `width` one-byte symbols (one per tile), a `keys: {` block
//! recording the keyboard keycode of every switch and button by coordinate,
//! and a `notes: {` block of free text. Every symbol is one of 157 values,
//! assigned by tile kind, orientation, and signal state; index 0 is always
//! blank. The table only distinguishes Low/High/Middle (and, for
//! switches/buttons/LEDs, only Low/High) — a wire or gate whose state
//! happens to be `Disconnected` when saved round-trips as `Low`, which the
//! next tick corrects if it's wrong.
//!
//! `load` checks the leading `version:` header before parsing anything else;
//! an unrecognized version fails the load rather than misinterpreting a
//! differently-shaped document (`recognizes_version` exposes this check on
//! its own, for a caller choosing between this codec and the region format).

use std::collections::HashMap;

use vek::Vec2;

use tile_grid::tile::{TileData, TileKind};
use tile_grid::{Direction, SignalState};

use crate::board::Board;
use crate::error::{CircuitError, Result};

const WIRE_STRAIGHT_START: u8 = 1;
const WIRE_CORNER_START: u8 = 7;
const WIRE_TEE_START: u8 = 19;
const WIRE_JUNCTION_START: u8 = 31;
const WIRE_CROSSOVER_START: u8 = 34;
const IN_SWITCH_START: u8 = 43;
const IN_BUTTON_START: u8 = 45;
const OUT_LED_START: u8 = 47;
const GATE_START: u8 = 49;
const GATE_KIND_SPAN: u8 = 12;

const GATE_KINDS: [TileKind; 9] = [
    TileKind::GateDiode,
    TileKind::GateBuffer,
    TileKind::GateNot,
    TileKind::GateAnd,
    TileKind::GateNand,
    TileKind::GateOr,
    TileKind::GateNor,
    TileKind::GateXor,
    TileKind::GateXnor,
];

/// Total number of distinct symbols in the table (spec §4.5).
pub const SYMBOL_COUNT: u8 = 157;

/// The only legacy version this codec understands.
const RECOGNIZED_VERSION: &str = "1.0";

/// Peek at `text`'s `version:` header without parsing the rest of the
/// document. Spec §4.5: "an unknown version falls through to the region
/// format probe" — callers that dispatch between the two save formats use
/// this instead of attempting a full `load` and discarding a parse failure.
pub fn recognizes_version(text: &str) -> bool {
    text.lines()
        .find_map(|l| l.trim().strip_prefix("version:"))
        .map(|v| v.trim() == RECOGNIZED_VERSION)
        .unwrap_or(false)
}

/// The result of a legacy load: the board plus any dropped-duplicate-key
/// warnings, which are not fatal to the load as a whole.
pub struct LegacyLoadResult {
    pub board: Board,
    pub warnings: Vec<CircuitError>,
}

fn symbol_for_index(index: u8) -> char {
    (32 + index as u32) as u8 as char
}

fn index_for_symbol(ch: char) -> Option<u8> {
    let v = ch as u32;
    if (32..32 + SYMBOL_COUNT as u32).contains(&v) {
        Some((v - 32) as u8)
    } else {
        None
    }
}

/// Low/Middle/High collapse onto a definite three-way index; `Disconnected`
/// is indistinguishable from `Low` in this format.
fn definite_state_index(state: SignalState) -> u8 {
    match state {
        SignalState::High => 1,
        SignalState::Middle => 2,
        _ => 0,
    }
}

fn index_to_definite_state(index: u8) -> SignalState {
    match index {
        0 => SignalState::Low,
        1 => SignalState::High,
        _ => SignalState::Middle,
    }
}

/// Switches, buttons, and LEDs only ever round-trip Low or High.
fn binary_state_index(state: SignalState) -> u8 {
    if state.is_high() {
        1
    } else {
        0
    }
}

fn index_to_binary_state(index: u8) -> SignalState {
    if index == 0 {
        SignalState::Low
    } else {
        SignalState::High
    }
}

fn straight_direction_index(direction: Direction) -> u8 {
    if direction == Direction::East {
        1
    } else {
        0
    }
}

fn straight_index_to_direction(index: u8) -> Direction {
    if index == 1 {
        Direction::East
    } else {
        Direction::North
    }
}

/// Map a tile to its symbol table index, or `None` if this kind has no
/// legacy representation (only `Label`, which predates this format).
fn tile_to_symbol_index(tile: &TileData) -> Option<u8> {
    match tile.kind {
        TileKind::Blank => Some(0),
        TileKind::Label => None,
        TileKind::WireStraight => {
            let dir = straight_direction_index(tile.direction);
            let state = definite_state_index(tile.state1);
            Some(WIRE_STRAIGHT_START + dir * 3 + state)
        }
        TileKind::WireCorner => {
            let dir = tile.direction as u8;
            let state = definite_state_index(tile.state1);
            Some(WIRE_CORNER_START + dir * 3 + state)
        }
        TileKind::WireTee => {
            let dir = tile.direction as u8;
            let state = definite_state_index(tile.state1);
            Some(WIRE_TEE_START + dir * 3 + state)
        }
        TileKind::WireJunction => Some(WIRE_JUNCTION_START + definite_state_index(tile.state1)),
        TileKind::WireCrossover => {
            let s1 = definite_state_index(tile.state1);
            let s2 = definite_state_index(tile.state2);
            Some(WIRE_CROSSOVER_START + s1 * 3 + s2)
        }
        TileKind::InSwitch => Some(IN_SWITCH_START + binary_state_index(tile.state1)),
        TileKind::InButton => Some(IN_BUTTON_START + binary_state_index(tile.state1)),
        TileKind::OutLed => Some(OUT_LED_START + binary_state_index(tile.state1)),
        kind if kind.is_gate() => {
            let gate_index = GATE_KINDS.iter().position(|&k| k == kind)? as u8;
            let dir = tile.direction as u8;
            let state = definite_state_index(tile.state1);
            Some(GATE_START + gate_index * GATE_KIND_SPAN + dir * 3 + state)
        }
        _ => None,
    }
}

/// Inverse of `tile_to_symbol_index`. `meta` (a switch/button's keycode) is
/// always zero here; the `keys:` block fills it in separately.
fn symbol_index_to_tile(index: u8) -> Option<TileData> {
    let blank = TileData::blank;
    match index {
        0 => Some(blank()),
        i if i < WIRE_CORNER_START => {
            let local = i - WIRE_STRAIGHT_START;
            let direction = straight_index_to_direction(local / 3);
            let state1 = index_to_definite_state(local % 3);
            Some(TileData { kind: TileKind::WireStraight, direction, state1, ..blank() })
        }
        i if i < WIRE_TEE_START => {
            let local = i - WIRE_CORNER_START;
            let direction = Direction::from_u8(local / 3)?;
            let state1 = index_to_definite_state(local % 3);
            Some(TileData { kind: TileKind::WireCorner, direction, state1, ..blank() })
        }
        i if i < WIRE_JUNCTION_START => {
            let local = i - WIRE_TEE_START;
            let direction = Direction::from_u8(local / 3)?;
            let state1 = index_to_definite_state(local % 3);
            Some(TileData { kind: TileKind::WireTee, direction, state1, ..blank() })
        }
        i if i < WIRE_CROSSOVER_START => {
            let local = i - WIRE_JUNCTION_START;
            let state1 = index_to_definite_state(local);
            Some(TileData { kind: TileKind::WireJunction, state1, ..blank() })
        }
        i if i < IN_SWITCH_START => {
            let local = i - WIRE_CROSSOVER_START;
            let state1 = index_to_definite_state(local / 3);
            let state2 = index_to_definite_state(local % 3);
            Some(TileData { kind: TileKind::WireCrossover, state1, state2, ..blank() })
        }
        i if i < IN_BUTTON_START => {
            let state1 = index_to_binary_state(i - IN_SWITCH_START);
            Some(TileData { kind: TileKind::InSwitch, state1, ..blank() })
        }
        i if i < OUT_LED_START => {
            let state1 = index_to_binary_state(i - IN_BUTTON_START);
            Some(TileData { kind: TileKind::InButton, state1, ..blank() })
        }
        i if i < GATE_START => {
            let state1 = index_to_binary_state(i - OUT_LED_START);
            Some(TileData { kind: TileKind::OutLed, state1, ..blank() })
        }
        i if i < SYMBOL_COUNT => {
            let local = i - GATE_START;
            let gate_index = (local / GATE_KIND_SPAN) as usize;
            let within = local % GATE_KIND_SPAN;
            let kind = *GATE_KINDS.get(gate_index)?;
            let direction = Direction::from_u8(within / 3)?;
            let state1 = index_to_definite_state(within % 3);
            Some(TileData { kind, direction, state1, ..blank() })
        }
        _ => None,
    }
}

/// Serialize `board` in the legacy grid format. Requires a bounded board
/// (`max_size` must be set) since the format has no sparse representation.
pub fn save(board: &Board) -> Result<String> {
    let size = board.max_size().ok_or_else(|| CircuitError::FileStorageError {
        filename: "<legacy>".to_string(),
        locator: "legacy export requires a bounded board (max_size is unset)".to_string(),
    })?;

    let mut out = String::new();
    out.push_str("version: 1.0\n");
    out.push_str(&format!("width: {}\n", size));
    out.push_str(&format!("height: {}\n", size));
    out.push_str("data: {\n");
    out.push_str(&format!("extraLogicStates: {}\n", board.extra_logic_states as u8));

    let mut keys = Vec::new();
    for y in 0..size {
        let mut row = String::with_capacity(size as usize);
        for x in 0..size {
            let tile = board.peek_tile(Vec2::new(x, y));
            let index = tile_to_symbol_index(&tile).unwrap_or(0);
            row.push(symbol_for_index(index));
            if matches!(tile.kind, TileKind::InSwitch | TileKind::InButton) {
                keys.push((x, y, tile.meta));
            }
        }
        out.push_str(&row);
        out.push('\n');
    }
    out.push_str("}\n");

    out.push_str("keys: {\n");
    for (x, y, keycode) in keys {
        out.push_str(&format!("{},{},{}\n", x, y, keycode));
    }
    out.push_str("}\n");

    out.push_str("notes: {\n");
    out.push_str(&board.notes_text);
    if !board.notes_text.is_empty() && !board.notes_text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("}\n");

    Ok(out)
}

/// Parse a legacy-format document into a fresh board. Structural problems
/// (missing header fields, a wrong-length row, an unrecognized symbol) fail
/// the whole load; a repeated keycode across two inputs drops the second
/// occurrence and reports it as a warning rather than failing.
pub fn load(text: &str) -> Result<LegacyLoadResult> {
    let err = |locator: String| CircuitError::FileStorageError { filename: "<legacy>".to_string(), locator };

    if !recognizes_version(text) {
        return Err(err("unrecognized or missing legacy version header".to_string()));
    }

    let mut width = 0i32;
    let mut height = 0i32;
    let mut rows: Vec<String> = Vec::new();
    let mut key_entries: Vec<(i32, i32, u8)> = Vec::new();
    let mut notes_text = String::new();
    let mut extra_logic_states = false;

    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if let Some(v) = trimmed.strip_prefix("width:") {
            width = v.trim().parse().map_err(|_| err(format!("invalid width {:?}", v)))?;
        } else if let Some(v) = trimmed.strip_prefix("height:") {
            height = v.trim().parse().map_err(|_| err(format!("invalid height {:?}", v)))?;
        } else if trimmed == "data: {" {
            for l in lines.by_ref() {
                let lt = l.trim_end();
                if lt == "}" {
                    break;
                }
                if let Some(v) = lt.trim().strip_prefix("extraLogicStates:") {
                    extra_logic_states = v.trim() == "1";
                    continue;
                }
                rows.push(l.to_string());
            }
        } else if trimmed == "keys: {" {
            for l in lines.by_ref() {
                let l = l.trim();
                if l == "}" {
                    break;
                }
                let parts: Vec<&str> = l.splitn(3, ',').collect();
                if parts.len() == 3 {
                    if let (Ok(x), Ok(y), Ok(k)) =
                        (parts[0].trim().parse(), parts[1].trim().parse(), parts[2].trim().parse())
                    {
                        key_entries.push((x, y, k));
                    }
                }
            }
        } else if trimmed == "notes: {" {
            let mut buf = String::new();
            for l in lines.by_ref() {
                if l.trim_end() == "}" {
                    break;
                }
                buf.push_str(l);
                buf.push('\n');
            }
            notes_text = buf;
        }
    }

    if width <= 0 || height <= 0 {
        return Err(err("missing or non-positive width/height".to_string()));
    }
    if rows.len() as i32 != height {
        return Err(err(format!("expected {} data rows, found {}", height, rows.len())));
    }

    let mut board = Board::new(Some(width.max(height)));
    board.notes_text = notes_text;
    board.extra_logic_states = extra_logic_states;

    for (y, row) in rows.iter().enumerate() {
        let chars: Vec<char> = row.chars().collect();
        if chars.len() as i32 != width {
            return Err(err(format!("row {} has {} symbols, expected {}", y, chars.len(), width)));
        }
        for (x, &ch) in chars.iter().enumerate() {
            let index = index_for_symbol(ch).ok_or_else(|| err(format!("unrecognized symbol {:?} at ({}, {})", ch, x, y)))?;
            if index == 0 {
                continue;
            }
            let tile = symbol_index_to_tile(index)
                .ok_or_else(|| err(format!("symbol index {} at ({}, {}) has no tile mapping", index, x, y)))?;
            board.set_tile(Vec2::new(x as i32, y as i32), tile).expect("coordinate is in-bounds by construction");
        }
    }

    let mut warnings = Vec::new();
    let mut seen_keys: HashMap<u8, (i32, i32)> = HashMap::new();
    for (x, y, keycode) in key_entries {
        if seen_keys.contains_key(&keycode) {
            warnings.push(CircuitError::DuplicateInputKey { keycode, x, y });
            continue;
        }
        seen_keys.insert(keycode, (x, y));
        let tc = Vec2::new(x, y);
        let mut tile = board.peek_tile(tc);
        if matches!(tile.kind, TileKind::InSwitch | TileKind::InButton) {
            tile.meta = keycode;
            board.set_tile(tc, tile).expect("coordinate is in-bounds by construction");
        }
    }
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "dropped duplicate input keycodes on legacy load");
    }

    Ok(LegacyLoadResult { board, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_grid::tile::TileKind;

    fn sample_board() -> Board {
        let mut board = Board::new(Some(8));
        board
            .set_tile(
                Vec2::new(0, 0),
                TileData { kind: TileKind::InSwitch, state1: SignalState::High, meta: 5, ..TileData::blank() },
            )
            .unwrap();
        board
            .set_tile(
                Vec2::new(1, 0),
                TileData {
                    kind: TileKind::WireStraight,
                    direction: Direction::East,
                    state1: SignalState::High,
                    ..TileData::blank()
                },
            )
            .unwrap();
        board
            .set_tile(
                Vec2::new(2, 0),
                TileData {
                    kind: TileKind::GateAnd,
                    direction: Direction::South,
                    state1: SignalState::Low,
                    ..TileData::blank()
                },
            )
            .unwrap();
        board.set_tile(Vec2::new(3, 0), TileData { kind: TileKind::OutLed, state1: SignalState::High, ..TileData::blank() }).unwrap();
        board.notes_text = "legacy round trip".to_string();
        board.extra_logic_states = true;
        board
    }

    #[test]
    fn save_then_load_round_trips_kind_direction_and_state() {
        let board = sample_board();
        let text = save(&board).unwrap();
        let result = load(&text).unwrap();
        assert!(result.warnings.is_empty());

        let switch = result.board.peek_tile(Vec2::new(0, 0));
        assert_eq!(switch.kind, TileKind::InSwitch);
        assert_eq!(switch.state1, SignalState::High);
        assert_eq!(switch.meta, 5);

        let wire = result.board.peek_tile(Vec2::new(1, 0));
        assert_eq!(wire.kind, TileKind::WireStraight);
        assert_eq!(wire.direction, Direction::East);
        assert_eq!(wire.state1, SignalState::High);

        let gate = result.board.peek_tile(Vec2::new(2, 0));
        assert_eq!(gate.kind, TileKind::GateAnd);
        assert_eq!(gate.direction, Direction::South);

        let led = result.board.peek_tile(Vec2::new(3, 0));
        assert_eq!(led.kind, TileKind::OutLed);
        assert_eq!(led.state1, SignalState::High);

        assert_eq!(result.board.notes_text, "legacy round trip\n");
        assert!(result.board.extra_logic_states);
    }

    #[test]
    fn duplicate_input_keycodes_are_dropped_and_warned() {
        let mut board = Board::new(Some(4));
        board
            .set_tile(Vec2::new(0, 0), TileData { kind: TileKind::InSwitch, state1: SignalState::Low, meta: 9, ..TileData::blank() })
            .unwrap();
        board
            .set_tile(Vec2::new(1, 0), TileData { kind: TileKind::InButton, state1: SignalState::Low, meta: 9, ..TileData::blank() })
            .unwrap();
        let text = save(&board).unwrap();
        let result = load(&text).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(result.warnings[0], CircuitError::DuplicateInputKey { keycode: 9, .. }));
    }

    #[test]
    fn export_requires_a_bounded_board() {
        let board = Board::new(None);
        assert!(save(&board).is_err());
    }

    #[test]
    fn unrecognized_version_falls_through_rather_than_misparsing() {
        let text = "version: 2.0\nwidth: 1\nheight: 1\ndata: {\nextraLogicStates: 0\n \n}\nnotes: {\n}\n";
        assert!(!recognizes_version(text));
        assert!(load(text).is_err());
    }

    #[test]
    fn recognizes_version_peeks_without_full_parse() {
        assert!(recognizes_version("version: 1.0\nwidth: 4\n"));
        assert!(!recognizes_version("width: 4\nheight: 4\n"));
    }

    #[test]
    fn blank_tile_round_trips_as_index_zero() {
        assert_eq!(tile_to_symbol_index(&TileData::blank()), Some(0));
        assert_eq!(symbol_index_to_tile(0), Some(TileData::blank()));
    }
}
