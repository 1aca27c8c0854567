//! `TileKind`, the stateless dispatch discriminant, and `TileData`, the
//! packed per-cell record stored inside a `Chunk`. Every `TileData` method
//! here is pure with respect to the tile's own identity: it reads and writes
//! only this slot, never a neighbor's — cross-tile interaction is mediated by
//! the traversal engine, not by the tile types themselves.

use crate::direction::Direction;
use crate::state::SignalState;

/// The kind of a tile. Dispatch is a `match` on this discriminant rather than
/// a heap-allocated behavior object — there is exactly one (stateless)
/// behavior per variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum TileKind {
    Blank,
    WireStraight,
    WireCorner,
    WireTee,
    WireJunction,
    WireCrossover,
    InSwitch,
    InButton,
    OutLed,
    GateDiode,
    GateBuffer,
    GateNot,
    GateAnd,
    GateNand,
    GateOr,
    GateNor,
    GateXor,
    GateXnor,
    Label,
}

impl TileKind {
    pub fn is_wire(self) -> bool {
        matches!(
            self,
            TileKind::WireStraight
                | TileKind::WireCorner
                | TileKind::WireTee
                | TileKind::WireJunction
                | TileKind::WireCrossover
        )
    }

    pub fn is_gate(self) -> bool {
        matches!(
            self,
            TileKind::GateDiode
                | TileKind::GateBuffer
                | TileKind::GateNot
                | TileKind::GateAnd
                | TileKind::GateNand
                | TileKind::GateOr
                | TileKind::GateNor
                | TileKind::GateXor
                | TileKind::GateXnor
        )
    }

    pub fn is_input(self) -> bool {
        matches!(self, TileKind::InSwitch | TileKind::InButton)
    }

    pub fn is_led(self) -> bool {
        matches!(self, TileKind::OutLed)
    }

    pub fn is_crossover(self) -> bool {
        matches!(self, TileKind::WireCrossover)
    }

    /// Whether `direction` is meaningless for this kind (spec §3: "irrelevant
    /// for Blank, Junction, Crossover, and Led").
    pub fn direction_irrelevant(self) -> bool {
        matches!(
            self,
            TileKind::Blank | TileKind::WireJunction | TileKind::WireCrossover | TileKind::OutLed
        )
    }

    /// The gate this gate type complements under the alternative-form
    /// operation, or `None` for a non-gate or for `GateDiode` (which has no
    /// complement).
    pub fn gate_complement(self) -> Option<TileKind> {
        match self {
            TileKind::GateBuffer => Some(TileKind::GateNot),
            TileKind::GateNot => Some(TileKind::GateBuffer),
            TileKind::GateAnd => Some(TileKind::GateNand),
            TileKind::GateNand => Some(TileKind::GateAnd),
            TileKind::GateOr => Some(TileKind::GateNor),
            TileKind::GateNor => Some(TileKind::GateOr),
            TileKind::GateXor => Some(TileKind::GateXnor),
            TileKind::GateXnor => Some(TileKind::GateXor),
            _ => None,
        }
    }

    /// All 19 kinds in discriminant order, matching `as u8`/`from_u8`.
    pub const ALL: [TileKind; 19] = [
        TileKind::Blank,
        TileKind::WireStraight,
        TileKind::WireCorner,
        TileKind::WireTee,
        TileKind::WireJunction,
        TileKind::WireCrossover,
        TileKind::InSwitch,
        TileKind::InButton,
        TileKind::OutLed,
        TileKind::GateDiode,
        TileKind::GateBuffer,
        TileKind::GateNot,
        TileKind::GateAnd,
        TileKind::GateNand,
        TileKind::GateOr,
        TileKind::GateNor,
        TileKind::GateXor,
        TileKind::GateXnor,
        TileKind::Label,
    ];

    pub fn from_u8(v: u8) -> Option<TileKind> {
        TileKind::ALL.get(v as usize).copied()
    }
}

/// Does a wire tile of `kind` oriented `direction` connect to `side`?
///
/// `WireJunction` and `WireCrossover` connect every side regardless of
/// orientation. `WireStraight` connects `direction` and its opposite.
/// `WireCorner` connects `direction` and the side clockwise of it.
/// `WireTee` connects every side except `direction` (the stem pointing away
/// from the junction).
pub fn wire_connects(kind: TileKind, direction: Direction, side: Direction) -> bool {
    match kind {
        TileKind::WireStraight => side == direction || side == direction.opposite(),
        TileKind::WireCorner => side == direction || side == direction.rotate_cw(),
        TileKind::WireTee => side != direction,
        TileKind::WireJunction | TileKind::WireCrossover => true,
        _ => false,
    }
}

/// Toggle a straight wire's canonical axis: North and East are the only
/// two directions a straight wire is ever stored as (South/West collapse
/// onto their electrically identical opposite), so any rotation just
/// swaps between them.
fn toggle_straight_axis(direction: Direction) -> Direction {
    match direction {
        Direction::North | Direction::South => Direction::East,
        Direction::East | Direction::West => Direction::North,
    }
}

/// Corner direction remap for a vertical-axis (east/west mirror) flip:
/// derived from the corner's two connected sides `{d, cw(d)}` transforming
/// element-wise under the east/west swap, then solving for the `d'` whose
/// own connected pair matches the transformed set.
fn flip_vertical_corner(direction: Direction) -> Direction {
    match direction {
        Direction::North => Direction::West,
        Direction::West => Direction::North,
        Direction::East => Direction::South,
        Direction::South => Direction::East,
    }
}

/// Corner direction remap for a horizontal-axis (north/south mirror) flip;
/// derived the same way as `flip_vertical_corner`.
fn flip_horizontal_corner(direction: Direction) -> Direction {
    match direction {
        Direction::North => Direction::East,
        Direction::East => Direction::North,
        Direction::South => Direction::West,
        Direction::West => Direction::South,
    }
}

/// The packed per-cell record. Fits comfortably in a handful of bytes:
/// one byte each for `kind`, `direction`, `state1`, `state2`, `meta`, and a
/// bit for `highlight`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TileData {
    pub kind: TileKind,
    pub direction: Direction,
    pub state1: SignalState,
    pub state2: SignalState,
    pub highlight: bool,
    pub meta: u8,
}

impl TileData {
    /// A blank, disconnected tile — the default contents of a freshly
    /// allocated chunk.
    pub const fn blank() -> TileData {
        TileData {
            kind: TileKind::Blank,
            direction: Direction::North,
            state1: SignalState::Disconnected,
            state2: SignalState::Disconnected,
            highlight: false,
            meta: 0,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.kind == TileKind::Blank && !self.highlight
    }

    /// The value this tile presents toward a neighbor on `side`, with no
    /// knowledge of the neighbor itself. Crossover reports `state1` (the
    /// vertical channel) on its north/south sides and `state2` (horizontal)
    /// on its east/west sides. A gate reports `state1` only on its output
    /// side (opposite its `direction`); every other side of a gate is an
    /// input and never drives. Inputs (switch/button) drive every side
    /// equally with `state1`. LEDs are pure sinks and never drive.
    pub fn check_output(&self, side: Direction) -> SignalState {
        match self.kind {
            TileKind::Blank | TileKind::Label | TileKind::OutLed => SignalState::Disconnected,
            TileKind::WireCrossover => {
                if wire_connects(self.kind, self.direction, side) {
                    if side == Direction::North || side == Direction::South {
                        self.state1
                    } else {
                        self.state2
                    }
                } else {
                    SignalState::Disconnected
                }
            }
            k if k.is_wire() => {
                if wire_connects(k, self.direction, side) {
                    self.state1
                } else {
                    SignalState::Disconnected
                }
            }
            k if k.is_input() => self.state1,
            k if k.is_gate() => {
                if side == self.direction.opposite() {
                    self.state1
                } else {
                    SignalState::Disconnected
                }
            }
            _ => SignalState::Disconnected,
        }
    }

    /// Rotate this tile 90 degrees clockwise. Crossover swaps its two signal
    /// channels under a 90 degree turn (and therefore preserves them under
    /// 180 degrees, two applications). A straight wire only ever faces North
    /// or East (its two directions are electrically identical to their
    /// opposites), so it cycles modulo 2 rather than modulo 4.
    pub fn rotate_cw(&mut self) {
        if self.kind == TileKind::WireStraight {
            self.direction = toggle_straight_axis(self.direction);
            return;
        }
        self.direction = self.direction.rotate_cw();
        if self.kind == TileKind::WireCrossover {
            std::mem::swap(&mut self.state1, &mut self.state2);
        }
    }

    pub fn rotate_ccw(&mut self) {
        if self.kind == TileKind::WireStraight {
            self.direction = toggle_straight_axis(self.direction);
            return;
        }
        self.direction = self.direction.rotate_ccw();
        if self.kind == TileKind::WireCrossover {
            std::mem::swap(&mut self.state1, &mut self.state2);
        }
    }

    /// Flip across a vertical axis (mirrors east/west). A corner's two
    /// connected sides don't transform as a simple per-axis swap of its
    /// `direction` value (unlike a tee, whose excluded side does): a corner
    /// facing North (connecting North and East) mirrored east/west now
    /// connects North and West, which is the corner facing West — so corner
    /// direction remaps via the dedicated permutation below. A straight wire
    /// is unaffected (a vertical or horizontal line mirrored onto itself is
    /// still the same line).
    pub fn flip_vertical(&mut self) {
        match self.kind {
            TileKind::WireStraight => {}
            TileKind::WireCorner => self.direction = flip_vertical_corner(self.direction),
            _ => self.direction = self.direction.flip_vertical(),
        }
    }

    pub fn flip_horizontal(&mut self) {
        match self.kind {
            TileKind::WireStraight => {}
            TileKind::WireCorner => self.direction = flip_horizontal_corner(self.direction),
            _ => self.direction = self.direction.flip_horizontal(),
        }
    }

    /// Toggle to the alternative form: Junction and Crossover swap (copying
    /// `state1` onto the fresh `state2` when becoming a crossover); a gate
    /// swaps to its complementary type (Diode has none, and does nothing);
    /// every other kind is unaffected.
    pub fn alternative_form(&mut self) {
        match self.kind {
            TileKind::WireJunction => {
                self.kind = TileKind::WireCrossover;
                self.state2 = self.state1;
            }
            TileKind::WireCrossover => {
                self.kind = TileKind::WireJunction;
            }
            k if k.is_gate() => {
                if let Some(complement) = k.gate_complement() {
                    self.kind = complement;
                }
            }
            _ => {}
        }
    }
}

impl Default for TileData {
    fn default() -> Self {
        TileData::blank()
    }
}

/// Boolean laws for the nine gate kinds, evaluated over the three non-output
/// neighbors' reported states. `total`/`high`/`middle` are the counts of
/// connected, High, and Middle neighbors respectively (Middle only counted
/// when `extra_logic_states` is enabled by the caller). Mirrors
/// `TileGate::updateNextState` in the reference implementation.
pub fn evaluate_gate(kind: TileKind, total: u32, high: u32, middle: u32) -> SignalState {
    match kind {
        TileKind::GateDiode => {
            if total == 1 && high == 1 {
                SignalState::High
            } else if total == 1 && middle == 1 {
                SignalState::Middle
            } else {
                SignalState::Low
            }
        }
        TileKind::GateBuffer => {
            if total == 1 && high == 1 {
                SignalState::High
            } else if total == 1 && middle == 1 {
                SignalState::Middle
            } else {
                SignalState::Low
            }
        }
        TileKind::GateNot => complement(evaluate_gate(TileKind::GateBuffer, total, high, middle)),
        TileKind::GateAnd | TileKind::GateNand => {
            let result = if total >= 2 && high == total {
                SignalState::High
            } else if total >= 2 && high + middle == total {
                SignalState::Middle
            } else {
                SignalState::Low
            };
            if kind == TileKind::GateNand {
                complement(result)
            } else {
                result
            }
        }
        TileKind::GateOr | TileKind::GateNor => {
            let result = if total >= 2 && high > 0 {
                SignalState::High
            } else if total >= 2 && middle > 0 {
                SignalState::Middle
            } else {
                SignalState::Low
            };
            if kind == TileKind::GateNor {
                complement(result)
            } else {
                result
            }
        }
        TileKind::GateXor | TileKind::GateXnor => {
            let result = if total < 2 {
                SignalState::Low
            } else if middle > 0 {
                SignalState::Middle
            } else if high % 2 == 1 {
                SignalState::High
            } else {
                SignalState::Low
            };
            if kind == TileKind::GateXnor {
                complement(result)
            } else {
                result
            }
        }
        _ => SignalState::Disconnected,
    }
}

/// Complement a concrete gate output: High/Low swap, Middle is its own
/// complement (a conflict remains a conflict under negation).
fn complement(state: SignalState) -> SignalState {
    match state {
        SignalState::High => SignalState::Low,
        SignalState::Low => SignalState::High,
        other => other,
    }
}
