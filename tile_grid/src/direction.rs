//! The four cardinal directions a tile can face.

/// One of the four sides of a tile. Ordinal order North=0, East=1, South=2,
/// West=3 matches the wire connection table's indexing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

/// Number of variants of `Direction`.
pub const NUM_DIRECTIONS: usize = 4;

/// All four directions in ordinal order.
pub const DIRECTIONS: [Direction; NUM_DIRECTIONS] =
    [Direction::North, Direction::East, Direction::South, Direction::West];

impl Direction {
    /// The direction opposite this one.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotate 90 degrees clockwise (N -> E -> S -> W -> N).
    pub fn rotate_cw(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn rotate_ccw(self) -> Direction {
        self.rotate_cw().opposite()
    }

    /// Reflect across a vertical axis (east and west swap).
    pub fn flip_vertical(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            d => d,
        }
    }

    /// Reflect across a horizontal axis (north and south swap).
    pub fn flip_horizontal(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            d => d,
        }
    }

    /// The unit step (dx, dy) taken by moving one tile in this direction,
    /// with +y south (row-major, screen-space convention).
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// True if this direction is odd (East or West) in ordinal order; used by
    /// straight-wire and crossover axis logic.
    pub fn is_odd(self) -> bool {
        (self as u8) % 2 == 1
    }

    pub fn from_u8(v: u8) -> Option<Direction> {
        DIRECTIONS.get(v as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_cw_then_ccw_is_identity() {
        for d in DIRECTIONS {
            assert_eq!(d.rotate_cw().rotate_ccw(), d);
        }
    }

    #[test]
    fn flip_twice_is_identity() {
        for d in DIRECTIONS {
            assert_eq!(d.flip_vertical().flip_vertical(), d);
            assert_eq!(d.flip_horizontal().flip_horizontal(), d);
        }
    }

    #[test]
    fn opposite_is_involution() {
        for d in DIRECTIONS {
            assert_eq!(d.opposite().opposite(), d);
            assert_ne!(d.opposite(), d);
        }
    }
}
