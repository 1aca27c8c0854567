//! The one piece of process-wide mutable state the core keeps: a shared RNG
//! seeded once at init (spec §5: "a process-wide random-number generator
//! seeded once at init... no global mutable state escapes the core besides
//! this RNG"). Mirrors `Simulator::mainRNG` in the original, a `mt19937`
//! seeded once from the clock at startup and read through
//! `Simulator::randomInteger`; everything that called it there lived in the
//! UI layer this crate doesn't carry, so this module exists for API
//! completeness rather than any internal caller.

use std::sync::OnceLock;

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

static MAIN_RNG: OnceLock<Mutex<ChaCha8Rng>> = OnceLock::new();

fn main_rng() -> &'static Mutex<ChaCha8Rng> {
    MAIN_RNG.get_or_init(|| Mutex::new(ChaCha8Rng::from_entropy()))
}

/// A random integer in `[min, max]` inclusive, matching the original's
/// `Simulator::randomInteger(min, max)`.
///
/// Panics if `min > max`.
pub fn random_integer(min: i32, max: i32) -> i32 {
    assert!(min <= max, "random_integer: min ({min}) must not exceed max ({max})");
    let span = (max - min) as u32 + 1;
    min + (main_rng().lock().next_u32() % span) as i32
}

/// A random integer in `[0, n)`, matching the original's single-argument
/// `Simulator::randomInteger(n)`.
///
/// Panics if `n <= 0`.
pub fn random_below(n: i32) -> i32 {
    assert!(n > 0, "random_below: n ({n}) must be positive");
    random_integer(0, n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_integer_stays_in_range() {
        for _ in 0..256 {
            let v = random_integer(3, 7);
            assert!((3..=7).contains(&v));
        }
    }

    #[test]
    fn random_integer_single_value_range_is_that_value() {
        assert_eq!(random_integer(9, 9), 9);
    }

    #[test]
    fn random_below_stays_in_range() {
        for _ in 0..256 {
            let v = random_below(5);
            assert!((0..5).contains(&v));
        }
    }
}
