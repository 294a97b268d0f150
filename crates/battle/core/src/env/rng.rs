//! Initiative rollers.
//!
//! Rolls go through the [`InitiativeRoller`] trait so battles can be replayed
//! from a seed and tests can pin every roll to a known value.

/// Source of per-round initiative rolls.
pub trait InitiativeRoller {
    /// Generate the next raw 32-bit value.
    fn next_u32(&mut self) -> u32;

    /// Roll a value in `[min, max]` inclusive.
    fn roll(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let span = (i64::from(max) - i64::from(min) + 1) as u64;
        let offset = u64::from(self.next_u32()) % span;
        (i64::from(min) + offset as i64) as i32
    }
}

/// PCG random number generator (Permuted Congruential Generator).
///
/// PCG-XSH-RR: 64-bit state, 32-bit output. The same seed always yields the
/// same roll sequence, which makes whole battles replayable.
#[derive(Clone, Copy, Debug)]
pub struct PcgRoller {
    state: u64,
}

impl PcgRoller {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// `state' = (state * multiplier + increment) mod 2^64`
    #[inline]
    fn pcg_step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    /// XSH-RR output permutation.
    #[inline]
    fn pcg_output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl InitiativeRoller for PcgRoller {
    fn next_u32(&mut self) -> u32 {
        self.state = Self::pcg_step(self.state);
        Self::pcg_output(self.state)
    }
}

/// Roller that always produces the same value, clamped into the roll range.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedRoller(pub i32);

impl InitiativeRoller for FixedRoller {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn roll(&mut self, min: i32, max: i32) -> i32 {
        self.0.clamp(min.min(max), max.max(min))
    }
}

impl<R: InitiativeRoller + ?Sized> InitiativeRoller for Box<R> {
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }

    fn roll(&mut self, min: i32, max: i32) -> i32 {
        (**self).roll(min, max)
    }
}
