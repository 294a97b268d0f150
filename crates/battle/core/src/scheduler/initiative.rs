use super::InitiativeRoller;

/// Per-round initiative record for one combatant.
///
/// `current = (rolled + base) * wait_modifier`. The wait modifier flips from
/// active to delayed at most once per round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RolledInitiative {
    rolled: i32,
    base: i32,
    wait_modifier: i32,
}

impl RolledInitiative {
    pub const WAIT_MODIFIER_ACTIVE: i32 = 1;
    pub const WAIT_MODIFIER_DELAYED: i32 = -1;

    pub const fn new(base: i32) -> Self {
        Self {
            rolled: 0,
            base,
            wait_modifier: Self::WAIT_MODIFIER_ACTIVE,
        }
    }

    /// Replace the roll with a fresh value from `roller`.
    pub fn roll(&mut self, roller: &mut dyn InitiativeRoller, min: i32, max: i32) -> i32 {
        self.rolled = roller.roll(min, max);
        self.rolled
    }

    pub const fn current(&self) -> i32 {
        self.rolled
            .saturating_add(self.base)
            .saturating_mul(self.wait_modifier)
    }

    pub const fn rolled(&self) -> i32 {
        self.rolled
    }

    pub const fn base(&self) -> i32 {
        self.base
    }

    pub fn set_base(&mut self, base: i32) {
        self.base = base;
    }

    /// Flip to delayed. Returns false if the combatant already waited.
    pub fn wait(&mut self) -> bool {
        if !self.can_wait() {
            return false;
        }
        self.wait_modifier = Self::WAIT_MODIFIER_DELAYED;
        true
    }

    pub const fn can_wait(&self) -> bool {
        self.wait_modifier == Self::WAIT_MODIFIER_ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::FixedRoller;

    #[test]
    fn current_combines_base_and_roll() {
        let mut initiative = RolledInitiative::new(10);
        initiative.roll(&mut FixedRoller(3), -4, 4);
        assert_eq!(initiative.current(), 13);
    }

    #[test]
    fn wait_negates_current_once() {
        let mut initiative = RolledInitiative::new(10);
        initiative.roll(&mut FixedRoller(-2), -4, 4);

        assert!(initiative.wait());
        assert_eq!(initiative.current(), -8);
        assert!(!initiative.can_wait());

        assert!(!initiative.wait());
        assert_eq!(initiative.current(), -8);
    }
    #[test]
    fn extreme_base_saturates_instead_of_overflowing() {
        let mut initiative = RolledInitiative::new(i32::MAX);
        initiative.roll(&mut FixedRoller(4), -4, 4);
        assert_eq!(initiative.current(), i32::MAX);

        let mut low = RolledInitiative::new(i32::MIN);
        low.roll(&mut FixedRoller(-4), -4, 4);
        assert_eq!(low.current(), i32::MIN);
        assert!(low.wait());
        assert_eq!(low.current(), i32::MAX);
    }
}
