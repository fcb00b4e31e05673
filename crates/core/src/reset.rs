//! Synchronous reset controller.
//!
//! `reset_n` low is reset asserted. It is sampled on the clock edge and wins
//! over every other update in that edge. Outputs are masked combinationally
//! for as long as the pin is held low.

use tracing::debug;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResetController {
    asserted: bool,
    /// Edges sampled with reset asserted in the current (or last) hold.
    held: u32,
}

impl ResetController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the pin level asserts reset.
    pub const fn is_asserted(reset_n: bool) -> bool {
        !reset_n
    }

    /// Sample the pin on a clock edge. Returns true if reset applies to
    /// this edge.
    pub fn sample(&mut self, reset_n: bool) -> bool {
        let asserted = Self::is_asserted(reset_n);
        match (self.asserted, asserted) {
            (false, true) => {
                debug!("reset asserted");
                self.held = 1;
            }
            (true, true) => self.held = self.held.saturating_add(1),
            (true, false) => debug!(cycles = self.held, "reset released"),
            (false, false) => {}
        }
        self.asserted = asserted;
        asserted
    }

    /// Reset level seen on the last sampled edge.
    pub fn asserted(&self) -> bool {
        self.asserted
    }

    pub fn held_cycles(&self) -> u32 {
        self.held
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> crate::savestate::ResetState {
        crate::savestate::ResetState { asserted: self.asserted, held: self.held }
    }

    /// Restore state from save state.
    pub fn load_state(&mut self, s: &crate::savestate::ResetState) {
        self.asserted = s.asserted;
        self.held = s.held;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_hold_cycles() {
        let mut rc = ResetController::new();
        assert!(!rc.sample(true));
        for _ in 0..10 { assert!(rc.sample(false)); }
        assert_eq!(rc.held_cycles(), 10);
        assert!(!rc.sample(true));
        assert!(!rc.asserted());
        assert_eq!(rc.held_cycles(), 10);
    }
}
