//! Clock prescaler.
//!
//! A 7-bit free-running sub-counter gates the phase counter. With selection
//! `n` the tick enable is high whenever the low `n` bits of the sub-counter
//! are all set, which happens once every `2^n` clock cycles. Selection 0
//! has an empty mask, so the tick is high on every cycle (divide by 1).
//!
//! The selection is read straight from the configuration bus each cycle and
//! is never latched. What happens to the sub-counter when the selection
//! changes is governed by [`PrescalerPolicy`].

use crate::decoder::PrescalerSelect;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SUB_COUNTER_MASK: u8 = 0x7F;

/// Sub-counter behavior across a prescaler selection change.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrescalerPolicy {
    /// Keep counting through the change; the new divide ratio applies to
    /// the existing sub-counter phase.
    #[default]
    FreeRunning,
    /// Clear the sub-counter on the edge where a new selection is seen.
    ResyncOnChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescaler {
    count: u8,
    last_select: PrescalerSelect,
    policy: PrescalerPolicy,
}

impl Prescaler {
    pub fn new(policy: PrescalerPolicy) -> Self {
        Prescaler { count: 0, last_select: PrescalerSelect::DIV1, policy }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_select = PrescalerSelect::DIV1;
    }

    pub fn policy(&self) -> PrescalerPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: PrescalerPolicy) {
        self.policy = policy;
    }

    /// Current sub-counter value.
    pub fn count(&self) -> u8 {
        self.count
    }

    /// Tick enable for the current (pre-edge) state.
    pub fn tick(&self, select: PrescalerSelect) -> bool {
        let mask = select.mask();
        self.count & mask == mask
    }

    /// Advance the sub-counter by one clock edge.
    pub fn clock(&mut self, select: PrescalerSelect) {
        if select != self.last_select {
            debug!(from = %self.last_select, to = %select, policy = ?self.policy, "prescaler select changed");
            self.last_select = select;
            if self.policy == PrescalerPolicy::ResyncOnChange {
                self.count = 0;
                return;
            }
        }
        self.count = self.count.wrapping_add(1) & SUB_COUNTER_MASK;
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> crate::savestate::PrescalerState {
        crate::savestate::PrescalerState {
            count: self.count,
            last_select: self.last_select.bits(),
        }
    }

    /// Restore state from save state. The policy is not part of the
    /// state; it comes from the model's `Config`.
    pub fn load_state(&mut self, s: &crate::savestate::PrescalerState) {
        self.count = s.count & SUB_COUNTER_MASK;
        self.last_select = PrescalerSelect::new(s.last_select);
    }
}

impl Default for Prescaler {
    fn default() -> Self { Self::new(PrescalerPolicy::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(p: &mut Prescaler, select: PrescalerSelect, cycles: usize) -> Vec<bool> {
        (0..cycles)
            .map(|_| {
                let t = p.tick(select);
                p.clock(select);
                t
            })
            .collect()
    }

    #[test]
    fn test_divide_by_one_ticks_every_cycle() {
        let mut p = Prescaler::default();
        assert!(ticks(&mut p, PrescalerSelect::DIV1, 20).iter().all(|&t| t));
    }

    #[test]
    fn test_divide_by_eight() {
        let mut p = Prescaler::default();
        let seen = ticks(&mut p, PrescalerSelect::DIV8, 24);
        let mut expected = [false; 24];
        expected[7] = true;
        expected[15] = true;
        expected[23] = true;
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_tick_rates_for_every_select() {
        for n in 0..8 {
            let select = PrescalerSelect::new(n);
            let mut p = Prescaler::default();
            p.clock(select);
            let count = ticks(&mut p, select, 1024).into_iter().filter(|&t| t).count();
            assert_eq!(count as u32, 1024 / select.divisor(), "select {}", n);
        }
    }

    #[test]
    fn test_sub_counter_wraps_at_128() {
        let mut p = Prescaler::default();
        for _ in 0..128 { p.clock(PrescalerSelect::DIV1); }
        assert_eq!(p.count(), 0);
    }

    #[test]
    fn test_free_running_keeps_phase_on_change() {
        let mut p = Prescaler::new(PrescalerPolicy::FreeRunning);
        for _ in 0..5 { p.clock(PrescalerSelect::DIV1); }
        p.clock(PrescalerSelect::DIV8);
        assert_eq!(p.count(), 6);
    }

    #[test]
    fn test_resync_clears_on_change() {
        let mut p = Prescaler::new(PrescalerPolicy::ResyncOnChange);
        for _ in 0..5 { p.clock(PrescalerSelect::DIV1); }
        p.clock(PrescalerSelect::DIV8);
        assert_eq!(p.count(), 0);
        p.clock(PrescalerSelect::DIV8);
        assert_eq!(p.count(), 1);
    }
}
