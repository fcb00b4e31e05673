//! Shared phase counter.
//!
//! A single 8-bit counter advanced once per prescaler tick. Exactly one
//! instance exists per core and every channel comparator reads it, so all
//! channels see the same phase on every cycle. One PWM period is 256 ticks.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCounter {
    value: u8,
}

impl PhaseCounter {
    pub const fn new() -> Self {
        PhaseCounter { value: 0 }
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }

    pub const fn value(&self) -> u8 {
        self.value
    }

    /// Most significant bit, a coarse first-half/second-half phase flag.
    pub const fn msb(&self) -> bool {
        self.value & 0x80 != 0
    }

    /// Advance one tick, wrapping 255 -> 0. Returns true on wrap.
    pub fn advance(&mut self) -> bool {
        self.value = self.value.wrapping_add(1);
        self.value == 0
    }

    pub(crate) fn set(&mut self, value: u8) {
        self.value = value;
    }
}
