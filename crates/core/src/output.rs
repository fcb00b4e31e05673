//! Output aggregator for the `pwm_out` bus.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// `pwm_out` bit layout. Bit 6 is reserved and always low.
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[must_use]
    pub struct PwmOut: u8 {
        const CH0 = 1 << 0;
        const CH1 = 1 << 1;
        const CH2 = 1 << 2;
        const CH3 = 1 << 3;
        const COUNTER_MSB = 1 << 4;
        const TICK = 1 << 5;
        const ANY_ACTIVE = 1 << 7;
        const CHANNELS = Self::CH0.bits() | Self::CH1.bits() | Self::CH2.bits() | Self::CH3.bits();
    }
}

impl PwmOut {
    /// Level of channel `index` (0..=3).
    pub const fn channel(self, index: usize) -> bool {
        self.bits() & (1 << index) != 0
    }
}

/// Pack comparator outputs and status signals into the output bus.
pub fn aggregate(channels: [bool; 4], counter_msb: bool, tick: bool) -> PwmOut {
    let mut out = PwmOut::empty();
    for (i, &high) in channels.iter().enumerate() {
        if high {
            out |= PwmOut::from_bits_retain(1 << i);
        }
    }
    out.set(PwmOut::COUNTER_MSB, counter_msb);
    out.set(PwmOut::TICK, tick);
    out.set(PwmOut::ANY_ACTIVE, out.intersects(PwmOut::CHANNELS));
    out
}
