//! Duty register file.
//!
//! Four 8-bit threshold registers, one per channel. A register changes only
//! on a clock edge with the load strobe asserted, and only the register
//! addressed on that same edge is written. Reads are combinational, so a
//! read in the cycle of a write still observes the old value.

use crate::decoder::Channel;
use tracing::trace;

/// Mid-scale power-on duty: about 50% on every channel with no programming.
pub const DEFAULT_DUTY: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyRegisterFile {
    regs: [u8; 4],
}

impl DutyRegisterFile {
    pub fn new(default: u8) -> Self {
        DutyRegisterFile { regs: [default; 4] }
    }

    pub fn reset(&mut self, default: u8) {
        self.regs = [default; 4];
    }

    /// Commit `value` into the addressed register (strobed edge only).
    pub fn write(&mut self, channel: Channel, value: u8) {
        let old = self.regs[channel.index()];
        if old != value {
            trace!(%channel, old, value, "duty register load");
        }
        self.regs[channel.index()] = value;
    }

    pub fn read(&self, channel: Channel) -> u8 {
        self.regs[channel.index()]
    }

    pub fn values(&self) -> &[u8; 4] {
        &self.regs
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> [u8; 4] {
        self.regs
    }

    /// Restore state from save state.
    pub fn load_state(&mut self, regs: &[u8; 4]) {
        self.regs = *regs;
    }
}

impl Default for DutyRegisterFile {
    fn default() -> Self { Self::new(DEFAULT_DUTY) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_mid_scale() {
        let file = DutyRegisterFile::default();
        assert_eq!(file.values(), &[0x80; 4]);
    }

    #[test]
    fn test_write_targets_one_register() {
        let mut file = DutyRegisterFile::default();
        file.write(Channel::Ch2, 200);
        assert_eq!(file.values(), &[0x80, 0x80, 200, 0x80]);
        assert_eq!(file.read(Channel::Ch2), 200);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut file = DutyRegisterFile::new(10);
        file.write(Channel::Ch0, 0);
        file.write(Channel::Ch3, 255);
        file.reset(10);
        assert_eq!(file.values(), &[10; 4]);
    }
}
