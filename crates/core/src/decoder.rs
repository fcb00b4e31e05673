//! Configuration bus decoder.
//!
//! The 8-bit `config_in` bus carries three logical fields every cycle:
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +---+---+---+---+---+---+---+---+
//! | - | - |  PRESCALER| LD| CHAN  |
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! Decoding is purely combinational. Every byte is a valid command; bits 6
//! and 7 are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

const CHANNEL_MASK: u8 = 0x03;
const LOAD_BIT: u8 = 1 << 2;
const PRESCALER_SHIFT: u8 = 3;
const PRESCALER_MASK: u8 = 0x07;

/// PWM channel address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Channel {
    Ch0,
    Ch1,
    Ch2,
    Ch3,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch0, Channel::Ch1, Channel::Ch2, Channel::Ch3];

    /// Decode a channel from the low two bits of `bits`.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & CHANNEL_MASK {
            0 => Channel::Ch0,
            1 => Channel::Ch1,
            2 => Channel::Ch2,
            _ => Channel::Ch3,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl From<u8> for Channel {
    fn from(bits: u8) -> Self {
        Self::from_bits(bits)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel as u8
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.index())
    }
}

/// 3-bit prescaler selection. Selection `n` divides the clock by `2^n`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct PrescalerSelect(u8);

impl PrescalerSelect {
    pub const DIV1: Self = Self(0);
    pub const DIV8: Self = Self(3);
    pub const DIV128: Self = Self(7);

    /// Build a selection from the low three bits of `bits`.
    pub const fn new(bits: u8) -> Self {
        Self(bits & PRESCALER_MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Clock cycles per prescaler tick (1, 2, 4 ... 128).
    pub const fn divisor(self) -> u32 {
        1 << self.0
    }

    /// Sub-counter mask: a tick fires when all masked bits are set.
    pub const fn mask(self) -> u8 {
        (1u8 << self.0) - 1
    }
}

impl From<u8> for PrescalerSelect {
    fn from(bits: u8) -> Self {
        Self::new(bits)
    }
}

impl From<PrescalerSelect> for u8 {
    fn from(select: PrescalerSelect) -> Self {
        select.bits()
    }
}

impl fmt::Display for PrescalerSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.divisor())
    }
}

/// One decoded `config_in` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub channel: Channel,
    pub load: bool,
    pub prescaler: PrescalerSelect,
}

impl Command {
    pub const fn decode(config_in: u8) -> Self {
        Command {
            channel: Channel::from_bits(config_in),
            load: config_in & LOAD_BIT != 0,
            prescaler: PrescalerSelect::new(config_in >> PRESCALER_SHIFT),
        }
    }

    /// Canonical bus encoding (unused bits zero).
    pub const fn encode(self) -> u8 {
        (self.channel as u8)
            | if self.load { LOAD_BIT } else { 0 }
            | (self.prescaler.bits() << PRESCALER_SHIFT)
    }
}
