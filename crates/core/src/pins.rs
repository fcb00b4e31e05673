//! Boundary signals of the core.
//!
//! The duty bus is bidirectional on the physical pins. It is modeled as two
//! logical channels: `InputPins::duty_in` (write intent) and
//! `OutputPins::duty_out` (read result), with `duty_oe` reporting which way
//! the bus is being driven.

use crate::output::PwmOut;
use serde::{Deserialize, Serialize};

/// Inputs sampled on each clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPins {
    /// Active-low synchronous reset.
    pub reset_n: bool,
    /// Global enable. Low gates every state update except reset.
    pub enable: bool,
    /// Configuration bus, see [`crate::decoder`].
    pub config_in: u8,
    /// Candidate duty value, committed on a strobed edge.
    pub duty_in: u8,
}

impl Default for InputPins {
    fn default() -> Self {
        InputPins { reset_n: true, enable: true, config_in: 0, duty_in: 0 }
    }
}

/// Direction of the shared duty bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusDirection {
    /// Load strobe asserted: the bus carries `duty_in`.
    Input,
    /// Otherwise the core drives the addressed register onto the bus.
    Output,
}

impl BusDirection {
    pub const fn from_load(load: bool) -> Self {
        if load { BusDirection::Input } else { BusDirection::Output }
    }

    /// Output-enable mask for the eight bus pins.
    pub const fn oe(self) -> u8 {
        match self {
            BusDirection::Input => 0x00,
            BusDirection::Output => 0xFF,
        }
    }
}

/// Combinational outputs for the current state and inputs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPins {
    pub pwm_out: PwmOut,
    /// Readback of the currently addressed duty register.
    pub duty_out: u8,
    pub duty_oe: u8,
}

impl OutputPins {
    pub fn direction(&self) -> BusDirection {
        if self.duty_oe == 0 { BusDirection::Input } else { BusDirection::Output }
    }
}
