//! # quadpwm-core
//!
//! Cycle-accurate model of a quad-channel PWM controller: four independently
//! programmable duty cycles driven from one shared 8-bit phase counter, a
//! power-of-two clock prescaler, and a configuration bus multiplexed over a
//! handful of pins.
//!
//! ## Architecture
//!
//! - [`QuadPwm`] — Top-level core that wires every component to the pins
//! - [`decoder`] — `config_in` bus decoding (channel, load strobe, prescaler)
//! - [`duty`] — Four strobed 8-bit duty registers with readback
//! - [`prescaler`] — Divide-by-2^n tick generator
//! - [`counter`] — The single phase counter shared by all channels
//! - [`comparator`] — Per-channel `counter < duty` projections
//! - [`output`] — `pwm_out` bus packing
//! - [`reset`] — Active-low synchronous reset
//! - [`trace`] — Waveform ring buffer and VCD export
//! - [`probe`] — Duty, transition, and tick measurements over waveforms
//! - [`script`] — JSON stimulus scripts and the built-in contract scenarios
//! - [`savestate`] — Compressed save state files
//!
//! ## Clocking
//!
//! [`QuadPwm::clock`] applies one rising edge. Within an edge, reset wins over
//! everything; otherwise a strobed load commits the addressed register and
//! the prescaler and phase counter advance from their pre-edge values.
//! [`QuadPwm::outputs`] is the combinational view of the pins for the
//! current state and inputs.

pub mod comparator;
pub mod config;
pub mod counter;
pub mod decoder;
pub mod duty;
pub mod output;
pub mod pins;
pub mod prescaler;
pub mod probe;
pub mod reset;
pub mod savestate;
pub mod script;
pub mod trace;

pub use config::Config;
pub use decoder::{Channel, Command, PrescalerSelect};
pub use output::PwmOut;
pub use pins::{BusDirection, InputPins, OutputPins};

use counter::PhaseCounter;
use duty::DutyRegisterFile;
use prescaler::Prescaler;
use reset::ResetController;
use std::fmt::Write;
use trace::{Sample, Trace};

/// Number of PWM channels.
pub const CHANNELS: usize = 4;

/// Quad PWM core combining all components.
pub struct QuadPwm {
    config: Config,
    duty: DutyRegisterFile,
    prescaler: Prescaler,
    counter: PhaseCounter,
    reset: ResetController,
    /// Clock edges applied since construction
    cycle: u64,
    /// Output waveform capture (disabled by default)
    pub trace: Trace,
}

impl QuadPwm {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Power-on state equals the post-reset state.
    pub fn with_config(config: Config) -> Self {
        QuadPwm {
            duty: DutyRegisterFile::new(config.default_duty),
            prescaler: Prescaler::new(config.prescaler_policy),
            counter: PhaseCounter::new(),
            reset: ResetController::new(),
            cycle: 0,
            trace: Trace::new(config.trace_capacity),
            config,
        }
    }

    /// Apply one active clock edge.
    pub fn clock(&mut self, pins: &InputPins) {
        self.cycle += 1;
        if self.reset.sample(pins.reset_n) {
            self.duty.reset(self.config.default_duty);
            self.prescaler.reset();
            self.counter.reset();
            return;
        }
        if !pins.enable {
            return;
        }

        let cmd = Command::decode(pins.config_in);
        let tick = self.prescaler.tick(cmd.prescaler);
        if cmd.load {
            self.duty.write(cmd.channel, pins.duty_in);
        }
        self.prescaler.clock(cmd.prescaler);
        if tick && self.counter.advance() {
            tracing::trace!(cycle = self.cycle, "pwm period start");
        }
    }

    /// Combinational outputs for the current state and `pins`.
    pub fn outputs(&self, pins: &InputPins) -> OutputPins {
        let cmd = Command::decode(pins.config_in);
        let pwm_out = if ResetController::is_asserted(pins.reset_n) {
            PwmOut::empty()
        } else {
            let levels = comparator::evaluate(self.counter.value(), self.duty.values());
            output::aggregate(levels, self.counter.msb(), self.prescaler.tick(cmd.prescaler))
        };
        OutputPins {
            pwm_out,
            duty_out: self.duty.read(cmd.channel),
            duty_oe: BusDirection::from_load(cmd.load).oe(),
        }
    }

    /// Clock once and sample the outputs, as a bench does after a rising edge.
    pub fn step(&mut self, pins: &InputPins) -> OutputPins {
        self.clock(pins);
        let out = self.outputs(pins);
        if self.trace.enabled {
            self.trace.push(Sample::new(self.cycle, &out));
        }
        out
    }

    /// Step `cycles` times with the same pins, returning the last outputs.
    pub fn run(&mut self, pins: &InputPins, cycles: u64) -> OutputPins {
        let mut out = self.outputs(pins);
        for _ in 0..cycles {
            out = self.step(pins);
        }
        out
    }

    /// Step `cycles` times and return every sample.
    pub fn capture(&mut self, pins: &InputPins, cycles: usize) -> Vec<Sample> {
        (0..cycles)
            .map(|_| {
                let out = self.step(pins);
                Sample::new(self.cycle, &out)
            })
            .collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration. The prescaler policy applies from the
    /// next edge, the default duty from the next reset. A capacity change
    /// clears the trace.
    pub fn set_config(&mut self, config: Config) {
        self.prescaler.set_policy(config.prescaler_policy);
        if config.trace_capacity != self.config.trace_capacity {
            let enabled = self.trace.enabled;
            self.trace = Trace::new(config.trace_capacity);
            self.trace.enabled = enabled;
        }
        self.config = config;
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn counter(&self) -> u8 {
        self.counter.value()
    }

    pub fn duty(&self, channel: Channel) -> u8 {
        self.duty.read(channel)
    }

    pub fn duties(&self) -> [u8; CHANNELS] {
        *self.duty.values()
    }

    pub fn in_reset(&self) -> bool {
        self.reset.asserted()
    }

    /// Format the live registers for display.
    pub fn dump_regs(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "cycle={} counter={:3} (0x{:02X}) prescaler_count={:3} policy={:?}",
            self.cycle, self.counter.value(), self.counter.value(), self.prescaler.count(),
            self.prescaler.policy());
        for ch in Channel::ALL {
            let duty = self.duty.read(ch);
            let _ = writeln!(s, "  {}: duty={:3} (0x{:02X}) {:5.1}%  level={}",
                ch, duty, duty, duty as f32 * 100.0 / 256.0,
                comparator::compare(self.counter.value(), duty) as u8);
        }
        let _ = write!(s, "  reset={} held={}", self.reset.asserted(), self.reset.held_cycles());
        s
    }

    /// Capture state for save state.
    pub fn save_state(&self) -> savestate::SaveState {
        savestate::SaveState {
            cycle: self.cycle,
            duty: self.duty.save_state(),
            counter: self.counter.value(),
            prescaler: self.prescaler.save_state(),
            reset: self.reset.save_state(),
            config: self.config,
        }
    }

    /// Restore state from save state. The trace buffer is cleared.
    pub fn load_state(&mut self, s: &savestate::SaveState) {
        self.config = s.config;
        self.prescaler.set_policy(s.config.prescaler_policy);
        self.cycle = s.cycle;
        self.duty.load_state(&s.duty);
        self.counter.set(s.counter);
        self.prescaler.load_state(&s.prescaler);
        self.reset.load_state(&s.reset);
        self.trace = Trace::new(self.config.trace_capacity);
    }
}

impl Default for QuadPwm {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescaler::PrescalerPolicy;

    fn load(pwm: &mut QuadPwm, channel: Channel, duty: u8) {
        let cmd = Command { channel, load: true, prescaler: PrescalerSelect::DIV1 };
        pwm.clock(&InputPins { config_in: cmd.encode(), duty_in: duty, ..Default::default() });
    }

    #[test]
    fn test_power_on_state() {
        let pwm = QuadPwm::new();
        assert_eq!(pwm.duties(), [0x80; 4]);
        assert_eq!(pwm.counter(), 0);
        let out = pwm.outputs(&InputPins::default());
        assert_eq!(out.pwm_out, PwmOut::CHANNELS | PwmOut::TICK | PwmOut::ANY_ACTIVE);
    }

    #[test]
    fn test_read_during_write_sees_old_value() {
        let mut pwm = QuadPwm::new();
        let pins = InputPins { config_in: 0b101, duty_in: 9, ..Default::default() };
        assert_eq!(pwm.outputs(&pins).duty_out, 0x80);
        pwm.clock(&pins);
        assert_eq!(pwm.outputs(&pins).duty_out, 9);
    }

    #[test]
    fn test_readback_follows_address() {
        let mut pwm = QuadPwm::new();
        load(&mut pwm, Channel::Ch1, 42);
        let addr = |ch: u8| InputPins { config_in: ch, ..Default::default() };
        assert_eq!(pwm.outputs(&addr(1)).duty_out, 42);
        assert_eq!(pwm.outputs(&addr(0)).duty_out, 0x80);
    }

    #[test]
    fn test_bus_direction() {
        let pwm = QuadPwm::new();
        let strobe = InputPins { config_in: 0b100, ..Default::default() };
        assert_eq!(pwm.outputs(&strobe).direction(), BusDirection::Input);
        assert_eq!(pwm.outputs(&InputPins::default()).duty_oe, 0xFF);
    }

    #[test]
    fn test_reset_priority_over_load() {
        let mut pwm = QuadPwm::new();
        pwm.run(&InputPins::default(), 10);
        let pins = InputPins { reset_n: false, config_in: 0b110, duty_in: 7, ..Default::default() };
        let out = pwm.step(&pins);
        assert_eq!(pwm.duties(), [0x80; 4]);
        assert_eq!(pwm.counter(), 0);
        assert_eq!(out.pwm_out, PwmOut::empty());
        assert!(pwm.in_reset());
    }

    #[test]
    fn test_enable_low_holds_state() {
        let mut pwm = QuadPwm::new();
        let idle = InputPins { enable: false, config_in: 0b100, duty_in: 3, ..Default::default() };
        pwm.run(&idle, 20);
        assert_eq!(pwm.counter(), 0);
        assert_eq!(pwm.duty(Channel::Ch0), 0x80);
        pwm.clock(&InputPins { reset_n: false, enable: false, ..Default::default() });
        assert!(pwm.in_reset());
    }

    #[test]
    fn test_counter_advances_per_tick() {
        let mut pwm = QuadPwm::new();
        let pins = InputPins { config_in: PrescalerSelect::DIV8.bits() << 3, ..Default::default() };
        pwm.run(&pins, 64);
        assert_eq!(pwm.counter(), 8);
    }

    #[test]
    fn test_channels_share_phase() {
        let mut pwm = QuadPwm::new();
        for (ch, duty) in Channel::ALL.into_iter().zip([10, 20, 30, 40]) {
            load(&mut pwm, ch, duty);
        }
        let samples = pwm.capture(&InputPins::default(), 512);
        // Falling edges sit exactly (duty difference) cycles apart.
        let falls: Vec<Vec<u64>> = (0..4)
            .map(|i| {
                samples.windows(2)
                    .filter(|w| w[0].pwm_out.channel(i) && !w[1].pwm_out.channel(i))
                    .map(|w| w[1].cycle)
                    .collect()
            })
            .collect();
        for i in 1..4 {
            assert_eq!(falls[i].len(), falls[0].len());
            for (a, b) in falls[0].iter().zip(&falls[i]) {
                assert_eq!(b - a, 10 * i as u64);
            }
        }
    }

    #[test]
    fn test_set_config_switches_prescaler_policy() {
        let mut pwm = QuadPwm::new();
        pwm.set_config(Config { prescaler_policy: PrescalerPolicy::ResyncOnChange, ..Config::default() });
        pwm.run(&InputPins::default(), 5);
        let div8 = InputPins { config_in: PrescalerSelect::DIV8.bits() << 3, ..Default::default() };
        pwm.clock(&div8);
        assert!(pwm.dump_regs().contains("prescaler_count=  0 policy=ResyncOnChange"));
        assert_eq!(pwm.config().prescaler_policy, PrescalerPolicy::ResyncOnChange);
    }

    #[test]
    fn test_large_trace_capacity_from_config() {
        let config = Config::from_json(r#"{ "trace_capacity": 18446744073709551615 }"#).unwrap();
        let mut pwm = QuadPwm::with_config(config);
        pwm.trace.enabled = true;
        pwm.run(&InputPins::default(), 3);
        assert_eq!(pwm.trace.len(), 3);
        let state = pwm.save_state();
        pwm.load_state(&state);
        assert!(pwm.trace.is_empty());
    }

    #[test]
    fn test_load_state_takes_policy_from_config() {
        let resync = Config { prescaler_policy: PrescalerPolicy::ResyncOnChange, ..Config::default() };
        let state = QuadPwm::with_config(resync).save_state();
        let mut pwm = QuadPwm::new();
        pwm.load_state(&state);
        pwm.run(&InputPins::default(), 5);
        pwm.clock(&InputPins { config_in: PrescalerSelect::DIV8.bits() << 3, ..Default::default() });
        assert!(pwm.dump_regs().contains("prescaler_count=  0"));
    }

    #[test]
    fn test_save_and_resume() {
        let config = Config { prescaler_policy: PrescalerPolicy::ResyncOnChange, ..Config::default() };
        let mut a = QuadPwm::with_config(config);
        load(&mut a, Channel::Ch3, 200);
        let pins = InputPins { config_in: 2 << 3, ..Default::default() };
        a.run(&pins, 333);

        let mut b = QuadPwm::new();
        b.load_state(&a.save_state());
        assert_eq!(b.config(), &config);
        for _ in 0..600 {
            assert_eq!(a.step(&pins), b.step(&pins));
        }
        assert_eq!(a.dump_regs(), b.dump_regs());
    }
}
