//! JSON stimulus scripts.
//!
//! A script drives the input pins the way a bench does (hold the config bus
//! on a channel, raise the load strobe for a couple of cycles, drop it) and
//! checks the outputs along the way. Scripts are plain JSON:
//!
//! ```json
//! {
//!   "name": "program_channel_1",
//!   "steps": [
//!     { "reset": { "cycles": 5 } },
//!     { "load": { "channel": 1, "duty": 64 } },
//!     { "run": { "cycles": 2 } },
//!     { "expect_readback": { "duty": 64 } },
//!     { "expect_duty": { "channel": 1, "percent": 25.1, "tolerance": 2.0, "cycles": 256 } }
//!   ]
//! }
//! ```
//!
//! [`builtin`] returns the scenarios that make up the core's external
//! contract: reset clearing, default activity, readback, duty accuracy,
//! edge duties, channel synchronization, and prescaler rates.

use crate::{
    decoder::{Channel, Command, PrescalerSelect},
    output::PwmOut,
    pins::{InputPins, OutputPins},
    probe,
    trace::Sample,
    QuadPwm,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("failed to read script {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid script {name}: {source}")]
    Parse {
        name: String,
        source: serde_json::Error,
    },
    #[error("{script}: step {step}: {message}")]
    Expectation {
        script: String,
        step: usize,
        message: String,
    },
}

/// Edges the load strobe is held by default.
pub const STROBE_CYCLES: u64 = 2;

const fn default_strobe_cycles() -> u64 {
    STROBE_CYCLES
}

/// One script instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Drive `reset_n` low (no clock).
    AssertReset,
    /// Drive `reset_n` high (no clock).
    ReleaseReset,
    /// Hold reset for `cycles` edges, then release.
    Reset { cycles: u64 },
    /// Address a channel without loading.
    Select { channel: u8 },
    /// Change the prescaler select bits.
    Prescaler { select: u8 },
    /// Present `duty`, strobe load for `cycles` edges, then drop the strobe.
    Load {
        channel: u8,
        duty: u8,
        #[serde(default = "default_strobe_cycles")]
        cycles: u64,
    },
    Run { cycles: u64 },
    /// Readback of the addressed channel equals `duty`.
    ExpectReadback { duty: u8 },
    /// Every bit in `bits` is high on `pwm_out`.
    ExpectHigh { bits: u8 },
    /// Every bit in `bits` is low on `pwm_out`.
    ExpectLow { bits: u8 },
    /// Sample `cycles` edges; the channel's high percentage is within
    /// `tolerance` of `percent`.
    ExpectDuty { channel: u8, percent: f32, tolerance: f32, cycles: usize },
    /// Sample `cycles` edges; bundle changes on `mask` do not exceed `max`.
    ExpectMaxTransitions { mask: u8, cycles: usize, max: usize },
    /// Sample `cycles` edges; exactly `count` prescaler ticks are seen.
    ExpectTicks { cycles: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
}

/// Summary of a passing script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    pub steps: usize,
    pub checks: usize,
    pub cycles: u64,
}

impl Script {
    pub fn from_json(name: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Parse { name: name.to_string(), source })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&path.display().to_string(), &text)
    }

    /// Run every step against `pwm`, stopping at the first failed check.
    pub fn run(&self, pwm: &mut QuadPwm) -> Result<Report> {
        info!(script = %self.name, steps = self.steps.len(), "running script");
        let start = pwm.cycle();
        let mut bench = Bench::new();
        let mut checks = 0;
        for (i, step) in self.steps.iter().enumerate() {
            debug!(step = i, ?step);
            match bench.apply(pwm, step) {
                Ok(true) => checks += 1,
                Ok(false) => {}
                Err(message) => {
                    return Err(Error::Expectation { script: self.name.clone(), step: i, message });
                }
            }
        }
        let cycles = pwm.cycle() - start;
        info!(script = %self.name, checks, cycles, "script passed");
        Ok(Report { name: self.name.clone(), steps: self.steps.len(), checks, cycles })
    }
}

// ─── Bench ──────────────────────────────────────────────────────────────────

/// Driving side of the pins. Keeps the config bus in decoded form so the
/// addressed channel and prescaler select persist across loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bench {
    pub pins: InputPins,
    pub channel: Channel,
    pub prescaler: PrescalerSelect,
}

impl Bench {
    pub fn new() -> Self {
        Bench { pins: InputPins::default(), channel: Channel::Ch0, prescaler: PrescalerSelect::DIV1 }
    }

    fn drive(&mut self, load: bool) {
        let cmd = Command { channel: self.channel, load, prescaler: self.prescaler };
        self.pins.config_in = cmd.encode();
    }

    /// Address `channel` without loading.
    pub fn select(&mut self, channel: Channel) {
        self.channel = channel;
        self.drive(false);
    }

    pub fn set_prescaler(&mut self, select: PrescalerSelect) {
        self.prescaler = select;
        self.drive(false);
    }

    /// Present `duty`, hold the load strobe for `cycles` edges, then drop it.
    pub fn program(&mut self, pwm: &mut QuadPwm, channel: Channel, duty: u8, cycles: u64) {
        self.channel = channel;
        self.pins.duty_in = duty;
        self.drive(true);
        pwm.run(&self.pins, cycles);
        self.drive(false);
        debug!(%channel, duty, "programmed duty");
    }

    /// Hold reset for `cycles` edges, then release.
    pub fn reset(&mut self, pwm: &mut QuadPwm, cycles: u64) {
        self.pins.reset_n = false;
        pwm.run(&self.pins, cycles);
        self.pins.reset_n = true;
    }

    pub fn run(&mut self, pwm: &mut QuadPwm, cycles: u64) -> OutputPins {
        pwm.run(&self.pins, cycles)
    }

    pub fn outputs(&self, pwm: &QuadPwm) -> OutputPins {
        pwm.outputs(&self.pins)
    }

    pub fn capture(&mut self, pwm: &mut QuadPwm, cycles: usize) -> Vec<Sample> {
        pwm.capture(&self.pins, cycles)
    }

    /// Apply one script step. `Ok(true)` means a check ran and passed.
    fn apply(&mut self, pwm: &mut QuadPwm, step: &Step) -> std::result::Result<bool, String> {
        match *step {
            Step::AssertReset => self.pins.reset_n = false,
            Step::ReleaseReset => self.pins.reset_n = true,
            Step::Reset { cycles } => self.reset(pwm, cycles),
            Step::Select { channel } => self.select(Channel::from_bits(channel)),
            Step::Prescaler { select } => self.set_prescaler(PrescalerSelect::new(select)),
            Step::Load { channel, duty, cycles } => self.program(pwm, Channel::from_bits(channel), duty, cycles),
            Step::Run { cycles } => {
                self.run(pwm, cycles);
            }
            Step::ExpectReadback { duty } => {
                let got = self.outputs(pwm).duty_out;
                if got != duty {
                    return Err(format!("{}: expected readback {duty}, got {got}", self.channel));
                }
                return Ok(true);
            }
            Step::ExpectHigh { bits } => {
                let out = self.outputs(pwm).pwm_out;
                if out.bits() & bits != bits {
                    return Err(format!("expected bits {bits:08b} high, pwm_out={:08b}", out.bits()));
                }
                return Ok(true);
            }
            Step::ExpectLow { bits } => {
                let out = self.outputs(pwm).pwm_out;
                if out.bits() & bits != 0 {
                    return Err(format!("expected bits {bits:08b} low, pwm_out={:08b}", out.bits()));
                }
                return Ok(true);
            }
            Step::ExpectDuty { channel, percent, tolerance, cycles } => {
                let channel = Channel::from_bits(channel);
                let samples = self.capture(pwm, cycles);
                let measured = probe::duty_percent(&samples, channel);
                if (measured - percent).abs() > tolerance {
                    return Err(format!(
                        "{channel}: expected {percent:.1}% ±{tolerance:.1}, measured {measured:.1}% over {cycles} cycles"
                    ));
                }
                return Ok(true);
            }
            Step::ExpectMaxTransitions { mask, cycles, max } => {
                let samples = self.capture(pwm, cycles);
                let seen = probe::transitions(&samples, PwmOut::from_bits_retain(mask));
                if seen > max {
                    return Err(format!("{seen} transitions in {cycles} cycles (max {max})"));
                }
                return Ok(true);
            }
            Step::ExpectTicks { cycles, count } => {
                let samples = self.capture(pwm, cycles);
                let seen = probe::tick_count(&samples);
                if seen != count {
                    return Err(format!(
                        "prescaler {}: expected {count} ticks in {cycles} cycles, saw {seen}",
                        self.prescaler
                    ));
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for Bench {
    fn default() -> Self { Self::new() }
}

const BUILTIN: [(&str, &str); 7] = [
    ("default_activity", include_str!("../scripts/default_activity.json")),
    ("channel_programming", include_str!("../scripts/channel_programming.json")),
    ("duty_accuracy", include_str!("../scripts/duty_accuracy.json")),
    ("synchronization", include_str!("../scripts/synchronization.json")),
    ("prescaler", include_str!("../scripts/prescaler.json")),
    ("edge_cases", include_str!("../scripts/edge_cases.json")),
    ("reset_behavior", include_str!("../scripts/reset_behavior.json")),
];

/// The built-in contract scenarios. Each expects a freshly constructed core.
pub fn builtin() -> Result<Vec<Script>> {
    BUILTIN.iter().map(|(name, text)| Script::from_json(name, text)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let script = Script::from_json(
            "inline",
            r#"{ "name": "x", "steps": [
                "assert_reset",
                { "load": { "channel": 2, "duty": 10 } },
                { "expect_ticks": { "cycles": 8, "count": 8 } }
            ] }"#,
        )
        .unwrap();
        assert_eq!(script.steps[0], Step::AssertReset);
        assert_eq!(script.steps[1], Step::Load { channel: 2, duty: 10, cycles: 2 });
        assert!(script.description.is_empty());
    }

    #[test]
    fn test_failed_expectation_reports_step() {
        let script = Script {
            name: "bad".into(),
            description: String::new(),
            steps: vec![Step::Run { cycles: 1 }, Step::ExpectReadback { duty: 1 }],
        };
        let err = script.run(&mut QuadPwm::new()).unwrap_err();
        match err {
            Error::Expectation { step, message, .. } => {
                assert_eq!(step, 1);
                assert!(message.contains("expected readback 1, got 128"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bench_keeps_channel_and_prescaler_across_loads() {
        let mut pwm = QuadPwm::new();
        let mut bench = Bench::new();
        bench.set_prescaler(PrescalerSelect::DIV8);
        bench.program(&mut pwm, Channel::Ch2, 77, STROBE_CYCLES);
        assert_eq!(Command::decode(bench.pins.config_in), Command {
            channel: Channel::Ch2,
            load: false,
            prescaler: PrescalerSelect::DIV8,
        });
        assert_eq!(pwm.duty(Channel::Ch2), 77);
        assert_eq!(bench.outputs(&pwm).duty_out, 77);

        bench.reset(&mut pwm, 1);
        assert!(bench.pins.reset_n);
        assert_eq!(pwm.duty(Channel::Ch2), 0x80);
    }

    #[test]
    fn test_builtin_scripts_pass() {
        let scripts = builtin().unwrap();
        assert_eq!(scripts.len(), 7);
        for script in scripts {
            let report = script.run(&mut QuadPwm::new()).unwrap();
            assert!(report.checks > 0, "{} ran no checks", report.name);
        }
    }

    #[test]
    fn test_builtin_scripts_pass_with_resync_policy() {
        let config = crate::Config {
            prescaler_policy: crate::prescaler::PrescalerPolicy::ResyncOnChange,
            ..Default::default()
        };
        for script in builtin().unwrap() {
            script.run(&mut QuadPwm::with_config(config)).unwrap();
        }
    }
}
