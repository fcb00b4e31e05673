use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use quadpwm_core::{prescaler::PrescalerPolicy, Channel, Config};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Policy {
    FreeRunning,
    ResyncOnChange,
}

impl From<Policy> for PrescalerPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::FreeRunning => PrescalerPolicy::FreeRunning,
            Policy::ResyncOnChange => PrescalerPolicy::ResyncOnChange,
        }
    }
}

/// Quad PWM core simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[must_use]
pub struct Opts {
    /// JSON model config. Flags below override file values.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Reset duty for every channel. [default: 128]
    #[arg(long, global = true)]
    pub default_duty: Option<u8>,
    /// Prescaler sub-counter behavior on a select change. [default: free-running]
    #[arg(long, global = true, value_enum)]
    pub policy: Option<Policy>,
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Run headless for a number of cycles and report measurements.
    Run(RunOpts),
    /// Run JSON stimulus scripts.
    Script {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Run the built-in contract scenarios.
    Contract,
    /// Interactive cycle stepper.
    Step,
    /// Logic-analyzer window.
    #[cfg(feature = "gui")]
    Gui {
        /// Clock cycles simulated per displayed frame.
        #[arg(long, default_value_t = 4)]
        speed: u32,
    },
}

#[derive(Args, Debug)]
pub struct RunOpts {
    /// Clock cycles to simulate after programming.
    #[arg(short = 'n', long, default_value_t = 1024)]
    pub cycles: u64,
    /// Program a channel, e.g. `--duty 1=64`. Repeatable.
    #[arg(short, long, value_parser = parse_duty)]
    pub duty: Vec<(Channel, u8)>,
    /// Prescaler select 0-7 (divide by 2^n).
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..8))]
    pub prescaler: u8,
    /// Cycles of reset before programming.
    #[arg(long, default_value_t = 10)]
    pub reset_cycles: u64,
    /// Resume from a save state instead of resetting.
    #[arg(long)]
    pub load: Option<PathBuf>,
    /// Write a save state when done.
    #[arg(long)]
    pub save: Option<PathBuf>,
    /// Write the captured waveform as VCD.
    #[arg(long)]
    pub vcd: Option<PathBuf>,
    /// Print an ASCII waveform this many columns wide.
    #[arg(long)]
    pub wave: Option<usize>,
    /// Print the register dump when done.
    #[arg(long)]
    pub dump: bool,
}

fn parse_duty(s: &str) -> Result<(Channel, u8), String> {
    let (ch, duty) = s.split_once('=').ok_or_else(|| format!("expected CH=DUTY, got {s:?}"))?;
    let ch: u8 = ch.trim().parse().map_err(|e| format!("channel {ch:?}: {e}"))?;
    if ch > 3 {
        return Err(format!("channel {ch} out of range 0-3"));
    }
    let duty: u8 = duty.trim().parse().map_err(|e| format!("duty {duty:?}: {e}"))?;
    Ok((Channel::from_bits(ch), duty))
}

impl Opts {
    /// Loads a base `Config`, merging with CLI options
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(duty) = self.default_duty {
            config.default_duty = duty;
        }
        if let Some(policy) = self.policy {
            config.prescaler_policy = policy.into();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duty() {
        assert_eq!(parse_duty("2=200"), Ok((Channel::Ch2, 200)));
        assert!(parse_duty("4=1").is_err());
        assert!(parse_duty("1:64").is_err());
        assert!(parse_duty("1=256").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let opts = Opts::parse_from(["quadpwm-sim", "--default-duty", "10", "--policy", "resync-on-change", "contract"]);
        let config = opts.load_config().unwrap();
        assert_eq!(config.default_duty, 10);
        assert_eq!(config.prescaler_policy, PrescalerPolicy::ResyncOnChange);
    }

    #[test]
    fn test_run_args() {
        let opts = Opts::parse_from(["quadpwm-sim", "run", "-d", "0=64", "-d", "3=255", "-p", "3"]);
        match opts.mode {
            Mode::Run(run) => {
                assert_eq!(run.duty, [(Channel::Ch0, 64), (Channel::Ch3, 255)]);
                assert_eq!(run.prescaler, 3);
                assert_eq!(run.cycles, 1024);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }
}
