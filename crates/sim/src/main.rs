//! quadpwm-sim: command-line front end for the quad PWM core.
//!
//! Modes:
//! - `run`      headless simulation with measurements, waveforms, and save states
//! - `script`   JSON stimulus scripts
//! - `contract` the built-in contract scenarios
//! - `step`     interactive cycle stepper
//! - `gui`      logic-analyzer window (feature `gui`)

#[cfg(feature = "gui")]
mod gui;
mod logging;
mod opts;

use anyhow::{bail, Context};
use clap::Parser;
use opts::{Mode, Opts, RunOpts};
use quadpwm_core::{
    probe, savestate,
    script::{self, Bench, Script, STROBE_CYCLES},
    trace, Channel, Config, PrescalerSelect, QuadPwm,
};
use std::{
    fs::File,
    io::{BufRead, BufWriter, Write},
    path::PathBuf,
};
use tracing::{debug, info, warn};

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init(opts.verbose);
    let config = opts.load_config()?;
    debug!(?config, "loaded config");

    match opts.mode {
        Mode::Run(run) => run_headless(&run, config),
        Mode::Script { paths } => run_script_files(&paths, config),
        Mode::Contract => run_contract(config),
        Mode::Step => run_step_mode(config),
        #[cfg(feature = "gui")]
        Mode::Gui { speed } => gui::run(config, speed),
    }
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(run: &RunOpts, config: Config) -> anyhow::Result<()> {
    let mut pwm = QuadPwm::with_config(config);
    let mut bench = Bench::new();

    match &run.load {
        Some(path) => {
            let state = savestate::load_from_file(path)?;
            pwm.load_state(&state);
            info!(path = %path.display(), cycle = pwm.cycle(), "resumed from save state");
        }
        None => bench.reset(&mut pwm, run.reset_cycles),
    }
    for &(channel, duty) in &run.duty {
        bench.program(&mut pwm, channel, duty, STROBE_CYCLES);
        info!(%channel, duty, "programmed duty");
    }
    bench.set_prescaler(PrescalerSelect::new(run.prescaler));

    let cycles = usize::try_from(run.cycles).context("cycle count too large")?;
    let samples = pwm.capture(&bench.pins, cycles);

    println!("{} cycles, prescaler {}", samples.len(), bench.prescaler);
    for ch in Channel::ALL {
        let duty = pwm.duty(ch);
        println!(
            "  {ch}: duty={duty:3}  measured={:5.1}%  expected={:5.1}%",
            probe::duty_percent(&samples, ch),
            probe::expected_percent(duty),
        );
    }
    println!("  ticks={}", probe::tick_count(&samples));

    if let Some(width) = run.wave {
        println!("{}", probe::ascii_waveform(&samples, width));
    }
    if run.dump {
        println!("{}", pwm.dump_regs());
    }
    if let Some(path) = &run.vcd {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        trace::write_vcd(&mut out, &samples, pwm.config().clock_period_ns)
            .and_then(|()| out.flush())
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), samples = samples.len(), "wrote vcd");
    }
    if let Some(path) = &run.save {
        savestate::save_to_file(&pwm.save_state(), path)?;
        info!(path = %path.display(), cycle = pwm.cycle(), "saved state");
    }
    Ok(())
}

// ─── Scripts ────────────────────────────────────────────────────────────────

/// Run each script on a fresh core. Fails if any script fails.
fn run_scripts(scripts: &[Script], config: Config) -> anyhow::Result<()> {
    let mut failed = 0;
    for script in scripts {
        match script.run(&mut QuadPwm::with_config(config)) {
            Ok(report) => println!(
                "PASS {:<24} {:3} checks {:6} cycles",
                report.name, report.checks, report.cycles
            ),
            Err(err) => {
                failed += 1;
                println!("FAIL {err}");
            }
        }
    }
    println!("{} passed, {} failed", scripts.len() - failed, failed);
    if failed > 0 {
        bail!("{failed} of {} scripts failed", scripts.len());
    }
    Ok(())
}

fn run_script_files(paths: &[PathBuf], config: Config) -> anyhow::Result<()> {
    let scripts = paths.iter().map(Script::load).collect::<script::Result<Vec<_>>>()?;
    run_scripts(&scripts, config)
}

fn run_contract(config: Config) -> anyhow::Result<()> {
    run_scripts(&script::builtin()?, config)
}

// ─── Step Mode ──────────────────────────────────────────────────────────────

fn run_step_mode(config: Config) -> anyhow::Result<()> {
    let mut pwm = QuadPwm::with_config(config);
    let mut bench = Bench::new();

    println!("Step mode: Enter=step, N<enter>=step N, w CH DUTY=program, p SEL=prescaler,");
    println!("           c CH=select, r=reset pulse, d=dump, q=quit");
    println!("{}", pwm.dump_regs());

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        print!("step> ");
        std::io::stdout().flush()?;
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or("");
        let args = match words.map(str::parse::<u8>).collect::<Result<Vec<_>, _>>() {
            Ok(args) => args,
            Err(err) => {
                warn!("bad argument: {err}");
                continue;
            }
        };
        match (cmd, args.as_slice()) {
            ("q" | "quit", _) => break,
            ("d" | "dump", _) => {
                println!("{}", pwm.dump_regs());
                continue;
            }
            ("r" | "reset", _) => bench.reset(&mut pwm, 1),
            ("w" | "write", &[ch, duty]) if ch < 4 => {
                bench.program(&mut pwm, Channel::from_bits(ch), duty, STROBE_CYCLES)
            }
            ("c" | "channel", &[ch]) if ch < 4 => bench.select(Channel::from_bits(ch)),
            ("p" | "prescaler", &[sel]) if sel < 8 => bench.set_prescaler(PrescalerSelect::new(sel)),
            ("", _) => {
                pwm.step(&bench.pins);
            }
            (n, _) => match n.parse::<u64>() {
                Ok(n) => {
                    pwm.run(&bench.pins, n);
                }
                Err(_) => {
                    warn!("unknown command: {}", line.trim());
                    continue;
                }
            },
        }
        let out = pwm.outputs(&bench.pins);
        println!(
            "  pwm_out={:08b} duty_out={:3} ({:?})",
            out.pwm_out.bits(),
            out.duty_out,
            out.direction()
        );
        println!("{}", pwm.dump_regs());
    }
    println!("Total: {} cycles", pwm.cycle());
    Ok(())
}
