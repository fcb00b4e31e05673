//! Waveform capture and Value Change Dump export.
//!
//! [`Trace`] keeps the most recent output samples in a ring buffer, one per
//! clock cycle. [`write_vcd`] turns a sample slice into a VCD file that any
//! waveform viewer (GTKWave, Surfer) can open. Only value changes are
//! emitted after the initial dump at time zero.

use crate::{output::PwmOut, pins::OutputPins};
use std::io::{self, Write};

/// Output pins observed after one clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub cycle: u64,
    pub pwm_out: PwmOut,
    pub duty_out: u8,
}

impl Sample {
    pub fn new(cycle: u64, pins: &OutputPins) -> Self {
        Sample { cycle, pwm_out: pins.pwm_out, duty_out: pins.duty_out }
    }
}

/// Ring buffer of output samples. Storage grows on demand up to `capacity`.
#[derive(Debug, Clone)]
pub struct Trace {
    buf: Vec<Sample>,
    /// Write position (next slot to overwrite once full)
    write_pos: usize,
    capacity: usize,
    pub enabled: bool,
}

impl Trace {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Trace { buf: Vec::new(), write_pos: 0, capacity, enabled: false }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.buf.len() < self.capacity {
            self.buf.push(sample);
        } else {
            self.buf[self.write_pos] = sample;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    pub fn len(&self) -> usize { self.buf.len() }

    pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    /// Samples in capture order, oldest first.
    pub fn samples(&self) -> Vec<Sample> {
        if self.buf.len() < self.capacity {
            return self.buf.clone();
        }
        let (newer, older) = self.buf.split_at(self.write_pos);
        older.iter().chain(newer).copied().collect()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.write_pos = 0;
    }
}

// ─── VCD export ─────────────────────────────────────────────────────────────

/// Single-bit wires: (identifier code, name, pwm_out flag).
const WIRES: [(char, &str, PwmOut); 7] = [
    ('!', "pwm0", PwmOut::CH0),
    ('"', "pwm1", PwmOut::CH1),
    ('#', "pwm2", PwmOut::CH2),
    ('$', "pwm3", PwmOut::CH3),
    ('%', "counter_msb", PwmOut::COUNTER_MSB),
    ('&', "tick", PwmOut::TICK),
    ('\'', "any_active", PwmOut::ANY_ACTIVE),
];
const DUTY_ID: char = '(';

/// Write `samples` as a VCD document. Timestamps are `cycle * clock_period_ns`,
/// saturating at `u64::MAX`.
pub fn write_vcd(out: &mut impl Write, samples: &[Sample], clock_period_ns: u64) -> io::Result<()> {
    writeln!(out, "$comment quadpwm-core waveform $end")?;
    writeln!(out, "$timescale 1 ns $end")?;
    writeln!(out, "$scope module quad_pwm $end")?;
    for (id, name, _) in WIRES {
        writeln!(out, "$var wire 1 {id} {name} $end")?;
    }
    writeln!(out, "$var wire 8 {DUTY_ID} duty_out [7:0] $end")?;
    writeln!(out, "$upscope $end")?;
    writeln!(out, "$enddefinitions $end")?;

    let mut prev: Option<&Sample> = None;
    for sample in samples {
        let time = sample.cycle.saturating_mul(clock_period_ns);
        match prev {
            None => {
                writeln!(out, "#{time}")?;
                writeln!(out, "$dumpvars")?;
                for (id, _, flag) in WIRES {
                    writeln!(out, "{}{id}", sample.pwm_out.contains(flag) as u8)?;
                }
                writeln!(out, "b{:08b} {DUTY_ID}", sample.duty_out)?;
                writeln!(out, "$end")?;
            }
            Some(p) if p.pwm_out != sample.pwm_out || p.duty_out != sample.duty_out => {
                writeln!(out, "#{time}")?;
                for (id, _, flag) in WIRES {
                    let level = sample.pwm_out.contains(flag);
                    if p.pwm_out.contains(flag) != level {
                        writeln!(out, "{}{id}", level as u8)?;
                    }
                }
                if p.duty_out != sample.duty_out {
                    writeln!(out, "b{:08b} {DUTY_ID}", sample.duty_out)?;
                }
            }
            Some(_) => {}
        }
        prev = Some(sample);
    }
    if let Some(last) = samples.last() {
        writeln!(out, "#{}", last.cycle.saturating_add(1).saturating_mul(clock_period_ns))?;
    }
    Ok(())
}
