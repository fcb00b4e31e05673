//! Scrolling logic-analyzer window over the core's output trace.
//!
//! Keys: 0-3 select channel, Up/Down adjust its duty, P cycles the
//! prescaler, R pulses reset, D dumps registers, Esc quits.

use anyhow::Context;
use minifb::{Key, KeyRepeat, Scale, ScaleMode, Window, WindowOptions};
use quadpwm_core::{
    script::{Bench, STROBE_CYCLES},
    trace::Sample,
    Channel, Config, PrescalerSelect, PwmOut, QuadPwm,
};
use tracing::info;

/// Horizontal pixels per sample.
const SAMPLE_PX: usize = 2;
const VISIBLE: usize = 320;
const WIDTH: usize = VISIBLE * SAMPLE_PX;
const ROW_H: usize = 24;
const MARGIN: usize = 5;

const BG: u32 = 0x10_14_18;
const GRID: u32 = 0x22_28_30;
const SELECTED: u32 = 0x20_30_20;

/// Signal rows, top to bottom.
const ROWS: [(PwmOut, u32); 7] = [
    (PwmOut::CH0, 0x4C_E0_6A),
    (PwmOut::CH1, 0x4C_B8_E0),
    (PwmOut::CH2, 0xE0_C8_4C),
    (PwmOut::CH3, 0xE0_6A_4C),
    (PwmOut::COUNTER_MSB, 0xA0_A0_A0),
    (PwmOut::TICK, 0x80_80_FF),
    (PwmOut::ANY_ACTIVE, 0xFF_FF_FF),
];
const HEIGHT: usize = ROWS.len() * ROW_H;

pub fn run(config: Config, speed: u32) -> anyhow::Result<()> {
    let mut pwm = QuadPwm::with_config(config);
    pwm.trace.enabled = true;
    let mut bench = Bench::new();

    let mut window = Window::new(
        "quadpwm",
        WIDTH,
        HEIGHT,
        WindowOptions {
            scale: Scale::X2,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    )
    .context("failed to create window")?;
    window.set_target_fps(60);
    let mut buf = vec![BG; WIDTH * HEIGHT];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        handle_keys(&window, &mut pwm, &mut bench);
        pwm.run(&bench.pins, u64::from(speed));

        let samples = pwm.trace.samples();
        let start = samples.len().saturating_sub(VISIBLE);
        draw(&mut buf, &samples[start..], bench.channel.index());
        window.set_title(&format!(
            "quadpwm  {}  duty={}  prescaler={}  cycle={}",
            bench.channel,
            pwm.duty(bench.channel),
            bench.prescaler,
            pwm.cycle()
        ));
        window.update_with_buffer(&buf, WIDTH, HEIGHT)?;
    }
    Ok(())
}

fn handle_keys(window: &Window, pwm: &mut QuadPwm, bench: &mut Bench) {
    let pressed = |key| window.is_key_pressed(key, KeyRepeat::No);
    for (key, channel) in [Key::Key0, Key::Key1, Key::Key2, Key::Key3].into_iter().zip(Channel::ALL) {
        if pressed(key) {
            bench.select(channel);
        }
    }

    let duty = pwm.duty(bench.channel);
    if window.is_key_pressed(Key::Up, KeyRepeat::Yes) {
        bench.program(pwm, bench.channel, duty.saturating_add(8), STROBE_CYCLES);
    }
    if window.is_key_pressed(Key::Down, KeyRepeat::Yes) {
        bench.program(pwm, bench.channel, duty.saturating_sub(8), STROBE_CYCLES);
    }
    if pressed(Key::P) {
        bench.set_prescaler(PrescalerSelect::new(bench.prescaler.bits() + 1));
    }
    if pressed(Key::R) {
        bench.reset(pwm, 1);
    }
    if pressed(Key::D) {
        info!("\n{}", pwm.dump_regs());
    }
}

fn draw(buf: &mut [u32], samples: &[Sample], selected: usize) {
    for row in 0..ROWS.len() {
        let fill = if row == selected { SELECTED } else { BG };
        let top = row * ROW_H;
        buf[top * WIDTH..(top + ROW_H) * WIDTH].fill(fill);
        buf[(top + ROW_H - 1) * WIDTH..(top + ROW_H) * WIDTH].fill(GRID);
    }

    let mut prev: Option<PwmOut> = None;
    for (i, sample) in samples.iter().enumerate() {
        let x0 = i * SAMPLE_PX;
        for (row, &(bit, color)) in ROWS.iter().enumerate() {
            let y_high = row * ROW_H + MARGIN;
            let y_low = (row + 1) * ROW_H - MARGIN;
            let level = sample.pwm_out.contains(bit);
            let y = if level { y_high } else { y_low };
            for x in x0..x0 + SAMPLE_PX {
                buf[y * WIDTH + x] = color;
            }
            if prev.is_some_and(|p| p.contains(bit) != level) {
                for y in y_high..=y_low {
                    buf[y * WIDTH + x0] = color;
                }
            }
        }
        prev = Some(sample.pwm_out);
    }
}
