//! Measurements over captured output waveforms.
//!
//! These are the observations an external test bench makes on the pins:
//! how long a channel is high, how often the channel bundle changes state,
//! and how many prescaler ticks go by in a window.

use crate::{decoder::Channel, output::PwmOut, trace::Sample};

/// Number of samples with `channel` high.
pub fn high_count(samples: &[Sample], channel: Channel) -> usize {
    samples.iter().filter(|s| s.pwm_out.channel(channel.index())).count()
}

/// Percentage of samples with `channel` high. Empty input measures 0%.
pub fn duty_percent(samples: &[Sample], channel: Channel) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    high_count(samples, channel) as f32 * 100.0 / samples.len() as f32
}

/// Nominal duty percentage, `duty / 255`.
pub fn expected_percent(duty: u8) -> f32 {
    duty as f32 * 100.0 / 255.0
}

/// Sample-to-sample changes of the bits selected by `mask`. Simultaneous
/// changes of several bits count once.
pub fn transitions(samples: &[Sample], mask: PwmOut) -> usize {
    samples
        .windows(2)
        .filter(|w| (w[0].pwm_out & mask) != (w[1].pwm_out & mask))
        .count()
}

/// Samples with the prescaler tick bit high.
pub fn tick_count(samples: &[Sample]) -> usize {
    samples.iter().filter(|s| s.pwm_out.contains(PwmOut::TICK)).count()
}

const ROWS: [(&str, PwmOut); 7] = [
    ("pwm0", PwmOut::CH0),
    ("pwm1", PwmOut::CH1),
    ("pwm2", PwmOut::CH2),
    ("pwm3", PwmOut::CH3),
    ("msb ", PwmOut::COUNTER_MSB),
    ("tick", PwmOut::TICK),
    ("any ", PwmOut::ANY_ACTIVE),
];

/// Render one text row per output bit, `width` columns wide. Each column
/// covers an equal slice of the samples and is drawn high if the bit is
/// high in any sample of that slice.
pub fn ascii_waveform(samples: &[Sample], width: usize) -> String {
    let width = width.max(1).min(samples.len().max(1));
    let per_col = samples.len().div_ceil(width).max(1);
    let mut s = String::new();
    for (name, flag) in ROWS {
        s.push_str(name);
        s.push_str(" |");
        for chunk in samples.chunks(per_col) {
            let any = chunk.iter().any(|x| x.pwm_out.contains(flag));
            let all = chunk.iter().all(|x| x.pwm_out.contains(flag));
            s.push(match (any, all) {
                (true, true) => '▀',
                (true, false) => '▚',
                _ => '_',
            });
        }
        s.push_str("|\n");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(bits: &[u8]) -> Vec<Sample> {
        bits.iter()
            .enumerate()
            .map(|(i, &b)| Sample { cycle: i as u64, pwm_out: PwmOut::from_bits_retain(b), duty_out: 0 })
            .collect()
    }

    #[test]
    fn test_duty_percent() {
        let samples = wave(&[0x01, 0x01, 0x00, 0x00]);
        assert_eq!(high_count(&samples, Channel::Ch0), 2);
        assert_eq!(duty_percent(&samples, Channel::Ch0), 50.0);
        assert_eq!(duty_percent(&[], Channel::Ch0), 0.0);
    }

    #[test]
    fn test_bundled_transitions_count_once() {
        let samples = wave(&[0x0F, 0x0F, 0x00, 0x00, 0x0F]);
        assert_eq!(transitions(&samples, PwmOut::CHANNELS), 2);
        let skewed = wave(&[0x0F, 0x07, 0x03, 0x01, 0x00]);
        assert_eq!(transitions(&skewed, PwmOut::CHANNELS), 4);
    }

    #[test]
    fn test_transition_mask() {
        let samples = wave(&[0x20, 0x00, 0x20, 0x00]);
        assert_eq!(transitions(&samples, PwmOut::CHANNELS), 0);
        assert_eq!(tick_count(&samples), 2);
    }

    #[test]
    fn test_expected_percent() {
        assert!((expected_percent(64) - 25.098).abs() < 0.01);
        assert_eq!(expected_percent(255), 100.0);
    }

    #[test]
    fn test_ascii_rows() {
        let text = ascii_waveform(&wave(&[0x01, 0x00]), 2);
        assert_eq!(text.lines().count(), 7);
        assert!(text.starts_with("pwm0 |▀_|"));
    }
}
