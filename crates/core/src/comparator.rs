//! Channel comparators.
//!
//! Stateless projections of the shared phase counter: a channel is high
//! while the counter is strictly below its duty threshold. Duty 0 never
//! drives high, duty 255 is high for 255 of every 256 ticks.

/// Output level of one channel for the given phase.
#[inline]
pub const fn compare(counter: u8, duty: u8) -> bool {
    counter < duty
}

/// Output levels of all four channels against the same counter value.
pub fn evaluate(counter: u8, duties: &[u8; 4]) -> [bool; 4] {
    duties.map(|duty| compare(counter, duty))
}
