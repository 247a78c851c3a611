//! Wall-clock <-> 24-hour-millisecond conversions, the fast-forward
//! multiplier, and end-of-sequence detection (spec.md §4, "Clock").
//!
//! All arithmetic here mirrors `t_per24`/`t_per0`/`t_mid` and the
//! `now`-advance logic of the original engine's `loop()`: milliseconds
//! since midnight, wrapping at [`H24`].

use crate::scheduler::H24;

/// Length of the period starting at `t0` and ending at `t1`, treating
/// `t0 == t1` as a full 24 hours (NOT zero) — used when a span must
/// never collapse to nothing, e.g. "how long until this same time
/// tomorrow".
pub fn t_per24(t0: i64, t1: i64) -> i64 {
    let td = t1 - t0;
    if td > 0 {
        td
    } else {
        td + H24
    }
}

/// Length of the period starting at `t0` and ending at `t1`, treating
/// `t0 == t1` as zero elapsed time — used for "how far are we into the
/// current period".
pub fn t_per0(t0: i64, t1: i64) -> i64 {
    let td = t1 - t0;
    if td >= 0 {
        td
    } else {
        td + H24
    }
}

/// Midpoint of the period running from `t0` to `t1`, wrapping through
/// midnight if `t1 < t0`.
pub fn t_mid(t0: i64, t1: i64) -> i64 {
    if t1 < t0 {
        (H24 + t0 + t1) / 2 % H24
    } else {
        (t0 + t1) / 2
    }
}

/// The engine's notion of "now": milliseconds since midnight, plus the
/// fast-forward multiplier driving how quickly synthetic time advances
/// relative to a single output buffer's worth of real time.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    now_ms: i64,
    /// `0` syncs to the wall clock (gently correcting drift each
    /// cycle); a positive value free-runs at that multiple of real
    /// time with no wall-clock correction.
    fast_mult: u32,
    /// The sequence's own first/last referenced times, used by
    /// `-S`/`-E` (start-at-sequence-start / end-at-last-time).
    seq_first_ms: i64,
    seq_last_ms: i64,
}

impl Clock {
    pub fn new(start_ms: i64, fast_mult: u32, seq_first_ms: i64, seq_last_ms: i64) -> Self {
        Clock {
            now_ms: start_ms.rem_euclid(H24),
            fast_mult,
            seq_first_ms,
            seq_last_ms,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn is_fast(&self) -> bool {
        self.fast_mult != 0
    }

    /// Advances `now` by one output buffer's worth of milliseconds
    /// (`buf_ms`, a fractional value carried across calls by the
    /// caller via `buf_lo`/`err_lo` exactly as `loop()` does, but
    /// expressed here as a plain `f64` for simplicity: the original's
    /// 16-bit fixed-point carry exists only to avoid floating point in
    /// C, and is not part of the observable contract).
    pub fn advance(&mut self, buf_ms: f64) {
        let scaled = if self.fast_mult > 0 {
            buf_ms * self.fast_mult as f64
        } else {
            buf_ms
        };
        self.now_ms = (self.now_ms + scaled.round() as i64).rem_euclid(H24);
    }

    /// Total duration of the sequence from its first to its last
    /// referenced time, used to compute `-E`'s byte-count target.
    pub fn sequence_duration_ms(&self) -> i64 {
        t_per0(self.seq_first_ms, self.seq_last_ms)
    }

    /// The time a `-S` run should start from: the sequence's own first
    /// time-line.
    pub fn sequence_start_ms(&self) -> i64 {
        self.seq_first_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_per24_treats_equal_times_as_full_day() {
        assert_eq!(t_per24(1000, 1000), H24);
    }

    #[test]
    fn t_per0_treats_equal_times_as_zero() {
        assert_eq!(t_per0(1000, 1000), 0);
    }

    #[test]
    fn t_per0_wraps_through_midnight() {
        assert_eq!(t_per0(H24 - 1000, 500), 1500);
    }

    #[test]
    fn t_mid_wraps_through_midnight() {
        let mid = t_mid(H24 - 1000, 1000);
        assert_eq!(mid, 0);
    }

    #[test]
    fn clock_advance_wraps_past_midnight() {
        let mut c = Clock::new(H24 - 500, 0, 0, 0);
        c.advance(1000.0);
        assert_eq!(c.now_ms(), 500);
    }

    #[test]
    fn fast_mult_scales_advance() {
        let mut c = Clock::new(0, 10, 0, 0);
        c.advance(100.0);
        assert_eq!(c.now_ms(), 1000);
    }
}
