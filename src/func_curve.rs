//! Function-driven runtime carrier/beat override, bypassing
//! segment-to-segment interpolation for selected channels
//! (spec.md §4.6), used by the `drop` and `sigmoid` pre-programmed
//! generators.

use crate::voice::{Voice, VoiceKind};

/// Carrier/beat evolution law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FuncMode {
    /// `beat = beat0 * (beat1/beat0)^(t/beat_span)`.
    Exponential,
    /// `beat = a*tanh(l*(t - d/2 - h)) + b`, precomputed `a`, `b`.
    Sigmoid { a: f64, b: f64, l: f64, h: f64 },
}

/// Whether a function curve drives a single channel directly, or a
/// monaural pair of channels derived from one logical binaural voice.
/// Per Design Notes §9, the pairing is decided once at schedule-compile
/// time, never by mutating a channel's kind at mixer runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncTarget {
    Channel(usize),
    MonauralPair(usize, usize),
}

/// One active function curve, overriding carrier/beat on its target
/// channel(s) for as long as `now` falls in `[start, start + carr_span]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuncCurve {
    pub target: FuncTarget,
    pub kind_filter: VoiceKind,
    pub mode: FuncMode,
    pub start_ms: i64,
    pub carrier0_hz: f64,
    pub carrier1_hz: f64,
    pub carrier_span_s: f64,
    pub beat0_hz: f64,
    pub beat1_hz: f64,
    pub beat_span_s: f64,
}

impl FuncCurve {
    fn carrier_at(&self, t_s: f64) -> f64 {
        if self.carrier_span_s <= 0.0 {
            return self.carrier1_hz;
        }
        let t = t_s.min(self.carrier_span_s);
        self.carrier0_hz + (self.carrier1_hz - self.carrier0_hz) * t / self.carrier_span_s
    }

    fn beat_at(&self, t_s: f64) -> f64 {
        match self.mode {
            FuncMode::Exponential => {
                if self.beat_span_s <= 0.0 || self.beat0_hz == 0.0 {
                    return self.beat1_hz;
                }
                let ratio = self.beat1_hz / self.beat0_hz;
                self.beat0_hz * ratio.powf(t_s / self.beat_span_s)
            }
            FuncMode::Sigmoid { a, b, l, h } => {
                let t_min = t_s / 60.0;
                a * (l * (t_min - self.beat_span_s / 60.0 / 2.0 - h)).tanh() + b
            }
        }
    }

    /// Returns true if `now_ms` (since midnight) lies within this
    /// curve's active window.
    pub fn active_at(&self, now_ms: i64, h24: i64) -> bool {
        let elapsed = ((now_ms - self.start_ms) % h24 + h24) % h24;
        let span_ms = (self.carrier_span_s.max(self.beat_span_s) * 1000.0) as i64;
        elapsed <= span_ms
    }

    /// Applies the curve to `voice` for channel `channel_index` at
    /// elapsed time `t_s` seconds since the curve's start, provided the
    /// channel is one of the curve's targets and the voice's kind
    /// matches the filter.
    pub fn apply(&self, channel_index: usize, voice: &mut Voice, t_s: f64) {
        if !voice.kind.matches_kind(&self.kind_filter) {
            return;
        }
        let beat = self.beat_at(t_s);
        let carrier = self.carrier_at(t_s);
        match self.target {
            FuncTarget::Channel(c) if c == channel_index => {
                voice.carrier_hz = carrier;
                voice.beat_hz = beat;
            }
            FuncTarget::MonauralPair(left, right) => {
                if channel_index == left {
                    voice.carrier_hz = carrier + beat / 2.0;
                    voice.beat_hz = 0.0;
                } else if channel_index == right {
                    voice.carrier_hz = carrier - beat / 2.0;
                    voice.beat_hz = 0.0;
                }
            }
            _ => {}
        }
    }
}

/// Precomputes the sigmoid `a`, `b` coefficients so `beat(0) = beat_at_start`
/// and `beat(duration) = beat_at_end`, matching the `sigmoid`
/// pre-programmed generator (spec.md §4.5).
pub fn sigmoid_coefficients(
    beat_at_start: f64,
    beat_at_end: f64,
    duration_minutes: f64,
    l: f64,
    h: f64,
) -> (f64, f64) {
    let t0 = -duration_minutes / 2.0 - h;
    let t1 = duration_minutes / 2.0 - h;
    let th0 = (l * t0).tanh();
    let th1 = (l * t1).tanh();
    // beat_at_start = a*th0 + b; beat_at_end = a*th1 + b.
    let a = (beat_at_start - beat_at_end) / (th0 - th1);
    let b = beat_at_start - a * th0;
    (a, b)
}
