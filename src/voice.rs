//! The per-channel `Voice` value type and the `VoiceKind` tagged union
//! of everything a channel can render.
//!
//! A [`Voice`] is a plain, cheaply cloned value: the parser and
//! scheduler pass it around and interpolate it; none of it is mixer
//! runtime state (phase accumulators, bell decay, spin position — that
//! lives in `ChannelState` inside [`crate::mixer`]).

use crate::wavetable::BuiltinWaveform;

/// A wavetable selector: one of the four built-in waveforms, or a
/// user-defined `waveNN` table (`0..=99`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformId {
    Builtin(BuiltinWaveform),
    User(u8),
}

impl WaveformId {
    pub fn sine() -> Self {
        WaveformId::Builtin(BuiltinWaveform::Sine)
    }
}

/// The edge shape of a custom isochronic gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsochronicEdge {
    Hard,
    Linear,
    Smoothstep,
    Smootherstep,
}

/// Custom isochronic gate parameters (absent = legacy threshold-gated
/// smoothstep behavior).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsochronicGate {
    /// Gate phase offset in `0..1`.
    pub start: f64,
    /// Fraction of the cycle the gate is open, in `(0, 1]`.
    pub duty: f64,
    /// Attack fraction of the duty-open span.
    pub attack: f64,
    /// Release fraction of the duty-open span.
    pub release: f64,
    pub edge: IsochronicEdge,
}

/// Everything a channel can be. Variants without per-kind configuration
/// carry none; amplitude, carrier, and waveform live on [`Voice`] itself
/// since they're common to (almost) every kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceKind {
    Off,
    /// Binaural beat: two ears at `carr ± beat/2`.
    Binaural,
    Pink,
    Bell,
    /// Pan oscillator over internally generated pink noise.
    Spin,
    /// Pass-through of the external mix-input stream.
    Mix,
    /// Pan oscillator over the mix-input stream.
    MixSpin,
    /// Amplitude-pulsed mix-input stream.
    MixPulse,
    Isochronic(Option<IsochronicGate>),
    White,
    Brown,
    /// Pan oscillator over brown noise.
    BrownSpin,
    /// Pan oscillator over white noise.
    WhiteSpin,
}

impl VoiceKind {
    /// Kind-identity used for scheduler fade/slide compatibility checks:
    /// two isochronic voices with different gate settings are still the
    /// "same kind" for slide purposes.
    pub fn matches_kind(&self, other: &VoiceKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_noise_spin(&self) -> bool {
        matches!(self, VoiceKind::Spin | VoiceKind::BrownSpin | VoiceKind::WhiteSpin)
    }

    pub fn is_mix(&self) -> bool {
        matches!(
            self,
            VoiceKind::Mix | VoiceKind::MixSpin | VoiceKind::MixPulse
        )
    }
}

/// A single channel's configuration at one point in the schedule.
///
/// `amplitude` is in `0..=4096` (`4096` == 100%). `carrier_hz` and
/// `beat_hz` follow spec.md's per-kind reuse of the same two fields:
/// spin width (µs) / rate for spin kinds, isochronic carrier / gate
/// rate, bell pitch (`beat_hz` unused), etc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub kind: VoiceKind,
    pub amplitude: f64,
    pub carrier_hz: f64,
    pub beat_hz: f64,
    pub waveform: WaveformId,
}

impl Voice {
    pub fn off() -> Self {
        Voice {
            kind: VoiceKind::Off,
            amplitude: 0.0,
            carrier_hz: 0.0,
            beat_hz: 0.0,
            waveform: WaveformId::sine(),
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self.kind, VoiceKind::Off)
    }

    /// Linearly interpolates amplitude/carrier/beat between two voices
    /// that share kind and waveform; callers decide when that's legal
    /// (see [`crate::scheduler`]'s slide-compatibility rules). Bell and
    /// off voices are not meant to be interpolated; callers should
    /// special-case them first, per spec.md §4.4 step 3.
    pub fn lerp(&self, other: &Voice, r: f64) -> Voice {
        Voice {
            kind: self.kind,
            amplitude: self.amplitude + (other.amplitude - self.amplitude) * r,
            carrier_hz: self.carrier_hz + (other.carrier_hz - self.carrier_hz) * r,
            beat_hz: self.beat_hz + (other.beat_hz - self.beat_hz) * r,
            waveform: self.waveform,
        }
    }
}

/// Sixteen-channel voice array, the payload of both sides of a
/// [`crate::scheduler::Period`].
pub type VoiceSet = [Voice; 16];

pub fn silent_voice_set() -> VoiceSet {
    [Voice::off(); 16]
}

/// A named, reusable definition: either a flat 16-voice array, or a
/// block of relative-time lines expanded when referenced.
#[derive(Debug, Clone)]
pub enum NameDef {
    Voices(VoiceSet),
    Block(Vec<BlockLine>),
}

/// One line of a block name-def: a relative offset from the block's
/// reference time, the voices referenced by that line's name, and the
/// fade codes attached to it (defaulting to `Through`/`Through` when
/// the line carries no explicit fade-code pair, matching the original
/// engine's `fi=fo=1` default).
#[derive(Debug, Clone)]
pub struct BlockLine {
    pub offset_ms: i64,
    pub voices: VoiceSet,
    pub fade_in: crate::scheduler::FadeCode,
    pub fade_out: crate::scheduler::FadeCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_voice_has_zero_amplitude() {
        let v = Voice::off();
        assert!(v.is_off());
        assert_eq!(v.amplitude, 0.0);
    }

    #[test]
    fn lerp_interpolates_all_numeric_fields() {
        let a = Voice {
            kind: VoiceKind::Binaural,
            amplitude: 0.0,
            carrier_hz: 100.0,
            beat_hz: 4.0,
            waveform: WaveformId::sine(),
        };
        let b = Voice {
            carrier_hz: 200.0,
            beat_hz: 8.0,
            amplitude: 4096.0,
            ..a
        };
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.carrier_hz, 150.0);
        assert_eq!(mid.beat_hz, 6.0);
        assert_eq!(mid.amplitude, 2048.0);
    }

    #[test]
    fn matches_kind_ignores_isochronic_gate_payload() {
        let a = VoiceKind::Isochronic(None);
        let b = VoiceKind::Isochronic(Some(IsochronicGate {
            start: 0.0,
            duty: 0.5,
            attack: 0.1,
            release: 0.1,
            edge: IsochronicEdge::Linear,
        }));
        assert!(a.matches_kind(&b));
    }
}
