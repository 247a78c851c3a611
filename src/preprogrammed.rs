//! Pre-programmed sequence generators (`drop`, `sigmoid`, `slide`):
//! synthesize a complete schedule from a handful of high-level
//! parameters instead of a hand-written sequence file (spec.md §4.5).

use crate::error::{Result, SbagenError};
use crate::func_curve::{sigmoid_coefficients, FuncCurve, FuncMode, FuncTarget};
use crate::scheduler::{FadeCode, UserPeriod};
use crate::voice::{silent_voice_set, Voice, VoiceKind, VoiceSet, WaveformId};

/// The fixed 12-entry target-beat table indexed by letters `a..=l`.
pub const TARGET_BEAT_TABLE: [f64; 12] = [
    4.4, 3.7, 3.1, 2.5, 2.0, 1.5, 1.2, 0.9, 0.7, 0.5, 0.4, 0.3,
];

/// Step-mode flag parsed from the drop-spec's optional `s`/`k` letter:
/// absent selects a 180 s plateau cadence; `k` tightens that to 60 s
/// while keeping discrete steps; `s` also uses 60 s steps but layers a
/// continuous function curve over them (see `create_drop`'s `slide`
/// branch in the original engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Slide,
    StepFine,
    StepDefault,
}

impl StepMode {
    fn step_seconds(self) -> f64 {
        match self {
            StepMode::Slide | StepMode::StepFine => 60.0,
            StepMode::StepDefault => 180.0,
        }
    }
    fn is_slide(self) -> bool {
        matches!(self, StepMode::Slide)
    }
}

/// Shared knobs for the `drop`/`sigmoid` generators, parsed by the
/// embedder from `[t<d>,<h>,<w>] LLd[s|k][+][^][@|M][/amp]`.
#[derive(Debug, Clone, Copy)]
pub struct DropShape {
    /// `LL` tens-place: ending drop-phase carrier = `200 - 2*level`.
    pub level: u32,
    /// Target-beat table index, `0..12` (letters `a..=l`).
    pub target_index: usize,
    pub step_mode: StepMode,
    /// `+`: long form, holding at the target beat after the drop while
    /// the carrier keeps falling at the same linear rate.
    pub long_form: bool,
    /// `^`: append a wake ramp back to the starting beat/carrier.
    pub wake_ramp: bool,
    /// `@`: isochronic instead of binaural; mutually exclusive with `monaural`.
    pub isochronic: bool,
    /// `M`: monaural instead of binaural.
    pub monaural: bool,
    pub amplitude: f64,
    /// Drop duration, minutes (`t<d>`, default 30).
    pub drop_minutes: f64,
    /// Hold duration, minutes (`t,<h>`, default 30), used only when `long_form`.
    pub hold_minutes: f64,
    /// Wake duration, minutes (`t,,<w>`, default 3), used only when `wake_ramp`.
    pub wake_minutes: f64,
    /// Additional always-on voices layered into every emitted period
    /// (e.g. `pink/20`), occupying channels `1..`.
    pub extra_voices: Vec<Voice>,
}

impl DropShape {
    fn target_beat(&self) -> Result<f64> {
        TARGET_BEAT_TABLE
            .get(self.target_index)
            .copied()
            .ok_or_else(|| SbagenError::config("drop target letter out of range a..l"))
    }

    /// Ending drop-phase carrier (before the optional `-5Hz` offset that
    /// produces the starting carrier).
    fn end_carrier(&self) -> f64 {
        200.0 - 2.0 * self.level as f64
    }

    /// A monaural drop/slide carries both ears' tones as two plain
    /// single-channel voices rather than a combined kind, matching
    /// `create_drop`'s `formatNameDef("ts%02d: %g/%g %g/%g ...")`
    /// emission (`sbagenx.c` ~6780-6790): there is no dedicated
    /// "monaural" case in the mixer's per-channel dispatch.
    fn kind(&self) -> VoiceKind {
        if self.isochronic {
            VoiceKind::Isochronic(None)
        } else {
            VoiceKind::Binaural
        }
    }

    /// Number of leading channels this shape's primary voice(s) occupy:
    /// two for monaural (one plain tone per ear), one otherwise.
    fn primary_channels(&self) -> usize {
        if self.monaural && !self.isochronic {
            2
        } else {
            1
        }
    }

    fn voice_set(&self, carrier_hz: f64, beat_hz: f64) -> VoiceSet {
        let mut vs = silent_voice_set();
        if self.monaural && !self.isochronic {
            let half = beat_hz.abs() / 2.0;
            vs[0] = Voice {
                kind: VoiceKind::Binaural,
                amplitude: self.amplitude,
                carrier_hz: carrier_hz - half,
                beat_hz: 0.0,
                waveform: WaveformId::sine(),
            };
            vs[1] = Voice {
                kind: VoiceKind::Binaural,
                amplitude: self.amplitude,
                carrier_hz: carrier_hz + half,
                beat_hz: 0.0,
                waveform: WaveformId::sine(),
            };
        } else {
            vs[0] = Voice {
                kind: self.kind(),
                amplitude: self.amplitude,
                carrier_hz,
                beat_hz,
                waveform: WaveformId::sine(),
            };
        }
        let base = self.primary_channels();
        for (i, v) in self.extra_voices.iter().enumerate() {
            if base + i < 16 {
                vs[base + i] = *v;
            }
        }
        vs
    }
}

/// The emitted schedule plus, for slide mode, the continuous
/// function curve that overrides per-sample carrier/beat on top of it.
pub struct DropSequence {
    pub periods: Vec<UserPeriod>,
    pub func_curve: Option<FuncCurve>,
}

/// Generates the `drop` schedule (spec.md §4.5; scenario 3: `00ds+
/// pink/20` with default `t30,30,3` emits 31 time-lines).
pub fn generate_drop(shape: &DropShape) -> Result<DropSequence> {
    if shape.isochronic && shape.monaural {
        return Err(SbagenError::config(
            "drop: isochronic (@) and monaural (M) are mutually exclusive",
        ));
    }
    let target = shape.target_beat()?;
    let carr = shape.end_carrier();
    let step_s = shape.step_mode.step_seconds();

    let drop_s_raw = shape.drop_minutes * 60.0;
    let mut n_step = 1 + (drop_s_raw as i64 - 1) / step_s as i64;
    if n_step < 2 {
        n_step = 2;
    }
    let len0 = n_step as f64 * step_s;

    let hold_s_raw = shape.hold_minutes * 60.0;
    let len1 = if shape.step_mode.is_slide() {
        hold_s_raw
    } else {
        let n_step1 = 1 + (hold_s_raw as i64 - 1) / step_s as i64;
        n_step1 as f64 * step_s
    };

    let c0 = carr + 5.0;
    let c_after_drop = carr;
    let c_after_hold = if shape.long_form {
        carr - 5.0 * len1 / len0
    } else {
        carr
    };
    let len = if shape.long_form { len0 + len1 } else { len0 };

    let mut beats = Vec::with_capacity(n_step as usize);
    for a in 0..n_step {
        let frac = a as f64 / (n_step - 1) as f64;
        beats.push(10.0 * ((target / 10.0).ln() * frac).exp());
    }

    let mut periods = Vec::new();

    if shape.step_mode.is_slide() {
        for a in 0..n_step {
            let tim = a as f64 * len0 / (n_step - 1) as f64;
            let carrier_t = c0 + (c_after_hold - c0) * tim / len;
            periods.push(UserPeriod {
                time_ms: (tim * 1000.0) as i64,
                fade_in: if a == 0 { FadeCode::Silence } else { FadeCode::Slide },
                fade_out: FadeCode::Slide,
                voices: shape.voice_set(carrier_t, beats[a as usize]),
            });
        }
        if shape.long_form {
            periods.push(UserPeriod {
                time_ms: (len * 1000.0) as i64,
                fade_in: FadeCode::Slide,
                fade_out: FadeCode::Slide,
                voices: shape.voice_set(c_after_hold, *beats.last().unwrap()),
            });
        }
    } else {
        let lim = (len / step_s) as i64;
        for a in 0..lim {
            let tim1 = (a + 1) as f64 * step_s;
            let carrier_t = c0 + (c_after_hold - c0) * tim1 / len;
            let beat_t = beats[(a as usize).min(beats.len() - 1)];
            periods.push(UserPeriod {
                time_ms: (a as f64 * step_s * 1000.0) as i64,
                fade_in: if a == 0 { FadeCode::Silence } else { FadeCode::Slide },
                fade_out: FadeCode::Slide,
                voices: shape.voice_set(carrier_t, beat_t),
            });
        }
    }

    let mut end_s = if shape.step_mode.is_slide() {
        len
    } else {
        len
    };

    if shape.wake_ramp && shape.wake_minutes > 0.0 {
        let len2 = shape.wake_minutes * 60.0;
        periods.push(UserPeriod {
            time_ms: (end_s * 1000.0) as i64,
            fade_in: FadeCode::Slide,
            fade_out: FadeCode::Slide,
            voices: shape.voice_set(c0, beats[0]),
        });
        end_s += len2;
    }

    periods.push(UserPeriod {
        time_ms: (end_s as i64 + 10) * 1000,
        fade_in: FadeCode::Silence,
        fade_out: FadeCode::Silence,
        voices: silent_voice_set(),
    });

    let func_curve = if shape.step_mode.is_slide() {
        Some(FuncCurve {
            target: if shape.monaural {
                FuncTarget::MonauralPair(0, 1)
            } else {
                FuncTarget::Channel(0)
            },
            kind_filter: shape.kind(),
            mode: FuncMode::Exponential,
            start_ms: 0,
            carrier0_hz: c0,
            carrier1_hz: c_after_hold,
            carrier_span_s: len,
            beat0_hz: beats[0],
            beat1_hz: *beats.last().unwrap(),
            beat_span_s: len0,
        })
    } else {
        None
    };

    let _ = c_after_drop;
    Ok(DropSequence { periods, func_curve })
}

/// Generates the `sigmoid` schedule: same skeleton as `drop`'s slide
/// mode, but the beat trajectory follows a tanh sigmoid instead of an
/// exponential, driven by a registered [`FuncCurve`] in slide mode.
pub fn generate_sigmoid(shape: &DropShape, l: f64, h: f64) -> Result<DropSequence> {
    let mut sliding_shape = *shape;
    sliding_shape.step_mode = StepMode::Slide;
    let mut seq = generate_drop(&sliding_shape)?;

    let target = shape.target_beat()?;
    let (a, b) = sigmoid_coefficients(10.0, target, shape.drop_minutes, l, h);
    if let Some(curve) = seq.func_curve.as_mut() {
        curve.mode = FuncMode::Sigmoid { a, b, l, h };
    }
    Ok(seq)
}

/// Generates the `slide` schedule: beat held constant, carrier slides
/// linearly from `c0` to `beat/2` (spec.md §4.5, scenario 2).
pub fn generate_slide(
    duration_s: f64,
    c0: f64,
    beat_sign_positive: bool,
    beat_hz: f64,
    amplitude: f64,
    isochronic: bool,
    monaural: bool,
) -> Result<Vec<UserPeriod>> {
    if isochronic && monaural {
        return Err(SbagenError::config(
            "slide: isochronic (@) and monaural (M) are mutually exclusive",
        ));
    }
    let kind = if isochronic {
        VoiceKind::Isochronic(None)
    } else {
        VoiceKind::Binaural
    };
    let signed_beat = if beat_sign_positive { beat_hz } else { -beat_hz };
    let c1 = signed_beat / 2.0;

    // Monaural holds the beat magnitude constant while the carrier
    // slides from c0 to beat/2, exactly like the non-monaural case;
    // only the channel layout differs (two plain tones, not one pair).
    let make_voices = |carrier: f64| -> VoiceSet {
        let mut vs = silent_voice_set();
        if monaural {
            let half = beat_hz.abs() / 2.0;
            vs[0] = Voice {
                kind: VoiceKind::Binaural,
                amplitude,
                carrier_hz: carrier - half,
                beat_hz: 0.0,
                waveform: WaveformId::sine(),
            };
            vs[1] = Voice {
                kind: VoiceKind::Binaural,
                amplitude,
                carrier_hz: carrier + half,
                beat_hz: 0.0,
                waveform: WaveformId::sine(),
            };
        } else {
            vs[0] = Voice {
                kind,
                amplitude,
                carrier_hz: carrier,
                beat_hz,
                waveform: WaveformId::sine(),
            };
        }
        vs
    };

    Ok(vec![
        UserPeriod {
            time_ms: 0,
            fade_in: FadeCode::Silence,
            fade_out: FadeCode::Slide,
            voices: make_voices(c0),
        },
        UserPeriod {
            time_ms: (duration_s * 1000.0) as i64,
            fade_in: FadeCode::Slide,
            fade_out: FadeCode::Silence,
            voices: make_voices(c1),
        },
    ])
}
