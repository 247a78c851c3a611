//! The real-time per-sample mixing engine (spec.md §4.3): per-channel
//! phase accumulators and envelopes, noise sourcing, dither, and
//! output formatting.
//!
//! Retargeting (recomputing each channel's amplitude/increment pair
//! from the current period's interpolated voice) happens once per
//! output buffer, exactly as `corrVal()` does in the original engine;
//! `render_buffer` then runs the cheap per-sample inner loop
//! (`outChunk()`) against those fixed increments.

use crate::amp_adjust::AmpAdjustTable;
use crate::func_curve::FuncCurve;
use crate::mix_mod::MixModCurve;
use crate::noise::{spin_channels, NoiseGenerator};
use crate::scheduler::{PeriodId, Scheduler, H24};
use crate::voice::{IsochronicEdge, IsochronicGate, Voice, VoiceKind, WaveformId};
use crate::wavetable::{WaveformBank, ST_AMP, ST_SIZ};

/// Phase accumulators are 24.16 fixed point into a `ST_SIZ`-entry
/// table; this is the wraparound mask `(ST_SIZ << 16) - 1`.
const PHASE_MASK: i32 = ((ST_SIZ as i32) << 16) - 1;

/// One channel's mixer-runtime state: the kind/waveform it is
/// currently rendering plus whatever phase/envelope state that kind
/// needs. Reset (`off1`/`off2` zeroed) whenever the channel's kind
/// changes; otherwise carried buffer-to-buffer.
#[derive(Debug, Clone, Copy)]
pub struct ChannelState {
    kind: VoiceKind,
    waveform: WaveformId,
    off1: i32,
    off2: i32,
    inc1: i32,
    inc2: i32,
    amp: i32,
    amp2: i32,
}

impl ChannelState {
    fn silent() -> Self {
        ChannelState {
            kind: VoiceKind::Off,
            waveform: WaveformId::sine(),
            off1: 0,
            off2: 0,
            inc1: 0,
            inc2: 0,
            amp: 0,
            amp2: 0,
        }
    }
}

/// Converts a frequency in Hz to a per-sample 24.16 phase increment.
fn hz_to_inc(freq_hz: f64, sample_rate: u32) -> i32 {
    (freq_hz / sample_rate as f64 * ST_SIZ as f64 * 65536.0) as i32
}

/// Converts a spin sweep-width (microseconds) to the 24-bit-scaled
/// pan-LFO increment used by `ch->inc2` in spin kinds.
fn spin_width_to_inc(width_us: f64, sample_rate: u32) -> i32 {
    (width_us * 1e-6 * sample_rate as f64 * (1i64 << 24) as f64 / ST_AMP as f64) as i32
}

fn iso_edge_shape(x: f64, edge: IsochronicEdge) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    match edge {
        IsochronicEdge::Hard => 1.0,
        IsochronicEdge::Linear => x,
        IsochronicEdge::Smoothstep => x * x * (3.0 - 2.0 * x),
        IsochronicEdge::Smootherstep => x * x * x * (x * (x * 6.0 - 15.0) + 10.0),
    }
}

/// Custom isochronic gate envelope at `phase` (`0..1`, wraps), per
/// `isochronic_mod_factor_phase_custom` (`sbagenx.c:1132-1163`).
fn isochronic_gate_factor(phase: f64, gate: &IsochronicGate) -> f64 {
    if gate.duty >= 1.0 {
        return 1.0;
    }
    let mut phase = phase.fract();
    if phase < 0.0 {
        phase += 1.0;
    }
    let end = gate.start + gate.duty;
    let mut u = -1.0;
    if end <= 1.0 {
        if phase >= gate.start && phase < end {
            u = (phase - gate.start) / gate.duty;
        }
    } else if phase >= gate.start {
        u = (phase - gate.start) / gate.duty;
    } else if phase < end - 1.0 {
        u = (phase + (1.0 - gate.start)) / gate.duty;
    }

    if u <= 0.0 || u >= 1.0 {
        return 0.0;
    }
    if gate.attack > 0.0 && u < gate.attack {
        return iso_edge_shape(u / gate.attack, gate.edge);
    }
    if u <= 1.0 - gate.release {
        return 1.0;
    }
    if gate.release > 0.0 {
        return iso_edge_shape((1.0 - u) / gate.release, gate.edge);
    }
    0.0
}

/// Legacy (no `-I`) isochronic envelope: a threshold-gated smoothstep
/// of the carrier waveform sample itself, threshold 0.3.
fn isochronic_legacy_factor(phase: f64, table: &[i32]) -> f64 {
    let mut phase = phase.fract();
    if phase < 0.0 {
        phase += 1.0;
    }
    let idx = ((phase * ST_SIZ as f64) as usize).min(ST_SIZ - 1);
    let wave = table[idx] as f64 / ST_AMP as f64;
    let threshold = 0.3;
    if wave > threshold {
        let mut factor = (wave - threshold) / (1.0 - threshold);
        factor = factor * factor * (3.0 - 2.0 * factor);
        factor
    } else {
        0.0
    }
}

/// The mixer engine: sixteen channels, the shared noise source, and
/// everything else needed to turn the scheduler's current voices into
/// a stream of stereo samples.
pub struct Engine {
    channels: [ChannelState; 16],
    noise: NoiseGenerator,
    waves: WaveformBank,
    pub amp_adjust: AmpAdjustTable,
    pub mix_mod: MixModCurve,
    pub func_curves: Vec<FuncCurve>,
    /// Isochronic gate used when a channel's kind carries no
    /// per-channel override (the global `-I` spec, if any).
    pub isochronic_gate: Option<IsochronicGate>,
    sample_rate: u32,
    spin_carr_max: f64,
    /// Whether any `mix`/`mixspin`/`mixpulse` voice appears anywhere in
    /// the compiled schedule; when false the raw mix-input stream
    /// passes straight through at unity instead of requiring an
    /// explicit `mix/<amp>` voice.
    pub mix_flag: bool,
    /// Current `mix/<amp>` voice's amplitude (`0..4096`), or `4096` if
    /// no such voice is active; the base volume for mixspin/mixpulse.
    mix_amp_current: f64,
    mix_start_ms: i64,
    dither_state: u32,
    period_hint: PeriodId,
    volume_percent: u32,
}

/// Output sample format the final buffer is rewritten into, mirroring
/// `out_mode` in the original engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 16-bit signed little-endian (the native working format).
    Pcm16Le,
    /// 16-bit signed big-endian (byte-swapped).
    Pcm16Be,
    /// 8-bit unsigned (top byte of each 16-bit sample, offset by 128).
    Pcm8,
}

impl Engine {
    pub fn new(sample_rate: u32, volume_percent: u32, scheduler: &Scheduler) -> Self {
        Engine {
            channels: [ChannelState::silent(); 16],
            noise: NoiseGenerator::default(),
            waves: WaveformBank::new(),
            amp_adjust: AmpAdjustTable::unity(),
            mix_mod: MixModCurve::identity(),
            func_curves: Vec::new(),
            isochronic_gate: None,
            sample_rate,
            spin_carr_max: 127.0 / 1e-6 / sample_rate as f64,
            mix_flag: false,
            mix_amp_current: 4096.0,
            mix_start_ms: 0,
            dither_state: 0,
            period_hint: scheduler.head(),
            volume_percent,
        }
    }

    pub fn waves_mut(&mut self) -> &mut WaveformBank {
        &mut self.waves
    }

    /// Recomputes every channel's amplitude/increment pair from the
    /// scheduler's current period, equivalent to `corrVal()`. Must be
    /// called once per output buffer before [`Engine::render_buffer`].
    pub fn retarget(&mut self, scheduler: &Scheduler, now_ms: i64) {
        let prev_period = self.period_hint;
        let (period_id, mut voices, _ratio) = scheduler.locate(self.period_hint, now_ms);
        let trigger = period_id != prev_period;
        self.period_hint = period_id;

        for curve in &self.func_curves {
            if !curve.active_at(now_ms, H24) {
                continue;
            }
            let elapsed_ms = ((now_ms - curve.start_ms) % H24 + H24) % H24;
            let t_s = elapsed_ms as f64 / 1000.0;
            match curve.target {
                crate::func_curve::FuncTarget::Channel(c) => curve.apply(c, &mut voices[c], t_s),
                crate::func_curve::FuncTarget::MonauralPair(l, r) => {
                    curve.apply(l, &mut voices[l], t_s);
                    curve.apply(r, &mut voices[r], t_s);
                }
            }
        }

        for v in voices.iter_mut() {
            if matches!(
                v.kind,
                VoiceKind::Spin | VoiceKind::MixSpin | VoiceKind::BrownSpin | VoiceKind::WhiteSpin
            ) {
                v.carrier_hz = v.carrier_hz.clamp(-self.spin_carr_max, self.spin_carr_max);
            }
        }

        if self.amp_adjust.is_enabled() {
            self.rescale_amplitudes(&mut voices);
        }

        self.mix_amp_current = voices
            .iter()
            .find(|v| v.kind == VoiceKind::Mix)
            .map(|v| v.amplitude)
            .unwrap_or(4096.0);

        for (idx, voice) in voices.iter().enumerate() {
            self.retarget_channel(idx, voice, trigger);
        }
    }

    /// Headphone-compensation total rescale (spec.md §4.4): binaural
    /// channels are scaled down first to fit their share of 4096,
    /// then every other non-silent kind is scaled proportionally so
    /// the grand total is exactly 4096.
    fn rescale_amplitudes(&self, voices: &mut [Voice; 16]) {
        let mut tot_beat = 0.0;
        let mut tot_other = 0.0;
        for v in voices.iter() {
            match v.kind {
                VoiceKind::Off => {}
                VoiceKind::Binaural => {
                    tot_beat += v.amplitude * self.amp_adjust.binaural_adjust(v.carrier_hz, v.beat_hz);
                }
                _ => tot_other += v.amplitude,
            }
        }
        let total = tot_beat + tot_other;
        if total <= 4096.0 {
            return;
        }
        let adj_beat = if tot_beat > 4096.0 { 4096.0 / tot_beat } else { 1.0 };
        let adj_other = if tot_other > 0.0 {
            (4096.0 - tot_beat * adj_beat) / tot_other
        } else {
            1.0
        };
        for v in voices.iter_mut() {
            match v.kind {
                VoiceKind::Off => {}
                VoiceKind::Binaural => v.amplitude *= adj_beat,
                _ => v.amplitude *= adj_other,
            }
        }
    }

    fn retarget_channel(&mut self, idx: usize, voice: &Voice, trigger: bool) {
        let ch = &mut self.channels[idx];
        let kind_changed = !ch.kind.matches_kind(&voice.kind);
        ch.kind = voice.kind;
        ch.waveform = voice.waveform;
        if kind_changed {
            ch.off1 = 0;
            ch.off2 = 0;
        }

        match voice.kind {
            VoiceKind::Off => {
                ch.amp = 0;
                ch.amp2 = 0;
            }
            VoiceKind::Binaural => {
                let freq1 = voice.carrier_hz + voice.beat_hz / 2.0;
                let freq2 = voice.carrier_hz - voice.beat_hz / 2.0;
                if self.amp_adjust.is_enabled() {
                    ch.amp = (voice.amplitude * self.amp_adjust.adjust(freq1)) as i32;
                    ch.amp2 = (voice.amplitude * self.amp_adjust.adjust(freq2)) as i32;
                } else {
                    ch.amp = voice.amplitude as i32;
                    ch.amp2 = ch.amp;
                }
                ch.inc1 = hz_to_inc(freq1, self.sample_rate);
                ch.inc2 = hz_to_inc(freq2, self.sample_rate);
            }
            VoiceKind::Pink | VoiceKind::White | VoiceKind::Brown | VoiceKind::Mix => {
                ch.amp = voice.amplitude as i32;
            }
            VoiceKind::Bell => {
                ch.amp = voice.amplitude as i32;
                ch.inc1 = hz_to_inc(voice.carrier_hz, self.sample_rate);
                if trigger {
                    ch.off2 = ch.amp;
                    ch.inc2 = (self.sample_rate / 20) as i32;
                }
            }
            VoiceKind::Spin | VoiceKind::BrownSpin | VoiceKind::WhiteSpin => {
                ch.amp = voice.amplitude as i32;
                ch.inc1 = hz_to_inc(voice.beat_hz, self.sample_rate);
                ch.inc2 = spin_width_to_inc(voice.carrier_hz, self.sample_rate);
            }
            VoiceKind::MixSpin => {
                ch.amp = voice.amplitude as i32;
                ch.inc1 = hz_to_inc(voice.beat_hz, self.sample_rate);
                ch.inc2 = spin_width_to_inc(voice.carrier_hz, self.sample_rate);
            }
            VoiceKind::MixPulse => {
                ch.amp = voice.amplitude as i32;
                ch.inc2 = hz_to_inc(voice.beat_hz, self.sample_rate);
            }
            VoiceKind::Isochronic(_) => {
                ch.amp = voice.amplitude as i32;
                ch.inc1 = hz_to_inc(voice.carrier_hz, self.sample_rate);
                ch.inc2 = hz_to_inc(voice.beat_hz, self.sample_rate);
            }
        }
    }

    /// Advances the shared pink noise history by exactly one draw and
    /// returns it, for channels that reuse "this frame's" pink sample.
    fn step_pink(&mut self) -> i32 {
        self.noise.pink()
    }

    fn isochronic_factor(&self, channel_gate: Option<&IsochronicGate>, phase: f64, table: &[i32]) -> f64 {
        if let Some(gate) = channel_gate.or(self.isochronic_gate.as_ref()) {
            isochronic_gate_factor(phase, gate)
        } else {
            isochronic_legacy_factor(phase, table)
        }
    }

    /// Renders one stereo frame, mutating each channel's phase state
    /// and returning the signed-32-bit-wrapping `(left, right)`
    /// accumulators before volume/dither/shift, matching `outChunk`'s
    /// per-sample body.
    fn render_frame(&mut self, mix1: i32, mix2: i32, mix_mod_mul: f64) -> (i32, i32) {
        let pink_now = self.step_pink();

        let (tot1_f, tot2_f) = if !self.mix_flag {
            (
                ((mix1 as i64) << 12) as f64 * mix_mod_mul,
                ((mix2 as i64) << 12) as f64 * mix_mod_mul,
            )
        } else {
            (0.0, 0.0)
        };
        let mut tot1 = tot1_f as i32;
        let mut tot2 = tot2_f as i32;

        for idx in 0..16 {
            let waveform = self.channels[idx].waveform;
            let table = self.waves.table(waveform);
            let ch = &mut self.channels[idx];
            match ch.kind {
                VoiceKind::Off => {}
                VoiceKind::Binaural => {
                    ch.off1 = (ch.off1.wrapping_add(ch.inc1)) & PHASE_MASK;
                    tot1 = tot1.wrapping_add(ch.amp.wrapping_mul(table[(ch.off1 >> 16) as usize]));
                    ch.off2 = (ch.off2.wrapping_add(ch.inc2)) & PHASE_MASK;
                    tot2 = tot2.wrapping_add(ch.amp2.wrapping_mul(table[(ch.off2 >> 16) as usize]));
                }
                VoiceKind::Pink => {
                    let val = pink_now.wrapping_mul(ch.amp);
                    tot1 = tot1.wrapping_add(val);
                    tot2 = tot2.wrapping_add(val);
                }
                VoiceKind::White => {
                    let val = self.noise.white().wrapping_mul(ch.amp);
                    tot1 = tot1.wrapping_add(val);
                    tot2 = tot2.wrapping_add(val);
                }
                VoiceKind::Brown => {
                    let val = self.noise.brown().wrapping_mul(ch.amp);
                    tot1 = tot1.wrapping_add(val);
                    tot2 = tot2.wrapping_add(val);
                }
                VoiceKind::Bell => {
                    if ch.off2 != 0 {
                        ch.off1 = (ch.off1.wrapping_add(ch.inc1)) & PHASE_MASK;
                        let val = ch.off2.wrapping_mul(table[(ch.off1 >> 16) as usize]);
                        tot1 = tot1.wrapping_add(val);
                        tot2 = tot2.wrapping_add(val);
                        ch.inc2 -= 1;
                        if ch.inc2 < 0 {
                            ch.inc2 = (self.sample_rate / 20) as i32;
                            ch.off2 -= 1 + ch.off2 / 12;
                        }
                    }
                }
                VoiceKind::Spin | VoiceKind::BrownSpin | VoiceKind::WhiteSpin => {
                    ch.off1 = (ch.off1.wrapping_add(ch.inc1)) & PHASE_MASK;
                    let val = (ch.inc2.wrapping_mul(table[(ch.off1 >> 16) as usize])) >> 24;
                    let base = match ch.kind {
                        VoiceKind::BrownSpin => self.noise.brown(),
                        VoiceKind::WhiteSpin => self.noise.white(),
                        _ => self.noise.pink(),
                    };
                    let (l, r) = spin_channels(ch.amp, (val as f64 * 1.5) as i32, base);
                    tot1 = tot1.wrapping_add(l);
                    tot2 = tot2.wrapping_add(r);
                }
                VoiceKind::Mix => {
                    tot1 = tot1.wrapping_add(((mix1 as f64) * (ch.amp as f64 * mix_mod_mul)) as i32);
                    tot2 = tot2.wrapping_add(((mix2 as f64) * (ch.amp as f64 * mix_mod_mul)) as i32);
                }
                VoiceKind::MixSpin => {
                    ch.off1 = (ch.off1.wrapping_add(ch.inc1)) & PHASE_MASK;
                    let val = (ch.inc2.wrapping_mul(table[(ch.off1 >> 16) as usize])) >> 24;
                    let intensity = 0.5 + (ch.amp as f64 / 4096.0) * 3.5;
                    let amplified = ((val as f64) * intensity).clamp(-128.0, 127.0) as i32;
                    let pos_val = amplified.unsigned_abs() as i32;
                    let (mix_l, mix_r) = if amplified >= 0 {
                        (
                            (mix1 * (128 - pos_val)) >> 7,
                            mix2 + ((mix1 * pos_val) >> 7),
                        )
                    } else {
                        (
                            mix1 + ((mix2 * pos_val) >> 7),
                            (mix2 * (128 - pos_val)) >> 7,
                        )
                    };
                    let base_amp = self.mix_amp_current * 0.7 * mix_mod_mul;
                    tot1 = tot1.wrapping_add((base_amp * mix_l as f64) as i32);
                    tot2 = tot2.wrapping_add((base_amp * mix_r as f64) as i32);
                }
                VoiceKind::MixPulse => {
                    ch.off2 = (ch.off2.wrapping_add(ch.inc2)) & PHASE_MASK;
                    let mod_val = table[(ch.off2 >> 16) as usize];
                    let mut mod_factor = 0.0;
                    if mod_val as f64 > ST_AMP as f64 * 0.3 {
                        mod_factor = (mod_val as f64 - ST_AMP as f64 * 0.3) / (ST_AMP as f64 * 0.7);
                        mod_factor = mod_factor * mod_factor * (3.0 - 2.0 * mod_factor);
                    }
                    let base_amp = self.mix_amp_current * 0.7 * mix_mod_mul;
                    let effect_intensity = (ch.amp as f64 / 4096.0) * 1.5;
                    let gain = (1.0 - effect_intensity) + effect_intensity * mod_factor;
                    tot1 = tot1.wrapping_add((base_amp * mix1 as f64 * gain) as i32);
                    tot2 = tot2.wrapping_add((base_amp * mix2 as f64 * gain) as i32);
                }
                VoiceKind::Isochronic(gate) => {
                    ch.off1 = (ch.off1.wrapping_add(ch.inc1)) & PHASE_MASK;
                    ch.off2 = (ch.off2.wrapping_add(ch.inc2)) & PHASE_MASK;
                    let phase = ch.off2 as f64 / (ST_SIZ as f64 * 65536.0);
                    let factor = self.isochronic_factor(gate.as_ref(), phase, table);
                    let val = (ch.amp as f64 * table[(ch.off1 >> 16) as usize] as f64 * factor) as i32;
                    tot1 = tot1.wrapping_add(val);
                    tot2 = tot2.wrapping_add(val);
                }
            }
        }

        (tot1, tot2)
    }

    /// Applies global volume, dither, and the 16-bit shift to one
    /// frame's raw accumulators, returning the final `(left, right)`
    /// 16-bit samples.
    fn finish_frame(&mut self, mut tot1: i32, mut tot2: i32) -> (i16, i16) {
        if self.volume_percent != 100 {
            tot1 = ((tot1 as i64) * self.volume_percent as i64 + 50) / 100;
            tot2 = ((tot2 as i64) * self.volume_percent as i64 + 50) / 100;
        }

        let rand0 = self.dither_state;
        self.dither_state = (rand0.wrapping_mul(0x660D).wrapping_add(0xF35F)) & 0xFFFF;
        if tot1 <= 0x7FFF0000u32 as i32 {
            tot1 = tot1.wrapping_add(rand0 as i32);
        }
        if tot2 <= 0x7FFF0000u32 as i32 {
            tot2 = tot2.wrapping_add(rand0 as i32);
        }

        ((tot1 >> 16) as i16, (tot2 >> 16) as i16)
    }

    /// Renders `frames` stereo samples into `out` (interleaved `i16`,
    /// length `2*frames`), optionally pulling `mix_input` (interleaved
    /// 20-bit stereo, length `2*frames`, zero-filled past EOF by the
    /// caller) and driving the mix-modulation curve from
    /// `mix_elapsed_minutes`.
    pub fn render_buffer(&mut self, out: &mut [i16], mix_input: Option<&[i32]>, mix_elapsed_minutes: f64) {
        let frames = out.len() / 2;
        let mix_mod_mul = self.mix_mod.gain(mix_elapsed_minutes);
        for i in 0..frames {
            let (mix1, mix2) = match mix_input {
                Some(buf) => (buf[2 * i], buf[2 * i + 1]),
                None => (0, 0),
            };
            let (t1, t2) = self.render_frame(mix1, mix2, mix_mod_mul);
            let (s1, s2) = self.finish_frame(t1, t2);
            out[2 * i] = s1;
            out[2 * i + 1] = s2;
        }
    }

    pub fn channel_kind(&self, idx: usize) -> VoiceKind {
        self.channels[idx].kind
    }
}

/// Formats a buffer of interleaved 16-bit samples for the sink,
/// matching `outChunk`'s trailing byte-swap/8-bit rewrite passes.
pub fn format_output(samples: &[i16], format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Pcm16Le => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        OutputFormat::Pcm16Be => samples.iter().flat_map(|s| s.to_be_bytes()).collect(),
        OutputFormat::Pcm8 => samples
            .iter()
            .map(|&s| (((s as i32) >> 8) + 128) as u8)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FadeCode, Scheduler as Sched, UserPeriod};
    use crate::voice::{silent_voice_set, VoiceSet};

    fn voice_set_with(v: Voice) -> VoiceSet {
        let mut vs = silent_voice_set();
        vs[0] = v;
        vs
    }

    fn single_binaural_schedule() -> Sched {
        let periods = vec![UserPeriod {
            time_ms: 0,
            fade_in: FadeCode::Silence,
            fade_out: FadeCode::Silence,
            voices: voice_set_with(Voice {
                kind: VoiceKind::Binaural,
                amplitude: 2048.0,
                carrier_hz: 200.0,
                beat_hz: 10.0,
                waveform: WaveformId::sine(),
            }),
        }];
        Sched::compile(periods, crate::scheduler::DEFAULT_FADE_INT).unwrap()
    }

    #[test]
    fn retarget_sets_binaural_increments_from_ear_frequencies() {
        let sched = single_binaural_schedule();
        let mut engine = Engine::new(44_100, 100, &sched);
        engine.retarget(&sched, 0);
        assert_eq!(engine.channel_kind(0), VoiceKind::Binaural);
    }

    #[test]
    fn render_buffer_produces_nonzero_output_for_binaural_tone() {
        let sched = single_binaural_schedule();
        let mut engine = Engine::new(44_100, 100, &sched);
        engine.retarget(&sched, 0);
        let mut out = vec![0i16; 2 * 512];
        engine.render_buffer(&mut out, None, 0.0);
        assert!(out.iter().any(|&s| s != 0));
    }

    #[test]
    fn off_channel_renders_silence() {
        let periods = vec![UserPeriod {
            time_ms: 0,
            fade_in: FadeCode::Silence,
            fade_out: FadeCode::Silence,
            voices: silent_voice_set(),
        }];
        let sched = Sched::compile(periods, crate::scheduler::DEFAULT_FADE_INT).unwrap();
        let mut engine = Engine::new(44_100, 100, &sched);
        engine.retarget(&sched, 0);
        let mut out = vec![1i16; 2 * 64];
        engine.render_buffer(&mut out, None, 0.0);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn bell_strikes_at_full_amplitude_then_decays() {
        let periods = vec![UserPeriod {
            time_ms: 0,
            fade_in: FadeCode::Silence,
            fade_out: FadeCode::Silence,
            voices: voice_set_with(Voice {
                kind: VoiceKind::Bell,
                amplitude: 4096.0,
                carrier_hz: 440.0,
                beat_hz: 0.0,
                waveform: WaveformId::sine(),
            }),
        }];
        let sched = Sched::compile(periods, crate::scheduler::DEFAULT_FADE_INT).unwrap();
        let mut engine = Engine::new(44_100, 100, &sched);
        engine.retarget(&sched, 0);
        assert_eq!(engine.channels[0].off2, 4096);
        let mut out = vec![0i16; 2 * 4410];
        engine.render_buffer(&mut out, None, 0.0);
        assert!(engine.channels[0].off2 < 4096);
    }

    #[test]
    fn dither_recurrence_matches_known_step() {
        let sched = single_binaural_schedule();
        let mut engine = Engine::new(44_100, 100, &sched);
        engine.retarget(&sched, 0);
        let (_, _) = engine.finish_frame(0, 0);
        assert_eq!(engine.dither_state, 0xF35F & 0xFFFF);
    }

    #[test]
    fn format_output_8bit_offsets_by_128() {
        let samples = [0i16, i16::MIN, i16::MAX];
        let bytes = format_output(&samples, OutputFormat::Pcm8);
        assert_eq!(bytes[0], 128);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2], 255);
    }

    #[test]
    fn format_output_16bit_big_endian_swaps_bytes() {
        let samples = [0x0102i16];
        let le = format_output(&samples, OutputFormat::Pcm16Le);
        let be = format_output(&samples, OutputFormat::Pcm16Be);
        assert_eq!(le, vec![0x02, 0x01]);
        assert_eq!(be, vec![0x01, 0x02]);
    }
}
