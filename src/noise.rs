//! Pink, white, and brown noise generators sharing the wavetables'
//! `±ST_AMP` amplitude scale, plus the noise "spin" stereo-panning effect.
//!
//! The pseudorandom core is a ZX-Spectrum-style linear congruential
//! generator (`seed = seed * 75 mod 131074 - 65535`); pink noise stacks
//! nine such draws into a binary-tree of lagging low-pass bands so most
//! bands update only on every other, fourth, eighth, ... call, giving a
//! roughly 1/f spectral slope. These recurrences are lifted bit-for-bit
//! from the original engine: any behavioral change here changes the
//! audible texture of every `pink`/`spin` voice.

use crate::wavetable::ST_AMP;

/// LCG multiplier for the ZX-Spectrum-style noise source.
const RAND_MULT: i32 = 75;

/// Right-shift applied to the accumulated multi-band pink noise sum to
/// bring it back down to `ST_AMP` scale; pink noise is generated
/// internally at `ST_AMP << NS_ADJ`.
const NS_ADJ: u32 = 12;

/// Pink noise filter bank depth.
const NS_BANDS: usize = 9;

const NS_AMP: i64 = (ST_AMP as i64) << NS_ADJ;

/// Length of the circular pink-noise history used by the spin effect.
const HISTORY_LEN: usize = 256;

/// One lagging low-pass band in the pink noise filter bank.
#[derive(Debug, Clone, Copy, Default)]
struct Band {
    val: i64,
    inc: i64,
}

/// Shared pseudorandom noise source for a single mixer instance.
///
/// The original engine keeps one process-global `seed` shared by every
/// noise-producing voice, so that pink/white/brown draws across channels
/// interleave into a single deterministic stream; this struct is that
/// state made instantiable (one per mixer) instead of global.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    seed: i32,
    bands: [Band; NS_BANDS],
    call_count: u32,
    history: [i32; HISTORY_LEN],
    history_pos: u8,
    brown_last: i64,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl NoiseGenerator {
    /// Creates a generator with the given LCG seed (the original engine
    /// starts at `seed = 2`).
    pub fn new(seed: i32) -> Self {
        Self {
            seed,
            bands: [Band::default(); NS_BANDS],
            call_count: 0,
            history: [0; HISTORY_LEN],
            history_pos: 0,
            brown_last: 0,
        }
    }

    /// Draws the next raw LCG value, already offset to be roughly
    /// zero-centered in `-65535..=65535`.
    #[inline]
    fn next_raw(&mut self) -> i64 {
        self.seed = ((self.seed as i64 * RAND_MULT as i64) % 131074) as i32;
        (self.seed - 65535) as i64
    }

    /// Draws one pink noise sample, scaled to `±ST_AMP`. Also records the
    /// sample into the spin-effect history buffer.
    pub fn pink(&mut self) -> i32 {
        let off = self.call_count;
        self.call_count = self.call_count.wrapping_add(1);

        let unit = NS_AMP / 65535 / (NS_BANDS as i64 + 1);
        let mut tot = self.next_raw() * unit;

        let mut cnt: u32 = 1;
        let mut i = 0;
        while (cnt & off) != 0 && i < NS_BANDS {
            let val = self.next_raw() * unit;
            let band = &mut self.bands[i];
            band.inc = (val - band.val) / (cnt as i64 + cnt as i64);
            band.val += band.inc;
            tot += band.val;
            cnt += cnt;
            i += 1;
        }
        while i < NS_BANDS {
            let band = &mut self.bands[i];
            band.val += band.inc;
            tot += band.val;
            i += 1;
        }

        let sample = (tot >> NS_ADJ) as i32;
        self.history[self.history_pos as usize] = sample;
        self.history_pos = self.history_pos.wrapping_add(1);
        sample
    }

    /// Looks back into the pink-noise history, `offset` samples behind
    /// the most recently produced one (wrapping modulo the history
    /// length), for the spin effect's "what was playing a moment ago"
    /// lookup.
    pub fn pink_history(&self, offset: u8) -> i32 {
        let idx = self.history_pos.wrapping_add(offset);
        self.history[idx as usize]
    }

    /// Draws one white noise sample, scaled to `±ST_AMP`. The scale
    /// factor is truncated to an integer before multiplying, matching
    /// the original's `(ST_AMP/65535)` fixed-point constant.
    pub fn white(&mut self) -> i32 {
        const FACTOR: i64 = (ST_AMP as i64) / 65535;
        (self.next_raw() * FACTOR) as i32
    }

    /// Draws one brown noise sample: a decayed random walk of white
    /// noise, hard-clipped to `±65535` before rescaling to `±ST_AMP`.
    pub fn brown(&mut self) -> i32 {
        let random = self.next_raw();
        let mut last = ((self.brown_last + random / 16) as f64 * 0.9) as i64;
        if last > 65535 {
            last = 65535;
        }
        if last < -65535 {
            last = -65535;
        }
        self.brown_last = last;
        const FACTOR: i64 = (ST_AMP as i64) / 65535;
        (last * FACTOR) as i32
    }
}

/// Noise source selectable by the spin effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinNoiseKind {
    Pink,
    White,
    Brown,
}

/// Splits one noise sample into left/right channel contributions
/// according to a spin position in `-128..=127` (0 centered, `+/-128`
/// fully swapped), matching `create_noise_spin_effect()`.
///
/// `amp` is the voice's integer amplitude; `spin_position` is typically
/// `inc2`-derived and pre-scaled by the caller (`* 1.5`, clamped to
/// `-128..=127`) before being passed in here.
pub fn spin_channels(amp: i32, spin_position: i32, base_noise: i32) -> (i32, i32) {
    let clamped = spin_position.clamp(-128, 127);
    let pos_val = clamped.unsigned_abs() as i32;

    let (noise_l, noise_r) = if clamped >= 0 {
        (
            (base_noise * (128 - pos_val)) >> 7,
            base_noise + ((base_noise * pos_val) >> 7),
        )
    } else {
        (
            base_noise + ((base_noise * pos_val) >> 7),
            (base_noise * (128 - pos_val)) >> 7,
        )
    };

    (amp * noise_l, amp * noise_r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pink_noise_stays_within_amplitude_bound() {
        let mut gen = NoiseGenerator::default();
        for _ in 0..100_000 {
            let sample = gen.pink();
            assert!(sample.abs() <= ST_AMP * 2, "sample {sample} out of range");
        }
    }

    #[test]
    fn white_noise_is_bounded_by_st_amp() {
        let mut gen = NoiseGenerator::default();
        for _ in 0..10_000 {
            let sample = gen.white();
            assert!(sample.abs() <= ST_AMP);
        }
    }

    #[test]
    fn brown_noise_is_bounded_and_smoother_than_white() {
        let mut gen = NoiseGenerator::default();
        let mut brown_deltas = 0i64;
        let mut white_deltas = 0i64;
        let mut prev_b = gen.brown();
        let mut prev_w = gen.white();
        for _ in 0..10_000 {
            let b = gen.brown();
            let w = gen.white();
            brown_deltas += (b - prev_b).unsigned_abs() as i64;
            white_deltas += (w - prev_w).unsigned_abs() as i64;
            prev_b = b;
            prev_w = w;
        }
        assert!(brown_deltas < white_deltas);
    }

    #[test]
    fn spin_channels_centered_splits_noise_evenly() {
        let (l, r) = spin_channels(1, 0, 128);
        assert_eq!(l, r);
    }

    #[test]
    fn spin_channels_at_extreme_swaps_to_opposite_side() {
        let (l, r) = spin_channels(1, 127, 1000);
        assert!(r > l);
        let (l2, r2) = spin_channels(1, -128, 1000);
        assert!(l2 > r2);
    }

    #[test]
    fn lcg_sequence_is_deterministic_from_seed() {
        let mut a = NoiseGenerator::new(2);
        let mut b = NoiseGenerator::new(2);
        for _ in 0..50 {
            assert_eq!(a.white(), b.white());
        }
    }
}
