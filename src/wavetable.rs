//! Bandlimited-in-spirit lookup wavetables: the four built-in waveforms
//! (sine, square, triangle, sawtooth) and up to 100 user-defined tables
//! built by periodic sinc interpolation from a handful of sample points.
//!
//! All tables share the same layout as the original engine: `ST_SIZ`
//! entries, values scaled to `±ST_AMP`, addressed with a fractional phase
//! in `0..1` (see [`crate::mixer`]).

use crate::error::{Result, SbagenError};
use once_cell::sync::Lazy;
use std::f64::consts::PI;

/// Number of entries in every wavetable (power of two).
pub const ST_SIZ: usize = 16384;

/// Peak amplitude of a table entry.
pub const ST_AMP: i32 = 0x7FFFF;

/// The four built-in waveform ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinWaveform {
    Sine = 0,
    Square = 1,
    Triangle = 2,
    Sawtooth = 3,
}

impl BuiltinWaveform {
    pub fn from_index(i: u32) -> Option<Self> {
        match i {
            0 => Some(Self::Sine),
            1 => Some(Self::Square),
            2 => Some(Self::Triangle),
            3 => Some(Self::Sawtooth),
            _ => None,
        }
    }
}

fn generate_builtin(waveform: BuiltinWaveform) -> [i32; ST_SIZ] {
    let mut table = [0i32; ST_SIZ];
    for (a, slot) in table.iter_mut().enumerate() {
        let phase = (a as f64 * 2.0 * PI) / ST_SIZ as f64;
        let val = match waveform {
            BuiltinWaveform::Sine => phase.sin(),
            BuiltinWaveform::Square => {
                if phase.sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            BuiltinWaveform::Triangle => {
                let t = phase / (2.0 * PI);
                if t < 0.25 {
                    4.0 * t
                } else if t < 0.75 {
                    2.0 - 4.0 * t
                } else {
                    4.0 * t - 4.0
                }
            }
            BuiltinWaveform::Sawtooth => {
                let t = phase / (2.0 * PI);
                -1.0 + 2.0 * t
            }
        };
        *slot = (ST_AMP as f64 * val) as i32;
    }
    table
}

static SINE_TABLE: Lazy<[i32; ST_SIZ]> = Lazy::new(|| generate_builtin(BuiltinWaveform::Sine));
static SQUARE_TABLE: Lazy<[i32; ST_SIZ]> = Lazy::new(|| generate_builtin(BuiltinWaveform::Square));
static TRIANGLE_TABLE: Lazy<[i32; ST_SIZ]> =
    Lazy::new(|| generate_builtin(BuiltinWaveform::Triangle));
static SAWTOOTH_TABLE: Lazy<[i32; ST_SIZ]> =
    Lazy::new(|| generate_builtin(BuiltinWaveform::Sawtooth));

/// Returns the shared table for one of the four built-in waveforms.
pub fn builtin_table(waveform: BuiltinWaveform) -> &'static [i32; ST_SIZ] {
    match waveform {
        BuiltinWaveform::Sine => &SINE_TABLE,
        BuiltinWaveform::Square => &SQUARE_TABLE,
        BuiltinWaveform::Triangle => &TRIANGLE_TABLE,
        BuiltinWaveform::Sawtooth => &SAWTOOTH_TABLE,
    }
}

/// Maximum number of user-defined wavetables (`wave00` .. `wave99`).
pub const MAX_USER_WAVES: usize = 100;

/// A user wavetable, built from `>= 2` anchor samples via periodic sinc
/// interpolation. Identity of a user waveform is this table's contents,
/// so the interpolation must match the original bit for bit.
#[derive(Debug, Clone)]
pub struct UserWave {
    pub table: Vec<i32>,
}

impl UserWave {
    /// Builds a user wavetable from raw sample points (as written in a
    /// `waveNN:` line): normalize to the point set's own min/max, then
    /// periodic-sinc-interpolate onto a `ST_SIZ`-entry table, then
    /// rescale so the peak matches `+/-ST_AMP`.
    pub fn from_samples(samples: &[f64]) -> Result<Self> {
        if samples.len() < 2 {
            return Err(SbagenError::range(
                "expecting at least two samples in a user waveform",
            ));
        }
        let mut dmin = samples[0];
        let mut dmax = samples[0];
        for &s in samples {
            if s > dmax {
                dmax = s;
            }
            if s < dmin {
                dmin = s;
            }
        }
        let span = dmax - dmin;
        if span == 0.0 {
            return Err(SbagenError::range(
                "user waveform samples are all identical; cannot normalize",
            ));
        }
        let normalized: Vec<f64> = samples.iter().map(|s| (s - dmin) / span).collect();
        Ok(Self {
            table: sinc_interpolate(&normalized),
        })
    }
}

/// Periodic sinc interpolation of `np` anchor points onto a `ST_SIZ`-entry
/// table, matching `sinc_interpolate()` in the original engine: each point
/// contributes a windowed `sin(x)/x` kernel at its phase position, summed
/// in both upright and half-cycle-shifted-and-inverted form. The window
/// replaces the true `sin(x)/x` envelope with `1 - 4t^2` across the
/// half-cycle, an approximation within about 5%.
fn sinc_interpolate(points: &[f64]) -> Vec<i32> {
    let np = points.len();
    let n = ST_SIZ;

    let mut sinc = vec![0.0f64; n];
    sinc[0] = 1.0;
    for a in (1..=n / 2).rev() {
        let tt = a as f64 / n as f64;
        let t2 = tt * tt;
        let adj = 1.0 - 4.0 * t2;
        let xx = 2.0 * np as f64 * PI * tt;
        let vv = adj * xx.sin() / xx;
        sinc[a] = vv;
        sinc[n - a] = vv;
    }

    let mut out = vec![0.0f64; n];
    for (b, &val) in points.iter().enumerate() {
        let off = b * n / np / 2;
        for a in 0..n {
            out[(a + off) & (n - 1)] += sinc[a] * val;
            out[(a + off + n / 2) & (n - 1)] -= sinc[a] * val;
        }
    }

    let mut dmax = 0.0f64;
    let mut dmin = 0.0f64;
    for &v in &out {
        if v > dmax {
            dmax = v;
        }
        if v < dmin {
            dmin = v;
        }
    }

    let off = -0.5 * (dmax + dmin);
    let adj = ST_AMP as f64 / ((dmax - dmin) / 2.0);
    out.iter().map(|&v| ((v + off) * adj) as i32).collect()
}

/// Runtime collection of every waveform a channel can reference: the
/// four shared builtin tables plus whatever user `waveNN:` tables the
/// sequence defined, resolved once per [`crate::voice::WaveformId`]
/// lookup rather than matched afresh at every call site.
#[derive(Debug, Clone, Default)]
pub struct WaveformBank {
    user: Vec<Option<UserWave>>,
}

impl WaveformBank {
    pub fn new() -> Self {
        WaveformBank { user: Vec::new() }
    }

    /// Registers (or replaces) a user wavetable at slot `n` (`0..100`).
    pub fn set_user(&mut self, n: u8, wave: UserWave) -> Result<()> {
        let n = n as usize;
        if n >= MAX_USER_WAVES {
            return Err(SbagenError::range("user waveform index must be 0..100"));
        }
        if self.user.len() <= n {
            self.user.resize(n + 1, None);
        }
        self.user[n] = Some(wave);
        Ok(())
    }

    /// Whether user slot `n` has a registered table.
    pub fn is_registered(&self, n: u8) -> bool {
        self.user.get(n as usize).map_or(false, |slot| slot.is_some())
    }

    /// Resolves a [`crate::voice::WaveformId`] to its backing table.
    /// An unregistered user slot falls back to the sine table, matching
    /// the original engine's behavior of leaving `waves[n]` null-checked
    /// only at parse time (by construction here, parsing must register
    /// every referenced `waveNN` before compiling the schedule).
    pub fn table(&self, id: crate::voice::WaveformId) -> &[i32] {
        match id {
            crate::voice::WaveformId::Builtin(b) => builtin_table(b),
            crate::voice::WaveformId::User(n) => self
                .user
                .get(n as usize)
                .and_then(|slot| slot.as_ref())
                .map(|w| w.table.as_slice())
                .unwrap_or_else(|| builtin_table(BuiltinWaveform::Sine)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_bank_resolves_user_table_after_registration() {
        let mut bank = WaveformBank::new();
        bank.set_user(3, UserWave::from_samples(&[0.0, 1.0, 0.0, -1.0]).unwrap())
            .unwrap();
        let table = bank.table(crate::voice::WaveformId::User(3));
        assert_eq!(table.len(), ST_SIZ);
    }

    #[test]
    fn waveform_bank_falls_back_to_sine_for_unregistered_slot() {
        let bank = WaveformBank::new();
        let table = bank.table(crate::voice::WaveformId::User(5));
        assert_eq!(table, builtin_table(BuiltinWaveform::Sine).as_slice());
    }

    #[test]
    fn builtin_tables_are_symmetric_and_peak_scaled() {
        let sine = builtin_table(BuiltinWaveform::Sine);
        assert_eq!(sine[0], 0);
        let peak = sine.iter().copied().map(i32::abs).max().unwrap();
        assert!(peak <= ST_AMP);
        assert!(peak > ST_AMP * 9 / 10);
    }

    #[test]
    fn square_table_is_bipolar() {
        let sq = builtin_table(BuiltinWaveform::Square);
        for &v in sq.iter() {
            assert!(v == ST_AMP || v == -ST_AMP);
        }
    }

    #[test]
    fn sawtooth_ramps_monotonically_within_a_cycle() {
        let saw = builtin_table(BuiltinWaveform::Sawtooth);
        assert!(saw[0] < 0);
        assert!(saw[ST_SIZ - 1] > saw[0]);
    }

    #[test]
    fn user_wave_rejects_too_few_samples() {
        assert!(UserWave::from_samples(&[1.0]).is_err());
    }

    #[test]
    fn user_wave_round_trips_anchor_points_approximately() {
        let samples = vec![0.0, 1.0, 0.0, -1.0];
        let wave = UserWave::from_samples(&samples).unwrap();
        assert_eq!(wave.table.len(), ST_SIZ);
        let tolerance = ST_AMP / 4;
        assert!(wave.table[0].abs() < tolerance);
        let peak = wave.table.iter().copied().map(i32::abs).max().unwrap();
        assert!(peak > ST_AMP * 8 / 10);
    }
}
