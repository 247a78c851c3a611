//! Confirms the pink noise generator's spectral slope is roughly 1/f
//! (falls off toward higher frequencies) rather than flat (white) or
//! steeply falling (brown), using an FFT magnitude spectrum split into
//! low/high halves.

use rustfft::{num_complex::Complex, FftPlanner};
use sbagenx::noise::NoiseGenerator;

fn band_energy(samples: &[f64]) -> (f64, f64) {
    let n = samples.len();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let mut buf: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buf);

    let half = n / 2;
    let low: f64 = buf[1..half / 2].iter().map(|c| c.norm_sqr()).sum();
    let high: f64 = buf[half / 2..half].iter().map(|c| c.norm_sqr()).sum();
    (low, high)
}

#[test]
fn pink_noise_concentrates_energy_at_low_frequencies() {
    let mut gen = NoiseGenerator::default();
    let n = 1 << 14;
    let samples: Vec<f64> = (0..n).map(|_| gen.pink() as f64).collect();
    let (low, high) = band_energy(&samples);
    assert!(low > high, "pink noise should favor low frequencies: low={low} high={high}");
}

#[test]
fn white_noise_spreads_energy_more_evenly_than_pink() {
    let mut pink_gen = NoiseGenerator::default();
    let mut white_gen = NoiseGenerator::default();
    let n = 1 << 14;
    let pink: Vec<f64> = (0..n).map(|_| pink_gen.pink() as f64).collect();
    let white: Vec<f64> = (0..n).map(|_| white_gen.white() as f64).collect();

    let (pink_low, pink_high) = band_energy(&pink);
    let (white_low, white_high) = band_energy(&white);

    let pink_ratio = pink_low / pink_high.max(1.0);
    let white_ratio = white_low / white_high.max(1.0);
    assert!(
        pink_ratio > white_ratio,
        "pink low/high energy ratio ({pink_ratio}) should exceed white's ({white_ratio})"
    );
}

#[test]
fn brown_noise_concentrates_energy_even_more_than_pink() {
    let mut pink_gen = NoiseGenerator::default();
    let mut brown_gen = NoiseGenerator::default();
    let n = 1 << 14;
    let pink: Vec<f64> = (0..n).map(|_| pink_gen.pink() as f64).collect();
    let brown: Vec<f64> = (0..n).map(|_| brown_gen.brown() as f64).collect();

    let (pink_low, pink_high) = band_energy(&pink);
    let (brown_low, brown_high) = band_energy(&brown);

    let pink_ratio = pink_low / pink_high.max(1.0);
    let brown_ratio = brown_low / brown_high.max(1.0);
    assert!(
        brown_ratio > pink_ratio,
        "brown low/high energy ratio ({brown_ratio}) should exceed pink's ({pink_ratio})"
    );
}
