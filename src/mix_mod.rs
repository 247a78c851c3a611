//! Mix-modulation curve: a runtime multiplier applied to mix-input
//! contributions only (spec.md §4.7), independent of the voice
//! schedule's own fades.

/// Parameters for the mix-modulation curve, built from the CLI-ish
/// `d=<δ>:e=<ε>:k=<k>:E=<E>` spec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixModCurve {
    pub delta: f64,
    pub epsilon: f64,
    /// Oscillation half-period, in minutes.
    pub k_minutes: f64,
    /// End-of-main-phase gain level.
    pub end_level: f64,
    /// Main phase duration, in minutes.
    pub main_minutes: f64,
    /// Wake phase duration, in minutes (0 disables the wake phase).
    pub wake_minutes: f64,
}

impl MixModCurve {
    /// A curve that never attenuates the mix input (no `-m` modulation
    /// spec supplied).
    pub fn identity() -> Self {
        MixModCurve {
            delta: 0.0,
            epsilon: 0.0,
            k_minutes: 1.0,
            end_level: 1.0,
            main_minutes: f64::INFINITY,
            wake_minutes: 0.0,
        }
    }

    /// Evaluates the multiplier at `t_minutes` since the mix input
    /// began playing.
    pub fn gain(&self, t_minutes: f64) -> f64 {
        if t_minutes < self.main_minutes {
            self.main_phase_gain(t_minutes)
        } else if self.wake_minutes > 0.0 && t_minutes <= self.main_minutes + self.wake_minutes {
            self.wake_phase_gain(t_minutes)
        } else {
            1.0
        }
    }

    fn main_phase_gain(&self, t: f64) -> f64 {
        let period = 2.0 * self.k_minutes;
        let phase = if period > 0.0 { t.rem_euclid(period) } else { 0.0 };
        let centered = phase - self.k_minutes;
        let oscillation = 1.0 - self.delta * (-self.epsilon * centered * centered).exp();
        let ramp = if self.main_minutes.is_finite() && self.main_minutes > 0.0 {
            1.0 - (1.0 - self.end_level) / self.main_minutes * t
        } else {
            1.0
        };
        (oscillation * ramp).max(0.0)
    }

    fn wake_phase_gain(&self, t: f64) -> f64 {
        let elapsed = t - self.main_minutes;
        (1.0 - self.end_level) + (self.end_level / self.wake_minutes) * elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_curve_is_always_unity() {
        let c = MixModCurve::identity();
        assert_eq!(c.gain(0.0), 1.0);
        assert_eq!(c.gain(1000.0), 1.0);
    }

    #[test]
    fn worked_scenario_at_ten_minutes() {
        // d=0.3:e=0.3:k=10:E=0.7, T=30 min; at t=10 the multiplier is
        // (1 - 0.3*exp(0)) * (1 - 0.01*10) = 0.7 * 0.9 = 0.63.
        let c = MixModCurve {
            delta: 0.3,
            epsilon: 0.3,
            k_minutes: 10.0,
            end_level: 0.7,
            main_minutes: 30.0,
            wake_minutes: 0.0,
        };
        let g = c.gain(10.0);
        assert!((g - 0.63).abs() < 1e-9, "got {g}");
    }

    #[test]
    fn wake_phase_ramps_linearly_to_unity() {
        let c = MixModCurve {
            delta: 0.0,
            epsilon: 0.0,
            k_minutes: 10.0,
            end_level: 0.5,
            main_minutes: 10.0,
            wake_minutes: 5.0,
        };
        assert!((c.gain(10.0) - 0.5).abs() < 1e-9);
        assert!((c.gain(15.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn beyond_both_phases_returns_unity() {
        let c = MixModCurve {
            delta: 0.1,
            epsilon: 0.1,
            k_minutes: 1.0,
            end_level: 0.5,
            main_minutes: 1.0,
            wake_minutes: 1.0,
        };
        assert_eq!(c.gain(10.0), 1.0);
    }
}
