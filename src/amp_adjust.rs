//! Piecewise-linear headphone-rolloff amplitude compensation table.
//!
//! Built from the embedder-parsed `-c freq,adj` points (CLI parsing
//! itself is out of scope here, per [`crate`]'s scope); this module only
//! evaluates the table, matching `ampAdjust()` in the original engine.

use crate::error::{Result, SbagenError};

/// One `freq,adj` compensation point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmpAdjustPoint {
    pub freq: f64,
    pub adj: f64,
}

/// A sorted piecewise-linear amplitude adjustment table. An empty table
/// (no `-c` option in use) leaves every frequency unadjusted.
#[derive(Debug, Clone, Default)]
pub struct AmpAdjustTable {
    points: Vec<AmpAdjustPoint>,
}

impl AmpAdjustTable {
    /// Builds a table from `-c` points, sorting by frequency. Rejects an
    /// empty point list as a configuration error (the embedder should
    /// simply not construct a table at all when `-c` wasn't supplied;
    /// use [`AmpAdjustTable::unity`] instead).
    pub fn new(mut points: Vec<AmpAdjustPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(SbagenError::config(
                "amplitude adjustment table requires at least one point",
            ));
        }
        points.sort_by(|a, b| a.freq.partial_cmp(&b.freq).unwrap());
        Ok(Self { points })
    }

    /// An empty table: every frequency adjusts to `1.0`, matching the
    /// original's `!opt_c` fast path.
    pub fn unity() -> Self {
        Self { points: Vec::new() }
    }

    /// Whether this table carries any `-c` points at all; callers use
    /// this to gate the per-ear adjustment and total-amplitude rescale
    /// that only run when `-c` is in use.
    pub fn is_enabled(&self) -> bool {
        !self.points.is_empty()
    }

    /// Evaluates the adjustment factor at `freq`, clamping to the
    /// table's endpoints outside its range and linearly interpolating
    /// inside it.
    pub fn adjust(&self, freq: f64) -> f64 {
        if self.points.is_empty() {
            return 1.0;
        }
        let first = self.points[0];
        if freq <= first.freq {
            return first.adj;
        }
        let last = *self.points.last().unwrap();
        if freq >= last.freq {
            return last.adj;
        }
        let idx = self.points.iter().position(|p| freq < p.freq).unwrap();
        let p0 = self.points[idx - 1];
        let p1 = self.points[idx];
        p0.adj + (p1.adj - p0.adj) * (freq - p0.freq) / (p1.freq - p0.freq)
    }

    /// Binaural total adjustment: the larger of the two ear-frequency
    /// adjustments, matching `sbagenx.c:4805-4807`.
    pub fn binaural_adjust(&self, carrier_hz: f64, beat_hz: f64) -> f64 {
        let adj1 = self.adjust(carrier_hz + beat_hz / 2.0);
        let adj2 = self.adjust(carrier_hz - beat_hz / 2.0);
        adj1.max(adj2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AmpAdjustTable {
        AmpAdjustTable::new(vec![
            AmpAdjustPoint {
                freq: 100.0,
                adj: 1.0,
            },
            AmpAdjustPoint {
                freq: 1000.0,
                adj: 2.0,
            },
            AmpAdjustPoint {
                freq: 10_000.0,
                adj: 0.5,
            },
        ])
        .unwrap()
    }

    #[test]
    fn unity_table_never_adjusts() {
        let t = AmpAdjustTable::unity();
        assert_eq!(t.adjust(40.0), 1.0);
        assert_eq!(t.adjust(20_000.0), 1.0);
    }

    #[test]
    fn clamps_below_and_above_range() {
        let t = table();
        assert_eq!(t.adjust(10.0), 1.0);
        assert_eq!(t.adjust(50_000.0), 0.5);
    }

    #[test]
    fn interpolates_linearly_between_points() {
        let t = table();
        assert_eq!(t.adjust(550.0), 1.5);
    }

    #[test]
    fn rejects_empty_point_list() {
        assert!(AmpAdjustTable::new(vec![]).is_err());
    }

    #[test]
    fn binaural_adjust_takes_the_larger_ear() {
        let t = table();
        // Carrier 1000, beat 1800 => ears at 1900 and 100.
        let adj = t.binaural_adjust(1000.0, 1800.0);
        assert_eq!(adj, t.adjust(100.0).max(t.adjust(1900.0)));
    }
}
