//! The circular period list and period compiler.
//!
//! Periods live in an arena (`Vec<PeriodNode>`) addressed by
//! [`PeriodId`] indices with `next`/`prev` fields, rather than as
//! `Rc<RefCell<..>>` doubly-linked nodes — this keeps the fix-up passes
//! (which freely rewrite neighbours while walking the list) free of
//! aliasing and lifetime bookkeeping.

use crate::error::{Result, SbagenError};
use crate::voice::{silent_voice_set, Voice, VoiceSet};

/// Milliseconds in a day; every period time is taken modulo this.
pub const H24: i64 = 86_400_000;

/// Default minimum length of a scheduler-inserted transitional period.
pub const DEFAULT_FADE_INT: i64 = 60_000;

/// Fade-in/out code attached to a user-supplied period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeCode {
    /// `<` / `>`: fade to/from silence.
    Silence,
    /// `-`: fade through like kinds.
    Through,
    /// `=`: slide (legal only when kinds and waveforms match).
    Slide,
    /// `->` sugar: unspecified-time slide transition, time inherited
    /// from the following period.
    UnspecifiedTransition,
}

/// Arena index of a period node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodId(pub u32);

/// One node of the circular period list.
#[derive(Debug, Clone)]
pub struct PeriodNode {
    /// Start time, ms since midnight, `0..H24`.
    pub time_ms: i64,
    /// Voice state in effect from this period's start.
    pub v0: VoiceSet,
    /// Voice state the period interpolates toward by its end.
    pub v1: VoiceSet,
    pub fade_in: FadeCode,
    pub fade_out: FadeCode,
    pub next: PeriodId,
    pub prev: PeriodId,
    /// True for scheduler-inserted transitional periods (never
    /// user-supplied); used by the redundant-midpoint removal pass.
    pub transitional: bool,
}

/// A single user-supplied schedule line, as produced by the parser.
#[derive(Debug, Clone)]
pub struct UserPeriod {
    pub time_ms: i64,
    pub fade_in: FadeCode,
    pub fade_out: FadeCode,
    pub voices: VoiceSet,
}

/// The compiled, circular period list plus the arena that backs it.
pub struct Scheduler {
    arena: Vec<PeriodNode>,
    head: PeriodId,
    fade_int: i64,
}

impl Scheduler {
    fn get(&self, id: PeriodId) -> &PeriodNode {
        &self.arena[id.0 as usize]
    }
    fn get_mut(&mut self, id: PeriodId) -> &mut PeriodNode {
        &mut self.arena[id.0 as usize]
    }

    fn push(&mut self, node: PeriodNode) -> PeriodId {
        let id = PeriodId(self.arena.len() as u32);
        self.arena.push(node);
        id
    }

    /// Builds and compiles a scheduler from a linear list of
    /// user-supplied periods (already parsed, already sorted by time).
    /// Implements spec.md §4.4 steps 1-6.
    pub fn compile(periods: Vec<UserPeriod>, fade_int: i64) -> Result<Scheduler> {
        if periods.is_empty() {
            return Err(SbagenError::config("sequence has no time-lines"));
        }

        let mut arena = Vec::with_capacity(periods.len() * 2);
        let n = periods.len();
        for (i, p) in periods.iter().enumerate() {
            let next = PeriodId(((i + 1) % n) as u32);
            let prev = PeriodId(((i + n - 1) % n) as u32);
            arena.push(PeriodNode {
                time_ms: p.time_ms,
                v0: p.voices,
                v1: p.voices,
                fade_in: p.fade_in,
                fade_out: p.fade_out,
                next,
                prev,
                transitional: false,
            });
        }
        let mut sched = Scheduler {
            arena,
            head: PeriodId(0),
            fade_int,
        };

        sched.resolve_unspecified_transitions()?;
        sched.validate_span()?;
        sched.insert_transitional_periods();
        sched.enforce_minimum_transition_length();
        sched.remove_redundant_midpoints();
        sched.validate_span()?;

        Ok(sched)
    }

    /// Step 1: a period whose fade-in is `UnspecifiedTransition`
    /// inherits its time from the period that follows it.
    fn resolve_unspecified_transitions(&mut self) -> Result<()> {
        let ids: Vec<PeriodId> = self.iter_ids().collect();
        for id in ids {
            if self.get(id).fade_in == FadeCode::UnspecifiedTransition {
                let next = self.get(id).next;
                let t = self.get(next).time_ms;
                self.get_mut(id).time_ms = t;
            }
        }
        Ok(())
    }

    fn iter_ids(&self) -> impl Iterator<Item = PeriodId> + '_ {
        let head = self.head;
        let mut current = Some(head);
        let mut first = true;
        std::iter::from_fn(move || match current {
            None => None,
            Some(id) => {
                if id == head && !first {
                    current = None;
                    None
                } else {
                    first = false;
                    let nxt = self.get(id).next;
                    current = Some(nxt);
                    Some(id)
                }
            }
        })
    }

    fn span_ms(&self, from: i64, to: i64) -> i64 {
        ((to - from) % H24 + H24) % H24
    }

    fn validate_span(&self) -> Result<()> {
        let mut total = 0i64;
        for id in self.iter_ids() {
            let next = self.get(id).next;
            total += self.span_ms(self.get(id).time_ms, self.get(next).time_ms);
        }
        if total > H24 {
            return Err(SbagenError::range(format!(
                "sequence total span {total} ms exceeds 24h"
            )));
        }
        Ok(())
    }

    /// Step 3: insert a transitional period at the midpoint of every
    /// gap between two user periods, with interpolated or silenced
    /// per-channel endpoints.
    fn insert_transitional_periods(&mut self) {
        let ids: Vec<PeriodId> = self.iter_ids().collect();
        for id in ids {
            let next = self.get(id).next;
            let t0 = self.get(id).time_ms;
            let t1 = self.get(next).time_ms;
            let span = self.span_ms(t0, t1);
            if span == 0 {
                continue;
            }
            let mid_time = (t0 + span / 2) % H24;

            let v0 = self.get(id).v1;
            let v1 = self.get(next).v0;
            let fade_out = self.get(id).fade_out;
            let fade_in = self.get(next).fade_in;

            let mut mid_v0 = silent_voice_set();
            let mut mid_v1 = silent_voice_set();
            let mut need_midpoint = false;

            for c in 0..16 {
                let a = v0[c];
                let b = v1[c];
                let silence_edge = fade_out == FadeCode::Silence || fade_in == FadeCode::Silence;
                let kind_changes = !a.kind.matches_kind(&b.kind);
                let waveform_changes = a.waveform != b.waveform;
                let pitch_changes_through =
                    fade_out == FadeCode::Through && (a.carrier_hz - b.carrier_hz).abs() > 1e-9;

                if silence_edge || kind_changes || waveform_changes || pitch_changes_through {
                    mid_v0[c] = Voice::off();
                    mid_v1[c] = Voice::off();
                    need_midpoint = true;
                } else {
                    // Slide: interpolate at the midpoint (r=0.5).
                    let mid = a.lerp(&b, 0.5);
                    mid_v0[c] = mid;
                    mid_v1[c] = mid;
                }
            }

            if !need_midpoint {
                // Every channel slides smoothly; no transitional period
                // is necessary, v1 of `id` already equals v0 of `next`.
                continue;
            }

            let trans = self.push(PeriodNode {
                time_ms: mid_time,
                v0: mid_v0,
                v1: mid_v1,
                fade_in: FadeCode::Through,
                fade_out: FadeCode::Through,
                next,
                prev: id,
                transitional: true,
            });
            self.get_mut(id).next = trans;
            self.get_mut(next).prev = trans;
        }
    }

    /// Step 2/continued: any transitional period shorter than
    /// `fade_int` steals equal halves from its non-transitional
    /// neighbours, clipped by those periods' own length.
    fn enforce_minimum_transition_length(&mut self) {
        let ids: Vec<PeriodId> = self.iter_ids().collect();
        for id in ids {
            if !self.get(id).transitional {
                continue;
            }
            let prev = self.get(id).prev;
            let next = self.get(id).next;
            let span = self.span_ms(self.get(prev).time_ms, self.get(next).time_ms);
            if span >= self.fade_int {
                continue;
            }
            let deficit = self.fade_int - span;
            let half = deficit / 2;

            let prev_prev = self.get(prev).prev;
            let prev_room = self.span_ms(self.get(prev_prev).time_ms, self.get(prev).time_ms) / 2;
            let steal_before = half.min(prev_room.max(0));

            let next_next = self.get(next).next;
            let next_room = self.span_ms(self.get(next).time_ms, self.get(next_next).time_ms) / 2;
            let steal_after = half.min(next_room.max(0));

            let new_time = (self.get(id).time_ms - steal_before + H24) % H24;
            self.get_mut(id).time_ms = new_time;

            let new_next_time = (self.get(next).time_ms + steal_after) % H24;
            self.get_mut(next).time_ms = new_next_time;
        }
    }

    /// Step 4: drop transitional periods whose v0 == v1 and whose
    /// neighbours already match, and step 5's duplicate collapsing.
    fn remove_redundant_midpoints(&mut self) {
        let ids: Vec<PeriodId> = self.iter_ids().collect();
        for id in ids {
            if !self.get(id).transitional {
                continue;
            }
            let node = self.get(id).clone();
            if node.v0 == node.v1 {
                let prev = node.prev;
                let next = node.next;
                if self.get(prev).v1 == node.v0 {
                    self.get_mut(prev).next = next;
                    self.get_mut(next).prev = prev;
                    if self.head == id {
                        self.head = next;
                    }
                }
            }
        }
    }

    /// Advances the current-period pointer so `now` lies within
    /// `[P.time, P.next.time)` (modulo 24h), then returns that period's
    /// id along with the interpolation ratio and interpolated voices.
    pub fn locate(&self, hint: PeriodId, now_ms: i64) -> (PeriodId, VoiceSet, f64) {
        let mut id = hint;
        loop {
            let next = self.get(id).next;
            let t0 = self.get(id).time_ms;
            let t1 = self.get(next).time_ms;
            let span = self.span_ms(t0, t1);
            let elapsed = self.span_ms(t0, now_ms);
            if span == 0 || elapsed < span || next == id {
                let r = if span == 0 {
                    0.0
                } else {
                    elapsed as f64 / span as f64
                };
                let voices = self.interpolate(id, r);
                return (id, voices, r);
            }
            id = next;
        }
    }

    fn interpolate(&self, id: PeriodId, r: f64) -> VoiceSet {
        let node = self.get(id);
        let mut out = silent_voice_set();
        for c in 0..16 {
            out[c] = node.v0[c].lerp(&node.v1[c], r);
        }
        out
    }

    pub fn head(&self) -> PeriodId {
        self.head
    }

    pub fn node(&self, id: PeriodId) -> &PeriodNode {
        self.get(id)
    }

    pub fn len(&self) -> usize {
        self.iter_ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceKind;

    fn binaural_voice(carrier: f64, beat: f64, amp: f64) -> Voice {
        Voice {
            kind: VoiceKind::Binaural,
            amplitude: amp,
            carrier_hz: carrier,
            beat_hz: beat,
            waveform: crate::voice::WaveformId::sine(),
        }
    }

    fn voices_with(v: Voice) -> VoiceSet {
        let mut vs = silent_voice_set();
        vs[0] = v;
        vs
    }

    #[test]
    fn two_period_schedule_inserts_transitional_period() {
        let periods = vec![
            UserPeriod {
                time_ms: 0,
                fade_in: FadeCode::Silence,
                fade_out: FadeCode::Through,
                voices: voices_with(binaural_voice(200.0, 10.0, 2048.0)),
            },
            UserPeriod {
                time_ms: 3_600_000,
                fade_in: FadeCode::Through,
                fade_out: FadeCode::Silence,
                voices: voices_with(binaural_voice(200.0, 4.0, 2048.0)),
            },
        ];
        let sched = Scheduler::compile(periods, DEFAULT_FADE_INT).unwrap();
        assert!(sched.len() >= 2);
    }

    #[test]
    fn total_span_over_24h_is_rejected() {
        let periods = vec![
            UserPeriod {
                time_ms: 0,
                fade_in: FadeCode::Silence,
                fade_out: FadeCode::Silence,
                voices: silent_voice_set(),
            },
            UserPeriod {
                time_ms: H24 - 1000,
                fade_in: FadeCode::Silence,
                fade_out: FadeCode::Silence,
                voices: silent_voice_set(),
            },
            UserPeriod {
                time_ms: 500,
                fade_in: FadeCode::Silence,
                fade_out: FadeCode::Silence,
                voices: silent_voice_set(),
            },
        ];
        // Deliberately out of chronological order so the wraparound
        // span sums past 24h; the parser is expected to sort in
        // practice, but the compiler must still catch a bad result.
        let result = Scheduler::compile(periods, DEFAULT_FADE_INT);
        assert!(result.is_err(), "a >24h total span must be rejected");
    }

    #[test]
    fn locate_picks_period_at_exact_boundary() {
        let periods = vec![
            UserPeriod {
                time_ms: 0,
                fade_in: FadeCode::Silence,
                fade_out: FadeCode::Through,
                voices: voices_with(binaural_voice(200.0, 10.0, 2048.0)),
            },
            UserPeriod {
                time_ms: 1_000_000,
                fade_in: FadeCode::Through,
                fade_out: FadeCode::Silence,
                voices: voices_with(binaural_voice(200.0, 4.0, 2048.0)),
            },
        ];
        let sched = Scheduler::compile(periods, 1000).unwrap();
        let (id, _, r) = sched.locate(sched.head(), 0);
        assert_eq!(id, sched.head());
        assert_eq!(r, 0.0);
    }
}
