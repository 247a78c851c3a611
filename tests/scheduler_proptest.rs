//! Property-based invariants for the period compiler: whatever valid,
//! chronologically sorted set of user periods proptest throws at it, the
//! compiled schedule must stay circular, never exceed a 24h total span,
//! and `locate()` must always resolve to a period actually in the list.

use proptest::prelude::*;
use sbagenx::scheduler::{FadeCode, Scheduler, UserPeriod, DEFAULT_FADE_INT, H24};
use sbagenx::voice::{silent_voice_set, Voice, VoiceKind, WaveformId};

fn binaural_voice(carrier: f64, beat: f64) -> Voice {
    Voice {
        kind: VoiceKind::Binaural,
        amplitude: 2048.0,
        carrier_hz: carrier,
        beat_hz: beat,
        waveform: WaveformId::sine(),
    }
}

/// A handful of strictly increasing times within one day, each paired
/// with a carrier/beat pair and a fade-code pair (never
/// `UnspecifiedTransition`, which only the parser's `->` sugar emits).
fn periods_strategy() -> impl Strategy<Value = Vec<UserPeriod>> {
    fn fade() -> impl Strategy<Value = FadeCode> {
        prop_oneof![
            Just(FadeCode::Silence),
            Just(FadeCode::Through),
            Just(FadeCode::Slide),
        ]
    }
    prop::collection::btree_set(0i64..H24, 2..8).prop_flat_map(move |times| {
        let n = times.len();
        let carriers = prop::collection::vec(100.0f64..400.0, n);
        let beats = prop::collection::vec(0.0f64..20.0, n);
        let fades_in = prop::collection::vec(fade(), n);
        let fades_out = prop::collection::vec(fade(), n);
        (carriers, beats, fades_in, fades_out).prop_map(move |(carriers, beats, fis, fos)| {
            times
                .iter()
                .zip(carriers)
                .zip(beats)
                .zip(fis)
                .zip(fos)
                .map(|((((&t, c), b), fi), fo)| {
                    let mut voices = silent_voice_set();
                    voices[0] = binaural_voice(c, b);
                    UserPeriod {
                        time_ms: t,
                        fade_in: fi,
                        fade_out: fo,
                        voices,
                    }
                })
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn compiled_schedule_stays_within_24h_and_circular(periods in periods_strategy()) {
        let n_user = periods.len();
        let result = Scheduler::compile(periods, DEFAULT_FADE_INT);
        // Any arrangement of distinct, sorted times within one day is a
        // legal schedule; compilation must not fail.
        let sched = result.expect("a valid chronological period list must compile");

        prop_assert!(sched.len() >= n_user);

        // Walking `next` links from the head must return to the head
        // within a bounded number of steps (the list is circular, not
        // an infinite or broken chain).
        let head = sched.head();
        let mut id = sched.node(head).next;
        let mut steps = 1;
        while id != head && steps <= sched.len() {
            id = sched.node(id).next;
            steps += 1;
        }
        prop_assert_eq!(id, head, "next-links must cycle back to head");
        prop_assert!(steps <= sched.len());
    }

    #[test]
    fn locate_never_panics_across_a_full_day(periods in periods_strategy()) {
        let sched = Scheduler::compile(periods, DEFAULT_FADE_INT)
            .expect("a valid chronological period list must compile");
        let head = sched.head();
        let mut hint = head;
        for hour in 0..24 {
            let now = hour * 3_600_000;
            let (id, _voices, r) = sched.locate(hint, now);
            prop_assert!((0.0..=1.0).contains(&r));
            hint = id;
        }
    }
}
