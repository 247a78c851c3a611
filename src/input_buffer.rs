//! Lock-free SPSC ring buffer between the decoder ("producer") thread
//! and the mixer ("consumer") thread, carrying interleaved 20-bit
//! stereo samples pulled from the embedder's `fill`/`read` closure
//! (spec.md §5).
//!
//! Capacity is a power of two so wraparound is a bit-mask, matching
//! `inbuf_*` in the original engine. The producer owns the write
//! cursor, the consumer owns the read cursor; only a one-shot EOF flag
//! crosses in the other direction. Both cursors are plain relaxed
//! atomics — no locks, per Design Notes §9.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SbagenError};

/// A pull-based decoder source: fills `dst` with up to `dst.len()`
/// interleaved 20-bit stereo samples, returning the number actually
/// written. Returning fewer than requested signals end of stream.
pub trait SampleSource: Send {
    fn fill(&mut self, dst: &mut [i32]) -> usize;
}

impl<F: FnMut(&mut [i32]) -> usize + Send> SampleSource for F {
    fn fill(&mut self, dst: &mut [i32]) -> usize {
        self(dst)
    }
}

struct Shared {
    buf: Vec<AtomicI32Cell>,
    mask: usize,
    rd: AtomicUsize,
    wr: AtomicUsize,
    eof: AtomicBool,
}

/// A single buffer slot. Plain `i32` behind a `UnsafeCell`-free atomic
/// wrapper would need unsafe; instead each slot is itself an
/// `AtomicUsize`-sized store via `AtomicI32`-equivalent using
/// `std::sync::atomic::AtomicI32` directly.
type AtomicI32Cell = std::sync::atomic::AtomicI32;

/// The producer-side handle: owns `wr`, writes samples, and sets EOF.
pub struct InputProducer {
    shared: Arc<Shared>,
}

/// The consumer-side handle: owns `rd`, reads samples.
pub struct InputBuffer {
    shared: Arc<Shared>,
}

/// Creates a power-of-two-capacity ring buffer (capacity in `i32`
/// samples, i.e. half the number of stereo frames) and its two
/// handles.
pub fn channel(capacity: usize) -> Result<(InputProducer, InputBuffer)> {
    if capacity == 0 || (capacity & (capacity - 1)) != 0 {
        return Err(SbagenError::config(
            "input buffer capacity must be a power of two",
        ));
    }
    let mut buf = Vec::with_capacity(capacity);
    for _ in 0..capacity {
        buf.push(AtomicI32Cell::new(0));
    }
    let shared = Arc::new(Shared {
        buf,
        mask: capacity - 1,
        rd: AtomicUsize::new(0),
        wr: AtomicUsize::new(0),
        eof: AtomicBool::new(false),
    });
    Ok((
        InputProducer {
            shared: shared.clone(),
        },
        InputBuffer { shared },
    ))
}

impl InputProducer {
    /// Free slots available to write right now.
    fn free(&self) -> usize {
        let rd = self.shared.rd.load(Ordering::Acquire);
        let wr = self.shared.wr.load(Ordering::Relaxed);
        (rd.wrapping_sub(1).wrapping_sub(wr)) & self.shared.mask
    }

    /// Writes up to `src.len()` samples without blocking, returning how
    /// many were actually written (may be less than a full buffer's
    /// worth of free space if `src` is shorter).
    pub fn write(&self, src: &[i32]) -> usize {
        let free = self.free().min(src.len());
        let wr = self.shared.wr.load(Ordering::Relaxed);
        for (i, &sample) in src.iter().take(free).enumerate() {
            let idx = (wr + i) & self.shared.mask;
            self.shared.buf[idx].store(sample, Ordering::Relaxed);
        }
        if free > 0 {
            self.shared
                .wr
                .store((wr + free) & self.shared.mask, Ordering::Release);
        }
        free
    }

    /// Marks end of stream. One-shot; idempotent.
    pub fn set_eof(&self) {
        self.shared.eof.store(true, Ordering::Release);
    }

    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }
}

/// Drives a [`SampleSource`] into an [`InputProducer`] in
/// `capacity/8`-sized chunks, sleeping `1 + cycle_ms/4` ms when the
/// buffer is more than 7/8 full, matching `inbuf_loop`'s cadence. A
/// stall of more than 10 seconds without progress is a fatal resource
/// error, matching the original's watchdog.
pub fn fill_loop(
    mut source: impl SampleSource,
    producer: InputProducer,
    cycle_ms: u64,
) -> Result<()> {
    let chunk = (producer.capacity() / 8).max(1);
    let mut waited_ms: u64 = 0;
    let mut scratch = vec![0i32; chunk];
    loop {
        let free = producer.free();
        if free < chunk {
            if waited_ms > 10_000 + cycle_ms {
                return Err(SbagenError::resource(
                    "mix stream halted for more than 10 seconds; aborting",
                ));
            }
            let sleep_ms = 1 + cycle_ms / 4;
            std::thread::sleep(Duration::from_millis(sleep_ms));
            waited_ms += sleep_ms;
            continue;
        }
        waited_ms = 0;
        let n = source.fill(&mut scratch[..chunk]);
        if n == 0 {
            producer.set_eof();
            return Ok(());
        }
        let written = producer.write(&scratch[..n]);
        debug_assert_eq!(written, n);
        if n < chunk {
            producer.set_eof();
            return Ok(());
        }
    }
}

impl InputBuffer {
    /// Samples available to read right now.
    fn available(&self) -> usize {
        let wr = self.shared.wr.load(Ordering::Acquire);
        let rd = self.shared.rd.load(Ordering::Relaxed);
        (wr.wrapping_sub(rd)) & self.shared.mask
    }

    /// Reads up to `dst.len()` samples, blocking (via short sleeps)
    /// until that many are available unless EOF is reached first, in
    /// which case it returns whatever was available (possibly zero),
    /// matching `inbuf_read`'s "drain what remains" EOF behavior.
    pub fn read_into(&self, dst: &mut [i32]) -> usize {
        let mut filled = 0usize;
        let mut waited_ms: u64 = 0;
        while filled < dst.len() {
            let avail = self.available().min(dst.len() - filled);
            if avail == 0 {
                if self.shared.eof.load(Ordering::Acquire) {
                    return filled;
                }
                std::thread::sleep(Duration::from_millis(1));
                waited_ms += 1;
                if waited_ms > 10_000 {
                    return filled;
                }
                continue;
            }
            waited_ms = 0;
            let rd = self.shared.rd.load(Ordering::Relaxed);
            for i in 0..avail {
                let idx = (rd + i) & self.shared.mask;
                dst[filled + i] = self.shared.buf[idx].load(Ordering::Relaxed);
            }
            self.shared
                .rd
                .store((rd + avail) & self.shared.mask, Ordering::Release);
            filled += avail;
        }
        filled
    }

    pub fn is_eof(&self) -> bool {
        self.shared.eof.load(Ordering::Acquire) && self.available() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_capacity() {
        assert!(channel(100).is_err());
        assert!(channel(128).is_ok());
    }

    #[test]
    fn write_then_read_round_trips_samples() {
        let (producer, consumer) = channel(16).unwrap();
        let src = [1, 2, 3, 4, 5, 6];
        assert_eq!(producer.write(&src), 6);
        let mut dst = [0i32; 6];
        assert_eq!(consumer.read_into(&mut dst), 6);
        assert_eq!(dst, src);
    }

    #[test]
    fn write_is_capped_by_free_space() {
        let (producer, _consumer) = channel(4).unwrap();
        let src = [1, 2, 3, 4, 5, 6];
        // One slot is always reserved (rd-1-wr), so usable capacity is 3.
        let written = producer.write(&src);
        assert_eq!(written, 3);
    }

    #[test]
    fn eof_drains_remaining_then_reports_done() {
        let (producer, consumer) = channel(8).unwrap();
        producer.write(&[10, 20]);
        producer.set_eof();
        let mut dst = [0i32; 4];
        let n = consumer.read_into(&mut dst);
        assert_eq!(n, 2);
        assert_eq!(&dst[..2], &[10, 20]);
        assert!(consumer.is_eof());
    }

    #[test]
    fn fill_loop_stops_cleanly_on_short_read() {
        let mut calls = 0;
        let source = move |dst: &mut [i32]| {
            calls += 1;
            if calls == 1 {
                for (i, s) in dst.iter_mut().enumerate() {
                    *s = i as i32;
                }
                dst.len()
            } else {
                0
            }
        };
        let (producer, consumer) = channel(64).unwrap();
        fill_loop(source, producer, 100).unwrap();
        assert!(consumer.is_eof() || consumer.available() > 0);
    }
}
