//! Randomized segment-crossfade looper for mix-input audio.
//!
//! When a mix-in source is shorter than the schedule that plays over it,
//! this engine builds an endless stream out of it by picking
//! randomly-sized, randomly-positioned segments of the source and
//! crossfading between two (or three, in channel-alternating mode)
//! overlapping playback heads. It never repeats the same splice twice
//! in a row because segment placement and length are both drawn from a
//! PRNG seeded at startup.
//!
//! The scheduling and mixing logic, the PRNG, and the crossfade envelope
//! are all fixed-point integer arithmetic matching the original engine
//! bit for bit, so a looped source sounds identical to a reference
//! decode given the same seed.

use crate::error::{Result, SbagenError};

/// Seeded ZX-Spectrum-style linear congruential generator: the same
/// `seed = (1+seed)*75 mod 65537 - 1` recurrence the original engine
/// uses for segment placement, so two runs with the same seed produce
/// the same splice sequence.
#[derive(Debug, Clone, Copy)]
pub struct ZxRand {
    seed: u16,
}

impl ZxRand {
    pub fn new(seed: u16) -> Self {
        ZxRand { seed }
    }

    fn next_0_65536(&mut self) -> i32 {
        let v = (1 + self.seed as i64) * 75 % 65537 - 1;
        self.seed = v as u16;
        self.seed as i32
    }

    /// Uniform value in `0..mult`.
    fn next_0(&mut self, mult: i32) -> i32 {
        (((mult as i64) * self.next_0_65536() as i64) >> 16) as i32
    }

    /// Uniform value in `r0..r1`, or `r0` if the range is empty.
    pub fn range(&mut self, r0: i32, r1: i32) -> i32 {
        if r1 <= r0 {
            r0
        } else {
            r0 + self.next_0(r1 - r0)
        }
    }

    /// Draws from a concatenation of ranges, clamped to the most recent
    /// [`RangeSpec::Outer`] bound, weighted by each range's width.
    /// Returns `def` if every range is empty after clamping.
    fn ranges(&mut self, def: i32, specs: &[RangeSpec]) -> i32 {
        let mut olo = i32::MIN;
        let mut ohi = i32::MAX;
        let mut total: i64 = 0;
        for spec in specs {
            match *spec {
                RangeSpec::Outer(lo, hi) => {
                    olo = lo;
                    ohi = hi;
                }
                RangeSpec::Range(lo, hi) => {
                    let lo = lo.max(olo);
                    let hi = hi.min(ohi);
                    if hi > lo {
                        total += (hi - lo) as i64;
                    }
                }
            }
        }
        if total == 0 {
            return def;
        }
        let mut val = self.next_0(total as i32) as i64;

        let mut olo = i32::MIN;
        let mut ohi = i32::MAX;
        for spec in specs {
            match *spec {
                RangeSpec::Outer(lo, hi) => {
                    olo = lo;
                    ohi = hi;
                }
                RangeSpec::Range(lo, hi) => {
                    let lo = lo.max(olo);
                    let hi = hi.min(ohi);
                    let width = (hi - lo) as i64;
                    if width > 0 {
                        if val < width {
                            return lo + val as i32;
                        }
                        val -= width;
                    }
                }
            }
        }
        def
    }
}

#[derive(Debug, Clone, Copy)]
enum RangeSpec {
    /// Clamps every following `Range` to `lo..hi` until the next `Outer`.
    Outer(i32, i32),
    Range(i32, i32),
}

/// Parsed `SBAGEN_LOOPER`-equivalent configuration: segment sizing,
/// fade length, the usable span of source samples, and channel-swap
/// behavior. Units are sample frames, converted from the seconds-based
/// flag syntax at parse time.
#[derive(Debug, Clone, Copy)]
pub struct LooperConfig {
    pub seg0: i32,
    pub seg1: i32,
    pub datbase: i32,
    pub datcnt: i32,
    pub fade_cnt: i32,
    pub ch2: bool,
    pub ch2_swap: bool,
    pub intro: bool,
}

impl LooperConfig {
    /// Parses a looper flag string (the whitespace-separated
    /// `i`/`s<val>`/`s<val>-<val>`/`d<val>`/`d<val>-<val>`/`f<val>`/
    /// `c<val>`/`w<val>`/`#<val>` syntax) against a source of `datcnt0`
    /// frames sampled at `datrate` frames/sec. `mix_cnt` selects which
    /// `#`-gated block of flags applies (the nth mix-in source), matching
    /// `flac_looper_init`'s per-source flag gating.
    pub fn parse(spec: &str, datcnt0: i32, datrate: i32, mix_cnt: i32) -> Result<Self> {
        let mix_cnt = mix_cnt.max(0);
        let bytes = spec.as_bytes();
        let mut pos = 0usize;
        let mut intro = false;

        if pos < bytes.len() && bytes[pos] == b'i' {
            if pos + 1 < bytes.len() && (bytes[pos + 1] as char).is_whitespace() {
                intro = true;
            } else {
                log::warn!("Ignoring SBAGEN_LOOPER intro flag: 'i' must be followed by whitespace");
            }
            pos += 1;
        }

        let mut datcnt = datcnt0;
        let mut datbase = 0i32;
        let mut seg0 = datcnt;
        let mut seg1 = datcnt;
        let mut fade_cnt = datrate;
        let mut ch2 = false;
        let mut ch2_swap = true;
        let mut on = true;
        let mut prev_flag = 0u8;

        while pos < bytes.len() {
            let mut flag = bytes[pos];
            pos += 1;
            if (flag as char).is_whitespace() {
                continue;
            }
            if !b"s-fcwd#".contains(&flag) {
                log::warn!("Bad SBAGEN_LOOPER flag: {}", flag as char);
                continue;
            }
            if flag == b'-' {
                flag = match prev_flag {
                    b's' => b'S',
                    b'd' => b'D',
                    _ => {
                        log::warn!("SBAGEN_LOOPER '-' found not in form s<val>-<val>");
                        continue;
                    }
                };
            }
            prev_flag = flag;

            let (val, next_pos) = match parse_float(bytes, pos) {
                Some(v) => v,
                None => {
                    log::warn!("Bad SBAGEN_LOOPER value for flag '{}'", flag as char);
                    continue;
                }
            };
            pos = next_pos;

            if flag == b'#' {
                on = (val as i32) == mix_cnt;
            } else if on {
                match flag {
                    b's' => {
                        seg0 = (val * datrate as f64) as i32;
                        seg1 = seg0;
                    }
                    b'S' => seg1 = (val * datrate as f64) as i32,
                    b'd' => {
                        datbase = (val * datrate as f64) as i32;
                        datcnt = datcnt0 - datbase;
                    }
                    b'D' => datcnt = (val * datrate as f64) as i32 - datbase,
                    b'f' => fade_cnt = (val * datrate as f64) as i32,
                    b'c' => ch2 = val > 1.5,
                    b'w' => ch2_swap = val > 0.5,
                    _ => {}
                }
            }
        }

        if fade_cnt < datrate / 50 {
            fade_cnt = datrate / 50;
        }
        if datcnt + datbase > datcnt0 {
            datcnt = datcnt0 - datbase;
        }
        if datcnt < 0 {
            return Err(SbagenError::config(
                "source data range invalid in looper settings",
            ));
        }
        if datcnt <= 3 * fade_cnt {
            return Err(SbagenError::config(format!(
                "length of source data ({:.2}s) too short for fade length of {:.2}s",
                datcnt as f64 / datrate as f64,
                fade_cnt as f64 / datrate as f64
            )));
        }
        if seg0 > datcnt {
            seg0 = datcnt;
        }
        if seg1 > datcnt {
            seg1 = datcnt;
        }
        if seg0 > seg1 {
            seg0 = seg1;
        }
        if seg0 < 3 * fade_cnt {
            seg0 = 3 * fade_cnt;
            log::warn!("SBAGEN_LOOPER segment size too short for fade length; adjusted");
        }
        if seg1 < seg0 {
            seg1 = seg0;
        }

        Ok(LooperConfig {
            seg0,
            seg1,
            datbase,
            datcnt,
            fade_cnt,
            ch2,
            ch2_swap,
            intro,
        })
    }
}

fn parse_float(bytes: &[u8], start: usize) -> Option<(f64, usize)> {
    let n = bytes.len();
    let mut i = start;
    if i < n && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut saw_digit = false;
    while i < n && bytes[i].is_ascii_digit() {
        i += 1;
        saw_digit = true;
    }
    if i < n && bytes[i] == b'.' {
        i += 1;
        while i < n && bytes[i].is_ascii_digit() {
            i += 1;
            saw_digit = true;
        }
    }
    if !saw_digit {
        return None;
    }
    if i < n && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < n && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let mut saw_exp_digit = false;
        while j < n && bytes[j].is_ascii_digit() {
            j += 1;
            saw_exp_digit = true;
        }
        if saw_exp_digit {
            i = j;
        }
    }
    std::str::from_utf8(&bytes[start..i])
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|v| (v, i))
}

/// One of up to three concurrently-playing splice heads. `mode` walks
/// `0` (idle) -> `1` (scheduled, silent, waiting for its predecessor to
/// start fading out) -> `2` (fading in) -> `3` (full amplitude) -> `4`
/// (fading out) -> `0`.
#[derive(Debug, Clone, Copy, Default)]
struct Stream {
    off: i32,
    src: i32,
    chan: i32,
    mode: u8,
    cnt: i32,
    cnt_all: i32,
    amp: u32,
    del: u32,
}

impl Stream {
    /// Frames remaining until this stream reaches its own end, counting
    /// through whichever mode it's currently in.
    fn cnt_to_end(&self, fade_cnt: i32) -> i32 {
        match self.mode {
            1 => self.cnt_all + self.cnt,
            2 => self.cnt_all - fade_cnt + self.cnt,
            3 => fade_cnt + self.cnt,
            4 => self.cnt,
            _ => 0,
        }
    }
}

/// The looper: a fixed bank of decoded source samples plus the
/// two-or-three-stream splice scheduler that reads an endless,
/// crossfaded stream out of it.
pub struct Looper {
    config: LooperConfig,
    pcm: Vec<i16>,
    datcnt0: i32,
    mult: i32,
    del_amp: u32,
    streams: [Stream; 3],
    rng: ZxRand,
    intro_cnt: i32,
    intro_pos: i32,
    intro_first_seg: bool,
}

impl Looper {
    /// Builds a looper over `pcm` (interleaved stereo samples, `2 *
    /// datcnt0` entries long), scaling every output sample by `mult`
    /// (typically the output volume level) and seeding the splice PRNG
    /// with `seed`.
    pub fn new(config: LooperConfig, pcm: Vec<i16>, mult: i32, seed: u16) -> Result<Self> {
        let datcnt0 = (pcm.len() / 2) as i32;
        if config.fade_cnt <= 0 {
            return Err(SbagenError::config("looper fade length must be positive"));
        }
        let mut del_amp = u32::MAX / config.fade_cnt as u32;
        if (del_amp as u64) * (config.fade_cnt as u64) < 0xF000_0000 {
            return Err(SbagenError::config(
                "internal rounding error computing looper fade delta",
            ));
        }
        if config.ch2 {
            del_amp >>= 1;
        }

        let intro_cnt = if config.intro && config.datbase > 0 {
            config.datbase
        } else {
            if config.intro {
                log::warn!(
                    "SBAGEN_LOOPER intro requested, but d-start is not positive; ignoring intro"
                );
            }
            0
        };

        let mut looper = Looper {
            config,
            pcm,
            datcnt0,
            mult,
            del_amp,
            streams: [Stream::default(); 3],
            rng: ZxRand::new(seed),
            intro_cnt,
            intro_pos: 0,
            intro_first_seg: intro_cnt > 0,
        };
        if looper.intro_cnt == 0 {
            looper.sched()?;
        }
        Ok(looper)
    }

    fn sched(&mut self) -> Result<()> {
        if self.config.ch2 {
            self.sched_three()
        } else {
            self.sched_two();
            Ok(())
        }
    }

    fn sched_two(&mut self) {
        loop {
            let (mut ai, mut bi) = (0usize, 1usize);
            if self.streams[ai].mode != 0 && self.streams[bi].mode != 0 {
                break;
            }
            if self.streams[bi].mode != 0 && self.streams[ai].mode == 0 {
                std::mem::swap(&mut ai, &mut bi);
            }
            let aa_active = self.streams[ai].mode != 0;
            let fade_cnt = self.config.fade_cnt;

            {
                let bb = &mut self.streams[bi];
                bb.off = -1;
                bb.mode = 1;
                bb.cnt = 0;
                bb.amp = 0;
                bb.src = self.config.datbase;
            }

            if aa_active {
                let end = self.streams[ai].cnt_to_end(fade_cnt);
                self.streams[bi].cnt = (end - fade_cnt).max(0);
            }

            let cnt_all = self.rng.range(self.config.seg0, self.config.seg1 + 1);
            self.streams[bi].cnt_all = cnt_all;

            if !aa_active && self.intro_first_seg {
                let bb = &mut self.streams[bi];
                bb.off = 0;
                bb.mode = 3;
                bb.cnt = cnt_all - fade_cnt;
                bb.amp = 0xFFFF_FFFF;
                bb.del = 0;
                self.intro_first_seg = false;
            }

            if aa_active {
                let aa_off = self.streams[ai].off;
                let aa_cnt_all = self.streams[ai].cnt_all;
                let off = self.rng.ranges(
                    -1,
                    &[
                        RangeSpec::Range(0, aa_off - cnt_all),
                        RangeSpec::Range(aa_off + aa_cnt_all, self.config.datcnt - cnt_all),
                    ],
                );
                self.streams[bi].off = off;
            }
            if self.streams[bi].off < 0 {
                self.streams[bi].off = self.rng.range(0, self.config.datcnt - cnt_all);
            }
            self.streams[bi].src = self.config.datbase + self.streams[bi].off;
        }
    }

    fn sched_three(&mut self) -> Result<()> {
        loop {
            let (mut ai, mut bi, mut ci) = (0usize, 1usize, 2usize);
            if self.streams[ai].mode != 0 && self.streams[bi].mode != 0 && self.streams[ci].mode != 0
            {
                break;
            }
            if self.streams[ai].mode == 0 && self.streams[bi].mode != 0 {
                std::mem::swap(&mut ai, &mut bi);
            }
            if self.streams[ai].mode == 0 && self.streams[ci].mode != 0 {
                std::mem::swap(&mut ai, &mut ci);
            }
            if self.streams[bi].mode == 0 && self.streams[ci].mode != 0 {
                std::mem::swap(&mut bi, &mut ci);
            }
            let aa_active = self.streams[ai].mode != 0;

            if self.streams[bi].mode == 0 {
                let aa_chan = self.streams[ai].chan;
                {
                    let bb = &mut self.streams[bi];
                    bb.chan = if aa_active { 1 - aa_chan } else { 0 };
                    bb.off = -1;
                    bb.mode = 1;
                    bb.amp = 0;
                    bb.cnt = 0;
                    bb.src = self.config.datbase;
                }

                let fade_cnt = self.config.fade_cnt;
                let seg0 = self.config.seg0;
                let seg1 = self.config.seg1;
                let cnt_all = if !aa_active {
                    self.rng.range(seg0, seg1 + 1)
                } else {
                    let end = self.streams[ai].cnt_to_end(fade_cnt);
                    let picked = self.rng.ranges(
                        -1,
                        &[
                            RangeSpec::Outer(seg0, seg1 + 1),
                            RangeSpec::Range(seg0, end - fade_cnt),
                            RangeSpec::Range(end + fade_cnt, seg1 + 1),
                        ],
                    );
                    if picked < 0 {
                        self.streams[bi].cnt = end + fade_cnt - seg1;
                        seg1
                    } else {
                        picked
                    }
                };
                self.streams[bi].cnt_all = cnt_all;
                if self.streams[bi].cnt < 0 {
                    self.streams[bi].cnt = 0;
                }

                if !aa_active && self.intro_first_seg {
                    let bb = &mut self.streams[bi];
                    bb.off = 0;
                    bb.mode = 3;
                    bb.cnt = cnt_all - fade_cnt;
                    bb.amp = 0xFFFF_FFFF;
                    bb.del = 0;
                    self.intro_first_seg = false;
                }

                if aa_active {
                    let aa_off = self.streams[ai].off;
                    let aa_cnt_all = self.streams[ai].cnt_all;
                    let off = self.rng.ranges(
                        -1,
                        &[
                            RangeSpec::Range(0, aa_off - cnt_all),
                            RangeSpec::Range(aa_off + aa_cnt_all, self.config.datcnt - cnt_all),
                        ],
                    );
                    self.streams[bi].off = off;
                }
                if self.streams[bi].off < 0 {
                    self.streams[bi].off = self.rng.range(0, self.config.datcnt - cnt_all);
                }
                self.streams[bi].src = self.config.datbase + self.streams[bi].off;
                continue;
            }

            if self.streams[ai].chan == self.streams[bi].chan {
                return Err(SbagenError::resource(
                    "looper scheduler paired two streams on the same channel",
                ));
            }

            let fade_cnt = self.config.fade_cnt;
            let (ai, bi) = if self.streams[ai].cnt_to_end(fade_cnt) > self.streams[bi].cnt_to_end(fade_cnt)
            {
                (bi, ai)
            } else {
                (ai, bi)
            };

            let a_chan = self.streams[ai].chan;
            let a_end = self.streams[ai].cnt_to_end(fade_cnt);
            {
                let cc = &mut self.streams[ci];
                cc.chan = a_chan;
                cc.cnt = a_end - fade_cnt;
                cc.off = -1;
                cc.mode = 1;
                cc.amp = 0;
                cc.src = self.config.datbase;
            }

            let cc_cnt = self.streams[ci].cnt;
            let b_end = self.streams[bi].cnt_to_end(fade_cnt);
            let end = b_end - cc_cnt;
            let seg0 = self.config.seg0;
            let seg1 = self.config.seg1;
            let picked = self.rng.ranges(
                -1,
                &[
                    RangeSpec::Outer(seg0, seg1 + 1),
                    RangeSpec::Range(seg0, end - fade_cnt),
                    RangeSpec::Range(end + fade_cnt, seg1 + 1),
                ],
            );
            let cnt_all = if picked < 0 {
                if end - fade_cnt > fade_cnt * 2 {
                    end - fade_cnt
                } else {
                    end + fade_cnt
                }
            } else {
                picked
            };
            self.streams[ci].cnt_all = cnt_all;

            let (mut r0, mut r1) = (self.streams[ai].off, self.streams[ai].off + self.streams[ai].cnt_all);
            let (mut r2, mut r3) = (self.streams[bi].off, self.streams[bi].off + self.streams[bi].cnt_all);
            if r0 > r2 {
                std::mem::swap(&mut r0, &mut r2);
                std::mem::swap(&mut r1, &mut r3);
            }
            let off = self.rng.ranges(
                -1,
                &[
                    RangeSpec::Range(0, r0 - cnt_all),
                    RangeSpec::Range(r1, r2 - cnt_all),
                    RangeSpec::Range(r3, self.config.datcnt - cnt_all),
                ],
            );
            self.streams[ci].off = if off < 0 {
                self.rng.range(0, self.config.datcnt - cnt_all)
            } else {
                off
            };
            self.streams[ci].src = self.config.datbase + self.streams[ci].off;
        }
        Ok(())
    }

    /// Renders an endless crossfaded stream into `dst`, additively
    /// mixing onto whatever is already there (matching the original's
    /// accumulate-into-output-buffer convention). `dst` holds interleaved
    /// stereo samples, so its length must be even.
    pub fn read(&mut self, dst: &mut [i32]) -> Result<()> {
        debug_assert_eq!(dst.len() % 2, 0);
        for s in dst.iter_mut() {
            *s = 0;
        }
        let dlen = dst.len();
        let mut pos = 0usize;

        while pos < dlen {
            let mut resched = false;

            if self.intro_cnt > 0 {
                let remaining_frames = (dlen - pos) / 2;
                let intro_len = remaining_frames.min(self.intro_cnt as usize);
                for a in 0..intro_len {
                    let off = (self.intro_pos as usize + a) * 2;
                    dst[pos + a * 2] += self.pcm[off] as i32 * self.mult;
                    dst[pos + a * 2 + 1] += self.pcm[off + 1] as i32 * self.mult;
                }
                pos += intro_len * 2;
                self.intro_pos += intro_len as i32;
                self.intro_cnt -= intro_len as i32;
                if self.intro_cnt == 0 {
                    self.sched()?;
                }
                continue;
            }

            let mut len = (dlen - pos) / 2;
            for s in &self.streams {
                if s.mode != 0 && (s.cnt as usize) < len {
                    len = s.cnt as usize;
                }
            }

            for idx in 0..3 {
                if self.streams[idx].mode == 0 {
                    continue;
                }
                let mut cnt = len as i32;
                let mut dpos = pos;
                while cnt > 0 {
                    if self.streams[idx].mode == 1 {
                        self.streams[idx].cnt -= cnt;
                        cnt = 0;
                        continue;
                    }

                    let src = self.streams[idx].src;
                    let (l, r) = if src >= 0 && src < self.datcnt0 {
                        let off = src as usize * 2;
                        (self.pcm[off] as i32, self.pcm[off + 1] as i32)
                    } else {
                        (0, 0)
                    };

                    let amp_half = (!self.streams[idx].amp) >> 16;
                    let env = (!(amp_half.wrapping_mul(amp_half))) >> 21;
                    let env = env.wrapping_mul(self.mult as u32);

                    let chan = self.streams[idx].chan != 0;
                    if chan && self.config.ch2_swap {
                        dst[dpos] += mix_sample(r, env);
                        dst[dpos + 1] += mix_sample(l, env);
                    } else {
                        dst[dpos] += mix_sample(l, env);
                        dst[dpos + 1] += mix_sample(r, env);
                    }

                    dpos += 2;
                    self.streams[idx].amp = self.streams[idx].amp.wrapping_add(self.streams[idx].del);
                    self.streams[idx].cnt -= 1;
                    self.streams[idx].src += 1;
                    cnt -= 1;
                }

                if self.streams[idx].cnt == 0 {
                    match self.streams[idx].mode {
                        1 => {
                            self.streams[idx].mode = 2;
                            self.streams[idx].cnt = self.config.fade_cnt;
                            self.streams[idx].del = self.del_amp;
                        }
                        2 => {
                            self.streams[idx].mode = 3;
                            self.streams[idx].cnt = self.streams[idx].cnt_all - 2 * self.config.fade_cnt;
                            self.streams[idx].del = 0;
                        }
                        3 => {
                            self.streams[idx].mode = 4;
                            self.streams[idx].cnt = self.config.fade_cnt;
                            self.streams[idx].del = 0u32.wrapping_sub(self.del_amp);
                        }
                        4 => {
                            self.streams[idx].mode = 0;
                            resched = true;
                        }
                        _ => {}
                    }
                }
            }

            pos += len * 2;
            if resched {
                self.sched()?;
            }
        }
        Ok(())
    }
}

/// `(int)(sample * amp) >> 11`: wraps the product in 32-bit space and
/// arithmetic-shifts it back down, matching the original's implicit
/// unsigned-then-reinterpreted-signed cast.
fn mix_sample(sample: i32, amp: u32) -> i32 {
    (((sample as u32).wrapping_mul(amp)) as i32) >> 11
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn tone_pcm(frames: usize) -> Vec<i16> {
        let mut pcm = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let v = ((i % 200) as i32 - 100) as i16 * 300;
            pcm.push(v);
            pcm.push(-v);
        }
        pcm
    }

    #[test]
    fn zxrand_recurrence_matches_known_sequence() {
        let mut rng = ZxRand::new(1);
        let first = rng.next_0_65536();
        assert_eq!(first, (1 + 1) * 75 % 65537 - 1);
    }

    #[test]
    fn range_returns_lo_for_empty_range() {
        let mut rng = ZxRand::new(42);
        assert_eq!(rng.range(10, 10), 10);
        assert_eq!(rng.range(10, 5), 10);
    }

    #[test]
    fn range_stays_within_bounds() {
        let mut rng = ZxRand::new(7);
        for _ in 0..200 {
            let v = rng.range(5, 15);
            assert!((5..15).contains(&v));
        }
    }

    #[test]
    fn config_defaults_cover_whole_source_with_one_second_fade() {
        let cfg = LooperConfig::parse("", 441_000, 44_100, 0).unwrap();
        assert_eq!(cfg.datcnt, 441_000);
        assert_eq!(cfg.fade_cnt, 44_100);
        assert_eq!(cfg.seg0, 441_000);
        assert_eq!(cfg.seg1, 441_000);
        assert!(!cfg.ch2);
    }

    #[test]
    fn config_parses_segment_and_fade_flags() {
        let cfg = LooperConfig::parse("s4-8 f1 c2 w0", 441_000, 44_100, 0).unwrap();
        assert_eq!(cfg.seg0, 4 * 44_100);
        assert_eq!(cfg.seg1, 8 * 44_100);
        assert_eq!(cfg.fade_cnt, 44_100);
        assert!(cfg.ch2);
        assert!(!cfg.ch2_swap);
    }

    #[test]
    fn config_rejects_source_too_short_for_fade() {
        init_log();
        let err = LooperConfig::parse("f10", 44_100, 44_100, 0);
        assert!(err.is_err());
    }

    #[test]
    fn config_gate_flag_skips_non_matching_source_index() {
        let cfg = LooperConfig::parse("#1 s2 #0 s4", 441_000, 44_100, 0).unwrap();
        assert_eq!(cfg.seg0, 4 * 44_100);
    }

    #[test]
    fn looper_fills_a_buffer_with_nonsilent_audio() {
        let cfg = LooperConfig::parse("s1-2 f0.1", 44_100 * 5, 44_100, 0).unwrap();
        let pcm = tone_pcm(44_100 * 5);
        let mut looper = Looper::new(cfg, pcm, 256, 1).unwrap();
        let mut out = vec![0i32; 4096];
        looper.read(&mut out).unwrap();
        assert!(out.iter().any(|&s| s != 0));
    }

    #[test]
    fn looper_keeps_producing_audio_across_many_reads() {
        let cfg = LooperConfig::parse("s0.2-0.4 f0.05", 44_100 * 2, 44_100, 0).unwrap();
        let pcm = tone_pcm(44_100 * 2);
        let mut looper = Looper::new(cfg, pcm, 256, 99).unwrap();
        let mut out = vec![0i32; 2048];
        for _ in 0..50 {
            looper.read(&mut out).unwrap();
        }
        assert!(out.iter().any(|&s| s != 0));
    }

    #[test]
    fn three_stream_mode_never_pairs_two_heads_on_the_same_channel() {
        let cfg = LooperConfig::parse("s0.2-0.4 f0.05 c2", 44_100 * 2, 44_100, 0).unwrap();
        let pcm = tone_pcm(44_100 * 2);
        let mut looper = Looper::new(cfg, pcm, 256, 123).unwrap();
        let mut out = vec![0i32; 2048];
        for _ in 0..50 {
            looper.read(&mut out).unwrap();
        }
        assert!(out.iter().any(|&s| s != 0));
    }
}
