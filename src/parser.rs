//! Sequence-file text parser: turns a whole sequence file into a
//! [`ParsedSequence`] ready for [`crate::scheduler::Scheduler::compile`].
//!
//! Implements the line grammar end-to-end: comments, `-option` pass
//! through, `waveNN:` user-wavetable defs, flat and block name-defs, and
//! time-lines (absolute/relative/`NOW` time chains, fade codes, the
//! trailing `->` slide sugar). CLI option *semantics* are out of scope
//! here (see [`crate`]); a line starting with `-` is only recognized and
//! captured verbatim.

use crate::error::{Result, SbagenError};
use crate::scheduler::{FadeCode, UserPeriod, H24};
use crate::voice::{silent_voice_set, BlockLine, NameDef, Voice, VoiceKind, VoiceSet, WaveformId};
use crate::wavetable::{BuiltinWaveform, UserWave, WaveformBank};
use std::collections::HashMap;

/// Percentage-to-internal-amplitude scale: 100% maps to 4096.
fn amp_da(pc: f64) -> f64 {
    40.96 * pc
}

/// The fully parsed contents of a sequence file, ready to hand to the
/// scheduler. `periods` is sorted by time and carries the synthetic
/// bridge periods the `->` sugar needs (see
/// [`FadeCode::UnspecifiedTransition`]).
#[derive(Debug, Clone)]
pub struct ParsedSequence {
    pub periods: Vec<UserPeriod>,
    pub waves: WaveformBank,
    /// `-option` lines, verbatim, in file order.
    pub options: Vec<String>,
    /// Set once any voice-spec token references a `mix`-kind channel.
    pub mix_flag: bool,
}

/// Parses one whole sequence file's text.
///
/// `now_ms` resolves `NOW`/`NOW+...` time tokens; `default_waveform` is
/// the waveform used by a voice token that carries no `wave:` prefix.
pub fn parse_sequence(
    text: &str,
    now_ms: i64,
    default_waveform: WaveformId,
) -> Result<ParsedSequence> {
    let raw_lines: Vec<&str> = text.lines().collect();
    let mut names: HashMap<String, NameDef> = HashMap::new();
    let mut waves = WaveformBank::new();
    let mut options = Vec::new();
    let mut mix_flag = false;
    let mut last_abs_time: i64 = 0;
    // (period, force_slide) in file order; sorted by time at the end.
    let mut raw_periods: Vec<(UserPeriod, bool)> = Vec::new();
    let mut options_still_legal = true;

    let mut i = 0usize;
    while i < raw_lines.len() {
        let (content, consumed) = match next_logical_line(&raw_lines, i) {
            Some(v) => v,
            None => break,
        };
        i += consumed;
        let line_no = i; // 1-based, post-increment matches the consumed line.
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        if content.starts_with('-') {
            if !options_still_legal {
                return Err(SbagenError::format(
                    line_no,
                    "options are only legal at the start of a sequence file",
                ));
            }
            options.push(content.to_string());
            continue;
        }

        if looks_like_name_def(content) {
            options_still_legal = false;
            let colon = content.find(':').unwrap();
            let ident = &content[..colon];
            let rest = content[colon + 1..].trim();

            if let Some(n) = wave_table_index(ident) {
                let wave = parse_wave_table_def(rest, line_no)?;
                waves.set_user(n, wave)?;
                continue;
            }

            if let Some(body) = rest.strip_prefix('{') {
                let body = body.strip_suffix('}').unwrap_or(body);
                let block = parse_block_def(body, &names, line_no)?;
                names.insert(ident.to_string(), NameDef::Block(block));
                continue;
            }

            let voices = parse_voice_set(rest, &waves, default_waveform, &mut mix_flag, line_no)?;
            names.insert(ident.to_string(), NameDef::Voices(voices));
            continue;
        }

        // Time-line.
        options_still_legal = false;
        let mut words = content.split_whitespace().peekable();
        let time_word = words
            .next()
            .ok_or_else(|| SbagenError::format(line_no, "empty time-line"))?;
        let time_ms = parse_time_token(time_word, &mut last_abs_time, now_ms, line_no)?;

        let (fade_in, fade_out) = match words.peek().and_then(|w| parse_fadecode(w)) {
            Some(codes) => {
                words.next();
                codes
            }
            None => (FadeCode::Through, FadeCode::Through),
        };

        let name = words
            .next()
            .ok_or_else(|| SbagenError::format(line_no, "time-line is missing a name"))?;
        let force_slide = words.peek().copied() == Some("->");
        if force_slide {
            words.next();
        }
        if words.next().is_some() {
            return Err(SbagenError::format(
                line_no,
                "unexpected trailing tokens after time-line",
            ));
        }

        let def = names
            .get(name)
            .ok_or_else(|| SbagenError::format(line_no, format!("undefined name '{name}'")))?;

        match def {
            NameDef::Voices(voices) => {
                raw_periods.push((
                    UserPeriod {
                        time_ms,
                        fade_in,
                        fade_out,
                        voices: *voices,
                    },
                    force_slide,
                ));
            }
            NameDef::Block(lines) => {
                let n = lines.len();
                if n == 0 {
                    return Err(SbagenError::format(
                        line_no,
                        format!("block '{name}' has no lines"),
                    ));
                }
                for (idx, bl) in lines.iter().enumerate() {
                    let t = (time_ms + bl.offset_ms).rem_euclid(H24);
                    let is_last = idx + 1 == n;
                    raw_periods.push((
                        UserPeriod {
                            time_ms: t,
                            fade_in: bl.fade_in,
                            fade_out: bl.fade_out,
                            voices: bl.voices,
                        },
                        force_slide && is_last,
                    ));
                }
            }
        }
    }

    if raw_periods.is_empty() {
        return Err(SbagenError::config("sequence has no time-lines"));
    }

    raw_periods.sort_by_key(|(p, _)| p.time_ms);

    let mut periods = Vec::with_capacity(raw_periods.len() * 2);
    for (p, force_slide) in raw_periods {
        let voices = p.voices;
        let time_ms = p.time_ms;
        periods.push(p);
        if force_slide {
            periods.push(UserPeriod {
                time_ms,
                fade_in: FadeCode::UnspecifiedTransition,
                fade_out: FadeCode::Slide,
                voices,
            });
        }
    }

    Ok(ParsedSequence {
        periods,
        waves,
        options,
        mix_flag,
    })
}

/// Reads one logical line starting at `raw_lines[start]`: strips a
/// trailing `#...` comment (echoing a `##...` remainder to the log,
/// matching the original engine's double-hash convention), and if the
/// stripped content opens an unclosed `{` block, keeps absorbing
/// subsequent physical lines (each itself comment-stripped) until the
/// closing `}` is found. Returns the joined content and the number of
/// physical lines consumed, or `None` at end of input.
fn next_logical_line(raw_lines: &[&str], start: usize) -> Option<(String, usize)> {
    if start >= raw_lines.len() {
        return None;
    }
    let mut consumed = 0;
    let mut joined = String::new();
    let mut depth = 0i32;
    let mut opened = false;

    loop {
        if start + consumed >= raw_lines.len() {
            break;
        }
        let stripped = strip_comment(raw_lines[start + consumed]);
        consumed += 1;
        let stripped = stripped.trim();
        if stripped.is_empty() && !opened {
            if joined.is_empty() {
                // Blank line with nothing pending: stop here, caller
                // skips it (empty content signals "blank").
                return Some((String::new(), consumed));
            }
            continue;
        }
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(stripped);

        for c in stripped.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if !opened || depth <= 0 {
            break;
        }
    }
    Some((joined, consumed))
}

/// Strips a `#` comment from a raw line, echoing `##...` remainders
/// (the original engine's "comment worth keeping" marker) to the log.
fn strip_comment(line: &str) -> String {
    if let Some(idx) = line.find('#') {
        if line[idx..].starts_with("##") {
            log::info!("{}", &line[idx..]);
        }
        line[..idx].to_string()
    } else {
        line.to_string()
    }
}

fn looks_like_name_def(line: &str) -> bool {
    let bytes = line.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_alphabetic() {
        return false;
    }
    let mut i = 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-')
    {
        i += 1;
    }
    i < bytes.len() && bytes[i] == b':'
}

/// `waveNN` (exactly two ascii digits) -> `NN`, else `None`.
fn wave_table_index(ident: &str) -> Option<u8> {
    let digits = ident.strip_prefix("wave")?;
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_wave_table_def(rest: &str, line_no: usize) -> Result<UserWave> {
    let mut samples = Vec::new();
    for tok in rest.split_whitespace() {
        let v: f64 = tok
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad wavetable sample '{tok}'")))?;
        samples.push(v);
    }
    UserWave::from_samples(&samples)
}

/// Parses the 16 whitespace-separated voice-spec tokens after a flat
/// name-def's `:`. Fewer than 16 tokens leaves the remaining channels
/// off, matching a sequence author writing only the channels they use.
fn parse_voice_set(
    rest: &str,
    waves: &WaveformBank,
    default_waveform: WaveformId,
    mix_flag: &mut bool,
    line_no: usize,
) -> Result<VoiceSet> {
    let mut voices = silent_voice_set();
    for (i, tok) in rest.split_whitespace().enumerate() {
        if i >= 16 {
            return Err(SbagenError::format(
                line_no,
                "a name-def cannot specify more than 16 channels",
            ));
        }
        voices[i] = parse_voice_token(tok, waves, default_waveform, mix_flag, line_no)?;
    }
    Ok(voices)
}

/// Parses the body between `{` and `}` of a block name-def: a run of
/// `+<time> [<fadecode>] <name>` groups, each a reference to an
/// already-defined flat name-def at a time offset relative to whatever
/// time the block itself is invoked at. Block lines resolve to voice
/// sets at block-definition time, so referenced names must already be
/// defined above the block in the file, the same top-to-bottom ordering
/// flat name-defs already require for forward use.
fn parse_block_def(
    body: &str,
    names: &HashMap<String, NameDef>,
    line_no: usize,
) -> Result<Vec<BlockLine>> {
    let mut words = body.split_whitespace().peekable();
    let mut lines = Vec::new();
    while let Some(tok) = words.next() {
        let rel = tok
            .strip_prefix('+')
            .ok_or_else(|| SbagenError::format(line_no, "block lines need a '+offset' time"))?;
        let offset_ms = parse_hhmmss(rel, line_no)?;

        let (fade_in, fade_out) = match words.peek().and_then(|w| parse_fadecode(w)) {
            Some(codes) => {
                words.next();
                codes
            }
            None => (FadeCode::Through, FadeCode::Through),
        };

        let name = words
            .next()
            .ok_or_else(|| SbagenError::format(line_no, "block line is missing a name"))?;
        let voices = match names.get(name) {
            Some(NameDef::Voices(v)) => *v,
            Some(NameDef::Block(_)) => {
                return Err(SbagenError::format(
                    line_no,
                    format!("block '{name}' cannot reference another block"),
                ))
            }
            None => {
                return Err(SbagenError::format(
                    line_no,
                    format!("undefined name '{name}' in block"),
                ))
            }
        };

        lines.push(BlockLine {
            offset_ms,
            voices,
            fade_in,
            fade_out,
        });
    }
    if lines.is_empty() {
        return Err(SbagenError::format(line_no, "block has no lines"));
    }
    Ok(lines)
}

/// Two-character fade code, e.g. `<-`, `==`, `->` is NOT one of these -
/// `>` only appears as the *second* character. Returns `None` if `word`
/// doesn't match, so the caller can fall back to the default
/// Through/Through and treat `word` as the name instead.
fn parse_fadecode(word: &str) -> Option<(FadeCode, FadeCode)> {
    let bytes = word.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let fi = match bytes[0] {
        b'<' => FadeCode::Silence,
        b'-' => FadeCode::Through,
        b'=' => FadeCode::Slide,
        _ => return None,
    };
    let fo = match bytes[1] {
        b'>' => FadeCode::Silence,
        b'-' => FadeCode::Through,
        b'=' => FadeCode::Slide,
        _ => return None,
    };
    Some((fi, fo))
}

/// Parses one time-line's leading time token: `NOW`, `NOW+<delta>...`,
/// an absolute `HH:MM[:SS]`, or a relative `+HH:MM[:SS]` chain (each
/// `+`-joined part summed). Updates `last_abs_time`, which every
/// relative token in the file is measured from.
fn parse_time_token(word: &str, last_abs_time: &mut i64, now_ms: i64, line_no: usize) -> Result<i64> {
    if let Some(rest) = word.strip_prefix("NOW") {
        let delta = if rest.is_empty() {
            0
        } else {
            parse_plus_chain(rest, line_no)?
        };
        let t = (now_ms + delta).rem_euclid(H24);
        *last_abs_time = t;
        return Ok(t);
    }

    if let Some(rest) = word.strip_prefix('+') {
        let delta = parse_plus_chain(rest, line_no)?;
        let t = (*last_abs_time + delta).rem_euclid(H24);
        *last_abs_time = t;
        return Ok(t);
    }

    let t = parse_hhmmss(word, line_no)?;
    *last_abs_time = t;
    Ok(t)
}

/// Sums a run of `<part>[+<part>...]` relative-time parts, where the
/// leading `+` of the first part has already been stripped by the
/// caller.
fn parse_plus_chain(rest: &str, line_no: usize) -> Result<i64> {
    let mut total = 0i64;
    for part in rest.split('+') {
        total += parse_hhmmss(part, line_no)?;
    }
    Ok(total)
}

/// `HH:MM[:SS]`, range-validated the way the original engine's
/// `readTime()` does: `hh<24` is NOT enforced here since relative
/// deltas legitimately exceed 24h before being folded mod [`H24`];
/// `mm<60` and `ss<60` are always enforced.
fn parse_hhmmss(s: &str, line_no: usize) -> Result<i64> {
    let mut parts = s.split(':');
    let hh: i64 = parts
        .next()
        .ok_or_else(|| SbagenError::format(line_no, "empty time value"))?
        .parse()
        .map_err(|_| SbagenError::format(line_no, format!("bad time value '{s}'")))?;
    let mm: i64 = match parts.next() {
        Some(m) => m
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad time value '{s}'")))?,
        None => 0,
    };
    let ss: i64 = match parts.next() {
        Some(sec) => sec
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad time value '{s}'")))?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(SbagenError::format(line_no, format!("bad time value '{s}'")));
    }
    if !(0..60).contains(&mm) || !(0..60).contains(&ss) {
        return Err(SbagenError::format(
            line_no,
            format!("time value '{s}' has an out-of-range minute or second"),
        ));
    }
    Ok(hh * 3_600_000 + mm * 60_000 + ss * 1_000)
}

/// Manual float-prefix scanner: optional sign, digits, optional
/// fractional part, optional exponent. Returns the parsed value and the
/// remainder of `s` starting right after the match. Used for the
/// `<carrier><beat>/<amp>`-style tokens where two numbers are written
/// back-to-back with no separator other than the second number's own
/// sign.
fn parse_float(s: &str) -> Option<(f64, &str)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start || (i == digits_start + 1 && bytes[digits_start] == b'.') {
        return None;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_digits_start {
            i = j;
        }
    }
    s[..i].parse().ok().map(|v| (v, &s[i..]))
}

/// Parses the `<carrier><beat>` pair glued together with no separator
/// (beat's own leading sign is the only delimiter), or just `<carrier>`
/// with beat defaulting to `0`.
fn parse_carrier_beat(s: &str, line_no: usize) -> Result<(f64, f64, usize)> {
    let (carrier, after_carrier) = parse_float(s)
        .ok_or_else(|| SbagenError::format(line_no, format!("bad carrier value in '{s}'")))?;
    let consumed_carrier = s.len() - after_carrier.len();
    if after_carrier.starts_with('/') {
        return Ok((carrier, 0.0, consumed_carrier));
    }
    let (beat, after_beat) = parse_float(after_carrier)
        .ok_or_else(|| SbagenError::format(line_no, format!("bad beat value in '{s}'")))?;
    Ok((carrier, beat, s.len() - after_beat.len()))
}

fn strip_waveform_prefix<'a>(
    body: &'a str,
    waves: &WaveformBank,
    default_waveform: WaveformId,
    line_no: usize,
) -> Result<(WaveformId, &'a str)> {
    let colon = match body.find(':') {
        Some(c) => c,
        None => return Ok((default_waveform, body)),
    };
    let head = &body[..colon];
    let waveform = match head {
        "sine" => WaveformId::Builtin(BuiltinWaveform::Sine),
        "square" => WaveformId::Builtin(BuiltinWaveform::Square),
        "triangle" => WaveformId::Builtin(BuiltinWaveform::Triangle),
        "sawtooth" => WaveformId::Builtin(BuiltinWaveform::Sawtooth),
        _ => {
            if let Some(n) = wave_table_index(head) {
                if !waves.is_registered(n) {
                    return Err(SbagenError::format(
                        line_no,
                        format!("'{head}' is not a defined wavetable"),
                    ));
                }
                return Ok((WaveformId::User(n), &body[colon + 1..]));
            }
            // Not a recognized waveform prefix: the colon belongs to a
            // kind name instead (spin:, mixspin:, ...).
            return Ok((default_waveform, body));
        }
    };
    Ok((waveform, &body[colon + 1..]))
}

fn parse_voice_token(
    tok: &str,
    waves: &WaveformBank,
    default_waveform: WaveformId,
    mix_flag: &mut bool,
    line_no: usize,
) -> Result<Voice> {
    if tok == "-" {
        return Ok(Voice::off());
    }

    let (waveform, body) = strip_waveform_prefix(tok, waves, default_waveform, line_no)?;

    if let Some(rest) = body.strip_prefix("pink/") {
        return Ok(simple_amp_voice(VoiceKind::Pink, rest, waveform, line_no));
    }
    if let Some(rest) = body.strip_prefix("white/") {
        return Ok(simple_amp_voice(VoiceKind::White, rest, waveform, line_no));
    }
    if let Some(rest) = body.strip_prefix("brown/") {
        return Ok(simple_amp_voice(VoiceKind::Brown, rest, waveform, line_no));
    }
    if let Some(rest) = body.strip_prefix("mix/") {
        *mix_flag = true;
        return Ok(simple_amp_voice(VoiceKind::Mix, rest, waveform, line_no));
    }
    if let Some(rest) = body.strip_prefix("bell") {
        let (carr, after) = parse_float(rest)
            .ok_or_else(|| SbagenError::format(line_no, format!("bad bell token '{tok}'")))?;
        let after = after
            .strip_prefix('/')
            .ok_or_else(|| SbagenError::format(line_no, format!("bad bell token '{tok}'")))?;
        let amp: f64 = after
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad bell amplitude in '{tok}'")))?;
        return Ok(Voice {
            kind: VoiceKind::Bell,
            amplitude: amp_da(amp),
            carrier_hz: carr,
            beat_hz: 0.0,
            waveform,
        });
    }
    if let Some(rest) = body.strip_prefix("mixpulse:") {
        let (res, after) = parse_float(rest)
            .ok_or_else(|| SbagenError::format(line_no, format!("bad mixpulse token '{tok}'")))?;
        let amp = parse_trailing_amp(after, tok, line_no)?;
        return Ok(Voice {
            kind: VoiceKind::MixPulse,
            amplitude: amp_da(amp),
            carrier_hz: 0.0,
            beat_hz: res,
            waveform,
        });
    }
    if let Some(rest) = body.strip_prefix("mixspin:") {
        return parse_carrier_res_voice(VoiceKind::MixSpin, rest, waveform, tok, line_no);
    }
    if let Some(rest) = body.strip_prefix("spin:") {
        return parse_carrier_res_voice(VoiceKind::Spin, rest, waveform, tok, line_no);
    }
    if let Some(rest) = body.strip_prefix("bspin:") {
        return parse_carrier_res_voice(VoiceKind::BrownSpin, rest, waveform, tok, line_no);
    }
    if let Some(rest) = body.strip_prefix("wspin:") {
        return parse_carrier_res_voice(VoiceKind::WhiteSpin, rest, waveform, tok, line_no);
    }
    if let Some(at) = body.find('@') {
        let (carr, after_at) = (&body[..at], &body[at + 1..]);
        let carr: f64 = carr
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad isochronic token '{tok}'")))?;
        let slash = after_at
            .find('/')
            .ok_or_else(|| SbagenError::format(line_no, format!("bad isochronic token '{tok}'")))?;
        let res: f64 = after_at[..slash]
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad isochronic token '{tok}'")))?;
        let amp: f64 = after_at[slash + 1..]
            .parse()
            .map_err(|_| SbagenError::format(line_no, format!("bad isochronic token '{tok}'")))?;
        return Ok(Voice {
            kind: VoiceKind::Isochronic(None),
            amplitude: amp_da(amp),
            carrier_hz: carr,
            beat_hz: res,
            waveform,
        });
    }

    // Plain binaural (or a beatless tone): `<carr>[+/-]<res>/<amp>` or
    // `<carr>/<amp>`.
    let (carr, beat, consumed) = parse_carrier_beat(body, line_no)?;
    let rest = &body[consumed..];
    let amp = parse_trailing_amp(rest, tok, line_no)?;
    Ok(Voice {
        kind: VoiceKind::Binaural,
        amplitude: amp_da(amp),
        carrier_hz: carr,
        beat_hz: beat,
        waveform,
    })
}

fn simple_amp_voice(kind: VoiceKind, rest: &str, waveform: WaveformId, line_no: usize) -> Voice {
    let amp: f64 = rest.parse().unwrap_or_else(|_| {
        log::warn!("bad amplitude '{rest}' at line {line_no}, defaulting to 0");
        0.0
    });
    Voice {
        kind,
        amplitude: amp_da(amp),
        carrier_hz: 0.0,
        beat_hz: 0.0,
        waveform,
    }
}

fn parse_trailing_amp(rest: &str, tok: &str, line_no: usize) -> Result<f64> {
    let rest = rest
        .strip_prefix('/')
        .ok_or_else(|| SbagenError::format(line_no, format!("missing '/<amplitude>' in '{tok}'")))?;
    rest.parse()
        .map_err(|_| SbagenError::format(line_no, format!("bad amplitude in '{tok}'")))
}

fn parse_carrier_res_voice(
    kind: VoiceKind,
    rest: &str,
    waveform: WaveformId,
    tok: &str,
    line_no: usize,
) -> Result<Voice> {
    let (carr, res, consumed) = parse_carrier_beat(rest, line_no)?;
    let amp = parse_trailing_amp(&rest[consumed..], tok, line_no)?;
    Ok(Voice {
        kind,
        amplitude: amp_da(amp),
        carrier_hz: carr,
        beat_hz: res,
        waveform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceKind;
    use pretty_assertions::assert_eq;

    fn waves() -> WaveformBank {
        WaveformBank::new()
    }

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn parses_off_token() {
        let mut mix = false;
        let v = parse_voice_token("-", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert!(v.is_off());
    }

    #[test]
    fn parses_plain_binaural_with_beat() {
        let mut mix = false;
        let v = parse_voice_token("200+4/50", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.kind, VoiceKind::Binaural);
        assert_eq!(v.carrier_hz, 200.0);
        assert_eq!(v.beat_hz, 4.0);
        assert_eq!(v.amplitude, amp_da(50.0));
    }

    #[test]
    fn parses_binaural_with_negative_beat() {
        let mut mix = false;
        let v = parse_voice_token("300-2.5/30", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.carrier_hz, 300.0);
        assert_eq!(v.beat_hz, -2.5);
    }

    #[test]
    fn parses_tone_without_beat() {
        let mut mix = false;
        let v = parse_voice_token("100/20", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.carrier_hz, 100.0);
        assert_eq!(v.beat_hz, 0.0);
    }

    #[test]
    fn parses_pink_noise_with_amplitude() {
        let mut mix = false;
        let v = parse_voice_token("pink/10", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.kind, VoiceKind::Pink);
        assert_eq!(v.amplitude, amp_da(10.0));
    }

    #[test]
    fn parses_mix_token_and_sets_flag() {
        let mut mix = false;
        let v = parse_voice_token("mix/100", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.kind, VoiceKind::Mix);
        assert!(mix);
    }

    #[test]
    fn parses_bell_token() {
        let mut mix = false;
        let v = parse_voice_token("bell400/20", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.kind, VoiceKind::Bell);
        assert_eq!(v.carrier_hz, 400.0);
    }

    #[test]
    fn parses_spin_token() {
        let mut mix = false;
        let v = parse_voice_token("spin:500+0.1/40", &waves(), WaveformId::sine(), &mut mix, 1)
            .unwrap();
        assert_eq!(v.kind, VoiceKind::Spin);
        assert_eq!(v.carrier_hz, 500.0);
        assert_eq!(v.beat_hz, 0.1);
    }

    #[test]
    fn parses_mixpulse_token_with_no_carrier() {
        let mut mix = false;
        let v = parse_voice_token("mixpulse:3.5/60", &waves(), WaveformId::sine(), &mut mix, 1)
            .unwrap();
        assert_eq!(v.kind, VoiceKind::MixPulse);
        assert_eq!(v.carrier_hz, 0.0);
        assert_eq!(v.beat_hz, 3.5);
    }

    #[test]
    fn parses_isochronic_token() {
        let mut mix = false;
        let v = parse_voice_token("200@4/50", &waves(), WaveformId::sine(), &mut mix, 1).unwrap();
        assert_eq!(v.kind, VoiceKind::Isochronic(None));
        assert_eq!(v.carrier_hz, 200.0);
        assert_eq!(v.beat_hz, 4.0);
    }

    #[test]
    fn waveform_prefix_selects_builtin() {
        let mut mix = false;
        let v = parse_voice_token(
            "square:200+4/50",
            &waves(),
            WaveformId::sine(),
            &mut mix,
            1,
        )
        .unwrap();
        assert_eq!(v.waveform, WaveformId::Builtin(BuiltinWaveform::Square));
    }

    #[test]
    fn waveform_prefix_selects_user_table() {
        let mut bank = WaveformBank::new();
        bank.set_user(5, UserWave::from_samples(&[0.0, 1.0, 0.0, -1.0]).unwrap())
            .unwrap();
        let mut mix = false;
        let v = parse_voice_token("wave05:200+4/50", &bank, WaveformId::sine(), &mut mix, 1)
            .unwrap();
        assert_eq!(v.waveform, WaveformId::User(5));
        assert_eq!(v.carrier_hz, 200.0);
        assert_eq!(v.beat_hz, 4.0);
    }

    #[test]
    fn parses_hhmmss_absolute_time() {
        let mut last = 0;
        let t = parse_time_token("01:30:00", &mut last, 0, 1).unwrap();
        assert_eq!(t, 5_400_000);
        assert_eq!(last, t);
    }

    #[test]
    fn rejects_out_of_range_minute() {
        assert!(parse_hhmmss("1:75", 1).is_err());
    }

    #[test]
    fn now_sets_last_abs_time() {
        let mut last = 0;
        let t = parse_time_token("NOW", &mut last, 123_456, 1).unwrap();
        assert_eq!(t, 123_456);
        assert_eq!(last, 123_456);
    }

    #[test]
    fn relative_time_chains_from_last_abs_time() {
        let mut last = 3_600_000;
        let t = parse_time_token("+0:10", &mut last, 0, 1).unwrap();
        assert_eq!(t, 3_600_000 + 600_000);
        assert_eq!(last, t);
    }

    #[test]
    fn parses_fadecode_pair() {
        assert_eq!(parse_fadecode("<-"), Some((FadeCode::Silence, FadeCode::Through)));
        assert_eq!(parse_fadecode("=="), Some((FadeCode::Slide, FadeCode::Slide)));
        assert_eq!(parse_fadecode("->"), None);
    }

    #[test]
    fn name_def_detection_ignores_time_lines() {
        assert!(looks_like_name_def("wake: 200/10 - - - - - - - - - - - - - - -"));
        assert!(!looks_like_name_def("01:30:00 wake"));
        assert!(!looks_like_name_def("NOW wake"));
    }

    #[test]
    fn full_sequence_parses_two_named_periods() {
        let text = "\
wake: 200+10/50 - - - - - - - - - - - - - - -
sleep: 100+4/40 - - - - - - - - - - - - - - -
00:00:00 wake
01:00:00 == sleep
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert_eq!(parsed.periods.len(), 2);
        assert_eq!(parsed.periods[0].time_ms, 0);
        assert_eq!(parsed.periods[1].fade_in, FadeCode::Slide);
    }

    #[test]
    fn trailing_slide_sugar_inserts_a_bridge_period() {
        let text = "\
wake: 200/10 - - - - - - - - - - - - - - -
sleep: 100/40 - - - - - - - - - - - - - - -
00:00:00 wake ->
01:00:00 sleep
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert_eq!(parsed.periods.len(), 3);
        assert_eq!(parsed.periods[1].fade_in, FadeCode::UnspecifiedTransition);
        assert_eq!(parsed.periods[1].fade_out, FadeCode::Slide);
        assert_eq!(parsed.periods[1].time_ms, 0);
    }

    #[test]
    fn block_def_expands_into_multiple_periods() {
        let text = "\
a: 200/10 - - - - - - - - - - - - - - -
b: 100/20 - - - - - - - - - - - - - - -
grp: { +0:00 a +0:10 == b }
00:00:00 grp
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert_eq!(parsed.periods.len(), 2);
        assert_eq!(parsed.periods[0].time_ms, 0);
        assert_eq!(parsed.periods[1].time_ms, 600_000);
        assert_eq!(parsed.periods[1].fade_in, FadeCode::Slide);
    }

    #[test]
    fn option_line_after_name_def_is_rejected() {
        let text = "\
a: 200/10 - - - - - - - - - - - - - - -
00:00:00 a
-SR 44100
";
        assert!(parse_sequence(text, 0, WaveformId::sine()).is_err());
    }

    #[test]
    fn wave_table_def_registers_a_user_waveform() {
        let text = "\
wave05: 0.0 1.0 0.0 -1.0
a: wave05:200+4/50 - - - - - - - - - - - - - - -
00:00:00 a
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert_eq!(parsed.periods[0].voices[0].waveform, WaveformId::User(5));
    }

    #[test]
    fn comment_only_line_is_skipped() {
        let text = "\
# just a comment
a: 200/10 - - - - - - - - - - - - - - -
00:00:00 a
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert_eq!(parsed.periods.len(), 1);
    }

    #[test]
    fn double_hash_comment_is_echoed_to_the_log() {
        init_log();
        let text = "\
## this remainder gets echoed
a: 200/10 - - - - - - - - - - - - - - -
00:00:00 a
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert_eq!(parsed.periods.len(), 1);
    }

    #[test]
    fn mix_flag_propagates_from_any_channel() {
        let text = "\
a: mix/100 - - - - - - - - - - - - - - -
00:00:00 a
";
        let parsed = parse_sequence(text, 0, WaveformId::sine()).unwrap();
        assert!(parsed.mix_flag);
    }
}
