//! Microsecond-precision caption time.
//!
//! Every supported wire format encodes time differently: SRT uses
//! `HH:MM:SS,mmm`, WebVTT uses `[HH:]MM:SS.mmm`, MicroDVD uses bare frame
//! numbers, and TTML accepts both metric offsets (`12.5s`, `300ms`) and clock
//! strings with optional frame components. [`MicroTime`] is the one value all
//! of them normalize into, with no precision drift: a microsecond total
//! round-trips exactly.

use crate::convert::CaptionFormat;
use crate::error::{CaptionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

const MICROS_PER_MILLI: u64 = 1_000;
const MICROS_PER_SECOND: u64 = 1_000_000;
const MICROS_PER_MINUTE: u64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: u64 = 60 * MICROS_PER_MINUTE;

/// A normalized, carry-correct caption time value.
///
/// After any operation the components satisfy `minutes, seconds < 60` and
/// `milliseconds, microseconds < 1000`. Ordering is lexicographic on the
/// field tuple, which coincides with ordering by total microseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MicroTime {
    /// Hours (unbounded).
    pub hours: u64,
    /// Minutes (0-59).
    pub minutes: u8,
    /// Seconds (0-59).
    pub seconds: u8,
    /// Milliseconds (0-999).
    pub milliseconds: u16,
    /// Microseconds (0-999).
    pub microseconds: u16,
}

impl MicroTime {
    /// The zero time.
    pub const ZERO: MicroTime = MicroTime {
        hours: 0,
        minutes: 0,
        seconds: 0,
        milliseconds: 0,
        microseconds: 0,
    };

    /// Create a time from components, carrying overflow upward.
    ///
    /// `MicroTime::new(0, 0, 90, 0, 0)` normalizes to one minute thirty
    /// seconds.
    #[must_use]
    pub fn new(hours: u64, minutes: u64, seconds: u64, milliseconds: u64, microseconds: u64) -> Self {
        Self::from_micros(
            hours * MICROS_PER_HOUR
                + minutes * MICROS_PER_MINUTE
                + seconds * MICROS_PER_SECOND
                + milliseconds * MICROS_PER_MILLI
                + microseconds,
        )
    }

    /// Create a time from a total microsecond count.
    #[must_use]
    pub fn from_micros(total: u64) -> Self {
        Self {
            hours: total / MICROS_PER_HOUR,
            minutes: ((total % MICROS_PER_HOUR) / MICROS_PER_MINUTE) as u8,
            seconds: ((total % MICROS_PER_MINUTE) / MICROS_PER_SECOND) as u8,
            milliseconds: ((total % MICROS_PER_SECOND) / MICROS_PER_MILLI) as u16,
            microseconds: (total % MICROS_PER_MILLI) as u16,
        }
    }

    /// Total microseconds. Exact inverse of [`MicroTime::from_micros`].
    #[must_use]
    pub fn total_micros(&self) -> u64 {
        self.hours * MICROS_PER_HOUR
            + self.minutes as u64 * MICROS_PER_MINUTE
            + self.seconds as u64 * MICROS_PER_SECOND
            + self.milliseconds as u64 * MICROS_PER_MILLI
            + self.microseconds as u64
    }

    /// Check whether this is the zero time.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Subtract, clamping at zero instead of failing.
    #[must_use]
    pub fn saturating_sub(&self, other: &MicroTime) -> Self {
        Self::from_micros(self.total_micros().saturating_sub(other.total_micros()))
    }

    // --- SRT -------------------------------------------------------------

    /// Parse an SRT time string (`HH:MM:SS,mmm`).
    ///
    /// A period is accepted in place of the comma, which some encoders emit.
    pub fn from_srt(s: &str) -> Result<Self> {
        let s = s.trim();
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(CaptionError::invalid_timestamp(s, "expected HH:MM:SS,mmm"));
        }

        let hours: u64 = parse_component(parts[0], s, "hours")?;
        let minutes: u64 = parse_component(parts[1], s, "minutes")?;
        let (seconds, millis) = parse_seconds_millis(parts[2], s, &[',', '.'])?;

        Ok(Self::new(hours, minutes, seconds, millis, 0))
    }

    /// Format as an SRT time string (`HH:MM:SS,mmm`). Microseconds are
    /// truncated, SRT has no place for them.
    #[must_use]
    pub fn to_srt(&self) -> String {
        format!(
            "{:02}:{:02}:{:02},{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }

    // --- WebVTT ----------------------------------------------------------

    /// Parse a WebVTT time string (`HH:MM:SS.mmm` or `MM:SS.mmm`).
    pub fn from_vtt(s: &str) -> Result<Self> {
        let s = s.trim();
        let parts: Vec<&str> = s.split(':').collect();

        let (hours, minutes, rest) = match parts.len() {
            2 => (0, parse_component(parts[0], s, "minutes")?, parts[1]),
            3 => (
                parse_component(parts[0], s, "hours")?,
                parse_component(parts[1], s, "minutes")?,
                parts[2],
            ),
            _ => {
                return Err(CaptionError::invalid_timestamp(
                    s,
                    "expected [HH:]MM:SS.mmm",
                ))
            }
        };

        let (seconds, millis) = parse_seconds_millis(rest, s, &['.'])?;
        Ok(Self::new(hours, minutes, seconds, millis, 0))
    }

    /// Format as a WebVTT time string. The hours segment is always emitted.
    #[must_use]
    pub fn to_vtt(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }

    // --- MicroDVD (frame-indexed) ----------------------------------------

    /// Create a time from a frame number at the given frame rate.
    #[must_use]
    pub fn from_frames(frames: u64, frame_rate: f64) -> Self {
        let micros = (frames as f64 * MICROS_PER_SECOND as f64 / frame_rate).round() as u64;
        Self::from_micros(micros)
    }

    /// Convert to a frame number at the given frame rate.
    #[must_use]
    pub fn to_frames(&self, frame_rate: f64) -> u64 {
        (self.total_micros() as f64 * frame_rate / MICROS_PER_SECOND as f64).round() as u64
    }

    // --- TTML ------------------------------------------------------------

    /// Parse a TTML time expression.
    ///
    /// Accepts an offset with a metric suffix (`90s`, `1500ms`, `1.5h`,
    /// `2m`) or a clock string `HH:MM:SS[.fraction]` /
    /// `HH:MM:SS:FF[.subframes]`. The frame form needs a frame rate from
    /// `ctx`; the sub-frame digit additionally needs `sub_frame_rate`.
    pub fn from_ttml(s: &str, ctx: &TtmlTimeContext) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CaptionError::invalid_timestamp(s, "empty time expression"));
        }

        if s.contains(':') {
            return Self::from_ttml_clock(s, ctx);
        }

        // Offset form: number + metric suffix.
        let (value, multiplier) = if let Some(v) = s.strip_suffix("ms") {
            (v, MICROS_PER_MILLI as f64)
        } else if let Some(v) = s.strip_suffix('h') {
            (v, MICROS_PER_HOUR as f64)
        } else if let Some(v) = s.strip_suffix('m') {
            (v, MICROS_PER_MINUTE as f64)
        } else if let Some(v) = s.strip_suffix('s') {
            (v, MICROS_PER_SECOND as f64)
        } else {
            return Err(CaptionError::invalid_timestamp(
                s,
                "expected a metric suffix (h, m, s, ms) or a clock time",
            ));
        };

        let value: f64 = value
            .parse()
            .map_err(|_| CaptionError::invalid_timestamp(s, "invalid offset value"))?;
        if value < 0.0 {
            return Err(CaptionError::invalid_timestamp(s, "negative offset"));
        }
        Ok(Self::from_micros((value * multiplier).round() as u64))
    }

    fn from_ttml_clock(s: &str, ctx: &TtmlTimeContext) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.len() {
            3 => {
                let hours: u64 = parse_component(parts[0], s, "hours")?;
                let minutes: u64 = parse_component(parts[1], s, "minutes")?;
                let seconds: f64 = parts[2]
                    .parse()
                    .map_err(|_| CaptionError::invalid_timestamp(s, "invalid seconds"))?;
                if seconds < 0.0 {
                    return Err(CaptionError::invalid_timestamp(s, "negative seconds"));
                }
                let micros = hours * MICROS_PER_HOUR
                    + minutes * MICROS_PER_MINUTE
                    + (seconds * MICROS_PER_SECOND as f64).round() as u64;
                Ok(Self::from_micros(micros))
            }
            4 => {
                let hours: u64 = parse_component(parts[0], s, "hours")?;
                let minutes: u64 = parse_component(parts[1], s, "minutes")?;
                let seconds: u64 = parse_component(parts[2], s, "seconds")?;
                let frame_rate = ctx.frame_rate.ok_or(CaptionError::MissingFrameRate {
                    format: CaptionFormat::Ttml,
                })?;

                // FF or FF.SF where SF counts sub-frames.
                let frames: f64 = match parts[3].split_once('.') {
                    Some((ff, sf)) => {
                        let ff: u64 = parse_component(ff, s, "frames")?;
                        let sf: u64 = parse_component(sf, s, "sub-frames")?;
                        let sub_rate = ctx.sub_frame_rate.ok_or(CaptionError::MissingFrameRate {
                            format: CaptionFormat::Ttml,
                        })?;
                        ff as f64 + sf as f64 / sub_rate as f64
                    }
                    None => parse_component(parts[3], s, "frames")? as f64,
                };

                let micros = hours * MICROS_PER_HOUR
                    + minutes * MICROS_PER_MINUTE
                    + seconds * MICROS_PER_SECOND
                    + (frames * MICROS_PER_SECOND as f64 / frame_rate).round() as u64;
                Ok(Self::from_micros(micros))
            }
            _ => Err(CaptionError::invalid_timestamp(
                s,
                "expected HH:MM:SS[.fraction] or HH:MM:SS:FF[.SF]",
            )),
        }
    }

    /// Format as a TTML clock time (`HH:MM:SS.mmm`).
    #[must_use]
    pub fn to_ttml(&self) -> String {
        self.to_vtt()
    }
}

impl fmt::Display for MicroTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_srt())
    }
}

impl Add for MicroTime {
    type Output = MicroTime;

    fn add(self, other: Self) -> MicroTime {
        Self::from_micros(self.total_micros() + other.total_micros())
    }
}

impl AddAssign for MicroTime {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for MicroTime {
    type Output = Result<MicroTime>;

    fn sub(self, other: Self) -> Result<MicroTime> {
        let (a, b) = (self.total_micros(), other.total_micros());
        if b > a {
            return Err(CaptionError::TimeUnderflow);
        }
        Ok(Self::from_micros(a - b))
    }
}

/// Frame-rate context for resolving TTML clock times with frame components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TtmlTimeContext {
    /// `ttp:frameRate`, required for `HH:MM:SS:FF` times.
    pub frame_rate: Option<f64>,
    /// `ttp:subFrameRate`, required when a sub-frame digit is present.
    pub sub_frame_rate: Option<u32>,
}

/// Resolve a TTML `{begin, dur, end}` attribute triple into an interval.
///
/// With `dur`, the end is derived as `begin + dur` and a missing `begin`
/// defaults to zero. Without `dur`, a missing endpoint stays `None`
/// (open-ended).
pub fn resolve_ttml_interval(
    begin: Option<&str>,
    dur: Option<&str>,
    end: Option<&str>,
    ctx: &TtmlTimeContext,
) -> Result<(Option<MicroTime>, Option<MicroTime>)> {
    let begin = begin.map(|b| MicroTime::from_ttml(b, ctx)).transpose()?;

    if let Some(dur) = dur {
        let dur = MicroTime::from_ttml(dur, ctx)?;
        let start = begin.unwrap_or(MicroTime::ZERO);
        return Ok((Some(start), Some(start + dur)));
    }

    let end = end.map(|e| MicroTime::from_ttml(e, ctx)).transpose()?;
    Ok((begin, end))
}

fn parse_component(part: &str, whole: &str, name: &str) -> Result<u64> {
    part.trim()
        .parse()
        .map_err(|_| CaptionError::invalid_timestamp(whole, format!("invalid {name}")))
}

fn parse_seconds_millis(part: &str, whole: &str, separators: &[char]) -> Result<(u64, u64)> {
    let pieces: Vec<&str> = part.split(separators).collect();
    if pieces.len() != 2 {
        return Err(CaptionError::invalid_timestamp(
            whole,
            "invalid seconds component",
        ));
    }
    let seconds = parse_component(pieces[0], whole, "seconds")?;
    if pieces[1].len() != 3 {
        return Err(CaptionError::invalid_timestamp(
            whole,
            "milliseconds must be three digits",
        ));
    }
    let millis = parse_component(pieces[1], whole, "milliseconds")?;
    Ok((seconds, millis))
}
