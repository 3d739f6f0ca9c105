//! Color values for caption styling.
//!
//! Every format writes colors differently (hex, `rgb()`, `hsl()`, CSS names,
//! MicroDVD's BGR hex); everything normalizes into an RGBA value whose
//! canonical text form is uppercase two-hex-digit channels.

use crate::error::{CaptionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Color {
    /// Create a fully opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with explicit alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Predefined white.
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Predefined black.
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    /// Predefined red.
    pub const RED: Color = Color::rgb(255, 0, 0);
    /// Predefined green (CSS `green`, the half-intensity one).
    pub const GREEN: Color = Color::rgb(0, 128, 0);
    /// Predefined lime (CSS `lime`, full-intensity green).
    pub const LIME: Color = Color::rgb(0, 255, 0);
    /// Predefined blue.
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    /// Predefined yellow.
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    /// Predefined cyan.
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    /// Predefined magenta.
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);

    /// Parse any supported color syntax.
    ///
    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
    /// `hsl(h, s, l)` (hue as 0-360 or 0-1, saturation/lightness as
    /// percentages or 0-1), and the basic CSS color names.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("rgb") {
            return Self::from_rgb_fn(&lower);
        }
        if lower.starts_with("hsl") {
            return Self::from_hsl_fn(&lower);
        }
        if let Some(named) = Self::from_name(&lower) {
            return Ok(named);
        }
        // Bare hex without the `#` shows up in the wild.
        if s.len() == 6 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Self::from_hex(s);
        }
        Err(CaptionError::InvalidColor(s.to_string()))
    }

    /// Parse, degrading unknown syntax to black with a warning instead of
    /// failing. A damaged cue's color should not block a whole track.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|_| {
            warn!(value = s, "unrecognized color value, falling back to black");
            Self::BLACK
        })
    }

    /// Parse a hex color body (`rgb`, `rrggbb`, or `rrggbbaa`, no `#`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CaptionError::InvalidColor(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16)
                .map_err(|_| CaptionError::InvalidColor(s.to_string()))
        };
        match s.len() {
            3 => {
                let digit = |i: usize| {
                    u8::from_str_radix(&s[i..i + 1], 16)
                        .map_err(|_| CaptionError::InvalidColor(s.to_string()))
                };
                Ok(Self::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17))
            }
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self::rgba(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(CaptionError::InvalidColor(s.to_string())),
        }
    }

    fn from_rgb_fn(s: &str) -> Result<Self> {
        let body = function_body(s)?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(CaptionError::InvalidColor(s.to_string()));
        }
        let channel = |p: &str| -> Result<u8> {
            let v: f64 = if let Some(pct) = p.strip_suffix('%') {
                pct.trim()
                    .parse::<f64>()
                    .map_err(|_| CaptionError::InvalidColor(s.to_string()))?
                    * 255.0
                    / 100.0
            } else {
                p.parse()
                    .map_err(|_| CaptionError::InvalidColor(s.to_string()))?
            };
            Ok(v.round().clamp(0.0, 255.0) as u8)
        };
        let (r, g, b) = (channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
        let a = match parts.get(3) {
            Some(p) => {
                let v: f64 = p
                    .parse()
                    .map_err(|_| CaptionError::InvalidColor(s.to_string()))?;
                (v * 255.0).round().clamp(0.0, 255.0) as u8
            }
            None => 255,
        };
        Ok(Self::rgba(r, g, b, a))
    }

    fn from_hsl_fn(s: &str) -> Result<Self> {
        let body = function_body(s)?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(CaptionError::InvalidColor(s.to_string()));
        }

        let number = |p: &str| -> Result<(f64, bool)> {
            let (value, is_percent) = match p.strip_suffix('%') {
                Some(v) => (v.trim(), true),
                None => (p, false),
            };
            let v: f64 = value
                .parse()
                .map_err(|_| CaptionError::InvalidColor(s.to_string()))?;
            Ok((v, is_percent))
        };

        // Hue: degrees unless given as a 0-1 fraction.
        let (h_raw, _) = number(parts[0].trim_end_matches("deg"))?;
        let h = if (0.0..=1.0).contains(&h_raw) && parts[0].contains('.') {
            h_raw * 360.0
        } else {
            h_raw
        };
        // Saturation/lightness: percent, or 0-1 when no `%` present.
        let fraction = |p: &str| -> Result<f64> {
            let (v, is_percent) = number(p)?;
            Ok(if is_percent { v / 100.0 } else { v }.clamp(0.0, 1.0))
        };
        let sat = fraction(parts[1])?;
        let light = fraction(parts[2])?;

        let (r, g, b) = hsl_to_rgb(h.rem_euclid(360.0), sat, light);
        Ok(Self::rgb(r, g, b))
    }

    fn from_name(name: &str) -> Option<Self> {
        // The basic CSS color set; exhaustive name tables are out of scope.
        Some(match name {
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "lime" => Self::LIME,
            "blue" => Self::BLUE,
            "yellow" => Self::YELLOW,
            "cyan" | "aqua" => Self::CYAN,
            "magenta" | "fuchsia" => Self::MAGENTA,
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "silver" => Self::rgb(192, 192, 192),
            "maroon" => Self::rgb(128, 0, 0),
            "olive" => Self::rgb(128, 128, 0),
            "navy" => Self::rgb(0, 0, 128),
            "purple" => Self::rgb(128, 0, 128),
            "teal" => Self::rgb(0, 128, 128),
            "orange" => Self::rgb(255, 165, 0),
            _ => return None,
        })
    }

    /// Canonical uppercase hex form without alpha (`RRGGBB`).
    #[must_use]
    pub fn to_hex_rgb(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Hex form with a leading `#`, including alpha when not opaque.
    #[must_use]
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{}", self.to_hex_rgb())
        } else {
            format!("#{}{:02X}", self.to_hex_rgb(), self.a)
        }
    }

    /// MicroDVD hex form: `$BBGGRR`.
    #[must_use]
    pub fn to_microdvd(&self) -> String {
        format!("${:02X}{:02X}{:02X}", self.b, self.g, self.r)
    }

    /// Parse a MicroDVD `$BBGGRR` value.
    pub fn from_microdvd(s: &str) -> Result<Self> {
        let body = s.trim().trim_start_matches('$');
        if body.len() != 6 {
            return Err(CaptionError::InvalidColor(s.to_string()));
        }
        let c = Self::from_hex(body)?;
        Ok(Self::rgb(c.b, c.g, c.r))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn function_body(s: &str) -> Result<&str> {
    let open = s.find('(');
    let close = s.rfind(')');
    match (open, close) {
        (Some(o), Some(c)) if c > o => Ok(&s[o + 1..c]),
        _ => Err(CaptionError::InvalidColor(s.to_string())),
    }
}

/// Standard HSL to RGB conversion. Hue in degrees, saturation and lightness
/// as 0-1 fractions.
fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;

    let (r1, g1, b1) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r1 + m) * 255.0).round() as u8,
        ((g1 + m) * 255.0).round() as u8,
        ((b1 + m) * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hex_forms() {
        assert_eq!(Color::parse("#F00").unwrap(), Color::RED);
        assert_eq!(Color::parse("#FF0000").unwrap(), Color::RED);
        assert_eq!(
            Color::parse("#FF000080").unwrap(),
            Color::rgba(255, 0, 0, 128)
        );
        assert!(Color::parse("#F0").is_err());
        assert!(Color::parse("#GGGGGG").is_err());
    }

    #[test]
    fn test_rgb_function() {
        assert_eq!(Color::parse("rgb(255, 128, 64)").unwrap(), Color::rgb(255, 128, 64));
        assert_eq!(Color::parse("rgb(100%, 0%, 0%)").unwrap(), Color::RED);
        assert_eq!(
            Color::parse("rgba(255, 0, 0, 0.5)").unwrap(),
            Color::rgba(255, 0, 0, 128)
        );
    }

    #[test]
    fn test_hsl_function() {
        // hsl(0, 100%, 50%) is pure red.
        assert_eq!(Color::parse("hsl(0, 100%, 50%)").unwrap(), Color::RED);
        assert_eq!(
            Color::parse("hsl(0,100%,50%)").unwrap().to_hex_rgb(),
            "FF0000"
        );
        assert_eq!(Color::parse("hsl(120, 100%, 50%)").unwrap(), Color::LIME);
        assert_eq!(Color::parse("hsl(240, 100%, 50%)").unwrap(), Color::BLUE);
        // Fractional saturation/lightness without `%`.
        assert_eq!(Color::parse("hsl(0, 1, 0.5)").unwrap(), Color::RED);
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(Color::parse("red").unwrap(), Color::RED);
        assert_eq!(Color::parse("Yellow").unwrap(), Color::YELLOW);
        assert_eq!(Color::parse("aqua").unwrap(), Color::CYAN);
        assert!(Color::parse("notacolor").is_err());
    }

    #[test]
    fn test_lossy_degrades_to_black() {
        assert_eq!(Color::parse_lossy("definitely-not-a-color"), Color::BLACK);
        assert_eq!(Color::parse_lossy("red"), Color::RED);
    }

    #[test]
    fn test_canonical_output_uppercase() {
        assert_eq!(Color::rgb(255, 128, 10).to_hex_rgb(), "FF800A");
        assert_eq!(Color::RED.to_hex(), "#FF0000");
        assert_eq!(Color::rgba(255, 0, 0, 128).to_hex(), "#FF000080");
    }

    #[test]
    fn test_microdvd_bgr() {
        assert_eq!(Color::RED.to_microdvd(), "$0000FF");
        assert_eq!(Color::from_microdvd("$0000FF").unwrap(), Color::RED);
        assert_eq!(Color::from_microdvd("$FF0000").unwrap(), Color::BLUE);
    }
}
