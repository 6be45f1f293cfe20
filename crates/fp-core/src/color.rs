//! Colour string normalization.
//!
//! Node backgrounds and group colours arrive from property panels as
//! `#RGB`, `#RRGGBB`, `rgb(r, g, b)` or `rgba(r, g, b, a)`. They are stored
//! as lowercase `#rrggbb` so that equality checks and diffing stay cheap.

use winnow::ascii::{digit1, space0};
use winnow::combinator::{alt, preceded, terminated};
use winnow::prelude::*;

/// An opaque 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u32,
    pub g: u32,
    pub b: u32,
}

impl Rgb {
    /// Lowercase `#rrggbb`. Channels above 255 are emitted as-is in hex.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Normalize a colour to lowercase hex.
///
/// Empty input yields an empty string. Short hex is expanded, `rgb()`/`rgba()`
/// is converted (alpha is discarded), anything else is returned lowercased.
pub fn normalize_color(color: &str) -> String {
    let c = color.trim().to_lowercase();
    if c.is_empty() {
        return c;
    }

    if let Some(hex) = c.strip_prefix('#') {
        if hex.len() == 3 {
            let mut out = String::with_capacity(7);
            out.push('#');
            for ch in hex.chars() {
                out.push(ch);
                out.push(ch);
            }
            return out;
        }
        return c;
    }

    let mut input = c.as_str();
    match parse_rgb_function.parse_next(&mut input) {
        Ok(rgb) => rgb.to_hex(),
        Err(_) => c,
    }
}

/// Whether `color` is exactly `#` followed by six hex digits.
pub fn is_valid_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn parse_channel(input: &mut &str) -> ModalResult<u32> {
    digit1.try_map(str::parse::<u32>).parse_next(input)
}

fn parse_rgb_function(input: &mut &str) -> ModalResult<Rgb> {
    let _ = alt(("rgba(", "rgb(")).parse_next(input)?;
    let r = terminated(parse_channel, ',').parse_next(input)?;
    let g = terminated(preceded(space0, parse_channel), ',').parse_next(input)?;
    let b = preceded(space0, parse_channel).parse_next(input)?;
    // Whatever follows (alpha, closing paren) is ignored.
    Ok(Rgb { r, g, b })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_short_hex() {
        assert_eq!(normalize_color("#ABC"), "#aabbcc");
    }

    #[test]
    fn keeps_long_hex_lowercased() {
        assert_eq!(normalize_color("  #3B82F6 "), "#3b82f6");
    }

    #[test]
    fn converts_rgb_and_rgba() {
        assert_eq!(normalize_color("rgb(255, 0, 16)"), "#ff0010");
        assert_eq!(normalize_color("RGBA(1,2,3,0.5)"), "#010203");
    }

    #[test]
    fn passes_through_named_colours() {
        assert_eq!(normalize_color("Red"), "red");
        assert_eq!(normalize_color(""), "");
    }

    #[test]
    fn validates_hex() {
        assert!(is_valid_hex_color("#64748B"));
        assert!(!is_valid_hex_color("#fff"));
        assert!(!is_valid_hex_color("64748b"));
    }
}
