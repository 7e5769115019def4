//! Color parsing and conversion utilities
//!
//! Overlay styles keep colors as the strings the user typed. Parsing happens
//! at render time so a bad value degrades to a fallback instead of failing
//! the frame.

use crate::error::{OverlayError, Result};
use image::Rgba;

/// Fallback used when a style color cannot be parsed
pub const FALLBACK_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Utility for parsing and converting CSS-like color strings
pub struct ColorParser;

impl ColorParser {
    /// Parse a color string to straight-alpha RGBA
    ///
    /// Supports `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
    /// `rgba(r, g, b, a)` with `a` in 0..=1, and a handful of names.
    ///
    /// # Examples
    /// ```rust
    /// use textoverlay::color::ColorParser;
    ///
    /// let yellow = ColorParser::parse("#d9dc1e").unwrap();
    /// assert_eq!(yellow.0, [0xd9, 0xdc, 0x1e, 255]);
    /// let red = ColorParser::parse("rgb(255, 0, 0)").unwrap();
    /// assert_eq!(red.0, [255, 0, 0, 255]);
    /// ```
    pub fn parse(input: &str) -> Result<Rgba<u8>> {
        let value = input.trim().to_ascii_lowercase();

        if let Some(hex) = value.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Self::parse_functional(args);
        }

        match value.as_str() {
            "transparent" => Ok(Rgba([0, 0, 0, 0])),
            "black" => Ok(Rgba([0, 0, 0, 255])),
            "white" => Ok(Rgba([255, 255, 255, 255])),
            "red" => Ok(Rgba([255, 0, 0, 255])),
            "green" => Ok(Rgba([0, 128, 0, 255])),
            "blue" => Ok(Rgba([0, 0, 255, 255])),
            "yellow" => Ok(Rgba([255, 255, 0, 255])),
            "gray" | "grey" => Ok(Rgba([128, 128, 128, 255])),
            _ => Err(OverlayError::invalid_config(format!(
                "Unsupported color '{}'",
                input
            ))),
        }
    }

    /// Parse a color, falling back when the value is not understood
    #[must_use]
    pub fn parse_or(input: &str, fallback: Rgba<u8>) -> Rgba<u8> {
        match Self::parse(input) {
            Ok(color) => color,
            Err(e) => {
                tracing::debug!(color = %input, error = %e, "Falling back to default color");
                fallback
            },
        }
    }

    /// Convert a color to a `#rrggbb` or `#rrggbbaa` string
    #[must_use]
    pub fn to_hex(color: Rgba<u8>) -> String {
        let [r, g, b, a] = color.0;
        if a == 255 {
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }

    fn parse_hex(hex: &str) -> Result<Rgba<u8>> {
        let invalid = || OverlayError::invalid_config(format!("Invalid hex color '#{}'", hex));
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let nibble = |i: usize| -> Result<u8> {
            hex.get(i..=i)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .map(|v| v * 17)
                .ok_or_else(invalid)
        };
        let byte = |i: usize| -> Result<u8> {
            hex.get(i..i + 2)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(invalid)
        };

        match hex.len() {
            3 => Ok(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
            4 => Ok(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
            6 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => Err(invalid()),
        }
    }

    fn parse_functional(args: &str) -> Result<Rgba<u8>> {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(OverlayError::invalid_config(format!(
                "Expected 3 or 4 color components, got {}",
                parts.len()
            )));
        }

        let mut channels = [0u8, 0, 0, 255];
        for (slot, part) in channels.iter_mut().zip(parts.iter()).take(3) {
            let value: f32 = part.parse().map_err(|_| {
                OverlayError::invalid_config(format!("Invalid color component '{}'", part))
            })?;
            *slot = value.round().clamp(0.0, 255.0) as u8;
        }
        if let Some(alpha) = parts.get(3) {
            let value: f32 = alpha.parse().map_err(|_| {
                OverlayError::invalid_config(format!("Invalid alpha component '{}'", alpha))
            })?;
            channels[3] = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        }

        Ok(Rgba(channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(ColorParser::parse("#fff").unwrap().0, [255, 255, 255, 255]);
        assert_eq!(ColorParser::parse("#f008").unwrap().0, [255, 0, 0, 136]);
        assert_eq!(ColorParser::parse("#D9DC1E").unwrap().0, [0xd9, 0xdc, 0x1e, 255]);
        assert_eq!(ColorParser::parse("#00000080").unwrap().0, [0, 0, 0, 128]);
    }

    #[test]
    fn test_parse_functional_forms() {
        assert_eq!(ColorParser::parse("rgb(10, 20, 30)").unwrap().0, [10, 20, 30, 255]);
        assert_eq!(ColorParser::parse("rgba(10,20,30,0.5)").unwrap().0, [10, 20, 30, 128]);
        assert_eq!(ColorParser::parse("rgb(300, -4, 7)").unwrap().0, [255, 0, 7, 255]);
    }

    #[test]
    fn test_invalid_colors() {
        assert!(ColorParser::parse("#12").is_err());
        assert!(ColorParser::parse("#gggggg").is_err());
        assert!(ColorParser::parse("rgb(1,2)").is_err());
        assert!(ColorParser::parse("chartreuse-ish").is_err());
        assert_eq!(ColorParser::parse_or("nope", FALLBACK_COLOR), FALLBACK_COLOR);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(ColorParser::to_hex(Rgba([255, 0, 128, 255])), "#ff0080");
        assert_eq!(ColorParser::to_hex(Rgba([0, 0, 0, 0])), "#00000000");
    }
}
