//! Highlight colors.
//!
//! Colors are kept packed as `0xRRGGBBAA` when parsed from hex or `rgb()`
//! notation. Anything else that looks like a CSS color keyword is carried
//! through untouched for the drawing surface to interpret.

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Color {
    /// Packed `0xRRGGBBAA`.
    Rgba(u32),
    /// A CSS color keyword such as `gold`.
    Named(SmolStr),
}

impl Color {
    /// The stock highlight blue, `rgb(0, 128, 255)`.
    pub const HIGHLIGHT: Color = Color::Rgba(0x0080FFFF);

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color::Rgba(u32::from_be_bytes([r, g, b, a]))
    }

    /// Own alpha in `[0, 1]`. Named colors count as opaque.
    pub fn alpha(&self) -> f32 {
        match self {
            Color::Rgba(packed) => (packed & 0xFF) as f32 / 255.0,
            Color::Named(_) => 1.0,
        }
    }

    pub fn to_css(&self) -> String {
        match self {
            Color::Rgba(packed) => rgba_u32_to_css(*packed),
            Color::Named(name) => name.to_string(),
        }
    }

    /// CSS for this color with its alpha multiplied by `opacity`.
    ///
    /// Named colors cannot carry an alpha in CSS; surfaces apply the opacity
    /// separately for those.
    pub fn to_css_with_opacity(&self, opacity: f32) -> String {
        match self {
            Color::Rgba(packed) => {
                rgba_u32_to_css_alpha(*packed, self.alpha() * opacity.clamp(0.0, 1.0))
            }
            Color::Named(name) => name.to_string(),
        }
    }
}

/// Convert RGBA u32 (packed as 0xRRGGBBAA) to CSS rgba() string.
pub fn rgba_u32_to_css(color: u32) -> String {
    let a = (color & 0xFF) as f32 / 255.0;
    rgba_u32_to_css_alpha(color, a)
}

/// Convert RGBA u32 to CSS rgba() string with a custom alpha value.
pub fn rgba_u32_to_css_alpha(color: u32, alpha: f32) -> String {
    let r = (color >> 24) & 0xFF;
    let g = (color >> 16) & 0xFF;
    let b = (color >> 8) & 0xFF;
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn parse_hex(input: &str, digits: &str) -> Result<Color, ConfigError> {
    let invalid = || ConfigError::InvalidColor(input.to_string());
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded: String = match digits.len() {
        3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => digits.to_string(),
        _ => return Err(invalid()),
    };
    let packed = u32::from_str_radix(&expanded, 16).map_err(|_| invalid())?;
    Ok(Color::Rgba(if expanded.len() == 6 {
        (packed << 8) | 0xFF
    } else {
        packed
    }))
}

fn parse_functional(input: &str, args: &str) -> Result<Color, ConfigError> {
    let invalid = || ConfigError::InvalidColor(input.to_string());
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(invalid());
    }

    let mut channels = [0u8; 4];
    for (slot, part) in channels.iter_mut().zip(&parts[..3]) {
        let value: f32 = part.parse().map_err(|_| invalid())?;
        if !(0.0..=255.0).contains(&value) {
            return Err(invalid());
        }
        *slot = value.round() as u8;
    }
    channels[3] = match parts.get(3) {
        Some(alpha) => {
            let alpha: f32 = alpha.parse().map_err(|_| invalid())?;
            if !(0.0..=1.0).contains(&alpha) {
                return Err(invalid());
            }
            (alpha * 255.0).round() as u8
        }
        None => 0xFF,
    };
    Ok(Color::Rgba(u32::from_be_bytes(channels)))
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if let Some(digits) = input.strip_prefix('#') {
            return parse_hex(input, digits);
        }
        let functional = input
            .strip_prefix("rgba(")
            .or_else(|| input.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'));
        if let Some(args) = functional {
            return parse_functional(input, args);
        }
        if !input.is_empty() && input.chars().all(|c| c.is_ascii_alphabetic()) {
            return Ok(Color::Named(SmolStr::new(input.to_ascii_lowercase())));
        }
        Err(ConfigError::InvalidColor(input.to_string()))
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_css())
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
