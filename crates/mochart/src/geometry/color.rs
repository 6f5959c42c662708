//! CSS-style color strings to normalized RGBA.

/// Normalized RGBA.
pub type Rgba = [f32; 4];

/// Fallback for anything that does not parse.
pub const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

/// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or
/// `rgba(r, g, b, a)`.
///
/// Channels in `rgb`/`rgba` are 0..=255; alpha is 0..=1. Unknown syntax
/// gives opaque white.
///
/// ```
/// use mochart::geometry::color::{parse_color, WHITE};
///
/// assert_eq!(parse_color("#f00"), [1.0, 0.0, 0.0, 1.0]);
/// assert_eq!(parse_color("rgba(0, 0, 255, 0.5)"), [0.0, 0.0, 1.0, 0.5]);
/// assert_eq!(parse_color("teal"), WHITE);
/// ```
#[must_use]
pub fn parse_color(color: &str) -> Rgba {
    let color = color.trim();
    let parsed = if let Some(hex) = color.strip_prefix('#') {
        parse_hex(hex)
    } else {
        parse_functional(color)
    };
    parsed.unwrap_or(WHITE)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.is_ascii() {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_owned(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok().map(|v| f32::from(v) / 255.0);
    let alpha = if expanded.len() == 8 { channel(6)? } else { 1.0 };
    Some([channel(0)?, channel(2)?, channel(4)?, alpha])
}

fn parse_functional(color: &str) -> Option<Rgba> {
    let lower = color.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts = body
        .split(',')
        .map(|p| p.trim().parse::<f32>().ok())
        .collect::<Option<Vec<f32>>>()?;
    match parts.as_slice() {
        [r, g, b] => Some([r / 255.0, g / 255.0, b / 255.0, 1.0]),
        [r, g, b, a] => Some([r / 255.0, g / 255.0, b / 255.0, *a]),
        _ => None,
    }
}
