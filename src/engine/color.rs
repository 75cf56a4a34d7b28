use image::Rgb;

use crate::error::EngineError;

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
];

/// Parse `#rrggbb`, `rrggbb` or a basic color name (case-insensitive).
pub fn parse_color(text: &str) -> Result<Rgb<u8>, EngineError> {
    let trimmed = text.trim();
    let lower = trimmed.to_ascii_lowercase();

    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Ok(Rgb(*rgb));
    }

    let hex = lower.strip_prefix('#').unwrap_or(&lower);
    if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        if let (Ok(r), Ok(g), Ok(b)) = (channel(0), channel(2), channel(4)) {
            return Ok(Rgb([r, g, b]));
        }
    }

    Err(EngineError::InvalidArgument(format!(
        "'{}' is not a color (use #rrggbb or a basic color name)",
        text
    )))
}
