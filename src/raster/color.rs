//! Inline CSS-style color parsing for the software canvas.
//!
//! Supports `#rgb`, `#rrggbb`, `rgb(r, g, b)`, `rgba(r, g, b, a)` and a small
//! table of named colors. Anything that cannot be parsed resolves to opaque
//! black so a bad style string never aborts a frame.

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn gray(level: u8) -> Self {
        Self::rgb(level, level, level)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Named colors understood by [`parse_color`].
const NAMED_COLORS: &[(&str, Rgba)] = &[
    ("black", Rgba::BLACK),
    ("white", Rgba::WHITE),
    ("gray", Rgba::gray(128)),
    ("grey", Rgba::gray(128)),
    ("red", Rgba::rgb(255, 0, 0)),
    ("green", Rgba::rgb(0, 128, 0)),
    ("blue", Rgba::rgb(0, 0, 255)),
    ("yellow", Rgba::rgb(255, 255, 0)),
    ("transparent", Rgba::rgba(0, 0, 0, 0)),
];

/// Parse a color string, defaulting to opaque black.
pub fn parse_color(input: &str) -> Rgba {
    try_parse_color(input).unwrap_or(Rgba::BLACK)
}

/// Parse a color string, returning `None` if it is not understood.
pub fn try_parse_color(input: &str) -> Option<Rgba> {
    let s = input.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(body) = s.strip_prefix("rgba(").and_then(|b| b.strip_suffix(')')) {
        return parse_functional(body, true);
    }
    if let Some(body) = s.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
        return parse_functional(body, false);
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, color)| *color)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let v = u16::from_str_radix(hex, 16).ok()?;
            // Expand each nibble: 0xf -> 0xff
            let r = ((v >> 8) & 0xf) as u8;
            let g = ((v >> 4) & 0xf) as u8;
            let b = (v & 0xf) as u8;
            Some(Rgba::rgb(r * 17, g * 17, b * 17))
        }
        6 => {
            let v = u32::from_str_radix(hex, 16).ok()?;
            Some(Rgba::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
        }
        _ => None,
    }
}

fn parse_functional(body: &str, with_alpha: bool) -> Option<Rgba> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let channel = |s: &str| -> Option<u8> {
        let v: f64 = s.parse().ok()?;
        if !v.is_finite() {
            return None;
        }
        Some(v.round().clamp(0.0, 255.0) as u8)
    };

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = if with_alpha {
        let alpha: f64 = parts[3].parse().ok()?;
        if !alpha.is_finite() {
            return None;
        }
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    } else {
        255
    };

    Some(Rgba::rgba(r, g, b, a))
}
