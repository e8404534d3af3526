//! Colors and glyphs for the `listings` CLI.
//!
//! Palette entries are plain RGB triples so the same value drives both `colored`
//! output and clap's help styling.

use colored::{Color, Colorize};
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl From<Rgb> for Color {
    fn from(Rgb(r, g, b): Rgb) -> Self {
        Color::TrueColor { r, g, b }
    }
}

/// Message roles first, then roles used when rendering listings.
pub struct Palette {
    pub ok: Rgb,
    pub failure: Rgb,
    pub caution: Rgb,
    pub note: Rgb,
    pub heading: Rgb,
    pub command: Rgb,
    pub dim: Rgb,
    pub label: Rgb,
    pub text: Rgb,
    pub featured: Rgb,
    pub promoted: Rgb,
}

pub static PALETTE: Lazy<Palette> = Lazy::new(|| Palette {
    ok: Rgb(87, 181, 96),
    failure: Rgb(214, 69, 65),
    caution: Rgb(232, 170, 48),
    note: Rgb(84, 140, 214),
    heading: Rgb(64, 170, 190),
    command: Rgb(170, 120, 200),
    dim: Rgb(128, 128, 128),
    label: Rgb(110, 200, 215),
    text: Rgb(225, 225, 225),
    featured: Rgb(240, 196, 25),
    promoted: Rgb(236, 112, 62),
});

pub struct Glyphs {
    pub ok: &'static str,
    pub failure: &'static str,
    pub caution: &'static str,
    pub note: &'static str,
    pub arrow: &'static str,
    pub bullet: &'static str,
    pub featured: &'static str,
    pub promoted: &'static str,
}

pub const GLYPHS: Glyphs = Glyphs {
    ok: "✓",
    failure: "✗",
    caution: "⚠",
    note: "ℹ",
    arrow: "→",
    bullet: "•",
    featured: "★",
    promoted: "▲",
};

/// `text` in `tone`, or untouched when color is off.
pub fn paint(text: &str, tone: Rgb, bold: bool, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    let colored = text.color(Color::from(tone));
    if bold { colored.bold().to_string() } else { colored.to_string() }
}

/// Marker column for a search row: a star when featured, a triangle when promoted.
pub fn listing_badges(featured: bool, promoted: bool, enabled: bool) -> String {
    let mut badges = Vec::with_capacity(2);
    if featured {
        badges.push(paint(GLYPHS.featured, PALETTE.featured, false, enabled));
    }
    if promoted {
        badges.push(paint(GLYPHS.promoted, PALETTE.promoted, false, enabled));
    }
    badges.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paint_leaves_text_alone() {
        assert_eq!(paint("hotels", PALETTE.heading, true, false), "hotels");
    }

    #[test]
    fn badges_reflect_listing_flags() {
        assert_eq!(listing_badges(true, true, false), "★ ▲");
        assert_eq!(listing_badges(false, true, false), "▲");
        assert_eq!(listing_badges(false, false, false), "");
    }
}
