//! Background descriptors painted behind the exported video.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Error returned for malformed hex colours.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour {0:?}, expected #rgb, #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse_hex(input: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(input.to_string());
        let hex = input.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());
        match hex.len() {
            3 => {
                let nibble = |i: usize| byte(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Ok(Self::rgb(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
            8 => Ok(Self {
                r: byte(&hex[0..2])?,
                g: byte(&hex[2..4])?,
                b: byte(&hex[4..6])?,
                a: byte(&hex[6..8])?,
            }),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl TryFrom<String> for Rgba {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_string()
    }
}

/// What to paint behind the video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackgroundSpec {
    /// Two-stop linear gradient from the top-left to the bottom-right corner.
    Gradient { colors: [Rgba; 2] },
    /// Image file, cover-fitted and centered.
    Image { uri: String },
    /// Flat fallback fill.
    #[default]
    None,
}

/// A named two-stop gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetGradient {
    pub id: &'static str,
    pub name: &'static str,
    pub colors: [Rgba; 2],
}

impl PresetGradient {
    pub fn spec(&self) -> BackgroundSpec {
        BackgroundSpec::Gradient {
            colors: self.colors,
        }
    }
}

const fn preset(id: &'static str, name: &'static str, c0: u32, c1: u32) -> PresetGradient {
    PresetGradient {
        id,
        name,
        colors: [hex_rgb(c0), hex_rgb(c1)],
    }
}

const fn hex_rgb(v: u32) -> Rgba {
    Rgba::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

pub const PRESET_GRADIENTS: [PresetGradient; 12] = [
    preset("purple-pink", "Purple Pink", 0x7c3aed, 0xec4899),
    preset("blue-cyan", "Blue Cyan", 0x3b82f6, 0x06b6d4),
    preset("orange-red", "Orange Red", 0xf97316, 0xef4444),
    preset("green-teal", "Green Teal", 0x22c55e, 0x14b8a6),
    preset("pink-rose", "Pink Rose", 0xec4899, 0xf43f5e),
    preset("indigo-purple", "Indigo Purple", 0x6366f1, 0xa855f7),
    preset("cyan-blue", "Cyan Blue", 0x06b6d4, 0x3b82f6),
    preset("amber-orange", "Amber Orange", 0xf59e0b, 0xf97316),
    preset("violet-fuchsia", "Violet Fuchsia", 0x8b5cf6, 0xd946ef),
    preset("emerald-cyan", "Emerald Cyan", 0x10b981, 0x06b6d4),
    preset("rose-pink", "Rose Pink", 0xf43f5e, 0xec4899),
    preset("sky-indigo", "Sky Indigo", 0x0ea5e9, 0x6366f1),
];

/// Look up a preset gradient by id.
pub fn preset_gradient(id: &str) -> Option<&'static PresetGradient> {
    PRESET_GRADIENTS.iter().find(|p| p.id == id)
}

/// The user's background choice. A gradient and an image are never active together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackgroundSelection {
    gradient: Option<[Rgba; 2]>,
    image: Option<String>,
}

impl BackgroundSelection {
    pub fn select_gradient(&mut self, colors: [Rgba; 2]) {
        self.gradient = Some(colors);
        self.image = None;
    }

    pub fn select_image(&mut self, uri: impl Into<String>) {
        self.image = Some(uri.into());
        self.gradient = None;
    }

    pub fn clear(&mut self) {
        self.gradient = None;
        self.image = None;
    }

    pub fn gradient(&self) -> Option<[Rgba; 2]> {
        self.gradient
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// The descriptor handed to the export engine.
    pub fn spec(&self) -> BackgroundSpec {
        match (&self.image, self.gradient) {
            (Some(uri), _) => BackgroundSpec::Image { uri: uri.clone() },
            (None, Some(colors)) => BackgroundSpec::Gradient { colors },
            (None, None) => BackgroundSpec::None,
        }
    }
}
