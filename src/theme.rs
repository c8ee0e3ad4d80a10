//! Colour themes: fixed dark/light palettes and palettes derived from album art.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::engine::color::{Hsl, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Dark,
    Light,
    Color,
}

impl ThemeMode {
    pub fn next(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Color,
            ThemeMode::Color => ThemeMode::Dark,
        }
    }
}

/// Used when album art is missing, unreadable or too flat to yield three colours.
pub fn fallback_colors() -> Vec<Rgb> {
    vec![
        Rgb::from_u8(0x8B, 0x5C, 0xF6),
        Rgb::from_u8(0x06, 0xB6, 0xD4),
        Rgb::from_u8(0x10, 0xB9, 0x81),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemePalette {
    pub background: Rgb,
    pub foreground: Rgb,
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
    pub wireframe: Rgb,
    /// High-band ring first, low-band ring second
    pub particles: Vec<Rgb>,
    /// Fracture base colours; the first one is used
    pub triangles: Vec<Hsl>,
}

impl Default for ThemePalette {
    fn default() -> Self {
        Self::dark()
    }
}

impl ThemePalette {
    pub fn dark() -> Self {
        Self {
            background: Rgb::from_u8(0, 0, 0),
            foreground: Rgb::from_u8(255, 255, 255),
            primary: Rgb::from_u8(255, 255, 255),
            secondary: Rgb::from_u8(0xcc, 0xcc, 0xcc),
            accent: Rgb::from_u8(0x66, 0x66, 0x66),
            wireframe: Rgb::from_u8(212, 212, 212),
            particles: vec![
                Rgb::from_u8(0xff, 0xff, 0xff),
                Rgb::from_u8(0xcc, 0xcc, 0xcc),
                Rgb::from_u8(0x99, 0x99, 0x99),
            ],
            triangles: vec![
                Hsl::new(0.0, 0.0, 0.0),
                Hsl::new(0.0, 0.0, 0.2),
                Hsl::new(0.0, 0.0, 0.4),
            ],
        }
    }

    pub fn light() -> Self {
        Self {
            background: Rgb::from_u8(255, 255, 255),
            foreground: Rgb::from_u8(0, 0, 0),
            primary: Rgb::from_u8(0, 0, 0),
            secondary: Rgb::from_u8(0x33, 0x33, 0x33),
            accent: Rgb::from_u8(0x99, 0x99, 0x99),
            wireframe: Rgb::from_u8(43, 43, 43),
            particles: vec![
                Rgb::from_u8(0x00, 0x00, 0x00),
                Rgb::from_u8(0x33, 0x33, 0x33),
                Rgb::from_u8(0x66, 0x66, 0x66),
            ],
            triangles: vec![
                Hsl::new(0.0, 0.0, 1.0),
                Hsl::new(0.0, 0.0, 0.8),
                Hsl::new(0.0, 0.0, 0.6),
            ],
        }
    }

    /// Light-backed palette tinted by the dominant colours of a cover.
    pub fn from_dominant(colors: &[Rgb]) -> Self {
        let pick = |i: usize, fallback: Rgb| colors.get(i).copied().unwrap_or(fallback);
        let light = Self::light();
        Self {
            background: light.background,
            foreground: light.foreground,
            primary: pick(0, Rgb::from_u8(0xff, 0xff, 0xff)),
            secondary: pick(1, Rgb::from_u8(0xcc, 0xcc, 0xcc)),
            accent: pick(2, Rgb::from_u8(0x66, 0x66, 0x66)),
            wireframe: pick(0, Rgb::from_u8(212, 212, 212)),
            particles: colors.iter().take(3).copied().collect(),
            triangles: light.triangles,
        }
    }

    pub fn for_mode(mode: ThemeMode, cover: &[Rgb]) -> Self {
        match mode {
            ThemeMode::Dark => Self::dark(),
            ThemeMode::Light => Self::light(),
            ThemeMode::Color => Self::from_dominant(cover),
        }
    }

    pub fn high_particles(&self) -> Rgb {
        self.particles.first().copied().unwrap_or(Rgb::from_u8(0xff, 0xff, 0xff))
    }

    pub fn low_particles(&self) -> Rgb {
        self.particles.get(1).copied().unwrap_or(Rgb::from_u8(0xcc, 0xcc, 0xcc))
    }

    pub fn triangle_base(&self) -> Hsl {
        self.triangles.first().copied().unwrap_or(Hsl::BLACK)
    }
}

/// Most common quantised colours of an RGBA8 buffer, most frequent first.
///
/// Every 10th pixel is sampled. Transparent, near-black and near-white pixels
/// are skipped. Returns up to five colours, or [`fallback_colors`] when fewer
/// than three survive.
pub fn dominant_colors(rgba: &[u8]) -> Vec<Rgb> {
    let mut counts: HashMap<[u8; 3], usize> = HashMap::new();
    let mut order: Vec<[u8; 3]> = Vec::new();

    for px in rgba.chunks_exact(4).step_by(10) {
        let (r, g, b, a) = (px[0], px[1], px[2], px[3]);
        let sum = r as u32 + g as u32 + b as u32;
        if a < 128 || sum < 50 || sum > 700 {
            continue;
        }
        let key = [r / 32 * 32, g / 32 * 32, b / 32 * 32];
        let count = counts.entry(key).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among ties.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    let colors: Vec<Rgb> = order
        .into_iter()
        .take(5)
        .map(|[r, g, b]| Rgb::from_u8(r, g, b))
        .collect();

    if colors.len() >= 3 {
        colors
    } else {
        fallback_colors()
    }
}

/// Dominant colours of an image file; falls back quietly when it cannot be read.
pub fn cover_colors<P: AsRef<Path>>(path: P) -> Vec<Rgb> {
    match image::open(path.as_ref()) {
        Ok(img) => {
            let colors = dominant_colors(img.to_rgba8().as_raw());
            info!(
                "Cover {:?}: {} dominant colours",
                path.as_ref(),
                colors.len()
            );
            colors
        }
        Err(e) => {
            warn!("Could not read cover {:?}: {}", path.as_ref(), e);
            fallback_colors()
        }
    }
}
