use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Hue/saturation/lightness triple, each component in 0.0-1.0.
///
/// Serialized as a plain `[h, s, l]` array so palettes stay readable in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub const BLACK: Hsl = Hsl::new(0.0, 0.0, 0.0);

    pub const fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }

    /// Component-wise linear blend; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Hsl, t: f32) -> Hsl {
        Hsl {
            h: self.h + (other.h - self.h) * t,
            s: self.s + (other.s - self.s) * t,
            l: self.l + (other.l - self.l) * t,
        }
    }

    /// Hue wraps, saturation and lightness clamp.
    pub fn to_rgb(self) -> Rgb {
        let h = self.h.rem_euclid(1.0);
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);

        if s == 0.0 {
            return Rgb::new(l, l, l);
        }

        let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        Rgb::new(
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    }
}

impl From<[f32; 3]> for Hsl {
    fn from(v: [f32; 3]) -> Self {
        Hsl::new(v[0], v[1], v[2])
    }
}

impl From<Hsl> for [f32; 3] {
    fn from(c: Hsl) -> Self {
        [c.h, c.s, c.l]
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

/// sRGB colour with components in 0.0-1.0.
///
/// Parses and prints as CSS-style strings (`#rrggbb`, `#rgb`, `rgb(r, g, b)`
/// or one of a handful of names).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn to_u8(self) -> [u8; 3] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    pub fn to_hsl(self) -> Hsl {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let l = (max + min) / 2.0;

        if max == min {
            return Hsl::new(0.0, 0.0, l);
        }

        let d = max - min;
        let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
        let h = if max == self.r {
            (self.g - self.b) / d + if self.g < self.b { 6.0 } else { 0.0 }
        } else if max == self.g {
            (self.b - self.r) / d + 2.0
        } else {
            (self.r - self.g) / d + 4.0
        };

        Hsl::new(h / 6.0, s, l)
    }

    /// Linear-light RGBA for an sRGB render target.
    pub fn to_linear_rgba(self) -> [f32; 4] {
        fn decode(c: f32) -> f32 {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        [decode(self.r), decode(self.g), decode(self.b), 1.0]
    }
}

impl FromStr for Rgb {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let invalid = || EngineError::InvalidColor(s.to_string());

        match text.as_str() {
            "white" => return Ok(Rgb::WHITE),
            "black" => return Ok(Rgb::new(0.0, 0.0, 0.0)),
            "gray" | "grey" => return Ok(Rgb::from_u8(128, 128, 128)),
            _ => {}
        }

        if let Some(hex) = text.strip_prefix('#') {
            let digits = match hex.len() {
                3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
                6 => hex.to_string(),
                _ => return Err(invalid()),
            };
            let value = u32::from_str_radix(&digits, 16).map_err(|_| invalid())?;
            return Ok(Rgb::from_u8((value >> 16) as u8, (value >> 8) as u8, value as u8));
        }

        if let Some(inner) = text.strip_prefix("rgb(").and_then(|t| t.strip_suffix(')')) {
            let channels = inner
                .split(',')
                .map(|part| part.trim().parse::<u8>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid())?;
            if let [r, g, b] = channels[..] {
                return Ok(Rgb::from_u8(r, g, b));
            }
        }

        Err(invalid())
    }
}

impl TryFrom<String> for Rgb {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.to_u8();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_css_forms() {
        assert_eq!("#ffffff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!("#fff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!(
            "rgb(212,212,212)".parse::<Rgb>().unwrap().to_u8(),
            [212, 212, 212]
        );
        assert_eq!("White".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("rgb(1,2)".parse::<Rgb>().is_err());
    }

    #[test]
    fn hsl_greys_and_primaries() {
        assert_eq!(Hsl::new(0.0, 0.0, 0.4).to_rgb(), Rgb::new(0.4, 0.4, 0.4));

        let red = Hsl::new(0.0, 1.0, 0.5).to_rgb();
        assert!((red.r - 1.0).abs() < 1e-6 && red.g.abs() < 1e-6 && red.b.abs() < 1e-6);

        let magenta = Hsl::new(0.83, 1.0, 0.5).to_rgb();
        assert!(magenta.r > 0.9 && magenta.b > 0.9 && magenta.g < 0.1);
    }

    #[test]
    fn hsl_dark_and_light_halves() {
        let close = |a: Rgb, b: Rgb| {
            (a.r - b.r).abs() < 1e-5 && (a.g - b.g).abs() < 1e-5 && (a.b - b.b).abs() < 1e-5
        };
        assert!(close(
            Hsl::new(1.0 / 3.0, 1.0, 0.25).to_rgb(),
            Rgb::new(0.0, 0.5, 0.0)
        ));
        assert!(close(
            Hsl::new(2.0 / 3.0, 1.0, 0.75).to_rgb(),
            Rgb::new(0.5, 0.5, 1.0)
        ));
    }

    #[test]
    fn rgb_hsl_round_trip_on_a_theme_colour() {
        let violet = "#8B5CF6".parse::<Rgb>().unwrap();
        let back = violet.to_hsl().to_rgb();
        assert_eq!(back.to_u8(), violet.to_u8());
    }

    #[test]
    fn lerp_endpoints() {
        let a = Hsl::new(0.0, 0.0, 0.0);
        let b = Hsl::new(0.83, 1.0, 0.5);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }
}
