//! Value -> color mapping for overlay layers.
//!
//! A layer's [`ColorRule`] is compiled once from configuration and never changes
//! afterwards; only the input value varies. Two modes exist:
//!
//! - **Discrete**: ordered buckets with half-open intervals `value > min && value <= max`.
//!   The first matching bucket wins, so overlapping buckets resolve by order.
//! - **Continuous**: sorted control points, interpolated channel-wise between the two
//!   points bracketing the value and clamped to the end colors outside the range.
//!
//! Mapping never fails: a value that maps to nothing (no bucket, NaN, empty scale)
//! yields `None`, which callers render as "no fill".

use crate::error::{DashError, DashResult};
use crate::models::{BucketSpec, OverlayLayer, Thresholds};
use log::warn;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::sync::LazyLock;

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// CSS form: `#RRGGBB` when opaque, `rgba(r, g, b, a)` otherwise.
    pub fn to_css(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            let alpha = (self.a as f64 / 255.0 * 1000.0).round() / 1000.0;
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
        }
    }

    /// Channel-wise linear blend; `t` is clamped to `0..=1`.
    pub fn lerp(self, other: Rgba, t: f64) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_css())
    }
}

/// Colors handed out to pinned features, in order.
pub const PIN_PALETTE: [Rgba; 10] = [
    Rgba::rgb(68, 114, 196),
    Rgba::rgb(237, 125, 49),
    Rgba::rgb(165, 165, 165),
    Rgba::rgb(255, 192, 0),
    Rgba::rgb(91, 155, 213),
    Rgba::rgb(112, 173, 71),
    Rgba::rgb(38, 68, 120),
    Rgba::rgb(158, 72, 14),
    Rgba::rgb(99, 99, 99),
    Rgba::rgb(153, 115, 0),
];

static RGB_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rgba?\(\s*([\d.]+)\s*,\s*([\d.]+)\s*,\s*([\d.]+)\s*(?:,\s*([\d.]+%?)\s*)?\)$")
        .expect("valid rgb regex")
});

static HSL_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^hsla?\(\s*(-?[\d.]+)(?:deg)?\s*,\s*([\d.]+)%\s*,\s*([\d.]+)%\s*(?:,\s*([\d.]+%?)\s*)?\)?$",
    )
    .expect("valid hsl regex")
});

/// Parse a CSS-ish color: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()/rgba()`, `hsl()/hsla()`.
pub fn parse_color(s: &str) -> Option<Rgba> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if let Some(c) = RGB_FN.captures(&lower) {
        let ch = |i: usize| -> Option<u8> {
            let v: f64 = c.get(i)?.as_str().parse().ok()?;
            Some(v.clamp(0.0, 255.0).round() as u8)
        };
        let a = alpha_channel(c.get(4).map(|m| m.as_str()))?;
        return Some(Rgba::new(ch(1)?, ch(2)?, ch(3)?, a));
    }
    if let Some(c) = HSL_FN.captures(&lower) {
        let num = |i: usize| -> Option<f64> { c.get(i)?.as_str().parse().ok() };
        let (r, g, b) = hsl_to_rgb8(num(1)?, num(2)? / 100.0, num(3)? / 100.0);
        let a = alpha_channel(c.get(4).map(|m| m.as_str()))?;
        return Some(Rgba::new(r, g, b, a));
    }
    None
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    match hex.len() {
        3 => Some(Rgba::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        6 => Some(Rgba::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn alpha_channel(raw: Option<&str>) -> Option<u8> {
    let Some(raw) = raw else {
        return Some(255);
    };
    let v = match raw.strip_suffix('%') {
        Some(p) => p.parse::<f64>().ok()? / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

// HSL -> RGB conversion (hue in degrees, s/l in 0..1)
fn hsl_to_rgb8(h_deg: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let h = h_deg.rem_euclid(360.0) / 360.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 1.0 / 2.0 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    }

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);
    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub min: f64,
    pub max: f64,
    pub color: Rgba,
    pub label: Option<String>,
}

impl Bucket {
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value > self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorStop {
    pub value: f64,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuousScale {
    /// Sorted ascending by value.
    pub stops: Vec<ColorStop>,
    /// Optional banding: a value is snapped down to the greatest threshold not above it.
    pub thresholds: Vec<f64>,
}

impl ContinuousScale {
    pub fn new(mut stops: Vec<ColorStop>, mut thresholds: Vec<f64>) -> Self {
        stops.sort_by(|a, b| a.value.total_cmp(&b.value));
        thresholds.retain(|t| t.is_finite());
        thresholds.sort_by(|a, b| a.total_cmp(b));
        Self { stops, thresholds }
    }

    pub fn domain(&self) -> Option<(f64, f64)> {
        Some((self.stops.first()?.value, self.stops.last()?.value))
    }

    fn band(&self, value: f64) -> f64 {
        self.thresholds
            .iter()
            .rev()
            .find(|t| **t <= value)
            .copied()
            .unwrap_or(value)
    }

    pub fn color_for(&self, value: f64) -> Option<Rgba> {
        let first = self.stops.first()?;
        let last = self.stops.last()?;
        let v = self.band(value);
        if v <= first.value {
            return Some(first.color);
        }
        if v >= last.value {
            return Some(last.color);
        }
        let upper = self.stops.iter().position(|s| s.value >= v)?;
        let (lo, hi) = (self.stops[upper - 1], self.stops[upper]);
        let span = hi.value - lo.value;
        let t = if span > 0.0 { (v - lo.value) / span } else { 0.0 };
        Some(lo.color.lerp(hi.color, t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ColorRule {
    Discrete { buckets: Vec<Bucket> },
    Continuous(ContinuousScale),
}

impl ColorRule {
    /// Compile a layer's configured rule. A layer with neither `colorMap` nor
    /// `valueColorPairs` has no rule and renders without fill.
    pub fn from_layer(layer: &OverlayLayer) -> DashResult<Option<ColorRule>> {
        Self::compile(
            &layer.name,
            layer.color_map.as_deref(),
            layer.value_color_pairs.as_deref(),
            layer.thresholds.as_ref(),
        )
    }

    /// Compile a rule owned by `owner` (a layer or plugin name, used in errors).
    pub fn compile(
        owner: &str,
        color_map: Option<&[BucketSpec]>,
        value_color_pairs: Option<&[(f64, String)]>,
        thresholds: Option<&Thresholds>,
    ) -> DashResult<Option<ColorRule>> {
        let malformed = |reason: String| DashError::MalformedColorRule {
            layer: owner.to_string(),
            reason,
        };
        match (color_map, value_color_pairs) {
            (Some(_), Some(_)) => Err(malformed(
                "both colorMap and valueColorPairs are set".into(),
            )),
            (Some(map), None) => {
                let mut buckets = Vec::with_capacity(map.len());
                for spec in map {
                    if spec.min.is_nan() || spec.max.is_nan() {
                        return Err(malformed("bucket bound is not a number".into()));
                    }
                    let color = parse_color(&spec.color)
                        .ok_or_else(|| malformed(format!("unparseable color `{}`", spec.color)))?;
                    buckets.push(Bucket {
                        min: spec.min,
                        max: spec.max,
                        color,
                        label: spec.label.clone(),
                    });
                }
                Ok(Some(ColorRule::Discrete { buckets }))
            }
            (None, Some(pairs)) => {
                let stops = compile_stops(pairs).map_err(malformed)?;
                let thresholds = match thresholds {
                    Some(Thresholds::Values(v)) => v.clone(),
                    Some(Thresholds::Count(n)) => {
                        warn!("`{owner}`: thresholds given as a count ({n}) are ignored by continuous rules");
                        Vec::new()
                    }
                    None => Vec::new(),
                };
                Ok(Some(ColorRule::Continuous(ContinuousScale::new(
                    stops, thresholds,
                ))))
            }
            (None, None) => Ok(None),
        }
    }

    /// Map a value to a color. Deterministic; `None` means "no color".
    pub fn color_for(&self, value: f64) -> Option<Rgba> {
        if value.is_nan() {
            return None;
        }
        match self {
            ColorRule::Discrete { buckets } => {
                buckets.iter().find(|b| b.contains(value)).map(|b| b.color)
            }
            ColorRule::Continuous(scale) => scale.color_for(value),
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, ColorRule::Continuous(_))
    }
}

/// Compile `[value, color]` pairs into stops (unsorted; `ContinuousScale::new` sorts).
pub fn compile_stops(pairs: &[(f64, String)]) -> Result<Vec<ColorStop>, String> {
    pairs
        .iter()
        .map(|(value, color)| {
            if !value.is_finite() {
                return Err(format!("stop value {value} is not finite"));
            }
            let color = parse_color(color).ok_or_else(|| format!("unparseable color `{color}`"))?;
            Ok(ColorStop {
                value: *value,
                color,
            })
        })
        .collect()
}
