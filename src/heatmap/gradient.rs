//! Color ramps for heat maps.

use crate::error::{GeoclusterError, Result};
use rustc_hash::FxHashMap;

/// Resolution of the color map generated from a [`Gradient`].
pub const DEFAULT_COLOR_MAP_SIZE: usize = 1000;

/// Pack an opaque color.
pub const fn rgb(red: u8, green: u8, blue: u8) -> u32 {
    argb(0xff, red, green, blue)
}

pub const fn argb(alpha: u8, red: u8, green: u8, blue: u8) -> u32 {
    (alpha as u32) << 24 | (red as u32) << 16 | (green as u32) << 8 | blue as u32
}

fn channels(color: u32) -> [u8; 4] {
    color.to_be_bytes()
}

/// Colors anchored at fractional start points in `[0, 1]`.
///
/// Below the first start point the ramp fades in from transparent; above the last one the
/// last color is held.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    colors: Vec<u32>,
    start_points: Vec<f64>,
    color_map_size: usize,
}

/// One segment of the ramp: `duration` map entries blending `from` into `to`.
#[derive(Debug, Clone, Copy)]
struct ColorInterval {
    from: u32,
    to: u32,
    duration: f64,
}

impl Gradient {
    pub fn new(colors: Vec<u32>, start_points: Vec<f64>) -> Result<Self> {
        Self::with_color_map_size(colors, start_points, DEFAULT_COLOR_MAP_SIZE)
    }

    pub fn with_color_map_size(
        colors: Vec<u32>,
        start_points: Vec<f64>,
        color_map_size: usize,
    ) -> Result<Self> {
        if colors.len() != start_points.len() {
            return Err(GeoclusterError::InvalidArgument(format!(
                "gradient has {} colors but {} start points",
                colors.len(),
                start_points.len()
            )));
        }
        if colors.is_empty() {
            return Err(GeoclusterError::InvalidArgument(
                "gradient has no colors".to_string(),
            ));
        }
        if color_map_size == 0 {
            return Err(GeoclusterError::InvalidArgument(
                "gradient color map size must be greater than zero".to_string(),
            ));
        }
        if let Some(bad) = start_points
            .iter()
            .find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(GeoclusterError::InvalidArgument(format!(
                "gradient start point {} outside [0, 1]",
                bad
            )));
        }
        if start_points.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(GeoclusterError::InvalidArgument(
                "gradient start points must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            colors,
            start_points,
            color_map_size,
        })
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn start_points(&self) -> &[f64] {
        &self.start_points
    }

    pub fn color_map_size(&self) -> usize {
        self.color_map_size
    }

    /// Ramp segments keyed by the map index where each one begins.
    fn color_intervals(&self) -> FxHashMap<usize, ColorInterval> {
        let size = self.color_map_size as f64;
        let mut intervals = FxHashMap::default();

        let first = self.colors[0];
        if self.start_points[0] != 0.0 {
            let [_, r, g, b] = channels(first);
            intervals.insert(
                0,
                ColorInterval {
                    from: argb(0, r, g, b),
                    to: first,
                    duration: size * self.start_points[0],
                },
            );
        }

        for i in 1..self.colors.len() {
            intervals.insert(
                (size * self.start_points[i - 1]) as usize,
                ColorInterval {
                    from: self.colors[i - 1],
                    to: self.colors[i],
                    duration: size * (self.start_points[i] - self.start_points[i - 1]),
                },
            );
        }

        let last = self.colors.len() - 1;
        if self.start_points[last] != 1.0 {
            intervals.insert(
                (size * self.start_points[last]) as usize,
                ColorInterval {
                    from: self.colors[last],
                    to: self.colors[last],
                    duration: size * (1.0 - self.start_points[last]),
                },
            );
        }

        intervals
    }

    /// Expand the ramp into `color_map_size` ARGB entries, scaling alpha by `opacity`.
    pub fn color_map(&self, opacity: f64) -> Vec<u32> {
        let intervals = self.color_intervals();
        let mut interval = intervals.get(&0).copied().unwrap_or(ColorInterval {
            from: self.colors[0],
            to: self.colors[0],
            duration: self.color_map_size as f64,
        });
        let mut start = 0;

        let mut map = Vec::with_capacity(self.color_map_size);
        for i in 0..self.color_map_size {
            if let Some(next) = intervals.get(&i) {
                interval = *next;
                start = i;
            }
            let ratio = (i - start) as f64 / interval.duration;
            map.push(interpolate_color(interval.from, interval.to, ratio));
        }

        if opacity != 1.0 {
            for color in &mut map {
                let [a, r, g, b] = channels(*color);
                *color = argb((f64::from(a) * opacity) as u8, r, g, b);
            }
        }
        map
    }
}

impl Default for Gradient {
    /// Green fading in from transparent, turning red at full intensity.
    fn default() -> Self {
        Self {
            colors: vec![rgb(102, 225, 0), rgb(255, 0, 0)],
            start_points: vec![0.2, 1.0],
            color_map_size: DEFAULT_COLOR_MAP_SIZE,
        }
    }
}

/// Blend two colors in HSV space, taking the short way around the hue circle.
pub(crate) fn interpolate_color(from: u32, to: u32, ratio: f64) -> u32 {
    let [a1, ..] = channels(from);
    let [a2, ..] = channels(to);
    let alpha = ((f64::from(a2) - f64::from(a1)) * ratio + f64::from(a1)) as u8;

    let mut hsv1 = rgb_to_hsv(from);
    let mut hsv2 = rgb_to_hsv(to);
    if hsv1[0] - hsv2[0] > 180.0 {
        hsv2[0] += 360.0;
    } else if hsv2[0] - hsv1[0] > 180.0 {
        hsv1[0] += 360.0;
    }

    let mut blended = [0.0; 3];
    for (i, value) in blended.iter_mut().enumerate() {
        *value = (hsv2[i] - hsv1[i]) * ratio + hsv1[i];
    }
    hsv_to_color(alpha, blended)
}

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
fn rgb_to_hsv(color: u32) -> [f64; 3] {
    let [_, r, g, b] = channels(color);
    let (r, g, b) = (
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    );
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    if hue < 0.0 {
        hue += 360.0;
    }
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    [hue, saturation, max]
}

fn hsv_to_color(alpha: u8, hsv: [f64; 3]) -> u32 {
    let hue = hsv[0].rem_euclid(360.0);
    let saturation = hsv[1].clamp(0.0, 1.0);
    let value = hsv[2].clamp(0.0, 1.0);

    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;

    argb(alpha, channel(r), channel(g), channel(b))
}
