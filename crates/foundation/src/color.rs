//! Colors and color scales used by the overlay and particle trails.

use crate::math::proportion;

/// 8-bit RGBA color.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "rgba({r}, {g}, {b}, {:.2})", a as f64 / 255.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Segment {
    low: f64,
    high: f64,
    start: [u8; 3],
    end: [u8; 3],
}

impl Segment {
    fn color(&self, point: f64, alpha: u8) -> Rgba {
        let i = proportion(point, self.low, self.high);
        let lerp = |a: u8, b: u8| (a as f64 + i * (b as f64 - a as f64)).floor() as u8;
        Rgba([
            lerp(self.start[0], self.end[0]),
            lerp(self.start[1], self.end[1]),
            lerp(self.start[2], self.end[2]),
            alpha,
        ])
    }
}

/// Piecewise-linear gradient through `(value, rgb)` stops.
///
/// Values below the first stop take the first color, values above the last
/// stop take the last color.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedColorScale {
    segments: Vec<Segment>,
}

impl SegmentedColorScale {
    /// Needs at least one stop; a single stop yields a constant color.
    pub fn new(stops: &[(f64, [u8; 3])]) -> Self {
        let segments = match stops {
            [] => vec![Segment {
                low: 0.0,
                high: 1.0,
                start: [0, 0, 0],
                end: [0, 0, 0],
            }],
            [(value, rgb)] => vec![Segment {
                low: *value,
                high: *value,
                start: *rgb,
                end: *rgb,
            }],
            _ => stops
                .windows(2)
                .map(|w| Segment {
                    low: w[0].0,
                    high: w[1].0,
                    start: w[0].1,
                    end: w[1].1,
                })
                .collect(),
        };
        Self { segments }
    }

    pub fn gradient(&self, point: f64, alpha: u8) -> Rgba {
        let last = self.segments.len() - 1;
        let idx = self
            .segments
            .iter()
            .take(last)
            .position(|s| point <= s.high)
            .unwrap_or(last);
        self.segments[idx].color(point, alpha)
    }
}

/// Grayscale trail styles, one per intensity bucket.
///
/// Magnitudes are clamped to `max_intensity` and mapped linearly onto the
/// bucket range.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityColorScale {
    styles: Vec<Rgba>,
    max_intensity: f64,
}

impl IntensityColorScale {
    /// Shades run from 85 to 255 in increments of `step`.
    pub fn grayscale(step: u8, max_intensity: f64) -> Self {
        let step = step.max(1) as usize;
        let styles = (85..=255u16)
            .step_by(step)
            .map(|j| Rgba([j as u8, j as u8, j as u8, 255]))
            .collect();
        Self {
            styles,
            max_intensity,
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn styles(&self) -> &[Rgba] {
        &self.styles
    }

    pub fn max_intensity(&self) -> f64 {
        self.max_intensity
    }

    pub fn index_for(&self, magnitude: f64) -> usize {
        let top = self.styles.len().saturating_sub(1);
        if !(self.max_intensity > 0.0) || !magnitude.is_finite() {
            return 0;
        }
        let p = magnitude.clamp(0.0, self.max_intensity) / self.max_intensity;
        ((p * top as f64).floor() as usize).min(top)
    }
}

#[cfg(test)]
mod tests {
    use super::{IntensityColorScale, Rgba, SegmentedColorScale};

    #[test]
    fn gradient_interpolates_within_segment() {
        let scale = SegmentedColorScale::new(&[(0.0, [0, 0, 0]), (1.0, [200, 100, 50])]);
        assert_eq!(scale.gradient(0.5, 127), Rgba([100, 50, 25, 127]));
        assert_eq!(scale.gradient(-1.0, 10), Rgba([0, 0, 0, 10]));
        assert_eq!(scale.gradient(9.0, 10), Rgba([200, 100, 50, 10]));
    }

    #[test]
    fn gradient_selects_segment_by_upper_stop() {
        let scale = SegmentedColorScale::new(&[
            (0.0, [0, 0, 0]),
            (1.0, [100, 100, 100]),
            (2.0, [100, 0, 0]),
        ]);
        assert_eq!(scale.gradient(1.0, 255), Rgba([100, 100, 100, 255]));
        assert_eq!(scale.gradient(1.5, 255), Rgba([100, 50, 50, 255]));
    }

    #[test]
    fn intensity_scale_has_eighteen_shades() {
        let scale = IntensityColorScale::grayscale(10, 0.7);
        assert_eq!(scale.len(), 18);
        assert_eq!(scale.styles()[0], Rgba([85, 85, 85, 255]));
        assert_eq!(scale.styles()[17], Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn intensity_index_covers_both_ends() {
        let scale = IntensityColorScale::grayscale(10, 0.7);
        assert_eq!(scale.index_for(0.0), 0);
        assert_eq!(scale.index_for(0.7), 17);
        assert_eq!(scale.index_for(12.0), 17);
        assert_eq!(scale.index_for(0.35), 8);
        assert_eq!(scale.index_for(f64::NAN), 0);
    }

    #[test]
    fn rgba_displays_as_css() {
        assert_eq!(Rgba([1, 2, 3, 255]).to_string(), "rgba(1, 2, 3, 1.00)");
    }
}
