//! The interpolated screen-space vector field.

use std::cell::{Cell, RefCell};

use foundation::PixelBounds;
use rand::Rng;

use crate::mask::OverlayImage;

/// What the field knows about one pixel.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum VectorSample {
    /// Not covered by the projected globe.
    #[default]
    Outside,
    /// On the globe, but no data could be interpolated or projected there.
    Hole,
    /// Pixel-space velocity and the original magnitude.
    Value { u: f64, v: f64, magnitude: f64 },
}

impl VectorSample {
    pub fn from_distorted(value: Option<[f64; 3]>) -> Self {
        match value {
            Some([u, v, magnitude]) => VectorSample::Value { u, v, magnitude },
            None => VectorSample::Hole,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, VectorSample::Value { .. })
    }

    pub fn is_inside_boundary(&self) -> bool {
        !matches!(self, VectorSample::Outside)
    }

    pub fn magnitude(&self) -> Option<f64> {
        match self {
            VectorSample::Value { magnitude, .. } => Some(*magnitude),
            _ => None,
        }
    }
}

/// Counters describing how a field was built.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BuildStats {
    pub columns: u32,
    pub slices: u32,
    pub defined: usize,
}

/// Samples for every pixel of `bounds`, stored column by column.
///
/// Lookups outside `bounds`, and any lookup after [`Field::release`],
/// report [`VectorSample::Outside`].
#[derive(Debug)]
pub struct Field {
    bounds: PixelBounds,
    samples: RefCell<Vec<VectorSample>>,
    released: Cell<bool>,
    overlay: OverlayImage,
    stats: BuildStats,
}

impl Field {
    /// `samples` must hold `bounds.height()` entries per column, columns
    /// ordered from `bounds.x` to `bounds.x_max`.
    pub fn new(
        bounds: PixelBounds,
        samples: Vec<VectorSample>,
        overlay: OverlayImage,
        stats: BuildStats,
    ) -> Self {
        Self {
            bounds,
            samples: RefCell::new(samples),
            released: Cell::new(false),
            overlay,
            stats,
        }
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn overlay(&self) -> &OverlayImage {
        &self.overlay
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Sample at the pixel nearest to `(x, y)`; halves round up.
    pub fn sample(&self, x: f64, y: f64) -> VectorSample {
        let (px, py) = ((x + 0.5).floor(), (y + 0.5).floor());
        if !px.is_finite() || !py.is_finite() {
            return VectorSample::Outside;
        }
        let (px, py) = (px as i32, py as i32);
        if !self.bounds.contains(px, py) {
            return VectorSample::Outside;
        }
        let column = (px - self.bounds.x) as usize;
        let row = (py - self.bounds.y) as usize;
        let index = column * self.bounds.height() as usize + row;
        self.samples
            .borrow()
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_defined(&self, x: f64, y: f64) -> bool {
        self.sample(x, y).is_defined()
    }

    pub fn is_inside_boundary(&self, x: f64, y: f64) -> bool {
        self.sample(x, y).is_inside_boundary()
    }

    /// Drops the sample storage. Idempotent.
    pub fn release(&self) {
        if !self.released.replace(true) {
            self.samples.replace(Vec::new());
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Random pixel inside `bounds`, retried up to `retries` extra times
    /// until it lands on a defined sample. The last draw is returned either
    /// way, so the caller must still check it.
    pub fn randomize<R: Rng + ?Sized>(&self, rng: &mut R, retries: u32) -> (f64, f64) {
        let b = self.bounds;
        let mut draw = || {
            (
                rng.gen_range(b.x..=b.x_max) as f64,
                rng.gen_range(b.y..=b.y_max) as f64,
            )
        };
        let mut position = draw();
        for _ in 0..retries {
            if self.is_defined(position.0, position.1) {
                break;
            }
            position = draw();
        }
        position
    }
}

#[cfg(test)]
mod tests {
    use foundation::{PixelBounds, View};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{BuildStats, Field, VectorSample};
    use crate::mask::OverlayImage;

    fn value(u: f64) -> VectorSample {
        VectorSample::Value {
            u,
            v: 0.0,
            magnitude: u.abs(),
        }
    }

    /// 3x2 field at (10, 20); column 0 is outside, column 1 holes, column 2 defined.
    fn small_field() -> Field {
        let bounds = PixelBounds {
            x: 10,
            y: 20,
            x_max: 12,
            y_max: 21,
        };
        let samples = vec![
            VectorSample::Outside,
            VectorSample::Outside,
            VectorSample::Hole,
            VectorSample::Hole,
            value(1.0),
            value(2.0),
        ];
        Field::new(
            bounds,
            samples,
            OverlayImage::new(View::new(20, 30)),
            BuildStats::default(),
        )
    }

    #[test]
    fn sample_rounds_to_nearest_pixel() {
        let field = small_field();
        assert_eq!(field.sample(11.6, 20.4), value(1.0));
        assert_eq!(field.sample(12.0, 20.5), value(2.0));
        assert_eq!(field.sample(10.9, 21.0), VectorSample::Hole);
    }

    #[test]
    fn predicates_follow_sample_kind() {
        let field = small_field();
        assert!(!field.is_inside_boundary(10.0, 20.0));
        assert!(!field.is_defined(10.0, 20.0));
        assert!(field.is_inside_boundary(11.0, 20.0));
        assert!(!field.is_defined(11.0, 20.0));
        assert!(field.is_inside_boundary(12.0, 21.0));
        assert!(field.is_defined(12.0, 21.0));
    }

    #[test]
    fn out_of_bounds_is_outside() {
        let field = small_field();
        assert_eq!(field.sample(9.0, 20.0), VectorSample::Outside);
        assert_eq!(field.sample(12.0, 22.0), VectorSample::Outside);
        assert_eq!(field.sample(f64::NAN, 20.0), VectorSample::Outside);
    }

    #[test]
    fn release_is_idempotent() {
        let field = small_field();
        field.release();
        field.release();
        assert!(field.is_released());
        assert_eq!(field.sample(12.0, 21.0), VectorSample::Outside);
    }

    #[test]
    fn randomize_stays_in_bounds_and_prefers_defined() {
        let field = small_field();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut defined = 0;
        for _ in 0..200 {
            let (x, y) = field.randomize(&mut rng, 30);
            assert!((10.0..13.0).contains(&x), "{x}");
            assert!((20.0..22.0).contains(&y), "{y}");
            if field.is_defined(x, y) {
                defined += 1;
            }
        }
        assert!(defined > 190, "{defined}");
    }

    #[test]
    fn randomize_gives_up_on_empty_field() {
        let bounds = PixelBounds {
            x: 0,
            y: 0,
            x_max: 1,
            y_max: 1,
        };
        let field = Field::new(
            bounds,
            vec![VectorSample::Hole; 4],
            OverlayImage::new(View::new(2, 2)),
            BuildStats::default(),
        );
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..1000 {
            let (x, y) = field.randomize(&mut rng, 30);
            assert!(!field.is_defined(x, y));
            assert!(field.is_inside_boundary(x, y));
        }
    }

    #[test]
    fn randomize_draws_whole_pixels_evenly() {
        let bounds = PixelBounds {
            x: 4,
            y: 0,
            x_max: 5,
            y_max: 0,
        };
        let field = Field::new(
            bounds,
            vec![value(1.0), value(1.0)],
            OverlayImage::new(View::new(8, 1)),
            BuildStats::default(),
        );
        let mut rng = SmallRng::seed_from_u64(3);
        let mut columns = [0usize; 2];
        for _ in 0..10_000 {
            let (x, y) = field.randomize(&mut rng, 0);
            assert_eq!((x.fract(), y), (0.0, 0.0));
            assert!(field.is_defined(x, y));
            columns[x as usize - 4] += 1;
        }
        assert!(columns.iter().all(|&n| (4_500..=5_500).contains(&n)));
    }
}
