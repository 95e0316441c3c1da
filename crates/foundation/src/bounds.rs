/// Size of the drawing surface in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct View {
    pub width: u32,
    pub height: u32,
}

impl View {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> [f64; 2] {
        [self.width as f64 / 2.0, self.height as f64 / 2.0]
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

/// Axis-aligned bounding box in floating point screen space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }
}

/// Inclusive integer pixel rectangle, always inside a [`View`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub x: i32,
    pub y: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl PixelBounds {
    /// Snaps `bounds` outward to whole pixels and clamps it to `view`.
    ///
    /// Non-finite edges fall back to the view edges.
    pub fn clamped(bounds: Aabb2, view: View) -> Self {
        let w = view.width.max(1) as i32;
        let h = view.height.max(1) as i32;
        let edge = |v: f64, fallback: f64| if v.is_nan() { fallback } else { v };

        let x = edge(bounds.min[0], 0.0).floor().max(0.0).min((w - 1) as f64) as i32;
        let y = edge(bounds.min[1], 0.0).floor().max(0.0).min((h - 1) as f64) as i32;
        let x_max = edge(bounds.max[0], w as f64).ceil().min((w - 1) as f64).max(0.0) as i32;
        let y_max = edge(bounds.max[1], h as f64).ceil().min((h - 1) as f64).max(0.0) as i32;
        Self { x, y, x_max, y_max }
    }

    pub fn width(&self) -> u32 {
        (self.x_max - self.x + 1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y_max - self.y + 1).max(0) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x <= self.x_max && y >= self.y && y <= self.y_max
    }
}

#[cfg(test)]
mod tests {
    use super::{Aabb2, PixelBounds, View};

    #[test]
    fn clamps_to_view() {
        let view = View::new(100, 50);
        let b = PixelBounds::clamped(Aabb2::new([-10.2, 3.7], [120.0, 20.2]), view);
        assert_eq!(
            b,
            PixelBounds {
                x: 0,
                y: 3,
                x_max: 99,
                y_max: 21
            }
        );
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 19);
    }

    #[test]
    fn infinite_edges_fall_back_to_view() {
        let view = View::new(10, 10);
        let b = PixelBounds::clamped(
            Aabb2::new([f64::NEG_INFINITY, f64::NAN], [f64::INFINITY, f64::NAN]),
            view,
        );
        assert_eq!((b.x, b.y, b.x_max, b.y_max), (0, 0, 9, 9));
    }

    #[test]
    fn view_contains_checks_both_axes() {
        let view = View::new(4, 3);
        assert!(view.contains(0, 0));
        assert!(view.contains(3, 2));
        assert!(!view.contains(4, 0));
        assert!(!view.contains(0, -1));
    }
}
