//! Visibility mask of the projected globe, doubling as the overlay image
//! the field builder paints into.

use foundation::{PixelBounds, Rgba, View};
use foundation::math::Projection;

/// RGBA pixels covering a whole [`View`], row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl OverlayImage {
    pub fn new(view: View) -> Self {
        Self {
            width: view.width,
            height: view.height,
            data: vec![0; view.width as usize * view.height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        View::new(self.width, self.height)
            .contains(x, y)
            .then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Rgba {
        match self.offset(x, y) {
            Some(i) => Rgba([
                self.data[i],
                self.data[i + 1],
                self.data[i + 2],
                self.data[i + 3],
            ]),
            None => Rgba::TRANSPARENT,
        }
    }

    pub fn set(&mut self, x: i32, y: i32, color: Rgba) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 4].copy_from_slice(&color.0);
        }
    }

    /// Number of pixels with non-zero alpha.
    pub fn painted(&self) -> usize {
        self.data.chunks_exact(4).filter(|px| px[3] != 0).count()
    }
}

#[derive(Debug, Clone)]
pub struct Mask {
    view: View,
    visible: Vec<bool>,
    image: OverlayImage,
}

impl Mask {
    /// Marks every pixel inside `bounds` whose position lies within the
    /// projected sphere outline. Pixels outside `bounds` stay invisible.
    pub fn new(projection: &dyn Projection, view: View, bounds: PixelBounds) -> Self {
        let mut visible = vec![false; view.width as usize * view.height as usize];
        for y in bounds.y..=bounds.y_max {
            for x in bounds.x..=bounds.x_max {
                if view.contains(x, y) && projection.in_sphere([x as f64, y as f64]) {
                    visible[y as usize * view.width as usize + x as usize] = true;
                }
            }
        }
        Self {
            view,
            visible,
            image: OverlayImage::new(view),
        }
    }

    pub fn is_visible(&self, x: i32, y: i32) -> bool {
        self.view.contains(x, y)
            && self.visible[y as usize * self.view.width as usize + x as usize]
    }

    pub fn set(&mut self, x: i32, y: i32, color: Rgba) {
        self.image.set(x, y, color);
    }

    pub fn image(&self) -> &OverlayImage {
        &self.image
    }

    pub fn into_image(self) -> OverlayImage {
        self.image
    }
}
