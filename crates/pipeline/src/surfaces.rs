//! Drawing targets of the map and the overlay.

use field::OverlayImage;
use foundation::math::GeoPoint;

use crate::globe::Globe;
use crate::mesh::Mesh;

pub trait MapSurface {
    /// Lays the map out for a new globe or mesh.
    fn define(&mut self, globe: &Globe, mesh: &Mesh);

    /// Re-projects the map after the globe was reoriented.
    fn redraw(&mut self, globe: &Globe);
}

pub trait OverlaySurface {
    fn draw(&mut self, image: &OverlayImage);

    /// Marks grid points at pixel positions.
    fn draw_points(&mut self, points: &[[f64; 2]]);

    fn clear(&mut self);
}

/// Headless map that projects the coastline on every draw and keeps the
/// visible point count.
#[derive(Debug, Default, Clone)]
pub struct RecordingMap {
    lines: Vec<Vec<GeoPoint>>,
    defines: usize,
    redraws: usize,
    visible_points: usize,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defines(&self) -> usize {
        self.defines
    }

    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Coastline points that projected inside the view on the last draw.
    pub fn visible_points(&self) -> usize {
        self.visible_points
    }

    fn project(&mut self, globe: &Globe) {
        let projection = globe.projection();
        let view = globe.view();
        self.visible_points = self
            .lines
            .iter()
            .flatten()
            .filter_map(|p| projection.forward(*p))
            .filter(|[x, y]| view.contains(x.round() as i32, y.round() as i32))
            .count();
    }
}

impl MapSurface for RecordingMap {
    fn define(&mut self, globe: &Globe, mesh: &Mesh) {
        self.lines = mesh.lines.clone();
        self.defines += 1;
        self.project(globe);
    }

    fn redraw(&mut self, globe: &Globe) {
        self.redraws += 1;
        self.project(globe);
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingOverlay {
    painted: Option<usize>,
    points: usize,
    draws: usize,
    clears: usize,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Painted pixels of the image on display, if any.
    pub fn painted(&self) -> Option<usize> {
        self.painted
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl OverlaySurface for RecordingOverlay {
    fn draw(&mut self, image: &OverlayImage) {
        self.painted = Some(image.painted());
        self.draws += 1;
    }

    fn draw_points(&mut self, points: &[[f64; 2]]) {
        self.points = points.len();
    }

    fn clear(&mut self) {
        self.painted = None;
        self.points = 0;
        self.clears += 1;
    }
}
