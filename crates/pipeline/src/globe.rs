//! Globes: a named projection fitted to the view, with orientation parsing
//! and drag manipulation.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use foundation::math::{Equirectangular, GeoPoint, Orthographic, Projection, ProjectionParams, clamp};
use foundation::{PixelBounds, View};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobeError {
    UnknownProjection(String),
}

impl fmt::Display for GlobeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobeError::UnknownProjection(name) => write!(f, "unknown projection: {name:?}"),
        }
    }
}

impl std::error::Error for GlobeError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectionKind {
    Orthographic,
    Equirectangular,
}

impl ProjectionKind {
    pub const ALL: [ProjectionKind; 2] = [ProjectionKind::Orthographic, ProjectionKind::Equirectangular];

    pub fn from_name(name: &str) -> Result<Self, GlobeError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| GlobeError::UnknownProjection(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProjectionKind::Orthographic => "orthographic",
            ProjectionKind::Equirectangular => "equirectangular",
        }
    }

    pub fn build(&self, params: ProjectionParams) -> Rc<dyn Projection> {
        match self {
            ProjectionKind::Orthographic => Rc::new(Orthographic::new(params)),
            ProjectionKind::Equirectangular => Rc::new(Equirectangular::new(params)),
        }
    }
}

const SCALE_EXTENT: [f64; 2] = [25.0, 3000.0];
const DEFAULT_ROTATE: [f64; 2] = [0.0, 0.0];

/// A projection fitted to a view. Orientation changes are applied in
/// place, so every holder of the globe sees the current camera.
#[derive(Debug)]
pub struct Globe {
    kind: ProjectionKind,
    view: View,
    params: Cell<ProjectionParams>,
}

impl Globe {
    pub fn new(kind: ProjectionKind, view: View) -> Self {
        let globe = Self {
            kind,
            view,
            params: Cell::new(ProjectionParams::new(DEFAULT_ROTATE, 1.0, view.center())),
        };
        globe.set_params(DEFAULT_ROTATE, globe.fit());
        globe
    }

    pub fn build(name: &str, view: View) -> Result<Self, GlobeError> {
        Ok(Self::new(ProjectionKind::from_name(name)?, view))
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn params(&self) -> ProjectionParams {
        self.params.get()
    }

    pub fn scale(&self) -> f64 {
        self.params.get().scale
    }

    /// Snapshot of the projection as currently oriented.
    pub fn projection(&self) -> Rc<dyn Projection> {
        self.kind.build(self.params.get())
    }

    pub fn center(&self) -> [f64; 2] {
        self.view.center()
    }

    pub fn scale_extent(&self) -> [f64; 2] {
        SCALE_EXTENT
    }

    /// Pixel rectangle covered by the sphere, clamped to the view.
    pub fn bounds(&self) -> PixelBounds {
        PixelBounds::clamped(self.projection().sphere_bounds(), self.view)
    }

    /// Largest scale at which the whole sphere fits the view, less a 10%
    /// margin.
    pub fn fit(&self) -> f64 {
        let unit = self
            .kind
            .build(ProjectionParams::new(DEFAULT_ROTATE, 1.0, self.center()))
            .sphere_bounds();
        let h_scale = unit.width();
        let v_scale = unit.height();
        (self.view.width as f64 / h_scale).min(self.view.height as f64 / v_scale) * 0.9
    }

    pub fn in_sphere(&self, p: [f64; 2]) -> bool {
        self.projection().in_sphere(p)
    }

    pub fn invert(&self, p: [f64; 2]) -> Option<GeoPoint> {
        self.projection().invert(p)
    }

    /// Current orientation as `"λ,φ,scale"`.
    pub fn orientation(&self) -> String {
        let params = self.params.get();
        let positive_zero = |v: f64| if v == 0.0 { 0.0 } else { v };
        format!(
            "{:.2},{:.2},{}",
            positive_zero(-params.rotate[0]),
            positive_zero(-params.rotate[1]),
            params.scale.round()
        )
    }

    /// Applies an orientation string. Missing or malformed center
    /// coordinates fall back to the default rotation, a missing scale to
    /// [`Globe::fit`]; scales are clamped to [`Globe::scale_extent`].
    pub fn orient(&self, orientation: &str) {
        let mut parts = orientation
            .split(',')
            .map(|part| part.trim().parse::<f64>().unwrap_or(f64::NAN));
        let lon = parts.next().unwrap_or(f64::NAN);
        let lat = parts.next().unwrap_or(f64::NAN);
        let scale = parts.next().unwrap_or(f64::NAN);

        let rotate = if lon.is_finite() && lat.is_finite() {
            [-lon, -lat]
        } else {
            DEFAULT_ROTATE
        };
        let [low, high] = SCALE_EXTENT;
        let scale = if scale.is_finite() {
            clamp(scale, low, high)
        } else {
            self.fit()
        };
        self.set_params(rotate, scale);
    }

    fn set_params(&self, rotate: [f64; 2], scale: f64) {
        self.params
            .set(ProjectionParams::new(rotate, scale, self.center()));
    }

    /// Starts a drag or zoom gesture at `start_mouse`.
    pub fn manipulator(&self, start_mouse: [f64; 2], start_scale: f64) -> Manipulator {
        let sensitivity = 60.0 / start_scale;
        let rotate = self.params.get().rotate;
        Manipulator {
            start_mouse,
            sensitivity,
            rotation: [rotate[0] / sensitivity, -rotate[1] / sensitivity],
        }
    }
}

/// Converts pointer travel into globe rotation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Manipulator {
    start_mouse: [f64; 2],
    sensitivity: f64,
    rotation: [f64; 2],
}

impl Manipulator {
    /// Rotates to follow `mouse` (unless zooming) and applies `scale`.
    pub fn move_to(&self, globe: &Globe, mouse: Option<[f64; 2]>, scale: f64) {
        let mut rotate = globe.params().rotate;
        if let Some(mouse) = mouse {
            let xd = mouse[0] - self.start_mouse[0] + self.rotation[0];
            let yd = mouse[1] - self.start_mouse[1] + self.rotation[1];
            rotate = [xd * self.sensitivity, -yd * self.sensitivity];
        }
        globe.set_params(rotate, scale);
    }
}
