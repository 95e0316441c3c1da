//! Cooperative construction of the screen-space [`Field`].
//!
//! Columns are interpolated left to right in slices bounded by a
//! [`SlicePolicy`]; between slices the build sleeps on the event loop so
//! input handling keeps running, and checks its cancellation token.

use std::rc::Rc;
use std::time::{Duration, Instant};

use foundation::math::Projection;
use foundation::{PixelBounds, Rgba, SegmentedColorScale, View};
use runtime::{SlicePolicy, TaskContext, TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::distortion::distort;
use crate::field::{BuildStats, Field, VectorSample};
use crate::mask::Mask;
use crate::product::{Grids, Product};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldSettings {
    /// Wall-clock budget of one slice.
    pub max_task_time_ms: u64,
    /// Pause between slices. Zero still yields to the loop.
    pub min_sleep_ms: u64,
    pub overlay_alpha: u8,
    /// Scalar colored where no data is available.
    pub default_overlay_scalar: f64,
    /// Fixed number of columns per slice instead of the wall-clock budget.
    pub columns_per_slice: Option<u32>,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            max_task_time_ms: 100,
            min_sleep_ms: 25,
            overlay_alpha: 127,
            default_overlay_scalar: 0.2,
            columns_per_slice: None,
        }
    }
}

impl FieldSettings {
    pub fn slice_policy(&self) -> SlicePolicy {
        match self.columns_per_slice {
            Some(columns) => SlicePolicy::Units(columns),
            None => SlicePolicy::WallClock(Duration::from_millis(self.max_task_time_ms)),
        }
    }
}

/// Everything a field build reads. Cloned into the build task.
#[derive(Debug, Clone)]
pub struct FieldRequest {
    pub projection: Rc<dyn Projection>,
    pub view: View,
    pub bounds: PixelBounds,
    pub grids: Grids,
}

impl FieldRequest {
    pub fn new(projection: Rc<dyn Projection>, view: View, grids: Grids) -> Self {
        let bounds = PixelBounds::clamped(projection.sphere_bounds(), view);
        Self {
            projection,
            view,
            bounds,
            grids,
        }
    }
}

/// Per-pixel interpolation shared by every column of one build.
struct ColumnInterpolator<'a> {
    projection: &'a dyn Projection,
    bounds: PixelBounds,
    primary: &'a Product,
    overlay: Option<&'a Product>,
    velocity_scale: f64,
    gradient: &'a SegmentedColorScale,
    alpha: u8,
    default_color: Rgba,
}

impl<'a> ColumnInterpolator<'a> {
    fn new(request: &'a FieldRequest, settings: &FieldSettings) -> Self {
        let grids = &request.grids;
        let primary = grids.primary.as_ref();
        let gradient = &grids.overlay.scale.gradient;
        Self {
            projection: request.projection.as_ref(),
            bounds: request.bounds,
            primary,
            overlay: grids
                .has_distinct_overlay()
                .then(|| grids.overlay.as_ref()),
            velocity_scale: request.bounds.height() as f64 * primary.particles.velocity_scale,
            gradient,
            alpha: settings.overlay_alpha,
            default_color: gradient.gradient(settings.default_overlay_scalar, settings.overlay_alpha),
        }
    }

    /// Sample and overlay color for one visible pixel.
    fn pixel(&self, x: i32, y: i32) -> (VectorSample, Rgba) {
        let (px, py) = (x as f64, y as f64);
        let geo = match self.projection.invert([px, py]) {
            Some(geo) if geo.lon.is_finite() => geo,
            _ => return (VectorSample::Hole, self.default_color),
        };

        let wind = self.primary.interpolate_vector(geo.lon, geo.lat);
        let mut scalar = wind.map(|[_, _, m]| m);
        let sample = VectorSample::from_distorted(
            wind.and_then(|wind| distort(self.projection, geo, px, py, self.velocity_scale, wind)),
        );
        if let Some(overlay) = self.overlay {
            scalar = overlay.interpolate_scalar(geo.lon, geo.lat);
        }

        let color = match scalar {
            Some(s) if s.is_finite() => self.gradient.gradient(s, self.alpha),
            _ => self.default_color,
        };
        (sample, color)
    }

    fn column(&self, x: i32, mask: &mut Mask, samples: &mut Vec<VectorSample>) {
        for y in self.bounds.y..=self.bounds.y_max {
            if mask.is_visible(x, y) {
                let (sample, color) = self.pixel(x, y);
                mask.set(x, y, color);
                samples.push(sample);
            } else {
                samples.push(VectorSample::Outside);
            }
        }
    }
}

/// Builds the field for `request`, yielding between slices.
///
/// Resolves to [`TaskError::Cancelled`] as soon as the token is observed
/// set; no partial field is ever produced.
pub async fn interpolate_field(
    ctx: TaskContext,
    request: FieldRequest,
    settings: FieldSettings,
) -> TaskResult<Field> {
    if !request.grids.primary.grid.is_vector() {
        return Err(TaskError::failed(format!(
            "{} has no vector data to animate",
            request.grids.primary.kind
        )));
    }

    let started = Instant::now();
    let bounds = request.bounds;
    let policy = settings.slice_policy();
    let interpolator = ColumnInterpolator::new(&request, &settings);
    let mut mask = Mask::new(request.projection.as_ref(), request.view, bounds);
    let mut samples =
        Vec::with_capacity(bounds.width() as usize * bounds.height() as usize);

    let mut stats = BuildStats::default();
    let mut x = bounds.x;
    loop {
        if ctx.is_cancelled() {
            debug!(agent = ctx.agent(), column = x, "field build cancelled");
            return Err(TaskError::Cancelled);
        }
        stats.slices += 1;
        let mut budget = policy.start();
        while x <= bounds.x_max {
            interpolator.column(x, &mut mask, &mut samples);
            stats.columns += 1;
            x += 1;
            budget.consume(1);
            if budget.is_exhausted() {
                break;
            }
        }
        if x > bounds.x_max {
            break;
        }
        ctx.sleep(settings.min_sleep_ms).await;
    }

    stats.defined = samples.iter().filter(|s| s.is_defined()).count();
    info!(
        agent = ctx.agent(),
        columns = stats.columns,
        slices = stats.slices,
        defined = stats.defined,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "interpolated field"
    );
    Ok(Field::new(bounds, samples, mask.into_image(), stats))
}
