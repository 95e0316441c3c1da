//! The overlay stage: puts a field's color image and, optionally, the
//! data grid's points on the overlay surface.

use std::cell::RefCell;
use std::rc::Rc;

use field::{Field, Product};
use foundation::math::{GeoPoint, Projection};
use runtime::{TaskContext, TaskResult};
use serde::Serialize;
use tracing::debug;

use crate::config::OVERLAY_OFF;
use crate::surfaces::OverlaySurface;

/// What the overlay agent last put on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayFrame {
    /// Painted pixels of the drawn image, `None` when the overlay is blank.
    pub painted: Option<usize>,
    pub grid_points: usize,
}

#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub field: Rc<Field>,
    /// `None` clears the overlay without drawing.
    pub overlay_type: Option<String>,
    /// Grid whose points are marked, with the projection placing them.
    pub grid_points: Option<(Rc<Product>, Rc<dyn Projection>)>,
}

fn unit_vector(p: GeoPoint) -> [f64; 3] {
    let (lambda, phi) = (p.lon.to_radians(), p.lat.to_radians());
    [phi.cos() * lambda.cos(), phi.cos() * lambda.sin(), phi.sin()]
}

/// True when `a` and `b` name the same place on the sphere.
fn same_place(a: GeoPoint, b: GeoPoint) -> bool {
    let (u, v) = (unit_vector(a), unit_vector(b));
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2] > 1.0 - 1e-9
}

/// Grid points of `product` on the visible side of the globe that land
/// inside the field's bounds. Only the bounds are consulted, so a field
/// whose samples were released still places its points.
pub fn project_grid_points(
    product: &Product,
    projection: &dyn Projection,
    field: &Field,
) -> Vec<[f64; 2]> {
    product
        .grid
        .defined_points()
        .into_iter()
        .filter_map(|geo| {
            let p = projection.forward(geo)?;
            let back = projection.invert(p)?;
            same_place(geo, back).then_some(p)
        })
        .filter(|[x, y]| {
            let (px, py) = ((x + 0.5).floor(), (y + 0.5).floor());
            field.bounds().contains(px as i32, py as i32)
        })
        .collect()
}

/// Overlay agent task.
pub async fn draw_overlay(
    ctx: TaskContext,
    request: OverlayRequest,
    surface: Rc<RefCell<dyn OverlaySurface>>,
) -> TaskResult<OverlayFrame> {
    let mut surface = surface.borrow_mut();
    surface.clear();

    let Some(overlay_type) = request.overlay_type else {
        debug!(agent = ctx.agent(), "overlay cleared");
        return Ok(OverlayFrame::default());
    };
    let mut frame = OverlayFrame::default();
    if overlay_type != OVERLAY_OFF {
        let image = request.field.overlay();
        surface.draw(image);
        frame.painted = Some(image.painted());
    }
    if let Some((product, projection)) = &request.grid_points {
        let points = project_grid_points(product, projection.as_ref(), &request.field);
        surface.draw_points(&points);
        frame.grid_points = points.len();
    }
    debug!(
        agent = ctx.agent(),
        overlay = %overlay_type,
        painted = ?frame.painted,
        grid_points = frame.grid_points,
        "overlay drawn"
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use field::{
        BuildStats, ColorScale, Field, Grid, GridHeader, OverlayImage, ParticleDescriptor,
        Product, ProductGrid, VectorSample,
    };
    use foundation::math::GeoPoint;
    use foundation::{SegmentedColorScale, View};
    use pretty_assertions::assert_eq;

    use super::{project_grid_points, same_place};
    use crate::globe::{Globe, ProjectionKind};

    fn coarse_product() -> Product {
        let header = GridHeader::new(0.0, 90.0, 45.0, 45.0, 8, 5);
        Product {
            kind: "temp".to_string(),
            description: "temp".to_string(),
            grid: ProductGrid::Scalar(Grid::from_fn(header, |_| Some(1.0))),
            scale: ColorScale {
                bounds: [0.0, 1.0],
                gradient: SegmentedColorScale::new(&[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])]),
            },
            particles: ParticleDescriptor {
                velocity_scale: 0.01,
                max_intensity: 1.0,
            },
        }
    }

    #[test]
    fn grid_points_survive_a_released_field() {
        let view = View::new(200, 150);
        let globe = Globe::new(ProjectionKind::Orthographic, view);
        let bounds = globe.bounds();
        let samples = vec![
            VectorSample::Value {
                u: 0.0,
                v: 0.0,
                magnitude: 0.0,
            };
            bounds.width() as usize * bounds.height() as usize
        ];
        let field = Field::new(bounds, samples, OverlayImage::new(view), BuildStats::default());
        let product = coarse_product();
        let projection = globe.projection();

        let before = project_grid_points(&product, projection.as_ref(), &field);
        assert!(!before.is_empty());
        field.release();
        let after = project_grid_points(&product, projection.as_ref(), &field);
        assert_eq!(after, before);
    }

    #[test]
    fn far_side_points_do_not_round_trip() {
        let globe = Globe::new(ProjectionKind::Orthographic, View::new(200, 150));
        let projection = globe.projection();
        for (lon, lat, visible) in [(0.0, 0.0, true), (45.0, 30.0, true), (180.0, 0.0, false)] {
            let geo = GeoPoint::new(lon, lat);
            let p = projection.forward(geo).unwrap();
            let back = projection.invert(p).unwrap();
            assert_eq!(same_place(geo, back), visible, "{geo:?}");
        }
        assert!(same_place(GeoPoint::new(10.0, 90.0), GeoPoint::new(-70.0, 90.0)));
    }
}
