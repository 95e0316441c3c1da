//! Product catalog: which products a configuration selects and how they
//! are loaded.

use std::rc::Rc;

use field::{ColorScale, Grids, ParticleDescriptor, Product, ProductGrid, decode_records};
use foundation::SegmentedColorScale;
use futures::future;
use runtime::{TaskContext, TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Attributes, DEFAULT_OVERLAY, OVERLAY_OFF};
use crate::resources::ResourceLoader;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Vector,
    Scalar,
}

/// Attribute values a product answers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub param: String,
    pub surface: String,
    pub level: String,
}

impl ProductMatch {
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.param == attributes.param
            && self.surface == attributes.surface
            && self.level == attributes.level
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSpec {
    /// Overlay type name.
    pub kind: String,
    pub description: String,
    pub field: FieldKind,
    /// Resources whose records are concatenated, in order.
    pub paths: Vec<String>,
    /// `None` for products only usable as an overlay.
    pub matches: Option<ProductMatch>,
    pub scale: ColorScale,
    pub particles: ParticleDescriptor,
}

impl ProductSpec {
    /// OSCAR surface currents.
    pub fn currents() -> Self {
        let blue = [13, 68, 127];
        Self {
            kind: "currents".to_string(),
            description: "Ocean surface currents (OSCAR)".to_string(),
            field: FieldKind::Vector,
            paths: vec!["oscar/20140131-surface-currents-oscar-0.33.json".to_string()],
            matches: Some(ProductMatch {
                param: "ocean".to_string(),
                surface: "surface".to_string(),
                level: "currents".to_string(),
            }),
            scale: ColorScale {
                bounds: [0.0, 1.5],
                gradient: SegmentedColorScale::new(&[
                    (0.0, blue),
                    (0.15, blue),
                    (0.4, blue),
                    (0.65, blue),
                    (1.0, blue),
                    (1.5, blue),
                ]),
            },
            particles: ParticleDescriptor {
                velocity_scale: 1.0 / 4400.0,
                max_intensity: 0.7,
            },
        }
    }

    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.matches
            .as_ref()
            .is_some_and(|m| m.matches(attributes))
    }

    pub async fn load(&self, loader: Rc<dyn ResourceLoader>) -> TaskResult<Product> {
        let files = future::try_join_all(self.paths.iter().map(|path| loader.load(path)))
            .await
            .map_err(|e| TaskError::failed(format!("{}: {e}", self.kind)))?;

        let mut records = Vec::new();
        for bytes in &files {
            records.extend(
                decode_records(bytes).map_err(|e| TaskError::failed(format!("{}: {e}", self.kind)))?,
            );
        }
        let grid = match self.field {
            FieldKind::Vector => ProductGrid::vectors(&records),
            FieldKind::Scalar => ProductGrid::scalars(&records),
        }
        .map_err(|e| TaskError::failed(format!("{}: {e}", self.kind)))?;

        Ok(Product {
            kind: self.kind.clone(),
            description: self.description.clone(),
            grid,
            scale: self.scale.clone(),
            particles: self.particles,
        })
    }
}

/// The products chosen for one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub primary: Rc<ProductSpec>,
    pub overlay: Option<Rc<ProductSpec>>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: Vec<Rc<ProductSpec>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(ProductSpec::currents());
        catalog
    }

    /// Adds `spec`, replacing any product of the same kind.
    pub fn register(&mut self, spec: ProductSpec) {
        self.specs.retain(|s| s.kind != spec.kind);
        self.specs.push(Rc::new(spec));
    }

    pub fn get(&self, kind: &str) -> Option<&Rc<ProductSpec>> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    pub fn overlay_types(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.kind.as_str()).collect()
    }

    /// First product matching `attributes`, plus the product named by the
    /// overlay type when that names a different registered product.
    pub fn select(&self, attributes: &Attributes) -> Option<Selection> {
        let primary = self.specs.iter().find(|s| s.matches(attributes))?;
        let overlay_type = attributes.overlay_type();
        let overlay = match overlay_type {
            DEFAULT_OVERLAY | OVERLAY_OFF => None,
            kind if kind == primary.kind => None,
            kind => self.get(kind).cloned(),
        };
        Some(Selection {
            primary: Rc::clone(primary),
            overlay,
        })
    }
}

/// Grid agent task: loads the selected products.
pub async fn build_grids(
    ctx: TaskContext,
    selection: Selection,
    loader: Rc<dyn ResourceLoader>,
) -> TaskResult<Grids> {
    let started = ctx.handle().now_ms();
    let primary = selection.primary.load(Rc::clone(&loader));
    let grids = match &selection.overlay {
        Some(overlay) => {
            let (primary, overlay) = future::try_join(primary, overlay.load(loader)).await?;
            Grids::with_overlay(Rc::new(primary), Rc::new(overlay))
        }
        None => Grids::single(Rc::new(primary.await?)),
    };
    if ctx.is_cancelled() {
        return Err(TaskError::Cancelled);
    }
    info!(
        agent = ctx.agent(),
        primary = %grids.primary.kind,
        overlay = %grids.overlay.kind,
        virtual_ms = ctx.handle().now_ms() - started,
        "built grids"
    );
    Ok(grids)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use field::{ColorScale, Grids, ParticleDescriptor};
    use foundation::SegmentedColorScale;
    use pretty_assertions::assert_eq;
    use runtime::{Agent, EventKind, EventLoop, EventTrace};

    use super::{Catalog, FieldKind, ProductSpec, build_grids};
    use crate::config::Attributes;
    use crate::fixtures::{CURRENTS_PATH, tiny_vector_json};
    use crate::resources::{MemoryLoader, ResourceLoader};

    fn temperature() -> ProductSpec {
        ProductSpec {
            kind: "temp".into(),
            description: "Sea surface temperature".into(),
            field: FieldKind::Scalar,
            paths: vec!["temp.json".into()],
            matches: None,
            scale: ColorScale {
                bounds: [0.0, 30.0],
                gradient: SegmentedColorScale::new(&[(0.0, [0, 0, 255]), (30.0, [255, 0, 0])]),
            },
            particles: ParticleDescriptor {
                velocity_scale: 0.0,
                max_intensity: 1.0,
            },
        }
    }

    #[test]
    fn selection_follows_attributes() {
        let mut catalog = Catalog::builtin();
        catalog.register(temperature());
        assert_eq!(catalog.overlay_types(), vec!["currents", "temp"]);

        let attributes = Attributes::default();
        let selection = catalog.select(&attributes).unwrap();
        assert_eq!(selection.primary.kind, "currents");
        assert!(selection.overlay.is_none());

        let with_temp = Attributes {
            overlay_type: "temp".into(),
            ..Attributes::default()
        };
        assert_eq!(catalog.select(&with_temp).unwrap().overlay.unwrap().kind, "temp");

        for overlay in ["off", "currents", "unknown"] {
            let attributes = Attributes {
                overlay_type: overlay.into(),
                ..Attributes::default()
            };
            assert!(catalog.select(&attributes).unwrap().overlay.is_none(), "{overlay}");
        }

        let wind = Attributes {
            param: "wind".into(),
            ..Attributes::default()
        };
        assert!(catalog.select(&wind).is_none());
    }

    fn run(
        catalog: &Catalog,
        attributes: &Attributes,
        files: &[(&str, String)],
    ) -> (Option<Rc<Grids>>, Vec<EventKind>) {
        let mut el = EventLoop::new();
        let loader = MemoryLoader::new(el.handle(), 30);
        for (path, body) in files {
            loader.insert(*path, body.clone());
        }
        let agent: Agent<Grids> = Agent::new("grid", el.handle());
        let trace = EventTrace::new();
        agent.record_into(&trace);
        let selection = catalog.select(attributes).unwrap();
        let loader: Rc<dyn ResourceLoader> = Rc::new(loader);
        agent.submit(move |ctx| build_grids(ctx, selection, loader));
        el.run_until_idle();
        (agent.value(), trace.kinds_for("grid"))
    }

    #[test]
    fn loads_primary_only() {
        let files = [(CURRENTS_PATH, tiny_vector_json())];
        let (grids, kinds) = run(&Catalog::builtin(), &Attributes::default(), &files);
        assert_eq!(kinds, vec![EventKind::Submit, EventKind::Update]);
        let grids = grids.unwrap();
        assert!(!grids.has_distinct_overlay());
        assert_eq!(grids.primary.interpolate_vector(45.0, 45.0), Some([1.0, 0.0, 1.0]));
    }

    #[test]
    fn loads_distinct_overlay() {
        let temp = r#"[{"header": {"lo1": 0, "la1": 90, "dx": 90, "dy": 90, "nx": 4, "ny": 3}, "data": [20,20,20,20,20,20,20,20,20,20,20,20]}]"#;
        let files = [(CURRENTS_PATH, tiny_vector_json()), ("temp.json", temp.to_string())];
        let mut catalog = Catalog::builtin();
        catalog.register(temperature());
        let attributes = Attributes {
            overlay_type: "temp".into(),
            ..Attributes::default()
        };
        let (grids, _) = run(&catalog, &attributes, &files);
        let grids = grids.unwrap();
        assert!(grids.has_distinct_overlay());
        assert_eq!(grids.overlay.interpolate_scalar(10.0, 10.0), Some(20.0));
    }

    #[test]
    fn missing_resource_rejects() {
        let (grids, kinds) = run(&Catalog::builtin(), &Attributes::default(), &[]);
        assert!(grids.is_none());
        assert_eq!(kinds, vec![EventKind::Submit, EventKind::Reject]);
    }
}
