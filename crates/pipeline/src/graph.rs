//! The pipeline graph: seven agents wired to the configuration, the input
//! controller and each other.
//!
//! ```text
//! configuration ─┬─ topology ──────────────▶ mesh ──┐
//!                ├─ projection ────────────▶ globe ─┴▶ renderer ─ start/redraw/render
//!                ├─ date,…,overlayType ────▶ grid ─────────┐            │
//!                └─ overlayType,gridPoints ─▶ overlay       ▼            ▼
//!                                                   field ◀─────────────┘
//!                                                     └──▶ animator, overlay
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use field::{Field, FieldRequest, Grids, interpolate_field};
use foundation::View;
use particles::{Animation, ParticleCanvas, RecordingCanvas, animate};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use runtime::{
    Agent, AgentEvent, Emitter, EventKind, EventTrace, LoopHandle, Metrics, TaskError,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{Catalog, build_grids};
use crate::config::{
    Attributes, ChangeSource, ConfigChange, ConfigKey, Configuration, DEFAULT_OVERLAY,
    EngineSettings, OVERLAY_OFF,
};
use crate::globe::Globe;
use crate::input::InputController;
use crate::mesh::{Mesh, load_mesh};
use crate::overlay::{OverlayFrame, OverlayRequest, draw_overlay};
use crate::renderer::{RenderSignal, Renderer, RendererWiring, build_renderer};
use crate::resources::ResourceLoader;
use crate::surfaces::{MapSurface, OverlaySurface, RecordingMap, RecordingOverlay};

/// Keys whose change always requires new grids.
const GRID_KEYS: [ConfigKey; 5] = [
    ConfigKey::Date,
    ConfigKey::Hour,
    ConfigKey::Param,
    ConfigKey::Surface,
    ConfigKey::Level,
];

/// Drawing targets handed to the pipeline.
#[derive(Clone)]
pub struct Surfaces {
    pub map: Rc<RefCell<dyn MapSurface>>,
    pub overlay: Rc<RefCell<dyn OverlaySurface>>,
    pub particles: Rc<RefCell<dyn ParticleCanvas>>,
}

/// Recording surfaces with typed access for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurfaces {
    pub map: Rc<RefCell<RecordingMap>>,
    pub overlay: Rc<RefCell<RecordingOverlay>>,
    pub particles: Rc<RefCell<RecordingCanvas>>,
}

impl RecordingSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surfaces(&self) -> Surfaces {
        Surfaces {
            map: self.map.clone(),
            overlay: self.overlay.clone(),
            particles: self.particles.clone(),
        }
    }
}

/// Whether a configuration change needs new grids, given the grids
/// currently loaded.
pub fn grid_rebuild_required(
    change: &ConfigChange,
    attributes: &Attributes,
    current: Option<&Grids>,
) -> bool {
    if change.touches(&GRID_KEYS) {
        return true;
    }
    let overlay_type = attributes.overlay_type();
    if !change.contains(ConfigKey::OverlayType) || overlay_type == OVERLAY_OFF {
        return false;
    }
    match current {
        None => true,
        Some(grids) => {
            grids.overlay.kind != overlay_type
                && !(overlay_type == DEFAULT_OVERLAY && !grids.has_distinct_overlay())
        }
    }
}

struct Inner {
    handle: LoopHandle,
    settings: EngineSettings,
    view: Cell<View>,
    config: Configuration,
    catalog: Catalog,
    loader: Rc<dyn ResourceLoader>,
    input: InputController,
    surfaces: Surfaces,
    wiring: Rc<RendererWiring>,
    rng: RefCell<SmallRng>,
    metrics: RefCell<Metrics>,
    trace: EventTrace,
    mesh: Agent<Mesh>,
    globe: Agent<Globe>,
    grid: Agent<Grids>,
    renderer: Agent<Renderer>,
    field: Agent<Field>,
    animator: Agent<Animation>,
    overlay: Agent<OverlayFrame>,
}

/// Runs `f` with the pipeline for as long as the pipeline is alive.
fn handler<E, F>(inner: &Rc<Inner>, f: F) -> impl Fn(&E) + use<E, F>
where
    E: ?Sized + 'static,
    F: Fn(&Inner, &E) + 'static,
{
    let weak = Rc::downgrade(inner);
    move |event: &E| {
        if let Some(inner) = weak.upgrade() {
            f(&inner, event);
        }
    }
}

impl Inner {
    fn submit_mesh(&self) {
        let path = self.config.get(ConfigKey::Topology);
        let loader = Rc::clone(&self.loader);
        self.mesh.submit(move |ctx| load_mesh(ctx, loader, path));
    }

    fn submit_globe(&self) {
        let name = self.config.get(ConfigKey::Projection);
        let view = self.view.get();
        self.globe.submit(move |_ctx| async move {
            Globe::build(&name, view).map_err(|e| TaskError::failed(e.to_string()))
        });
    }

    fn submit_grids(&self) {
        let attributes = self.config.attributes();
        let Some(selection) = self.catalog.select(&attributes) else {
            let reason = format!(
                "no product for {}/{}/{}",
                attributes.param, attributes.surface, attributes.level
            );
            self.grid
                .submit(move |_ctx| async move { Err::<Grids, _>(TaskError::failed(reason)) });
            return;
        };
        let loader = Rc::clone(&self.loader);
        self.grid
            .submit(move |ctx| build_grids(ctx, selection, loader));
    }

    fn start_rendering(&self) {
        let (Some(mesh), Some(globe)) = (self.mesh.value(), self.globe.value()) else {
            return;
        };
        let wiring = Rc::clone(&self.wiring);
        self.renderer
            .submit(move |ctx| build_renderer(ctx, wiring, mesh, globe));
    }

    fn submit_field(&self) {
        let (Some(globe), Some(grids)) = (self.globe.value(), self.grid.value()) else {
            return;
        };
        let request = FieldRequest::new(globe.projection(), globe.view(), (*grids).clone());
        let settings = self.settings.field.clone();
        self.field
            .submit(move |ctx| interpolate_field(ctx, request, settings));
    }

    fn submit_animation(&self, field: &Rc<Field>) {
        let Some(grids) = self.grid.value() else { return };
        let field = Rc::clone(field);
        let max_intensity = grids.primary.particles.max_intensity;
        let settings = self.settings.animation.clone();
        let rng = SmallRng::seed_from_u64(self.rng.borrow_mut().r#gen());
        let canvas = Rc::clone(&self.surfaces.particles);
        self.animator.submit(move |ctx| {
            animate(ctx, field, max_intensity, settings, rng, canvas)
        });
    }

    fn stop_animation(&self, clear: bool) {
        self.animator.cancel();
        if clear {
            self.surfaces.particles.borrow_mut().clear();
        }
    }

    /// Redraws the overlay of the current field, or only clears it when
    /// `draw` is false.
    fn submit_overlay(&self, draw: bool) {
        let Some(field) = self.field.value() else { return };
        let attributes = self.config.attributes();
        let overlay_type = draw.then(|| attributes.overlay_type().to_string());
        let grid_points = match (self.grid.value(), self.globe.value()) {
            (Some(grids), Some(globe)) if draw && attributes.show_grid_points => {
                Some((Rc::clone(&grids.overlay), globe.projection()))
            }
            _ => None,
        };
        let request = OverlayRequest {
            field,
            overlay_type,
            grid_points,
        };
        let surface = Rc::clone(&self.surfaces.overlay);
        self.overlay
            .submit(move |ctx| draw_overlay(ctx, request, surface));
    }
}

/// Counts lifecycle events and submit-to-update latency of `agent`.
fn instrument<T: 'static>(inner: &Rc<Inner>, agent: &Agent<T>) {
    agent.record_into(&inner.trace);
    let name = agent.name();
    let submitted = Cell::new(None::<u64>);
    agent.listen(handler(inner, move |p: &Inner, event: &AgentEvent<T>| {
        let kind = event.kind();
        let now = p.handle.now_ms();
        let mut metrics = p.metrics.borrow_mut();
        metrics.inc_counter(format!("{name}.{}", kind.as_str()), 1);
        match kind {
            EventKind::Submit => submitted.set(Some(now)),
            EventKind::Update => {
                if let Some(at) = submitted.take() {
                    metrics.record_ms(format!("{name}.latency"), now - at);
                }
            }
            EventKind::Reject | EventKind::Fail => {}
        }
    }));
}

fn wire(inner: &Rc<Inner>) {
    instrument(inner, &inner.mesh);
    instrument(inner, &inner.globe);
    instrument(inner, &inner.grid);
    instrument(inner, &inner.renderer);
    instrument(inner, &inner.field);
    instrument(inner, &inner.animator);
    instrument(inner, &inner.overlay);

    inner.config.listen(handler(inner, |p: &Inner, change: &ConfigChange| {
        if change.contains(ConfigKey::Topology) {
            p.submit_mesh();
        }
    }));
    inner.config.listen(handler(inner, |p: &Inner, change: &ConfigChange| {
        if change.contains(ConfigKey::Projection) {
            p.submit_globe();
        }
    }));
    inner.config.listen(handler(inner, |p: &Inner, change: &ConfigChange| {
        let attributes = p.config.attributes();
        let current = p.grid.value();
        if grid_rebuild_required(change, &attributes, current.as_deref()) {
            p.submit_grids();
        }
    }));

    inner.mesh.on_update(handler(inner, |p: &Inner, _: &Rc<Mesh>| p.start_rendering()));
    inner.globe.on_update(handler(inner, |p: &Inner, _: &Rc<Globe>| p.start_rendering()));

    inner.grid.on_update(handler(inner, |p: &Inner, _: &Rc<Grids>| p.submit_field()));
    let signals = inner.wiring.signals();
    signals.listen(handler(inner, |p: &Inner, signal: &RenderSignal| {
        debug!(signal = signal.as_str(), "renderer signal");
        match signal {
            RenderSignal::Render => p.submit_field(),
            RenderSignal::Start | RenderSignal::Redraw => p.field.cancel(),
        }
    }));

    inner.field.on_update(handler(inner, |p: &Inner, field: &Rc<Field>| {
        p.submit_animation(field)
    }));
    signals.listen(handler(inner, |p: &Inner, signal: &RenderSignal| {
        if *signal == RenderSignal::Start {
            p.stop_animation(true);
        }
    }));
    let weak = Rc::downgrade(inner);
    inner.grid.on_submit(move || {
        if let Some(p) = weak.upgrade() {
            p.stop_animation(false);
        }
    });
    let weak = Rc::downgrade(inner);
    inner.field.on_submit(move || {
        if let Some(p) = weak.upgrade() {
            p.stop_animation(false);
        }
    });

    inner.field.on_update(handler(inner, |p: &Inner, _: &Rc<Field>| {
        p.submit_overlay(true)
    }));
    signals.listen(handler(inner, |p: &Inner, signal: &RenderSignal| {
        if *signal == RenderSignal::Start {
            p.submit_overlay(false);
        }
    }));
    inner.config.listen(handler(inner, |p: &Inner, change: &ConfigChange| {
        if change.touches(&[ConfigKey::OverlayType, ConfigKey::ShowGridPoints]) {
            p.submit_overlay(true);
        }
    }));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub name: &'static str,
    pub submits: usize,
    pub updates: usize,
    pub rejects: usize,
    pub fails: usize,
    pub has_value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub width: u32,
    pub height: u32,
    pub columns: u32,
    pub slices: u32,
    pub defined: usize,
    pub released: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSummary {
    pub particles: usize,
    pub frames: u64,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSummary {
    pub count: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

/// Serializable snapshot of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub now_ms: u64,
    pub attributes: Attributes,
    pub agents: Vec<AgentSummary>,
    pub field: Option<FieldSummary>,
    pub animation: Option<AnimationSummary>,
    pub overlay: Option<OverlayFrame>,
    pub counters: BTreeMap<String, u64>,
    pub timings: BTreeMap<String, TimingSummary>,
}

/// The assembled visualization pipeline. Dropping it detaches every
/// listener; tasks still in flight finish without effect.
pub struct Pipeline {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("view", &self.inner.view.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        handle: LoopHandle,
        settings: EngineSettings,
        catalog: Catalog,
        loader: Rc<dyn ResourceLoader>,
        surfaces: Surfaces,
    ) -> Self {
        let config = Configuration::default();
        let input = InputController::new(handle.clone(), config.clone(), settings.input.clone());
        let wiring = Rc::new(RendererWiring::new(
            input.clone(),
            Rc::clone(&surfaces.map),
            Emitter::default(),
            settings.input.redraw_wait_ms,
        ));
        let rng = match settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let inner = Rc::new(Inner {
            mesh: Agent::new("mesh", handle.clone()),
            globe: Agent::new("globe", handle.clone()),
            grid: Agent::new("grid", handle.clone()),
            renderer: Agent::new("renderer", handle.clone()),
            field: Agent::new("field", handle.clone()),
            animator: Agent::new("animator", handle.clone()),
            overlay: Agent::new("overlay", handle.clone()),
            view: Cell::new(settings.view()),
            handle,
            settings,
            config,
            catalog,
            loader,
            input,
            surfaces,
            wiring,
            rng: RefCell::new(rng),
            metrics: RefCell::new(Metrics::new()),
            trace: EventTrace::new(),
        });
        wire(&inner);
        Self { inner }
    }

    /// Applies the initial attributes; every stage whose key they carry
    /// starts building.
    pub fn start(&self, attributes: Attributes) {
        info!(
            projection = %attributes.projection,
            overlay = %attributes.overlay_type,
            "starting pipeline"
        );
        self.inner
            .config
            .save(ChangeSource::User, move |a| *a = attributes);
    }

    /// Adopts a new view size by rebuilding the globe.
    pub fn resize(&self, view: View) {
        self.inner.view.set(view);
        self.inner.submit_globe();
    }

    pub fn view(&self) -> View {
        self.inner.view.get()
    }

    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    pub fn input(&self) -> &InputController {
        &self.inner.input
    }

    pub fn signals(&self) -> &Emitter<RenderSignal> {
        self.inner.wiring.signals()
    }

    pub fn mesh(&self) -> &Agent<Mesh> {
        &self.inner.mesh
    }

    pub fn globe(&self) -> &Agent<Globe> {
        &self.inner.globe
    }

    pub fn grid(&self) -> &Agent<Grids> {
        &self.inner.grid
    }

    pub fn renderer(&self) -> &Agent<Renderer> {
        &self.inner.renderer
    }

    pub fn field(&self) -> &Agent<Field> {
        &self.inner.field
    }

    pub fn animator(&self) -> &Agent<Animation> {
        &self.inner.animator
    }

    pub fn overlay(&self) -> &Agent<OverlayFrame> {
        &self.inner.overlay
    }

    pub fn trace(&self) -> &EventTrace {
        &self.inner.trace
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.metrics.borrow().clone()
    }

    pub fn summary(&self) -> PipelineSummary {
        let inner = &self.inner;
        let trace = &inner.trace;
        let agent = |name: &'static str, has_value: bool| AgentSummary {
            name,
            submits: trace.count(name, EventKind::Submit),
            updates: trace.count(name, EventKind::Update),
            rejects: trace.count(name, EventKind::Reject),
            fails: trace.count(name, EventKind::Fail),
            has_value,
        };
        let agents = vec![
            agent(inner.mesh.name(), inner.mesh.value().is_some()),
            agent(inner.globe.name(), inner.globe.value().is_some()),
            agent(inner.grid.name(), inner.grid.value().is_some()),
            agent(inner.renderer.name(), inner.renderer.value().is_some()),
            agent(inner.field.name(), inner.field.value().is_some()),
            agent(inner.animator.name(), inner.animator.value().is_some()),
            agent(inner.overlay.name(), inner.overlay.value().is_some()),
        ];

        let field = inner.field.value().map(|field| {
            let stats = field.stats();
            FieldSummary {
                width: field.bounds().width(),
                height: field.bounds().height(),
                columns: stats.columns,
                slices: stats.slices,
                defined: stats.defined,
                released: field.is_released(),
            }
        });
        let animation = inner.animator.value().map(|a| AnimationSummary {
            particles: a.particle_count(),
            frames: a.frames(),
            running: a.is_running(),
        });

        let metrics = inner.metrics.borrow().snapshot();
        PipelineSummary {
            now_ms: inner.handle.now_ms(),
            attributes: inner.config.attributes(),
            agents,
            field,
            animation,
            overlay: inner.overlay.value().map(|frame| (*frame).clone()),
            counters: metrics.counters.into_iter().collect(),
            timings: metrics
                .timings
                .into_iter()
                .map(|(name, t)| {
                    (
                        name,
                        TimingSummary {
                            count: t.count,
                            total_ms: t.total_ms,
                            max_ms: t.max_ms,
                        },
                    )
                })
                .collect(),
        }
    }
}
