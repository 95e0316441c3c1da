//! The renderer stage: lays the map out for a globe and mesh and turns
//! input gestures into the signals that drive field rebuilds.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use runtime::{Emitter, ListenerId, TaskContext, TaskResult, Throttle};
use tracing::info;

use crate::globe::Globe;
use crate::input::{InputController, InputEvent};
use crate::mesh::Mesh;
use crate::surfaces::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSignal {
    /// The camera started moving.
    Start,
    /// An intermediate frame of a drag was drawn.
    Redraw,
    /// The camera settled; derived state may be rebuilt.
    Render,
}

impl RenderSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderSignal::Start => "start",
            RenderSignal::Redraw => "redraw",
            RenderSignal::Render => "render",
        }
    }
}

/// Value of the renderer agent: the inputs the map was laid out for.
#[derive(Debug)]
pub struct Renderer {
    pub globe: Rc<Globe>,
    pub mesh: Rc<Mesh>,
}

/// State shared by successive renderer builds.
pub struct RendererWiring {
    input: InputController,
    map: Rc<RefCell<dyn MapSurface>>,
    signals: Emitter<RenderSignal>,
    subscription: Cell<Option<ListenerId>>,
    redraw_wait_ms: u64,
}

impl std::fmt::Debug for RendererWiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererWiring")
            .field("subscribed", &self.subscription.get().is_some())
            .field("redraw_wait_ms", &self.redraw_wait_ms)
            .finish()
    }
}

impl RendererWiring {
    pub fn new(
        input: InputController,
        map: Rc<RefCell<dyn MapSurface>>,
        signals: Emitter<RenderSignal>,
        redraw_wait_ms: u64,
    ) -> Self {
        Self {
            input,
            map,
            signals,
            subscription: Cell::new(None),
            redraw_wait_ms,
        }
    }

    pub fn signals(&self) -> &Emitter<RenderSignal> {
        &self.signals
    }
}

/// Renderer agent task. Replaces the previous build's input subscription,
/// defines the map and hands the globe to the input controller on the next
/// tick.
pub async fn build_renderer(
    ctx: TaskContext,
    wiring: Rc<RendererWiring>,
    mesh: Rc<Mesh>,
    globe: Rc<Globe>,
) -> TaskResult<Renderer> {
    if let Some(previous) = wiring.subscription.take() {
        wiring.input.unlisten(previous);
    }
    wiring.map.borrow_mut().define(&globe, &mesh);

    let throttle = Throttle::new(ctx.handle().clone(), wiring.redraw_wait_ms);
    let map = Rc::clone(&wiring.map);
    let signals = wiring.signals.clone();
    let drawn = Rc::clone(&globe);
    let id = wiring.input.listen(move |event| match event {
        InputEvent::MoveStart => signals.emit(&RenderSignal::Start),
        InputEvent::Move => {
            let map = Rc::clone(&map);
            let signals = signals.clone();
            let globe = Rc::clone(&drawn);
            throttle.call(move || {
                map.borrow_mut().redraw(&globe);
                signals.emit(&RenderSignal::Redraw);
            });
        }
        InputEvent::MoveEnd => {
            map.borrow_mut().redraw(&drawn);
            signals.emit(&RenderSignal::Render);
        }
        InputEvent::Click { .. } => {}
    });
    wiring.subscription.set(Some(id));

    let input = wiring.input.clone();
    let attached = Rc::clone(&globe);
    ctx.handle().defer(move || input.attach_globe(attached));

    info!(
        agent = ctx.agent(),
        projection = globe.kind().name(),
        lines = mesh.line_count(),
        "map defined"
    );
    Ok(Renderer { globe, mesh })
}
