//! Pointer gestures on the globe: click detection, drag and zoom, and the
//! debounced end of a move.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use foundation::math::{GeoPoint, clamp, distance};
use runtime::{Debouncer, Emitter, ListenerId, LoopHandle};
use tracing::debug;

use crate::config::{ChangeSource, ConfigChange, ConfigKey, Configuration, InputSettings};
use crate::globe::{Globe, Manipulator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    MoveStart,
    Move,
    MoveEnd,
    /// A gesture that never travelled far enough to count as a drag.
    Click {
        mouse: [f64; 2],
        geo: Option<GeoPoint>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Click,
    /// Pointer went down and up without moving at all.
    Spurious,
    Drag,
    Zoom,
}

#[derive(Debug, Clone, Copy)]
struct Operation {
    kind: OpKind,
    start_mouse: [f64; 2],
    start_scale: f64,
    manipulator: Manipulator,
}

struct Inner {
    config: Configuration,
    settings: InputSettings,
    globe: RefCell<Option<Rc<Globe>>>,
    op: Cell<Option<Operation>>,
    scale: Cell<f64>,
    move_end: Debouncer,
    events: Emitter<InputEvent>,
    config_listener: Cell<Option<ListenerId>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.config_listener.take() {
            self.config.unlisten(id);
        }
        self.move_end.cancel();
    }
}

#[derive(Clone)]
pub struct InputController {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for InputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputController")
            .field("globe", &self.inner.globe.borrow().is_some())
            .field("scale", &self.inner.scale.get())
            .field("moving", &self.inner.move_end.is_pending())
            .finish()
    }
}

impl InputController {
    /// Creates the controller and subscribes it to orientation changes.
    pub fn new(handle: LoopHandle, config: Configuration, settings: InputSettings) -> Self {
        let inner = Rc::new(Inner {
            move_end: Debouncer::new(handle, settings.move_end_wait_ms),
            config: config.clone(),
            settings,
            globe: RefCell::new(None),
            op: Cell::new(None),
            scale: Cell::new(1.0),
            events: Emitter::default(),
            config_listener: Cell::new(None),
        });
        let weak = Rc::downgrade(&inner);
        let id = config.listen(move |change| {
            if let Some(inner) = weak.upgrade() {
                InputController { inner }.reorient(change);
            }
        });
        inner.config_listener.set(Some(id));
        Self { inner }
    }

    pub fn listen(&self, f: impl Fn(&InputEvent) + 'static) -> ListenerId {
        self.inner.events.listen(f)
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.inner.events.unlisten(id)
    }

    pub fn globe(&self) -> Option<Rc<Globe>> {
        self.inner.globe.borrow().clone()
    }

    /// Current zoom scale.
    pub fn scale(&self) -> f64 {
        self.inner.scale.get()
    }

    /// Takes control of `globe` and orients it from the configuration.
    pub fn attach_globe(&self, globe: Rc<Globe>) {
        self.inner.scale.set(globe.scale());
        *self.inner.globe.borrow_mut() = Some(globe);
        self.apply_orientation();
    }

    fn emit(&self, event: InputEvent) {
        self.inner.events.emit(&event);
    }

    fn new_op(&self, globe: &Globe, mouse: [f64; 2], scale: f64) -> Operation {
        Operation {
            kind: OpKind::Click,
            start_mouse: mouse,
            start_scale: scale,
            manipulator: globe.manipulator(mouse, scale),
        }
    }

    /// Pointer pressed (or wheel started) at `mouse`.
    pub fn begin_move(&self, mouse: [f64; 2]) {
        let Some(globe) = self.globe() else { return };
        if self.inner.op.get().is_none() {
            let op = self.new_op(&globe, mouse, self.inner.scale.get());
            self.inner.op.set(Some(op));
        }
    }

    /// Pointer moved to `mouse` with the zoom at `scale`.
    pub fn drag(&self, mouse: [f64; 2], scale: f64) {
        let Some(globe) = self.globe() else { return };
        let [low, high] = globe.scale_extent();
        let scale = clamp(scale, low, high);
        let mut op = match self.inner.op.get() {
            Some(op) => op,
            None => self.new_op(&globe, mouse, 1.0),
        };

        if matches!(op.kind, OpKind::Click | OpKind::Spurious) {
            let moved = distance(mouse, op.start_mouse);
            if scale == op.start_scale && moved < self.inner.settings.min_move_px {
                op.kind = if moved > 0.0 {
                    OpKind::Click
                } else {
                    OpKind::Spurious
                };
                self.inner.op.set(Some(op));
                return;
            }
            self.emit(InputEvent::MoveStart);
            op.kind = OpKind::Drag;
        }
        if scale != op.start_scale {
            op.kind = OpKind::Zoom;
        }
        self.inner.op.set(Some(op));

        let pointer = (op.kind != OpKind::Zoom).then_some(mouse);
        op.manipulator.move_to(&globe, pointer, scale);
        self.inner.scale.set(scale);
        self.emit(InputEvent::Move);
    }

    /// Pointer released.
    pub fn end_move(&self) {
        let Some(op) = self.inner.op.take() else { return };
        match op.kind {
            OpKind::Click => {
                let geo = self.globe().and_then(|g| g.invert(op.start_mouse));
                debug!(mouse = ?op.start_mouse, ?geo, "click");
                self.emit(InputEvent::Click {
                    mouse: op.start_mouse,
                    geo,
                });
            }
            OpKind::Spurious => {}
            OpKind::Drag | OpKind::Zoom => self.signal_end(),
        }
    }

    /// The move ends once no gesture has been active for the move-end wait.
    fn signal_end(&self) {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.move_end.call(move || {
            let Some(inner) = weak.upgrade() else { return };
            let controller = InputController { inner };
            if controller
                .inner
                .op
                .get()
                .is_some_and(|op| matches!(op.kind, OpKind::Drag | OpKind::Zoom))
            {
                return;
            }
            let Some(globe) = controller.globe() else { return };
            let orientation = globe.orientation();
            debug!(%orientation, "move ended");
            controller
                .inner
                .config
                .save(ChangeSource::MoveEnd, |a| a.orientation = orientation);
            controller.emit(InputEvent::MoveEnd);
        });
    }

    fn reorient(&self, change: &ConfigChange) {
        if change.source == ChangeSource::MoveEnd || !change.contains(ConfigKey::Orientation) {
            return;
        }
        self.apply_orientation();
    }

    fn apply_orientation(&self) {
        let Some(globe) = self.globe() else { return };
        self.emit(InputEvent::MoveStart);
        globe.orient(&self.inner.config.get(ConfigKey::Orientation));
        self.inner.scale.set(globe.scale());
        self.emit(InputEvent::MoveEnd);
    }
}
