//! The frame loop driving an [`Animator`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use field::Field;
use rand::rngs::SmallRng;
use runtime::{CancelToken, TaskContext, TaskError, TaskResult};
use tracing::debug;

use crate::animator::{AnimationSettings, Animator};
use crate::canvas::ParticleCanvas;

/// Handle on a running frame loop.
///
/// The loop draws one frame, then sleeps `frame_ms`, until the token of
/// the task that started it is cancelled. On its first wake after
/// cancellation it releases the field and exits without drawing.
#[derive(Debug)]
pub struct Animation {
    particles: usize,
    frames: Rc<Cell<u64>>,
    token: CancelToken,
}

impl Animation {
    pub fn start(
        ctx: &TaskContext,
        mut animator: Animator,
        canvas: Rc<RefCell<dyn ParticleCanvas>>,
    ) -> Self {
        let agent = ctx.agent();
        let token = ctx.token().clone();
        let handle = ctx.handle().clone();
        let frames = Rc::new(Cell::new(0));
        let particles = animator.particles().len();
        let frame_ms = animator.settings().frame_ms;

        let stop = token.clone();
        let counter = Rc::clone(&frames);
        ctx.handle().spawn(async move {
            loop {
                if stop.is_cancelled() {
                    animator.release_field();
                    debug!(agent, frames = counter.get(), "animation stopped");
                    return;
                }
                animator.frame(&mut *canvas.borrow_mut());
                counter.set(counter.get() + 1);
                handle.sleep(frame_ms).await;
            }
        });

        debug!(agent, particles, frame_ms, "animation started");
        Self {
            particles,
            frames,
            token,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particles
    }

    /// Frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Animator task: seeds particles over `field` and starts the frame loop.
pub async fn animate(
    ctx: TaskContext,
    field: Rc<Field>,
    max_intensity: f64,
    settings: AnimationSettings,
    rng: SmallRng,
    canvas: Rc<RefCell<dyn ParticleCanvas>>,
) -> TaskResult<Animation> {
    if field.is_released() {
        return Err(TaskError::failed("cannot animate a released field"));
    }
    let animator = Animator::new(field, max_intensity, settings, rng);
    Ok(Animation::start(&ctx, animator, canvas))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use field::{BuildStats, Field, OverlayImage, VectorSample};
    use foundation::{PixelBounds, View};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use runtime::{Agent, EventKind, EventLoop, EventTrace};

    use super::{Animation, animate};
    use crate::animator::AnimationSettings;
    use crate::canvas::{ParticleCanvas, RecordingCanvas};

    fn moving_field() -> Rc<Field> {
        let bounds = PixelBounds {
            x: 0,
            y: 0,
            x_max: 19,
            y_max: 9,
        };
        Rc::new(Field::new(
            bounds,
            vec![
                VectorSample::Value {
                    u: 0.5,
                    v: 0.0,
                    magnitude: 0.3,
                };
                200
            ],
            OverlayImage::new(View::new(20, 10)),
            BuildStats::default(),
        ))
    }

    struct Harness {
        event_loop: EventLoop,
        agent: Agent<Animation>,
        canvas: Rc<RefCell<RecordingCanvas>>,
        trace: EventTrace,
    }

    fn harness() -> Harness {
        let event_loop = EventLoop::new();
        let agent = Agent::new("animator", event_loop.handle());
        let trace = EventTrace::new();
        agent.record_into(&trace);
        Harness {
            event_loop,
            agent,
            canvas: Rc::new(RefCell::new(RecordingCanvas::new())),
            trace,
        }
    }

    fn submit(h: &Harness, field: Rc<Field>) {
        let canvas: Rc<RefCell<dyn ParticleCanvas>> = h.canvas.clone();
        h.agent.submit(move |ctx| {
            animate(
                ctx,
                field,
                1.0,
                AnimationSettings::default(),
                SmallRng::seed_from_u64(11),
                canvas,
            )
        });
    }

    #[test]
    fn draws_one_frame_per_interval() {
        let mut h = harness();
        submit(&h, moving_field());
        h.event_loop.run_until_stalled();

        let animation = h.agent.value().unwrap();
        assert_eq!(animation.particle_count(), 140);
        assert_eq!(animation.frames(), 1);

        h.event_loop.advance(400);
        assert_eq!(animation.frames(), 11);
        assert_eq!(h.canvas.borrow().fades(), 11);
        assert_eq!(h.canvas.borrow().strokes(), 11);
        assert_eq!(
            h.trace.kinds_for("animator"),
            vec![EventKind::Submit, EventKind::Update]
        );
    }

    #[test]
    fn cancel_releases_field_and_stops_drawing() {
        let mut h = harness();
        let field = moving_field();
        submit(&h, Rc::clone(&field));
        h.event_loop.advance(80);
        let animation = h.agent.value().unwrap();
        let drawn = animation.frames();

        h.agent.cancel();
        assert!(!animation.is_running());
        h.event_loop.advance(200);

        assert_eq!(animation.frames(), drawn);
        assert!(field.is_released());
        assert_eq!(h.event_loop.pending_timers(), 0);
    }

    #[test]
    fn restart_stops_previous_loop() {
        let mut h = harness();
        let first = moving_field();
        submit(&h, Rc::clone(&first));
        h.event_loop.advance(40);
        let old = h.agent.value().unwrap();

        let second = moving_field();
        submit(&h, Rc::clone(&second));
        h.event_loop.advance(120);

        assert!(!old.is_running());
        assert!(first.is_released());
        assert!(!second.is_released());
        assert!(h.agent.value().unwrap().frames() >= 3);
    }

    #[test]
    fn released_field_is_rejected() {
        let mut h = harness();
        let field = moving_field();
        field.release();
        submit(&h, field);
        h.event_loop.run_until_stalled();
        assert!(h.agent.value().is_none());
        assert_eq!(
            h.trace.kinds_for("animator"),
            vec![EventKind::Submit, EventKind::Reject]
        );
    }
}
