//! Single-flight, cancellable, value-caching asynchronous work holder.
//!
//! An [`Agent`] keeps the result of the most recent task that completed
//! without being cancelled. Every `submit` cancels the task in flight, so a
//! late completion of superseded work is discarded: its token was invalidated
//! when the newer task was submitted, not when the old one finished.
//!
//! Event order for one submission is `Submit` (synchronous, inside `submit`)
//! followed later by at most one of `Update`, `Reject` or `Fail`.

use std::cell::RefCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::cancel::CancelToken;
use crate::coalesce::Coalescer;
use crate::emitter::{Emitter, ListenerId};
use crate::error::{panic_message, TaskError, TaskResult};
use crate::event_loop::{LoopHandle, Sleep};
use crate::event_trace::{EventKind, EventTrace};

pub enum AgentEvent<T> {
    /// A new task was requested. Fired before the task starts.
    Submit,
    /// The task produced a value, which is now the agent's value.
    Update(Rc<T>),
    /// The task resolved to an error. The agent's value is unchanged.
    Reject(TaskError),
    /// The task panicked while starting or running.
    Fail(TaskError),
}

impl<T> AgentEvent<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::Submit => EventKind::Submit,
            AgentEvent::Update(_) => EventKind::Update,
            AgentEvent::Reject(_) => EventKind::Reject,
            AgentEvent::Fail(_) => EventKind::Fail,
        }
    }
}

impl<T> std::fmt::Debug for AgentEvent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentEvent::Submit => write!(f, "Submit"),
            AgentEvent::Update(_) => write!(f, "Update(..)"),
            AgentEvent::Reject(err) => write!(f, "Reject({err})"),
            AgentEvent::Fail(err) => write!(f, "Fail({err})"),
        }
    }
}

/// Execution context handed to a submitted task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    agent: &'static str,
    token: CancelToken,
    handle: LoopHandle,
}

impl TaskContext {
    pub fn agent(&self) -> &'static str {
        self.agent
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    pub fn sleep(&self, ms: u64) -> Sleep {
        self.handle.sleep(ms)
    }
}

struct Inner<T> {
    name: &'static str,
    handle: LoopHandle,
    value: RefCell<Option<Rc<T>>>,
    token: RefCell<CancelToken>,
    launcher: Coalescer,
    events: Emitter<AgentEvent<T>>,
}

pub struct Agent<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Agent<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Agent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.inner.name)
            .field("has_value", &self.inner.value.borrow().is_some())
            .field("listeners", &self.inner.events.listener_count())
            .finish()
    }
}

impl<T: 'static> Agent<T> {
    pub fn new(name: &'static str, handle: LoopHandle) -> Self {
        Self {
            inner: Rc::new(Inner {
                name,
                handle,
                value: RefCell::new(None),
                token: RefCell::new(CancelToken::new()),
                launcher: Coalescer::new(),
                events: Emitter::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// The value of the last task that completed without being cancelled.
    pub fn value(&self) -> Option<Rc<T>> {
        self.inner.value.borrow().clone()
    }

    /// Cancels the task in flight, if any. The current value is kept.
    pub fn cancel(&self) {
        self.inner.token.borrow().cancel();
    }

    /// Cancels any task in flight and schedules `task` for the next tick.
    ///
    /// Several submissions made before the loop yields collapse into one:
    /// only the last task starts.
    pub fn submit<F, Fut>(&self, task: F)
    where
        F: FnOnce(TaskContext) -> Fut + 'static,
        Fut: Future<Output = TaskResult<T>> + 'static,
    {
        self.cancel();
        let token = CancelToken::new();
        *self.inner.token.borrow_mut() = token.clone();

        let weak = Rc::downgrade(&self.inner);
        let replaced = self.inner.launcher.schedule(&self.inner.handle, move || {
            if let Some(inner) = weak.upgrade() {
                Agent { inner }.start(token, task);
            }
        });
        debug!(agent = self.inner.name, replaced, "submit");
        self.inner.events.emit(&AgentEvent::Submit);
    }

    fn start<F, Fut>(&self, token: CancelToken, task: F)
    where
        F: FnOnce(TaskContext) -> Fut + 'static,
        Fut: Future<Output = TaskResult<T>> + 'static,
    {
        if token.is_cancelled() {
            debug!(agent = self.inner.name, "cancelled before start");
            return;
        }
        let ctx = TaskContext {
            agent: self.inner.name,
            token: token.clone(),
            handle: self.inner.handle.clone(),
        };
        let future = match panic::catch_unwind(AssertUnwindSafe(move || task(ctx))) {
            Ok(future) => future,
            Err(payload) => {
                self.fail(TaskError::Panicked(panic_message(&*payload)));
                return;
            }
        };

        let agent = self.clone();
        self.inner.handle.spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(value)) => agent.accept(&token, value),
                Ok(Err(err)) => agent.reject(&token, err),
                Err(payload) => {
                    let message = panic_message(&*payload);
                    if token.is_cancelled() {
                        debug!(agent = agent.inner.name, "dropping stale panic: {message}");
                    } else {
                        agent.fail(TaskError::Panicked(message));
                    }
                }
            }
        });
    }

    fn accept(&self, token: &CancelToken, value: T) {
        if token.is_cancelled() {
            debug!(agent = self.inner.name, "dropping stale result");
            return;
        }
        let value = Rc::new(value);
        *self.inner.value.borrow_mut() = Some(Rc::clone(&value));
        debug!(agent = self.inner.name, "update");
        self.inner.events.emit(&AgentEvent::Update(value));
    }

    fn reject(&self, token: &CancelToken, err: TaskError) {
        if token.is_cancelled() {
            debug!(agent = self.inner.name, "dropping stale rejection: {err}");
            return;
        }
        warn!(agent = self.inner.name, "task rejected: {err}");
        self.inner.events.emit(&AgentEvent::Reject(err));
    }

    fn fail(&self, err: TaskError) {
        error!(agent = self.inner.name, "task failed: {err}");
        self.inner.events.emit(&AgentEvent::Fail(err));
    }

    pub fn listen(&self, f: impl Fn(&AgentEvent<T>) + 'static) -> ListenerId {
        self.inner.events.listen(f)
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.inner.events.unlisten(id)
    }

    pub fn on_submit(&self, f: impl Fn() + 'static) -> ListenerId {
        self.listen(move |event| {
            if let AgentEvent::Submit = event {
                f();
            }
        })
    }

    pub fn on_update(&self, f: impl Fn(&Rc<T>) + 'static) -> ListenerId {
        self.listen(move |event| {
            if let AgentEvent::Update(value) = event {
                f(value);
            }
        })
    }

    /// Records every lifecycle event of this agent into `trace`.
    pub fn record_into(&self, trace: &EventTrace) -> ListenerId {
        let trace = trace.clone();
        let handle = self.inner.handle.clone();
        let name = self.inner.name;
        self.listen(move |event| trace.record(handle.now_ms(), name, event.kind()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{Agent, AgentEvent};
    use crate::error::TaskError;
    use crate::event_loop::EventLoop;
    use crate::event_trace::{EventKind, EventTrace};

    fn agent_with_trace(el: &EventLoop) -> (Agent<i32>, EventTrace) {
        let agent = Agent::new("test", el.handle());
        let trace = EventTrace::new();
        agent.record_into(&trace);
        (agent, trace)
    }

    #[test]
    fn submit_emits_synchronously_then_updates() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);

        agent.submit(|_ctx| async { Ok(1) });
        assert_eq!(trace.kinds_for("test"), vec![EventKind::Submit]);
        assert!(agent.value().is_none());

        el.run_until_stalled();
        assert_eq!(
            trace.kinds_for("test"),
            vec![EventKind::Submit, EventKind::Update]
        );
        assert_eq!(agent.value().as_deref(), Some(&1));
    }

    #[test]
    fn second_submission_supersedes_slow_first() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);

        agent.submit(|ctx| async move {
            ctx.sleep(100).await;
            Ok(1)
        });
        // Let the first task start before superseding it.
        el.run_until_stalled();
        agent.submit(|ctx| async move {
            ctx.sleep(10).await;
            Ok(2)
        });
        el.run_until_idle();

        assert_eq!(agent.value().as_deref(), Some(&2));
        assert_eq!(
            trace.kinds_for("test"),
            vec![EventKind::Submit, EventKind::Submit, EventKind::Update]
        );
    }

    #[test]
    fn burst_of_submissions_starts_only_the_last() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);
        let started = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let s = started.clone();
            agent.submit(move |_ctx| {
                s.borrow_mut().push(i);
                async move { Ok(i) }
            });
        }
        el.run_until_idle();

        assert_eq!(*started.borrow(), vec![2]);
        assert_eq!(agent.value().as_deref(), Some(&2));
        assert_eq!(trace.count("test", EventKind::Update), 1);
        assert_eq!(trace.count("test", EventKind::Submit), 3);
    }

    #[test]
    fn never_resolving_task_is_replaced() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);

        agent.submit(|_ctx| futures::future::pending());
        el.run_until_stalled();
        agent.submit(|_ctx| async { Ok(42) });
        el.run_until_idle();

        assert_eq!(agent.value().as_deref(), Some(&42));
        assert_eq!(trace.count("test", EventKind::Update), 1);
    }

    #[test]
    fn cancel_suppresses_update_and_keeps_value() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);

        agent.submit(|_ctx| async { Ok(7) });
        el.run_until_idle();

        agent.submit(|ctx| async move {
            ctx.sleep(50).await;
            Ok(8)
        });
        el.advance(10);
        agent.cancel();
        el.run_until_idle();

        assert_eq!(agent.value().as_deref(), Some(&7));
        assert_eq!(trace.count("test", EventKind::Update), 1);
    }

    #[test]
    fn cancel_before_start_skips_task() {
        let mut el = EventLoop::new();
        let agent: Agent<i32> = Agent::new("test", el.handle());
        let started = Rc::new(Cell::new(false));
        let s = started.clone();
        agent.submit(move |_ctx| {
            s.set(true);
            async { Ok(1) }
        });
        agent.cancel();
        el.run_until_idle();
        assert!(!started.get());
        assert!(agent.value().is_none());
    }

    #[test]
    fn rejection_is_reported_and_value_kept() {
        let mut el = EventLoop::new();
        let agent: Agent<i32> = Agent::new("test", el.handle());
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = errors.clone();
        agent.listen(move |event| {
            if let AgentEvent::Reject(err) = event {
                e.borrow_mut().push(err.clone());
            }
        });

        agent.submit(|_ctx| async { Ok(3) });
        el.run_until_idle();
        agent.submit(|_ctx| async { Err(TaskError::failed("no data")) });
        el.run_until_idle();

        assert_eq!(*errors.borrow(), vec![TaskError::failed("no data")]);
        assert_eq!(agent.value().as_deref(), Some(&3));
    }

    #[test]
    fn stale_rejection_is_dropped() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);
        agent.submit(|ctx| async move {
            ctx.sleep(20).await;
            Err(TaskError::failed("late"))
        });
        el.run_until_stalled();
        agent.cancel();
        el.run_until_idle();
        assert_eq!(trace.count("test", EventKind::Reject), 0);
    }

    #[test]
    fn panics_surface_as_fail() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);

        agent.submit(|_ctx| -> futures::future::Ready<Result<i32, TaskError>> {
            panic!("while starting")
        });
        el.run_until_idle();
        agent.submit(|_ctx| async {
            if true {
                panic!("while running");
            }
            Ok(1)
        });
        el.run_until_idle();

        assert_eq!(trace.count("test", EventKind::Fail), 2);
        assert!(agent.value().is_none());
    }

    #[test]
    fn superseded_task_panic_is_dropped() {
        let mut el = EventLoop::new();
        let (agent, trace) = agent_with_trace(&el);

        agent.submit(|ctx| async move {
            ctx.sleep(50).await;
            if true {
                panic!("late failure");
            }
            Ok(1)
        });
        el.run_until_stalled();
        agent.submit(|_ctx| async { Ok(42) });
        el.run_until_idle();

        assert_eq!(agent.value().as_deref(), Some(&42));
        assert_eq!(
            trace.kinds_for("test"),
            vec![EventKind::Submit, EventKind::Submit, EventKind::Update]
        );
    }

    #[test]
    fn on_update_receives_value() {
        let mut el = EventLoop::new();
        let agent: Agent<String> = Agent::new("s", el.handle());
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        agent.on_update(move |v| *s.borrow_mut() = Some(v.as_str().to_string()));
        agent.submit(|_ctx| async { Ok("hello".to_string()) });
        el.run_until_idle();
        assert_eq!(seen.borrow().as_deref(), Some("hello"));
    }
}
