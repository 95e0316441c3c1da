use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Rc<dyn Fn(&E)>;

struct Inner<E> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Listener<E>)>>,
}

/// Typed publish/subscribe channel.
///
/// Listeners run synchronously inside [`Emitter::emit`], in registration
/// order. A listener may emit, listen or unlisten re-entrantly; changes to
/// the listener list take effect from the next emission.
pub struct Emitter<E> {
    inner: Rc<Inner<E>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            inner: Rc::new(Inner {
                next_id: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<E> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, f: impl Fn(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push((id, Rc::new(f)));
        id
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Emitter;

    #[test]
    fn delivers_in_registration_order() {
        let e = Emitter::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        e.listen(move |v| s.borrow_mut().push(("a", *v)));
        let s = seen.clone();
        e.listen(move |v| s.borrow_mut().push(("b", *v)));

        e.emit(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unlisten_stops_delivery() {
        let e = Emitter::<()>::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = e.listen(move |_| *c.borrow_mut() += 1);
        e.emit(&());
        assert!(e.unlisten(id));
        e.emit(&());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(e.listener_count(), 0);
    }

    #[test]
    fn listeners_may_register_reentrantly() {
        let e = Emitter::<()>::new();
        let inner = e.clone();
        e.listen(move |_| {
            inner.listen(|_| {});
        });
        e.emit(&());
        assert_eq!(e.listener_count(), 2);
    }
}
