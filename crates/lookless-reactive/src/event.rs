#![forbid(unsafe_code)]

//! Multicast notifications.
//!
//! [`EventHandlers<E>`] is the event-shaped sibling of
//! [`Observable`](crate::Observable): there is no stored value, each
//! [`raise`](EventHandlers::raise) hands an `&E` payload to every live
//! handler in registration order. Handlers are held weakly and kept alive by
//! the returned [`Subscription`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::Subscription;

type HandlerRc<E> = Rc<dyn Fn(&E)>;
type HandlerWeak<E> = Weak<dyn Fn(&E)>;

/// A list of weakly held event handlers.
///
/// Cloning shares the handler list.
pub struct EventHandlers<E> {
    handlers: Rc<RefCell<Vec<HandlerWeak<E>>>>,
}

impl<E> Clone for EventHandlers<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: Rc::clone(&self.handlers),
        }
    }
}

impl<E> Default for EventHandlers<E> {
    fn default() -> Self {
        Self {
            handlers: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<E> std::fmt::Debug for EventHandlers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("handler_count", &self.handlers.borrow().len())
            .finish()
    }
}

impl<E: 'static> EventHandlers<E> {
    /// Empty handler list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. It stays registered while the returned guard is
    /// alive.
    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> Subscription {
        let strong: HandlerRc<E> = Rc::new(handler);
        self.handlers.borrow_mut().push(Rc::downgrade(&strong));
        Subscription::new(strong)
    }

    /// Deliver `event` to every live handler. Returns how many ran.
    ///
    /// Handlers registered while raising are not called for this event.
    pub fn raise(&self, event: &E) -> usize {
        let live: Vec<HandlerRc<E>> = {
            let mut handlers = self.handlers.borrow_mut();
            handlers.retain(|w| w.strong_count() > 0);
            handlers.iter().filter_map(Weak::upgrade).collect()
        };
        for handler in &live {
            handler(event);
        }
        live.len()
    }

    /// Whether any handler is still alive.
    #[must_use]
    pub fn has_handlers(&self) -> bool {
        self.handlers.borrow().iter().any(|w| w.strong_count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn raise_reaches_handlers_in_order() {
        let handlers = EventHandlers::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&log);
        let b = Rc::clone(&log);
        let _s1 = handlers.subscribe(move |e| a.borrow_mut().push(("a", *e)));
        let _s2 = handlers.subscribe(move |e| b.borrow_mut().push(("b", *e)));

        assert_eq!(handlers.raise(&7), 2);
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn dropped_guard_unregisters() {
        let handlers = EventHandlers::<()>::new();
        let hits = Rc::new(Cell::new(0u32));
        let hits_c = Rc::clone(&hits);
        let sub = handlers.subscribe(move |_| hits_c.set(hits_c.get() + 1));

        handlers.raise(&());
        drop(sub);
        assert!(!handlers.has_handlers());
        assert_eq!(handlers.raise(&()), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handler_added_during_raise_waits_for_next_event() {
        let handlers = EventHandlers::<()>::new();
        let late = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0u32));
        let (h, l, c) = (handlers.clone(), Rc::clone(&late), Rc::clone(&hits));
        let _sub = handlers.subscribe(move |_| {
            if l.borrow().is_none() {
                let c = Rc::clone(&c);
                *l.borrow_mut() = Some(h.subscribe(move |_| c.set(c.get() + 1)));
            }
        });

        handlers.raise(&());
        assert_eq!(hits.get(), 0);
        handlers.raise(&());
        assert_eq!(hits.get(), 1);
    }
}
