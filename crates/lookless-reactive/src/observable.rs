#![forbid(unsafe_code)]

//! Shared value with change notification and version tracking.
//!
//! [`Observable<T>`] keeps its value in `Rc<RefCell<..>>` storage. Writes that
//! change the value (by `PartialEq`) bump the version and call every live
//! subscriber in registration order. Subscribers are held weakly; the caller
//! keeps them alive through the returned [`Subscription`] guard.
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 per value-changing write.
//! 2. Writing an equal value is a no-op.
//! 3. Subscribers run in registration order.
//! 4. Dead subscribers are pruned lazily on the next notification.
//!
//! # Failure Modes
//!
//! - **Re-entrant writes**: allowed. The borrow is released before callbacks
//!   run, so a subscriber may write to the same observable; the nested write
//!   notifies before the outer loop continues.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, debug_span};
use web_time::Instant;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct Subscriber<T> {
    callback: CallbackWeak<T>,
    immediate: bool,
}

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Subscriber<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning creates another handle to the same value and subscriber list.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable at version 0 with no subscribers.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value. Returns `true` when the value changed and
    /// subscribers were notified (or queued, inside a batch).
    pub fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
        true
    }

    /// Mutate the value in place. Notifies only if the result differs from
    /// the value before `f` ran.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.value.clone();
            f(&mut inner.value);
            if inner.value != before {
                inner.version += 1;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// Register `callback` for future changes. The current value is not
    /// replayed.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.register(callback, false)
    }

    /// Like [`subscribe`](Self::subscribe), but `callback` runs at write
    /// time even inside a [`BatchScope`](crate::BatchScope), so it sees
    /// every change in write order.
    pub fn subscribe_immediate(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.register(callback, true)
    }

    fn register(&self, callback: impl Fn(&T) + 'static, immediate: bool) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner.borrow_mut().subscribers.push(Subscriber {
            callback: Rc::downgrade(&strong),
            immediate,
        });
        Subscription::new(strong)
    }

    /// Current version number.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// `true` when both handles point at the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let callbacks: Vec<(CallbackRc<T>, bool)> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|s| s.callback.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(|s| Some((s.callback.upgrade()?, s.immediate)))
                .collect()
        };
        if callbacks.is_empty() {
            return;
        }

        if crate::batch::is_batching() {
            let value = self.get();
            for (cb, immediate) in callbacks {
                if immediate {
                    cb(&value);
                    continue;
                }
                let key = Rc::as_ptr(&cb) as *const () as usize;
                let source = self.clone();
                crate::batch::defer_or_run_keyed(key, move || {
                    let latest = source.get();
                    cb(&latest);
                });
            }
            return;
        }

        let value = self.get();
        let start = Instant::now();
        let _span = debug_span!(
            "reactive.delta",
            subscribers = callbacks.len() as u64,
            duration_us = tracing::field::Empty
        )
        .entered();
        for (cb, _) in &callbacks {
            cb(&value);
        }
        let duration_us = start.elapsed().as_micros() as u64;
        tracing::Span::current().record("duration_us", duration_us);
        debug!(duration_us, "observable propagation");
    }
}

/// RAII guard for a registered callback.
///
/// Dropping the guard drops the only strong reference to the callback, so
/// the weak entry held by the source stops upgrading.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    pub(crate) fn new<T: ?Sized + 'static>(strong: Rc<T>) -> Self {
        Self {
            _guard: Box::new(strong),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_set_and_version() {
        let obs = Observable::new(1);
        assert_eq!(obs.get(), 1);
        assert_eq!(obs.version(), 0);

        assert!(obs.set(2));
        assert_eq!(obs.get(), 2);
        assert_eq!(obs.version(), 1);

        assert!(!obs.set(2));
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn update_in_place_only_notifies_on_change() {
        let obs = Observable::new(vec![1]);
        let hits = Rc::new(Cell::new(0u32));
        let hits_c = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_| hits_c.set(hits_c.get() + 1));

        assert!(obs.update(|v| v.push(2)));
        assert!(!obs.update(|v| v[0] = 1));
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.get(), vec![1, 2]);
    }

    #[test]
    fn subscribe_does_not_replay_current_value() {
        let obs = Observable::new(5);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_c = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| seen_c.borrow_mut().push(*v));
        assert!(seen.borrow().is_empty());

        obs.set(6);
        assert_eq!(*seen.borrow(), vec![6]);
    }

    #[test]
    fn dropped_subscription_stops_callbacks_and_is_pruned() {
        let obs = Observable::new(0);
        let hits = Rc::new(Cell::new(0u32));
        let hits_c = Rc::clone(&hits);
        let sub = obs.subscribe(move |_| hits_c.set(hits_c.get() + 1));
        let _other = obs.subscribe(|_| {});

        obs.set(1);
        drop(sub);
        assert_eq!(obs.subscriber_count(), 2);

        obs.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(String::new()));
        let a = Rc::clone(&log);
        let b = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_| a.borrow_mut().push('a'));
        let _s2 = obs.subscribe(move |_| b.borrow_mut().push('b'));

        obs.set(1);
        obs.set(2);
        assert_eq!(log.borrow().as_str(), "abab");
    }

    #[test]
    fn clones_share_value_and_subscribers() {
        let first = Observable::new("a".to_string());
        let second = first.clone();
        let hits = Rc::new(Cell::new(0u32));
        let hits_c = Rc::clone(&hits);
        let _sub = first.subscribe(move |_| hits_c.set(hits_c.get() + 1));

        second.set("b".to_string());
        assert_eq!(first.get(), "b");
        assert_eq!(hits.get(), 1);
        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&Observable::new("b".to_string())));
    }

    #[test]
    fn reentrant_write_from_subscriber() {
        let obs = Observable::new(0);
        let writer = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v == 1 {
                writer.set(2);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 2);
        assert_eq!(obs.version(), 2);
    }

    #[test]
    fn debug_format_mentions_value_and_version() {
        let obs = Observable::new(42);
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
