#![forbid(unsafe_code)]

//! Batch coalescing for [`Observable`](crate::Observable) notifications.
//!
//! Property writes made while a [`BatchScope`] is alive update values
//! immediately but defer subscriber callbacks. When the outermost scope
//! drops, each distinct callback fires once with the latest value.
//!
//! ```
//! use lookless_reactive::{BatchScope, Observable};
//!
//! let width = Observable::new(0);
//! {
//!     let _batch = BatchScope::new();
//!     width.set(10);
//!     width.set(20);
//!     assert_eq!(width.get(), 20);
//! } // subscribers run here, once, with 20
//! ```
//!
//! # Invariants
//!
//! 1. Nested scopes are supported; only the outermost flushes.
//! 2. Flush runs callbacks in first-enqueue order.
//! 3. A panicking callback does not prevent the rest from running; the
//!    first panic is resumed after the flush.
//! 4. Immediate subscribers (`Observable::subscribe_immediate`) are never
//!    deferred.

use std::cell::RefCell;
use tracing::debug_span;

type DeferredNotify = Box<dyn FnOnce()>;

struct DeferredEntry {
    key: Option<usize>,
    notify: DeferredNotify,
}

struct BatchContext {
    depth: u32,
    deferred: Vec<DeferredEntry>,
}

thread_local! {
    static BATCH_CTX: RefCell<Option<BatchContext>> = const { RefCell::new(None) };
}

/// Whether a batch is active on this thread.
pub fn is_batching() -> bool {
    BATCH_CTX.with(|ctx| ctx.borrow().is_some())
}

/// Queue `f` for the current batch, or run it now when no batch is active.
///
/// Returns `true` if deferred.
pub fn defer_or_run(f: impl FnOnce() + 'static) -> bool {
    enqueue(None, Box::new(f))
}

/// Like [`defer_or_run`], but a later entry with the same `key` replaces
/// the earlier one while keeping its queue position.
pub fn defer_or_run_keyed(key: usize, f: impl FnOnce() + 'static) -> bool {
    enqueue(Some(key), Box::new(f))
}

fn enqueue(key: Option<usize>, notify: DeferredNotify) -> bool {
    BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        let Some(batch) = guard.as_mut() else {
            drop(guard);
            notify();
            return false;
        };
        if let Some(k) = key
            && let Some(entry) = batch.deferred.iter_mut().find(|e| e.key == Some(k))
        {
            entry.notify = notify;
        } else {
            batch.deferred.push(DeferredEntry { key, notify });
        }
        true
    })
}

fn flush(deferred: Vec<DeferredNotify>) {
    if deferred.is_empty() {
        return;
    }

    let _span = debug_span!("reactive.batch_flush", callbacks = deferred.len() as u64).entered();
    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    for notify in deferred {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(notify));
        if let Err(payload) = result
            && first_panic.is_none()
        {
            first_panic = Some(payload);
        }
    }
    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
}

/// RAII guard for a batch. See the module docs.
pub struct BatchScope {
    is_root: bool,
}

impl BatchScope {
    /// Begin a batch, or nest inside the active one.
    #[must_use]
    pub fn new() -> Self {
        let is_root = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match guard.as_mut() {
                Some(batch) => {
                    batch.depth += 1;
                    false
                }
                None => {
                    *guard = Some(BatchContext {
                        depth: 1,
                        deferred: Vec::new(),
                    });
                    true
                }
            }
        });
        Self { is_root }
    }

    /// Notifications queued so far in the active batch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.deferred.len()))
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        // The context is cleared before callbacks run so writes they make
        // notify directly instead of landing in a queue nobody drains.
        let deferred = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            let batch = guard.as_mut()?;
            batch.depth = batch.depth.saturating_sub(1);
            if batch.depth > 0 {
                return None;
            }
            guard.take().map(|batch| {
                batch
                    .deferred
                    .into_iter()
                    .map(|e| e.notify)
                    .collect::<Vec<_>>()
            })
        });
        if let Some(deferred) = deferred {
            debug_assert!(self.is_root, "outermost batch scope must be the root");
            flush(deferred);
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("is_root", &self.is_root)
            .field("pending", &self.pending_count())
            .finish()
    }
}
