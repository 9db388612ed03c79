#![forbid(unsafe_code)]

//! Typed property keys, per-widget property slots and class handlers.
//!
//! This is the minimal property substrate the template engine needs: one
//! current value per (widget, property), a change stream for it, and a table
//! of class-level change handlers. There is no priority stack; a binding
//! writes the same slot a local `set` does.
//!
//! # Class handlers
//!
//! [`ClassHandlers`] maps a [`PropertyId`] to handlers invoked, in
//! registration order, after every effective change of that property on any
//! widget. The tree registers its own handlers (the `TEMPLATE` change hook)
//! at construction, so there is no static-initialization ordering to worry
//! about. Handlers run inside the property notification and only see the
//! widget's [`WidgetState`], never the tree.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use ahash::AHashMap;
use lookless_reactive::{Observable, Subscription};

use crate::widget::{WidgetId, WidgetState};

/// Ids below this value are reserved for built-in properties.
const FIRST_USER_PROPERTY: u32 = 1024;

static NEXT_PROPERTY_ID: AtomicU32 = AtomicU32::new(FIRST_USER_PROPERTY);

/// Numeric identity of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(u32);

impl PropertyId {
    /// Raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Typed handle to a property: its id, display name and default value.
pub struct PropertyKey<T> {
    id: PropertyId,
    name: &'static str,
    default: fn() -> T,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyKey<T> {}

impl<T> std::fmt::Debug for PropertyKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyKey")
            .field("id", &self.id.0)
            .field("name", &self.name)
            .finish()
    }
}

impl<T> PropertyKey<T> {
    pub(crate) const fn builtin(id: u32, name: &'static str, default: fn() -> T) -> Self {
        Self {
            id: PropertyId(id),
            name,
            default,
            _marker: PhantomData,
        }
    }

    /// Register a new property with a process-unique id.
    #[must_use]
    pub fn register(name: &'static str, default: fn() -> T) -> Self {
        let id = NEXT_PROPERTY_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id: PropertyId(id),
            name,
            default,
            _marker: PhantomData,
        }
    }

    /// Property id.
    #[must_use]
    pub const fn id(&self) -> PropertyId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Fresh default value.
    #[must_use]
    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

/// Arguments passed to a class handler after a property changed.
#[derive(Debug)]
pub struct PropertyChanged<'a, T> {
    /// Widget whose property changed.
    pub widget: WidgetId,
    /// The property.
    pub property: PropertyKey<T>,
    /// Value before the change.
    pub old: &'a T,
    /// Value after the change.
    pub new: &'a T,
    /// Shared flags of the widget.
    pub state: &'a WidgetState,
}

type ErasedHandler = Rc<dyn Fn(&WidgetState, &dyn Any, &dyn Any)>;

/// Property id to change handlers, invoked in registration order.
#[derive(Default)]
pub struct ClassHandlers {
    table: AHashMap<PropertyId, Vec<ErasedHandler>>,
}

impl std::fmt::Debug for ClassHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<(u32, usize)> = self
            .table
            .iter()
            .map(|(id, handlers)| (id.0, handlers.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("ClassHandlers")
            .field("handlers", &counts)
            .finish()
    }
}

impl ClassHandlers {
    /// Append `handler` to the list for `key`.
    pub fn register<T: 'static>(
        &mut self,
        key: PropertyKey<T>,
        handler: impl Fn(&PropertyChanged<'_, T>) + 'static,
    ) {
        let erased: ErasedHandler =
            Rc::new(move |state: &WidgetState, old: &dyn Any, new: &dyn Any| {
                let (Some(old), Some(new)) = (old.downcast_ref::<T>(), new.downcast_ref::<T>())
                else {
                    return;
                };
                handler(&PropertyChanged {
                    widget: state.id(),
                    property: key,
                    old,
                    new,
                    state,
                });
            });
        self.table.entry(key.id()).or_default().push(erased);
    }

    /// Number of handlers registered for `id`.
    #[must_use]
    pub fn count(&self, id: PropertyId) -> usize {
        self.table.get(&id).map_or(0, Vec::len)
    }

    fn handlers_for(&self, id: PropertyId) -> Vec<ErasedHandler> {
        self.table.get(&id).cloned().unwrap_or_default()
    }
}

/// Storage for one (widget, property) pair.
///
/// The dispatch subscription forwards every change to the class handlers
/// registered for the property at the time of the change.
pub(crate) struct PropertySlot<T> {
    pub(crate) value: Observable<T>,
    _dispatch: Subscription,
}

impl<T: Clone + PartialEq + 'static> PropertySlot<T> {
    pub(crate) fn new(
        key: PropertyKey<T>,
        state: Rc<WidgetState>,
        handlers: Rc<RefCell<ClassHandlers>>,
    ) -> Self {
        let initial = key.default_value();
        let value = Observable::new(initial.clone());
        let previous = RefCell::new(initial);
        let dispatch = value.subscribe(move |new: &T| {
            let old = previous.replace(new.clone());
            let list = handlers.borrow().handlers_for(key.id());
            let (old, new): (&dyn Any, &dyn Any) = (&old, new);
            for handler in list {
                handler(state.as_ref(), old, new);
            }
        });
        Self {
            value,
            _dispatch: dispatch,
        }
    }
}
