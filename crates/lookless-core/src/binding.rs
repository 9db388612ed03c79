#![forbid(unsafe_code)]

//! Binding descriptors and the template-parent override.
//!
//! Every binding starts from a [`BindingSource`] (widget, property,
//! priority). [`WidgetTree::create_binding_descriptor`] turns it into a
//! [`BindingDescriptor`] whose [`ValueStream`] follows the source property.
//! For [`BindingPriority::TemplatedParent`] sources the stream is truncated
//! at the first change of the owning widget's `TEMPLATE` after the binding
//! starts observing: output built for the old template must stop listening
//! once that template is gone.
//!
//! The value current at subscription time is always delivered, even if the
//! stream is later truncated.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lookless_reactive::{Observable, StopSignal, Subscription};
use tracing::{debug, trace};

use crate::error::Result;
use crate::lifecycle::TEMPLATE;
use crate::property::PropertyKey;
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

/// Where a bound value comes from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingPriority {
    /// Running animation.
    Animation,
    /// Explicit local value.
    LocalValue,
    /// Style trigger.
    StyleTrigger,
    /// Sourced from the widget whose template created the target.
    TemplatedParent,
    /// Style setter.
    Style,
    /// Inherited from an ancestor.
    Inherited,
}

impl BindingPriority {
    /// Whether bindings of this priority end with their template.
    #[must_use]
    pub const fn is_template_scoped(self) -> bool {
        matches!(self, Self::TemplatedParent)
    }
}

/// Source of a binding: a property of a widget, at a priority.
pub struct BindingSource<T> {
    /// Widget that owns the source property.
    pub source: WidgetId,
    /// The source property.
    pub property: PropertyKey<T>,
    /// Priority the binding is applied at.
    pub priority: BindingPriority,
}

impl<T> Clone for BindingSource<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BindingSource<T> {}

impl<T> std::fmt::Debug for BindingSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingSource")
            .field("source", &self.source)
            .field("property", &self.property.name())
            .field("priority", &self.priority)
            .finish()
    }
}

impl<T> BindingSource<T> {
    /// Source at an explicit priority.
    #[must_use]
    pub fn new(source: WidgetId, property: PropertyKey<T>, priority: BindingPriority) -> Self {
        Self {
            source,
            property,
            priority,
        }
    }

    /// Template-parent sourced binding, the common case inside templates.
    #[must_use]
    pub fn templated_parent(source: WidgetId, property: PropertyKey<T>) -> Self {
        Self::new(source, property, BindingPriority::TemplatedParent)
    }
}

type Arm = Rc<dyn Fn(Rc<dyn Fn()>) -> Subscription>;

/// A property change stream, optionally cut off by other streams.
///
/// Subscribing delivers the current value, then every later change until
/// one of the terminators fires.
pub struct ValueStream<T> {
    values: Observable<T>,
    terminators: Vec<Arm>,
}

impl<T> Clone for ValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            terminators: self.terminators.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ValueStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStream")
            .field("terminators", &self.terminators.len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + 'static> ValueStream<T> {
    /// Stream following `values`.
    #[must_use]
    pub fn new(values: Observable<T>) -> Self {
        Self {
            values,
            terminators: Vec::new(),
        }
    }

    /// Stop forwarding once `trigger` next changes. Changes that happened
    /// before subscription do not count.
    #[must_use]
    pub fn take_until_next_change<U: Clone + PartialEq + 'static>(
        mut self,
        trigger: &Observable<U>,
    ) -> Self {
        let trigger = trigger.clone();
        self.terminators.push(Rc::new(move |fire: Rc<dyn Fn()>| {
            trigger.subscribe_immediate(move |_| fire())
        }));
        self
    }

    /// Whether this stream can be cut off.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        !self.terminators.is_empty()
    }

    /// Current value of the underlying property.
    #[must_use]
    pub fn current(&self) -> T {
        self.values.get()
    }

    /// Deliver the current value to `sink`, then forward changes until
    /// terminated. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, sink: impl Fn(&T) + 'static) -> StreamSubscription {
        let (signal, trigger) = StopSignal::pair();
        // Version last handed to `sink`, and the value as it stood when a
        // terminator fired.
        let delivered = Rc::new(Cell::new(self.values.version()));
        let frozen: Rc<RefCell<Option<(u64, T)>>> = Rc::default();
        let fire: Rc<dyn Fn()> = {
            let values = self.values.clone();
            let frozen = Rc::clone(&frozen);
            Rc::new(move || {
                if trigger.stop() {
                    *frozen.borrow_mut() = Some((values.version(), values.get()));
                    debug!("binding terminated");
                }
            })
        };
        let until: Vec<Subscription> = self
            .terminators
            .iter()
            .map(|arm| arm(Rc::clone(&fire)))
            .collect();

        sink(&self.values.get());
        let gate = signal.clone();
        let source = self.values.clone();
        let values = self.values.subscribe(move |value| {
            if gate.is_stopped() {
                // Inside a batch the flush can run after the terminator
                // fired; only writes made before it may reach `sink`.
                let pending = frozen.borrow_mut().take();
                if let Some((version, last)) = pending
                    && version > delivered.get()
                {
                    delivered.set(version);
                    sink(&last);
                }
                return;
            }
            delivered.set(source.version());
            sink(value);
        });
        StreamSubscription {
            signal,
            _values: values,
            _until: until,
        }
    }
}

/// Live subscription to a [`ValueStream`].
#[derive(Debug)]
pub struct StreamSubscription {
    signal: StopSignal,
    _values: Subscription,
    _until: Vec<Subscription>,
}

impl StreamSubscription {
    /// Whether a terminator has fired.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.signal.is_stopped()
    }

    /// Read side of the stop signal.
    #[must_use]
    pub fn signal(&self) -> StopSignal {
        self.signal.clone()
    }
}

/// A binding's source and the stream it reads from.
#[derive(Debug, Clone)]
pub struct BindingDescriptor<T> {
    /// The source this descriptor was created for.
    pub source: BindingSource<T>,
    /// The stream the binding subscribes to.
    pub stream: ValueStream<T>,
}

impl<T> BindingDescriptor<T> {
    /// Priority of the binding.
    #[must_use]
    pub fn priority(&self) -> BindingPriority {
        self.source.priority
    }
}

/// Numeric identity of an installed binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

/// Binding kept alive by its target widget.
#[derive(Debug)]
pub(crate) struct ActiveBinding {
    id: BindingId,
    subscription: StreamSubscription,
}

/// Caller-side handle to an installed binding.
#[derive(Debug, Clone)]
pub struct BindingHandle {
    target: WidgetId,
    id: BindingId,
    signal: StopSignal,
}

impl BindingHandle {
    /// Widget the binding writes to.
    #[must_use]
    pub fn target(&self) -> WidgetId {
        self.target
    }

    /// Binding id.
    #[must_use]
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Whether the stream was cut off by its terminator.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.signal.is_stopped()
    }

    /// Remove the binding from its target. Returns `false` if it was already
    /// gone.
    pub fn detach(&self, tree: &mut WidgetTree) -> bool {
        tree.unbind(self)
    }
}

impl WidgetTree {
    /// Build the descriptor for a binding whose owning widget is `owner`.
    ///
    /// Template-parent sourced bindings are truncated at `owner`'s next
    /// template change; every other priority passes through unchanged.
    pub fn create_binding_descriptor<T: Clone + PartialEq + 'static>(
        &mut self,
        owner: WidgetId,
        source: BindingSource<T>,
    ) -> Result<BindingDescriptor<T>> {
        let mut stream = ValueStream::new(self.observe(source.source, source.property)?);
        if source.priority.is_template_scoped() {
            let template = self.observe(owner, TEMPLATE)?;
            stream = stream.take_until_next_change(&template);
        }
        trace!(
            owner = ?owner,
            source = ?source.source,
            property = source.property.name(),
            priority = ?source.priority,
            "binding descriptor created"
        );
        Ok(BindingDescriptor { source, stream })
    }

    /// Bind `target`'s `key` to `source`. The binding lives until it is
    /// detached or the target is released.
    pub fn bind<T: Clone + PartialEq + 'static>(
        &mut self,
        target: WidgetId,
        key: PropertyKey<T>,
        source: BindingSource<T>,
    ) -> Result<BindingHandle> {
        let descriptor = self.create_binding_descriptor(target, source)?;
        let sink = self.observe(target, key)?;
        let subscription = descriptor.stream.subscribe(move |value: &T| {
            sink.set(value.clone());
        });

        self.next_binding += 1;
        let id = BindingId(self.next_binding);
        let signal = subscription.signal();
        let bindings = &mut self.record_mut(target)?.bindings;
        let before = bindings.len();
        bindings.retain(|b| !b.subscription.is_stopped());
        if bindings.len() < before {
            trace!(widget = ?target, pruned = before - bindings.len(), "terminated bindings dropped");
        }
        bindings.push(ActiveBinding { id, subscription });
        Ok(BindingHandle { target, id, signal })
    }

    /// Remove the binding behind `handle`.
    pub fn unbind(&mut self, handle: &BindingHandle) -> bool {
        let Ok(record) = self.record_mut(handle.target) else {
            return false;
        };
        let before = record.bindings.len();
        record.bindings.retain(|b| b.id != handle.id);
        before != record.bindings.len()
    }

    /// Number of bindings installed on `target`.
    #[must_use]
    pub fn binding_count(&self, target: WidgetId) -> usize {
        self.record(target).map_or(0, |r| r.bindings.len())
    }
}
