#![forbid(unsafe_code)]

//! Widget handles and per-widget records.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use ahash::AHashMap;
use lookless_reactive::EventHandlers;

use crate::binding::ActiveBinding;
use crate::layout::LayoutQueue;
use crate::lifecycle::TemplateAppliedEvent;
use crate::logical::LogicalTreeEvent;
use crate::name_scope::NameScope;
use crate::property::PropertyId;

slotmap::new_key_type! {
    /// Stable, generational handle to a widget in a [`WidgetTree`](crate::WidgetTree).
    ///
    /// Handles to released widgets never alias a newer widget.
    pub struct WidgetId;
}

/// Flags shared between a widget record and the class handlers that react
/// to its property changes.
///
/// Handlers run inside property notifications and therefore cannot borrow
/// the tree; this is the part of a widget they are allowed to touch.
#[derive(Debug)]
pub struct WidgetState {
    id: WidgetId,
    templated: bool,
    template_applied: Cell<bool>,
    measure_valid: Cell<bool>,
    layout: LayoutQueue,
}

impl WidgetState {
    pub(crate) fn new(id: WidgetId, templated: bool, layout: LayoutQueue) -> Self {
        Self {
            id,
            templated,
            template_applied: Cell::new(false),
            measure_valid: Cell::new(false),
            layout,
        }
    }

    /// Handle of the widget this state belongs to.
    #[must_use]
    pub fn id(&self) -> WidgetId {
        self.id
    }

    /// Whether the widget takes its visual children from a template.
    #[must_use]
    pub fn is_templated(&self) -> bool {
        self.templated
    }

    /// Whether the current template (possibly none) has been instantiated.
    #[must_use]
    pub fn is_template_applied(&self) -> bool {
        self.template_applied.get()
    }

    pub(crate) fn set_template_applied(&self, applied: bool) {
        self.template_applied.set(applied);
    }

    /// Whether the last layout pass measured this widget and nothing has
    /// invalidated it since.
    #[must_use]
    pub fn is_measure_valid(&self) -> bool {
        self.measure_valid.get()
    }

    /// Mark the widget for remeasure and queue it for the next layout pass.
    ///
    /// Returns `true` if the widget was not already queued.
    pub fn invalidate_measure(&self) -> bool {
        self.measure_valid.set(false);
        self.layout.enqueue(self.id)
    }

    pub(crate) fn mark_measured(&self) {
        self.measure_valid.set(true);
    }
}

/// Notification lists owned by one widget.
#[derive(Debug, Default)]
pub(crate) struct WidgetEvents {
    pub(crate) template_applied: EventHandlers<TemplateAppliedEvent>,
    pub(crate) attached: EventHandlers<LogicalTreeEvent>,
    pub(crate) detached: EventHandlers<LogicalTreeEvent>,
}

/// Arena entry for one widget.
pub(crate) struct WidgetRecord {
    pub(crate) type_name: &'static str,
    pub(crate) name: Option<String>,
    pub(crate) state: Rc<WidgetState>,

    pub(crate) visual_parent: Option<WidgetId>,
    pub(crate) visual_children: Vec<WidgetId>,
    pub(crate) parent: Option<WidgetId>,
    pub(crate) logical_children: Vec<WidgetId>,
    pub(crate) attached: bool,

    /// Back-reference to the widget whose template created this one.
    pub(crate) templated_parent: Option<WidgetId>,
    /// Ambient scope, set on template roots.
    pub(crate) name_scope: Option<Rc<NameScope>>,
    /// Scope produced by this widget's own template.
    pub(crate) template_scope: Option<Rc<NameScope>>,
    pub(crate) is_focus_target: bool,

    pub(crate) properties: AHashMap<PropertyId, Box<dyn Any>>,
    pub(crate) bindings: Vec<ActiveBinding>,
    pub(crate) events: WidgetEvents,
}

impl WidgetRecord {
    pub(crate) fn new(type_name: &'static str, state: Rc<WidgetState>) -> Self {
        Self {
            type_name,
            name: None,
            state,
            visual_parent: None,
            visual_children: Vec::new(),
            parent: None,
            logical_children: Vec::new(),
            attached: false,
            templated_parent: None,
            name_scope: None,
            template_scope: None,
            is_focus_target: false,
            properties: AHashMap::new(),
            bindings: Vec::new(),
            events: WidgetEvents::default(),
        }
    }
}

impl std::fmt::Debug for WidgetRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetRecord")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("visual_children", &self.visual_children)
            .field("templated_parent", &self.templated_parent)
            .field("template_applied", &self.state.is_template_applied())
            .finish_non_exhaustive()
    }
}
