#![forbid(unsafe_code)]

//! Widget arena.
//!
//! [`WidgetTree`] owns every widget record. Parent/child links in both
//! directions are plain [`WidgetId`] handles, so there are no reference
//! cycles: dropping a subtree is just unlinking it from its parent and
//! releasing the records reachable from it.
//!
//! # Ownership
//!
//! - A widget owns its visual children and its logical children.
//! - A visual child whose logical parent lies *outside* the subtree being
//!   released (content handed to a template part by the widget's user) is
//!   unlinked and survives.
//! - `templated_parent`, name scope entries and binding sources are
//!   lookup-only handles and never keep a widget alive.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use lookless_reactive::Observable;
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::config::TreeConfig;
use crate::error::{Result, TemplateError};
use crate::layout::LayoutQueue;
use crate::lifecycle;
use crate::name_scope::is_valid_name;
use crate::property::{ClassHandlers, PropertyChanged, PropertyKey, PropertySlot};
use crate::widget::{WidgetId, WidgetRecord, WidgetState};

/// Arena of widgets plus the shared machinery they hook into.
pub struct WidgetTree {
    records: SlotMap<WidgetId, WidgetRecord>,
    class_handlers: Rc<RefCell<ClassHandlers>>,
    layout: LayoutQueue,
    config: TreeConfig,
    pub(crate) next_binding: u64,
}

impl Default for WidgetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WidgetTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetTree")
            .field("widgets", &self.records.len())
            .field("layout_queue", &self.layout.len())
            .field("config", &self.config)
            .finish()
    }
}

impl WidgetTree {
    /// Empty tree with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Empty tree. Built-in class handlers are registered here, once.
    #[must_use]
    pub fn with_config(config: TreeConfig) -> Self {
        let mut handlers = ClassHandlers::default();
        handlers.register(lifecycle::TEMPLATE, lifecycle::on_template_changed);
        Self {
            records: SlotMap::with_capacity_and_key(config.capacity),
            class_handlers: Rc::new(RefCell::new(handlers)),
            layout: LayoutQueue::default(),
            config,
            next_binding: 0,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of live widgets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the tree holds no widgets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `id` refers to a live widget.
    #[must_use]
    pub fn contains(&self, id: WidgetId) -> bool {
        self.records.contains_key(id)
    }

    /// Create a plain widget. Its visual children are managed by the caller.
    pub fn create(&mut self, type_name: &'static str) -> WidgetId {
        self.insert(type_name, false)
    }

    /// Create a templated widget. Its visual children come from its
    /// template; it is queued for the first layout pass.
    pub fn create_templated(&mut self, type_name: &'static str) -> WidgetId {
        let id = self.insert(type_name, true);
        self.layout.enqueue(id);
        id
    }

    fn insert(&mut self, type_name: &'static str, templated: bool) -> WidgetId {
        let layout = self.layout.clone();
        let id = self.records.insert_with_key(|id| {
            let state = Rc::new(WidgetState::new(id, templated, layout));
            WidgetRecord::new(type_name, state)
        });
        trace!(widget = ?id, type_name, templated, "widget created");
        id
    }

    pub(crate) fn record(&self, id: WidgetId) -> Result<&WidgetRecord> {
        self.records
            .get(id)
            .ok_or(TemplateError::StaleWidget { widget: id })
    }

    pub(crate) fn record_mut(&mut self, id: WidgetId) -> Result<&mut WidgetRecord> {
        self.records
            .get_mut(id)
            .ok_or(TemplateError::StaleWidget { widget: id })
    }

    pub(crate) fn widget_ids(&self) -> impl Iterator<Item = WidgetId> + '_ {
        self.records.keys()
    }

    /// Shared flags of `id`.
    #[must_use]
    pub fn state(&self, id: WidgetId) -> Option<&WidgetState> {
        self.records.get(id).map(|r| r.state.as_ref())
    }

    /// Type label given at creation.
    #[must_use]
    pub fn type_name(&self, id: WidgetId) -> Option<&'static str> {
        self.records.get(id).map(|r| r.type_name)
    }

    /// Whether `id` is a templated widget.
    #[must_use]
    pub fn is_templated(&self, id: WidgetId) -> bool {
        self.records.get(id).is_some_and(|r| r.state.is_templated())
    }

    // ── Names ────────────────────────────────────────────────────────

    /// Set or clear (empty string) the element name of `id`.
    pub fn set_name(&mut self, id: WidgetId, name: &str) -> Result<()> {
        if !name.is_empty() && self.config.validate_names && !is_valid_name(name) {
            return Err(TemplateError::InvalidName {
                name: name.to_owned(),
            });
        }
        let record = self.record_mut(id)?;
        record.name = (!name.is_empty()).then(|| name.to_owned());
        Ok(())
    }

    /// Element name of `id`.
    #[must_use]
    pub fn name(&self, id: WidgetId) -> Option<&str> {
        self.records.get(id)?.name.as_deref()
    }

    // ── Visual structure ─────────────────────────────────────────────

    /// Append `child` to `parent`'s visual children.
    ///
    /// Rejected for templated parents (their template owns that list), for
    /// children that already have a visual parent, and for cycles.
    pub fn add_visual_child(&mut self, parent: WidgetId, child: WidgetId) -> Result<()> {
        let parent_record = self.record(parent)?;
        if parent_record.state.is_templated() {
            return Err(TemplateError::ManagedVisualChildren { widget: parent });
        }
        if self.record(child)?.visual_parent.is_some() {
            return Err(TemplateError::AlreadyParented { widget: child });
        }
        if self.visual_ancestors_inclusive(parent).any(|id| id == child) {
            return Err(TemplateError::Cycle { parent, child });
        }
        self.graft_visual(parent, child);
        Ok(())
    }

    /// Link without the checks; callers guarantee `child` is unparented.
    pub(crate) fn graft_visual(&mut self, parent: WidgetId, child: WidgetId) {
        if let Some(record) = self.records.get_mut(child) {
            record.visual_parent = Some(parent);
        }
        if let Some(record) = self.records.get_mut(parent) {
            record.visual_children.push(child);
        }
    }

    /// Visual children of `id`, in order. Empty for released widgets.
    #[must_use]
    pub fn visual_children(&self, id: WidgetId) -> &[WidgetId] {
        self.records
            .get(id)
            .map(|r| r.visual_children.as_slice())
            .unwrap_or_default()
    }

    /// Visual parent of `id`.
    #[must_use]
    pub fn visual_parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.records.get(id)?.visual_parent
    }

    /// The widget whose template created `id`, if any.
    #[must_use]
    pub fn templated_parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.records.get(id)?.templated_parent
    }

    /// Overwrite the templated-parent back-reference of `id`.
    pub fn set_templated_parent(&mut self, id: WidgetId, owner: Option<WidgetId>) -> Result<()> {
        self.record_mut(id)?.templated_parent = owner;
        Ok(())
    }

    /// Visual descendants of `id` in document (depth-first pre-) order,
    /// excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut stack: Vec<WidgetId> = self.visual_children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.visual_children(current).iter().rev());
        }
        out
    }

    fn visual_ancestors_inclusive(&self, id: WidgetId) -> impl Iterator<Item = WidgetId> + '_ {
        std::iter::successors(Some(id), |current| self.visual_parent(*current))
    }

    /// Unlink `id` from its parents, detach it from the logical tree and
    /// release it with everything it owns. Returns the number of released
    /// widgets.
    pub fn remove(&mut self, id: WidgetId) -> Result<usize> {
        let record = self.record(id)?;
        let (visual_parent, parent, attached) = (record.visual_parent, record.parent, record.attached);
        if attached {
            self.detach_from_logical_tree(id)?;
        }
        if let Some(vp) = visual_parent
            && let Some(vp_record) = self.records.get_mut(vp)
        {
            vp_record.visual_children.retain(|c| *c != id);
            if vp_record.state.is_templated() {
                // Removing a template root by hand leaves the owner without
                // its template output; rebuild on the next layout pass.
                vp_record.template_scope = None;
                vp_record.state.set_template_applied(false);
                vp_record.state.invalidate_measure();
            }
        }
        if let Some(p) = parent
            && let Some(p_record) = self.records.get_mut(p)
        {
            p_record.logical_children.retain(|c| *c != id);
        }
        Ok(self.release_subtree(id))
    }

    /// Release `root` and every widget it owns. `root` must already be
    /// unlinked from its parents' child lists.
    pub(crate) fn release_subtree(&mut self, root: WidgetId) -> usize {
        // Foreign content is decided against the whole released set, so it
        // cannot depend on walk order. Excluding a child can orphan content
        // parented under it, hence the loop.
        let mut kept: AHashSet<WidgetId> = AHashSet::new();
        let order = loop {
            let order = self.owned_subtree(root, &kept);
            let released: AHashSet<WidgetId> = order.iter().copied().collect();
            let before = kept.len();
            for id in &order {
                let Some(record) = self.records.get(*id) else {
                    continue;
                };
                kept.extend(record.visual_children.iter().copied().filter(|child| {
                    self.records
                        .get(*child)
                        .and_then(|c| c.parent)
                        .is_some_and(|p| !released.contains(&p))
                }));
            }
            if kept.len() == before {
                break order;
            }
        };

        for id in &kept {
            if let Some(record) = self.records.get_mut(*id) {
                record.visual_parent = None;
            }
        }
        for id in &order {
            self.records.remove(*id);
        }
        debug!(root = ?root, released = order.len(), kept = kept.len(), "subtree released");
        order.len()
    }

    /// Pre-order walk over visual and logical children of `root`, skipping
    /// the subtrees rooted at `kept`.
    fn owned_subtree(&self, root: WidgetId, kept: &AHashSet<WidgetId>) -> Vec<WidgetId> {
        let mut seen: AHashSet<WidgetId> = AHashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(record) = self.records.get(id) else {
                continue;
            };
            order.push(id);
            stack.extend(
                record
                    .visual_children
                    .iter()
                    .rev()
                    .filter(|child| !kept.contains(*child)),
            );
            stack.extend(record.logical_children.iter().rev());
        }
        order
    }

    // ── Properties ───────────────────────────────────────────────────

    /// Change stream for (`id`, `key`), created on first use with the
    /// property's default value.
    pub fn observe<T: Clone + PartialEq + 'static>(
        &mut self,
        id: WidgetId,
        key: PropertyKey<T>,
    ) -> Result<Observable<T>> {
        let handlers = Rc::clone(&self.class_handlers);
        let record = self.record_mut(id)?;
        let state = Rc::clone(&record.state);
        let slot = record
            .properties
            .entry(key.id())
            .or_insert_with(|| Box::new(PropertySlot::new(key, state, handlers)) as Box<dyn Any>);
        slot.downcast_ref::<PropertySlot<T>>()
            .map(|slot| slot.value.clone())
            .ok_or(TemplateError::PropertyType {
                property: key.name(),
            })
    }

    /// Current value of (`id`, `key`); the default if never set. `None` for
    /// released widgets.
    #[must_use]
    pub fn get<T: Clone + PartialEq + 'static>(
        &self,
        id: WidgetId,
        key: PropertyKey<T>,
    ) -> Option<T> {
        let record = self.records.get(id)?;
        match record.properties.get(&key.id()) {
            Some(slot) => slot
                .downcast_ref::<PropertySlot<T>>()
                .map(|slot| slot.value.get()),
            None => Some(key.default_value()),
        }
    }

    /// Write (`id`, `key`). Returns whether the value changed. Class
    /// handlers and subscribers run before this returns (or when the
    /// enclosing batch ends).
    pub fn set<T: Clone + PartialEq + 'static>(
        &mut self,
        id: WidgetId,
        key: PropertyKey<T>,
        value: T,
    ) -> Result<bool> {
        let observable = self.observe(id, key)?;
        Ok(observable.set(value))
    }

    /// Add a class handler for `key`, run after every change on any widget.
    pub fn register_class_handler<T: 'static>(
        &mut self,
        key: PropertyKey<T>,
        handler: impl Fn(&PropertyChanged<'_, T>) + 'static,
    ) {
        self.class_handlers.borrow_mut().register(key, handler);
    }

    /// Class handler table, for inspection.
    #[must_use]
    pub fn class_handlers(&self) -> std::cell::Ref<'_, ClassHandlers> {
        self.class_handlers.borrow()
    }

    // ── Layout requests ──────────────────────────────────────────────

    /// Request a remeasure of `id`. Returns `true` if newly queued.
    pub fn invalidate_measure(&mut self, id: WidgetId) -> bool {
        self.records
            .get(id)
            .is_some_and(|r| r.state.invalidate_measure())
    }

    /// Whether `id` has been measured since its last invalidation.
    #[must_use]
    pub fn is_measure_valid(&self, id: WidgetId) -> bool {
        self.records
            .get(id)
            .is_some_and(|r| r.state.is_measure_valid())
    }

    /// Pending remeasure requests.
    #[must_use]
    pub fn layout_queue(&self) -> &LayoutQueue {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn create_and_release() {
        let mut tree = WidgetTree::new();
        let panel = tree.create("Panel");
        let a = tree.create("A");
        let b = tree.create("B");
        tree.add_visual_child(panel, a).unwrap();
        tree.add_visual_child(a, b).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.descendants(panel), vec![a, b]);

        assert_eq!(tree.remove(a).unwrap(), 2);
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(tree.visual_children(panel).is_empty());
        assert_eq!(tree.type_name(panel), Some("Panel"));
    }

    #[test]
    fn stale_handles_do_not_alias_new_widgets() {
        let mut tree = WidgetTree::new();
        let old = tree.create("Old");
        tree.remove(old).unwrap();
        let fresh = tree.create("Fresh");
        assert_ne!(old, fresh);
        assert!(!tree.contains(old));
        assert_eq!(
            tree.set_name(old, "x"),
            Err(TemplateError::StaleWidget { widget: old })
        );
    }

    #[test]
    fn descendants_are_document_order() {
        let mut tree = WidgetTree::new();
        let root = tree.create("Root");
        let left = tree.create("Left");
        let left_leaf = tree.create("LeftLeaf");
        let right = tree.create("Right");
        tree.add_visual_child(root, left).unwrap();
        tree.add_visual_child(left, left_leaf).unwrap();
        tree.add_visual_child(root, right).unwrap();
        assert_eq!(tree.descendants(root), vec![left, left_leaf, right]);
    }

    #[test]
    fn visual_child_rules() {
        let mut tree = WidgetTree::new();
        let control = tree.create_templated("Button");
        let panel = tree.create("Panel");
        let child = tree.create("Child");

        assert_eq!(
            tree.add_visual_child(control, child),
            Err(TemplateError::ManagedVisualChildren { widget: control })
        );
        tree.add_visual_child(panel, child).unwrap();
        assert_eq!(
            tree.add_visual_child(panel, child),
            Err(TemplateError::AlreadyParented { widget: child })
        );
        assert_eq!(
            tree.add_visual_child(child, panel),
            Err(TemplateError::Cycle {
                parent: child,
                child: panel
            })
        );
        assert_eq!(tree.visual_parent(child), Some(panel));
    }

    #[test]
    fn names_validated_when_enabled() {
        let mut tree = WidgetTree::new();
        let w = tree.create("W");
        assert!(matches!(
            tree.set_name(w, "not valid"),
            Err(TemplateError::InvalidName { .. })
        ));
        tree.set_name(w, "Valid_1").unwrap();
        assert_eq!(tree.name(w), Some("Valid_1"));
        tree.set_name(w, "").unwrap();
        assert_eq!(tree.name(w), None);

        let mut lax = WidgetTree::with_config(TreeConfig::default().with_name_validation(false));
        let w = lax.create("W");
        lax.set_name(w, "any name at all").unwrap();
        assert_eq!(lax.name(w), Some("any name at all"));
    }

    #[test]
    fn property_get_set_observe() {
        let width = PropertyKey::<u16>::register("Width", || 10);
        let mut tree = WidgetTree::new();
        let w = tree.create("W");

        assert_eq!(tree.get(w, width), Some(10));
        let stream = tree.observe(w, width).unwrap();
        let seen = Rc::new(Cell::new(0u16));
        let seen_c = Rc::clone(&seen);
        let _sub = stream.subscribe(move |v| seen_c.set(*v));

        assert!(tree.set(w, width, 42).unwrap());
        assert!(!tree.set(w, width, 42).unwrap());
        assert_eq!(tree.get(w, width), Some(42));
        assert_eq!(seen.get(), 42);

        tree.remove(w).unwrap();
        assert_eq!(tree.get(w, width), None);
    }

    #[test]
    fn class_handlers_see_old_and_new_values() {
        let label = PropertyKey::<String>::register("Label", String::new);
        let mut tree = WidgetTree::new();
        let w = tree.create("W");
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = Rc::clone(&log);
        tree.register_class_handler(label, move |change| {
            log_c
                .borrow_mut()
                .push((change.old.clone(), change.new.clone()));
            change.state.invalidate_measure();
        });
        assert_eq!(tree.class_handlers().count(label.id()), 1);

        tree.set(w, label, "ok".to_string()).unwrap();
        assert_eq!(*log.borrow(), vec![(String::new(), "ok".to_string())]);
        assert!(tree.layout_queue().contains(w));
    }

    #[test]
    fn user_content_hosted_in_released_subtree_survives() {
        let mut tree = WidgetTree::new();
        let owner = tree.create("Owner");
        let host = tree.create("Host");
        let content = tree.create("Content");
        tree.add_logical_child(owner, content).unwrap();
        tree.add_visual_child(host, content).unwrap();

        assert_eq!(tree.remove(host).unwrap(), 1);
        assert!(tree.contains(content));
        assert_eq!(tree.visual_parent(content), None);
        assert_eq!(tree.parent(content), Some(owner));
    }

    #[test]
    fn content_owned_by_a_later_sibling_is_released_with_it() {
        let mut tree = WidgetTree::new();
        let root = tree.create("Root");
        let first = tree.create("First");
        let second = tree.create("Second");
        let content = tree.create("Content");
        tree.add_visual_child(root, first).unwrap();
        tree.add_visual_child(root, second).unwrap();
        tree.add_logical_child(second, content).unwrap();
        tree.add_visual_child(first, content).unwrap();

        assert_eq!(tree.remove(root).unwrap(), 4);
        assert!(!tree.contains(content));
        assert!(tree.is_empty());
    }

    #[test]
    fn content_orphaned_by_kept_content_survives_too() {
        let mut tree = WidgetTree::new();
        let outside = tree.create("Outside");
        let host = tree.create("Host");
        let hosted = tree.create("Hosted");
        let nested = tree.create("Nested");
        tree.add_logical_child(outside, hosted).unwrap();
        tree.add_visual_child(host, hosted).unwrap();
        tree.add_logical_child(hosted, nested).unwrap();
        tree.add_visual_child(host, nested).unwrap();

        assert_eq!(tree.remove(host).unwrap(), 1);
        assert!(tree.contains(hosted));
        assert!(tree.contains(nested));
        assert_eq!(tree.visual_parent(nested), None);
    }
}
