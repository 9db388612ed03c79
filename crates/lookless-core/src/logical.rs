#![forbid(unsafe_code)]

//! Logical tree links and attach/detach propagation.
//!
//! The logical tree is the ownership tree users build (content, items);
//! the visual tree additionally contains template output. A template root's
//! logical parent is its owner, but it is not listed among the owner's
//! logical children: it is reached through the owner's single visual child
//! instead.
//!
//! Detaching a templated widget notifies its instantiated template root
//! *before* the widget's own detach handling runs. Attaching mirrors that:
//! the widget first, then its template root.

use lookless_reactive::Subscription;
use tracing::trace;

use crate::error::{Result, TemplateError};
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

/// Payload of the attached/detached notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalTreeEvent {
    /// Widget being attached or detached.
    pub widget: WidgetId,
    /// Root of the logical tree involved.
    pub root: WidgetId,
}

impl WidgetTree {
    /// Logical parent of `id`.
    #[must_use]
    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.record(id).ok()?.parent
    }

    /// Logical children of `id`, in insertion order.
    #[must_use]
    pub fn logical_children(&self, id: WidgetId) -> &[WidgetId] {
        self.record(id)
            .map(|r| r.logical_children.as_slice())
            .unwrap_or_default()
    }

    /// Move `child` under `parent` (or make it a root with `None`).
    ///
    /// Leaving an attached parent detaches the child; joining an attached
    /// parent attaches it.
    pub fn set_parent(&mut self, child: WidgetId, parent: Option<WidgetId>) -> Result<()> {
        let old = self.record(child)?.parent;
        if old == parent {
            return Ok(());
        }
        if let Some(p) = parent {
            self.record(p)?;
            let mut current = Some(p);
            while let Some(id) = current {
                if id == child {
                    return Err(TemplateError::Cycle { parent: p, child });
                }
                current = self.parent(id);
            }
        }

        if self.is_attached_to_logical_tree(child) {
            let root = self.logical_root(child);
            self.notify_detached(child, root);
        }
        if let Some(old) = old
            && let Ok(record) = self.record_mut(old)
        {
            record.logical_children.retain(|c| *c != child);
        }
        self.record_mut(child)?.parent = parent;
        if let Some(p) = parent {
            self.record_mut(p)?.logical_children.push(child);
            if self.is_attached_to_logical_tree(p) {
                let root = self.logical_root(p);
                self.notify_attached(child, root);
            }
        }
        Ok(())
    }

    /// Append `child` to `parent`'s logical children. `child` must not have
    /// a logical parent yet.
    pub fn add_logical_child(&mut self, parent: WidgetId, child: WidgetId) -> Result<()> {
        if self.record(child)?.parent.is_some() {
            return Err(TemplateError::AlreadyParented { widget: child });
        }
        self.set_parent(child, Some(parent))
    }

    /// Mark `root` and everything below it attached. No-op if already
    /// attached.
    pub fn attach_to_logical_tree(&mut self, root: WidgetId) -> Result<()> {
        if !self.record(root)?.attached {
            self.notify_attached(root, root);
        }
        Ok(())
    }

    /// Detach `widget` and everything below it, template output first.
    /// Links are kept; only the attachment state changes.
    pub fn detach_from_logical_tree(&mut self, widget: WidgetId) -> Result<()> {
        if self.record(widget)?.attached {
            let root = self.logical_root(widget);
            self.notify_detached(widget, root);
        }
        Ok(())
    }

    /// Whether `id` is attached to a logical tree.
    #[must_use]
    pub fn is_attached_to_logical_tree(&self, id: WidgetId) -> bool {
        self.record(id).is_ok_and(|r| r.attached)
    }

    /// Subscribe to `id`'s attached notification.
    pub fn on_attached_to_logical_tree(
        &self,
        id: WidgetId,
        handler: impl Fn(&LogicalTreeEvent) + 'static,
    ) -> Result<Subscription> {
        Ok(self.record(id)?.events.attached.subscribe(handler))
    }

    /// Subscribe to `id`'s detached notification.
    pub fn on_detached_from_logical_tree(
        &self,
        id: WidgetId,
        handler: impl Fn(&LogicalTreeEvent) + 'static,
    ) -> Result<Subscription> {
        Ok(self.record(id)?.events.detached.subscribe(handler))
    }

    /// Topmost logical ancestor of `id` (`id` itself for roots).
    pub(crate) fn logical_root(&self, id: WidgetId) -> WidgetId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    pub(crate) fn notify_attached(&mut self, id: WidgetId, root: WidgetId) {
        let Ok(record) = self.record_mut(id) else {
            return;
        };
        if record.attached {
            return;
        }
        record.attached = true;
        let children = record.logical_children.clone();
        let template_root = self.template_root(id);
        if let Ok(record) = self.record(id) {
            record
                .events
                .attached
                .raise(&LogicalTreeEvent { widget: id, root });
        }
        trace!(widget = ?id, root = ?root, "attached");

        for child in children {
            self.notify_attached(child, root);
        }
        if let Some(template_root) = template_root {
            self.notify_attached(template_root, root);
        }
    }

    pub(crate) fn notify_detached(&mut self, id: WidgetId, root: WidgetId) {
        if !self.is_attached_to_logical_tree(id) {
            return;
        }
        if let Some(template_root) = self.template_root(id)
            && self.is_attached_to_logical_tree(template_root)
        {
            self.notify_detached(template_root, root);
        }

        let Ok(record) = self.record_mut(id) else {
            return;
        };
        record.attached = false;
        let children = record.logical_children.clone();
        if let Ok(record) = self.record(id) {
            record
                .events
                .detached
                .raise(&LogicalTreeEvent { widget: id, root });
        }
        trace!(widget = ?id, root = ?root, "detached");

        for child in children {
            self.notify_detached(child, root);
        }
    }
}
