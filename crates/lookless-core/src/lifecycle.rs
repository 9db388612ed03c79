#![forbid(unsafe_code)]

//! Template lifecycle: the `TEMPLATE` property, lazy instantiation and
//! teardown.
//!
//! # Contract
//!
//! - Changing `TEMPLATE` never rebuilds. The class handler clears the
//!   widget's applied flag and requests a remeasure; the rebuild happens in
//!   [`WidgetTree::apply_template`], normally driven by the layout pass.
//! - `apply_template` is idempotent: once applied, further calls are no-ops
//!   until the template changes again.
//! - Teardown strictly precedes construction. Old template children lose
//!   their templated-parent back-reference before the factory runs.
//! - A templated widget has at most one visual child: the template root.
//! - The applied flag is raised before the factory runs, so a factory that
//!   re-enters `apply_template` for its own owner gets a no-op. It is
//!   lowered again if instantiation fails, and the partial subtree is
//!   released.

use std::rc::Rc;

use lookless_reactive::Subscription;
use tracing::{debug, debug_span, trace, warn};

use crate::error::{Result, TemplateError};
use crate::name_scope::NameScope;
use crate::property::{PropertyChanged, PropertyKey};
use crate::template::{TemplateBuilder, TemplateRef};
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

fn no_template() -> Option<TemplateRef> {
    None
}

/// The template reference of a templated widget.
pub const TEMPLATE: PropertyKey<Option<TemplateRef>> =
    PropertyKey::builtin(1, "Template", no_template);

/// Payload of the template-applied notification.
///
/// Raised once per successful instantiation that produced content.
#[derive(Debug, Clone)]
pub struct TemplateAppliedEvent {
    /// The templated widget.
    pub owner: WidgetId,
    /// Names registered by this instantiation.
    pub name_scope: Rc<NameScope>,
}

/// Class handler for `TEMPLATE`: any change marks the widget stale and asks
/// for a remeasure.
pub(crate) fn on_template_changed(change: &PropertyChanged<'_, Option<TemplateRef>>) {
    if !change.state.is_templated() {
        return;
    }
    change.state.set_template_applied(false);
    change.state.invalidate_measure();
    debug!(
        widget = ?change.widget,
        old = change.old.as_ref().map_or("none", TemplateRef::describe),
        new = change.new.as_ref().map_or("none", TemplateRef::describe),
        "template changed"
    );
}

impl WidgetTree {
    /// Current template of `owner`.
    #[must_use]
    pub fn template(&self, owner: WidgetId) -> Option<TemplateRef> {
        self.get(owner, TEMPLATE).flatten()
    }

    /// Assign `owner`'s template. Returns whether the reference changed.
    pub fn set_template(&mut self, owner: WidgetId, template: Option<TemplateRef>) -> Result<bool> {
        self.set(owner, TEMPLATE, template)
    }

    /// Whether `owner`'s current template has been instantiated.
    #[must_use]
    pub fn is_template_applied(&self, owner: WidgetId) -> bool {
        self.state(owner)
            .is_some_and(|state| state.is_template_applied())
    }

    /// Instantiate `owner`'s template if it is not applied yet.
    ///
    /// Returns `Ok(true)` when an instantiation cycle ran (including one for
    /// a null template or a factory that produced nothing) and `Ok(false)`
    /// for plain widgets and already-applied templates.
    pub fn apply_template(&mut self, owner: WidgetId) -> Result<bool> {
        let state = Rc::clone(&self.record(owner)?.state);
        if !state.is_templated() || state.is_template_applied() {
            return Ok(false);
        }
        let template = self.template(owner);
        let _span = debug_span!(
            "template.apply",
            owner = ?owner,
            template = template.as_ref().map_or("none", TemplateRef::describe)
        )
        .entered();

        self.teardown(owner);
        state.set_template_applied(true);

        let Some(template) = template else {
            trace!("no template");
            return Ok(true);
        };
        if let Err(err) = self.instantiate(owner, &template) {
            state.set_template_applied(false);
            return Err(err);
        }
        Ok(true)
    }

    /// Remove the current template output of `owner`.
    fn teardown(&mut self, owner: WidgetId) {
        for child in self.template_children(owner) {
            if let Ok(record) = self.record_mut(child) {
                record.templated_parent = None;
            }
        }
        let Ok(record) = self.record_mut(owner) else {
            return;
        };
        let old = std::mem::take(&mut record.visual_children);
        record.template_scope = None;
        if old.is_empty() {
            return;
        }
        debug!(owner = ?owner, removed = old.len(), "template torn down");

        let attach_root = self.logical_root(owner);
        for root in old {
            if self.is_attached_to_logical_tree(root) {
                self.notify_detached(root, attach_root);
            }
            if let Ok(record) = self.record_mut(root) {
                record.visual_parent = None;
                record.parent = None;
                record.name_scope = None;
            }
            self.release_subtree(root);
        }
    }

    fn instantiate(&mut self, owner: WidgetId, template: &TemplateRef) -> Result<()> {
        let built = template.build(&mut TemplateBuilder::new(self, owner));
        let root = match built {
            Ok(Some(root)) => root,
            Ok(None) => {
                trace!("factory produced no content");
                self.release_partial(owner);
                return Ok(());
            }
            Err(err) => {
                self.release_partial(owner);
                return Err(err);
            }
        };

        if let Err(err) = self.graft_template_root(owner, root) {
            warn!(owner = ?owner, error = %err, "template instantiation failed");
            if self.visual_parent(root).is_none() && self.templated_parent(root) == Some(owner) {
                self.release_subtree(root);
            }
            self.release_partial(owner);
            return Err(err);
        }
        self.release_partial(owner);
        Ok(())
    }

    fn graft_template_root(&mut self, owner: WidgetId, root: WidgetId) -> Result<()> {
        if root == owner {
            return Err(TemplateError::Cycle {
                parent: owner,
                child: root,
            });
        }
        let record = self.record_mut(root)?;
        if record.visual_parent.is_some() {
            return Err(TemplateError::AlreadyParented { widget: root });
        }
        record.templated_parent = Some(owner);

        let scope = Rc::new(self.register_names(owner, root)?);
        let record = self.record_mut(root)?;
        record.name_scope = Some(Rc::clone(&scope));
        record.parent = Some(owner);
        self.record_mut(owner)?.template_scope = Some(Rc::clone(&scope));
        self.graft_visual(owner, root);
        debug!(owner = ?owner, root = ?root, names = scope.len(), "template applied");

        if self.is_attached_to_logical_tree(owner) {
            let attach_root = self.logical_root(owner);
            self.notify_attached(root, attach_root);
        }

        let event = TemplateAppliedEvent {
            owner,
            name_scope: scope,
        };
        self.record(owner)?.events.template_applied.raise(&event);
        Ok(())
    }

    /// Depth-first pre-order walk from `root`, stopping at nodes that do
    /// not belong to `owner`'s template.
    fn register_names(&self, owner: WidgetId, root: WidgetId) -> Result<NameScope> {
        let mut scope = NameScope::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let record = self.record(id)?;
            if let Some(name) = record.name.as_deref() {
                if let Err(err) = scope.register(name, id) {
                    warn!(owner = ?owner, name, "duplicate name in template");
                    return Err(err);
                }
                trace!(name, widget = ?id, "name registered");
            }
            stack.extend(
                record
                    .visual_children
                    .iter()
                    .rev()
                    .filter(|child| self.templated_parent(**child) == Some(owner)),
            );
        }
        Ok(scope)
    }

    /// Release parts stamped with `owner` that ended up outside its output.
    fn release_partial(&mut self, owner: WidgetId) {
        let orphans: Vec<WidgetId> = self
            .widget_ids()
            .filter(|id| {
                self.templated_parent(*id) == Some(owner)
                    && self.visual_parent(*id).is_none()
                    && self.parent(*id).is_none()
            })
            .collect();
        let mut released = 0;
        for id in orphans {
            released += self.release_subtree(id);
        }
        if released > 0 {
            debug!(owner = ?owner, released, "loose template parts released");
        }
    }

    /// Root of `owner`'s instantiated template.
    #[must_use]
    pub fn template_root(&self, owner: WidgetId) -> Option<WidgetId> {
        if !self.is_templated(owner) {
            return None;
        }
        self.visual_children(owner).first().copied()
    }

    /// Widgets currently registered as `owner`'s template output, in
    /// document order.
    #[must_use]
    pub fn template_children(&self, owner: WidgetId) -> Vec<WidgetId> {
        self.descendants(owner)
            .into_iter()
            .filter(|id| self.templated_parent(*id) == Some(owner))
            .collect()
    }

    /// Name scope of `owner`'s current instantiation.
    #[must_use]
    pub fn template_name_scope(&self, owner: WidgetId) -> Option<Rc<NameScope>> {
        self.record(owner).ok()?.template_scope.clone()
    }

    /// Resolve a named part of `owner`'s current instantiation.
    #[must_use]
    pub fn find_template_part(&self, owner: WidgetId, name: &str) -> Option<WidgetId> {
        self.record(owner)
            .ok()?
            .template_scope
            .as_ref()?
            .find(name)
            .filter(|id| self.contains(*id))
    }

    /// Subscribe to `owner`'s template-applied notification.
    pub fn on_template_applied(
        &self,
        owner: WidgetId,
        handler: impl Fn(&TemplateAppliedEvent) + 'static,
    ) -> Result<Subscription> {
        Ok(self.record(owner)?.events.template_applied.subscribe(handler))
    }
}
