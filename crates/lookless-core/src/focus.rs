#![forbid(unsafe_code)]

//! Focus-visual host lookup.

use crate::error::Result;
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

impl WidgetTree {
    /// Mark or unmark `widget` as the element that should draw the focus
    /// indicator for the template it belongs to.
    pub fn set_is_template_focus_target(&mut self, widget: WidgetId, value: bool) -> Result<()> {
        self.record_mut(widget)?.is_focus_target = value;
        Ok(())
    }

    /// Whether `widget` carries the focus-target marker.
    #[must_use]
    pub fn is_template_focus_target(&self, widget: WidgetId) -> bool {
        self.record(widget).is_ok_and(|r| r.is_focus_target)
    }

    /// First marked element of `owner`'s instantiated template, in document
    /// order, or `owner` itself when none is marked.
    #[must_use]
    pub fn template_focus_target(&self, owner: WidgetId) -> WidgetId {
        self.template_children(owner)
            .into_iter()
            .find(|id| self.is_template_focus_target(*id))
            .unwrap_or(owner)
    }
}
