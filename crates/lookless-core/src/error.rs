#![forbid(unsafe_code)]

//! Errors raised by the widget tree and the template lifecycle.
//!
//! Only [`TemplateError::DuplicateName`] is part of the instantiation
//! contract proper: it aborts the current instantiation and propagates to
//! whoever asked for the template (usually the layout pass). The remaining
//! variants guard the arena against structural misuse.

use crate::widget::WidgetId;

/// Standard result type for tree and template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Structural errors in the widget tree or a template's output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Two elements of one instantiation carry the same name.
    #[error("duplicate name '{name}' in template name scope")]
    DuplicateName { name: String },

    /// An element name is not identifier shaped (only with name validation on).
    #[error("invalid element name '{name}'")]
    InvalidName { name: String },

    /// The handle refers to a widget that has been released.
    #[error("widget {widget:?} is no longer alive")]
    StaleWidget { widget: WidgetId },

    /// Visual children of a templated widget belong to its template.
    #[error("visual children of templated widget {widget:?} are managed by its template")]
    ManagedVisualChildren { widget: WidgetId },

    /// The widget already has a parent of the kind being assigned.
    #[error("widget {widget:?} already has a parent")]
    AlreadyParented { widget: WidgetId },

    /// Parenting `child` under `parent` would make a widget its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: WidgetId, child: WidgetId },

    /// A property slot holds a value of a different type than the key.
    #[error("property '{property}' holds a value of another type")]
    PropertyType { property: &'static str },

    /// Layout kept producing new invalidations past the configured budget.
    #[error("layout did not settle after {passes} passes")]
    LayoutBudgetExhausted { passes: u32 },
}

impl TemplateError {
    /// Whether the error describes a defect in template content rather than
    /// misuse of the tree API.
    #[must_use]
    pub fn is_authoring_defect(&self) -> bool {
        matches!(self, Self::DuplicateName { .. } | Self::InvalidName { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_element() {
        let err = TemplateError::DuplicateName {
            name: "PART_Header".into(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate name 'PART_Header' in template name scope"
        );
        assert!(err.is_authoring_defect());
    }

    #[test]
    fn structural_errors_are_not_authoring_defects() {
        let err = TemplateError::LayoutBudgetExhausted { passes: 8 };
        assert!(err.to_string().contains("8 passes"));
        assert!(!err.is_authoring_defect());
        assert!(!TemplateError::PropertyType { property: "Template" }.is_authoring_defect());
    }
}
