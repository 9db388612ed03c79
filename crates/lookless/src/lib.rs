#![forbid(unsafe_code)]

//! Lookless widgets public facade.
//!
//! Re-exports the template engine ([`lookless_core`]) and the reactive
//! primitives ([`lookless_reactive`]), and adds the unified [`Error`] model
//! plus an optional logging bootstrap.
//!
//! ```
//! use lookless::prelude::*;
//!
//! let mut tree = WidgetTree::new();
//! let button = tree.create_templated("Button");
//! tree.set_template(
//!     button,
//!     Some(TemplateRef::from_fn("ButtonTemplate", |b| Ok(Some(b.part("Border"))))),
//! )?;
//! lookless::settle(&mut tree)?;
//! assert!(tree.template_root(button).is_some());
//! # Ok::<(), lookless::Error>(())
//! ```

use tracing::warn;

pub mod error;
#[cfg(feature = "logging")]
pub mod logging;

pub use error::{DegradationAction, Error, Result};

// --- Core re-exports -------------------------------------------------------

pub use lookless_core::{
    BindingDescriptor, BindingHandle, BindingId, BindingPriority, BindingSource, ClassHandlers,
    ConfigError, FuncTemplate, LayoutManager, LayoutPass, LayoutQueue, LogicalTreeEvent,
    NameScope, PropertyChanged, PropertyId, PropertyKey, StreamSubscription, TEMPLATE,
    TemplateAppliedEvent, TemplateBuilder, TemplateError, TemplateFactory, TemplateRef,
    TreeConfig, ValueStream, WidgetId, WidgetState, WidgetTree,
};

// --- Reactive re-exports ---------------------------------------------------

pub use lookless_reactive::{
    BatchScope, EventHandlers, Observable, StopSignal, StopTrigger, Subscription,
};

/// Run one layout pass over `tree`, applying every pending template.
///
/// Failures are logged with their degradation action before being returned.
pub fn settle(tree: &mut WidgetTree) -> Result<LayoutPass> {
    LayoutManager::new(tree.config())
        .run(tree)
        .map_err(|err| {
            let err = Error::from(err);
            warn!(
                error_type = err.error_type(),
                degradation = %err.degradation(),
                error = %err,
                "layout pass failed"
            );
            err
        })
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        BindingPriority, BindingSource, Error, LayoutManager, NameScope, PropertyKey, Result,
        TEMPLATE, TemplateRef, TreeConfig, WidgetId, WidgetTree,
    };

    pub use crate::{core, reactive};
}

pub use lookless_core as core;
pub use lookless_reactive as reactive;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_converts_template_errors() {
        let mut tree = WidgetTree::new();
        let control = tree.create_templated("Control");
        tree.set_template(
            control,
            Some(TemplateRef::from_fn("Dup", |b| {
                let root = b.named_part("Grid", "X")?;
                let child = b.named_part("Border", "X")?;
                b.add_child(root, child)?;
                Ok(Some(root))
            })),
        )
        .unwrap();

        let err = settle(&mut tree).unwrap_err();
        assert_eq!(err.degradation(), DegradationAction::RenderEmpty);
        assert!(matches!(
            err,
            Error::Template(TemplateError::DuplicateName { .. })
        ));
    }

    #[test]
    fn settle_reports_pass_summary() {
        let mut tree = WidgetTree::new();
        let control = tree.create_templated("Control");
        tree.set_template(control, Some(TemplateRef::from_fn("Empty", |_| Ok(None))))
            .unwrap();
        let pass = settle(&mut tree).unwrap();
        assert_eq!(pass.templates_applied, 1);
        assert_eq!(pass.measured, 1);
    }
}
