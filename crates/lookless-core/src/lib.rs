#![forbid(unsafe_code)]

//! Template instantiation and scoped binding for lookless widgets.
//!
//! A templated widget declares behavior and properties only. Its visual
//! subtree comes from a [`TemplateRef`] that is instantiated lazily by
//! [`WidgetTree::apply_template`] and rebuilt after the `TEMPLATE` property
//! changes.
//!
//! # Key Components
//!
//! - [`WidgetTree`] - arena of widget records addressed by [`WidgetId`]
//! - [`PropertyKey`] / [`ClassHandlers`] - typed property storage with change handlers
//! - [`TemplateFactory`] / [`TemplateBuilder`] - how templates produce subtrees
//! - [`NameScope`] - per-instantiation name index
//! - [`BindingDescriptor`] / [`ValueStream`] - bindings that end with their template
//! - [`LayoutManager`] - drains remeasure requests and applies pending templates
//!
//! # Lifecycle
//!
//! ```
//! use lookless_core::{TemplateRef, WidgetTree, LayoutManager};
//!
//! let mut tree = WidgetTree::new();
//! let button = tree.create_templated("Button");
//! let template = TemplateRef::from_fn("ButtonTemplate", |b| {
//!     let border = b.part("Border");
//!     let text = b.named_part("TextBlock", "PART_Text")?;
//!     b.add_child(border, text)?;
//!     Ok(Some(border))
//! });
//! tree.set_template(button, Some(template)).unwrap();
//!
//! LayoutManager::new(tree.config()).run(&mut tree).unwrap();
//! assert!(tree.is_template_applied(button));
//! assert!(tree.find_template_part(button, "PART_Text").is_some());
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod focus;
pub mod layout;
pub mod lifecycle;
pub mod logical;
pub mod name_scope;
pub mod property;
pub mod template;
pub mod tree;
pub mod widget;

pub use binding::{
    BindingDescriptor, BindingHandle, BindingId, BindingPriority, BindingSource,
    StreamSubscription, ValueStream,
};
pub use config::{ConfigError, TreeConfig};
pub use error::{Result, TemplateError};
pub use layout::{LayoutManager, LayoutPass, LayoutQueue};
pub use lifecycle::{TEMPLATE, TemplateAppliedEvent};
pub use logical::LogicalTreeEvent;
pub use name_scope::NameScope;
pub use property::{ClassHandlers, PropertyChanged, PropertyId, PropertyKey};
pub use template::{FuncTemplate, TemplateBuilder, TemplateFactory, TemplateRef};
pub use tree::WidgetTree;
pub use widget::{WidgetId, WidgetState};
