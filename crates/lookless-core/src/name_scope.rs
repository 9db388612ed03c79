#![forbid(unsafe_code)]

//! Per-instantiation name index.
//!
//! A [`NameScope`] maps element names to [`WidgetId`] handles for exactly one
//! template instantiation. It is filled by the registration walk, then frozen
//! behind an `Rc` and published on the template root and in the
//! template-applied notification. Handles are lookup-only: dropping the
//! scope never releases a widget, and a handle whose widget was released
//! simply stops resolving through [`WidgetTree::find_name`].

use ahash::AHashMap;

use crate::error::{Result, TemplateError};
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

/// Name to widget index for one template instantiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameScope {
    names: AHashMap<String, WidgetId>,
}

impl NameScope {
    /// Empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. Fails if the name is already taken in this scope.
    pub fn register(&mut self, name: &str, widget: WidgetId) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(TemplateError::DuplicateName {
                name: name.to_owned(),
            });
        }
        self.names.insert(name.to_owned(), widget);
        Ok(())
    }

    /// Widget registered under `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<WidgetId> {
        self.names.get(name).copied()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, WidgetId)> {
        self.names.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// Whether `name` looks like an identifier: a letter or `_`, then letters,
/// digits or `_`.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl WidgetTree {
    /// Nearest ambient name scope: the scope of the template root found by
    /// walking from `widget` up its visual parents.
    #[must_use]
    pub fn find_name_scope(&self, widget: WidgetId) -> Option<&NameScope> {
        let mut current = Some(widget);
        while let Some(id) = current {
            let record = self.record(id).ok()?;
            if let Some(scope) = record.name_scope.as_deref() {
                return Some(scope);
            }
            current = record.visual_parent;
        }
        None
    }

    /// Resolve `name` in the scope enclosing `widget`. Released widgets do
    /// not resolve.
    #[must_use]
    pub fn find_name(&self, widget: WidgetId, name: &str) -> Option<WidgetId> {
        self.find_name_scope(widget)?
            .find(name)
            .filter(|id| self.contains(*id))
    }
}
