#![forbid(unsafe_code)]

//! Template factories.
//!
//! A [`TemplateFactory`] turns an owner widget into a fresh visual subtree.
//! It works through a [`TemplateBuilder`], which creates widgets already
//! stamped with the owner as their templated parent; that stamp is what
//! later bounds the name registration walk and the focus-target scan.
//!
//! The factory returns the root of the subtree, unparented, or `None` for
//! "no visual content". The lifecycle controller does the grafting.

use std::rc::Rc;

use crate::error::Result;
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

/// Produces a visual subtree for an owner widget.
pub trait TemplateFactory {
    /// Build the subtree. Called at most once per instantiation.
    fn build(&self, builder: &mut TemplateBuilder<'_>) -> Result<Option<WidgetId>>;

    /// Short label for logs.
    fn describe(&self) -> &str {
        "template"
    }
}

/// Shared, comparable reference to a template factory.
///
/// Equality is identity: two references are equal when they point at the
/// same factory instance. This is what makes re-assigning the same template
/// a no-op for the `TEMPLATE` property.
#[derive(Clone)]
pub struct TemplateRef(Rc<dyn TemplateFactory>);

impl TemplateRef {
    /// Wrap a factory.
    pub fn new(factory: impl TemplateFactory + 'static) -> Self {
        Self(Rc::new(factory))
    }

    /// Wrap a closure as a named factory.
    pub fn from_fn<F>(label: &'static str, build: F) -> Self
    where
        F: Fn(&mut TemplateBuilder<'_>) -> Result<Option<WidgetId>> + 'static,
    {
        Self::new(FuncTemplate::new(label, build))
    }

    /// Run the factory for the builder's owner.
    pub fn build(&self, builder: &mut TemplateBuilder<'_>) -> Result<Option<WidgetId>> {
        self.0.build(builder)
    }

    /// The factory's label.
    #[must_use]
    pub fn describe(&self) -> &str {
        self.0.describe()
    }
}

impl PartialEq for TemplateRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TemplateRef {}

impl std::fmt::Debug for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TemplateRef").field(&self.describe()).finish()
    }
}

/// Closure-backed [`TemplateFactory`].
pub struct FuncTemplate<F> {
    label: &'static str,
    build: F,
}

impl<F> FuncTemplate<F>
where
    F: Fn(&mut TemplateBuilder<'_>) -> Result<Option<WidgetId>>,
{
    /// Factory named `label` that runs `build`.
    pub fn new(label: &'static str, build: F) -> Self {
        Self { label, build }
    }
}

impl<F> TemplateFactory for FuncTemplate<F>
where
    F: Fn(&mut TemplateBuilder<'_>) -> Result<Option<WidgetId>>,
{
    fn build(&self, builder: &mut TemplateBuilder<'_>) -> Result<Option<WidgetId>> {
        (self.build)(builder)
    }

    fn describe(&self) -> &str {
        self.label
    }
}

/// Tree access handed to a factory while it builds for `owner`.
pub struct TemplateBuilder<'a> {
    tree: &'a mut WidgetTree,
    owner: WidgetId,
}

impl<'a> TemplateBuilder<'a> {
    pub(crate) fn new(tree: &'a mut WidgetTree, owner: WidgetId) -> Self {
        Self { tree, owner }
    }

    /// The widget the template is being built for.
    #[must_use]
    pub fn owner(&self) -> WidgetId {
        self.owner
    }

    /// Full tree access, for anything the helpers below do not cover.
    pub fn tree(&mut self) -> &mut WidgetTree {
        self.tree
    }

    /// Create a plain template part.
    pub fn part(&mut self, type_name: &'static str) -> WidgetId {
        let id = self.tree.create(type_name);
        self.stamp(id);
        id
    }

    /// Create a named template part.
    pub fn named_part(&mut self, type_name: &'static str, name: &str) -> Result<WidgetId> {
        let id = self.part(type_name);
        self.tree.set_name(id, name)?;
        Ok(id)
    }

    /// Create a templated widget as a part of this template. Its own
    /// template output will belong to it, not to this owner.
    pub fn templated_part(
        &mut self,
        type_name: &'static str,
        template: Option<TemplateRef>,
    ) -> Result<WidgetId> {
        let id = self.tree.create_templated(type_name);
        self.stamp(id);
        if template.is_some() {
            self.tree.set_template(id, template)?;
        }
        Ok(id)
    }

    /// Append `child` to `parent`'s visual children.
    pub fn add_child(&mut self, parent: WidgetId, child: WidgetId) -> Result<()> {
        self.tree.add_visual_child(parent, child)
    }

    /// Mark `widget` as the focus-visual host of this template.
    pub fn mark_focus_target(&mut self, widget: WidgetId) -> Result<()> {
        self.tree.set_is_template_focus_target(widget, true)
    }

    fn stamp(&mut self, id: WidgetId) {
        if let Ok(record) = self.tree.record_mut(id) {
            record.templated_parent = Some(self.owner);
        }
    }
}

impl std::fmt::Debug for TemplateBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateBuilder")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_refs_compare_by_identity() {
        let a = TemplateRef::from_fn("A", |_| Ok(None));
        let same = a.clone();
        let twin = TemplateRef::from_fn("A", |_| Ok(None));
        assert_eq!(a, same);
        assert_ne!(a, twin);
        assert_eq!(format!("{a:?}"), "TemplateRef(\"A\")");
    }

    #[test]
    fn builder_stamps_owner_on_parts() {
        let mut tree = WidgetTree::new();
        let owner = tree.create_templated("Button");
        let mut builder = TemplateBuilder::new(&mut tree, owner);
        let border = builder.part("Border");
        let text = builder.named_part("TextBlock", "PART_Text").unwrap();
        builder.add_child(border, text).unwrap();
        assert_eq!(builder.owner(), owner);

        assert_eq!(tree.templated_parent(border), Some(owner));
        assert_eq!(tree.templated_parent(text), Some(owner));
        assert_eq!(tree.name(text), Some("PART_Text"));
        assert_eq!(tree.visual_children(border), &[text]);
    }

    #[test]
    fn struct_factories_work_through_the_trait() {
        struct Empty;
        impl TemplateFactory for Empty {
            fn build(&self, _: &mut TemplateBuilder<'_>) -> Result<Option<WidgetId>> {
                Ok(None)
            }
        }
        let template = TemplateRef::new(Empty);
        assert_eq!(template.describe(), "template");

        let mut tree = WidgetTree::new();
        let owner = tree.create_templated("Control");
        let mut builder = TemplateBuilder::new(&mut tree, owner);
        assert_eq!(template.build(&mut builder).unwrap(), None);
    }
}
