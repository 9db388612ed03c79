#![forbid(unsafe_code)]

//! Remeasure queue and the layout driver that applies pending templates.
//!
//! Template changes never rebuild eagerly: they clear the widget's
//! applied flag and request a remeasure. [`LayoutManager::run`] is the
//! "before next paint" step that honours those requests. It drains the
//! [`LayoutQueue`] in request order, calls
//! [`WidgetTree::apply_template`](crate::WidgetTree::apply_template) on each
//! widget and walks the resulting visual subtree so nested templated widgets
//! are instantiated in the same pass.
//!
//! Actual size arithmetic is out of scope; "measuring" here only means the
//! widget was visited and its measure flag revalidated.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ahash::AHashSet;
use tracing::{debug, debug_span, warn};

use crate::config::TreeConfig;
use crate::error::{Result, TemplateError};
use crate::tree::WidgetTree;
use crate::widget::WidgetId;

#[derive(Debug, Default)]
struct QueueInner {
    order: VecDeque<WidgetId>,
    queued: AHashSet<WidgetId>,
}

/// FIFO of widgets waiting for a layout pass. Each widget appears at most
/// once. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct LayoutQueue {
    inner: Rc<RefCell<QueueInner>>,
}

impl LayoutQueue {
    /// Queue `id`. Returns `false` if it was already queued.
    pub fn enqueue(&self, id: WidgetId) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.queued.insert(id) {
            return false;
        }
        inner.order.push_back(id);
        true
    }

    /// Take the oldest request.
    pub fn pop(&self) -> Option<WidgetId> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.order.pop_front()?;
        inner.queued.remove(&id);
        Some(id)
    }

    /// Whether `id` is waiting.
    #[must_use]
    pub fn contains(&self, id: WidgetId) -> bool {
        self.inner.borrow().queued.contains(&id)
    }

    /// Number of waiting widgets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().order.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().order.is_empty()
    }

    fn take_all(&self) -> Vec<WidgetId> {
        let mut inner = self.inner.borrow_mut();
        inner.queued.clear();
        inner.order.drain(..).collect()
    }
}

/// Summary of one [`LayoutManager::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutPass {
    /// Queue drains performed.
    pub passes: u32,
    /// Widgets visited and revalidated.
    pub measured: usize,
    /// Templates instantiated (including empty ones).
    pub templates_applied: usize,
}

/// Drives pending remeasure requests to completion.
#[derive(Debug, Clone, Copy)]
pub struct LayoutManager {
    max_passes: u32,
}

impl LayoutManager {
    /// Driver with the pass budget from `config`.
    #[must_use]
    pub fn new(config: &TreeConfig) -> Self {
        Self {
            max_passes: config.max_layout_passes.max(1),
        }
    }

    /// Drain the tree's layout queue until it stays empty.
    ///
    /// The first template error aborts the run; the failing widget is queued
    /// again so the next run retries it. Requests raised while a pass runs
    /// (for example a template that changes a nested widget's template) are
    /// handled by a further pass, up to the configured budget.
    pub fn run(&self, tree: &mut WidgetTree) -> Result<LayoutPass> {
        let mut report = LayoutPass::default();
        let queue = tree.layout_queue().clone();
        let _span = debug_span!("layout.pass", queued = queue.len() as u64).entered();

        while !queue.is_empty() {
            if report.passes == self.max_passes {
                warn!(passes = report.passes, "layout did not settle");
                return Err(TemplateError::LayoutBudgetExhausted {
                    passes: report.passes,
                });
            }
            report.passes += 1;
            let pending = queue.take_all();
            for (index, &id) in pending.iter().enumerate() {
                if !tree.contains(id) {
                    continue;
                }
                if let Err(err) = measure(tree, id, &mut report) {
                    // Put back this widget and the rest of the snapshot.
                    for &rest in &pending[index..] {
                        if tree.contains(rest) {
                            queue.enqueue(rest);
                        }
                    }
                    return Err(err);
                }
            }
        }

        debug!(
            passes = report.passes,
            measured = report.measured,
            templates_applied = report.templates_applied,
            "layout settled"
        );
        Ok(report)
    }
}

fn measure(tree: &mut WidgetTree, id: WidgetId, report: &mut LayoutPass) -> Result<()> {
    if tree.apply_template(id)? {
        report.templates_applied += 1;
    }
    if let Some(state) = tree.state(id) {
        state.mark_measured();
    }
    report.measured += 1;
    let children = tree.visual_children(id).to_vec();
    for child in children {
        measure(tree, child, report)?;
    }
    Ok(())
}
