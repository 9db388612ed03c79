#![forbid(unsafe_code)]

//! Span and event shape of a layout pass that instantiates templates.
//!
//! `template.apply` spans must nest under `layout.pass`, carry the owner and
//! template label, and duplicate names must surface as a WARN event inside
//! the failing `template.apply` span.
//!
//! Run:
//!   cargo test -p lookless-core --test tracing_spans

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lookless_core::{LayoutManager, TemplateRef, WidgetTree};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Capture layer
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
    parent_name: Option<String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    parent_span_name: Option<String>,
}

#[derive(Clone, Default)]
struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl Capture {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let parent_name = ctx
            .current_span()
            .id()
            .and_then(|pid| ctx.span(pid))
            .map(|span| span.name().to_string());
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
            parent_name,
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let message = visitor
            .0
            .iter()
            .find(|(name, _)| name == "message")
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        let parent_span_name = ctx
            .lookup_current()
            .map(|span| span.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            parent_span_name,
        });
    }
}

fn with_capture(f: impl FnOnce()) -> Capture {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    capture
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn template_apply_nests_under_layout_pass() {
    let capture = with_capture(|| {
        let mut tree = WidgetTree::new();
        let control = tree.create_templated("Button");
        tree.set_template(
            control,
            Some(TemplateRef::from_fn("ButtonTemplate", |b| Ok(Some(b.part("Border"))))),
        )
        .unwrap();
        LayoutManager::new(tree.config()).run(&mut tree).unwrap();
    });

    let spans = capture.spans();
    let layout = spans
        .iter()
        .find(|s| s.name == "layout.pass")
        .expect("layout.pass span");
    assert_eq!(layout.parent_name, None);

    let apply: Vec<_> = spans.iter().filter(|s| s.name == "template.apply").collect();
    assert_eq!(apply.len(), 1);
    assert_eq!(apply[0].parent_name.as_deref(), Some("layout.pass"));
    assert_eq!(
        apply[0].fields.get("template").map(String::as_str),
        Some("ButtonTemplate")
    );
    assert!(apply[0].fields.contains_key("owner"));

    let applied = capture
        .events()
        .into_iter()
        .find(|e| e.message.contains("template applied"))
        .expect("template applied event");
    assert_eq!(applied.parent_span_name.as_deref(), Some("template.apply"));
}

#[test]
fn duplicate_name_warns_inside_template_apply() {
    let capture = with_capture(|| {
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
        assert!(tree.apply_template(control).is_err());
    });

    let warnings: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.level == tracing::Level::WARN)
        .collect();
    assert!(
        warnings
            .iter()
            .any(|e| e.message.contains("duplicate name")
                && e.parent_span_name.as_deref() == Some("template.apply"))
    );
}

#[test]
fn property_changes_emit_reactive_delta_spans() {
    let capture = with_capture(|| {
        let mut tree = WidgetTree::new();
        let control = tree.create_templated("Control");
        tree.set_template(control, Some(TemplateRef::from_fn("T", |_| Ok(None))))
            .unwrap();
    });
    assert!(capture.spans().iter().any(|s| s.name == "reactive.delta"));
}
