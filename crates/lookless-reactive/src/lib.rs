#![forbid(unsafe_code)]

//! Reactive primitives for lookless widgets.
//!
//! Everything here is single-threaded (`Rc`-based) and meant to live on the
//! UI thread that owns the widget tree.
//!
//! - [`Observable`] - shared value with change notification
//! - [`EventHandlers`] - multicast notification with RAII subscriptions
//! - [`StopSignal`] / [`StopTrigger`] - one-shot termination for streams
//! - [`batch::BatchScope`] - defers and coalesces observable notifications

pub mod batch;
pub mod event;
pub mod observable;
pub mod stop;

pub use batch::BatchScope;
pub use event::EventHandlers;
pub use observable::{Observable, Subscription};
pub use stop::{StopSignal, StopTrigger};
