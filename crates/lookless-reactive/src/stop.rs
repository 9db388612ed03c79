#![forbid(unsafe_code)]

//! One-shot stop signals for value streams.
//!
//! A [`StopTrigger`] / [`StopSignal`] pair shares a single flag. The trigger
//! side flips it once; every signal clone observes it. Streams check the
//! signal before forwarding a value, which gives "take until" semantics
//! without tearing down subscriptions from inside a callback.
//!
//! Dropping the trigger does **not** stop the signal.

use std::cell::Cell;
use std::rc::Rc;

/// Read side of a stop pair.
#[derive(Clone, Debug)]
pub struct StopSignal {
    stopped: Rc<Cell<bool>>,
}

/// Write side of a stop pair.
#[derive(Clone, Debug)]
pub struct StopTrigger {
    stopped: Rc<Cell<bool>>,
}

impl StopSignal {
    /// Create a fresh, unstopped pair.
    #[must_use]
    pub fn pair() -> (Self, StopTrigger) {
        let stopped = Rc::new(Cell::new(false));
        (
            Self {
                stopped: Rc::clone(&stopped),
            },
            StopTrigger { stopped },
        )
    }

    /// A signal that never stops.
    #[must_use]
    pub fn never() -> Self {
        Self::pair().0
    }

    /// Whether the trigger has fired.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

impl StopTrigger {
    /// Fire the signal. Returns `true` on the first call only.
    pub fn stop(&self) -> bool {
        !self.stopped.replace(true)
    }

    /// Whether the signal has already fired.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unstopped() {
        let (signal, trigger) = StopSignal::pair();
        assert!(!signal.is_stopped());
        assert!(!trigger.is_stopped());
    }

    #[test]
    fn stop_reaches_all_clones_once() {
        let (signal, trigger) = StopSignal::pair();
        let other = signal.clone();
        assert!(trigger.stop());
        assert!(!trigger.stop());
        assert!(signal.is_stopped());
        assert!(other.is_stopped());
    }

    #[test]
    fn dropping_trigger_does_not_stop() {
        let (signal, trigger) = StopSignal::pair();
        drop(trigger);
        assert!(!signal.is_stopped());
        assert!(!StopSignal::never().is_stopped());
    }
}
