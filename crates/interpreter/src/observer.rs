//! Observers: who gets woken by which events.
//!
//! An observer belongs to one coroutine. Inner observers couple a waiting
//! frame to one specific future (a fetch, a response, a timer tick);
//! named-variable and broad observers implement `observe`-style wiring.
//! One-shot observers leave the registry after their handler runs.

use std::any::Any;

use bitflags::bitflags;
use purc_core::atom::Atom;
use purc_core::error::CoreResult;
use purc_variant::Variant;

use crate::coroutine::Coroutine;
use crate::event::{Event, RequestId};
use crate::instance::Instance;

bitflags! {
    /// Which coroutine stages an observer is armed in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoStageMask: u32 {
        /// The first walk of the VDOM
        const FIRST_RUN = 0x01;
        /// The event-observing stage after the first walk
        const OBSERVING = 0x02;
    }
}

bitflags! {
    /// Which coroutine states an observer is armed in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoStateMask: u32 {
        /// Runnable
        const READY = 0x01;
        /// Currently executing
        const RUNNING = 0x02;
        /// Yielded, waiting for an event
        const STOPPED = 0x04;
        /// Waiting in the observing stage
        const OBSERVING = 0x08;
    }
}

/// A custom match predicate, replacing the default one.
pub type ObserverMatchFn = Box<dyn Fn(&Observer, &Event) -> bool>;

/// An observer's handler, invoked on the owning coroutine at the tick
/// after a matching event arrived.
pub type ObserverHandler =
    Box<dyn FnMut(&Instance, &mut Coroutine, &Event) -> CoreResult<()>>;

/// One registered observer.
pub struct Observer {
    /// Registry id, unique within the coroutine
    pub id: u64,
    /// The owning coroutine
    pub cid: Atom,
    /// The observed value (request id, variable, coroutine id, ...)
    pub observed: Variant,
    /// The event type this observer listens for
    pub event_type: Atom,
    /// The subtype pattern; `None` is the `*` wildcard
    pub subtype: Option<String>,
    /// Stages the observer is armed in
    pub stage_mask: CoStageMask,
    /// States the observer is armed in
    pub state_mask: CoStateMask,
    /// Custom predicate; the default matches observed/type/subtype
    pub is_match: Option<ObserverMatchFn>,
    /// The handler run on match
    pub handler: ObserverHandler,
    /// Owned auxiliary data, released with the observer
    pub aux: Option<Box<dyn Any>>,
    /// Remove after the first firing
    pub one_shot: bool,
    /// True for inner (frame-coupled) observers
    pub inner: bool,
}

impl Observer {
    /// Applies the observer's predicate to `event`, after the stage and
    /// state masks passed.
    pub fn matches(&self, stage: CoStageMask, state: CoStateMask, event: &Event) -> bool {
        if !self.stage_mask.intersects(stage) || !self.state_mask.intersects(state) {
            return false;
        }

        if let Some(is_match) = &self.is_match {
            return is_match(self, event);
        }

        if self.event_type != event.event_type {
            return false;
        }

        match (&self.subtype, &event.subtype) {
            (Some(pattern), Some(subtype)) if pattern != "*" && pattern != subtype => {
                return false;
            }
            (Some(pattern), None) if pattern != "*" => return false,
            _ => {}
        }

        RequestId::variants_match(&self.observed, &event.observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::msg_type;

    fn observer_for(observed: Variant, subtype: Option<&str>) -> Observer {
        Observer {
            id: 1,
            cid: Atom::from_str("co-test"),
            observed,
            event_type: msg_type::fetcher_state(),
            subtype: subtype.map(str::to_string),
            stage_mask: CoStageMask::all(),
            state_mask: CoStateMask::all(),
            is_match: None,
            handler: Box::new(|_, _, _| Ok(())),
            aux: None,
            one_shot: true,
            inner: true,
        }
    }

    fn event_for(observed: Variant, subtype: Option<&str>) -> Event {
        Event::new(
            Atom::from_str("co-test"),
            observed,
            msg_type::fetcher_state(),
            subtype,
            Variant::null(),
        )
    }

    #[test]
    fn test_default_predicate() {
        let observer = observer_for(Variant::string("req-1"), Some("success"));

        assert!(observer.matches(
            CoStageMask::FIRST_RUN,
            CoStateMask::STOPPED,
            &event_for(Variant::string("req-1"), Some("success")),
        ));
        assert!(!observer.matches(
            CoStageMask::FIRST_RUN,
            CoStateMask::STOPPED,
            &event_for(Variant::string("req-2"), Some("success")),
        ));
        assert!(!observer.matches(
            CoStageMask::FIRST_RUN,
            CoStateMask::STOPPED,
            &event_for(Variant::string("req-1"), Some("error")),
        ));
    }

    #[test]
    fn test_wildcard_subtype() {
        let observer = observer_for(Variant::string("req-1"), Some("*"));
        assert!(observer.matches(
            CoStageMask::all(),
            CoStateMask::all(),
            &event_for(Variant::string("req-1"), Some("anything")),
        ));

        let observer = observer_for(Variant::string("req-1"), None);
        assert!(observer.matches(
            CoStageMask::all(),
            CoStateMask::all(),
            &event_for(Variant::string("req-1"), None),
        ));
    }

    #[test]
    fn test_masks_gate_matching() {
        let mut observer = observer_for(Variant::string("req-1"), None);
        observer.state_mask = CoStateMask::STOPPED;

        let event = event_for(Variant::string("req-1"), None);
        assert!(observer.matches(CoStageMask::all(), CoStateMask::STOPPED, &event));
        assert!(!observer.matches(CoStageMask::all(), CoStateMask::READY, &event));
    }

    #[test]
    fn test_custom_predicate_wins() {
        let mut observer = observer_for(Variant::string("req-1"), Some("success"));
        observer.is_match = Some(Box::new(|_, event| {
            event.payload.as_longint() == Some(7)
        }));

        let mut event = event_for(Variant::string("other"), Some("other"));
        event.payload = Variant::longint(7);
        assert!(observer.matches(CoStageMask::all(), CoStateMask::all(), &event));
    }
}
