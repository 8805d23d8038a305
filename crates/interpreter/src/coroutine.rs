//! Coroutines: one program execution with its stack, observers and event
//! queue.

use std::collections::VecDeque;
use std::rc::Rc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use purc_core::atom::Atom;
use purc_variant::Variant;

use crate::event::{Event, EventReduceOpt};
use crate::observer::{CoStageMask, CoStateMask, Observer};
use crate::stack::Stack;
use crate::vdom::{Document, Element};

/// The scheduling state of a coroutine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoroutineState {
    /// Runnable at the next tick
    Ready,
    /// Currently executing
    Running,
    /// Yielded, waiting for a matching event
    Stopped,
    /// Waiting in the observing stage
    Observing,
    /// Finished; will be unlinked
    Exited,
}

impl CoroutineState {
    /// The mask bit for this state.
    pub fn mask(self) -> CoStateMask {
        match self {
            CoroutineState::Ready => CoStateMask::READY,
            CoroutineState::Running => CoStateMask::RUNNING,
            CoroutineState::Stopped => CoStateMask::STOPPED,
            CoroutineState::Observing => CoStateMask::OBSERVING,
            CoroutineState::Exited => CoStateMask::empty(),
        }
    }
}

/// The lifecycle stage of a coroutine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoroutineStage {
    /// Walking the VDOM for the first time
    FirstRun,
    /// The VDOM walk finished; only observers keep it alive
    Observing,
}

impl CoroutineStage {
    /// The mask bit for this stage.
    pub fn mask(self) -> CoStageMask {
        match self {
            CoroutineStage::FirstRun => CoStageMask::FIRST_RUN,
            CoroutineStage::Observing => CoStageMask::OBSERVING,
        }
    }
}

/// One running HVML program.
pub struct Coroutine {
    /// The coroutine id: an atom of its full resource token
    pub cid: Atom,
    /// The bare token within the runner
    pub token: String,
    /// The document being executed
    pub doc: Rc<Document>,
    /// The entry element of the walk
    pub entry: Rc<Element>,
    /// Lifecycle stage
    pub stage: CoroutineStage,
    /// Scheduling state
    pub state: CoroutineState,
    /// The frame stack
    pub stack: Stack,
    /// The final result once the walk completes
    pub result: Variant,
    /// The parent coroutine, for child coroutines
    pub parent: Option<Atom>,
    /// Child coroutines
    pub children: Vec<Atom>,
    /// Registered observers
    pub observers: Vec<Observer>,
    event_queue: VecDeque<Event>,
    scope_vars: HashMap<usize, IndexMap<String, Variant>>,
    next_observer_id: u64,
    next_request_token: u64,
}

impl Coroutine {
    /// Creates a coroutine ready to run `doc` from its root.
    pub fn new(cid: Atom, token: String, doc: Rc<Document>) -> Coroutine {
        let entry = Rc::clone(&doc.root);
        let mut stack = Stack::new();
        stack.push(Rc::clone(&entry));

        Coroutine {
            cid,
            token,
            doc,
            entry,
            stage: CoroutineStage::FirstRun,
            state: CoroutineState::Ready,
            stack,
            result: Variant::undefined(),
            parent: None,
            children: Vec::new(),
            observers: Vec::new(),
            event_queue: VecDeque::new(),
            scope_vars: HashMap::new(),
            next_observer_id: 0,
            next_request_token: 0,
        }
    }

    /// True once the coroutine finished.
    pub fn exited(&self) -> bool {
        self.state == CoroutineState::Exited
    }

    /// Enqueues `event`, honoring its reduce option against pending
    /// events with the same key.
    pub fn enqueue_event(&mut self, event: Event) {
        match event.reduce {
            EventReduceOpt::Keep => self.event_queue.push_back(event),
            EventReduceOpt::Overlay => {
                match self
                    .event_queue
                    .iter_mut()
                    .find(|pending| pending.same_key(&event))
                {
                    Some(pending) => *pending = event,
                    None => self.event_queue.push_back(event),
                }
            }
            EventReduceOpt::Ignore => {
                if !self.event_queue.iter().any(|pending| pending.same_key(&event)) {
                    self.event_queue.push_back(event);
                }
            }
        }
    }

    /// Takes every queued event, preserving order.
    pub fn take_events(&mut self) -> Vec<Event> {
        self.event_queue.drain(..).collect()
    }

    /// Number of queued events.
    pub fn queued_events(&self) -> usize {
        self.event_queue.len()
    }

    /// The next observer registry id.
    pub fn next_observer_id(&mut self) -> u64 {
        self.next_observer_id += 1;
        self.next_observer_id
    }

    /// The next request token for composite request ids.
    pub fn next_request_token(&mut self) -> u64 {
        self.next_request_token += 1;
        self.next_request_token
    }

    /// Registers an observer and returns its id.
    pub fn add_observer(&mut self, observer: Observer) -> u64 {
        let id = observer.id;
        self.observers.push(observer);
        id
    }

    /// Removes an observer by id.
    pub fn remove_observer(&mut self, id: u64) -> bool {
        let before = self.observers.len();
        self.observers.retain(|observer| observer.id != id);
        self.observers.len() != before
    }

    /// Binds a variable on the scope of `element_id`.
    pub fn bind_scope_variable(&mut self, element_id: usize, name: &str, value: Variant) {
        self.scope_vars
            .entry(element_id)
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Reads a variable bound on the scope of `element_id`.
    pub fn scope_variable(&self, element_id: usize, name: &str) -> Option<Variant> {
        self.scope_vars.get(&element_id)?.get(name).cloned()
    }

    /// Removes a variable from the scope of `element_id`.
    pub fn unbind_scope_variable(&mut self, element_id: usize, name: &str) -> bool {
        self.scope_vars
            .get_mut(&element_id)
            .is_some_and(|vars| vars.shift_remove(name).is_some())
    }

    /// Looks a name up along the scope chain starting at `frame_idx`:
    /// each frame's local (`$!`) object, then the frame element's scope
    /// variables, then the document variables.
    pub fn find_named(&self, frame_idx: usize, name: &str) -> Option<Variant> {
        let mut idx = frame_idx as isize;
        while idx >= 0 {
            if let Some(frame) = self.stack.frame(idx as usize) {
                let local = frame.symbol(crate::frame::SymbolVar::Exclamation);
                if let Some(value) = local.object_get(name) {
                    return Some(value);
                }
                if let Some(element) = frame.pos.as_ref() {
                    if let Some(value) = self.scope_variable(element.id, name) {
                        return Some(value);
                    }
                }
            }
            idx -= 1;
        }

        self.doc.variable(name)
    }

    /// Runs `body` with a pseudo frame for `element` on top of the
    /// stack, so observer handlers see a valid current frame.
    pub fn with_pseudo_frame<R>(
        &mut self,
        element: Rc<Element>,
        body: impl FnOnce(&mut Coroutine, usize) -> R,
    ) -> R {
        let idx = self.stack.push_pseudo(element);
        let result = body(self, idx);
        self.stack.pop_pseudo();
        result
    }

    /// Unwinds the whole stack (destructors run LIFO) and drops every
    /// observer; the coroutine is marked exited.
    pub fn cancel(&mut self) {
        while self.stack.pop().is_some() {}
        self.observers.clear();
        self.event_queue.clear();
        self.state = CoroutineState::Exited;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{msg_type, Event};
    use crate::vdom::ElementBuilder;

    fn coroutine() -> Coroutine {
        let doc = Document::new(ElementBuilder::new("hvml").build());
        Coroutine::new(Atom::from_str("co-unit"), "unit".to_string(), doc)
    }

    fn keyed_event(subtype: &str, payload: i64) -> Event {
        let mut event = Event::new(
            Atom::from_str("co-unit"),
            Variant::string("watched"),
            msg_type::change(),
            Some(subtype),
            Variant::longint(payload),
        );
        event.reduce = EventReduceOpt::Keep;
        event
    }

    #[test]
    fn test_reduce_keep_queues_all() {
        let mut co = coroutine();
        co.enqueue_event(keyed_event("grown", 1));
        co.enqueue_event(keyed_event("grown", 2));
        assert_eq!(co.queued_events(), 2);

        let events: Vec<i64> = co
            .take_events()
            .iter()
            .map(|e| e.payload.as_longint().unwrap())
            .collect();
        assert_eq!(events, vec![1, 2]);
    }

    #[test]
    fn test_reduce_overlay_replaces() {
        let mut co = coroutine();
        co.enqueue_event(keyed_event("grown", 1));
        let mut second = keyed_event("grown", 2);
        second.reduce = EventReduceOpt::Overlay;
        co.enqueue_event(second);

        let events = co.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.as_longint(), Some(2));
    }

    #[test]
    fn test_reduce_ignore_drops() {
        let mut co = coroutine();
        co.enqueue_event(keyed_event("grown", 1));
        let mut second = keyed_event("grown", 2);
        second.reduce = EventReduceOpt::Ignore;
        co.enqueue_event(second);

        let events = co.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.as_longint(), Some(1));
    }

    #[test]
    fn test_scope_variables() {
        let mut co = coroutine();
        co.bind_scope_variable(7, "x", Variant::longint(1));
        assert_eq!(co.scope_variable(7, "x").unwrap().as_longint(), Some(1));
        assert!(co.unbind_scope_variable(7, "x"));
        assert!(co.scope_variable(7, "x").is_none());
    }

    #[test]
    fn test_find_named_walks_to_document() {
        let mut co = coroutine();
        co.doc.bind_variable("answer", Variant::longint(42));
        let found = co.find_named(0, "answer").unwrap();
        assert_eq!(found.as_longint(), Some(42));

        // frame-element scope shadows the document
        let root_id = co.entry.id;
        co.bind_scope_variable(root_id, "answer", Variant::longint(7));
        let found = co.find_named(0, "answer").unwrap();
        assert_eq!(found.as_longint(), Some(7));
    }

    #[test]
    fn test_cancel_clears_everything() {
        let mut co = coroutine();
        co.enqueue_event(keyed_event("grown", 1));
        co.cancel();
        assert!(co.exited());
        assert!(co.stack.is_empty());
        assert_eq!(co.queued_events(), 0);
        assert!(co.observers.is_empty());
    }
}
