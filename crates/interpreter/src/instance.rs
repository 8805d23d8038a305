//! The interpreter instance: coroutine registry, event routing and the
//! dispatch loop.
//!
//! One instance owns one thread's runloop, a fetcher session, the
//! element handler table and the executor registry. Each tick routes
//! pending events to their destination coroutines, matches observers,
//! and steps every ready coroutine until it yields, finishes or raises
//! past its entry frame.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use indexmap::IndexMap;
use purc_core::atom::Atom;
use purc_core::error::{CoreError, CoreResult};
use purc_fetcher::FetcherSession;
use purc_runloop::{RunLoop, TimerHandle};
use purc_variant::Variant;

use crate::coroutine::{Coroutine, CoroutineStage, CoroutineState};
use crate::elements::{neutral_value_for, ElementCtx, ElementOps, HandlerTable};
use crate::event::{msg_sub, msg_type, Event};
use crate::executor::ExecutorRegistry;
use crate::frame::NextStep;
use crate::observer::{CoStageMask, CoStateMask, Observer, ObserverHandler};
use crate::vdom::Document;

/// Safety valve: a single tick may not run more dispatch steps than
/// this.
const STEP_BUDGET: u32 = 1_000_000;

struct InstanceInner {
    app: String,
    runner: String,
    runner_atom: Atom,
    runloop: RunLoop,
    session: FetcherSession,
    handlers: RefCell<HandlerTable>,
    executors: ExecutorRegistry,
    coroutines: RefCell<IndexMap<u32, Rc<RefCell<Coroutine>>>>,
    results: RefCell<HashMap<u32, Variant>>,
    pending_events: RefCell<Vec<Event>>,
    runner_vars: RefCell<IndexMap<String, Variant>>,
    next_token: Cell<u64>,
}

/// A cheaply cloneable handle to the interpreter instance.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    /// Creates an instance for `app`/`runner` on the current thread's
    /// runloop.
    pub fn new(app: &str, runner: &str) -> CoreResult<Instance> {
        let runloop = RunLoop::current();
        let session = FetcherSession::new(&runloop)
            .map_err(|e| CoreError::io(format!("fetcher session: {e}")))?;

        Ok(Instance {
            inner: Rc::new(InstanceInner {
                app: app.to_string(),
                runner: runner.to_string(),
                runner_atom: Atom::from_string(
                    purc_core::BUCKET_USER,
                    &format!("{app}/{runner}"),
                ),
                runloop,
                session,
                handlers: RefCell::new(HandlerTable::with_builtins()),
                executors: ExecutorRegistry::with_builtins(),
                coroutines: RefCell::new(IndexMap::new()),
                results: RefCell::new(HashMap::new()),
                pending_events: RefCell::new(Vec::new()),
                runner_vars: RefCell::new(IndexMap::new()),
                next_token: Cell::new(0),
            }),
        })
    }

    /// The application name.
    pub fn app(&self) -> &str {
        &self.inner.app
    }

    /// The runner name.
    pub fn runner(&self) -> &str {
        &self.inner.runner
    }

    /// The runner's identity atom, used in composite request ids.
    pub fn runner_atom(&self) -> Atom {
        self.inner.runner_atom
    }

    /// The instance's runloop.
    pub fn runloop(&self) -> RunLoop {
        self.inner.runloop.clone()
    }

    /// The instance's fetcher session.
    pub fn fetcher(&self) -> &FetcherSession {
        &self.inner.session
    }

    pub(crate) fn executors(&self) -> &ExecutorRegistry {
        &self.inner.executors
    }

    /// Installs (or replaces) the ops for an element tag.
    pub fn register_element(&self, tag: &str, ops: Rc<dyn ElementOps>) {
        self.inner.handlers.borrow_mut().register(tag, ops);
    }

    /// Schedules a coroutine over `doc`. The token defaults to a fresh
    /// ordinal.
    pub fn schedule_coroutine(&self, doc: Rc<Document>, token: Option<&str>) -> Atom {
        let token = match token {
            Some(token) => token.to_string(),
            None => {
                let ordinal = self.inner.next_token.get() + 1;
                self.inner.next_token.set(ordinal);
                ordinal.to_string()
            }
        };

        let cid = Atom::from_string(
            purc_core::BUCKET_USER,
            &format!("{}/{}/crtn/{}", self.inner.app, self.inner.runner, token),
        );
        let coroutine = Coroutine::new(cid, token, doc);
        self.inner
            .coroutines
            .borrow_mut()
            .insert(cid.raw(), Rc::new(RefCell::new(coroutine)));
        cid
    }

    /// The live coroutine with the given id.
    pub fn coroutine(&self, cid: Atom) -> Option<Rc<RefCell<Coroutine>>> {
        self.inner.coroutines.borrow().get(&cid.raw()).cloned()
    }

    /// The live coroutine with the given bare token. The coroutine being
    /// ticked right now is skipped; a coroutine cannot address itself.
    pub fn coroutine_by_token(&self, token: &str) -> Option<(Atom, Rc<RefCell<Coroutine>>)> {
        for co_rc in self.inner.coroutines.borrow().values() {
            if let Ok(co) = co_rc.try_borrow() {
                if co.token == token {
                    return Some((co.cid, Rc::clone(co_rc)));
                }
            }
        }
        None
    }

    /// The final result of a coroutine, live or reaped.
    pub fn coroutine_result(&self, cid: Atom) -> Option<Variant> {
        if let Some(result) = self.inner.results.borrow().get(&cid.raw()) {
            return Some(result.clone());
        }
        self.coroutine(cid).map(|co| co.borrow().result.clone())
    }

    /// Number of coroutines still live.
    pub fn live_coroutines(&self) -> usize {
        self.inner.coroutines.borrow().len()
    }

    /// True when every scheduled coroutine has exited.
    pub fn all_exited(&self) -> bool {
        self.inner.coroutines.borrow().is_empty() && self.inner.pending_events.borrow().is_empty()
    }

    /// Cancels a coroutine: its stack unwinds LIFO and its observers are
    /// dropped.
    pub fn cancel_coroutine(&self, cid: Atom) -> bool {
        let Some(co_rc) = self.coroutine(cid) else {
            return false;
        };
        co_rc.borrow_mut().cancel();
        true
    }

    /// Binds a runner-level variable, visible to every coroutine.
    pub fn bind_runner_variable(&self, name: &str, value: Variant) {
        self.inner
            .runner_vars
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    /// Reads a runner-level variable.
    pub fn runner_variable(&self, name: &str) -> Option<Variant> {
        self.inner.runner_vars.borrow().get(name).cloned()
    }

    /// Queues an event for its destination coroutine.
    pub fn post_event(&self, event: Event) {
        self.inner.pending_events.borrow_mut().push(event);
    }

    /// Announces a change of a bound variable, waking named-variable
    /// observers on the coroutine.
    pub fn notify_variable_change(&self, cid: Atom, name: &str, value: Variant) {
        self.post_event(Event::new(
            cid,
            Variant::string(name),
            msg_type::change(),
            Some("displaced"),
            value,
        ));
    }

    /// Registers a broad observer on a coroutine.
    pub fn observe(
        &self,
        cid: Atom,
        observed: Variant,
        event_type: Atom,
        subtype: Option<&str>,
        one_shot: bool,
        handler: ObserverHandler,
    ) -> CoreResult<u64> {
        let co_rc = self
            .coroutine(cid)
            .ok_or_else(|| CoreError::entity_not_found("coroutine"))?;
        let mut co = co_rc.borrow_mut();
        let id = co.next_observer_id();
        Ok(co.add_observer(Observer {
            id,
            cid,
            observed,
            event_type,
            subtype: subtype.map(str::to_string),
            stage_mask: CoStageMask::all(),
            state_mask: CoStateMask::all(),
            is_match: None,
            handler,
            aux: None,
            one_shot,
            inner: false,
        }))
    }

    /// Posts `timerTick` events to a coroutine on an interval. The timer
    /// dies with the coroutine.
    pub fn add_coroutine_timer(&self, cid: Atom, name: &str, interval: Duration) -> TimerHandle {
        let instance = self.clone();
        let name = name.to_string();
        self.inner.runloop.add_timer(interval, move || {
            if instance.coroutine(cid).is_none() {
                return false;
            }
            instance.post_event(Event::new(
                cid,
                Variant::string(&name),
                msg_type::timer_tick(),
                Some(&name),
                Variant::undefined(),
            ));
            true
        })
    }

    /// One scheduling round: route events, deliver to observers, step
    /// every ready coroutine.
    pub fn tick(&self) {
        self.route_pending_events();

        let snapshot: Vec<Rc<RefCell<Coroutine>>> =
            self.inner.coroutines.borrow().values().cloned().collect();

        for co_rc in snapshot {
            self.tick_coroutine(&co_rc);

            let (exited, cid, result) = {
                let co = co_rc.borrow();
                (co.exited(), co.cid, co.result.clone())
            };
            if exited {
                self.inner.results.borrow_mut().insert(cid.raw(), result);
                self.inner.coroutines.borrow_mut().shift_remove(&cid.raw());
            }
        }
    }

    /// Runs ticks and runloop turns until every coroutine exited or the
    /// deadline passes. Returns true when everything finished.
    pub fn run_until_done(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.all_exited() {
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "instance {}/{} timed out with {} live coroutine(s)",
                    self.inner.app,
                    self.inner.runner,
                    self.live_coroutines()
                );
                return false;
            }
            self.inner.runloop.turn();
        }
    }

    /// Runs until every coroutine exited.
    pub fn run(&self) {
        loop {
            self.tick();
            if self.all_exited() {
                return;
            }
            self.inner.runloop.turn();
        }
    }

    fn route_pending_events(&self) {
        let events: Vec<Event> = self.inner.pending_events.borrow_mut().drain(..).collect();
        for event in events {
            match self.coroutine(event.dest) {
                Some(co_rc) => co_rc.borrow_mut().enqueue_event(event),
                None => log::debug!(
                    "dropping event for unknown coroutine {}",
                    event.dest.raw()
                ),
            }
        }
    }

    fn tick_coroutine(&self, co_rc: &Rc<RefCell<Coroutine>>) {
        let mut co = co_rc.borrow_mut();
        if co.exited() {
            return;
        }

        self.deliver_events(&mut co);

        if co.state != CoroutineState::Ready {
            return;
        }
        co.state = CoroutineState::Running;

        let mut budget = STEP_BUDGET;
        loop {
            budget -= 1;
            if budget == 0 {
                log::error!("coroutine {} exceeded its step budget", co.token);
                co.cancel();
                break;
            }

            if co.stack.is_empty() {
                self.finish_run(&mut co);
                break;
            }

            self.step(&mut co);

            if co.state != CoroutineState::Running {
                break;
            }
        }
    }

    /// Executes one dispatch step on the top frame.
    fn step(&self, co: &mut Coroutine) {
        let frame_idx = co.stack.top_index().expect("stepped an empty stack");
        let (next_step, tag) = {
            let frame = co.stack.frame(frame_idx).expect("frame vanished");
            let tag = frame
                .pos
                .as_ref()
                .map(|el| el.tag_atom)
                .unwrap_or_else(Atom::null);
            (frame.next_step, tag)
        };
        let ops = self.inner.handlers.borrow().ops_for(tag);

        match next_step {
            NextStep::AfterPushed => {
                let outcome = self.call_ops(co, frame_idx, |ops, ctx| ops.after_pushed(ctx), &ops);
                match outcome {
                    Ok(true) => self.set_next_step(co, frame_idx, NextStep::SelectChild),
                    Ok(false) => self.set_next_step(co, frame_idx, NextStep::OnPopping),
                    Err(error) => self.absorb_error(co, frame_idx, error),
                }
            }
            NextStep::SelectChild => {
                let outcome =
                    self.call_ops(co, frame_idx, |ops, ctx| ops.select_child(ctx), &ops);
                match outcome {
                    Ok(Some(child)) => {
                        co.stack.push(child);
                    }
                    Ok(None) => self.set_next_step(co, frame_idx, NextStep::OnPopping),
                    Err(error) => self.absorb_error(co, frame_idx, error),
                }
            }
            NextStep::Rerun => {
                let outcome = self.call_ops(co, frame_idx, |ops, ctx| ops.rerun(ctx), &ops);
                match outcome {
                    Ok(true) => {
                        if let Some(frame) = co.stack.frame_mut(frame_idx) {
                            frame.child_cursor = 0;
                            frame.next_step = NextStep::SelectChild;
                        }
                    }
                    Ok(false) => self.set_next_step(co, frame_idx, NextStep::OnPopping),
                    Err(error) => self.absorb_error(co, frame_idx, error),
                }
            }
            NextStep::OnPopping => {
                let outcome = self.call_ops(co, frame_idx, |ops, ctx| ops.on_popping(ctx), &ops);
                match outcome {
                    Ok(true) => self.pop_frame(co),
                    Ok(false) => self.set_next_step(co, frame_idx, NextStep::Rerun),
                    Err(error) => {
                        // a popping failure still pops, with the
                        // exception recorded
                        co.stack.raise(&error);
                        self.pop_frame(co);
                    }
                }
            }
        }
    }

    fn call_ops<R>(
        &self,
        co: &mut Coroutine,
        frame_idx: usize,
        f: impl FnOnce(&dyn ElementOps, &mut ElementCtx) -> CoreResult<R>,
        ops: &Rc<dyn ElementOps>,
    ) -> CoreResult<R> {
        let mut ctx = ElementCtx {
            instance: self,
            co,
            frame_idx,
        };
        f(ops.as_ref(), &mut ctx)
    }

    fn set_next_step(&self, co: &mut Coroutine, frame_idx: usize, next: NextStep) {
        if let Some(frame) = co.stack.frame_mut(frame_idx) {
            frame.next_step = next;
        }
    }

    /// Converts a step error into either a silent neutral result or a
    /// coroutine exception, and sends the frame to `OnPopping`.
    fn absorb_error(&self, co: &mut Coroutine, frame_idx: usize, error: CoreError) {
        let silently = co
            .stack
            .frame(frame_idx)
            .map(|frame| frame.silently)
            .unwrap_or(false);

        if silently {
            if !error.is_trivial() {
                log::warn!("silent frame swallowed: {error}");
            }
            if let Some(frame) = co.stack.frame_mut(frame_idx) {
                frame.set_question(neutral_value_for(&error));
                frame.next_step = NextStep::OnPopping;
            }
            return;
        }

        let exception = crate::stack::Exception::from_error(&error);
        if let Some(frame) = co.stack.frame_mut(frame_idx) {
            frame.set_symbol(
                crate::frame::SymbolVar::Colon,
                Variant::exception(exception.atom),
            );
            frame.next_step = NextStep::OnPopping;
        }
        co.stack.raise(&error);
    }

    /// Pops the top frame, bubbling its result and honoring the back
    /// anchor.
    fn pop_frame(&self, co: &mut Coroutine) {
        let result = co.stack.pop().unwrap_or_else(Variant::undefined);

        match co.stack.top_mut() {
            // children that produced nothing do not clobber the slot
            Some(parent) if !result.is_undefined() => parent.result_from_child = result,
            Some(_) => {}
            None => co.result = result,
        }

        if let Some(anchor) = co.stack.back_anchor {
            while co
                .stack
                .top_index()
                .is_some_and(|top| top > anchor)
            {
                // intermediate frames unwind with destructors only
                co.stack.pop();
            }
            if co.stack.top_index() == Some(anchor) {
                co.stack.back_anchor = None;
                if let Some(frame) = co.stack.top_mut() {
                    frame.next_step = NextStep::OnPopping;
                }
            }
        }
    }

    /// The stack has emptied: decide between exit and the observing
    /// stage.
    fn finish_run(&self, co: &mut Coroutine) {
        if let Some(exception) = co.stack.take_exception() {
            log::warn!(
                "coroutine {} exited with uncaught exception {}",
                co.token,
                exception.name()
            );
            co.result = exception.info.clone();
            co.observers.clear();
            co.state = CoroutineState::Exited;
        } else if co.observers.is_empty() {
            co.state = CoroutineState::Exited;
        } else {
            co.stage = CoroutineStage::Observing;
            co.state = CoroutineState::Observing;
        }

        if co.state == CoroutineState::Exited {
            self.post_exit_event(co);
        }
    }

    fn post_exit_event(&self, co: &Coroutine) {
        if let Some(parent) = co.parent {
            self.post_event(Event::new(
                parent,
                Variant::string(&co.token),
                msg_type::child_exit(),
                Some(msg_sub::EXITED),
                co.result.clone(),
            ));
        }
    }

    /// Matches queued events against the coroutine's observers and runs
    /// the handlers. A matching event resumes a stopped coroutine.
    fn deliver_events(&self, co: &mut Coroutine) {
        let events = co.take_events();
        for event in events {
            let stage_mask = co.stage.mask();
            let state_mask = co.state.mask();

            let matching: Vec<u64> = co
                .observers
                .iter()
                .filter(|observer| observer.matches(stage_mask, state_mask, &event))
                .map(|observer| observer.id)
                .collect();

            if matching.is_empty() {
                log::debug!(
                    "event {} dropped: no observer matched",
                    event.event_type.raw()
                );
                continue;
            }

            for id in matching {
                let Some(pos) = co.observers.iter().position(|o| o.id == id) else {
                    continue;
                };
                let mut observer = co.observers.remove(pos);

                if observer.inner && co.state == CoroutineState::Stopped {
                    co.state = CoroutineState::Ready;
                }

                if let Err(error) = (observer.handler)(self, co, &event) {
                    log::warn!("observer handler failed: {error}");
                    co.stack.raise(&error);
                }

                if !observer.one_shot {
                    co.observers.push(observer);
                }
            }
        }

        // the observing stage ends when the last observer is gone
        if co.stage == CoroutineStage::Observing
            && co.state == CoroutineState::Observing
            && co.observers.is_empty()
        {
            co.state = CoroutineState::Exited;
            self.post_exit_event(co);
        }
    }
}
