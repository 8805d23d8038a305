//! The PurC-RS interpreter runtime.
//!
//! This crate executes parsed HVML programs: coroutines walk their VDOM
//! through per-element operations dispatched from a handler table, pause
//! at yield points, and resume when observers match incoming events. The
//! fetcher and the runloop timers feed the same event machinery, so a
//! coroutine waiting on a fetch, a response from a sibling coroutine, or
//! a timer tick all wake up the same way.

#![warn(rustdoc::missing_crate_level_docs)]

/// Coroutines: state, stage, stack, observers, event queue
pub mod coroutine;
/// Per-element operations and the dispatch table
pub mod elements;
/// Events, reduce options and composite request ids
pub mod event;
/// Executors driving `iterate by="RULE"` and `reduce`
pub mod executor;
/// Attribute and content expressions
pub mod expr;
/// Stack frames and symbol variables
pub mod frame;
/// The instance: coroutine registry, event routing, dispatch loop
pub mod instance;
/// Observers and their match predicates
pub mod observer;
/// Binding targets along the scope chain
pub mod scope;
/// The coroutine call stack and exceptions
pub mod stack;
/// The VDOM the interpreter walks
pub mod vdom;

pub use coroutine::{Coroutine, CoroutineStage, CoroutineState};
pub use elements::{ElementCtx, ElementOps, GenericOps, HandlerTable};
pub use event::{msg_sub, msg_type, Event, EventReduceOpt, RequestId, RequestIdKind};
pub use executor::{Executor, ExecutorIter, ExecutorRegistry};
pub use expr::{BinaryOp, EvalScope, Expr, StaticScope, UnaryOp};
pub use frame::{NextStep, StackFrame, SymbolVar};
pub use instance::Instance;
pub use observer::{CoStageMask, CoStateMask, Observer, ObserverHandler};
pub use stack::{Exception, Stack, VdomMode};
pub use vdom::{Attr, Document, Element, ElementBuilder, Node};
