//! The per-thread variant heap.
//!
//! Holds the process singletons (null, undefined, true, false) for the
//! current thread, tracks how many counted cells are alive so leak
//! invariants are testable, and drives deferred container teardown: when
//! a container cell dies, its children are drained into a worklist and
//! released iteratively, so a deeply nested or cyclic structure cannot
//! overflow the call stack.

use std::cell::{Cell, RefCell};

use crate::variant::Variant;

thread_local! {
    static LIVE: Cell<usize> = const { Cell::new(0) };
    static SINGLETONS: Singletons = Singletons::new();
    static TEARDOWN: RefCell<Teardown> = RefCell::new(Teardown::default());
}

struct Singletons {
    null: Variant,
    undefined: Variant,
    true_value: Variant,
    false_value: Variant,
}

impl Singletons {
    fn new() -> Self {
        Self {
            null: Variant::new_singleton_null(),
            undefined: Variant::new_singleton_undefined(),
            true_value: Variant::new_singleton_boolean(true),
            false_value: Variant::new_singleton_boolean(false),
        }
    }
}

#[derive(Default)]
struct Teardown {
    active: bool,
    pending: Vec<Variant>,
}

/// Number of counted variant cells currently alive on this thread.
/// Singletons are not counted.
pub fn used_variants() -> usize {
    LIVE.with(|live| live.get())
}

pub(crate) fn cell_created() {
    LIVE.with(|live| live.set(live.get() + 1));
}

pub(crate) fn cell_dropped() {
    LIVE.with(|live| live.set(live.get().saturating_sub(1)));
}

pub(crate) fn singleton_null() -> Variant {
    SINGLETONS.with(|s| s.null.clone())
}

pub(crate) fn singleton_undefined() -> Variant {
    SINGLETONS.with(|s| s.undefined.clone())
}

pub(crate) fn singleton_boolean(value: bool) -> Variant {
    SINGLETONS.with(|s| {
        if value {
            s.true_value.clone()
        } else {
            s.false_value.clone()
        }
    })
}

/// Releases `children` through the worklist. Re-entrant calls (a child's
/// own teardown) only enqueue; the outermost call drains.
pub(crate) fn dispose(mut children: Vec<Variant>) {
    if children.is_empty() {
        return;
    }

    let drive = match TEARDOWN.try_with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.pending.append(&mut children);
        if queue.active {
            false
        } else {
            queue.active = true;
            true
        }
    }) {
        Ok(drive) => drive,
        // Thread teardown: the queue is gone, release directly.
        Err(_) => {
            children.clear();
            return;
        }
    };

    if !drive {
        return;
    }

    loop {
        let next = match TEARDOWN.try_with(|queue| queue.borrow_mut().pending.pop()) {
            Ok(next) => next,
            Err(_) => None,
        };
        match next {
            Some(child) => drop(child),
            None => break,
        }
    }

    let _ = TEARDOWN.try_with(|queue| queue.borrow_mut().active = false);
}
