//! `<catch>`: consumes a matching coroutine exception.
//!
//! The element only does anything while the coroutine is unwinding with
//! a pending exception. A matching `for` pattern (an exception name, a
//! comma-separated list of names, or `*`) clears the exception and runs
//! the body with `?` bound to `{ name, info }`; anything else re-raises
//! by leaving the exception in place.

use std::rc::Rc;

use purc_core::error::CoreResult;
use purc_variant::Variant;

use crate::elements::{default_select_child, ElementCtx, ElementOps};
use crate::vdom::Element;

fn pattern_matches(pattern: &str, name: &str) -> bool {
    pattern
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.eq_ignore_ascii_case(name))
}

/// Ops for `<catch>`.
pub struct CatchOps;

impl ElementOps for CatchOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        let Some(exception) = ctx.co.stack.except.clone() else {
            // nothing is unwinding; the element is inert
            return Ok(false);
        };

        let pattern = match ctx.element().attr("for").and_then(|attr| attr.value.clone()) {
            None => "*".to_string(),
            Some(expr) => ctx
                .eval_expr(&expr)?
                .get_string()
                .unwrap_or("*")
                .to_string(),
        };

        if !pattern_matches(&pattern, exception.name()) {
            return Ok(false);
        }

        ctx.co.stack.take_exception();

        let caught = Variant::object();
        caught.object_set("name", Variant::string(exception.name()))?;
        caught.object_set("info", exception.info.clone())?;
        ctx.set_question(caught);

        Ok(true)
    }

    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        // children keep being selected while an exception unwinds, so a
        // catch sibling can intercept it
        Ok(default_select_child(ctx))
    }

    fn rerun(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(false)
    }

    fn on_popping(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_forms() {
        assert!(pattern_matches("*", "BadName"));
        assert!(pattern_matches("BadName", "BadName"));
        assert!(pattern_matches("badname", "BadName"));
        assert!(pattern_matches("NoData, BadName", "BadName"));
        assert!(!pattern_matches("NoData", "BadName"));
    }
}
