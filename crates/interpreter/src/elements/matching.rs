//! `<match>` and `<differ>`: the branches of a `<test>` block.
//!
//! A `match` succeeds when its `for` condition holds against the test
//! value (an absent `for` always holds). A `differ` runs only when no
//! earlier branch succeeded. Successful branches report back to the
//! enclosing test frame so `exclusively` can cut the walk short.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::elements::test::TestCtxt;
use crate::elements::{default_select_child, ElementCtx, ElementOps};
use crate::frame::SymbolVar;
use crate::vdom::Element;

fn parent_test_value(ctx: &ElementCtx) -> CoreResult<Variant> {
    let parent_idx = ctx
        .parent_idx()
        .ok_or_else(|| CoreError::entity_not_found("enclosing <test>"))?;
    let parent = ctx
        .co
        .stack
        .frame(parent_idx)
        .ok_or_else(|| CoreError::entity_not_found("enclosing <test>"))?;
    if parent.ctxt_ref::<TestCtxt>().is_none() {
        return Err(CoreError::invalid_value(
            "<match>/<differ> outside of a <test>",
        ));
    }
    Ok(parent.symbol(SymbolVar::Question))
}

fn mark_parent_matched(ctx: &mut ElementCtx) {
    if let Some(parent) = ctx.parent_frame_mut() {
        if let Some(state) = parent.ctxt_mut::<TestCtxt>() {
            state.matched = true;
        }
    }
}

fn parent_already_matched(ctx: &ElementCtx) -> bool {
    ctx.parent_idx()
        .and_then(|idx| ctx.co.stack.frame(idx))
        .and_then(|parent| parent.ctxt_ref::<TestCtxt>())
        .is_some_and(|state| state.matched)
}

/// Ops for `<match>`.
pub struct MatchOps;

impl ElementOps for MatchOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let value = parent_test_value(ctx)?;

        let holds = match ctx.element().attr("for").and_then(|attr| attr.value.clone()) {
            None => true,
            Some(expr) => {
                // `for` sees the test value as its own `?`
                ctx.set_question(value.clone());
                ctx.eval_expr(&expr)?.booleanize()
            }
        };

        if !holds {
            ctx.frame_mut().set_question(Variant::undefined());
            return Ok(false);
        }

        mark_parent_matched(ctx);

        let own = ctx.eval_attr("on")?;
        ctx.set_question(own.unwrap_or(value));
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

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        let child_result = ctx.frame().result_from_child.clone();
        if !child_result.is_undefined() {
            ctx.set_question(child_result);
        }
        Ok(true)
    }
}

/// Ops for `<differ>`: the else-branch of a `<test>`.
pub struct DifferOps;

impl ElementOps for DifferOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        // runs only when every earlier branch failed
        let value = parent_test_value(ctx)?;
        if parent_already_matched(ctx) {
            ctx.frame_mut().set_question(Variant::undefined());
            return Ok(false);
        }

        mark_parent_matched(ctx);
        ctx.set_question(value);
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

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        let child_result = ctx.frame().result_from_child.clone();
        if !child_result.is_undefined() {
            ctx.set_question(child_result);
        }
        Ok(true)
    }
}
