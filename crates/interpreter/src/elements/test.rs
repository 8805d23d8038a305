//! `<test>`: evaluates a value and lets `match`/`differ` children pick
//! branches against it.
//!
//! With `exclusively` the first successful `match` wins and the rest of
//! the children are skipped.

use std::rc::Rc;

use purc_core::error::CoreResult;
use purc_variant::Variant;

use crate::elements::{default_select_child, ElementCtx, ElementOps};
use crate::vdom::Element;

pub(crate) struct TestCtxt {
    pub exclusively: bool,
    pub matched: bool,
}

/// Ops for `<test>`.
pub struct TestOps;

impl ElementOps for TestOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let value = match ctx.eval_attr("on")? {
            Some(value) => value,
            None => ctx.eval_attr("with")?.unwrap_or_else(Variant::undefined),
        };
        ctx.set_question(value);

        let exclusively = ctx.has_flag(&["exclusively", "excl"]);
        ctx.frame_mut().ctxt = Some(Box::new(TestCtxt {
            exclusively,
            matched: false,
        }));
        Ok(true)
    }

    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        let done = ctx
            .frame()
            .ctxt_ref::<TestCtxt>()
            .is_some_and(|state| state.exclusively && state.matched);
        if done {
            return Ok(None);
        }

        Ok(default_select_child(ctx))
    }

    fn rerun(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(false)
    }

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        // the winning branch's result becomes the test's result
        let child_result = ctx.frame().result_from_child.clone();
        if !child_result.is_undefined() {
            ctx.set_question(child_result);
        }
        Ok(true)
    }
}
