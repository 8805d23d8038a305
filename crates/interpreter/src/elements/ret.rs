//! `<return>`: pops back to the nearest enclosing `call`/`include`, or
//! to the entry frame when there is none, carrying `with` as the result.

use std::rc::Rc;

use purc_core::error::CoreResult;

use crate::elements::{ElementCtx, ElementOps};
use crate::vdom::Element;

/// Ops for `<return>`.
pub struct ReturnOps;

impl ElementOps for ReturnOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let anchor = ctx
            .co
            .stack
            .find_enclosing(ctx.frame_idx, |element| {
                element.tag == "call" || element.tag == "include"
            })
            .unwrap_or(0);

        if let Some(with) = ctx.eval_attr("with")? {
            if let Some(frame) = ctx.co.stack.frame_mut(anchor) {
                frame.set_question(with.clone());
            }
            ctx.set_question(with);
        }

        ctx.co.stack.set_back_anchor(anchor);
        Ok(false)
    }

    fn select_child(&self, _ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        Ok(None)
    }

    fn rerun(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(false)
    }

    fn on_popping(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(true)
    }
}
