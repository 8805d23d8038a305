//! `<head>`: switches the stack into head mode for its children.

use std::rc::Rc;

use purc_core::error::CoreResult;

use crate::elements::{default_select_child, ElementCtx, ElementOps};
use crate::stack::VdomMode;
use crate::vdom::Element;

/// Ops for `<head>`.
pub struct HeadOps;

impl ElementOps for HeadOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;
        ctx.co.stack.mode = VdomMode::InHead;
        Ok(true)
    }

    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        Ok(default_select_child(ctx))
    }

    fn rerun(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(false)
    }

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        ctx.co.stack.mode = VdomMode::AfterHead;
        Ok(true)
    }
}
