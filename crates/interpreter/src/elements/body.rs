//! `<body>`: switches the stack into body mode for its children.

use std::rc::Rc;

use purc_core::error::CoreResult;
use purc_variant::Variant;

use crate::elements::{default_select_child, ElementCtx, ElementOps};
use crate::frame::SymbolVar;
use crate::stack::VdomMode;
use crate::vdom::Element;

/// Ops for `<body>`.
pub struct BodyOps;

impl ElementOps for BodyOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;
        ctx.co.stack.mode = VdomMode::InBody;
        Ok(true)
    }

    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        Ok(default_select_child(ctx))
    }

    fn rerun(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(false)
    }

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        ctx.co.stack.mode = VdomMode::AfterBody;

        let child_result = ctx.frame().result_from_child.clone();
        if ctx.frame().symbol(SymbolVar::Question).is_undefined() && !child_result.is_undefined() {
            ctx.frame_mut().set_question(child_result);
        }
        Ok(true)
    }
}
