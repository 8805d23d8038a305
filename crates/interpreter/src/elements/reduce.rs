//! `<reduce>`: folds a source through an executor and binds the result.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::elements::{ElementCtx, ElementOps};
use crate::scope;
use crate::vdom::Element;

/// Ops for `<reduce>`.
pub struct ReduceOps;

impl ElementOps for ReduceOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let on = ctx
            .eval_attr("on")?
            .ok_or_else(|| CoreError::argument_missed("on"))?;
        let with = ctx.eval_attr("with")?.unwrap_or_else(Variant::undefined);
        let rule = ctx.attr_string("by")?.unwrap_or_default();

        let (executor, param) = ctx.instance.executors().by_rule(&rule)?;
        let reduction = executor.reduce(&on, &with, &param)?;

        if let Some(name) = ctx.attr_string("as")? {
            let at = ctx.attr_string("at")?;
            let temporarily = ctx.has_flag(&["temporarily", "temp"]);
            scope::bind_value(
                ctx.co,
                ctx.frame_idx,
                &name,
                reduction.clone(),
                at.as_deref(),
                temporarily,
            )?;
        }

        ctx.set_question(reduction);
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
