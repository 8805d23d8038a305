//! `<adapt>`: applies a template to a source value.
//!
//! Without `individually` the template in `with` is evaluated once with
//! `?` bound to the source. With `individually` the template maps over
//! the source's members (or entries) and the result keeps the source's
//! shape: arrays stay arrays, objects stay objects.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::elements::{ElementCtx, ElementOps};
use crate::expr::Expr;
use crate::frame::SymbolVar;
use crate::vdom::Element;

fn eval_with_question(ctx: &mut ElementCtx, expr: &Expr, question: Variant) -> CoreResult<Variant> {
    let saved = ctx.frame().symbol(SymbolVar::Question);
    ctx.frame_mut().set_question(question);
    let result = ctx.eval_expr(expr);
    ctx.frame_mut().set_question(saved);
    result
}

/// Ops for `<adapt>`.
pub struct AdaptOps;

impl ElementOps for AdaptOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let source = ctx
            .eval_attr("on")?
            .ok_or_else(|| CoreError::argument_missed("on"))?;
        let template = ctx
            .element()
            .attr("with")
            .and_then(|attr| attr.value.clone())
            .ok_or_else(|| CoreError::argument_missed("with"))?;
        let individually = ctx.has_flag(&["individually", "indiv"]);

        if !individually {
            let adapted = eval_with_question(ctx, &template, source)?;
            ctx.set_question(adapted);
            return Ok(false);
        }

        let adapted = if source.is_object() {
            let result = Variant::object();
            for (key, member) in source.object_entries()? {
                let mapped = eval_with_question(ctx, &template, member)?;
                result.object_set(&key, mapped)?;
            }
            result
        } else if source.linear_size().is_some() {
            let mut mapped = Vec::new();
            for member in source.members()? {
                mapped.push(eval_with_question(ctx, &template, member)?);
            }
            Variant::array(mapped)
        } else {
            return Err(CoreError::wrong_data_type(
                "container",
                source.variant_type().as_str(),
            ));
        };

        ctx.set_question(adapted);
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
