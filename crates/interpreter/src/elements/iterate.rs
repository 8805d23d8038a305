//! `<iterate>`: loops a body over an executor or a re-evaluated `with`.
//!
//! With `by` (or with `on` and no `with`) an executor drives the values;
//! otherwise `with` is re-evaluated each round. `onlyif` gates the next
//! round before it starts, `while` is checked after the counter advances,
//! and `$<` follows the last `?` unless `nosetotail` is present.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::elements::{default_select_child, ElementCtx, ElementOps};
use crate::executor::ExecutorIter;
use crate::expr::Expr;
use crate::frame::SymbolVar;
use crate::vdom::Element;

struct IterateCtxt {
    iter: Option<Box<dyn ExecutorIter>>,
    with_expr: Option<Expr>,
    onlyif_expr: Option<Expr>,
    while_expr: Option<Expr>,
    nosetotail: bool,
    stop: bool,
}

/// Ops for `<iterate>`.
pub struct IterateOps;

impl IterateOps {
    fn check_onlyif(ctx: &ElementCtx, expr: &Option<Expr>) -> CoreResult<bool> {
        match expr {
            None => Ok(true),
            Some(expr) => Ok(ctx.eval_expr(expr)?.booleanize()),
        }
    }
}

impl ElementOps for IterateOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let element = ctx.element();
        let rule_attr = ctx.attr_string("by")?;
        let with_attr = element.attr("with").and_then(|attr| attr.value.clone());
        let onlyif_attr = element.attr("onlyif").and_then(|attr| attr.value.clone());
        let while_attr = element.attr("while").and_then(|attr| attr.value.clone());
        let nosetotail = ctx.has_flag(&["nosetotail"]);

        if rule_attr.is_some() && (onlyif_attr.is_some() || while_attr.is_some()) {
            return Err(CoreError::not_supported(
                "'onlyif'/'while' conflict with 'by' on <iterate>",
            ));
        }

        let on = ctx.eval_attr("on")?;
        if let Some(on) = &on {
            // the source becomes the frame input before the first round
            ctx.frame_mut().set_input(on.clone());
        }

        // `in` repositions `$@`
        if let Some(target) = ctx.eval_attr("in")? {
            ctx.frame_mut().set_symbol(SymbolVar::At, target);
        }

        let by_rule = rule_attr.is_some() || with_attr.is_none();
        let mut ctxt = IterateCtxt {
            iter: None,
            with_expr: with_attr,
            onlyif_expr: onlyif_attr,
            while_expr: while_attr,
            nosetotail,
            stop: false,
        };

        if by_rule {
            let on = on.ok_or_else(|| CoreError::argument_missed("on"))?;
            let with = ctx
                .eval_attr("with")?
                .unwrap_or_else(Variant::undefined);
            let rule = rule_attr.unwrap_or_default();
            let (executor, param) = ctx.instance.executors().by_rule(&rule)?;

            let iter = match executor.iterate(&on, &with, &param) {
                Ok(iter) => iter,
                Err(CoreError::NotExists { .. }) => return Ok(false),
                Err(error) => return Err(error),
            };
            ctx.set_question(iter.it_value());
            ctxt.iter = Some(iter);
        } else {
            if !Self::check_onlyif(ctx, &ctxt.onlyif_expr)? {
                return Ok(false);
            }
            let with_expr = ctxt.with_expr.clone().expect("with-mode without with");
            let first = ctx.eval_expr(&with_expr)?;
            ctx.set_question(first);
        }

        ctx.frame_mut().ctxt = Some(Box::new(ctxt));
        Ok(true)
    }

    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        // children keep being selected while an exception unwinds, so a
        // catch sibling can intercept it
        Ok(default_select_child(ctx))
    }

    fn rerun(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(!ctx.has_exception())
    }

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(true);
        }
        if ctx.frame().ctxt_ref::<IterateCtxt>().is_none() {
            return Ok(true);
        }

        if ctx.frame().ctxt_ref::<IterateCtxt>().is_some_and(|c| c.stop) {
            return Ok(true);
        }

        // carry the latest result into the input slot
        let nosetotail = ctx
            .frame()
            .ctxt_ref::<IterateCtxt>()
            .is_some_and(|c| c.nosetotail);
        if !nosetotail {
            let latest = ctx.frame().symbol(SymbolVar::Question);
            ctx.frame_mut().set_input(latest);
        }

        // advance the value source
        let mut ctxt = ctx
            .frame_mut()
            .ctxt
            .take()
            .expect("iterate context checked above");
        let state = ctxt
            .downcast_mut::<IterateCtxt>()
            .expect("iterate context type");

        let mut keep_going = true;
        if let Some(iter) = state.iter.as_mut() {
            if iter.it_next() {
                ctx.frame_mut().set_question(iter.it_value());
            } else {
                keep_going = false;
            }
        }

        if keep_going {
            ctx.frame_mut().increment_percent();

            if let Some(while_expr) = state.while_expr.clone() {
                if !ctx.eval_expr(&while_expr)?.booleanize() {
                    keep_going = false;
                }
            }
        }

        if keep_going {
            if let Some(onlyif_expr) = state.onlyif_expr.clone() {
                if !ctx.eval_expr(&onlyif_expr)?.booleanize() {
                    keep_going = false;
                }
            }
        }

        if keep_going && state.iter.is_none() {
            let with_expr = state.with_expr.clone().expect("with-mode without with");
            let next = ctx.eval_expr(&with_expr)?;
            ctx.frame_mut().set_question(next);
        }

        state.stop = !keep_going;
        let stop = state.stop;
        ctx.frame_mut().ctxt = Some(ctxt);

        Ok(stop)
    }
}
