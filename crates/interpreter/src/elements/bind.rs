//! `<bind>`: materializes an expression as a lazily-evaluated variable.
//!
//! The expression comes from `with` or the inline content. The bound
//! value is a dynamic variant whose getter re-evaluates the expression
//! against the document and runner variables at read time. With
//! `locally` the binding lands in the parent frame's `$!` object instead
//! of on the document.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::expr::{EvalScope, Expr};
use crate::elements::{ElementCtx, ElementOps};
use crate::frame::SymbolVar;
use crate::instance::Instance;
use crate::scope;
use crate::vdom::{Document, Element};

/// The scope an expression variable sees when it is read later: the
/// document and runner variables that outlive the binding frame.
struct DetachedScope {
    doc: Rc<Document>,
    instance: Instance,
}

impl EvalScope for DetachedScope {
    fn symbol(&self, _symbol: SymbolVar) -> Variant {
        // frame symbols are gone by read time
        Variant::undefined()
    }

    fn named(&self, name: &str) -> Option<Variant> {
        self.doc
            .variable(name)
            .or_else(|| self.instance.runner_variable(name))
    }
}

/// Ops for `<bind>`.
pub struct BindOps;

impl ElementOps for BindOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let as_name = ctx
            .attr_string("as")?
            .ok_or_else(|| CoreError::argument_missed("as"))?;
        let locally = ctx.has_flag(&["locally", "local"]);

        let element = ctx.element();
        let expr = element
            .attr("with")
            .and_then(|attr| attr.value.clone())
            .or_else(|| element.content_expr().cloned())
            .ok_or_else(|| CoreError::argument_missed("with"))?;

        let scope = DetachedScope {
            doc: Rc::clone(&ctx.co.doc),
            instance: ctx.instance.clone(),
        };
        let expr = Rc::new(expr);
        let getter_expr = Rc::clone(&expr);
        let getter: purc_variant::DynamicFn = Rc::new(move |_args: &[Variant]| {
            getter_expr.eval(&scope)
        });

        let value = Variant::dynamic(getter, None);

        if locally {
            scope::bind_value(ctx.co, ctx.frame_idx, &as_name, value.clone(), None, true)?;
        } else {
            ctx.co.doc.bind_variable(&as_name, value.clone());
        }

        ctx.set_question(value);
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
