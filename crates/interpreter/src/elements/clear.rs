//! `<clear>`: empties a container or delegates to a native cleaner.
//!
//! The result is the number of members dropped, or whatever the native
//! cleaner reports.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::elements::{ElementCtx, ElementOps};
use crate::vdom::Element;

/// Ops for `<clear>`.
pub struct ClearOps;

impl ElementOps for ClearOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let target = ctx
            .eval_attr("on")?
            .ok_or_else(|| CoreError::argument_missed("on"))?;

        if target
            .get_string()
            .is_some_and(|s| s.starts_with('#') || s.starts_with('.'))
        {
            return Err(CoreError::not_supported(
                "document selectors are not served by this runtime",
            ));
        }

        if let Some(native) = target.native_val() {
            let silently = ctx.frame().silently;
            let result = native
                .ops
                .cleaner(native.entity.as_ref(), silently)
                .ok_or_else(|| CoreError::not_supported("entity has no cleaner"))?;
            ctx.set_question(result);
            return Ok(false);
        }

        let count = target.container_clear()?;
        ctx.set_question(Variant::ulongint(count as u64));
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
