//! `<back>`: unwinds the stack to an anchor frame.
//!
//! The target is an ancestor with a matching `#id`, one of the named
//! anchors (`_last`, `_nexttolast`, `_topmost`), or a numeric depth.
//! Intermediate frames pop with destructors only; `with` plants a result
//! on the anchor.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};

use crate::elements::{ElementCtx, ElementOps};
use crate::vdom::Element;

fn resolve_anchor(ctx: &ElementCtx, target: &str) -> CoreResult<usize> {
    let own_idx = ctx.frame_idx;

    match target {
        "_last" => own_idx
            .checked_sub(1)
            .ok_or_else(|| CoreError::entity_not_found("_last anchor")),
        "_nexttolast" => own_idx
            .checked_sub(2)
            .ok_or_else(|| CoreError::entity_not_found("_nexttolast anchor")),
        "_topmost" => Ok(0),
        selector if selector.starts_with('#') => {
            let wanted = &selector[1..];
            ctx.co
                .stack
                .find_enclosing(own_idx, |element| {
                    element.literal_id().as_deref() == Some(wanted)
                })
                .ok_or_else(|| {
                    CoreError::entity_not_found(format!("no enclosing element '{selector}'"))
                })
        }
        depth => {
            let levels: usize = depth.parse().map_err(|_| {
                CoreError::invalid_value(format!("bad back target '{depth}'"))
            })?;
            own_idx
                .checked_sub(levels)
                .ok_or_else(|| CoreError::entity_not_found("back depth out of range"))
        }
    }
}

/// Ops for `<back>`.
pub struct BackOps;

impl ElementOps for BackOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let target = ctx
            .attr_string("to")?
            .unwrap_or_else(|| "_last".to_string());
        let anchor = resolve_anchor(ctx, &target)?;

        if let Some(with) = ctx.eval_attr("with")? {
            if let Some(frame) = ctx.co.stack.frame_mut(anchor) {
                frame.set_question(with);
            }
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
