//! `<request>`: sends a request to another coroutine.
//!
//! The target in `on` is a coroutine addressed by an HVML URI (full or
//! shorthand). The payload from `with` travels as a `request` event with
//! the verb from `to` as its subtype and a composite request id for
//! correlation. Synchronously the coroutine yields until the matching
//! `response` event arrives; `noreturn` fires and forgets. CSS-selector
//! and renderer targets are outside this runtime and fail up front.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_core::hvml_uri::{HvmlResourceKind, HvmlUri};
use purc_variant::Variant;

use crate::coroutine::{Coroutine, CoroutineState};
use crate::elements::{ElementCtx, ElementOps};
use crate::event::{msg_type, Event, RequestId, RequestIdKind};
use crate::instance::Instance;
use crate::observer::{CoStageMask, CoStateMask, Observer};
use crate::scope;
use crate::vdom::Element;

fn resolve_target(ctx: &ElementCtx, on: &str) -> CoreResult<purc_core::Atom> {
    if on.starts_with('#') || on.starts_with('.') || on == "$RDR" {
        return Err(CoreError::not_supported(format!(
            "request target '{on}' is not a coroutine"
        )));
    }

    let uri = HvmlUri::parse(on)?;
    if uri.kind != HvmlResourceKind::Coroutine {
        return Err(CoreError::not_supported(
            "channel requests need a channel endpoint",
        ));
    }
    if uri.has_wildcard() {
        return Err(CoreError::invalid_value(
            "request targets cannot be wildcards",
        ));
    }

    ctx.instance
        .coroutine_by_token(&uri.name)
        .map(|(cid, _)| cid)
        .ok_or_else(|| CoreError::entity_not_found(format!("coroutine '{}'", uri.name)))
}

/// Ops for `<request>`.
pub struct RequestOps;

impl ElementOps for RequestOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let on = ctx
            .attr_string("on")?
            .ok_or_else(|| CoreError::argument_missed("on"))?;
        let verb = ctx.attr_string("to")?.unwrap_or_else(|| "request".to_string());
        let noreturn = ctx.has_flag(&["noreturn", "no-return"]);
        let asynchronously = ctx.has_flag(&["asynchronously", "async"])
            && !ctx.has_flag(&["synchronously", "sync"]);
        let as_name = ctx.attr_string("as")?;
        let at = ctx.attr_string("at")?;

        let payload = match ctx.eval_content()? {
            Some(content) => content,
            None => ctx.eval_attr("with")?.unwrap_or_else(Variant::undefined),
        };

        let dest = resolve_target(ctx, &on)?;

        let request_id = RequestId {
            kind: RequestIdKind::Coroutine,
            runner: ctx.instance.runner_atom(),
            cid: ctx.co.cid,
            token: ctx.co.next_request_token(),
        }
        .to_variant();

        let mut event = Event::new(
            dest,
            Variant::string(&ctx.co.token),
            msg_type::request(),
            Some(&verb),
            payload,
        );
        event.source_uri = Some(format!(
            "{}/{}/crtn/{}",
            ctx.instance.app(),
            ctx.instance.runner(),
            ctx.co.token
        ));
        event.request_id = Some(request_id.clone());
        ctx.instance.post_event(event);

        if let Some(name) = as_name.as_deref() {
            scope::bind_value(
                ctx.co,
                ctx.frame_idx,
                name,
                request_id.clone(),
                at.as_deref(),
                false,
            )?;
        }

        if noreturn {
            ctx.set_question(Variant::null());
            return Ok(false);
        }

        if asynchronously {
            ctx.set_question(request_id);
            return Ok(false);
        }

        // synchronous: yield until the correlated response arrives
        register_response_observer(ctx, request_id);
        ctx.co.state = CoroutineState::Stopped;
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

fn register_response_observer(ctx: &mut ElementCtx, request_id: Variant) {
    let id = ctx.co.next_observer_id();
    let cid = ctx.co.cid;
    let frame_idx = ctx.frame_idx;

    let handler = Box::new(
        move |_instance: &Instance, co: &mut Coroutine, event: &Event| {
            if let Some(frame) = co.stack.frame_mut(frame_idx) {
                frame.set_question(event.payload.clone());
            }
            Ok(())
        },
    );

    let wanted = request_id.clone();
    let is_match = Box::new(move |_observer: &Observer, event: &Event| {
        event.event_type == msg_type::response()
            && event
                .request_id
                .as_ref()
                .is_some_and(|candidate| RequestId::variants_match(candidate, &wanted))
    });

    ctx.co.add_observer(Observer {
        id,
        cid,
        observed: request_id,
        event_type: msg_type::response(),
        subtype: None,
        stage_mask: CoStageMask::all(),
        state_mask: CoStateMask::all(),
        is_match: Some(is_match),
        handler,
        aux: None,
        one_shot: true,
        inner: true,
    });
}
