//! `<init>`: binds a value to a name.
//!
//! The source is, in order of precedence, the inline content, the `with`
//! attribute, or a resource named by `from`. With `from` the fetch runs
//! through the fetcher: asynchronously the element completes at once and
//! a one-shot inner observer binds the decoded payload when the fetch
//! finishes; synchronously the coroutine yields and resumes on the
//! fetcher-state event. `uniquely` turns the value into a set under the
//! `against` key spec.

use std::cell::RefCell;
use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_fetcher::{RequestMethod, RespPhase};
use purc_variant::Variant;

use crate::coroutine::CoroutineState;
use crate::elements::{ElementCtx, ElementOps};
use crate::event::{msg_sub, msg_type, Event, RequestId, RequestIdKind};
use crate::instance::Instance;
use crate::observer::{CoStageMask, CoStateMask, Observer};
use crate::scope::{self, BindTarget};
use crate::vdom::Element;

/// Where an async binding will land once the payload arrives.
enum ResolvedTarget {
    ElementScope(usize),
    Document,
    LocalObject(Variant),
}

struct InitPlan {
    as_name: String,
    against: Option<String>,
    uniquely: bool,
    caseless: bool,
}

impl InitPlan {
    fn shape(&self, value: Variant) -> CoreResult<Variant> {
        shape_value(value, self.uniquely, self.against.as_deref(), self.caseless)
    }
}

fn shape_value(
    value: Variant,
    uniquely: bool,
    against: Option<&str>,
    caseless: bool,
) -> CoreResult<Variant> {
    if !uniquely {
        return Ok(value);
    }
    if value.linear_size().is_some() {
        Variant::set_from_container(&value, against, caseless)
    } else {
        let set = Variant::set(against, caseless);
        set.set_add(value, false)?;
        Ok(set)
    }
}

/// Ops for `<init>`.
pub struct InitOps;

impl ElementOps for InitOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let as_name = ctx
            .attr_string("as")?
            .ok_or_else(|| CoreError::argument_missed("as"))?;
        let at = ctx.attr_string("at")?;
        let against = ctx.attr_string("against")?;
        let uniquely = ctx.has_flag(&["uniquely", "uniq"]);
        let caseless = ctx.has_flag(&["caseinsensitively", "casei"]);
        let temporarily = ctx.has_flag(&["temporarily", "temp"]);
        let asynchronously = ctx.has_flag(&["asynchronously", "async"])
            && !ctx.has_flag(&["synchronously", "sync"])
            && !temporarily;

        let plan = InitPlan {
            as_name: as_name.clone(),
            against,
            uniquely,
            caseless,
        };

        // source precedence: inline content, then with, then from
        let mut source = ctx.eval_content()?;
        if source.is_none() {
            source = ctx.eval_attr("with")?;
        }
        if let Some(value) = source {
            let value = plan.shape(value)?;
            scope::bind_value(
                ctx.co,
                ctx.frame_idx,
                &as_name,
                value.clone(),
                at.as_deref(),
                temporarily,
            )?;
            ctx.set_question(value);
            return Ok(false);
        }

        let from = ctx
            .attr_string("from")?
            .ok_or_else(|| CoreError::argument_missed("from"))?;
        let method = match ctx.attr_string("via")? {
            Some(verb) => RequestMethod::from_verb(&verb)
                .ok_or_else(|| CoreError::invalid_value(format!("bad via verb '{verb}'")))?,
            None => RequestMethod::Get,
        };

        let request_id = RequestId {
            kind: RequestIdKind::Fetcher,
            runner: ctx.instance.runner_atom(),
            cid: ctx.co.cid,
            token: ctx.co.next_request_token(),
        }
        .to_variant();

        launch_fetch(ctx.instance, ctx.co.cid, &from, method, request_id.clone())?;

        if asynchronously {
            let target = resolve_async_target(ctx, at.as_deref(), temporarily)?;
            register_async_binder(ctx, request_id.clone(), plan, target);
            ctx.set_question(request_id);
            Ok(false)
        } else {
            register_sync_binder(ctx, request_id, plan, at, temporarily);
            ctx.co.state = CoroutineState::Stopped;
            Ok(false)
        }
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

/// Starts the fetch; completion arrives as a `fetcherState` event keyed
/// by the request id.
fn launch_fetch(
    instance: &Instance,
    cid: purc_core::Atom,
    from: &str,
    method: RequestMethod,
    request_id: Variant,
) -> CoreResult<()> {
    let poster = instance.clone();
    let body: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let observed = request_id.clone();

    instance
        .fetcher()
        .request_async(
            from,
            method,
            None,
            0,
            Box::new(move |_ticket, phase, header, data| match phase {
                RespPhase::Header => {}
                RespPhase::Data => {
                    if let Some(data) = data {
                        body.borrow_mut().extend_from_slice(data);
                    }
                }
                RespPhase::Finish => {
                    let bytes = body.borrow();
                    let payload = decode_payload(&bytes);
                    let mut event = Event::new(
                        cid,
                        observed.clone(),
                        msg_type::fetcher_state(),
                        Some(msg_sub::SUCCESS),
                        payload,
                    );
                    event.request_id = Some(observed.clone());
                    poster.post_event(event);
                }
                RespPhase::Error => {
                    let mut event = Event::new(
                        cid,
                        observed.clone(),
                        msg_type::fetcher_state(),
                        Some(msg_sub::ERROR),
                        Variant::longint(header.ret_code as i64),
                    );
                    event.request_id = Some(observed.clone());
                    poster.post_event(event);
                }
            }),
            None,
        )
        .map_err(CoreError::from)?;
    Ok(())
}

/// Fetched payloads are JSON when they parse; anything else binds as a
/// string of the raw bytes.
fn decode_payload(bytes: &[u8]) -> Variant {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok(value) = Variant::from_json_str(text) {
            return value;
        }
        return Variant::string(text);
    }
    Variant::byte_seq(bytes)
}

fn resolve_async_target(
    ctx: &ElementCtx,
    at: Option<&str>,
    temporarily: bool,
) -> CoreResult<ResolvedTarget> {
    match scope::resolve_bind_target(ctx.co, ctx.frame_idx, at, temporarily)? {
        BindTarget::FrameScope(idx) => {
            let element_id = ctx
                .co
                .stack
                .frame(idx)
                .and_then(|frame| frame.pos.as_ref().map(|el| el.id))
                .ok_or_else(|| CoreError::entity_not_found("scope frame"))?;
            Ok(ResolvedTarget::ElementScope(element_id))
        }
        BindTarget::Document => Ok(ResolvedTarget::Document),
        BindTarget::LocalTemp(idx) => {
            let local = ctx
                .co
                .stack
                .frame(idx)
                .map(|frame| frame.symbol(crate::frame::SymbolVar::Exclamation))
                .ok_or_else(|| CoreError::entity_not_found("local scope frame"))?;
            Ok(ResolvedTarget::LocalObject(local))
        }
    }
}

/// One-shot inner observer binding the payload after the element is
/// long gone; it runs on a pseudo frame.
fn register_async_binder(
    ctx: &mut ElementCtx,
    request_id: Variant,
    plan: InitPlan,
    target: ResolvedTarget,
) {
    let element = ctx.element();
    let id = ctx.co.next_observer_id();
    let cid = ctx.co.cid;

    let handler = Box::new(
        move |_instance: &Instance, co: &mut crate::coroutine::Coroutine, event: &Event| {
            if event.subtype.as_deref() == Some(msg_sub::ERROR) {
                return Err(CoreError::request_failed(
                    "fetch".to_string(),
                    format!("status {}", event.payload.numberize()),
                ));
            }

            let value = plan.shape(event.payload.clone())?;
            co.with_pseudo_frame(Rc::clone(&element), |co, _idx| match &target {
                ResolvedTarget::ElementScope(element_id) => {
                    co.bind_scope_variable(*element_id, &plan.as_name, value.clone());
                    Ok(())
                }
                ResolvedTarget::Document => {
                    co.doc.bind_variable(&plan.as_name, value.clone());
                    Ok(())
                }
                ResolvedTarget::LocalObject(local) => {
                    local.object_set(&plan.as_name, value.clone())?;
                    Ok(())
                }
            })
        },
    );

    ctx.co.add_observer(Observer {
        id,
        cid,
        observed: request_id,
        event_type: msg_type::fetcher_state(),
        subtype: None,
        stage_mask: CoStageMask::all(),
        state_mask: CoStateMask::all(),
        is_match: None,
        handler,
        aux: None,
        one_shot: true,
        inner: true,
    });
}

/// One-shot inner observer resuming the yielded frame with the payload.
fn register_sync_binder(
    ctx: &mut ElementCtx,
    request_id: Variant,
    plan: InitPlan,
    at: Option<String>,
    temporarily: bool,
) {
    let id = ctx.co.next_observer_id();
    let cid = ctx.co.cid;
    let frame_idx = ctx.frame_idx;

    let handler = Box::new(
        move |_instance: &Instance, co: &mut crate::coroutine::Coroutine, event: &Event| {
            if event.subtype.as_deref() == Some(msg_sub::ERROR) {
                return Err(CoreError::request_failed(
                    "fetch".to_string(),
                    format!("status {}", event.payload.numberize()),
                ));
            }

            let value = plan.shape(event.payload.clone())?;
            scope::bind_value(
                co,
                frame_idx,
                &plan.as_name,
                value.clone(),
                at.as_deref(),
                temporarily,
            )?;
            if let Some(frame) = co.stack.frame_mut(frame_idx) {
                frame.set_question(value);
            }
            Ok(())
        },
    );

    ctx.co.add_observer(Observer {
        id,
        cid,
        observed: request_id,
        event_type: msg_type::fetcher_state(),
        subtype: None,
        stage_mask: CoStageMask::all(),
        state_mask: CoStateMask::all(),
        is_match: None,
        handler,
        aux: None,
        one_shot: true,
        inner: true,
    });
}
