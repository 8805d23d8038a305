//! End-to-end tests of the interpreter runtime: programs are built as
//! VDOM trees and executed on a real instance, runloop and fetcher.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use purc_core::error::CoreResult;
use purc_interpreter::{
    msg_type, Document, Element, ElementBuilder, ElementCtx, ElementOps, Event, Expr, Instance,
    RequestId, SymbolVar,
};
use purc_variant::Variant;

const RUN_TIMEOUT: Duration = Duration::from_secs(5);

struct TempPath(PathBuf);

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn write_temp(content: &str) -> TempPath {
    use std::sync::atomic::{AtomicU32, Ordering};
    static SEQ: AtomicU32 = AtomicU32::new(0);
    let path = std::env::temp_dir().join(format!(
        "purc-interp-fetch-{}-{}.json",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed),
    ));
    std::fs::write(&path, content).expect("temp file written");
    TempPath(path)
}

/// A probe element counting how many times its body entry ran.
struct ProbeOps {
    hits: Rc<Cell<u32>>,
}

impl ElementOps for ProbeOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        self.hits.set(self.hits.get() + 1);
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

fn instance_with_probe(name: &str) -> (Instance, Rc<Cell<u32>>) {
    let instance = Instance::new("cn.fmsoft.hvml.test", name).expect("instance");
    let hits = Rc::new(Cell::new(0));
    instance.register_element(
        "probe",
        Rc::new(ProbeOps {
            hits: Rc::clone(&hits),
        }),
    );
    (instance, hits)
}

#[test]
fn init_with_inline_source_binds_a_unique_set() {
    let (instance, _) = instance_with_probe("init-uniq");

    // <init as="x" at="_topmost" with="[1,2,3,2]" uniquely against="" />
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("x"))
                .attr("at", Expr::str("_topmost"))
                .attr("with", Expr::json("[1, 2, 3, 2]"))
                .flag("uniquely")
                .attr("against", Expr::str(""))
                .build(),
        )
        .build();

    let doc = Document::new(program);
    instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let bound = doc.variable("x").expect("x bound on the document");
    assert!(bound.is_set());
    assert_eq!(bound.set_size().unwrap(), 3);

    // an equal member is still rejected after binding
    assert!(!bound.set_add(Variant::longint(2), false).unwrap());
    assert_eq!(bound.set_size().unwrap(), 3);
}

#[test]
fn iterate_with_while_runs_the_body_three_times() {
    let (instance, hits) = instance_with_probe("iterate-while");

    // <iterate on="$x" while="$% < 3"><probe/></iterate> with ten members
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("x"))
                .attr("with", Expr::json("[0,1,2,3,4,5,6,7,8,9]"))
                .build(),
        )
        .child(
            ElementBuilder::new("iterate")
                .attr("on", Expr::named("x"))
                .attr("while", Expr::sym(SymbolVar::Percent).lt(Expr::int(3)))
                .child(ElementBuilder::new("probe").build())
                .build(),
        )
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    assert_eq!(hits.get(), 3);
}

#[test]
fn iterate_body_runs_once_per_member() {
    let (instance, hits) = instance_with_probe("iterate-count");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("rows"))
                .attr("with", Expr::json(r#"["a", "b", "c", "d"]"#))
                .build(),
        )
        .child(
            ElementBuilder::new("iterate")
                .attr("on", Expr::named("rows"))
                .child(ElementBuilder::new("probe").build())
                .build(),
        )
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(hits.get(), 4);
}

#[test]
fn iterate_by_range_rule() {
    let (instance, hits) = instance_with_probe("iterate-range");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("iterate")
                .attr("on", Expr::json("null"))
                .attr("by", Expr::str("RANGE: FROM 0 TO 4 ADVANCE 2"))
                .child(ElementBuilder::new("probe").build())
                .build(),
        )
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(hits.get(), 3); // 0, 2, 4
}

#[test]
fn test_with_exclusively_runs_at_most_one_branch() {
    let (instance, hits) = instance_with_probe("test-excl");

    // both branches hold; exclusively keeps the second from running
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("test")
                .attr("on", Expr::int(5))
                .flag("exclusively")
                .child(
                    ElementBuilder::new("match")
                        .attr("for", Expr::sym(SymbolVar::Question).gt(Expr::int(1)))
                        .child(ElementBuilder::new("probe").build())
                        .build(),
                )
                .child(
                    ElementBuilder::new("match")
                        .attr("for", Expr::sym(SymbolVar::Question).gt(Expr::int(2)))
                        .child(ElementBuilder::new("probe").build())
                        .build(),
                )
                .build(),
        )
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(hits.get(), 1);
}

#[test]
fn differ_runs_only_when_no_match_succeeded() {
    let (instance, hits) = instance_with_probe("test-differ");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("test")
                .attr("on", Expr::int(0))
                .child(
                    ElementBuilder::new("match")
                        .attr("for", Expr::sym(SymbolVar::Question).gt(Expr::int(10)))
                        .child(ElementBuilder::new("probe").build())
                        .build(),
                )
                .child(
                    ElementBuilder::new("differ")
                        .child(ElementBuilder::new("probe").build())
                        .build(),
                )
                .build(),
        )
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(hits.get(), 1);
}

#[test]
fn catch_consumes_a_matching_exception() {
    let (instance, hits) = instance_with_probe("catch-match");

    // the bad binding name raises BadName; the catch sibling takes it
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("9bad"))
                .attr("with", Expr::int(1))
                .build(),
        )
        .child(
            ElementBuilder::new("catch")
                .attr("for", Expr::str("BadName"))
                .child(ElementBuilder::new("probe").build())
                .build(),
        )
        .build();

    let doc = Document::new(program);
    let cid = instance.schedule_coroutine(doc, None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    assert_eq!(hits.get(), 1);

    // the catch result carries {name, info} up to the coroutine result
    let result = instance.coroutine_result(cid).expect("result kept");
    assert_eq!(
        result.object_get("name").unwrap().get_string(),
        Some("BadName")
    );
    assert!(result.object_get("info").is_some());
}

#[test]
fn catch_with_other_pattern_reraises() {
    let (instance, hits) = instance_with_probe("catch-miss");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("9bad"))
                .attr("with", Expr::int(1))
                .build(),
        )
        .child(
            ElementBuilder::new("catch")
                .attr("for", Expr::str("NoData"))
                .child(ElementBuilder::new("probe").build())
                .build(),
        )
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    // the pattern did not match, so the body never ran and the
    // exception unwound past the entry frame
    assert_eq!(hits.get(), 0);
}

#[test]
fn back_unwinds_to_the_anchor_and_plants_the_result() {
    let (instance, hits) = instance_with_probe("back-anchor");

    // <div id="spot"><section><back to="#spot" with=7/></section><probe/></div>
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("div")
                .attr("id", Expr::str("spot"))
                .child(
                    ElementBuilder::new("section")
                        .child(
                            ElementBuilder::new("back")
                                .attr("to", Expr::str("#spot"))
                                .attr("with", Expr::int(7))
                                .build(),
                        )
                        .build(),
                )
                .child(ElementBuilder::new("probe").build())
                .build(),
        )
        .build();

    let cid = instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    // the probe after the unwound subtree never ran
    assert_eq!(hits.get(), 0);
    let result = instance.coroutine_result(cid).expect("result kept");
    assert_eq!(result.as_longint(), Some(7));
}

#[test]
fn request_round_trip_between_coroutines() {
    let (instance, _) = instance_with_probe("request-pair");

    // B: an empty program kept alive by one request observer
    let doc_b = Document::new(ElementBuilder::new("hvml").build());
    let cid_b = instance.schedule_coroutine(doc_b, Some("B"));

    let seen: Rc<Cell<Option<i64>>> = Rc::new(Cell::new(None));
    let seen_sink = Rc::clone(&seen);
    instance
        .observe(
            cid_b,
            Variant::string("A"),
            msg_type::request(),
            Some("event"),
            true,
            Box::new(move |instance, _co, event| {
                seen_sink.set(event.payload.as_longint());

                // answer the issuer through its composite request id
                let request_id = event.request_id.clone().expect("request id");
                let issuer = RequestId::from_variant(&request_id).expect("composite id");
                let mut response = Event::new(
                    issuer.cid,
                    request_id.clone(),
                    msg_type::response(),
                    None,
                    event.payload.clone(),
                );
                response.request_id = Some(request_id);
                instance.post_event(response);
                Ok(())
            }),
        )
        .expect("observer registered");

    // A: <request on="~/~/~/crtn/B" to="event" synchronously with=42 />
    let program_a = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("request")
                .attr("on", Expr::str("~/~/~/crtn/B"))
                .attr("to", Expr::str("event"))
                .flag("synchronously")
                .attr("with", Expr::int(42))
                .build(),
        )
        .build();
    let cid_a = instance.schedule_coroutine(Document::new(program_a), Some("A"));

    assert!(instance.run_until_done(RUN_TIMEOUT));

    assert_eq!(seen.get(), Some(42));
    let result = instance.coroutine_result(cid_a).expect("result kept");
    assert_eq!(result.as_longint(), Some(42));
}

#[test]
fn init_from_file_synchronously() {
    let (instance, _) = instance_with_probe("init-sync-fetch");

    let file = write_temp("[10, 20, 30]");
    let uri = format!("file://{}", file.0.display());

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("rows"))
                .attr("at", Expr::str("_topmost"))
                .attr("from", Expr::str(&uri))
                .build(),
        )
        .build();

    let doc = Document::new(program);
    instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let rows = doc.variable("rows").expect("rows bound");
    assert_eq!(rows.array_size().unwrap(), 3);
    assert_eq!(rows.array_get(2).unwrap().as_longint(), Some(30));
}

#[test]
fn init_from_file_asynchronously_binds_after_completion() {
    let (instance, _) = instance_with_probe("init-async-fetch");

    let file = write_temp(r#"{"status": "loaded"}"#);
    let uri = format!("file://{}", file.0.display());

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("payload"))
                .attr("at", Expr::str("_topmost"))
                .attr("from", Expr::str(&uri))
                .flag("asynchronously")
                .build(),
        )
        .build();

    let doc = Document::new(program);
    instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let payload = doc.variable("payload").expect("payload bound");
    assert_eq!(
        payload.object_get("status").unwrap().get_string(),
        Some("loaded")
    );
}

#[test]
fn one_shot_observer_fires_once() {
    let (instance, _) = instance_with_probe("one-shot");

    let doc = Document::new(ElementBuilder::new("hvml").build());
    let cid = instance.schedule_coroutine(doc, None);

    let fired = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&fired);
    instance
        .observe(
            cid,
            Variant::string("watched"),
            msg_type::change(),
            Some("grown"),
            true,
            Box::new(move |_instance, _co, _event| {
                sink.set(sink.get() + 1);
                Ok(())
            }),
        )
        .expect("observer registered");

    for _ in 0..2 {
        instance.post_event(Event::new(
            cid,
            Variant::string("watched"),
            msg_type::change(),
            Some("grown"),
            Variant::undefined(),
        ));
    }

    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(fired.get(), 1);
}

#[test]
fn coroutine_timer_posts_tick_events() {
    let (instance, _) = instance_with_probe("timer-tick");

    let doc = Document::new(ElementBuilder::new("hvml").build());
    let cid = instance.schedule_coroutine(doc, None);

    let ticks = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&ticks);
    instance
        .observe(
            cid,
            Variant::string("pulse"),
            msg_type::timer_tick(),
            Some("pulse"),
            true,
            Box::new(move |_instance, _co, _event| {
                sink.set(sink.get() + 1);
                Ok(())
            }),
        )
        .expect("observer registered");

    instance.add_coroutine_timer(cid, "pulse", Duration::from_millis(5));

    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(ticks.get(), 1);
}

#[test]
fn adapt_individually_keeps_the_shape() {
    let (instance, _) = instance_with_probe("adapt-map");

    // double every member of the source array
    let template = Expr::Binary(
        purc_interpreter::BinaryOp::Mul,
        Box::new(Expr::sym(SymbolVar::Question)),
        Box::new(Expr::int(2)),
    );
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("adapt")
                .attr("on", Expr::json("[1, 2, 3]"))
                .attr("with", template)
                .flag("individually")
                .build(),
        )
        .build();

    let cid = instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let result = instance.coroutine_result(cid).expect("result kept");
    assert_eq!(result.array_size().unwrap(), 3);
    assert_eq!(result.array_get(2).unwrap().numberize(), 6.0);
}

#[test]
fn erase_and_clear_report_counts() {
    let (instance, _) = instance_with_probe("erase-clear");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("rec"))
                .attr("at", Expr::str("_topmost"))
                .attr("with", Expr::json(r#"{"a": 1, "b": 2, "c": 3}"#))
                .build(),
        )
        .child(
            ElementBuilder::new("erase")
                .attr("on", Expr::named("rec"))
                .attr("at", Expr::str("attr.a attr.b"))
                .build(),
        )
        .build();

    let doc = Document::new(program);
    let cid = instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let result = instance.coroutine_result(cid).expect("result kept");
    assert_eq!(result.as_ulongint(), Some(2));
    assert_eq!(doc.variable("rec").unwrap().object_size().unwrap(), 1);
}

#[test]
fn silently_swallows_the_failure() {
    let (instance, hits) = instance_with_probe("silently");

    // the erase target is missing, but the frame is silent, so the walk
    // continues into the probe
    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("erase")
                .attr("on", Expr::named("missing"))
                .flag("silently")
                .build(),
        )
        .child(ElementBuilder::new("probe").build())
        .build();

    instance.schedule_coroutine(Document::new(program), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));
    assert_eq!(hits.get(), 1);
}

#[test]
fn reduce_binds_fold_statistics() {
    let (instance, _) = instance_with_probe("reduce");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("reduce")
                .attr("on", Expr::json("[2, 4, 6]"))
                .attr("as", Expr::str("stats"))
                .attr("at", Expr::str("_topmost"))
                .build(),
        )
        .build();

    let doc = Document::new(program);
    instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let stats = doc.variable("stats").expect("stats bound");
    assert_eq!(stats.object_get("count").unwrap().as_ulongint(), Some(3));
    assert_eq!(stats.object_get("avg").unwrap().numberize(), 4.0);
}

#[test]
fn bind_creates_a_lazy_expression_variable() {
    let (instance, _) = instance_with_probe("bind-lazy");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("base"))
                .attr("at", Expr::str("_topmost"))
                .attr("with", Expr::int(10))
                .build(),
        )
        .child(
            ElementBuilder::new("bind")
                .attr("as", Expr::str("doubled"))
                .attr("with", Expr::named("base").add(Expr::named("base")))
                .build(),
        )
        .build();

    let doc = Document::new(program);
    instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(RUN_TIMEOUT));

    let lazy = doc.variable("doubled").expect("doubled bound");
    let dynamic = lazy.dynamic_val().expect("expression variable");
    let value = (dynamic.getter)(&[]).expect("evaluates");
    assert_eq!(value.numberize(), 20.0);

    // rebinding the base changes what the expression sees
    doc.bind_variable("base", Variant::longint(7));
    let value = (dynamic.getter)(&[]).expect("evaluates");
    assert_eq!(value.numberize(), 14.0);
}
