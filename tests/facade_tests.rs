//! Smoke tests of the `purc_rs` facade: the whole runtime wired through
//! the re-exported surface.

use std::rc::Rc;
use std::time::Duration;

use purc_rs::interpreter::{Document, ElementBuilder, Expr, Instance};
use purc_rs::Variant;

#[test]
fn run_a_program_through_the_facade() {
    let instance = Instance::new("cn.fmsoft.hvml.sample", "facade").expect("instance");

    let program = ElementBuilder::new("hvml")
        .child(
            ElementBuilder::new("init")
                .attr("as", Expr::str("greeting"))
                .attr("at", Expr::str("_topmost"))
                .attr("with", Expr::str("hello"))
                .build(),
        )
        .build();

    let doc = Document::new(program);
    instance.schedule_coroutine(Rc::clone(&doc), None);
    assert!(instance.run_until_done(Duration::from_secs(5)));

    assert_eq!(
        doc.variable("greeting").expect("bound").get_string(),
        Some("hello")
    );
}

#[test]
fn variant_and_atom_surface() {
    let value = Variant::from_json_str(r#"{"k": [1, 2]}"#).expect("parsed");
    assert_eq!(value.object_get("k").unwrap().array_size().unwrap(), 2);

    let atom = purc_rs::Atom::from_str("facade-atom");
    assert_eq!(purc_rs::core::atom::to_string(atom), Some("facade-atom"));
}
