//! `<erase>`: removes members from a container or a native entity.
//!
//! `on` names the target. With `at` the selection is a space-separated
//! list of `attr.name` keys (objects) or indices (arrays and sets);
//! without `at` everything goes. Native targets delegate to their
//! eraser op. The result is the number of members erased.

use std::rc::Rc;

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::elements::{ElementCtx, ElementOps};
use crate::vdom::Element;

/// Selections parsed from `at`: object keys and container indices.
pub(crate) fn parse_selection(at: &str) -> (Vec<String>, Vec<usize>) {
    let mut keys = Vec::new();
    let mut indices = Vec::new();
    for word in at.split_whitespace() {
        if let Some(name) = word.strip_prefix("attr.") {
            keys.push(name.to_string());
        } else if let Ok(index) = word.parse::<usize>() {
            indices.push(index);
        }
    }
    // erase from the back so indices stay valid
    indices.sort_unstable_by(|a, b| b.cmp(a));
    (keys, indices)
}

fn erase_from_container(target: &Variant, at: Option<&str>) -> CoreResult<u64> {
    let Some(at) = at else {
        return Ok(target.container_clear()? as u64);
    };

    let (keys, indices) = parse_selection(at);
    let mut erased: u64 = 0;

    if target.is_object() {
        for key in &keys {
            if target.object_remove(key)?.is_some() {
                erased += 1;
            }
        }
        return Ok(erased);
    }

    if target.is_array() {
        for index in indices {
            if target.array_remove(index).is_ok() {
                erased += 1;
            }
        }
        return Ok(erased);
    }

    if target.is_set() {
        for index in indices {
            if let Some(member) = target.set_get(index) {
                if target.set_remove(&member)? {
                    erased += 1;
                }
            }
        }
        return Ok(erased);
    }

    Err(CoreError::wrong_data_type(
        "container",
        target.variant_type().as_str(),
    ))
}

/// Ops for `<erase>`.
pub struct EraseOps;

impl ElementOps for EraseOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }
        ctx.eval_attributes()?;

        let target = ctx
            .eval_attr("on")?
            .ok_or_else(|| CoreError::argument_missed("on"))?;

        if target.get_string().is_some_and(|s| s.starts_with('#') || s.starts_with('.')) {
            return Err(CoreError::not_supported(
                "document selectors are not served by this runtime",
            ));
        }

        let silently = ctx.frame().silently;
        let count = if let Some(native) = target.native_val() {
            let result = native
                .ops
                .eraser(native.entity.as_ref(), silently)
                .ok_or_else(|| CoreError::not_supported("entity has no eraser"))?;
            ctx.set_question(result);
            return Ok(false);
        } else {
            let at = ctx.attr_string("at")?;
            erase_from_container(&target, at.as_deref())?
        };

        ctx.set_question(Variant::ulongint(count));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        let (keys, indices) = parse_selection("attr.name 3 attr.age 1");
        assert_eq!(keys, ["name", "age"]);
        assert_eq!(indices, [3, 1]);
    }

    #[test]
    fn test_erase_object_keys() {
        let target = Variant::object_from([
            ("a".to_string(), Variant::longint(1)),
            ("b".to_string(), Variant::longint(2)),
        ]);
        let count = erase_from_container(&target, Some("attr.a attr.missing")).unwrap();
        assert_eq!(count, 1);
        assert_eq!(target.object_size().unwrap(), 1);
    }

    #[test]
    fn test_erase_array_indices_back_to_front() {
        let target = Variant::array(vec![
            Variant::longint(0),
            Variant::longint(1),
            Variant::longint(2),
            Variant::longint(3),
        ]);
        let count = erase_from_container(&target, Some("1 3")).unwrap();
        assert_eq!(count, 2);
        assert_eq!(target.array_size().unwrap(), 2);
        assert_eq!(target.array_get(1).unwrap().as_longint(), Some(2));
    }

    #[test]
    fn test_erase_all_without_at() {
        let target = Variant::array(vec![Variant::longint(0), Variant::longint(1)]);
        assert_eq!(erase_from_container(&target, None).unwrap(), 2);
        assert_eq!(target.array_size().unwrap(), 0);
    }
}
