//! Binding targets along the scope chain.
//!
//! `init`, `bind` and `reduce` choose where a name lands with the `at`
//! attribute: the nearest enclosing element scope by default, a named
//! anchor (`_last`, `_nexttolast`, `_topmost`), an ancestor `#id`, the
//! document, or — `temporarily` — the parent frame's `$!` object.

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::coroutine::Coroutine;
use crate::frame::SymbolVar;

/// Where a binding lands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// The scope of the element backing the given frame
    FrameScope(usize),
    /// The document variables
    Document,
    /// The parent frame's `$!` object
    LocalTemp(usize),
}

/// Resolves the `at` selector relative to `frame_idx`.
pub fn resolve_bind_target(
    co: &Coroutine,
    frame_idx: usize,
    at: Option<&str>,
    temporarily: bool,
) -> CoreResult<BindTarget> {
    let parent_idx = frame_idx.checked_sub(1);

    if temporarily {
        let idx = parent_idx.unwrap_or(frame_idx);
        return Ok(BindTarget::LocalTemp(idx));
    }

    let Some(at) = at else {
        return Ok(match parent_idx {
            Some(idx) => BindTarget::FrameScope(idx),
            None => BindTarget::Document,
        });
    };

    match at {
        "_last" => Ok(match parent_idx {
            Some(idx) => BindTarget::FrameScope(idx),
            None => BindTarget::Document,
        }),
        "_nexttolast" => Ok(match parent_idx.and_then(|idx| idx.checked_sub(1)) {
            Some(idx) => BindTarget::FrameScope(idx),
            None => BindTarget::Document,
        }),
        "_topmost" => Ok(BindTarget::Document),
        selector if selector.starts_with('#') => {
            let wanted = &selector[1..];
            let found = co.stack.find_enclosing(frame_idx, |element| {
                element.literal_id().as_deref() == Some(wanted)
            });
            match found {
                Some(idx) => Ok(BindTarget::FrameScope(idx)),
                None => Err(CoreError::entity_not_found(format!(
                    "no enclosing element '{selector}'"
                ))),
            }
        }
        other => Err(CoreError::invalid_value(format!(
            "bad scope selector '{other}'"
        ))),
    }
}

/// Binds `name` to `value` at the resolved target.
pub fn bind_value(
    co: &mut Coroutine,
    frame_idx: usize,
    name: &str,
    value: Variant,
    at: Option<&str>,
    temporarily: bool,
) -> CoreResult<()> {
    if name.is_empty() || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(CoreError::bad_name(name));
    }

    match resolve_bind_target(co, frame_idx, at, temporarily)? {
        BindTarget::FrameScope(idx) => {
            let element_id = co
                .stack
                .frame(idx)
                .and_then(|frame| frame.pos.as_ref().map(|el| el.id))
                .ok_or_else(|| CoreError::entity_not_found("scope frame"))?;
            co.bind_scope_variable(element_id, name, value);
            Ok(())
        }
        BindTarget::Document => {
            co.doc.bind_variable(name, value);
            Ok(())
        }
        BindTarget::LocalTemp(idx) => {
            let frame = co
                .stack
                .frame(idx)
                .ok_or_else(|| CoreError::entity_not_found("local scope frame"))?;
            let local = frame.symbol(SymbolVar::Exclamation);
            local.object_set(name, value)?;
            Ok(())
        }
    }
}
