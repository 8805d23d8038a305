//! Per-element operations and their dispatch table.
//!
//! Every HVML element maps to an [`ElementOps`] implementation with four
//! entry points the dispatcher calls: `after_pushed` when the frame is
//! created, `select_child` to pick the next child, `rerun` to restart
//! the body for another round, and `on_popping` to decide whether the
//! frame pops. Unknown and foreign tags fall back to [`GenericOps`].

use std::rc::Rc;

use hashbrown::HashMap;
use purc_core::atom::Atom;
use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::coroutine::Coroutine;
use crate::expr::{EvalScope, Expr};
use crate::frame::{StackFrame, SymbolVar};
use crate::instance::Instance;
use crate::vdom::{Element, Node};

/// The `init` element
pub mod init;
/// The `iterate` element
pub mod iterate;
/// The `test` element
pub mod test;
/// The `match` and `differ` elements
pub mod matching;
/// The `catch` element
pub mod catch;
/// The `back` element
pub mod back;
/// The `return` element
pub mod ret;
/// The `request` element
pub mod request;
/// The `reduce` element
pub mod reduce;
/// The `erase` element
pub mod erase;
/// The `clear` element
pub mod clear;
/// The `bind` element
pub mod bind;
/// The `adapt` element
pub mod adapt;
/// The `head` element
pub mod head;
/// The `body` element
pub mod body;

/// The four entry points of one element's semantics.
pub trait ElementOps {
    /// Runs when the frame is pushed. `Ok(true)` proceeds to child
    /// selection, `Ok(false)` goes straight to popping.
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool>;

    /// Picks the next child to execute, or `None` when the body is done.
    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>>;

    /// Decides whether to restart the body. `Ok(true)` re-enters child
    /// selection with a reset cursor.
    fn rerun(&self, ctx: &mut ElementCtx) -> CoreResult<bool>;

    /// Decides whether the frame pops. `Ok(false)` leads to `rerun`.
    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool>;
}

/// Everything an element operation can reach: the owning instance, the
/// coroutine, and the frame it runs in.
pub struct ElementCtx<'a> {
    /// The owning instance
    pub instance: &'a Instance,
    /// The coroutine being ticked
    pub co: &'a mut Coroutine,
    /// Index of the frame the ops run for
    pub frame_idx: usize,
}

impl<'a> ElementCtx<'a> {
    /// The frame the ops run for.
    pub fn frame(&self) -> &StackFrame {
        self.co.stack.frame(self.frame_idx).expect("frame vanished")
    }

    /// The frame, mutable.
    pub fn frame_mut(&mut self) -> &mut StackFrame {
        self.co
            .stack
            .frame_mut(self.frame_idx)
            .expect("frame vanished")
    }

    /// The element backing the frame.
    pub fn element(&self) -> Rc<Element> {
        self.frame().element().expect("frame has no element")
    }

    /// Index of the parent frame.
    pub fn parent_idx(&self) -> Option<usize> {
        self.frame_idx.checked_sub(1)
    }

    /// The parent frame, mutable.
    pub fn parent_frame_mut(&mut self) -> Option<&mut StackFrame> {
        let idx = self.parent_idx()?;
        self.co.stack.frame_mut(idx)
    }

    /// Evaluates an expression in this frame's scope.
    pub fn eval_expr(&self, expr: &Expr) -> CoreResult<Variant> {
        let scope = FrameScope {
            instance: self.instance,
            co: self.co,
            frame_idx: self.frame_idx,
        };
        expr.eval(&scope)
    }

    /// Evaluates the attribute `name`: `Ok(None)` when absent, a true
    /// boolean for a bare attribute.
    pub fn eval_attr(&self, name: &str) -> CoreResult<Option<Variant>> {
        let element = self.element();
        match element.attr(name) {
            None => Ok(None),
            Some(attr) => match &attr.value {
                None => Ok(Some(Variant::boolean(true))),
                Some(expr) => Ok(Some(self.eval_expr(expr)?)),
            },
        }
    }

    /// Evaluates the attribute `name` and requires a string value.
    pub fn attr_string(&self, name: &str) -> CoreResult<Option<String>> {
        match self.eval_attr(name)? {
            None => Ok(None),
            Some(value) => Ok(Some(value.require_string()?.to_string())),
        }
    }

    /// True if any of the listed attribute spellings is present.
    pub fn has_flag(&self, spellings: &[&str]) -> bool {
        let element = self.element();
        spellings.iter().any(|name| element.has_attr(name))
    }

    /// Evaluates the element's content (text or expression), if any.
    pub fn eval_content(&self) -> CoreResult<Option<Variant>> {
        let element = self.element();
        if let Some(expr) = element.content_expr() {
            return Ok(Some(self.eval_expr(expr)?));
        }
        if let Some(text) = element.text_content() {
            return Ok(Some(Variant::string(text)));
        }
        Ok(None)
    }

    /// Evaluates all attributes into the frame's `attr_vars` object and
    /// applies the `silently` adverb. Also caches the content into `^`.
    pub fn eval_attributes(&mut self) -> CoreResult<()> {
        let element = self.element();

        // adverbs first, so a failing attribute can still be swallowed
        if self.has_flag(&["silently", "sil"]) {
            self.frame_mut().silently = true;
        }

        while self.frame().eval_attr_pos < element.attrs.len() {
            let pos = self.frame().eval_attr_pos;
            let attr = &element.attrs[pos];
            let value = match &attr.value {
                None => Variant::boolean(true),
                Some(expr) => self.eval_expr(expr)?,
            };
            let name = attr.name.clone();
            let frame = self.frame_mut();
            frame.attr_vars.object_set(&name, value)?;
            frame.eval_attr_pos += 1;
        }

        if let Some(content) = self.eval_content()? {
            self.frame_mut().set_symbol(SymbolVar::Caret, content);
        }

        Ok(())
    }

    /// Sets `?` on this frame.
    pub fn set_question(&mut self, value: Variant) {
        self.frame_mut().set_question(value);
    }

    /// The exception pending on the coroutine, if any.
    pub fn has_exception(&self) -> bool {
        self.co.stack.except.is_some()
    }
}

struct FrameScope<'b> {
    instance: &'b Instance,
    co: &'b Coroutine,
    frame_idx: usize,
}

impl EvalScope for FrameScope<'_> {
    fn symbol(&self, symbol: SymbolVar) -> Variant {
        self.co
            .stack
            .frame(self.frame_idx)
            .map(|frame| frame.symbol(symbol))
            .unwrap_or_else(Variant::undefined)
    }

    fn named(&self, name: &str) -> Option<Variant> {
        self.co
            .find_named(self.frame_idx, name)
            .or_else(|| self.instance.runner_variable(name))
    }
}

/// Walks the element's children from the frame cursor to the next child
/// element.
pub fn default_select_child(ctx: &mut ElementCtx) -> Option<Rc<Element>> {
    let element = ctx.element();
    let frame = ctx.frame_mut();
    while frame.child_cursor < element.children.len() {
        let idx = frame.child_cursor;
        frame.child_cursor += 1;
        if let Node::Element(child) = &element.children[idx] {
            return Some(Rc::clone(child));
        }
    }
    None
}

/// Fallback semantics for foreign and unknown tags: evaluate attributes
/// and content, run the children in order, adopt the last child result.
pub struct GenericOps;

impl ElementOps for GenericOps {
    fn after_pushed(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        if ctx.has_exception() {
            return Ok(false);
        }

        ctx.eval_attributes()?;
        let content = ctx.frame().symbol(SymbolVar::Caret);
        if !content.is_undefined() {
            ctx.set_question(content);
        }
        Ok(true)
    }

    fn select_child(&self, ctx: &mut ElementCtx) -> CoreResult<Option<Rc<Element>>> {
        // children keep being selected while an exception unwinds, so a
        // catch sibling can intercept it
        Ok(default_select_child(ctx))
    }

    fn rerun(&self, _ctx: &mut ElementCtx) -> CoreResult<bool> {
        Ok(true)
    }

    fn on_popping(&self, ctx: &mut ElementCtx) -> CoreResult<bool> {
        // a container's result is its last child's, unless it set its own
        let child_result = ctx.frame().result_from_child.clone();
        if ctx.frame().symbol(SymbolVar::Question).is_undefined() && !child_result.is_undefined() {
            ctx.set_question(child_result);
        }
        Ok(true)
    }
}

/// The dispatch table from tag atoms to element ops.
pub struct HandlerTable {
    map: HashMap<Atom, Rc<dyn ElementOps>>,
    generic: Rc<dyn ElementOps>,
}

impl HandlerTable {
    /// Builds the table with every built-in element registered.
    pub fn with_builtins() -> HandlerTable {
        let mut table = HandlerTable {
            map: HashMap::new(),
            generic: Rc::new(GenericOps),
        };

        table.register("init", Rc::new(init::InitOps));
        table.register("iterate", Rc::new(iterate::IterateOps));
        table.register("test", Rc::new(test::TestOps));
        table.register("match", Rc::new(matching::MatchOps));
        table.register("differ", Rc::new(matching::DifferOps));
        table.register("catch", Rc::new(catch::CatchOps));
        table.register("back", Rc::new(back::BackOps));
        table.register("return", Rc::new(ret::ReturnOps));
        table.register("request", Rc::new(request::RequestOps));
        table.register("reduce", Rc::new(reduce::ReduceOps));
        table.register("erase", Rc::new(erase::EraseOps));
        table.register("clear", Rc::new(clear::ClearOps));
        table.register("bind", Rc::new(bind::BindOps));
        table.register("adapt", Rc::new(adapt::AdaptOps));
        table.register("head", Rc::new(head::HeadOps));
        table.register("body", Rc::new(body::BodyOps));

        table
    }

    /// Registers ops for a tag, replacing any previous registration.
    pub fn register(&mut self, tag: &str, ops: Rc<dyn ElementOps>) {
        let atom = Atom::from_string(purc_core::BUCKET_DEFAULT, &tag.to_ascii_lowercase());
        self.map.insert(atom, ops);
    }

    /// The ops for a tag; unknown tags get the generic fallback.
    pub fn ops_for(&self, tag: Atom) -> Rc<dyn ElementOps> {
        self.map
            .get(&tag)
            .cloned()
            .unwrap_or_else(|| Rc::clone(&self.generic))
    }
}

/// The neutral value a `silently` frame reports in place of an error.
pub fn neutral_value_for(error: &CoreError) -> Variant {
    match error {
        CoreError::NotExists { .. } | CoreError::EntityNotFound { .. } => Variant::null(),
        _ => Variant::undefined(),
    }
}
