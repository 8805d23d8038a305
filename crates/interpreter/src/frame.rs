//! Stack frames: one active VDOM element each.

use std::any::Any;
use std::rc::Rc;

use purc_variant::Variant;

use crate::vdom::Element;

/// The eight per-frame symbol variables, by their single-character names.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum SymbolVar {
    /// `?` — the current result
    Question = 0,
    /// `<` — the input value
    LessThan = 1,
    /// `@` — the target elements
    At = 2,
    /// `^` — the content value
    Caret = 3,
    /// `%` — the iteration counter
    Percent = 4,
    /// `!` — the local scope object
    Exclamation = 5,
    /// `:` — the error value
    Colon = 6,
    /// `=` — reserved
    Equal = 7,
}

impl SymbolVar {
    /// Number of symbol slots.
    pub const COUNT: usize = 8;

    /// Resolves a symbol from its character name.
    pub fn from_char(ch: char) -> Option<SymbolVar> {
        match ch {
            '?' => Some(SymbolVar::Question),
            '<' => Some(SymbolVar::LessThan),
            '@' => Some(SymbolVar::At),
            '^' => Some(SymbolVar::Caret),
            '%' => Some(SymbolVar::Percent),
            '!' => Some(SymbolVar::Exclamation),
            ':' => Some(SymbolVar::Colon),
            '=' => Some(SymbolVar::Equal),
            _ => None,
        }
    }
}

/// What the dispatcher does with a frame on its next visit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// The frame was just pushed; run the element's entry logic
    AfterPushed,
    /// Pick the next child to execute
    SelectChild,
    /// Restart the element body for another round
    Rerun,
    /// Decide whether to pop
    OnPopping,
}

/// One active VDOM element on a coroutine's stack.
pub struct StackFrame {
    /// Position in the VDOM; pseudo frames may borrow an element too
    pub pos: Option<Rc<Element>>,
    /// Opaque per-element context; dropped exactly once when the frame
    /// pops
    pub ctxt: Option<Box<dyn Any>>,
    /// Attribute values, evaluated into an object keyed by name
    pub attr_vars: Variant,
    symbols: [Variant; SymbolVar::COUNT],
    /// The result handed up by the most recently popped child
    pub result_from_child: Variant,
    /// Dispatcher state for this frame
    pub next_step: NextStep,
    /// Cursor over the attributes during evaluation
    pub eval_attr_pos: usize,
    /// Cursor over the children during selection
    pub child_cursor: usize,
    /// Errors in this frame convert to neutral values
    pub silently: bool,
    /// True for transient frames backing observer handlers
    pub pseudo: bool,
}

impl StackFrame {
    /// Creates a frame for `element`.
    pub fn new(element: Rc<Element>) -> StackFrame {
        let mut symbols: [Variant; SymbolVar::COUNT] =
            std::array::from_fn(|_| Variant::undefined());
        // the local scope starts as an empty object, the counter at zero
        symbols[SymbolVar::Exclamation as usize] = Variant::object();
        symbols[SymbolVar::Percent as usize] = Variant::ulongint(0);

        StackFrame {
            pos: Some(element),
            ctxt: None,
            attr_vars: Variant::object(),
            symbols,
            result_from_child: Variant::undefined(),
            next_step: NextStep::AfterPushed,
            eval_attr_pos: 0,
            child_cursor: 0,
            silently: false,
            pseudo: false,
        }
    }

    /// Creates a pseudo frame for an observer handler.
    pub fn new_pseudo(element: Rc<Element>) -> StackFrame {
        let mut frame = StackFrame::new(element);
        frame.pseudo = true;
        frame
    }

    /// Reads a symbol variable.
    pub fn symbol(&self, symbol: SymbolVar) -> Variant {
        self.symbols[symbol as usize].clone()
    }

    /// Writes a symbol variable.
    pub fn set_symbol(&mut self, symbol: SymbolVar, value: Variant) {
        self.symbols[symbol as usize] = value;
    }

    /// Sets `?`, the current result.
    pub fn set_question(&mut self, value: Variant) {
        self.set_symbol(SymbolVar::Question, value);
    }

    /// Sets `<`, the input value.
    pub fn set_input(&mut self, value: Variant) {
        self.set_symbol(SymbolVar::LessThan, value);
    }

    /// Bumps `%`, the iteration counter.
    pub fn increment_percent(&mut self) {
        let next = self
            .symbol(SymbolVar::Percent)
            .as_ulongint()
            .unwrap_or(0)
            .saturating_add(1);
        self.set_symbol(SymbolVar::Percent, Variant::ulongint(next));
    }

    /// The evaluated value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<Variant> {
        self.attr_vars.object_get(name)
    }

    /// Mutable access to the frame context downcast to its element type.
    pub fn ctxt_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.ctxt.as_mut()?.downcast_mut::<T>()
    }

    /// Shared access to the frame context downcast to its element type.
    pub fn ctxt_ref<T: 'static>(&self) -> Option<&T> {
        self.ctxt.as_ref()?.downcast_ref::<T>()
    }

    /// The element this frame executes.
    pub fn element(&self) -> Option<Rc<Element>> {
        self.pos.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::ElementBuilder;

    #[test]
    fn test_symbol_defaults() {
        let frame = StackFrame::new(ElementBuilder::new("div").build());
        assert!(frame.symbol(SymbolVar::Question).is_undefined());
        assert!(frame.symbol(SymbolVar::Exclamation).is_object());
        assert_eq!(frame.symbol(SymbolVar::Percent).as_ulongint(), Some(0));
    }

    #[test]
    fn test_percent_increments() {
        let mut frame = StackFrame::new(ElementBuilder::new("iterate").build());
        frame.increment_percent();
        frame.increment_percent();
        assert_eq!(frame.symbol(SymbolVar::Percent).as_ulongint(), Some(2));
    }

    #[test]
    fn test_symbol_chars() {
        assert_eq!(SymbolVar::from_char('?'), Some(SymbolVar::Question));
        assert_eq!(SymbolVar::from_char('%'), Some(SymbolVar::Percent));
        assert_eq!(SymbolVar::from_char('x'), None);
    }

    #[test]
    fn test_ctxt_downcast() {
        struct Ctxt {
            rounds: u32,
        }
        let mut frame = StackFrame::new(ElementBuilder::new("iterate").build());
        frame.ctxt = Some(Box::new(Ctxt { rounds: 1 }));
        frame.ctxt_mut::<Ctxt>().unwrap().rounds += 1;
        assert_eq!(frame.ctxt_ref::<Ctxt>().unwrap().rounds, 2);
    }
}
