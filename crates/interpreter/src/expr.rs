//! Attribute and content expressions.
//!
//! The eJSON/VCM parser is outside this crate; expressions arrive as
//! trees. Evaluation resolves symbol and named references through an
//! [`EvalScope`], producing variants. This is the surface `while`,
//! `onlyif`, `with` and attribute values are written in.

use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

use crate::frame::SymbolVar;

/// Binary operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// String concatenation
    Concat,
}

/// Unary operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
}

/// An expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A JSON-shaped literal
    Literal(serde_json::Value),
    /// A symbol reference (`$?`, `$%`, ...)
    Symbol(SymbolVar),
    /// A named variable reference (`$x`)
    Named(String),
    /// Member access (`$x.field`)
    Member(Box<Expr>, String),
    /// Index access (`$x[3]`)
    Index(Box<Expr>, usize),
    /// A unary operation
    Unary(UnaryOp, Box<Expr>),
    /// A binary operation
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// A string literal.
    pub fn str(s: &str) -> Expr {
        Expr::Literal(serde_json::Value::String(s.to_string()))
    }

    /// An integer literal.
    pub fn int(n: i64) -> Expr {
        Expr::Literal(serde_json::Value::Number(n.into()))
    }

    /// A number literal.
    pub fn num(n: f64) -> Expr {
        Expr::Literal(
            serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        )
    }

    /// A boolean literal.
    pub fn bool(b: bool) -> Expr {
        Expr::Literal(serde_json::Value::Bool(b))
    }

    /// A literal parsed from JSON text.
    pub fn json(text: &str) -> Expr {
        Expr::Literal(serde_json::from_str(text).unwrap_or(serde_json::Value::Null))
    }

    /// A symbol reference.
    pub fn sym(symbol: SymbolVar) -> Expr {
        Expr::Symbol(symbol)
    }

    /// A named variable reference.
    pub fn named(name: &str) -> Expr {
        Expr::Named(name.to_string())
    }

    /// Member access on this expression.
    pub fn member(self, field: &str) -> Expr {
        Expr::Member(Box::new(self), field.to_string())
    }

    /// Index access on this expression.
    pub fn index(self, index: usize) -> Expr {
        Expr::Index(Box::new(self), index)
    }

    /// `self < other`
    pub fn lt(self, other: Expr) -> Expr {
        Expr::Binary(BinaryOp::Lt, Box::new(self), Box::new(other))
    }

    /// `self == other`
    pub fn eq(self, other: Expr) -> Expr {
        Expr::Binary(BinaryOp::Eq, Box::new(self), Box::new(other))
    }

    /// `self > other`
    pub fn gt(self, other: Expr) -> Expr {
        Expr::Binary(BinaryOp::Gt, Box::new(self), Box::new(other))
    }

    /// `self + other`
    pub fn add(self, other: Expr) -> Expr {
        Expr::Binary(BinaryOp::Add, Box::new(self), Box::new(other))
    }

    /// `!self`
    pub fn not(self) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }

    /// Evaluates the expression against `scope`.
    pub fn eval(&self, scope: &dyn EvalScope) -> CoreResult<Variant> {
        match self {
            Expr::Literal(value) => Ok(Variant::from_json_value(value)),
            Expr::Symbol(symbol) => Ok(scope.symbol(*symbol)),
            Expr::Named(name) => scope
                .named(name)
                .ok_or_else(|| CoreError::bad_name(name.clone())),
            Expr::Member(base, field) => {
                let base = base.eval(scope)?;
                base.object_get(field).ok_or_else(|| {
                    CoreError::entity_not_found(format!("member '{field}'"))
                })
            }
            Expr::Index(base, index) => {
                let base = base.eval(scope)?;
                base.linear_get(*index).ok_or_else(|| {
                    CoreError::entity_not_found(format!("index {index}"))
                })
            }
            Expr::Unary(op, operand) => {
                let operand = operand.eval(scope)?;
                Ok(match op {
                    UnaryOp::Not => Variant::boolean(!operand.booleanize()),
                    UnaryOp::Neg => Variant::number(-operand.numberize()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                // short-circuit forms first
                match op {
                    BinaryOp::And => {
                        let lhs = lhs.eval(scope)?;
                        if !lhs.booleanize() {
                            return Ok(Variant::boolean(false));
                        }
                        let rhs = rhs.eval(scope)?;
                        return Ok(Variant::boolean(rhs.booleanize()));
                    }
                    BinaryOp::Or => {
                        let lhs = lhs.eval(scope)?;
                        if lhs.booleanize() {
                            return Ok(Variant::boolean(true));
                        }
                        let rhs = rhs.eval(scope)?;
                        return Ok(Variant::boolean(rhs.booleanize()));
                    }
                    _ => {}
                }

                let lhs = lhs.eval(scope)?;
                let rhs = rhs.eval(scope)?;
                Ok(match op {
                    BinaryOp::Lt => Variant::boolean(lhs.numberize() < rhs.numberize()),
                    BinaryOp::Le => Variant::boolean(lhs.numberize() <= rhs.numberize()),
                    BinaryOp::Gt => Variant::boolean(lhs.numberize() > rhs.numberize()),
                    BinaryOp::Ge => Variant::boolean(lhs.numberize() >= rhs.numberize()),
                    BinaryOp::Eq => Variant::boolean(lhs.is_equal_to(&rhs)),
                    BinaryOp::Ne => Variant::boolean(!lhs.is_equal_to(&rhs)),
                    BinaryOp::Add => Variant::number(lhs.numberize() + rhs.numberize()),
                    BinaryOp::Sub => Variant::number(lhs.numberize() - rhs.numberize()),
                    BinaryOp::Mul => Variant::number(lhs.numberize() * rhs.numberize()),
                    BinaryOp::Div => {
                        let divisor = rhs.numberize();
                        if divisor == 0.0 {
                            return Err(CoreError::invalid_value("division by zero"));
                        }
                        Variant::number(lhs.numberize() / divisor)
                    }
                    BinaryOp::Concat => {
                        let mut out = String::new();
                        out.push_str(lhs.get_string().unwrap_or_default());
                        out.push_str(rhs.get_string().unwrap_or_default());
                        Variant::string(&out)
                    }
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                })
            }
        }
    }
}

/// Resolution of symbol and named references during evaluation.
pub trait EvalScope {
    /// The value of a per-frame symbol variable.
    fn symbol(&self, symbol: SymbolVar) -> Variant;

    /// The value of a named variable, walking the scope chain.
    fn named(&self, name: &str) -> Option<Variant>;
}

/// A fixed scope for detached evaluation: one symbol set and a named map.
pub struct StaticScope {
    /// Values of the eight symbol slots
    pub symbols: [Variant; SymbolVar::COUNT],
    /// Named bindings
    pub names: Vec<(String, Variant)>,
}

impl Default for StaticScope {
    fn default() -> Self {
        Self {
            symbols: std::array::from_fn(|_| Variant::undefined()),
            names: Vec::new(),
        }
    }
}

impl EvalScope for StaticScope {
    fn symbol(&self, symbol: SymbolVar) -> Variant {
        self.symbols[symbol as usize].clone()
    }

    fn named(&self, name: &str) -> Option<Variant> {
        self.names
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_shapes() {
        let scope = StaticScope::default();
        let value = Expr::json(r#"[1, 2, 3]"#).eval(&scope).unwrap();
        assert_eq!(value.array_size().unwrap(), 3);

        assert_eq!(
            Expr::str("hi").eval(&scope).unwrap().get_string(),
            Some("hi")
        );
        assert_eq!(Expr::int(5).eval(&scope).unwrap().as_longint(), Some(5));
    }

    #[test]
    fn test_symbol_and_named() {
        let mut scope = StaticScope::default();
        scope.symbols[SymbolVar::Percent as usize] = Variant::ulongint(2);
        scope.names.push(("x".to_string(), Variant::longint(10)));

        let cond = Expr::sym(SymbolVar::Percent).lt(Expr::int(3));
        assert_eq!(cond.eval(&scope).unwrap().as_boolean(), Some(true));

        let named = Expr::named("x").gt(Expr::int(5));
        assert_eq!(named.eval(&scope).unwrap().as_boolean(), Some(true));

        assert!(matches!(
            Expr::named("missing").eval(&scope),
            Err(CoreError::BadName { .. })
        ));
    }

    #[test]
    fn test_member_and_index() {
        let mut scope = StaticScope::default();
        scope.names.push((
            "rec".to_string(),
            Variant::from_json_str(r#"{"items": [10, 20]}"#).unwrap(),
        ));

        let expr = Expr::named("rec").member("items").index(1);
        assert_eq!(expr.eval(&scope).unwrap().as_longint(), Some(20));
    }

    #[test]
    fn test_short_circuit() {
        let scope = StaticScope::default();
        // rhs would fail on a missing name; && must not evaluate it
        let expr = Expr::bool(false)
            .lt(Expr::int(0)) // false
            .eq(Expr::bool(true));
        assert_eq!(expr.eval(&scope).unwrap().as_boolean(), Some(false));

        let guarded = Expr::Binary(
            BinaryOp::And,
            Box::new(Expr::bool(false)),
            Box::new(Expr::named("missing")),
        );
        assert_eq!(guarded.eval(&scope).unwrap().as_boolean(), Some(false));
    }

    #[test]
    fn test_division_by_zero() {
        let scope = StaticScope::default();
        let expr = Expr::Binary(
            BinaryOp::Div,
            Box::new(Expr::int(1)),
            Box::new(Expr::int(0)),
        );
        assert!(expr.eval(&scope).is_err());
    }
}
