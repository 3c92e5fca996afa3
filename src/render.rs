//! Turning an [`Expression`] back into text.

use crate::{
    classify,
    expr::{BinaryOperation, Expression},
};
use std::fmt::{self, Display, Formatter};

/// Render an expression as infix text.
///
/// Additive and multiplicative identities are skipped (`0 + x` is written
/// as `x`, `x * 1` as `x`, and so on) and only the parentheses needed to
/// preserve the tree's grouping are emitted. The output can be fed back to
/// [`crate::parse()`].
pub fn render(expr: &Expression) -> String { rendered(expr).text }

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

/// The text for a sub-expression, plus whichever operator ended up on top
/// once identities were skipped (rendering `(a + b) * 1` exposes the `+`).
#[derive(Debug, Clone, PartialEq)]
struct Rendered {
    text: String,
    shape: Shape,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Shape {
    /// Something which never needs parentheses (a number, a name, a function
    /// call, or anything with a leading `-`).
    Atom,
    Binary(BinaryOperation),
    /// `-(...)` wrapped around a binary operation.
    Negated(BinaryOperation),
}

impl Rendered {
    fn atom<S: Into<String>>(text: S) -> Self {
        Rendered {
            text: text.into(),
            shape: Shape::Atom,
        }
    }

    fn is(&self, number: i64) -> bool {
        classify::is_integer(&self.text, number)
    }

    fn negated(self) -> Rendered {
        match self.shape {
            Shape::Binary(op) => Rendered {
                text: format!("-({})", self.text),
                shape: Shape::Negated(op),
            },
            Shape::Negated(op) => {
                let inner = self
                    .text
                    .strip_prefix("-(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .unwrap_or(&self.text);

                Rendered {
                    text: inner.to_string(),
                    shape: Shape::Binary(op),
                }
            },
            Shape::Atom => match self.text.strip_prefix('-') {
                Some(positive) => Rendered::atom(positive),
                None => Rendered::atom(format!("-{}", self.text)),
            },
        }
    }

    fn precedence(&self) -> Option<u8> {
        match self.shape {
            Shape::Binary(op) => Some(op.precedence()),
            Shape::Atom | Shape::Negated(_) => None,
        }
    }
}

fn rendered(expr: &Expression) -> Rendered {
    match expr {
        Expression::Constant(value) => Rendered::atom(value.to_string()),
        Expression::Variable(name) => Rendered::atom(name.as_str()),
        Expression::Function { function, argument } => {
            Rendered::atom(format!("{}({})", function, argument))
        },
        Expression::Binary { left, right, op } => {
            binary(rendered(left), rendered(right), *op)
        },
    }
}

fn binary(left: Rendered, right: Rendered, op: BinaryOperation) -> Rendered {
    use BinaryOperation::*;

    if left.is(0) && right.is(0) {
        return Rendered::atom("0");
    }

    if left.is(0) {
        return match op {
            Plus => right,
            Minus => right.negated(),
            Times | Divide | Power => Rendered::atom("0"),
        };
    }

    if right.is(0) {
        match op {
            Plus | Minus => return left,
            Times => return Rendered::atom("0"),
            Power => return Rendered::atom("1"),
            Divide => {},
        }
    }

    if left.is(1) {
        match op {
            Times => return right,
            Power => return Rendered::atom("1"),
            _ => {},
        }
    }

    if right.is(1) && matches!(op, Times | Divide | Power) {
        return left;
    }

    if left.is(-1) && op == Times {
        return right.negated();
    }

    if right.is(-1) && matches!(op, Times | Divide) {
        return left.negated();
    }

    let left_text = if left_needs_parens(&left, op) {
        format!("({})", left.text)
    } else {
        left.text
    };
    let right_text = if right_needs_parens(&right, op) {
        format!("({})", right.text)
    } else {
        right.text
    };

    Rendered {
        text: format!("{} {} {}", left_text, op, right_text),
        shape: Shape::Binary(op),
    }
}

fn left_needs_parens(left: &Rendered, parent: BinaryOperation) -> bool {
    match left.precedence() {
        Some(precedence) => precedence < parent.precedence(),
        None => false,
    }
}

fn right_needs_parens(right: &Rendered, parent: BinaryOperation) -> bool {
    match right.shape {
        Shape::Binary(child) => {
            let regroupable = child == parent && parent.is_associative();

            // Only `a + (b + c)` and `a * (b * c)` drop their parentheses.
            // A right-hand `-` or `/` keeps them (`a + (b - c)`), even
            // though the parent's precedence alone wouldn't ask for it.
            if child.precedence() < parent.precedence()
                || (child.precedence() == parent.precedence() && !regroupable)
            {
                return true;
            }

            // `x + (-y + z)` must not become `x + -y + z`, which re-parses
            // with `-y` as the right operand of the first `+`
            regroupable
                && parent == BinaryOperation::Plus
                && classify::is_sign_negative(&right.text)
        },
        Shape::Atom | Shape::Negated(_) => {
            matches!(parent, BinaryOperation::Plus | BinaryOperation::Minus)
                && classify::is_sign_negative(&right.text)
        },
    }
}
