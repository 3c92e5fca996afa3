//! Expression trees for simple formulas.
//!
//! Text is parsed into an [`Expression`] which can then be evaluated against
//! a set of [`Bindings`], differentiated symbolically, compared with other
//! expressions and rendered back into (re-parseable) text.
//!
//! ```rust
//! use exprtree::{Bindings, Expression};
//!
//! let expr: Expression = "x ** 3".parse()?;
//!
//! let derivative = exprtree::differentiate(&expr, "x")?;
//! let tidied = exprtree::evaluate(&derivative, &Bindings::new())?;
//! assert_eq!(tidied.to_string(), "3 * x ** 2");
//!
//! let at_two = exprtree::evaluate(&tidied, &Bindings::new().with("x", 2.0))?;
//! assert_eq!(at_two, Expression::constant(12));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod classify;
mod equality;
mod expr;
pub mod ops;
mod parse;
mod proptests;
mod render;

pub use equality::equals;
pub use expr::{BinaryOperation, Builtin, Expression, Value};
pub use ops::{
    differentiate, evaluate, Bindings, Builtins, Context, EvaluationError,
};
pub use parse::{parse, tokenize, ParseError, Token, TokenKind};
pub use render::render;
