//! [`Expression`] operations.

use crate::expr::{toggle_sign, BinaryOperation, Builtin, Expression, Value};
use log::debug;
use smol_str::SmolStr;
use std::{
    collections::HashMap,
    convert::TryFrom,
    iter::FromIterator,
};
use thiserror::Error;

/// Contextual information used when evaluating an [`Expression`].
pub trait Context {
    fn evaluate_function(
        &self,
        function: Builtin,
        argument: f64,
    ) -> Result<f64, EvaluationError>;

    /// For some variable, `x`, and function, `f`, get `f'(x)`.
    fn differentiate_function(
        &self,
        function: Builtin,
        variable: &str,
    ) -> Result<Expression, EvaluationError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("{operation} is undefined for {argument}")]
    MathDomain { operation: SmolStr, argument: f64 },
    #[error("the result of `{operation}` is too large to represent")]
    Overflow { operation: BinaryOperation },
    #[error("unable to differentiate {function}")]
    UnableToDifferentiate { function: Builtin },
    #[error(
        "unable to differentiate a power whose exponent depends on \
         \"{variable}\""
    )]
    VariableExponent { variable: SmolStr },
}

impl EvaluationError {
    /// Is this a symbolic case which simply isn't supported (as opposed to
    /// undefined arithmetic)?
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            EvaluationError::UnableToDifferentiate { .. }
                | EvaluationError::VariableExponent { .. }
        )
    }
}

/// The set of builtin functions.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Builtins;

impl Context for Builtins {
    fn evaluate_function(
        &self,
        function: Builtin,
        argument: f64,
    ) -> Result<f64, EvaluationError> {
        let domain_error = || EvaluationError::MathDomain {
            operation: function.to_string().into(),
            argument,
        };

        let value = match function {
            Builtin::Sine | Builtin::NegatedSine => argument.sin(),
            Builtin::Cosine | Builtin::NegatedCosine => argument.cos(),
            Builtin::Logarithm | Builtin::NegatedLogarithm => {
                if argument <= 0.0 {
                    return Err(domain_error());
                }
                argument.ln()
            },
        };

        // e.g. sin(inf)
        if value.is_nan() && !argument.is_nan() {
            return Err(domain_error());
        }

        if function.is_negated() {
            Ok(-value)
        } else {
            Ok(value)
        }
    }

    fn differentiate_function(
        &self,
        function: Builtin,
        variable: &str,
    ) -> Result<Expression, EvaluationError> {
        let derivative = match function {
            Builtin::Sine => Expression::function(Builtin::Cosine, variable),
            Builtin::Cosine => {
                Expression::function(Builtin::NegatedSine, variable)
            },
            Builtin::NegatedSine => {
                Expression::function(Builtin::NegatedCosine, variable)
            },
            Builtin::NegatedCosine => {
                Expression::function(Builtin::Sine, variable)
            },
            Builtin::Logarithm => {
                Expression::constant(1) / Expression::variable(variable)
            },
            Builtin::NegatedLogarithm => {
                Expression::constant(-1) / Expression::variable(variable)
            },
        };

        Ok(derivative)
    }
}

/// Values for the variables in an [`Expression`].
///
/// A negated name falls back to its positive counterpart (and vice versa),
/// so binding `x = 2` also gives `-x = -2`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Bindings {
    values: HashMap<SmolStr, f64>,
}

impl Bindings {
    pub fn new() -> Self { Bindings::default() }

    pub fn with<S: Into<SmolStr>>(mut self, name: S, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<S: Into<SmolStr>>(&mut self, name: S, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        if let Some(&value) = self.values.get(name) {
            return Some(value);
        }

        self.values
            .get(toggle_sign(name).as_str())
            .map(|&value| -value)
    }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl<S: Into<SmolStr>> Extend<(S, f64)> for Bindings {
    fn extend<T: IntoIterator<Item = (S, f64)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<S: Into<SmolStr>> FromIterator<(S, f64)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let mut bindings = Bindings::new();
        bindings.extend(iter);
        bindings
    }
}

/// Substitute known variables into an expression and evaluate every
/// operation whose operands are all numbers, using the [`Builtins`].
pub fn evaluate(
    expr: &Expression,
    bindings: &Bindings,
) -> Result<Expression, EvaluationError> {
    let got = evaluate_with(expr, bindings, &Builtins)?;
    debug!("Evaluated \"{}\" as \"{}\"", expr, got);

    Ok(got)
}

/// Evaluate an expression, using `ctx` for any function calls.
///
/// Anything which can't be reduced to a number keeps its structure. No
/// algebraic identities are applied here, so `x * 1` stays as it is.
pub fn evaluate_with<C>(
    expr: &Expression,
    bindings: &Bindings,
    ctx: &C,
) -> Result<Expression, EvaluationError>
where
    C: Context,
{
    match expr {
        Expression::Constant(_) => Ok(expr.clone()),
        Expression::Variable(name) => match bindings.get(name) {
            Some(value) => Ok(Expression::Constant(Value::number(value))),
            None => Ok(expr.clone()),
        },
        Expression::Function { function, argument } => {
            match bindings.get(argument) {
                Some(value) => {
                    let result = ctx.evaluate_function(*function, value)?;
                    Ok(Expression::Constant(Value::number(result)))
                },
                None => Ok(expr.clone()),
            }
        },
        Expression::Binary { left, right, op } => {
            fold_binary_op(left, right, *op, bindings, ctx)
        },
    }
}

fn fold_binary_op<C>(
    left: &Expression,
    right: &Expression,
    op: BinaryOperation,
    bindings: &Bindings,
    ctx: &C,
) -> Result<Expression, EvaluationError>
where
    C: Context,
{
    let left = evaluate_with(left, bindings, ctx)?;
    let right = evaluate_with(right, bindings, ctx)?;

    if let (Expression::Constant(l), Expression::Constant(r)) = (&left, &right)
    {
        if let Some(value) = arithmetic(op, l, r)? {
            return Ok(Expression::Constant(value));
        }
    }

    Ok(Expression::binary(left, right, op))
}

/// Apply `op` to two constants, or `None` if either of them is symbolic.
fn arithmetic(
    op: BinaryOperation,
    left: &Value,
    right: &Value,
) -> Result<Option<Value>, EvaluationError> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => {
            integer_arithmetic(op, *l, *r).map(Some)
        },
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => float_arithmetic(op, l, r).map(Some),
            _ => Ok(None),
        },
    }
}

/// Integer arithmetic stays exact until it overflows or produces a
/// fraction, at which point we switch to floats.
fn integer_arithmetic(
    op: BinaryOperation,
    left: i64,
    right: i64,
) -> Result<Value, EvaluationError> {
    let exact = match op {
        BinaryOperation::Plus => left.checked_add(right),
        BinaryOperation::Minus => left.checked_sub(right),
        BinaryOperation::Times => left.checked_mul(right),
        BinaryOperation::Power => u32::try_from(right)
            .ok()
            .and_then(|exponent| left.checked_pow(exponent)),
        BinaryOperation::Divide => None,
    };

    match exact {
        Some(value) => Ok(Value::Integer(value)),
        None => float_arithmetic(op, left as f64, right as f64),
    }
}

fn float_arithmetic(
    op: BinaryOperation,
    left: f64,
    right: f64,
) -> Result<Value, EvaluationError> {
    let value = match op {
        BinaryOperation::Plus => left + right,
        BinaryOperation::Minus => left - right,
        BinaryOperation::Times => left * right,
        BinaryOperation::Divide => {
            if right == 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            left / right
        },
        BinaryOperation::Power => return power(left, right),
    };

    if value.is_infinite() && left.is_finite() && right.is_finite() {
        return Err(EvaluationError::Overflow { operation: op });
    }

    Ok(Value::number(value))
}

fn power(base: f64, exponent: f64) -> Result<Value, EvaluationError> {
    if base == 0.0 && exponent < 0.0 {
        return Err(EvaluationError::DivisionByZero);
    }

    let value = base.powf(exponent);
    let finite_inputs = base.is_finite() && exponent.is_finite();

    if value.is_nan() && finite_inputs {
        // a fractional power of a negative number
        Err(EvaluationError::MathDomain {
            operation: BinaryOperation::Power.symbol().into(),
            argument: base,
        })
    } else if value.is_infinite() && finite_inputs {
        Err(EvaluationError::Overflow {
            operation: BinaryOperation::Power,
        })
    } else {
        Ok(Value::number(value))
    }
}

/// Calculate an [`Expression`]'s derivative with respect to a particular
/// variable, using the [`Builtins`].
pub fn differentiate(
    expr: &Expression,
    variable: &str,
) -> Result<Expression, EvaluationError> {
    let got = differentiate_with(expr, variable, &Builtins)?;
    debug!("d/d{} ({}) = {}", variable, expr, got);

    Ok(got)
}

/// Differentiate an expression, asking `ctx` for the derivatives of any
/// function calls.
///
/// The result is left exactly as the differentiation rules produce it; run
/// it through [`evaluate()`] and the renderer to tidy it up.
pub fn differentiate_with<C>(
    expr: &Expression,
    variable: &str,
    ctx: &C,
) -> Result<Expression, EvaluationError>
where
    C: Context,
{
    let got = match expr {
        Expression::Constant(_) => Expression::constant(0),
        Expression::Variable(name) => {
            if name.as_str() == variable {
                Expression::constant(1)
            } else if toggle_sign(name).as_str() == variable {
                Expression::constant(-1)
            } else {
                Expression::constant(0)
            }
        },
        Expression::Function { function, argument } => {
            if argument.as_str() == variable {
                ctx.differentiate_function(*function, variable)?
            } else {
                Expression::constant(0)
            }
        },
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Plus,
        } => {
            differentiate_with(left, variable, ctx)?
                + differentiate_with(right, variable, ctx)?
        },
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Minus,
        } => {
            differentiate_with(left, variable, ctx)?
                - differentiate_with(right, variable, ctx)?
        },
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Times,
        } => {
            // The product rule
            let d_left = differentiate_with(left, variable, ctx)?;
            let d_right = differentiate_with(right, variable, ctx)?;
            let left = Expression::clone(left);
            let right = Expression::clone(right);

            right * d_left + d_right * left
        },
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Divide,
        } => {
            // The quotient rule
            let d_left = differentiate_with(left, variable, ctx)?;
            let d_right = differentiate_with(right, variable, ctx)?;
            let left = Expression::clone(left);
            let right = Expression::clone(right);

            (right.clone() * d_left - d_right * left)
                / (right.clone() * right)
        },
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Power,
        } => {
            if right.depends_on(variable) {
                return Err(EvaluationError::VariableExponent {
                    variable: variable.into(),
                });
            }

            // The power rule, followed by the chain rule
            let d_left = differentiate_with(left, variable, ctx)?;
            let left = Expression::clone(left);
            let right = Expression::clone(right);
            let reduced = right.clone() - Expression::constant(1);

            (right * left.pow(reduced)) * d_left
        },
    };

    Ok(got)
}
