use crate::classify;
use smol_str::SmolStr;
use std::{
    collections::BTreeSet,
    fmt::{self, Formatter},
    ops::{Add, Div, Mul, Neg, Sub},
};
use strum_macros::{EnumIter, EnumString};

/// An expression.
///
/// Trees are never mutated once built. Every operation in this crate
/// (evaluating, differentiating, negating...) creates a new tree.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A numeric or symbolic constant.
    Constant(Value),
    /// A named variable. A leading `-` marks the variable as negated.
    Variable(SmolStr),
    /// Invoke a builtin function on a bare variable.
    Function {
        function: Builtin,
        argument: SmolStr,
    },
    /// An expression involving two operands.
    Binary {
        left: Box<Expression>,
        right: Box<Expression>,
        op: BinaryOperation,
    },
}

impl Expression {
    pub fn constant<V: Into<Value>>(value: V) -> Self {
        Expression::Constant(value.into())
    }

    pub fn variable<S: Into<SmolStr>>(name: S) -> Self {
        Expression::Variable(name.into())
    }

    pub fn function<S: Into<SmolStr>>(function: Builtin, argument: S) -> Self {
        Expression::Function {
            function,
            argument: argument.into(),
        }
    }

    pub fn binary(
        left: Expression,
        right: Expression,
        op: BinaryOperation,
    ) -> Self {
        Expression::Binary {
            left: Box::new(left),
            right: Box::new(right),
            op,
        }
    }

    /// Raise this expression to some power.
    pub fn pow(self, exponent: Expression) -> Expression {
        Expression::binary(self, exponent, BinaryOperation::Power)
    }

    /// Does this expression mention `name` (or its negation) anywhere?
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Expression::Constant(_) => false,
            Expression::Variable(var)
            | Expression::Function { argument: var, .. } => {
                var.as_str() == name || toggle_sign(var).as_str() == name
            },
            Expression::Binary { left, right, .. } => {
                left.depends_on(name) || right.depends_on(name)
            },
        }
    }

    /// The names of every variable in this expression, with any negation
    /// stripped off.
    pub fn variables(&self) -> BTreeSet<SmolStr> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<SmolStr>) {
        match self {
            Expression::Constant(_) => {},
            Expression::Variable(var)
            | Expression::Function { argument: var, .. } => {
                names.insert(SmolStr::new(var.trim_start_matches('-')));
            },
            Expression::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            },
        }
    }
}

/// Add or remove a leading `-`.
pub(crate) fn toggle_sign(text: &str) -> SmolStr {
    match text.strip_prefix('-') {
        Some(rest) => SmolStr::new(rest),
        None => SmolStr::new(format!("-{}", text)),
    }
}

/// The value stored in an [`Expression::Constant`].
///
/// Numbers are kept as [`Value::Integer`] whenever they can be represented
/// exactly; use [`Value::number()`] to get that normalisation.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    /// Opaque symbolic text (e.g. `-c`).
    Symbol(SmolStr),
}

impl Value {
    /// Create a numeric value, preferring the integer representation.
    pub fn number(value: f64) -> Value {
        // i64::MAX isn't representable as a float, so the upper bound is
        // exclusive
        let fits = value >= i64::MIN as f64 && value < i64::MAX as f64;

        if value.is_finite() && value.fract() == 0.0 && fits {
            Value::Integer(value as i64)
        } else {
            Value::Float(value)
        }
    }

    pub fn symbol<S: Into<SmolStr>>(text: S) -> Value {
        Value::Symbol(text.into())
    }

    pub fn is_numeric(&self) -> bool { !matches!(self, Value::Symbol(_)) }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            Value::Symbol(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(left), Value::Integer(right)) => left == right,
            (Value::Symbol(left), Value::Symbol(right)) => left == right,
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            },
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value { Value::Integer(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Value { Value::Integer(value.into()) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value { Value::number(value) }
}

/// Numeric text becomes a number, anything else is kept as a symbol.
impl From<&str> for Value {
    fn from(text: &str) -> Value {
        if classify::is_integer_valued(text) {
            if let Ok(integer) = text.parse::<i64>() {
                return Value::Integer(integer);
            }
        }

        match text.parse::<f64>() {
            Ok(number) => Value::number(number),
            Err(_) => Value::symbol(text),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(value) => write!(f, "{}", value),
            Value::Symbol(text) => write!(f, "{}", text),
        }
    }
}

impl Neg for Value {
    type Output = Value;

    fn neg(self) -> Value {
        match self {
            Value::Integer(i) => match i.checked_neg() {
                Some(negated) => Value::Integer(negated),
                None => Value::number(-(i as f64)),
            },
            Value::Float(f) => Value::number(-f),
            Value::Symbol(text) => Value::Symbol(toggle_sign(&text)),
        }
    }
}

/// An operation that can be applied to two arguments.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
}

impl BinaryOperation {
    /// How tightly this operator binds its operands.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperation::Plus | BinaryOperation::Minus => 1,
            BinaryOperation::Times | BinaryOperation::Divide => 2,
            BinaryOperation::Power => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperation::Plus => "+",
            BinaryOperation::Minus => "-",
            BinaryOperation::Times => "*",
            BinaryOperation::Divide => "/",
            BinaryOperation::Power => "**",
        }
    }

    /// Whether operands may be swapped and regrouped (`+` and `*`).
    pub fn is_associative(self) -> bool {
        matches!(self, BinaryOperation::Plus | BinaryOperation::Times)
    }
}

impl fmt::Display for BinaryOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The builtin functions, including their negated forms.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    EnumIter,
    strum_macros::Display,
)]
pub enum Builtin {
    #[strum(serialize = "sin")]
    Sine,
    #[strum(serialize = "cos")]
    Cosine,
    #[strum(serialize = "log")]
    Logarithm,
    #[strum(serialize = "-sin")]
    NegatedSine,
    #[strum(serialize = "-cos")]
    NegatedCosine,
    #[strum(serialize = "-log")]
    NegatedLogarithm,
}

impl Builtin {
    pub fn negated(self) -> Builtin {
        match self {
            Builtin::Sine => Builtin::NegatedSine,
            Builtin::Cosine => Builtin::NegatedCosine,
            Builtin::Logarithm => Builtin::NegatedLogarithm,
            Builtin::NegatedSine => Builtin::Sine,
            Builtin::NegatedCosine => Builtin::Cosine,
            Builtin::NegatedLogarithm => Builtin::Logarithm,
        }
    }

    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Builtin::NegatedSine
                | Builtin::NegatedCosine
                | Builtin::NegatedLogarithm
        )
    }
}

// define some operator overloads to make constructing an expression easier.

impl Add for Expression {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        Expression::binary(self, rhs, BinaryOperation::Plus)
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        Expression::binary(self, rhs, BinaryOperation::Minus)
    }
}

impl Mul for Expression {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        Expression::binary(self, rhs, BinaryOperation::Times)
    }
}

impl Div for Expression {
    type Output = Expression;

    fn div(self, rhs: Expression) -> Expression {
        Expression::binary(self, rhs, BinaryOperation::Divide)
    }
}

/// Negation pushes the sign into leaves where it can (`-x`, `-3`,
/// `-sin(x)`) and falls back to `0 - expr` for anything compound.
impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Self::Output {
        match self {
            Expression::Constant(value) => Expression::Constant(-value),
            Expression::Variable(name) => {
                Expression::Variable(toggle_sign(&name))
            },
            Expression::Function { function, argument } => {
                Expression::Function {
                    function: function.negated(),
                    argument,
                }
            },
            compound @ Expression::Binary { .. } => {
                Expression::constant(0) - compound
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn numbers_prefer_the_integer_representation() {
        let inputs = vec![
            (3.0, Value::Integer(3)),
            (-0.0, Value::Integer(0)),
            (2.5, Value::Float(2.5)),
            (1e300, Value::Float(1e300)),
        ];

        for (number, should_be) in inputs {
            let got = Value::number(number);

            match (&got, &should_be) {
                (Value::Integer(l), Value::Integer(r)) => assert_eq!(l, r),
                (Value::Float(l), Value::Float(r)) => assert_eq!(l, r),
                _ => panic!("{:?} should be {:?}", got, should_be),
            }
        }

        assert!(matches!(Value::number(f64::NAN), Value::Float(_)));
        assert!(matches!(Value::number(f64::INFINITY), Value::Float(_)));
    }

    #[test]
    fn values_from_text() {
        assert!(matches!(Value::from("42"), Value::Integer(42)));
        assert!(matches!(Value::from("4.0"), Value::Integer(4)));
        assert!(matches!(Value::from("0.5"), Value::Float(_)));
        assert!(matches!(Value::from("-c"), Value::Symbol(_)));
        assert!(Value::from("1e3").is_numeric());
        assert!(!Value::from("c").is_numeric());
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_ne!(Value::Integer(2), Value::Float(2.5));
        assert_ne!(Value::Integer(2), Value::symbol("2"));
        assert_eq!(Value::symbol("c"), Value::symbol("c"));
    }

    #[test]
    fn display_values() {
        let inputs = vec![
            (Value::Integer(3), "3"),
            (Value::Integer(-3), "-3"),
            (Value::Float(2.5), "2.5"),
            (Value::symbol("-c"), "-c"),
        ];

        for (value, should_be) in inputs {
            assert_eq!(value.to_string(), should_be);
        }
    }

    #[test]
    fn negation_pushes_into_leaves() {
        let inputs = vec![
            (Expression::constant(3), "-3"),
            (Expression::constant(-3), "3"),
            (Expression::constant(Value::symbol("c")), "-c"),
            (Expression::constant(Value::symbol("-c")), "c"),
            (Expression::variable("x"), "-x"),
            (Expression::variable("-x"), "x"),
            (Expression::function(Builtin::Sine, "x"), "-sin(x)"),
            (Expression::function(Builtin::NegatedLogarithm, "x"), "log(x)"),
        ];

        for (expr, should_be) in inputs {
            let got = -expr;
            assert_eq!(got.to_string(), should_be);
        }
    }

    #[test]
    fn negating_a_compound_expression_subtracts_from_zero() {
        let expr = Expression::variable("x") + Expression::variable("y");

        match -expr {
            Expression::Binary {
                left,
                op: BinaryOperation::Minus,
                ..
            } => assert!(matches!(
                *left,
                Expression::Constant(Value::Integer(0))
            )),
            other => panic!("Expected 0 - (x + y), found {:?}", other),
        }
    }

    #[test]
    fn dependencies() {
        let expr = Expression::variable("x")
            * Expression::function(Builtin::Cosine, "y")
            + Expression::variable("-z");

        assert!(expr.depends_on("x"));
        assert!(expr.depends_on("-x"));
        assert!(expr.depends_on("y"));
        assert!(expr.depends_on("z"));
        assert!(!expr.depends_on("w"));

        let names: Vec<_> =
            expr.variables().into_iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn builtin_names_round_trip() {
        for builtin in Builtin::iter() {
            let name = builtin.to_string();
            let got: Builtin = name.parse().unwrap();
            assert_eq!(got, builtin);
            assert_eq!(builtin.negated().negated(), builtin);
            assert_ne!(builtin.is_negated(), builtin.negated().is_negated());
        }

        assert!("tan".parse::<Builtin>().is_err());
    }
}
