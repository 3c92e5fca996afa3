//! Structural equality, extended with a bounded amount of commutative and
//! associative reasoning.

use crate::expr::{BinaryOperation, Expression};
use arrayvec::ArrayVec;
use std::collections::HashMap;

/// The operands of a `+` or `*` node after flattening one level.
type Operands<'e> = ArrayVec<[&'e Expression; 4]>;

/// Are two expressions equivalent?
///
/// Constants compare numerically, so `2` equals `2.0`. The operands of `+`
/// and `*` may be swapped, and regrouped one level deep, meaning
/// `a + b + c` equals `c + (b + a)`. Deeper reassociation isn't attempted.
pub fn equals(left: &Expression, right: &Expression) -> bool {
    Comparison::default().equals(left, right)
}

impl PartialEq for Expression {
    fn eq(&self, other: &Expression) -> bool { equals(self, other) }
}

/// A single top-level comparison.
///
/// Flattening means the same pair of sub-expressions gets compared from
/// several levels of a long sum, so each binary pair's answer is remembered
/// (keyed by address, the trees are borrowed for the whole comparison).
#[derive(Debug, Default)]
struct Comparison {
    known: HashMap<(*const Expression, *const Expression), bool>,
}

impl Comparison {
    fn equals(&mut self, left: &Expression, right: &Expression) -> bool {
        match (left, right) {
            (Expression::Constant(l), Expression::Constant(r)) => l == r,
            (Expression::Variable(l), Expression::Variable(r)) => l == r,
            (
                Expression::Function {
                    function: left_function,
                    argument: left_argument,
                },
                Expression::Function {
                    function: right_function,
                    argument: right_argument,
                },
            ) => {
                left_function == right_function
                    && left_argument == right_argument
            },
            (
                Expression::Binary {
                    left: a,
                    right: b,
                    op: left_op,
                },
                Expression::Binary {
                    left: c,
                    right: d,
                    op: right_op,
                },
            ) if left_op == right_op => {
                let key: (*const Expression, *const Expression) =
                    (left, right);
                if let Some(&known) = self.known.get(&key) {
                    return known;
                }

                let got = if left_op.is_associative() {
                    self.associative_equals(*left_op, (a, b), (c, d))
                } else {
                    self.equals(a, c) && self.equals(b, d)
                };

                self.known.insert(key, got);
                got
            },
            _ => false,
        }
    }

    fn associative_equals(
        &mut self,
        op: BinaryOperation,
        (a, b): (&Expression, &Expression),
        (c, d): (&Expression, &Expression),
    ) -> bool {
        if self.equals(a, c) && self.equals(b, d) {
            return true;
        }
        if self.equals(a, d) && self.equals(b, c) {
            return true;
        }

        let lhs = operands(op, a, b);
        let rhs = operands(op, c, d);

        // two operands apiece is the swap we've already checked
        (lhs.len() > 2 || rhs.len() > 2) && self.same_operands(&lhs, &rhs)
    }

    /// Can every operand on the left be paired with a distinct, equal
    /// operand on the right?
    fn same_operands(
        &mut self,
        left: &[&Expression],
        right: &[&Expression],
    ) -> bool {
        let mut used = [false; 4];

        left.len() == right.len() && self.pair_up(left, right, &mut used)
    }

    fn pair_up(
        &mut self,
        left: &[&Expression],
        right: &[&Expression],
        used: &mut [bool],
    ) -> bool {
        let (first, rest) = match left.split_first() {
            Some(split) => split,
            None => return true,
        };

        for (i, candidate) in right.iter().enumerate() {
            if !used[i] && self.equals(first, candidate) {
                used[i] = true;
                if self.pair_up(rest, right, used) {
                    return true;
                }
                used[i] = false;
            }
        }

        false
    }
}

fn operands<'e>(
    op: BinaryOperation,
    left: &'e Expression,
    right: &'e Expression,
) -> Operands<'e> {
    let mut operands = Operands::new();

    for &child in &[left, right] {
        match child {
            Expression::Binary {
                left,
                right,
                op: child_op,
            } if *child_op == op => {
                operands.push(left.as_ref());
                operands.push(right.as_ref());
            },
            _ => operands.push(child),
        }
    }

    operands
}
