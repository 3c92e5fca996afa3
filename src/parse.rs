use crate::{
    classify,
    expr::{BinaryOperation, Builtin, Expression, Value},
};
use log::{debug, trace};
use smol_str::SmolStr;
use std::{ops::Range, str::FromStr};
use thiserror::Error;

/// Parse an [`Expression`] tree from some text.
pub fn parse(s: &str) -> Result<Expression, ParseError> {
    let tokens = tokenize(s);
    let expr = Parser::new(&tokens).parse()?;
    debug!("Parsed {:?} as \"{}\"", s, expr);

    Ok(expr)
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parse(s) }
}

/// Split some text into [`Token`]s.
///
/// Each of `+ - * / ( ) ,` is its own token and everything else between
/// them (numbers, names) is kept together as a [`TokenKind::Word`].
/// Consecutive `*`s are paired up into `**` from left to right, so `***`
/// becomes `**` followed by `*`.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();

    for token in Tokens::new(src) {
        let pairs_up = token.kind == TokenKind::Times
            && tokens.last().map(|previous| previous.kind)
                == Some(TokenKind::Times);

        if !pairs_up {
            tokens.push(token);
        } else if let Some(previous) = tokens.last_mut() {
            previous.kind = TokenKind::Power;
            previous.text = "**";
            previous.span = previous.span.start..token.span.end;
        }
    }

    tokens
}

/// An operator-precedence (shunting-yard) parser.
///
/// Operands go straight to the output queue while operators wait on a
/// stack until something with lower or equal precedence turns up. The
/// resulting postfix sequence is then folded into a tree.
///
/// The grammar, from loosest to tightest binding:
///
/// ```text
/// "+" "-"                   left associative
/// "*" "/"                   left associative
/// "**"                      left associative
/// "-" (prefix)              unary negation
/// NUMBER | IDENTIFIER | BUILTIN "(" IDENTIFIER ")" | "(" expression ")"
/// ```
///
/// Note that prefix `-` binds tighter than `**`, so `-x ** 2` is
/// `(-x) ** 2` and not the `-(x ** 2)` you'd get on paper. Write
/// `-(x ** 2)` when that's what you mean.
#[derive(Debug, Clone)]
struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    cursor: usize,
    stack: Vec<(Operator, Range<usize>)>,
    output: Vec<Postfix>,
    /// Did the last token finish an operand? A `-` after an operand is
    /// subtraction, anywhere else it is negation.
    previous_was_operand: bool,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Parser {
            tokens,
            cursor: 0,
            stack: Vec::new(),
            output: Vec::new(),
            previous_was_operand: false,
        }
    }

    fn parse(mut self) -> Result<Expression, ParseError> {
        while let Some(token) = self.advance() {
            trace!("{:?} {:?}, stack: {:?}", token.kind, token.text, self.stack);

            match token.kind {
                TokenKind::Word => {
                    let operand = self.operand(token)?;
                    self.output.push(Postfix::Operand(operand));
                    self.previous_was_operand = true;
                },
                TokenKind::Minus if !self.previous_was_operand => {
                    // prefix operators have nothing to their left, so they
                    // never pop the stack
                    self.stack.push((Operator::Negate, token.span.clone()));
                },
                TokenKind::OpenParen => {
                    self.stack.push((Operator::OpenParen, token.span.clone()));
                    self.previous_was_operand = false;
                },
                TokenKind::CloseParen => {
                    self.close_paren(token.span.clone())?;
                    self.previous_was_operand = true;
                },
                TokenKind::Comma => {
                    return Err(ParseError::UnexpectedToken {
                        found: token.kind,
                        span: token.span.clone(),
                    });
                },
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Times
                | TokenKind::Divide
                | TokenKind::Power => {
                    if let Some(op) = token.kind.as_binary_op() {
                        self.binary_operator(op, token.span.clone());
                    }
                    self.previous_was_operand = false;
                },
            }
        }

        while let Some((operator, span)) = self.stack.pop() {
            match operator {
                Operator::OpenParen => {
                    return Err(ParseError::UnclosedParen { span })
                },
                other => self.output.push(other.into_postfix(span)),
            }
        }

        reduce(self.output)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.cursor).map(|tok| tok.kind)
    }

    fn advance(&mut self) -> Option<&'t Token<'a>> {
        let token = self.tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }

    fn operand(
        &mut self,
        token: &'t Token<'a>,
    ) -> Result<Expression, ParseError> {
        if classify::is_numeric(token.text) {
            Ok(Expression::Constant(Value::from(token.text)))
        } else if is_identifier(token.text) {
            if self.peek_kind() == Some(TokenKind::OpenParen) {
                self.function_call(token)
            } else {
                Ok(Expression::variable(token.text))
            }
        } else {
            Err(ParseError::UnknownToken {
                text: token.text.into(),
                span: token.span.clone(),
            })
        }
    }

    fn function_call(
        &mut self,
        identifier: &'t Token<'a>,
    ) -> Result<Expression, ParseError> {
        let function: Builtin = identifier.text.parse().map_err(|_| {
            ParseError::UnknownFunction {
                name: identifier.text.into(),
                span: identifier.span.clone(),
            }
        })?;

        let open_paren = self.advance();
        debug_assert_eq!(
            open_paren.map(|tok| tok.kind),
            Some(TokenKind::OpenParen)
        );

        let argument = self.advance();
        let close_paren = self.advance();

        match (argument, close_paren) {
            (Some(argument), Some(close_paren))
                if argument.kind == TokenKind::Word
                    && is_identifier(argument.text)
                    && close_paren.kind == TokenKind::CloseParen =>
            {
                Ok(Expression::function(function, argument.text))
            },
            (argument, close_paren) => {
                let end = close_paren
                    .or(argument)
                    .map(|tok| tok.span.end)
                    .unwrap_or(identifier.span.end);

                Err(ParseError::InvalidFunctionArgument {
                    function: identifier.text.into(),
                    span: identifier.span.start..end,
                })
            },
        }
    }

    fn binary_operator(&mut self, op: BinaryOperation, span: Range<usize>) {
        let incoming = Operator::Binary(op);

        while let Some((top, _)) = self.stack.last() {
            if *top == Operator::OpenParen
                || top.precedence() < incoming.precedence()
            {
                break;
            }

            if let Some((top, top_span)) = self.stack.pop() {
                self.output.push(top.into_postfix(top_span));
            }
        }

        self.stack.push((incoming, span));
    }

    fn close_paren(&mut self, span: Range<usize>) -> Result<(), ParseError> {
        loop {
            match self.stack.pop() {
                Some((Operator::OpenParen, _)) => return Ok(()),
                Some((operator, op_span)) => {
                    self.output.push(operator.into_postfix(op_span))
                },
                None => return Err(ParseError::UnmatchedCloseParen { span }),
            }
        }
    }
}

/// Turn the postfix output of the shunting-yard pass into a tree.
fn reduce(output: Vec<Postfix>) -> Result<Expression, ParseError> {
    let mut operands: Vec<Expression> = Vec::new();

    for item in output {
        trace!("Reducing {:?} with {} operands", item, operands.len());

        match item {
            Postfix::Operand(expr) => operands.push(expr),
            Postfix::Negate(span) => {
                let operand = operands.pop().ok_or(
                    ParseError::MissingOperand {
                        operator: "-",
                        span,
                    },
                )?;
                operands.push(-operand);
            },
            Postfix::Binary(op, span) => {
                let missing = || ParseError::MissingOperand {
                    operator: op.symbol(),
                    span: span.clone(),
                };
                let right = operands.pop().ok_or_else(missing)?;
                let left = operands.pop().ok_or_else(missing)?;
                operands.push(Expression::binary(left, right, op));
            },
        }
    }

    match operands.len() {
        0 => Err(ParseError::EmptyExpression),
        1 => operands.pop().ok_or(ParseError::EmptyExpression),
        count => Err(ParseError::TrailingOperands { count }),
    }
}

/// Names start with a letter or underscore.
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();

    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => chars
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '\''),
        _ => false,
    }
}

/// Something waiting on the operator stack.
#[derive(Debug, Copy, Clone, PartialEq)]
enum Operator {
    Binary(BinaryOperation),
    Negate,
    /// Sentinel which binds looser than anything else, so operators are
    /// never popped past it.
    OpenParen,
}

impl Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::OpenParen => 0,
            Operator::Binary(op) => op.precedence(),
            Operator::Negate => 4,
        }
    }

    fn into_postfix(self, span: Range<usize>) -> Postfix {
        match self {
            Operator::Binary(op) => Postfix::Binary(op, span),
            Operator::Negate => Postfix::Negate(span),
            Operator::OpenParen => {
                unreachable!("Parentheses never make it to the output")
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Postfix {
    Operand(Expression),
    Binary(BinaryOperation, Range<usize>),
    Negate(Range<usize>),
}

/// Possible errors that may occur while parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown token \"{text}\" at {span:?}")]
    UnknownToken { text: SmolStr, span: Range<usize> },
    #[error("unexpected {found:?} at {span:?}")]
    UnexpectedToken {
        found: TokenKind,
        span: Range<usize>,
    },
    #[error("unknown function \"{name}\" at {span:?}")]
    UnknownFunction { name: SmolStr, span: Range<usize> },
    #[error("\"{function}\" must be applied to a single variable ({span:?})")]
    InvalidFunctionArgument {
        function: SmolStr,
        span: Range<usize>,
    },
    #[error("unmatched `)` at {span:?}")]
    UnmatchedCloseParen { span: Range<usize> },
    #[error("unclosed `(` at {span:?}")]
    UnclosedParen { span: Range<usize> },
    #[error("the `{operator}` at {span:?} is missing an operand")]
    MissingOperand {
        operator: &'static str,
        span: Range<usize>,
    },
    #[error("found {count} operands without an operator between them")]
    TrailingOperands { count: usize },
    #[error("the expression is empty")]
    EmptyExpression,
}

#[derive(Debug, Clone, PartialEq)]
struct Tokens<'a> {
    src: &'a str,
    cursor: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self { Tokens { src, cursor: 0 } }

    fn rest(&self) -> &'a str { &self.src[self.cursor..] }

    fn peek(&self) -> Option<char> { self.rest().chars().next() }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    fn chomp(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        let start = self.cursor;
        self.advance()?;
        let end = self.cursor;

        Some(Token::from_text(self.src, start..end, kind))
    }

    fn chomp_word(&mut self) -> Token<'a> {
        let start = self.cursor;

        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_punctuation(c) {
                break;
            }

            self.advance();
        }

        Token::from_text(self.src, start..self.cursor, TokenKind::Word)
    }
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | ',')
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.peek()? {
                space if space.is_whitespace() => {
                    self.advance();
                    continue;
                },
                '(' => self.chomp(TokenKind::OpenParen),
                ')' => self.chomp(TokenKind::CloseParen),
                ',' => self.chomp(TokenKind::Comma),
                '+' => self.chomp(TokenKind::Plus),
                '-' => self.chomp(TokenKind::Minus),
                '*' => self.chomp(TokenKind::Times),
                '/' => self.chomp(TokenKind::Divide),
                _ => Some(self.chomp_word()),
            };
        }
    }
}

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Where the token came from in the original text.
    pub span: Range<usize>,
}

impl<'a> Token<'a> {
    fn from_text(
        src: &'a str,
        span: Range<usize>,
        kind: TokenKind,
    ) -> Self {
        Token {
            text: &src[span.clone()],
            span,
            kind,
        }
    }
}

/// The kinds of token that can appear in an [`Expression`]'s text form.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A number or a name.
    Word,
    OpenParen,
    CloseParen,
    Comma,
    Plus,
    Minus,
    Times,
    Divide,
    Power,
}

impl TokenKind {
    fn as_binary_op(self) -> Option<BinaryOperation> {
        match self {
            TokenKind::Plus => Some(BinaryOperation::Plus),
            TokenKind::Minus => Some(BinaryOperation::Minus),
            TokenKind::Times => Some(BinaryOperation::Times),
            TokenKind::Divide => Some(BinaryOperation::Divide),
            TokenKind::Power => Some(BinaryOperation::Power),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tokenizer_tests {
    use super::*;

    macro_rules! tokenize_test {
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let got = tokenize($src);

                assert_eq!(got.len(), 1, "{:?} should be 1 token", got);
                let Range { start, end } = got[0].span;
                assert_eq!(start, 0);
                assert_eq!(end, $src.len());
                assert_eq!(got[0].kind, $should_be);
            }
        };
    }

    tokenize_test!(open_paren, "(", TokenKind::OpenParen);
    tokenize_test!(close_paren, ")", TokenKind::CloseParen);
    tokenize_test!(comma, ",", TokenKind::Comma);
    tokenize_test!(plus, "+", TokenKind::Plus);
    tokenize_test!(minus, "-", TokenKind::Minus);
    tokenize_test!(times, "*", TokenKind::Times);
    tokenize_test!(divide, "/", TokenKind::Divide);
    tokenize_test!(power, "**", TokenKind::Power);
    tokenize_test!(power_with_space_between, "* *", TokenKind::Power);
    tokenize_test!(single_digit_integer, "3", TokenKind::Word);
    tokenize_test!(multi_digit_integer, "31", TokenKind::Word);
    tokenize_test!(simple_decimal, "3.14", TokenKind::Word);
    tokenize_test!(simple_identifier, "x", TokenKind::Word);
    tokenize_test!(longer_identifier, "hello_world", TokenKind::Word);
    tokenize_test!(anything_else_is_a_word, "x$y", TokenKind::Word);

    fn texts(src: &str) -> Vec<&str> {
        tokenize(src).into_iter().map(|tok| tok.text).collect()
    }

    #[test]
    fn whitespace_only_separates() {
        assert_eq!(texts("  1   +\tfoo "), vec!["1", "+", "foo"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn stars_are_paired_left_to_right() {
        assert_eq!(texts("a***b"), vec!["a", "**", "*", "b"]);
        assert_eq!(texts("a****b"), vec!["a", "**", "**", "b"]);
    }

    #[test]
    fn commas_and_parens_split_words() {
        assert_eq!(
            texts("56* (3,3**9)"),
            vec!["56", "*", "(", "3", ",", "3", "**", "9", ")"]
        );
        assert_eq!(texts("sin(x)"), vec!["sin", "(", "x", ")"]);
    }

    #[test]
    fn merged_power_spans_both_stars() {
        let got = tokenize("2 * * 3");

        assert_eq!(got[1].kind, TokenKind::Power);
        assert_eq!(got[1].span, 2..5);
    }
}

#[cfg(test)]
mod parser_tests {
    use super::*;

    macro_rules! parser_test {
        ($name:ident, $src:expr) => {
            parser_test!($name, $src, $src);
        };
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let got = parse($src).unwrap();

                let round_tripped = got.to_string();
                assert_eq!(round_tripped, $should_be);
            }
        };
    }

    parser_test!(simple_integer, "1");
    parser_test!(simple_decimal, "2.5");
    parser_test!(one_plus_one, "1 + 1");
    parser_test!(precedence, "2+3*4", "2 + 3 * 4");
    parser_test!(parens_override_precedence, "(2+3)*4", "(2 + 3) * 4");
    parser_test!(number_in_parens, "(1)", "1");
    parser_test!(left_associative_minus, "1 - 2 - 3");
    parser_test!(grouped_minus, "1 - (2 - 3)");
    parser_test!(power, "x**2", "x ** 2");
    parser_test!(power_is_left_associative, "2**3**2", "2 ** 3 ** 2");
    parser_test!(grouped_power, "2**(3**2)", "2 ** (3 ** 2)");
    parser_test!(power_binds_tighter_than_times, "2*x**3", "2 * x ** 3");
    parser_test!(function_call, "sin(x)");
    parser_test!(function_call_with_spaces, "log ( y )", "log(y)");
    parser_test!(negative_literal, "-1");
    parser_test!(negative_literal_plus_x, "-1 + x");
    parser_test!(negated_variable, "-x");
    parser_test!(double_negation, "--x", "x");
    parser_test!(negated_function, "-cos(x)");
    parser_test!(negated_group, "-(a + b)");
    parser_test!(negative_on_the_right, "x + -1", "x + (-1)");
    parser_test!(negative_exponent, "x ** -2");
    parser_test!(negation_binds_tighter_than_power, "-x ** 2");
    parser_test!(negated_power, "-(x ** 2)");
    parser_test!(
        bimdas,
        "1*2 + 3*4/(5 - 2)*1 - 3",
        "2 + 3 * 4 / (5 - 2) - 3"
    );

    #[test]
    fn tree_shapes() {
        let x = || Expression::variable("x");
        let c = |v: i64| Expression::constant(v);
        let inputs = vec![
            ("2+3*4", c(2) + c(3) * c(4)),
            ("(2+3)*4", (c(2) + c(3)) * c(4)),
            ("x ** 3", x().pow(c(3))),
            ("x * -1", x() * c(-1)),
            ("-(x + 1)", c(0) - (x() + c(1))),
            ("-x ** 2", Expression::variable("-x").pow(c(2))),
            ("-(x ** 2)", c(0) - x().pow(c(2))),
            ("2.0", c(2)),
        ];

        for (src, should_be) in inputs {
            let got = parse(src).unwrap();
            assert_eq!(got, should_be, "{}", src);
        }
    }

    #[test]
    fn integer_valued_literals_are_integers() {
        let got = parse("4.0").unwrap();
        assert!(matches!(got, Expression::Constant(Value::Integer(4))));

        let got = parse("0.5").unwrap();
        assert!(matches!(got, Expression::Constant(Value::Float(_))));
    }

    #[test]
    fn syntax_errors() {
        let inputs = vec![
            ("", ParseError::EmptyExpression),
            ("()", ParseError::EmptyExpression),
            (")", ParseError::UnmatchedCloseParen { span: 0..1 }),
            ("(1 + 2", ParseError::UnclosedParen { span: 0..1 }),
            ("1 + 2)", ParseError::UnmatchedCloseParen { span: 5..6 }),
            (
                "x +",
                ParseError::MissingOperand {
                    operator: "+",
                    span: 2..3,
                },
            ),
            ("2 3", ParseError::TrailingOperands { count: 2 }),
            (
                "1, 2",
                ParseError::UnexpectedToken {
                    found: TokenKind::Comma,
                    span: 1..2,
                },
            ),
            (
                "2 $ 3",
                ParseError::UnknownToken {
                    text: "$".into(),
                    span: 2..3,
                },
            ),
            (
                "tan(x)",
                ParseError::UnknownFunction {
                    name: "tan".into(),
                    span: 0..3,
                },
            ),
            (
                "sin(2)",
                ParseError::InvalidFunctionArgument {
                    function: "sin".into(),
                    span: 0..6,
                },
            ),
            (
                "sin(x, y)",
                ParseError::InvalidFunctionArgument {
                    function: "sin".into(),
                    span: 0..6,
                },
            ),
            (
                "sin(x",
                ParseError::InvalidFunctionArgument {
                    function: "sin".into(),
                    span: 0..5,
                },
            ),
        ];

        for (src, should_be) in inputs {
            let got = parse(src).unwrap_err();
            assert_eq!(got, should_be, "{:?}", src);
        }
    }

    #[test]
    fn argument_lists_are_not_supported() {
        let got = parse("56* (3,3**9)").unwrap_err();

        assert!(matches!(
            got,
            ParseError::UnexpectedToken {
                found: TokenKind::Comma,
                ..
            }
        ));
    }

    #[test]
    fn from_str_is_parse() {
        let got: Expression = "x + 1".parse().unwrap();
        assert_eq!(got, parse("x + 1").unwrap());
    }
}
