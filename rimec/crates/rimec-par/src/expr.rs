//! Shunting-yard expression parsing.
//!
//! Expressions are parsed by a two-state automaton over an operand stack
//! and an operator stack. In the *unary* state the parser wants a term
//! (integer, identifier, unary `-`, or `(`); in the *binary* state it
//! wants an operator, a call's `(`, a `,`, or a `)`. Any token that fits
//! neither ends the expression without being consumed.
//!
//! The operator stack also holds bracket markers: `LParen` for grouping
//! parentheses and `Call` for a call's argument list. A call pushes a
//! sentinel (`None`) onto the operand stack so that `)` knows where the
//! argument list starts.
//!
//! Both stacks are capped at a fixed depth; overflowing either is a
//! diagnostic, not a reallocation.

use rimec_lex::{Token, TokenKind};
use rimec_util::{Diagnostic, Span};

use crate::ast::{Call, Expr, ExprKind, Op, Operation};
use crate::Parser;

/// Maximum operand/operator stack depth. Ample for anything a human
/// writes.
const MAX_DEPTH: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Expecting a term.
    Unary,
    /// Expecting an operator or the continuation of a call.
    Binary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker {
    Op(Op),
    /// A grouping `(`.
    LParen,
    /// The `(` of a function call.
    Call,
}

#[derive(Clone, Copy, Debug)]
struct OpEntry {
    marker: Marker,
    span: Span,
}

/// Whether the automaton keeps consuming tokens after a step.
enum Step {
    Continue,
    Stop,
}

/// The working state of one expression parse.
struct Yard<'a> {
    state: State,
    /// Parsed sub-expressions; `None` is the argument-list sentinel.
    operands: Vec<Option<&'a Expr<'a>>>,
    operators: Vec<OpEntry>,
}

impl<'a> Yard<'a> {
    fn new() -> Self {
        Self {
            state: State::Unary,
            operands: Vec::new(),
            operators: Vec::new(),
        }
    }
}

/// The precedence pop rule: pop while the stack top binds strictly
/// tighter, or equally tight and the incoming operator is
/// left-associative. Bracket markers act as a floor.
fn should_pop(yard: &Yard<'_>, incoming: Op) -> bool {
    match yard.operators.last() {
        Some(OpEntry {
            marker: Marker::Op(top),
            ..
        }) => {
            let diff = top.precedence() as i32 - incoming.precedence() as i32;
            diff > 0 || (diff == 0 && incoming.is_left_associative())
        }
        _ => false,
    }
}

impl<'a> Parser<'a> {
    /// Parses one expression. Stops cleanly (without consuming) at the
    /// first token that cannot continue the expression.
    pub fn parse_expression(&mut self) -> Option<&'a Expr<'a>> {
        let mut yard = Yard::new();

        let stop = loop {
            let tk = self.peek()?;
            if tk.kind == TokenKind::Eof {
                break tk;
            }

            match yard.state {
                State::Unary => self.expr_operand(&mut yard, tk)?,
                State::Binary => {
                    if let Step::Stop = self.expr_operator(&mut yard, tk)? {
                        break tk;
                    }
                }
            }

            self.next()?;
        };

        self.finish_expression(yard, stop)
    }

    /// One step in the unary state: push a term or a prefix operator.
    fn expr_operand(&mut self, yard: &mut Yard<'a>, tk: Token) -> Option<()> {
        match tk.kind {
            TokenKind::Int => {
                let value: i64 = match tk.text(self.lexer.source()).parse() {
                    Ok(value) => value,
                    Err(_) => {
                        self.error = true;
                        Diagnostic::error("integer literal too large")
                            .with_snippet(tk.span, "this literal")
                            .with_note("integers are 64-bit signed")
                            .emit(&self.renderer);
                        return None;
                    }
                };

                let expr = &*self.arena.alloc(Expr {
                    kind: ExprKind::Int(value),
                    span: tk.span,
                });
                self.push_operand(yard, Some(expr), tk.span)?;
                yard.state = State::Binary;
            }

            TokenKind::Ident => {
                let expr = &*self.arena.alloc(Expr {
                    kind: ExprKind::Ident(self.ident_of(tk)),
                    span: tk.span,
                });
                self.push_operand(yard, Some(expr), tk.span)?;
                yard.state = State::Binary;
            }

            TokenKind::Str => {
                self.error = true;
                Diagnostic::error("use of string in expression")
                    .with_snippet(tk.span, "here")
                    .with_note("currently Rime only supports string definitions in constants")
                    .emit(&self.renderer);
                return None;
            }

            TokenKind::Minus => self.push_operator(yard, Op::Neg, tk.span)?,

            TokenKind::LParen => self.push_marker(yard, Marker::LParen, tk.span)?,

            _ => {
                self.report_unexpected(tk, "a term", None);
                return None;
            }
        }

        Some(())
    }

    /// One step in the binary state.
    fn expr_operator(&mut self, yard: &mut Yard<'a>, tk: Token) -> Option<Step> {
        if let Some(op) = Op::from_token(tk.kind) {
            self.push_operator(yard, op, tk.span)?;
            yard.state = State::Unary;
            return Some(Step::Continue);
        }

        match tk.kind {
            // A '(' after an operand begins a call.
            TokenKind::LParen => {
                self.push_marker(yard, Marker::Call, tk.span)?;
                self.push_operand(yard, None, tk.span)?;
                yard.state = State::Unary;
                Some(Step::Continue)
            }

            TokenKind::RParen => {
                loop {
                    match yard.operators.last().copied() {
                        // No open bracket: this ')' is not part of the
                        // expression.
                        None => return Some(Step::Stop),
                        Some(entry) if matches!(entry.marker, Marker::LParen | Marker::Call) => {
                            break;
                        }
                        Some(_) => self.pop_operator(yard)?,
                    }
                }

                let entry = yard.operators.pop()?;

                if entry.marker == Marker::Call {
                    let sep = match yard.operands.iter().rposition(Option::is_none) {
                        Some(sep) => sep,
                        None => return self.malformed(entry.span),
                    };

                    let args: Vec<&'a Expr<'a>> = yard.operands.drain(sep + 1..).flatten().collect();
                    yard.operands.pop();

                    let callee = match yard.operands.pop() {
                        Some(Some(callee)) => callee,
                        _ => return self.malformed(entry.span),
                    };

                    let span = callee.span.to(tk.span);
                    let expr = &*self.arena.alloc(Expr {
                        kind: ExprKind::Call(Call {
                            callee,
                            args: self.arena.alloc_slice_copy(&args),
                        }),
                        span,
                    });
                    self.push_operand(yard, Some(expr), span)?;
                }

                yard.state = State::Binary;
                Some(Step::Continue)
            }

            TokenKind::Comma => {
                while let Some(entry) = yard.operators.last().copied() {
                    if matches!(entry.marker, Marker::LParen | Marker::Call) {
                        break;
                    }
                    self.pop_operator(yard)?;
                }

                match yard.operators.last().copied() {
                    None => {
                        self.error = true;
                        Diagnostic::error("use of comma outside of function arguments")
                            .with_snippet(tk.span, "here")
                            .with_note("tuples do not exist in Rime")
                            .emit(&self.renderer);
                        None
                    }

                    Some(entry) if entry.marker == Marker::LParen => {
                        self.error = true;
                        Diagnostic::error("unclosed bracket")
                            .with_snippet(entry.span, "this bracket was never closed")
                            .with_info_snippet(
                                Span::point(tk.span.start),
                                "perhaps you forgot to add a ')' here",
                            )
                            .with_help("expected a ')'")
                            .with_note("tuples do not exist in Rime")
                            .emit(&self.renderer);
                        None
                    }

                    Some(_) => {
                        yard.state = State::Unary;
                        Some(Step::Continue)
                    }
                }
            }

            _ => Some(Step::Stop),
        }
    }

    /// Drains the stacks once the end of the expression is reached.
    /// `stop` is the token the expression ended at (possibly EOF).
    fn finish_expression(&mut self, mut yard: Yard<'a>, stop: Token) -> Option<&'a Expr<'a>> {
        while let Some(entry) = yard.operators.last().copied() {
            if matches!(entry.marker, Marker::LParen | Marker::Call) {
                break;
            }
            self.pop_operator(&mut yard)?;
        }

        if let Some(entry) = yard
            .operators
            .iter()
            .rev()
            .find(|e| matches!(e.marker, Marker::LParen | Marker::Call))
            .copied()
        {
            self.error = true;
            Diagnostic::error("unclosed bracket")
                .with_snippet(entry.span, "this bracket was never closed")
                .with_info_snippet(
                    Span::point(stop.span.start),
                    "perhaps you forgot to add a ')' here",
                )
                .with_help("expected a ')'")
                .emit(&self.renderer);
            return None;
        }

        match yard.operands.pop() {
            Some(Some(expr)) if yard.operands.is_empty() => Some(expr),
            None => {
                // The expression ended before its first term.
                self.report_unexpected(stop, "a term", None);
                None
            }
            _ => self.malformed(stop.span),
        }
    }

    /// Pushes `op`, first popping everything that binds at least as
    /// tightly.
    fn push_operator(&mut self, yard: &mut Yard<'a>, op: Op, span: Span) -> Option<()> {
        while should_pop(yard, op) {
            self.pop_operator(yard)?;
        }

        self.push_marker(yard, Marker::Op(op), span)
    }

    /// Pops one operator, synthesizes its [`Operation`] node, and pushes
    /// the result back as an operand.
    fn pop_operator(&mut self, yard: &mut Yard<'a>) -> Option<()> {
        let entry = yard.operators.pop()?;

        let op = match entry.marker {
            Marker::Op(op) => op,
            _ => return self.malformed(entry.span),
        };

        let expr = if op.is_unary() {
            let operand = match yard.operands.pop() {
                Some(Some(operand)) => operand,
                _ => return self.missing_term(entry.span),
            };

            Expr {
                kind: ExprKind::Op(Operation {
                    op,
                    lhs: operand,
                    rhs: None,
                }),
                span: entry.span.to(operand.span),
            }
        } else {
            let rhs = match yard.operands.pop() {
                Some(Some(rhs)) => rhs,
                _ => return self.missing_term(entry.span),
            };
            let lhs = match yard.operands.pop() {
                Some(Some(lhs)) => lhs,
                _ => return self.missing_term(entry.span),
            };

            Expr {
                kind: ExprKind::Op(Operation {
                    op,
                    lhs,
                    rhs: Some(rhs),
                }),
                span: lhs.span.to(rhs.span),
            }
        };

        let expr = &*self.arena.alloc(expr);
        yard.operands.push(Some(expr));
        Some(())
    }

    fn push_operand(
        &mut self,
        yard: &mut Yard<'a>,
        operand: Option<&'a Expr<'a>>,
        span: Span,
    ) -> Option<()> {
        if yard.operands.len() == MAX_DEPTH {
            return self.too_deep(span);
        }

        yard.operands.push(operand);
        Some(())
    }

    fn push_marker(&mut self, yard: &mut Yard<'a>, marker: Marker, span: Span) -> Option<()> {
        if yard.operators.len() == MAX_DEPTH {
            return self.too_deep(span);
        }

        yard.operators.push(OpEntry { marker, span });
        Some(())
    }

    fn too_deep<T>(&mut self, span: Span) -> Option<T> {
        self.error = true;
        Diagnostic::error("expression too deeply nested")
            .with_snippet(span, "nesting exceeds the expression stack depth")
            .emit(&self.renderer);
        None
    }

    fn missing_term<T>(&mut self, span: Span) -> Option<T> {
        self.error = true;
        Diagnostic::error("expected a term")
            .with_snippet(span, "this operator is missing an operand")
            .emit(&self.renderer);
        None
    }

    /// Should be unreachable on any input the automaton accepts.
    fn malformed<T>(&mut self, span: Span) -> Option<T> {
        self.error = true;
        Diagnostic::error("malformed expression")
            .with_snippet(span, "while parsing this")
            .emit(&self.renderer);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn parse_expr<'a>(arena: &'a Bump, source: &'a str) -> Option<&'a Expr<'a>> {
        Parser::new(arena, source).parse_expression()
    }

    fn symbol(op: Op) -> &'static str {
        match op {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Or => "|",
            Op::Xor => "^",
            Op::And => "&",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Neg => "-",
        }
    }

    /// Pretty-prints with parentheses at every operation node, making the
    /// parse shape visible.
    fn pretty(expr: &Expr<'_>) -> String {
        match expr.kind {
            ExprKind::Int(value) => value.to_string(),
            ExprKind::Ident(ident) => ident.name.to_string(),
            ExprKind::Call(call) => {
                let args: Vec<String> = call.args.iter().map(|a| pretty(a)).collect();
                format!("{}({})", pretty(call.callee), args.join(", "))
            }
            ExprKind::Op(op) => match op.rhs {
                Some(rhs) => format!("({} {} {})", pretty(op.lhs), symbol(op.op), pretty(rhs)),
                None => format!("({}{})", symbol(op.op), pretty(op.lhs)),
            },
        }
    }

    fn shape(source: &str) -> String {
        let arena = Bump::new();
        let expr = parse_expr(&arena, source).expect("expression should parse");
        pretty(expr)
    }

    #[test]
    fn test_single_term() {
        assert_eq!(shape("42"), "42");
        assert_eq!(shape("x"), "x");
    }

    #[test]
    fn test_precedence() {
        assert_eq!(shape("2 + 3 * 4"), "(2 + (3 * 4))");
        assert_eq!(shape("2 * 3 + 4"), "((2 * 3) + 4)");
        assert_eq!(shape("1 < 2 + 3"), "(1 < (2 + 3))");
        assert_eq!(shape("1 + 2 == 3 + 4"), "((1 + 2) == (3 + 4))");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(shape("1 - 2 - 3"), "((1 - 2) - 3)");
        assert_eq!(shape("1 - 2 + 3"), "((1 - 2) + 3)");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(shape("(2 + 3) * 4"), "((2 + 3) * 4)");
        assert_eq!(shape("((1))"), "1");
    }

    #[test]
    fn test_unary_negation() {
        assert_eq!(shape("-x"), "(-x)");
        assert_eq!(shape("- - x"), "(-(-x))");
        // Negation binds tighter than multiplication.
        assert_eq!(shape("-x * y"), "((-x) * y)");
        assert_eq!(shape("1 - -2"), "(1 - (-2))");
    }

    #[test]
    fn test_call_with_arguments() {
        assert_eq!(shape("f(1)"), "f(1)");
        assert_eq!(shape("f(1, 2 + 3, x)"), "f(1, (2 + 3), x)");
        assert_eq!(shape("f(g(1), 2)"), "f(g(1), 2)");
        assert_eq!(shape("f(1) + 2"), "(f(1) + 2)");
    }

    #[test]
    fn test_call_span_covers_closing_paren() {
        let arena = Bump::new();
        let src = "f(1, 2)";
        let expr = parse_expr(&arena, src).unwrap();
        assert_eq!(expr.span.slice(src), "f(1, 2)");
    }

    #[test]
    fn test_binary_span_is_operand_union() {
        let arena = Bump::new();
        let src = "1 + 2 * 3";
        let expr = parse_expr(&arena, src).unwrap();
        assert_eq!(expr.span.slice(src), "1 + 2 * 3");
    }

    #[test]
    fn test_unary_span_includes_operator() {
        let arena = Bump::new();
        let src = "- 42";
        let expr = parse_expr(&arena, src).unwrap();
        assert_eq!(expr.span.slice(src), "- 42");
    }

    #[test]
    fn test_stops_cleanly_at_semicolon() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "1 + 2; rest");
        let expr = parser.parse_expression().unwrap();
        assert!(matches!(expr.kind, ExprKind::Op(_)));
        // The ';' is left for the caller.
        assert_eq!(parser.peek().unwrap().kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_zero_argument_call_is_rejected() {
        // The unary state wants a term after the call's '('.
        let arena = Bump::new();
        assert!(parse_expr(&arena, "f()").is_none());
    }

    #[test]
    fn test_string_in_expression_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "\"hi\" + 1").is_none());
    }

    #[test]
    fn test_comma_outside_call_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "1, 2").is_none());
    }

    #[test]
    fn test_comma_inside_grouping_parens_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "(1, 2)").is_none());
    }

    #[test]
    fn test_unclosed_bracket_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "(1 + 2").is_none());
        let arena = Bump::new();
        assert!(parse_expr(&arena, "f(1, 2").is_none());
    }

    #[test]
    fn test_trailing_operator_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "1 +").is_none());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "").is_none());
    }

    #[test]
    fn test_deeply_nested_expression_overflows() {
        let arena = Bump::new();
        let source = format!("{}x", "-".repeat(MAX_DEPTH + 1));
        let leaked: &str = arena.alloc_str(&source);
        assert!(Parser::new(&arena, leaked).parse_expression().is_none());
    }

    #[test]
    fn test_reasonably_deep_expression_parses() {
        let arena = Bump::new();
        let source = format!("{}x{}", "(".repeat(50), ")".repeat(50));
        let leaked: &str = arena.alloc_str(&source);
        assert!(Parser::new(&arena, leaked).parse_expression().is_some());
    }

    #[test]
    fn test_integer_overflow_is_rejected() {
        let arena = Bump::new();
        assert!(parse_expr(&arena, "99999999999999999999").is_none());
    }

    #[test]
    fn test_i64_max_parses() {
        let arena = Bump::new();
        let expr = parse_expr(&arena, "9223372036854775807").unwrap();
        assert!(matches!(expr.kind, ExprKind::Int(i64::MAX)));
    }
}
