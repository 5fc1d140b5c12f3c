//! The abstract syntax tree.
//!
//! All nodes live in a `bumpalo` arena owned by the driver and borrow the
//! source buffer for identifier and string text; the tree is dropped en
//! bloc with the arena after emission. A single lifetime `'a` covers both
//! borrows, since the source always outlives the arena.

use rimec_lex::TokenKind;
use rimec_util::Span;

/// A borrowed identifier with its source location.
///
/// Equality is byte-wise comparison of the name; the span is carried for
/// diagnostics only.
#[derive(Clone, Copy, Debug)]
pub struct Ident<'a> {
    pub name: &'a str,
    pub span: Span,
}

impl<'a> PartialEq for Ident<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<'a> Eq for Ident<'a> {}

/// A parsed source file: an ordered sequence of top-level constants.
#[derive(Debug)]
pub struct Ast<'a> {
    pub consts: Vec<Const<'a>>,
}

/// A top-level constant definition `name :: ...`.
#[derive(Clone, Copy, Debug)]
pub struct Const<'a> {
    pub ident: Ident<'a>,
    pub kind: ConstKind<'a>,
}

/// What a constant is bound to.
#[derive(Clone, Copy, Debug)]
pub enum ConstKind<'a> {
    /// A procedure with a body.
    Proc(Proc<'a>),
    /// A forward declaration `name :: proc();` - satisfies lookup, emits
    /// nothing.
    ProcDecl,
    /// A compile-time expression. Only bare integer literals survive
    /// emission; anything else is rejected there.
    Expr(&'a Expr<'a>),
    /// A string constant; the text excludes the quotes.
    Str(&'a str),
}

/// A procedure definition. Procedures currently take no arguments.
#[derive(Clone, Copy, Debug)]
pub struct Proc<'a> {
    pub params: &'a [Ident<'a>],
    pub body: &'a [Stmt<'a>],
}

/// A statement.
#[derive(Clone, Copy, Debug)]
pub enum Stmt<'a> {
    /// An expression evaluated for its side effects; the result is
    /// discarded.
    Expr(&'a Expr<'a>),
    /// `return;` or `return expr;`
    Return(Option<&'a Expr<'a>>),
    /// `name := expr;` - declares a new local.
    Let(Assign<'a>),
    /// `name = expr;` - assigns to an existing variable.
    Assign(Assign<'a>),
    /// An `if` / `else if` / `else` chain.
    If(IfChain<'a>),
}

/// The target and value of a `let` or assignment statement.
#[derive(Clone, Copy, Debug)]
pub struct Assign<'a> {
    pub ident: Ident<'a>,
    pub value: &'a Expr<'a>,
}

/// An `if` chain: one or more conditional branches plus an optional else
/// body (empty slice when absent).
#[derive(Clone, Copy, Debug)]
pub struct IfChain<'a> {
    pub branches: &'a [IfBranch<'a>],
    pub else_body: &'a [Stmt<'a>],
}

/// A single `if cond { ... }` branch.
#[derive(Clone, Copy, Debug)]
pub struct IfBranch<'a> {
    pub cond: &'a Expr<'a>,
    pub body: &'a [Stmt<'a>],
}

/// An expression with its source span.
#[derive(Clone, Copy, Debug)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub span: Span,
}

/// An expression node.
#[derive(Clone, Copy, Debug)]
pub enum ExprKind<'a> {
    /// An integer literal.
    Int(i64),
    /// A variable or constant reference.
    Ident(Ident<'a>),
    /// A function call.
    Call(Call<'a>),
    /// A unary or binary operation.
    Op(Operation<'a>),
}

/// A function call; the callee is itself an expression.
#[derive(Clone, Copy, Debug)]
pub struct Call<'a> {
    pub callee: &'a Expr<'a>,
    pub args: &'a [&'a Expr<'a>],
}

/// An operation; `rhs` is `None` for the unary negation.
#[derive(Clone, Copy, Debug)]
pub struct Operation<'a> {
    pub op: Op,
    pub lhs: &'a Expr<'a>,
    pub rhs: Option<&'a Expr<'a>>,
}

/// Expression operators.
///
/// `Div`, `Rem`, and the bitwise operators are reserved alongside their
/// tokens: the tables below cover them, the scanner never produces them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `&`
    And,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// Unary `-`
    Neg,
}

impl Op {
    /// Maps a binary operator token to its operator. `Neg` has no token of
    /// its own; it is synthesized by the expression parser from a `-` in
    /// operand position.
    pub fn from_token(kind: TokenKind) -> Option<Op> {
        Some(match kind {
            TokenKind::EqEq => Op::Eq,
            TokenKind::NotEq => Op::Ne,
            TokenKind::Gt => Op::Gt,
            TokenKind::Lt => Op::Lt,
            TokenKind::GtEq => Op::Ge,
            TokenKind::LtEq => Op::Le,
            TokenKind::Pipe => Op::Or,
            TokenKind::Caret => Op::Xor,
            TokenKind::Ampersand => Op::And,
            TokenKind::Shl => Op::Shl,
            TokenKind::Shr => Op::Shr,
            TokenKind::Plus => Op::Add,
            TokenKind::Minus => Op::Sub,
            TokenKind::Star => Op::Mul,
            TokenKind::Slash => Op::Div,
            TokenKind::Percent => Op::Rem,
            _ => return None,
        })
    }

    /// Binding strength; higher binds tighter.
    ///
    /// ```
    /// use rimec_par::ast::Op;
    ///
    /// assert!(Op::Mul.precedence() > Op::Add.precedence());
    /// assert!(Op::Add.precedence() > Op::Eq.precedence());
    /// ```
    pub fn precedence(self) -> u8 {
        match self {
            Op::Eq | Op::Ne | Op::Gt | Op::Lt | Op::Ge | Op::Le => 1,
            Op::Or => 2,
            Op::Xor => 3,
            Op::And => 4,
            Op::Shl | Op::Shr => 5,
            Op::Add | Op::Sub => 6,
            Op::Mul | Op::Div | Op::Rem => 7,
            Op::Neg => 8,
        }
    }

    /// All binary operators associate to the left; negation is the only
    /// right-associative operator.
    pub fn is_left_associative(self) -> bool {
        self != Op::Neg
    }

    /// Returns true for operators taking a single operand.
    pub fn is_unary(self) -> bool {
        self == Op::Neg
    }
}
