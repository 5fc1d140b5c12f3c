//! The SSA text emitter.
//!
//! Each constant is emitted into its own buffer and appended to the
//! output once finished; a global referenced mid-emission is emitted
//! straight into the output, so dependencies always land before their
//! dependents. Temporary (`t`) and label (`l`) counters restart at zero
//! for every constant, giving each procedure independent numbering.

use std::fmt::Write as _;

use thiserror::Error;

use rimec_par::ast::{
    Assign, Ast, Const, ConstKind, Expr, ExprKind, Ident, IfChain, Op, Operation, Proc, Stmt,
};
use rimec_util::{Diagnostic, Renderer};

use crate::scope::{ScopeTree, VarFlags, Variable};

/// An emission error. The diagnostic has already been written to stderr.
#[derive(Debug, Error)]
#[error("emit error")]
pub struct EmitError;

/// The SSA instruction implementing each operator.
fn opcode(op: Op) -> &'static str {
    match op {
        Op::Eq => "ceql",
        Op::Ne => "cnel",
        Op::Gt => "csgtl",
        Op::Lt => "csltl",
        Op::Ge => "csgel",
        Op::Le => "cslel",
        Op::Or => "or",
        Op::Xor => "xor",
        Op::And => "and",
        Op::Shl => "shl",
        Op::Shr => "shr",
        Op::Add => "add",
        Op::Sub => "sub",
        Op::Mul => "mul",
        Op::Div => "div",
        Op::Rem => "rem",
        Op::Neg => "neg",
    }
}

/// The most recently emitted expression result: its temporary id and
/// whether it still holds an address that needs a `loadl`.
#[derive(Clone, Copy, Debug, Default)]
struct Temp {
    id: u64,
    load: bool,
}

/// Lowers `ast` to SSA text.
pub fn emit_ast<'a>(source: &'a str, ast: &'a Ast<'a>) -> Result<String, EmitError> {
    Emitter::new(source).emit(ast)
}

struct Emitter<'a> {
    renderer: Renderer<'a>,
    scopes: ScopeTree<'a>,
    /// Finished constants, in dependency order.
    output: String,
    /// Result of the last emitted expression.
    temp: Temp,
    /// Next temporary id, per procedure.
    t: u64,
    /// Next label id, per procedure.
    l: u64,
}

impl<'a> Emitter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            renderer: Renderer::new(source),
            scopes: ScopeTree::new(),
            output: String::new(),
            temp: Temp::default(),
            t: 0,
            l: 0,
        }
    }

    fn emit(mut self, ast: &'a Ast<'a>) -> Result<String, EmitError> {
        for c in &ast.consts {
            let var = Variable {
                flags: VarFlags::GLOBAL,
                global: Some(c),
            };

            if let Some(prev) = self.scopes.insert(c.ident.name, var) {
                let mut diag = Diagnostic::error(format!("redefinition of '{}'", c.ident.name))
                    .with_snippet(c.ident.span, "defined again here");

                if let Some(first) = prev.global {
                    diag = diag.with_info_snippet(first.ident.span, "first defined here");
                }

                diag.emit(&self.renderer);
                return Err(EmitError);
            }
        }

        // Declaration order, for deterministic output. Constants pulled in
        // early as dependencies are skipped when their own turn comes.
        for c in &ast.consts {
            let visited = self
                .scopes
                .get_immediate(c.ident.name)
                .is_some_and(|var| var.flags.contains(VarFlags::VISITED));
            if visited {
                continue;
            }

            self.mark(c.ident.name, VarFlags::VISITING);
            self.emit_constant(c)?;
            self.finish_global(c);
        }

        Ok(self.output)
    }

    /// Emits one constant into its own buffer, then appends it to the
    /// output. Saves and restores the counters around the emission so a
    /// procedure pulled in as a dependency numbers from zero.
    fn emit_constant(&mut self, c: &'a Const<'a>) -> Result<(), EmitError> {
        let (t, l) = (self.t, self.l);
        self.t = 0;
        self.l = 0;

        let mut buf = String::new();

        match c.kind {
            ConstKind::Proc(proc) => self.emit_proc(&mut buf, c.ident, proc)?,

            // Forward declarations satisfy lookup and emit nothing.
            ConstKind::ProcDecl => {}

            ConstKind::Expr(expr) => {
                let ExprKind::Int(value) = expr.kind else {
                    Diagnostic::error("expressions cannot be assigned to constants")
                        .with_snippet(expr.span, "this expression")
                        .with_help("only literals can be assigned to constants")
                        .emit(&self.renderer);
                    return Err(EmitError);
                };

                let _ = writeln!(buf, "data ${} = {{ l {} }}", c.ident.name, value);
            }

            ConstKind::Str(text) => {
                let _ = writeln!(buf, "data ${} = {{ b \"{}\", b 0 }}", c.ident.name, text);
            }
        }

        self.output.push_str(&buf);

        self.t = t;
        self.l = l;

        Ok(())
    }

    fn emit_proc(&mut self, out: &mut String, ident: Ident<'a>, proc: Proc<'a>) -> Result<(), EmitError> {
        let _ = writeln!(out, "export function l ${} ( ) {{", ident.name);
        let _ = writeln!(out, "@start");

        self.scopes.enter();
        for stmt in proc.body {
            self.emit_stmt(out, stmt)?;
        }
        self.scopes.exit();

        let _ = writeln!(out, "}}");

        Ok(())
    }

    fn emit_stmt(&mut self, out: &mut String, stmt: &Stmt<'a>) -> Result<(), EmitError> {
        match *stmt {
            Stmt::Expr(expr) => {
                // Evaluated for side effects; the result temporary is
                // simply never used again.
                self.emit_expr(out, expr)?;
            }

            Stmt::Return(None) => {
                let _ = writeln!(out, "    ret");
            }

            Stmt::Return(Some(expr)) => {
                self.emit_expr(out, expr)?;
                let value = self.materialize(out, self.temp);
                let _ = writeln!(out, "    ret %t_{value}");
            }

            Stmt::Let(assign) => self.emit_let(out, assign)?,

            Stmt::Assign(assign) => self.emit_assign(out, assign)?,

            Stmt::If(chain) => self.emit_if(out, chain)?,
        }

        Ok(())
    }

    /// `name := expr` - the name must be new in the current scope; the
    /// value lives in a fresh 8-byte stack cell.
    fn emit_let(&mut self, out: &mut String, assign: Assign<'a>) -> Result<(), EmitError> {
        if self.scopes.get_immediate(assign.ident.name).is_some() {
            Diagnostic::error(format!("redefinition of '{}'", assign.ident.name))
                .with_snippet(assign.ident.span, "already defined in this scope")
                .with_help("assign with '=' instead, or pick another name")
                .emit(&self.renderer);
            return Err(EmitError);
        }

        self.emit_expr(out, assign.value)?;

        self.scopes.insert(
            assign.ident.name,
            Variable {
                flags: VarFlags::LOAD,
                global: None,
            },
        );

        let _ = writeln!(out, "    %{} =l alloc8 8", assign.ident.name);
        let _ = writeln!(out, "    storel %t_{}, %{}", self.temp.id, assign.ident.name);

        Ok(())
    }

    /// `name = expr` - the name must resolve somewhere up the chain.
    fn emit_assign(&mut self, out: &mut String, assign: Assign<'a>) -> Result<(), EmitError> {
        if self.scopes.find(assign.ident.name).is_none() {
            Diagnostic::error("undefined identifier")
                .with_snippet(assign.ident.span, "not found in this scope")
                .with_help("declare it first with ':='")
                .emit(&self.renderer);
            return Err(EmitError);
        }

        self.emit_expr(out, assign.value)?;

        let _ = writeln!(out, "    storel %t_{}, %{}", self.temp.id, assign.ident.name);

        Ok(())
    }

    /// The if-chain label machine: every arm jumps to one shared join
    /// label, and the join label's id is allocated before any branch
    /// labels.
    fn emit_if(&mut self, out: &mut String, chain: IfChain<'a>) -> Result<(), EmitError> {
        let join = self.l;
        self.l += 1;

        for branch in chain.branches {
            self.emit_expr(out, branch.cond)?;
            let cond = self.materialize(out, self.temp);

            let then_label = self.l;
            let else_label = self.l + 1;
            self.l += 2;

            let _ = writeln!(out, "    jnz %t_{cond}, @L_{then_label}, @L_{else_label}");
            let _ = writeln!(out, "@L_{then_label}");

            self.scopes.enter();
            for stmt in branch.body {
                self.emit_stmt(out, stmt)?;
            }
            self.scopes.exit();

            let _ = writeln!(out, "    jmp @L_{join}");
            let _ = writeln!(out, "@L_{else_label}");
        }

        self.scopes.enter();
        for stmt in chain.else_body {
            self.emit_stmt(out, stmt)?;
        }
        self.scopes.exit();

        // The jmp out of the (possibly empty) else arm gives the join
        // label a predecessor in every path.
        let _ = writeln!(out, "    jmp @L_{join}");
        let _ = writeln!(out, "@L_{join}");

        Ok(())
    }

    fn emit_expr(&mut self, out: &mut String, expr: &'a Expr<'a>) -> Result<(), EmitError> {
        match expr.kind {
            ExprKind::Int(value) => {
                let _ = writeln!(out, "    %t_{} =l copy {}", self.t, value);
                self.temp = Temp {
                    id: self.t,
                    load: false,
                };
                self.t += 1;
            }

            ExprKind::Ident(ident) => {
                let var = self.resolve(ident)?;
                let sigil = if var.flags.contains(VarFlags::GLOBAL) {
                    '$'
                } else {
                    '%'
                };

                let _ = writeln!(out, "    %t_{} =l copy {}{}", self.t, sigil, ident.name);
                // The new temporary inherits the variable's address-ness.
                self.temp = Temp {
                    id: self.t,
                    load: var.flags.contains(VarFlags::LOAD),
                };
                self.t += 1;
            }

            ExprKind::Call(call) => {
                self.emit_expr(out, call.callee)?;
                let callee = self.materialize(out, self.temp);

                // Argument loads interleave into the body; only the
                // argument list text is deferred.
                let mut arg_list = String::new();
                for &arg in call.args {
                    self.emit_expr(out, arg)?;
                    let value = self.materialize(out, self.temp);
                    let _ = write!(arg_list, "l %t_{value}, ");
                }

                let _ = writeln!(out, "    %t_{} =l call %t_{} ( {})", self.t, callee, arg_list);
                self.temp = Temp {
                    id: self.t,
                    load: false,
                };
                self.t += 1;
            }

            ExprKind::Op(operation) => self.emit_operation(out, operation)?,
        }

        Ok(())
    }

    fn emit_operation(&mut self, out: &mut String, operation: Operation<'a>) -> Result<(), EmitError> {
        if operation.op.is_unary() {
            self.emit_expr(out, operation.lhs)?;
            let value = self.materialize(out, self.temp);

            let _ = writeln!(out, "    %t_{} =l {} %t_{}", self.t, opcode(operation.op), value);
            self.temp = Temp {
                id: self.t,
                load: false,
            };
            self.t += 1;

            return Ok(());
        }

        self.emit_expr(out, operation.lhs)?;
        let lhs = self.materialize(out, self.temp);

        let Some(rhs_expr) = operation.rhs else {
            return Err(EmitError);
        };
        self.emit_expr(out, rhs_expr)?;
        let rhs = self.materialize(out, self.temp);

        let _ = writeln!(
            out,
            "    %t_{} =l {} %t_{}, %t_{}",
            self.t,
            opcode(operation.op),
            lhs,
            rhs
        );
        self.temp = Temp {
            id: self.t,
            load: false,
        };
        self.t += 1;

        Ok(())
    }

    /// Resolves an identifier at a use site. A global that has not been
    /// emitted yet is emitted now, from the global scope; seeing it gray
    /// (`VISITING`) instead means its definition depends on itself.
    fn resolve(&mut self, ident: Ident<'a>) -> Result<Variable<'a>, EmitError> {
        let Some(var) = self.scopes.find(ident.name) else {
            Diagnostic::error("undefined identifier")
                .with_snippet(ident.span, "not found in this scope")
                .emit(&self.renderer);
            return Err(EmitError);
        };

        if !var.flags.contains(VarFlags::GLOBAL) || var.flags.contains(VarFlags::VISITED) {
            return Ok(var);
        }

        if var.flags.contains(VarFlags::VISITING) {
            Diagnostic::error("constant definition cycle")
                .with_snippet(ident.span, "this reference closes the cycle")
                .with_note("constants are emitted in dependency order, which a cycle makes impossible")
                .emit(&self.renderer);
            return Err(EmitError);
        }

        let Some(c) = var.global else {
            return Err(EmitError);
        };

        self.mark(ident.name, VarFlags::VISITING);

        let saved = self.scopes.current();
        self.scopes.set_current(ScopeTree::GLOBAL);
        self.emit_constant(c)?;
        self.scopes.set_current(saved);

        self.finish_global(c);

        match self.scopes.find(ident.name) {
            Some(var) => Ok(var),
            None => Err(EmitError),
        }
    }

    /// Sets `flag` on the global `name`.
    fn mark(&mut self, name: &str, flag: VarFlags) {
        if let Some(var) = self.scopes.get_global_mut(name) {
            var.flags.insert(flag);
        }
    }

    /// Blackens a just-emitted global: gray off, black on, and integer
    /// globals become loads (their data cell holds the value, so uses
    /// must dereference; strings are referenced by address as-is).
    fn finish_global(&mut self, c: &Const<'a>) {
        if let Some(var) = self.scopes.get_global_mut(c.ident.name) {
            var.flags.remove(VarFlags::VISITING);
            var.flags.insert(VarFlags::VISITED);

            if matches!(c.kind, ConstKind::Expr(_)) {
                var.flags.insert(VarFlags::LOAD);
            }
        }
    }

    /// Dereferences an address-holding temporary; a value temporary is
    /// returned unchanged.
    fn materialize(&mut self, out: &mut String, temp: Temp) -> u64 {
        if !temp.load {
            return temp.id;
        }

        let _ = writeln!(out, "    %t_{} =l loadl %t_{}", self.t, temp.id);
        let id = self.t;
        self.t += 1;
        id
    }
}
