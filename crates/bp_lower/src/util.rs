//! Small analyses and rewrites shared by several passes.

use std::rc::Rc;

use bp_ast::factory::temp_expr;
use bp_ast::*;

use crate::temps::TempVars;
use crate::transform::{self, Transformer};
use crate::visit::{self, Visit};

/// Looks for `yield`/`await` belonging to the current function.
#[derive(Default)]
struct FindSuspend {
    found: bool,
}

impl Visit for FindSuspend {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.found {
            return;
        }
        match &expr.kind {
            ExprKind::Yield { .. } | ExprKind::Await(_) => self.found = true,
            _ => visit::walk_expr(self, expr),
        }
    }

    fn visit_function(&mut self, _function: &Function) {}

    fn visit_arrow(&mut self, _arrow: &Arrow) {}
}

pub fn stmts_contain_suspend(stmts: &[StmtRef]) -> bool {
    let mut finder = FindSuspend::default();
    visit::walk_stmts(&mut finder, stmts);
    finder.found
}

pub fn stmt_contains_suspend(stmt: &Stmt) -> bool {
    let mut finder = FindSuspend::default();
    finder.visit_stmt(stmt);
    finder.found
}

pub fn expr_contains_suspend(expr: &Expr) -> bool {
    let mut finder = FindSuspend::default();
    finder.visit_expr(expr);
    finder.found
}

/// Looks for array and object patterns belonging to the current function.
#[derive(Default)]
struct FindDestructuring {
    found: Option<Span>,
}

impl FindDestructuring {
    fn check(&mut self, pat: &Pat, binding: bool) {
        match pat {
            Pat::Array(ArrayPat { span, .. }) | Pat::Object(ObjectPat { span, .. }) => {
                self.found.get_or_insert(*span);
            }
            _ => visit::walk_pat(self, pat, binding),
        }
    }
}

impl Visit for FindDestructuring {
    fn visit_binding_pat(&mut self, pat: &Pat) {
        self.check(pat, true);
    }

    fn visit_assign_pat(&mut self, pat: &Pat) {
        self.check(pat, false);
    }

    fn visit_function(&mut self, _function: &Function) {}

    fn visit_arrow(&mut self, _arrow: &Arrow) {}
}

/// The first destructuring pattern in `stmts`, outside nested functions.
pub fn find_destructuring(stmts: &[StmtRef]) -> Option<Span> {
    let mut finder = FindDestructuring::default();
    visit::walk_stmts(&mut finder, stmts);
    finder.found
}

/// Looks for `this` and `arguments` as seen from the current function;
/// arrows share both with their enclosing function.
#[derive(Default)]
struct FindContext {
    this: bool,
    arguments: bool,
}

impl Visit for FindContext {
    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::This => self.this = true,
            _ => visit::walk_expr(self, expr),
        }
    }

    fn visit_ident_ref(&mut self, ident: &Ident) {
        if ident.is("arguments") {
            self.arguments = true;
        }
    }

    fn visit_function(&mut self, _function: &Function) {}
}

/// Whether `this`/`arguments` are used by `stmts`, looking through arrows.
pub fn uses_this_or_arguments(stmts: &[StmtRef]) -> (bool, bool) {
    let mut finder = FindContext::default();
    visit::walk_stmts(&mut finder, stmts);
    (finder.this, finder.arguments)
}

pub fn expr_uses_this_or_arguments(expr: &Expr) -> (bool, bool) {
    let mut finder = FindContext::default();
    finder.visit_expr(expr);
    (finder.this, finder.arguments)
}

struct AlphaRename {
    this: Option<TempToken>,
    arguments: Option<TempToken>,
}

impl Transformer for AlphaRename {
    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        match (&expr.kind, &self.this, &self.arguments) {
            (ExprKind::This, Some(token), _) => temp_expr(token),
            (ExprKind::Ident(ident), _, Some(token)) if ident.is("arguments") => temp_expr(token),
            _ => transform::walk_expr(self, expr),
        }
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        function.clone()
    }
}

/// Rewrites `this` and `arguments` in code that is about to move into a new
/// function, so they keep referring to the current function's values. The
/// `_this`/`_arguments` temporaries are declared in the innermost body of
/// `temps`, and only when used.
pub fn alpha_rename_this_and_arguments(temps: &mut TempVars, stmts: &[StmtRef]) -> Vec<StmtRef> {
    let (this, arguments) = uses_this_or_arguments(stmts);
    if !this && !arguments {
        return stmts.to_vec();
    }
    rename_this_and_arguments(
        stmts,
        this.then(|| temps.this_var()),
        arguments.then(|| temps.arguments_var()),
    )
}

/// Replaces `this` and `arguments` in `stmts` with the given temporaries,
/// looking through arrows but not functions.
pub fn rename_this_and_arguments(
    stmts: &[StmtRef],
    this: Option<TempToken>,
    arguments: Option<TempToken>,
) -> Vec<StmtRef> {
    if this.is_none() && arguments.is_none() {
        return stmts.to_vec();
    }
    let mut renamer = AlphaRename { this, arguments };
    renamer.transform_stmt_list(stmts)
}

/// Same as [`alpha_rename_this_and_arguments`] for function parameters.
pub fn alpha_rename_params(temps: &mut TempVars, params: &[Param]) -> Vec<Param> {
    let mut this = false;
    let mut arguments = false;
    for default in params.iter().filter_map(|p| p.default.as_ref()) {
        let (t, a) = expr_uses_this_or_arguments(default);
        this |= t;
        arguments |= a;
    }
    if !this && !arguments {
        return params.to_vec();
    }
    let mut renamer = AlphaRename {
        this: this.then(|| temps.this_var()),
        arguments: arguments.then(|| temps.arguments_var()),
    };
    params
        .iter()
        .map(|p| Param {
            target: p.target.clone(),
            default: p.default.as_ref().map(|d| renamer.transform_expr(d)),
        })
        .collect()
}

/// Expressions that may be evaluated where they stand without a temporary:
/// reading them once more has no effect the program could observe.
pub fn is_cheap(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Array(_)
            | ExprKind::Call { .. }
            | ExprKind::Ident(_)
            | ExprKind::Lit(_)
            | ExprKind::Member { .. }
            | ExprKind::Object(_)
            | ExprKind::Paren(_)
            | ExprKind::This
    )
}

/// The statements of an arrow body, with an expression body as `return`.
pub fn arrow_body_stmts(body: &ArrowBody) -> Vec<StmtRef> {
    match body {
        ArrowBody::Block(stmts) => stmts.clone(),
        ArrowBody::Expr(e) => vec![bp_ast::factory::return_stmt(Some(e.clone()))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temps::TempAllocator;

    fn body(source: &str) -> Vec<StmtRef> {
        bp_parser::parse_script(source).expect("parse").body
    }

    #[test]
    fn suspend_points_stop_at_functions() {
        assert!(stmts_contain_suspend(&body("function* g() { if (a) { yield 1; } }")
            .iter()
            .flat_map(|s| match &s.kind {
                StmtKind::Function(f) => f.body.clone(),
                _ => vec![],
            })
            .collect::<Vec<_>>()));
        assert!(!stmts_contain_suspend(&body(
            "function* g() { yield 1; } async function f() { await 1; }"
        )));
    }

    #[test]
    fn context_looks_through_arrows_only() {
        assert_eq!(uses_this_or_arguments(&body("() => this;")), (true, false));
        assert_eq!(
            uses_this_or_arguments(&body("function f() { return this + arguments; }")),
            (false, false)
        );
        assert_eq!(uses_this_or_arguments(&body("arguments[0];")), (false, true));
    }

    #[test]
    fn alpha_renaming_declares_only_what_is_used() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        let out = alpha_rename_this_and_arguments(
            &mut temps,
            &body("this.x; (() => this)(); (function() { return this; });"),
        );
        let decl = temps.pop_scope().expect("declaration");
        let printed = bp_codegen::print_program(&Program {
            kind: ProgramKind::Script,
            body: [vec![decl], out].concat(),
        });
        let expected = bp_parser::parse_script(
            "var $__0 = this; $__0.x; (() => $__0)(); (function() { return this; });",
        )
        .expect("parse");
        assert_eq!(printed, bp_codegen::print_program(&expected));
    }
}
