//! Temporary identifiers.
//!
//! [`TempAllocator`] mints tokens with a compilation-wide counter that only
//! ever grows. [`TempVars`] is the per-pass helper that hoists temporaries
//! into a single `var` statement at the top of the nearest function, script
//! or module body. The final text of each token is chosen later by
//! [`crate::rename`].
//!
//! Hoisted temporaries requested inside an expression scope go back to a
//! per-body pool when the scope is popped, and a later request for the same
//! stem takes the pooled token instead of declaring another one.

use std::rc::Rc;

use bp_ast::factory::{declarator, ident_expr, prepend_statements, return_stmt, temp_pat, this, var_stmt};
use bp_ast::*;
use tracing::trace;

/// Hands out temporary tokens. One allocator is threaded through every pass
/// of a compilation so no two passes can mint the same id.
#[derive(Debug, Default)]
pub struct TempAllocator {
    next: u32,
}

impl TempAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, stem: &str) -> TempToken {
        let token = TempToken::new(self.next, stem);
        self.next += 1;
        trace!(id = token.id(), stem, "allocated temporary");
        token
    }

    /// Number of tokens handed out so far.
    pub fn count(&self) -> u32 {
        self.next
    }
}

#[derive(Default)]
struct VarScope {
    decls: Vec<(TempToken, Option<ExprRef>)>,
    this_var: Option<TempToken>,
    arguments_var: Option<TempToken>,
    /// Tokens taken since the outermost open expression scope.
    held: Vec<TempToken>,
    /// `held.len()` at each open expression scope.
    expr_marks: Vec<usize>,
    /// Declared tokens free for reuse.
    pool: Vec<TempToken>,
}

/// State to restore when a trial rewrite is abandoned.
pub struct TempMark {
    decls: usize,
    held: usize,
    pool: Vec<TempToken>,
}

/// Hoisted temporaries for the bodies a pass is currently inside.
pub struct TempVars<'a> {
    alloc: &'a mut TempAllocator,
    scopes: Vec<VarScope>,
}

impl<'a> TempVars<'a> {
    pub fn new(alloc: &'a mut TempAllocator) -> Self {
        Self {
            alloc,
            scopes: Vec::new(),
        }
    }

    /// A token the caller declares itself.
    pub fn fresh(&mut self, stem: &str) -> TempToken {
        self.alloc.allocate(stem)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(VarScope::default());
    }

    /// Pops the innermost scope and returns its `var` statement, if any
    /// temporaries were declared in it.
    pub fn pop_scope(&mut self) -> Option<StmtRef> {
        let scope = self.scopes.pop()?;
        if scope.decls.is_empty() {
            return None;
        }
        let decls = scope
            .decls
            .into_iter()
            .map(|(token, init)| declarator(temp_pat(&token), init))
            .collect();
        Some(var_stmt(VarKind::Var, decls))
    }

    fn current(&mut self) -> &mut VarScope {
        let Some(scope) = self.scopes.last_mut() else {
            panic!("temporary requested outside of any function or script body");
        };
        scope
    }

    /// A temporary declared without an initializer in the current body.
    pub fn add_var(&mut self, stem: &str) -> TempToken {
        let pooled = {
            let scope = self.current();
            let found = scope.pool.iter().position(|t| t.stem() == stem);
            found.map(|i| scope.pool.remove(i))
        };
        let token = match pooled {
            Some(token) => token,
            None => {
                let token = self.alloc.allocate(stem);
                self.current().decls.push((token.clone(), None));
                token
            }
        };
        let scope = self.current();
        if !scope.expr_marks.is_empty() {
            scope.held.push(token.clone());
        }
        token
    }

    /// Opens a region whose hoisted temporaries are dead once it ends.
    pub fn push_expr_scope(&mut self) {
        let scope = self.current();
        scope.expr_marks.push(scope.held.len());
    }

    /// Returns the temporaries taken since the matching push to the pool.
    pub fn pop_expr_scope(&mut self) {
        let scope = self.current();
        let Some(mark) = scope.expr_marks.pop() else {
            panic!("unbalanced expression scope");
        };
        let released: Vec<_> = scope.held.drain(mark..).collect();
        scope.pool.extend(released);
    }

    /// A temporary declared as `var <temp> = init` in the current body.
    pub fn add_var_init(&mut self, stem: &str, init: ExprRef) -> TempToken {
        let token = self.alloc.allocate(stem);
        self.current().decls.push((token.clone(), Some(init)));
        token
    }

    /// `_this = this`, declared once per body.
    pub fn this_var(&mut self) -> TempToken {
        if let Some(token) = &self.current().this_var {
            return token.clone();
        }
        let token = self.add_var_init("_this", this());
        self.current().this_var = Some(token.clone());
        token
    }

    /// `_arguments = arguments`, declared once per body.
    pub fn arguments_var(&mut self) -> TempToken {
        if let Some(token) = &self.current().arguments_var {
            return token.clone();
        }
        let token = self.add_var_init("_arguments", ident_expr("arguments"));
        self.current().arguments_var = Some(token.clone());
        token
    }

    /// Position to roll back to if a trial rewrite is abandoned.
    pub fn mark(&mut self) -> TempMark {
        let scope = self.current();
        TempMark {
            decls: scope.decls.len(),
            held: scope.held.len(),
            pool: scope.pool.clone(),
        }
    }

    pub fn rollback(&mut self, mark: TempMark) {
        let scope = self.current();
        scope.decls.truncate(mark.decls);
        scope.held.truncate(mark.held);
        scope.pool = mark.pool;
    }

    /// Closes the scope opened for `body` and prepends its declarations,
    /// after any directive prologue.
    pub fn leave_body(&mut self, body: Vec<StmtRef>) -> Vec<StmtRef> {
        match self.pop_scope() {
            Some(decl) => prepend_statements(&body, vec![decl]),
            None => body,
        }
    }

    /// Closes the scope opened for a function, parameters included.
    pub fn leave_function(&mut self, function: Rc<Function>) -> Rc<Function> {
        let Some(decl) = self.pop_scope() else {
            return function;
        };
        Rc::new(Function {
            body: prepend_statements(&function.body, vec![decl]),
            ..(*function).clone()
        })
    }

    /// Closes the scope opened for an arrow. An expression body that needed
    /// temporaries becomes a block body so it has somewhere to declare them.
    pub fn leave_arrow(&mut self, arrow: Rc<Arrow>) -> Rc<Arrow> {
        let Some(decl) = self.pop_scope() else {
            return arrow;
        };
        let body = match &arrow.body {
            ArrowBody::Expr(e) => vec![decl, return_stmt(Some(e.clone()))],
            ArrowBody::Block(stmts) => prepend_statements(stmts, vec![decl]),
        };
        Rc::new(Arrow {
            body: ArrowBody::Block(body),
            ..(*arrow).clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use bp_ast::factory::*;

    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut alloc = TempAllocator::new();
        let a = alloc.allocate("_ref");
        let b = alloc.allocate("_ref");
        assert_ne!(a, b);
        assert_eq!(alloc.count(), 2);
    }

    #[test]
    fn this_and_arguments_are_cached_per_scope() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        let outer = temps.this_var();
        assert_eq!(temps.this_var(), outer);
        temps.push_scope();
        assert_ne!(temps.this_var(), outer);
        temps.arguments_var();
        let inner = temps.pop_scope().expect("inner declarations");
        let StmtKind::Var(decl) = &inner.kind else {
            panic!("expected var");
        };
        assert_eq!(decl.decls.len(), 2);
        assert!(temps.pop_scope().is_some());
    }

    #[test]
    fn rollback_discards_trial_temporaries() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        temps.add_var("a");
        let mark = temps.mark();
        temps.add_var("b");
        temps.rollback(mark);
        let StmtKind::Var(decl) = &temps.pop_scope().expect("decl").kind else {
            panic!("expected var");
        };
        assert_eq!(decl.decls.len(), 1);
    }

    #[test]
    fn expression_scopes_recycle_tokens_by_stem() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        let outside = temps.add_var("_ref");
        temps.push_expr_scope();
        let first = temps.add_var("_ref");
        let other = temps.add_var("_iter");
        temps.pop_expr_scope();
        temps.push_expr_scope();
        assert_eq!(temps.add_var("_iter"), other);
        assert_eq!(temps.add_var("_ref"), first);
        assert_ne!(temps.add_var("_ref"), outside);
        temps.pop_expr_scope();
        let StmtKind::Var(decl) = &temps.pop_scope().expect("decl").kind else {
            panic!("expected var");
        };
        assert_eq!(decl.decls.len(), 4);
    }

    #[test]
    fn rollback_returns_pooled_tokens() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        temps.push_expr_scope();
        let pooled = temps.add_var("_ref");
        temps.pop_expr_scope();
        temps.push_expr_scope();
        let mark = temps.mark();
        assert_eq!(temps.add_var("_ref"), pooled);
        temps.rollback(mark);
        assert_eq!(temps.add_var("_ref"), pooled);
        temps.pop_expr_scope();
    }

    #[test]
    fn declarations_follow_directives() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        temps.add_var("_ref");
        let body = temps.leave_body(vec![
            expr_stmt(str_lit("use strict")),
            expr_stmt(ident_expr("a")),
        ]);
        assert!(body[0].is_directive());
        assert!(matches!(body[1].kind, StmtKind::Var(_)));
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn expression_arrow_gains_a_block() {
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        let arrow = Rc::new(Arrow {
            span: Span::DUMMY,
            params: vec![],
            rest: None,
            body: ArrowBody::Expr(ident_expr("x")),
            is_async: false,
        });
        temps.push_scope();
        assert!(Rc::ptr_eq(&temps.leave_arrow(arrow.clone()), &arrow));
        temps.push_scope();
        temps.add_var("_ref");
        let out = temps.leave_arrow(arrow);
        let ArrowBody::Block(body) = &out.body else {
            panic!("expected block body");
        };
        assert!(matches!(body[1].kind, StmtKind::Return(Some(_))));
    }
}
