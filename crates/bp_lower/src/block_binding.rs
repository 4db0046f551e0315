//! Block-scoped bindings.
//!
//! `let`, `const` and function declarations inside blocks become `var`s:
//!
//! ```text
//! { let x = 1; } x;                →  { var _x2 = 1; } x;
//! if (a) { f(); function f() {} }  →  if (a) { var f = function() {}; f(); }
//! ```
//!
//! A binding declared below the top of its function is renamed through a
//! temporary whose stem is the binding's own name, so the final renamer
//! keeps that name unless something visible in the function already uses
//! it.
//!
//! A loop whose body holds a closure over one of its block-scoped bindings
//! moves the body into a per-iteration function, so each iteration gets
//! fresh bindings:
//!
//! ```text
//! for (let i = 0; i < n; i++) { fs.push(() => i); }
//!   →  var _loop = function(i) { fs.push(() => i); };
//!      for (var i = 0; i < n; i++) { _loop(i); }
//! ```
//!
//! `return`, `break` and `continue` that leave the body are routed through
//! the closure's result. `var`s declared in the body move out in front of
//! the loop. A `for` head binding the body assigns to is copied out of the
//! closure and back into the head before the update runs:
//!
//! ```text
//! for (let i = 0; i < n; i++) { fs.push(() => i); i++; }
//!   →  var _loop = function(i) { fs.push(() => i); i++; _i = i; }, _i;
//!      for (var i = 0; i < n; i++) { _loop(i); i = _i; }
//! ```
//!
//! A body holding `yield` or `await` cannot move into a closure. Its
//! captured bindings live on an object made fresh for each iteration, and
//! every closure created in the body receives the current object:
//!
//! ```text
//! for (let i = 0; i < n; i++) { yield () => i; }
//!   →  var _env;
//!      for (var i = 0; i < n; i++) { _env = {i: i}; yield ((_env) => () => _env.i)(_env); }
//! ```

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::diagnostics::Reporter;
use crate::scope::{BindingKind, ScopeId, ScopeKind, ScopeTree};
use crate::temps::TempAllocator;
use crate::transform::{self, same_list, same_var_decl, Changes, Transformer};
use crate::util::{rename_this_and_arguments, stmt_contains_suspend, uses_this_or_arguments};
use crate::visit::{self, Visit};

pub fn lower_block_bindings(program: &Program, alloc: &mut TempAllocator, reporter: &mut Reporter) -> Program {
    debug!(pass = "block_binding", "start");
    let tree = ScopeTree::build(program);
    let renames = block_renames(&tree, alloc);
    let mut loops = LoopScopes {
        tree: &tree,
        scopes: FxHashSet::default(),
    };
    loops.visit_program(program);
    let loop_scopes = loops.scopes;
    let mut pass = BlockBinding {
        alloc,
        reporter,
        tree: &tree,
        renames,
        loop_scopes,
        scopes: vec![ScopeId::ROOT],
        functions: vec![FunctionState::default()],
        envs: Vec::new(),
    };
    let out = Program {
        kind: program.kind,
        body: pass.lower_list(&program.body, false),
    };
    debug!(pass = "block_binding", changed = !same_list(&program.body, &out.body), "finish");
    out
}

fn is_block_scoped(kind: BindingKind) -> bool {
    matches!(
        kind,
        BindingKind::Let | BindingKind::Const | BindingKind::Function | BindingKind::Class
    )
}

/// A temporary for every block-scoped binding that does not sit at the top
/// of a function, script or module.
fn block_renames(tree: &ScopeTree, alloc: &mut TempAllocator) -> FxHashMap<(ScopeId, Name), TempToken> {
    let mut renames = FxHashMap::default();
    for id in tree.subtree(ScopeId::ROOT) {
        let scope = tree.scope(id);
        if !matches!(scope.kind, ScopeKind::Block | ScopeKind::Catch) {
            continue;
        }
        for (name, binding) in &scope.bindings {
            let Some(text) = name.as_ident() else {
                continue;
            };
            if is_block_scoped(binding.kind) {
                renames.insert((id, name.clone()), alloc.allocate(text));
            }
        }
    }
    renames
}

/// Scopes that start over on every iteration of some loop: the head scope
/// of `for` loops and the body block of `while`/`do` loops.
struct LoopScopes<'t> {
    tree: &'t ScopeTree,
    scopes: FxHashSet<ScopeId>,
}

impl Visit for LoopScopes<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        let owner = match &stmt.kind {
            StmtKind::For { .. } | StmtKind::ForEach { .. } => self.tree.node_scope(stmt),
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => self.tree.node_scope(&**body),
            _ => None,
        };
        self.scopes.extend(owner);
        visit::walk_stmt(self, stmt);
    }
}

#[derive(Default)]
struct FunctionState {
    /// Names of the `var`s moved out of a loop body that is becoming a
    /// closure. Owned by the outermost such loop of the function.
    hoisted: Option<Vec<Ident>>,
    loop_depth: usize,
}

struct BlockBinding<'a> {
    alloc: &'a mut TempAllocator,
    reporter: &'a mut Reporter,
    tree: &'a ScopeTree,
    renames: FxHashMap<(ScopeId, Name), TempToken>,
    loop_scopes: FxHashSet<ScopeId>,
    scopes: Vec<ScopeId>,
    functions: Vec<FunctionState>,
    envs: Vec<LoopEnv>,
}

/// The per-iteration object of a suspending loop.
struct LoopEnv {
    token: TempToken,
    /// Function nesting of the loop; closures made at this depth capture
    /// the object.
    depth: usize,
    /// Property holding each captured binding.
    keys: FxHashMap<(ScopeId, Name), Atom>,
}

/// A block-scoped binding of a loop that some closure refers to.
struct Captured {
    scope: ScopeId,
    name: Name,
    kind: BindingKind,
}

/// A loop with its body taken out.
enum LoopHead {
    For {
        init: Option<ForInit>,
        test: Option<ExprRef>,
        update: Option<ExprRef>,
    },
    ForEach {
        kind: ForEachKind,
        head: ForHead,
        right: ExprRef,
    },
    While(ExprRef),
    DoWhile(ExprRef),
}

impl LoopHead {
    fn with_body(self, body: StmtRef) -> StmtKind {
        match self {
            LoopHead::For { init, test, update } => StmtKind::For {
                init,
                test,
                update,
                body,
            },
            LoopHead::ForEach { kind, head, right } => StmtKind::ForEach {
                kind,
                head,
                right,
                body,
            },
            LoopHead::While(test) => StmtKind::While { test, body },
            LoopHead::DoWhile(test) => StmtKind::DoWhile { body, test },
        }
    }
}

fn loop_body(stmt: &Stmt) -> &StmtRef {
    match &stmt.kind {
        StmtKind::For { body, .. }
        | StmtKind::ForEach { body, .. }
        | StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. } => body,
        _ => unreachable!("loop body of a non-loop statement"),
    }
}

impl BlockBinding<'_> {
    fn current_scope(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or(ScopeId::ROOT)
    }

    fn state(&mut self) -> &mut FunctionState {
        let Some(state) = self.functions.last_mut() else {
            panic!("block binding outside of any function or script body");
        };
        state
    }

    fn in_loop(&self) -> bool {
        self.functions.last().is_some_and(|s| s.loop_depth > 0)
    }

    fn hoisting(&self) -> bool {
        self.functions.last().is_some_and(|s| s.hoisted.is_some())
    }

    fn scoped<T>(&mut self, scope: Option<ScopeId>, f: impl FnOnce(&mut Self) -> T) -> T {
        let Some(id) = scope else {
            return f(self);
        };
        self.scopes.push(id);
        let out = f(self);
        self.scopes.pop();
        out
    }

    fn in_function<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.functions.push(FunctionState::default());
        let out = f(self);
        self.functions.pop();
        out
    }

    fn renamed(&self, ident: &Ident) -> Option<TempToken> {
        let binder = self.tree.resolve(self.current_scope(), &ident.name)?;
        self.renames.get(&(binder, ident.name.clone())).cloned()
    }

    /// Lowers a statement list. Function declarations in a block list move to
    /// its top as `var` function expressions.
    fn lower_list(&mut self, stmts: &[StmtRef], block_level: bool) -> Vec<StmtRef> {
        let mut functions = Vec::new();
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Function(function) if block_level => {
                    functions.push(self.function_to_var(stmt, function));
                }
                _ => out.extend(self.lower_stmt(stmt)),
            }
        }
        if functions.is_empty() {
            return out;
        }
        functions.extend(out);
        functions
    }

    fn function_to_var(&mut self, stmt: &StmtRef, function: &Rc<Function>) -> StmtRef {
        let Some(ident) = &function.ident else {
            return self.transform_stmt(stmt);
        };
        let name = self.transform_ident(ident);
        let envs = self.envs_used_by(self.tree.node_scope(&**function));
        let lowered = self.transform_function(function);
        let value = Rc::new(Function {
            ident: None,
            ..(*lowered).clone()
        });
        let value = Expr::new(function.span, ExprKind::Function(value));
        Stmt::new(
            stmt.span,
            StmtKind::Var(VarDecl {
                kind: VarKind::Var,
                decls: vec![declarator(Pat::ident(name), Some(capture_envs(value, &envs)))],
            }),
        )
    }

    /// Lowers one statement into zero or more.
    fn lower_stmt(&mut self, stmt: &StmtRef) -> Vec<StmtRef> {
        if let StmtKind::Var(decl) = &stmt.kind {
            if decl.kind.is_lexical() && !self.envs.is_empty() {
                if let Some(stmts) = self.env_declaration(stmt, decl) {
                    return stmts;
                }
            }
        }
        match &stmt.kind {
            StmtKind::Var(decl) if !decl.kind.is_lexical() && self.hoisting() => self
                .hoist_var(decl)
                .map(|assigns| Stmt::new(stmt.span, StmtKind::Expr(assigns)))
                .into_iter()
                .collect(),
            StmtKind::Var(decl) if decl.kind.is_lexical() && self.in_loop() => {
                vec![self.fresh_per_iteration(stmt, decl)]
            }
            StmtKind::Labeled { label, body } if body.is_loop() => self.lower_loop(stmt, body, Some(label)),
            _ if stmt.is_loop() => self.lower_loop(stmt, stmt, None),
            _ => vec![self.walk_scoped(stmt)],
        }
    }

    fn walk_scoped(&mut self, stmt: &StmtRef) -> StmtRef {
        let scope = self.tree.node_scope(&**stmt);
        self.scoped(scope, |t| transform::walk_stmt(t, stmt))
    }

    /// `let x;` inside a loop starts out undefined on every iteration.
    fn fresh_per_iteration(&mut self, stmt: &StmtRef, decl: &VarDecl) -> StmtRef {
        let walked = self.transform_var_decl(decl);
        let decls = walked
            .decls
            .into_iter()
            .map(|d| {
                if d.init.is_none() && d.target.as_ident().is_some() {
                    declarator(d.target, Some(void_zero()))
                } else {
                    d
                }
            })
            .collect();
        Stmt::new(
            stmt.span,
            StmtKind::Var(VarDecl {
                kind: VarKind::Var,
                decls,
            }),
        )
    }

    fn record_hoisted(&mut self, decl: &VarDecl) {
        let mut idents = Vec::new();
        decl.bound_idents(&mut idents);
        let idents: Vec<Ident> = idents.into_iter().cloned().collect();
        if let Some(hoisted) = &mut self.state().hoisted {
            for ident in idents {
                if !hoisted.iter().any(|h| h.name == ident.name) {
                    hoisted.push(ident);
                }
            }
        }
    }

    /// A `var` inside a loop body that becomes a closure: its names move in
    /// front of the loop and its initializers stay behind as assignments.
    fn hoist_var(&mut self, decl: &VarDecl) -> Option<ExprRef> {
        let walked = self.transform_var_decl(decl);
        self.record_hoisted(&walked);
        let assigns: Vec<ExprRef> = walked
            .decls
            .into_iter()
            .filter_map(|d| d.init.map(|init| assign(d.target, init)))
            .collect();
        (!assigns.is_empty()).then(|| seq(assigns))
    }

    /// Transforms a loop's head. Returns it with the names the head declares
    /// with `let`/`const`.
    fn lower_head(&mut self, c: &mut Changes, stmt: &Stmt) -> (LoopHead, Vec<Ident>) {
        let mut names = Vec::new();
        let head = match &stmt.kind {
            StmtKind::For {
                init, test, update, ..
            } => {
                let init = match init {
                    Some(ForInit::Var(decl)) if !decl.kind.is_lexical() && self.hoisting() => {
                        c.mark(true);
                        self.hoist_var(decl).map(ForInit::Expr)
                    }
                    Some(ForInit::Var(decl)) => {
                        let new = self.transform_var_decl(decl);
                        c.mark(!same_var_decl(decl, &new));
                        if decl.kind.is_lexical() {
                            let mut idents = Vec::new();
                            new.bound_idents(&mut idents);
                            names.extend(idents.into_iter().cloned());
                        }
                        Some(ForInit::Var(new))
                    }
                    Some(ForInit::Expr(e)) => Some(ForInit::Expr(c.rc(e, self.transform_expr(e)))),
                    None => None,
                };
                LoopHead::For {
                    init,
                    test: c.opt(test, test.as_ref().map(|e| self.transform_expr(e))),
                    update: c.opt(update, update.as_ref().map(|e| self.transform_expr(e))),
                }
            }
            StmtKind::ForEach {
                kind, head, right, ..
            } => {
                let head = match head {
                    ForHead::Var(decl) if !decl.kind.is_lexical() && self.hoisting() => {
                        c.mark(true);
                        let new = self.transform_var_decl(decl);
                        self.record_hoisted(&new);
                        match new.decls.as_slice() {
                            [only] => ForHead::Pat(only.target.clone()),
                            _ => unreachable!("for-in/of head declares more than one binding"),
                        }
                    }
                    ForHead::Var(decl) => {
                        let new = self.transform_var_decl(decl);
                        c.mark(!same_var_decl(decl, &new));
                        if decl.kind.is_lexical() {
                            let mut idents = Vec::new();
                            new.bound_idents(&mut idents);
                            names.extend(idents.into_iter().cloned());
                        }
                        ForHead::Var(new)
                    }
                    ForHead::Pat(p) => ForHead::Pat(c.rc(p, self.transform_pat(p))),
                };
                LoopHead::ForEach {
                    kind: *kind,
                    head,
                    right: c.rc(right, self.transform_expr(right)),
                }
            }
            StmtKind::While { test, .. } => LoopHead::While(c.rc(test, self.transform_expr(test))),
            StmtKind::DoWhile { test, .. } => LoopHead::DoWhile(c.rc(test, self.transform_expr(test))),
            _ => unreachable!("loop head of a non-loop statement"),
        };
        (head, names)
    }

    fn lower_loop(&mut self, whole: &StmtRef, stmt: &StmtRef, label: Option<&Atom>) -> Vec<StmtRef> {
        let captured = self.captured_bindings(stmt);
        if !captured.is_empty() {
            if !stmt_contains_suspend(stmt) {
                return self.loop_to_closure(whole, stmt, label);
            }
            if captured
                .iter()
                .all(|c| matches!(c.kind, BindingKind::Let | BindingKind::Const))
            {
                return self.loop_with_env(whole, stmt, label, &captured);
            }
            self.reporter.warning(
                stmt.span,
                "loop body captures a block-scoped function or class but contains yield or await; \
                 it is shared across iterations",
            );
        }
        let lowered = self.walk_loop(stmt);
        match label {
            Some(label) if !Rc::ptr_eq(&lowered, stmt) => vec![Stmt::new(
                whole.span,
                StmtKind::Labeled {
                    label: label.clone(),
                    body: lowered,
                },
            )],
            _ if Rc::ptr_eq(&lowered, stmt) => vec![whole.clone()],
            _ => vec![lowered],
        }
    }

    fn walk_loop(&mut self, stmt: &StmtRef) -> StmtRef {
        let scope = self.tree.node_scope(&**stmt);
        self.scoped(scope, |t| {
            let mut c = Changes::default();
            let (head, _) = t.lower_head(&mut c, stmt);
            let body = loop_body(stmt);
            t.state().loop_depth += 1;
            let new_body = c.rc(body, t.transform_stmt(body));
            t.state().loop_depth -= 1;
            if !c.any() {
                return stmt.clone();
            }
            Stmt::new(stmt.span, head.with_body(new_body))
        })
    }

    /// The block-scoped bindings created anew for each iteration of this
    /// loop that a closure inside it refers to, in order of first use.
    fn captured_bindings(&self, stmt: &StmtRef) -> Vec<Captured> {
        let tree = self.tree;
        let body = loop_body(stmt);
        let Some(root) = tree.node_scope(&**stmt).or_else(|| tree.node_scope(&**body)) else {
            return Vec::new();
        };
        let mut bindings: FxHashMap<(ScopeId, &Name), BindingKind> = FxHashMap::default();
        let mut closures = Vec::new();
        let mut stack = vec![(root, true)];
        while let Some((id, own)) = stack.pop() {
            let scope = tree.scope(id);
            if own {
                bindings.extend(
                    scope
                        .bindings
                        .iter()
                        .filter(|(_, b)| is_block_scoped(b.kind))
                        .map(|(name, b)| ((id, name), b.kind)),
                );
            }
            for &child in &scope.children {
                match tree.scope(child).kind {
                    ScopeKind::Function | ScopeKind::Arrow => closures.push(child),
                    // A nested loop's bindings are its own concern.
                    _ => stack.push((child, own && !self.loop_scopes.contains(&child))),
                }
            }
        }
        let mut captured: Vec<Captured> = Vec::new();
        if bindings.is_empty() {
            return captured;
        }
        for closure in closures {
            for (from, reference) in tree.refs_within(closure) {
                let Some(binder) = tree.resolve(from, &reference.name) else {
                    continue;
                };
                let Some(&kind) = bindings.get(&(binder, &reference.name)) else {
                    continue;
                };
                if !captured.iter().any(|c| c.scope == binder && c.name == reference.name) {
                    captured.push(Captured {
                        scope: binder,
                        name: reference.name.clone(),
                        kind,
                    });
                }
            }
        }
        captured
    }

    fn loop_to_closure(&mut self, whole: &StmtRef, stmt: &StmtRef, label: Option<&Atom>) -> Vec<StmtRef> {
        let scope = self.tree.node_scope(&**stmt);
        self.scoped(scope, |t| t.loop_to_closure_in_scope(whole, stmt, label))
    }

    fn loop_to_closure_in_scope(
        &mut self,
        whole: &StmtRef,
        stmt: &StmtRef,
        label: Option<&Atom>,
    ) -> Vec<StmtRef> {
        let mut c = Changes::default();
        let (head, params) = self.lower_head(&mut c, stmt);

        let owns_hoisting = !self.hoisting();
        if owns_hoisting {
            self.state().hoisted = Some(Vec::new());
        }
        let body = loop_body(stmt);
        let stmts = match &body.kind {
            StmtKind::Block(stmts) => {
                let body_scope = self.tree.node_scope(&**body);
                self.scoped(body_scope, |t| t.lower_list(stmts, false))
            }
            _ => self.lower_list(std::slice::from_ref(body), false),
        };
        let hoisted = if owns_hoisting {
            self.state().hoisted.take().unwrap_or_default()
        } else {
            Vec::new()
        };

        // Head bindings the body writes to are handed back through `_i`.
        let copies: Vec<(Ident, TempToken)> = match &head {
            LoopHead::For { .. } => {
                let mut assigned = AssignedNames::default();
                visit::walk_stmts(&mut assigned, &stmts);
                params
                    .iter()
                    .filter(|p| assigned.names.contains(&p.name))
                    .map(|p| (p.clone(), self.alloc.allocate(&copy_stem(&p.name))))
                    .collect()
            }
            _ => Vec::new(),
        };
        let copy_out: Vec<StmtRef> = copies
            .iter()
            .map(|(ident, token)| expr_stmt(assign(temp_pat(token), expr_of_ident(ident))))
            .collect();

        let mut escapes = Escapes {
            label,
            inner_labels: Vec::new(),
            loops: 0,
            switches: 0,
            returns: false,
            jumps: Vec::new(),
            copy_out: &copy_out,
        };
        let mut stmts = escapes.transform_stmt_list(&stmts);
        stmts.extend(copy_out.iter().cloned());

        let (uses_this, uses_arguments) = uses_this_or_arguments(&stmts);
        let this_var = uses_this.then(|| self.alloc.allocate("_this"));
        let arguments_var = uses_arguments.then(|| self.alloc.allocate("_arguments"));
        let stmts = rename_this_and_arguments(&stmts, this_var.clone(), arguments_var.clone());

        let mut decls: Vec<VarDeclarator> = hoisted
            .into_iter()
            .map(|ident| declarator(Pat::ident(ident), None))
            .collect();
        if let Some(token) = &arguments_var {
            decls.push(declarator(temp_pat(token), Some(ident_expr("arguments"))));
        }
        if let Some(token) = &this_var {
            decls.push(declarator(temp_pat(token), Some(this())));
        }
        let closure = self.alloc.allocate("_loop");
        let function = Function::simple(
            params.iter().map(|p| Param::plain(Pat::ident(p.clone()))).collect(),
            stmts,
        );
        decls.push(declarator(temp_pat(&closure), Some(function_expr(function))));
        decls.extend(copies.iter().map(|(_, token)| declarator(temp_pat(token), None)));

        let call_closure = call(temp_expr(&closure), params.iter().map(expr_of_ident).collect());
        let copy_back = copies
            .iter()
            .map(|(ident, token)| expr_stmt(assign(Pat::ident(ident.clone()), temp_expr(token))));
        let mut call_site = Vec::new();
        if !escapes.returns && escapes.jumps.is_empty() {
            call_site.push(expr_stmt(call_closure));
            call_site.extend(copy_back);
        } else {
            let ret = self.alloc.allocate("_ret");
            decls.push(declarator(temp_pat(&ret), None));
            let mut dispatch = escapes.dispatch(&ret, call_closure);
            for (offset, stmt) in copy_back.enumerate() {
                dispatch.insert(1 + offset, stmt);
            }
            call_site.extend(dispatch);
        }

        let lowered = Stmt::new(stmt.span, head.with_body(block(call_site)));
        let lowered = match label {
            Some(label) => Stmt::new(
                whole.span,
                StmtKind::Labeled {
                    label: label.clone(),
                    body: lowered,
                },
            ),
            None => lowered,
        };
        vec![var_stmt(VarKind::Var, decls), lowered]
    }

    fn loop_with_env(
        &mut self,
        whole: &StmtRef,
        stmt: &StmtRef,
        label: Option<&Atom>,
        captured: &[Captured],
    ) -> Vec<StmtRef> {
        let scope = self.tree.node_scope(&**stmt);
        self.scoped(scope, |t| t.loop_with_env_in_scope(whole, stmt, label, scope, captured))
    }

    fn loop_with_env_in_scope(
        &mut self,
        whole: &StmtRef,
        stmt: &StmtRef,
        label: Option<&Atom>,
        head_scope: Option<ScopeId>,
        captured: &[Captured],
    ) -> Vec<StmtRef> {
        let mut c = Changes::default();
        let (head, _) = self.lower_head(&mut c, stmt);
        let token = self.alloc.allocate("_env");

        let mut assigned = AssignedNames::default();
        assigned.visit_stmt(loop_body(stmt));

        let mut keys: FxHashMap<(ScopeId, Name), Atom> = FxHashMap::default();
        let mut fresh = Vec::new();
        let mut copy_back = Vec::new();
        for binding in captured {
            let key = env_key(&binding.name, keys.values());
            if Some(binding.scope) == head_scope {
                let ident = self.transform_ident(&Ident::synthetic(binding.name.clone()));
                fresh.push((key.clone(), expr_of_ident(&ident)));
                if matches!(head, LoopHead::For { .. }) && assigned.names.contains(&binding.name) {
                    copy_back.push(expr_stmt(assign(
                        Pat::ident(ident),
                        member(temp_expr(&token), &key),
                    )));
                }
            }
            keys.insert((binding.scope, binding.name.clone()), key);
        }
        debug!(pass = "block_binding", captured = keys.len(), "per-iteration object for a suspending loop");

        self.envs.push(LoopEnv {
            token: token.clone(),
            depth: self.functions.len(),
            keys,
        });
        self.state().loop_depth += 1;
        let lowered = self.transform_stmt(loop_body(stmt));
        self.state().loop_depth -= 1;
        self.envs.pop();

        let stmts = match &lowered.kind {
            StmtKind::Block(stmts) => stmts.clone(),
            _ => vec![lowered.clone()],
        };
        let mut body = vec![expr_stmt(assign(
            temp_pat(&token),
            object(fresh.iter().map(|(key, value)| (&**key, value.clone())).collect()),
        ))];
        if copy_back.is_empty() {
            body.extend(stmts);
        } else {
            let mut rewrite = CopyBack {
                label,
                inner_labels: Vec::new(),
                loops: 0,
                copy: &copy_back,
            };
            body.extend(rewrite.transform_stmt_list(&stmts));
            body.extend(copy_back.iter().cloned());
        }

        let lowered = Stmt::new(stmt.span, head.with_body(block(body)));
        let lowered = match label {
            Some(label) => Stmt::new(
                whole.span,
                StmtKind::Labeled {
                    label: label.clone(),
                    body: lowered,
                },
            ),
            None => lowered,
        };
        vec![var_one(VarKind::Var, temp_pat(&token), None), lowered]
    }

    /// The per-iteration object and property holding `ident`, if it lives
    /// on one.
    fn env_slot(&self, ident: &Ident) -> Option<(TempToken, Atom)> {
        if self.envs.is_empty() {
            return None;
        }
        let binder = self.tree.resolve(self.current_scope(), &ident.name)?;
        let key = (binder, ident.name.clone());
        self.envs
            .iter()
            .rev()
            .find_map(|env| env.keys.get(&key).map(|k| (env.token.clone(), k.clone())))
    }

    fn env_member(&self, ident: &Ident) -> Option<ExprRef> {
        let (token, key) = self.env_slot(ident)?;
        Some(member(temp_expr(&token), &key))
    }

    /// Objects the closures rooted at `roots` read, when those closures are
    /// created in the function that owns the objects.
    fn envs_used_by(&self, roots: impl IntoIterator<Item = ScopeId>) -> Vec<TempToken> {
        let depth = self.functions.len();
        let mut tokens: Vec<TempToken> = Vec::new();
        if !self.envs.iter().any(|env| env.depth == depth) {
            return tokens;
        }
        for root in roots {
            for (from, reference) in self.tree.refs_within(root) {
                let Some(binder) = self.tree.resolve(from, &reference.name) else {
                    continue;
                };
                let key = (binder, reference.name.clone());
                for env in self.envs.iter().filter(|env| env.depth == depth) {
                    if env.keys.contains_key(&key) && !tokens.contains(&env.token) {
                        tokens.push(env.token.clone());
                    }
                }
            }
        }
        tokens
    }

    fn closure_envs(&self, expr: &Expr) -> Vec<TempToken> {
        let tree = self.tree;
        match &expr.kind {
            ExprKind::Function(f) => self.envs_used_by(tree.node_scope(&**f)),
            ExprKind::Arrow(a) => self.envs_used_by(tree.node_scope(&**a)),
            ExprKind::Class(class) => self.envs_used_by(tree.node_scope(&**class)),
            ExprKind::Object(props) => self.envs_used_by(props.iter().filter_map(|p| match p {
                Prop::Method { function, .. } => tree.node_scope(&**function),
                _ => None,
            })),
            _ => Vec::new(),
        }
    }

    /// A `let`/`const` in a suspending loop body whose bindings live on the
    /// per-iteration object becomes assignments to it. `None` when none of
    /// its bindings do.
    fn env_declaration(&mut self, stmt: &StmtRef, decl: &VarDecl) -> Option<Vec<StmtRef>> {
        let mut idents = Vec::new();
        decl.bound_idents(&mut idents);
        if !idents.iter().any(|ident| self.env_slot(ident).is_some()) {
            return None;
        }
        let mut out = Vec::new();
        for d in &decl.decls {
            let mut bound = Vec::new();
            d.target.bound_idents(&mut bound);
            let (on_env, local): (Vec<&Ident>, Vec<&Ident>) =
                bound.into_iter().partition(|ident| self.env_slot(ident).is_some());
            if on_env.is_empty() {
                let single = VarDecl {
                    kind: decl.kind,
                    decls: vec![d.clone()],
                };
                out.push(self.fresh_per_iteration(stmt, &single));
                continue;
            }
            if !local.is_empty() {
                let decls = local
                    .into_iter()
                    .map(|ident| declarator(Pat::ident(self.transform_ident(ident)), None))
                    .collect();
                out.push(var_stmt(VarKind::Var, decls));
            }
            let target = self.transform_pat(&d.target);
            let value = match &d.init {
                Some(init) => self.transform_expr(init),
                None => void_zero(),
            };
            out.push(Stmt::new(stmt.span, StmtKind::Expr(assign(target, value))));
        }
        Some(out)
    }
}

/// Stem of the temporary that hands a loop variable back to the head.
fn copy_stem(name: &Name) -> String {
    match name {
        Name::Ident(text) => format!("_{text}"),
        Name::Temp(token) => format!("_{}", token.stem()),
    }
}

/// A property name for `name` not among `taken`.
fn env_key<'k>(name: &Name, taken: impl Iterator<Item = &'k Atom> + Clone) -> Atom {
    let stem = match name {
        Name::Ident(text) => text.to_string(),
        Name::Temp(token) => token.stem().to_string(),
    };
    let mut candidate = stem.clone();
    let mut n = 2;
    while taken.clone().any(|t| **t == *candidate) {
        candidate = format!("{stem}{n}");
        n += 1;
    }
    candidate.into()
}

/// Calls `closure`'s wrapper with the current per-iteration objects, so
/// the closure keeps the ones of the iteration that created it.
fn capture_envs(closure: ExprRef, tokens: &[TempToken]) -> ExprRef {
    if tokens.is_empty() {
        return closure;
    }
    let params: Vec<Param> = tokens.iter().map(|t| Param::plain(temp_pat(t))).collect();
    let args = tokens.iter().map(temp_expr).collect();
    let wrapper = if matches!(closure.kind, ExprKind::Function(_)) {
        function_expr(Function::simple(params, vec![return_stmt(Some(closure))]))
    } else {
        Expr::synthetic(ExprKind::Arrow(Rc::new(Arrow {
            span: Span::DUMMY,
            params,
            rest: None,
            body: ArrowBody::Expr(closure),
            is_async: false,
        })))
    };
    call(wrapper, args)
}

/// Names assigned anywhere under a statement, closures included.
#[derive(Default)]
struct AssignedNames {
    names: FxHashSet<Name>,
}

impl Visit for AssignedNames {
    fn visit_assign_pat(&mut self, pat: &Pat) {
        let mut idents = Vec::new();
        pat.bound_idents(&mut idents);
        self.names.extend(idents.into_iter().map(|ident| ident.name.clone()));
        visit::walk_pat(self, pat, false);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Update { arg, .. } = &expr.kind {
            if let Some(ident) = arg.as_ident() {
                self.names.insert(ident.name.clone());
            }
        }
        visit::walk_expr(self, expr);
    }
}

impl Transformer for BlockBinding<'_> {
    fn transform_stmt_list(&mut self, stmts: &[StmtRef]) -> Vec<StmtRef> {
        self.lower_list(stmts, true)
    }

    fn transform_function_body(&mut self, body: &[StmtRef]) -> Vec<StmtRef> {
        self.lower_list(body, false)
    }

    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        let mut lowered = self.lower_stmt(stmt);
        match lowered.len() {
            0 => Stmt::new(stmt.span, StmtKind::Empty),
            1 => lowered.remove(0),
            _ => Stmt::new(stmt.span, StmtKind::Block(lowered)),
        }
    }

    fn transform_var_decl(&mut self, decl: &VarDecl) -> VarDecl {
        let walked = transform::walk_var_decl(self, decl);
        VarDecl {
            kind: VarKind::Var,
            decls: walked.decls,
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        if self.envs.is_empty() {
            return transform::walk_expr(self, expr);
        }
        if let ExprKind::Ident(ident) = &expr.kind {
            if let Some(slot) = self.env_member(ident) {
                return slot;
            }
        }
        let envs = self.closure_envs(expr);
        let walked = transform::walk_expr(self, expr);
        capture_envs(walked, &envs)
    }

    fn transform_pat(&mut self, pat: &PatRef) -> PatRef {
        if let Pat::Ident(ident) = &**pat {
            if let Some(slot) = self.env_member(ident) {
                return expr_to_pat(&slot);
            }
        }
        transform::walk_pat(self, pat)
    }

    fn transform_ident(&mut self, ident: &Ident) -> Ident {
        match self.renamed(ident) {
            Some(token) => Ident::new(ident.span, Name::Temp(token)),
            None => ident.clone(),
        }
    }

    fn transform_catch(&mut self, catch: &Catch) -> Catch {
        let scope = self.tree.node_scope(catch);
        self.scoped(scope, |t| transform::walk_catch(t, catch))
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        let scope = self.tree.node_scope(&**function);
        self.in_function(|t| t.scoped(scope, |t| transform::walk_function(t, function)))
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        let scope = self.tree.node_scope(&**arrow);
        self.in_function(|t| t.scoped(scope, |t| transform::walk_arrow(t, arrow)))
    }

    fn transform_class(&mut self, class: &Rc<Class>) -> Rc<Class> {
        let scope = self.tree.node_scope(&**class);
        self.scoped(scope, |t| transform::walk_class(t, class))
    }
}

/// Where control goes after a closure-converted loop body returns.
#[derive(Clone, PartialEq)]
enum Jump {
    /// Leave the converted loop.
    Break,
    BreakTo(Atom),
    ContinueTo(Atom),
}

/// Rewrites the `return`, `break` and `continue` statements of a loop body
/// that leave it once it is a closure.
struct Escapes<'l> {
    /// The label of the converted loop itself.
    label: Option<&'l Atom>,
    /// Labels declared inside the body.
    inner_labels: Vec<Atom>,
    loops: usize,
    switches: usize,
    returns: bool,
    /// Indexed by the code the closure returns.
    jumps: Vec<Jump>,
    /// Runs before the closure moves on to the next iteration.
    copy_out: &'l [StmtRef],
}

impl Escapes<'_> {
    fn exit(&mut self, stmt: &Stmt, jump: Jump) -> StmtRef {
        let code = match self.jumps.iter().position(|j| *j == jump) {
            Some(code) => code,
            None => {
                self.jumps.push(jump);
                self.jumps.len() - 1
            }
        };
        Stmt::new(stmt.span, StmtKind::Return(Some(num(code))))
    }

    fn next_iteration(&self, stmt: &Stmt) -> StmtRef {
        let ret = Stmt::new(stmt.span, StmtKind::Return(None));
        if self.copy_out.is_empty() {
            return ret;
        }
        let mut stmts = self.copy_out.to_vec();
        stmts.push(ret);
        Stmt::new(stmt.span, StmtKind::Block(stmts))
    }

    fn owns(&self, label: &Atom) -> bool {
        self.label == Some(label)
    }

    /// Statements that call the closure and act on its result.
    fn dispatch(&self, ret: &TempToken, call_closure: ExprRef) -> Vec<StmtRef> {
        let mut out = vec![expr_stmt(assign(temp_pat(ret), call_closure))];
        if self.returns {
            out.push(if_stmt(
                binary(BinaryOp::EqEqEq, unary(UnaryOp::TypeOf, temp_expr(ret)), str_lit("object")),
                return_stmt(Some(member(temp_expr(ret), "v"))),
                None,
            ));
        }
        let cases: Vec<SwitchCase> = self
            .jumps
            .iter()
            .enumerate()
            .filter_map(|(code, jump)| {
                let target = match jump {
                    Jump::Break => return None,
                    Jump::BreakTo(label) => break_stmt(Some(&**label)),
                    Jump::ContinueTo(label) => continue_stmt(Some(&**label)),
                };
                Some(SwitchCase {
                    test: Some(num(code)),
                    body: vec![target],
                })
            })
            .collect();
        if !cases.is_empty() {
            out.push(Stmt::synthetic(StmtKind::Switch {
                discriminant: temp_expr(ret),
                cases,
            }));
        }
        if let Some(code) = self.jumps.iter().position(|j| *j == Jump::Break) {
            out.push(if_stmt(
                binary(BinaryOp::EqEqEq, temp_expr(ret), num(code)),
                break_stmt(None),
                None,
            ));
        }
        out
    }
}

impl Transformer for Escapes<'_> {
    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        match &stmt.kind {
            StmtKind::Return(arg) => {
                self.returns = true;
                let value = arg.clone().unwrap_or_else(void_zero);
                Stmt::new(stmt.span, StmtKind::Return(Some(object(vec![("v", value)]))))
            }
            StmtKind::Break(None) if self.loops == 0 && self.switches == 0 => self.exit(stmt, Jump::Break),
            StmtKind::Continue(None) if self.loops == 0 => self.next_iteration(stmt),
            StmtKind::Break(Some(label)) | StmtKind::Continue(Some(label))
                if self.inner_labels.contains(label) =>
            {
                stmt.clone()
            }
            StmtKind::Break(Some(label)) if self.owns(label) => self.exit(stmt, Jump::Break),
            StmtKind::Continue(Some(label)) if self.owns(label) => self.next_iteration(stmt),
            StmtKind::Break(Some(label)) => self.exit(stmt, Jump::BreakTo(label.clone())),
            StmtKind::Continue(Some(label)) => self.exit(stmt, Jump::ContinueTo(label.clone())),
            StmtKind::Labeled { label, .. } => {
                self.inner_labels.push(label.clone());
                let out = transform::walk_stmt(self, stmt);
                self.inner_labels.pop();
                out
            }
            StmtKind::Switch { .. } => {
                self.switches += 1;
                let out = transform::walk_stmt(self, stmt);
                self.switches -= 1;
                out
            }
            _ if stmt.is_loop() => {
                self.loops += 1;
                let out = transform::walk_stmt(self, stmt);
                self.loops -= 1;
                out
            }
            _ => transform::walk_stmt(self, stmt),
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        expr.clone()
    }

    fn transform_pat(&mut self, pat: &PatRef) -> PatRef {
        pat.clone()
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        function.clone()
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        arrow.clone()
    }

    fn transform_class(&mut self, class: &Rc<Class>) -> Rc<Class> {
        class.clone()
    }
}

/// Copies a suspending loop's per-iteration values back to its head before
/// each `continue` of that loop.
struct CopyBack<'l> {
    label: Option<&'l Atom>,
    inner_labels: Vec<Atom>,
    loops: usize,
    copy: &'l [StmtRef],
}

impl CopyBack<'_> {
    fn before(&self, stmt: &StmtRef) -> StmtRef {
        let mut stmts = self.copy.to_vec();
        stmts.push(stmt.clone());
        Stmt::new(stmt.span, StmtKind::Block(stmts))
    }
}

impl Transformer for CopyBack<'_> {
    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        match &stmt.kind {
            StmtKind::Continue(None) if self.loops == 0 => self.before(stmt),
            StmtKind::Continue(Some(label))
                if self.label == Some(label) && !self.inner_labels.contains(label) =>
            {
                self.before(stmt)
            }
            StmtKind::Labeled { label, .. } => {
                self.inner_labels.push(label.clone());
                let out = transform::walk_stmt(self, stmt);
                self.inner_labels.pop();
                out
            }
            _ if stmt.is_loop() => {
                self.loops += 1;
                let out = transform::walk_stmt(self, stmt);
                self.loops -= 1;
                out
            }
            _ => transform::walk_stmt(self, stmt),
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        expr.clone()
    }

    fn transform_pat(&mut self, pat: &PatRef) -> PatRef {
        pat.clone()
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        function.clone()
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        arrow.clone()
    }

    fn transform_class(&mut self, class: &Rc<Class>) -> Rc<Class> {
        class.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::test_util::{check, lower_with, script};

    fn lower(input: &str, expected: &str) {
        check(input, expected, |p, alloc, reporter| lower_block_bindings(p, alloc, reporter));
    }

    #[test]
    fn let_and_const_become_var() {
        lower("let x; const y = 1;", "var x; var y = 1;");
        lower("1; { 2; let x; }", "1; { 2; var x; }");
        lower("1; if (true) { 2; let x = 5; }", "1; if (true) { 2; var x = 5; }");
        lower("for (let i = 0; i < 5; i++);", "for (var i = 0; i < 5; i++);");
    }

    #[test]
    fn colliding_block_bindings_are_renamed() {
        lower(
            "if (true) { let x = 5; } if (true) { let x = 5; }",
            "if (true) { var x = 5; } if (true) { var _x2 = 5; }",
        );
        lower(
            "{ let x = 1; x; } { let x = 2; x; } x;",
            "{ var _x2 = 1; _x2; } { var _x3 = 2; _x3; } x;",
        );
        lower(
            "function g() { var z = 1; function f() { z; { let z = 2; z; } z; } }",
            "function g() { var z = 1; function f() { z; { var _z2 = 2; _z2; } z; } }",
        );
    }

    #[test]
    fn renaming_reaches_patterns_but_not_function_names() {
        lower(
            "let x = 1; { let {x, y = x} = {}; }",
            "var x = 1; { var {x: _x2, y = _x2} = {}; }",
        );
        lower(
            "let x = 1; { let y = function x() {}; }",
            "var x = 1; { var y = function x() {}; }",
        );
    }

    #[test]
    fn block_functions_hoist_as_expressions() {
        lower(
            "if (true) { f(); function f() { other(); } }",
            "if (true) { var f = function() { other(); }; f(); }",
        );
        lower(
            "for (let i = 0; i < 5; i++) { log(i); function t() {} }",
            "for (var i = 0; i < 5; i++) { var t = function() {}; log(i); }",
        );
        let p = script("f(); function f() { other(); }");
        let mut alloc = TempAllocator::new();
        let mut reporter = Reporter::new();
        let out = lower_block_bindings(&p, &mut alloc, &mut reporter);
        assert!(same_list(&p.body, &out.body));
    }

    #[test]
    fn inner_declaration_does_not_count_as_capture() {
        lower(
            "for (let i = 0; i < 5; i++) { function t() { alert(i); let i = 5; } }",
            "for (var i = 0; i < 5; i++) { var t = function() { alert(i); var i = 5; }; }",
        );
    }

    #[test]
    fn loop_variable_captured_by_closure() {
        lower(
            "for (let i = 0; i < 5; i++) { function t() { log(i); } }",
            "var _loop = function(i) { function t() { log(i); } };
             for (var i = 0; i < 5; i++) { _loop(i); }",
        );
        lower(
            "for (const x of xs) { fs.push(() => x); }",
            "var _loop = function(x) { fs.push(() => x); };
             for (var x of xs) { _loop(x); }",
        );
    }

    #[test]
    fn returns_travel_through_the_result() {
        lower(
            "() => { for (let i = 0; i < 5; i++) { return function t() { return i; }; } };",
            "() => {
               var _loop = function(i) { return {v: function t() { return i; }}; }, _ret;
               for (var i = 0; i < 5; i++) {
                 _ret = _loop(i);
                 if (typeof _ret === 'object') return _ret.v;
               }
             };",
        );
        lower(
            "() => { for (let i = 0; i < 5; i++) { return; function t() { return i; } } };",
            "() => {
               var _loop = function(i) { return {v: void 0}; function t() { return i; } }, _ret;
               for (var i = 0; i < 5; i++) {
                 _ret = _loop(i);
                 if (typeof _ret === 'object') return _ret.v;
               }
             };",
        );
    }

    #[test]
    fn jumps_out_of_the_body_get_codes() {
        lower(
            "'use strict';
             outer: while (true) {
               for (let i = 0; i < 5; i++) {
                 inner: while (true) {
                   break; break outer; break inner;
                   continue; continue outer; continue inner;
                   function t() { return i; }
                 }
               }
             }",
            "'use strict';
             outer: while (true) {
               var _loop = function(i) {
                 inner: while (true) {
                   var t = function() { return i; };
                   break; return 0; break inner;
                   continue; return 1; continue inner;
                 }
               }, _ret;
               for (var i = 0; i < 5; i++) {
                 _ret = _loop(i);
                 switch (_ret) { case 0: break outer; case 1: continue outer; }
               }
             }",
        );
    }

    #[test]
    fn own_break_and_continue() {
        lower(
            "l: for (let i of xs) { if (i) continue l; if (f(() => i)) break; }",
            "var _loop = function(i) { if (i) return; if (f(() => i)) return 0; }, _ret;
             l: for (var i of xs) {
               _ret = _loop(i);
               if (_ret === 0) break;
             }",
        );
    }

    #[test]
    fn this_arguments_and_vars_move_out() {
        lower(
            "for (let i = 0; i < 5; i++) { console.log(this, arguments); function t() { log(i); } }",
            "var _arguments = arguments, _this = this, _loop = function(i) {
               console.log(_this, _arguments);
               function t() { log(i); }
             };
             for (var i = 0; i < 5; i++) { _loop(i); }",
        );
        lower(
            "for (let i = 0; i < 5; i++) { var k = 1; function t() { log(i); } }",
            "var k, _loop = function(i) { k = 1; function t() { log(i); } };
             for (var i = 0; i < 5; i++) { _loop(i); }",
        );
    }

    #[test]
    fn body_bindings_alone_trigger_conversion() {
        lower(
            "for (let i = 0; i < 5; i++) { function k() {} function t() { log(k); } }",
            "var _loop = function(i) { function k() {} function t() { log(k); } };
             for (var i = 0; i < 5; i++) { _loop(i); }",
        );
        lower(
            "for (var i = 0; i < 5; i++) { let x = 10; function t() { console.log(x); } }",
            "var _loop = function() { var x = 10; function t() { console.log(x); } };
             for (var i = 0; i < 5; i++) { _loop(); }",
        );
    }

    #[test]
    fn uninitialized_let_in_loop_is_reset() {
        lower("while (a) { let x; f(x); }", "while (a) { var x = void 0; f(x); }");
    }

    #[test]
    fn assigned_loop_variable_is_copied_back() {
        lower(
            "for (let i = 0; i < 6; i++) { fs.push(() => i); i++; }",
            "var _loop = function(i) { fs.push(() => i); i++; _i = i; }, _i;
             for (var i = 0; i < 6; i++) { _loop(i); i = _i; }",
        );
        lower(
            "for (let j = 0; j < 10; j++) { n++; if (j % 2) { j += 4; continue; } setTimeout(() => j); }",
            "var _loop = function(j) {
               n++;
               if (j % 2) { j += 4; { _j = j; return; } }
               setTimeout(() => j);
               _j = j;
             }, _j;
             for (var j = 0; j < 10; j++) { _loop(j); j = _j; }",
        );
    }

    #[test]
    fn copy_back_precedes_the_jump_dispatch() {
        lower(
            "for (let i = 0; i < 9; i++) { if (f(() => i)) break; i += 2; }",
            "var _loop = function(i) { if (f(() => i)) return 0; i += 2; _i = i; }, _i, _ret;
             for (var i = 0; i < 9; i++) {
               _ret = _loop(i);
               i = _i;
               if (_ret === 0) break;
             }",
        );
    }

    #[test]
    fn suspending_loop_keeps_bindings_per_iteration() {
        lower(
            "function* g() { for (let i = 0; i < 3; i++) { yield () => i; } }",
            "function* g() {
               var _env;
               for (var i = 0; i < 3; i++) { _env = {i: i}; yield ((_env) => () => _env.i)(_env); }
             }",
        );
        lower(
            "function* g() { var fs = []; for (let i = 0; i < 2; i++) { fs.push(() => i); yield; } return fs; }",
            "function* g() {
               var fs = [];
               var _env;
               for (var i = 0; i < 2; i++) { _env = {i: i}; fs.push(((_env) => () => _env.i)(_env)); yield; }
               return fs;
             }",
        );
    }

    #[test]
    fn suspending_loop_copies_assigned_head_bindings_back() {
        lower(
            "function* g() {
               for (let i = 0; i < 6; i++) {
                 let x = yield i;
                 fs.push(() => i + x);
                 if (x) { i++; continue; }
               }
             }",
            "function* g() {
               var _env;
               for (var i = 0; i < 6; i++) {
                 _env = {i: i};
                 _env.x = yield _env.i;
                 fs.push(((_env) => () => _env.i + _env.x)(_env));
                 if (_env.x) { _env.i++; { i = _env.i; continue; } }
                 i = _env.i;
               }
             }",
        );
    }

    #[test]
    fn suspending_body_functions_receive_the_iteration_object() {
        lower(
            "async function g() { while (a) { let x = await p; function f() { return x; } fs.push(f); } }",
            "async function g() {
               var _env;
               while (a) {
                 _env = {};
                 var f = function(_env) { return function() { return _env.x; }; }(_env);
                 _env.x = await p;
                 fs.push(f);
               }
             }",
        );
    }

    #[test]
    fn suspending_loop_capturing_a_block_function_warns() {
        let p = script("function* g() { while (a) { function f() { return f; } fs.push(() => f); yield; } }");
        let (_, reporter) = lower_with(&p, |p, alloc, reporter| lower_block_bindings(p, alloc, reporter));
        assert_eq!(reporter.diagnostics().len(), 1);
        assert_eq!(reporter.diagnostics()[0].severity, Severity::Warning);
        assert!(!reporter.has_errors());
    }
}
