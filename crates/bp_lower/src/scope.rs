//! Scope and binding analysis.
//!
//! [`ScopeTree::build`] makes one pass over a program and records, for every
//! scope-introducing node, the names it binds and the identifiers referenced
//! directly inside it. References are resolved on demand by walking parent
//! links, so declaration order inside a scope does not matter (hoisting).
//!
//! Scopes are keyed by node address. The tree is only meaningful for the
//! exact program it was built from; a pass that rewrites the program builds
//! a fresh tree for the next pass.

use bp_ast::*;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

use crate::visit::{self, Visit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Script,
    Module,
    Function,
    Arrow,
    Block,
    Catch,
    /// Holds the name of a class expression.
    Class,
}

impl ScopeKind {
    /// Scopes that receive `var` declarations.
    pub fn is_var_scope(self) -> bool {
        matches!(
            self,
            ScopeKind::Script | ScopeKind::Module | ScopeKind::Function | ScopeKind::Arrow
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    CatchParam,
    Class,
    Import,
    /// The name of a function expression, visible inside it.
    FunctionName,
}

impl BindingKind {
    fn from_var_kind(kind: VarKind) -> Self {
        match kind {
            VarKind::Var => BindingKind::Var,
            VarKind::Let => BindingKind::Let,
            VarKind::Const => BindingKind::Const,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub name: Name,
    pub span: Span,
    /// The operand of `typeof`, which may name an undeclared global.
    pub in_typeof: bool,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub bindings: IndexMap<Name, Binding>,
    pub refs: Vec<Reference>,
    pub children: Vec<ScopeId>,
}

#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    by_node: FxHashMap<usize, ScopeId>,
}

fn node_key<T>(node: &T) -> usize {
    node as *const T as usize
}

impl ScopeTree {
    pub fn build(program: &Program) -> Self {
        let kind = if program.is_module() {
            ScopeKind::Module
        } else {
            ScopeKind::Script
        };
        let mut builder = Builder {
            tree: ScopeTree {
                scopes: vec![Scope {
                    kind,
                    parent: None,
                    bindings: IndexMap::new(),
                    refs: Vec::new(),
                    children: Vec::new(),
                }],
                by_node: FxHashMap::default(),
            },
            current: ScopeId::ROOT,
            binding_kind: None,
        };
        builder.visit_program(program);
        tracing::trace!(scopes = builder.tree.scopes.len(), "built scope tree");
        builder.tree
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// The scope a function, arrow, class, catch clause or statement opened.
    pub fn node_scope<T>(&self, node: &T) -> Option<ScopeId> {
        self.by_node.get(&node_key(node)).copied()
    }

    /// The scope that binds `name` as seen from `from`.
    pub fn resolve(&self, from: ScopeId, name: &Name) -> Option<ScopeId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let scope = self.scope(id);
            if scope.bindings.contains_key(name) {
                return Some(id);
            }
            cur = scope.parent;
        }
        None
    }

    pub fn is_descendant(&self, id: ScopeId, ancestor: ScopeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.scope(c).parent;
        }
        false
    }

    pub fn var_scope(&self, id: ScopeId) -> ScopeId {
        let mut cur = id;
        loop {
            let scope = self.scope(cur);
            match scope.parent {
                Some(parent) if !scope.kind.is_var_scope() => cur = parent,
                _ => return cur,
            }
        }
    }

    /// Whether `id` sits inside a non-arrow function, where `arguments` is
    /// implicitly bound.
    pub fn in_function(&self, id: ScopeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let scope = self.scope(c);
            if scope.kind == ScopeKind::Function {
                return true;
            }
            cur = scope.parent;
        }
        false
    }

    pub fn is_module(&self) -> bool {
        self.scope(ScopeId::ROOT).kind == ScopeKind::Module
    }

    /// `id` and every scope below it, in pre-order.
    pub fn subtree(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            out.push(c);
            stack.extend(self.scope(c).children.iter().rev());
        }
        out
    }

    /// Every reference inside the subtree of `id`, with the scope it occurs in.
    pub fn refs_within(&self, id: ScopeId) -> impl Iterator<Item = (ScopeId, &Reference)> {
        self.subtree(id)
            .into_iter()
            .flat_map(move |s| self.scope(s).refs.iter().map(move |r| (s, r)))
    }

    /// Names referenced inside `id` that are not bound inside it.
    pub fn free_names(&self, id: ScopeId) -> IndexSet<Name> {
        self.refs_within(id)
            .filter(|(from, r)| match self.resolve(*from, &r.name) {
                Some(binder) => !self.is_descendant(binder, id),
                None => true,
            })
            .map(|(_, r)| r.name.clone())
            .collect()
    }

    /// Names bound in `id` or in block, class and catch scopes nested in it
    /// without crossing a function boundary.
    pub fn region_bindings(&self, id: ScopeId, include_catch: bool) -> Vec<&Name> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            let scope = self.scope(c);
            out.extend(scope.bindings.keys());
            for &child in scope.children.iter().rev() {
                match self.scope(child).kind {
                    ScopeKind::Block | ScopeKind::Class => stack.push(child),
                    ScopeKind::Catch if include_catch => stack.push(child),
                    _ => {}
                }
            }
        }
        out
    }

    /// References that resolve to no binding at all.
    pub fn unresolved(&self) -> impl Iterator<Item = (ScopeId, &Reference)> {
        self.refs_within(ScopeId::ROOT)
            .filter(|(from, r)| self.resolve(*from, &r.name).is_none())
    }
}

struct Builder {
    tree: ScopeTree,
    current: ScopeId,
    /// Set while walking the targets of a declaration.
    binding_kind: Option<BindingKind>,
}

impl Builder {
    fn push<T>(&mut self, kind: ScopeKind, node: &T) -> ScopeId {
        let id = ScopeId(self.tree.scopes.len() as u32);
        self.tree.scopes.push(Scope {
            kind,
            parent: Some(self.current),
            bindings: IndexMap::new(),
            refs: Vec::new(),
            children: Vec::new(),
        });
        self.tree.scopes[self.current.index()].children.push(id);
        self.tree.by_node.insert(node_key(node), id);
        let outer = self.current;
        self.current = id;
        outer
    }

    fn pop(&mut self, outer: ScopeId) {
        self.current = outer;
    }

    fn declare_in(&mut self, scope: ScopeId, ident: &Ident, kind: BindingKind) {
        self.tree.scopes[scope.index()]
            .bindings
            .entry(ident.name.clone())
            .or_insert(Binding {
                kind,
                span: ident.span,
            });
    }

    fn declare(&mut self, ident: &Ident, kind: BindingKind) {
        let scope = match kind {
            BindingKind::Var => self.tree.var_scope(self.current),
            BindingKind::Import => ScopeId::ROOT,
            _ => self.current,
        };
        self.declare_in(scope, ident, kind);
    }

    fn reference(&mut self, ident: &Ident, in_typeof: bool) {
        self.tree.scopes[self.current.index()].refs.push(Reference {
            name: ident.name.clone(),
            span: ident.span,
            in_typeof,
        });
    }

    fn with_binding_kind(&mut self, kind: BindingKind, f: impl FnOnce(&mut Self)) {
        let saved = self.binding_kind.replace(kind);
        f(self);
        self.binding_kind = saved;
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        for d in &decl.decls {
            self.with_binding_kind(BindingKind::from_var_kind(decl.kind), |b| {
                b.visit_binding_pat(&d.target)
            });
            if let Some(init) = &d.init {
                self.visit_expr(init);
            }
        }
    }

    fn params(&mut self, params: &[Param], rest: &Option<PatRef>) {
        for p in params {
            self.with_binding_kind(BindingKind::Param, |b| b.visit_binding_pat(&p.target));
            if let Some(default) = &p.default {
                self.visit_expr(default);
            }
        }
        if let Some(rest) = rest {
            self.with_binding_kind(BindingKind::Param, |b| b.visit_binding_pat(rest));
        }
    }

    /// `own_name` binds a function expression's name inside its own scope.
    fn function(&mut self, function: &Function, own_name: bool) {
        let outer = self.push(ScopeKind::Function, function);
        if let (true, Some(ident)) = (own_name, &function.ident) {
            self.declare(ident, BindingKind::FunctionName);
        }
        let saved = self.binding_kind.take();
        self.params(&function.params, &function.rest);
        visit::walk_stmts(self, &function.body);
        self.binding_kind = saved;
        self.pop(outer);
    }

    fn class(&mut self, class: &Class, own_name: bool) {
        if let Some(sup) = &class.super_class {
            self.visit_expr(sup);
        }
        let outer = self.push(ScopeKind::Class, class);
        if let (true, Some(ident)) = (own_name, &class.ident) {
            self.declare(ident, BindingKind::Class);
        }
        for member in &class.members {
            if let PropKey::Computed(e) = &member.key {
                self.visit_expr(e);
            }
            self.function(&member.function, false);
        }
        self.pop(outer);
    }
}

impl Visit for Builder {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => self.var_decl(decl),
            StmtKind::Function(f) => {
                if let Some(ident) = &f.ident {
                    self.declare(ident, BindingKind::Function);
                }
                self.function(f, false);
            }
            StmtKind::Class(c) => {
                if let Some(ident) = &c.ident {
                    self.declare(ident, BindingKind::Class);
                }
                self.class(c, false);
            }
            StmtKind::Block(stmts) => {
                let outer = self.push(ScopeKind::Block, stmt);
                visit::walk_stmts(self, stmts);
                self.pop(outer);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let outer = self.push(ScopeKind::Block, stmt);
                match init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(e)) => self.visit_expr(e),
                    None => {}
                }
                for e in [test, update].into_iter().flatten() {
                    self.visit_expr(e);
                }
                self.visit_stmt(body);
                self.pop(outer);
            }
            StmtKind::ForEach {
                head, right, body, ..
            } => {
                self.visit_expr(right);
                let outer = self.push(ScopeKind::Block, stmt);
                match head {
                    ForHead::Var(decl) => self.var_decl(decl),
                    ForHead::Pat(p) => self.visit_assign_pat(p),
                }
                self.visit_stmt(body);
                self.pop(outer);
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.visit_expr(discriminant);
                let outer = self.push(ScopeKind::Block, stmt);
                for case in cases {
                    if let Some(test) = &case.test {
                        self.visit_expr(test);
                    }
                    visit::walk_stmts(self, &case.body);
                }
                self.pop(outer);
            }
            StmtKind::Import(import) => {
                for spec in &import.specifiers {
                    self.declare(spec.local(), BindingKind::Import);
                }
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Unary {
                op: UnaryOp::TypeOf,
                arg,
            } => match arg.as_ident() {
                Some(ident) => self.reference(ident, true),
                None => self.visit_expr(arg),
            },
            ExprKind::Function(f) => self.function(f, true),
            ExprKind::Class(c) => self.class(c, true),
            _ => visit::walk_expr(self, expr),
        }
    }

    fn visit_function(&mut self, function: &Function) {
        self.function(function, false);
    }

    fn visit_arrow(&mut self, arrow: &Arrow) {
        let outer = self.push(ScopeKind::Arrow, arrow);
        let saved = self.binding_kind.take();
        self.params(&arrow.params, &arrow.rest);
        match &arrow.body {
            ArrowBody::Expr(e) => self.visit_expr(e),
            ArrowBody::Block(stmts) => visit::walk_stmts(self, stmts),
        }
        self.binding_kind = saved;
        self.pop(outer);
    }

    fn visit_catch(&mut self, catch: &Catch) {
        let outer = self.push(ScopeKind::Catch, catch);
        if let Some(param) = &catch.param {
            self.with_binding_kind(BindingKind::CatchParam, |b| b.visit_binding_pat(param));
        }
        visit::walk_stmts(self, &catch.body);
        self.pop(outer);
    }

    fn visit_binding_pat(&mut self, pat: &Pat) {
        // Defaults and computed keys inside a pattern are ordinary
        // expressions, evaluated with no declaration in progress.
        match pat {
            Pat::Ident(ident) => self.visit_binding_ident(ident),
            _ => visit::walk_pat(self, pat, true),
        }
    }

    fn visit_binding_ident(&mut self, ident: &Ident) {
        let kind = self.binding_kind.unwrap_or(BindingKind::Var);
        self.declare(ident, kind);
    }

    fn visit_ident_ref(&mut self, ident: &Ident) {
        self.reference(ident, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &IndexSet<Name>) -> Vec<String> {
        set.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn var_hoists_and_let_stays_in_block() {
        let p = bp_parser::parse_script("function f() { { var a; let b; } return a + b; }")
            .expect("parse");
        let tree = ScopeTree::build(&p);
        let StmtKind::Function(f) = &p.body[0].kind else {
            panic!("expected function");
        };
        let fs = tree.node_scope(&**f).expect("function scope");
        assert!(tree.scope(fs).bindings.contains_key(&Name::from("a")));
        assert!(!tree.scope(fs).bindings.contains_key(&Name::from("b")));
        assert_eq!(names(&tree.free_names(fs)), ["b"]);
        assert!(tree.scope(ScopeId::ROOT).bindings.contains_key(&Name::from("f")));
    }

    #[test]
    fn function_expression_name_is_local() {
        let p = bp_parser::parse_script("var g = function h() { return h; }; h;").expect("parse");
        let tree = ScopeTree::build(&p);
        let unresolved: Vec<String> = tree.unresolved().map(|(_, r)| r.name.to_string()).collect();
        assert_eq!(unresolved, ["h"]);
    }

    #[test]
    fn catch_and_loop_heads_open_scopes() {
        let p = bp_parser::parse_script(
            "try {} catch (e) { e; }\nfor (let i = 0; i < 3; i++) { i; }\ne; i;",
        )
        .expect("parse");
        let tree = ScopeTree::build(&p);
        let unresolved: Vec<String> = tree.unresolved().map(|(_, r)| r.name.to_string()).collect();
        assert_eq!(unresolved, ["e", "i"]);
    }

    #[test]
    fn typeof_references_are_marked() {
        let p = bp_parser::parse_script("typeof x; y;").expect("parse");
        let tree = ScopeTree::build(&p);
        let flags: Vec<bool> = tree.unresolved().map(|(_, r)| r.in_typeof).collect();
        assert_eq!(flags, [true, false]);
    }

    #[test]
    fn arrows_do_not_bind_arguments() {
        let p = bp_parser::parse_script("var a = () => 1; function f() { var b = () => 2; }")
            .expect("parse");
        let tree = ScopeTree::build(&p);
        let kinds: Vec<(ScopeKind, bool)> = tree
            .subtree(ScopeId::ROOT)
            .into_iter()
            .map(|id| (tree.scope(id).kind, tree.in_function(id)))
            .collect();
        assert_eq!(
            kinds,
            [
                (ScopeKind::Script, false),
                (ScopeKind::Arrow, false),
                (ScopeKind::Function, true),
                (ScopeKind::Arrow, true),
            ]
        );
    }
}
