//! Read-only traversal, the analysis counterpart of [`crate::transform`].
//!
//! Hooks default to the `walk_*` function of the same node kind. Identifiers
//! are reported through two hooks so analyses can tell references from
//! bindings without re-deriving syntactic position.

use bp_ast::*;

pub trait Visit: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_stmts(self, &program.body);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    /// A pattern in binding position (declarations, parameters, catch).
    fn visit_binding_pat(&mut self, pat: &Pat) {
        walk_pat(self, pat, true);
    }

    /// A pattern in assignment position (`=` targets, `for (x of ...)`).
    fn visit_assign_pat(&mut self, pat: &Pat) {
        walk_pat(self, pat, false);
    }

    fn visit_function(&mut self, function: &Function) {
        walk_function(self, function);
    }

    fn visit_arrow(&mut self, arrow: &Arrow) {
        walk_arrow(self, arrow);
    }

    fn visit_class(&mut self, class: &Class) {
        walk_class(self, class);
    }

    fn visit_catch(&mut self, catch: &Catch) {
        walk_catch(self, catch);
    }

    /// An identifier read or written by an expression.
    fn visit_ident_ref(&mut self, _ident: &Ident) {}

    /// An identifier introduced by a declaration.
    fn visit_binding_ident(&mut self, _ident: &Ident) {}
}

pub fn walk_stmts<V: Visit>(v: &mut V, stmts: &[StmtRef]) {
    for stmt in stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_var_decl<V: Visit>(v: &mut V, decl: &VarDecl) {
    for d in &decl.decls {
        v.visit_binding_pat(&d.target);
        if let Some(init) = &d.init {
            v.visit_expr(init);
        }
    }
}

pub fn walk_catch<V: Visit>(v: &mut V, catch: &Catch) {
    if let Some(param) = &catch.param {
        v.visit_binding_pat(param);
    }
    walk_stmts(v, &catch.body);
}

pub fn walk_stmt<V: Visit>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Empty | StmtKind::Debugger | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Expr(e) | StmtKind::Throw(e) => v.visit_expr(e),
        StmtKind::Block(stmts) => walk_stmts(v, stmts),
        StmtKind::Var(decl) => walk_var_decl(v, decl),
        StmtKind::Function(f) => v.visit_function(f),
        StmtKind::Class(c) => v.visit_class(c),
        StmtKind::Return(arg) => {
            if let Some(arg) = arg {
                v.visit_expr(arg);
            }
        }
        StmtKind::If { test, cons, alt } => {
            v.visit_expr(test);
            v.visit_stmt(cons);
            if let Some(alt) = alt {
                v.visit_stmt(alt);
            }
        }
        StmtKind::While { test, body } => {
            v.visit_expr(test);
            v.visit_stmt(body);
        }
        StmtKind::DoWhile { body, test } => {
            v.visit_stmt(body);
            v.visit_expr(test);
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Var(decl)) => walk_var_decl(v, decl),
                Some(ForInit::Expr(e)) => v.visit_expr(e),
                None => {}
            }
            for e in [test, update].into_iter().flatten() {
                v.visit_expr(e);
            }
            v.visit_stmt(body);
        }
        StmtKind::ForEach {
            head, right, body, ..
        } => {
            match head {
                ForHead::Var(decl) => walk_var_decl(v, decl),
                ForHead::Pat(p) => v.visit_assign_pat(p),
            }
            v.visit_expr(right);
            v.visit_stmt(body);
        }
        StmtKind::Labeled { body, .. } => v.visit_stmt(body),
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            walk_stmts(v, block);
            if let Some(handler) = handler {
                v.visit_catch(handler);
            }
            if let Some(finalizer) = finalizer {
                walk_stmts(v, finalizer);
            }
        }
        StmtKind::Switch {
            discriminant,
            cases,
        } => {
            v.visit_expr(discriminant);
            for case in cases {
                if let Some(test) = &case.test {
                    v.visit_expr(test);
                }
                walk_stmts(v, &case.body);
            }
        }
        StmtKind::Import(import) => {
            for spec in &import.specifiers {
                v.visit_binding_ident(spec.local());
            }
        }
        StmtKind::Export(export) => match export {
            ExportDecl::Decl(s) | ExportDecl::DefaultDecl(s) => v.visit_stmt(s),
            ExportDecl::DefaultExpr(e) => v.visit_expr(e),
            ExportDecl::Named { .. } | ExportDecl::All { .. } => {}
        },
    }
}

fn walk_params<V: Visit>(v: &mut V, params: &[Param], rest: &Option<PatRef>) {
    for p in params {
        v.visit_binding_pat(&p.target);
        if let Some(default) = &p.default {
            v.visit_expr(default);
        }
    }
    if let Some(rest) = rest {
        v.visit_binding_pat(rest);
    }
}

pub fn walk_function<V: Visit>(v: &mut V, function: &Function) {
    if let Some(ident) = &function.ident {
        v.visit_binding_ident(ident);
    }
    walk_params(v, &function.params, &function.rest);
    walk_stmts(v, &function.body);
}

pub fn walk_arrow<V: Visit>(v: &mut V, arrow: &Arrow) {
    walk_params(v, &arrow.params, &arrow.rest);
    match &arrow.body {
        ArrowBody::Expr(e) => v.visit_expr(e),
        ArrowBody::Block(stmts) => walk_stmts(v, stmts),
    }
}

fn walk_prop_key<V: Visit>(v: &mut V, key: &PropKey) {
    if let PropKey::Computed(e) = key {
        v.visit_expr(e);
    }
}

pub fn walk_class<V: Visit>(v: &mut V, class: &Class) {
    if let Some(ident) = &class.ident {
        v.visit_binding_ident(ident);
    }
    if let Some(sup) = &class.super_class {
        v.visit_expr(sup);
    }
    for member in &class.members {
        walk_prop_key(v, &member.key);
        v.visit_function(&member.function);
    }
}

pub fn walk_expr<V: Visit>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::This | ExprKind::Super | ExprKind::Lit(_) => {}
        ExprKind::Ident(ident) => v.visit_ident_ref(ident),
        ExprKind::Template(template) => {
            for e in &template.exprs {
                v.visit_expr(e);
            }
        }
        ExprKind::Array(elems) => {
            for e in elems.iter().flatten() {
                v.visit_expr(&e.expr);
            }
        }
        ExprKind::Object(props) => {
            for prop in props {
                match prop {
                    Prop::KeyValue { key, value } => {
                        walk_prop_key(v, key);
                        v.visit_expr(value);
                    }
                    Prop::Shorthand(ident) => v.visit_ident_ref(ident),
                    Prop::Method { key, function, .. } => {
                        walk_prop_key(v, key);
                        v.visit_function(function);
                    }
                }
            }
        }
        ExprKind::Function(f) => v.visit_function(f),
        ExprKind::Arrow(a) => v.visit_arrow(a),
        ExprKind::Class(c) => v.visit_class(c),
        ExprKind::Unary { arg, .. } | ExprKind::Update { arg, .. } | ExprKind::Await(arg) => {
            v.visit_expr(arg)
        }
        ExprKind::Paren(inner) => v.visit_expr(inner),
        ExprKind::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::Assign { target, value, .. } => {
            v.visit_assign_pat(target);
            v.visit_expr(value);
        }
        ExprKind::Cond { test, cons, alt } => {
            v.visit_expr(test);
            v.visit_expr(cons);
            v.visit_expr(alt);
        }
        ExprKind::Call { callee, args } | ExprKind::New { callee, args } => {
            v.visit_expr(callee);
            for a in args {
                v.visit_expr(&a.expr);
            }
        }
        ExprKind::Member { object, prop } => {
            v.visit_expr(object);
            if let MemberProp::Computed(e) = prop {
                v.visit_expr(e);
            }
        }
        ExprKind::Seq(items) => {
            for e in items {
                v.visit_expr(e);
            }
        }
        ExprKind::Yield { arg, .. } => {
            if let Some(arg) = arg {
                v.visit_expr(arg);
            }
        }
    }
}

/// Walks a pattern. Identifiers are bindings in binding position and
/// references otherwise; defaults and computed keys are always expressions.
pub fn walk_pat<V: Visit>(v: &mut V, pat: &Pat, binding: bool) {
    match pat {
        Pat::Ident(ident) => {
            if binding {
                v.visit_binding_ident(ident);
            } else {
                v.visit_ident_ref(ident);
            }
        }
        Pat::Expr(e) => v.visit_expr(e),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                walk_pat_elem(v, elem, binding);
            }
            if let Some(rest) = &array.rest {
                walk_sub_pat(v, rest, binding);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                walk_prop_key(v, &prop.key);
                walk_pat_elem(v, &prop.value, binding);
            }
        }
    }
}

fn walk_sub_pat<V: Visit>(v: &mut V, pat: &Pat, binding: bool) {
    if binding {
        v.visit_binding_pat(pat);
    } else {
        v.visit_assign_pat(pat);
    }
}

fn walk_pat_elem<V: Visit>(v: &mut V, elem: &PatElem, binding: bool) {
    walk_sub_pat(v, &elem.target, binding);
    if let Some(default) = &elem.default {
        v.visit_expr(default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Names {
        refs: Vec<String>,
        bindings: Vec<String>,
    }

    impl Visit for Names {
        fn visit_ident_ref(&mut self, ident: &Ident) {
            self.refs.push(ident.name.to_string());
        }

        fn visit_binding_ident(&mut self, ident: &Ident) {
            self.bindings.push(ident.name.to_string());
        }
    }

    #[test]
    fn separates_references_from_bindings() {
        let p = bp_parser::parse_script(
            "var [a, {k: b = c}] = d; function f(x, ...y) { return {x, z}; } [e, g.h] = i;",
        )
        .expect("parse");
        let mut names = Names::default();
        names.visit_program(&p);
        assert_eq!(names.bindings, ["a", "b", "f", "x", "y"]);
        assert_eq!(names.refs, ["c", "d", "x", "z", "e", "g", "i"]);
    }
}
