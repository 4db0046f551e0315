//! Identity-preserving tree rewriting.
//!
//! Every `transform_*` hook defaults to the matching `walk_*` function,
//! which transforms each traversable child and rebuilds the node only when
//! some child came back as a different `Rc`. An untouched subtree is
//! returned as the very same allocation, so callers can test for change
//! with [`Rc::ptr_eq`].
//!
//! Passes override the hooks for the node kinds they rewrite and call the
//! `walk_*` function to fall back to the default behavior.

use std::rc::Rc;

use bp_ast::*;

pub trait Transformer: Sized {
    fn transform_program(&mut self, program: &Program) -> Program {
        walk_program(self, program)
    }

    fn transform_stmt_list(&mut self, stmts: &[StmtRef]) -> Vec<StmtRef> {
        walk_stmt_list(self, stmts)
    }

    /// The statement list of a function or method body.
    fn transform_function_body(&mut self, body: &[StmtRef]) -> Vec<StmtRef> {
        self.transform_stmt_list(body)
    }

    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        walk_stmt(self, stmt)
    }

    fn transform_var_decl(&mut self, decl: &VarDecl) -> VarDecl {
        walk_var_decl(self, decl)
    }

    fn transform_catch(&mut self, catch: &Catch) -> Catch {
        walk_catch(self, catch)
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        walk_expr(self, expr)
    }

    fn transform_pat(&mut self, pat: &PatRef) -> PatRef {
        walk_pat(self, pat)
    }

    /// Identifiers in both reference and binding position.
    fn transform_ident(&mut self, ident: &Ident) -> Ident {
        ident.clone()
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        walk_function(self, function)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        walk_arrow(self, arrow)
    }

    fn transform_class(&mut self, class: &Rc<Class>) -> Rc<Class> {
        walk_class(self, class)
    }
}

/// Records whether any child of the node being rebuilt changed.
#[derive(Default)]
pub(crate) struct Changes(bool);

impl Changes {
    pub(crate) fn any(&self) -> bool {
        self.0
    }

    pub(crate) fn mark(&mut self, changed: bool) {
        self.0 |= changed;
    }

    pub(crate) fn rc<T>(&mut self, old: &Rc<T>, new: Rc<T>) -> Rc<T> {
        self.0 |= !Rc::ptr_eq(old, &new);
        new
    }

    pub(crate) fn opt<T>(&mut self, old: &Option<Rc<T>>, new: Option<Rc<T>>) -> Option<Rc<T>> {
        self.0 |= !same_opt(old, &new);
        new
    }

    pub(crate) fn list<T>(&mut self, old: &[Rc<T>], new: Vec<Rc<T>>) -> Vec<Rc<T>> {
        self.0 |= !same_list(old, &new);
        new
    }

    pub(crate) fn ident(&mut self, old: &Ident, new: Ident) -> Ident {
        self.0 |= *old != new;
        new
    }
}

pub fn same_opt<T>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub fn same_list<T>(a: &[Rc<T>], b: &[Rc<T>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| Rc::ptr_eq(a, b))
}

pub fn same_var_decl(a: &VarDecl, b: &VarDecl) -> bool {
    a.kind == b.kind
        && a.decls.len() == b.decls.len()
        && a.decls
            .iter()
            .zip(&b.decls)
            .all(|(a, b)| Rc::ptr_eq(&a.target, &b.target) && same_opt(&a.init, &b.init))
}

fn same_catch(a: &Catch, b: &Catch) -> bool {
    same_opt(&a.param, &b.param) && same_list(&a.body, &b.body)
}

// ---------------------------------------------------------------------------
// Programs and statements
// ---------------------------------------------------------------------------

pub fn walk_program<T: Transformer>(t: &mut T, program: &Program) -> Program {
    Program {
        kind: program.kind,
        body: t.transform_stmt_list(&program.body),
    }
}

pub fn walk_stmt_list<T: Transformer>(t: &mut T, stmts: &[StmtRef]) -> Vec<StmtRef> {
    stmts.iter().map(|s| t.transform_stmt(s)).collect()
}

pub fn walk_var_decl<T: Transformer>(t: &mut T, decl: &VarDecl) -> VarDecl {
    VarDecl {
        kind: decl.kind,
        decls: decl
            .decls
            .iter()
            .map(|d| VarDeclarator {
                target: t.transform_pat(&d.target),
                init: d.init.as_ref().map(|e| t.transform_expr(e)),
            })
            .collect(),
    }
}

pub fn walk_catch<T: Transformer>(t: &mut T, catch: &Catch) -> Catch {
    Catch {
        param: catch.param.as_ref().map(|p| t.transform_pat(p)),
        body: t.transform_stmt_list(&catch.body),
    }
}

fn walk_var_decl_tracked<T: Transformer>(t: &mut T, c: &mut Changes, decl: &VarDecl) -> VarDecl {
    let new = t.transform_var_decl(decl);
    c.mark(!same_var_decl(decl, &new));
    new
}

pub fn walk_stmt<T: Transformer>(t: &mut T, stmt: &StmtRef) -> StmtRef {
    let mut c = Changes::default();
    let kind = match &stmt.kind {
        StmtKind::Empty | StmtKind::Debugger | StmtKind::Break(_) | StmtKind::Continue(_) => {
            return stmt.clone()
        }
        StmtKind::Expr(e) => StmtKind::Expr(c.rc(e, t.transform_expr(e))),
        StmtKind::Block(stmts) => StmtKind::Block(c.list(stmts, t.transform_stmt_list(stmts))),
        StmtKind::Var(decl) => StmtKind::Var(walk_var_decl_tracked(t, &mut c, decl)),
        StmtKind::Function(f) => StmtKind::Function(c.rc(f, t.transform_function(f))),
        StmtKind::Class(class) => StmtKind::Class(c.rc(class, t.transform_class(class))),
        StmtKind::Return(arg) => {
            StmtKind::Return(c.opt(arg, arg.as_ref().map(|e| t.transform_expr(e))))
        }
        StmtKind::Throw(e) => StmtKind::Throw(c.rc(e, t.transform_expr(e))),
        StmtKind::If { test, cons, alt } => StmtKind::If {
            test: c.rc(test, t.transform_expr(test)),
            cons: c.rc(cons, t.transform_stmt(cons)),
            alt: c.opt(alt, alt.as_ref().map(|s| t.transform_stmt(s))),
        },
        StmtKind::While { test, body } => StmtKind::While {
            test: c.rc(test, t.transform_expr(test)),
            body: c.rc(body, t.transform_stmt(body)),
        },
        StmtKind::DoWhile { body, test } => StmtKind::DoWhile {
            body: c.rc(body, t.transform_stmt(body)),
            test: c.rc(test, t.transform_expr(test)),
        },
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => StmtKind::For {
            init: match init {
                Some(ForInit::Var(decl)) => Some(ForInit::Var(walk_var_decl_tracked(t, &mut c, decl))),
                Some(ForInit::Expr(e)) => Some(ForInit::Expr(c.rc(e, t.transform_expr(e)))),
                None => None,
            },
            test: c.opt(test, test.as_ref().map(|e| t.transform_expr(e))),
            update: c.opt(update, update.as_ref().map(|e| t.transform_expr(e))),
            body: c.rc(body, t.transform_stmt(body)),
        },
        StmtKind::ForEach {
            kind,
            head,
            right,
            body,
        } => StmtKind::ForEach {
            kind: *kind,
            head: match head {
                ForHead::Var(decl) => ForHead::Var(walk_var_decl_tracked(t, &mut c, decl)),
                ForHead::Pat(p) => ForHead::Pat(c.rc(p, t.transform_pat(p))),
            },
            right: c.rc(right, t.transform_expr(right)),
            body: c.rc(body, t.transform_stmt(body)),
        },
        StmtKind::Labeled { label, body } => StmtKind::Labeled {
            label: label.clone(),
            body: c.rc(body, t.transform_stmt(body)),
        },
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => StmtKind::Try {
            block: c.list(block, t.transform_stmt_list(block)),
            handler: handler.as_ref().map(|h| {
                let new = t.transform_catch(h);
                c.mark(!same_catch(h, &new));
                new
            }),
            finalizer: finalizer
                .as_ref()
                .map(|f| c.list(f, t.transform_stmt_list(f))),
        },
        StmtKind::Switch {
            discriminant,
            cases,
        } => StmtKind::Switch {
            discriminant: c.rc(discriminant, t.transform_expr(discriminant)),
            cases: cases
                .iter()
                .map(|case| SwitchCase {
                    test: c.opt(&case.test, case.test.as_ref().map(|e| t.transform_expr(e))),
                    body: c.list(&case.body, t.transform_stmt_list(&case.body)),
                })
                .collect(),
        },
        StmtKind::Import(import) => StmtKind::Import(ImportDecl {
            specifiers: import
                .specifiers
                .iter()
                .map(|spec| match spec {
                    ImportSpecifier::Default(local) => {
                        ImportSpecifier::Default(c.ident(local, t.transform_ident(local)))
                    }
                    ImportSpecifier::Namespace(local) => {
                        ImportSpecifier::Namespace(c.ident(local, t.transform_ident(local)))
                    }
                    ImportSpecifier::Named { imported, local } => ImportSpecifier::Named {
                        imported: imported.clone(),
                        local: c.ident(local, t.transform_ident(local)),
                    },
                })
                .collect(),
            source: import.source.clone(),
        }),
        StmtKind::Export(export) => StmtKind::Export(match export {
            ExportDecl::Decl(s) => ExportDecl::Decl(c.rc(s, t.transform_stmt(s))),
            ExportDecl::DefaultDecl(s) => ExportDecl::DefaultDecl(c.rc(s, t.transform_stmt(s))),
            ExportDecl::DefaultExpr(e) => ExportDecl::DefaultExpr(c.rc(e, t.transform_expr(e))),
            ExportDecl::Named { .. } | ExportDecl::All { .. } => return stmt.clone(),
        }),
    };
    if !c.any() {
        return stmt.clone();
    }
    Stmt::new(stmt.span, kind)
}

// ---------------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------------

fn walk_params<T: Transformer>(t: &mut T, c: &mut Changes, params: &[Param]) -> Vec<Param> {
    params
        .iter()
        .map(|p| Param {
            target: c.rc(&p.target, t.transform_pat(&p.target)),
            default: c.opt(&p.default, p.default.as_ref().map(|e| t.transform_expr(e))),
        })
        .collect()
}

pub fn walk_function<T: Transformer>(t: &mut T, function: &Rc<Function>) -> Rc<Function> {
    let mut c = Changes::default();
    let ident = function
        .ident
        .as_ref()
        .map(|i| c.ident(i, t.transform_ident(i)));
    let params = walk_params(t, &mut c, &function.params);
    let rest = c.opt(&function.rest, function.rest.as_ref().map(|r| t.transform_pat(r)));
    let body = c.list(&function.body, t.transform_function_body(&function.body));
    if !c.any() {
        return function.clone();
    }
    Rc::new(Function {
        span: function.span,
        ident,
        params,
        rest,
        body,
        is_generator: function.is_generator,
        is_async: function.is_async,
    })
}

pub fn walk_arrow<T: Transformer>(t: &mut T, arrow: &Rc<Arrow>) -> Rc<Arrow> {
    let mut c = Changes::default();
    let params = walk_params(t, &mut c, &arrow.params);
    let rest = c.opt(&arrow.rest, arrow.rest.as_ref().map(|r| t.transform_pat(r)));
    let body = match &arrow.body {
        ArrowBody::Expr(e) => ArrowBody::Expr(c.rc(e, t.transform_expr(e))),
        ArrowBody::Block(stmts) => ArrowBody::Block(c.list(stmts, t.transform_function_body(stmts))),
    };
    if !c.any() {
        return arrow.clone();
    }
    Rc::new(Arrow {
        span: arrow.span,
        params,
        rest,
        body,
        is_async: arrow.is_async,
    })
}

fn walk_prop_key<T: Transformer>(t: &mut T, c: &mut Changes, key: &PropKey) -> PropKey {
    match key {
        PropKey::Computed(e) => PropKey::Computed(c.rc(e, t.transform_expr(e))),
        other => other.clone(),
    }
}

pub fn walk_class<T: Transformer>(t: &mut T, class: &Rc<Class>) -> Rc<Class> {
    let mut c = Changes::default();
    let ident = class.ident.as_ref().map(|i| c.ident(i, t.transform_ident(i)));
    let super_class = c.opt(
        &class.super_class,
        class.super_class.as_ref().map(|e| t.transform_expr(e)),
    );
    let members = class
        .members
        .iter()
        .map(|m| ClassMember {
            key: walk_prop_key(t, &mut c, &m.key),
            kind: m.kind,
            is_static: m.is_static,
            function: c.rc(&m.function, t.transform_function(&m.function)),
        })
        .collect();
    if !c.any() {
        return class.clone();
    }
    Rc::new(Class {
        span: class.span,
        ident,
        super_class,
        members,
    })
}

// ---------------------------------------------------------------------------
// Expressions and patterns
// ---------------------------------------------------------------------------

fn walk_args<T: Transformer>(t: &mut T, c: &mut Changes, args: &[ExprOrSpread]) -> Vec<ExprOrSpread> {
    args.iter()
        .map(|a| ExprOrSpread {
            spread: a.spread,
            expr: c.rc(&a.expr, t.transform_expr(&a.expr)),
        })
        .collect()
}

fn walk_prop<T: Transformer>(t: &mut T, c: &mut Changes, prop: &Prop) -> Prop {
    match prop {
        Prop::KeyValue { key, value } => Prop::KeyValue {
            key: walk_prop_key(t, c, key),
            value: c.rc(value, t.transform_expr(value)),
        },
        Prop::Shorthand(ident) => {
            let value = t.transform_expr(&factory::expr_of_ident(ident));
            match value.as_ident() {
                Some(new) if new == ident => Prop::Shorthand(ident.clone()),
                _ => {
                    c.mark(true);
                    Prop::KeyValue {
                        key: PropKey::Ident(ident.name.text().into()),
                        value,
                    }
                }
            }
        }
        Prop::Method {
            key,
            kind,
            function,
        } => Prop::Method {
            key: walk_prop_key(t, c, key),
            kind: *kind,
            function: c.rc(function, t.transform_function(function)),
        },
    }
}

pub fn walk_expr<T: Transformer>(t: &mut T, expr: &ExprRef) -> ExprRef {
    let mut c = Changes::default();
    let kind = match &expr.kind {
        ExprKind::This | ExprKind::Super | ExprKind::Lit(_) => return expr.clone(),
        ExprKind::Ident(ident) => ExprKind::Ident(c.ident(ident, t.transform_ident(ident))),
        ExprKind::Template(template) => ExprKind::Template(Template {
            quasis: template.quasis.clone(),
            exprs: c.list(&template.exprs, template.exprs.iter().map(|e| t.transform_expr(e)).collect()),
        }),
        ExprKind::Array(elems) => ExprKind::Array(
            elems
                .iter()
                .map(|e| {
                    e.as_ref().map(|e| ExprOrSpread {
                        spread: e.spread,
                        expr: c.rc(&e.expr, t.transform_expr(&e.expr)),
                    })
                })
                .collect(),
        ),
        ExprKind::Object(props) => {
            ExprKind::Object(props.iter().map(|p| walk_prop(t, &mut c, p)).collect())
        }
        ExprKind::Function(f) => ExprKind::Function(c.rc(f, t.transform_function(f))),
        ExprKind::Arrow(a) => ExprKind::Arrow(c.rc(a, t.transform_arrow(a))),
        ExprKind::Class(class) => ExprKind::Class(c.rc(class, t.transform_class(class))),
        ExprKind::Unary { op, arg } => ExprKind::Unary {
            op: *op,
            arg: c.rc(arg, t.transform_expr(arg)),
        },
        ExprKind::Update { op, prefix, arg } => ExprKind::Update {
            op: *op,
            prefix: *prefix,
            arg: c.rc(arg, t.transform_expr(arg)),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: c.rc(left, t.transform_expr(left)),
            right: c.rc(right, t.transform_expr(right)),
        },
        ExprKind::Assign { op, target, value } => ExprKind::Assign {
            op: *op,
            target: c.rc(target, t.transform_pat(target)),
            value: c.rc(value, t.transform_expr(value)),
        },
        ExprKind::Cond { test, cons, alt } => ExprKind::Cond {
            test: c.rc(test, t.transform_expr(test)),
            cons: c.rc(cons, t.transform_expr(cons)),
            alt: c.rc(alt, t.transform_expr(alt)),
        },
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: c.rc(callee, t.transform_expr(callee)),
            args: walk_args(t, &mut c, args),
        },
        ExprKind::New { callee, args } => ExprKind::New {
            callee: c.rc(callee, t.transform_expr(callee)),
            args: walk_args(t, &mut c, args),
        },
        ExprKind::Member { object, prop } => ExprKind::Member {
            object: c.rc(object, t.transform_expr(object)),
            prop: match prop {
                MemberProp::Computed(e) => MemberProp::Computed(c.rc(e, t.transform_expr(e))),
                MemberProp::Name(name) => MemberProp::Name(name.clone()),
            },
        },
        ExprKind::Seq(items) => {
            ExprKind::Seq(c.list(items, items.iter().map(|e| t.transform_expr(e)).collect()))
        }
        ExprKind::Paren(inner) => ExprKind::Paren(c.rc(inner, t.transform_expr(inner))),
        ExprKind::Yield { arg, delegate } => ExprKind::Yield {
            arg: c.opt(arg, arg.as_ref().map(|e| t.transform_expr(e))),
            delegate: *delegate,
        },
        ExprKind::Await(arg) => ExprKind::Await(c.rc(arg, t.transform_expr(arg))),
    };
    if !c.any() {
        return expr.clone();
    }
    Expr::new(expr.span, kind)
}

fn walk_pat_elem<T: Transformer>(t: &mut T, c: &mut Changes, elem: &PatElem) -> PatElem {
    PatElem {
        target: c.rc(&elem.target, t.transform_pat(&elem.target)),
        default: c.opt(&elem.default, elem.default.as_ref().map(|e| t.transform_expr(e))),
    }
}

pub fn walk_pat<T: Transformer>(t: &mut T, pat: &PatRef) -> PatRef {
    let mut c = Changes::default();
    let new = match &**pat {
        Pat::Ident(ident) => Pat::Ident(c.ident(ident, t.transform_ident(ident))),
        Pat::Expr(e) => {
            let new = t.transform_expr(e);
            if Rc::ptr_eq(e, &new) {
                return pat.clone();
            }
            return factory::expr_to_pat(&new);
        }
        Pat::Array(array) => Pat::Array(ArrayPat {
            span: array.span,
            elems: array
                .elems
                .iter()
                .map(|e| e.as_ref().map(|e| walk_pat_elem(t, &mut c, e)))
                .collect(),
            rest: c.opt(&array.rest, array.rest.as_ref().map(|r| t.transform_pat(r))),
        }),
        Pat::Object(object) => Pat::Object(ObjectPat {
            span: object.span,
            props: object
                .props
                .iter()
                .map(|p| ObjectPatProp {
                    key: walk_prop_key(t, &mut c, &p.key),
                    value: walk_pat_elem(t, &mut c, &p.value),
                })
                .collect(),
        }),
    };
    if !c.any() {
        return pat.clone();
    }
    Rc::new(new)
}

#[cfg(test)]
mod tests {
    use bp_ast::factory::*;

    use super::*;

    struct Identity;
    impl Transformer for Identity {}

    /// Renames every identifier `a` to `b`.
    struct RenameA;
    impl Transformer for RenameA {
        fn transform_ident(&mut self, ident: &Ident) -> Ident {
            if ident.is("a") {
                Ident::new(ident.span, "b")
            } else {
                ident.clone()
            }
        }
    }

    fn program(source: &str) -> Program {
        bp_parser::parse_script(source).expect("parse")
    }

    #[test]
    fn untouched_tree_is_returned_by_reference() {
        let p = program(
            "function f(x, y = 1) { for (let i of xs) { try { g(i); } catch (e) {} } }\n\
             var o = {k: [1, , ...z], m() { return this; }};\n\
             class C extends D { static s() {} }",
        );
        let out = Identity.transform_program(&p);
        assert!(same_list(&p.body, &out.body));
    }

    #[test]
    fn only_the_changed_spine_is_rebuilt() {
        let p = program("c(1); if (x) { a(); } d();");
        let out = RenameA.transform_program(&p);
        assert!(Rc::ptr_eq(&p.body[0], &out.body[0]));
        assert!(!Rc::ptr_eq(&p.body[1], &out.body[1]));
        assert!(Rc::ptr_eq(&p.body[2], &out.body[2]));
        let StmtKind::If { test, .. } = &out.body[1].kind else {
            panic!("expected if");
        };
        let StmtKind::If { test: old_test, .. } = &p.body[1].kind else {
            panic!("expected if");
        };
        assert!(Rc::ptr_eq(test, old_test));
    }

    #[test]
    fn renamed_shorthand_becomes_key_value() {
        let p = program("({a});");
        let out = RenameA.transform_program(&p);
        assert_eq!(bp_codegen::print_program(&out), "({a: b});\n");
    }

    #[test]
    fn pattern_targets_use_transform_ident() {
        let p = program("var [a, {k: a}] = a;");
        let out = RenameA.transform_program(&p);
        assert_eq!(bp_codegen::print_program(&out), "var [b, {k: b}] = b;\n");
        let stmt = expr_stmt(ident_expr("z"));
        assert!(Rc::ptr_eq(&RenameA.transform_stmt(&stmt), &stmt));
    }
}
