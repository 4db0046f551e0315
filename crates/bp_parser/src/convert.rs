//! SWC AST → backport AST.
//!
//! Runs after [`SupportChecker`](crate::support::SupportChecker) has accepted
//! the tree, so the node kinds it rejects are unreachable here. Parentheses
//! are dropped; the printer derives them from precedence.

use std::rc::Rc;

use bp_ast::factory::expr_to_pat;
use bp_ast::*;
use swc_common::{sync::Lrc, SourceMap, Spanned};
use swc_ecma_ast as ast;

pub(crate) struct Converter {
    cm: Lrc<SourceMap>,
}

fn atom(s: &str) -> Atom {
    Rc::from(s)
}

fn str_value(s: &ast::Str) -> Atom {
    atom(s.value.as_str().unwrap_or(""))
}

fn export_name(name: &ast::ModuleExportName) -> Atom {
    match name {
        ast::ModuleExportName::Ident(id) => atom(&id.sym),
        ast::ModuleExportName::Str(s) => str_value(s),
    }
}

fn num_raw(n: &ast::Number) -> Atom {
    match &n.raw {
        Some(raw) => atom(raw),
        None => atom(&n.value.to_string()),
    }
}

impl Converter {
    pub(crate) fn new(cm: Lrc<SourceMap>) -> Self {
        Self { cm }
    }

    fn span(&self, sp: swc_common::Span) -> Span {
        if sp.is_dummy() {
            return Span::DUMMY;
        }
        let loc = self.cm.lookup_char_pos(sp.lo);
        Span::new(sp.lo.0, sp.hi.0, loc.line as u32, loc.col.0 as u32 + 1)
    }

    fn ident(&self, id: &ast::Ident) -> Ident {
        Ident::new(self.span(id.span), &*id.sym)
    }

    // -----------------------------------------------------------------------
    // Programs and module items
    // -----------------------------------------------------------------------

    pub(crate) fn script(&self, script: &ast::Script) -> Program {
        Program {
            kind: ProgramKind::Script,
            body: self.stmts(&script.body),
        }
    }

    pub(crate) fn module(&self, module: &ast::Module) -> Program {
        Program {
            kind: ProgramKind::Module,
            body: module.body.iter().map(|item| self.module_item(item)).collect(),
        }
    }

    fn module_item(&self, item: &ast::ModuleItem) -> StmtRef {
        let decl = match item {
            ast::ModuleItem::Stmt(stmt) => return self.stmt(stmt),
            ast::ModuleItem::ModuleDecl(decl) => decl,
        };
        let span = self.span(decl.span());
        let kind = match decl {
            ast::ModuleDecl::Import(import) => StmtKind::Import(ImportDecl {
                specifiers: import
                    .specifiers
                    .iter()
                    .map(|spec| match spec {
                        ast::ImportSpecifier::Default(d) => {
                            ImportSpecifier::Default(self.ident(&d.local))
                        }
                        ast::ImportSpecifier::Namespace(ns) => {
                            ImportSpecifier::Namespace(self.ident(&ns.local))
                        }
                        ast::ImportSpecifier::Named(named) => ImportSpecifier::Named {
                            imported: named
                                .imported
                                .as_ref()
                                .map(export_name)
                                .unwrap_or_else(|| atom(&named.local.sym)),
                            local: self.ident(&named.local),
                        },
                    })
                    .collect(),
                source: str_value(&import.src),
            }),
            ast::ModuleDecl::ExportDecl(export) => {
                StmtKind::Export(ExportDecl::Decl(self.decl(&export.decl)))
            }
            ast::ModuleDecl::ExportNamed(named) => StmtKind::Export(ExportDecl::Named {
                specifiers: named
                    .specifiers
                    .iter()
                    .map(|spec| match spec {
                        ast::ExportSpecifier::Named(n) => {
                            let local = export_name(&n.orig);
                            ExportSpecifier {
                                exported: n.exported.as_ref().map(export_name).unwrap_or_else(|| local.clone()),
                                local,
                            }
                        }
                        other => unreachable!("export specifier {other:?} passed the support check"),
                    })
                    .collect(),
                source: named.src.as_deref().map(str_value),
            }),
            ast::ModuleDecl::ExportDefaultDecl(default) => {
                let stmt = match &default.decl {
                    ast::DefaultDecl::Fn(f) => Stmt::new(
                        self.span(f.function.span),
                        StmtKind::Function(Rc::new(self.function(f.ident.as_ref(), &f.function))),
                    ),
                    ast::DefaultDecl::Class(c) => Stmt::new(
                        self.span(c.class.span),
                        StmtKind::Class(Rc::new(self.class(c.ident.as_ref(), &c.class))),
                    ),
                    ast::DefaultDecl::TsInterfaceDecl(_) => {
                        unreachable!("TypeScript declaration in an ECMAScript parse")
                    }
                };
                StmtKind::Export(ExportDecl::DefaultDecl(stmt))
            }
            ast::ModuleDecl::ExportDefaultExpr(default) => {
                StmtKind::Export(ExportDecl::DefaultExpr(self.expr(&default.expr)))
            }
            ast::ModuleDecl::ExportAll(all) => StmtKind::Export(ExportDecl::All {
                source: str_value(&all.src),
            }),
            other => unreachable!("module declaration {other:?} in an ECMAScript parse"),
        };
        Stmt::new(span, kind)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn stmts(&self, stmts: &[ast::Stmt]) -> Vec<StmtRef> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&self, stmt: &ast::Stmt) -> StmtRef {
        let span = self.span(stmt.span());
        let kind = match stmt {
            ast::Stmt::Block(block) => StmtKind::Block(self.stmts(&block.stmts)),
            ast::Stmt::Empty(_) => StmtKind::Empty,
            ast::Stmt::Debugger(_) => StmtKind::Debugger,
            ast::Stmt::Return(ret) => StmtKind::Return(ret.arg.as_ref().map(|e| self.expr(e))),
            ast::Stmt::Labeled(labeled) => StmtKind::Labeled {
                label: atom(&labeled.label.sym),
                body: self.stmt(&labeled.body),
            },
            ast::Stmt::Break(b) => StmtKind::Break(b.label.as_ref().map(|l| atom(&l.sym))),
            ast::Stmt::Continue(c) => StmtKind::Continue(c.label.as_ref().map(|l| atom(&l.sym))),
            ast::Stmt::If(i) => StmtKind::If {
                test: self.expr(&i.test),
                cons: self.stmt(&i.cons),
                alt: i.alt.as_ref().map(|alt| self.stmt(alt)),
            },
            ast::Stmt::Switch(s) => StmtKind::Switch {
                discriminant: self.expr(&s.discriminant),
                cases: s
                    .cases
                    .iter()
                    .map(|case| SwitchCase {
                        test: case.test.as_ref().map(|t| self.expr(t)),
                        body: self.stmts(&case.cons),
                    })
                    .collect(),
            },
            ast::Stmt::Throw(t) => StmtKind::Throw(self.expr(&t.arg)),
            ast::Stmt::Try(t) => StmtKind::Try {
                block: self.stmts(&t.block.stmts),
                handler: t.handler.as_ref().map(|h| Catch {
                    param: h.param.as_ref().map(|p| self.pat(p)),
                    body: self.stmts(&h.body.stmts),
                }),
                finalizer: t.finalizer.as_ref().map(|f| self.stmts(&f.stmts)),
            },
            ast::Stmt::While(w) => StmtKind::While {
                test: self.expr(&w.test),
                body: self.stmt(&w.body),
            },
            ast::Stmt::DoWhile(d) => StmtKind::DoWhile {
                body: self.stmt(&d.body),
                test: self.expr(&d.test),
            },
            ast::Stmt::For(f) => StmtKind::For {
                init: f.init.as_ref().map(|init| match init {
                    ast::VarDeclOrExpr::VarDecl(v) => ForInit::Var(self.var_decl(v)),
                    ast::VarDeclOrExpr::Expr(e) => ForInit::Expr(self.expr(e)),
                }),
                test: f.test.as_ref().map(|t| self.expr(t)),
                update: f.update.as_ref().map(|u| self.expr(u)),
                body: self.stmt(&f.body),
            },
            ast::Stmt::ForIn(f) => StmtKind::ForEach {
                kind: ForEachKind::In,
                head: self.for_head(&f.left),
                right: self.expr(&f.right),
                body: self.stmt(&f.body),
            },
            ast::Stmt::ForOf(f) => StmtKind::ForEach {
                kind: ForEachKind::Of,
                head: self.for_head(&f.left),
                right: self.expr(&f.right),
                body: self.stmt(&f.body),
            },
            ast::Stmt::Decl(decl) => return self.decl(decl),
            ast::Stmt::Expr(e) => StmtKind::Expr(self.expr(&e.expr)),
            other => unreachable!("statement {other:?} passed the support check"),
        };
        Stmt::new(span, kind)
    }

    fn decl(&self, decl: &ast::Decl) -> StmtRef {
        let span = self.span(decl.span());
        let kind = match decl {
            ast::Decl::Class(c) => StmtKind::Class(Rc::new(self.class(Some(&c.ident), &c.class))),
            ast::Decl::Fn(f) => {
                StmtKind::Function(Rc::new(self.function(Some(&f.ident), &f.function)))
            }
            ast::Decl::Var(v) => StmtKind::Var(self.var_decl(v)),
            other => unreachable!("declaration {other:?} passed the support check"),
        };
        Stmt::new(span, kind)
    }

    fn var_decl(&self, decl: &ast::VarDecl) -> VarDecl {
        VarDecl {
            kind: match decl.kind {
                ast::VarDeclKind::Var => VarKind::Var,
                ast::VarDeclKind::Let => VarKind::Let,
                ast::VarDeclKind::Const => VarKind::Const,
            },
            decls: decl
                .decls
                .iter()
                .map(|d| VarDeclarator {
                    target: self.pat(&d.name),
                    init: d.init.as_ref().map(|e| self.expr(e)),
                })
                .collect(),
        }
    }

    fn for_head(&self, head: &ast::ForHead) -> ForHead {
        match head {
            ast::ForHead::VarDecl(v) => ForHead::Var(self.var_decl(v)),
            ast::ForHead::Pat(p) => ForHead::Pat(self.pat(p)),
            other => unreachable!("loop head {other:?} passed the support check"),
        }
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    fn pat(&self, pat: &ast::Pat) -> PatRef {
        match pat {
            ast::Pat::Ident(b) => Pat::ident(self.ident(&b.id)),
            ast::Pat::Array(a) => self.array_pat(a),
            ast::Pat::Object(o) => self.object_pat(o),
            ast::Pat::Expr(e) => expr_to_pat(&self.expr(e)),
            other => unreachable!("pattern {other:?} outside an element or parameter position"),
        }
    }

    fn pat_elem(&self, pat: &ast::Pat) -> PatElem {
        match pat {
            ast::Pat::Assign(a) => PatElem {
                target: self.pat(&a.left),
                default: Some(self.expr(&a.right)),
            },
            other => PatElem {
                target: self.pat(other),
                default: None,
            },
        }
    }

    fn array_pat(&self, a: &ast::ArrayPat) -> PatRef {
        let mut elems = Vec::with_capacity(a.elems.len());
        let mut rest = None;
        for elem in &a.elems {
            match elem {
                Some(ast::Pat::Rest(r)) => rest = Some(self.pat(&r.arg)),
                Some(p) => elems.push(Some(self.pat_elem(p))),
                None => elems.push(None),
            }
        }
        Rc::new(Pat::Array(ArrayPat {
            span: self.span(a.span),
            elems,
            rest,
        }))
    }

    fn object_pat(&self, o: &ast::ObjectPat) -> PatRef {
        let props = o
            .props
            .iter()
            .map(|prop| match prop {
                ast::ObjectPatProp::KeyValue(kv) => ObjectPatProp {
                    key: self.prop_key(&kv.key),
                    value: self.pat_elem(&kv.value),
                },
                ast::ObjectPatProp::Assign(a) => ObjectPatProp {
                    key: PropKey::Ident(atom(&a.key.id.sym)),
                    value: PatElem {
                        target: Pat::ident(self.ident(&a.key.id)),
                        default: a.value.as_ref().map(|v| self.expr(v)),
                    },
                },
                ast::ObjectPatProp::Rest(_) => unreachable!("object rest passed the support check"),
            })
            .collect();
        Rc::new(Pat::Object(ObjectPat {
            span: self.span(o.span),
            props,
        }))
    }

    fn assign_target(&self, target: &ast::AssignTarget) -> PatRef {
        match target {
            ast::AssignTarget::Simple(simple) => match simple {
                ast::SimpleAssignTarget::Ident(b) => Pat::ident(self.ident(&b.id)),
                ast::SimpleAssignTarget::Member(m) => Rc::new(Pat::Expr(self.member(m))),
                ast::SimpleAssignTarget::SuperProp(s) => Rc::new(Pat::Expr(self.super_prop(s))),
                ast::SimpleAssignTarget::Paren(p) => expr_to_pat(&self.expr(&p.expr)),
                other => unreachable!("assignment target {other:?} passed the support check"),
            },
            ast::AssignTarget::Pat(p) => match p {
                ast::AssignTargetPat::Array(a) => self.array_pat(a),
                ast::AssignTargetPat::Object(o) => self.object_pat(o),
                ast::AssignTargetPat::Invalid(_) => {
                    unreachable!("invalid assignment pattern passed the support check")
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Functions and classes
    // -----------------------------------------------------------------------

    fn params<'a>(&self, pats: impl Iterator<Item = &'a ast::Pat>) -> (Vec<Param>, Option<PatRef>) {
        let mut params = Vec::new();
        let mut rest = None;
        for pat in pats {
            match pat {
                ast::Pat::Rest(r) => rest = Some(self.pat(&r.arg)),
                ast::Pat::Assign(a) => params.push(Param {
                    target: self.pat(&a.left),
                    default: Some(self.expr(&a.right)),
                }),
                other => params.push(Param::plain(self.pat(other))),
            }
        }
        (params, rest)
    }

    fn body(&self, body: Option<&ast::BlockStmt>) -> Vec<StmtRef> {
        body.map(|b| self.stmts(&b.stmts)).unwrap_or_default()
    }

    fn function(&self, ident: Option<&ast::Ident>, f: &ast::Function) -> Function {
        let (params, rest) = self.params(f.params.iter().map(|p| &p.pat));
        Function {
            span: self.span(f.span),
            ident: ident.map(|i| self.ident(i)),
            params,
            rest,
            body: self.body(f.body.as_ref()),
            is_generator: f.is_generator,
            is_async: f.is_async,
        }
    }

    fn class(&self, ident: Option<&ast::Ident>, c: &ast::Class) -> Class {
        let mut members = Vec::new();
        for member in &c.body {
            match member {
                ast::ClassMember::Constructor(ctor) => {
                    let (params, rest) = self.params(ctor.params.iter().map(|p| match p {
                        ast::ParamOrTsParamProp::Param(p) => &p.pat,
                        ast::ParamOrTsParamProp::TsParamProp(_) => {
                            unreachable!("TypeScript parameter property in an ECMAScript parse")
                        }
                    }));
                    members.push(ClassMember {
                        key: PropKey::Ident(atom("constructor")),
                        kind: MethodKind::Constructor,
                        is_static: false,
                        function: Rc::new(Function {
                            span: self.span(ctor.span),
                            ident: None,
                            params,
                            rest,
                            body: self.body(ctor.body.as_ref()),
                            is_generator: false,
                            is_async: false,
                        }),
                    });
                }
                ast::ClassMember::Method(m) => members.push(ClassMember {
                    key: self.prop_key(&m.key),
                    kind: match m.kind {
                        ast::MethodKind::Method => MethodKind::Method,
                        ast::MethodKind::Getter => MethodKind::Getter,
                        ast::MethodKind::Setter => MethodKind::Setter,
                    },
                    is_static: m.is_static,
                    function: Rc::new(self.function(None, &m.function)),
                }),
                ast::ClassMember::Empty(_) => {}
                other => unreachable!("class member {other:?} passed the support check"),
            }
        }
        Class {
            span: self.span(c.span),
            ident: ident.map(|i| self.ident(i)),
            super_class: c.super_class.as_ref().map(|s| self.expr(s)),
            members,
        }
    }

    fn prop_key(&self, key: &ast::PropName) -> PropKey {
        match key {
            ast::PropName::Ident(i) => PropKey::Ident(atom(&i.sym)),
            ast::PropName::Str(s) => PropKey::Str(str_value(s)),
            ast::PropName::Num(n) => PropKey::Num(num_raw(n)),
            ast::PropName::Computed(c) => PropKey::Computed(self.expr(&c.expr)),
            ast::PropName::BigInt(_) => unreachable!("BigInt key passed the support check"),
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn args(&self, args: &[ast::ExprOrSpread]) -> Vec<ExprOrSpread> {
        args.iter()
            .map(|a| ExprOrSpread {
                spread: a.spread.is_some(),
                expr: self.expr(&a.expr),
            })
            .collect()
    }

    fn member(&self, m: &ast::MemberExpr) -> ExprRef {
        let prop = match &m.prop {
            ast::MemberProp::Ident(name) => MemberProp::Name(atom(&name.sym)),
            ast::MemberProp::Computed(c) => MemberProp::Computed(self.expr(&c.expr)),
            ast::MemberProp::PrivateName(_) => {
                unreachable!("private name passed the support check")
            }
        };
        Expr::new(
            self.span(m.span),
            ExprKind::Member {
                object: self.expr(&m.obj),
                prop,
            },
        )
    }

    fn super_prop(&self, s: &ast::SuperPropExpr) -> ExprRef {
        let prop = match &s.prop {
            ast::SuperProp::Ident(name) => MemberProp::Name(atom(&name.sym)),
            ast::SuperProp::Computed(c) => MemberProp::Computed(self.expr(&c.expr)),
        };
        Expr::new(
            self.span(s.span),
            ExprKind::Member {
                object: Expr::new(self.span(s.obj.span), ExprKind::Super),
                prop,
            },
        )
    }

    fn expr(&self, expr: &ast::Expr) -> ExprRef {
        let span = self.span(expr.span());
        let kind = match expr {
            ast::Expr::Paren(p) => return self.expr(&p.expr),
            ast::Expr::Member(m) => return self.member(m),
            ast::Expr::SuperProp(s) => return self.super_prop(s),
            ast::Expr::This(_) => ExprKind::This,
            ast::Expr::Ident(i) => ExprKind::Ident(self.ident(i)),
            ast::Expr::Lit(lit) => ExprKind::Lit(self.lit(lit)),
            ast::Expr::Tpl(t) => ExprKind::Template(Template {
                quasis: t.quasis.iter().map(|q| atom(&q.raw)).collect(),
                exprs: t.exprs.iter().map(|e| self.expr(e)).collect(),
            }),
            ast::Expr::Array(a) => ExprKind::Array(
                a.elems
                    .iter()
                    .map(|e| {
                        e.as_ref().map(|e| ExprOrSpread {
                            spread: e.spread.is_some(),
                            expr: self.expr(&e.expr),
                        })
                    })
                    .collect(),
            ),
            ast::Expr::Object(o) => {
                ExprKind::Object(o.props.iter().map(|p| self.prop(p)).collect())
            }
            ast::Expr::Fn(f) => {
                ExprKind::Function(Rc::new(self.function(f.ident.as_ref(), &f.function)))
            }
            ast::Expr::Arrow(a) => {
                let (params, rest) = self.params(a.params.iter());
                ExprKind::Arrow(Rc::new(Arrow {
                    span,
                    params,
                    rest,
                    body: match &*a.body {
                        ast::BlockStmtOrExpr::BlockStmt(b) => ArrowBody::Block(self.stmts(&b.stmts)),
                        ast::BlockStmtOrExpr::Expr(e) => ArrowBody::Expr(self.expr(e)),
                    },
                    is_async: a.is_async,
                }))
            }
            ast::Expr::Class(c) => {
                ExprKind::Class(Rc::new(self.class(c.ident.as_ref(), &c.class)))
            }
            ast::Expr::Unary(u) => ExprKind::Unary {
                op: unary_op(u.op),
                arg: self.expr(&u.arg),
            },
            ast::Expr::Update(u) => ExprKind::Update {
                op: match u.op {
                    ast::UpdateOp::PlusPlus => UpdateOp::Increment,
                    ast::UpdateOp::MinusMinus => UpdateOp::Decrement,
                },
                prefix: u.prefix,
                arg: self.expr(&u.arg),
            },
            ast::Expr::Bin(b) => ExprKind::Binary {
                op: binary_op(b.op),
                left: self.expr(&b.left),
                right: self.expr(&b.right),
            },
            ast::Expr::Assign(a) => ExprKind::Assign {
                op: assign_op(a.op),
                target: self.assign_target(&a.left),
                value: self.expr(&a.right),
            },
            ast::Expr::Cond(c) => ExprKind::Cond {
                test: self.expr(&c.test),
                cons: self.expr(&c.cons),
                alt: self.expr(&c.alt),
            },
            ast::Expr::Call(c) => ExprKind::Call {
                callee: match &c.callee {
                    ast::Callee::Super(s) => Expr::new(self.span(s.span), ExprKind::Super),
                    ast::Callee::Expr(e) => self.expr(e),
                    ast::Callee::Import(_) => unreachable!("`import()` passed the support check"),
                },
                args: self.args(&c.args),
            },
            ast::Expr::New(n) => ExprKind::New {
                callee: self.expr(&n.callee),
                args: n.args.as_deref().map(|a| self.args(a)).unwrap_or_default(),
            },
            ast::Expr::Seq(s) => ExprKind::Seq(s.exprs.iter().map(|e| self.expr(e)).collect()),
            ast::Expr::Yield(y) => ExprKind::Yield {
                arg: y.arg.as_ref().map(|a| self.expr(a)),
                delegate: y.delegate,
            },
            ast::Expr::Await(a) => ExprKind::Await(self.expr(&a.arg)),
            other => unreachable!("expression {other:?} passed the support check"),
        };
        Expr::new(span, kind)
    }

    fn prop(&self, prop: &ast::PropOrSpread) -> Prop {
        let prop = match prop {
            ast::PropOrSpread::Prop(p) => &**p,
            ast::PropOrSpread::Spread(_) => unreachable!("object spread passed the support check"),
        };
        match prop {
            ast::Prop::Shorthand(id) => Prop::Shorthand(self.ident(id)),
            ast::Prop::KeyValue(kv) => Prop::KeyValue {
                key: self.prop_key(&kv.key),
                value: self.expr(&kv.value),
            },
            ast::Prop::Method(m) => Prop::Method {
                key: self.prop_key(&m.key),
                kind: MethodKind::Method,
                function: Rc::new(self.function(None, &m.function)),
            },
            ast::Prop::Getter(g) => Prop::Method {
                key: self.prop_key(&g.key),
                kind: MethodKind::Getter,
                function: Rc::new(Function {
                    span: self.span(g.span),
                    ..Function::simple(Vec::new(), self.body(g.body.as_ref()))
                }),
            },
            ast::Prop::Setter(s) => {
                let (params, rest) = self.params(std::iter::once(&*s.param));
                Prop::Method {
                    key: self.prop_key(&s.key),
                    kind: MethodKind::Setter,
                    function: Rc::new(Function {
                        span: self.span(s.span),
                        rest,
                        ..Function::simple(params, self.body(s.body.as_ref()))
                    }),
                }
            }
            ast::Prop::Assign(_) => unreachable!("`=` in an object literal passed the support check"),
        }
    }

    fn lit(&self, lit: &ast::Lit) -> Lit {
        match lit {
            ast::Lit::Str(s) => Lit::Str(str_value(s)),
            ast::Lit::Bool(b) => Lit::Bool(b.value),
            ast::Lit::Null(_) => Lit::Null,
            ast::Lit::Num(n) => Lit::Num(num_raw(n)),
            ast::Lit::Regex(r) => Lit::Regex {
                pattern: atom(&r.exp),
                flags: atom(&r.flags),
            },
            other => unreachable!("literal {other:?} passed the support check"),
        }
    }
}

fn unary_op(op: ast::UnaryOp) -> UnaryOp {
    match op {
        ast::UnaryOp::Minus => UnaryOp::Minus,
        ast::UnaryOp::Plus => UnaryOp::Plus,
        ast::UnaryOp::Bang => UnaryOp::Not,
        ast::UnaryOp::Tilde => UnaryOp::BitNot,
        ast::UnaryOp::TypeOf => UnaryOp::TypeOf,
        ast::UnaryOp::Void => UnaryOp::Void,
        ast::UnaryOp::Delete => UnaryOp::Delete,
    }
}

fn binary_op(op: ast::BinaryOp) -> BinaryOp {
    match op {
        ast::BinaryOp::EqEq => BinaryOp::EqEq,
        ast::BinaryOp::NotEq => BinaryOp::NotEq,
        ast::BinaryOp::EqEqEq => BinaryOp::EqEqEq,
        ast::BinaryOp::NotEqEq => BinaryOp::NotEqEq,
        ast::BinaryOp::Lt => BinaryOp::Lt,
        ast::BinaryOp::LtEq => BinaryOp::LtEq,
        ast::BinaryOp::Gt => BinaryOp::Gt,
        ast::BinaryOp::GtEq => BinaryOp::GtEq,
        ast::BinaryOp::LShift => BinaryOp::LShift,
        ast::BinaryOp::RShift => BinaryOp::RShift,
        ast::BinaryOp::ZeroFillRShift => BinaryOp::ZeroFillRShift,
        ast::BinaryOp::Add => BinaryOp::Add,
        ast::BinaryOp::Sub => BinaryOp::Sub,
        ast::BinaryOp::Mul => BinaryOp::Mul,
        ast::BinaryOp::Div => BinaryOp::Div,
        ast::BinaryOp::Mod => BinaryOp::Mod,
        ast::BinaryOp::Exp => BinaryOp::Exp,
        ast::BinaryOp::BitOr => BinaryOp::BitOr,
        ast::BinaryOp::BitXor => BinaryOp::BitXor,
        ast::BinaryOp::BitAnd => BinaryOp::BitAnd,
        ast::BinaryOp::In => BinaryOp::In,
        ast::BinaryOp::InstanceOf => BinaryOp::InstanceOf,
        ast::BinaryOp::LogicalAnd => BinaryOp::And,
        ast::BinaryOp::LogicalOr => BinaryOp::Or,
        ast::BinaryOp::NullishCoalescing => BinaryOp::Nullish,
    }
}

fn assign_op(op: ast::AssignOp) -> AssignOp {
    match op {
        ast::AssignOp::Assign => AssignOp::Assign,
        ast::AssignOp::AddAssign => AssignOp::Add,
        ast::AssignOp::SubAssign => AssignOp::Sub,
        ast::AssignOp::MulAssign => AssignOp::Mul,
        ast::AssignOp::DivAssign => AssignOp::Div,
        ast::AssignOp::ModAssign => AssignOp::Mod,
        ast::AssignOp::ExpAssign => AssignOp::Exp,
        ast::AssignOp::LShiftAssign => AssignOp::LShift,
        ast::AssignOp::RShiftAssign => AssignOp::RShift,
        ast::AssignOp::ZeroFillRShiftAssign => AssignOp::ZeroFillRShift,
        ast::AssignOp::BitOrAssign => AssignOp::BitOr,
        ast::AssignOp::BitXorAssign => AssignOp::BitXor,
        ast::AssignOp::BitAndAssign => AssignOp::BitAnd,
        ast::AssignOp::AndAssign => AssignOp::And,
        ast::AssignOp::OrAssign => AssignOp::Or,
        ast::AssignOp::NullishAssign => AssignOp::Nullish,
    }
}

#[cfg(test)]
mod tests {
    use bp_ast::*;

    use crate::{parse_expr, parse_module, parse_script};

    #[test]
    fn parentheses_are_dropped() {
        let expr = parse_expr("((a))").unwrap();
        assert!(expr.is_ident("a"));
    }

    #[test]
    fn spans_are_one_based() {
        let program = parse_script("\n  foo;").unwrap();
        let span = program.body[0].span;
        assert_eq!((span.line, span.col), (2, 3));
    }

    #[test]
    fn array_pattern_rest_is_split_out() {
        let program = parse_script("var [a, , b = 1, ...c] = d;").unwrap();
        let StmtKind::Var(decl) = &program.body[0].kind else {
            panic!("expected var");
        };
        let Pat::Array(pat) = &*decl.decls[0].target else {
            panic!("expected array pattern");
        };
        assert_eq!(pat.elems.len(), 3);
        assert!(pat.elems[1].is_none());
        assert!(pat.elems[2].as_ref().is_some_and(|e| e.default.is_some()));
        assert!(pat.rest.as_ref().is_some_and(|r| r.as_ident().is_some_and(|i| i.is("c"))));
    }

    #[test]
    fn parameters_split_defaults_and_rest() {
        let program = parse_script("function f(a, b = 2, ...c) {}").unwrap();
        let StmtKind::Function(f) = &program.body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(f.params.len(), 2);
        assert!(f.params[1].default.is_some());
        assert!(f.rest.is_some());
    }

    #[test]
    fn super_member_and_call() {
        let program =
            parse_script("class A extends B { m() { super.x(); } constructor() { super(); } }")
                .unwrap();
        let StmtKind::Class(class) = &program.body[0].kind else {
            panic!("expected class");
        };
        assert_eq!(class.members.len(), 2);
        assert_eq!(class.members[1].kind, MethodKind::Constructor);
    }

    #[test]
    fn import_specifiers() {
        let program = parse_module("import d, {a, b as c} from 'm'; import * as ns from 'n';")
            .unwrap();
        let StmtKind::Import(import) = &program.body[0].kind else {
            panic!("expected import");
        };
        assert_eq!(&*import.source, "m");
        assert!(matches!(&import.specifiers[2],
            ImportSpecifier::Named { imported, local } if &**imported == "b" && local.is("c")));
        assert!(matches!(&program.body[1].kind,
            StmtKind::Import(i) if matches!(i.specifiers[0], ImportSpecifier::Namespace(_))));
    }
}
