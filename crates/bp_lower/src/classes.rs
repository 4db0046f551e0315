//! Classes.
//!
//! ```text
//! class C extends B { constructor(x) { super(x); } m() { return super.m(); } static s() {} }
//!   →
//! var C = function(_super) {
//!   function C(x) { $traceurRuntime.superConstructor(C).call(this, x); }
//!   return $traceurRuntime.createClass(C, {
//!     m: function() { return $traceurRuntime.superGet(this, C.prototype, "m").call(this); }
//!   }, {s: function() {}}, _super);
//! }(B);
//! ```
//!
//! The superclass argument and parameter only appear for derived classes.
//! `super` is resolved against the home object of the method it appears in:
//! `C.prototype` for instance members and `C` for static ones.

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use tracing::debug;

use crate::diagnostics::Reporter;
use crate::runtime::Helper;
use crate::temps::{TempAllocator, TempVars};
use crate::transform::{self, same_list, Transformer};

pub fn lower_classes(program: &Program, alloc: &mut TempAllocator, reporter: &mut Reporter) -> Program {
    debug!(pass = "classes", "start");
    let mut pass = Classes {
        temps: TempVars::new(alloc),
        reporter,
        homes: Vec::new(),
        entering: None,
    };
    let out = pass.transform_program(program);
    debug!(pass = "classes", changed = !same_list(&program.body, &out.body), "finish");
    out
}

/// Where `super` inside the current function resolves to.
#[derive(Clone)]
struct Home {
    class: Ident,
    is_static: bool,
    is_constructor: bool,
    derived: bool,
}

impl Home {
    fn object(&self) -> ExprRef {
        let class = expr_of_ident(&self.class);
        if self.is_static {
            class
        } else {
            member(class, "prototype")
        }
    }
}

struct Classes<'a, 'r> {
    temps: TempVars<'a>,
    reporter: &'r mut Reporter,
    /// One entry per enclosing non-arrow function; `None` outside methods.
    homes: Vec<Option<Home>>,
    /// Home of the method function about to be transformed.
    entering: Option<Home>,
}

impl Classes<'_, '_> {
    fn home(&self) -> Option<&Home> {
        self.homes.last().and_then(Option::as_ref)
    }

    fn lower_class(&mut self, class: &Class, name: Ident) -> ExprRef {
        let super_class = class.super_class.as_ref().map(|e| self.transform_expr(e));
        let derived = super_class.is_some();

        let mut constructor = None;
        let mut proto = Vec::new();
        let mut statics = Vec::new();
        for m in &class.members {
            let key = match &m.key {
                PropKey::Computed(e) => {
                    PropKey::Computed(Helper::ToProperty.call(vec![self.transform_expr(e)]))
                }
                key => key.clone(),
            };
            self.entering = Some(Home {
                class: name.clone(),
                is_static: m.is_static,
                is_constructor: m.kind == MethodKind::Constructor,
                derived,
            });
            let function = self.transform_function(&m.function);
            let prop = match m.kind {
                MethodKind::Constructor => {
                    constructor = Some(function);
                    continue;
                }
                MethodKind::Method => Prop::KeyValue {
                    key,
                    value: Expr::synthetic(ExprKind::Function(function)),
                },
                kind => Prop::Method {
                    key,
                    kind,
                    function,
                },
            };
            if m.is_static {
                statics.push(prop);
            } else {
                proto.push(prop);
            }
        }

        let constructor = match constructor {
            Some(f) => Function {
                span: f.span,
                ident: Some(name.clone()),
                ..(*f).clone()
            },
            None => {
                let body = if derived {
                    let parent = Helper::SuperConstructor.call(vec![expr_of_ident(&name)]);
                    vec![expr_stmt(call(
                        member(parent, "apply"),
                        vec![this(), ident_expr("arguments")],
                    ))]
                } else {
                    vec![]
                };
                Function {
                    ident: Some(name.clone()),
                    ..Function::simple(vec![], body)
                }
            }
        };

        let super_param = derived.then(|| self.temps.fresh("_super"));
        let mut args = vec![
            expr_of_ident(&name),
            Expr::synthetic(ExprKind::Object(proto)),
            Expr::synthetic(ExprKind::Object(statics)),
        ];
        args.extend(super_param.as_ref().map(temp_expr));
        let body = vec![
            Stmt::synthetic(StmtKind::Function(Rc::new(constructor))),
            return_stmt(Some(Helper::CreateClass.call(args))),
        ];
        let wrapper = anon_function(super_param.iter().map(temp_pat).collect(), body);
        call(wrapper, super_class.into_iter().collect())
    }

    fn class_expr_name(&mut self, class: &Class) -> Ident {
        match &class.ident {
            Some(ident) => ident.clone(),
            None => Ident::temp(&self.temps.fresh("_class")),
        }
    }

    /// `super.x` / `super[x]` as the key expression.
    fn super_key(&mut self, prop: &MemberProp) -> ExprRef {
        match prop {
            MemberProp::Name(name) => str_lit(name),
            MemberProp::Computed(e) => self.transform_expr(e),
        }
    }

    fn super_get(&mut self, span: Span, prop: &MemberProp) -> Option<ExprRef> {
        let Some(home) = self.home().cloned() else {
            self.reporter
                .error(span, "'super' property access is only valid inside a class method");
            return None;
        };
        let key = self.super_key(prop);
        Some(Helper::SuperGet.call(vec![this(), home.object(), key]))
    }

    fn lower_super_call(&mut self, span: Span, args: &[ExprOrSpread]) -> Option<ExprRef> {
        let home = match self.home() {
            Some(home) if home.is_constructor && home.derived => home.clone(),
            _ => {
                self.reporter
                    .error(span, "'super' call is only valid inside a derived class constructor");
                return None;
            }
        };
        let parent = Helper::SuperConstructor.call(vec![expr_of_ident(&home.class)]);
        let mut all = vec![ExprOrSpread::plain(this())];
        all.extend(args.iter().map(|a| ExprOrSpread {
            spread: a.spread,
            expr: self.transform_expr(&a.expr),
        }));
        Some(Expr::synthetic(ExprKind::Call {
            callee: member(parent, "call"),
            args: all,
        }))
    }

    fn lower_super_method_call(
        &mut self,
        span: Span,
        prop: &MemberProp,
        args: &[ExprOrSpread],
    ) -> Option<ExprRef> {
        let function = self.super_get(span, prop)?;
        let mut all = vec![ExprOrSpread::plain(this())];
        all.extend(args.iter().map(|a| ExprOrSpread {
            spread: a.spread,
            expr: self.transform_expr(&a.expr),
        }));
        Some(Expr::synthetic(ExprKind::Call {
            callee: member(function, "call"),
            args: all,
        }))
    }

    fn lower_super_set(
        &mut self,
        span: Span,
        op: AssignOp,
        prop: &MemberProp,
        value: &ExprRef,
    ) -> Option<ExprRef> {
        let Some(home) = self.home().cloned() else {
            self.reporter
                .error(span, "'super' property access is only valid inside a class method");
            return None;
        };
        let mut key = self.super_key(prop);
        let mut value = self.transform_expr(value);
        if let Some(op) = op.to_binary() {
            let read_key = match &key.kind {
                ExprKind::Ident(_) | ExprKind::Lit(_) => Expr::new(key.span, key.kind.clone()),
                _ => {
                    let tmp = self.temps.add_var("_ref");
                    key = assign(temp_pat(&tmp), key);
                    temp_expr(&tmp)
                }
            };
            let current = Helper::SuperGet.call(vec![this(), home.object(), read_key]);
            value = binary(op, current, value);
        }
        Some(Helper::SuperSet.call(vec![this(), home.object(), key, value]))
    }
}

fn super_member(expr: &Expr) -> Option<&MemberProp> {
    match &expr.kind {
        ExprKind::Member { object, prop } if matches!(object.kind, ExprKind::Super) => Some(prop),
        _ => None,
    }
}

impl Transformer for Classes<'_, '_> {
    fn transform_program(&mut self, program: &Program) -> Program {
        self.temps.push_scope();
        self.homes.push(None);
        let body = self.transform_stmt_list(&program.body);
        self.homes.pop();
        Program {
            kind: program.kind,
            body: self.temps.leave_body(body),
        }
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        let home = self.entering.take();
        self.homes.push(home);
        self.temps.push_scope();
        let walked = transform::walk_function(self, function);
        self.homes.pop();
        self.temps.leave_function(walked)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        self.temps.push_scope();
        let walked = transform::walk_arrow(self, arrow);
        self.temps.leave_arrow(walked)
    }

    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        match &stmt.kind {
            StmtKind::Class(class) => {
                let Some(name) = class.ident.clone() else {
                    unreachable!("class declaration without a name");
                };
                let value = self.lower_class(class, name.clone());
                Stmt::new(
                    stmt.span,
                    StmtKind::Var(VarDecl {
                        kind: VarKind::Var,
                        decls: vec![declarator(Pat::ident(name), Some(value))],
                    }),
                )
            }
            StmtKind::Export(ExportDecl::DefaultDecl(decl)) => match &decl.kind {
                StmtKind::Class(class) if class.ident.is_none() => {
                    let name = self.class_expr_name(class);
                    let value = self.lower_class(class, name);
                    Stmt::new(stmt.span, StmtKind::Export(ExportDecl::DefaultExpr(value)))
                }
                _ => transform::walk_stmt(self, stmt),
            },
            _ => transform::walk_stmt(self, stmt),
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        let lowered = match &expr.kind {
            ExprKind::Class(class) => {
                let name = self.class_expr_name(class);
                Some(self.lower_class(class, name))
            }
            ExprKind::Call { callee, args } if matches!(callee.kind, ExprKind::Super) => {
                self.lower_super_call(expr.span, args)
            }
            ExprKind::Call { callee, args } => match super_member(callee) {
                Some(prop) => self.lower_super_method_call(expr.span, prop, args),
                None => return transform::walk_expr(self, expr),
            },
            ExprKind::Assign { op, target, value } => match &**target {
                Pat::Expr(e) => match super_member(e) {
                    Some(prop) => self.lower_super_set(expr.span, *op, prop, value),
                    None => return transform::walk_expr(self, expr),
                },
                _ => return transform::walk_expr(self, expr),
            },
            ExprKind::Update { arg, .. } if super_member(arg).is_some() => {
                self.reporter
                    .error(expr.span, "update of a 'super' property is not supported");
                None
            }
            ExprKind::Member { .. } => match super_member(expr) {
                Some(prop) => self.super_get(expr.span, prop),
                None => return transform::walk_expr(self, expr),
            },
            _ => return transform::walk_expr(self, expr),
        };
        lowered.unwrap_or_else(|| expr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{check, lower_with, script};

    fn lower(input: &str, expected: &str) {
        check(input, expected, |p, alloc, reporter| lower_classes(p, alloc, reporter));
    }

    #[test]
    fn base_class_declaration() {
        lower(
            "class C { constructor(x) { this.x = x; } get y() { return 1; } m() {} static s() {} }",
            "var C = function() {
               function C(x) { this.x = x; }
               return $traceurRuntime.createClass(C, {get y() { return 1; }, m: function() {}}, {s: function() {}});
             }();",
        );
    }

    #[test]
    fn derived_class_gets_a_forwarding_constructor() {
        lower(
            "class D extends B {}",
            "var D = function(_super) {
               function D() { $traceurRuntime.superConstructor(D).apply(this, arguments); }
               return $traceurRuntime.createClass(D, {}, {}, _super);
             }(B);",
        );
    }

    #[test]
    fn super_calls_and_property_access() {
        lower(
            "class D extends B {
               constructor(a) { super(a, 1); }
               m() { return super.m(2) + super.x; }
               static s(v) { super.y = v; super[k] += 1; }
             }",
            "var D = function(_super) {
               function D(a) { $traceurRuntime.superConstructor(D).call(this, a, 1); }
               return $traceurRuntime.createClass(D, {
                 m: function() {
                   return $traceurRuntime.superGet(this, D.prototype, 'm').call(this, 2) +
                     $traceurRuntime.superGet(this, D.prototype, 'x');
                 }
               }, {
                 s: function(v) {
                   $traceurRuntime.superSet(this, D, 'y', v);
                   $traceurRuntime.superSet(this, D, k, $traceurRuntime.superGet(this, D, k) + 1);
                 }
               }, _super);
             }(B);",
        );
    }

    #[test]
    fn arrows_keep_the_home_object() {
        lower(
            "class C { m() { return () => super.m; } }",
            "var C = function() {
               function C() {}
               return $traceurRuntime.createClass(C, {
                 m: function() { return () => $traceurRuntime.superGet(this, C.prototype, 'm'); }
               }, {});
             }();",
        );
    }

    #[test]
    fn anonymous_class_expression_gets_a_temporary_name() {
        lower(
            "var x = class {};",
            "var x = function() { function _class() {} return $traceurRuntime.createClass(_class, {}, {}); }();",
        );
    }

    #[test]
    fn misplaced_super_is_reported() {
        let super_call = Expr::synthetic(ExprKind::Call {
            callee: Expr::synthetic(ExprKind::Super),
            args: vec![],
        });
        let mut program = script("({ m() { return super.x; } });");
        program.body.insert(
            0,
            Stmt::synthetic(StmtKind::Function(Rc::new(Function {
                ident: Some(Ident::synthetic("f")),
                ..Function::simple(vec![], vec![expr_stmt(super_call)])
            }))),
        );
        let (_, reporter) = lower_with(&program, |p, alloc, reporter| {
            lower_classes(p, alloc, reporter)
        });
        assert_eq!(reporter.error_count(), 2);
        let messages: Vec<_> = reporter.errors().map(|d| d.message.clone()).collect();
        assert!(messages[0].contains("derived class constructor"));
        assert!(messages[1].contains("class method"));
    }
}
