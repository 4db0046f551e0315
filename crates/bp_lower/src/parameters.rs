//! Default and rest parameters.
//!
//! ```text
//! function f(a, b = 1, c) {}  →  function f(a) {
//!                                   var b = arguments[1] !== void 0 ? arguments[1] : 1;
//!                                   var c = arguments[2];
//!                                 }
//! function f(a, ...r) {}      →  function f(a) {
//!                                   for (var r = [], _i = 1; _i < arguments.length; _i++)
//!                                     r[_i - 1] = arguments[_i];
//!                                 }
//! ```
//!
//! Every parameter from the first default on is read from `arguments`, so
//! `f.length` still counts only the leading plain parameters. Arrows with
//! defaults or a rest parameter become function expressions first, with
//! `this` and `arguments` bound through the enclosing body.

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use tracing::debug;

use crate::temps::{TempAllocator, TempVars};
use crate::transform::{self, same_list, Transformer};
use crate::util::{alpha_rename_params, alpha_rename_this_and_arguments, arrow_body_stmts};

pub fn lower_parameters(program: &Program, alloc: &mut TempAllocator) -> Program {
    debug!(pass = "parameters", "start");
    let mut pass = Parameters {
        temps: TempVars::new(alloc),
    };
    let out = pass.transform_program(program);
    debug!(pass = "parameters", changed = !same_list(&program.body, &out.body), "finish");
    out
}

struct Parameters<'a> {
    temps: TempVars<'a>,
}

fn needs_lowering(params: &[Param], rest: &Option<PatRef>) -> bool {
    rest.is_some() || params.iter().any(|p| p.default.is_some())
}

fn arguments_at(i: ExprRef) -> ExprRef {
    index(ident_expr("arguments"), i)
}

fn pat_to_expr(pat: &PatRef) -> ExprRef {
    match &**pat {
        Pat::Ident(ident) => expr_of_ident(ident),
        Pat::Expr(e) => e.clone(),
        Pat::Array(_) | Pat::Object(_) => unreachable!("rest target is a pattern"),
    }
}

impl Parameters<'_> {
    /// `var p = arguments[i] !== void 0 ? arguments[i] : default;` for each
    /// parameter from the first default on.
    fn default_reads(&self, params: &[Param], from: usize) -> Vec<StmtRef> {
        params
            .iter()
            .enumerate()
            .skip(from)
            .map(|(i, param)| {
                let init = match &param.default {
                    Some(default) => cond(
                        binary(BinaryOp::NotEqEq, arguments_at(num(i)), void_zero()),
                        arguments_at(num(i)),
                        default.clone(),
                    ),
                    None => arguments_at(num(i)),
                };
                var_one(VarKind::Var, param.target.clone(), Some(init))
            })
            .collect()
    }

    /// Copies `arguments[n..]` into the rest binding. A pattern rest collects
    /// into a temporary first and is destructured from it.
    fn rest_loop(&mut self, rest: &PatRef, n: usize) -> Vec<StmtRef> {
        let (target, pattern) = if rest.is_pattern() {
            let tmp = self.temps.fresh("_ref");
            let decl = var_one(VarKind::Var, rest.clone(), Some(temp_expr(&tmp)));
            (temp_pat(&tmp), Some(decl))
        } else {
            (rest.clone(), None)
        };
        let i = self.temps.fresh("_i");
        let offset = match n {
            0 => temp_expr(&i),
            n => binary(BinaryOp::Sub, temp_expr(&i), num(n)),
        };
        let copy = expr_stmt(assign_to(
            index(pat_to_expr(&target), offset),
            arguments_at(temp_expr(&i)),
        ));
        let init = VarDecl {
            kind: VarKind::Var,
            decls: vec![
                declarator(target, Some(array(vec![]))),
                declarator(temp_pat(&i), Some(num(n))),
            ],
        };
        let for_stmt = Stmt::synthetic(StmtKind::For {
            init: Some(ForInit::Var(init)),
            test: Some(binary(
                BinaryOp::Lt,
                temp_expr(&i),
                member(ident_expr("arguments"), "length"),
            )),
            update: Some(Expr::synthetic(ExprKind::Update {
                op: UpdateOp::Increment,
                prefix: false,
                arg: temp_expr(&i),
            })),
            body: copy,
        });
        std::iter::once(for_stmt).chain(pattern).collect()
    }

    fn lower_function(&mut self, function: Rc<Function>) -> Rc<Function> {
        if !needs_lowering(&function.params, &function.rest) {
            return function;
        }
        let split = function
            .params
            .iter()
            .position(|p| p.default.is_some())
            .unwrap_or(function.params.len());
        let mut prologue = self.default_reads(&function.params, split);
        if let Some(rest) = &function.rest {
            prologue.extend(self.rest_loop(rest, function.params.len()));
        }
        Rc::new(Function {
            params: function.params[..split].to_vec(),
            rest: None,
            body: prepend_statements(&function.body, prologue),
            ..(*function).clone()
        })
    }

    /// An arrow that needs lowering becomes a plain function expression whose
    /// `this`/`arguments` come from the enclosing body.
    fn arrow_to_function(&mut self, arrow: &Arrow) -> Rc<Function> {
        let params = alpha_rename_params(&mut self.temps, &arrow.params);
        let body = alpha_rename_this_and_arguments(&mut self.temps, &arrow_body_stmts(&arrow.body));
        Rc::new(Function {
            span: arrow.span,
            ident: None,
            params,
            rest: arrow.rest.clone(),
            body,
            is_generator: false,
            is_async: arrow.is_async,
        })
    }
}

impl Transformer for Parameters<'_> {
    fn transform_program(&mut self, program: &Program) -> Program {
        self.temps.push_scope();
        let body = self.transform_stmt_list(&program.body);
        Program {
            kind: program.kind,
            body: self.temps.leave_body(body),
        }
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        self.temps.push_scope();
        let walked = transform::walk_function(self, function);
        let lowered = self.lower_function(walked);
        self.temps.leave_function(lowered)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        self.temps.push_scope();
        let walked = transform::walk_arrow(self, arrow);
        self.temps.leave_arrow(walked)
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        match &expr.kind {
            ExprKind::Arrow(arrow) if needs_lowering(&arrow.params, &arrow.rest) => {
                let function = self.arrow_to_function(arrow);
                let lowered = self.transform_function(&function);
                Expr::new(expr.span, ExprKind::Function(lowered))
            }
            _ => transform::walk_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{check, script};

    fn lower(input: &str, expected: &str) {
        check(input, expected, |p, alloc, _| lower_parameters(p, alloc));
    }

    #[test]
    fn defaults_read_from_arguments() {
        lower(
            "function f(a, b = 1, c) { return a + b + c; }",
            "function f(a) {
               var b = arguments[1] !== void 0 ? arguments[1] : 1;
               var c = arguments[2];
               return a + b + c;
             }",
        );
    }

    #[test]
    fn pattern_with_default_keeps_its_pattern() {
        lower(
            "function f({a} = {}) { return a; }",
            "function f() { var {a} = arguments[0] !== void 0 ? arguments[0] : {}; return a; }",
        );
    }

    #[test]
    fn rest_copies_the_tail_of_arguments() {
        lower(
            "function f(a, ...rest) { return rest; }",
            "function f(a) {
               for (var rest = [], _i = 1; _i < arguments.length; _i++) rest[_i - 1] = arguments[_i];
               return rest;
             }",
        );
        lower(
            "function g(...xs) { 'use strict'; }",
            "function g() {
               'use strict';
               for (var xs = [], _i = 0; _i < arguments.length; _i++) xs[_i] = arguments[_i];
             }",
        );
    }

    #[test]
    fn rest_pattern_collects_into_a_temporary() {
        lower(
            "function f(...[a, b]) {}",
            "function f() {
               for (var _ref = [], _i = 0; _i < arguments.length; _i++) _ref[_i] = arguments[_i];
               var [a, b] = _ref;
             }",
        );
    }

    #[test]
    fn arrows_become_functions_with_captured_context() {
        lower(
            "function g() { return (x = this.y) => x + arguments[0]; }",
            "function g() {
               var _this = this, _arguments = arguments;
               return function() {
                 var x = arguments[0] !== void 0 ? arguments[0] : _this.y;
                 return x + _arguments[0];
               };
             }",
        );
    }

    #[test]
    fn plain_functions_are_untouched() {
        let p = script("function f(a, b) { return () => a; } var g = (x) => x;");
        let mut alloc = TempAllocator::new();
        let out = lower_parameters(&p, &mut alloc);
        assert!(same_list(&p.body, &out.body));
        assert_eq!(alloc.count(), 0);
    }
}
