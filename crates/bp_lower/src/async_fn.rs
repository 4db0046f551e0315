//! Async functions.
//!
//! ```text
//! async function f() { return await g(this); }
//!   →  function f() {
//!        var _this = this;
//!        return $traceurRuntime.spawn(function*() { return yield g(_this); });
//!      }
//! ```
//!
//! The generator body is then turned into a state machine by
//! [`crate::generator`], and `spawn` drives it from promise settlement.

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use tracing::debug;

use crate::runtime::Helper;
use crate::temps::{TempAllocator, TempVars};
use crate::transform::{self, same_list, Transformer};
use crate::util::{alpha_rename_this_and_arguments, arrow_body_stmts};

pub fn lower_async_functions(program: &Program, alloc: &mut TempAllocator) -> Program {
    debug!(pass = "async_functions", "start");
    let mut pass = AsyncFunctions {
        temps: TempVars::new(alloc),
        in_async: false,
    };
    let out = pass.transform_program(program);
    debug!(pass = "async_functions", changed = !same_list(&program.body, &out.body), "finish");
    out
}

struct AsyncFunctions<'a> {
    temps: TempVars<'a>,
    /// Whether `await` in the current body belongs to an async function.
    in_async: bool,
}

/// `return $traceurRuntime.spawn(function*() { body });`
fn spawn(body: Vec<StmtRef>) -> Vec<StmtRef> {
    let generator = Function {
        is_generator: true,
        ..Function::simple(vec![], body)
    };
    vec![return_stmt(Some(Helper::Spawn.call(vec![function_expr(generator)])))]
}

impl AsyncFunctions<'_> {
    fn lower_body(&mut self, body: &[StmtRef]) -> Vec<StmtRef> {
        let body = alpha_rename_this_and_arguments(&mut self.temps, body);
        let saved = std::mem::replace(&mut self.in_async, true);
        let body = self.transform_stmt_list(&body);
        self.in_async = saved;
        spawn(body)
    }

    fn without_async<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.in_async, false);
        let out = f(self);
        self.in_async = saved;
        out
    }
}

impl Transformer for AsyncFunctions<'_> {
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
        let lowered = if function.is_async {
            Rc::new(Function {
                body: self.lower_body(&function.body),
                is_async: false,
                ..(**function).clone()
            })
        } else {
            self.without_async(|t| transform::walk_function(t, function))
        };
        self.temps.leave_function(lowered)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        self.temps.push_scope();
        let lowered = if arrow.is_async {
            let body = arrow_body_stmts(&arrow.body);
            Rc::new(Arrow {
                body: ArrowBody::Block(self.lower_body(&body)),
                is_async: false,
                ..(**arrow).clone()
            })
        } else {
            self.without_async(|t| transform::walk_arrow(t, arrow))
        };
        self.temps.leave_arrow(lowered)
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        let walked = transform::walk_expr(self, expr);
        match &walked.kind {
            ExprKind::Await(arg) if self.in_async => Expr::new(
                walked.span,
                ExprKind::Yield {
                    arg: Some(arg.clone()),
                    delegate: false,
                },
            ),
            _ => walked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{check, script};

    fn lower(input: &str, expected: &str) {
        check(input, expected, |p, alloc, _| lower_async_functions(p, alloc));
    }

    #[test]
    fn body_runs_inside_spawn() {
        lower(
            "async function f(a) { var x = await g(a); return x + 1; }",
            "function f(a) {
               return $traceurRuntime.spawn(function*() { var x = yield g(a); return x + 1; });
             }",
        );
    }

    #[test]
    fn this_and_arguments_are_captured_outside_the_generator() {
        lower(
            "async function f() { return await this.load(arguments[0]); }",
            "function f() {
               var _this = this, _arguments = arguments;
               return $traceurRuntime.spawn(function*() { return yield _this.load(_arguments[0]); });
             }",
        );
    }

    #[test]
    fn expression_arrows_gain_a_block() {
        lower(
            "var f = async (x) => await x;",
            "var f = (x) => { return $traceurRuntime.spawn(function*() { return yield x; }); };",
        );
    }

    #[test]
    fn nested_async_functions_lower_separately() {
        lower(
            "async function f() { var g = async function() { await 1; }; await g(); }",
            "function f() {
               return $traceurRuntime.spawn(function*() {
                 var g = function() { return $traceurRuntime.spawn(function*() { yield 1; }); };
                 yield g();
               });
             }",
        );
    }

    #[test]
    fn plain_functions_are_untouched() {
        let p = script("function f() { return g(this); } var h = () => 1;");
        let mut alloc = TempAllocator::new();
        let out = lower_async_functions(&p, &mut alloc);
        assert!(same_list(&p.body, &out.body));
    }
}
