//! Generator functions as resumable state machines.
//!
//! ```text
//! function* g() { var x = yield 1; return x; }
//!   →  function g() {
//!        var x;
//!        return $traceurRuntime.createGeneratorInstance(function($ctx) {
//!          while (true) switch ($ctx.state) {
//!            case 0: $ctx.state = 1; return 1;
//!            case 1: $ctx.maybeThrow(); x = $ctx.sent; $ctx.returnValue = x; $ctx.state = -2; break;
//!            default: return $ctx.end();
//!          }
//!        }, this);
//!      }
//! ```
//!
//! Locals of the generator outlive each call of the machine function, so
//! every declaration in the body is hoisted into the generator itself and
//! the machine only assigns to it. Function declarations move out whole.

mod builder;
mod explode;
mod state;

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use tracing::debug;

use self::builder::Builder;
use crate::diagnostics::Reporter;
use crate::runtime::Helper;
use crate::temps::{TempAllocator, TempVars};
use crate::transform::{self, same_list, Transformer};
use crate::util::{find_destructuring, rename_this_and_arguments, uses_this_or_arguments};

pub fn lower_generators(program: &Program, alloc: &mut TempAllocator, reporter: &mut Reporter) -> Program {
    debug!(pass = "generators", "start");
    let mut pass = Generators {
        temps: TempVars::new(alloc),
        reporter,
    };
    let out = pass.transform_program(program);
    debug!(pass = "generators", changed = !same_list(&program.body, &out.body), "finish");
    out
}

struct Generators<'a> {
    temps: TempVars<'a>,
    reporter: &'a mut Reporter,
}

impl Generators<'_> {
    /// The state-machine body for `function`, or `None` when the body
    /// still holds destructuring the machine cannot resume into.
    fn lower(&mut self, function: &Function) -> Option<Vec<StmtRef>> {
        let prologue = function.body.iter().take_while(|s| s.is_directive()).count();
        let (directives, body) = function.body.split_at(prologue);
        if let Some(span) = find_destructuring(body) {
            self.reporter.error(
                span,
                "destructuring in a generator body must be lowered before the generator",
            );
            return None;
        }
        let body = match uses_this_or_arguments(body) {
            (_, true) => rename_this_and_arguments(body, None, Some(self.temps.arguments_var())),
            _ => body.to_vec(),
        };

        let mut hoister = Hoister::default();
        let body = hoister.transform_stmt_list(&body);
        let Hoister {
            mut names,
            functions,
            clashes,
            ..
        } = hoister;
        if !clashes.is_empty() {
            for ident in &clashes {
                self.reporter.error(
                    ident.span,
                    format!(
                        "`{}` is declared twice in one generator body; block bindings must be lowered before the generator",
                        ident.name
                    ),
                );
            }
            return None;
        }
        let machine = Builder::new(&mut self.temps, &mut *self.reporter, &mut names).build(&body);

        let mut out = directives.to_vec();
        if !names.is_empty() {
            let decls = names
                .into_iter()
                .map(|ident| declarator(Pat::ident(ident), None))
                .collect();
            out.push(var_stmt(VarKind::Var, decls));
        }
        out.extend(functions);
        out.push(return_stmt(Some(
            Helper::CreateGeneratorInstance.call(vec![machine.render(), this()]),
        )));
        Some(out)
    }
}

impl Transformer for Generators<'_> {
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
        let lowered = match walked.is_generator.then(|| self.lower(&walked)).flatten() {
            Some(body) => Rc::new(Function {
                body,
                is_generator: false,
                ..(*walked).clone()
            }),
            None => walked,
        };
        self.temps.leave_function(lowered)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        self.temps.push_scope();
        let walked = transform::walk_arrow(self, arrow);
        self.temps.leave_arrow(walked)
    }
}

/// Moves the declarations of a generator body out of it.
///
/// Hoisting puts every binding in one function scope, so two block-scoped
/// bindings of the same name (or one block-scoped and one `var`) would
/// merge. Those are recorded in `clashes` instead of being hoisted silently.
#[derive(Default)]
struct Hoister {
    names: Vec<Ident>,
    lexical: Vec<Name>,
    functions: Vec<StmtRef>,
    clashes: Vec<Ident>,
}

impl Hoister {
    fn declare(&mut self, ident: &Ident, lexical: bool) {
        if !self.names.iter().any(|n| n.name == ident.name) {
            self.names.push(ident.clone());
        } else if lexical || self.lexical.contains(&ident.name) {
            self.clashes.push(ident.clone());
        }
        if lexical {
            self.lexical.push(ident.name.clone());
        }
    }

    /// Declares the bindings of `decl` and returns its initializers as
    /// assignments.
    fn hoist(&mut self, decl: &VarDecl) -> Option<ExprRef> {
        let mut idents = Vec::new();
        decl.bound_idents(&mut idents);
        for ident in idents {
            self.declare(ident, decl.kind.is_lexical());
        }
        let assigns: Vec<ExprRef> = decl
            .decls
            .iter()
            .filter_map(|d| d.init.as_ref().map(|init| assign(d.target.clone(), init.clone())))
            .collect();
        (!assigns.is_empty()).then(|| seq(assigns))
    }
}

impl Transformer for Hoister {
    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Var(decl) => match self.hoist(decl) {
                Some(init) => Stmt::new(span, StmtKind::Expr(init)),
                None => Stmt::new(span, StmtKind::Empty),
            },
            StmtKind::Function(_) => {
                self.functions.push(stmt.clone());
                Stmt::new(span, StmtKind::Empty)
            }
            StmtKind::Class(class) => {
                let Some(ident) = &class.ident else {
                    return stmt.clone();
                };
                self.declare(ident, true);
                let value = Expr::new(class.span, ExprKind::Class(class.clone()));
                Stmt::new(span, StmtKind::Expr(assign(Pat::ident(ident.clone()), value)))
            }
            StmtKind::For {
                init: Some(ForInit::Var(decl)),
                test,
                update,
                body,
            } => Stmt::new(
                span,
                StmtKind::For {
                    init: self.hoist(decl).map(ForInit::Expr),
                    test: test.clone(),
                    update: update.clone(),
                    body: self.transform_stmt(body),
                },
            ),
            StmtKind::ForEach {
                kind,
                head: ForHead::Var(decl),
                right,
                body,
            } => {
                self.hoist(decl);
                let Some(first) = decl.decls.first() else {
                    return stmt.clone();
                };
                Stmt::new(
                    span,
                    StmtKind::ForEach {
                        kind: *kind,
                        head: ForHead::Pat(first.target.clone()),
                        right: right.clone(),
                        body: self.transform_stmt(body),
                    },
                )
            }
            _ => transform::walk_stmt(self, stmt),
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        expr.clone()
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
    use crate::test_util::{check, lower_with, script};

    fn lower(input: &str, expected: &str) {
        check(input, expected, lower_generators);
    }

    /// Wraps dispatch cases in the machine every generator lowers to.
    fn machine(cases: &str) -> String {
        format!(
            "return $traceurRuntime.createGeneratorInstance(function($ctx) {{ \
             while (true) switch ($ctx.state) {{ {cases} default: return $ctx.end(); }} }}, this);"
        )
    }

    #[test]
    fn yield_result_is_read_from_the_context() {
        lower(
            "function* g() { var x = yield 1; return x; }",
            &format!(
                "function g() {{ var x; {} }}",
                machine(
                    "case 0: $ctx.state = 1; return 1; \
                     case 1: $ctx.maybeThrow(); x = $ctx.sent; $ctx.returnValue = x; $ctx.state = -2; break;"
                )
            ),
        );
    }

    #[test]
    fn if_branches_become_a_conditional_jump() {
        lower(
            "function* g(x) { if (x) { yield 1; } return 2; }",
            &format!(
                "function g(x) {{ {} }}",
                machine(
                    "case 0: $ctx.state = x ? 1 : 2; break; \
                     case 1: $ctx.state = 3; return 1; \
                     case 2: $ctx.returnValue = 2; $ctx.state = -2; break; \
                     case 3: $ctx.maybeThrow(); $ctx.state = 2; break;"
                )
            ),
        );
    }

    #[test]
    fn while_loops_jump_back_to_their_test() {
        lower(
            "function* g() { var i = 0; while (i < 3) yield i++; }",
            &format!(
                "function g() {{ var i; {} }}",
                machine(
                    "case 0: i = 0; $ctx.state = 1; break; \
                     case 1: $ctx.state = i < 3 ? 2 : -2; break; \
                     case 2: $ctx.state = 4; return i++; \
                     case 4: $ctx.maybeThrow(); $ctx.state = 1; break;"
                )
            ),
        );
    }

    #[test]
    fn catch_handlers_are_registered_with_the_context() {
        lower(
            "function* g() { try { yield 1; } catch (e) { f(e); } }",
            &format!(
                "function g() {{ var e; {} }}",
                machine(
                    "case 0: $ctx.pushTry(2, null); $ctx.state = 4; return 1; \
                     case 2: $ctx.popTry(); e = $ctx.storedException; f(e); $ctx.state = -2; break; \
                     case 4: $ctx.maybeThrow(); $ctx.popTry(); $ctx.state = -2; break;"
                )
            ),
        );
    }

    #[test]
    fn leaving_a_try_runs_its_finally() {
        lower(
            "function* g() { try { yield 1; } finally { f(); } }",
            &format!(
                "function g() {{ {} }}",
                machine(
                    "case 0: $ctx.pushTry(null, 2); $ctx.state = 4; return 1; \
                     case 1: $ctx.state = -2; break; \
                     case 2: $ctx.popTry(); f(); $ctx.state = $ctx.finallyFallThrough; break; \
                     case 4: $ctx.maybeThrow(); $ctx.finallyFallThrough = 1; $ctx.state = 2; break; \
                     case -3: throw $ctx.storedException;"
                )
            ),
        );
    }

    #[test]
    fn break_inside_ordinary_statements_sets_the_state() {
        lower(
            "function* g() { while (true) { if (done()) break; yield 1; } }",
            &format!(
                "function g() {{ {} }}",
                machine(
                    "case 0: $ctx.state = 1; break; \
                     case 1: $ctx.state = true ? 2 : 3; break; \
                     case 2: if (done()) { $ctx.state = 3; break; } $ctx.state = 4; return 1; \
                     case 3: $ctx.state = -2; break; \
                     case 4: $ctx.maybeThrow(); $ctx.state = 1; break;"
                )
            ),
        );
    }

    #[test]
    fn arguments_are_captured_outside_the_machine() {
        lower(
            "function* g() { yield arguments[0]; }",
            &format!(
                "function g() {{ var _arguments = arguments; {} }}",
                machine(
                    "case 0: $ctx.state = 1; return _arguments[0]; \
                     case 1: $ctx.maybeThrow(); $ctx.state = -2; break;"
                )
            ),
        );
    }

    #[test]
    fn delegating_yield_uses_yield_star() {
        lower(
            "function* g() { yield* h(); }",
            &format!(
                "function g() {{ {} }}",
                machine(
                    "case 0: $ctx.state = 1; return $ctx.yieldStar(h()); \
                     case 1: $ctx.maybeThrow(); $ctx.state = -2; break;"
                )
            ),
        );
    }

    #[test]
    fn function_declarations_move_out_of_the_machine() {
        lower(
            "function* g() { yield f(); function f() { return 1; } }",
            &format!(
                "function g() {{ function f() {{ return 1; }} {} }}",
                machine(
                    "case 0: $ctx.state = 1; return f(); \
                     case 1: $ctx.maybeThrow(); $ctx.state = -2; break;"
                )
            ),
        );
    }

    #[test]
    fn for_of_steps_an_iterator() {
        lower(
            "function* g(xs) { for (var x of xs) yield x; }",
            &format!(
                "function g(xs) {{ var _iter, _step; var x; {} }}",
                machine(
                    "case 0: _iter = xs[$traceurRuntime.toProperty(Symbol.iterator)](); $ctx.state = 1; break; \
                     case 1: $ctx.state = !(_step = _iter.next()).done ? 2 : -2; break; \
                     case 2: x = _step.value; $ctx.state = 5; return x; \
                     case 5: $ctx.maybeThrow(); $ctx.state = 1; break;"
                )
            ),
        );
    }

    #[test]
    fn yield_in_a_case_label_is_reported() {
        let (_, reporter) = lower_with(
            &script("function* g(x) { switch (x) { case yield 1: break; } }"),
            lower_generators,
        );
        assert!(reporter.has_errors());
    }

    #[test]
    fn leftover_destructuring_is_reported_not_lowered() {
        for source in [
            "function* g() { var [a, b] = yield 1; }",
            "function* g() { var a, b; [a, b] = yield 1; }",
            "function* g(xs) { for (var {k} of xs) yield k; }",
        ] {
            let p = script(source);
            let mut alloc = TempAllocator::new();
            let mut reporter = Reporter::new();
            let out = lower_generators(&p, &mut alloc, &mut reporter);
            assert_eq!(reporter.error_count(), 1, "{source}");
            assert!(reporter.errors().next().is_some_and(|d| d.message.contains("destructuring")));
            assert!(same_list(&p.body, &out.body), "{source}");
        }
        // Patterns inside nested functions are not the generator's concern.
        let (_, reporter) = lower_with(
            &script("function* g() { yield function([a]) { return a; }; }"),
            lower_generators,
        );
        assert!(!reporter.has_errors());
    }

    #[test]
    fn shadowing_block_bindings_are_reported_not_merged() {
        let p = script("function* g() { let a = yield 1; { let a = 2; } return a; }");
        let mut alloc = TempAllocator::new();
        let mut reporter = Reporter::new();
        let out = lower_generators(&p, &mut alloc, &mut reporter);
        assert_eq!(reporter.error_count(), 1);
        assert!(reporter.errors().all(|d| d.message.contains("`a` is declared twice")));
        assert!(same_list(&p.body, &out.body));
    }

    #[test]
    fn repeated_vars_still_share_one_binding() {
        lower(
            "function* g() { var a = yield 1; var a = 2; return a; }",
            &format!(
                "function g() {{ var a; {} }}",
                machine(
                    "case 0: $ctx.state = 1; return 1; \
                     case 1: $ctx.maybeThrow(); a = $ctx.sent; a = 2; $ctx.returnValue = a; $ctx.state = -2; break;"
                )
            ),
        );
    }

    #[test]
    fn ordinary_functions_are_untouched() {
        let p = script("function f() { return function() { return 1; }; }");
        let mut alloc = TempAllocator::new();
        let mut reporter = Reporter::new();
        let out = lower_generators(&p, &mut alloc, &mut reporter);
        assert!(same_list(&p.body, &out.body));
    }
}
