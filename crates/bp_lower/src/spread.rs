//! Spread arguments and array elements.
//!
//! ```text
//! f(a, ...xs)     →  f.apply(void 0, $traceurRuntime.spread([a], xs))
//! o.m(...xs)      →  (_ref = o).m.apply(_ref, $traceurRuntime.spread(xs))
//! new F(...xs)    →  new (Function.prototype.bind.apply(F, $traceurRuntime.spread([null], xs)))()
//! [a, ...b, c]    →  $traceurRuntime.spread([a], b, [c])
//! ```

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use tracing::debug;

use crate::runtime::Helper;
use crate::temps::{TempAllocator, TempVars};
use crate::transform::{self, same_list, Transformer};

pub fn lower_spread(program: &Program, alloc: &mut TempAllocator) -> Program {
    debug!(pass = "spread", "start");
    let mut pass = Spread {
        temps: TempVars::new(alloc),
    };
    let out = pass.transform_program(program);
    debug!(pass = "spread", changed = !same_list(&program.body, &out.body), "finish");
    out
}

struct Spread<'a> {
    temps: TempVars<'a>,
}

fn has_spread<'e>(mut elems: impl Iterator<Item = &'e ExprOrSpread>) -> bool {
    elems.any(|e| e.spread)
}

/// `$traceurRuntime.spread(...)` over `elems`, with runs of plain elements
/// (holes included) grouped into array literals.
fn spread_call(elems: impl IntoIterator<Item = Option<ExprOrSpread>>) -> ExprRef {
    let mut parts = Vec::new();
    let mut group: Vec<Option<ExprOrSpread>> = Vec::new();
    for elem in elems {
        match elem {
            Some(ExprOrSpread { spread: true, expr }) => {
                if !group.is_empty() {
                    parts.push(Expr::synthetic(ExprKind::Array(std::mem::take(&mut group))));
                }
                parts.push(expr);
            }
            other => group.push(other),
        }
    }
    if !group.is_empty() {
        parts.push(Expr::synthetic(ExprKind::Array(group)));
    }
    Helper::Spread.call(parts)
}

impl Spread<'_> {
    fn lower_call(&mut self, callee: &ExprRef, args: &[ExprOrSpread]) -> ExprRef {
        let spread = spread_call(args.iter().cloned().map(Some));
        match &callee.kind {
            ExprKind::Member { object, prop } => {
                let tmp = self.temps.add_var("_ref");
                let function = Expr::synthetic(ExprKind::Member {
                    object: assign(temp_pat(&tmp), object.clone()),
                    prop: prop.clone(),
                });
                call(member(function, "apply"), vec![temp_expr(&tmp), spread])
            }
            _ => call(member(callee.clone(), "apply"), vec![void_zero(), spread]),
        }
    }

    fn lower_new(callee: &ExprRef, args: &[ExprOrSpread]) -> ExprRef {
        let elems = std::iter::once(Some(ExprOrSpread::plain(null())))
            .chain(args.iter().cloned().map(Some));
        let bound = call(
            member_path("Function.prototype.bind.apply"),
            vec![callee.clone(), spread_call(elems)],
        );
        new_expr(bound, vec![])
    }
}

impl Transformer for Spread<'_> {
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
        self.temps.leave_function(walked)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        self.temps.push_scope();
        let walked = transform::walk_arrow(self, arrow);
        self.temps.leave_arrow(walked)
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        let walked = transform::walk_expr(self, expr);
        match &walked.kind {
            ExprKind::Call { callee, args } if has_spread(args.iter()) => {
                self.lower_call(callee, args)
            }
            ExprKind::New { callee, args } if has_spread(args.iter()) => Self::lower_new(callee, args),
            ExprKind::Array(elems) if has_spread(elems.iter().flatten()) => {
                spread_call(elems.iter().cloned())
            }
            _ => walked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{check, script};

    fn lower(input: &str, expected: &str) {
        check(input, expected, |p, alloc, _| lower_spread(p, alloc));
    }

    #[test]
    fn plain_calls_apply_with_undefined_receiver() {
        lower("f(...xs);", "f.apply(void 0, $traceurRuntime.spread(xs));");
        lower(
            "f(a, b, ...xs, c);",
            "f.apply(void 0, $traceurRuntime.spread([a, b], xs, [c]));",
        );
    }

    #[test]
    fn method_calls_evaluate_the_receiver_once() {
        lower(
            "o.p.m(...xs);",
            "var _ref; (_ref = o.p).m.apply(_ref, $traceurRuntime.spread(xs));",
        );
        lower(
            "function f() { return a[k](1, ...b); }",
            "function f() { var _ref; return (_ref = a)[k].apply(_ref, $traceurRuntime.spread([1], b)); }",
        );
    }

    #[test]
    fn new_binds_through_function_prototype() {
        lower(
            "new F(a, ...xs);",
            "new (Function.prototype.bind.apply(F, $traceurRuntime.spread([null, a], xs)))();",
        );
    }

    #[test]
    fn array_literals_keep_holes_in_groups() {
        lower("[a, ...b, , c];", "$traceurRuntime.spread([a], b, [, c]);");
    }

    #[test]
    fn nested_spreads_lower_inside_out() {
        lower(
            "f(...[...a, b]);",
            "f.apply(void 0, $traceurRuntime.spread($traceurRuntime.spread(a, [b])));",
        );
    }

    #[test]
    fn no_spread_no_change() {
        let p = script("f(a, [b, c]); new G(d);");
        let mut alloc = TempAllocator::new();
        let out = lower_spread(&p, &mut alloc);
        assert!(same_list(&p.body, &out.body));
    }
}
