//! Pulls `yield` out of expressions.
//!
//! A suspend point can only sit at statement level in the machine, so an
//! expression containing one is split into statements that run in order
//! and a final expression made of temporaries:
//!
//! ```text
//! f(a, yield b)    →  _tmp = f; _tmp2 = a; _tmp3 = yield b;   _tmp(_tmp2, _tmp3)
//! a && (yield b)   →  _tmp = a; if (_tmp) { _tmp2 = yield b; _tmp = _tmp2; }   _tmp
//! ```
//!
//! Operands to the left of the last one containing a `yield` are stored in
//! temporaries first, since resuming may run code that changes what they
//! would evaluate to.

use bp_ast::factory::*;
use bp_ast::*;

use crate::temps::TempVars;
use crate::util::expr_contains_suspend;

pub(super) struct Exploder<'t, 'a> {
    temps: &'t mut TempVars<'a>,
    out: Vec<StmtRef>,
}

/// Values that read the same before and after a suspension.
fn is_stable(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Lit(_) | ExprKind::This | ExprKind::Function(_) | ExprKind::Arrow(_) => true,
        ExprKind::Ident(ident) => ident.name.as_temp().is_some(),
        ExprKind::Template(t) => t.exprs.is_empty(),
        ExprKind::Unary { op: UnaryOp::Minus, arg } => matches!(arg.kind, ExprKind::Lit(_)),
        _ => false,
    }
}

/// Leftovers that are pointless as expression statements.
pub(super) fn is_trivial(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Ident(_) | ExprKind::Lit(_) | ExprKind::This)
}

impl<'t, 'a> Exploder<'t, 'a> {
    pub fn new(temps: &'t mut TempVars<'a>) -> Self {
        Self {
            temps,
            out: Vec::new(),
        }
    }

    /// The statements to run before the exploded expression.
    pub fn finish(self) -> Vec<StmtRef> {
        self.out
    }

    fn sub(&mut self) -> Exploder<'_, 'a> {
        Exploder::new(&mut *self.temps)
    }

    fn store(&mut self, value: ExprRef) -> TempToken {
        let token = self.temps.add_var("_tmp");
        self.out.push(expr_stmt(assign(temp_pat(&token), value)));
        token
    }

    fn spill(&mut self, value: ExprRef) -> ExprRef {
        if is_stable(&value) {
            return value;
        }
        temp_expr(&self.store(value))
    }

    pub fn explode(&mut self, expr: &ExprRef) -> ExprRef {
        if !expr_contains_suspend(expr) {
            return expr.clone();
        }
        let span = expr.span;
        match &expr.kind {
            ExprKind::Yield { arg, delegate } => {
                let arg = arg.as_ref().map(|a| self.explode(a));
                let suspend = Expr::new(
                    span,
                    ExprKind::Yield {
                        arg,
                        delegate: *delegate,
                    },
                );
                temp_expr(&self.store(suspend))
            }
            ExprKind::Paren(inner) => self.explode(inner),
            ExprKind::Seq(items) => {
                let Some((last, init)) = items.split_last() else {
                    return expr.clone();
                };
                for item in init {
                    let value = self.explode(item);
                    if !is_trivial(&value) {
                        self.out.push(expr_stmt(value));
                    }
                }
                self.explode(last)
            }
            ExprKind::Binary { op, left, right } if op.is_logical() && expr_contains_suspend(right) => {
                let left = self.explode(left);
                let result = self.store(left);
                let test = match op {
                    BinaryOp::And => temp_expr(&result),
                    BinaryOp::Or => not(temp_expr(&result)),
                    _ => binary(BinaryOp::EqEq, temp_expr(&result), null()),
                };
                let mut inner = self.sub();
                let right = inner.explode(right);
                let mut body = inner.finish();
                body.push(expr_stmt(assign(temp_pat(&result), right)));
                self.out.push(if_stmt(test, block(body), None));
                temp_expr(&result)
            }
            ExprKind::Binary { op, left, right } => {
                let [left, right] = self.operands([left.clone(), right.clone()]);
                Expr::new(span, ExprKind::Binary { op: *op, left, right })
            }
            ExprKind::Cond { test, cons, alt }
                if expr_contains_suspend(cons) || expr_contains_suspend(alt) =>
            {
                let test = self.explode(test);
                let result = self.temps.add_var("_tmp");
                let branch = |e: &ExprRef, this: &mut Self| {
                    let mut inner = this.sub();
                    let value = inner.explode(e);
                    let mut body = inner.finish();
                    body.push(expr_stmt(assign(temp_pat(&result), value)));
                    block(body)
                };
                let cons = branch(cons, self);
                let alt = branch(alt, self);
                self.out.push(if_stmt(test, cons, Some(alt)));
                temp_expr(&result)
            }
            ExprKind::Cond { test, cons, alt } => Expr::new(
                span,
                ExprKind::Cond {
                    test: self.explode(test),
                    cons: cons.clone(),
                    alt: alt.clone(),
                },
            ),
            ExprKind::Assign { op, target, value } => self.assignment(*op, target, value),
            ExprKind::Unary { op, arg } => Expr::new(
                span,
                ExprKind::Unary {
                    op: *op,
                    arg: self.explode(arg),
                },
            ),
            ExprKind::Update { op, prefix, arg } => Expr::new(
                span,
                ExprKind::Update {
                    op: *op,
                    prefix: *prefix,
                    arg: self.explode(arg),
                },
            ),
            ExprKind::Member { object, prop } => {
                let (object, prop) = self.member_parts(object, prop, false);
                Expr::new(span, ExprKind::Member { object, prop })
            }
            ExprKind::Call { callee, args } => self.call(span, callee, args),
            ExprKind::New { callee, args } => {
                let (callee, args) = self.callee_and_args(callee, args);
                Expr::new(span, ExprKind::New { callee, args })
            }
            ExprKind::Array(elems) => {
                let present: Vec<ExprRef> = elems.iter().flatten().map(|e| e.expr.clone()).collect();
                let mut values = self.operand_list(&present).into_iter();
                let elems = elems
                    .iter()
                    .map(|e| {
                        e.as_ref().map(|e| ExprOrSpread {
                            spread: e.spread,
                            expr: values.next().unwrap_or_else(|| e.expr.clone()),
                        })
                    })
                    .collect();
                Expr::new(span, ExprKind::Array(elems))
            }
            ExprKind::Object(props) => self.object(span, props),
            ExprKind::Template(template) => Expr::new(
                span,
                ExprKind::Template(Template {
                    quasis: template.quasis.clone(),
                    exprs: self.operand_list(&template.exprs),
                }),
            ),
            ExprKind::Await(arg) => Expr::new(span, ExprKind::Await(self.explode(arg))),
            ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Super
            | ExprKind::Lit(_)
            | ExprKind::Function(_)
            | ExprKind::Arrow(_)
            | ExprKind::Class(_) => expr.clone(),
        }
    }

    /// Explodes `ops` left to right, storing every operand before the last
    /// one that suspends.
    fn operand_list(&mut self, ops: &[ExprRef]) -> Vec<ExprRef> {
        let Some(last) = ops.iter().rposition(|e| expr_contains_suspend(e)) else {
            return ops.to_vec();
        };
        let mut out = Vec::with_capacity(ops.len());
        for (i, op) in ops.iter().enumerate() {
            if i > last {
                out.push(op.clone());
                continue;
            }
            let value = self.explode(op);
            out.push(if i < last { self.spill(value) } else { value });
        }
        out
    }

    fn operands<const N: usize>(&mut self, ops: [ExprRef; N]) -> [ExprRef; N] {
        let out = self.operand_list(&ops);
        match out.try_into() {
            Ok(array) => array,
            Err(_) => unreachable!("operand count is preserved"),
        }
    }

    /// Object and key of a member expression. With `stored`, both are left
    /// in temporaries because something suspends after them.
    fn member_parts(&mut self, object: &ExprRef, prop: &MemberProp, stored: bool) -> (ExprRef, MemberProp) {
        match prop {
            MemberProp::Name(name) => {
                let object = self.explode(object);
                let object = if stored { self.spill(object) } else { object };
                (object, MemberProp::Name(name.clone()))
            }
            MemberProp::Computed(key) => {
                let [object, key] = self.operands([object.clone(), key.clone()]);
                if stored {
                    (self.spill(object), MemberProp::Computed(self.spill(key)))
                } else {
                    (object, MemberProp::Computed(key))
                }
            }
        }
    }

    fn callee_and_args(&mut self, callee: &ExprRef, args: &[ExprOrSpread]) -> (ExprRef, Vec<ExprOrSpread>) {
        let mut ops = vec![callee.clone()];
        ops.extend(args.iter().map(|a| a.expr.clone()));
        let mut values = self.operand_list(&ops).into_iter();
        let callee = values.next().unwrap_or_else(|| callee.clone());
        let args = args
            .iter()
            .zip(values)
            .map(|(a, expr)| ExprOrSpread {
                spread: a.spread,
                expr,
            })
            .collect();
        (callee, args)
    }

    /// A method call whose arguments suspend keeps its receiver:
    /// `o.m(yield x)` → `_tmp = o; _tmp2 = _tmp.m; ... _tmp2.call(_tmp, _tmp3)`.
    fn call(&mut self, span: Span, callee: &ExprRef, args: &[ExprOrSpread]) -> ExprRef {
        let args_suspend = args.iter().any(|a| expr_contains_suspend(&a.expr));
        match &callee.kind {
            ExprKind::Member { object, prop }
                if args_suspend && !matches!(object.kind, ExprKind::Super) =>
            {
                let (object, prop) = self.member_parts(object, prop, true);
                let function = self.spill(Expr::new(
                    callee.span,
                    ExprKind::Member {
                        object: object.clone(),
                        prop,
                    },
                ));
                let values: Vec<ExprRef> = args.iter().map(|a| a.expr.clone()).collect();
                let values = self.operand_list(&values);
                let mut call_args = vec![ExprOrSpread::plain(object)];
                call_args.extend(args.iter().zip(values).map(|(a, expr)| ExprOrSpread {
                    spread: a.spread,
                    expr,
                }));
                Expr::new(
                    span,
                    ExprKind::Call {
                        callee: member(function, "call"),
                        args: call_args,
                    },
                )
            }
            ExprKind::Member { .. } if !args_suspend => Expr::new(
                span,
                ExprKind::Call {
                    callee: self.explode(callee),
                    args: args.to_vec(),
                },
            ),
            _ => {
                let (callee, args) = self.callee_and_args(callee, args);
                Expr::new(span, ExprKind::Call { callee, args })
            }
        }
    }

    fn object(&mut self, span: Span, props: &[Prop]) -> ExprRef {
        let mut ops = Vec::new();
        for prop in props {
            match prop {
                Prop::KeyValue { key, value } => {
                    if let PropKey::Computed(k) = key {
                        ops.push(k.clone());
                    }
                    ops.push(value.clone());
                }
                Prop::Shorthand(ident) => ops.push(expr_of_ident(ident)),
                Prop::Method { key, .. } => {
                    if let PropKey::Computed(k) = key {
                        ops.push(k.clone());
                    }
                }
            }
        }
        let mut values = self.operand_list(&ops).into_iter();
        let mut next = |fallback: &ExprRef| values.next().unwrap_or_else(|| fallback.clone());
        let props = props
            .iter()
            .map(|prop| match prop {
                Prop::KeyValue { key, value } => {
                    let key = match key {
                        PropKey::Computed(k) => PropKey::Computed(next(k)),
                        other => other.clone(),
                    };
                    Prop::KeyValue {
                        key,
                        value: next(value),
                    }
                }
                Prop::Shorthand(ident) => {
                    let value = next(&expr_of_ident(ident));
                    match value.as_ident() {
                        Some(same) if same == ident => Prop::Shorthand(ident.clone()),
                        _ => Prop::KeyValue {
                            key: PropKey::Ident(ident.name.text().into()),
                            value,
                        },
                    }
                }
                Prop::Method {
                    key,
                    kind,
                    function,
                } => Prop::Method {
                    key: match key {
                        PropKey::Computed(k) => PropKey::Computed(next(k)),
                        other => other.clone(),
                    },
                    kind: *kind,
                    function: function.clone(),
                },
            })
            .collect();
        Expr::new(span, ExprKind::Object(props))
    }

    fn assignment(&mut self, op: AssignOp, target: &PatRef, value: &ExprRef) -> ExprRef {
        if let Some(logical) = op.to_binary().filter(|b| b.is_logical()) {
            let read = match &**target {
                Pat::Ident(ident) => expr_of_ident(ident),
                Pat::Expr(e) => e.clone(),
                _ => unreachable!("compound assignment to a pattern"),
            };
            return self.assignment(AssignOp::Assign, target, &binary(logical, read, value.clone()));
        }
        match &**target {
            Pat::Ident(ident) => {
                let old = op.to_binary().map(|b| (b, self.spill(expr_of_ident(ident))));
                let value = self.explode(value);
                let value = match old {
                    Some((b, old)) => binary(b, old, value),
                    None => value,
                };
                let value = self.spill(value);
                self.out.push(expr_stmt(assign(target.clone(), value.clone())));
                value
            }
            Pat::Expr(e) => {
                let ExprKind::Member { object, prop } = &e.unparen().kind else {
                    unreachable!("assignment target is a member expression");
                };
                let (object, prop) = self.member_parts(object, prop, true);
                let place = Expr::new(e.span, ExprKind::Member { object, prop });
                let old = op.to_binary().map(|b| (b, self.spill(place.clone())));
                let value = self.explode(value);
                let value = match old {
                    Some((b, old)) => binary(b, old, value),
                    None => value,
                };
                let value = self.spill(value);
                self.out.push(expr_stmt(assign_to(place, value.clone())));
                value
            }
            Pat::Array(_) | Pat::Object(_) => {
                unreachable!("destructuring assignments are lowered before generators")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::rename::rename_temporaries;
    use crate::temps::TempAllocator;
    use crate::test_util::{normalize, print};

    /// The expression statement inside `function* g() { source; }`.
    fn generator_expr(source: &str) -> ExprRef {
        let program = bp_parser::parse_script(&format!("function* g() {{ {source}; }}")).expect("parse");
        let StmtKind::Function(g) = &program.body[0].kind else {
            panic!("expected a function");
        };
        let StmtKind::Expr(expr) = &g.body[0].kind else {
            panic!("expected an expression statement");
        };
        expr.clone()
    }

    fn explode(source: &str) -> String {
        let expr = generator_expr(source);
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        let mut exploder = Exploder::new(&mut temps);
        let value = exploder.explode(&expr);
        let mut body = exploder.finish();
        body.push(expr_stmt(value));
        let body = temps.leave_body(body);
        let g = Function {
            ident: Some(Ident::synthetic("g")),
            is_generator: true,
            ..Function::simple(vec![], body)
        };
        print(&rename_temporaries(&Program {
            kind: ProgramKind::Script,
            body: vec![Stmt::synthetic(StmtKind::Function(Rc::new(g)))],
        }))
    }

    fn expected(body: &str) -> String {
        normalize(&format!("function* g() {{ {body} }}"))
    }

    #[test]
    fn operands_left_of_a_yield_are_stored() {
        assert_eq!(
            explode("f(a, yield b)"),
            expected("var _tmp, _tmp2, _tmp3; _tmp = f; _tmp2 = a; _tmp3 = yield b; _tmp(_tmp2, _tmp3);")
        );
    }

    #[test]
    fn operands_right_of_the_last_yield_stay() {
        assert_eq!(
            explode("(yield a) + b"),
            expected("var _tmp; _tmp = yield a; _tmp + b;")
        );
    }

    #[test]
    fn method_calls_keep_their_receiver() {
        assert_eq!(
            explode("o.m(yield x)"),
            expected("var _tmp, _tmp2, _tmp3; _tmp = o; _tmp2 = _tmp.m; _tmp3 = yield x; _tmp2.call(_tmp, _tmp3);")
        );
    }

    #[test]
    fn short_circuit_guards_the_yield() {
        assert_eq!(
            explode("a || (yield b)"),
            expected("var _tmp, _tmp2; _tmp = a; if (!_tmp) { _tmp2 = yield b; _tmp = _tmp2; } _tmp;")
        );
    }

    #[test]
    fn conditional_branches_become_if_else() {
        assert_eq!(
            explode("c ? yield 1 : 2"),
            expected("var _tmp, _tmp2; if (c) { _tmp2 = yield 1; _tmp = _tmp2; } else { _tmp = 2; } _tmp;")
        );
    }

    #[test]
    fn compound_assignment_reads_before_suspending() {
        assert_eq!(
            explode("x += yield 1"),
            expected("var _tmp, _tmp2, _tmp3; _tmp = x; _tmp2 = yield 1; _tmp3 = _tmp + _tmp2; x = _tmp3; _tmp3;")
        );
    }

    #[test]
    fn expressions_without_yield_are_shared() {
        let expr = generator_expr("a + f(b)");
        let mut alloc = TempAllocator::new();
        let mut temps = TempVars::new(&mut alloc);
        temps.push_scope();
        let mut exploder = Exploder::new(&mut temps);
        assert!(Rc::ptr_eq(&exploder.explode(&expr), &expr));
        assert!(exploder.finish().is_empty());
    }
}
