//! Destructuring.
//!
//! Every array and object pattern is rewritten into plain bindings read off
//! the destructured value, one element at a time:
//!
//! ```text
//! var {a, b: [c]} = o;  →  var _ref = o, a = _ref.a,
//!                            c = (_iter = _ref.b[$traceurRuntime.toProperty(Symbol.iterator)](),
//!                                 (_step = _iter.next()).done ? void 0 : _step.value);
//! [a, b] = pair;        →  _ref = pair, a = (...), b = (...), _ref;
//! ```
//!
//! Array patterns walk one shared iterator, so every element and every hole
//! consumes exactly one `next()`. A default applies only when the read value
//! is strictly `undefined`. Patterns are reachable only through
//! declarations, plain assignments, parameters, catch clauses and
//! for-in/of/on heads; any other path is a bug in the pass order.

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use tracing::debug;

use crate::runtime::Helper;
use crate::temps::{TempAllocator, TempVars};
use crate::transform::{self, same_list, Changes, Transformer};
use crate::util::is_cheap;

/// `block_binding` picks `let` over `var` for catch-clause bindings, so a
/// later block-binding pass still sees them as block scoped.
pub fn lower_destructuring(program: &Program, alloc: &mut TempAllocator, block_binding: bool) -> Program {
    debug!(pass = "destructuring", "start");
    let mut pass = Destructuring {
        temps: TempVars::new(alloc),
        block_binding,
    };
    let out = pass.transform_program(program);
    debug!(pass = "destructuring", changed = !same_list(&program.body, &out.body), "finish");
    out
}

struct Destructuring<'a> {
    temps: TempVars<'a>,
    block_binding: bool,
}

/// The value a pattern is read from.
enum Rvalue {
    Temp(TempToken),
    /// Read exactly once.
    Expr(ExprRef),
}

impl Rvalue {
    fn read(&self) -> ExprRef {
        match self {
            Rvalue::Temp(token) => temp_expr(token),
            Rvalue::Expr(e) => e.clone(),
        }
    }
}

/// Assignments collected while desugaring one level of one pattern.
struct Desugaring {
    rvalue: Rvalue,
    out: Vec<(PatRef, ExprRef)>,
    /// Side effects that must run before the next read, such as skipping a
    /// hole.
    pending: Vec<ExprRef>,
}

impl Desugaring {
    fn new(rvalue: Rvalue) -> Self {
        Self {
            rvalue,
            out: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn assign(&mut self, target: PatRef, value: ExprRef) {
        let value = if self.pending.is_empty() {
            value
        } else {
            let mut exprs = std::mem::take(&mut self.pending);
            exprs.push(value);
            seq(exprs)
        };
        self.out.push((target, value));
    }
}

fn undefined_or(tmp: &TempToken, value: ExprRef, default: ExprRef) -> ExprRef {
    cond(
        binary(BinaryOp::EqEqEq, assign(temp_pat(tmp), value), void_zero()),
        default,
        temp_expr(tmp),
    )
}

fn key_lookup(object: ExprRef, key: &PropKey) -> ExprRef {
    match key {
        PropKey::Ident(name) | PropKey::Str(name) => member(object, name),
        PropKey::Num(raw) => index(object, Expr::synthetic(ExprKind::Lit(Lit::Num(raw.clone())))),
        PropKey::Computed(e) => index(object, e.clone()),
    }
}

impl Destructuring<'_> {
    /// Transforms the expressions nested in a pattern: defaults, computed
    /// keys and member targets.
    fn prepare(&mut self, pat: &PatRef) -> PatRef {
        let mut c = Changes::default();
        let new = match &**pat {
            Pat::Ident(_) => return pat.clone(),
            Pat::Expr(e) => {
                let new = self.transform_expr(e);
                if Rc::ptr_eq(e, &new) {
                    return pat.clone();
                }
                return expr_to_pat(&new);
            }
            Pat::Array(array) => Pat::Array(ArrayPat {
                span: array.span,
                elems: array
                    .elems
                    .iter()
                    .map(|e| e.as_ref().map(|e| self.prepare_elem(&mut c, e)))
                    .collect(),
                rest: array.rest.as_ref().map(|r| c.rc(r, self.prepare(r))),
            }),
            Pat::Object(object) => Pat::Object(ObjectPat {
                span: object.span,
                props: object
                    .props
                    .iter()
                    .map(|p| ObjectPatProp {
                        key: match &p.key {
                            PropKey::Computed(e) => PropKey::Computed(c.rc(e, self.transform_expr(e))),
                            key => key.clone(),
                        },
                        value: self.prepare_elem(&mut c, &p.value),
                    })
                    .collect(),
            }),
        };
        if !c.any() {
            return pat.clone();
        }
        Rc::new(new)
    }

    fn prepare_elem(&mut self, c: &mut Changes, elem: &PatElem) -> PatElem {
        PatElem {
            target: c.rc(&elem.target, self.prepare(&elem.target)),
            default: c.opt(&elem.default, elem.default.as_ref().map(|e| self.transform_expr(e))),
        }
    }

    /// Desugars one level of `pat`. Returns whether any element has a
    /// default.
    fn desugar_pattern(&mut self, d: &mut Desugaring, pat: &Pat) -> bool {
        let mut has_default = false;
        match pat {
            Pat::Array(array) => {
                let iter = self.temps.add_var("_iter");
                let step = self.temps.add_var("_step");
                let symbol = Helper::ToProperty.call(vec![member_path("Symbol.iterator")]);
                d.pending.push(assign(
                    temp_pat(&iter),
                    call(index(d.rvalue.read(), symbol), vec![]),
                ));
                for elem in &array.elems {
                    let next = call(member(temp_expr(&iter), "next"), vec![]);
                    let Some(elem) = elem else {
                        d.pending.push(next);
                        continue;
                    };
                    let value = cond(
                        member(assign(temp_pat(&step), next), "done"),
                        void_zero(),
                        member(temp_expr(&step), "value"),
                    );
                    let value = match &elem.default {
                        Some(default) => {
                            has_default = true;
                            undefined_or(&self.temps.add_var("_tmp"), value, default.clone())
                        }
                        None => value,
                    };
                    d.assign(elem.target.clone(), value);
                }
                if let Some(rest) = &array.rest {
                    d.assign(rest.clone(), Helper::IteratorToArray.call(vec![temp_expr(&iter)]));
                }
            }
            Pat::Object(object) => {
                for prop in &object.props {
                    let value = key_lookup(d.rvalue.read(), &prop.key);
                    let value = match &prop.value.default {
                        Some(default) => {
                            has_default = true;
                            undefined_or(&self.temps.add_var("_tmp"), value, default.clone())
                        }
                        None => value,
                    };
                    d.assign(prop.value.target.clone(), value);
                }
            }
            Pat::Ident(_) | Pat::Expr(_) => unreachable!("desugaring a non-pattern target"),
        }
        has_default
    }

    /// Declarators binding `pat` from `rvalue`, nested patterns included.
    fn desugar_binding(&mut self, pat: &Pat, rvalue: Rvalue) -> Vec<VarDeclarator> {
        let mut d = Desugaring::new(rvalue);
        self.desugar_pattern(&mut d, pat);
        self.finish_declarators(d)
    }

    fn finish_declarators(&mut self, mut d: Desugaring) -> Vec<VarDeclarator> {
        if d.out.is_empty() && d.pending.is_empty() {
            // `var {} = e` still evaluates `e`.
            let value = d.rvalue.read();
            d.assign(temp_pat(&self.temps.fresh("_ref")), value);
        }
        if !d.pending.is_empty() {
            let trailing = seq(std::mem::take(&mut d.pending));
            d.out.push((temp_pat(&self.temps.fresh("_ref")), trailing));
        }
        let mut decls = Vec::new();
        for (target, value) in d.out {
            if target.is_pattern() {
                decls.extend(self.desugar_declaration(&target, value, true));
            } else {
                decls.push(declarator(target, Some(value)));
            }
        }
        decls
    }

    /// `pat = init` in a declaration. With `inline`, the initializer is read
    /// in place unless a default or more than two declarations need it again.
    fn desugar_declaration(&mut self, pat: &Pat, init: ExprRef, inline: bool) -> Vec<VarDeclarator> {
        let mark = self.temps.mark();
        let tmp = self.temps.fresh("_ref");
        let mut d = Desugaring::new(Rvalue::Temp(tmp.clone()));
        d.assign(temp_pat(&tmp), init.clone());
        let has_default = self.desugar_pattern(&mut d, pat);
        if !inline || has_default || d.out.len() + usize::from(!d.pending.is_empty()) > 2 {
            return self.finish_declarators(d);
        }
        self.temps.rollback(mark);
        self.desugar_binding(pat, Rvalue::Expr(init))
    }

    /// Expressions assigning `pat` from `rvalue`, nested patterns included.
    fn desugar_assignments(&mut self, pat: &Pat, rvalue: Rvalue) -> Vec<ExprRef> {
        let mut d = Desugaring::new(rvalue);
        self.desugar_pattern(&mut d, pat);
        let mut exprs = Vec::new();
        for (target, value) in d.out {
            if target.is_pattern() {
                exprs.push(self.desugar_assignment(&target, value));
            } else {
                exprs.push(assign(target, value));
            }
        }
        exprs.append(&mut d.pending);
        exprs
    }

    /// `pat = value` as an expression whose own value is `value`.
    fn desugar_assignment(&mut self, pat: &Pat, value: ExprRef) -> ExprRef {
        let tmp = self.temps.add_var("_ref");
        let mut exprs = vec![assign(temp_pat(&tmp), value)];
        exprs.extend(self.desugar_assignments(pat, Rvalue::Temp(tmp.clone())));
        exprs.push(temp_expr(&tmp));
        seq(exprs)
    }

    fn lower_var_decl(&mut self, decl: &VarDecl) -> VarDecl {
        let mut decls = Vec::new();
        for d in &decl.decls {
            let init = d.init.as_ref().map(|e| self.transform_expr(e));
            if !d.target.is_pattern() {
                decls.push(VarDeclarator {
                    target: d.target.clone(),
                    init,
                });
                continue;
            }
            let Some(init) = init else {
                unreachable!("pattern declaration without an initializer");
            };
            let pat = self.prepare(&d.target);
            let inline = is_cheap(&init);
            decls.extend(self.desugar_declaration(&pat, init, inline));
        }
        VarDecl {
            kind: decl.kind,
            decls,
        }
    }

    /// `for (pattern of xs) body` → `for (var _ref of xs) { pattern = _ref; body }`
    fn lower_for_each(&mut self, stmt: &StmtRef) -> Option<StmtRef> {
        let StmtKind::ForEach {
            kind,
            head,
            right,
            body,
        } = &stmt.kind
        else {
            return None;
        };
        let lowered = match head {
            ForHead::Var(decl) => decl.decls.first().is_some_and(|d| d.target.is_pattern()),
            ForHead::Pat(target) => target.is_pattern(),
        };
        if !lowered {
            return None;
        }
        let tmp = self.temps.fresh("_ref");
        let first = match head {
            ForHead::Var(decl) => {
                let pat = self.prepare(&decl.decls[0].target);
                var_stmt(decl.kind, self.desugar_binding(&pat, Rvalue::Temp(tmp.clone())))
            }
            ForHead::Pat(target) => {
                let pat = self.prepare(target);
                let mut exprs = self.desugar_assignments(&pat, Rvalue::Temp(tmp.clone()));
                if exprs.is_empty() {
                    exprs.push(temp_expr(&tmp));
                }
                expr_stmt(seq(exprs))
            }
        };
        let right = self.transform_expr(right);
        let body = self.transform_stmt(body);
        let mut stmts = vec![first];
        match &body.kind {
            StmtKind::Block(inner) => stmts.extend(inner.iter().cloned()),
            _ => stmts.push(body),
        }
        Some(Stmt::new(
            stmt.span,
            StmtKind::ForEach {
                kind: *kind,
                head: ForHead::Var(VarDecl {
                    kind: VarKind::Var,
                    decls: vec![declarator(temp_pat(&tmp), None)],
                }),
                right,
                body: block(stmts),
            },
        ))
    }

    /// Replaces a pattern parameter with a temporary and queues the
    /// declarations that unpack it.
    fn lower_param(&mut self, c: &mut Changes, param: &Param, prologue: &mut Vec<VarDeclarator>) -> Param {
        let default = c.opt(&param.default, param.default.as_ref().map(|e| self.transform_expr(e)));
        if !param.target.is_pattern() {
            return Param {
                target: param.target.clone(),
                default,
            };
        }
        c.mark(true);
        let tmp = self.temps.fresh("_ref");
        let pat = self.prepare(&param.target);
        prologue.extend(self.desugar_binding(&pat, Rvalue::Temp(tmp.clone())));
        Param {
            target: temp_pat(&tmp),
            default,
        }
    }

    fn lower_params(
        &mut self,
        c: &mut Changes,
        params: &[Param],
        rest: &Option<PatRef>,
    ) -> (Vec<Param>, Option<PatRef>, Option<StmtRef>) {
        let mut prologue = Vec::new();
        let params = params
            .iter()
            .map(|p| self.lower_param(c, p, &mut prologue))
            .collect();
        let rest = rest.as_ref().map(|r| {
            if !r.is_pattern() {
                return r.clone();
            }
            c.mark(true);
            let tmp = self.temps.fresh("_ref");
            let pat = self.prepare(r);
            prologue.extend(self.desugar_binding(&pat, Rvalue::Temp(tmp.clone())));
            temp_pat(&tmp)
        });
        let prologue = (!prologue.is_empty()).then(|| var_stmt(VarKind::Var, prologue));
        (params, rest, prologue)
    }
}

impl Transformer for Destructuring<'_> {
    fn transform_program(&mut self, program: &Program) -> Program {
        self.temps.push_scope();
        let body = self.transform_stmt_list(&program.body);
        Program {
            kind: program.kind,
            body: self.temps.leave_body(body),
        }
    }

    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        self.temps.push_expr_scope();
        let out = match self.lower_for_each(stmt) {
            Some(lowered) => lowered,
            None => transform::walk_stmt(self, stmt),
        };
        self.temps.pop_expr_scope();
        out
    }

    fn transform_var_decl(&mut self, decl: &VarDecl) -> VarDecl {
        if decl.decls.iter().any(|d| d.target.is_pattern()) {
            self.lower_var_decl(decl)
        } else {
            transform::walk_var_decl(self, decl)
        }
    }

    fn transform_catch(&mut self, catch: &Catch) -> Catch {
        let Some(param) = catch.param.as_ref().filter(|p| p.is_pattern()) else {
            return transform::walk_catch(self, catch);
        };
        let tmp = self.temps.fresh("_ref");
        let pat = self.prepare(param);
        let kind = if self.block_binding {
            VarKind::Let
        } else {
            VarKind::Var
        };
        let decl = var_stmt(kind, self.desugar_binding(&pat, Rvalue::Temp(tmp.clone())));
        let mut body = vec![decl];
        body.extend(self.transform_stmt_list(&catch.body));
        Catch {
            param: Some(temp_pat(&tmp)),
            body,
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        match &expr.kind {
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } if target.is_pattern() => {
                let pat = self.prepare(target);
                let value = self.transform_expr(value);
                self.desugar_assignment(&pat, value)
            }
            _ => transform::walk_expr(self, expr),
        }
    }

    fn transform_pat(&mut self, pat: &PatRef) -> PatRef {
        match &**pat {
            Pat::Array(_) | Pat::Object(_) => {
                unreachable!("pattern outside a declaration, assignment, parameter, catch or loop head")
            }
            _ => transform::walk_pat(self, pat),
        }
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        self.temps.push_scope();
        let mut c = Changes::default();
        let (params, rest, prologue) = self.lower_params(&mut c, &function.params, &function.rest);
        let body = c.list(&function.body, self.transform_function_body(&function.body));
        let lowered = if c.any() {
            Rc::new(Function {
                params,
                rest,
                body: prepend_statements(&body, prologue.into_iter().collect()),
                ..(**function).clone()
            })
        } else {
            function.clone()
        };
        self.temps.leave_function(lowered)
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        self.temps.push_scope();
        let mut c = Changes::default();
        let (params, rest, prologue) = self.lower_params(&mut c, &arrow.params, &arrow.rest);
        let body = match (&arrow.body, prologue) {
            (ArrowBody::Expr(e), None) => ArrowBody::Expr(c.rc(e, self.transform_expr(e))),
            (ArrowBody::Expr(e), Some(prologue)) => {
                ArrowBody::Block(vec![prologue, return_stmt(Some(self.transform_expr(e)))])
            }
            (ArrowBody::Block(stmts), prologue) => {
                let body = c.list(stmts, self.transform_function_body(stmts));
                ArrowBody::Block(prepend_statements(&body, prologue.into_iter().collect()))
            }
        };
        let lowered = if c.any() {
            Rc::new(Arrow {
                params,
                rest,
                body,
                ..(**arrow).clone()
            })
        } else {
            arrow.clone()
        };
        self.temps.leave_arrow(lowered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{check, script};

    const ITER: &str = "$traceurRuntime.toProperty(Symbol.iterator)";

    fn lower(input: &str, expected: &str) {
        check(input, expected, |p, alloc, _| lower_destructuring(p, alloc, true));
    }

    #[test]
    fn object_declaration_uses_a_temporary_for_several_reads() {
        lower("var {a, b} = o;", "var _ref = o, a = _ref.a, b = _ref.b;");
    }

    #[test]
    fn single_read_skips_the_temporary() {
        lower("var {a} = o.p;", "var a = o.p.a;");
        lower("var {a} = x + y;", "var _ref = x + y, a = _ref.a;");
        lower("const {'x-y': a} = f();", "const a = f()['x-y'];");
    }

    #[test]
    fn holes_still_advance_the_iterator() {
        lower(
            "let [a, , b] = iter;",
            &format!(
                "var _iter, _step;
                 let _ref = iter,
                     a = (_iter = _ref[{ITER}](), (_step = _iter.next()).done ? void 0 : _step.value),
                     b = (_iter.next(), (_step = _iter.next()).done ? void 0 : _step.value);"
            ),
        );
    }

    #[test]
    fn defaults_fire_on_undefined_only() {
        lower(
            "var {x = 1} = o;",
            "var _tmp; var _ref = o, x = (_tmp = _ref.x) === void 0 ? 1 : _tmp;",
        );
    }

    #[test]
    fn rest_element_collects_the_iterator() {
        lower(
            "var [a, ...b] = xs;",
            &format!(
                "var _iter, _step;
                 var _ref = xs,
                     a = (_iter = _ref[{ITER}](), (_step = _iter.next()).done ? void 0 : _step.value),
                     b = $traceurRuntime.iteratorToArray(_iter);"
            ),
        );
    }

    #[test]
    fn nested_patterns_desugar_recursively() {
        lower(
            "var [{a}] = xs;",
            &format!(
                "var _iter, _step;
                 var a = (_iter = xs[{ITER}](), (_step = _iter.next()).done ? void 0 : _step.value).a;"
            ),
        );
    }

    #[test]
    fn empty_pattern_still_evaluates_its_initializer() {
        lower("var {} = f();", "var _ref = f();");
    }

    #[test]
    fn assignment_evaluates_to_the_right_hand_side() {
        lower(
            "x = [a, b] = [b, a];",
            &format!(
                "var _ref, _iter, _step;
                 x = (_ref = [b, a],
                      a = (_iter = _ref[{ITER}](), (_step = _iter.next()).done ? void 0 : _step.value),
                      b = (_step = _iter.next()).done ? void 0 : _step.value,
                      _ref);"
            ),
        );
        lower(
            "({a: o.x, b: {c}} = v);",
            "var _ref, _ref2; _ref = v, o.x = _ref.a, (_ref2 = _ref.b, c = _ref2.c, _ref2), _ref;",
        );
    }

    #[test]
    fn statements_recycle_hoisted_temporaries() {
        lower(
            "var [a] = x; var [b] = y;",
            &format!(
                "var _iter, _step;
                 var a = (_iter = x[{ITER}](), (_step = _iter.next()).done ? void 0 : _step.value);
                 var b = (_iter = y[{ITER}](), (_step = _iter.next()).done ? void 0 : _step.value);"
            ),
        );
    }

    #[test]
    fn loop_heads_bind_a_single_variable() {
        lower(
            "for (var {k, v} of m) f(k, v);",
            "for (var _ref of m) { var k = _ref.k, v = _ref.v; f(k, v); }",
        );
        lower(
            "for ({k} in m) { g(k); }",
            "for (var _ref in m) { k = _ref.k; g(k); }",
        );
    }

    #[test]
    fn parameters_unpack_in_the_body() {
        lower(
            "function f({a, b}, c, ...{length}) { return a + b + c + length; }",
            "function f(_ref, c, ..._ref2) {
               var a = _ref.a, b = _ref.b, length = _ref2.length;
               return a + b + c + length;
             }",
        );
        lower("var g = ({x}) => x;", "var g = (_ref) => { var x = _ref.x; return x; };");
    }

    #[test]
    fn catch_binding_uses_let_under_block_binding() {
        lower(
            "try { f(); } catch ({message}) { log(message); }",
            "try { f(); } catch (_ref) { let message = _ref.message; log(message); }",
        );
        let (out, _) = crate::test_util::lower_with(
            &script("try {} catch ({message}) {}"),
            |p, alloc, _| lower_destructuring(p, alloc, false),
        );
        assert_eq!(
            out,
            crate::test_util::normalize("try {} catch (_ref) { var message = _ref.message; }")
        );
    }

    #[test]
    fn untouched_code_keeps_its_identity() {
        let p = script("var a = 1; function f(x, y = 2) { return [x, y]; } for (var k in o) {}");
        let mut alloc = TempAllocator::new();
        let out = lower_destructuring(&p, &mut alloc, true);
        assert!(same_list(&p.body, &out.body));
    }
}
