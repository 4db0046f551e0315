//! Shorthand constructors for synthesized nodes.
//!
//! Every node built here carries a dummy span.

use std::rc::Rc;

use crate::node::*;
use crate::ops::{AssignOp, BinaryOp, UnaryOp, VarKind};
use crate::temp::{Name, TempToken};

pub fn ident_expr(name: impl Into<Name>) -> ExprRef {
    Expr::synthetic(ExprKind::Ident(Ident::synthetic(name)))
}

pub fn temp_expr(token: &TempToken) -> ExprRef {
    Expr::synthetic(ExprKind::Ident(Ident::temp(token)))
}

pub fn expr_of_ident(ident: &Ident) -> ExprRef {
    Expr::new(ident.span, ExprKind::Ident(ident.clone()))
}

pub fn temp_pat(token: &TempToken) -> PatRef {
    Pat::ident(Ident::temp(token))
}

pub fn ident_pat(name: impl Into<Name>) -> PatRef {
    Pat::ident(Ident::synthetic(name))
}

pub fn num(value: impl std::fmt::Display) -> ExprRef {
    Expr::synthetic(ExprKind::Lit(Lit::Num(value.to_string().into())))
}

pub fn str_lit(value: &str) -> ExprRef {
    Expr::synthetic(ExprKind::Lit(Lit::Str(value.into())))
}

pub fn bool_lit(value: bool) -> ExprRef {
    Expr::synthetic(ExprKind::Lit(Lit::Bool(value)))
}

pub fn null() -> ExprRef {
    Expr::synthetic(ExprKind::Lit(Lit::Null))
}

pub fn this() -> ExprRef {
    Expr::synthetic(ExprKind::This)
}

/// `void 0`
pub fn void_zero() -> ExprRef {
    unary(UnaryOp::Void, num(0))
}

pub fn unary(op: UnaryOp, arg: ExprRef) -> ExprRef {
    Expr::synthetic(ExprKind::Unary { op, arg })
}

pub fn not(arg: ExprRef) -> ExprRef {
    unary(UnaryOp::Not, arg)
}

pub fn binary(op: BinaryOp, left: ExprRef, right: ExprRef) -> ExprRef {
    Expr::synthetic(ExprKind::Binary { op, left, right })
}

pub fn member(object: ExprRef, name: &str) -> ExprRef {
    Expr::synthetic(ExprKind::Member {
        object,
        prop: MemberProp::Name(name.into()),
    })
}

pub fn index(object: ExprRef, key: ExprRef) -> ExprRef {
    Expr::synthetic(ExprKind::Member {
        object,
        prop: MemberProp::Computed(key),
    })
}

/// `a.b.c` from a dotted path.
pub fn member_path(path: &str) -> ExprRef {
    let mut parts = path.split('.');
    let first = parts.next().unwrap_or(path);
    parts.fold(ident_expr(first), member)
}

pub fn call(callee: ExprRef, args: Vec<ExprRef>) -> ExprRef {
    Expr::synthetic(ExprKind::Call {
        callee,
        args: args.into_iter().map(ExprOrSpread::plain).collect(),
    })
}

/// `callee.call(this_arg, ...args)`
pub fn call_with_this(callee: ExprRef, this_arg: ExprRef, args: Vec<ExprRef>) -> ExprRef {
    let mut all = vec![this_arg];
    all.extend(args);
    call(member(callee, "call"), all)
}

pub fn new_expr(callee: ExprRef, args: Vec<ExprRef>) -> ExprRef {
    Expr::synthetic(ExprKind::New {
        callee,
        args: args.into_iter().map(ExprOrSpread::plain).collect(),
    })
}

pub fn assign(target: PatRef, value: ExprRef) -> ExprRef {
    Expr::synthetic(ExprKind::Assign {
        op: AssignOp::Assign,
        target,
        value,
    })
}

/// Assignment to an expression target; identifiers become `Pat::Ident`.
pub fn assign_to(target: ExprRef, value: ExprRef) -> ExprRef {
    assign(expr_to_pat(&target), value)
}

pub fn expr_to_pat(expr: &ExprRef) -> PatRef {
    match &expr.kind {
        ExprKind::Ident(ident) => Pat::ident(ident.clone()),
        _ => Rc::new(Pat::Expr(expr.clone())),
    }
}

pub fn cond(test: ExprRef, cons: ExprRef, alt: ExprRef) -> ExprRef {
    Expr::synthetic(ExprKind::Cond { test, cons, alt })
}

/// A comma expression; a single element is returned as is.
pub fn seq(mut exprs: Vec<ExprRef>) -> ExprRef {
    if exprs.len() == 1 {
        return exprs.remove(0);
    }
    Expr::synthetic(ExprKind::Seq(exprs))
}

pub fn paren(expr: ExprRef) -> ExprRef {
    Expr::synthetic(ExprKind::Paren(expr))
}

pub fn array(elems: Vec<ExprRef>) -> ExprRef {
    Expr::synthetic(ExprKind::Array(
        elems
            .into_iter()
            .map(|e| Some(ExprOrSpread::plain(e)))
            .collect(),
    ))
}

pub fn object(props: Vec<(&str, ExprRef)>) -> ExprRef {
    Expr::synthetic(ExprKind::Object(
        props
            .into_iter()
            .map(|(key, value)| Prop::KeyValue {
                key: PropKey::Ident(key.into()),
                value,
            })
            .collect(),
    ))
}

pub fn function_expr(function: Function) -> ExprRef {
    Expr::synthetic(ExprKind::Function(Rc::new(function)))
}

/// `function(params) { body }`
pub fn anon_function(params: Vec<PatRef>, body: Vec<StmtRef>) -> ExprRef {
    function_expr(Function::simple(
        params.into_iter().map(Param::plain).collect(),
        body,
    ))
}

pub fn expr_stmt(expr: ExprRef) -> StmtRef {
    Stmt::synthetic(StmtKind::Expr(expr))
}

pub fn block(stmts: Vec<StmtRef>) -> StmtRef {
    Stmt::synthetic(StmtKind::Block(stmts))
}

pub fn return_stmt(arg: Option<ExprRef>) -> StmtRef {
    Stmt::synthetic(StmtKind::Return(arg))
}

pub fn throw_stmt(arg: ExprRef) -> StmtRef {
    Stmt::synthetic(StmtKind::Throw(arg))
}

pub fn break_stmt(label: Option<&str>) -> StmtRef {
    Stmt::synthetic(StmtKind::Break(label.map(Into::into)))
}

pub fn continue_stmt(label: Option<&str>) -> StmtRef {
    Stmt::synthetic(StmtKind::Continue(label.map(Into::into)))
}

pub fn if_stmt(test: ExprRef, cons: StmtRef, alt: Option<StmtRef>) -> StmtRef {
    Stmt::synthetic(StmtKind::If { test, cons, alt })
}

pub fn declarator(target: PatRef, init: Option<ExprRef>) -> VarDeclarator {
    VarDeclarator { target, init }
}

pub fn var_stmt(kind: VarKind, decls: Vec<VarDeclarator>) -> StmtRef {
    Stmt::synthetic(StmtKind::Var(VarDecl { kind, decls }))
}

/// `var target = init;`
pub fn var_one(kind: VarKind, target: PatRef, init: Option<ExprRef>) -> StmtRef {
    var_stmt(kind, vec![declarator(target, init)])
}

/// Inserts `stmts` after the directive prologue of `body`.
pub fn prepend_statements(body: &[StmtRef], stmts: Vec<StmtRef>) -> Vec<StmtRef> {
    if stmts.is_empty() {
        return body.to_vec();
    }
    let split = body.iter().take_while(|s| s.is_directive()).count();
    let mut out = Vec::with_capacity(body.len() + stmts.len());
    out.extend_from_slice(&body[..split]);
    out.extend(stmts);
    out.extend_from_slice(&body[split..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_keeps_directives_first() {
        let body = vec![expr_stmt(str_lit("use strict")), expr_stmt(ident_expr("a"))];
        let out = prepend_statements(&body, vec![expr_stmt(ident_expr("b"))]);
        assert!(out[0].is_directive());
        assert!(Rc::ptr_eq(&out[0], &body[0]));
        assert!(matches!(&out[1].kind, StmtKind::Expr(e) if e.is_ident("b")));
        assert!(Rc::ptr_eq(&out[2], &body[1]));
    }

    #[test]
    fn member_path_builds_left_nested_chain() {
        let expr = member_path("Object.prototype.hasOwnProperty");
        let ExprKind::Member { object, prop } = &expr.kind else {
            panic!("expected member");
        };
        assert_eq!(prop, &MemberProp::Name("hasOwnProperty".into()));
        assert!(matches!(&object.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn single_element_seq_is_unwrapped() {
        let e = ident_expr("a");
        assert!(Rc::ptr_eq(&seq(vec![e.clone()]), &e));
    }
}
