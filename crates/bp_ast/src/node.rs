//! The node model.
//!
//! Nodes are immutable and shared through `Rc`. A pass that changes nothing
//! below a node hands back the same `Rc`, so `Rc::ptr_eq` tells a caller
//! whether a subtree was rewritten. A subtree that has to appear twice in
//! the output is rebuilt, never aliased.

use std::rc::Rc;

use serde::Serialize;

use crate::ops::{AssignOp, BinaryOp, UnaryOp, UpdateOp, VarKind};
use crate::span::Span;
use crate::temp::{Atom, Name, TempToken};

pub type ExprRef = Rc<Expr>;
pub type StmtRef = Rc<Stmt>;
pub type PatRef = Rc<Pat>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ident {
    pub span: Span,
    pub name: Name,
}

impl Ident {
    pub fn new(span: Span, name: impl Into<Name>) -> Self {
        Self {
            span,
            name: name.into(),
        }
    }

    pub fn synthetic(name: impl Into<Name>) -> Self {
        Self::new(Span::DUMMY, name)
    }

    pub fn temp(token: &TempToken) -> Self {
        Self::synthetic(Name::Temp(token.clone()))
    }

    pub fn is(&self, text: &str) -> bool {
        self.name.is(text)
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Ident(Ident),
    This,
    /// Only valid as a callee or a member object.
    Super,
    Lit(Lit),
    Template(Template),
    Array(Vec<Option<ExprOrSpread>>),
    Object(Vec<Prop>),
    Function(Rc<Function>),
    Arrow(Rc<Arrow>),
    Class(Rc<Class>),
    Unary {
        op: UnaryOp,
        arg: ExprRef,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        arg: ExprRef,
    },
    Binary {
        op: BinaryOp,
        left: ExprRef,
        right: ExprRef,
    },
    /// `target` is a simple target (`Pat::Ident`/`Pat::Expr`) unless `op`
    /// is plain `=`, in which case it may be a destructuring pattern.
    Assign {
        op: AssignOp,
        target: PatRef,
        value: ExprRef,
    },
    Cond {
        test: ExprRef,
        cons: ExprRef,
        alt: ExprRef,
    },
    Call {
        callee: ExprRef,
        args: Vec<ExprOrSpread>,
    },
    New {
        callee: ExprRef,
        args: Vec<ExprOrSpread>,
    },
    Member {
        object: ExprRef,
        prop: MemberProp,
    },
    Seq(Vec<ExprRef>),
    Paren(ExprRef),
    Yield {
        arg: Option<ExprRef>,
        delegate: bool,
    },
    Await(ExprRef),
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> ExprRef {
        Rc::new(Expr { span, kind })
    }

    pub fn synthetic(kind: ExprKind) -> ExprRef {
        Self::new(Span::DUMMY, kind)
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn is_ident(&self, text: &str) -> bool {
        self.as_ident().is_some_and(|ident| ident.is(text))
    }

    /// Strips any number of `Paren` wrappers.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    /// Function-like nodes open a new `this`/`arguments` context or, for
    /// arrows, at least a new var scope. Walkers that stay inside one
    /// function body stop here.
    pub fn is_function_like(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Function(_) | ExprKind::Arrow(_) | ExprKind::Class(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Lit {
    /// Numeric literal, kept as source text.
    Num(Atom),
    /// String literal, kept as its cooked value.
    Str(Atom),
    Bool(bool),
    Null,
    Regex { pattern: Atom, flags: Atom },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    /// Raw text of each quasi; always one more than `exprs`.
    pub quasis: Vec<Atom>,
    pub exprs: Vec<ExprRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprOrSpread {
    pub spread: bool,
    pub expr: ExprRef,
}

impl ExprOrSpread {
    pub fn plain(expr: ExprRef) -> Self {
        Self {
            spread: false,
            expr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MemberProp {
    Name(Atom),
    Computed(ExprRef),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropKey {
    Ident(Atom),
    Str(Atom),
    Num(Atom),
    Computed(ExprRef),
}

impl PropKey {
    /// The key as a static string, when it has one.
    pub fn static_name(&self) -> Option<&str> {
        match self {
            PropKey::Ident(name) | PropKey::Str(name) | PropKey::Num(name) => Some(name),
            PropKey::Computed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Prop {
    KeyValue { key: PropKey, value: ExprRef },
    /// `{x}`; the identifier is a reference to `x`.
    Shorthand(Ident),
    Method {
        key: PropKey,
        kind: MethodKind,
        function: Rc<Function>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
    Constructor,
}

// ---------------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub target: PatRef,
    pub default: Option<ExprRef>,
}

impl Param {
    pub fn plain(target: PatRef) -> Self {
        Self {
            target,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub span: Span,
    pub ident: Option<Ident>,
    pub params: Vec<Param>,
    pub rest: Option<PatRef>,
    pub body: Vec<StmtRef>,
    pub is_generator: bool,
    pub is_async: bool,
}

impl Function {
    pub fn simple(params: Vec<Param>, body: Vec<StmtRef>) -> Self {
        Self {
            span: Span::DUMMY,
            ident: None,
            params,
            rest: None,
            body,
            is_generator: false,
            is_async: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ArrowBody {
    Expr(ExprRef),
    Block(Vec<StmtRef>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrow {
    pub span: Span,
    pub params: Vec<Param>,
    pub rest: Option<PatRef>,
    pub body: ArrowBody,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMember {
    pub key: PropKey,
    pub kind: MethodKind,
    pub is_static: bool,
    pub function: Rc<Function>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Class {
    pub span: Span,
    pub ident: Option<Ident>,
    pub super_class: Option<ExprRef>,
    pub members: Vec<ClassMember>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Pat {
    Ident(Ident),
    /// A member expression used as an assignment target.
    Expr(ExprRef),
    Array(ArrayPat),
    Object(ObjectPat),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatElem {
    pub target: PatRef,
    pub default: Option<ExprRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayPat {
    pub span: Span,
    /// `None` is a hole.
    pub elems: Vec<Option<PatElem>>,
    pub rest: Option<PatRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectPatProp {
    pub key: PropKey,
    pub value: PatElem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectPat {
    pub span: Span,
    pub props: Vec<ObjectPatProp>,
}

impl Pat {
    pub fn ident(ident: Ident) -> PatRef {
        Rc::new(Pat::Ident(ident))
    }

    pub fn span(&self) -> Span {
        match self {
            Pat::Ident(ident) => ident.span,
            Pat::Expr(expr) => expr.span,
            Pat::Array(pat) => pat.span,
            Pat::Object(pat) => pat.span,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Pat::Array(_) | Pat::Object(_))
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Pat::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// Collects the identifiers this pattern binds, in source order.
    /// Member targets bind nothing.
    pub fn bound_idents<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Pat::Ident(ident) => out.push(ident),
            Pat::Expr(_) => {}
            Pat::Array(pat) => {
                for elem in pat.elems.iter().flatten() {
                    elem.target.bound_idents(out);
                }
                if let Some(rest) = &pat.rest {
                    rest.bound_idents(out);
                }
            }
            Pat::Object(pat) => {
                for prop in &pat.props {
                    prop.value.target.bound_idents(out);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDeclarator {
    pub target: PatRef,
    pub init: Option<ExprRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub kind: VarKind,
    pub decls: Vec<VarDeclarator>,
}

impl VarDecl {
    pub fn bound_idents<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        for decl in &self.decls {
            decl.target.bound_idents(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ForInit {
    Var(VarDecl),
    Expr(ExprRef),
}

/// Left side of `for-in`/`for-of`/`for-on`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ForHead {
    /// A declaration with a single declarator and no initializer.
    Var(VarDecl),
    Pat(PatRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForEachKind {
    In,
    Of,
    /// `for (x on observable)`: iterates an observable's pushed values.
    On,
}

impl std::fmt::Display for ForEachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForEachKind::In => write!(f, "in"),
            ForEachKind::Of => write!(f, "of"),
            ForEachKind::On => write!(f, "on"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catch {
    pub param: Option<PatRef>,
    pub body: Vec<StmtRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchCase {
    /// `None` is the `default` clause.
    pub test: Option<ExprRef>,
    pub body: Vec<StmtRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StmtKind {
    Expr(ExprRef),
    Block(Vec<StmtRef>),
    Empty,
    Debugger,
    Var(VarDecl),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Return(Option<ExprRef>),
    If {
        test: ExprRef,
        cons: StmtRef,
        alt: Option<StmtRef>,
    },
    While {
        test: ExprRef,
        body: StmtRef,
    },
    DoWhile {
        body: StmtRef,
        test: ExprRef,
    },
    For {
        init: Option<ForInit>,
        test: Option<ExprRef>,
        update: Option<ExprRef>,
        body: StmtRef,
    },
    ForEach {
        kind: ForEachKind,
        head: ForHead,
        right: ExprRef,
        body: StmtRef,
    },
    Labeled {
        label: Atom,
        body: StmtRef,
    },
    Break(Option<Atom>),
    Continue(Option<Atom>),
    Throw(ExprRef),
    Try {
        block: Vec<StmtRef>,
        handler: Option<Catch>,
        finalizer: Option<Vec<StmtRef>>,
    },
    Switch {
        discriminant: ExprRef,
        cases: Vec<SwitchCase>,
    },
    Import(ImportDecl),
    Export(ExportDecl),
}

impl Stmt {
    pub fn new(span: Span, kind: StmtKind) -> StmtRef {
        Rc::new(Stmt { span, kind })
    }

    pub fn synthetic(kind: StmtKind) -> StmtRef {
        Self::new(Span::DUMMY, kind)
    }

    /// A string-literal expression statement such as `"use strict"`.
    pub fn is_directive(&self) -> bool {
        matches!(&self.kind, StmtKind::Expr(expr) if matches!(expr.kind, ExprKind::Lit(Lit::Str(_))))
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::While { .. }
                | StmtKind::DoWhile { .. }
                | StmtKind::For { .. }
                | StmtKind::ForEach { .. }
        )
    }

    /// Statements after which control never falls through.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Return(_) | StmtKind::Throw(_) | StmtKind::Break(_) | StmtKind::Continue(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ImportSpecifier {
    Default(Ident),
    Namespace(Ident),
    Named { imported: Atom, local: Ident },
}

impl ImportSpecifier {
    pub fn local(&self) -> &Ident {
        match self {
            ImportSpecifier::Default(local)
            | ImportSpecifier::Namespace(local)
            | ImportSpecifier::Named { local, .. } => local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: Atom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSpecifier {
    pub local: Atom,
    pub exported: Atom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExportDecl {
    /// `export var ...`, `export function ...`, `export class ...`
    Decl(StmtRef),
    /// `export default function f() {}` / `export default class C {}`
    DefaultDecl(StmtRef),
    DefaultExpr(ExprRef),
    Named {
        specifiers: Vec<ExportSpecifier>,
        source: Option<Atom>,
    },
    All {
        source: Atom,
    },
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgramKind {
    Script,
    Module,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub kind: ProgramKind,
    pub body: Vec<StmtRef>,
}

impl Program {
    pub fn is_module(&self) -> bool {
        self.kind == ProgramKind::Module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Ident {
        Ident::synthetic(name)
    }

    #[test]
    fn bound_idents_walks_nested_patterns() {
        let pat = Pat::Array(ArrayPat {
            span: Span::DUMMY,
            elems: vec![
                Some(PatElem {
                    target: Pat::ident(id("a")),
                    default: None,
                }),
                None,
                Some(PatElem {
                    target: Rc::new(Pat::Object(ObjectPat {
                        span: Span::DUMMY,
                        props: vec![ObjectPatProp {
                            key: PropKey::Ident("k".into()),
                            value: PatElem {
                                target: Pat::ident(id("b")),
                                default: None,
                            },
                        }],
                    })),
                    default: None,
                }),
            ],
            rest: Some(Pat::ident(id("c"))),
        });
        let mut out = Vec::new();
        pat.bound_idents(&mut out);
        let names: Vec<String> = out.iter().map(|i| i.name.to_string()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn directive_detection() {
        let directive = Stmt::synthetic(StmtKind::Expr(Expr::synthetic(ExprKind::Lit(
            Lit::Str("use strict".into()),
        ))));
        assert!(directive.is_directive());
        let other = Stmt::synthetic(StmtKind::Expr(Expr::synthetic(ExprKind::This)));
        assert!(!other.is_directive());
    }
}
