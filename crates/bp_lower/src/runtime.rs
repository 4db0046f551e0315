//! Names of the runtime helpers generated code calls.
//!
//! The helpers live on the `$traceurRuntime` global unless the
//! runtime-import pass rebinds them to imported or required locals.

use bp_ast::factory::{call, ident_expr, member};
use bp_ast::{ExprKind, ExprRef, MemberProp};

pub const RUNTIME_GLOBAL: &str = "$traceurRuntime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Helper {
    CreateClass,
    SuperConstructor,
    SuperGet,
    SuperSet,
    Spawn,
    Spread,
    IteratorToArray,
    ToProperty,
    CreateGeneratorInstance,
    ExportStar,
}

impl Helper {
    pub const ALL: [Helper; 10] = [
        Helper::CreateClass,
        Helper::SuperConstructor,
        Helper::SuperGet,
        Helper::SuperSet,
        Helper::Spawn,
        Helper::Spread,
        Helper::IteratorToArray,
        Helper::ToProperty,
        Helper::CreateGeneratorInstance,
        Helper::ExportStar,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Helper::CreateClass => "createClass",
            Helper::SuperConstructor => "superConstructor",
            Helper::SuperGet => "superGet",
            Helper::SuperSet => "superSet",
            Helper::Spawn => "spawn",
            Helper::Spread => "spread",
            Helper::IteratorToArray => "iteratorToArray",
            Helper::ToProperty => "toProperty",
            Helper::CreateGeneratorInstance => "createGeneratorInstance",
            Helper::ExportStar => "exportStar",
        }
    }

    pub fn from_name(name: &str) -> Option<Helper> {
        Helper::ALL.into_iter().find(|h| h.name() == name)
    }

    /// `$traceurRuntime.<name>`
    pub fn expr(self) -> ExprRef {
        member(ident_expr(RUNTIME_GLOBAL), self.name())
    }

    /// `$traceurRuntime.<name>(args)`
    pub fn call(self, args: Vec<ExprRef>) -> ExprRef {
        call(self.expr(), args)
    }

    /// Recognizes `$traceurRuntime.<name>`.
    pub fn of_expr(expr: &ExprRef) -> Option<Helper> {
        match &expr.kind {
            ExprKind::Member {
                object,
                prop: MemberProp::Name(name),
            } if object.is_ident(RUNTIME_GLOBAL) => Helper::from_name(name),
            _ => None,
        }
    }
}
