//! Rejects syntax the backport AST cannot represent.
//!
//! The checker walks the whole SWC tree once and records every offending
//! node with its location, so a file with several problems reports all of
//! them in one run.

use anyhow::{bail, Result};
use swc_common::{sync::Lrc, SourceMap, Span};
use swc_ecma_ast as ast;
use swc_ecma_visit::{Visit, VisitWith};

pub(crate) struct SupportChecker {
    cm: Lrc<SourceMap>,
    errors: Vec<String>,
}

impl SupportChecker {
    pub(crate) fn new(cm: Lrc<SourceMap>) -> Self {
        Self {
            cm,
            errors: Vec::new(),
        }
    }

    fn reject(&mut self, span: Span, what: &str) {
        let loc = self.cm.lookup_char_pos(span.lo);
        self.errors.push(format!(
            "{}:{}: {what} is not supported",
            loc.line,
            loc.col.0 + 1
        ));
    }

    pub(crate) fn finish(self, filename: &str) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        for error in &self.errors {
            tracing::warn!("{filename}:{error}");
        }
        bail!("{filename}:{}", self.errors.join(&format!("\n{filename}:")))
    }
}

impl Visit for SupportChecker {
    fn visit_opt_chain_expr(&mut self, n: &ast::OptChainExpr) {
        self.reject(n.span, "optional chaining");
    }

    fn visit_tagged_tpl(&mut self, n: &ast::TaggedTpl) {
        self.reject(n.span, "a tagged template");
    }

    fn visit_meta_prop_expr(&mut self, n: &ast::MetaPropExpr) {
        self.reject(n.span, "a meta property");
    }

    fn visit_private_name(&mut self, n: &ast::PrivateName) {
        self.reject(n.span, "a private name");
    }

    fn visit_big_int(&mut self, n: &ast::BigInt) {
        self.reject(n.span, "a BigInt literal");
    }

    fn visit_with_stmt(&mut self, n: &ast::WithStmt) {
        self.reject(n.span, "`with`");
    }

    fn visit_using_decl(&mut self, n: &ast::UsingDecl) {
        self.reject(n.span, "`using`");
    }

    fn visit_callee(&mut self, n: &ast::Callee) {
        if let ast::Callee::Import(import) = n {
            self.reject(import.span, "dynamic `import()`");
        }
        n.visit_children_with(self);
    }

    fn visit_for_of_stmt(&mut self, n: &ast::ForOfStmt) {
        if n.is_await {
            self.reject(n.span, "`for await`");
        }
        n.visit_children_with(self);
    }

    fn visit_labeled_stmt(&mut self, n: &ast::LabeledStmt) {
        if let ast::Stmt::Decl(ast::Decl::Fn(_)) = &*n.body {
            self.reject(n.span, "a labeled function declaration");
        }
        n.visit_children_with(self);
    }

    fn visit_function(&mut self, n: &ast::Function) {
        if n.is_async && n.is_generator {
            self.reject(n.span, "an async generator");
        }
        n.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, n: &ast::ArrowExpr) {
        if n.is_generator {
            self.reject(n.span, "a generator arrow");
        }
        n.visit_children_with(self);
    }

    fn visit_prop_or_spread(&mut self, n: &ast::PropOrSpread) {
        match n {
            ast::PropOrSpread::Spread(spread) => {
                self.reject(spread.dot3_token, "object spread");
            }
            ast::PropOrSpread::Prop(prop) => match &**prop {
                ast::Prop::Assign(assign) => self.reject(assign.span, "`=` in an object literal"),
                ast::Prop::Getter(getter) if is_computed(&getter.key) => {
                    self.reject(getter.span, "a getter with a computed key")
                }
                ast::Prop::Setter(setter) if is_computed(&setter.key) => {
                    self.reject(setter.span, "a setter with a computed key")
                }
                _ => {}
            },
        }
        n.visit_children_with(self);
    }

    fn visit_object_pat_prop(&mut self, n: &ast::ObjectPatProp) {
        if let ast::ObjectPatProp::Rest(rest) = n {
            self.reject(rest.span, "object rest");
        }
        n.visit_children_with(self);
    }

    fn visit_class_member(&mut self, n: &ast::ClassMember) {
        match n {
            ast::ClassMember::ClassProp(prop) => self.reject(prop.span, "a class field"),
            ast::ClassMember::PrivateProp(prop) => self.reject(prop.span, "a private field"),
            ast::ClassMember::StaticBlock(block) => self.reject(block.span, "a static block"),
            ast::ClassMember::AutoAccessor(acc) => self.reject(acc.span, "an auto accessor"),
            ast::ClassMember::Method(method)
                if method.kind != ast::MethodKind::Method && is_computed(&method.key) =>
            {
                self.reject(method.span, "an accessor with a computed key")
            }
            _ => {}
        }
        n.visit_children_with(self);
    }

    fn visit_export_specifier(&mut self, n: &ast::ExportSpecifier) {
        match n {
            ast::ExportSpecifier::Named(_) => {}
            ast::ExportSpecifier::Namespace(ns) => self.reject(ns.span, "`export * as`"),
            ast::ExportSpecifier::Default(def) => {
                self.reject(def.exported.span, "`export x from`")
            }
        }
    }

    fn visit_pat(&mut self, n: &ast::Pat) {
        if let ast::Pat::Invalid(invalid) = n {
            self.reject(invalid.span, "this pattern");
        }
        n.visit_children_with(self);
    }

    fn visit_simple_assign_target(&mut self, n: &ast::SimpleAssignTarget) {
        match n {
            ast::SimpleAssignTarget::Ident(_)
            | ast::SimpleAssignTarget::Member(_)
            | ast::SimpleAssignTarget::SuperProp(_)
            | ast::SimpleAssignTarget::Paren(_) => {}
            ast::SimpleAssignTarget::OptChain(opt) => self.reject(opt.span, "optional chaining"),
            _ => self.reject(swc_common::Spanned::span(n), "this assignment target"),
        }
        n.visit_children_with(self);
    }
}

fn is_computed(key: &ast::PropName) -> bool {
    matches!(key, ast::PropName::Computed(_))
}

#[cfg(test)]
mod tests {
    use crate::{parse, SourceKind};

    fn rejection(source: &str) -> String {
        match parse(source, "t.js", SourceKind::Script) {
            Ok(_) => panic!("expected `{source}` to be rejected"),
            Err(err) => err.to_string(),
        }
    }

    #[test]
    fn reports_location_and_construct() {
        let msg = rejection("var a = 1;\nb?.c;");
        assert!(msg.contains("t.js:2:1: optional chaining is not supported"), "{msg}");
    }

    #[test]
    fn collects_every_problem() {
        let msg = rejection("({...a});\nvar {...b} = c;");
        assert!(msg.contains("object spread"), "{msg}");
        assert!(msg.contains("object rest"), "{msg}");
    }

    #[test]
    fn accepts_the_modelled_surface() {
        let source = "class A extends B { constructor() { super(); } get x() { return 1; } }\n\
                      function* g() { yield* h(); }\n\
                      async function f() { for (const [k, v] of m) await k; }\n";
        assert!(parse(source, "ok.js", SourceKind::Script).is_ok());
    }
}
