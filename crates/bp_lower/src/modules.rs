//! ES module syntax to CommonJS or AMD.
//!
//! ```text
//! import {a} from "./dep.js"; export var b = a + 1;
//!   →  "use strict";
//!      Object.defineProperties(module.exports, {
//!        b: {get: function() { return b; }, enumerable: true},
//!        __esModule: {value: true}
//!      });
//!      var _dep = require("./dep.js");
//!      var b = _dep.a + 1;
//! ```
//!
//! Every dependency gets one binding named after its path. Imported names
//! are read through that binding at each reference, so a later change to
//! the exporting module's value is seen. Only top-level items are visited.

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::diagnostics::Reporter;
use crate::runtime::Helper;
use crate::scope::{ScopeId, ScopeTree};
use crate::temps::TempAllocator;
use crate::transform::{self, Transformer};

/// Name a dependency binding after its path.
///
/// ```text
/// "../aaa/bbb/ccc.js"  →  _aaaBbbCcc
/// "42"                 →  _42
/// ""                   →  _module
/// ```
pub fn file_path_to_binding_name(path: &str) -> String {
    let stem = match path.rfind('.') {
        Some(dot) if dot > 0 && !path[dot..].contains(['/', '\\']) => &path[..dot],
        _ => path,
    };
    let mut name = String::new();
    for segment in stem
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .filter(|s| !s.is_empty())
    {
        if name.is_empty() {
            name.push_str(segment);
            continue;
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    if name.is_empty() {
        name.push_str("module");
    }
    if name.starts_with('_') {
        name
    } else {
        format!("_{name}")
    }
}

const DEFAULT_BINDING: &str = "$__default";

pub fn lower_modules(
    program: &Program,
    format: &str,
    alloc: &mut TempAllocator,
    reporter: &mut Reporter,
) -> Program {
    if !program.is_module() {
        return program.clone();
    }
    let format = match format.parse::<ModuleFormat>() {
        Ok(ModuleFormat::None) => return program.clone(),
        Ok(format) => format,
        Err(err) => {
            reporter.error(Span::DUMMY, err.to_string());
            return program.clone();
        }
    };
    debug!(pass = "modules", %format, "start");
    let tree = ScopeTree::build(program);
    let module = ModuleItems::collect(program, alloc);

    let mut refs = ImportRefs {
        tree: &tree,
        imports: &module.imports,
        scopes: Vec::new(),
    };
    let body: Vec<StmtRef> = module.body.iter().map(|s| refs.transform_stmt(s)).collect();

    let out = match format {
        ModuleFormat::CommonJs => module.commonjs(body),
        ModuleFormat::Amd => module.amd(body),
        ModuleFormat::None => unreachable!("handled above"),
    };
    debug!(pass = "modules", changed = true, "finish");
    Program {
        kind: ProgramKind::Script,
        body: out,
    }
}

struct Dependency {
    source: Atom,
    binding: TempToken,
}

/// The top-level items of a module, sorted by what they become.
struct ModuleItems {
    deps: Vec<Dependency>,
    /// Imported local name → the member read that replaces it.
    imports: FxHashMap<Name, ExprRef>,
    namespaces: Vec<(Ident, TempToken)>,
    /// Exported name → the expression its getter returns.
    exports: IndexMap<Atom, ExprRef>,
    stars: Vec<TempToken>,
    body: Vec<StmtRef>,
}

fn declared_idents(stmt: &Stmt) -> Vec<Ident> {
    match &stmt.kind {
        StmtKind::Var(decl) => {
            let mut idents = Vec::new();
            decl.bound_idents(&mut idents);
            idents.into_iter().cloned().collect()
        }
        StmtKind::Function(f) => f.ident.iter().cloned().collect(),
        StmtKind::Class(c) => c.ident.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

fn getter(value: ExprRef) -> ExprRef {
    object(vec![
        ("get", anon_function(vec![], vec![return_stmt(Some(value))])),
        ("enumerable", bool_lit(true)),
    ])
}

impl ModuleItems {
    fn collect(program: &Program, alloc: &mut TempAllocator) -> Self {
        let mut items = ModuleItems {
            deps: Vec::new(),
            imports: FxHashMap::default(),
            namespaces: Vec::new(),
            exports: IndexMap::new(),
            stars: Vec::new(),
            body: Vec::new(),
        };
        // Imports first: an export may name an import declared below it.
        for stmt in &program.body {
            if let StmtKind::Import(import) = &stmt.kind {
                let binding = items.dependency(&import.source, alloc);
                for spec in &import.specifiers {
                    match spec {
                        ImportSpecifier::Default(local) => {
                            items
                                .imports
                                .insert(local.name.clone(), member(temp_expr(&binding), "default"));
                        }
                        ImportSpecifier::Named { imported, local } => {
                            items
                                .imports
                                .insert(local.name.clone(), member(temp_expr(&binding), imported));
                        }
                        ImportSpecifier::Namespace(local) => {
                            items.namespaces.push((local.clone(), binding.clone()));
                        }
                    }
                }
            }
        }
        for stmt in &program.body {
            match &stmt.kind {
                StmtKind::Import(_) => {}
                StmtKind::Export(export) => items.export(export, alloc),
                _ => items.body.push(stmt.clone()),
            }
        }
        items
    }

    fn dependency(&mut self, source: &Atom, alloc: &mut TempAllocator) -> TempToken {
        if let Some(dep) = self.deps.iter().find(|d| d.source == *source) {
            return dep.binding.clone();
        }
        let binding = alloc.allocate(&file_path_to_binding_name(source));
        self.deps.push(Dependency {
            source: source.clone(),
            binding: binding.clone(),
        });
        binding
    }

    /// A local name as read from module scope.
    fn local(&self, name: &Atom) -> ExprRef {
        let name = Name::Ident(name.clone());
        match self.imports.get(&name) {
            Some(read) => read.clone(),
            None => ident_expr(name),
        }
    }

    fn export(&mut self, export: &ExportDecl, alloc: &mut TempAllocator) {
        match export {
            ExportDecl::Decl(stmt) => {
                for ident in declared_idents(stmt) {
                    if let Some(name) = ident.name.as_ident() {
                        self.exports.insert(name.into(), expr_of_ident(&ident));
                    }
                }
                self.body.push(stmt.clone());
            }
            ExportDecl::DefaultDecl(stmt) => match declared_idents(stmt).into_iter().next() {
                Some(ident) => {
                    self.exports.insert("default".into(), expr_of_ident(&ident));
                    self.body.push(stmt.clone());
                }
                None => {
                    let value = match &stmt.kind {
                        StmtKind::Function(f) => Expr::new(stmt.span, ExprKind::Function(f.clone())),
                        StmtKind::Class(c) => Expr::new(stmt.span, ExprKind::Class(c.clone())),
                        _ => unreachable!("default export declaration is a function or class: {stmt:?}"),
                    };
                    self.default_expr(stmt.span, value);
                }
            },
            ExportDecl::DefaultExpr(expr) => self.default_expr(expr.span, expr.clone()),
            ExportDecl::Named {
                specifiers,
                source: None,
            } => {
                for spec in specifiers {
                    let value = self.local(&spec.local);
                    self.exports.insert(spec.exported.clone(), value);
                }
            }
            ExportDecl::Named {
                specifiers,
                source: Some(source),
            } => {
                let binding = self.dependency(source, alloc);
                for spec in specifiers {
                    self.exports
                        .insert(spec.exported.clone(), member(temp_expr(&binding), &spec.local));
                }
            }
            ExportDecl::All { source } => {
                let binding = self.dependency(source, alloc);
                self.stars.push(binding);
            }
        }
    }

    fn default_expr(&mut self, span: Span, value: ExprRef) {
        let binding = Ident::new(span, DEFAULT_BINDING);
        self.body
            .push(var_one(VarKind::Var, Pat::ident(binding.clone()), Some(value)));
        self.exports.insert("default".into(), expr_of_ident(&binding));
    }

    /// `{name: {get: ..., enumerable: true}, ..., __esModule: {value: true}}`
    fn descriptors(&self) -> ExprRef {
        let mut props: Vec<(&str, ExprRef)> = self
            .exports
            .iter()
            .map(|(name, value)| (&**name, getter(value.clone())))
            .collect();
        props.push(("__esModule", object(vec![("value", bool_lit(true))])));
        object(props)
    }

    fn with_stars(&self, exports: ExprRef) -> ExprRef {
        if self.stars.is_empty() {
            return exports;
        }
        let mut args = vec![exports];
        args.extend(self.stars.iter().map(temp_expr));
        Helper::ExportStar.call(args)
    }

    fn namespace_vars(&self) -> impl Iterator<Item = StmtRef> + '_ {
        self.namespaces
            .iter()
            .map(|(local, binding)| var_one(VarKind::Var, Pat::ident(local.clone()), Some(temp_expr(binding))))
    }

    fn commonjs(&self, body: Vec<StmtRef>) -> Vec<StmtRef> {
        let exports = member(ident_expr("module"), "exports");
        let mut out = vec![
            expr_stmt(str_lit("use strict")),
            expr_stmt(call(member_path("Object.defineProperties"), vec![exports.clone(), self.descriptors()])),
        ];
        for dep in &self.deps {
            let require = call(ident_expr("require"), vec![str_lit(&dep.source)]);
            out.push(var_one(VarKind::Var, temp_pat(&dep.binding), Some(require)));
        }
        out.extend(self.namespace_vars());
        if !self.stars.is_empty() {
            out.push(expr_stmt(self.with_stars(exports)));
        }
        out.extend(body);
        out
    }

    fn amd(&self, body: Vec<StmtRef>) -> Vec<StmtRef> {
        let mut inner = vec![expr_stmt(str_lit("use strict"))];
        inner.extend(self.namespace_vars());
        inner.extend(body);
        let exports = call(
            member_path("Object.defineProperties"),
            vec![object(vec![]), self.descriptors()],
        );
        inner.push(return_stmt(Some(self.with_stars(exports))));
        let deps = array(self.deps.iter().map(|d| str_lit(&d.source)).collect());
        let params = self.deps.iter().map(|d| temp_pat(&d.binding)).collect();
        vec![expr_stmt(call(ident_expr("define"), vec![deps, anon_function(params, inner)]))]
    }
}

/// Replaces references to imported names that are not shadowed.
struct ImportRefs<'t> {
    tree: &'t ScopeTree,
    imports: &'t FxHashMap<Name, ExprRef>,
    scopes: Vec<ScopeId>,
}

impl ImportRefs<'_> {
    fn scoped<T>(&mut self, scope: Option<ScopeId>, f: impl FnOnce(&mut Self) -> T) -> T {
        let Some(scope) = scope else {
            return f(self);
        };
        self.scopes.push(scope);
        let out = f(self);
        self.scopes.pop();
        out
    }

    fn current(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or(ScopeId::ROOT)
    }
}

impl Transformer for ImportRefs<'_> {
    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        let scope = self.tree.node_scope(&**stmt);
        self.scoped(scope, |t| transform::walk_stmt(t, stmt))
    }

    fn transform_catch(&mut self, catch: &Catch) -> Catch {
        let scope = self.tree.node_scope(catch);
        self.scoped(scope, |t| transform::walk_catch(t, catch))
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        let scope = self.tree.node_scope(&**function);
        self.scoped(scope, |t| transform::walk_function(t, function))
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        let scope = self.tree.node_scope(&**arrow);
        self.scoped(scope, |t| transform::walk_arrow(t, arrow))
    }

    fn transform_class(&mut self, class: &Rc<Class>) -> Rc<Class> {
        let scope = self.tree.node_scope(&**class);
        self.scoped(scope, |t| transform::walk_class(t, class))
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        let ExprKind::Ident(ident) = &expr.kind else {
            return transform::walk_expr(self, expr);
        };
        match self.imports.get(&ident.name) {
            Some(read) if self.tree.resolve(self.current(), &ident.name) == Some(ScopeId::ROOT) => read.clone(),
            _ => expr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{lower_with, module, normalize, script};
    use crate::transform::same_list;

    fn lower(input: &str, format: &str, expected: &str) {
        let (actual, reporter) = lower_with(&module(input), |p, alloc, reporter| {
            lower_modules(p, format, alloc, reporter)
        });
        assert_eq!(actual, normalize(expected), "lowering `{input}`");
        assert!(!reporter.has_errors());
    }

    #[test]
    fn binding_names_come_from_paths() {
        assert_eq!(file_path_to_binding_name("../aaa/bbb/ccc.js"), "_aaaBbbCcc");
        assert_eq!(file_path_to_binding_name("42"), "_42");
        assert_eq!(file_path_to_binding_name(""), "_module");
        assert_eq!(file_path_to_binding_name("./my-lib/index.js"), "_myLibIndex");
        assert_eq!(file_path_to_binding_name("_private"), "_private");
        assert_eq!(file_path_to_binding_name("."), "_module");
        assert_eq!(file_path_to_binding_name("/"), "_module");
        assert_eq!(file_path_to_binding_name("_"), "_");
        assert_eq!(file_path_to_binding_name("aaa\\bbb"), "_aaaBbb");
        assert_eq!(file_path_to_binding_name("aaa bbb"), "_aaaBbb");
    }

    #[test]
    fn commonjs_requires_and_defines_getters() {
        lower(
            r#"import {a} from "./dep.js";
               export var b = a + 1;
               export function f() { var a = 2; return a; }"#,
            "commonjs",
            r#""use strict";
               Object.defineProperties(module.exports, {
                 b: {get: function() { return b; }, enumerable: true},
                 f: {get: function() { return f; }, enumerable: true},
                 __esModule: {value: true}
               });
               var _dep = require("./dep.js");
               var b = _dep.a + 1;
               function f() { var a = 2; return a; }"#,
        );
    }

    #[test]
    fn amd_wraps_the_module_in_define() {
        lower(
            r#"import x from "a/b-c"; export default x;"#,
            "amd",
            r#"define(["a/b-c"], function(_aBC) {
                 "use strict";
                 var $__default = _aBC.default;
                 return Object.defineProperties({}, {
                   default: {get: function() { return $__default; }, enumerable: true},
                   __esModule: {value: true}
                 });
               });"#,
        );
    }

    #[test]
    fn namespaces_and_re_exports() {
        lower(
            r#"import * as ns from "x"; export {ns}; export {y as z} from "y"; export * from "w";"#,
            "commonjs",
            r#""use strict";
               Object.defineProperties(module.exports, {
                 ns: {get: function() { return ns; }, enumerable: true},
                 z: {get: function() { return _y.y; }, enumerable: true},
                 __esModule: {value: true}
               });
               var _x = require("x");
               var _y = require("y");
               var _w = require("w");
               var ns = _x;
               $traceurRuntime.exportStar(module.exports, _w);"#,
        );
    }

    #[test]
    fn exported_imports_read_through_the_dependency() {
        lower(
            r#"export {a as b}; import {a} from "m";"#,
            "commonjs",
            r#""use strict";
               Object.defineProperties(module.exports, {
                 b: {get: function() { return _m.a; }, enumerable: true},
                 __esModule: {value: true}
               });
               var _m = require("m");"#,
        );
    }

    #[test]
    fn unsupported_formats_are_reported() {
        let p = module("export var a = 1;");
        let mut alloc = TempAllocator::new();
        let mut reporter = Reporter::new();
        let out = lower_modules(&p, "system", &mut alloc, &mut reporter);
        assert!(reporter.has_errors());
        assert!(same_list(&p.body, &out.body));
    }

    #[test]
    fn scripts_are_left_alone() {
        let p = script("var a = require('a');");
        let mut alloc = TempAllocator::new();
        let mut reporter = Reporter::new();
        let out = lower_modules(&p, "commonjs", &mut alloc, &mut reporter);
        assert!(same_list(&p.body, &out.body));
        assert!(!reporter.has_errors());
    }
}
