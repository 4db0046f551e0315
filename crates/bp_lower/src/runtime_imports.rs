//! Rebinds `$traceurRuntime.<helper>` to locals bound by an import or a
//! `require` call, so generated code does not depend on the global.
//!
//! ```text
//! $traceurRuntime.spread(xs)
//!   →  import $__spread from "traceur/src/runtime/spread.js";   (module)
//!      $__spread(xs)
//!
//!   →  var $__spread = require("traceur/runtime/spread").default; (script)
//!      $__spread(xs)
//! ```

use bp_ast::factory::*;
use bp_ast::*;
use indexmap::IndexSet;
use tracing::debug;

use crate::runtime::Helper;
use crate::transform::{self, Transformer};

fn local_name(helper: Helper) -> String {
    format!("$__{}", helper.name())
}

/// Where the helper bindings come from, if anywhere.
fn binding_style(program: &Program, options: &Options) -> Option<ProgramKind> {
    if program.is_module() {
        let format = options.module_format().ok()?;
        (options.import_runtime && format != ModuleFormat::None).then_some(ProgramKind::Module)
    } else {
        options.require_runtime.then_some(ProgramKind::Script)
    }
}

pub fn bind_runtime_helpers(program: &Program, options: &Options) -> Program {
    let Some(style) = binding_style(program, options) else {
        return program.clone();
    };
    let mut collector = HelperRefs::default();
    let lowered = collector.transform_program(program);
    if collector.used.is_empty() {
        return lowered;
    }
    debug!(pass = "runtime_imports", helpers = collector.used.len(), "binding helpers");

    let bindings = collector.used.iter().map(|&helper| {
        let local = Ident::synthetic(local_name(helper).as_str());
        match style {
            ProgramKind::Module => Stmt::synthetic(StmtKind::Import(ImportDecl {
                specifiers: vec![ImportSpecifier::Default(local)],
                source: format!("traceur/src/runtime/{}.js", helper.name()).into(),
            })),
            ProgramKind::Script => {
                let module = call(
                    ident_expr("require"),
                    vec![str_lit(&format!("traceur/runtime/{}", helper.name()))],
                );
                var_one(VarKind::Var, Pat::ident(local), Some(member(module, "default")))
            }
        }
    });
    let body = prepend_statements(&lowered.body, bindings.collect());
    Program {
        kind: lowered.kind,
        body,
    }
}

#[derive(Default)]
struct HelperRefs {
    used: IndexSet<Helper>,
}

impl Transformer for HelperRefs {
    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        match Helper::of_expr(expr) {
            Some(helper) => {
                self.used.insert(helper);
                Expr::new(expr.span, ExprKind::Ident(Ident::new(expr.span, local_name(helper).as_str())))
            }
            None => transform::walk_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{module, normalize, normalize_module, print, script};

    fn options(modules: &str, import_runtime: bool, require_runtime: bool) -> Options {
        Options {
            modules: modules.to_string(),
            import_runtime,
            require_runtime,
            ..Options::default()
        }
    }

    #[test]
    fn scripts_require_each_helper_once() {
        let p = script("$traceurRuntime.spread(a); $traceurRuntime.spread(b); $traceurRuntime.toProperty(k);");
        let out = bind_runtime_helpers(&p, &options("none", false, true));
        assert_eq!(
            print(&out),
            normalize(
                r#"var $__spread = require("traceur/runtime/spread").default;
                   var $__toProperty = require("traceur/runtime/toProperty").default;
                   $__spread(a); $__spread(b); $__toProperty(k);"#
            )
        );
    }

    #[test]
    fn modules_import_helpers_for_a_module_format() {
        let p = module("export var f = function() { return $traceurRuntime.spawn(g); };");
        let out = bind_runtime_helpers(&p, &options("commonjs", true, false));
        assert_eq!(
            print(&out),
            normalize_module(
                r#"import $__spawn from "traceur/src/runtime/spawn.js";
                   export var f = function() { return $__spawn(g); };"#
            )
        );
    }

    #[test]
    fn directives_stay_first() {
        let p = script(r#""use strict"; $traceurRuntime.spread(a);"#);
        let out = bind_runtime_helpers(&p, &options("none", false, true));
        assert_eq!(
            print(&out),
            normalize(
                r#""use strict";
                   var $__spread = require("traceur/runtime/spread").default;
                   $__spread(a);"#
            )
        );
    }

    #[test]
    fn untouched_without_a_binding_style() {
        let p = module("$traceurRuntime.spread(a);");
        assert_eq!(print(&bind_runtime_helpers(&p, &options("none", true, false))), print(&p));
        let s = script("$traceurRuntime.spread(a);");
        assert_eq!(print(&bind_runtime_helpers(&s, &options("none", true, false))), print(&s));
    }
}
