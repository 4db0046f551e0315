//! Reports references to names that are declared nowhere.
//!
//! `arguments` inside a function and `__moduleName` inside a module are
//! implicitly bound. A `typeof x` operand is a reference like any other.
//! Diagnostics come out in source order.

use bp_ast::Program;
use rustc_hash::FxHashSet;

use crate::diagnostics::Reporter;
use crate::scope::ScopeTree;

pub fn check_free_variables(program: &Program, globals: &[String], reporter: &mut Reporter) {
    let tree = ScopeTree::build(program);
    let globals: FxHashSet<&str> = globals.iter().map(String::as_str).collect();
    let mut free: Vec<_> = tree
        .unresolved()
        .filter_map(|(scope, reference)| {
            let name = reference.name.as_ident()?;
            let implicit = globals.contains(name)
                || (name == "arguments" && tree.in_function(scope))
                || (name == "__moduleName" && tree.is_module());
            (!implicit).then_some((reference.span, name))
        })
        .collect();
    free.sort_by_key(|(span, _)| (span.lo, span.hi));
    for (span, name) in &free {
        reporter.error(*span, format!("{name} is not defined"));
    }
    tracing::debug!(reported = free.len(), "checked free variables");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str, module: bool, globals: &[&str]) -> Vec<String> {
        let program = if module {
            bp_parser::parse_module(source)
        } else {
            bp_parser::parse_script(source)
        }
        .expect("parse");
        let globals: Vec<String> = globals.iter().map(|g| g.to_string()).collect();
        let mut reporter = Reporter::new();
        check_free_variables(&program, &globals, &mut reporter);
        reporter
            .into_diagnostics()
            .iter()
            .map(|d| d.to_string())
            .collect()
    }

    #[test]
    fn one_diagnostic_per_reference_at_its_position() {
        assert_eq!(
            check("var a = 1;\na + b;\n  b;", false, &[]),
            ["2:5: error: b is not defined", "3:3: error: b is not defined"]
        );
    }

    #[test]
    fn arguments_only_inside_functions() {
        assert!(check("function f() { return () => arguments; }", false, &[]).is_empty());
        assert_eq!(
            check("arguments;", false, &[]),
            ["1:1: error: arguments is not defined"]
        );
    }

    #[test]
    fn module_name_only_inside_modules() {
        assert!(check("__moduleName;", true, &[]).is_empty());
        assert_eq!(check("__moduleName;", false, &[]).len(), 1);
    }

    #[test]
    fn globals_are_accepted() {
        assert!(check("console.log(window);", false, &["console", "window"]).is_empty());
    }

    #[test]
    fn typeof_operands_are_checked() {
        assert_eq!(
            check("console.log(typeof window);", false, &["console"]),
            ["1:20: error: window is not defined"]
        );
    }

    #[test]
    fn reported_in_source_order_across_scopes() {
        let source = "function f() {
  return c;
}
b;
{ let x = 1; d(x); }
a;";
        assert_eq!(
            check(source, false, &[]),
            [
                "2:10: error: c is not defined",
                "4:1: error: b is not defined",
                "5:14: error: d is not defined",
                "6:1: error: a is not defined",
            ]
        );
    }
}
