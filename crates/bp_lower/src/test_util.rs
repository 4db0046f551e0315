//! Helpers for pass tests: parse, lower, rename, print, compare.

use bp_ast::Program;

use crate::diagnostics::Reporter;
use crate::rename::rename_temporaries;
use crate::temps::TempAllocator;

pub fn script(source: &str) -> Program {
    bp_parser::parse_script(source).expect("test input parses")
}

pub fn module(source: &str) -> Program {
    bp_parser::parse_module(source).expect("test input parses")
}

pub fn print(program: &Program) -> String {
    bp_codegen::print_program(program)
}

/// Reprints `source` so comparisons ignore formatting.
pub fn normalize(source: &str) -> String {
    print(&script(source))
}

pub fn normalize_module(source: &str) -> String {
    print(&module(source))
}

/// Runs `pass` and the temporary renamer over `program` and prints the result.
pub fn lower_with(
    program: &Program,
    pass: impl FnOnce(&Program, &mut TempAllocator, &mut Reporter) -> Program,
) -> (String, Reporter) {
    let mut alloc = TempAllocator::new();
    let mut reporter = Reporter::new();
    let lowered = pass(program, &mut alloc, &mut reporter);
    (print(&rename_temporaries(&lowered)), reporter)
}

/// Lowers a script and checks it against `expected`, with no diagnostics.
pub fn check(
    input: &str,
    expected: &str,
    pass: impl FnOnce(&Program, &mut TempAllocator, &mut Reporter) -> Program,
) {
    let (actual, reporter) = lower_with(&script(input), pass);
    assert_eq!(actual, normalize(expected), "lowering `{input}`");
    assert!(
        reporter.diagnostics().is_empty(),
        "unexpected diagnostics: {:?}",
        reporter.diagnostics()
    );
}
