//! JavaScript printer for backport ASTs.
//!
//! Output is deterministic: two-space indentation, one statement per line,
//! parentheses only where precedence or statement position requires them.
//! Unresolved temporaries print as `$__<id>`.

mod printer;
mod quote;

use bp_ast::{Expr, Program, Stmt};

pub use printer::Printer;
pub use quote::{is_identifier_name, quote_str};

pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::new();
    printer.program(program);
    printer.finish()
}

pub fn print_stmt(stmt: &Stmt) -> String {
    let mut printer = Printer::new();
    printer.stmt(stmt);
    printer.finish()
}

pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::new();
    printer.expr(expr, 0);
    printer.finish()
}

#[cfg(test)]
mod tests {
    use bp_ast::factory::*;
    use bp_ast::{BinaryOp, UnaryOp};

    use super::*;

    fn reprint(source: &str) -> String {
        let program = bp_parser::parse_script(source).expect("parse");
        print_program(&program)
    }

    #[test]
    fn precedence_adds_only_needed_parens() {
        let sum = binary(BinaryOp::Add, ident_expr("a"), ident_expr("b"));
        let product = binary(BinaryOp::Mul, sum.clone(), ident_expr("c"));
        assert_eq!(print_expr(&product), "(a + b) * c");
        let right = binary(BinaryOp::Sub, ident_expr("a"), sum);
        assert_eq!(print_expr(&right), "a - (a + b)");
    }

    #[test]
    fn keyword_unary_and_void_zero() {
        assert_eq!(print_expr(&void_zero()), "void 0");
        let t = unary(UnaryOp::TypeOf, ident_expr("x"));
        assert_eq!(print_expr(&t), "typeof x");
        let neg = unary(UnaryOp::Minus, unary(UnaryOp::Minus, ident_expr("x")));
        assert_eq!(print_expr(&neg), "- -x");
    }

    #[test]
    fn statement_position_object_and_function_are_wrapped() {
        let stmt = expr_stmt(call(anon_function(vec![], vec![]), vec![]));
        assert_eq!(print_stmt(&stmt), "(function() {}());");
        let obj = expr_stmt(member(object(vec![]), "x"));
        assert_eq!(print_stmt(&obj), "({}.x);");
    }

    #[test]
    fn seq_inside_call_args_is_parenthesized() {
        let e = call(
            ident_expr("f"),
            vec![seq(vec![ident_expr("a"), ident_expr("b")])],
        );
        assert_eq!(print_expr(&e), "f((a, b))");
    }

    #[test]
    fn reprints_statements() {
        let source = "if (a) b(); else { c(); }\nfor (var i = 0; i < n; i++) x += i;\n";
        assert_eq!(
            reprint(source),
            "if (a)\n  b();\nelse {\n  c();\n}\nfor (var i = 0; i < n; i++)\n  x += i;\n"
        );
    }

    #[test]
    fn reprints_patterns_with_shorthand() {
        assert_eq!(
            reprint("var {x, y: z = 1} = o, [a, , ...b] = c;"),
            "var {x, y: z = 1} = o, [a, , ...b] = c;\n"
        );
    }

    #[test]
    fn dangling_else_gets_braces() {
        let inner = if_stmt(ident_expr("b"), expr_stmt(ident_expr("c")), None);
        let outer = if_stmt(ident_expr("a"), inner, Some(expr_stmt(ident_expr("d"))));
        assert_eq!(
            print_stmt(&outer),
            "if (a) {\n  if (b)\n    c;\n} else\n  d;"
        );
    }

    #[test]
    fn switch_and_labels() {
        assert_eq!(
            reprint("outer: while (true) switch (x) { case 1: break outer; default: continue; }"),
            "outer: while (true)\n  switch (x) {\n    case 1:\n      break outer;\n    default:\n      continue;\n  }\n"
        );
    }

    #[test]
    fn modules_print_es_syntax() {
        let program = bp_parser::parse_module(
            "import a, {b as c} from './x';\nexport default 1;\nexport {c as d};\n",
        )
        .expect("parse");
        assert_eq!(
            print_program(&program),
            "import a, {b as c} from \"./x\";\nexport default 1;\nexport {c as d};\n"
        );
    }
}
