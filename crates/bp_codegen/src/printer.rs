use bp_ast::*;

use crate::quote::{is_identifier_name, quote_str};

// Binding power of each expression form, loosest first.
const SEQ: u8 = 0;
const ASSIGN: u8 = 1;
const COND: u8 = 2;
const UNARY: u8 = 14;
const UPDATE: u8 = 15;
const LHS: u8 = 16;
const CALL: u8 = 17;
const PRIMARY: u8 = 18;

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Nullish | BinaryOp::Or => 3,
        BinaryOp::And => 4,
        BinaryOp::BitOr => 5,
        BinaryOp::BitXor => 6,
        BinaryOp::BitAnd => 7,
        BinaryOp::EqEq | BinaryOp::NotEq | BinaryOp::EqEqEq | BinaryOp::NotEqEq => 8,
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::In
        | BinaryOp::InstanceOf => 9,
        BinaryOp::LShift | BinaryOp::RShift | BinaryOp::ZeroFillRShift => 10,
        BinaryOp::Add | BinaryOp::Sub => 11,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 12,
        BinaryOp::Exp => 13,
    }
}

fn prec(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Seq(_) => SEQ,
        ExprKind::Assign { .. } | ExprKind::Yield { .. } | ExprKind::Arrow(_) => ASSIGN,
        ExprKind::Cond { .. } => COND,
        ExprKind::Binary { op, .. } => binary_prec(*op),
        ExprKind::Unary { .. } | ExprKind::Await(_) => UNARY,
        ExprKind::Update { .. } => UPDATE,
        ExprKind::Call { .. } | ExprKind::New { .. } | ExprKind::Member { .. } => CALL,
        _ => PRIMARY,
    }
}

/// Whether printing `expr` would start with `{`, `function` or `class`,
/// which a statement context would misread.
fn starts_ambiguously(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Object(_) | ExprKind::Function(_) | ExprKind::Class(_) => true,
        ExprKind::Binary { left, .. } => starts_ambiguously(left),
        ExprKind::Assign { target, .. } => match &**target {
            Pat::Object(_) => true,
            Pat::Expr(e) => starts_ambiguously(e),
            _ => false,
        },
        ExprKind::Call { callee, .. } => starts_ambiguously(callee),
        ExprKind::Member { object, .. } => starts_ambiguously(object),
        ExprKind::Cond { test, .. } => starts_ambiguously(test),
        ExprKind::Seq(items) => items.first().is_some_and(|e| starts_ambiguously(e)),
        ExprKind::Update { prefix: false, arg, .. } => starts_ambiguously(arg),
        _ => false,
    }
}

fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Member { object, .. } => contains_call(object),
        _ => false,
    }
}

#[derive(Default)]
pub struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    pub fn program(&mut self, program: &Program) {
        for stmt in &program.body {
            self.stmt(stmt);
            self.out.push('\n');
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn block(&mut self, stmts: &[StmtRef]) {
        if stmts.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.indent += 1;
        for stmt in stmts {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    /// The body of `if`/loops: blocks stay on the same line.
    fn sub_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                self.push(" ");
                self.block(stmts);
            }
            StmtKind::Empty => self.push(";"),
            _ => {
                self.indent += 1;
                self.newline();
                self.stmt(stmt);
                self.indent -= 1;
            }
        }
    }

    pub fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.push("(");
                    self.expr(expr, SEQ);
                    self.push(")");
                } else {
                    self.expr(expr, SEQ);
                }
                self.push(";");
            }
            StmtKind::Block(stmts) => self.block(stmts),
            StmtKind::Empty => self.push(";"),
            StmtKind::Debugger => self.push("debugger;"),
            StmtKind::Var(decl) => {
                self.var_decl(decl, false);
                self.push(";");
            }
            StmtKind::Function(function) => self.function(function, "function"),
            StmtKind::Class(class) => self.class(class),
            StmtKind::Return(arg) => {
                self.push("return");
                if let Some(arg) = arg {
                    self.push(" ");
                    self.expr(arg, SEQ);
                }
                self.push(";");
            }
            StmtKind::If { test, cons, alt } => self.if_stmt(test, cons, alt.as_deref()),
            StmtKind::While { test, body } => {
                self.push("while (");
                self.expr(test, SEQ);
                self.push(")");
                self.sub_stmt(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.push("do");
                self.sub_stmt(body);
                if matches!(body.kind, StmtKind::Block(_)) {
                    self.push(" ");
                } else {
                    self.newline();
                }
                self.push("while (");
                self.expr(test, SEQ);
                self.push(");");
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.push("for (");
                match init {
                    Some(ForInit::Var(decl)) => self.var_decl(decl, true),
                    Some(ForInit::Expr(expr)) => self.expr_no_in(expr, SEQ),
                    None => {}
                }
                self.push(";");
                if let Some(test) = test {
                    self.push(" ");
                    self.expr(test, SEQ);
                }
                self.push(";");
                if let Some(update) = update {
                    self.push(" ");
                    self.expr(update, SEQ);
                }
                self.push(")");
                self.sub_stmt(body);
            }
            StmtKind::ForEach {
                kind,
                head,
                right,
                body,
            } => {
                self.push("for (");
                match head {
                    ForHead::Var(decl) => self.var_decl(decl, true),
                    ForHead::Pat(pat) => self.pat(pat),
                }
                self.push(&format!(" {kind} "));
                self.expr(right, ASSIGN);
                self.push(")");
                self.sub_stmt(body);
            }
            StmtKind::Labeled { label, body } => {
                self.push(label);
                self.push(": ");
                self.stmt(body);
            }
            StmtKind::Break(label) => self.jump("break", label.as_deref()),
            StmtKind::Continue(label) => self.jump("continue", label.as_deref()),
            StmtKind::Throw(arg) => {
                self.push("throw ");
                self.expr(arg, SEQ);
                self.push(";");
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.push("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.push(" catch ");
                    if let Some(param) = &handler.param {
                        self.push("(");
                        self.pat(param);
                        self.push(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.push(" finally ");
                    self.block(finalizer);
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.push("switch (");
                self.expr(discriminant, SEQ);
                self.push(") {");
                self.indent += 1;
                for case in cases {
                    self.newline();
                    match &case.test {
                        Some(test) => {
                            self.push("case ");
                            self.expr(test, SEQ);
                            self.push(":");
                        }
                        None => self.push("default:"),
                    }
                    self.indent += 1;
                    for stmt in &case.body {
                        self.newline();
                        self.stmt(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.newline();
                self.push("}");
            }
            StmtKind::Import(import) => self.import(import),
            StmtKind::Export(export) => self.export(export),
        }
    }

    fn jump(&mut self, keyword: &str, label: Option<&str>) {
        self.push(keyword);
        if let Some(label) = label {
            self.push(" ");
            self.push(label);
        }
        self.push(";");
    }

    fn if_stmt(&mut self, test: &Expr, cons: &Stmt, alt: Option<&Stmt>) {
        self.push("if (");
        self.expr(test, SEQ);
        self.push(")");
        // An else-less `if` as the consequent would capture our `else`.
        let dangling = alt.is_some() && ends_with_open_if(cons);
        if dangling {
            self.push(" ");
            self.block(std::slice::from_ref(&std::rc::Rc::new(cons.clone())));
        } else {
            self.sub_stmt(cons);
        }
        if let Some(alt) = alt {
            if dangling || matches!(cons.kind, StmtKind::Block(_)) {
                self.push(" ");
            } else {
                self.newline();
            }
            self.push("else");
            if matches!(alt.kind, StmtKind::If { .. }) {
                self.push(" ");
                self.stmt(alt);
            } else {
                self.sub_stmt(alt);
            }
        }
    }

    fn var_decl(&mut self, decl: &VarDecl, no_in: bool) {
        self.push(&decl.kind.to_string());
        self.push(" ");
        for (i, d) in decl.decls.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.pat(&d.target);
            if let Some(init) = &d.init {
                self.push(" = ");
                if no_in {
                    self.expr_no_in(init, ASSIGN);
                } else {
                    self.expr(init, ASSIGN);
                }
            }
        }
    }

    fn import(&mut self, import: &ImportDecl) {
        self.push("import ");
        let mut named = Vec::new();
        let mut leading = Vec::new();
        for spec in &import.specifiers {
            match spec {
                ImportSpecifier::Default(local) => leading.push(local.name.to_string()),
                ImportSpecifier::Namespace(local) => leading.push(format!("* as {}", local.name)),
                ImportSpecifier::Named { imported, local } => {
                    if local.is(imported) {
                        named.push(imported.to_string());
                    } else {
                        named.push(format!("{imported} as {}", local.name));
                    }
                }
            }
        }
        if !named.is_empty() {
            leading.push(format!("{{{}}}", named.join(", ")));
        }
        if !leading.is_empty() {
            self.push(&leading.join(", "));
            self.push(" from ");
        }
        quote_str(&import.source, &mut self.out);
        self.push(";");
    }

    fn export(&mut self, export: &ExportDecl) {
        self.push("export ");
        match export {
            ExportDecl::Decl(stmt) => self.stmt(stmt),
            ExportDecl::DefaultDecl(stmt) => {
                self.push("default ");
                self.stmt(stmt);
            }
            ExportDecl::DefaultExpr(expr) => {
                self.push("default ");
                self.expr(expr, ASSIGN);
                self.push(";");
            }
            ExportDecl::Named { specifiers, source } => {
                let specs: Vec<String> = specifiers
                    .iter()
                    .map(|s| {
                        if s.local == s.exported {
                            s.local.to_string()
                        } else {
                            format!("{} as {}", s.local, s.exported)
                        }
                    })
                    .collect();
                self.push(&format!("{{{}}}", specs.join(", ")));
                if let Some(source) = source {
                    self.push(" from ");
                    quote_str(source, &mut self.out);
                }
                self.push(";");
            }
            ExportDecl::All { source } => {
                self.push("* from ");
                quote_str(source, &mut self.out);
                self.push(";");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Functions and classes
    // -----------------------------------------------------------------------

    fn params(&mut self, params: &[Param], rest: Option<&Pat>) {
        self.push("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.pat(&param.target);
            if let Some(default) = &param.default {
                self.push(" = ");
                self.expr(default, ASSIGN);
            }
        }
        if let Some(rest) = rest {
            if !params.is_empty() {
                self.push(", ");
            }
            self.push("...");
            self.pat(rest);
        }
        self.push(")");
    }

    fn function(&mut self, function: &Function, keyword: &str) {
        if function.is_async {
            self.push("async ");
        }
        self.push(keyword);
        if function.is_generator {
            self.push("*");
        }
        if let Some(ident) = &function.ident {
            self.push(" ");
            self.push(&ident.name.text());
        }
        self.params(&function.params, function.rest.as_deref());
        self.push(" ");
        self.block(&function.body);
    }

    fn method(&mut self, key: &PropKey, kind: MethodKind, function: &Function) {
        match kind {
            MethodKind::Getter => self.push("get "),
            MethodKind::Setter => self.push("set "),
            MethodKind::Method | MethodKind::Constructor => {}
        }
        if function.is_async {
            self.push("async ");
        }
        if function.is_generator {
            self.push("*");
        }
        self.prop_key(key);
        self.params(&function.params, function.rest.as_deref());
        self.push(" ");
        self.block(&function.body);
    }

    fn class(&mut self, class: &Class) {
        self.push("class");
        if let Some(ident) = &class.ident {
            self.push(" ");
            self.push(&ident.name.text());
        }
        if let Some(super_class) = &class.super_class {
            self.push(" extends ");
            self.expr(super_class, LHS);
        }
        if class.members.is_empty() {
            self.push(" {}");
            return;
        }
        self.push(" {");
        self.indent += 1;
        for member in &class.members {
            self.newline();
            if member.is_static {
                self.push("static ");
            }
            self.method(&member.key, member.kind, &member.function);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    fn arrow(&mut self, arrow: &Arrow) {
        if arrow.is_async {
            self.push("async ");
        }
        self.params(&arrow.params, arrow.rest.as_deref());
        self.push(" => ");
        match &arrow.body {
            ArrowBody::Block(stmts) => self.block(stmts),
            ArrowBody::Expr(expr) => {
                if starts_ambiguously(expr) {
                    self.push("(");
                    self.expr(expr, SEQ);
                    self.push(")");
                } else {
                    self.expr(expr, ASSIGN);
                }
            }
        }
    }

    fn prop_key(&mut self, key: &PropKey) {
        match key {
            PropKey::Ident(name) => self.push(name),
            PropKey::Str(value) => quote_str(value, &mut self.out),
            PropKey::Num(raw) => self.push(raw),
            PropKey::Computed(expr) => {
                self.push("[");
                self.expr(expr, ASSIGN);
                self.push("]");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    fn pat(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(ident) => self.push(&ident.name.text()),
            Pat::Expr(expr) => self.expr(expr, LHS),
            Pat::Array(array) => {
                self.push("[");
                for (i, elem) in array.elems.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if let Some(elem) = elem {
                        self.pat_elem(elem);
                    }
                }
                if let Some(rest) = &array.rest {
                    if !array.elems.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.pat(rest);
                } else if matches!(array.elems.last(), Some(None)) {
                    self.push(",");
                }
                self.push("]");
            }
            Pat::Object(object) => {
                if object.props.is_empty() {
                    self.push("{}");
                    return;
                }
                self.push("{");
                for (i, prop) in object.props.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    let shorthand = match (&prop.key, &*prop.value.target) {
                        (PropKey::Ident(key), Pat::Ident(ident)) => ident.is(key),
                        _ => false,
                    };
                    if !shorthand {
                        self.prop_key(&prop.key);
                        self.push(": ");
                    }
                    self.pat_elem(&prop.value);
                }
                self.push("}");
            }
        }
    }

    fn pat_elem(&mut self, elem: &PatElem) {
        self.pat(&elem.target);
        if let Some(default) = &elem.default {
            self.push(" = ");
            self.expr(default, ASSIGN);
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Like [`Printer::expr`], but wraps a top-level `in` so it can sit in
    /// a `for` head.
    fn expr_no_in(&mut self, expr: &Expr, min: u8) {
        if matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::In, .. }) {
            self.push("(");
            self.expr(expr, SEQ);
            self.push(")");
        } else {
            self.expr(expr, min);
        }
    }

    fn args(&mut self, args: &[ExprOrSpread]) {
        self.push("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            if arg.spread {
                self.push("...");
            }
            self.expr(&arg.expr, ASSIGN);
        }
        self.push(")");
    }

    pub fn expr(&mut self, expr: &Expr, min: u8) {
        let wrap = prec(expr) < min;
        if wrap {
            self.push("(");
        }
        self.expr_inner(expr);
        if wrap {
            self.push(")");
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(ident) => self.push(&ident.name.text()),
            ExprKind::This => self.push("this"),
            ExprKind::Super => self.push("super"),
            ExprKind::Lit(lit) => self.lit(lit),
            ExprKind::Template(template) => {
                self.push("`");
                for (i, quasi) in template.quasis.iter().enumerate() {
                    self.push(quasi);
                    if let Some(e) = template.exprs.get(i) {
                        self.push("${");
                        self.expr(e, SEQ);
                        self.push("}");
                    }
                }
                self.push("`");
            }
            ExprKind::Array(elems) => {
                self.push("[");
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if let Some(elem) = elem {
                        if elem.spread {
                            self.push("...");
                        }
                        self.expr(&elem.expr, ASSIGN);
                    }
                }
                if matches!(elems.last(), Some(None)) {
                    self.push(",");
                }
                self.push("]");
            }
            ExprKind::Object(props) => {
                if props.is_empty() {
                    self.push("{}");
                    return;
                }
                self.push("{");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match prop {
                        Prop::KeyValue { key, value } => {
                            self.prop_key(key);
                            self.push(": ");
                            self.expr(value, ASSIGN);
                        }
                        Prop::Shorthand(ident) => self.push(&ident.name.text()),
                        Prop::Method {
                            key,
                            kind,
                            function,
                        } => self.method(key, *kind, function),
                    }
                }
                self.push("}");
            }
            ExprKind::Function(function) => self.function(function, "function"),
            ExprKind::Arrow(arrow) => self.arrow(arrow),
            ExprKind::Class(class) => self.class(class),
            ExprKind::Unary { op, arg } => {
                self.push(&op.to_string());
                let needs_space = op.is_keyword()
                    || matches!(
                        (op, &arg.kind),
                        (UnaryOp::Minus, ExprKind::Unary { op: UnaryOp::Minus, .. })
                            | (UnaryOp::Plus, ExprKind::Unary { op: UnaryOp::Plus, .. })
                            | (
                                UnaryOp::Minus,
                                ExprKind::Update {
                                    op: UpdateOp::Decrement,
                                    prefix: true,
                                    ..
                                }
                            )
                            | (
                                UnaryOp::Plus,
                                ExprKind::Update {
                                    op: UpdateOp::Increment,
                                    prefix: true,
                                    ..
                                }
                            )
                    );
                if needs_space {
                    self.push(" ");
                }
                self.expr(arg, UNARY);
            }
            ExprKind::Update { op, prefix, arg } => {
                if *prefix {
                    self.push(&op.to_string());
                    self.expr(arg, LHS);
                } else {
                    self.expr(arg, LHS);
                    self.push(&op.to_string());
                }
            }
            ExprKind::Binary { op, left, right } => {
                let p = binary_prec(*op);
                let (left_min, right_min) = if *op == BinaryOp::Exp {
                    (UPDATE, p)
                } else {
                    (p, p + 1)
                };
                self.binary_operand(*op, left, left_min);
                self.push(&format!(" {op} "));
                self.binary_operand(*op, right, right_min);
            }
            ExprKind::Assign { op, target, value } => {
                self.pat(target);
                self.push(&format!(" {op} "));
                self.expr(value, ASSIGN);
            }
            ExprKind::Cond { test, cons, alt } => {
                self.expr(test, COND + 1);
                self.push(" ? ");
                self.expr(cons, ASSIGN);
                self.push(" : ");
                self.expr(alt, ASSIGN);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee, CALL);
                self.args(args);
            }
            ExprKind::New { callee, args } => {
                self.push("new ");
                if contains_call(callee) {
                    self.push("(");
                    self.expr(callee, SEQ);
                    self.push(")");
                } else {
                    self.expr(callee, CALL);
                }
                self.args(args);
            }
            ExprKind::Member { object, prop } => {
                let bare_int = matches!(&object.kind, ExprKind::Lit(Lit::Num(raw))
                    if raw.bytes().all(|b| b.is_ascii_digit()));
                if bare_int {
                    self.push("(");
                    self.expr(object, SEQ);
                    self.push(")");
                } else {
                    self.expr(object, CALL);
                }
                match prop {
                    MemberProp::Name(name) if is_identifier_name(name) => {
                        self.push(".");
                        self.push(name);
                    }
                    MemberProp::Name(name) => {
                        self.push("[");
                        quote_str(name, &mut self.out);
                        self.push("]");
                    }
                    MemberProp::Computed(key) => {
                        self.push("[");
                        self.expr(key, SEQ);
                        self.push("]");
                    }
                }
            }
            ExprKind::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(item, ASSIGN);
                }
            }
            ExprKind::Paren(inner) => {
                self.push("(");
                self.expr(inner, SEQ);
                self.push(")");
            }
            ExprKind::Yield { arg, delegate } => {
                self.push("yield");
                if *delegate {
                    self.push("*");
                }
                if let Some(arg) = arg {
                    self.push(" ");
                    self.expr(arg, ASSIGN);
                }
            }
            ExprKind::Await(arg) => {
                self.push("await ");
                self.expr(arg, UNARY);
            }
        }
    }

    /// `??` cannot mix with `&&`/`||` without parentheses.
    fn binary_operand(&mut self, op: BinaryOp, operand: &Expr, min: u8) {
        let mixes_nullish = match &operand.kind {
            ExprKind::Binary { op: inner, .. } => {
                (op == BinaryOp::Nullish && matches!(inner, BinaryOp::And | BinaryOp::Or))
                    || (*inner == BinaryOp::Nullish && matches!(op, BinaryOp::And | BinaryOp::Or))
            }
            _ => false,
        };
        if mixes_nullish {
            self.push("(");
            self.expr(operand, SEQ);
            self.push(")");
        } else {
            self.expr(operand, min);
        }
    }

    fn lit(&mut self, lit: &Lit) {
        match lit {
            Lit::Num(raw) => self.push(raw),
            Lit::Str(value) => quote_str(value, &mut self.out),
            Lit::Bool(true) => self.push("true"),
            Lit::Bool(false) => self.push("false"),
            Lit::Null => self.push("null"),
            Lit::Regex { pattern, flags } => {
                self.push("/");
                self.push(pattern);
                self.push("/");
                self.push(flags);
            }
        }
    }
}

fn ends_with_open_if(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::If { alt: None, .. } => true,
        StmtKind::If { alt: Some(alt), .. } => ends_with_open_if(alt),
        StmtKind::While { body, .. }
        | StmtKind::For { body, .. }
        | StmtKind::ForEach { body, .. }
        | StmtKind::Labeled { body, .. } => ends_with_open_if(body),
        _ => false,
    }
}
