//! Gives every temporary its final name.
//!
//! Runs once, last, over the whole program. Each function-like scope
//! (script, module, function, arrow, catch clause) names the temporaries
//! bound in it, in declaration order:
//!
//! - the stem itself when nothing visible uses it
//! - otherwise `_stem2`, `_stem3`, ... (no extra `_` when the stem has one)
//!
//! A candidate is taken when an enclosing scope already resolved a temporary
//! to it, when a real name is bound in the scope, when it is free in the
//! scope, or when a scope between the binding and a use of the temporary
//! binds it. A token bound in several scopes (a loop variable passed into
//! its per-iteration closure) keeps the name chosen by the outermost one.

use std::rc::Rc;

use bp_ast::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::scope::{ScopeId, ScopeTree};
use crate::transform::{self, Transformer};

pub fn rename_temporaries(program: &Program) -> Program {
    let tree = ScopeTree::build(program);
    let mut renamer = Renamer {
        tree: &tree,
        renames: FxHashMap::default(),
        used: Vec::new(),
    };
    renamer.enter(ScopeId::ROOT);
    let out = transform::walk_program(&mut renamer, program);
    renamer.used.pop();
    out
}

struct Renamer<'t> {
    tree: &'t ScopeTree,
    renames: FxHashMap<TempToken, Atom>,
    /// Names resolved by each enclosing function-like scope.
    used: Vec<FxHashSet<Atom>>,
}

impl Renamer<'_> {
    fn is_used(&self, name: &str) -> bool {
        self.used.iter().any(|level| level.contains(name))
    }

    fn enter(&mut self, scope: ScopeId) {
        let tree = self.tree;
        let bound = tree.region_bindings(scope, true);
        let temps: Vec<&TempToken> = tree
            .region_bindings(scope, false)
            .into_iter()
            .filter_map(Name::as_temp)
            .filter(|token| !self.renames.contains_key(*token))
            .collect();
        self.used.push(FxHashSet::default());
        if temps.is_empty() {
            return;
        }

        let mut taken: FxHashSet<&str> = bound.iter().filter_map(|n| n.as_ident()).collect();
        let free = tree.free_names(scope);
        taken.extend(free.iter().filter_map(Name::as_ident));

        for token in temps {
            let shadows = self.shadowing_names(scope, token);
            let stem = token.stem();
            let prefix = if stem.starts_with('_') { "" } else { "_" };
            let mut candidate = stem.to_string();
            let mut n = 2;
            while self.is_used(&candidate)
                || taken.contains(candidate.as_str())
                || shadows.contains(candidate.as_str())
            {
                candidate = format!("{prefix}{stem}{n}");
                n += 1;
            }
            trace!(id = token.id(), name = %candidate, "resolved temporary");
            let name: Atom = candidate.into();
            if let Some(level) = self.used.last_mut() {
                level.insert(name.clone());
            }
            self.renames.insert(token.clone(), name);
        }
    }

    /// Real names bound between `scope` and any use of `token` below it.
    fn shadowing_names(&self, scope: ScopeId, token: &TempToken) -> FxHashSet<&'_ str> {
        let name = Name::Temp(token.clone());
        let mut out = FxHashSet::default();
        for (from, reference) in self.tree.refs_within(scope) {
            if reference.name != name {
                continue;
            }
            let mut cur = Some(from);
            while let Some(id) = cur.filter(|&id| id != scope) {
                out.extend(
                    self.tree
                        .scope(id)
                        .bindings
                        .keys()
                        .filter_map(Name::as_ident),
                );
                cur = self.tree.scope(id).parent;
            }
        }
        out
    }

    fn leave(&mut self) {
        self.used.pop();
    }
}

impl Transformer for Renamer<'_> {
    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        let Some(scope) = self.tree.node_scope(&**function) else {
            return transform::walk_function(self, function);
        };
        self.enter(scope);
        let out = transform::walk_function(self, function);
        self.leave();
        out
    }

    fn transform_arrow(&mut self, arrow: &Rc<Arrow>) -> Rc<Arrow> {
        let Some(scope) = self.tree.node_scope(&**arrow) else {
            return transform::walk_arrow(self, arrow);
        };
        self.enter(scope);
        let out = transform::walk_arrow(self, arrow);
        self.leave();
        out
    }

    fn transform_catch(&mut self, catch: &Catch) -> Catch {
        let Some(scope) = self.tree.node_scope(catch) else {
            return transform::walk_catch(self, catch);
        };
        self.enter(scope);
        let out = transform::walk_catch(self, catch);
        self.leave();
        out
    }

    fn transform_ident(&mut self, ident: &Ident) -> Ident {
        match &ident.name {
            Name::Temp(token) => match self.renames.get(token) {
                Some(name) => Ident::new(ident.span, Name::Ident(name.clone())),
                None => ident.clone(),
            },
            Name::Ident(_) => ident.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use bp_ast::factory::*;

    use super::*;
    use crate::temps::TempAllocator;

    fn print(program: &Program) -> String {
        bp_codegen::print_program(program)
    }

    fn normalize(source: &str) -> String {
        print(&bp_parser::parse_script(source).expect("parse"))
    }

    #[test]
    fn stem_is_used_when_free() {
        let mut alloc = TempAllocator::new();
        let t = alloc.allocate("_ref");
        let program = Program {
            kind: ProgramKind::Script,
            body: vec![
                var_one(VarKind::Var, temp_pat(&t), Some(ident_expr("a"))),
                expr_stmt(temp_expr(&t)),
            ],
        };
        assert_eq!(print(&rename_temporaries(&program)), normalize("var _ref = a; _ref;"));
    }

    #[test]
    fn collisions_get_increasing_suffixes() {
        let mut alloc = TempAllocator::new();
        let a = alloc.allocate("x");
        let b = alloc.allocate("x");
        let program = Program {
            kind: ProgramKind::Script,
            body: vec![
                var_one(VarKind::Var, temp_pat(&a), Some(num(1))),
                var_one(VarKind::Var, temp_pat(&b), Some(num(2))),
                expr_stmt(ident_expr("x")),
            ],
        };
        assert_eq!(
            print(&rename_temporaries(&program)),
            normalize("var _x2 = 1; var _x3 = 2; x;")
        );
    }

    #[test]
    fn siblings_may_share_nested_may_not() {
        let mut alloc = TempAllocator::new();
        let f = |alloc: &mut TempAllocator, inner: Vec<StmtRef>| {
            let t = alloc.allocate("_ref");
            let mut body = vec![var_one(VarKind::Var, temp_pat(&t), Some(num(0)))];
            body.extend(inner);
            body.push(return_stmt(Some(temp_expr(&t))));
            expr_stmt(anon_function(vec![], body))
        };
        let inner = f(&mut alloc, vec![]);
        let outer = f(&mut alloc, vec![inner]);
        let sibling = f(&mut alloc, vec![]);
        let program = Program {
            kind: ProgramKind::Script,
            body: vec![outer, sibling],
        };
        assert_eq!(
            print(&rename_temporaries(&program)),
            normalize(
                "(function() { var _ref = 0; (function() { var _ref2 = 0; return _ref2; }); return _ref; });\n\
                 (function() { var _ref = 0; return _ref; });"
            )
        );
    }

    #[test]
    fn inner_binding_between_use_and_declaration_is_avoided() {
        let mut alloc = TempAllocator::new();
        let t = alloc.allocate("_ref");
        let inner = anon_function(
            vec![],
            vec![
                var_one(VarKind::Var, ident_pat("_ref"), None),
                return_stmt(Some(temp_expr(&t))),
            ],
        );
        let program = Program {
            kind: ProgramKind::Script,
            body: vec![
                var_one(VarKind::Var, temp_pat(&t), Some(inner)),
            ],
        };
        assert_eq!(
            print(&rename_temporaries(&program)),
            normalize("var _ref2 = function() { var _ref; return _ref2; };")
        );
    }

    #[test]
    fn renamed_pattern_field_collapses_to_shorthand() {
        let mut alloc = TempAllocator::new();
        let t = alloc.allocate("x");
        let pat = Rc::new(Pat::Object(ObjectPat {
            span: Span::DUMMY,
            props: vec![ObjectPatProp {
                key: PropKey::Ident("x".into()),
                value: PatElem {
                    target: temp_pat(&t),
                    default: None,
                },
            }],
        }));
        let program = Program {
            kind: ProgramKind::Script,
            body: vec![var_one(VarKind::Var, pat, Some(ident_expr("o")))],
        };
        assert_eq!(print(&rename_temporaries(&program)), "var {x} = o;\n");
    }
}
