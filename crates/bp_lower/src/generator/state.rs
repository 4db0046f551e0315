//! States of a generator machine and their rendering.
//!
//! A machine renders to one dispatch loop:
//!
//! ```text
//! function($ctx) {
//!   while (true) switch ($ctx.state) {
//!     case 0: ...; $ctx.state = 2; return value;
//!     case 2: $ctx.maybeThrow(); ...; $ctx.state = -2; break;
//!     default: return $ctx.end();
//!   }
//! }
//! ```

use std::collections::VecDeque;

use bp_ast::factory::*;
use bp_ast::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

pub(crate) type StateId = i32;

pub(crate) const START_STATE: StateId = 0;
pub(crate) const END_STATE: StateId = -2;
pub(crate) const RETHROW_STATE: StateId = -3;

/// Label of the dispatch loop, for jumps out of nested loops and switches.
pub(crate) const MACHINE_LABEL: &str = "$__machine";

pub(crate) fn ctx() -> ExprRef {
    ident_expr("$ctx")
}

pub(crate) fn ctx_member(name: &str) -> ExprRef {
    member(ctx(), name)
}

pub(crate) fn ctx_call(name: &str, args: Vec<ExprRef>) -> StmtRef {
    expr_stmt(call(ctx_member(name), args))
}

pub(crate) fn state_lit(id: StateId) -> ExprRef {
    if id < 0 {
        unary(UnaryOp::Minus, num(-id))
    } else {
        num(id)
    }
}

/// `$ctx.state = id;`
pub(crate) fn set_state(id: StateId) -> StmtRef {
    expr_stmt(assign_to(ctx_member("state"), state_lit(id)))
}

/// How a state hands control on once its statements ran.
#[derive(Debug, Clone)]
pub(crate) enum Exit {
    /// `$ctx.state = next; break;`
    Jump(StateId),
    /// The statements end the state themselves.
    Done,
    /// `$ctx.state = test ? cons : alt; break;`
    Conditional {
        test: ExprRef,
        cons: StateId,
        alt: StateId,
    },
    /// A `switch` whose clauses jump, `None` being `default`.
    Switch {
        discriminant: ExprRef,
        clauses: Vec<(Option<ExprRef>, StateId)>,
    },
    /// `$ctx.state = next; return value;`
    Yield { value: ExprRef, next: StateId },
    /// `$ctx.state = next; return $ctx.yieldStar(iterable);`
    YieldStar { iterable: ExprRef, next: StateId },
}

#[derive(Debug, Clone)]
pub(crate) struct State {
    pub id: StateId,
    pub stmts: Vec<StmtRef>,
    pub exit: Exit,
}

fn swap(id: StateId, old: StateId, new: StateId) -> StateId {
    if id == old {
        new
    } else {
        id
    }
}

impl State {
    pub fn destinations(&self) -> Vec<StateId> {
        match &self.exit {
            Exit::Jump(next) | Exit::Yield { next, .. } | Exit::YieldStar { next, .. } => vec![*next],
            Exit::Done => vec![],
            Exit::Conditional { cons, alt, .. } => vec![*cons, *alt],
            Exit::Switch { clauses, .. } => clauses.iter().map(|(_, id)| *id).collect(),
        }
    }

    /// A copy with every mention of `old` replaced by `new`.
    pub fn replace_state(self, old: StateId, new: StateId) -> State {
        let exit = match self.exit {
            Exit::Jump(next) => Exit::Jump(swap(next, old, new)),
            Exit::Done => Exit::Done,
            Exit::Conditional { test, cons, alt } => Exit::Conditional {
                test,
                cons: swap(cons, old, new),
                alt: swap(alt, old, new),
            },
            Exit::Switch {
                discriminant,
                clauses,
            } => Exit::Switch {
                discriminant,
                clauses: clauses
                    .into_iter()
                    .map(|(test, id)| (test, swap(id, old, new)))
                    .collect(),
            },
            Exit::Yield { value, next } => Exit::Yield {
                value,
                next: swap(next, old, new),
            },
            Exit::YieldStar { iterable, next } => Exit::YieldStar {
                iterable,
                next: swap(next, old, new),
            },
        };
        State {
            id: swap(self.id, old, new),
            stmts: self.stmts,
            exit,
        }
    }

    /// Folds `first`, whose only exit is a jump here, into this state.
    pub fn reverse_merge(self, first: State) -> State {
        debug_assert!(matches!(first.exit, Exit::Jump(next) if next == self.id));
        let mut stmts = first.stmts;
        stmts.extend(self.stmts);
        State {
            id: first.id,
            stmts,
            exit: self.exit,
        }
    }

    fn render(&self) -> Vec<StmtRef> {
        let mut out = self.stmts.clone();
        match &self.exit {
            Exit::Jump(next) => {
                out.push(set_state(*next));
                out.push(break_stmt(None));
            }
            Exit::Done => {}
            Exit::Conditional { test, cons, alt } => {
                out.push(expr_stmt(assign_to(
                    ctx_member("state"),
                    cond(test.clone(), state_lit(*cons), state_lit(*alt)),
                )));
                out.push(break_stmt(None));
            }
            Exit::Switch {
                discriminant,
                clauses,
            } => {
                let cases = clauses
                    .iter()
                    .map(|(test, id)| SwitchCase {
                        test: test.clone(),
                        body: vec![set_state(*id), break_stmt(None)],
                    })
                    .collect();
                out.push(Stmt::synthetic(StmtKind::Switch {
                    discriminant: discriminant.clone(),
                    cases,
                }));
                out.push(break_stmt(None));
            }
            Exit::Yield { value, next } => {
                out.push(set_state(*next));
                out.push(return_stmt(Some(value.clone())));
            }
            Exit::YieldStar { iterable, next } => {
                out.push(set_state(*next));
                out.push(return_stmt(Some(call(
                    ctx_member("yieldStar"),
                    vec![iterable.clone()],
                ))));
            }
        }
        out
    }
}

pub(crate) struct Machine {
    pub states: Vec<State>,
    /// States named by a value in some statement rather than by an exit.
    /// They keep their ids and are never merged away.
    pub pinned: FxHashSet<StateId>,
    pub has_finally: bool,
    /// Whether some jump continues the dispatch loop by its label.
    pub labeled: bool,
}

impl Machine {
    pub fn optimize(&mut self) {
        self.remove_empty();
        self.prune();
        self.merge_chains();
        trace!(states = self.states.len(), "optimized generator machine");
    }

    /// Removes states with no statements that only jump elsewhere.
    fn remove_empty(&mut self) {
        loop {
            let found = self.states.iter().position(|s| {
                s.id != START_STATE
                    && s.stmts.is_empty()
                    && !self.pinned.contains(&s.id)
                    && matches!(s.exit, Exit::Jump(next) if next != s.id)
            });
            let Some(pos) = found else {
                return;
            };
            let removed = self.states.remove(pos);
            let Exit::Jump(next) = removed.exit else {
                unreachable!("only jumping states are removed");
            };
            self.states = std::mem::take(&mut self.states)
                .into_iter()
                .map(|s| s.replace_state(removed.id, next))
                .collect();
        }
    }

    /// Drops states no path from the start or a pinned state reaches.
    fn prune(&mut self) {
        let by_id: FxHashMap<StateId, &State> = self.states.iter().map(|s| (s.id, s)).collect();
        let mut seen: FxHashSet<StateId> = FxHashSet::default();
        let mut queue: VecDeque<StateId> = std::iter::once(START_STATE)
            .chain(self.pinned.iter().copied())
            .collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(state) = by_id.get(&id) {
                queue.extend(state.destinations());
            }
        }
        self.states.retain(|s| seen.contains(&s.id));
    }

    /// Folds a state into the jumping state that is its only predecessor.
    fn merge_chains(&mut self) {
        loop {
            let mut preds: FxHashMap<StateId, Vec<StateId>> = FxHashMap::default();
            for state in &self.states {
                for dest in state.destinations() {
                    preds.entry(dest).or_default().push(state.id);
                }
            }
            let pair = self.states.iter().find_map(|q| {
                if q.id == START_STATE || self.pinned.contains(&q.id) {
                    return None;
                }
                let [p] = preds.get(&q.id)?.as_slice() else {
                    return None;
                };
                let first = self.states.iter().find(|s| s.id == *p)?;
                matches!(first.exit, Exit::Jump(next) if next == q.id && *p != q.id).then_some((*p, q.id))
            });
            let Some((p, q)) = pair else {
                return;
            };
            let (Some(pi), Some(qi)) = (
                self.states.iter().position(|s| s.id == p),
                self.states.iter().position(|s| s.id == q),
            ) else {
                return;
            };
            let second = self.states[qi].clone();
            let first = std::mem::replace(&mut self.states[pi], second.clone());
            self.states[pi] = second.reverse_merge(first);
            self.states.remove(qi);
        }
    }

    /// `function($ctx) { while (true) switch ($ctx.state) { ... } }`
    pub fn render(mut self) -> ExprRef {
        self.states.sort_by_key(|s| s.id);
        let mut cases: Vec<SwitchCase> = self
            .states
            .iter()
            .map(|s| SwitchCase {
                test: Some(state_lit(s.id)),
                body: s.render(),
            })
            .collect();
        if self.has_finally {
            cases.push(SwitchCase {
                test: Some(state_lit(RETHROW_STATE)),
                body: vec![throw_stmt(ctx_member("storedException"))],
            });
        }
        cases.push(SwitchCase {
            test: None,
            body: vec![return_stmt(Some(call(ctx_member("end"), vec![])))],
        });
        let dispatch = Stmt::synthetic(StmtKind::Switch {
            discriminant: ctx_member("state"),
            cases,
        });
        let mut machine = Stmt::synthetic(StmtKind::While {
            test: bool_lit(true),
            body: dispatch,
        });
        if self.labeled {
            machine = Stmt::synthetic(StmtKind::Labeled {
                label: MACHINE_LABEL.into(),
                body: machine,
            });
        }
        anon_function(vec![ident_pat("$ctx")], vec![machine])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(id: StateId, stmts: Vec<StmtRef>, next: StateId) -> State {
        State {
            id,
            stmts,
            exit: Exit::Jump(next),
        }
    }

    fn machine(states: Vec<State>) -> Machine {
        Machine {
            states,
            pinned: FxHashSet::default(),
            has_finally: false,
            labeled: false,
        }
    }

    fn ids(m: &Machine) -> Vec<StateId> {
        let mut ids: Vec<_> = m.states.iter().map(|s| s.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn replace_state_builds_a_new_conditional() {
        let state = State {
            id: 1,
            stmts: vec![],
            exit: Exit::Conditional {
                test: ident_expr("x"),
                cons: 2,
                alt: 3,
            },
        };
        let replaced = state.clone().replace_state(3, 7);
        assert_eq!(replaced.destinations(), [2, 7]);
        assert_eq!(state.destinations(), [2, 3]);
    }

    #[test]
    fn empty_states_are_bypassed() {
        let mut m = machine(vec![
            linear(0, vec![expr_stmt(ident_expr("a"))], 1),
            linear(1, vec![], 2),
            State {
                id: 2,
                stmts: vec![],
                exit: Exit::Yield {
                    value: num(1),
                    next: END_STATE,
                },
            },
        ]);
        m.remove_empty();
        assert_eq!(ids(&m), [0, 2]);
        assert_eq!(m.states[0].destinations(), [2]);
    }

    #[test]
    fn pinned_states_survive() {
        let mut m = machine(vec![linear(0, vec![], 1), linear(1, vec![], END_STATE)]);
        m.pinned.insert(1);
        m.optimize();
        assert_eq!(ids(&m), [0, 1]);
    }

    #[test]
    fn single_predecessor_chains_merge() {
        let mut m = machine(vec![
            linear(0, vec![expr_stmt(ident_expr("a"))], 1),
            State {
                id: 1,
                stmts: vec![expr_stmt(ident_expr("b"))],
                exit: Exit::Conditional {
                    test: ident_expr("c"),
                    cons: 0,
                    alt: END_STATE,
                },
            },
        ]);
        m.optimize();
        assert_eq!(ids(&m), [0]);
        assert_eq!(m.states[0].stmts.len(), 2);
        assert!(matches!(m.states[0].exit, Exit::Conditional { cons: 0, .. }));
    }

    #[test]
    fn shared_targets_do_not_merge() {
        let mut m = machine(vec![
            State {
                id: 0,
                stmts: vec![],
                exit: Exit::Conditional {
                    test: ident_expr("c"),
                    cons: 1,
                    alt: 2,
                },
            },
            linear(1, vec![expr_stmt(ident_expr("a"))], 2),
            linear(2, vec![expr_stmt(ident_expr("b"))], END_STATE),
        ]);
        m.optimize();
        assert_eq!(ids(&m), [0, 1, 2]);
    }

    #[test]
    fn unreachable_states_are_dropped() {
        let mut m = machine(vec![
            linear(0, vec![expr_stmt(ident_expr("a"))], END_STATE),
            linear(5, vec![expr_stmt(ident_expr("dead"))], 0),
        ]);
        m.optimize();
        assert_eq!(ids(&m), [0]);
    }

    #[test]
    fn renders_a_dispatch_loop() {
        let m = machine(vec![State {
            id: 0,
            stmts: vec![],
            exit: Exit::Yield {
                value: num(1),
                next: END_STATE,
            },
        }]);
        assert_eq!(
            bp_codegen::print_expr(&m.render()),
            bp_codegen::print_expr(
                &bp_parser::parse_expr(
                    "function($ctx) { while (true) switch ($ctx.state) { \
                     case 0: $ctx.state = -2; return 1; default: return $ctx.end(); } }"
                )
                .expect("parse")
            )
        );
    }
}
