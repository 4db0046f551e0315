//! Turns a generator body into machine states.
//!
//! The builder keeps one open state that statements are appended to.
//! Control flow closes it with an exit and opens the states the exit names.
//! Statements with no suspend point are emitted whole, with any `return`,
//! `break` or `continue` that leaves them rewritten into a state jump.
//!
//! `try` bodies that suspend register their handlers with the runtime:
//!
//! ```text
//! try { yield 1; } finally { f(); }
//!   →  case 0: $ctx.pushTry(null, 2); $ctx.state = 4; return 1;
//!      case 1: $ctx.state = -2; break;
//!      case 2: $ctx.popTry(); f(); $ctx.state = $ctx.finallyFallThrough; break;
//!      case 4: $ctx.maybeThrow(); $ctx.finallyFallThrough = 1; $ctx.state = 2; break;
//!      case -3: throw $ctx.storedException;
//! ```

use std::rc::Rc;

use bp_ast::factory::*;
use bp_ast::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::explode::{is_trivial, Exploder};
use super::state::*;
use crate::diagnostics::Reporter;
use crate::runtime::Helper;
use crate::temps::TempVars;
use crate::transform::{self, Transformer};
use crate::util::{expr_contains_suspend, stmt_contains_suspend};

#[derive(Debug, Clone, Copy)]
enum Region {
    Catch,
    Finally { handler: StateId },
}

/// A statement `break`/`continue` can leave.
struct Target {
    labels: Vec<Atom>,
    break_to: StateId,
    /// Set for loops.
    continue_to: Option<StateId>,
    /// Loops and switches take an unlabeled `break`; labeled blocks do not.
    breakable: bool,
}

pub(super) struct Builder<'t, 'a> {
    temps: &'t mut TempVars<'a>,
    reporter: &'t mut Reporter,
    /// Catch parameters to declare in the enclosing function.
    hoisted: &'t mut Vec<Ident>,
    next_id: StateId,
    states: Vec<State>,
    open: Option<(StateId, Vec<StmtRef>)>,
    regions: Vec<Region>,
    /// Indices into `regions` enclosing the statement being built.
    stack: Vec<usize>,
    /// The region stack each state was allocated under.
    contexts: FxHashMap<StateId, Vec<usize>>,
    targets: Vec<Target>,
    pending_labels: Vec<Atom>,
    pinned: FxHashSet<StateId>,
    labeled: bool,
}

fn pop_try() -> StmtRef {
    ctx_call("popTry", vec![])
}

fn maybe_throw() -> StmtRef {
    ctx_call("maybeThrow", vec![])
}

impl<'t, 'a> Builder<'t, 'a> {
    pub fn new(temps: &'t mut TempVars<'a>, reporter: &'t mut Reporter, hoisted: &'t mut Vec<Ident>) -> Self {
        Self {
            temps,
            reporter,
            hoisted,
            next_id: START_STATE + 1,
            states: Vec::new(),
            open: Some((START_STATE, Vec::new())),
            regions: Vec::new(),
            stack: Vec::new(),
            contexts: FxHashMap::default(),
            targets: Vec::new(),
            pending_labels: Vec::new(),
            pinned: FxHashSet::default(),
            labeled: false,
        }
    }

    pub fn build(mut self, body: &[StmtRef]) -> Machine {
        for stmt in body {
            self.stmt(stmt);
        }
        self.jump(END_STATE);
        self.open = None;
        let has_finally = self.regions.iter().any(|r| matches!(r, Region::Finally { .. }));
        let mut machine = Machine {
            states: self.states,
            pinned: self.pinned,
            has_finally,
            labeled: self.labeled,
        };
        machine.optimize();
        machine
    }

    // -----------------------------------------------------------------------
    // States
    // -----------------------------------------------------------------------

    fn alloc(&mut self) -> StateId {
        let id = self.next_id;
        self.next_id += 1;
        self.contexts.insert(id, self.stack.clone());
        id
    }

    fn context(&self, id: StateId) -> Vec<usize> {
        self.contexts.get(&id).cloned().unwrap_or_default()
    }

    fn emit(&mut self, stmt: StmtRef) {
        match &mut self.open {
            Some((_, stmts)) => stmts.push(stmt),
            None => unreachable!("statements are only emitted into an open state"),
        }
    }

    fn close(&mut self, exit: Exit) {
        let Some((id, stmts)) = self.open.take() else {
            unreachable!("no open state to close");
        };
        self.states.push(State { id, stmts, exit });
    }

    /// Opens `id`, falling through to it from the open state, if any.
    fn start(&mut self, id: StateId) {
        if self.open.is_some() {
            self.close(Exit::Jump(id));
        }
        self.open = Some((id, Vec::new()));
    }

    /// After a jump the code that follows is unreachable until the next
    /// state starts; it still needs somewhere to go.
    fn open_unreachable(&mut self) {
        let id = self.alloc();
        self.open = Some((id, Vec::new()));
    }

    /// Statements leaving the regions between `from` and `dest`, and the
    /// state to go to next.
    fn crossing(&mut self, from: &[usize], dest: StateId) -> (Vec<StmtRef>, StateId) {
        let dest_context = self.context(dest);
        let mut stmts = Vec::new();
        let mut depth = from.len();
        while !dest_context.starts_with(&from[..depth]) {
            depth -= 1;
            match self.regions[from[depth]] {
                Region::Catch => stmts.push(pop_try()),
                Region::Finally { handler } => {
                    let outer = &from[..depth];
                    let after = if dest_context.starts_with(outer) {
                        dest
                    } else {
                        self.trampoline(outer.to_vec(), dest)
                    };
                    self.pinned.insert(after);
                    stmts.push(expr_stmt(assign_to(ctx_member("finallyFallThrough"), state_lit(after))));
                    return (stmts, handler);
                }
            }
        }
        (stmts, dest)
    }

    /// A state outside a `finally` that carries on to `dest` once the
    /// handler has run.
    fn trampoline(&mut self, context: Vec<usize>, dest: StateId) -> StateId {
        let id = self.next_id;
        self.next_id += 1;
        self.contexts.insert(id, context.clone());
        let (stmts, next) = self.crossing(&context, dest);
        self.states.push(State {
            id,
            stmts,
            exit: Exit::Jump(next),
        });
        id
    }

    /// Closes the open state with a jump to `dest`.
    fn jump(&mut self, dest: StateId) {
        let from = self.stack.clone();
        let (stmts, next) = self.crossing(&from, dest);
        for stmt in stmts {
            self.emit(stmt);
        }
        self.close(Exit::Jump(next));
        self.open_unreachable();
    }

    /// A jump from inside an ordinary statement. `nested` is set when a loop
    /// or switch of that statement sits between the jump and the machine.
    fn embedded_jump(&mut self, dest: StateId, nested: bool) -> Vec<StmtRef> {
        let from = self.stack.clone();
        let (mut stmts, next) = self.crossing(&from, dest);
        self.pinned.insert(next);
        stmts.push(set_state(next));
        if nested {
            self.labeled = true;
            stmts.push(continue_stmt(Some(MACHINE_LABEL)));
        } else {
            stmts.push(break_stmt(None));
        }
        stmts
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn stmt(&mut self, stmt: &StmtRef) {
        let labels = std::mem::take(&mut self.pending_labels);
        match &stmt.kind {
            StmtKind::Empty => {}
            StmtKind::Return(arg) => self.return_stmt(arg.as_ref()),
            StmtKind::Break(label) => self.break_or_continue(stmt, label.as_ref(), false),
            StmtKind::Continue(label) => self.break_or_continue(stmt, label.as_ref(), true),
            _ if !stmt_contains_suspend(stmt) => {
                let stmt = self.rewrite_jumps(stmt);
                self.emit(stmt);
            }
            StmtKind::Expr(expr) => self.expr_stmt(expr),
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.stmt(s);
                }
            }
            StmtKind::If { test, cons, alt } => self.if_stmt(test, cons, alt.as_ref()),
            StmtKind::While { test, body } => self.while_stmt(labels, test, body),
            StmtKind::DoWhile { body, test } => self.do_while_stmt(labels, body, test),
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.for_stmt(labels, init.as_ref(), test.as_ref(), update.as_ref(), body),
            StmtKind::ForEach {
                kind,
                head,
                right,
                body,
            } => self.for_each_stmt(stmt, labels, *kind, head, right, body),
            StmtKind::Switch {
                discriminant,
                cases,
            } => self.switch_stmt(stmt, labels, discriminant, cases),
            StmtKind::Labeled { label, body } => {
                let mut labels = labels;
                labels.push(label.clone());
                if body.is_loop() || matches!(body.kind, StmtKind::Switch { .. } | StmtKind::Labeled { .. }) {
                    self.pending_labels = labels;
                    self.stmt(body);
                } else {
                    let after = self.alloc();
                    self.targets.push(Target {
                        labels,
                        break_to: after,
                        continue_to: None,
                        breakable: false,
                    });
                    self.stmt(body);
                    self.targets.pop();
                    self.start(after);
                }
            }
            StmtKind::Throw(arg) => {
                let arg = self.explode(arg);
                self.emit(Stmt::new(stmt.span, StmtKind::Throw(arg)));
                self.close(Exit::Done);
                self.open_unreachable();
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => self.try_stmt(block, handler.as_ref(), finalizer.as_deref()),
            _ => {
                self.reporter
                    .error(stmt.span, "yield is not supported in this position of a generator");
                self.emit(stmt.clone());
            }
        }
    }

    fn explode(&mut self, expr: &ExprRef) -> ExprRef {
        if !expr_contains_suspend(expr) {
            return expr.clone();
        }
        let mut exploder = Exploder::new(&mut *self.temps);
        let value = exploder.explode(expr);
        for stmt in exploder.finish() {
            self.stmt(&stmt);
        }
        value
    }

    /// Closes the open state on a suspension and opens the resume state.
    fn suspend(&mut self, arg: Option<&ExprRef>, delegate: bool, target: Option<&PatRef>) {
        let next = self.alloc();
        let value = arg.cloned().unwrap_or_else(void_zero);
        self.close(if delegate {
            Exit::YieldStar { iterable: value, next }
        } else {
            Exit::Yield { value, next }
        });
        self.open = Some((next, vec![maybe_throw()]));
        if let Some(target) = target {
            self.emit(expr_stmt(assign(target.clone(), ctx_member("sent"))));
        }
    }

    fn expr_stmt(&mut self, expr: &ExprRef) {
        match &expr.unparen().kind {
            ExprKind::Yield { arg, delegate }
                if arg.as_ref().map_or(true, |a| !expr_contains_suspend(a)) =>
            {
                self.suspend(arg.as_ref(), *delegate, None);
            }
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } if matches!(**target, Pat::Ident(_)) => match &value.unparen().kind {
                ExprKind::Yield { arg, delegate }
                    if arg.as_ref().map_or(true, |a| !expr_contains_suspend(a)) =>
                {
                    self.suspend(arg.as_ref(), *delegate, Some(target));
                }
                _ => self.exploded_stmt(expr),
            },
            _ => self.exploded_stmt(expr),
        }
    }

    fn exploded_stmt(&mut self, expr: &ExprRef) {
        let value = self.explode(expr);
        if !is_trivial(&value) {
            self.emit(expr_stmt(value));
        }
    }

    fn return_stmt(&mut self, arg: Option<&ExprRef>) {
        if let Some(arg) = arg {
            let value = match &arg.unparen().kind {
                ExprKind::Yield { arg: inner, delegate }
                    if inner.as_ref().map_or(true, |a| !expr_contains_suspend(a)) =>
                {
                    self.suspend(inner.as_ref(), *delegate, None);
                    ctx_member("sent")
                }
                _ => self.explode(arg),
            };
            self.emit(expr_stmt(assign_to(ctx_member("returnValue"), value)));
        }
        self.jump(END_STATE);
    }

    fn find_target(&self, label: Option<&Atom>, is_continue: bool) -> Option<StateId> {
        self.targets.iter().rev().find_map(|t| {
            let matches = match label {
                Some(label) => t.labels.contains(label),
                None if is_continue => t.continue_to.is_some(),
                None => t.breakable,
            };
            if !matches {
                return None;
            }
            if is_continue {
                t.continue_to
            } else {
                Some(t.break_to)
            }
        })
    }

    fn break_or_continue(&mut self, stmt: &StmtRef, label: Option<&Atom>, is_continue: bool) {
        match self.find_target(label, is_continue) {
            Some(dest) => self.jump(dest),
            None => {
                self.reporter.error(stmt.span, "jump target not found in generator");
                self.emit(stmt.clone());
            }
        }
    }

    fn if_stmt(&mut self, test: &ExprRef, cons: &StmtRef, alt: Option<&StmtRef>) {
        let test = self.explode(test);
        let cons_id = self.alloc();
        let alt_id = alt.map(|_| self.alloc());
        let after = self.alloc();
        self.close(Exit::Conditional {
            test,
            cons: cons_id,
            alt: alt_id.unwrap_or(after),
        });
        self.start(cons_id);
        self.stmt(cons);
        if let (Some(alt), Some(alt_id)) = (alt, alt_id) {
            self.jump(after);
            self.start(alt_id);
            self.stmt(alt);
        }
        self.start(after);
    }

    fn loop_body(&mut self, labels: Vec<Atom>, body: &StmtRef, break_to: StateId, continue_to: StateId) {
        self.targets.push(Target {
            labels,
            break_to,
            continue_to: Some(continue_to),
            breakable: true,
        });
        self.stmt(body);
        self.targets.pop();
    }

    fn while_stmt(&mut self, labels: Vec<Atom>, test: &ExprRef, body: &StmtRef) {
        let head = self.alloc();
        let body_id = self.alloc();
        let after = self.alloc();
        self.start(head);
        let test = self.explode(test);
        self.close(Exit::Conditional {
            test,
            cons: body_id,
            alt: after,
        });
        self.start(body_id);
        self.loop_body(labels, body, after, head);
        self.jump(head);
        self.start(after);
    }

    fn do_while_stmt(&mut self, labels: Vec<Atom>, body: &StmtRef, test: &ExprRef) {
        let body_id = self.alloc();
        let cond_id = self.alloc();
        let after = self.alloc();
        self.start(body_id);
        self.loop_body(labels, body, after, cond_id);
        self.start(cond_id);
        let test = self.explode(test);
        self.close(Exit::Conditional {
            test,
            cons: body_id,
            alt: after,
        });
        self.start(after);
    }

    fn for_stmt(
        &mut self,
        labels: Vec<Atom>,
        init: Option<&ForInit>,
        test: Option<&ExprRef>,
        update: Option<&ExprRef>,
        body: &StmtRef,
    ) {
        match init {
            Some(ForInit::Expr(e)) => self.expr_stmt(e),
            Some(ForInit::Var(decl)) => {
                unreachable!("declarations are hoisted before the machine is built: {decl:?}")
            }
            None => {}
        }
        let head = self.alloc();
        let body_id = self.alloc();
        let update_id = self.alloc();
        let after = self.alloc();
        self.start(head);
        if let Some(test) = test {
            let test = self.explode(test);
            self.close(Exit::Conditional {
                test,
                cons: body_id,
                alt: after,
            });
        }
        self.start(body_id);
        self.loop_body(labels, body, after, update_id);
        self.start(update_id);
        if let Some(update) = update {
            self.expr_stmt(update);
        }
        self.jump(head);
        self.start(after);
    }

    fn for_each_stmt(
        &mut self,
        stmt: &StmtRef,
        labels: Vec<Atom>,
        kind: ForEachKind,
        head: &ForHead,
        right: &ExprRef,
        body: &StmtRef,
    ) {
        let target = match head {
            ForHead::Pat(pat) => pat.clone(),
            ForHead::Var(decl) => {
                unreachable!("declarations are hoisted before the machine is built: {decl:?}")
            }
        };
        let right = self.explode(right);
        let lowered = match kind {
            ForEachKind::Of => {
                // _iter = right[Symbol.iterator](); for (; !(_step = _iter.next()).done;) { x = _step.value; ... }
                let iter = self.temps.add_var("_iter");
                let step = self.temps.add_var("_step");
                let method = index(
                    right,
                    Helper::ToProperty.call(vec![member(ident_expr("Symbol"), "iterator")]),
                );
                self.emit(expr_stmt(assign(temp_pat(&iter), call(method, vec![]))));
                let next = assign(temp_pat(&step), call(member(temp_expr(&iter), "next"), vec![]));
                Stmt::new(
                    stmt.span,
                    StmtKind::For {
                        init: None,
                        test: Some(not(member(next, "done"))),
                        update: None,
                        body: block(vec![
                            expr_stmt(assign(target, member(temp_expr(&step), "value"))),
                            body.clone(),
                        ]),
                    },
                )
            }
            ForEachKind::In => {
                // The keys are collected up front; a key deleted during the
                // loop is skipped when its turn comes.
                let keys = self.temps.add_var("_keys");
                let object = self.temps.add_var("_obj");
                let key = self.temps.add_var("_key");
                let i = self.temps.add_var("_i");
                self.emit(expr_stmt(assign(temp_pat(&keys), array(vec![]))));
                self.emit(expr_stmt(assign(temp_pat(&object), right)));
                self.emit(Stmt::synthetic(StmtKind::ForEach {
                    kind: ForEachKind::In,
                    head: ForHead::Pat(temp_pat(&key)),
                    right: temp_expr(&object),
                    body: expr_stmt(call(member(temp_expr(&keys), "push"), vec![temp_expr(&key)])),
                }));
                Stmt::new(
                    stmt.span,
                    StmtKind::For {
                        init: Some(ForInit::Expr(assign(temp_pat(&i), num(0)))),
                        test: Some(binary(BinaryOp::Lt, temp_expr(&i), member(temp_expr(&keys), "length"))),
                        update: Some(Expr::synthetic(ExprKind::Update {
                            op: UpdateOp::Increment,
                            prefix: false,
                            arg: temp_expr(&i),
                        })),
                        body: block(vec![
                            expr_stmt(assign(temp_pat(&key), index(temp_expr(&keys), temp_expr(&i)))),
                            if_stmt(
                                not(binary(BinaryOp::In, temp_expr(&key), temp_expr(&object))),
                                continue_stmt(None),
                                None,
                            ),
                            expr_stmt(assign(target, temp_expr(&key))),
                            body.clone(),
                        ]),
                    },
                )
            }
            ForEachKind::On => {
                self.reporter
                    .error(stmt.span, "for-on loops containing yield are not supported");
                self.emit(stmt.clone());
                return;
            }
        };
        self.pending_labels = labels;
        self.stmt(&lowered);
    }

    fn switch_stmt(&mut self, stmt: &StmtRef, labels: Vec<Atom>, discriminant: &ExprRef, cases: &[SwitchCase]) {
        if cases
            .iter()
            .any(|c| c.test.as_ref().is_some_and(|t| expr_contains_suspend(t)))
        {
            self.reporter
                .error(stmt.span, "yield in a switch case label is not supported");
            self.emit(stmt.clone());
            return;
        }
        let discriminant = self.explode(discriminant);
        let ids: Vec<StateId> = cases.iter().map(|_| self.alloc()).collect();
        let after = self.alloc();
        let mut clauses: Vec<(Option<ExprRef>, StateId)> =
            cases.iter().zip(&ids).map(|(c, id)| (c.test.clone(), *id)).collect();
        if cases.iter().all(|c| c.test.is_some()) {
            clauses.push((None, after));
        }
        self.close(Exit::Switch {
            discriminant,
            clauses,
        });
        self.targets.push(Target {
            labels,
            break_to: after,
            continue_to: None,
            breakable: true,
        });
        for (case, id) in cases.iter().zip(ids) {
            self.start(id);
            for s in &case.body {
                self.stmt(s);
            }
        }
        self.targets.pop();
        self.start(after);
    }

    fn try_stmt(&mut self, block: &[StmtRef], handler: Option<&Catch>, finalizer: Option<&[StmtRef]>) {
        let after = self.alloc();
        let finally_id = finalizer.map(|_| self.alloc());
        if let Some(handler) = finally_id {
            self.regions.push(Region::Finally { handler });
            self.stack.push(self.regions.len() - 1);
        }
        let catch_id = handler.map(|_| self.alloc());
        let handler_lit = |id: Option<StateId>| id.map_or_else(null, state_lit);
        self.emit(ctx_call("pushTry", vec![handler_lit(catch_id), handler_lit(finally_id)]));
        self.pinned.extend(catch_id);
        self.pinned.extend(finally_id);

        if catch_id.is_some() {
            self.regions.push(Region::Catch);
            self.stack.push(self.regions.len() - 1);
        }
        let body_id = self.alloc();
        self.start(body_id);
        for s in block {
            self.stmt(s);
        }
        self.jump(after);

        if let (Some(catch), Some(catch_id)) = (handler, catch_id) {
            self.stack.pop();
            self.start(catch_id);
            self.emit(pop_try());
            match catch.param.as_deref() {
                Some(Pat::Ident(ident)) => {
                    if !self.hoisted.iter().any(|h| h.name == ident.name) {
                        self.hoisted.push(ident.clone());
                    }
                    self.emit(expr_stmt(assign(
                        Pat::ident(ident.clone()),
                        ctx_member("storedException"),
                    )));
                }
                Some(pat) => self
                    .reporter
                    .error(pat.span(), "catch parameter patterns are not supported in generators"),
                None => {}
            }
            for s in &catch.body {
                self.stmt(s);
            }
            self.jump(after);
        }

        if let (Some(finalizer), Some(finally_id)) = (finalizer, finally_id) {
            self.stack.pop();
            self.start(finally_id);
            self.emit(pop_try());
            for s in finalizer {
                self.stmt(s);
            }
            self.emit(expr_stmt(assign_to(ctx_member("state"), ctx_member("finallyFallThrough"))));
            self.emit(break_stmt(None));
            self.close(Exit::Done);
            self.open_unreachable();
        }
        self.start(after);
    }

    // -----------------------------------------------------------------------
    // Jumps inside ordinary statements
    // -----------------------------------------------------------------------

    fn rewrite_jumps(&mut self, stmt: &StmtRef) -> StmtRef {
        let mut rewriter = EmbeddedJumps {
            builder: self,
            labels: Vec::new(),
            loops: 0,
            breakables: 0,
        };
        rewriter.transform_stmt(stmt)
    }
}

/// Rewrites `return`, `break` and `continue` that leave an ordinary
/// statement into state changes.
struct EmbeddedJumps<'b, 't, 'a> {
    builder: &'b mut Builder<'t, 'a>,
    /// Labels declared inside the statement.
    labels: Vec<Atom>,
    loops: usize,
    breakables: usize,
}

impl EmbeddedJumps<'_, '_, '_> {
    fn jump(&mut self, span: Span, dest: StateId, mut prefix: Vec<StmtRef>) -> StmtRef {
        prefix.extend(self.builder.embedded_jump(dest, self.breakables > 0));
        Stmt::new(span, StmtKind::Block(prefix))
    }

    fn nested<T>(&mut self, is_loop: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        self.breakables += 1;
        self.loops += usize::from(is_loop);
        let out = f(self);
        self.breakables -= 1;
        self.loops -= usize::from(is_loop);
        out
    }
}

impl Transformer for EmbeddedJumps<'_, '_, '_> {
    fn transform_stmt(&mut self, stmt: &StmtRef) -> StmtRef {
        match &stmt.kind {
            StmtKind::Return(arg) => {
                let prefix = arg
                    .iter()
                    .map(|e| expr_stmt(assign_to(ctx_member("returnValue"), e.clone())))
                    .collect();
                self.jump(stmt.span, END_STATE, prefix)
            }
            StmtKind::Break(None) if self.breakables == 0 => match self.builder.find_target(None, false) {
                Some(dest) => self.jump(stmt.span, dest, vec![]),
                None => stmt.clone(),
            },
            StmtKind::Continue(None) if self.loops == 0 => match self.builder.find_target(None, true) {
                Some(dest) => self.jump(stmt.span, dest, vec![]),
                None => stmt.clone(),
            },
            StmtKind::Break(Some(label)) | StmtKind::Continue(Some(label)) if !self.labels.contains(label) => {
                let is_continue = matches!(stmt.kind, StmtKind::Continue(_));
                match self.builder.find_target(Some(label), is_continue) {
                    Some(dest) => self.jump(stmt.span, dest, vec![]),
                    None => stmt.clone(),
                }
            }
            StmtKind::Labeled { label, .. } => {
                self.labels.push(label.clone());
                let out = transform::walk_stmt(self, stmt);
                self.labels.pop();
                out
            }
            StmtKind::Switch { .. } => self.nested(false, |t| transform::walk_stmt(t, stmt)),
            _ if stmt.is_loop() => self.nested(true, |t| transform::walk_stmt(t, stmt)),
            _ => transform::walk_stmt(self, stmt),
        }
    }

    fn transform_expr(&mut self, expr: &ExprRef) -> ExprRef {
        expr.clone()
    }

    fn transform_pat(&mut self, pat: &PatRef) -> PatRef {
        pat.clone()
    }

    fn transform_function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        function.clone()
    }

    fn transform_class(&mut self, class: &Rc<Class>) -> Rc<Class> {
        class.clone()
    }
}
