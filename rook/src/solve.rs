//! The resolution driver: an explicit push-down machine executing goals
//! against the clause database by SLD resolution with backtracking.
//!
//! State is three stacks: the goal continuation (and-stack), the
//! choice-point stack (or-stack) and the trail. Failure pops the newest
//! choice point, rewinds the trail to its mark and resumes its
//! continuation with the next alternative. Cut truncates the choice-point
//! stack to the depth captured at clause entry.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::builtins::{registry, BuiltinExec, BuiltinFn, Mode};
use crate::choice::{ChoicePoint, Cont, CpKind, Step};
use crate::config::EngineConfig;
use crate::database::{Clause, Database, Notifier, PredicateView};
use crate::error::{existence_error, instantiation_error, type_error, Ball};
use crate::flags::{Flags, UnknownAction};
use crate::ops::OpTable;
use crate::stream::StreamTable;
use crate::term::renew::{activate, fresh_vars};
use crate::term::{Functor, Term};
use crate::trail::Trail;

/// Result of pumping the machine for one solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The continuation emptied; bindings hold a solution.
    Solution,
    /// No choice point above the base produced an alternative.
    Exhausted,
    /// `halt/0,1` was executed.
    Halted(i32),
}

/// Why a stretch of choice points is being discarded; decides the catcher
/// handed to pending cleanups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Discard {
    /// Cut (`!`, if-then-else commit).
    Cut,
    /// Client-side commit: goal stop or engine shutdown.
    Stop,
}

impl Discard {
    fn catcher(self) -> Term {
        match self {
            Discard::Cut => Term::atom("!"),
            Discard::Stop => Term::atom("exit"),
        }
    }
}

pub struct Machine {
    pub db: Arc<Database>,
    pub flags: Arc<Flags>,
    pub ops: Arc<OpTable>,
    pub streams: Arc<StreamTable>,
    pub config: EngineConfig,
    pub trail: Trail,
    pub rng: StdRng,
    pub(crate) cps: Vec<ChoicePoint>,
    pub(crate) cont: Cont,
    pub(crate) pending_halt: Option<i32>,
    pred_cache: HashMap<Functor, PredicateView>,
    notifier: Arc<Notifier>,
    listener_id: u64,
}

impl Machine {
    pub fn new(
        db: Arc<Database>,
        flags: Arc<Flags>,
        ops: Arc<OpTable>,
        streams: Arc<StreamTable>,
        config: EngineConfig,
    ) -> Machine {
        let (listener_id, notifier) = db.subscribe();
        Machine {
            db,
            flags,
            ops,
            streams,
            config,
            trail: Trail::new(),
            rng: StdRng::from_entropy(),
            cps: Vec::new(),
            cont: Cont::empty(),
            pending_halt: None,
            pred_cache: HashMap::new(),
            notifier,
            listener_id,
        }
    }

    pub fn cp_depth(&self) -> usize {
        self.cps.len()
    }

    pub fn unify(&mut self, a: &Term, b: &Term) -> bool {
        crate::unify::unify(&mut self.trail, a, b)
    }

    pub fn unify_undo(&mut self, a: &Term, b: &Term) -> bool {
        crate::unify::unify_or_undo(&mut self.trail, a, b)
    }

    /// Detach from the database's notification set and release streams.
    pub(crate) fn shutdown(&mut self) {
        self.db.unsubscribe(self.listener_id);
        self.pred_cache.clear();
        self.streams.shutdown();
    }

    // ---- the main pump -------------------------------------------------

    /// Run until a solution, exhaustion of alternatives above `base`, or
    /// halt. Balls escaping every handler above `base` surface as `Err`.
    pub(crate) fn run(&mut self, base: usize) -> Result<Outcome, Ball> {
        loop {
            if let Some(code) = self.pending_halt {
                return Ok(Outcome::Halted(code));
            }
            let step = match self.cont.pop() {
                Some(step) => step,
                None => return Ok(Outcome::Solution),
            };
            let result = match step {
                Step::Goal { term, barrier } => self.execute(term, barrier),
                Step::IteCommit { depth } => self.discard_above(depth, Discard::Cut).map(|_| true),
                Step::Sccc {
                    call,
                    catcher,
                    cleanup,
                } => {
                    self.install_cleanup_frame(call, catcher, cleanup);
                    Ok(true)
                }
                Step::ScccCheck { cp_at } => self.deterministic_exit_check(cp_at).map(|_| true),
            };
            match result {
                Ok(true) => {}
                Ok(false) => match self.backtrack(base) {
                    Ok(true) => {}
                    Ok(false) => return Ok(Outcome::Exhausted),
                    Err(ball) => self.unwind(ball, base)?,
                },
                Err(ball) => self.unwind(ball, base)?,
            }
        }
    }

    /// Force the machine back into its newest alternative. `Ok(false)`
    /// when nothing above `base` remains.
    pub(crate) fn backtrack(&mut self, base: usize) -> Result<bool, Ball> {
        while self.cps.len() > base {
            let cp = self.cps.pop().expect("cp stack underflow");
            self.trail.rewind_to(cp.trail_mark);
            match cp.kind {
                CpKind::Clauses {
                    goal,
                    clauses,
                    next,
                } => {
                    if self.resume_clauses(cp.trail_mark, cp.cont, goal, clauses, next)? {
                        return Ok(true);
                    }
                }
                CpKind::Else { goal, barrier } => {
                    self.cont = cp.cont;
                    self.cont.push_goal(goal, barrier);
                    return Ok(true);
                }
                CpKind::Retry {
                    builtin,
                    goal,
                    state,
                } => {
                    let args: Vec<Term> = match goal.deref() {
                        Term::Struct(s) => s.args.clone(),
                        _ => Vec::new(),
                    };
                    match builtin(self, Mode::Redo(state), &args)? {
                        BuiltinExec::Det(true) => {
                            self.cont = cp.cont;
                            return Ok(true);
                        }
                        BuiltinExec::Det(false) => {}
                        BuiltinExec::Nondet(state) => {
                            self.cps.push(ChoicePoint::new(
                                cp.trail_mark,
                                cp.cont.clone(),
                                CpKind::Retry {
                                    builtin,
                                    goal,
                                    state,
                                },
                            ));
                            self.cont = cp.cont;
                            return Ok(true);
                        }
                    }
                }
                // Handler frames are transparent to backtracking.
                CpKind::Catch { .. } => {}
                CpKind::Cleanup { catcher, cleanup } => {
                    let _ = self.unify(&catcher, &Term::atom("fail"));
                    self.run_cleanup(&cleanup)?;
                }
            }
        }
        Ok(false)
    }

    /// Discard choice points above `depth` without rewinding the trail,
    /// running pending cleanups with the discipline's catcher.
    pub(crate) fn discard_above(&mut self, depth: usize, discard: Discard) -> Result<(), Ball> {
        debug_assert!(depth <= self.cps.len(), "cut below the stack");
        while self.cps.len() > depth {
            let cp = self.cps.pop().expect("cp stack underflow");
            if let CpKind::Cleanup { catcher, cleanup } = cp.kind {
                let _ = self.unify(&catcher, &discard.catcher());
                self.run_cleanup(&cleanup)?;
            }
        }
        Ok(())
    }

    /// Unwind a thrown ball: pop choice points (running cleanups) until a
    /// catch frame's pattern unifies with the ball. Bindings made by the
    /// match are kept.
    pub(crate) fn unwind(&mut self, mut ball: Ball, base: usize) -> Result<(), Ball> {
        loop {
            if self.cps.len() <= base {
                return Err(ball);
            }
            let cp = self.cps.pop().expect("cp stack underflow");
            self.trail.rewind_to(cp.trail_mark);
            match cp.kind {
                CpKind::Catch { pattern, recovery } => {
                    let mark = self.trail.mark();
                    if crate::unify::unify(&mut self.trail, &pattern, ball.term()) {
                        self.cont = cp.cont;
                        let barrier = self.cps.len();
                        self.cont.push_goal(recovery, barrier);
                        return Ok(());
                    }
                    self.trail.rewind_to(mark);
                }
                CpKind::Cleanup { catcher, cleanup } => {
                    let exception = Term::compound("exception", vec![ball.term().clone()]);
                    let _ = self.unify(&catcher, &exception);
                    if let Err(new_ball) = self.run_cleanup(&cleanup) {
                        ball = new_ball;
                    }
                }
                _ => {}
            }
        }
    }

    // ---- goal dispatch -------------------------------------------------

    fn execute(&mut self, goal: Term, barrier: usize) -> Result<bool, Ball> {
        let goal = goal.deref();
        if self.config.trace {
            log::debug!("call: {}", goal);
        }
        match &goal {
            Term::Var(_) => Err(instantiation_error()),
            Term::Atom(a) => {
                let name = a.name().to_string();
                self.execute_named(&goal, &name, &[], barrier)
            }
            Term::Struct(s) => {
                let s = s.clone();
                let name = s.functor.name().name().to_string();
                self.execute_named(&goal, &name, &s.args, barrier)
            }
            other => Err(type_error("callable", other)),
        }
    }

    fn execute_named(
        &mut self,
        goal: &Term,
        name: &str,
        args: &[Term],
        barrier: usize,
    ) -> Result<bool, Ball> {
        match (name, args.len()) {
            ("true", 0) => Ok(true),
            ("fail", 0) | ("false", 0) => Ok(false),
            ("!", 0) => {
                self.discard_above(barrier, Discard::Cut)?;
                Ok(true)
            }
            (",", 2) => {
                self.cont.push_goal(args[1].clone(), barrier);
                self.cont.push_goal(args[0].clone(), barrier);
                Ok(true)
            }
            (";", 2) => self.disjunction(args, barrier),
            ("->", 2) => {
                self.schedule_ite(
                    args[0].clone(),
                    args[1].clone(),
                    Term::atom("fail"),
                    barrier,
                );
                Ok(true)
            }
            ("\\+", 1) | ("not", 1) => {
                self.schedule_ite(
                    args[0].clone(),
                    Term::atom("fail"),
                    Term::atom("true"),
                    barrier,
                );
                Ok(true)
            }
            ("call", n) if (1..=8).contains(&n) => self.meta_call(args),
            ("catch", 3) => {
                self.install_catch(args[0].clone(), args[1].clone(), args[2].clone());
                Ok(true)
            }
            ("throw", 1) => Err(self.make_ball(&args[0])?),
            ("halt", 0) => {
                self.pending_halt = Some(0);
                Ok(true)
            }
            ("halt", 1) => {
                let code = crate::builtins::need_int(&args[0])?;
                self.pending_halt = Some(code as i32);
                Ok(true)
            }
            ("setup_call_catcher_cleanup", 4) => {
                self.schedule_sccc(
                    args[0].clone(),
                    args[1].clone(),
                    args[2].clone(),
                    args[3].clone(),
                );
                Ok(true)
            }
            ("setup_call_cleanup", 3) => {
                self.schedule_sccc(args[0].clone(), args[1].clone(), Term::var(), args[2].clone());
                Ok(true)
            }
            ("call_cleanup", 2) => {
                self.schedule_sccc(
                    Term::atom("true"),
                    args[0].clone(),
                    Term::var(),
                    args[1].clone(),
                );
                Ok(true)
            }
            _ => {
                let key = Functor::of(name, args.len());
                match registry().lookup(&key) {
                    Some(f) => self.dispatch_builtin(f, goal, args),
                    None => self.call_user(goal, key),
                }
            }
        }
    }

    fn disjunction(&mut self, args: &[Term], barrier: usize) -> Result<bool, Ball> {
        let left = args[0].deref();
        if let Some(ite) = left.match_struct("->", 2) {
            let (cond, then) = (ite[0].clone(), ite[1].clone());
            self.schedule_ite(cond, then, args[1].clone(), barrier);
            return Ok(true);
        }
        let mark = self.trail.mark();
        self.cps.push(ChoicePoint::new(
            mark,
            self.cont.clone(),
            CpKind::Else {
                goal: args[1].clone(),
                barrier,
            },
        ));
        self.cont.push_goal(args[0].clone(), barrier);
        Ok(true)
    }

    /// `(Cond -> Then ; Else)`: the condition runs in a private
    /// choice-point region; its first solution commits.
    pub(crate) fn schedule_ite(&mut self, cond: Term, then: Term, els: Term, barrier: usize) {
        let depth = self.cps.len();
        let mark = self.trail.mark();
        self.cps.push(ChoicePoint::new(
            mark,
            self.cont.clone(),
            CpKind::Else { goal: els, barrier },
        ));
        self.cont.push_goal(then, barrier);
        self.cont.push(Step::IteCommit { depth });
        // Cut inside the condition is local to the condition.
        let cond_barrier = self.cps.len();
        self.cont.push_goal(cond, cond_barrier);
    }

    fn dispatch_builtin(
        &mut self,
        f: BuiltinFn,
        goal: &Term,
        args: &[Term],
    ) -> Result<bool, Ball> {
        let mark = self.trail.mark();
        match f(self, Mode::First, args)? {
            BuiltinExec::Det(ok) => Ok(ok),
            BuiltinExec::Nondet(state) => {
                self.cps.push(ChoicePoint::new(
                    mark,
                    self.cont.clone(),
                    CpKind::Retry {
                        builtin: f,
                        goal: goal.clone(),
                        state,
                    },
                ));
                Ok(true)
            }
        }
    }

    // ---- user-defined predicates ----------------------------------------

    fn predicate_view(&mut self, key: &Functor) -> Option<PredicateView> {
        for dirty in self.notifier.take_dirty() {
            self.pred_cache.remove(&dirty);
        }
        if let Some(view) = self.pred_cache.get(key) {
            return Some(view.clone());
        }
        let view = self.db.lookup(key)?;
        self.pred_cache.insert(key.clone(), view.clone());
        Some(view)
    }

    fn call_user(&mut self, goal: &Term, key: Functor) -> Result<bool, Ball> {
        let view = match self.predicate_view(&key) {
            Some(view) => view,
            None => return self.unknown_predicate(&key),
        };
        let cont = self.cont.clone();
        self.resume_clauses(self.trail.mark(), cont, goal.clone(), view.clauses, 0)
    }

    fn unknown_predicate(&mut self, key: &Functor) -> Result<bool, Ball> {
        match self.flags.unknown() {
            UnknownAction::Error => Err(existence_error("procedure", Term::indicator(key))),
            UnknownAction::Fail => Ok(false),
            UnknownAction::Warning => {
                log::warn!("unknown procedure {}", key);
                Ok(false)
            }
        }
    }

    /// Try clauses from `start` onward: activate each candidate, unify its
    /// head with the call, suspend the remainder as a choice point. Shared
    /// by the first call and by choice-point retry.
    fn resume_clauses(
        &mut self,
        mark: crate::trail::TrailMark,
        cont: Cont,
        goal: Term,
        clauses: Arc<Vec<Arc<Clause>>>,
        start: usize,
    ) -> Result<bool, Ball> {
        let entry_depth = self.cps.len();
        let first_arg = match goal.deref() {
            Term::Struct(s) if !s.args.is_empty() => Some(s.args[0].deref()),
            _ => None,
        };
        let admissible = |clause: &Arc<Clause>| match &first_arg {
            Some(arg) => clause.index_key.admits(arg),
            None => true,
        };
        let mut index = start;
        while index < clauses.len() {
            let clause = &clauses[index];
            index += 1;
            if !admissible(clause) {
                continue;
            }
            let vars = fresh_vars(clause.nvars);
            let head = activate(&clause.head, &vars);
            if !self.unify(&goal, &head) {
                self.trail.rewind_to(mark);
                continue;
            }
            let body = activate(&clause.body, &vars);
            let more = clauses[index..].iter().any(&admissible);
            if more {
                self.cps.push(ChoicePoint::new(
                    mark,
                    cont.clone(),
                    CpKind::Clauses {
                        goal: goal.clone(),
                        clauses: clauses.clone(),
                        next: index,
                    },
                ));
            }
            self.cont = cont;
            self.cont.push_goal(body, entry_depth);
            return Ok(true);
        }
        self.trail.rewind_to(mark);
        Ok(false)
    }

    // ---- solution collection (findall and friends) ----------------------

    /// Run `goal` to exhaustion in a protected region, recording a copy of
    /// `template` at each solution. All bindings are rolled back.
    pub(crate) fn collect_solutions(
        &mut self,
        goal: &Term,
        template: &Term,
    ) -> Result<Vec<Term>, Ball> {
        let base = self.cps.len();
        let mark = self.trail.mark();
        let saved_cont = std::mem::take(&mut self.cont);
        self.cont.push_goal(goal.clone(), base);

        let mut items = Vec::new();
        let mut failure: Option<Ball> = None;
        loop {
            match self.run(base) {
                Ok(Outcome::Solution) => {
                    items.push(crate::term::renew::copy_term(template));
                    match self.backtrack(base) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(ball) => match self.unwind(ball, base) {
                            Ok(()) => {}
                            Err(ball) => {
                                failure = Some(ball);
                                break;
                            }
                        },
                    }
                }
                Ok(Outcome::Exhausted) => break,
                // Halt propagates; the engine façade unwinds everything.
                Ok(Outcome::Halted(_)) => {
                    self.cont = saved_cont;
                    return Ok(items);
                }
                Err(ball) => {
                    failure = Some(ball);
                    break;
                }
            }
        }
        self.trail.rewind_to(mark);
        self.cont = saved_cont;
        match failure {
            Some(ball) => Err(ball),
            None => Ok(items),
        }
    }

}

impl Drop for Machine {
    fn drop(&mut self) {
        self.db.unsubscribe(self.listener_id);
    }
}
