//! Meta-call, exception and cleanup machinery layered on the driver.
//!
//! `call/N` runs its goal under a fresh cut barrier, so a cut inside the
//! called goal is scoped to the call. `throw/1` copies the ball before the
//! trail is rewound; `catch/3` keeps the bindings of a successful pattern
//! match. `setup_call_catcher_cleanup/4` drives the cleanup disciplines:
//! eager on cut-truncation, deferred on suspension, and at goal stop.

use crate::choice::{ChoicePoint, CpKind, Step};
use crate::error::{instantiation_error, type_error, Ball};
use crate::solve::{Discard, Machine, Outcome};
use crate::term::renew::copy_term;
use crate::term::Term;

impl Machine {
    /// `call/1..8`: assemble the goal from the closure and extra
    /// arguments, then run it under its own cut barrier.
    pub(crate) fn meta_call(&mut self, args: &[Term]) -> Result<bool, Ball> {
        let target = args[0].deref();
        let goal = match (&target, args.len()) {
            (Term::Var(_), _) => return Err(instantiation_error()),
            (_, 1) => target.clone(),
            (Term::Atom(a), _) => Term::compound(a.name(), args[1..].to_vec()),
            (Term::Struct(s), _) => {
                let mut extended = s.args.clone();
                extended.extend_from_slice(&args[1..]);
                Term::compound(s.functor.name().name(), extended)
            }
            (other, _) => return Err(type_error("callable", other)),
        };
        check_goal_shape(&goal)?;
        let barrier = self.cp_depth();
        self.cont.push_goal(goal, barrier);
        Ok(true)
    }

    /// `catch/3`: install the handler frame, then run the goal like
    /// `call/1`.
    pub(crate) fn install_catch(&mut self, goal: Term, pattern: Term, recovery: Term) {
        let mark = self.trail.mark();
        self.cps.push(ChoicePoint::new(
            mark,
            self.cont.clone(),
            CpKind::Catch { pattern, recovery },
        ));
        let barrier = self.cp_depth();
        self.cont.push_goal(goal, barrier);
    }

    /// Build the ball thrown by `throw/1`: a copy resolved against the
    /// bindings at throw time, detached from the trail about to unwind.
    pub(crate) fn make_ball(&mut self, culprit: &Term) -> Result<Ball, Ball> {
        let t = culprit.deref();
        if matches!(t, Term::Var(_)) {
            return Err(instantiation_error());
        }
        Ok(Ball::new(copy_term(&t)))
    }

    /// `setup_call_catcher_cleanup/4`: commit to setup's first solution,
    /// then install the cleanup frame and run the guarded call.
    pub(crate) fn schedule_sccc(&mut self, setup: Term, call: Term, catcher: Term, cleanup: Term) {
        self.cont.push(Step::Sccc {
            call,
            catcher,
            cleanup,
        });
        // once(Setup): commit to the first solution, fail if none.
        let barrier = self.cp_depth();
        self.schedule_ite(setup, Term::atom("true"), Term::atom("fail"), barrier);
    }

    /// Executed once setup committed: push the cleanup frame, then run the
    /// guarded call with a determinism probe after each solution.
    pub(crate) fn install_cleanup_frame(&mut self, call: Term, catcher: Term, cleanup: Term) {
        let mark = self.trail.mark();
        let cp_at = self.cp_depth();
        self.cps.push(ChoicePoint::new(
            mark,
            self.cont.clone(),
            CpKind::Cleanup { catcher, cleanup },
        ));
        self.cont.push(Step::ScccCheck { cp_at });
        let barrier = self.cp_depth();
        self.cont.push_goal(call, barrier);
    }

    /// After a solution of the guarded call: if no choice point survives
    /// above the cleanup frame, the call completed deterministically —
    /// run cleanup now with catcher `exit`.
    pub(crate) fn deterministic_exit_check(&mut self, cp_at: usize) -> Result<(), Ball> {
        if self.cp_depth() != cp_at + 1 {
            return Ok(());
        }
        let cp = self.cps.pop().expect("cleanup frame present");
        match cp.kind {
            CpKind::Cleanup { catcher, cleanup } => {
                let _ = self.unify(&catcher, &Term::atom("exit"));
                self.run_cleanup(&cleanup)?;
            }
            other => {
                // Not ours after all; put it back.
                self.cps
                    .push(ChoicePoint::new(cp.trail_mark, cp.cont, other));
            }
        }
        Ok(())
    }

    /// Run a cleanup goal once, ignoring failure, discarding any choice
    /// points it creates. Exceptions replace the in-flight ball.
    pub(crate) fn run_cleanup(&mut self, cleanup: &Term) -> Result<(), Ball> {
        let base = self.cp_depth();
        let saved_cont = std::mem::take(&mut self.cont);
        // (Cleanup -> true ; true): one solution, failure swallowed.
        let guarded = Term::compound(
            ";",
            vec![
                Term::compound("->", vec![cleanup.clone(), Term::atom("true")]),
                Term::atom("true"),
            ],
        );
        self.cont.push_goal(guarded, base);
        let outcome = self.run(base);
        match outcome {
            Ok(Outcome::Solution) | Ok(Outcome::Exhausted) => {
                self.discard_above(base, Discard::Cut)?;
                self.cont = saved_cont;
                Ok(())
            }
            Ok(Outcome::Halted(_)) => {
                self.cont = saved_cont;
                Ok(())
            }
            Err(ball) => {
                self.cont = saved_cont;
                Err(ball)
            }
        }
    }
}

/// Reject goals whose control skeleton contains a non-callable leaf, as
/// `call((true, 1))` must be a type error on the whole goal.
fn check_goal_shape(goal: &Term) -> Result<(), Ball> {
    let mut work = vec![goal.clone()];
    while let Some(t) = work.pop() {
        let t = t.deref();
        match &t {
            Term::Var(_) | Term::Atom(_) => {}
            Term::Struct(s) => {
                let name = s.functor.name().name();
                if s.functor.arity() == 2 && matches!(name, "," | ";" | "->") {
                    work.push(s.args[0].clone());
                    work.push(s.args[1].clone());
                }
            }
            _ => return Err(type_error("callable", goal)),
        }
    }
    Ok(())
}
