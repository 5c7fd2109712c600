//! Choice points and goal continuations.
//!
//! The resolution driver is an explicit push-down machine: an and-stack of
//! pending goal steps (a persistent cons-list, so a choice point snapshots
//! it by cloning one `Rc`) and an or-stack of choice-point frames. Each
//! frame records the trail depth at creation, the continuation to resume,
//! and a concrete alternative producer — a sum type rather than a trait
//! object, keeping each producer's cursor inline.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use crate::builtins::BuiltinFn;
use crate::database::Clause;
use crate::term::{Functor, Term};
use crate::trail::TrailMark;

/// One pending step on the and-stack.
#[derive(Clone)]
pub enum Step {
    /// Execute a goal term. `barrier` is the choice-point depth a cut in
    /// this goal truncates to; it is captured lexically at clause (or
    /// meta-call) entry.
    Goal { term: Term, barrier: usize },
    /// Commit an if-then-else: discard the condition's choice points down
    /// to `depth` (a local cut).
    IteCommit { depth: usize },
    /// Install the cleanup frame of `setup_call_catcher_cleanup/4` once
    /// setup has committed, then run the guarded call.
    Sccc {
        call: Term,
        catcher: Term,
        cleanup: Term,
    },
    /// Determinism probe after each solution of the guarded call of
    /// `setup_call_catcher_cleanup/4`; `cp_at` is the cleanup frame's
    /// position.
    ScccCheck { cp_at: usize },
}

/// Persistent goal continuation.
#[derive(Clone, Default)]
pub struct Cont(Option<Rc<ContNode>>);

struct ContNode {
    step: Step,
    next: Cont,
}

impl Cont {
    pub fn empty() -> Cont {
        Cont(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn push(&mut self, step: Step) {
        let next = std::mem::take(self);
        *self = Cont(Some(Rc::new(ContNode { step, next })));
    }

    pub fn push_goal(&mut self, term: Term, barrier: usize) {
        self.push(Step::Goal { term, barrier });
    }

    pub fn pop(&mut self) -> Option<Step> {
        match self.0.take() {
            None => None,
            Some(node) => {
                let step = node.step.clone();
                *self = node.next.clone();
                Some(step)
            }
        }
    }
}

/// Private cursor of a suspended nondeterministic builtin.
pub enum RetryState {
    /// Generic alternative list: unify `probe` against the next entry.
    Alts {
        probe: Term,
        alts: VecDeque<Term>,
    },
    /// Integer enumeration for `between/3`.
    IntRange { var: Term, next: i64, hi: i64 },
    /// Unbounded list generation for `length/2`, capped by configuration.
    LengthGen {
        list: Term,
        len: Term,
        next: usize,
        cap: usize,
    },
    /// Clause-store scan for `clause/2` and `retract/1`.
    ClauseScan {
        key: Functor,
        clauses: Arc<Vec<Arc<Clause>>>,
        next: usize,
        pattern: Term,
        retract: bool,
    },
    /// `repeat/0`.
    Repeat,
}

/// Alternative producer of a choice point.
pub enum CpKind {
    /// Remaining clauses of a user predicate call.
    Clauses {
        goal: Term,
        clauses: Arc<Vec<Arc<Clause>>>,
        next: usize,
    },
    /// Right branch of a disjunction, with the cut barrier of the
    /// enclosing clause body.
    Else { goal: Term, barrier: usize },
    /// Suspended builtin; retried through its registry entry.
    Retry {
        builtin: BuiltinFn,
        goal: Term,
        state: RetryState,
    },
    /// `catch/3` handler frame; transparent on backtracking, searched by
    /// `throw/1`.
    Catch { pattern: Term, recovery: Term },
    /// Deferred cleanup of `setup_call_catcher_cleanup/4`. Runs when the
    /// frame is cut away, retried to exhaustion, unwound by a throw, or
    /// discarded at goal stop.
    Cleanup { catcher: Term, cleanup: Term },
}

/// A choice point: how to produce the next solution.
pub struct ChoicePoint {
    pub trail_mark: TrailMark,
    pub cont: Cont,
    pub kind: CpKind,
}

impl ChoicePoint {
    pub fn new(trail_mark: TrailMark, cont: Cont, kind: CpKind) -> ChoicePoint {
        ChoicePoint {
            trail_mark,
            cont,
            kind,
        }
    }
}
