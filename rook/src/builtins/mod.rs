//! The builtin registry: native predicates keyed by functor.
//!
//! A builtin is a function over (machine, mode, args). `Mode::First` is the
//! initial call; a builtin that has more solutions returns
//! [`BuiltinExec::Nondet`] with its private cursor, the driver suspends it
//! as a choice point, and retries arrive as `Mode::Redo(cursor)`.

mod arith_cmp;
mod atoms;
mod db;
mod io;
mod lists;
mod misc;
mod solutions;
mod terms;
mod typecheck;

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::OnceLock;

use crate::choice::RetryState;
use crate::error::{instantiation_error, type_error, Ball};
use crate::solve::Machine;
use crate::term::{Functor, Term};
use crate::unify::unify_or_undo;

/// Call vs. retry discriminator passed to every builtin.
pub enum Mode {
    First,
    Redo(RetryState),
}

/// What a builtin call produced.
pub enum BuiltinExec {
    /// Deterministic success (`true`) or failure (`false`).
    Det(bool),
    /// Success with further solutions pending behind the cursor.
    Nondet(RetryState),
}

pub type BuiltinFn = fn(&mut Machine, Mode, &[Term]) -> Result<BuiltinExec, Ball>;

pub struct Registry {
    table: HashMap<Functor, BuiltinFn>,
}

impl Registry {
    pub fn add(&mut self, name: &str, arity: usize, f: BuiltinFn) {
        let key = Functor::of(name, arity);
        debug_assert!(
            !self.table.contains_key(&key),
            "duplicate builtin {}/{}",
            name,
            arity
        );
        self.table.insert(key, f);
    }

    pub fn lookup(&self, key: &Functor) -> Option<BuiltinFn> {
        self.table.get(key).copied()
    }

    pub fn contains(&self, key: &Functor) -> bool {
        self.table.contains_key(key)
    }

    /// Every registered predicate key.
    pub fn keys(&self) -> Vec<Functor> {
        self.table.keys().cloned().collect()
    }
}

/// Control constructs resolved by the driver itself rather than the
/// registry.
pub fn control_keys() -> Vec<Functor> {
    let mut keys = vec![
        Functor::of("true", 0),
        Functor::of("fail", 0),
        Functor::of("false", 0),
        Functor::of("!", 0),
        Functor::of(",", 2),
        Functor::of(";", 2),
        Functor::of("->", 2),
        Functor::of("\\+", 1),
        Functor::of("not", 1),
        Functor::of("catch", 3),
        Functor::of("throw", 1),
        Functor::of("halt", 0),
        Functor::of("halt", 1),
        Functor::of("setup_call_catcher_cleanup", 4),
        Functor::of("setup_call_cleanup", 3),
        Functor::of("call_cleanup", 2),
    ];
    for arity in 1..=8 {
        keys.push(Functor::of("call", arity));
    }
    keys
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide builtin table, built on first use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut reg = Registry {
            table: HashMap::new(),
        };
        typecheck::register(&mut reg);
        terms::register(&mut reg);
        atoms::register(&mut reg);
        arith_cmp::register(&mut reg);
        db::register(&mut reg);
        solutions::register(&mut reg);
        lists::register(&mut reg);
        io::register(&mut reg);
        misc::register(&mut reg);
        reg
    })
}

pub fn is_builtin(key: &Functor) -> bool {
    registry().contains(key)
}

// ---- shared argument plumbing ----------------------------------------

/// Dereferenced argument that must be bound.
pub(crate) fn need_bound(arg: &Term) -> Result<Term, Ball> {
    match arg.deref() {
        Term::Var(_) => Err(instantiation_error()),
        t => Ok(t),
    }
}

pub(crate) fn need_atom(arg: &Term) -> Result<crate::term::Atom, Ball> {
    match need_bound(arg)? {
        Term::Atom(a) => Ok(a),
        other => Err(type_error("atom", &other)),
    }
}

pub(crate) fn need_int(arg: &Term) -> Result<i64, Ball> {
    match need_bound(arg)? {
        Term::Int(i) => Ok(i),
        other => Err(type_error("integer", &other)),
    }
}

/// A callable term (atom or compound), dereferenced.
pub(crate) fn need_callable(arg: &Term) -> Result<Term, Ball> {
    let t = need_bound(arg)?;
    if t.is_callable() {
        Ok(t)
    } else {
        Err(type_error("callable", &t))
    }
}

/// Drive the generic alternatives cursor: unify `probe` against entries
/// until one sticks, rewinding failed attempts.
pub(crate) fn step_alts(
    machine: &mut Machine,
    probe: Term,
    mut alts: VecDeque<Term>,
) -> BuiltinExec {
    while let Some(alt) = alts.pop_front() {
        if unify_or_undo(&mut machine.trail, &probe, &alt) {
            if alts.is_empty() {
                return BuiltinExec::Det(true);
            }
            return BuiltinExec::Nondet(RetryState::Alts { probe, alts });
        }
    }
    BuiltinExec::Det(false)
}

/// Entry point for builtins whose solutions can be precomputed as a list
/// of candidate terms. On retry the cursor carries its own probe and
/// remaining alternatives; the `probe` and `make` arguments are only read
/// on the first call.
pub(crate) fn solve_alts(
    machine: &mut Machine,
    mode: Mode,
    probe: Term,
    make: impl FnOnce() -> Result<VecDeque<Term>, Ball>,
) -> Result<BuiltinExec, Ball> {
    match mode {
        Mode::First => {
            let alts = make()?;
            Ok(step_alts(machine, probe, alts))
        }
        Mode::Redo(RetryState::Alts { probe, alts }) => Ok(step_alts(machine, probe, alts)),
        Mode::Redo(_) => unreachable!("alternatives cursor expected"),
    }
}
