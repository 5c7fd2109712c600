//! Database builtins: assert/retract, `abolish/1`, `dynamic/1`,
//! `clause/2`, `current_predicate/1`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::builtins::{is_builtin, need_callable, solve_alts, BuiltinExec, Mode, Registry};
use crate::choice::RetryState;
use crate::database::Clause;
use crate::error::{instantiation_error, permission_error, type_error, Ball};
use crate::solve::Machine;
use crate::term::renew::{activate, fresh_vars};
use crate::term::{Functor, Term};

pub(super) fn register(reg: &mut Registry) {
    reg.add("assert", 1, |m, _, a| add_clause(m, a, false));
    reg.add("assertz", 1, |m, _, a| add_clause(m, a, false));
    reg.add("asserta", 1, |m, _, a| add_clause(m, a, true));
    reg.add("retract", 1, retract_1);
    reg.add("abolish", 1, abolish_1);
    reg.add("dynamic", 1, dynamic_1);
    reg.add("clause", 2, clause_2);
    reg.add("current_predicate", 1, current_predicate_1);
}

/// Split an asserted term into head and body.
fn split_clause(term: &Term) -> Result<(Term, Term), Ball> {
    let t = need_callable(term)?;
    match t.match_struct(":-", 2) {
        Some(parts) => Ok((parts[0].clone(), parts[1].clone())),
        None => Ok((t, Term::atom("true"))),
    }
}

fn head_key(head: &Term) -> Result<Functor, Ball> {
    match head.deref() {
        Term::Var(_) => Err(instantiation_error()),
        t => t
            .functor_of()
            .ok_or_else(|| type_error("callable", &t)),
    }
}

/// Reject touching control constructs and native predicates.
fn guard_reserved(key: &Functor, operation: &str) -> Result<(), Ball> {
    let name = key.name().name();
    let reserved = is_builtin(key)
        || matches!(
            (name, key.arity()),
            ("true", 0)
                | ("fail", 0)
                | ("false", 0)
                | ("!", 0)
                | (",", 2)
                | (";", 2)
                | ("->", 2)
                | ("\\+", 1)
                | ("catch", 3)
                | ("throw", 1)
        )
        || (name == "call" && (1..=8).contains(&key.arity()));
    if reserved {
        Err(permission_error(
            operation,
            "static_procedure",
            Term::indicator(key),
        ))
    } else {
        Ok(())
    }
}

fn add_clause(m: &mut Machine, a: &[Term], first: bool) -> Result<BuiltinExec, Ball> {
    let (head, body) = split_clause(&a[0])?;
    let key = head_key(&head)?;
    guard_reserved(&key, "modify")?;
    let clause = Clause::new(&head, &body)?;
    m.db.add_clause(clause, first, true)?;
    Ok(BuiltinExec::Det(true))
}

fn retract_1(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    match mode {
        Mode::First => {
            let (head, body) = split_clause(&a[0])?;
            let key = head_key(&head)?;
            guard_reserved(&key, "modify")?;
            let view = match m.db.lookup(&key) {
                Some(view) => view,
                None => return Ok(BuiltinExec::Det(false)),
            };
            if !view.dynamic {
                return Err(permission_error(
                    "modify",
                    "static_procedure",
                    Term::indicator(&key),
                ));
            }
            let pattern = Term::compound(":-", vec![head, body]);
            scan_clauses(m, key, view.clauses, 0, pattern, true)
        }
        Mode::Redo(RetryState::ClauseScan {
            key,
            clauses,
            next,
            pattern,
            retract,
        }) => scan_clauses(m, key, clauses, next, pattern, retract),
        Mode::Redo(_) => unreachable!("clause scan cursor expected"),
    }
}

fn clause_2(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    match mode {
        Mode::First => {
            let head = need_callable(&a[0])?;
            match a[1].deref() {
                Term::Var(_) => {}
                b if b.is_callable() => {}
                other => return Err(type_error("callable", &other)),
            }
            let key = head_key(&head)?;
            if is_builtin(&key) {
                return Err(permission_error(
                    "access",
                    "private_procedure",
                    Term::indicator(&key),
                ));
            }
            let view = match m.db.lookup(&key) {
                Some(view) => view,
                None => return Ok(BuiltinExec::Det(false)),
            };
            let pattern = Term::compound(":-", vec![head, a[1].clone()]);
            scan_clauses(m, key, view.clauses, 0, pattern, false)
        }
        Mode::Redo(RetryState::ClauseScan {
            key,
            clauses,
            next,
            pattern,
            retract,
        }) => scan_clauses(m, key, clauses, next, pattern, retract),
        Mode::Redo(_) => unreachable!("clause scan cursor expected"),
    }
}

/// Walk a clause-store snapshot, unifying activated clauses against the
/// `Head :- Body` pattern. Retract removes the matched clause by identity.
fn scan_clauses(
    m: &mut Machine,
    key: Functor,
    clauses: Arc<Vec<Arc<Clause>>>,
    start: usize,
    pattern: Term,
    retract: bool,
) -> Result<BuiltinExec, Ball> {
    let mut index = start;
    while index < clauses.len() {
        let clause = &clauses[index];
        index += 1;
        let vars = fresh_vars(clause.nvars);
        let head = activate(&clause.head, &vars);
        let body = activate(&clause.body, &vars);
        let candidate = Term::compound(":-", vec![head, body]);
        if m.unify_undo(&pattern, &candidate) {
            if retract {
                m.db.remove_clause(&key, clause.id);
            }
            if index < clauses.len() {
                return Ok(BuiltinExec::Nondet(RetryState::ClauseScan {
                    key,
                    clauses,
                    next: index,
                    pattern,
                    retract,
                }));
            }
            return Ok(BuiltinExec::Det(true));
        }
    }
    Ok(BuiltinExec::Det(false))
}

fn abolish_1(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let key = indicator_key(&a[0])?;
    guard_reserved(&key, "modify")?;
    m.db.abolish(&key)?;
    Ok(BuiltinExec::Det(true))
}

fn dynamic_1(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    // Accept a single indicator, a conjunction, or a list of them.
    let mut work = vec![a[0].clone()];
    while let Some(t) = work.pop() {
        let t = t.deref();
        if let Some(parts) = t.match_struct(",", 2) {
            work.push(parts[0].clone());
            work.push(parts[1].clone());
            continue;
        }
        if t.is_nil() {
            continue;
        }
        if let Ok(items) = t.list_view() {
            work.extend(items);
            continue;
        }
        let key = indicator_key(&t)?;
        guard_reserved(&key, "modify")?;
        m.db.declare_dynamic(&key)?;
    }
    Ok(BuiltinExec::Det(true))
}

fn current_predicate_1(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(_) = mode {
        return solve_alts(m, mode, Term::nil(), || unreachable!());
    }
    match a[0].deref() {
        Term::Var(_) => {}
        t if t.match_struct("/", 2).is_some() => {}
        other => return Err(type_error("predicate_indicator", &other)),
    }
    let alts: VecDeque<Term> = m
        .db
        .user_keys()
        .into_iter()
        .map(|key| Term::indicator(&key))
        .collect();
    solve_alts(m, Mode::First, a[0].clone(), move || Ok(alts))
}

/// Decode a `Name/Arity` predicate indicator.
fn indicator_key(term: &Term) -> Result<Functor, Ball> {
    let t = term.deref();
    match &t {
        Term::Var(_) => Err(instantiation_error()),
        _ => {
            let parts = t
                .match_struct("/", 2)
                .ok_or_else(|| type_error("predicate_indicator", &t))?;
            let name = match parts[0].deref() {
                Term::Atom(a) => a,
                Term::Var(_) => return Err(instantiation_error()),
                other => return Err(type_error("atom", &other)),
            };
            let arity = match parts[1].deref() {
                Term::Int(i) if i >= 0 => i as usize,
                Term::Int(i) => {
                    return Err(crate::error::domain_error(
                        "not_less_than_zero",
                        &Term::Int(i),
                    ))
                }
                Term::Var(_) => return Err(instantiation_error()),
                other => return Err(type_error("integer", &other)),
            };
            Ok(Functor::new(name, arity))
        }
    }
}
