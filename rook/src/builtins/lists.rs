//! List-shaped builtins with native support: `length/2`, `between/3`,
//! `sort/2`, `msort/2`, `keysort/2`, `repeat/0`.

use std::cmp::Ordering;

use crate::builtins::{need_int, BuiltinExec, Mode, Registry};
use crate::choice::RetryState;
use crate::error::{instantiation_error, type_error, Ball};
use crate::solve::Machine;
use crate::term::order::compare_terms;
use crate::term::Term;

pub(super) fn register(reg: &mut Registry) {
    reg.add("length", 2, length_2);
    reg.add("between", 3, between_3);
    reg.add("sort", 2, |m, _, a| sorted(m, a, true));
    reg.add("msort", 2, |m, _, a| sorted(m, a, false));
    reg.add("keysort", 2, keysort_2);
    reg.add("repeat", 0, |_, _, _| {
        Ok(BuiltinExec::Nondet(RetryState::Repeat))
    });
}

fn length_2(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(RetryState::LengthGen {
        list,
        len,
        next,
        cap,
    }) = mode
    {
        return generate_length(m, list, len, next, cap);
    }
    match a[0].list_view() {
        Ok(items) => {
            let n = items.len() as i64;
            Ok(BuiltinExec::Det(m.unify_undo(&a[1], &Term::Int(n))))
        }
        Err((prefix, tail)) => match tail {
            Term::Var(_) => match a[1].deref() {
                Term::Int(n) => {
                    if n < 0 {
                        return Ok(BuiltinExec::Det(false));
                    }
                    let wanted = n as usize;
                    if wanted < prefix.len() {
                        return Ok(BuiltinExec::Det(false));
                    }
                    let fresh: Vec<Term> =
                        (0..wanted - prefix.len()).map(|_| Term::var()).collect();
                    let closed = Term::list(fresh);
                    Ok(BuiltinExec::Det(m.unify_undo(&tail, &closed)))
                }
                Term::Var(_) => {
                    // Enumerate lengths from the known prefix upward, up to
                    // the configured cap.
                    let cap = m.config.length_generation_cap;
                    generate_length(m, a[0].clone(), a[1].clone(), prefix.len(), cap)
                }
                other => Err(type_error("integer", &other)),
            },
            other => Err(type_error("list", &other)),
        },
    }
}

/// One step of open-ended list generation for `length/2`.
fn generate_length(
    m: &mut Machine,
    list: Term,
    len: Term,
    candidate: usize,
    cap: usize,
) -> Result<BuiltinExec, Ball> {
    if candidate > cap {
        log::debug!("length/2 generation stopped at cap {}", cap);
        return Ok(BuiltinExec::Det(false));
    }
    let fresh: Vec<Term> = (0..candidate).map(|_| Term::var()).collect();
    let attempt = Term::list(fresh);
    let ok = m.unify_undo(&list, &attempt) && m.unify_undo(&len, &Term::Int(candidate as i64));
    if ok {
        Ok(BuiltinExec::Nondet(RetryState::LengthGen {
            list,
            len,
            next: candidate + 1,
            cap,
        }))
    } else {
        // The prefix no longer admits this length; nothing longer will fit
        // a closed list either, but a partial list keeps growing.
        Ok(BuiltinExec::Det(false))
    }
}

fn between_3(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(RetryState::IntRange { var, next, hi }) = mode {
        return step_between(m, var, next, hi);
    }
    let lo = need_int(&a[0])?;
    let hi = need_int(&a[1])?;
    match a[2].deref() {
        Term::Int(x) => Ok(BuiltinExec::Det(lo <= x && x <= hi)),
        Term::Var(_) => {
            if lo > hi {
                return Ok(BuiltinExec::Det(false));
            }
            step_between(m, a[2].clone(), lo, hi)
        }
        other => Err(type_error("integer", &other)),
    }
}

fn step_between(m: &mut Machine, var: Term, next: i64, hi: i64) -> Result<BuiltinExec, Ball> {
    if next > hi {
        return Ok(BuiltinExec::Det(false));
    }
    if !m.unify_undo(&var, &Term::Int(next)) {
        return Ok(BuiltinExec::Det(false));
    }
    if next == hi {
        Ok(BuiltinExec::Det(true))
    } else {
        Ok(BuiltinExec::Nondet(RetryState::IntRange {
            var,
            next: next + 1,
            hi,
        }))
    }
}

fn proper_list(term: &Term) -> Result<Vec<Term>, Ball> {
    term.list_view().map_err(|(_, tail)| match tail {
        Term::Var(_) => instantiation_error(),
        _ => type_error("list", &term.deref()),
    })
}

/// `sort/2` (dedup) and `msort/2` (stable, keeps duplicates).
fn sorted(m: &mut Machine, a: &[Term], dedup: bool) -> Result<BuiltinExec, Ball> {
    let mut items = proper_list(&a[0])?;
    items.sort_by(compare_terms);
    if dedup {
        items.dedup_by(|x, y| compare_terms(x, y) == Ordering::Equal);
    }
    let sorted = Term::list(items);
    Ok(BuiltinExec::Det(m.unify_undo(&a[1], &sorted)))
}

fn keysort_2(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let items = proper_list(&a[0])?;
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let t = item.deref();
        match t.match_struct("-", 2) {
            Some(_) => pairs.push(t),
            None => {
                return Err(match t {
                    Term::Var(_) => instantiation_error(),
                    other => type_error("pair", &other),
                })
            }
        }
    }
    // Stable by key; pair order within equal keys is preserved.
    pairs.sort_by(|x, y| {
        let kx = &x.match_struct("-", 2).expect("pair")[0];
        let ky = &y.match_struct("-", 2).expect("pair")[0];
        compare_terms(kx, ky)
    });
    let sorted = Term::list(pairs);
    Ok(BuiltinExec::Det(m.unify_undo(&a[1], &sorted)))
}
