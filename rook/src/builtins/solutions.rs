//! All-solutions builtins: `findall/3`, `bagof/3`, `setof/3`, `forall/2`.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::builtins::{need_callable, solve_alts, BuiltinExec, Mode, Registry};
use crate::error::{instantiation_error, type_error, Ball};
use crate::solve::Machine;
use crate::term::order::compare_terms;
use crate::term::renew::term_variables;
use crate::term::{Term, VarRef};

pub(super) fn register(reg: &mut Registry) {
    reg.add("findall", 3, findall_3);
    reg.add("bagof", 3, |m, mode, a| collate(m, mode, a, false));
    reg.add("setof", 3, |m, mode, a| collate(m, mode, a, true));
    reg.add("forall", 2, forall_2);
}

fn findall_3(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let goal = need_callable(&a[1])?;
    match a[2].deref() {
        Term::Var(_) => {}
        t if t.list_view().is_ok() => {}
        t if t.list_view().err().map(|(_, tail)| matches!(tail, Term::Var(_))).unwrap_or(false) => {
        }
        other => return Err(type_error("list", &other)),
    }
    let items = m.collect_solutions(&goal, &a[0])?;
    let list = Term::list(items);
    Ok(BuiltinExec::Det(m.unify_undo(&a[2], &list)))
}

/// `forall(Cond, Action)`: no solution of Cond may fail Action. Scheduled
/// as `\+ (Cond, \+ Action)` under a private cut barrier.
fn forall_2(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let inner = Term::compound(
        ",",
        vec![a[0].clone(), Term::compound("\\+", vec![a[1].clone()])],
    );
    let goal = Term::compound("\\+", vec![inner]);
    let barrier = m.cp_depth();
    m.cont.push_goal(goal, barrier);
    Ok(BuiltinExec::Det(true))
}

/// Strip `V ^ Goal` existential quantifiers, collecting the quantified
/// variables.
fn strip_carets(goal: &Term, quantified: &mut Vec<VarRef>) -> Result<Term, Ball> {
    let mut current = goal.deref();
    loop {
        let next = match current.match_struct("^", 2) {
            Some(parts) => {
                quantified.extend(term_variables(&parts[0]));
                parts[1].deref()
            }
            None => return Ok(current),
        };
        current = next;
    }
}

/// Shared engine of `bagof/3` and `setof/3`: collect witness-template
/// pairs, group by witness, then enumerate the groups as alternatives.
fn collate(m: &mut Machine, mode: Mode, a: &[Term], sorted: bool) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(_) = mode {
        return solve_alts(m, mode, Term::nil(), || unreachable!());
    }
    let template = a[0].clone();
    let mut quantified = Vec::new();
    let goal = strip_carets(&a[1], &mut quantified)?;
    match &goal {
        Term::Var(_) => return Err(instantiation_error()),
        g if g.is_callable() => {}
        other => return Err(type_error("callable", other)),
    }

    // Witness: free variables of the goal, minus template and quantified.
    let mut bound = term_variables(&template);
    bound.extend(quantified);
    let witness_vars: Vec<VarRef> = term_variables(&goal)
        .into_iter()
        .filter(|v| !bound.contains(v))
        .collect();
    let witness = Term::list(witness_vars.iter().cloned().map(Term::Var).collect::<Vec<_>>());

    let pair = Term::compound("-", vec![witness.clone(), template]);
    let pairs = m.collect_solutions(&goal, &pair)?;
    if pairs.is_empty() {
        return Ok(BuiltinExec::Det(false));
    }

    // Group in first-occurrence order of the witness instance.
    let mut groups: Vec<(Term, Vec<Term>)> = Vec::new();
    for pair in &pairs {
        let parts = pair.match_struct("-", 2).expect("collector pair");
        let (key, item) = (parts[0].clone(), parts[1].clone());
        match groups
            .iter_mut()
            .find(|(k, _)| compare_terms(k, &key) == Ordering::Equal)
        {
            Some((_, items)) => items.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    if sorted {
        for (_, items) in groups.iter_mut() {
            items.sort_by(compare_terms);
            items.dedup_by(|a, b| compare_terms(a, b) == Ordering::Equal);
        }
        groups.sort_by(|(ka, _), (kb, _)| compare_terms(ka, kb));
    }

    let alts: VecDeque<Term> = groups
        .into_iter()
        .map(|(key, items)| Term::compound("-", vec![key, Term::list(items)]))
        .collect();
    let probe = Term::compound("-", vec![witness, a[2].clone()]);
    solve_alts(m, Mode::First, probe, move || Ok(alts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_stripping() {
        let x = Term::var();
        let goal = Term::compound(
            "^",
            vec![x.clone(), Term::compound("p", vec![x.clone(), Term::var()])],
        );
        let mut quantified = Vec::new();
        let inner = strip_carets(&goal, &mut quantified).unwrap();
        assert!(inner.match_struct("p", 2).is_some());
        assert_eq!(quantified.len(), 1);
    }
}
