//! Control conveniences, operator table access, flags and `phrase/2,3`.

use std::collections::VecDeque;

use crate::builtins::{need_atom, need_callable, solve_alts, BuiltinExec, Mode, Registry};
use crate::error::{domain_error, instantiation_error, type_error, Ball};
use crate::ops::OpSpec;
use crate::solve::Machine;
use crate::term::Term;

pub(super) fn register(reg: &mut Registry) {
    reg.add("once", 1, |m, _, a| {
        let goal = need_callable(&a[0])?;
        let barrier = m.cp_depth();
        m.schedule_ite(goal, Term::atom("true"), Term::atom("fail"), barrier);
        Ok(BuiltinExec::Det(true))
    });
    reg.add("ignore", 1, |m, _, a| {
        let goal = need_callable(&a[0])?;
        let barrier = m.cp_depth();
        m.schedule_ite(goal, Term::atom("true"), Term::atom("true"), barrier);
        Ok(BuiltinExec::Det(true))
    });
    reg.add("op", 3, op_3);
    reg.add("current_op", 3, current_op_3);
    reg.add("set_prolog_flag", 2, |m, _, a| {
        m.flags.set(&a[0], &a[1])?;
        Ok(BuiltinExec::Det(true))
    });
    reg.add("current_prolog_flag", 2, current_prolog_flag_2);
    reg.add("phrase", 2, |m, _, a| phrase(m, &a[0], &a[1], Term::nil()));
    reg.add("phrase", 3, |m, _, a| {
        phrase(m, &a[0], &a[1], a[2].clone())
    });
}

fn op_3(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let priority = match a[0].deref() {
        Term::Var(_) => return Err(instantiation_error()),
        Term::Int(p) if (0..=1200).contains(&p) => p as u16,
        Term::Int(p) => return Err(domain_error("operator_priority", &Term::Int(p))),
        other => return Err(type_error("integer", &other)),
    };
    let spec_atom = need_atom(&a[1])?;
    let spec = OpSpec::parse(spec_atom.name())
        .ok_or_else(|| domain_error("operator_specifier", &Term::Atom(spec_atom.clone())))?;
    let names = match a[2].deref() {
        Term::Var(_) => return Err(instantiation_error()),
        t @ Term::Atom(_) => vec![t],
        t => t
            .list_view()
            .map_err(|_| type_error("atom", &t))?,
    };
    for name in names {
        let atom = match name.deref() {
            Term::Atom(a) => a,
            Term::Var(_) => return Err(instantiation_error()),
            other => return Err(type_error("atom", &other)),
        };
        m.ops.define(priority, spec, atom.name())?;
    }
    Ok(BuiltinExec::Det(true))
}

fn current_op_3(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(_) = mode {
        return solve_alts(m, mode, Term::nil(), || unreachable!());
    }
    let alts: VecDeque<Term> = m
        .ops
        .snapshot()
        .into_iter()
        .map(|(priority, spec, name)| {
            Term::compound(
                "op",
                vec![
                    Term::Int(priority as i64),
                    Term::atom(spec.name()),
                    Term::atom(&name),
                ],
            )
        })
        .collect();
    let probe = Term::compound("op", vec![a[0].clone(), a[1].clone(), a[2].clone()]);
    solve_alts(m, Mode::First, probe, move || Ok(alts))
}

fn current_prolog_flag_2(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(_) = mode {
        return solve_alts(m, mode, Term::nil(), || unreachable!());
    }
    if let Term::Atom(flag) = a[0].deref() {
        if m.flags.get(flag.name()).is_none() {
            return Err(domain_error("prolog_flag", &Term::Atom(flag)));
        }
    }
    let alts: VecDeque<Term> = m
        .flags
        .snapshot()
        .into_iter()
        .map(|(name, value)| Term::compound("-", vec![Term::atom(name), value]))
        .collect();
    let probe = Term::compound("-", vec![a[0].clone(), a[1].clone()]);
    solve_alts(m, Mode::First, probe, move || Ok(alts))
}

/// `phrase(NonTerminal, List, Rest)`: call the grammar body with the
/// difference list threaded through.
fn phrase(m: &mut Machine, nt: &Term, list: &Term, rest: Term) -> Result<BuiltinExec, Ball> {
    let nt = need_callable(nt)?;
    let goal = crate::dcg::extend_nonterminal(&nt, list.clone(), rest)?;
    let barrier = m.cp_depth();
    m.cont.push_goal(goal, barrier);
    Ok(BuiltinExec::Det(true))
}
