//! `is/2` and the arithmetic comparison family.

use std::cmp::Ordering;

use crate::arith::{compare_values, evaluate, Number};
use crate::builtins::{BuiltinExec, Mode, Registry};
use crate::error::{type_error, Ball};
use crate::solve::Machine;
use crate::term::Term;

pub(super) fn register(reg: &mut Registry) {
    reg.add("is", 2, is_2);
    reg.add("=:=", 2, |m, _, a| compare(m, a, &[Ordering::Equal]));
    reg.add("=\\=", 2, |m, _, a| {
        compare(m, a, &[Ordering::Less, Ordering::Greater])
    });
    reg.add("<", 2, |m, _, a| compare(m, a, &[Ordering::Less]));
    reg.add(">", 2, |m, _, a| compare(m, a, &[Ordering::Greater]));
    reg.add("=<", 2, |m, _, a| {
        compare(m, a, &[Ordering::Less, Ordering::Equal])
    });
    reg.add(">=", 2, |m, _, a| {
        compare(m, a, &[Ordering::Greater, Ordering::Equal])
    });
    reg.add("succ", 2, succ_2);
}

fn is_2(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let value = evaluate(&mut m.rng, &a[1])?.to_term();
    Ok(BuiltinExec::Det(m.unify_undo(&a[0], &value)))
}

fn compare(m: &mut Machine, a: &[Term], accept: &[Ordering]) -> Result<BuiltinExec, Ball> {
    let x = evaluate(&mut m.rng, &a[0])?;
    let y = evaluate(&mut m.rng, &a[1])?;
    Ok(BuiltinExec::Det(accept.contains(&compare_values(&x, &y))))
}

/// `succ(X, Y)`: Y is X+1 over the naturals, usable in both directions.
fn succ_2(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    match (a[0].deref(), a[1].deref()) {
        (Term::Int(x), _) => {
            if x < 0 {
                return Err(type_error("not_less_than_zero", &Term::Int(x)));
            }
            let next = x
                .checked_add(1)
                .ok_or_else(|| crate::error::evaluation_error("int_overflow"))?;
            Ok(BuiltinExec::Det(m.unify_undo(&a[1], &Term::Int(next))))
        }
        (Term::Var(_), Term::Int(y)) => {
            if y <= 0 {
                return Ok(BuiltinExec::Det(false));
            }
            Ok(BuiltinExec::Det(m.unify_undo(&a[0], &Term::Int(y - 1))))
        }
        (Term::Var(_), Term::Var(_)) => Err(crate::error::instantiation_error()),
        (other, _) if !matches!(other, Term::Var(_)) => Err(type_error("integer", &other)),
        (_, other) => Err(type_error("integer", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_helper_round_trip() {
        let n = Number::Int(3);
        assert!(matches!(n.to_term(), Term::Int(3)));
    }
}
