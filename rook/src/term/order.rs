//! Standard order of terms: `Var < Number < Atom < Struct`, used by
//! `compare/3`, the `@</2` family and `sort/2`.

use std::cmp::Ordering;

use super::{Term, VarRef};

fn bucket(term: &Term) -> u8 {
    match term {
        Term::Var(_) | Term::Slot(_) => 0,
        Term::Int(_) | Term::Float(_) | Term::Dec(_) => 1,
        Term::Atom(_) => 2,
        Term::Opaque(_) => 3,
        Term::Struct(_) => 4,
    }
}

/// Sub-bucket rank breaking value ties between numeric variants.
fn numeric_rank(term: &Term) -> u8 {
    match term {
        Term::Float(_) => 0,
        Term::Int(_) => 1,
        Term::Dec(_) => 2,
        _ => unreachable!("numeric_rank on non-number"),
    }
}

fn compare_numbers(a: &Term, b: &Term) -> Ordering {
    use super::Decimal;
    let by_value = match (a, b) {
        (Term::Int(x), Term::Int(y)) => x.cmp(y),
        (Term::Float(x), Term::Float(y)) => x.value.total_cmp(&y.value),
        (Term::Dec(x), Term::Dec(y)) => x.compare(y),
        (Term::Int(x), Term::Dec(y)) => Decimal::from_int(*x).compare(y),
        (Term::Dec(x), Term::Int(y)) => x.compare(&Decimal::from_int(*y)),
        (Term::Int(x), Term::Float(y)) => (*x as f64).total_cmp(&y.value),
        (Term::Float(x), Term::Int(y)) => x.value.total_cmp(&(*y as f64)),
        (Term::Dec(x), Term::Float(y)) => x.to_f64().total_cmp(&y.value),
        (Term::Float(x), Term::Dec(y)) => x.value.total_cmp(&y.to_f64()),
        _ => unreachable!("compare_numbers on non-numbers"),
    };
    by_value.then_with(|| numeric_rank(a).cmp(&numeric_rank(b)))
}

fn var_key(term: &Term) -> u64 {
    match term {
        Term::Var(v) => v.id(),
        Term::Slot(i) => *i as u64,
        _ => unreachable!(),
    }
}

/// Total order over dereferenced terms. Iterative so deep structures cannot
/// exhaust the call stack.
pub fn compare_terms(a: &Term, b: &Term) -> Ordering {
    let mut work: Vec<(Term, Term)> = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = work.pop() {
        let a = a.deref();
        let b = b.deref();
        let ordering = match bucket(&a).cmp(&bucket(&b)) {
            Ordering::Equal => match (&a, &b) {
                (Term::Var(_), _) | (Term::Slot(_), _) => var_key(&a).cmp(&var_key(&b)),
                (Term::Atom(x), Term::Atom(y)) => x.name().cmp(y.name()),
                (Term::Opaque(x), Term::Opaque(y)) => x.addr().cmp(&y.addr()),
                (Term::Struct(x), Term::Struct(y)) => {
                    let shape = x
                        .functor
                        .arity()
                        .cmp(&y.functor.arity())
                        .then_with(|| x.functor.name().name().cmp(y.functor.name().name()));
                    if shape != Ordering::Equal {
                        shape
                    } else {
                        // Leftmost argument decides: push right-to-left.
                        for pair in x.args.iter().zip(y.args.iter()).rev() {
                            work.push((pair.0.clone(), pair.1.clone()));
                        }
                        continue;
                    }
                }
                _ => compare_numbers(&a, &b),
            },
            unequal => unequal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// `true` when `sub` occurs (by identity) inside `term`; the occurs check.
pub fn occurs_in(var: &VarRef, term: &Term) -> bool {
    let mut work = vec![term.clone()];
    while let Some(t) = work.pop() {
        match t.deref() {
            Term::Var(v) => {
                if v == *var {
                    return true;
                }
            }
            Term::Struct(s) => work.extend(s.args.iter().cloned()),
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Flt;

    #[test]
    fn bucket_order() {
        let v = Term::var();
        let n = Term::int(0);
        let a = Term::atom("a");
        let s = Term::compound("f", vec![Term::atom("x")]);
        assert_eq!(compare_terms(&v, &n), Ordering::Less);
        assert_eq!(compare_terms(&n, &a), Ordering::Less);
        assert_eq!(compare_terms(&a, &s), Ordering::Less);
    }

    #[test]
    fn numbers_by_value_then_variant() {
        assert_eq!(
            compare_terms(&Term::int(1), &Term::int(2)),
            Ordering::Less
        );
        // Same value: float sorts before integer.
        assert_eq!(
            compare_terms(&Term::Float(Flt::new(1.0)), &Term::int(1)),
            Ordering::Less
        );
        assert_eq!(
            compare_terms(&Term::float(1.5), &Term::int(1)),
            Ordering::Greater
        );
    }

    #[test]
    fn compounds_by_arity_then_name_then_args() {
        let f1 = Term::compound("f", vec![Term::atom("a")]);
        let g2 = Term::compound("g", vec![Term::atom("a"), Term::atom("b")]);
        assert_eq!(compare_terms(&f1, &g2), Ordering::Less);

        let fa = Term::compound("f", vec![Term::atom("a")]);
        let fb = Term::compound("f", vec![Term::atom("b")]);
        assert_eq!(compare_terms(&fa, &fb), Ordering::Less);

        let ga = Term::compound("g", vec![Term::atom("a")]);
        assert_eq!(compare_terms(&fb, &ga), Ordering::Less);
    }

    #[test]
    fn deref_transparent() {
        let v = crate::term::VarRef::fresh();
        v.bind(Term::atom("bound"));
        assert_eq!(
            compare_terms(&Term::Var(v), &Term::atom("bound")),
            Ordering::Equal
        );
    }

    #[test]
    fn occurs_check_helper() {
        let v = crate::term::VarRef::fresh();
        let inner = Term::compound("f", vec![Term::Var(v.clone())]);
        assert!(occurs_in(&v, &inner));
        assert!(!occurs_in(&v, &Term::compound("f", vec![Term::atom("a")])));
    }
}
