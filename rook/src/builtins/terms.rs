//! Term construction, inspection, comparison and copying.

use std::cmp::Ordering;

use crate::builtins::{need_bound, need_int, BuiltinExec, Registry};
use crate::error::{domain_error, instantiation_error, representation_error, type_error, Ball};
use crate::flags::MAX_ARITY;
use crate::solve::Machine;
use crate::term::order::compare_terms;
use crate::term::renew::{copy_term, term_variables};
use crate::term::Term;

pub(super) fn register(reg: &mut Registry) {
    reg.add("=", 2, |m, _, a| {
        Ok(BuiltinExec::Det(m.unify_undo(&a[0], &a[1])))
    });
    reg.add("\\=", 2, |m, _, a| {
        let mark = m.trail.mark();
        let unifies = m.unify(&a[0], &a[1]);
        m.trail.rewind_to(mark);
        Ok(BuiltinExec::Det(!unifies))
    });
    reg.add("unify_with_occurs_check", 2, |m, _, a| {
        let mark = m.trail.mark();
        if crate::unify::unify_with_occurs_check(&mut m.trail, &a[0], &a[1]) {
            Ok(BuiltinExec::Det(true))
        } else {
            m.trail.rewind_to(mark);
            Ok(BuiltinExec::Det(false))
        }
    });
    reg.add("==", 2, |_, _, a| {
        Ok(BuiltinExec::Det(compare_terms(&a[0], &a[1]) == Ordering::Equal))
    });
    reg.add("\\==", 2, |_, _, a| {
        Ok(BuiltinExec::Det(compare_terms(&a[0], &a[1]) != Ordering::Equal))
    });
    reg.add("@<", 2, |_, _, a| {
        Ok(BuiltinExec::Det(compare_terms(&a[0], &a[1]) == Ordering::Less))
    });
    reg.add("@>", 2, |_, _, a| {
        Ok(BuiltinExec::Det(
            compare_terms(&a[0], &a[1]) == Ordering::Greater,
        ))
    });
    reg.add("@=<", 2, |_, _, a| {
        Ok(BuiltinExec::Det(compare_terms(&a[0], &a[1]) != Ordering::Greater))
    });
    reg.add("@>=", 2, |_, _, a| {
        Ok(BuiltinExec::Det(compare_terms(&a[0], &a[1]) != Ordering::Less))
    });
    reg.add("compare", 3, compare_3);
    reg.add("functor", 3, functor_3);
    reg.add("arg", 3, arg_3);
    reg.add("=..", 2, univ_2);
    reg.add("copy_term", 2, |m, _, a| {
        let copy = copy_term(&a[0]);
        Ok(BuiltinExec::Det(m.unify_undo(&a[1], &copy)))
    });
    reg.add("term_variables", 2, |m, _, a| {
        let vars: Vec<Term> = term_variables(&a[0])
            .into_iter()
            .map(Term::Var)
            .collect();
        let list = Term::list(vars);
        Ok(BuiltinExec::Det(m.unify_undo(&a[1], &list)))
    });
}

fn compare_3(m: &mut Machine, _: super::Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let order = match compare_terms(&a[1], &a[2]) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    // A bound first argument must be a valid order atom.
    if let Term::Atom(atom) = a[0].deref() {
        if !matches!(atom.name(), "<" | "=" | ">") {
            return Err(domain_error("order", &Term::Atom(atom)));
        }
    }
    Ok(BuiltinExec::Det(m.unify_undo(&a[0], &Term::atom(order))))
}

fn functor_3(m: &mut Machine, _: super::Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    match a[0].deref() {
        Term::Var(_) => {
            // Construction mode.
            let name = need_bound(&a[1])?;
            let arity = need_int(&a[2])?;
            if arity < 0 {
                return Err(domain_error("not_less_than_zero", &Term::Int(arity)));
            }
            if arity > MAX_ARITY {
                return Err(representation_error("max_arity"));
            }
            let built = if arity == 0 {
                name
            } else {
                match &name {
                    Term::Atom(atom) => {
                        let args = (0..arity).map(|_| Term::var()).collect();
                        Term::compound(atom.name(), args)
                    }
                    other if other.is_atomic() => {
                        return Err(type_error("atom", other));
                    }
                    other => return Err(type_error("atomic", other)),
                }
            };
            Ok(BuiltinExec::Det(m.unify_undo(&a[0], &built)))
        }
        t => {
            let (name, arity) = match &t {
                Term::Struct(s) => (
                    Term::Atom(s.functor.name().clone()),
                    s.functor.arity() as i64,
                ),
                atomic => ((*atomic).clone(), 0),
            };
            let ok = m.unify_undo(&a[1], &name) && m.unify_undo(&a[2], &Term::Int(arity));
            Ok(BuiltinExec::Det(ok))
        }
    }
}

fn arg_3(m: &mut Machine, _: super::Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let n = need_int(&a[0])?;
    if n < 0 {
        return Err(domain_error("not_less_than_zero", &Term::Int(n)));
    }
    let target = match need_bound(&a[1])? {
        Term::Struct(s) => s,
        other => return Err(type_error("compound", &other)),
    };
    // Out-of-range argument positions fail quietly.
    if n == 0 || n as usize > target.args.len() {
        return Ok(BuiltinExec::Det(false));
    }
    let arg = target.args[n as usize - 1].clone();
    Ok(BuiltinExec::Det(m.unify_undo(&a[2], &arg)))
}

fn univ_2(m: &mut Machine, _: super::Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    match a[0].deref() {
        Term::Var(_) => {
            // Construct from the list.
            let items = a[1]
                .list_view()
                .map_err(|(_, tail)| match tail {
                    Term::Var(_) => instantiation_error(),
                    _ => type_error("list", &a[1].deref()),
                })?;
            let mut items = items.into_iter();
            let head = match items.next() {
                Some(head) => head.deref(),
                None => return Err(domain_error("non_empty_list", &Term::nil())),
            };
            let args: Vec<Term> = items.collect();
            let built = if args.is_empty() {
                if head.is_callable() || head.is_atomic() {
                    head
                } else {
                    return Err(type_error("atomic", &head));
                }
            } else {
                match &head {
                    Term::Atom(atom) => {
                        if args.len() as i64 > MAX_ARITY {
                            return Err(representation_error("max_arity"));
                        }
                        Term::compound(atom.name(), args)
                    }
                    Term::Var(_) => return Err(instantiation_error()),
                    other => return Err(type_error("atom", other)),
                }
            };
            Ok(BuiltinExec::Det(m.unify_undo(&a[0], &built)))
        }
        t => {
            let list = match &t {
                Term::Struct(s) => {
                    let mut items = vec![Term::Atom(s.functor.name().clone())];
                    items.extend(s.args.iter().cloned());
                    Term::list(items)
                }
                atomic => Term::list(vec![(*atomic).clone()]),
            };
            Ok(BuiltinExec::Det(m.unify_undo(&a[1], &list)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn standard_order_tests_are_registered() {
        let reg = crate::builtins::registry();
        for name in ["==", "\\==", "@<", "@>", "@=<", "@>=", "compare"] {
            let arity = if name == "compare" { 3 } else { 2 };
            assert!(
                reg.contains(&crate::term::Functor::of(name, arity)),
                "{} missing",
                name
            );
        }
    }

    #[test]
    fn univ_shapes() {
        // Checked through the registry path in the engine integration
        // tests; here only the decomposition helper shape.
        let t = Term::compound("f", vec![Term::atom("a"), Term::int(1)]);
        match &t {
            Term::Struct(s) => assert_eq!(s.functor.arity(), 2),
            _ => unreachable!(),
        }
    }
}
