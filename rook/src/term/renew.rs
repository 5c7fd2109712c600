//! Structure-sharing term rebuilds: clause freezing, activation and
//! `copy_term/2`.
//!
//! All walks use an explicit work stack; deeply nested terms must not
//! exhaust the call stack. Rebuilt nodes share every subtree in which no
//! leaf was replaced.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Structure, Term, VarRef};

enum Task {
    Enter(Term),
    Exit(Arc<Structure>),
}

/// Rebuild `term` bottom-up, applying `map` to every dereferenced
/// non-compound node. `None` keeps the node; subtrees with no replacements
/// are shared, not copied.
fn rebuild(term: &Term, map: &mut impl FnMut(&Term) -> Option<Term>) -> Term {
    let mut work = vec![Task::Enter(term.clone())];
    // (value, changed-from-original)
    let mut done: Vec<(Term, bool)> = Vec::new();
    while let Some(task) = work.pop() {
        match task {
            Task::Enter(t) => {
                let t = t.deref();
                match t {
                    Term::Struct(s) => {
                        work.push(Task::Exit(s.clone()));
                        for arg in s.args.iter().rev() {
                            work.push(Task::Enter(arg.clone()));
                        }
                    }
                    leaf => match map(&leaf) {
                        Some(replacement) => done.push((replacement, true)),
                        None => done.push((leaf, false)),
                    },
                }
            }
            Task::Exit(s) => {
                let n = s.args.len();
                let rebuilt: Vec<(Term, bool)> = done.split_off(done.len() - n);
                if rebuilt.iter().any(|(_, changed)| *changed) {
                    let args = rebuilt.into_iter().map(|(t, _)| t).collect();
                    done.push((
                        Term::Struct(Arc::new(Structure {
                            functor: s.functor.clone(),
                            args,
                        })),
                        true,
                    ));
                } else {
                    done.push((Term::Struct(s), false));
                }
            }
        }
    }
    debug_assert_eq!(done.len(), 1);
    done.pop().expect("rebuild produced no result").0
}

/// Freeze a runtime term into a clause template: every distinct unbound
/// variable becomes a numbered slot. Returns the template and the number of
/// distinct variables.
pub fn freeze(term: &Term) -> (Term, u32) {
    let mut slots: HashMap<u64, u32> = HashMap::new();
    let template = rebuild(term, &mut |leaf| match leaf {
        Term::Var(v) => {
            let next = slots.len() as u32;
            let slot = *slots.entry(v.id()).or_insert(next);
            Some(Term::Slot(slot))
        }
        _ => None,
    });
    (template, slots.len() as u32)
}

/// Activate a frozen template: every slot becomes the corresponding fresh
/// variable from `vars`, the same slot mapping to the same variable across
/// the whole term. Structural parents without slots are shared with the
/// template.
pub fn activate(template: &Term, vars: &[VarRef]) -> Term {
    rebuild(template, &mut |leaf| match leaf {
        Term::Slot(i) => Some(Term::Var(vars[*i as usize].clone())),
        _ => None,
    })
}

/// Allocate the fresh variable vector for one clause activation.
pub fn fresh_vars(count: u32) -> Vec<VarRef> {
    (0..count).map(|_| VarRef::fresh()).collect()
}

/// `copy_term/2`: structurally identical term with every unbound variable
/// replaced by a fresh one, identical variables staying identical.
pub fn copy_term(term: &Term) -> Term {
    let mut fresh: HashMap<u64, VarRef> = HashMap::new();
    rebuild(term, &mut |leaf| match leaf {
        Term::Var(v) => {
            let copy = fresh.entry(v.id()).or_insert_with(VarRef::fresh);
            Some(Term::Var(copy.clone()))
        }
        _ => None,
    })
}

/// The unbound variables of `term` in first-occurrence, left-to-right order.
pub fn term_variables(term: &Term) -> Vec<VarRef> {
    let mut seen: Vec<VarRef> = Vec::new();
    let mut work = vec![term.clone()];
    while let Some(t) = work.pop() {
        match t.deref() {
            Term::Var(v) => {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
            Term::Struct(s) => {
                for arg in s.args.iter().rev() {
                    work.push(arg.clone());
                }
            }
            _ => {}
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn freeze_numbers_shared_variables_once() {
        let x = Term::var();
        let t = Term::compound("f", vec![x.clone(), Term::atom("a"), x.clone()]);
        let (template, nvars) = freeze(&t);
        assert_eq!(nvars, 1);
        match template {
            Term::Struct(s) => {
                assert!(matches!(s.args[0], Term::Slot(0)));
                assert!(matches!(s.args[2], Term::Slot(0)));
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn activation_produces_fresh_but_shared_vars() {
        let x = Term::var();
        let t = Term::compound("f", vec![x.clone(), x.clone()]);
        let (template, nvars) = freeze(&t);
        let vars = fresh_vars(nvars);
        let activated = activate(&template, &vars);
        match activated {
            Term::Struct(s) => match (&s.args[0], &s.args[1]) {
                (Term::Var(a), Term::Var(b)) => {
                    assert_eq!(a, b);
                    if let Term::Var(orig) = &x {
                        assert_ne!(a, orig);
                    }
                }
                other => panic!("expected two vars, got {:?}", other),
            },
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn ground_subtrees_are_shared() {
        let ground = Term::compound("g", vec![Term::int(1), Term::int(2)]);
        let t = Term::compound("f", vec![ground.clone(), Term::var()]);
        let copy = copy_term(&t);
        match (&t, &copy) {
            (Term::Struct(orig), Term::Struct(copied)) => {
                match (&orig.args[0], &copied.args[0]) {
                    (Term::Struct(a), Term::Struct(b)) => {
                        assert!(Arc::ptr_eq(a, b), "ground subtree must be shared");
                    }
                    _ => panic!("expected structs"),
                }
            }
            _ => panic!("expected structs"),
        }
    }

    #[test]
    fn copy_term_detaches_bindings() {
        let v = crate::term::VarRef::fresh();
        let t = Term::compound("f", vec![Term::Var(v.clone())]);
        let copy = copy_term(&t);
        v.bind(Term::atom("bound"));
        // The copy's variable must remain unbound.
        match copy {
            Term::Struct(s) => match s.args[0].deref() {
                Term::Var(_) => {}
                other => panic!("copy was affected by binding: {:?}", other),
            },
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let mut t = Term::atom("end");
        for _ in 0..200_000 {
            t = Term::compound("s", vec![t]);
        }
        let copy = copy_term(&t);
        assert!(matches!(copy, Term::Struct(_)));
        let vars = term_variables(&t);
        assert!(vars.is_empty());
    }

    #[test]
    fn term_variables_order() {
        let a = Term::var();
        let b = Term::var();
        let t = Term::compound("f", vec![b.clone(), a.clone(), b.clone()]);
        let vars = term_variables(&t);
        assert_eq!(vars.len(), 2);
        if let (Term::Var(vb), Term::Var(va)) = (&b, &a) {
            assert_eq!(&vars[0], vb);
            assert_eq!(&vars[1], va);
        }
    }
}
