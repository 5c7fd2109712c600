//! The term model: tagged variants for atoms, numbers, variables, compound
//! terms and host opaques, plus dereferencing and list plumbing.
//!
//! Sharing rules: atoms and functor tags are process-interned; compound
//! nodes are `Arc`-shared and logically immutable; variables are
//! `Arc`-owned interior-mutable cells bound through the trail discipline.
//! Frozen clause templates replace variables with inert `Slot` markers so
//! the shared database never holds a mutable cell.

pub mod atom;
pub mod number;
pub mod order;
pub mod renew;

pub use atom::{Atom, Functor};
pub use number::{Decimal, Flt, NumFault};

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// A logic variable: an interior-mutable cell with a monotone identity.
#[derive(Clone)]
pub struct VarRef(Arc<VarCell>);

struct VarCell {
    id: u64,
    name: Option<Box<str>>,
    binding: Mutex<Option<Term>>,
}

impl VarRef {
    pub fn fresh() -> VarRef {
        VarRef::named(None)
    }

    pub fn named(name: Option<&str>) -> VarRef {
        VarRef(Arc::new(VarCell {
            id: NEXT_VAR_ID.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.map(Box::from),
            binding: Mutex::new(None),
        }))
    }

    /// Monotone identity, stable within one execution.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn bound_to(&self) -> Option<Term> {
        self.0.binding.lock().expect("var cell poisoned").clone()
    }

    pub fn is_unbound(&self) -> bool {
        self.0.binding.lock().expect("var cell poisoned").is_none()
    }

    /// Set the binding. The caller records the binding on the trail.
    pub fn bind(&self, term: Term) {
        let mut slot = self.0.binding.lock().expect("var cell poisoned");
        debug_assert!(slot.is_none(), "rebinding a bound variable");
        *slot = Some(term);
    }

    /// Clear the binding; called only from trail rewind.
    pub fn unbind(&self) {
        *self.0.binding.lock().expect("var cell poisoned") = None;
    }
}

impl PartialEq for VarRef {
    fn eq(&self, other: &VarRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for VarRef {}

impl fmt::Debug for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "_{}#{}", name, self.id()),
            None => write!(f, "_G{}", self.id()),
        }
    }
}

/// A compound term: functor tag plus immutable argument vector.
#[derive(Debug)]
pub struct Structure {
    pub functor: Functor,
    pub args: Vec<Term>,
}

/// Host-defined payload carried through terms (stream handles). Only
/// identity equality.
#[derive(Clone)]
pub struct OpaqueRef(Arc<dyn OpaqueValue>);

pub trait OpaqueValue: Any + Send + Sync {
    fn tag(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl OpaqueRef {
    pub fn new(value: Arc<dyn OpaqueValue>) -> OpaqueRef {
        OpaqueRef(value)
    }

    pub fn tag(&self) -> &'static str {
        self.0.tag()
    }

    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &OpaqueRef) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}:{:x}>", self.tag(), self.addr())
    }
}

/// A Prolog term.
#[derive(Clone, Debug)]
pub enum Term {
    Atom(Atom),
    Int(i64),
    Float(Flt),
    Dec(Decimal),
    Var(VarRef),
    Struct(Arc<Structure>),
    /// Template placeholder; appears only inside frozen clauses, never in
    /// runtime terms.
    Slot(u32),
    Opaque(OpaqueRef),
}

impl Term {
    pub fn atom(name: &str) -> Term {
        Term::Atom(Atom::new(name))
    }

    pub fn int(i: i64) -> Term {
        Term::Int(i)
    }

    pub fn float(f: f64) -> Term {
        Term::Float(Flt::new(f))
    }

    pub fn var() -> Term {
        Term::Var(VarRef::fresh())
    }

    pub fn compound(name: &str, args: Vec<Term>) -> Term {
        debug_assert!(!args.is_empty(), "compound with no arguments");
        let functor = Functor::of(name, args.len());
        Term::Struct(Arc::new(Structure { functor, args }))
    }

    pub fn structure(functor: Functor, args: Vec<Term>) -> Term {
        debug_assert_eq!(functor.arity(), args.len());
        Term::Struct(Arc::new(Structure { functor, args }))
    }

    pub fn nil() -> Term {
        Term::atom("[]")
    }

    pub fn cons(head: Term, tail: Term) -> Term {
        Term::compound(".", vec![head, tail])
    }

    pub fn list(items: impl IntoIterator<Item = Term>) -> Term {
        Term::partial_list(items, Term::nil())
    }

    pub fn partial_list(items: impl IntoIterator<Item = Term>, tail: Term) -> Term {
        let items: Vec<Term> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Term::cons(item, acc))
    }

    /// `Name/Arity` predicate indicator term.
    pub fn indicator(functor: &Functor) -> Term {
        Term::compound(
            "/",
            vec![
                Term::Atom(functor.name().clone()),
                Term::Int(functor.arity() as i64),
            ],
        )
    }

    /// Follow the binding chain. Returns the binding target for a bound
    /// variable chain, or the final unbound variable. Does not allocate
    /// beyond reference-count bumps.
    pub fn deref(&self) -> Term {
        let mut current = self.clone();
        loop {
            match current {
                Term::Var(ref v) => match v.bound_to() {
                    Some(next) => current = next,
                    None => return current,
                },
                other => return other,
            }
        }
    }

    pub fn functor_of(&self) -> Option<Functor> {
        match self {
            Term::Struct(s) => Some(s.functor.clone()),
            Term::Atom(a) => Some(Functor::new(a.clone(), 0)),
            _ => None,
        }
    }

    pub fn is_atom_named(&self, name: &str) -> bool {
        matches!(self, Term::Atom(a) if a.name() == name)
    }

    pub fn is_nil(&self) -> bool {
        self.is_atom_named("[]")
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Term::Int(_) | Term::Float(_) | Term::Dec(_))
    }

    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            Term::Atom(_) | Term::Int(_) | Term::Float(_) | Term::Dec(_) | Term::Opaque(_)
        )
    }

    /// Callable: atom or compound. Callers dereference first.
    pub fn is_callable(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::Struct(_))
    }

    /// Matches a dereferenced compound against `name/arity` and yields its
    /// arguments.
    pub fn match_struct(&self, name: &str, arity: usize) -> Option<&[Term]> {
        match self {
            Term::Struct(s)
                if s.functor.arity() == arity && s.functor.name().name() == name =>
            {
                Some(&s.args)
            }
            _ => None,
        }
    }

    /// Walk a list term. `Ok(items)` for a proper list; `Err` carries the
    /// dereferenced non-nil tail (unbound variable or junk).
    pub fn list_view(&self) -> Result<Vec<Term>, (Vec<Term>, Term)> {
        let mut items = Vec::new();
        let mut tail = self.deref();
        loop {
            if tail.is_nil() {
                return Ok(items);
            }
            match tail.clone() {
                Term::Struct(s) if s.functor.name().name() == "." && s.functor.arity() == 2 => {
                    items.push(s.args[0].clone());
                    tail = s.args[1].deref();
                }
                other => return Err((items, other)),
            }
        }
    }
}

impl PartialEq for Term {
    /// Structural equivalence after dereferencing (`==/2`).
    fn eq(&self, other: &Term) -> bool {
        order::compare_terms(self, other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Term {}

impl fmt::Display for Term {
    /// Canonical, operator-free rendering; the `write` module does the
    /// operator-aware printing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::write::fmt_canonical(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deref_follows_chains() {
        let x = VarRef::fresh();
        let y = VarRef::fresh();
        x.bind(Term::Var(y.clone()));
        y.bind(Term::atom("end"));
        assert!(Term::Var(x.clone()).deref().is_atom_named("end"));
        y.unbind();
        match Term::Var(x).deref() {
            Term::Var(v) => assert_eq!(v, y),
            other => panic!("expected the unbound tail var, got {:?}", other),
        }
    }

    #[test]
    fn list_construction_and_view() {
        let l = Term::list(vec![Term::int(1), Term::int(2), Term::int(3)]);
        let items = l.list_view().expect("proper list");
        assert_eq!(items.len(), 3);
        assert!(Term::nil().list_view().expect("nil is a list").is_empty());

        let partial = Term::partial_list(vec![Term::int(1)], Term::var());
        let (seen, tail) = partial.list_view().unwrap_err();
        assert_eq!(seen.len(), 1);
        assert!(matches!(tail, Term::Var(_)));
    }

    #[test]
    fn match_struct_shape() {
        let t = Term::compound("point", vec![Term::int(1), Term::int(2)]);
        assert!(t.match_struct("point", 2).is_some());
        assert!(t.match_struct("point", 3).is_none());
        assert!(t.match_struct("line", 2).is_none());
    }

    #[test]
    fn var_identity() {
        let a = VarRef::fresh();
        let b = VarRef::fresh();
        assert_ne!(a, b);
        assert!(a.id() < b.id());
    }
}
