//! Process-wide atom and functor interning.
//!
//! Atoms are interned once per process; equality after interning is pointer
//! identity, which makes atom comparison and predicate lookup cheap. The
//! tables are never pruned.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, RwLock};

static ATOMS: OnceLock<RwLock<HashMap<Box<str>, Atom>>> = OnceLock::new();
static FUNCTORS: OnceLock<RwLock<HashMap<(Atom, usize), Functor>>> = OnceLock::new();

fn atom_table() -> &'static RwLock<HashMap<Box<str>, Atom>> {
    ATOMS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn functor_table() -> &'static RwLock<HashMap<(Atom, usize), Functor>> {
    FUNCTORS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// An interned symbol. Cloning is a reference-count bump; comparison is
/// pointer identity.
#[derive(Clone)]
pub struct Atom(Arc<str>);

impl Atom {
    /// Intern `name`, returning the canonical `Atom` for it.
    ///
    /// The fast path is a read-locked lookup; insertion re-checks under the
    /// write lock so concurrent interners of the same name converge on one
    /// representative.
    pub fn new(name: &str) -> Atom {
        {
            let table = atom_table().read().expect("atom table poisoned");
            if let Some(atom) = table.get(name) {
                return atom.clone();
            }
        }
        let mut table = atom_table().write().expect("atom table poisoned");
        if let Some(atom) = table.get(name) {
            return atom.clone();
        }
        let atom = Atom(Arc::from(name));
        table.insert(Box::from(name), atom.clone());
        atom
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Stable identity for ordering variables-free contexts (hashing, maps).
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Atom) -> bool {
        // Interning guarantees content equality implies identity.
        std::ptr::eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.name())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interned (name, arity) pair identifying a compound term's shape. Also
/// serves as the predicate key in the clause database.
#[derive(Clone)]
pub struct Functor(Arc<FunctorData>);

struct FunctorData {
    name: Atom,
    arity: usize,
}

impl Functor {
    pub fn new(name: Atom, arity: usize) -> Functor {
        {
            let table = functor_table().read().expect("functor table poisoned");
            if let Some(tag) = table.get(&(name.clone(), arity)) {
                return tag.clone();
            }
        }
        let mut table = functor_table().write().expect("functor table poisoned");
        if let Some(tag) = table.get(&(name.clone(), arity)) {
            return tag.clone();
        }
        let tag = Functor(Arc::new(FunctorData {
            name: name.clone(),
            arity,
        }));
        table.insert((name, arity), tag.clone());
        tag
    }

    pub fn of(name: &str, arity: usize) -> Functor {
        Functor::new(Atom::new(name), arity)
    }

    pub fn name(&self) -> &Atom {
        &self.0.name
    }

    pub fn arity(&self) -> usize {
        self.0.arity
    }
}

impl PartialEq for Functor {
    fn eq(&self, other: &Functor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Functor {}

impl Hash for Functor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Functor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.name, self.0.arity)
    }
}

impl fmt::Display for Functor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.name, self.0.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_identity() {
        let a = Atom::new("foo");
        let b = Atom::new("foo");
        let c = Atom::new("bar");
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert_ne!(a, c);
    }

    #[test]
    fn functor_interning() {
        let f = Functor::of("point", 2);
        let g = Functor::of("point", 2);
        let h = Functor::of("point", 3);
        assert_eq!(f, g);
        assert_ne!(f, h);
        assert_eq!(f.name().name(), "point");
        assert_eq!(h.arity(), 3);
    }

    #[test]
    fn empty_and_unicode_atoms() {
        let e = Atom::new("");
        assert_eq!(e.name(), "");
        let u = Atom::new("héllo");
        assert_eq!(u, Atom::new("héllo"));
    }
}
