//! The clause database: predicate key → ordered clause list, shared between
//! engines (concurrent reads, serialised writes) with change notifications
//! for per-engine caches.
//!
//! Clauses are stored frozen: variables are replaced by numbered slots at
//! insert time (see `term::renew`), so stored templates are immutable and
//! the map can be shared across threads. Each lookup hands out an
//! `Arc` snapshot of the clause vector; mutation replaces the vector
//! (copy-on-write), which gives every running iteration the logical update
//! view.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{permission_error, type_error, Ball};
use crate::term::renew::freeze;
use crate::term::{Atom, Functor, Term};

static NEXT_CLAUSE_ID: AtomicU64 = AtomicU64::new(1);

/// Outer shape of a clause head's first argument, used for first-argument
/// indexing. Indexing only skips clauses that cannot unify; solution order
/// is identical to the sequential scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgKey {
    /// Head argument is a variable: candidate for every call.
    Any,
    Atom(Atom),
    Int(i64),
    Functor(Functor),
    /// Float, decimal or opaque head argument; matched conservatively.
    Other,
}

impl ArgKey {
    fn of_template(arg: &Term) -> ArgKey {
        match arg {
            Term::Slot(_) | Term::Var(_) => ArgKey::Any,
            Term::Atom(a) => ArgKey::Atom(a.clone()),
            Term::Int(i) => ArgKey::Int(*i),
            Term::Struct(s) => ArgKey::Functor(s.functor.clone()),
            _ => ArgKey::Other,
        }
    }

    /// Can a clause with this key match a call whose first argument
    /// dereferences to `arg`?
    pub fn admits(&self, arg: &Term) -> bool {
        match (self, arg) {
            (ArgKey::Any, _) => true,
            (_, Term::Var(_)) => true,
            (ArgKey::Atom(a), Term::Atom(b)) => a == b,
            (ArgKey::Int(i), Term::Int(j)) => i == j,
            (ArgKey::Functor(f), Term::Struct(s)) => *f == s.functor,
            (ArgKey::Other, t) => !matches!(t, Term::Atom(_) | Term::Int(_) | Term::Struct(_)),
            _ => false,
        }
    }
}

/// A frozen clause template. Activation clones it with fresh variables.
#[derive(Debug)]
pub struct Clause {
    pub id: u64,
    pub head: Term,
    pub body: Term,
    pub nvars: u32,
    pub index_key: ArgKey,
}

impl Clause {
    /// Freeze a runtime `Head :- Body` pair into a template. The body is
    /// normalised so that variable goals become `call(V)`.
    pub fn new(head: &Term, body: &Term) -> Result<Arc<Clause>, Ball> {
        let head = head.deref();
        match &head {
            Term::Atom(_) | Term::Struct(_) => {}
            Term::Var(_) => return Err(crate::error::instantiation_error()),
            other => return Err(type_error("callable", other)),
        }
        let body = normalize_body(body)?;
        // Freeze head and body together so shared variables stay shared.
        let pair = Term::compound(":-", vec![head, body]);
        let (frozen, nvars) = freeze(&pair);
        let args = match frozen {
            Term::Struct(s) => s.args.clone(),
            _ => unreachable!("freeze changed the outer shape"),
        };
        let head = args[0].clone();
        let body = args[1].clone();
        let index_key = match &head {
            Term::Struct(s) => ArgKey::of_template(&s.args[0]),
            _ => ArgKey::Any,
        };
        Ok(Arc::new(Clause {
            id: NEXT_CLAUSE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            head,
            body,
            nvars,
            index_key,
        }))
    }

    pub fn key(&self) -> Functor {
        self.head
            .functor_of()
            .expect("clause head is atom or compound")
    }
}

/// Rewrite control positions of a body so that variable goals become
/// `call(V)`; anything non-callable is rejected here rather than at run
/// time.
fn normalize_body(body: &Term) -> Result<Term, Ball> {
    let body = body.deref();
    match &body {
        Term::Var(_) => Ok(Term::compound("call", vec![body])),
        Term::Atom(_) => Ok(body),
        Term::Struct(s) => {
            let name = s.functor.name().name();
            if s.functor.arity() == 2 && matches!(name, "," | ";" | "->") {
                let left = normalize_body(&s.args[0])?;
                let right = normalize_body(&s.args[1])?;
                Ok(Term::compound(name, vec![left, right]))
            } else {
                Ok(body)
            }
        }
        other => Err(type_error("callable", other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    /// Defined by clauses in this database.
    User,
    /// Implemented natively; not clause-backed.
    Builtin,
    /// Control construct handled by the resolution driver itself.
    Control,
}

/// Everything the driver needs to know about one predicate, snapshotted.
#[derive(Clone)]
pub struct PredicateView {
    pub kind: PredicateKind,
    pub dynamic: bool,
    pub library: bool,
    pub clauses: Arc<Vec<Arc<Clause>>>,
}

struct PredicateSlot {
    kind: PredicateKind,
    dynamic: bool,
    library: bool,
    clauses: Arc<Vec<Arc<Clause>>>,
}

/// Dirty-key set handed to a subscribed engine; its predicate cache drops
/// entries named here.
#[derive(Default)]
pub struct Notifier {
    dirty: Mutex<HashSet<Functor>>,
}

impl Notifier {
    pub fn take_dirty(&self) -> HashSet<Functor> {
        std::mem::take(&mut self.dirty.lock().expect("notifier poisoned"))
    }

    fn mark(&self, key: &Functor) {
        self.dirty
            .lock()
            .expect("notifier poisoned")
            .insert(key.clone());
    }
}

pub struct Database {
    preds: RwLock<HashMap<Functor, PredicateSlot>>,
    listeners: Mutex<HashMap<u64, Arc<Notifier>>>,
    next_listener: AtomicU64,
    generation: AtomicU64,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            preds: RwLock::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }
}

impl Database {
    pub fn new() -> Database {
        Database::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(AtomicOrdering::Acquire)
    }

    fn notify(&self, key: &Functor) {
        self.generation.fetch_add(1, AtomicOrdering::AcqRel);
        let listeners = self.listeners.lock().expect("listener set poisoned");
        for notifier in listeners.values() {
            notifier.mark(key);
        }
    }

    /// Register a change listener; the engine polls the notifier's dirty
    /// set to invalidate its predicate cache.
    pub fn subscribe(&self) -> (u64, Arc<Notifier>) {
        let id = self.next_listener.fetch_add(1, AtomicOrdering::Relaxed);
        let notifier = Arc::new(Notifier::default());
        self.listeners
            .lock()
            .expect("listener set poisoned")
            .insert(id, notifier.clone());
        (id, notifier)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .expect("listener set poisoned")
            .remove(&id);
    }

    pub fn lookup(&self, key: &Functor) -> Option<PredicateView> {
        let preds = self.preds.read().expect("database poisoned");
        preds.get(key).map(|slot| PredicateView {
            kind: slot.kind,
            dynamic: slot.dynamic,
            library: slot.library,
            clauses: slot.clauses.clone(),
        })
    }

    /// Create an empty dynamic predicate (the `:- dynamic(P/N)` directive).
    pub fn declare_dynamic(&self, key: &Functor) -> Result<(), Ball> {
        let mut preds = self.preds.write().expect("database poisoned");
        match preds.get_mut(key) {
            Some(slot)
                if slot.kind == PredicateKind::User
                    && !slot.library
                    && (slot.dynamic || slot.clauses.is_empty()) =>
            {
                slot.dynamic = true;
                Ok(())
            }
            Some(_) => Err(permission_error(
                "modify",
                "static_procedure",
                Term::indicator(key),
            )),
            None => {
                preds.insert(
                    key.clone(),
                    PredicateSlot {
                        kind: PredicateKind::User,
                        dynamic: true,
                        library: false,
                        clauses: Arc::new(Vec::new()),
                    },
                );
                drop(preds);
                self.notify(key);
                Ok(())
            }
        }
    }

    /// Add a clause. `first` prepends (`asserta`), otherwise appends.
    /// `from_assert` marks the predicate dynamic on creation and refuses to
    /// touch static procedures; the loader passes `false` and may extend
    /// static predicates it is creating.
    pub fn add_clause(
        &self,
        clause: Arc<Clause>,
        first: bool,
        from_assert: bool,
    ) -> Result<(), Ball> {
        let key = clause.key();
        let mut preds = self.preds.write().expect("database poisoned");
        let slot = preds.entry(key.clone()).or_insert_with(|| PredicateSlot {
            kind: PredicateKind::User,
            dynamic: from_assert,
            library: false,
            clauses: Arc::new(Vec::new()),
        });
        if slot.kind != PredicateKind::User || (from_assert && !slot.dynamic) || slot.library {
            return Err(permission_error(
                "modify",
                "static_procedure",
                Term::indicator(&key),
            ));
        }
        let mut clauses: Vec<Arc<Clause>> = slot.clauses.as_ref().clone();
        if first {
            clauses.insert(0, clause);
        } else {
            clauses.push(clause);
        }
        slot.clauses = Arc::new(clauses);
        drop(preds);
        self.notify(&key);
        Ok(())
    }

    /// Remove one clause by identity. `true` when something was removed.
    pub fn remove_clause(&self, key: &Functor, clause_id: u64) -> bool {
        let mut preds = self.preds.write().expect("database poisoned");
        let removed = match preds.get_mut(key) {
            Some(slot) => {
                let before = slot.clauses.len();
                let clauses: Vec<Arc<Clause>> = slot
                    .clauses
                    .iter()
                    .filter(|c| c.id != clause_id)
                    .cloned()
                    .collect();
                let removed = clauses.len() != before;
                slot.clauses = Arc::new(clauses);
                removed
            }
            None => false,
        };
        drop(preds);
        if removed {
            self.notify(key);
        }
        removed
    }

    /// Remove the predicate entirely; later lookups see an undefined
    /// procedure.
    pub fn abolish(&self, key: &Functor) -> Result<(), Ball> {
        let mut preds = self.preds.write().expect("database poisoned");
        match preds.get(key) {
            Some(slot) if slot.kind == PredicateKind::User && slot.dynamic && !slot.library => {
                preds.remove(key);
                drop(preds);
                self.notify(key);
                Ok(())
            }
            Some(_) => Err(permission_error(
                "modify",
                "static_procedure",
                Term::indicator(key),
            )),
            None => Ok(()),
        }
    }

    /// Record a natively implemented predicate so lookups and permission
    /// checks know the key is taken. Clause-backed operations on these
    /// slots are rejected by `add_clause`/`abolish`.
    pub fn register_native(&self, key: &Functor, kind: PredicateKind) {
        debug_assert_ne!(kind, PredicateKind::User);
        let mut preds = self.preds.write().expect("database poisoned");
        preds.entry(key.clone()).or_insert_with(|| PredicateSlot {
            kind,
            dynamic: false,
            library: false,
            clauses: Arc::new(Vec::new()),
        });
    }

    /// Mark a predicate as part of the bootstrap library (load-time only).
    pub fn seal_library(&self, key: &Functor) {
        let mut preds = self.preds.write().expect("database poisoned");
        if let Some(slot) = preds.get_mut(key) {
            slot.library = true;
        }
    }

    /// Keys of every user-visible predicate, for `current_predicate/1`.
    pub fn user_keys(&self) -> Vec<Functor> {
        let preds = self.preds.read().expect("database poisoned");
        let mut keys: Vec<Functor> = preds
            .iter()
            .filter(|(_, slot)| slot.kind == PredicateKind::User)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_by(|a, b| {
            a.name()
                .name()
                .cmp(b.name().name())
                .then_with(|| a.arity().cmp(&b.arity()))
        });
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(name: &str, arg: Term) -> Arc<Clause> {
        let head = Term::compound(name, vec![arg]);
        Clause::new(&head, &Term::atom("true")).expect("valid clause")
    }

    #[test]
    fn insertion_order_is_preserved() {
        let db = Database::new();
        let key = Functor::of("fact", 1);
        db.add_clause(fact("fact", Term::atom("a")), false, true)
            .unwrap();
        db.add_clause(fact("fact", Term::atom("b")), false, true)
            .unwrap();
        db.add_clause(fact("fact", Term::atom("z")), true, true)
            .unwrap();
        let view = db.lookup(&key).expect("predicate exists");
        let firsts: Vec<ArgKey> = view.clauses.iter().map(|c| c.index_key.clone()).collect();
        assert_eq!(
            firsts,
            vec![
                ArgKey::Atom(Atom::new("z")),
                ArgKey::Atom(Atom::new("a")),
                ArgKey::Atom(Atom::new("b")),
            ]
        );
        assert!(view.dynamic);
    }

    #[test]
    fn abolish_removes_the_predicate() {
        let db = Database::new();
        let key = Functor::of("fact", 1);
        db.add_clause(fact("fact", Term::atom("a")), false, true)
            .unwrap();
        db.abolish(&key).unwrap();
        assert!(db.lookup(&key).is_none());
    }

    #[test]
    fn static_predicates_reject_assert() {
        let db = Database::new();
        // Loader-created static predicate.
        db.add_clause(fact("rule", Term::atom("a")), false, false)
            .unwrap();
        let err = db
            .add_clause(fact("rule", Term::atom("b")), false, true)
            .unwrap_err();
        let args = err.term().match_struct("error", 2).unwrap();
        assert!(args[0].match_struct("permission_error", 3).is_some());
    }

    #[test]
    fn notifications_mark_dirty_keys() {
        let db = Database::new();
        let (id, notifier) = db.subscribe();
        db.add_clause(fact("fact", Term::atom("a")), false, true)
            .unwrap();
        let dirty = notifier.take_dirty();
        assert!(dirty.contains(&Functor::of("fact", 1)));
        assert!(notifier.take_dirty().is_empty());
        db.unsubscribe(id);
        db.add_clause(fact("fact", Term::atom("b")), false, true)
            .unwrap();
        assert!(notifier.take_dirty().is_empty());
    }

    #[test]
    fn variable_body_becomes_call() {
        let v = Term::var();
        let head = Term::compound("p", vec![Term::var()]);
        let clause = Clause::new(&head, &v).unwrap();
        match &clause.body {
            Term::Struct(s) => {
                assert_eq!(s.functor.name().name(), "call");
                assert!(matches!(s.args[0], Term::Slot(_)));
            }
            other => panic!("body not normalised: {:?}", other),
        }
    }

    #[test]
    fn index_key_admission() {
        let atom_key = ArgKey::Atom(Atom::new("a"));
        assert!(atom_key.admits(&Term::atom("a")));
        assert!(!atom_key.admits(&Term::atom("b")));
        assert!(atom_key.admits(&Term::var()));
        assert!(ArgKey::Any.admits(&Term::int(1)));
        let f_key = ArgKey::Functor(Functor::of("f", 2));
        assert!(f_key.admits(&Term::compound("f", vec![Term::int(1), Term::int(2)])));
        assert!(!f_key.admits(&Term::compound("f", vec![Term::int(1)])));
    }
}
