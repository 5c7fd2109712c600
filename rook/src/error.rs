//! Error types for the rook engine.
//!
//! Two layers: [`RookError`] is the host-facing error enum for embedding
//! code, and [`Ball`] is a thrown Prolog term travelling through the
//! engine until a `catch/3` matches it. ISO error balls are built by the
//! constructor functions below and always have the shape
//! `error(Formal, Context)`.

use thiserror::Error;

use crate::term::Term;

/// Result type alias for engine operations.
pub type RookResult<T> = Result<T, RookError>;

/// Errors surfaced to the embedding host.
#[derive(Error, Debug)]
pub enum RookError {
    /// The reader rejected source text.
    #[error("syntax error at line {line}: {detail}")]
    Syntax { line: usize, detail: String },

    /// A goal threw and no `catch/3` matched.
    #[error("uncaught exception: {0}")]
    Uncaught(Term),

    /// `halt/0,1` was executed; the engine refuses further work until the
    /// next goal is prepared.
    #[error("engine halted with exit code {0}")]
    Halted(i32),

    /// Goal-lifecycle misuse (stepping a stopped or parked goal).
    #[error("no active goal for this operation")]
    NoActiveGoal,

    /// A prepared goal term was a variable or not callable.
    #[error("goal is not callable: {0}")]
    NotCallable(Term),

    /// Internal invariant violation; the goal is aborted and must be
    /// re-prepared.
    #[error("internal engine fault: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A thrown Prolog term in flight.
#[derive(Debug, Clone)]
pub struct Ball(pub Term);

impl Ball {
    pub fn new(term: Term) -> Ball {
        Ball(term)
    }

    pub fn term(&self) -> &Term {
        &self.0
    }

    pub fn into_term(self) -> Term {
        self.0
    }
}

/// `error(Formal, Context)` with an unbound context.
fn iso(formal: Term) -> Ball {
    Ball(Term::compound("error", vec![formal, Term::var()]))
}

/// `error(Formal, Name/Arity)` when the raising site knows its caller.
pub fn iso_with_pi(formal: Term, name: &str, arity: usize) -> Ball {
    let pi = Term::compound("/", vec![Term::atom(name), Term::int(arity as i64)]);
    Ball(Term::compound("error", vec![formal, pi]))
}

pub fn instantiation_error() -> Ball {
    iso(Term::atom("instantiation_error"))
}

pub fn type_error(expected: &str, culprit: &Term) -> Ball {
    iso(Term::compound(
        "type_error",
        vec![Term::atom(expected), culprit.clone()],
    ))
}

pub fn domain_error(domain: &str, culprit: &Term) -> Ball {
    iso(Term::compound(
        "domain_error",
        vec![Term::atom(domain), culprit.clone()],
    ))
}

pub fn existence_error(object_type: &str, what: Term) -> Ball {
    iso(Term::compound(
        "existence_error",
        vec![Term::atom(object_type), what],
    ))
}

pub fn permission_error(operation: &str, object_type: &str, what: Term) -> Ball {
    iso(Term::compound(
        "permission_error",
        vec![Term::atom(operation), Term::atom(object_type), what],
    ))
}

pub fn representation_error(what: &str) -> Ball {
    iso(Term::compound(
        "representation_error",
        vec![Term::atom(what)],
    ))
}

pub fn evaluation_error(what: &str) -> Ball {
    iso(Term::compound("evaluation_error", vec![Term::atom(what)]))
}

pub fn syntax_error(detail: &str) -> Ball {
    iso(Term::compound("syntax_error", vec![Term::atom(detail)]))
}

pub fn system_error(cause: &str) -> Ball {
    iso(Term::compound("system_error", vec![Term::atom(cause)]))
}

/// Map an arithmetic fault onto its ISO evaluation error.
pub fn eval_fault(fault: crate::term::NumFault) -> Ball {
    use crate::term::NumFault::*;
    match fault {
        IntOverflow => evaluation_error("int_overflow"),
        ZeroDivisor => evaluation_error("zero_divisor"),
        Undefined => evaluation_error("undefined"),
        FloatOverflow => evaluation_error("float_overflow"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_balls_have_error_2_shape() {
        let ball = type_error("callable", &Term::int(3));
        let t = ball.term();
        let args = t.match_struct("error", 2).expect("error/2");
        let formal = args[0].match_struct("type_error", 2).expect("type_error/2");
        assert!(formal[0].is_atom_named("callable"));
        assert!(matches!(args[1].deref(), Term::Var(_)));
    }

    #[test]
    fn pi_context() {
        let ball = iso_with_pi(Term::atom("instantiation_error"), "atom_length", 2);
        let args = ball.term().match_struct("error", 2).unwrap();
        let pi = args[1].match_struct("/", 2).expect("pi");
        assert!(pi[0].is_atom_named("atom_length"));
    }
}
