//! Rook: an embedded ISO Prolog engine.
//!
//! Rook reads Prolog source text, compiles it into an internal clause
//! database, and executes goals by SLD resolution with depth-first search,
//! backtracking and the cut. Hosts submit a goal term and iterate its
//! solutions; variable bindings are inspected between iterations.
//!
//! # Architecture
//!
//! - `term`: tagged term model with interned atoms and functor tags
//! - `trail` / `unify` / `choice`: the transactional backtracking core
//! - `database`: shared clause store with change notifications
//! - `solve` + `meta`: the push-down resolution driver, cut, catch/throw
//! - `arith`: the arithmetic evaluator with Int/Float/Decimal promotion
//! - `builtins`: the native predicate registry
//! - `read` / `write` / `ops`: text in and out, operator-table driven
//! - `engine`: the goal-lifecycle façade hosts embed
//!
//! # Example
//!
//! ```
//! use rook::Engine;
//!
//! let mut engine = Engine::new().expect("engine");
//! engine.consult_str("parent(tom, mary). parent(tom, james).").unwrap();
//!
//! let solutions = engine.query("parent(tom, X)").unwrap();
//! assert_eq!(solutions.len(), 2);
//! ```

pub mod arith;
pub mod builtins;
pub mod choice;
pub mod config;
pub mod database;
pub mod dcg;
pub mod engine;
pub mod error;
pub mod flags;
pub mod library;
pub mod meta;
pub mod ops;
pub mod read;
pub mod solve;
pub mod stream;
pub mod term;
pub mod trail;
pub mod unify;
pub mod write;

// Re-export the embedding surface.
pub use config::EngineConfig;
pub use database::Database;
pub use engine::{Engine, Exec, GoalHandle, Solution};
pub use error::{Ball, RookError, RookResult};
pub use term::{Atom, Functor, Term};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ENGINE_NAME: &str = "rook";
