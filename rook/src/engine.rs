//! The engine façade: goal lifecycle, consulting, convenience queries and
//! shutdown.
//!
//! The embedding surface mirrors a classic embedded-Prolog wrapper:
//! `consult_str`, `assertz`/`asserta`/`retract`, `query`/`query_once`
//! returning resolved bindings, and `query_with_bindings` rendering the
//! bindings as a JSON array for transport. Underneath, goals go through
//! `prepare` / `next` / `stop`, and a nested `prepare` parks the active
//! goal until the inner one is stopped.

use std::sync::Arc;

use serde::Serialize;

use crate::choice::Cont;
use crate::config::EngineConfig;
use crate::database::{Clause, Database};
use crate::error::{Ball, RookError, RookResult};
use crate::flags::Flags;
use crate::ops::OpTable;
use crate::read::ReadTerm;
use crate::solve::{Discard, Machine, Outcome};
use crate::stream::StreamTable;
use crate::term::renew::copy_term;
use crate::term::{Functor, Term};
use crate::write::{term_to_string, WriteOptions};

/// Goal execution return codes exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exec {
    /// A solution was found and a choice point remains.
    Success,
    /// A solution was found deterministically.
    SuccessLast,
    /// No (more) solutions.
    Fail,
    /// `halt/0,1` was executed with this exit code.
    Halt(i32),
}

/// Handle to a prepared goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalHandle(u64);

struct GoalFrame {
    id: u64,
    base_cp: usize,
    base_trail: usize,
    first_attempt: bool,
    parked_cont: Cont,
}

/// One solution: the goal's named variables with their bindings resolved
/// and detached from the trail.
pub type Solution = Vec<(String, Term)>;

pub struct Engine {
    machine: Machine,
    goals: Vec<GoalFrame>,
    next_goal_id: u64,
    halted: Option<i32>,
    closed: bool,
}

impl Engine {
    /// A fresh engine with its own database.
    pub fn new() -> RookResult<Engine> {
        Engine::with_database(Arc::new(Database::new()))
    }

    /// An engine sharing `db` with other engines; flags, operator table
    /// and streams stay per-engine.
    pub fn with_database(db: Arc<Database>) -> RookResult<Engine> {
        let flags = Arc::new(Flags::new());
        let ops = Arc::new(OpTable::standard());
        let streams = Arc::new(StreamTable::new());
        let machine = Machine::new(db, flags, ops, streams, EngineConfig::from_env());
        let mut engine = Engine {
            machine,
            goals: Vec::new(),
            next_goal_id: 1,
            halted: None,
            closed: false,
        };
        engine.load_prelude()?;
        log::debug!("rook engine ready (prelude loaded)");
        Ok(engine)
    }

    fn load_prelude(&mut self) -> RookResult<()> {
        // The prelude may already be in a shared database.
        let member = Functor::of("member", 2);
        if self.machine.db.lookup(&member).is_some() {
            return Ok(());
        }
        for key in crate::builtins::registry().keys() {
            self.machine
                .db
                .register_native(&key, crate::database::PredicateKind::Builtin);
        }
        for key in crate::builtins::control_keys() {
            self.machine
                .db
                .register_native(&key, crate::database::PredicateKind::Control);
        }
        self.consult_str(crate::library::PRELUDE)?;
        for (name, arity) in crate::library::prelude_keys() {
            self.machine.db.seal_library(&Functor::of(name, arity));
        }
        Ok(())
    }

    pub fn database(&self) -> Arc<Database> {
        self.machine.db.clone()
    }

    pub fn flags(&self) -> Arc<Flags> {
        self.machine.flags.clone()
    }

    pub fn streams(&self) -> Arc<StreamTable> {
        self.machine.streams.clone()
    }

    /// Render a term with this engine's operator table.
    pub fn format_term(&self, term: &Term) -> String {
        term_to_string(term, &self.machine.ops, WriteOptions::write())
    }

    // ---- loading -------------------------------------------------------

    /// Consult Prolog source text: clauses and DCG rules enter the
    /// database, `:- Goal` directives are executed immediately. Reading is
    /// incremental, so an `op/3` or flag directive affects the clauses
    /// after it in the same text.
    pub fn consult_str(&mut self, text: &str) -> RookResult<()> {
        let ops = self.machine.ops.clone();
        let mut parser =
            crate::read::Parser::new(text, &ops, self.machine.flags.double_quotes());
        loop {
            match parser.next_term() {
                Ok(Some(read)) => {
                    self.load_term(read)?;
                    parser.set_double_quotes(self.machine.flags.double_quotes());
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    return Err(RookError::Syntax {
                        line: e.line,
                        detail: e.message,
                    })
                }
            }
        }
    }

    fn load_term(&mut self, read: ReadTerm) -> RookResult<()> {
        let term = read.term.deref();
        if let Some(args) = term.match_struct(":-", 1) {
            // Directive: run it now; failure is a warning, not an error.
            let directive = args[0].clone();
            match self.run_once_term(&directive) {
                Ok(true) => {}
                Ok(false) => log::warn!("directive failed: {}", self.format_term(&directive)),
                Err(RookError::Uncaught(ball)) => {
                    log::warn!(
                        "directive raised {}: {}",
                        ball,
                        self.format_term(&directive)
                    );
                }
                Err(e) => return Err(e),
            }
            return Ok(());
        }
        let (head, body) = if let Some(args) = term.match_struct("-->", 2) {
            crate::dcg::transform_rule(&args[0], &args[1]).map_err(uncaught)?
        } else if let Some(args) = term.match_struct(":-", 2) {
            (args[0].clone(), args[1].clone())
        } else {
            (term.clone(), Term::atom("true"))
        };
        let clause = Clause::new(&head, &body).map_err(uncaught)?;
        self.machine.db.add_clause(clause, false, false).map_err(uncaught)?;
        Ok(())
    }

    // ---- goal lifecycle -------------------------------------------------

    /// Prepare a goal for stepping. A nested prepare parks the currently
    /// active goal; it resumes when the inner goal is stopped.
    pub fn prepare(&mut self, goal: Term) -> RookResult<GoalHandle> {
        self.ensure_open()?;
        self.halted = None;
        match goal.deref() {
            Term::Var(_) => return Err(RookError::NotCallable(goal)),
            t if !t.is_callable() => return Err(RookError::NotCallable(t)),
            _ => {}
        }
        let id = self.next_goal_id;
        self.next_goal_id += 1;
        let base_cp = self.machine.cp_depth();
        let base_trail = self.machine.trail.mark();
        let parked_cont = std::mem::take(&mut self.machine.cont);
        self.machine.cont.push_goal(goal, base_cp);
        self.goals.push(GoalFrame {
            id,
            base_cp,
            base_trail,
            first_attempt: true,
            parked_cont,
        });
        Ok(GoalHandle(id))
    }

    fn active_frame(&mut self, handle: GoalHandle) -> RookResult<&mut GoalFrame> {
        match self.goals.last_mut() {
            Some(frame) if frame.id == handle.0 => Ok(frame),
            _ => Err(RookError::NoActiveGoal),
        }
    }

    /// Produce the next solution of the active goal.
    pub fn next(&mut self, handle: GoalHandle) -> RookResult<Exec> {
        self.ensure_open()?;
        if let Some(code) = self.halted {
            return Err(RookError::Halted(code));
        }
        let frame = self.active_frame(handle)?;
        let base = frame.base_cp;
        let first = frame.first_attempt;
        frame.first_attempt = false;

        let outcome = if first {
            self.machine.run(base)
        } else {
            match self.machine.backtrack(base) {
                Ok(true) => self.machine.run(base),
                Ok(false) => Ok(Outcome::Exhausted),
                Err(ball) => match self.machine.unwind(ball, base) {
                    Ok(()) => self.machine.run(base),
                    Err(ball) => Err(ball),
                },
            }
        };
        match outcome {
            Ok(Outcome::Solution) => {
                if self.machine.cp_depth() > base {
                    Ok(Exec::Success)
                } else {
                    Ok(Exec::SuccessLast)
                }
            }
            Ok(Outcome::Exhausted) => {
                self.finish_goal(handle)?;
                Ok(Exec::Fail)
            }
            Ok(Outcome::Halted(code)) => {
                self.unwind_for_halt(code);
                Ok(Exec::Halt(code))
            }
            Err(ball) => {
                let term = ball.into_term();
                self.finish_goal(handle)?;
                Err(RookError::Uncaught(term))
            }
        }
    }

    /// Stop a goal: discard its choice points (running deferred cleanups
    /// with catcher `exit`), rewind its bindings and resume the goal it
    /// parked.
    pub fn stop(&mut self, handle: GoalHandle) -> RookResult<()> {
        self.ensure_open()?;
        self.finish_goal(handle)
    }

    fn finish_goal(&mut self, handle: GoalHandle) -> RookResult<()> {
        let position = self
            .goals
            .iter()
            .position(|frame| frame.id == handle.0)
            .ok_or(RookError::NoActiveGoal)?;
        // Stop nested goals first, innermost out.
        while self.goals.len() > position {
            let frame = self.goals.pop().expect("goal frame present");
            if let Err(ball) = self
                .machine
                .discard_above(frame.base_cp, Discard::Stop)
            {
                log::warn!("cleanup raised during stop: {}", ball.term());
            }
            self.machine.trail.rewind_to(frame.base_trail);
            self.machine.cont = frame.parked_cont;
        }
        Ok(())
    }

    fn unwind_for_halt(&mut self, code: i32) {
        self.machine.pending_halt = None;
        while let Some(frame) = self.goals.pop() {
            if let Err(ball) = self
                .machine
                .discard_above(frame.base_cp, Discard::Stop)
            {
                log::warn!("cleanup raised during halt: {}", ball.term());
            }
            self.machine.trail.rewind_to(frame.base_trail);
            self.machine.cont = frame.parked_cont;
        }
        self.halted = Some(code);
    }

    // ---- convenience queries -------------------------------------------

    /// Parse one goal with the engine's operator table; the terminating
    /// `.` is optional.
    pub fn parse_goal(&self, text: &str) -> RookResult<ReadTerm> {
        let source = format!("{} .", text.trim().trim_end_matches('.'));
        let read = crate::read::parse_one(
            &source,
            &self.machine.ops,
            self.machine.flags.double_quotes(),
        )
        .map_err(uncaught)?;
        read.ok_or_else(|| RookError::Syntax {
            line: 1,
            detail: "empty goal".to_string(),
        })
    }

    /// Run a goal term to its first solution; `Ok(true)` on success.
    pub fn run_once_term(&mut self, goal: &Term) -> RookResult<bool> {
        let handle = self.prepare(goal.clone())?;
        let result = self.next(handle);
        match result {
            Ok(Exec::Success) | Ok(Exec::SuccessLast) => {
                self.stop(handle)?;
                Ok(true)
            }
            Ok(Exec::Fail) => Ok(false),
            Ok(Exec::Halt(code)) => Err(RookError::Halted(code)),
            Err(e) => Err(e),
        }
    }

    /// All solutions of a goal given as text. Each solution carries the
    /// goal's named variables, detached from the engine.
    pub fn query(&mut self, goal: &str) -> RookResult<Vec<Solution>> {
        self.query_limit(goal, usize::MAX)
    }

    /// First solution only.
    pub fn query_once(&mut self, goal: &str) -> RookResult<Option<Solution>> {
        let mut solutions = self.query_limit(goal, 1)?;
        Ok(solutions.pop())
    }

    fn query_limit(&mut self, goal: &str, limit: usize) -> RookResult<Vec<Solution>> {
        let read = self.parse_goal(goal)?;
        let handle = self.prepare(read.term.clone())?;
        let mut solutions = Vec::new();
        loop {
            match self.next(handle) {
                Ok(Exec::Success) | Ok(Exec::SuccessLast) => {
                    let snapshot: Solution = read
                        .bindings
                        .iter()
                        .map(|(name, var)| (name.clone(), copy_term(var)))
                        .collect();
                    let deterministic = solutions.len() + 1 >= limit;
                    solutions.push(snapshot);
                    if deterministic {
                        self.stop(handle)?;
                        return Ok(solutions);
                    }
                }
                Ok(Exec::Fail) => return Ok(solutions),
                Ok(Exec::Halt(code)) => return Err(RookError::Halted(code)),
                Err(e) => return Err(e),
            }
        }
    }

    /// Solutions as a JSON array for transport: one object per solution
    /// mapping variable names to rendered values, or `true` for solutions
    /// without named variables.
    pub fn query_with_bindings(&mut self, goal: &str) -> RookResult<String> {
        let solutions = self.query(goal)?;
        let rendered: Vec<serde_json::Value> = solutions
            .iter()
            .map(|solution| self.solution_to_json(solution))
            .collect();
        Ok(serde_json::to_string(&rendered)?)
    }

    fn solution_to_json(&self, solution: &Solution) -> serde_json::Value {
        if solution.is_empty() {
            return serde_json::Value::Bool(true);
        }
        let mut object = serde_json::Map::new();
        for (name, term) in solution {
            object.insert(name.clone(), self.term_to_json(term));
        }
        serde_json::Value::Object(object)
    }

    fn term_to_json(&self, term: &Term) -> serde_json::Value {
        match term.deref() {
            Term::Int(i) => serde_json::json!(i),
            Term::Float(f) => serde_json::json!(f.value),
            Term::Atom(a) => serde_json::json!(a.name()),
            t => match t.list_view() {
                Ok(items) => serde_json::Value::Array(
                    items.iter().map(|item| self.term_to_json(item)).collect(),
                ),
                Err(_) => serde_json::json!(self.format_term(&t)),
            },
        }
    }

    // ---- database conveniences -----------------------------------------

    /// Assert a clause at the end of its predicate.
    pub fn assertz(&mut self, clause: &str) -> RookResult<()> {
        self.wrap_clause_goal("assertz", clause)
    }

    /// Assert a clause at the front of its predicate.
    pub fn asserta(&mut self, clause: &str) -> RookResult<()> {
        self.wrap_clause_goal("asserta", clause)
    }

    /// Retract the first matching clause; `Err` if nothing matches.
    pub fn retract(&mut self, clause: &str) -> RookResult<()> {
        self.wrap_clause_goal("retract", clause)
    }

    fn wrap_clause_goal(&mut self, wrapper: &str, clause: &str) -> RookResult<()> {
        let read = self.parse_goal(clause)?;
        let goal = Term::compound(wrapper, vec![read.term]);
        match self.run_once_term(&goal)? {
            true => Ok(()),
            false => Err(RookError::Internal(format!("{} failed", wrapper))),
        }
    }

    // ---- shutdown -------------------------------------------------------

    pub fn exit_code(&self) -> Option<i32> {
        self.halted
    }

    fn ensure_open(&self) -> RookResult<()> {
        if self.closed {
            return Err(RookError::Internal("engine is closed".to_string()));
        }
        Ok(())
    }

    /// Close the engine: stop every goal (running deferred cleanups),
    /// force-close non-standard streams, clear caches, deregister from the
    /// database.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        while let Some(frame) = self.goals.pop() {
            if let Err(ball) = self
                .machine
                .discard_above(frame.base_cp, Discard::Stop)
            {
                log::warn!("cleanup raised during close: {}", ball.term());
            }
            self.machine.trail.rewind_to(frame.base_trail);
            self.machine.cont = frame.parked_cont;
        }
        self.machine.shutdown();
        self.closed = true;
        log::debug!("rook engine closed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

fn uncaught(ball: Ball) -> RookError {
    RookError::Uncaught(ball.into_term())
}

/// Serializable summary of an engine's state, for host diagnostics.
#[derive(Debug, Serialize)]
pub struct EngineInfo {
    pub version: &'static str,
    pub dialect: &'static str,
    pub active_goals: usize,
    pub halted: Option<i32>,
}

impl Engine {
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            version: crate::flags::VERSION,
            dialect: crate::flags::DIALECT,
            active_goals: self.goals.len(),
            halted: self.halted,
        }
    }
}
