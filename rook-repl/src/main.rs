//! Interactive toplevel for the Rook Prolog engine.
//!
//! Usage:
//!   rook             start the REPL
//!   rook file.pl     consult a file, then start the REPL
//!
//! Queries are entered at the `?- ` prompt; `;` asks for more solutions,
//! anything else accepts the current one. `halt.` leaves.

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rook::{Engine, Exec, RookError};

fn main() -> Result<()> {
    env_logger::init();

    let mut engine = Engine::new().context("failed to start the engine")?;

    for path in std::env::args().skip(1) {
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path))?;
        engine
            .consult_str(&source)
            .with_context(|| format!("cannot consult {}", path))?;
        println!("{} consulted {}", "%".dimmed(), path.bright_white());
    }

    println!("Rook Prolog {} — type 'halt.' to leave.", rook::VERSION);

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("?- ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        editor.add_history_entry(input)?;
        match run_query(&mut engine, &mut editor, input) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{} {}", "error:".bright_red(), e),
        }
    }
    println!("% goodbye");
    Ok(())
}

/// Execute one query interactively. `Ok(false)` means the session ends.
fn run_query(engine: &mut Engine, editor: &mut DefaultEditor, input: &str) -> Result<bool> {
    let text = input.strip_prefix("?-").unwrap_or(input).trim();
    let text = text.strip_suffix('.').unwrap_or(text);

    let read = match parse_goal(engine, text) {
        Ok(read) => read,
        Err(e) => {
            eprintln!("{} {}", "syntax error:".bright_red(), e);
            return Ok(true);
        }
    };

    let handle = engine.prepare(read.term.clone())?;
    loop {
        match engine.next(handle) {
            Ok(Exec::Success) => {
                print_bindings(engine, &read.bindings);
                if ask_for_more(editor)? {
                    continue;
                }
                engine.stop(handle)?;
                println!("{}", "true.".bright_green());
                return Ok(true);
            }
            Ok(Exec::SuccessLast) => {
                print_bindings(engine, &read.bindings);
                println!("{}", "true.".bright_green());
                return Ok(true);
            }
            Ok(Exec::Fail) => {
                println!("{}", "false.".bright_red());
                return Ok(true);
            }
            Ok(Exec::Halt(code)) => {
                log::debug!("halt with exit code {}", code);
                return Ok(false);
            }
            Err(RookError::Uncaught(ball)) => {
                eprintln!(
                    "{} {}",
                    "uncaught exception:".bright_red(),
                    engine.format_term(&ball)
                );
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn parse_goal(engine: &Engine, text: &str) -> Result<rook::read::ReadTerm> {
    engine.parse_goal(text).map_err(|e| anyhow::anyhow!("{}", e))
}

fn print_bindings(engine: &Engine, bindings: &[(String, rook::Term)]) {
    for (name, var) in bindings {
        println!(
            "  {} = {}",
            name.bright_cyan(),
            engine.format_term(var).bright_white()
        );
    }
}

/// After a non-deterministic solution: `;` retries, anything else commits.
fn ask_for_more(editor: &mut DefaultEditor) -> Result<bool> {
    match editor.readline("") {
        Ok(line) => Ok(line.trim_start().starts_with(';')),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
