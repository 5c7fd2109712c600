//! Prolog flags: a per-engine table of named, validated settings.
//!
//! Read-only flags reject modification with `permission_error(modify,
//! flag, F)`; writable flags validate their value domain.

use std::sync::RwLock;

use crate::error::{domain_error, permission_error, type_error, Ball};
use crate::term::Term;

/// Behaviour on calling an undefined procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownAction {
    Error,
    Fail,
    Warning,
}

/// Interpretation of double-quoted tokens by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleQuotes {
    Atom,
    Codes,
    Chars,
}

#[derive(Debug, Clone)]
struct FlagValues {
    unknown: UnknownAction,
    double_quotes: DoubleQuotes,
    debug: bool,
    char_conversion: bool,
}

/// The flag table. Mutable flags live behind a lock so shared engine
/// references can read them.
pub struct Flags {
    values: RwLock<FlagValues>,
}

pub const DIALECT: &str = "rook";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// No hard structural limit; the value reported by the `max_arity` flag.
pub const MAX_ARITY: i64 = 1 << 20;
pub const MAX_CHARACTER_CODE: i64 = 0x10FFFF;

impl Default for Flags {
    fn default() -> Self {
        Flags {
            values: RwLock::new(FlagValues {
                unknown: UnknownAction::Error,
                double_quotes: DoubleQuotes::Codes,
                debug: false,
                char_conversion: false,
            }),
        }
    }
}

impl Flags {
    pub fn new() -> Flags {
        Flags::default()
    }

    pub fn unknown(&self) -> UnknownAction {
        self.values.read().expect("flag table poisoned").unknown
    }

    pub fn double_quotes(&self) -> DoubleQuotes {
        self.values
            .read()
            .expect("flag table poisoned")
            .double_quotes
    }

    pub fn debug(&self) -> bool {
        self.values.read().expect("flag table poisoned").debug
    }

    /// All flags as (name, current value) pairs, for `current_prolog_flag/2`
    /// enumeration.
    pub fn snapshot(&self) -> Vec<(&'static str, Term)> {
        let values = self.values.read().expect("flag table poisoned");
        let onoff = |b: bool| Term::atom(if b { "on" } else { "off" });
        vec![
            ("bounded", Term::atom("true")),
            ("max_integer", Term::Int(i64::MAX)),
            ("min_integer", Term::Int(i64::MIN)),
            ("max_arity", Term::Int(MAX_ARITY)),
            ("integer_rounding_function", Term::atom("toward_zero")),
            ("char_conversion", onoff(values.char_conversion)),
            ("debug", onoff(values.debug)),
            (
                "unknown",
                Term::atom(match values.unknown {
                    UnknownAction::Error => "error",
                    UnknownAction::Fail => "fail",
                    UnknownAction::Warning => "warning",
                }),
            ),
            (
                "double_quotes",
                Term::atom(match values.double_quotes {
                    DoubleQuotes::Atom => "atom",
                    DoubleQuotes::Codes => "codes",
                    DoubleQuotes::Chars => "chars",
                }),
            ),
            ("dialect", Term::atom(DIALECT)),
            ("version", Term::atom(VERSION)),
            ("max_character_code", Term::Int(MAX_CHARACTER_CODE)),
        ]
    }

    pub fn get(&self, name: &str) -> Option<Term> {
        self.snapshot()
            .into_iter()
            .find(|(flag, _)| *flag == name)
            .map(|(_, value)| value)
    }

    /// `set_prolog_flag/2` semantics: unknown flag is a domain error,
    /// read-only flags a permission error, bad values a domain error.
    pub fn set(&self, name: &Term, value: &Term) -> Result<(), Ball> {
        let flag_atom = match name.deref() {
            Term::Atom(a) => a,
            Term::Var(_) => return Err(crate::error::instantiation_error()),
            other => return Err(type_error("atom", &other)),
        };
        let value = value.deref();
        let atom_value = |expected: &[&str]| -> Result<String, Ball> {
            if let Term::Atom(a) = &value {
                if expected.contains(&a.name()) {
                    return Ok(a.name().to_string());
                }
            }
            let culprit = Term::compound("+", vec![name.deref(), value.clone()]);
            Err(domain_error("flag_value", &culprit))
        };
        let mut values = self.values.write().expect("flag table poisoned");
        match flag_atom.name() {
            "unknown" => {
                values.unknown = match atom_value(&["error", "fail", "warning"])?.as_str() {
                    "error" => UnknownAction::Error,
                    "fail" => UnknownAction::Fail,
                    _ => UnknownAction::Warning,
                };
                Ok(())
            }
            "double_quotes" => {
                values.double_quotes = match atom_value(&["atom", "codes", "chars"])?.as_str() {
                    "atom" => DoubleQuotes::Atom,
                    "codes" => DoubleQuotes::Codes,
                    _ => DoubleQuotes::Chars,
                };
                Ok(())
            }
            "debug" => {
                values.debug = atom_value(&["on", "off"])? == "on";
                Ok(())
            }
            "char_conversion" => {
                values.char_conversion = atom_value(&["on", "off"])? == "on";
                Ok(())
            }
            "bounded" | "max_integer" | "min_integer" | "max_arity"
            | "integer_rounding_function" | "dialect" | "version" | "max_character_code" => Err(
                permission_error("modify", "flag", Term::Atom(flag_atom.clone())),
            ),
            _ => Err(domain_error("prolog_flag", &Term::Atom(flag_atom.clone()))),
        }
    }
}
