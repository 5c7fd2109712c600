//! The operator table driving the reader and the writer.
//!
//! Entries are `(priority 0..=1200, specifier, name)`. The table is
//! per-engine and mutable at runtime through `op/3`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{domain_error, permission_error, Ball};
use crate::term::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Prefix,
    Infix,
    Postfix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpSpec {
    Xfx,
    Xfy,
    Yfx,
    Fx,
    Fy,
    Xf,
    Yf,
}

impl OpSpec {
    pub fn parse(name: &str) -> Option<OpSpec> {
        match name {
            "xfx" => Some(OpSpec::Xfx),
            "xfy" => Some(OpSpec::Xfy),
            "yfx" => Some(OpSpec::Yfx),
            "fx" => Some(OpSpec::Fx),
            "fy" => Some(OpSpec::Fy),
            "xf" => Some(OpSpec::Xf),
            "yf" => Some(OpSpec::Yf),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpSpec::Xfx => "xfx",
            OpSpec::Xfy => "xfy",
            OpSpec::Yfx => "yfx",
            OpSpec::Fx => "fx",
            OpSpec::Fy => "fy",
            OpSpec::Xf => "xf",
            OpSpec::Yf => "yf",
        }
    }

    pub fn class(&self) -> OpClass {
        match self {
            OpSpec::Xfx | OpSpec::Xfy | OpSpec::Yfx => OpClass::Infix,
            OpSpec::Fx | OpSpec::Fy => OpClass::Prefix,
            OpSpec::Xf | OpSpec::Yf => OpClass::Postfix,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub priority: u16,
    pub spec: OpSpec,
}

impl OpDef {
    /// Maximum priority accepted for the argument on the given side.
    pub fn arg_priority(&self, right: bool) -> u16 {
        match (self.spec, right) {
            (OpSpec::Xfx, _) | (OpSpec::Xfy, false) | (OpSpec::Yfx, true) => self.priority - 1,
            (OpSpec::Xfy, true) | (OpSpec::Yfx, false) => self.priority,
            (OpSpec::Fx, _) | (OpSpec::Xf, _) => self.priority - 1,
            (OpSpec::Fy, _) | (OpSpec::Yf, _) => self.priority,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct OpEntry {
    prefix: Option<OpDef>,
    infix: Option<OpDef>,
    postfix: Option<OpDef>,
}

pub struct OpTable {
    entries: RwLock<HashMap<String, OpEntry>>,
}

impl OpTable {
    /// A table preloaded with the ISO standard operators.
    pub fn standard() -> OpTable {
        let table = OpTable {
            entries: RwLock::new(HashMap::new()),
        };
        let defs: &[(u16, OpSpec, &[&str])] = &[
            (1200, OpSpec::Xfx, &[":-", "-->"]),
            (1200, OpSpec::Fx, &[":-", "?-"]),
            (1100, OpSpec::Xfy, &[";", "|"]),
            (1050, OpSpec::Xfy, &["->"]),
            (1000, OpSpec::Xfy, &[","]),
            (900, OpSpec::Fy, &["\\+"]),
            (
                700,
                OpSpec::Xfx,
                &[
                    "=", "\\=", "==", "\\==", "@<", "@>", "@=<", "@>=", "=..", "is", "=:=",
                    "=\\=", "<", ">", "=<", ">=",
                ],
            ),
            (500, OpSpec::Yfx, &["+", "-", "/\\", "\\/", "xor"]),
            (400, OpSpec::Yfx, &["*", "/", "//", "mod", "rem", "div", "<<", ">>"]),
            (200, OpSpec::Xfx, &["**"]),
            (200, OpSpec::Xfy, &["^"]),
            (200, OpSpec::Fy, &["-", "+", "\\"]),
        ];
        {
            let mut entries = table.entries.write().expect("op table poisoned");
            for (priority, spec, names) in defs {
                for name in *names {
                    let entry = entries.entry((*name).to_string()).or_default();
                    let def = OpDef {
                        priority: *priority,
                        spec: *spec,
                    };
                    match spec.class() {
                        OpClass::Prefix => entry.prefix = Some(def),
                        OpClass::Infix => entry.infix = Some(def),
                        OpClass::Postfix => entry.postfix = Some(def),
                    }
                }
            }
        }
        table
    }

    pub fn prefix(&self, name: &str) -> Option<OpDef> {
        self.entries
            .read()
            .expect("op table poisoned")
            .get(name)
            .and_then(|e| e.prefix)
    }

    pub fn infix(&self, name: &str) -> Option<OpDef> {
        self.entries
            .read()
            .expect("op table poisoned")
            .get(name)
            .and_then(|e| e.infix)
    }

    pub fn postfix(&self, name: &str) -> Option<OpDef> {
        self.entries
            .read()
            .expect("op table poisoned")
            .get(name)
            .and_then(|e| e.postfix)
    }

    pub fn is_operator(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("op table poisoned")
            .get(name)
            .map(|e| e.prefix.is_some() || e.infix.is_some() || e.postfix.is_some())
            .unwrap_or(false)
    }

    /// `op/3`. Priority 0 removes the definition in the specifier's class;
    /// a duplicate definition in the same class is rejected.
    pub fn define(&self, priority: u16, spec: OpSpec, name: &str) -> Result<(), Ball> {
        if priority > 1200 {
            return Err(domain_error(
                "operator_priority",
                &Term::int(priority as i64),
            ));
        }
        if name == "," {
            return Err(permission_error("modify", "operator", Term::atom(",")));
        }
        if name == "|" && (spec.class() != OpClass::Infix || (priority > 0 && priority < 1001)) {
            return Err(permission_error("create", "operator", Term::atom("|")));
        }
        let mut entries = self.entries.write().expect("op table poisoned");
        let entry = entries.entry(name.to_string()).or_default();
        let slot = match spec.class() {
            OpClass::Prefix => &mut entry.prefix,
            OpClass::Infix => &mut entry.infix,
            OpClass::Postfix => &mut entry.postfix,
        };
        if priority == 0 {
            *slot = None;
            return Ok(());
        }
        if slot.is_some() {
            return Err(permission_error("create", "operator", Term::atom(name)));
        }
        // An atom cannot be both an infix and a postfix operator.
        let clash = match spec.class() {
            OpClass::Infix => entry.postfix.is_some(),
            OpClass::Postfix => entry.infix.is_some(),
            OpClass::Prefix => false,
        };
        if clash {
            return Err(permission_error("create", "operator", Term::atom(name)));
        }
        let slot = match spec.class() {
            OpClass::Prefix => &mut entry.prefix,
            OpClass::Infix => &mut entry.infix,
            OpClass::Postfix => &mut entry.postfix,
        };
        *slot = Some(OpDef { priority, spec });
        Ok(())
    }

    /// All current definitions, for `current_op/3`.
    pub fn snapshot(&self) -> Vec<(u16, OpSpec, String)> {
        let entries = self.entries.read().expect("op table poisoned");
        let mut out = Vec::new();
        for (name, entry) in entries.iter() {
            for def in [entry.prefix, entry.infix, entry.postfix].into_iter().flatten() {
                out.push((def.priority, def.spec, name.clone()));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));
        out
    }
}
