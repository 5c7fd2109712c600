//! Term output: `write/1`, `writeq/1`, `write_canonical/1` and the plain
//! `Display` rendering used in logs and error messages.

use std::fmt::{self, Write as _};

use crate::ops::{OpClass, OpTable};
use crate::term::{Atom, Flt, Term};

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub quoted: bool,
    pub ignore_ops: bool,
}

impl WriteOptions {
    pub fn write() -> WriteOptions {
        WriteOptions {
            quoted: false,
            ignore_ops: false,
        }
    }

    pub fn writeq() -> WriteOptions {
        WriteOptions {
            quoted: true,
            ignore_ops: false,
        }
    }

    pub fn canonical() -> WriteOptions {
        WriteOptions {
            quoted: true,
            ignore_ops: true,
        }
    }
}

/// Render `term` using the engine's operator table.
pub fn term_to_string(term: &Term, ops: &OpTable, options: WriteOptions) -> String {
    let mut out = String::new();
    let writer = Writer {
        ops: if options.ignore_ops { None } else { Some(ops) },
        quoted: options.quoted,
    };
    writer
        .write_term(&mut out, term, 1200)
        .expect("string writer cannot fail");
    out
}

/// Operator-free rendering for `Display`; never quotes.
pub fn fmt_canonical(term: &Term, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let writer = Writer {
        ops: None,
        quoted: false,
    };
    writer.write_term(f, term, 1200)
}

pub fn float_text(f: &Flt) -> String {
    match f.exact {
        Some(d) => {
            let text = d.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{}.0", text)
            }
        }
        None => crate::arith::canonical_float_text(f.value),
    }
}

struct Writer<'a> {
    ops: Option<&'a OpTable>,
    quoted: bool,
}

impl<'a> Writer<'a> {
    fn write_term(&self, out: &mut dyn fmt::Write, term: &Term, max_priority: u16) -> fmt::Result {
        let t = term.deref();
        match &t {
            Term::Var(v) => match v.name() {
                Some(name) => write!(out, "_{}", name),
                None => write!(out, "_G{}", v.id()),
            },
            Term::Slot(i) => write!(out, "_S{}", i),
            Term::Int(i) => write!(out, "{}", i),
            Term::Float(f) => write!(out, "{}", float_text(f)),
            Term::Dec(d) => write!(out, "{}", d),
            Term::Atom(a) => self.write_atom(out, a),
            Term::Opaque(o) => write!(out, "{:?}", o),
            Term::Struct(s) => {
                let name = s.functor.name().name();
                let arity = s.functor.arity();
                if name == "." && arity == 2 {
                    return self.write_list(out, &t);
                }
                if name == "{}" && arity == 1 {
                    out.write_char('{')?;
                    self.write_term(out, &s.args[0], 1200)?;
                    return out.write_char('}');
                }
                if let Some(ops) = self.ops {
                    if arity == 2 {
                        if let Some(def) = ops.infix(name) {
                            let parens = def.priority > max_priority;
                            if parens {
                                out.write_char('(')?;
                            }
                            self.write_term(out, &s.args[0], def.arg_priority(false))?;
                            if alphabetic_op(name) {
                                write!(out, " {} ", name)?;
                            } else if name == "," {
                                out.write_str(",")?;
                            } else {
                                write!(out, "{}", name)?;
                            }
                            self.write_term(out, &s.args[1], def.arg_priority(true))?;
                            if parens {
                                out.write_char(')')?;
                            }
                            return Ok(());
                        }
                    }
                    if arity == 1 {
                        if let Some(def) = ops.prefix(name) {
                            if def.spec.class() == OpClass::Prefix {
                                let parens = def.priority > max_priority;
                                if parens {
                                    out.write_char('(')?;
                                }
                                write!(out, "{}", name)?;
                                if alphabetic_op(name) || starts_like_operand(&s.args[0]) {
                                    out.write_char(' ')?;
                                }
                                self.write_term(out, &s.args[0], def.arg_priority(true))?;
                                if parens {
                                    out.write_char(')')?;
                                }
                                return Ok(());
                            }
                        }
                    }
                }
                self.write_atom(out, s.functor.name())?;
                out.write_char('(')?;
                for (i, arg) in s.args.iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    // Arguments parse at priority 999.
                    self.write_term(out, arg, 999)?;
                }
                out.write_char(')')
            }
        }
    }

    fn write_list(&self, out: &mut dyn fmt::Write, list: &Term) -> fmt::Result {
        out.write_char('[')?;
        let mut first = true;
        let mut tail = list.clone();
        loop {
            let t = tail.deref();
            if t.is_nil() {
                break;
            }
            match &t {
                Term::Struct(s) if s.functor.name().name() == "." && s.functor.arity() == 2 => {
                    if !first {
                        out.write_char(',')?;
                    }
                    first = false;
                    self.write_term(out, &s.args[0], 999)?;
                    tail = s.args[1].clone();
                }
                other => {
                    out.write_char('|')?;
                    self.write_term(out, other, 999)?;
                    break;
                }
            }
        }
        out.write_char(']')
    }

    fn write_atom(&self, out: &mut dyn fmt::Write, atom: &Atom) -> fmt::Result {
        let name = atom.name();
        if !self.quoted || !needs_quotes(name) {
            return out.write_str(name);
        }
        out.write_char('\'')?;
        for c in name.chars() {
            match c {
                '\'' => out.write_str("\\'")?,
                '\\' => out.write_str("\\\\")?,
                '\n' => out.write_str("\\n")?,
                '\t' => out.write_str("\\t")?,
                c => out.write_char(c)?,
            }
        }
        out.write_char('\'')
    }
}

fn alphabetic_op(name: &str) -> bool {
    name.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false)
}

/// A space is needed after a symbolic prefix operator when the operand
/// starts with a symbol character (`- 1` vs `-1` would re-read as a number).
fn starts_like_operand(arg: &Term) -> bool {
    matches!(arg.deref(), Term::Int(_) | Term::Float(_) | Term::Dec(_))
}

const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

fn needs_quotes(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    // Solo atoms.
    if matches!(name, "[]" | "{}" | "!" | ";" | ",") {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty");
    if first.is_lowercase() && first.is_alphabetic() {
        return !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');
    }
    if SYMBOL_CHARS.contains(first) {
        return !name.chars().all(|c| SYMBOL_CHARS.contains(c));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpTable;
    use crate::term::Decimal;

    fn ops() -> OpTable {
        OpTable::standard()
    }

    fn w(term: &Term) -> String {
        term_to_string(term, &ops(), WriteOptions::write())
    }

    fn wq(term: &Term) -> String {
        term_to_string(term, &ops(), WriteOptions::writeq())
    }

    #[test]
    fn atoms_and_numbers() {
        assert_eq!(w(&Term::atom("foo")), "foo");
        assert_eq!(w(&Term::int(-3)), "-3");
        assert_eq!(w(&Term::float(3.0)), "3.0");
        assert_eq!(w(&Term::float(3.25)), "3.25");
        assert_eq!(w(&Term::Dec(Decimal::parse("2.50").unwrap())), "2.5");
    }

    #[test]
    fn lists() {
        let l = Term::list(vec![Term::int(1), Term::int(2)]);
        assert_eq!(w(&l), "[1,2]");
        let p = Term::partial_list(vec![Term::int(1)], Term::var());
        assert!(w(&p).starts_with("[1|_"));
    }

    #[test]
    fn operators() {
        let t = Term::compound(
            "+",
            vec![
                Term::int(1),
                Term::compound("*", vec![Term::int(2), Term::int(3)]),
            ],
        );
        assert_eq!(w(&t), "1+2*3");
        // Parenthesise when priorities demand it.
        let t = Term::compound(
            "*",
            vec![
                Term::compound("+", vec![Term::int(1), Term::int(2)]),
                Term::int(3),
            ],
        );
        assert_eq!(w(&t), "(1+2)*3");
    }

    #[test]
    fn alphabetic_operators_get_spaces() {
        let t = Term::compound("is", vec![Term::var(), Term::int(3)]);
        let text = w(&t);
        assert!(text.contains(" is 3"), "got {}", text);
    }

    #[test]
    fn quoting() {
        assert_eq!(wq(&Term::atom("foo")), "foo");
        assert_eq!(wq(&Term::atom("hello world")), "'hello world'");
        assert_eq!(wq(&Term::atom("Abc")), "'Abc'");
        assert_eq!(wq(&Term::atom("[]")), "[]");
        assert_eq!(wq(&Term::atom("+")), "+");
        assert_eq!(wq(&Term::atom("don't")), "'don\\'t'");
    }

    #[test]
    fn canonical_ignores_operators() {
        let t = Term::compound("+", vec![Term::int(1), Term::int(2)]);
        assert_eq!(
            term_to_string(&t, &ops(), WriteOptions::canonical()),
            "+(1,2)"
        );
    }

    #[test]
    fn curly_and_negative_prefix() {
        let t = Term::compound("{}", vec![Term::atom("g")]);
        assert_eq!(w(&t), "{g}");
        let neg = Term::compound("-", vec![Term::int(1)]);
        assert_eq!(w(&neg), "- 1");
    }
}
