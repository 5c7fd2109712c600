//! Atom and number text builtins: `atom_chars/2`, `atom_concat/3`,
//! `sub_atom/5`, `number_chars/2`, …

use std::collections::VecDeque;

use crate::builtins::{need_atom, solve_alts, BuiltinExec, Mode, Registry};
use crate::error::{instantiation_error, syntax_error, type_error, Ball};
use crate::flags::DoubleQuotes;
use crate::solve::Machine;
use crate::term::Term;
use crate::write::float_text;

pub(super) fn register(reg: &mut Registry) {
    reg.add("atom_length", 2, atom_length_2);
    reg.add("atom_chars", 2, |m, _, a| atom_text(m, a, true));
    reg.add("atom_codes", 2, |m, _, a| atom_text(m, a, false));
    reg.add("char_code", 2, char_code_2);
    reg.add("atom_concat", 3, atom_concat_3);
    reg.add("sub_atom", 5, sub_atom_5);
    reg.add("number_chars", 2, |m, _, a| number_text(m, a, true));
    reg.add("number_codes", 2, |m, _, a| number_text(m, a, false));
}

fn atom_length_2(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    let atom = need_atom(&a[0])?;
    let len = atom.name().chars().count() as i64;
    if let Term::Int(n) = a[1].deref() {
        if n < 0 {
            return Err(crate::error::domain_error(
                "not_less_than_zero",
                &Term::Int(n),
            ));
        }
    }
    Ok(BuiltinExec::Det(m.unify_undo(&a[1], &Term::Int(len))))
}

/// Shared body of `atom_chars/2` (chars) and `atom_codes/2` (codes).
fn atom_text(m: &mut Machine, a: &[Term], chars: bool) -> Result<BuiltinExec, Ball> {
    match a[0].deref() {
        Term::Var(_) => {
            let text = text_from_list(&a[1], chars)?;
            Ok(BuiltinExec::Det(m.unify_undo(&a[0], &Term::atom(&text))))
        }
        Term::Atom(atom) => {
            let list = text_to_list(atom.name(), chars);
            Ok(BuiltinExec::Det(m.unify_undo(&a[1], &list)))
        }
        other => Err(type_error("atom", &other)),
    }
}

fn text_to_list(text: &str, chars: bool) -> Term {
    Term::list(
        text.chars()
            .map(|c| {
                if chars {
                    Term::atom(&c.to_string())
                } else {
                    Term::Int(c as i64)
                }
            })
            .collect::<Vec<_>>(),
    )
}

fn text_from_list(list: &Term, chars: bool) -> Result<String, Ball> {
    let items = list.list_view().map_err(|(_, tail)| match tail {
        Term::Var(_) => instantiation_error(),
        _ => type_error("list", &list.deref()),
    })?;
    let mut text = String::new();
    for item in items {
        match item.deref() {
            Term::Var(_) => return Err(instantiation_error()),
            Term::Atom(a) if chars && a.name().chars().count() == 1 => {
                text.push(a.name().chars().next().expect("one char"));
            }
            Term::Int(code) if !chars => {
                let c = u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| crate::error::representation_error("character_code"))?;
                text.push(c);
            }
            other => {
                let expected = if chars { "character" } else { "character_code" };
                return Err(type_error(expected, &other));
            }
        }
    }
    Ok(text)
}

fn char_code_2(m: &mut Machine, _: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    match (a[0].deref(), a[1].deref()) {
        (Term::Atom(ch), _) => {
            let mut chars = ch.name().chars();
            let c = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => return Err(type_error("character", &Term::Atom(ch))),
            };
            Ok(BuiltinExec::Det(m.unify_undo(&a[1], &Term::Int(c as i64))))
        }
        (Term::Var(_), Term::Int(code)) => {
            let c = u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| crate::error::representation_error("character_code"))?;
            Ok(BuiltinExec::Det(
                m.unify_undo(&a[0], &Term::atom(&c.to_string())),
            ))
        }
        (Term::Var(_), Term::Var(_)) => Err(instantiation_error()),
        (first, _) if !matches!(first, Term::Var(_)) => Err(type_error("character", &first)),
        (_, other) => Err(type_error("integer", &other)),
    }
}

fn atom_concat_3(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(_) = mode {
        return solve_alts(m, mode, Term::nil(), || unreachable!());
    }
    match (a[0].deref(), a[1].deref()) {
        (Term::Atom(x), Term::Atom(y)) => {
            let joined = format!("{}{}", x.name(), y.name());
            Ok(BuiltinExec::Det(m.unify_undo(&a[2], &Term::atom(&joined))))
        }
        (left, right) => {
            let left_ok = matches!(left, Term::Var(_) | Term::Atom(_));
            let right_ok = matches!(right, Term::Var(_) | Term::Atom(_));
            if left_ok && right_ok {
                // At least one side unbound: enumerate splits of the whole.
                let whole = need_atom(&a[2])?;
                let text: Vec<char> = whole.name().chars().collect();
                let probe = Term::compound("-", vec![a[0].clone(), a[1].clone()]);
                let alts: VecDeque<Term> = (0..=text.len())
                    .map(|i| {
                        let prefix: String = text[..i].iter().collect();
                        let suffix: String = text[i..].iter().collect();
                        Term::compound("-", vec![Term::atom(&prefix), Term::atom(&suffix)])
                    })
                    .collect();
                solve_alts(m, Mode::First, probe, move || Ok(alts))
            } else {
                let culprit = if left_ok { right } else { left };
                Err(type_error("atom", &culprit))
            }
        }
    }
}

fn sub_atom_5(m: &mut Machine, mode: Mode, a: &[Term]) -> Result<BuiltinExec, Ball> {
    if let Mode::Redo(_) = mode {
        return solve_alts(m, mode, Term::nil(), || unreachable!());
    }
    let probe = Term::compound(
        "s",
        vec![a[1].clone(), a[2].clone(), a[3].clone(), a[4].clone()],
    );
    let atom = need_atom(&a[0])?;
    let text: Vec<char> = atom.name().chars().collect();
    let n = text.len();
    let want_int = |t: &Term| match t.deref() {
        Term::Int(i) => Some(i),
        _ => None,
    };
    let want_before = want_int(&a[1]);
    let want_length = want_int(&a[2]);
    let want_after = want_int(&a[3]);
    let want_sub = match a[4].deref() {
        Term::Atom(sub) => Some(sub.name().to_string()),
        _ => None,
    };
    let mut alts: VecDeque<Term> = VecDeque::new();
    for before in 0..=n {
        if want_before.map_or(false, |b| b != before as i64) {
            continue;
        }
        for length in 0..=(n - before) {
            if want_length.map_or(false, |l| l != length as i64) {
                continue;
            }
            let after = n - before - length;
            if want_after.map_or(false, |x| x != after as i64) {
                continue;
            }
            let sub: String = text[before..before + length].iter().collect();
            if want_sub.as_ref().map_or(false, |s| *s != sub) {
                continue;
            }
            alts.push_back(Term::compound(
                "s",
                vec![
                    Term::Int(before as i64),
                    Term::Int(length as i64),
                    Term::Int(after as i64),
                    Term::atom(&sub),
                ],
            ));
        }
    }
    solve_alts(m, Mode::First, probe, move || Ok(alts))
}

/// Shared body of `number_chars/2` and `number_codes/2`.
fn number_text(m: &mut Machine, a: &[Term], chars: bool) -> Result<BuiltinExec, Ball> {
    match a[0].deref() {
        Term::Var(_) => {
            let text = text_from_list(&a[1], chars)?;
            let number = parse_number(m, &text)?;
            Ok(BuiltinExec::Det(m.unify_undo(&a[0], &number)))
        }
        number if number.is_number() => {
            let text = number_to_text(&number);
            let list = text_to_list(&text, chars);
            Ok(BuiltinExec::Det(m.unify_undo(&a[1], &list)))
        }
        other => Err(type_error("number", &other)),
    }
}

pub(crate) fn number_to_text(number: &Term) -> String {
    match number {
        Term::Int(i) => i.to_string(),
        Term::Float(f) => float_text(f),
        Term::Dec(d) => d.to_string(),
        _ => unreachable!("number_to_text on non-number"),
    }
}

pub(crate) fn parse_number(m: &Machine, text: &str) -> Result<Term, Ball> {
    let source = format!("{} .", text);
    let read = crate::read::parse_one(&source, &m.ops, DoubleQuotes::Codes)
        .map_err(|_| syntax_error("illegal_number"))?;
    match read {
        Some(read) if read.term.is_number() => Ok(read.term),
        _ => Err(syntax_error("illegal_number")),
    }
}
