//! Stream and term I/O builtins.

use std::sync::{Arc, Mutex};

use crate::builtins::{need_atom, need_int, BuiltinExec, Mode, Registry};
use crate::error::{
    domain_error, instantiation_error, permission_error, syntax_error, type_error, Ball,
};
use crate::solve::Machine;
use crate::stream::{EofAction, Stream, StreamMode, StreamOptions, StreamType};
use crate::term::renew::term_variables;
use crate::term::Term;
use crate::write::{term_to_string, WriteOptions};

pub(super) fn register(reg: &mut Registry) {
    reg.add("write", 1, |m, _, a| write_default(m, &a[0], WriteOptions::write()));
    reg.add("print", 1, |m, _, a| write_default(m, &a[0], WriteOptions::write()));
    reg.add("writeq", 1, |m, _, a| write_default(m, &a[0], WriteOptions::writeq()));
    reg.add("write_canonical", 1, |m, _, a| {
        write_default(m, &a[0], WriteOptions::canonical())
    });
    reg.add("write", 2, |m, _, a| write_to(m, &a[0], &a[1], WriteOptions::write()));
    reg.add("writeq", 2, |m, _, a| {
        write_to(m, &a[0], &a[1], WriteOptions::writeq())
    });
    reg.add("write_canonical", 2, |m, _, a| {
        write_to(m, &a[0], &a[1], WriteOptions::canonical())
    });
    reg.add("write_term", 2, |m, _, a| {
        let options = parse_write_options(&a[1])?;
        write_default(m, &a[0], options)
    });
    reg.add("write_term", 3, |m, _, a| {
        let options = parse_write_options(&a[2])?;
        write_to(m, &a[0], &a[1], options)
    });
    reg.add("nl", 0, |m, _, _| {
        let stream = current_output(m)?;
        emit(m, &stream, "\n")
    });
    reg.add("nl", 1, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        emit(m, &stream, "\n")
    });
    reg.add("tab", 1, |m, _, a| {
        let n = match crate::arith::evaluate(&mut m.rng, &a[0])? {
            crate::arith::Number::Int(i) if i >= 0 => i,
            crate::arith::Number::Int(i) => {
                return Err(domain_error("not_less_than_zero", &Term::Int(i)))
            }
            other => return Err(type_error("integer", &other.to_term())),
        };
        let stream = current_output(m)?;
        emit(m, &stream, &" ".repeat(n as usize))
    });
    reg.add("open", 3, |m, _, a| open(m, a, None));
    reg.add("open", 4, |m, _, a| open(m, &a[..3], Some(&a[3])));
    reg.add("close", 1, |m, _, a| close(m, &a[0], false));
    reg.add("close", 2, |m, _, a| {
        let force = close_force_option(&a[1])?;
        close(m, &a[0], force)
    });
    reg.add("current_input", 1, |m, _, a| {
        let term = m.streams.term_for(m.streams.current_input());
        Ok(BuiltinExec::Det(m.unify_undo(&a[0], &term)))
    });
    reg.add("current_output", 1, |m, _, a| {
        let term = m.streams.term_for(m.streams.current_output());
        Ok(BuiltinExec::Det(m.unify_undo(&a[0], &term)))
    });
    reg.add("set_input", 1, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        let (id, is_input) = {
            let s = stream.lock().expect("stream poisoned");
            (s.id, s.is_input())
        };
        if !is_input {
            return Err(permission_error("input", "stream", a[0].deref()));
        }
        m.streams.set_current_input(id);
        Ok(BuiltinExec::Det(true))
    });
    reg.add("set_output", 1, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        let (id, is_input) = {
            let s = stream.lock().expect("stream poisoned");
            (s.id, s.is_input())
        };
        if is_input {
            return Err(permission_error("output", "stream", a[0].deref()));
        }
        m.streams.set_current_output(id);
        Ok(BuiltinExec::Det(true))
    });
    reg.add("flush_output", 0, |m, _, _| {
        let stream = current_output(m)?;
        let mut s = stream.lock().expect("stream poisoned");
        s.flush().map_err(io_ball)?;
        Ok(BuiltinExec::Det(true))
    });
    reg.add("flush_output", 1, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        let mut s = stream.lock().expect("stream poisoned");
        s.flush().map_err(io_ball)?;
        Ok(BuiltinExec::Det(true))
    });
    reg.add("get_char", 1, |m, _, a| {
        let stream = current_input(m)?;
        get_char(m, &stream, &a[0], false)
    });
    reg.add("get_char", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        get_char(m, &stream, &a[1], false)
    });
    reg.add("peek_char", 1, |m, _, a| {
        let stream = current_input(m)?;
        get_char(m, &stream, &a[0], true)
    });
    reg.add("peek_char", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        get_char(m, &stream, &a[1], true)
    });
    reg.add("put_char", 1, |m, _, a| {
        let stream = current_output(m)?;
        put_char(m, &stream, &a[0])
    });
    reg.add("put_char", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        put_char(m, &stream, &a[1])
    });
    reg.add("get_byte", 1, |m, _, a| {
        let stream = current_input(m)?;
        get_byte(m, &stream, &a[0], false)
    });
    reg.add("get_byte", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        get_byte(m, &stream, &a[1], false)
    });
    reg.add("peek_byte", 1, |m, _, a| {
        let stream = current_input(m)?;
        get_byte(m, &stream, &a[0], true)
    });
    reg.add("peek_byte", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        get_byte(m, &stream, &a[1], true)
    });
    reg.add("put_byte", 1, |m, _, a| {
        let stream = current_output(m)?;
        put_byte(m, &stream, &a[0])
    });
    reg.add("put_byte", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        put_byte(m, &stream, &a[1])
    });
    reg.add("at_end_of_stream", 0, |m, _, _| {
        let stream = current_input(m)?;
        let mut s = stream.lock().expect("stream poisoned");
        Ok(BuiltinExec::Det(s.at_eof().map_err(io_ball)?))
    });
    reg.add("at_end_of_stream", 1, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        let mut s = stream.lock().expect("stream poisoned");
        Ok(BuiltinExec::Det(s.at_eof().map_err(io_ball)?))
    });
    reg.add("set_stream_position", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        let position = need_int(&a[1])?;
        if position < 0 {
            return Err(domain_error("stream_position", &Term::Int(position)));
        }
        let mut s = stream.lock().expect("stream poisoned");
        if !s.options.reposition {
            return Err(permission_error("reposition", "stream", a[0].deref()));
        }
        s.seek_to(position as u64).map_err(io_ball)?;
        Ok(BuiltinExec::Det(true))
    });
    reg.add("stream_position", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        let position = stream.lock().expect("stream poisoned").position();
        Ok(BuiltinExec::Det(
            m.unify_undo(&a[1], &Term::Int(position as i64)),
        ))
    });
    reg.add("read", 1, |m, _, a| {
        let stream = current_input(m)?;
        read_term(m, &stream, &a[0], &Term::nil())
    });
    reg.add("read", 2, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        read_term(m, &stream, &a[1], &Term::nil())
    });
    reg.add("read_term", 2, |m, _, a| {
        let stream = current_input(m)?;
        read_term(m, &stream, &a[0], &a[1])
    });
    reg.add("read_term", 3, |m, _, a| {
        let stream = m.streams.resolve(&a[0])?;
        read_term(m, &stream, &a[1], &a[2])
    });
}

type Shared = Arc<Mutex<Stream>>;

fn io_ball(e: std::io::Error) -> Ball {
    crate::error::system_error(&e.to_string())
}

fn current_output(m: &Machine) -> Result<Shared, Ball> {
    let id = m.streams.current_output();
    m.streams
        .get(id)
        .ok_or_else(|| crate::error::existence_error("stream", Term::atom("user_output")))
}

fn current_input(m: &Machine) -> Result<Shared, Ball> {
    let id = m.streams.current_input();
    m.streams
        .get(id)
        .ok_or_else(|| crate::error::existence_error("stream", Term::atom("user_input")))
}

fn emit(_m: &mut Machine, stream: &Shared, text: &str) -> Result<BuiltinExec, Ball> {
    let mut s = stream.lock().expect("stream poisoned");
    s.write_str(text).map_err(io_ball)?;
    Ok(BuiltinExec::Det(true))
}

fn write_default(m: &mut Machine, term: &Term, options: WriteOptions) -> Result<BuiltinExec, Ball> {
    let stream = current_output(m)?;
    let text = term_to_string(term, &m.ops, options);
    emit(m, &stream, &text)
}

fn write_to(
    m: &mut Machine,
    stream_term: &Term,
    term: &Term,
    options: WriteOptions,
) -> Result<BuiltinExec, Ball> {
    let stream = m.streams.resolve(stream_term)?;
    let text = term_to_string(term, &m.ops, options);
    emit(m, &stream, &text)
}

fn parse_write_options(options: &Term) -> Result<WriteOptions, Ball> {
    let mut parsed = WriteOptions::write();
    let items = options.list_view().map_err(|(_, tail)| match tail {
        Term::Var(_) => instantiation_error(),
        _ => type_error("list", &options.deref()),
    })?;
    for item in items {
        let t = item.deref();
        let flag = |value: &Term| -> Result<bool, Ball> {
            match value.deref() {
                Term::Atom(a) if a.name() == "true" => Ok(true),
                Term::Atom(a) if a.name() == "false" => Ok(false),
                _ => Err(domain_error("write_option", &t)),
            }
        };
        if let Some(args) = t.match_struct("quoted", 1) {
            parsed.quoted = flag(&args[0])?;
        } else if let Some(args) = t.match_struct("ignore_ops", 1) {
            parsed.ignore_ops = flag(&args[0])?;
        } else {
            return Err(domain_error("write_option", &t));
        }
    }
    Ok(parsed)
}

fn open(m: &mut Machine, a: &[Term], options: Option<&Term>) -> Result<BuiltinExec, Ball> {
    let path = need_atom(&a[0])?;
    let mode = match need_atom(&a[1])?.name() {
        "read" => StreamMode::Read,
        "write" => StreamMode::Write,
        "append" => StreamMode::Append,
        other => return Err(domain_error("io_mode", &Term::atom(other))),
    };
    if !matches!(a[2].deref(), Term::Var(_)) {
        return Err(type_error("variable", &a[2].deref()));
    }
    let parsed = match options {
        Some(options) => parse_open_options(options)?,
        None => StreamOptions::default(),
    };
    let id = m.streams.open_file(path.name(), mode, parsed)?;
    let term = m.streams.term_for(id);
    Ok(BuiltinExec::Det(m.unify_undo(&a[2], &term)))
}

fn parse_open_options(options: &Term) -> Result<StreamOptions, Ball> {
    let mut parsed = StreamOptions::default();
    let items = options.list_view().map_err(|(_, tail)| match tail {
        Term::Var(_) => instantiation_error(),
        _ => type_error("list", &options.deref()),
    })?;
    for item in items {
        let t = item.deref();
        if let Some(args) = t.match_struct("type", 1) {
            parsed.stream_type = match args[0].deref() {
                Term::Atom(a) if a.name() == "text" => StreamType::Text,
                Term::Atom(a) if a.name() == "binary" => StreamType::Binary,
                _ => return Err(domain_error("stream_option", &t)),
            };
        } else if let Some(args) = t.match_struct("reposition", 1) {
            parsed.reposition = matches!(args[0].deref(), Term::Atom(a) if a.name() == "true");
        } else if let Some(args) = t.match_struct("alias", 1) {
            match args[0].deref() {
                Term::Atom(a) => parsed.alias = Some(a.name().to_string()),
                _ => return Err(domain_error("stream_option", &t)),
            }
        } else if let Some(args) = t.match_struct("eof_action", 1) {
            parsed.eof_action = match args[0].deref() {
                Term::Atom(a) if a.name() == "error" => EofAction::Error,
                Term::Atom(a) if a.name() == "eof_code" => EofAction::EofCode,
                Term::Atom(a) if a.name() == "reset" => EofAction::Reset,
                _ => return Err(domain_error("stream_option", &t)),
            };
        } else {
            return Err(domain_error("stream_option", &t));
        }
    }
    Ok(parsed)
}

fn close_force_option(options: &Term) -> Result<bool, Ball> {
    let items = options.list_view().map_err(|(_, tail)| match tail {
        Term::Var(_) => instantiation_error(),
        _ => type_error("list", &options.deref()),
    })?;
    let mut force = false;
    for item in items {
        let t = item.deref();
        match t.match_struct("force", 1) {
            Some(args) => {
                force = matches!(args[0].deref(), Term::Atom(a) if a.name() == "true");
            }
            None => return Err(domain_error("close_option", &t)),
        }
    }
    Ok(force)
}

fn close(m: &mut Machine, stream_term: &Term, force: bool) -> Result<BuiltinExec, Ball> {
    let stream = m.streams.resolve(stream_term)?;
    let id = stream.lock().expect("stream poisoned").id;
    m.streams.close(id, force)?;
    Ok(BuiltinExec::Det(true))
}

/// End-of-file handling shared by character and byte reads.
fn eof_result(
    m: &mut Machine,
    stream: &Shared,
    target: &Term,
    was_eof: bool,
    eof_term: Term,
) -> Result<BuiltinExec, Ball> {
    let action = {
        let s = stream.lock().expect("stream poisoned");
        s.options.eof_action
    };
    match action {
        EofAction::Error if was_eof => Err(permission_error(
            "input",
            "past_end_of_stream",
            target.deref(),
        )),
        EofAction::Reset => {
            stream.lock().expect("stream poisoned").clear_eof();
            Ok(BuiltinExec::Det(m.unify_undo(target, &eof_term)))
        }
        _ => Ok(BuiltinExec::Det(m.unify_undo(target, &eof_term))),
    }
}

fn get_char(
    m: &mut Machine,
    stream: &Shared,
    target: &Term,
    peek: bool,
) -> Result<BuiltinExec, Ball> {
    let (result, was_eof) = {
        let mut s = stream.lock().expect("stream poisoned");
        let was_eof = s.eof_seen();
        let c = if peek { s.peek_char() } else { s.get_char() };
        (c.map_err(io_ball)?, was_eof)
    };
    match result {
        Some(c) => Ok(BuiltinExec::Det(
            m.unify_undo(target, &Term::atom(&c.to_string())),
        )),
        None => eof_result(m, stream, target, was_eof, Term::atom("end_of_file")),
    }
}

fn get_byte(
    m: &mut Machine,
    stream: &Shared,
    target: &Term,
    peek: bool,
) -> Result<BuiltinExec, Ball> {
    let (result, was_eof) = {
        let mut s = stream.lock().expect("stream poisoned");
        let was_eof = s.eof_seen();
        let b = if peek { s.peek_byte() } else { s.get_byte() };
        (b.map_err(io_ball)?, was_eof)
    };
    match result {
        Some(b) => Ok(BuiltinExec::Det(
            m.unify_undo(target, &Term::Int(b as i64)),
        )),
        None => eof_result(m, stream, target, was_eof, Term::Int(-1)),
    }
}

fn put_char(m: &mut Machine, stream: &Shared, arg: &Term) -> Result<BuiltinExec, Ball> {
    let atom = need_atom(arg)?;
    let mut chars = atom.name().chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(type_error("character", &Term::Atom(atom))),
    };
    emit(m, stream, &c.to_string())
}

fn put_byte(m: &mut Machine, stream: &Shared, arg: &Term) -> Result<BuiltinExec, Ball> {
    let byte = need_int(arg)?;
    if !(0..=255).contains(&byte) {
        return Err(type_error("byte", &Term::Int(byte)));
    }
    let mut s = stream.lock().expect("stream poisoned");
    s.write_bytes(&[byte as u8]).map_err(io_ball)?;
    Ok(BuiltinExec::Det(true))
}

fn read_term(
    m: &mut Machine,
    stream: &Shared,
    target: &Term,
    options: &Term,
) -> Result<BuiltinExec, Ball> {
    let text = {
        let mut s = stream.lock().expect("stream poisoned");
        crate::read::read_clause_text(&mut s).map_err(io_ball)?
    };
    let text = match text {
        Some(text) => text,
        None => {
            return Ok(BuiltinExec::Det(
                m.unify_undo(target, &Term::atom("end_of_file")),
            ))
        }
    };
    let read = crate::read::parse_one(&text, &m.ops, m.flags.double_quotes())?
        .ok_or_else(|| syntax_error("unexpected end of input"))?;
    if !m.unify_undo(target, &read.term) {
        return Ok(BuiltinExec::Det(false));
    }
    // Option handling: variables(Vars), variable_names(Pairs).
    let items = options.list_view().map_err(|(_, tail)| match tail {
        Term::Var(_) => instantiation_error(),
        _ => type_error("list", &options.deref()),
    })?;
    for item in items {
        let t = item.deref();
        if let Some(args) = t.match_struct("variables", 1) {
            let vars: Vec<Term> = term_variables(&read.term)
                .into_iter()
                .map(Term::Var)
                .collect();
            if !m.unify_undo(&args[0], &Term::list(vars)) {
                return Ok(BuiltinExec::Det(false));
            }
        } else if let Some(args) = t.match_struct("variable_names", 1) {
            let pairs: Vec<Term> = read
                .bindings
                .iter()
                .map(|(name, var)| {
                    Term::compound("=", vec![Term::atom(name), var.clone()])
                })
                .collect();
            if !m.unify_undo(&args[0], &Term::list(pairs)) {
                return Ok(BuiltinExec::Det(false));
            }
        } else {
            return Err(domain_error("read_option", &t));
        }
    }
    Ok(BuiltinExec::Det(true))
}
