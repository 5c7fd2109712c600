//! Reading Prolog source text into terms.
//!
//! The parser is operator-precedence, driven by the engine's mutable
//! operator table; source text comes out as a sequence of [`ReadTerm`]s
//! with their variable-name bindings.

mod lexer;
mod parser;

pub use lexer::LexError;
pub use parser::{Parser, ReadTerm};

use std::io;

use crate::error::{syntax_error, Ball, RookError};
use crate::flags::DoubleQuotes;
use crate::ops::OpTable;
use crate::stream::Stream;

/// Parse every clause in `text`. Used by `consult_str` and the loader.
pub fn parse_program(
    text: &str,
    ops: &OpTable,
    double_quotes: DoubleQuotes,
) -> Result<Vec<ReadTerm>, RookError> {
    let mut parser = Parser::new(text, ops, double_quotes);
    let mut out = Vec::new();
    loop {
        match parser.next_term() {
            Ok(Some(read)) => out.push(read),
            Ok(None) => return Ok(out),
            Err(e) => {
                return Err(RookError::Syntax {
                    line: e.line,
                    detail: e.message,
                })
            }
        }
    }
}

/// Parse exactly one term (used by `read_term/2` and the REPL); `None` at
/// end of input. Errors become `syntax_error/1` balls.
pub fn parse_one(
    text: &str,
    ops: &OpTable,
    double_quotes: DoubleQuotes,
) -> Result<Option<ReadTerm>, Ball> {
    let mut parser = Parser::new(text, ops, double_quotes);
    parser
        .next_term()
        .map_err(|e| syntax_error(&format!("line {}: {}", e.line, e.message)))
}

/// Pull one clause's worth of text off a stream: everything up to a `.`
/// followed by layout, tracking quotes and comments so a dot inside either
/// does not terminate. `None` when the stream is at end of file.
pub fn read_clause_text(stream: &mut Stream) -> io::Result<Option<String>> {
    let mut text = String::new();
    let mut in_quote: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut prev: Option<char> = None;
    loop {
        let c = match stream.get_char()? {
            Some(c) => c,
            None => {
                if text.trim().is_empty() {
                    return Ok(None);
                }
                return Ok(Some(text));
            }
        };
        text.push(c);
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            prev = None;
            continue;
        }
        if in_block_comment {
            if prev == Some('*') && c == '/' {
                in_block_comment = false;
                prev = None;
            } else {
                prev = Some(c);
            }
            continue;
        }
        if let Some(q) = in_quote {
            if c == q && prev != Some('\\') {
                in_quote = None;
            }
            // A doubled backslash does not escape the closing quote.
            prev = if prev == Some('\\') && c == '\\' {
                None
            } else {
                Some(c)
            };
            continue;
        }
        match c {
            '%' => in_line_comment = true,
            '*' if prev == Some('/') => in_block_comment = true,
            '\'' | '"' => in_quote = Some(c),
            _ => {}
        }
        if prev == Some('.') && (c.is_whitespace() || c == '%') {
            return Ok(Some(text));
        }
        prev = Some(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamTable;

    #[test]
    fn program_parsing_counts_clauses() {
        let ops = OpTable::standard();
        let text = "p(a). p(b).\nq(X) :- p(X).";
        let clauses = parse_program(text, &ops, DoubleQuotes::Codes).unwrap();
        assert_eq!(clauses.len(), 3);
    }

    #[test]
    fn syntax_errors_surface_with_line() {
        let ops = OpTable::standard();
        let err = parse_program("p(a).\nq(.", &ops, DoubleQuotes::Codes).unwrap_err();
        match err {
            RookError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn clause_text_extraction() {
        let table = StreamTable::new();
        let id = table.open_string("p(a). q('dot . inside').\nr(X) :- p(X). ");
        let stream = table.get(id).unwrap();
        let mut s = stream.lock().unwrap();
        let first = read_clause_text(&mut s).unwrap().unwrap();
        assert!(first.contains("p(a)."));
        let second = read_clause_text(&mut s).unwrap().unwrap();
        assert!(second.contains("dot . inside"));
        let third = read_clause_text(&mut s).unwrap().unwrap();
        assert!(third.contains(":- p(X)."));
        assert!(read_clause_text(&mut s).unwrap().is_none());
    }
}
