//! Operator-precedence parser over the token stream.
//!
//! Prolog's operator table is mutable at runtime, so parsing is driven by
//! the engine's live [`OpTable`] rather than a fixed grammar.

use std::collections::HashMap;

use crate::flags::DoubleQuotes;
use crate::ops::OpTable;
use crate::term::{Flt, Term, VarRef};

use super::lexer::{LexError, Lexer, Token, TokenInfo};

/// One parsed clause or query, plus its named variables in first-occurrence
/// order.
#[derive(Debug)]
pub struct ReadTerm {
    pub term: Term,
    pub bindings: Vec<(String, Term)>,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    ops: &'a OpTable,
    double_quotes: DoubleQuotes,
    vars: HashMap<String, VarRef>,
    order: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, ops: &'a OpTable, double_quotes: DoubleQuotes) -> Parser<'a> {
        Parser {
            lexer: Lexer::new(text),
            ops,
            double_quotes,
            vars: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Loaders call this after running a directive so a `double_quotes`
    /// flag change affects the rest of the file.
    pub fn set_double_quotes(&mut self, double_quotes: DoubleQuotes) {
        self.double_quotes = double_quotes;
    }

    fn error(&self, line: usize, message: impl Into<String>) -> LexError {
        LexError {
            line,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> Result<TokenInfo, LexError> {
        let line = self.lexer.line();
        self.lexer
            .next()?
            .ok_or_else(|| self.error(line, "unexpected end of input"))
    }

    /// Read the next clause; `None` at end of input.
    pub fn next_term(&mut self) -> Result<Option<ReadTerm>, LexError> {
        self.vars.clear();
        self.order.clear();
        if self.lexer.peek()?.is_none() {
            return Ok(None);
        }
        let term = self.parse(1200)?;
        let info = self.next_token()?;
        if info.token != Token::End {
            return Err(self.error(
                info.line,
                format!("operator expected before {:?}", info.token),
            ));
        }
        let bindings = self
            .order
            .iter()
            .map(|name| {
                let var = self.vars.get(name).expect("recorded variable");
                (name.clone(), Term::Var(var.clone()))
            })
            .collect();
        Ok(Some(ReadTerm { term, bindings }))
    }

    fn variable(&mut self, name: &str) -> Term {
        if name == "_" {
            return Term::var();
        }
        if let Some(var) = self.vars.get(name) {
            return Term::Var(var.clone());
        }
        let var = VarRef::named(Some(name));
        self.vars.insert(name.to_string(), var.clone());
        self.order.push(name.to_string());
        Term::Var(var)
    }

    fn parse(&mut self, max_priority: u16) -> Result<Term, LexError> {
        let (mut left, mut left_priority) = self.parse_primary(max_priority)?;
        loop {
            let info = match self.lexer.peek()? {
                Some(info) => info.clone(),
                None => break,
            };
            match &info.token {
                Token::Punct(',') if max_priority >= 1000 => {
                    if left_priority > 999 {
                        break;
                    }
                    self.next_token()?;
                    let right = self.parse(1000)?;
                    left = Term::compound(",", vec![left, right]);
                    left_priority = 1000;
                }
                // `|` as an infix read alternative to `;`.
                Token::Punct('|') if max_priority >= 1100 => {
                    if left_priority > 1099 {
                        break;
                    }
                    self.next_token()?;
                    let right = self.parse(1100)?;
                    left = Term::compound(";", vec![left, right]);
                    left_priority = 1100;
                }
                Token::Atom(name) => {
                    if let Some(def) = self.ops.infix(name) {
                        if def.priority <= max_priority
                            && left_priority <= def.arg_priority(false)
                        {
                            self.next_token()?;
                            let right = self.parse(def.arg_priority(true))?;
                            left = Term::compound(name, vec![left, right]);
                            left_priority = def.priority;
                            continue;
                        }
                    }
                    if let Some(def) = self.ops.postfix(name) {
                        if def.priority <= max_priority
                            && left_priority <= def.arg_priority(false)
                        {
                            self.next_token()?;
                            left = Term::compound(name, vec![left]);
                            left_priority = def.priority;
                            continue;
                        }
                    }
                    break;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_primary(&mut self, max_priority: u16) -> Result<(Term, u16), LexError> {
        let info = self.next_token()?;
        let term = match info.token {
            Token::Int(i) => Term::Int(i),
            Token::Big(d) => Term::Dec(d),
            Token::Float(value, exact) => Term::Float(Flt { value, exact }),
            Token::Str(s) => self.string_term(&s),
            Token::Var(name) => self.variable(&name),
            Token::Punct('(') => {
                let t = self.parse(1200)?;
                self.expect_punct(')')?;
                t
            }
            Token::Punct('[') => return Ok((self.parse_list()?, 0)),
            Token::Punct('{') => {
                if self.peek_is_punct('}')? {
                    self.next_token()?;
                    Term::atom("{}")
                } else {
                    let t = self.parse(1200)?;
                    self.expect_punct('}')?;
                    Term::compound("{}", vec![t])
                }
            }
            Token::Atom(name) => return self.parse_atom_primary(name, info.line, max_priority),
            Token::End => return Err(self.error(info.line, "unexpected end of clause")),
            Token::Punct(c) => {
                return Err(self.error(info.line, format!("unexpected '{}'", c)))
            }
        };
        Ok((term, 0))
    }

    fn parse_atom_primary(
        &mut self,
        name: String,
        line: usize,
        max_priority: u16,
    ) -> Result<(Term, u16), LexError> {
        let lookahead = self.lexer.peek()?.cloned();
        // Functional notation binds tightest: `f(` with no layout between.
        if let Some(next) = &lookahead {
            if next.token == Token::Punct('(') && next.adjacent {
                self.next_token()?;
                let args = self.parse_arguments()?;
                if args.is_empty() {
                    return Err(self.error(line, "empty argument list"));
                }
                return Ok((Term::compound(&name, args), 0));
            }
        }
        if let Some(def) = self.ops.prefix(&name) {
            if def.priority <= max_priority {
                if let Some(next) = &lookahead {
                    // `-` or `+` immediately followed by a number literal is
                    // a signed literal, not a prefix operation.
                    if (name == "-" || name == "+") && next.adjacent {
                        match next.token.clone() {
                            Token::Int(i) => {
                                self.next_token()?;
                                let value = if name == "-" { i.wrapping_neg() } else { i };
                                return Ok((Term::Int(value), 0));
                            }
                            Token::Float(v, exact) => {
                                self.next_token()?;
                                let (v, exact) = if name == "-" {
                                    (-v, exact.and_then(|d| d.neg().ok()))
                                } else {
                                    (v, exact)
                                };
                                return Ok((Term::Float(Flt { value: v, exact }), 0));
                            }
                            Token::Big(d) => {
                                self.next_token()?;
                                let d = if name == "-" {
                                    d.neg().map_err(|_| {
                                        self.error(line, "integer literal out of range")
                                    })?
                                } else {
                                    d
                                };
                                // A negated wide literal may fit the machine
                                // word after all.
                                return Ok((
                                    match d.to_i64() {
                                        Some(i) => Term::Int(i),
                                        None => Term::Dec(d),
                                    },
                                    0,
                                ));
                            }
                            _ => {}
                        }
                    }
                    if starts_term(&next.token) {
                        let operand = self.parse(def.arg_priority(true))?;
                        return Ok((Term::compound(&name, vec![operand]), def.priority));
                    }
                }
            }
        }
        Ok((Term::atom(&name), 0))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Term>, LexError> {
        let mut args = Vec::new();
        loop {
            args.push(self.parse(999)?);
            let info = self.next_token()?;
            match info.token {
                Token::Punct(',') => {}
                Token::Punct(')') => return Ok(args),
                other => {
                    return Err(self.error(
                        info.line,
                        format!("expected ',' or ')' in arguments, found {:?}", other),
                    ))
                }
            }
        }
    }

    fn parse_list(&mut self) -> Result<Term, LexError> {
        if self.peek_is_punct(']')? {
            self.next_token()?;
            return Ok(Term::nil());
        }
        let mut items = vec![self.parse(999)?];
        loop {
            let info = self.next_token()?;
            match info.token {
                Token::Punct(',') => items.push(self.parse(999)?),
                Token::Punct('|') => {
                    let tail = self.parse(999)?;
                    self.expect_punct(']')?;
                    return Ok(Term::partial_list(items, tail));
                }
                Token::Punct(']') => return Ok(Term::list(items)),
                other => {
                    return Err(self.error(
                        info.line,
                        format!("expected ',', '|' or ']' in list, found {:?}", other),
                    ))
                }
            }
        }
    }

    fn string_term(&self, text: &str) -> Term {
        match self.double_quotes {
            DoubleQuotes::Atom => Term::atom(text),
            DoubleQuotes::Codes => {
                Term::list(text.chars().map(|c| Term::Int(c as i64)).collect::<Vec<_>>())
            }
            DoubleQuotes::Chars => Term::list(
                text.chars()
                    .map(|c| Term::atom(&c.to_string()))
                    .collect::<Vec<_>>(),
            ),
        }
    }

    fn peek_is_punct(&mut self, c: char) -> Result<bool, LexError> {
        Ok(matches!(
            self.lexer.peek()?,
            Some(TokenInfo {
                token: Token::Punct(p),
                ..
            }) if *p == c
        ))
    }

    fn expect_punct(&mut self, c: char) -> Result<(), LexError> {
        let info = self.next_token()?;
        if info.token == Token::Punct(c) {
            Ok(())
        } else {
            Err(self.error(
                info.line,
                format!("expected '{}', found {:?}", c, info.token),
            ))
        }
    }
}

fn starts_term(token: &Token) -> bool {
    match token {
        Token::Int(_)
        | Token::Big(_)
        | Token::Float(..)
        | Token::Str(_)
        | Token::Var(_)
        | Token::Atom(_) => true,
        Token::Punct(c) => matches!(c, '(' | '[' | '{'),
        Token::End => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::DoubleQuotes;
    use crate::ops::OpTable;

    fn parse_one(text: &str) -> Term {
        let ops = OpTable::standard();
        let mut parser = Parser::new(text, &ops, DoubleQuotes::Codes);
        parser
            .next_term()
            .expect("parses")
            .expect("one term")
            .term
    }

    fn shape(term: &Term) -> String {
        format!("{}", term)
    }

    #[test]
    fn facts_and_rules() {
        assert_eq!(shape(&parse_one("parent(tom, mary).")), "parent(tom,mary)");
        assert_eq!(
            shape(&parse_one("ancestor(X,Y) :- parent(X,Y).")),
            ":-(ancestor(_X,_Y),parent(_X,_Y))"
        );
    }

    #[test]
    fn operator_priorities() {
        assert_eq!(shape(&parse_one("X is 1 + 2 * 3.")), "is(_X,+(1,*(2,3)))");
        assert_eq!(shape(&parse_one("(1 + 2) * 3.")), "*(+(1,2),3)");
        // yfx associates left.
        assert_eq!(shape(&parse_one("1 - 2 - 3.")), "-(-(1,2),3)");
        // xfy associates right.
        assert_eq!(shape(&parse_one("a , b , c.")), ",(a,,(b,c))");
    }

    #[test]
    fn shared_variables_are_shared() {
        let t = parse_one("f(X, X, Y).");
        match t {
            Term::Struct(s) => match (&s.args[0], &s.args[1], &s.args[2]) {
                (Term::Var(a), Term::Var(b), Term::Var(c)) => {
                    assert_eq!(a, b);
                    assert_ne!(a, c);
                }
                _ => panic!("expected variables"),
            },
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn anonymous_vars_are_distinct() {
        let t = parse_one("f(_, _).");
        match t {
            Term::Struct(s) => match (&s.args[0], &s.args[1]) {
                (Term::Var(a), Term::Var(b)) => assert_ne!(a, b),
                _ => panic!("expected variables"),
            },
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn lists_and_partial_lists() {
        assert_eq!(shape(&parse_one("[1,2,3].")), "[1,2,3]");
        assert_eq!(shape(&parse_one("[H|T].")), "[_H|_T]");
        assert_eq!(shape(&parse_one("[].")), "[]");
    }

    #[test]
    fn curly_terms() {
        assert_eq!(shape(&parse_one("{a, b}.")), "{,(a,b)}");
        assert_eq!(shape(&parse_one("{}.")), "{}");
    }

    #[test]
    fn negative_literals_vs_prefix_minus() {
        assert_eq!(shape(&parse_one("-1.")), "-1");
        assert_eq!(shape(&parse_one("- 1.")), "-(1)");
        assert_eq!(shape(&parse_one("3 - 1.")), "-(3,1)");
        assert_eq!(shape(&parse_one("f(-1).")), "f(-1)");
    }

    #[test]
    fn prefix_directive() {
        assert_eq!(shape(&parse_one(":- dynamic(foo/2).")), ":-(dynamic(/(foo,2)))");
    }

    #[test]
    fn if_then_else_nesting() {
        assert_eq!(
            shape(&parse_one("(C -> T ; E).")),
            ";(->(_C,_T),_E)"
        );
    }

    #[test]
    fn double_quotes_modes() {
        let ops = OpTable::standard();
        let mut parser = Parser::new("\"ab\".", &ops, DoubleQuotes::Codes);
        let t = parser.next_term().unwrap().unwrap().term;
        assert_eq!(shape(&t), "[97,98]");

        let mut parser = Parser::new("\"ab\".", &ops, DoubleQuotes::Chars);
        let t = parser.next_term().unwrap().unwrap().term;
        assert_eq!(shape(&t), "[a,b]");

        let mut parser = Parser::new("\"ab\".", &ops, DoubleQuotes::Atom);
        let t = parser.next_term().unwrap().unwrap().term;
        assert_eq!(shape(&t), "ab");
    }

    #[test]
    fn bindings_in_order() {
        let ops = OpTable::standard();
        let mut parser = Parser::new("f(B, A, B).", &ops, DoubleQuotes::Codes);
        let read = parser.next_term().unwrap().unwrap();
        let names: Vec<&str> = read.bindings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn several_clauses() {
        let ops = OpTable::standard();
        let mut parser = Parser::new("a. b. c.", &ops, DoubleQuotes::Codes);
        let mut count = 0;
        while parser.next_term().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let ops = OpTable::standard();
        let mut parser = Parser::new("a b.", &ops, DoubleQuotes::Codes);
        assert!(parser.next_term().is_err());
    }
}
