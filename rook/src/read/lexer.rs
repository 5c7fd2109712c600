//! Tokenizer for ISO Prolog text.

use std::iter::Peekable;
use std::str::Chars;

use crate::term::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unquoted or quoted atom name.
    Atom(String),
    /// Variable name (initial uppercase or `_`).
    Var(String),
    Int(i64),
    /// Integer literal wider than a machine word.
    Big(Decimal),
    /// Float value with its exact decimal reading when representable.
    Float(f64, Option<Decimal>),
    /// Double-quoted text; interpretation is the reader's business.
    Str(String),
    /// `( ) [ ] { } , |`
    Punct(char),
    /// Clause terminator `.`
    End,
}

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub token: Token,
    /// No layout between this token and the previous one.
    pub adjacent: bool,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl LexError {
    fn new(line: usize, message: impl Into<String>) -> LexError {
        LexError {
            line,
            message: message.into(),
        }
    }
}

pub const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    pending: Option<TokenInfo>,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Lexer<'a> {
        Lexer {
            chars: text.chars().peekable(),
            line: 1,
            pending: None,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn peek(&mut self) -> Result<Option<&TokenInfo>, LexError> {
        if self.pending.is_none() {
            self.pending = self.scan()?;
        }
        Ok(self.pending.as_ref())
    }

    pub fn next(&mut self) -> Result<Option<TokenInfo>, LexError> {
        if let Some(tok) = self.pending.take() {
            return Ok(Some(tok));
        }
        self.scan()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume layout and comments; `true` when anything was skipped.
    fn skip_layout(&mut self) -> Result<bool, LexError> {
        let mut skipped = false;
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                    skipped = true;
                }
                Some('%') => {
                    skipped = true;
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') => {
                    // Maybe a block comment.
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() == Some(&'*') {
                        skipped = true;
                        self.bump();
                        self.bump();
                        let start = self.line;
                        loop {
                            match self.bump() {
                                Some('*') if self.peek_char() == Some('/') => {
                                    self.bump();
                                    break;
                                }
                                Some(_) => {}
                                None => {
                                    return Err(LexError::new(start, "unterminated block comment"))
                                }
                            }
                        }
                    } else {
                        return Ok(skipped);
                    }
                }
                _ => return Ok(skipped),
            }
        }
    }

    fn scan(&mut self) -> Result<Option<TokenInfo>, LexError> {
        let had_layout = self.skip_layout()?;
        let line = self.line;
        let adjacent = !had_layout;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(None),
        };
        let token = match c {
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | '|' => {
                self.bump();
                Token::Punct(c)
            }
            '!' | ';' => {
                self.bump();
                Token::Atom(c.to_string())
            }
            '\'' => self.quoted(line, '\'').map(Token::Atom)?,
            '"' => self.quoted(line, '"').map(Token::Str)?,
            '0'..='9' => self.number(line)?,
            '_' => {
                let name = self.name_token();
                Token::Var(name)
            }
            c if c.is_alphabetic() && c.is_uppercase() => {
                let name = self.name_token();
                Token::Var(name)
            }
            c if c.is_alphabetic() => {
                let name = self.name_token();
                Token::Atom(name)
            }
            c if SYMBOL_CHARS.contains(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if SYMBOL_CHARS.contains(c) {
                        name.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                // A lone `.` followed by layout or EOF terminates a clause.
                if name == "." {
                    match self.peek_char() {
                        None => Token::End,
                        Some(c) if c.is_whitespace() || c == '%' => Token::End,
                        _ => Token::Atom(name),
                    }
                } else {
                    Token::Atom(name)
                }
            }
            other => {
                return Err(LexError::new(
                    line,
                    format!("unexpected character '{}'", other),
                ))
            }
        };
        Ok(Some(TokenInfo {
            token,
            adjacent,
            line,
        }))
    }

    fn name_token(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    fn escape(&mut self, line: usize) -> Result<Option<char>, LexError> {
        match self.bump() {
            Some('n') => Ok(Some('\n')),
            Some('t') => Ok(Some('\t')),
            Some('r') => Ok(Some('\r')),
            Some('a') => Ok(Some('\x07')),
            Some('b') => Ok(Some('\x08')),
            Some('f') => Ok(Some('\x0C')),
            Some('v') => Ok(Some('\x0B')),
            Some('0') => Ok(Some('\0')),
            Some('\\') => Ok(Some('\\')),
            Some('\'') => Ok(Some('\'')),
            Some('"') => Ok(Some('"')),
            Some('`') => Ok(Some('`')),
            // Escaped newline: line continuation.
            Some('\n') => Ok(None),
            Some('x') => {
                let mut value: u32 = 0;
                while let Some(c) = self.peek_char() {
                    if let Some(d) = c.to_digit(16) {
                        value = value * 16 + d;
                        self.bump();
                    } else {
                        break;
                    }
                }
                if self.peek_char() == Some('\\') {
                    self.bump();
                }
                char::from_u32(value)
                    .map(Some)
                    .ok_or_else(|| LexError::new(line, "invalid \\x escape"))
            }
            Some(d) if d.is_ascii_digit() => {
                let mut value: u32 = d.to_digit(8).unwrap_or(0);
                while let Some(c) = self.peek_char() {
                    if let Some(o) = c.to_digit(8) {
                        value = value * 8 + o;
                        self.bump();
                    } else {
                        break;
                    }
                }
                if self.peek_char() == Some('\\') {
                    self.bump();
                }
                char::from_u32(value)
                    .map(Some)
                    .ok_or_else(|| LexError::new(line, "invalid octal escape"))
            }
            Some(other) => Err(LexError::new(
                line,
                format!("unknown escape '\\{}'", other),
            )),
            None => Err(LexError::new(line, "unterminated escape")),
        }
    }

    fn quoted(&mut self, line: usize, delimiter: char) -> Result<String, LexError> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == delimiter => {
                    // Doubled delimiter stands for itself.
                    if self.peek_char() == Some(delimiter) {
                        self.bump();
                        text.push(delimiter);
                    } else {
                        return Ok(text);
                    }
                }
                Some('\\') => {
                    if let Some(c) = self.escape(line)? {
                        text.push(c);
                    }
                }
                Some(c) => text.push(c),
                None => return Err(LexError::new(line, "unterminated quoted token")),
            }
        }
    }

    fn digits(&mut self, radix: u32) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c.to_digit(radix).is_some() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text
    }

    fn number(&mut self, line: usize) -> Result<Token, LexError> {
        let first = self.bump().expect("digit present");
        if first == '0' {
            match self.peek_char() {
                Some('\'') => {
                    self.bump();
                    // 0'c character code, with escapes and 0''' for quote.
                    return match self.bump() {
                        Some('\\') => match self.escape(line)? {
                            Some(c) => Ok(Token::Int(c as i64)),
                            None => Err(LexError::new(line, "empty character escape")),
                        },
                        Some('\'') => {
                            if self.peek_char() == Some('\'') {
                                self.bump();
                                Ok(Token::Int('\'' as i64))
                            } else {
                                Ok(Token::Int('\'' as i64))
                            }
                        }
                        Some(c) => Ok(Token::Int(c as i64)),
                        None => Err(LexError::new(line, "unterminated character code")),
                    };
                }
                Some('x') | Some('o') | Some('b') => {
                    let radix = match self.bump() {
                        Some('x') => 16,
                        Some('o') => 8,
                        _ => 2,
                    };
                    let digits = self.digits(radix);
                    if digits.is_empty() {
                        return Err(LexError::new(line, "missing digits after radix prefix"));
                    }
                    return i64::from_str_radix(&digits, radix)
                        .map(Token::Int)
                        .map_err(|_| LexError::new(line, "integer literal out of range"));
                }
                _ => {}
            }
        }
        let mut int_text = String::new();
        int_text.push(first);
        int_text.push_str(&self.digits(10));

        // Fractional part only when `.` is followed by a digit.
        let mut frac_text = String::new();
        if self.peek_char() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.bump();
                frac_text = self.digits(10);
            }
        }
        let mut exp: i32 = 0;
        let mut has_exp = false;
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let mut ahead = self.chars.clone();
            ahead.next();
            let sign_or_digit = ahead.peek().copied();
            let exp_valid = match sign_or_digit {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => {
                    let mut ahead2 = ahead.clone();
                    ahead2.next();
                    ahead2.peek().map(|c| c.is_ascii_digit()).unwrap_or(false)
                }
                _ => false,
            };
            if exp_valid {
                has_exp = true;
                self.bump();
                let negative = match self.peek_char() {
                    Some('+') => {
                        self.bump();
                        false
                    }
                    Some('-') => {
                        self.bump();
                        true
                    }
                    _ => false,
                };
                let digits = self.digits(10);
                let magnitude: i32 = digits
                    .parse()
                    .map_err(|_| LexError::new(line, "exponent out of range"))?;
                exp = if negative { -magnitude } else { magnitude };
            }
        }

        if frac_text.is_empty() && !has_exp {
            return match int_text.parse::<i64>() {
                Ok(i) => Ok(Token::Int(i)),
                // Wider than a machine word: decimal representation.
                Err(_) => Decimal::parse(&int_text)
                    .map(Token::Big)
                    .ok_or_else(|| LexError::new(line, "integer literal out of range")),
            };
        }

        let text = if frac_text.is_empty() {
            format!("{}.0e{}", int_text, exp)
        } else {
            format!("{}.{}e{}", int_text, frac_text, exp)
        };
        let value: f64 = text
            .parse()
            .map_err(|_| LexError::new(line, "unreadable float literal"))?;
        let exact = exact_decimal(&int_text, &frac_text, exp);
        Ok(Token::Float(value, exact))
    }
}

/// Exact decimal reading of `int.frac * 10^exp`, when it fits.
fn exact_decimal(int_text: &str, frac_text: &str, exp: i32) -> Option<Decimal> {
    let digits = format!("{}{}", int_text, frac_text);
    let mantissa: i128 = digits.parse().ok()?;
    let scale = frac_text.len() as i64 - exp as i64;
    if scale >= 0 {
        u32::try_from(scale).ok().map(|s| Decimal::new(mantissa, s))
    } else {
        let mut m = mantissa;
        for _ in 0..(-scale) {
            m = m.checked_mul(10)?;
        }
        Some(Decimal::new(m, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(text: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(text);
        let mut out = Vec::new();
        while let Some(info) = lexer.next().expect("lexes") {
            out.push(info.token);
        }
        out
    }

    #[test]
    fn words_and_variables() {
        assert_eq!(
            all_tokens("foo Bar _baz"),
            vec![
                Token::Atom("foo".into()),
                Token::Var("Bar".into()),
                Token::Var("_baz".into()),
            ]
        );
    }

    #[test]
    fn clause_terminator_vs_symbol_dot() {
        assert_eq!(
            all_tokens("a. X =.. L."),
            vec![
                Token::Atom("a".into()),
                Token::End,
                Token::Var("X".into()),
                Token::Atom("=..".into()),
                Token::Var("L".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(all_tokens("42"), vec![Token::Int(42)]);
        assert_eq!(all_tokens("0xff"), vec![Token::Int(255)]);
        assert_eq!(all_tokens("0o17"), vec![Token::Int(15)]);
        assert_eq!(all_tokens("0b101"), vec![Token::Int(5)]);
        assert_eq!(all_tokens("0'a"), vec![Token::Int(97)]);
        assert_eq!(all_tokens("0'\\n"), vec![Token::Int(10)]);
        match &all_tokens("3.14")[0] {
            Token::Float(v, Some(d)) => {
                assert_eq!(*v, 3.14);
                assert_eq!(d.to_string(), "3.14");
            }
            other => panic!("expected float, got {:?}", other),
        }
        match &all_tokens("3.0e4")[0] {
            Token::Float(v, Some(d)) => {
                assert_eq!(*v, 30000.0);
                assert_eq!(d.to_string(), "30000");
            }
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn wide_integer_literal_becomes_decimal() {
        match &all_tokens("123456789012345678901234567890")[0] {
            Token::Big(d) => assert_eq!(d.to_string(), "123456789012345678901234567890"),
            other => panic!("expected big literal, got {:?}", other),
        }
    }

    #[test]
    fn quoted_atoms_and_strings() {
        assert_eq!(
            all_tokens("'hello world' 'don''t'"),
            vec![
                Token::Atom("hello world".into()),
                Token::Atom("don't".into()),
            ]
        );
        assert_eq!(
            all_tokens(r#""a\nb""#),
            vec![Token::Str("a\nb".into())]
        );
    }

    #[test]
    fn comments_are_layout() {
        assert_eq!(
            all_tokens("a % line\n /* block\n */ b"),
            vec![Token::Atom("a".into()), Token::Atom("b".into())]
        );
    }

    #[test]
    fn adjacency_flag() {
        let mut lexer = Lexer::new("f(x) f (x)");
        let _f = lexer.next().unwrap().unwrap();
        let paren = lexer.next().unwrap().unwrap();
        assert!(paren.adjacent);
        // skip x )
        lexer.next().unwrap();
        lexer.next().unwrap();
        let _f = lexer.next().unwrap().unwrap();
        let paren = lexer.next().unwrap().unwrap();
        assert!(!paren.adjacent);
    }

    #[test]
    fn symbolic_atom_runs() {
        assert_eq!(
            all_tokens("X --> Y"),
            vec![
                Token::Var("X".into()),
                Token::Atom("-->".into()),
                Token::Var("Y".into()),
            ]
        );
    }

    #[test]
    fn error_reports_line() {
        let mut lexer = Lexer::new("a\n'unclosed");
        lexer.next().unwrap();
        let err = lexer.next().unwrap_err();
        assert_eq!(err.line, 2);
    }
}
