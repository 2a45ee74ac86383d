//! Tokenizer for the expression/statement language.

use jvalue::{JError, Span};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(String),
    String(String),
    Ident(String),
    Keyword(Keyword),
    /// `/pattern/flags`
    Regex { pattern: String, global: bool, ignore_case: bool },
    /// Any of the fixed punctuation/operator spellings, e.g. `"=="`, `"<<"`, `"?:"`.
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Null,
    True,
    False,
    This,
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Descending,
    Limit,
    Distinct,
    As,
    Between,
    Like,
    In,
    Not,
    Is,
    And,
    Or,
    Values,
    Function,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Return,
    Var,
    Const,
}

impl Keyword {
    fn from_str(s: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match s.to_ascii_uppercase().as_str() {
            "NULL" => Null,
            "TRUE" => True,
            "FALSE" => False,
            "THIS" => This,
            "SELECT" => Select,
            "FROM" => From,
            "WHERE" => Where,
            "GROUP" => Group,
            "BY" => By,
            "HAVING" => Having,
            "ORDER" => Order,
            "DESCENDING" | "DESC" => Descending,
            "LIMIT" => Limit,
            "DISTINCT" => Distinct,
            "AS" => As,
            "BETWEEN" => Between,
            "LIKE" => Like,
            "IN" => In,
            "NOT" => Not,
            "IS" => Is,
            "AND" => And,
            "OR" => Or,
            "VALUES" => Values,
            "FUNCTION" => Function,
            "IF" => If,
            "ELSE" => Else,
            "WHILE" => While,
            "FOR" => For,
            "BREAK" => Break,
            "CONTINUE" => Continue,
            "RETURN" => Return,
            "VAR" => Var,
            "CONST" => Const,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(s) => write!(f, "{s}"),
            TokenKind::String(s) => write!(f, "{s:?}"),
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::Keyword(k) => write!(f, "{k:?}"),
            TokenKind::Regex { pattern, .. } => write!(f, "/{pattern}/"),
            TokenKind::Punct(p) => write!(f, "{p}"),
            TokenKind::Eof => write!(f, "<eof>"),
        }
    }
}

/// Punctuation spellings, longest first so the scanner is greedy-correct.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "?:", "??", "...", "==", "!=", "<=", ">=", "=*", "!=*", "<<", "..", "@@", "@=",
    "@<", "@>", "@", "(", ")", "[", "]", "{", "}", ",", ":", ";", "?", "+", "-", "*", "/", "%",
    "=", "<", ">", "~", "&", "|", "^", ".", "$",
];

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    file_id: u32,
    /// `true` right after a token that could end an operand (name, literal,
    /// `)`/`]`), used to disambiguate `/` (division) from the start of a
    /// regex literal.
    prev_was_operand: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, file_id: u32) -> Self {
        Lexer { src, bytes: src.as_bytes(), pos: 0, file_id, prev_was_operand: false }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, JError> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            out.push(tok);
            if is_eof {
                return Ok(out);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
                self.pos += 1;
            }
            if self.peek() == Some(b'#') {
                while !matches!(self.peek(), None | Some(b'\n')) {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/') {
                while !matches!(self.peek(), None | Some(b'\n')) {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                self.pos += 2;
                while self.pos < self.bytes.len() && !self.src[self.pos..].starts_with("*/") {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.bytes.len());
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Result<Token, JError> {
        self.skip_trivia();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, span: Span::point(self.file_id, start as u32) });
        };

        let kind = if c == b'"' || c == b'\'' {
            self.prev_was_operand = true;
            TokenKind::String(self.scan_string(c)?)
        } else if c.is_ascii_digit() || (c == b'.' && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit())) {
            self.prev_was_operand = true;
            TokenKind::Number(self.scan_number())
        } else if c.is_ascii_alphabetic() || c == b'_' {
            self.prev_was_operand = true;
            self.scan_ident_or_keyword()
        } else if c == b'/' && !self.prev_was_operand {
            self.prev_was_operand = true;
            self.scan_regex()?
        } else {
            let kind = self.scan_punct()?;
            self.prev_was_operand = matches!(kind, TokenKind::Punct(")" | "]"));
            kind
        };

        let end = self.pos;
        Ok(Token { kind, span: Span::new(self.file_id, start as u32, end as u32) })
    }

    fn scan_number(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn scan_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        match Keyword::from_str(text) {
            Some(k) => TokenKind::Keyword(k),
            None => TokenKind::Ident(text.to_string()),
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<String, JError> {
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(JError::UnexpectedEof("string literal")),
                Some(b'\\') => self.pos += 2,
                Some(c) if c == quote => break,
                Some(_) => self.pos += 1,
            }
        }
        let raw = &self.src[start..self.pos];
        self.pos += 1;
        Ok(jvalue::mbstr::unescape(raw))
    }

    fn scan_regex(&mut self) -> Result<TokenKind, JError> {
        self.pos += 1; // opening /
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(JError::UnexpectedEof("regex literal")),
                Some(b'\\') => self.pos += 2,
                Some(b'/') => break,
                Some(_) => self.pos += 1,
            }
        }
        let pattern = self.src[start..self.pos].to_string();
        self.pos += 1; // closing /
        let mut global = false;
        let mut ignore_case = false;
        while matches!(self.peek(), Some(b'g' | b'i')) {
            if self.peek() == Some(b'g') {
                global = true;
            } else {
                ignore_case = true;
            }
            self.pos += 1;
        }
        Ok(TokenKind::Regex { pattern, global, ignore_case })
    }

    fn scan_punct(&mut self) -> Result<TokenKind, JError> {
        for p in PUNCTUATION {
            if self.src[self.pos..].starts_with(p) {
                self.pos += p.len();
                return Ok(TokenKind::Punct(p));
            }
        }
        Err(JError::UnexpectedChar { found: self.src[self.pos..].chars().next().unwrap(), at: self.pos })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, 0).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_arithmetic() {
        let k = kinds("5 + 3 * 2");
        assert_eq!(
            k,
            vec![
                TokenKind::Number("5".into()),
                TokenKind::Punct("+"),
                TokenKind::Number("3".into()),
                TokenKind::Punct("*"),
                TokenKind::Number("2".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_division_from_regex() {
        let k = kinds("a / b");
        assert_eq!(k[1], TokenKind::Punct("/"));
        let k = kinds("/abc/gi");
        assert!(matches!(k[0], TokenKind::Regex { global: true, ignore_case: true, .. }));
    }

    #[test]
    fn recognizes_keywords_case_insensitively() {
        let k = kinds("select a from t where x");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::Select));
        assert_eq!(k[2], TokenKind::Keyword(Keyword::From));
    }

    #[test]
    fn three_char_operators_win_over_prefixes() {
        let k = kinds("a === b");
        assert_eq!(k[1], TokenKind::Punct("==="));
    }
}
