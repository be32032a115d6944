//! Parser for the textual type language.
//!
//! ```text
//! type     := union
//! union    := inter ('|' inter)*
//! inter    := unary ('&' unary)*
//! unary    := '?' unary | postfix
//! postfix  := primary ('[' INT? ']')*
//! primary  := literal | primitive | GENERIC ('extends' unary)? | IDENT '{' type? '}'
//!           | '[' types? ']' | '{' fields? '}' | '{' '[' type ']' ':' type '}' | '(' type ')'
//! ```
//!
//! Generic names start with an uppercase letter. Literals use JSON syntax.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::fragment::{Field, Fragment, Literal, Primitive};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?").expect("number pattern compiles")
});

const EXTENDS: &str = "extends";

/// Deepest nesting of unary terms the parser descends into.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty type expression")]
    Empty,
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid string literal at offset {offset}: {reason}")]
    InvalidString { offset: usize, reason: String },
    #[error("expected {expected}, found {found} at offset {offset}")]
    UnexpectedToken { expected: &'static str, found: String, offset: usize },
    #[error("number `{text}` at offset {offset} is out of range")]
    InvalidNumber { text: String, offset: usize },
    #[error("type nested too deeply at offset {offset}")]
    TooDeep { offset: usize },
    #[error("invalid size `{text}` at offset {offset}")]
    InvalidSize { text: String, offset: usize },
    #[error("unknown type name `{name}` at offset {offset}")]
    UnknownName { name: String, offset: usize },
    #[error("duplicate field `{name}` at offset {offset}")]
    DuplicateField { name: String, offset: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a type expression. Never returns a partial result.
pub fn parse(text: &str) -> ParseResult<Fragment> {
    let result = lex(text).and_then(|tokens| {
        let mut parser = Parser { tokens, pos: 0, depth: 0 };
        if parser.at(&Token::Eof) {
            return Err(ParseError::Empty);
        }
        let fragment = parser.parse_type()?;
        parser.expect(&Token::Eof, "end of input")?;
        Ok(fragment)
    });
    if let Err(error) = &result {
        debug!(input = text, %error, "type parse failed");
    }
    result
}

impl FromStr for Fragment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LEXER
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number { value: f64, text: String },
    Str(String),
    Question,
    Pipe,
    Amp,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Eof,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn lex(src: &str) -> ParseResult<Vec<Spanned>> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        let punct = match ch {
            '?' => Some(Token::Question),
            '|' => Some(Token::Pipe),
            '&' => Some(Token::Amp),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = punct {
            chars.next();
            out.push(Spanned { token, offset });
            continue;
        }

        if ch.is_whitespace() {
            chars.next();
        } else if ch == '"' {
            let end = scan_string(src, offset)?;
            let raw = &src[offset..end];
            let value = serde_json::from_str::<String>(raw)
                .map_err(|e| ParseError::InvalidString { offset, reason: e.to_string() })?;
            out.push(Spanned { token: Token::Str(value), offset });
            while chars.peek().is_some_and(|&(i, _)| i < end) {
                chars.next();
            }
        } else if ch == '-' || ch.is_ascii_digit() {
            let Some(m) = NUMBER.find(&src[offset..]) else {
                return Err(ParseError::UnexpectedChar { ch, offset });
            };
            let text = m.as_str().to_string();
            let value = text.parse::<f64>().map_err(|_| ParseError::UnexpectedChar { ch, offset })?;
            if !value.is_finite() {
                return Err(ParseError::InvalidNumber { text, offset });
            }
            let end = offset + m.end();
            out.push(Spanned { token: Token::Number { value, text }, offset });
            while chars.peek().is_some_and(|&(i, _)| i < end) {
                chars.next();
            }
        } else if ch.is_alphabetic() || ch == '_' {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !(c.is_alphanumeric() || c == '_') {
                    break;
                }
                ident.push(c);
                chars.next();
            }
            out.push(Spanned { token: Token::Ident(ident), offset });
        } else {
            return Err(ParseError::UnexpectedChar { ch, offset });
        }
    }

    out.push(Spanned { token: Token::Eof, offset: src.len() });
    Ok(out)
}

/// Byte offset one past the closing quote of the string starting at `start`.
fn scan_string(src: &str, start: usize) -> ParseResult<usize> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(ParseError::UnterminatedString { offset: start })
}

// ————————————————————————————————————————————————————————————————————————————
// PARSER
// ————————————————————————————————————————————————————————————————————————————

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// unary terms currently being parsed
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].token
    }

    fn offset(&self) -> usize {
        let last = self.tokens.len() - 1;
        self.tokens[self.pos.min(last)].offset
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> ParseResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken { expected, found: self.peek().to_string(), offset: self.offset() }
    }

    fn parse_type(&mut self) -> ParseResult<Fragment> {
        let mut left = self.parse_intersection()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_intersection()?;
            left = Fragment::union(left, right);
        }
        Ok(left)
    }

    fn parse_intersection(&mut self) -> ParseResult<Fragment> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::Amp) {
            let right = self.parse_unary()?;
            left = Fragment::intersection(left, right);
        }
        Ok(left)
    }

    /// Every nested term (group, element, field, bound, `?`) passes through here.
    fn parse_unary(&mut self) -> ParseResult<Fragment> {
        if self.depth == MAX_DEPTH {
            return Err(ParseError::TooDeep { offset: self.offset() });
        }
        self.depth += 1;
        let result = if self.eat(&Token::Question) {
            self.parse_unary().map(Fragment::nullable)
        } else {
            self.parse_postfix()
        };
        self.depth -= 1;
        result
    }

    /// `T[n]` and `T[]`, left to right: `int[2][]` is a list of pairs.
    fn parse_postfix(&mut self) -> ParseResult<Fragment> {
        let mut base = self.parse_primary()?;
        while self.eat(&Token::LBracket) {
            if self.eat(&Token::RBracket) {
                base = Fragment::list(base);
                continue;
            }
            let offset = self.offset();
            let size = match self.bump() {
                Token::Number { text, .. } => text
                    .parse::<usize>()
                    .map_err(|_| ParseError::InvalidSize { text, offset })?,
                found => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "array size or `]`",
                        found: found.to_string(),
                        offset,
                    });
                }
            };
            self.expect(&Token::RBracket, "`]`")?;
            base = Fragment::array(base, size);
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> ParseResult<Fragment> {
        let offset = self.offset();
        match self.peek().clone() {
            Token::Ident(word) => self.parse_word(word, offset),
            Token::Number { value, .. } => {
                self.bump();
                Ok(Fragment::Literal(Literal::from(value)))
            }
            Token::Str(s) => {
                self.bump();
                Ok(Fragment::Literal(Literal::String(s)))
            }
            Token::LBracket => self.parse_tuple(),
            Token::LBrace => self.parse_braced(),
            Token::LParen => {
                self.bump();
                let inner = self.parse_type()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn parse_word(&mut self, word: String, offset: usize) -> ParseResult<Fragment> {
        let reserved = match word.as_str() {
            "null" => Some(Fragment::null()),
            "true" => Some(Fragment::literal(true)),
            "false" => Some(Fragment::literal(false)),
            other => Primitive::from_keyword(other).map(Fragment::Primitive),
        };
        if let Some(fragment) = reserved {
            self.bump();
            return Ok(fragment);
        }
        if word == EXTENDS {
            return Err(self.unexpected("type"));
        }

        if self.peek_nth(1) == &Token::LBrace {
            self.bump();
            self.bump();
            let inner = if self.at(&Token::RBrace) { None } else { Some(self.parse_type()?) };
            self.expect(&Token::RBrace, "`}`")?;
            return Ok(Fragment::named(word, inner));
        }

        if word.starts_with(|c: char| c.is_uppercase()) {
            self.bump();
            let extends = if self.at(&Token::Ident(EXTENDS.to_string())) {
                self.bump();
                Some(self.parse_unary()?)
            } else {
                None
            };
            return Ok(Fragment::generic(word, extends));
        }

        Err(ParseError::UnknownName { name: word, offset })
    }

    fn parse_tuple(&mut self) -> ParseResult<Fragment> {
        self.bump();
        let mut elements = Vec::new();
        while !self.at(&Token::RBracket) {
            elements.push(self.parse_type()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBracket, "`,` or `]`")?;
        Ok(Fragment::tuple(elements))
    }

    /// `{}`, `{ key: T, .. }` or `{ [K]: V }`.
    fn parse_braced(&mut self) -> ParseResult<Fragment> {
        self.bump();
        if self.eat(&Token::RBrace) {
            return Ok(Fragment::Struct(None));
        }

        if self.eat(&Token::LBracket) {
            let key = self.parse_type()?;
            self.expect(&Token::RBracket, "`]`")?;
            self.expect(&Token::Colon, "`:`")?;
            let value = self.parse_type()?;
            self.expect(&Token::RBrace, "`}`")?;
            return Ok(Fragment::map(key, value));
        }

        let mut fields = IndexMap::new();
        while !self.at(&Token::RBrace) {
            let offset = self.offset();
            let name = match self.bump() {
                Token::Ident(name) | Token::Str(name) => name,
                found => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "field name",
                        found: found.to_string(),
                        offset,
                    });
                }
            };
            let optional = self.eat(&Token::Question);
            self.expect(&Token::Colon, "`:`")?;
            let ty = self.parse_type()?;
            if fields.insert(name.clone(), Field { ty, optional }).is_some() {
                return Err(ParseError::DuplicateField { name, offset });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace, "`,` or `}`")?;
        Ok(Fragment::Struct(Some(fields)))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "`{s}`"),
            Token::Number { text, .. } => write!(f, "`{text}`"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Question => f.write_str("`?`"),
            Token::Pipe => f.write_str("`|`"),
            Token::Amp => f.write_str("`&`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::LBracket => f.write_str("`[`"),
            Token::RBracket => f.write_str("`]`"),
            Token::LBrace => f.write_str("`{`"),
            Token::RBrace => f.write_str("`}`"),
            Token::Comma => f.write_str("`,`"),
            Token::Colon => f.write_str("`:`"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
