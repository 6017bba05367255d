//! Text form of packed values.
//!
//! Lists are written as `[a,b]`, maps as `{'k':v}`, strings single-quoted with
//! the quote characters swapped (`'` inside a string is written `"`, and `"`
//! is written `^'`). Whole tokens with a fixed meaning are replaced by short
//! tags:
//!
//! | token | tag | token | tag |
//! |-------|-----|-------|-----|
//! | `null` | `N` | `''` | `S` |
//! | `true` | `T` | `'0'` | `S0` |
//! | `false` | `F` | `'1'` | `S1` |
//! | `[]` | `A` | `'false'` | `S2` |
//! | `{}` | `O` | `'true'` | `S3` |
//! | `['0']` | `A0` | `['1']` | `A1` |
//! | `['false']` | `A2` | `['true']` | `A3` |
//!
//! `^N` outside a string is a back-reference to the N-th memoized scalar.

use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::{Map, Number, Value};

use crate::error::CodecError;

const STRING_TAGS: [(&str, &str); 5] = [
    ("", "S"),
    ("0", "S0"),
    ("1", "S1"),
    ("false", "S2"),
    ("true", "S3"),
];

const LIST_TAGS: [(&str, &str); 4] = [("0", "A0"), ("1", "A1"), ("false", "A2"), ("true", "A3")];

/// Deepest list or map nesting the reader accepts.
const MAX_DEPTH: usize = 128;

// ---------------------------------------------------------------------------
// Packed tree
// ---------------------------------------------------------------------------

/// A value after zipping: positional lists, scalars and back-references.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Packed {
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    Ref(usize),
    List(Vec<Packed>),
    Map(Vec<(String, Packed)>),
}

impl Packed {
    /// Convert a plain value; lists and maps are carried whole.
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_value).collect()),
            Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to a plain value. Back-references are only valid in
    /// memoized slots, never inside a value stored whole.
    pub(crate) fn into_value(self) -> Result<Value, CodecError> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::Str(s) => Value::String(s),
            Self::Ref(index) => {
                return Err(CodecError::Malformed {
                    offset: 0,
                    message: format!("back-reference ^{index} inside a stored value"),
                });
            }
            Self::List(items) => Value::Array(
                items
                    .into_iter()
                    .map(Self::into_value)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k, v.into_value()?);
                }
                Value::Object(map)
            }
        })
    }

    /// Short description used in shape mismatch errors.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Ref(_) => "back-reference",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Render a packed tree as compact text.
pub(crate) fn write(packed: &Packed) -> String {
    let mut out = String::new();
    write_into(packed, &mut out);
    out
}

fn write_into(packed: &Packed, out: &mut String) {
    match packed {
        Packed::Null => out.push('N'),
        Packed::Bool(true) => out.push('T'),
        Packed::Bool(false) => out.push('F'),
        Packed::Number(n) => out.push_str(&n.to_string()),
        Packed::Str(s) => match string_tag(s) {
            Some(tag) => out.push_str(tag),
            None => write_quoted(s, out),
        },
        Packed::Ref(index) => {
            out.push('^');
            out.push_str(&index.to_string());
        }
        Packed::List(items) => {
            if let Some(tag) = list_tag(items) {
                out.push_str(tag);
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_into(item, out);
            }
            out.push(']');
        }
        Packed::Map(entries) => {
            if entries.is_empty() {
                out.push('O');
                return;
            }
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_quoted(key, out);
                out.push(':');
                write_into(value, out);
            }
            out.push('}');
        }
    }
}

fn string_tag(s: &str) -> Option<&'static str> {
    STRING_TAGS
        .iter()
        .find(|(value, _)| *value == s)
        .map(|(_, tag)| *tag)
}

fn list_tag(items: &[Packed]) -> Option<&'static str> {
    match items {
        [] => Some("A"),
        [Packed::Str(s)] => LIST_TAGS
            .iter()
            .find(|(value, _)| value == s)
            .map(|(_, tag)| *tag),
        _ => None,
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('\'');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.push('"'),
            '"' => out.push_str("^'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // A trailing caret would read as `^'`.
            '^' if chars.peek().is_none() => out.push_str("\\u005e"),
            c if u32::from(c) < 0x20 => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('\'');
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Parse compact text into a packed tree.
pub(crate) fn parse(text: &str) -> Result<Packed, CodecError> {
    let mut reader = Reader::new(text);
    let packed = reader.value()?;
    reader.skip_whitespace();
    match reader.chars.peek() {
        None => Ok(packed),
        Some(&(offset, c)) => Err(CodecError::Malformed {
            offset,
            message: format!("unexpected trailing '{c}'"),
        }),
    }
}

struct Reader<'a> {
    chars: Peekable<CharIndices<'a>>,
    len: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            len: input.len(),
            depth: 0,
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.len, |&(i, _)| i)
    }

    fn error(&mut self, message: impl Into<String>) -> CodecError {
        CodecError::Malformed {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|(_, c)| c.is_ascii_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), CodecError> {
        self.skip_whitespace();
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((offset, c)) => Err(CodecError::Malformed {
                offset,
                message: format!("expected '{expected}', found '{c}'"),
            }),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn value(&mut self) -> Result<Packed, CodecError> {
        self.skip_whitespace();
        let Some(&(_, ch)) = self.chars.peek() else {
            return Err(self.error("unexpected end of input"));
        };

        match ch {
            '[' | '{' => {
                if self.depth == MAX_DEPTH {
                    return Err(self.error(format!("nesting deeper than {MAX_DEPTH}")));
                }
                self.depth += 1;
                let packed = if ch == '[' { self.list() } else { self.map() };
                self.depth -= 1;
                packed
            }
            '\'' => Ok(Packed::Str(self.string()?)),
            '^' => self.reference(),
            c if c == '-' || c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() => self.tag(),
            c => Err(self.error(format!("unexpected '{c}'"))),
        }
    }

    fn list(&mut self) -> Result<Packed, CodecError> {
        self.chars.next(); // consume '['
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.chars.peek().is_some_and(|&(_, c)| c == ']') {
            self.chars.next();
            return Ok(Packed::List(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_whitespace();
            match self.chars.next() {
                Some((_, ',')) => {}
                Some((_, ']')) => return Ok(Packed::List(items)),
                Some((offset, c)) => {
                    return Err(CodecError::Malformed {
                        offset,
                        message: format!("expected ',' or ']', found '{c}'"),
                    });
                }
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    fn map(&mut self) -> Result<Packed, CodecError> {
        self.chars.next(); // consume '{'
        let mut entries = Vec::new();
        self.skip_whitespace();
        if self.chars.peek().is_some_and(|&(_, c)| c == '}') {
            self.chars.next();
            return Ok(Packed::Map(entries));
        }
        loop {
            self.skip_whitespace();
            if !self.chars.peek().is_some_and(|&(_, c)| c == '\'') {
                return Err(self.error("expected quoted map key"));
            }
            let key = self.string()?;
            self.expect(':')?;
            entries.push((key, self.value()?));
            self.skip_whitespace();
            match self.chars.next() {
                Some((_, ',')) => {}
                Some((_, '}')) => return Ok(Packed::Map(entries)),
                Some((offset, c)) => {
                    return Err(CodecError::Malformed {
                        offset,
                        message: format!("expected ',' or '}}', found '{c}'"),
                    });
                }
                None => return Err(self.error("unterminated map")),
            }
        }
    }

    fn string(&mut self) -> Result<String, CodecError> {
        self.chars.next(); // consume opening quote
        let mut s = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(self.error("unterminated string"));
            };
            match c {
                '\'' => return Ok(s),
                '"' => s.push('\''),
                '^' if self.chars.peek().is_some_and(|&(_, n)| n == '\'') => {
                    self.chars.next();
                    s.push('"');
                }
                '\\' => s.push(self.escape()?),
                c => s.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, CodecError> {
        match self.chars.next() {
            Some((_, 'n')) => Ok('\n'),
            Some((_, 'r')) => Ok('\r'),
            Some((_, 't')) => Ok('\t'),
            Some((_, 'b')) => Ok('\u{8}'),
            Some((_, 'f')) => Ok('\u{c}'),
            Some((_, c @ ('\\' | '/' | '\'' | '"'))) => Ok(c),
            Some((_, 'u')) => {
                let mut hex = String::with_capacity(4);
                for _ in 0..4 {
                    match self.chars.next() {
                        Some((_, h)) if h.is_ascii_hexdigit() => hex.push(h),
                        _ => return Err(self.error("invalid \\u escape")),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("invalid code point \\u{hex}")))
            }
            Some((offset, c)) => Err(CodecError::Malformed {
                offset,
                message: format!("unknown escape '\\{c}'"),
            }),
            None => Err(self.error("unterminated escape")),
        }
    }

    fn reference(&mut self) -> Result<Packed, CodecError> {
        self.chars.next(); // consume '^'
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits
            .parse::<usize>()
            .map(Packed::Ref)
            .map_err(|_| self.error(format!("invalid back-reference '^{digits}'")))
    }

    fn number(&mut self) -> Result<Packed, CodecError> {
        let start = self.offset();
        let raw =
            self.take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
        serde_json::from_str::<Number>(&raw)
            .map(Packed::Number)
            .map_err(|_| CodecError::Malformed {
                offset: start,
                message: format!("invalid number '{raw}'"),
            })
    }

    fn tag(&mut self) -> Result<Packed, CodecError> {
        let start = self.offset();
        let word = self.take_while(|c| c.is_ascii_alphanumeric());
        let packed = match word.as_str() {
            "N" => Packed::Null,
            "T" => Packed::Bool(true),
            "F" => Packed::Bool(false),
            "A" => Packed::List(Vec::new()),
            "O" => Packed::Map(Vec::new()),
            other => {
                if let Some((value, _)) = STRING_TAGS.iter().find(|(_, tag)| *tag == other) {
                    Packed::Str((*value).to_owned())
                } else if let Some((value, _)) = LIST_TAGS.iter().find(|(_, tag)| *tag == other) {
                    Packed::List(vec![Packed::Str((*value).to_owned())])
                } else {
                    return Err(CodecError::Malformed {
                        offset: start,
                        message: format!("unknown tag '{other}'"),
                    });
                }
            }
        };
        Ok(packed)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if pred(c) {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }
}
