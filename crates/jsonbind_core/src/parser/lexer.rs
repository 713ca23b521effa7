//! Raw JSON tokenizer.
//!
//! Turns the input text into a flat stream of [`Token`]s. The lexer owns the
//! RFC 8259 grammar details (string escapes, number forms, nesting limits);
//! level bookkeeping on top of the token stream belongs to
//! [`JsonbParser`](super::JsonbParser).

use crate::error::{JsonbError, Result};
use crate::parser::Event;

/// Hard ceiling on structure nesting, so hostile documents cannot blow the
/// level arena or the item stack.
pub(crate) const MAX_NESTING: usize = 512;

// -----------------------------------------------------------------------------
// Token

/// One lexed JSON event, with the decoded text for keys, strings and the raw
/// text for numbers.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub event: Event,
    pub text: Option<String>,
}

impl Token {
    fn bare(event: Event) -> Self {
        Self { event, text: None }
    }

    fn with_text(event: Event, text: String) -> Self {
        Self {
            event,
            text: Some(text),
        }
    }
}

// -----------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// A value: at the top level, after a key's colon, or after a comma in
    /// an array.
    Value,
    /// Right after `[`: a value or an immediate `]`.
    FirstValueOrEnd,
    /// Right after `{`: a key or an immediate `}`.
    KeyOrEnd,
    /// After a comma inside an object.
    Key,
    /// After a complete value inside a structure.
    AfterValue,
    /// The top-level value is complete; only whitespace may follow.
    Done,
}

pub(crate) struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    scopes: Vec<Scope>,
    expect: Expect,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            scopes: Vec::new(),
            expect: Expect::Value,
        }
    }

    /// Current byte offset, for syntax diagnostics.
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn err(&self, message: impl Into<String>) -> JsonbError {
        JsonbError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.input.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Produces the next token, or `None` once the top-level value is
    /// complete and only whitespace remains.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        if self.expect == Expect::Done {
            return if self.pos < self.input.len() {
                Err(self.err("unexpected characters after top-level value"))
            } else {
                Ok(None)
            };
        }

        let Some(b) = self.peek_byte() else {
            return Err(self.err("unexpected end of input"));
        };

        match self.expect {
            Expect::Value | Expect::FirstValueOrEnd => {
                if b == b']' && self.expect == Expect::FirstValueOrEnd {
                    return self.close(Scope::Array).map(Some);
                }
                self.value_token(b).map(Some)
            }
            Expect::KeyOrEnd | Expect::Key => {
                if b == b'}' && self.expect == Expect::KeyOrEnd {
                    return self.close(Scope::Object).map(Some);
                }
                if b != b'"' {
                    return Err(self.err("expected object key"));
                }
                let key = self.read_string()?;
                self.skip_whitespace();
                if self.peek_byte() != Some(b':') {
                    return Err(self.err("expected `:` after object key"));
                }
                self.pos += 1;
                self.expect = Expect::Value;
                Ok(Some(Token::with_text(Event::KeyName, key)))
            }
            Expect::AfterValue => match b {
                b',' => {
                    self.pos += 1;
                    self.expect = match self.scopes.last() {
                        Some(Scope::Object) => Expect::Key,
                        Some(Scope::Array) => Expect::Value,
                        None => return Err(self.err("unexpected `,` at top level")),
                    };
                    self.next_token()
                }
                b'}' => self.close(Scope::Object).map(Some),
                b']' => self.close(Scope::Array).map(Some),
                _ => Err(self.err("expected `,` or end of structure")),
            },
            Expect::Done => unreachable!("handled above"),
        }
    }

    fn value_token(&mut self, b: u8) -> Result<Token> {
        match b {
            b'{' => {
                self.open(Scope::Object)?;
                self.expect = Expect::KeyOrEnd;
                Ok(Token::bare(Event::StartObject))
            }
            b'[' => {
                self.open(Scope::Array)?;
                self.expect = Expect::FirstValueOrEnd;
                Ok(Token::bare(Event::StartArray))
            }
            b'"' => {
                let text = self.read_string()?;
                self.value_done();
                Ok(Token::with_text(Event::ValueString, text))
            }
            b'-' | b'0'..=b'9' => {
                let raw = self.read_number()?;
                self.value_done();
                Ok(Token::with_text(Event::ValueNumber, raw))
            }
            b't' => {
                self.read_literal("true")?;
                self.value_done();
                Ok(Token::bare(Event::ValueTrue))
            }
            b'f' => {
                self.read_literal("false")?;
                self.value_done();
                Ok(Token::bare(Event::ValueFalse))
            }
            b'n' => {
                self.read_literal("null")?;
                self.value_done();
                Ok(Token::bare(Event::ValueNull))
            }
            _ => Err(self.err("expected a JSON value")),
        }
    }

    fn open(&mut self, scope: Scope) -> Result<()> {
        if self.scopes.len() >= MAX_NESTING {
            return Err(self.err(format!("structure nesting exceeds {MAX_NESTING}")));
        }
        self.pos += 1;
        self.scopes.push(scope);
        Ok(())
    }

    fn close(&mut self, expected: Scope) -> Result<Token> {
        match self.scopes.pop() {
            Some(scope) if scope == expected => {
                self.pos += 1;
                self.value_done();
                Ok(Token::bare(match expected {
                    Scope::Object => Event::EndObject,
                    Scope::Array => Event::EndArray,
                }))
            }
            _ => Err(self.err("mismatched closing bracket")),
        }
    }

    fn value_done(&mut self) {
        self.expect = if self.scopes.is_empty() {
            Expect::Done
        } else {
            Expect::AfterValue
        };
    }

    fn read_literal(&mut self, literal: &str) -> Result<()> {
        let end = self.pos + literal.len();
        if self.input.get(self.pos..end) == Some(literal.as_bytes()) {
            self.pos = end;
            Ok(())
        } else {
            Err(self.err(format!("expected `{literal}`")))
        }
    }

    fn read_string(&mut self) -> Result<String> {
        // Opening quote is already checked by the caller.
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(&b) = self.input.get(self.pos) else {
                return Err(self.err("unterminated string"));
            };
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    self.pos += 1;
                    self.read_escape(&mut out)?;
                }
                0x00..=0x1f => {
                    return Err(self.err("unescaped control character in string"));
                }
                _ => {
                    // The input is a &str, so multi-byte sequences are valid
                    // UTF-8; copy whole code points at once.
                    let start = self.pos;
                    self.pos += 1;
                    while self
                        .input
                        .get(self.pos)
                        .is_some_and(|&b| b >= 0x80 && b & 0xc0 == 0x80)
                    {
                        self.pos += 1;
                    }
                    let chunk = core::str::from_utf8(&self.input[start..self.pos])
                        .map_err(|_| self.err("invalid UTF-8 in string"))?;
                    out.push_str(chunk);
                }
            }
        }
    }

    fn read_escape(&mut self, out: &mut String) -> Result<()> {
        let Some(&b) = self.input.get(self.pos) else {
            return Err(self.err("unterminated escape sequence"));
        };
        self.pos += 1;
        match b {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\u{0008}'),
            b'f' => out.push('\u{000c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => {
                let high = self.read_hex4()?;
                let c = if (0xd800..0xdc00).contains(&high) {
                    // Surrogate pair: a second \uXXXX must follow.
                    if self.input.get(self.pos..self.pos + 2) != Some(b"\\u") {
                        return Err(self.err("unpaired surrogate escape"));
                    }
                    self.pos += 2;
                    let low = self.read_hex4()?;
                    if !(0xdc00..0xe000).contains(&low) {
                        return Err(self.err("invalid low surrogate"));
                    }
                    let combined = 0x10000 + ((high - 0xd800) << 10) + (low - 0xdc00);
                    char::from_u32(combined).ok_or_else(|| self.err("invalid surrogate pair"))?
                } else if (0xdc00..0xe000).contains(&high) {
                    return Err(self.err("unpaired surrogate escape"));
                } else {
                    char::from_u32(high).ok_or_else(|| self.err("invalid unicode escape"))?
                };
                out.push(c);
            }
            _ => return Err(self.err("invalid escape character")),
        }
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let digits = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| self.err("truncated unicode escape"))?;
        let text = core::str::from_utf8(digits).map_err(|_| self.err("invalid unicode escape"))?;
        let value =
            u32::from_str_radix(text, 16).map_err(|_| self.err("invalid unicode escape"))?;
        self.pos = end;
        Ok(value)
    }

    /// Reads a number and returns its raw text; the conversion layer decides
    /// the target width without any intermediate float rounding.
    fn read_number(&mut self) -> Result<String> {
        let start = self.pos;
        if self.peek_byte() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek_byte() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.digits(),
            _ => return Err(self.err("invalid number")),
        }
        if self.peek_byte() == Some(b'.') {
            self.pos += 1;
            if !matches!(self.peek_byte(), Some(b'0'..=b'9')) {
                return Err(self.err("invalid number: expected fraction digits"));
            }
            self.digits();
        }
        if matches!(self.peek_byte(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek_byte(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !matches!(self.peek_byte(), Some(b'0'..=b'9')) {
                return Err(self.err("invalid number: expected exponent digits"));
            }
            self.digits();
        }
        let raw = core::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.err("invalid number"))?;
        Ok(raw.to_string())
    }

    fn digits(&mut self) {
        while matches!(self.peek_byte(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Vec<(Event, Option<String>)> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(token) = lexer.next_token().expect("lex failure") {
            out.push((token.event, token.text));
        }
        out
    }

    fn lex_err(input: &str) -> JsonbError {
        let mut lexer = Lexer::new(input);
        loop {
            match lexer.next_token() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected a syntax error for {input:?}"),
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn scalar_roots() {
        assert_eq!(
            events("42"),
            vec![(Event::ValueNumber, Some("42".to_string()))]
        );
        assert_eq!(events(" true "), vec![(Event::ValueTrue, None)]);
        assert_eq!(events("null"), vec![(Event::ValueNull, None)]);
    }

    #[test]
    fn object_with_nested_array() {
        let got = events(r#"{"items":[1,2],"name":"a"}"#);
        let kinds: Vec<Event> = got.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            kinds,
            vec![
                Event::StartObject,
                Event::KeyName,
                Event::StartArray,
                Event::ValueNumber,
                Event::ValueNumber,
                Event::EndArray,
                Event::KeyName,
                Event::ValueString,
                Event::EndObject,
            ]
        );
        assert_eq!(got[1].1.as_deref(), Some("items"));
        assert_eq!(got[6].1.as_deref(), Some("name"));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            events(r#""a\nbA\"""#),
            vec![(Event::ValueString, Some("a\nbA\"".to_string()))]
        );
    }

    #[test]
    fn surrogate_pair() {
        assert_eq!(
            events(r#""😀""#),
            vec![(Event::ValueString, Some("😀".to_string()))]
        );
    }

    #[test]
    fn escaped_surrogate_pair_decodes() {
        assert_eq!(
            events(r#""\uD83D\uDE00""#),
            vec![(Event::ValueString, Some("😀".to_string()))]
        );
        assert_eq!(
            events(r#""A\u00E9""#),
            vec![(Event::ValueString, Some("Aé".to_string()))]
        );
    }

    #[test]
    fn broken_surrogate_escapes_are_rejected() {
        // High surrogate with no following escape.
        assert!(matches!(lex_err(r#""\uD83D""#), JsonbError::Syntax { .. }));
        assert!(matches!(lex_err(r#""\uD83Dx""#), JsonbError::Syntax { .. }));
        assert!(matches!(
            lex_err(r#""\uD83DA""#),
            JsonbError::Syntax { .. }
        ));
        // High surrogate followed by a \u escape outside the low range.
        assert!(matches!(
            lex_err(r#""\uD83D\u0041""#),
            JsonbError::Syntax { .. }
        ));
        // Lone low surrogate.
        assert!(matches!(lex_err(r#""\uDE00""#), JsonbError::Syntax { .. }));
    }

    #[test]
    fn number_grammar() {
        assert_eq!(
            events("-0.5e+2"),
            vec![(Event::ValueNumber, Some("-0.5e+2".to_string()))]
        );
        assert!(matches!(lex_err("01"), JsonbError::Syntax { .. }));
        assert!(matches!(lex_err("1."), JsonbError::Syntax { .. }));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(matches!(lex_err("1 2"), JsonbError::Syntax { .. }));
        assert!(matches!(lex_err("{} extra"), JsonbError::Syntax { .. }));
    }

    #[test]
    fn mismatched_brackets() {
        assert!(matches!(lex_err("[1}"), JsonbError::Syntax { .. }));
        assert!(matches!(lex_err(r#"{"a":1]"#), JsonbError::Syntax { .. }));
    }

    #[test]
    fn nesting_limit() {
        let deep = "[".repeat(MAX_NESTING + 1);
        assert!(matches!(lex_err(&deep), JsonbError::Syntax { .. }));
    }
}
