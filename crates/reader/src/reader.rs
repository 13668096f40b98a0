//! The reader proper
//!
//! One token of lookahead over the lexer. Datums build through the
//! runtime's constructors: lists cons up right-to-left, `'x` sugars to
//! `(quote x)`, string literals lose their outer quotes and one level of
//! backslash, symbols intern. Every datum start is reported to the
//! runtime as the current source location so errors point at the right
//! token.

use karst_runtime::{NIL, Runtime, Value};

use crate::lexer::{Lexer, TokenKind};

pub struct Reader<'a> {
    lexer: Lexer<'a>,
    next: TokenKind,
    next_lexeme: &'a [u8],
    next_location: (u32, u32),
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        let mut lexer = Lexer::new(source);
        let next = lexer.next_token();
        let next_lexeme = lexer.lexeme();
        let next_location = lexer.location();
        Reader { lexer, next, next_lexeme, next_location }
    }

    /// Read one top-level datum. `None` at clean end of input; parse
    /// errors land in the runtime's error slot.
    pub fn read(&mut self, rt: &mut Runtime) -> Option<Value> {
        if self.next == TokenKind::Eof {
            rt.clear_source_location();
            return None;
        }
        Some(self.parse_expr(rt))
    }

    fn advance(&mut self) -> (TokenKind, &'a [u8], (u32, u32)) {
        let cur = (self.next, self.next_lexeme, self.next_location);
        self.next = self.lexer.next_token();
        self.next_lexeme = self.lexer.lexeme();
        self.next_location = self.lexer.location();
        cur
    }

    fn peek(&self) -> TokenKind {
        self.next
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.next == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self, rt: &mut Runtime) -> Value {
        let (token, lexeme, location) = self.advance();
        rt.set_source_location(location.0, location.1);
        match token {
            TokenKind::Error => {
                rt.fail(self.lexer.error().unwrap_or("lexical error"));
                NIL
            }
            TokenKind::Eof => {
                rt.fail("end-of-file while parsing");
                NIL
            }
            TokenKind::LParen => self.parse_list(rt),
            TokenKind::Quote => {
                let quote = rt.intern(b"quote");
                let datum = self.parse_expr(rt);
                if rt.has_error() {
                    return NIL;
                }
                rt.list(&[quote, datum])
            }
            TokenKind::IntegerLiteral => {
                let text = String::from_utf8_lossy(lexeme);
                match text.parse::<i64>().ok().and_then(Value::try_integer) {
                    Some(v) => v,
                    None => {
                        rt.fail("integer literal out of range");
                        NIL
                    }
                }
            }
            TokenKind::StringLiteral => {
                let contents = unescape(lexeme);
                rt.bytes_new(&contents)
            }
            TokenKind::Symbol => rt.intern(lexeme),
            TokenKind::RParen | TokenKind::Dot => {
                rt.fail("unexpected token");
                NIL
            }
        }
    }

    fn parse_list(&mut self, rt: &mut Runtime) -> Value {
        let mut elems = Vec::new();
        let mut tail = NIL;
        loop {
            if self.matches(TokenKind::RParen) {
                break;
            }
            if self.peek() == TokenKind::Eof {
                rt.fail("end-of-file while parsing");
                return NIL;
            }
            if self.matches(TokenKind::Dot) {
                tail = self.parse_expr(rt);
                if rt.has_error() {
                    return NIL;
                }
                if !self.matches(TokenKind::RParen) {
                    rt.fail("expected close paren after dotted tail");
                    return NIL;
                }
                break;
            }
            elems.push(self.parse_expr(rt));
            if rt.has_error() {
                return NIL;
            }
        }
        let mut ret = tail;
        for &e in elems.iter().rev() {
            ret = rt.cons(e, ret);
        }
        ret
    }
}

/// Strip the outer quotes and one level of backslash from a string
/// literal's lexeme.
fn unescape(lexeme: &[u8]) -> Vec<u8> {
    let inner = &lexeme[1..lexeme.len().saturating_sub(1).max(1)];
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == b'\\' && i + 1 < inner.len() {
            out.push(inner[i + 1]);
            i += 2;
        } else {
            out.push(inner[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(rt: &mut Runtime, src: &str) -> Value {
        let mut reader = Reader::new(src.as_bytes());
        let v = reader.read(rt).expect("expected a datum");
        assert!(!rt.has_error(), "unexpected error: {:?}", rt.take_error());
        v
    }

    #[test]
    fn test_read_atoms() {
        let mut rt = Runtime::new();
        assert_eq!(read_one(&mut rt, "42"), Value::integer(42));
        let sym = read_one(&mut rt, "foo");
        assert_eq!(sym, rt.intern(b"foo"));
        let s = read_one(&mut rt, "\"hi\"");
        assert!(rt.bytes_match(s, b"hi"));
    }

    #[test]
    fn test_read_list() {
        let mut rt = Runtime::new();
        let v = read_one(&mut rt, "(a b c)");
        assert_eq!(rt.dump(v, true), "(a b c)");
        assert_eq!(rt.list_len(v), 3);
    }

    #[test]
    fn test_read_nested_list() {
        let mut rt = Runtime::new();
        let v = read_one(&mut rt, "(a (b (c)) d)");
        assert_eq!(rt.dump(v, true), "(a (b (c)) d)");
    }

    #[test]
    fn test_read_dotted_pair() {
        let mut rt = Runtime::new();
        let v = read_one(&mut rt, "(1 . 2)");
        assert_eq!(rt.car(v), Value::integer(1));
        assert_eq!(rt.cdr(v), Value::integer(2));
        let improper = read_one(&mut rt, "(1 2 . 3)");
        assert_eq!(rt.dump(improper, true), "(1 2 . 3)");
    }

    #[test]
    fn test_read_quote_sugar() {
        let mut rt = Runtime::new();
        let v = read_one(&mut rt, "'x");
        let quote = rt.intern(b"quote");
        assert_eq!(rt.car(v), quote);
        let x = rt.intern(b"x");
        let inner = rt.cdr(v);
        assert_eq!(rt.car(inner), x);
    }

    #[test]
    fn test_read_string_escapes() {
        let mut rt = Runtime::new();
        let v = read_one(&mut rt, r#""a\"b\\c""#);
        assert!(rt.bytes_match(v, b"a\"b\\c"));
    }

    #[test]
    fn test_read_empty_list_is_nil() {
        let mut rt = Runtime::new();
        assert_eq!(read_one(&mut rt, "()"), NIL);
    }

    #[test]
    fn test_read_multiple_toplevel_forms() {
        let mut rt = Runtime::new();
        let mut reader = Reader::new(b"1 2 3");
        let mut out = Vec::new();
        while let Some(v) = reader.read(&mut rt) {
            out.push(v);
        }
        assert_eq!(out, vec![Value::integer(1), Value::integer(2), Value::integer(3)]);
    }

    #[test]
    fn test_unclosed_list_errors() {
        let mut rt = Runtime::new();
        let mut reader = Reader::new(b"(1 2");
        reader.read(&mut rt);
        assert!(rt.has_error());
        assert!(rt.take_error().unwrap().message.contains("end-of-file"));
    }

    #[test]
    fn test_stray_rparen_errors() {
        let mut rt = Runtime::new();
        let mut reader = Reader::new(b")");
        reader.read(&mut rt);
        assert!(rt.take_error().unwrap().message.contains("unexpected token"));
    }

    #[test]
    fn test_unterminated_string_reports_location() {
        let mut rt = Runtime::new();
        let mut reader = Reader::new(b"\n  \"oops");
        reader.read(&mut rt);
        let report = rt.take_error().unwrap();
        assert!(report.message.contains("unterminated string"));
        assert_eq!(report.location, Some((2, 2)));
    }

    #[test]
    fn test_integer_literal_overflow_errors() {
        let mut rt = Runtime::new();
        let mut reader = Reader::new(b"99999999999999999999999");
        reader.read(&mut rt);
        assert!(rt.take_error().unwrap().message.contains("out of range"));
    }
}
