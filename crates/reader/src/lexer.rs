//! The lexer
//!
//! Byte-oriented, with one token of output per call. Tracks the line
//! (1-based) and column (0-based) of every token start. `;` starts a
//! comment that runs to end of line. Strings keep their surrounding
//! quotes and internal escapes; the reader strips them.

/// The token kinds the reader consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    LParen,
    RParen,
    Dot,
    Quote,
    IntegerLiteral,
    StringLiteral,
    Symbol,
    Error,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    start: usize,
    end: usize,
    line: u32,
    column: u32,
    start_line: u32,
    start_column: u32,
    error: Option<&'static str>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Lexer {
            input,
            start: 0,
            end: 0,
            line: 1,
            column: 0,
            start_line: 1,
            start_column: 0,
            error: None,
        }
    }

    /// The bytes of the most recent token.
    pub fn lexeme(&self) -> &'a [u8] {
        &self.input[self.start..self.end]
    }

    /// `(line, column)` where the most recent token started.
    pub fn location(&self) -> (u32, u32) {
        (self.start_line, self.start_column)
    }

    /// The message for the most recent `Error` token.
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.end).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.end += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> TokenKind {
        loop {
            self.start = self.end;
            self.start_line = self.line;
            self.start_column = self.column;
            let c = match self.advance() {
                Some(c) => c,
                None => return TokenKind::Eof,
            };
            match c {
                b';' => {
                    while let Some(c) = self.advance() {
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                b'(' => return TokenKind::LParen,
                b')' => return TokenKind::RParen,
                b'.' => return TokenKind::Dot,
                b'\'' => return TokenKind::Quote,
                b'"' => {
                    loop {
                        match self.peek() {
                            Some(b'"') => break,
                            Some(b'\\') => {
                                self.advance();
                                if self.advance().is_none() {
                                    self.error = Some("unterminated string");
                                    return TokenKind::Error;
                                }
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                self.error = Some("unterminated string");
                                return TokenKind::Error;
                            }
                        }
                    }
                    self.advance(); // closing quote
                    return TokenKind::StringLiteral;
                }
                c if c.is_ascii_whitespace() => {}
                c if c.is_ascii_digit() => {
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.advance();
                    }
                    return TokenKind::IntegerLiteral;
                }
                _ => {
                    while self.peek().is_some_and(is_symbol_byte) {
                        self.advance();
                    }
                    return TokenKind::Symbol;
                }
            }
        }
    }
}

/// Symbol constituents: printable, non-whitespace bytes that are not
/// delimiters. Bytes outside ASCII ride along so UTF-8 names work.
fn is_symbol_byte(c: u8) -> bool {
    match c {
        b'(' | b')' | b'.' | b'\'' | b'"' => false,
        c if c.is_ascii_whitespace() => false,
        c if c.is_ascii_control() => false,
        _ => true,
    }
}
