//! Tokenizer for index files.
//!
//! Words are runs of letters, digits, `_`, `$` and `-` (so `inner-type` and
//! `-12` are single words). `.` and `/` are ordinary one-character symbols and
//! `//` starts a comment running to the end of the line.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Word(String),
    Str(String),
    Char(char),
    Symbol(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// 1-based line the token starts on.
    pub line: u32,
}

impl Token {
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(word) => Some(word),
            _ => None,
        }
    }

    pub fn is_symbol(&self, c: char) -> bool {
        self.kind == TokenKind::Symbol(c)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Source spelling, for tokens that have a single one.
    pub fn text(&self) -> Option<String> {
        match &self.kind {
            TokenKind::Word(word) => Some(word.clone()),
            TokenKind::Symbol(c) => Some(c.to_string()),
            _ => None,
        }
    }
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-')
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: text.chars().collect(),
        pos: 0,
        line: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let eof = token.is_eof();
        tokens.push(token);
        if eof {
            return Ok(tokens);
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia();
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        };

        let kind = if is_word_char(c) {
            let start = self.pos;
            while self.peek().is_some_and(is_word_char) {
                self.bump();
            }
            TokenKind::Word(self.chars[start..self.pos].iter().collect())
        } else if c == '"' {
            self.bump();
            TokenKind::Str(self.quoted('"')?)
        } else if c == '\'' {
            self.bump();
            let text = self.quoted('\'')?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => TokenKind::Char(c),
                _ => return Err(self.error("Expected a single character in character literal")),
            }
        } else {
            self.bump();
            TokenKind::Symbol(c)
        };
        Ok(Token { kind, line })
    }

    fn quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(format!("Unterminated literal; expected `{quote}'")))
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let Some(c) = self.bump() else {
            return Err(self.error("Unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            's' => out.push(' '),
            '\\' | '\'' | '"' => out.push(c),
            'u' => {
                let unit = self.hex_unit()?;
                if (0xD800..0xDC00).contains(&unit)
                    && self.peek() == Some('\\')
                    && self.peek_at(1) == Some('u')
                {
                    self.bump();
                    self.bump();
                    let low = self.hex_unit()?;
                    match char::decode_utf16([unit, low]).next() {
                        Some(Ok(c)) => out.push(c),
                        _ => return Err(self.error("Invalid surrogate pair in escape")),
                    }
                } else {
                    match char::from_u32(u32::from(unit)) {
                        Some(c) => out.push(c),
                        None => return Err(self.error("Invalid unicode escape")),
                    }
                }
            }
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                let max_digits = if c <= '3' { 2 } else { 1 };
                for _ in 0..max_digits {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            self.bump();
                        }
                        None => break,
                    }
                }
                // Octal escapes never exceed \377.
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            other => return Err(self.error(format!("Invalid escape sequence `\\{other}'"))),
        }
        Ok(())
    }

    fn hex_unit(&mut self) -> Result<u16, ParseError> {
        // Java allows any number of `u`s after the backslash.
        while self.peek() == Some('u') {
            self.bump();
        }
        let mut value = 0u16;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("Expected four hex digits in unicode escape"))?;
            value = value * 16 + digit as u16;
        }
        Ok(value)
    }
}
