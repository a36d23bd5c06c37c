use crate::foundation::error::{ImagegenError, ImagegenResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),

    And,
    Break,
    Do,
    Else,
    Elseif,
    End,
    False,
    For,
    Function,
    If,
    In,
    Local,
    Nil,
    Not,
    Or,
    Return,
    Then,
    True,
    While,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    DotDot,
    Assign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Hash,

    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    Eof,
}

fn keyword(s: &str) -> Option<TokenKind> {
    Some(match s {
        "and" => TokenKind::And,
        "break" => TokenKind::Break,
        "do" => TokenKind::Do,
        "else" => TokenKind::Else,
        "elseif" => TokenKind::Elseif,
        "end" => TokenKind::End,
        "false" => TokenKind::False,
        "for" => TokenKind::For,
        "function" => TokenKind::Function,
        "if" => TokenKind::If,
        "in" => TokenKind::In,
        "local" => TokenKind::Local,
        "nil" => TokenKind::Nil,
        "not" => TokenKind::Not,
        "or" => TokenKind::Or,
        "return" => TokenKind::Return,
        "then" => TokenKind::Then,
        "true" => TokenKind::True,
        "while" => TokenKind::While,
        _ => return None,
    })
}

struct Lexer<'a> {
    chunk: &'a str,
    src: &'a str,
    bytes: &'a [u8],
    i: usize,
    line: usize,
}

pub(crate) fn lex(chunk: &str, src: &str) -> ImagegenResult<Vec<Token>> {
    let mut lx = Lexer {
        chunk,
        src,
        bytes: src.as_bytes(),
        i: 0,
        line: 1,
    };
    let mut out = Vec::new();
    loop {
        lx.skip_trivia()?;
        let line = lx.line;
        let Some(c) = lx.peek() else {
            out.push(Token {
                kind: TokenKind::Eof,
                line,
            });
            return Ok(out);
        };
        let kind = lx.next_token(c)?;
        out.push(Token { kind, line });
    }
}

impl Lexer<'_> {
    fn err(&self, msg: impl std::fmt::Display) -> ImagegenError {
        ImagegenError::script(format!("{}:{}: {msg}", self.chunk, self.line))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.i + off).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.i += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> ImagegenResult<()> {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.bump();
                continue;
            }
            if c == b'-' && self.peek_at(1) == Some(b'-') {
                self.i += 2;
                if let Some(level) = self.long_bracket_level() {
                    self.long_bracket(level, "comment")?;
                } else {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.i += 1;
                    }
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    /// At `[` followed by `=`* and `[`, return the number of `=`.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_at(1 + level) == Some(b'=') {
            level += 1;
        }
        (self.peek_at(1 + level) == Some(b'[')).then_some(level)
    }

    fn long_bracket(&mut self, level: usize, what: &str) -> ImagegenResult<String> {
        self.i += level + 2;
        // A newline right after the opening bracket is skipped.
        if self.peek() == Some(b'\n') {
            self.bump();
        }
        let start = self.i;
        loop {
            match self.peek() {
                None => return Err(self.err(format!("unfinished long {what}"))),
                Some(b']') => {
                    let closes = (0..level).all(|k| self.peek_at(1 + k) == Some(b'='))
                        && self.peek_at(1 + level) == Some(b']');
                    if closes {
                        let s = self.src[start..self.i].to_owned();
                        self.i += level + 2;
                        return Ok(s);
                    }
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn next_token(&mut self, c: u8) -> ImagegenResult<TokenKind> {
        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            return self.number();
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = self.i;
            while self
                .peek()
                .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == b'_')
            {
                self.i += 1;
            }
            let s = &self.src[start..self.i];
            return Ok(keyword(s).unwrap_or_else(|| TokenKind::Ident(s.to_owned())));
        }
        if c == b'"' || c == b'\'' {
            return self.quoted(c);
        }
        if let Some(level) = self.long_bracket_level() {
            return self.long_bracket(level, "string").map(TokenKind::Str);
        }

        let two = match (c, self.peek_at(1)) {
            (b'=', Some(b'=')) => Some(TokenKind::EqEq),
            (b'~', Some(b'=')) => Some(TokenKind::Ne),
            (b'<', Some(b'=')) => Some(TokenKind::Le),
            (b'>', Some(b'=')) => Some(TokenKind::Ge),
            (b'.', Some(b'.')) => Some(TokenKind::DotDot),
            _ => None,
        };
        if let Some(kind) = two {
            self.i += 2;
            return Ok(kind);
        }

        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b'.' => TokenKind::Dot,
            b'=' => TokenKind::Assign,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'^' => TokenKind::Caret,
            b'#' => TokenKind::Hash,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            _ => {
                let ch = self.src[self.i..].chars().next().unwrap_or('?');
                return Err(self.err(format!("unexpected character '{ch}'")));
            }
        };
        self.i += 1;
        Ok(kind)
    }

    fn number(&mut self) -> ImagegenResult<TokenKind> {
        let start = self.i;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.i += 2;
            let digits = self.i;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.i += 1;
            }
            if digits == self.i {
                return Err(self.err("malformed hex number"));
            }
            let v = u64::from_str_radix(&self.src[digits..self.i], 16)
                .map_err(|_| self.err("hex number out of range"))?;
            return Ok(TokenKind::Number(v as f64));
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.i += 1;
        }
        if self.peek() == Some(b'.') && self.peek_at(1) != Some(b'.') {
            self.i += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.i += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.i += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.i += 1;
            }
            let exp_start = self.i;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.i += 1;
            }
            if exp_start == self.i {
                return Err(self.err("invalid number exponent (expected digits)"));
            }
        }
        let s = &self.src[start..self.i];
        let v: f64 = s
            .parse()
            .map_err(|_| self.err(format!("malformed number '{s}'")))?;
        Ok(TokenKind::Number(v))
    }

    fn quoted(&mut self, quote: u8) -> ImagegenResult<TokenKind> {
        self.i += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.err("unfinished string"));
            };
            match c {
                b'\n' => return Err(self.err("unfinished string")),
                c if c == quote => {
                    self.i += 1;
                    return Ok(TokenKind::Str(out));
                }
                b'\\' => {
                    self.i += 1;
                    let esc = self.bump().ok_or_else(|| self.err("unfinished string"))?;
                    match esc {
                        b'n' => out.push('\n'),
                        b't' => out.push('\t'),
                        b'r' => out.push('\r'),
                        b'0' => out.push('\0'),
                        b'\\' => out.push('\\'),
                        b'"' => out.push('"'),
                        b'\'' => out.push('\''),
                        b'\n' => out.push('\n'),
                        other => {
                            return Err(
                                self.err(format!("invalid escape sequence '\\{}'", other as char))
                            );
                        }
                    }
                }
                _ => {
                    let ch = self.src[self.i..].chars().next().unwrap_or('?');
                    out.push(ch);
                    self.i += ch.len_utf8();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/lexer.rs"]
mod tests;
