use std::fmt;

use thiserror::Error;

/// Byte offset plus 1-based line/column, attached to every token and AST node
/// for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    None,
    Bool(bool),
    Int(i64),
    Str(Vec<u8>),
    Ident(String),

    // Keywords
    Var,
    Fn,
    Static,
    Class,
    External,
    Import,
    Print,
    Assert,
    Return,
    Break,
    Continue,
    If,
    Elif,
    Else,
    For,
    In,
    SelfKw,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Semicolon,
    Newline,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    XorXor,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}: unexpected character '{1}'")]
    UnexpectedChar(Span, char),
    #[error("{0}: unterminated string literal")]
    UnterminatedString(Span),
    #[error("{0}: invalid integer literal '{1}'")]
    InvalidInt(Span, String),
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    // Newlines inside (), [], {} are insignificant, mirroring how the
    // grammar lets vector/map literals and call argument lists span lines.
    depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            depth: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned<Token>>, Error> {
        let mut tokens = Vec::new();

        loop {
            let tok = self.next_token()?;
            let done = tok.value == Token::Eof;

            match &tok.value {
                Token::LParen | Token::LBracket | Token::LBrace => self.depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => self.depth = self.depth.saturating_sub(1),
                Token::Newline if self.depth > 0 => continue,
                _ => {}
            }

            tokens.push(tok);

            if done {
                break;
            }
        }

        Ok(tokens)
    }

    fn span(&self) -> Span {
        Span {
            offset: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;

        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }

        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned<Token>, Error> {
        self.skip_whitespace_and_comments();
        let span = self.span();

        let Some(c) = self.peek() else {
            return Ok(Spanned {
                value: Token::Eof,
                span,
            });
        };

        let tok = match c {
            b'\n' => {
                self.advance();
                Token::Newline
            }
            b'(' => {
                self.advance();
                Token::LParen
            }
            b')' => {
                self.advance();
                Token::RParen
            }
            b'{' => {
                self.advance();
                Token::LBrace
            }
            b'}' => {
                self.advance();
                Token::RBrace
            }
            b'[' => {
                self.advance();
                Token::LBracket
            }
            b']' => {
                self.advance();
                Token::RBracket
            }
            b',' => {
                self.advance();
                Token::Comma
            }
            b':' => {
                self.advance();
                Token::Colon
            }
            b'.' => {
                self.advance();
                Token::Dot
            }
            b';' => {
                self.advance();
                Token::Semicolon
            }
            b'+' => {
                self.advance();
                Token::Plus
            }
            b'-' => {
                self.advance();
                Token::Minus
            }
            b'*' => {
                self.advance();
                if self.peek() == Some(b'*') {
                    self.advance();
                    Token::StarStar
                } else {
                    Token::Star
                }
            }
            b'/' => {
                self.advance();
                Token::Slash
            }
            b'%' => {
                self.advance();
                Token::Percent
            }
            b'=' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            b'!' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            b'<' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            b'&' if self.peek_at(1) == Some(b'&') => {
                self.advance();
                self.advance();
                Token::AndAnd
            }
            b'|' if self.peek_at(1) == Some(b'|') => {
                self.advance();
                self.advance();
                Token::OrOr
            }
            b'^' if self.peek_at(1) == Some(b'^') => {
                self.advance();
                self.advance();
                Token::XorXor
            }
            b'"' => return self.lex_string(span),
            b'0'..=b'9' => return self.lex_number(span),
            c if c == b'_' || c.is_ascii_alphabetic() => return self.lex_ident(span),
            c => return Err(Error::UnexpectedChar(span, c as char)),
        };

        Ok(Spanned { value: tok, span })
    }

    fn lex_string(&mut self, span: Span) -> Result<Spanned<Token>, Error> {
        self.advance(); // opening quote
        let mut bytes = Vec::new();

        loop {
            match self.advance() {
                None => return Err(Error::UnterminatedString(span)),
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(b'"') => bytes.push(b'"'),
                    Some(b'\\') => bytes.push(b'\\'),
                    Some(c) => bytes.push(c),
                    None => return Err(Error::UnterminatedString(span)),
                },
                Some(c) => bytes.push(c),
            }
        }

        Ok(Spanned {
            value: Token::Str(bytes),
            span,
        })
    }

    fn lex_number(&mut self, span: Span) -> Result<Spanned<Token>, Error> {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        let n = text
            .parse::<i64>()
            .map_err(|_| Error::InvalidInt(span, text.to_string()))?;

        Ok(Spanned {
            value: Token::Int(n),
            span,
        })
    }

    fn lex_ident(&mut self, span: Span) -> Result<Spanned<Token>, Error> {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("").to_string();

        let tok = match text.as_str() {
            "none" => Token::None,
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "var" => Token::Var,
            "fn" => Token::Fn,
            "static" => Token::Static,
            "class" => Token::Class,
            "external" => Token::External,
            "import" => Token::Import,
            "print" => Token::Print,
            "assert" => Token::Assert,
            "return" => Token::Return,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "for" => Token::For,
            "in" => Token::In,
            "self" => Token::SelfKw,
            _ => Token::Ident(text),
        };

        Ok(Spanned { value: tok, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_simple_decl() {
        let tokens = Lexer::new("var x = 1 + 2\n").tokenize().unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.value).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Var,
                Token::Ident("x".into()),
                Token::Assign,
                Token::Int(1),
                Token::Plus,
                Token::Int(2),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lex_string_escapes() {
        let tokens = Lexer::new(r#""a\nb""#).tokenize().unwrap();
        assert_eq!(tokens[0].value, Token::Str(b"a\nb".to_vec()));
    }

    #[test]
    fn lex_comment_is_skipped() {
        let tokens = Lexer::new("# comment\nvar x\n").tokenize().unwrap();
        assert_eq!(tokens[0].value, Token::Newline);
        assert_eq!(tokens[1].value, Token::Var);
    }
}
