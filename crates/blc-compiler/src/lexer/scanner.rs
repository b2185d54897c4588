use blc_common::DiagnosticBag;

use super::cursor::Cursor;
use super::token::{Token, TokenKind};

/// Hand-written lexer for the BL language.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    diagnostics: DiagnosticBag,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            diagnostics: DiagnosticBag::new(),
        }
    }

    /// Tokenize the entire source, returning all tokens and diagnostics.
    ///
    /// The token list always ends with a single `Eof` token.
    pub fn tokenize(mut self) -> (Vec<Token>, DiagnosticBag) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    /// Scan the next token.
    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.cursor.offset();
        let Some(ch) = self.cursor.advance() else {
            return Token::eof(self.cursor.span_from(start));
        };

        match ch {
            // === Delimiters ===
            '(' => self.make_token(TokenKind::LeftParen, start),
            ')' => self.make_token(TokenKind::RightParen, start),
            '{' => self.make_token(TokenKind::LeftBrace, start),
            '}' => self.make_token(TokenKind::RightBrace, start),
            '[' => self.make_token(TokenKind::LeftBracket, start),
            ']' => self.make_token(TokenKind::RightBracket, start),
            ',' => self.make_token(TokenKind::Comma, start),
            ';' => self.make_token(TokenKind::Semicolon, start),
            ':' => self.make_token(TokenKind::Colon, start),
            '.' => self.make_token(TokenKind::Dot, start),

            // === Operators ===
            '+' => self.make_token(TokenKind::Plus, start),
            '*' => self.make_token(TokenKind::Star, start),
            '/' => self.make_token(TokenKind::Slash, start),
            '%' => self.make_token(TokenKind::Percent, start),
            '-' => {
                if self.cursor.eat('>') {
                    self.make_token(TokenKind::Arrow, start)
                } else {
                    self.make_token(TokenKind::Minus, start)
                }
            }
            '=' => {
                if self.cursor.eat('=') {
                    self.make_token(TokenKind::EqualEqual, start)
                } else {
                    self.make_token(TokenKind::Equal, start)
                }
            }
            '!' => {
                if self.cursor.eat('=') {
                    self.make_token(TokenKind::BangEqual, start)
                } else {
                    self.make_token(TokenKind::Bang, start)
                }
            }
            '<' => {
                if self.cursor.eat('=') {
                    self.make_token(TokenKind::LessEqual, start)
                } else {
                    self.make_token(TokenKind::Less, start)
                }
            }
            '>' => {
                if self.cursor.eat('=') {
                    self.make_token(TokenKind::GreaterEqual, start)
                } else {
                    self.make_token(TokenKind::Greater, start)
                }
            }
            '&' => {
                if !self.cursor.eat('&') {
                    self.diagnostics.error(
                        "unexpected character '&'; did you mean '&&'?",
                        self.cursor.span_from(start),
                    );
                }
                self.make_token(TokenKind::AmpAmp, start)
            }
            '|' => {
                if !self.cursor.eat('|') {
                    self.diagnostics.error(
                        "unexpected character '|'; did you mean '||'?",
                        self.cursor.span_from(start),
                    );
                }
                self.make_token(TokenKind::PipePipe, start)
            }

            '"' => self.scan_string(start),
            c if c.is_ascii_digit() => self.scan_number(start),
            c if is_ident_start(c) => self.scan_identifier(start),

            _ => {
                let span = self.cursor.span_from(start);
                self.diagnostics
                    .error(format!("unexpected character '{}'", ch), span);
                Token::new(TokenKind::Error, ch.to_string(), span)
            }
        }
    }

    // ---------------------------------------------------------------
    // Whitespace & comments
    // ---------------------------------------------------------------

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.cursor.eat_while(|c| c.is_whitespace());

            if self.cursor.peek() == Some('/') {
                match self.cursor.peek_second() {
                    Some('/') => {
                        self.cursor.eat_while(|c| c != '\n');
                        continue;
                    }
                    Some('*') => {
                        let start = self.cursor.offset();
                        self.cursor.advance(); // /
                        self.cursor.advance(); // *
                        self.skip_block_comment(start);
                        continue;
                    }
                    _ => {}
                }
            }

            break;
        }
    }

    /// Skip a block comment; nesting is not supported.
    fn skip_block_comment(&mut self, start: u32) {
        loop {
            match self.cursor.advance() {
                Some('*') if self.cursor.eat('/') => return,
                Some(_) => {}
                None => {
                    let span = self.cursor.span_from(start);
                    self.diagnostics.error("unterminated block comment", span);
                    return;
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Literals
    // ---------------------------------------------------------------

    /// Scan a string literal after the opening `"` is consumed.
    /// The token lexeme holds the unescaped value.
    fn scan_string(&mut self, start: u32) -> Token {
        let mut value = String::new();

        loop {
            match self.cursor.advance() {
                Some('"') => {
                    return Token::new(TokenKind::StringLiteral, value, self.cursor.span_from(start));
                }
                Some('\\') => match self.cursor.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('0') => value.push('\0'),
                    Some(c) => {
                        let span = self.cursor.span_from(start);
                        self.diagnostics
                            .error(format!("unknown escape sequence '\\{}'", c), span);
                        value.push(c);
                    }
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => value.push(c),
            }
        }

        let span = self.cursor.span_from(start);
        self.diagnostics.error("unterminated string literal", span);
        Token::new(TokenKind::StringLiteral, value, span)
    }

    /// Scan an integer or float literal; the first digit is already consumed.
    fn scan_number(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');

        // A float needs a digit after the dot, so `a[1].x` stays an index + select.
        let is_float = self.cursor.peek() == Some('.')
            && self
                .cursor
                .peek_second()
                .is_some_and(|c| c.is_ascii_digit());

        let kind = if is_float {
            self.cursor.advance(); // consume '.'
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.make_token(kind, start)
    }

    fn scan_identifier(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let lexeme = self.cursor.slice_from(start);
        let kind = TokenKind::keyword_from_str(lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, self.cursor.span_from(start))
    }

    /// Create a token using the slice from `start` to the current offset.
    fn make_token(&self, kind: TokenKind, start: u32) -> Token {
        Token::new(kind, self.cursor.slice_from(start), self.cursor.span_from(start))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
