use crate::error::ParseError;

/// #Notes
/// Field names, numbers, guids and bare words all lex as [TokenType::Word];
///  the parser decides from position whether a word is a field or a literal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenType {
    ParenLeft,
    ParenRight,
    Comma,
    Equals,    // =
    NotEquals, // <> or !=
    LT,        // <
    GT,        // >
    LTE,       // <=
    GTE,       // >=
    Word,
    String, // 'quoted', with '' as an escaped quote
    And,
    Or,
    Not,
    Like,
    Is,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub ty: TokenType,

    // Byte indexes into the source
    pub start: usize,
    pub end: usize,
}

const KEYWORDS: [(&[u8], TokenType); 6] = [
    (b"and", TokenType::And),
    (b"or", TokenType::Or),
    (b"not", TokenType::Not),
    (b"like", TokenType::Like),
    (b"is", TokenType::Is),
    (b"in", TokenType::In),
];

#[inline]
fn is_word_byte(b: u8) -> bool {
    !matches!(
        b,
        b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b',' | b'\'' | b'"' | b'=' | b'<' | b'>' | b'!'
    )
}

/// This type simply holds a reference to the source and an index, so it's
///  cheap to copy, which makes lookahead in the parser trivial.
#[derive(Clone)]
pub struct Lexer<'input> {
    source: &'input str,
    current: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(source: &'input str) -> Self {
        Self { source, current: 0 }
    }

    #[inline]
    fn bytes(&self) -> &'input [u8] {
        self.source.as_bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current >= self.source.len()
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.bytes().get(self.current).copied()
    }

    /// If current starts with [prefix], consume it and return true.
    fn consume1(&mut self, prefix: u8) -> bool {
        if let Some(c) = self.peek()
            && c == prefix
        {
            self.current += 1;
            true
        } else {
            false
        }
    }

    #[inline]
    fn consume_while(&mut self, predicate: impl Fn(u8) -> bool) {
        while let Some(c) = self.peek()
            && predicate(c)
        {
            self.current += 1;
        }
    }

    #[inline]
    fn consume_whitespace(&mut self) {
        self.consume_while(|b| b.is_ascii_whitespace());
    }

    /// Returns the slice of the source that this token was lexed from.
    #[inline]
    pub fn source_of(&self, token: &Token) -> &'input str {
        &self.source[token.start..token.end]
    }

    /// The text a token stands for: string literals lose their quotes and
    ///  doubled quotes collapse to one.
    pub fn text(&self, token: &Token) -> String {
        let s = self.source_of(token);
        match token.ty {
            TokenType::String => s[1..s.len() - 1].replace("''", "'"),
            _ => s.to_string(),
        }
    }

    pub fn unexpected(&self, token: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.source_of(token).to_string(),
            at: token.start,
        }
    }

    /// Lexes the next token without consuming it.
    pub fn peek_token(&self) -> Result<Option<Token>, ParseError> {
        self.clone().next_token()
    }

    /// Consumes the next token if it has type [ty].
    pub fn consume(&mut self, ty: TokenType) -> Result<bool, ParseError> {
        let mut ahead = self.clone();
        match ahead.next_token()? {
            Some(tok) if tok.ty == ty => {
                *self = ahead;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.consume_whitespace();

        let Some(first) = self.peek() else {
            return Ok(None);
        };
        let start = self.current;
        self.current += 1;

        // Convenience macro for returning a token from `start` to `self.current`
        macro_rules! tok {
            ($name:ident) => {{
                Token {
                    ty: TokenType::$name,
                    start,
                    end: self.current,
                }
            }};
        }

        Ok(Some(match first {
            b'(' => tok!(ParenLeft),
            b')' => tok!(ParenRight),
            b',' => tok!(Comma),
            b'=' => tok!(Equals),
            b'!' => {
                if self.consume1(b'=') {
                    tok!(NotEquals)
                } else {
                    return Err(ParseError::UnexpectedCharacter(start));
                }
            }
            b'<' => {
                if self.consume1(b'>') {
                    tok!(NotEquals)
                } else if self.consume1(b'=') {
                    tok!(LTE)
                } else {
                    tok!(LT)
                }
            }
            b'>' => {
                if self.consume1(b'=') {
                    tok!(GTE)
                } else {
                    tok!(GT)
                }
            }
            b'\'' => {
                // A doubled quote is an escaped quote, anything else closes
                loop {
                    self.consume_while(|b| b != b'\'');
                    if self.is_empty() {
                        return Err(ParseError::UnterminatedString(start));
                    }
                    self.current += 1;
                    if self.peek() == Some(b'\'') {
                        self.current += 1;
                    } else {
                        break;
                    }
                }
                tok!(String)
            }
            b'"' => return Err(ParseError::UnexpectedCharacter(start)),
            _ => {
                self.consume_while(is_word_byte);
                let word = &self.bytes()[start..self.current];
                KEYWORDS
                    .iter()
                    .find(|(kw, _)| word.eq_ignore_ascii_case(kw))
                    .map_or(tok!(Word), |(_, ty)| Token {
                        ty: *ty,
                        start,
                        end: self.current,
                    })
            }
        }))
    }

    #[cfg(test)]
    fn remaining(&self) -> &'input str {
        &self.source[self.current..]
    }
}
