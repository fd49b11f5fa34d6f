//! Char cursor over assembly source, in the style of `rustc_lexer`.

use std::str::Chars;

use crate::span::{Idx, Span};

pub(crate) const EOF_CHAR: char = '\0';

/// Peekable iterator over a char sequence that tracks the start of the
/// token currently being scanned.
#[derive(Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    chars: Chars<'a>,
    token_start: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Cursor<'a> {
        Cursor {
            src,
            chars: src.chars(),
            token_start: 0,
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Next character without consuming it.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Advance by one character.
    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Byte offset from the start of the source.
    pub fn pos(&self) -> usize {
        self.src.len() - self.chars.as_str().len()
    }

    /// Mark the current position as the start of a token.
    pub fn start_token(&mut self) {
        self.token_start = self.pos();
    }

    /// Span from the last [`Self::start_token`] to the current position.
    pub fn token_span(&self) -> Span {
        let len = self.pos() - self.token_start;
        Span::new(Idx(self.token_start as u32), len as u16)
    }

    /// Source text of the token being scanned.
    pub fn token_text(&self) -> &'a str {
        &self.src[self.token_start..self.pos()]
    }

    /// Consume while the predicate holds.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }
}
