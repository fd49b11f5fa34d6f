//! Tokenizer for EM-16 assembly source.
//!
//! Mnemonics, registers and directives are case-insensitive; labels are
//! case-sensitive. `;` starts a comment running to end of line. Newlines are
//! significant (one statement per line) and surface as [`TokenKind::Eol`].

use std::fmt::{self, Display};

use miette::Result;

use crate::error;
use crate::isa::Register;
use crate::span::Span;

pub mod cursor;

use cursor::Cursor;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonic or label; the parser decides which.
    Ident,
    Reg(Register),
    Lit(Literal),
    Dir(DirKind),
    Comma,
    Colon,
    OpenBracket,
    CloseBracket,
    Eol,
    Eof,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Literal {
    /// Decimal, hex, or character literal, normalized to its value.
    Int(i32),
    /// Quoted string; the text is recovered from the span when needed.
    Str,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirKind {
    Org,
    Word,
    Byte,
    Ascii,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Reg(_) => "register",
            TokenKind::Lit(Literal::Int(_)) => "numeric literal",
            TokenKind::Lit(Literal::Str) => "string literal",
            TokenKind::Dir(_) => "directive",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::OpenBracket => "`[`",
            TokenKind::CloseBracket => "`]`",
            TokenKind::Eol => "end of line",
            TokenKind::Eof => "end of file",
        };
        f.write_str(s)
    }
}

/// Tokenize a whole source file, including the final EOF token.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cursor = Cursor::new(src);
    let mut toks = Vec::new();
    loop {
        let tok = cursor.advance_token()?;
        let done = tok.kind == TokenKind::Eof;
        toks.push(tok);
        if done {
            return Ok(toks);
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Result<Token> {
        loop {
            self.start_token();
            let Some(c) = self.bump() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    span: self.token_span(),
                });
            };
            let kind = match c {
                ' ' | '\t' | '\r' => continue,
                ';' => {
                    self.take_while(|c| c != '\n');
                    continue;
                }
                '\n' => TokenKind::Eol,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                '[' => TokenKind::OpenBracket,
                ']' => TokenKind::CloseBracket,
                '0' if matches!(self.first(), 'x' | 'X') => {
                    self.bump();
                    self.hex_lit()?
                }
                '0'..='9' => self.dec_lit()?,
                '-' if self.first().is_ascii_digit() => self.dec_lit()?,
                '\'' => self.char_lit()?,
                '"' => self.str_lit()?,
                '.' => self.directive()?,
                c if is_ident_start(c) => self.ident()?,
                _ => return Err(error::lex_unknown(self.token_span(), self.src())),
            };
            return Ok(Token {
                kind,
                span: self.token_span(),
            });
        }
    }

    fn hex_lit(&mut self) -> Result<TokenKind> {
        self.take_while(|c| c.is_ascii_hexdigit());
        let digits = &self.token_text()[2..];
        let val = u32::from_str_radix(digits, 16)
            .map_err(|_| error::lex_bad_literal(self.token_span(), self.src()))?;
        if val > 0xFFFF {
            return Err(error::lex_bad_literal(self.token_span(), self.src()));
        }
        Ok(TokenKind::Lit(Literal::Int(val as i32)))
    }

    fn dec_lit(&mut self) -> Result<TokenKind> {
        self.take_while(|c| c.is_ascii_digit());
        let val = self
            .token_text()
            .parse::<i32>()
            .map_err(|_| error::lex_bad_literal(self.token_span(), self.src()))?;
        // Accept the full signed and unsigned 16-bit ranges; field-width
        // checks happen at encode time.
        if !(-0x8000..=0xFFFF).contains(&val) {
            return Err(error::lex_bad_literal(self.token_span(), self.src()));
        }
        Ok(TokenKind::Lit(Literal::Int(val)))
    }

    fn char_lit(&mut self) -> Result<TokenKind> {
        let c = match self.bump() {
            Some('\\') => match self.bump() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some('\\') => '\\',
                Some('\'') => '\'',
                Some('"') => '"',
                _ => return Err(error::lex_bad_char(self.token_span(), self.src())),
            },
            Some(c) if c != '\n' && c != '\'' => c,
            _ => return Err(error::lex_bad_char(self.token_span(), self.src())),
        };
        if self.bump() != Some('\'') || !c.is_ascii() {
            return Err(error::lex_bad_char(self.token_span(), self.src()));
        }
        Ok(TokenKind::Lit(Literal::Int(c as i32)))
    }

    fn str_lit(&mut self) -> Result<TokenKind> {
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(error::lex_unclosed_str(self.token_span(), self.src()))
                }
                Some('\\') => {
                    self.bump();
                }
                Some('"') => break,
                Some(_) => {}
            }
        }
        Ok(TokenKind::Lit(Literal::Str))
    }

    fn directive(&mut self) -> Result<TokenKind> {
        self.take_while(is_ident_continue);
        let kind = match self.token_text()[1..].to_ascii_lowercase().as_str() {
            "org" => DirKind::Org,
            "word" => DirKind::Word,
            "byte" => DirKind::Byte,
            "ascii" => DirKind::Ascii,
            _ => return Err(error::lex_invalid_dir(self.token_span(), self.src())),
        };
        Ok(TokenKind::Dir(kind))
    }

    fn ident(&mut self) -> Result<TokenKind> {
        self.take_while(is_ident_continue);
        let text = self.token_text().as_bytes();
        if text.len() == 2 && matches!(text[0], b'r' | b'R') {
            match text[1] {
                d @ b'0'..=b'7' => {
                    // From-index cannot fail for digits 0-7.
                    let reg = Register::from_index(d - b'0').unwrap();
                    return Ok(TokenKind::Reg(reg));
                }
                b'8' | b'9' => {
                    return Err(error::lex_bad_register(self.token_span(), self.src()))
                }
                _ => {}
            }
        }
        Ok(TokenKind::Ident)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn basic_statement() {
        assert_eq!(
            kinds("add r0, R1, r2"),
            vec![
                TokenKind::Ident,
                TokenKind::Reg(Register::R0),
                TokenKind::Comma,
                TokenKind::Reg(Register::R1),
                TokenKind::Comma,
                TokenKind::Reg(Register::R2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("42 -3 0x1F 'A' '\\n'"),
            vec![
                TokenKind::Lit(Literal::Int(42)),
                TokenKind::Lit(Literal::Int(-3)),
                TokenKind::Lit(Literal::Int(0x1F)),
                TokenKind::Lit(Literal::Int(65)),
                TokenKind::Lit(Literal::Int(10)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hex_too_large() {
        assert!(tokenize("0x10000").is_err());
    }

    #[test]
    fn indirect_operand() {
        assert_eq!(
            kinds("load r1, [r2]"),
            vec![
                TokenKind::Ident,
                TokenKind::Reg(Register::R1),
                TokenKind::Comma,
                TokenKind::OpenBracket,
                TokenKind::Reg(Register::R2),
                TokenKind::CloseBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_newlines() {
        assert_eq!(
            kinds("halt ; stop here\nhalt"),
            vec![
                TokenKind::Ident,
                TokenKind::Eol,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn label_declaration() {
        assert_eq!(
            kinds("loop: jmp loop"),
            vec![
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn directives() {
        assert_eq!(
            kinds(".org 0x100\n.word 1, 2\n.ascii \"hi\""),
            vec![
                TokenKind::Dir(DirKind::Org),
                TokenKind::Lit(Literal::Int(0x100)),
                TokenKind::Eol,
                TokenKind::Dir(DirKind::Word),
                TokenKind::Lit(Literal::Int(1)),
                TokenKind::Comma,
                TokenKind::Lit(Literal::Int(2)),
                TokenKind::Eol,
                TokenKind::Dir(DirKind::Ascii),
                TokenKind::Lit(Literal::Str),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_directive() {
        assert!(tokenize(".stringz \"oops\"").is_err());
    }

    #[test]
    fn unterminated_string() {
        assert!(tokenize(".ascii \"oops").is_err());
    }

    #[test]
    fn bad_register_index() {
        assert!(tokenize("push r8").is_err());
        // r10 and beyond read as plain identifiers, not registers
        assert_eq!(
            kinds("r10"),
            vec![TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn register_named_label_needs_more_chars() {
        // `r2x` is an identifier, not a register plus junk
        assert_eq!(kinds("r2x"), vec![TokenKind::Ident, TokenKind::Eof]);
    }
}
