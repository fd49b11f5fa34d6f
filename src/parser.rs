//! Transforms the token stream into [`Air`].
//!
//! The grammar is line-oriented: an optional `label:` prefix, then at most
//! one statement (mnemonic with comma-separated operands, or a directive).

use std::borrow::Cow;

use miette::Result;

use crate::air::{Air, AirStmt, AsmLine, Operand};
use crate::error;
use crate::isa::Mnemonic;
use crate::lexer::{self, DirKind, Literal, Token, TokenKind};
use crate::span::Span;

pub struct AsmParser<'a> {
    src: &'a str,
    toks: Vec<Token>,
    pos: usize,
    /// 1-based line counter, bumped on every EOL token.
    line: u32,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        let toks = lexer::tokenize(src)?;
        Ok(AsmParser {
            src,
            toks,
            pos: 0,
            line: 1,
        })
    }

    fn text(&self, span: Span) -> &'a str {
        &self.src[span.as_range()]
    }

    fn peek(&self) -> Token {
        self.toks[self.pos.min(self.toks.len() - 1)]
    }

    /// Second token of lookahead, used to spot `label:` prefixes.
    fn peek2(&self) -> Token {
        self.toks[(self.pos + 1).min(self.toks.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        let tok = self.advance();
        if tok.kind == expected {
            Ok(tok)
        } else if tok.kind == TokenKind::Eof {
            Err(error::parse_eof(self.src))
        } else {
            Err(error::parse_unexpected(
                tok.span,
                self.src,
                &expected.to_string(),
                &tok.kind.to_string(),
            ))
        }
    }

    /// Consume the whole token stream into a program.
    pub fn parse(mut self) -> Result<Air> {
        let mut air = Air::new();
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Eol => {
                    self.advance();
                    self.line += 1;
                    continue;
                }
                TokenKind::Ident if self.peek2().kind == TokenKind::Colon => {
                    let tok = self.advance();
                    self.advance();
                    air.push(AsmLine {
                        line: self.line,
                        span: tok.span,
                        stmt: AirStmt::Label {
                            name: self.text(tok.span).to_string(),
                        },
                    });
                    // A statement may follow the label on the same line.
                    continue;
                }
                TokenKind::Ident => {
                    let stmt = self.parse_instr()?;
                    air.push(stmt);
                }
                TokenKind::Dir(kind) => {
                    let stmt = self.parse_directive(kind)?;
                    air.push(stmt);
                }
                _ => {
                    let tok = self.peek();
                    return Err(error::parse_unexpected(
                        tok.span,
                        self.src,
                        "a label, mnemonic, or directive",
                        &tok.kind.to_string(),
                    ));
                }
            }
            // One statement per line.
            match self.peek().kind {
                TokenKind::Eol => {
                    self.advance();
                    self.line += 1;
                }
                TokenKind::Eof => {}
                _ => return Err(error::parse_trailing(self.peek().span, self.src)),
            }
        }
        Ok(air)
    }

    fn parse_instr(&mut self) -> Result<AsmLine> {
        let tok = self.advance();
        let Ok(mnemonic) = self.text(tok.span).parse::<Mnemonic>() else {
            return Err(error::parse_unknown_mnemonic(tok.span, self.src));
        };
        let operands = self.parse_operand_list()?;
        Ok(AsmLine {
            line: self.line,
            span: tok.span,
            stmt: AirStmt::Instr { mnemonic, operands },
        })
    }

    fn parse_directive(&mut self, kind: DirKind) -> Result<AsmLine> {
        let tok = self.advance();
        let stmt = match kind {
            DirKind::Org => {
                let (val, span) = self.expect_int()?;
                if !(0..=0xFFFF).contains(&val) {
                    return Err(error::asm_imm_range(span, self.src, val, 0, 0xFFFF));
                }
                AirStmt::Org { addr: val as u16 }
            }
            DirKind::Word => AirStmt::Words {
                vals: self.parse_value_list(tok.span)?,
            },
            DirKind::Byte => AirStmt::Bytes {
                vals: self.parse_value_list(tok.span)?,
            },
            DirKind::Ascii => {
                let str_tok = self.expect(TokenKind::Lit(Literal::Str))?;
                let raw = self.text(str_tok.span);
                // Drop the surrounding quotes before unescaping.
                let text = unescape(&raw[1..raw.len() - 1]).into_owned();
                AirStmt::Ascii { text }
            }
        };
        Ok(AsmLine {
            line: self.line,
            span: tok.span,
            stmt,
        })
    }

    /// Comma-separated operands; empty when the line ends immediately.
    fn parse_operand_list(&mut self) -> Result<Vec<Operand>> {
        let mut operands = Vec::new();
        if !self.starts_operand() {
            return Ok(operands);
        }
        operands.push(self.parse_operand()?);
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            operands.push(self.parse_operand()?);
        }
        Ok(operands)
    }

    /// Like [`Self::parse_operand_list`] but requires at least one value and
    /// rejects register operands (for `.WORD`/`.BYTE` payloads).
    fn parse_value_list(&mut self, dir_span: Span) -> Result<Vec<Operand>> {
        let vals = self.parse_operand_list()?;
        if vals.is_empty() {
            return Err(error::parse_unexpected(
                dir_span,
                self.src,
                "at least one value",
                "none",
            ));
        }
        for val in &vals {
            if let Operand::Reg(_) | Operand::Ind(_) = val {
                return Err(error::parse_unexpected(
                    dir_span,
                    self.src,
                    "numeric literal or label",
                    "register",
                ));
            }
        }
        Ok(vals)
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Reg(_)
                | TokenKind::Lit(Literal::Int(_))
                | TokenKind::Ident
                | TokenKind::OpenBracket
        )
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Reg(reg) => Ok(Operand::Reg(reg)),
            TokenKind::Lit(Literal::Int(val)) => Ok(Operand::Imm {
                val,
                span: tok.span,
            }),
            TokenKind::Ident => Ok(Operand::Label {
                name: self.text(tok.span).to_string(),
                span: tok.span,
            }),
            TokenKind::OpenBracket => {
                let reg_tok = self.advance();
                let TokenKind::Reg(reg) = reg_tok.kind else {
                    return Err(error::parse_unexpected(
                        reg_tok.span,
                        self.src,
                        "register",
                        &reg_tok.kind.to_string(),
                    ));
                };
                self.expect(TokenKind::CloseBracket)?;
                Ok(Operand::Ind(reg))
            }
            TokenKind::Eof => Err(error::parse_eof(self.src)),
            _ => Err(error::parse_unexpected(
                tok.span,
                self.src,
                "operand",
                &tok.kind.to_string(),
            )),
        }
    }

    fn expect_int(&mut self) -> Result<(i32, Span)> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Lit(Literal::Int(val)) => Ok((val, tok.span)),
            TokenKind::Eof => Err(error::parse_eof(self.src)),
            _ => Err(error::parse_unexpected(
                tok.span,
                self.src,
                "numeric literal",
                &tok.kind.to_string(),
            )),
        }
    }
}

/// Resolve backslash escapes in a string literal body.
fn unescape(s: &str) -> Cow<str> {
    if s.find('\\').is_none() {
        return Cow::Borrowed(s);
    }
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('0') => result.push('\0'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                // Trailing backslash; keep it as is
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    Cow::Owned(result)
}
