//! Assembly intermediate representation: the ordered statement list the
//! parser produces and both assembler passes walk.

use crate::isa::{Mnemonic, Register};
use crate::span::Span;

/// A parsed program, in source order.
#[derive(Default, Debug)]
pub struct Air {
    lines: Vec<AsmLine>,
}

impl Air {
    pub fn new() -> Self {
        Air::default()
    }

    pub fn push(&mut self, line: AsmLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[AsmLine] {
        &self.lines
    }

    pub fn get(&self, idx: usize) -> &AsmLine {
        &self.lines[idx]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One parsed statement with its source location.
#[derive(PartialEq, Eq, Debug)]
pub struct AsmLine {
    /// 1-based source line.
    pub line: u32,
    /// Span of the statement's leading token, for diagnostics.
    pub span: Span,
    pub stmt: AirStmt,
}

#[derive(PartialEq, Eq, Debug)]
pub enum AirStmt {
    /// `name:` — binds `name` to the current emit address in pass 1.
    Label { name: String },
    /// A mnemonic with operands; the operand shape picks the encoding form.
    Instr {
        mnemonic: Mnemonic,
        operands: Vec<Operand>,
    },
    /// `.ORG addr` — move the emit cursor.
    Org { addr: u16 },
    /// `.WORD v[, v...]` — literal words; label references are allowed.
    Words { vals: Vec<Operand> },
    /// `.BYTE v[, v...]` — literal bytes.
    Bytes { vals: Vec<Operand> },
    /// `.ASCII "..."` — raw characters, no terminator.
    Ascii { text: String },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    Reg(Register),
    /// `[Rn]` — register indirect.
    Ind(Register),
    /// Decimal, hex, or character literal.
    Imm { val: i32, span: Span },
    /// Bare identifier resolved through the symbol table in pass 2.
    Label { name: String, span: Span },
}
