//! Two-pass assembler: address assignment, then code emission.
//!
//! Pass 1 walks the statement list sizing every instruction from its
//! (mnemonic, operand-shape) pair and binds labels to addresses, which is
//! what makes forward references work. Pass 2 selects the encoding form,
//! resolves labels, range-checks immediates, and emits bytes into a 64 KiB
//! image. The output file is the image trimmed after the highest byte
//! written.

use miette::Result;

use crate::air::{Air, AirStmt, AsmLine, Operand};
use crate::error;
use crate::isa::{self, Mnemonic, Opcode, MEMORY_SIZE};
use crate::parser::AsmParser;
use crate::span::Span;
use crate::symbol::SymbolTable;

/// Assemble source text into a flat binary image.
pub fn assemble(src: &str) -> Result<Vec<u8>> {
    let air = AsmParser::new(src)?.parse()?;
    Assembler::new(src).assemble(&air)
}

pub struct Assembler<'a> {
    src: &'a str,
    symtab: SymbolTable,
    image: Vec<u8>,
    /// One past the highest byte written; the file is trimmed to this.
    high_water: usize,
    /// Emit cursor. Kept wider than an address so running off the end is
    /// detected instead of wrapping.
    cur: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(src: &'a str) -> Self {
        Assembler {
            src,
            symtab: SymbolTable::new(),
            image: vec![0; MEMORY_SIZE],
            high_water: 0,
            cur: 0,
        }
    }

    pub fn assemble(mut self, air: &Air) -> Result<Vec<u8>> {
        self.pass_one(air)?;
        self.pass_two(air)?;
        self.image.truncate(self.high_water);
        Ok(self.image)
    }

    /// Bind labels and advance the cursor by each statement's encoded size.
    fn pass_one(&mut self, air: &Air) -> Result<()> {
        self.cur = 0;
        for line in air.lines() {
            match &line.stmt {
                AirStmt::Label { name } => {
                    if self.cur >= MEMORY_SIZE {
                        return Err(error::asm_image_overflow(line.span, self.src));
                    }
                    if self.symtab.define(name, self.cur as u16).is_some() {
                        return Err(error::asm_duplicate_label(line.span, self.src, name));
                    }
                }
                AirStmt::Org { addr } => self.cur = *addr as usize,
                stmt => {
                    let size = stmt_size(stmt);
                    if self.cur + size > MEMORY_SIZE {
                        return Err(error::asm_image_overflow(line.span, self.src));
                    }
                    self.cur += size;
                }
            }
        }
        Ok(())
    }

    /// Emit machine code with all labels resolvable.
    fn pass_two(&mut self, air: &Air) -> Result<()> {
        self.cur = 0;
        for line in air.lines() {
            match &line.stmt {
                AirStmt::Label { .. } => {}
                AirStmt::Org { addr } => self.cur = *addr as usize,
                AirStmt::Instr { mnemonic, operands } => {
                    let (word, inline) = self.encode_instr(line, *mnemonic, operands)?;
                    self.emit_word(word, line.span)?;
                    if let Some(addr) = inline {
                        self.emit_word(addr, line.span)?;
                    }
                }
                AirStmt::Words { vals } => {
                    for val in vals {
                        let word = self.resolve_value(val, line.span, -0x8000, 0xFFFF)?;
                        self.emit_word(word as u16, line.span)?;
                    }
                }
                AirStmt::Bytes { vals } => {
                    for val in vals {
                        let byte = self.resolve_value(val, line.span, -0x80, 0xFF)?;
                        self.emit_byte(byte as u8, line.span)?;
                    }
                }
                AirStmt::Ascii { text } => {
                    for &byte in text.as_bytes() {
                        self.emit_byte(byte, line.span)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Select the encoding form for a (mnemonic, operand-shape) pair.
    /// Returns the instruction word and the trailing address word, if any.
    fn encode_instr(
        &self,
        line: &AsmLine,
        mnemonic: Mnemonic,
        ops: &[Operand],
    ) -> Result<(u16, Option<u16>)> {
        use Operand::{Ind, Reg};

        let enc = match (mnemonic, ops) {
            (Mnemonic::Nop, []) => (isa::encode(Opcode::Nop, 0, 0, 0), None),
            (Mnemonic::Mov, [Reg(rd), Reg(rs)]) => {
                (isa::encode(Opcode::Nop, rd.index(), rs.index(), 0), None)
            }
            (Mnemonic::Movi, [Reg(rd), imm]) => {
                let imm = self.resolve_value(imm, line.span, -64, 63)?;
                (isa::encode_imm7(Opcode::Movi, rd.index(), imm as u8), None)
            }

            (Mnemonic::Load, [Reg(rd), Ind(rs)]) => {
                (isa::encode(Opcode::LoadInd, rd.index(), rs.index(), 0), None)
            }
            (Mnemonic::Load, [Reg(rd), addr]) => {
                let addr = self.resolve_value(addr, line.span, 0, 0xFFFF)?;
                (
                    isa::encode(Opcode::LoadDir, rd.index(), 0, 0),
                    Some(addr as u16),
                )
            }
            // The source register comes first in both STORE forms.
            (Mnemonic::Store, [Reg(rs), Ind(rd)]) => {
                (isa::encode(Opcode::StoreInd, rd.index(), rs.index(), 0), None)
            }
            (Mnemonic::Store, [Reg(rs), addr]) => {
                let addr = self.resolve_value(addr, line.span, 0, 0xFFFF)?;
                (
                    isa::encode(Opcode::StoreDir, 0, rs.index(), 0),
                    Some(addr as u16),
                )
            }

            (Mnemonic::Add, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Add, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Add, [Reg(rd), Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, -8, 7)?;
                (
                    isa::encode(Opcode::Addi, rd.index(), rs.index(), imm as u8 & 0x0F),
                    None,
                )
            }
            (Mnemonic::Sub, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Sub, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Sub, [Reg(rd), Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, -8, 7)?;
                (
                    isa::encode(Opcode::Subi, rd.index(), rs.index(), imm as u8 & 0x0F),
                    None,
                )
            }
            (Mnemonic::Mul, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Mul, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Div, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Div, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Inc, [Reg(rd)]) => (isa::encode(Opcode::Inc, rd.index(), 0, 0), None),
            (Mnemonic::Dec, [Reg(rd)]) => (isa::encode(Opcode::Dec, rd.index(), 0, 0), None),

            (Mnemonic::And, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::And, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::And, [Reg(rd), Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, 0, 15)?;
                (
                    isa::encode(Opcode::Andi, rd.index(), rs.index(), imm as u8),
                    None,
                )
            }
            (Mnemonic::Or, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Or, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Or, [Reg(rd), Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, 0, 15)?;
                (
                    isa::encode(Opcode::Ori, rd.index(), rs.index(), imm as u8),
                    None,
                )
            }
            (Mnemonic::Xor, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Xor, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Not, [Reg(rd), Reg(rs)]) => {
                (isa::encode(Opcode::Not, rd.index(), rs.index(), 0), None)
            }

            (Mnemonic::Shl, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Shl, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Shl, [Reg(rd), Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, 0, 15)?;
                (
                    isa::encode(Opcode::Shli, rd.index(), rs.index(), imm as u8),
                    None,
                )
            }
            (Mnemonic::Shr, [Reg(rd), Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Shr, rd.index(), rs.index(), rt.index()), None)
            }
            (Mnemonic::Shr, [Reg(rd), Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, 0, 15)?;
                (
                    isa::encode(Opcode::Shri, rd.index(), rs.index(), imm as u8),
                    None,
                )
            }

            (Mnemonic::Cmp, [Reg(rs), Reg(rt)]) => {
                (isa::encode(Opcode::Cmp, 0, rs.index(), rt.index()), None)
            }
            (Mnemonic::Cmp, [Reg(rs), imm]) => {
                let imm = self.resolve_value(imm, line.span, -8, 7)?;
                (
                    isa::encode(Opcode::Cmpi, 0, rs.index(), imm as u8 & 0x0F),
                    None,
                )
            }

            (
                Mnemonic::Jmp
                | Mnemonic::Jz
                | Mnemonic::Jnz
                | Mnemonic::Jc
                | Mnemonic::Jnc
                | Mnemonic::Jn
                | Mnemonic::Call,
                [target],
            ) => {
                let op = match mnemonic {
                    Mnemonic::Jmp => Opcode::Jmp,
                    Mnemonic::Jz => Opcode::Jz,
                    Mnemonic::Jnz => Opcode::Jnz,
                    Mnemonic::Jc => Opcode::Jc,
                    Mnemonic::Jnc => Opcode::Jnc,
                    Mnemonic::Jn => Opcode::Jn,
                    _ => Opcode::Call,
                };
                let addr = self.resolve_value(target, line.span, 0, 0xFFFF)?;
                (isa::encode(op, 0, 0, 0), Some(addr as u16))
            }
            (Mnemonic::Ret, []) => (isa::encode(Opcode::Ret, 0, 0, 0), None),

            // PUSH carries its register in the rs field, POP in rd.
            (Mnemonic::Push, [Reg(rs)]) => (isa::encode(Opcode::Push, 0, rs.index(), 0), None),
            (Mnemonic::Pop, [Reg(rd)]) => (isa::encode(Opcode::Pop, rd.index(), 0, 0), None),

            (Mnemonic::Halt, []) => (isa::encode(Opcode::Halt, 0, 0, 0), None),

            _ => {
                return Err(error::asm_bad_operands(
                    line.span,
                    self.src,
                    mnemonic.as_str(),
                    operand_shapes(mnemonic),
                ))
            }
        };
        Ok(enc)
    }

    /// Turn an immediate or label operand into a checked value.
    fn resolve_value(&self, op: &Operand, fallback: Span, min: i32, max: i32) -> Result<i32> {
        let (val, span) = match op {
            Operand::Imm { val, span } => (*val, *span),
            Operand::Label { name, span } => match self.symtab.resolve(name) {
                Some(addr) => (addr as i32, *span),
                None => return Err(error::asm_undefined_label(*span, self.src, name)),
            },
            Operand::Reg(_) | Operand::Ind(_) => {
                return Err(error::parse_unexpected(
                    fallback,
                    self.src,
                    "numeric literal or label",
                    "register",
                ))
            }
        };
        if !(min..=max).contains(&val) {
            return Err(error::asm_imm_range(span, self.src, val, min, max));
        }
        Ok(val)
    }

    fn emit_byte(&mut self, val: u8, span: Span) -> Result<()> {
        if self.cur >= MEMORY_SIZE {
            return Err(error::asm_image_overflow(span, self.src));
        }
        self.image[self.cur] = val;
        self.cur += 1;
        self.high_water = self.high_water.max(self.cur);
        Ok(())
    }

    fn emit_word(&mut self, val: u16, span: Span) -> Result<()> {
        let [lo, hi] = val.to_le_bytes();
        self.emit_byte(lo, span)?;
        self.emit_byte(hi, span)
    }
}

/// Encoded size in bytes. Pass 1 and pass 2 both rely on this, so the two
/// cursors can never drift apart.
fn stmt_size(stmt: &AirStmt) -> usize {
    match stmt {
        AirStmt::Label { .. } | AirStmt::Org { .. } => 0,
        AirStmt::Instr { mnemonic, operands } => instr_size(*mnemonic, operands),
        AirStmt::Words { vals } => vals.len() * 2,
        AirStmt::Bytes { vals } => vals.len(),
        AirStmt::Ascii { text } => text.len(),
    }
}

fn instr_size(mnemonic: Mnemonic, operands: &[Operand]) -> usize {
    match mnemonic {
        Mnemonic::Jmp
        | Mnemonic::Jz
        | Mnemonic::Jnz
        | Mnemonic::Jc
        | Mnemonic::Jnc
        | Mnemonic::Jn
        | Mnemonic::Call => 4,
        Mnemonic::Load | Mnemonic::Store => {
            if matches!(operands.get(1), Some(Operand::Ind(_))) {
                2
            } else {
                4
            }
        }
        _ => 2,
    }
}

fn operand_shapes(mnemonic: Mnemonic) -> &'static str {
    match mnemonic {
        Mnemonic::Nop | Mnemonic::Ret | Mnemonic::Halt => "no operands",
        Mnemonic::Mov => "Rd, Rs",
        Mnemonic::Movi => "Rd, imm7",
        Mnemonic::Load => "Rd, [Rs] — or — Rd, addr",
        Mnemonic::Store => "Rs, [Rd] — or — Rs, addr",
        Mnemonic::Add | Mnemonic::Sub => "Rd, Rs, Rt — or — Rd, Rs, imm4",
        Mnemonic::Mul | Mnemonic::Div | Mnemonic::Xor => "Rd, Rs, Rt",
        Mnemonic::And | Mnemonic::Or | Mnemonic::Shl | Mnemonic::Shr => {
            "Rd, Rs, Rt — or — Rd, Rs, uimm4"
        }
        Mnemonic::Inc | Mnemonic::Dec => "Rd",
        Mnemonic::Not => "Rd, Rs",
        Mnemonic::Cmp => "Rs, Rt — or — Rs, imm4",
        Mnemonic::Jmp
        | Mnemonic::Jz
        | Mnemonic::Jnz
        | Mnemonic::Jc
        | Mnemonic::Jnc
        | Mnemonic::Jn
        | Mnemonic::Call => "addr or label",
        Mnemonic::Push => "Rs",
        Mnemonic::Pop => "Rd",
    }
}
