//! Single-instruction disassembly for the execution trace.

use crate::isa::{self, Opcode, Word};

/// Format one instruction. `inline` is the trailing address word for forms
/// that carry one; pass `None` when it is not available.
pub fn disassemble(instr: Word, inline: Option<Word>) -> String {
    let Some(op) = Opcode::from_bits(isa::opcode_bits(instr)) else {
        return format!("DW 0x{instr:04x}");
    };

    let rd = isa::rd(instr);
    let rs = isa::rs(instr);
    let rt = isa::rt(instr) & 0x07;
    let addr = match inline {
        Some(addr) => format!("0x{addr:04x}"),
        None => "0x????".to_string(),
    };
    let name = op.mnemonic();

    match op {
        Opcode::Nop if rd == rs => name.to_string(),
        Opcode::Nop => format!("MOV R{rd}, R{rs}"),
        Opcode::Movi => {
            let imm = isa::sext7(isa::imm7(instr)) as i16;
            format!("{name} R{rd}, {imm}")
        }
        Opcode::LoadInd => format!("{name} R{rd}, [R{rs}]"),
        Opcode::LoadDir => format!("{name} R{rd}, {addr}"),
        Opcode::StoreInd => format!("{name} R{rs}, [R{rd}]"),
        Opcode::StoreDir => format!("{name} R{rs}, {addr}"),
        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::And
        | Opcode::Or
        | Opcode::Xor
        | Opcode::Shl
        | Opcode::Shr => format!("{name} R{rd}, R{rs}, R{rt}"),
        Opcode::Addi | Opcode::Subi => {
            let imm = isa::sext4(isa::imm4(instr)) as i16;
            format!("{name} R{rd}, R{rs}, {imm}")
        }
        Opcode::Andi | Opcode::Ori | Opcode::Shli | Opcode::Shri => {
            format!("{name} R{rd}, R{rs}, {}", isa::imm4(instr))
        }
        Opcode::Inc | Opcode::Dec => format!("{name} R{rd}"),
        Opcode::Not => format!("{name} R{rd}, R{rs}"),
        Opcode::Cmp => format!("{name} R{rs}, R{rt}"),
        Opcode::Cmpi => {
            let imm = isa::sext4(isa::imm4(instr)) as i16;
            format!("{name} R{rs}, {imm}")
        }
        Opcode::Jmp
        | Opcode::Jz
        | Opcode::Jnz
        | Opcode::Jc
        | Opcode::Jnc
        | Opcode::Jn
        | Opcode::Call => format!("{name} {addr}"),
        Opcode::Push => format!("{name} R{rs}"),
        Opcode::Pop => format!("{name} R{rd}"),
        Opcode::Ret | Opcode::Halt => name.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::isa::encode;

    #[test]
    fn formats_operand_shapes() {
        assert_eq!(disassemble(encode(Opcode::Nop, 0, 0, 0), None), "NOP");
        assert_eq!(disassemble(encode(Opcode::Nop, 1, 2, 0), None), "MOV R1, R2");
        assert_eq!(
            disassemble(isa::encode_imm7(Opcode::Movi, 3, (-5i8) as u8), None),
            "MOVI R3, -5"
        );
        assert_eq!(
            disassemble(encode(Opcode::Add, 1, 2, 3), None),
            "ADD R1, R2, R3"
        );
        assert_eq!(
            disassemble(encode(Opcode::Subi, 1, 2, 0xF), None),
            "SUB R1, R2, -1"
        );
        assert_eq!(
            disassemble(encode(Opcode::StoreInd, 4, 3, 0), None),
            "STORE R3, [R4]"
        );
        assert_eq!(
            disassemble(encode(Opcode::Jz, 0, 0, 0), Some(0x1234)),
            "JZ 0x1234"
        );
        assert_eq!(disassemble(encode(Opcode::Push, 0, 5, 0), None), "PUSH R5");
        assert_eq!(disassemble(encode(Opcode::Pop, 5, 0, 0), None), "POP R5");
        // opcode 0x24 is unassigned
        assert_eq!(disassemble(0x9000, None), "DW 0x9000");
    }
}
