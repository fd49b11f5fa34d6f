//! CPU core: register file, condition flags, descending stack, and the
//! fetch–decode–execute loop.

use colored::Colorize;

use crate::alu;
use crate::disasm;
use crate::isa::{
    self, Addr, Opcode, Word, FLAG_CARRY, FLAG_NEGATIVE, FLAG_OVERFLOW, FLAG_ZERO, NUM_REGISTERS,
    PROGRAM_START, STACK_END,
};
use crate::mem::Memory;

pub struct Cpu {
    mem: Memory,
    reg: [Word; NUM_REGISTERS],
    pc: Addr,
    sp: Addr,
    flags: Word,
    halted: bool,
    debug: bool,
    instr_count: u64,
}

impl Cpu {
    pub fn new(mem: Memory) -> Self {
        let mut cpu = Cpu {
            mem,
            reg: [0; NUM_REGISTERS],
            pc: 0,
            sp: 0,
            flags: 0,
            halted: false,
            debug: false,
            instr_count: 0,
        };
        cpu.reset();
        cpu
    }

    /// Return to power-on state. Memory contents are left alone.
    pub fn reset(&mut self) {
        self.reg = [0; NUM_REGISTERS];
        self.pc = PROGRAM_START;
        self.sp = STACK_END;
        self.flags = 0;
        self.halted = false;
        self.instr_count = 0;
    }

    /// Execute until the CPU halts.
    pub fn run(&mut self) {
        while !self.halted {
            self.step();
        }
    }

    /// Execute a single instruction. A no-op once halted.
    pub fn step(&mut self) {
        if self.halted {
            return;
        }

        // FETCH: read the instruction word and advance past it. Forms with
        // a trailing address word advance again during execution, before
        // their effect, so CALL pushes the post-address return PC.
        let instr = self.mem.read_word(self.pc);
        let at = self.pc;
        self.pc = self.pc.wrapping_add(2);

        if self.debug {
            self.trace(at, instr);
        }

        self.execute(instr);
        self.instr_count += 1;

        if self.debug {
            self.print_registers();
            self.print_flags();
        }
    }

    fn execute(&mut self, instr: Word) {
        // DECODE
        let Some(op) = Opcode::from_bits(isa::opcode_bits(instr)) else {
            // A defined trap, not an error: report once and stop.
            eprintln!(
                "{} unknown opcode 0x{:02x}, halting",
                "Trap".red().bold(),
                isa::opcode_bits(instr),
            );
            self.halted = true;
            return;
        };
        let rd = isa::rd(instr) as usize;
        let rs = isa::rs(instr) as usize;
        // Register operands use the low three bits of the rt field.
        let rt = (isa::rt(instr) & 0x07) as usize;

        // EXECUTE
        match op {
            Opcode::Nop => {
                if rd != rs {
                    self.reg[rd] = self.reg[rs];
                }
            }
            Opcode::Movi => self.reg[rd] = isa::sext7(isa::imm7(instr)),
            Opcode::LoadInd => self.reg[rd] = self.mem.read_word(self.reg[rs]),
            Opcode::LoadDir => {
                let addr = self.fetch_addr();
                self.reg[rd] = self.mem.read_word(addr);
            }
            Opcode::StoreInd => self.mem.write_word(self.reg[rd], self.reg[rs]),
            Opcode::StoreDir => {
                let addr = self.fetch_addr();
                self.mem.write_word(addr, self.reg[rs]);
            }

            Opcode::Add => {
                self.reg[rd] = alu::add(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Addi => {
                let imm = isa::sext4(isa::imm4(instr));
                self.reg[rd] = alu::add(self.reg[rs], imm, &mut self.flags);
            }
            Opcode::Sub => {
                self.reg[rd] = alu::sub(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Subi => {
                let imm = isa::sext4(isa::imm4(instr));
                self.reg[rd] = alu::sub(self.reg[rs], imm, &mut self.flags);
            }
            Opcode::Mul => {
                self.reg[rd] = alu::mul(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Div => {
                self.reg[rd] = alu::div(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Inc => self.reg[rd] = alu::add(self.reg[rd], 1, &mut self.flags),
            Opcode::Dec => self.reg[rd] = alu::sub(self.reg[rd], 1, &mut self.flags),

            Opcode::And => {
                self.reg[rd] = alu::and(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Andi => {
                self.reg[rd] = alu::and(self.reg[rs], isa::imm4(instr), &mut self.flags)
            }
            Opcode::Or => {
                self.reg[rd] = alu::or(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Ori => {
                self.reg[rd] = alu::or(self.reg[rs], isa::imm4(instr), &mut self.flags)
            }
            Opcode::Xor => {
                self.reg[rd] = alu::xor(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Not => self.reg[rd] = alu::not(self.reg[rs], &mut self.flags),

            Opcode::Shl => {
                self.reg[rd] = alu::shl(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Shli => {
                self.reg[rd] = alu::shl(self.reg[rs], isa::imm4(instr), &mut self.flags)
            }
            Opcode::Shr => {
                self.reg[rd] = alu::shr(self.reg[rs], self.reg[rt], &mut self.flags)
            }
            Opcode::Shri => {
                self.reg[rd] = alu::shr(self.reg[rs], isa::imm4(instr), &mut self.flags)
            }

            Opcode::Cmp => alu::compare(self.reg[rs], self.reg[rt], &mut self.flags),
            Opcode::Cmpi => {
                let imm = isa::sext4(isa::imm4(instr));
                alu::compare(self.reg[rs], imm, &mut self.flags);
            }

            // JMP overwrites PC outright; the conditional forms consume the
            // address word either way so a not-taken branch falls through
            // past the full 4-byte encoding.
            Opcode::Jmp => self.pc = self.mem.read_word(self.pc),
            Opcode::Jz => self.branch_if(self.flags & FLAG_ZERO != 0),
            Opcode::Jnz => self.branch_if(self.flags & FLAG_ZERO == 0),
            Opcode::Jc => self.branch_if(self.flags & FLAG_CARRY != 0),
            Opcode::Jnc => self.branch_if(self.flags & FLAG_CARRY == 0),
            Opcode::Jn => self.branch_if(self.flags & FLAG_NEGATIVE != 0),
            Opcode::Call => {
                let addr = self.fetch_addr();
                // PC now points past the address word: the return address.
                self.push(self.pc);
                self.pc = addr;
            }
            Opcode::Ret => self.pc = self.pop(),

            Opcode::Push => {
                let val = self.reg[rs];
                self.push(val);
            }
            Opcode::Pop => self.reg[rd] = self.pop(),

            Opcode::Halt => self.halted = true,
        }
    }

    /// Consume the trailing address word.
    fn fetch_addr(&mut self) -> Addr {
        let addr = self.mem.read_word(self.pc);
        self.pc = self.pc.wrapping_add(2);
        addr
    }

    fn branch_if(&mut self, taken: bool) {
        let addr = self.fetch_addr();
        if taken {
            self.pc = addr;
        }
    }

    /// Pre-decrement push; the stack grows toward lower addresses.
    fn push(&mut self, val: Word) {
        self.sp = self.sp.wrapping_sub(2);
        self.mem.write_word(self.sp, val);
    }

    /// Post-increment pop.
    fn pop(&mut self) -> Word {
        let val = self.mem.read_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        val
    }

    fn trace(&self, at: Addr, instr: Word) {
        let inline = Opcode::from_bits(isa::opcode_bits(instr))
            .filter(|op| op.has_inline_addr())
            .map(|_| self.mem.read_word(self.pc));
        println!(
            "[{}] 0x{at:04x}: {instr:04x}  {}",
            self.instr_count,
            disasm::disassemble(instr, inline)
        );
    }

    pub fn print_registers(&self) {
        let regs = self
            .reg
            .iter()
            .enumerate()
            .map(|(i, val)| format!("R{i}=0x{val:04x}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("Registers: {regs} PC=0x{:04x} SP=0x{:04x}", self.pc, self.sp);
    }

    pub fn print_flags(&self) {
        println!(
            "Flags: Z={} C={} N={} V={}",
            (self.flags & FLAG_ZERO != 0) as u8,
            (self.flags & FLAG_CARRY != 0) as u8,
            (self.flags & FLAG_NEGATIVE != 0) as u8,
            (self.flags & FLAG_OVERFLOW != 0) as u8,
        );
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Out-of-range indices read as zero.
    pub fn register(&self, idx: usize) -> Word {
        self.reg.get(idx).copied().unwrap_or(0)
    }

    pub fn pc(&self) -> Addr {
        self.pc
    }

    pub fn sp(&self) -> Addr {
        self.sp
    }

    pub fn flags(&self) -> Word {
        self.flags
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn instruction_count(&self) -> u64 {
        self.instr_count
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::asm::assemble;
    use crate::mem::test_support::SharedBuf;

    fn boot(src: &str) -> (Cpu, SharedBuf) {
        let buf = SharedBuf::default();
        let mut mem = Memory::with_console(Box::new(buf.clone()));
        mem.load_program(&assemble(src).unwrap(), 0x0000).unwrap();
        (Cpu::new(mem), buf)
    }

    #[test]
    fn reset_state() {
        let (cpu, _) = boot("halt");
        assert_eq!(cpu.pc(), 0x0000);
        assert_eq!(cpu.sp(), 0xFFFF);
        assert_eq!(cpu.flags(), 0);
        assert!(!cpu.halted());
        assert_eq!(cpu.instruction_count(), 0);
    }

    #[test]
    fn halt_only_program() {
        let (mut cpu, _) = boot("halt");
        cpu.step();
        assert!(cpu.halted());
        assert_eq!(cpu.instruction_count(), 1);
        assert_eq!(cpu.pc(), 0x0002);
        // Halted is terminal: further steps change nothing.
        cpu.step();
        assert_eq!(cpu.instruction_count(), 1);
        assert_eq!(cpu.pc(), 0x0002);
    }

    #[test]
    fn movi_negative_no_flags() {
        let (mut cpu, _) = boot("movi r3, -5\nhalt");
        cpu.run();
        assert_eq!(cpu.register(3), 0xFFFB);
        assert_eq!(cpu.flags(), 0);
    }

    #[test]
    fn mov_alias_copies_register() {
        let (mut cpu, _) = boot("movi r1, 7\nmov r4, r1\nhalt");
        cpu.run();
        assert_eq!(cpu.register(4), 7);
    }

    #[test]
    fn load_store_roundtrip() {
        let src = "\
movi r1, 42
store r1, 0x8000
load r2, 0x8000
halt";
        let (mut cpu, _) = boot(src);
        cpu.run();
        assert_eq!(cpu.register(2), 42);
        assert_eq!(cpu.mem().read_word(0x8000), 42);
    }

    #[test]
    fn indirect_load_store() {
        let src = "\
movi r1, 0x40
movi r2, 9
store r2, [r1]
load r3, [r1]
halt";
        let (mut cpu, _) = boot(src);
        cpu.run();
        assert_eq!(cpu.mem().read_word(0x0040), 9);
        assert_eq!(cpu.register(3), 9);
    }

    #[test]
    fn branch_not_taken_falls_through_four_bytes() {
        // CMP sets Z=0, so JZ must not branch but still swallow its address
        let (mut cpu, _) = boot("movi r0, 1\ncmp r0, 0\njz 0x0040\nhalt");
        cpu.step();
        cpu.step();
        let before = cpu.pc();
        cpu.step();
        assert_eq!(cpu.pc(), before + 4);
        cpu.step();
        assert!(cpu.halted());
    }

    #[test]
    fn conditional_branch_taken() {
        let src = "\
movi r0, 0
cmp r0, 0
jz skip
movi r1, 1
skip: halt";
        let (mut cpu, _) = boot(src);
        cpu.run();
        assert_eq!(cpu.register(1), 0);
    }

    #[test]
    fn call_pushes_return_past_address_word() {
        let src = "\
call fn
halt
fn: ret";
        let (mut cpu, _) = boot(src);
        cpu.step();
        // CALL occupies 0x0000..0x0004, so the return address is 0x0004
        assert_eq!(cpu.pc(), 0x0006);
        assert_eq!(cpu.sp(), 0xFFFD);
        assert_eq!(cpu.mem().read_word(0xFFFD), 0x0004);
        cpu.run();
        assert!(cpu.halted());
        assert_eq!(cpu.sp(), 0xFFFF);
    }

    #[test]
    fn push_pop_use_different_fields() {
        let src = "\
movi r5, 3
push r5
pop r6
halt";
        let (mut cpu, _) = boot(src);
        cpu.run();
        assert_eq!(cpu.register(6), 3);
        assert_eq!(cpu.sp(), 0xFFFF);
    }

    #[test]
    fn unknown_opcode_traps_to_halt() {
        let buf = SharedBuf::default();
        let mut mem = Memory::with_console(Box::new(buf.clone()));
        // opcode 0x24 is unassigned
        mem.load_program(&(0x24u16 << 10).to_le_bytes(), 0x0000)
            .unwrap();
        let mut cpu = Cpu::new(mem);
        cpu.run();
        assert!(cpu.halted());
        assert_eq!(cpu.instruction_count(), 1);
    }

    #[test]
    fn console_output_from_program() {
        let (mut cpu, buf) = boot("movi r1, 'A'\nstore r1, 0xF000\nhalt");
        cpu.run();
        assert_eq!(buf.contents(), b"A");
        assert_eq!(cpu.mem().read_byte(0xF000), 0);
    }

    #[test]
    fn factorial_program() {
        let src = include_str!("../tests/files/factorial.asm");
        let buf = SharedBuf::default();
        let mut mem = Memory::with_console(Box::new(buf.clone()));
        mem.load_program(&assemble(src).unwrap(), 0x0000).unwrap();
        let mut cpu = Cpu::new(mem);

        let mut min_sp = cpu.sp();
        while !cpu.halted() {
            cpu.step();
            min_sp = min_sp.min(cpu.sp());
        }

        assert_eq!(buf.contents(), b"120\n");
        assert_eq!(cpu.register(0), 120);
        assert_eq!(cpu.sp(), 0xFFFF);
        // Stack stays within 32 bytes of the top
        assert!(min_sp >= 0xFFFF - 32);
    }
}
