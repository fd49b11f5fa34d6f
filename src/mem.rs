//! Flat 64 KiB memory with little-endian word access and memory-mapped
//! console output.
//!
//! All byte writes funnel through [`Memory::write_byte`], the single choke
//! point for the console trap at `0xF000`: the byte goes to the console sink
//! and is *not* stored, so word writes that straddle the port still emit
//! exactly one character.

use std::fmt::Write as _;
use std::io::{self, Write};

use miette::Result;

use crate::error;
use crate::isa::{self, Addr, Byte, Word, MEMORY_SIZE};

pub struct Memory {
    data: Box<[Byte]>,
    console: Box<dyn Write>,
}

impl Memory {
    /// Memory with the console wired to host stdout.
    pub fn new() -> Self {
        Memory::with_console(Box::new(io::stdout()))
    }

    /// Memory with a custom console sink, mainly for tests.
    pub fn with_console(console: Box<dyn Write>) -> Self {
        Memory {
            data: vec![0; MEMORY_SIZE].into_boxed_slice(),
            console,
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Reads always come from the backing store, even in the I/O region.
    pub fn read_byte(&self, addr: Addr) -> Byte {
        self.data[addr as usize]
    }

    pub fn write_byte(&mut self, addr: Addr, val: Byte) {
        if addr == isa::IO_CONSOLE_OUT {
            // Emit immediately; flushing keeps output visible even when the
            // program never halts. The backing store is untouched.
            let _ = self.console.write_all(&[val]);
            let _ = self.console.flush();
            return;
        }
        self.data[addr as usize] = val;
    }

    /// Little-endian: low byte at the lower address. The high byte wraps at
    /// the top of memory.
    pub fn read_word(&self, addr: Addr) -> Word {
        let low = self.read_byte(addr);
        let high = self.read_byte(addr.wrapping_add(1));
        Word::from_le_bytes([low, high])
    }

    pub fn write_word(&mut self, addr: Addr, val: Word) {
        let [low, high] = val.to_le_bytes();
        self.write_byte(addr, low);
        self.write_byte(addr.wrapping_add(1), high);
    }

    /// Copy a program image into memory at `start`.
    pub fn load_program(&mut self, bytes: &[u8], start: Addr) -> Result<()> {
        let start = start as usize;
        if start + bytes.len() > MEMORY_SIZE {
            return Err(error::load_too_large(bytes.len(), start as u16));
        }
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Hex + ASCII dump of an inclusive address range, 16 bytes per row.
    pub fn dump(&self, start: Addr, end: Addr) -> String {
        let mut out = String::new();
        let mut addr = start as usize;
        let end = end as usize;
        while addr <= end {
            let row = &self.data[addr..=(addr + 15).min(end)];
            let _ = write!(out, "0x{addr:04x}: ");
            for byte in row {
                let _ = write!(out, "{byte:02x} ");
            }
            // Pad short final rows so the ASCII column lines up.
            for _ in row.len()..16 {
                out.push_str("   ");
            }
            out.push_str(" | ");
            for &byte in row {
                if (32..127).contains(&byte) {
                    out.push(byte as char);
                } else {
                    out.push('.');
                }
            }
            out.push('\n');
            addr += 16;
        }
        out
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}


#[cfg(test)]
mod test {
    use super::test_support::SharedBuf;
    use super::*;

    #[test]
    fn little_endian_word_access() {
        let mut mem = Memory::with_console(Box::<SharedBuf>::default());
        mem.write_word(0x8000, 0xABCD);
        assert_eq!(mem.read_byte(0x8000), 0xCD);
        assert_eq!(mem.read_byte(0x8001), 0xAB);
        assert_eq!(mem.read_word(0x8000), 0xABCD);
    }

    #[test]
    fn word_access_wraps_at_top() {
        let mut mem = Memory::with_console(Box::<SharedBuf>::default());
        mem.write_word(0xFFFF, 0x1234);
        assert_eq!(mem.read_byte(0xFFFF), 0x34);
        assert_eq!(mem.read_byte(0x0000), 0x12);
        assert_eq!(mem.read_word(0xFFFF), 0x1234);
    }

    #[test]
    fn console_write_bypasses_backing_store() {
        let buf = SharedBuf::default();
        let mut mem = Memory::with_console(Box::new(buf.clone()));
        mem.write_byte(isa::IO_CONSOLE_OUT, b'x');
        mem.write_byte(isa::IO_CONSOLE_OUT, b'y');
        assert_eq!(buf.contents(), b"xy");
        // Reads return the untouched backing byte, not the last write.
        assert_eq!(mem.read_byte(isa::IO_CONSOLE_OUT), 0);
    }

    #[test]
    fn straddling_word_write_emits_one_char() {
        let buf = SharedBuf::default();
        let mut mem = Memory::with_console(Box::new(buf.clone()));
        mem.write_word(isa::IO_CONSOLE_OUT, 0x41 | (0x7A << 8));
        assert_eq!(buf.contents(), b"A");
        // The high byte landed at 0xF001 as a plain store.
        assert_eq!(mem.read_byte(0xF001), 0x7A);
    }

    #[test]
    fn load_program_bounds() {
        let mut mem = Memory::with_console(Box::<SharedBuf>::default());
        assert!(mem.load_program(&[1, 2, 3], 0xFFFD).is_ok());
        assert_eq!(mem.read_byte(0xFFFF), 3);
        assert!(mem.load_program(&[1, 2, 3], 0xFFFE).is_err());
    }

    #[test]
    fn dump_formats_rows() {
        let mut mem = Memory::with_console(Box::<SharedBuf>::default());
        mem.write_byte(0x0000, b'H');
        mem.write_byte(0x0001, b'i');
        let dump = mem.dump(0x0000, 0x001F);
        let mut lines = dump.lines();
        let first = lines.next().unwrap();
        assert!(first.starts_with("0x0000: 48 69 00"));
        assert!(first.ends_with("| Hi.............."));
        assert!(lines.next().unwrap().starts_with("0x0010:"));
    }
}
