//! Stack operations.
//!
//! The stack lives in ordinary memory and grows downward from the address
//! in R7. There is no overflow or underflow detection; the pointer wraps
//! modulo 256 in both directions.

use crate::cpu::Cpu;

impl Cpu {
    /// Decrement SP, then store `value` at the new top of stack.
    pub fn push(&mut self, value: u8) {
        let sp = self.regs.sp().wrapping_sub(1);
        self.regs.set_sp(sp);
        self.mem.write(sp, value);
    }

    /// Read the top of stack, then increment SP.
    pub fn pop(&mut self) -> u8 {
        let sp = self.regs.sp();
        let value = self.mem.read(sp);
        self.regs.set_sp(sp.wrapping_add(1));
        value
    }
}
