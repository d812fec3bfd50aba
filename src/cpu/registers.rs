//! LS8 CPU registers.
//!
//! The LS8 has:
//! - R0-R7: eight 8-bit general purpose registers
//! - PC: 8-bit program counter
//! - FL: 8-bit flags register (reserved for comparison results)
//!
//! R7 doubles as the stack pointer by convention. Nothing stops a program
//! from using it as a general register, but doing so corrupts the stack.

use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the register used as the stack pointer.
pub const SP: u8 = 7;

/// Initial stack pointer: the stack grows down from just below the
/// memory-mapped area at 0xF4.
pub const SP_INIT: u8 = 0xF4;

/// The LS8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub r: [u8; REGISTER_COUNT],

    /// Program counter
    pub pc: u8,

    /// Flags register. Present for CMP, which this core does not dispatch.
    pub fl: u8,
}

impl Registers {
    /// Create a new register file: everything zeroed, SP preset.
    pub fn new() -> Self {
        let mut r = [0; REGISTER_COUNT];
        r[SP as usize] = SP_INIT;

        Self { r, pc: 0, fl: 0 }
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general purpose register.
    ///
    /// # Panics
    /// Panics if `index` is not 0-7. Decoded instructions are validated
    /// before they reach the register file.
    #[inline]
    pub fn get(&self, index: u8) -> u8 {
        self.r[index as usize]
    }

    /// Write a general purpose register.
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) {
        self.r[index as usize] = value;
    }

    /// Current stack pointer (R7).
    #[inline]
    pub fn sp(&self) -> u8 {
        self.r[SP as usize]
    }

    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.r[SP as usize] = value;
    }

    /// Advance the program counter, wrapping modulo 256.
    /// Returns the old value.
    pub fn advance_pc(&mut self, by: u8) -> u8 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(by);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();

        assert_eq!(regs.pc, 0);
        assert_eq!(regs.fl, 0);
        assert_eq!(regs.sp(), 0xF4);
        assert!(regs.r[..7].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0xFE;

        let old = regs.advance_pc(3);
        assert_eq!(old, 0xFE);
        assert_eq!(regs.pc, 0x01);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.set(0, 99);
        regs.set_sp(0x10);
        regs.jump(0x40);

        regs.reset();
        assert_eq!(regs, Registers::new());
    }
}
