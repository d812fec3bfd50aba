//! # LS8 Emulator
//!
//! An emulator for the LS8, a small eight-bit teaching computer.
//!
//! The machine has 256 bytes of memory, eight byte-wide registers (R7 is
//! the stack pointer) and a variable-length instruction set whose opcode
//! byte encodes its own operand count. Programs are distributed as `.ls8`
//! text files with one binary literal per line.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Instruction, Opcode, AluOp};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, ProgramError, load_program, parse_program, save_program};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
