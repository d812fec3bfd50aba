//! Program image handling for the LS8.
//!
//! This module provides:
//! - The `.ls8` text format (binary literal per line → program bytes)
//! - A disassembler (bytes → readable text)
//! - A simple two-pass assembler (mnemonics → bytes)

pub mod assembler;
pub mod disasm;
pub mod program;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_at};
pub use program::{load_program, parse_program, save_program, ProgramError, ProgramImage};
