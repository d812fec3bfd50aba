//! CPU emulation for the LS8.
//!
//! This module implements the LS8 machine:
//! - 256 bytes of memory
//! - 8 general purpose registers (R7 is the stack pointer), PC and FL
//! - A variable-length instruction set with a manual stack and CALL/RET

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod stack;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::Registers;
pub use decode::{Instruction, Opcode, DecodeError};
pub use alu::AluOp;
pub use execute::{Cpu, CpuError, CpuState};
