//! Instruction decoder for the LS8.
//!
//! Every instruction starts with a one-byte opcode whose top two bits
//! give the number of operand bytes that follow (0-2):
//!
//! ```text
//!   AABCDDDD
//!   ││
//!   └┴─ operand count
//! ```
//!
//! The remaining bits identify the instruction. The full LS8 opcode map
//! has twenty entries; this core dispatches nine of them. The other eleven
//! (CMP, the jumps and the bitwise group) are recognised by name so they
//! can be reported and disassembled, but decoding one is an error.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::cpu::registers::REGISTER_COUNT;

/// Length in bytes of the instruction starting with `ir`, opcode included.
///
/// Derived purely from the top two bits, so it is defined for every byte,
/// recognised or not.
#[inline]
pub const fn instruction_len(ir: u8) -> u8 {
    (ir >> 6) + 1
}

/// An LS8 opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opcode(pub u8);

impl Opcode {
    // Dispatched
    pub const HLT: Opcode = Opcode(0b0000_0001);
    pub const LDI: Opcode = Opcode(0b1000_0010);
    pub const PRN: Opcode = Opcode(0b0100_0111);
    pub const MUL: Opcode = Opcode(0b1010_0010);
    pub const ADD: Opcode = Opcode(0b1010_0000);
    pub const POP: Opcode = Opcode(0b0100_0110);
    pub const PUSH: Opcode = Opcode(0b0100_0101);
    pub const CALL: Opcode = Opcode(0b0101_0000);
    pub const RET: Opcode = Opcode(0b0001_0001);

    // Reserved: part of the LS8 map, no dispatch case here
    pub const CMP: Opcode = Opcode(0b1010_0111);
    pub const JMP: Opcode = Opcode(0b0101_0100);
    pub const JNE: Opcode = Opcode(0b0101_0110);
    pub const JEQ: Opcode = Opcode(0b0101_0101);
    pub const AND: Opcode = Opcode(0b1010_1000);
    pub const OR: Opcode = Opcode(0b1010_1010);
    pub const XOR: Opcode = Opcode(0b1010_1011);
    pub const NOT: Opcode = Opcode(0b0110_1001);
    pub const SHL: Opcode = Opcode(0b1010_1100);
    pub const SHR: Opcode = Opcode(0b1010_1101);
    pub const MOD: Opcode = Opcode(0b1010_0100);

    /// Every named opcode with its mnemonic.
    pub const TABLE: [(Opcode, &'static str); 20] = [
        (Opcode::HLT, "HLT"),
        (Opcode::LDI, "LDI"),
        (Opcode::PRN, "PRN"),
        (Opcode::MUL, "MUL"),
        (Opcode::ADD, "ADD"),
        (Opcode::POP, "POP"),
        (Opcode::PUSH, "PUSH"),
        (Opcode::CALL, "CALL"),
        (Opcode::RET, "RET"),
        (Opcode::CMP, "CMP"),
        (Opcode::JMP, "JMP"),
        (Opcode::JNE, "JNE"),
        (Opcode::JEQ, "JEQ"),
        (Opcode::AND, "AND"),
        (Opcode::OR, "OR"),
        (Opcode::XOR, "XOR"),
        (Opcode::NOT, "NOT"),
        (Opcode::SHL, "SHL"),
        (Opcode::SHR, "SHR"),
        (Opcode::MOD, "MOD"),
    ];

    /// Mnemonic for a named opcode.
    pub fn mnemonic(self) -> Option<&'static str> {
        Self::TABLE
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, name)| *name)
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Self::TABLE
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(op, _)| *op)
    }

    /// Whether the execution loop has a case for this opcode.
    pub fn is_dispatched(self) -> bool {
        matches!(
            self,
            Opcode::HLT
                | Opcode::LDI
                | Opcode::PRN
                | Opcode::MUL
                | Opcode::ADD
                | Opcode::POP
                | Opcode::PUSH
                | Opcode::CALL
                | Opcode::RET
        )
    }

    /// Instruction length, opcode byte included.
    #[inline]
    pub fn len(self) -> u8 {
        instruction_len(self.0)
    }
}

/// Decoded LS8 instruction.
///
/// Register operands are guaranteed to be in 0-7 once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Halt the CPU
    Hlt,

    /// Load immediate: R[reg] := value
    Ldi { reg: u8, value: u8 },

    /// Print R[reg] as a decimal integer
    Prn { reg: u8 },

    /// R[a] := R[a] * R[b] (mod 256)
    Mul { a: u8, b: u8 },

    /// R[a] := R[a] + R[b] (mod 256)
    Add { a: u8, b: u8 },

    /// R[reg] := pop()
    Pop { reg: u8 },

    /// push(R[reg])
    Push { reg: u8 },

    /// push(PC + 2); PC := R[reg]
    Call { reg: u8 },

    /// PC := pop()
    Ret,
}

impl Instruction {
    /// The opcode this instruction encodes to.
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Hlt => Opcode::HLT,
            Instruction::Ldi { .. } => Opcode::LDI,
            Instruction::Prn { .. } => Opcode::PRN,
            Instruction::Mul { .. } => Opcode::MUL,
            Instruction::Add { .. } => Opcode::ADD,
            Instruction::Pop { .. } => Opcode::POP,
            Instruction::Push { .. } => Opcode::PUSH,
            Instruction::Call { .. } => Opcode::CALL,
            Instruction::Ret => Opcode::RET,
        }
    }

    /// Whether this instruction sets the PC itself.
    pub fn sets_pc(&self) -> bool {
        matches!(self, Instruction::Call { .. } | Instruction::Ret)
    }
}

/// Decode the instruction whose opcode byte is `ir`.
///
/// `operand_a` and `operand_b` are the two bytes following the opcode.
/// They are always supplied, even for instructions that use fewer.
pub fn decode(ir: u8, operand_a: u8, operand_b: u8) -> Result<Instruction, DecodeError> {
    let opcode = Opcode(ir);
    let reg = |r: u8| -> Result<u8, DecodeError> {
        if (r as usize) < REGISTER_COUNT {
            Ok(r)
        } else {
            Err(DecodeError::InvalidRegister { opcode: ir, register: r })
        }
    };

    let instruction = match opcode {
        Opcode::HLT => Instruction::Hlt,
        Opcode::LDI => Instruction::Ldi { reg: reg(operand_a)?, value: operand_b },
        Opcode::PRN => Instruction::Prn { reg: reg(operand_a)? },
        Opcode::MUL => Instruction::Mul { a: reg(operand_a)?, b: reg(operand_b)? },
        Opcode::ADD => Instruction::Add { a: reg(operand_a)?, b: reg(operand_b)? },
        Opcode::POP => Instruction::Pop { reg: reg(operand_a)? },
        Opcode::PUSH => Instruction::Push { reg: reg(operand_a)? },
        Opcode::CALL => Instruction::Call { reg: reg(operand_a)? },
        Opcode::RET => Instruction::Ret,
        other => {
            return Err(match other.mnemonic() {
                Some(mnemonic) => DecodeError::Unimplemented { opcode: ir, mnemonic },
                None => DecodeError::Unrecognized(ir),
            })
        }
    };

    Ok(instruction)
}

/// Encode an instruction to its byte form.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let op = instr.opcode().0;
    match *instr {
        Instruction::Hlt | Instruction::Ret => vec![op],
        Instruction::Ldi { reg, value } => vec![op, reg, value],
        Instruction::Prn { reg }
        | Instruction::Pop { reg }
        | Instruction::Push { reg }
        | Instruction::Call { reg } => vec![op, reg],
        Instruction::Mul { a, b } | Instruction::Add { a, b } => vec![op, a, b],
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unrecognized instruction 0b{0:08b}")]
    Unrecognized(u8),

    #[error("unrecognized instruction 0b{opcode:08b} ({mnemonic} is not implemented)")]
    Unimplemented { opcode: u8, mnemonic: &'static str },

    #[error("invalid register R{register} for instruction 0b{opcode:08b}")]
    InvalidRegister { opcode: u8, register: u8 },
}
