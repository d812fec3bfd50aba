//! Arithmetic logic unit.
//!
//! Register-to-register binary operations. The result always replaces the
//! first register. All arithmetic is on unsigned bytes and wraps.

use serde::{Serialize, Deserialize};

use crate::cpu::Registers;

/// ALU operation selector.
///
/// Only `Mul` and `Add` are wired to instructions. The rest are named slots
/// for the CMP and bitwise opcodes; selecting one leaves the registers
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Mul,
    Add,
    Cmp,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Mod,
}

impl AluOp {
    /// Whether `alu` computes anything for this operation.
    pub fn is_implemented(self) -> bool {
        matches!(self, AluOp::Mul | AluOp::Add)
    }
}

/// Apply `op` to R[a] and R[b], storing the result in R[a].
pub fn alu(regs: &mut Registers, op: AluOp, a: u8, b: u8) {
    let lhs = regs.get(a);
    let rhs = regs.get(b);

    match op {
        AluOp::Mul => regs.set(a, lhs.wrapping_mul(rhs)),
        AluOp::Add => regs.set(a, lhs.wrapping_add(rhs)),
        _ => log::warn!("ALU operation {:?} is not implemented; R{} unchanged", op, a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_wraps() {
        let mut regs = Registers::new();
        regs.set(0, 200);
        regs.set(1, 100);

        alu(&mut regs, AluOp::Add, 0, 1);
        assert_eq!(regs.get(0), 44);
        assert_eq!(regs.get(1), 100);
    }

    #[test]
    fn test_mul_wraps() {
        let mut regs = Registers::new();
        regs.set(2, 16);
        regs.set(3, 17);

        alu(&mut regs, AluOp::Mul, 2, 3);
        assert_eq!(regs.get(2), (16u32 * 17 % 256) as u8);
    }

    #[test]
    fn test_same_register_operands() {
        let mut regs = Registers::new();
        regs.set(4, 9);

        alu(&mut regs, AluOp::Mul, 4, 4);
        assert_eq!(regs.get(4), 81);
    }

    #[test]
    fn test_unwired_ops_are_noops() {
        let mut regs = Registers::new();
        regs.set(0, 0b1100);
        regs.set(1, 0b1010);
        let before = regs.clone();

        for op in [AluOp::Cmp, AluOp::And, AluOp::Or, AluOp::Xor, AluOp::Not, AluOp::Shl, AluOp::Shr, AluOp::Mod] {
            assert!(!op.is_implemented());
            alu(&mut regs, op, 0, 1);
        }
        assert_eq!(regs, before);
    }
}
