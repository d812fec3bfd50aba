//! Disassembler for LS8 programs.
//!
//! Converts program bytes back to readable assembly.

use crate::cpu::decode::{decode, instruction_len, DecodeError, Instruction, Opcode};
use crate::cpu::Memory;

/// Disassemble the instruction starting at `addr`.
///
/// Returns the text and the number of bytes it covers. Operand bytes
/// wrap past the top of memory the same way the CPU fetches them.
pub fn disassemble_at(mem: &Memory, addr: u8) -> (String, u8) {
    let ir = mem.read(addr);
    let a = mem.read_offset(addr, 1);
    let b = mem.read_offset(addr, 2);
    (disassemble_bytes(ir, a, b), listing_len(ir))
}

/// Bytes one listing entry covers. A byte outside the opcode map is shown
/// as a lone `DB`, so it covers only itself.
fn listing_len(ir: u8) -> u8 {
    match Opcode(ir).mnemonic() {
        Some(_) => instruction_len(ir),
        None => 1,
    }
}

/// Disassemble one instruction from its opcode and the two following bytes.
pub fn disassemble_bytes(ir: u8, a: u8, b: u8) -> String {
    match decode(ir, a, b) {
        Ok(instr) => format_instruction(&instr),
        Err(DecodeError::Unimplemented { mnemonic, .. }) => {
            let operands = match instruction_len(ir) {
                1 => String::new(),
                2 => format!(" {}", a),
                _ => format!(" {},{}", a, b),
            };
            format!("{}{} ; unimplemented", mnemonic, operands)
        }
        Err(_) => match Opcode(ir).mnemonic() {
            Some(mnemonic) => format!("{} ??? ; bad register", mnemonic),
            None => format!("DB 0x{:02X}", ir),
        },
    }
}

/// Disassemble a whole program image.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS8 Disassembly\n");
    output.push_str("; ---------------\n\n");

    let mut addr = 0usize;
    while addr < bytes.len() {
        let ir = bytes[addr];
        let a = bytes.get(addr + 1).copied().unwrap_or(0);
        let b = bytes.get(addr + 2).copied().unwrap_or(0);
        let len = (listing_len(ir) as usize).min(bytes.len() - addr);

        let raw: Vec<String> = bytes[addr..addr + len]
            .iter()
            .map(|byte| format!("{:02X}", byte))
            .collect();
        output.push_str(&format!(
            "{:02X}: {:<9} {}\n",
            addr,
            raw.join(" "),
            disassemble_bytes(ir, a, b)
        ));

        addr += len;
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Hlt => "HLT".to_string(),
        Instruction::Ldi { reg, value } => format!("LDI R{},{}", reg, value),
        Instruction::Prn { reg } => format!("PRN R{}", reg),
        Instruction::Mul { a, b } => format!("MUL R{},R{}", a, b),
        Instruction::Add { a, b } => format!("ADD R{},R{}", a, b),
        Instruction::Pop { reg } => format!("POP R{}", reg),
        Instruction::Push { reg } => format!("PUSH R{}", reg),
        Instruction::Call { reg } => format!("CALL R{}", reg),
        Instruction::Ret => "RET".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_ldi() {
        assert_eq!(disassemble_bytes(Opcode::LDI.0, 0, 8), "LDI R0,8");
    }

    #[test]
    fn test_disassemble_reserved() {
        let text = disassemble_bytes(Opcode::CMP.0, 0, 1);
        assert_eq!(text, "CMP 0,1 ; unimplemented");
    }

    #[test]
    fn test_disassemble_unknown() {
        assert_eq!(disassemble_bytes(0, 0, 0), "DB 0x00");
    }

    #[test]
    fn test_disassemble_at_wraps() {
        let mut mem = Memory::new();
        mem.write(0xFF, Opcode::PRN.0);
        mem.write(0x00, 4);

        let (text, len) = disassemble_at(&mem, 0xFF);
        assert_eq!(text, "PRN R4");
        assert_eq!(len, 2);
    }

    #[test]
    fn test_disassemble_listing() {
        let bytes = [Opcode::LDI.0, 0, 8, Opcode::PRN.0, 0, Opcode::HLT.0];
        let listing = disassemble(&bytes);

        assert!(listing.contains("00: 82 00 08  LDI R0,8"));
        assert!(listing.contains("03: 47 00     PRN R0"));
        assert!(listing.contains("05: 01        HLT"));
    }

    #[test]
    fn test_unknown_byte_covers_one_byte() {
        let bytes = [0xFF, Opcode::LDI.0, 0, 8, Opcode::HLT.0];
        let listing = disassemble(&bytes);

        assert!(listing.contains("00: FF        DB 0xFF"));
        assert!(listing.contains("01: 82 00 08  LDI R0,8"));
        assert!(listing.contains("04: 01        HLT"));

        let mut mem = Memory::new();
        mem.write(0, 0xFF);
        assert_eq!(disassemble_at(&mem, 0), ("DB 0xFF".to_string(), 1));
    }
}
