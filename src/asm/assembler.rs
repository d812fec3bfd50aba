//! Simple assembler for LS8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (# works too)
//!         LDI R0,10       ; Register and immediate operands
//!         LDI R1,DOUBLE   ; A label as an immediate
//!         CALL R1
//!         HLT
//! DOUBLE: ADD R0,R0       ; Define a label
//!         PRN R0
//!         RET
//!         DB 0x2A         ; Define a data byte
//! ```
//!
//! Every mnemonic in the LS8 opcode map is accepted, including the ones
//! the CPU does not execute. The operand count comes from the opcode's top
//! two bits.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::REGISTER_COUNT;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Pending references: (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Patch label references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let line = match line.find(|c: char| c == ';' || c == '#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("bad label '{}'", &line[..colon_idx]),
                });
            }
            if self.symbols.insert(label.clone(), self.output.len()).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, r)) => (m.to_uppercase(), r.trim()),
            None => (line.to_uppercase(), ""),
        };
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        if mnemonic == "DB" {
            if operands.is_empty() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "DB requires a value".into(),
                });
            }
            for op in operands {
                self.emit_operand(op, line_num)?;
            }
            return Ok(());
        }

        let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
            AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
        })?;

        let expected = (opcode.len() - 1) as usize;
        if operands.len() != expected {
            return Err(AssemblerError::OperandCount {
                line: line_num,
                mnemonic,
                expected,
                found: operands.len(),
            });
        }

        self.output.push(opcode.0);
        for op in operands {
            self.emit_operand(op, line_num)?;
        }

        Ok(())
    }

    /// Emit one operand byte: a register, a number, or a label.
    fn emit_operand(&mut self, operand: &str, line_num: usize) -> Result<(), AssemblerError> {
        if operand.is_empty() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: "empty operand".into(),
            });
        }

        if let Some(reg) = parse_register(operand) {
            if reg as usize >= REGISTER_COUNT {
                return Err(AssemblerError::InvalidRegister {
                    line: line_num,
                    register: operand.to_string(),
                });
            }
            self.output.push(reg);
            return Ok(());
        }

        if let Some(value) = parse_number(operand) {
            let byte = u8::try_from(value)
                .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })?;
            self.output.push(byte);
            return Ok(());
        }

        if operand.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid number '{}'", operand),
            });
        }

        // Label reference, patched in pass 2
        self.pending.push((self.output.len(), operand.to_uppercase(), line_num));
        self.output.push(0);
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = *self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;

            self.output[*out_idx] = u8::try_from(addr).map_err(|_| AssemblerError::ValueOutOfRange {
                line: *line_num,
                value: addr as i64,
            })?;
        }
        Ok(())
    }
}

/// `R0`..`R7` (any case). Returns the digit even if it is out of range.
fn parse_register(operand: &str) -> Option<u8> {
    let rest = operand.strip_prefix(['R', 'r'])?;
    rest.parse::<u8>().ok()
}

/// Decimal, `0x` hex or `0b` binary.
fn parse_number(operand: &str) -> Option<i64> {
    let lower = operand.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse::<i64>().ok()
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    OperandCount { line: usize, mnemonic: String, expected: usize, found: usize },

    #[error("invalid register on line {line}: {register}")]
    InvalidRegister { line: usize, register: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}
