//! CPU execution engine for the LS8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use std::io::Write;

use crate::cpu::{Memory, Registers};
use crate::cpu::alu::{alu, AluOp};
use crate::cpu::decode::{self, instruction_len, Instruction, DecodeError};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU encountered an error.
    Error,
}

/// The LS8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in the power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Create a CPU with `program` already loaded.
    pub fn with_program(program: &[u8]) -> Self {
        let mut cpu = Self::new();
        cpu.load_program(program);
        cpu
    }

    /// Reset the CPU to the power-on state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> usize {
        self.mem.load_program(program)
    }

    /// Execute a single instruction, writing any PRN output to `out`.
    ///
    /// Returns the instruction that was executed, or an error. A decode
    /// failure leaves registers and memory exactly as they were and moves
    /// the CPU to [`CpuState::Error`].
    pub fn step<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch. Both operand bytes are read regardless of the opcode.
        let pc = self.regs.pc;
        let ir = self.mem.read(pc);
        let len = instruction_len(ir);
        let operand_a = self.mem.read_offset(pc, 1);
        let operand_b = self.mem.read_offset(pc, 2);

        // Decode
        let instr = match decode::decode(ir, operand_a, operand_b) {
            Ok(instr) => instr,
            Err(source) => {
                self.state = CpuState::Error;
                return Err(CpuError::Decode { pc, source });
            }
        };
        log::trace!("{:02X}: {:?}", pc, instr);

        // Execute
        if let Err(e) = self.execute(instr, out) {
            self.state = CpuState::Error;
            return Err(e);
        }

        if !instr.sets_pc() {
            self.regs.advance_pc(len);
        }

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited<W: Write + ?Sized>(&mut self, out: &mut W, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction. Does not touch the PC except for
    /// CALL and RET.
    fn execute<W: Write + ?Sized>(&mut self, instr: Instruction, out: &mut W) -> Result<(), CpuError> {
        match instr {
            Instruction::Hlt => {
                self.state = CpuState::Halted;
            }

            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value);
            }

            Instruction::Prn { reg } => {
                writeln!(out, "{}", self.regs.get(reg))
                    .map_err(|e| CpuError::Output(e.to_string()))?;
            }

            Instruction::Mul { a, b } => alu(&mut self.regs, AluOp::Mul, a, b),

            Instruction::Add { a, b } => alu(&mut self.regs, AluOp::Add, a, b),

            Instruction::Pop { reg } => {
                let value = self.pop();
                self.regs.set(reg, value);
            }

            Instruction::Push { reg } => {
                let value = self.regs.get(reg);
                self.push(value);
            }

            Instruction::Call { reg } => {
                let return_addr = self.regs.pc.wrapping_add(2);
                self.push(return_addr);
                // Read after the push: CALL R7 jumps to the new SP.
                let target = self.regs.get(reg);
                self.regs.jump(target);
            }

            Instruction::Ret => {
                let target = self.pop();
                self.regs.jump(target);
            }
        }

        Ok(())
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("at PC=0x{pc:02X}: {source}")]
    Decode { pc: u8, source: DecodeError },

    #[error("output error: {0}")]
    Output(String),
}

impl CpuError {
    /// True for the "unrecognized instruction" family of failures.
    pub fn is_unrecognized_instruction(&self) -> bool {
        matches!(
            self,
            CpuError::Decode { source: DecodeError::Unrecognized(_) | DecodeError::Unimplemented { .. }, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::program::parse_program;
    use crate::cpu::decode::{encode, Opcode};
    use crate::cpu::registers::SP_INIT;

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    fn run_to_string(cpu: &mut Cpu) -> String {
        let mut out = Vec::new();
        cpu.run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = Cpu::with_program(&make_program(&[Instruction::Hlt]));
        let executed = cpu.run(&mut std::io::sink()).unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_ldi_prn_hlt() {
        for v in [0u8, 1, 8, 127, 255] {
            let mut cpu = Cpu::with_program(&make_program(&[
                Instruction::Ldi { reg: 3, value: v },
                Instruction::Prn { reg: 3 },
                Instruction::Hlt,
            ]));

            assert_eq!(run_to_string(&mut cpu), format!("{}\n", v));
            assert!(cpu.is_halted());
        }
    }

    #[test]
    fn test_add_wraps() {
        let mut cpu = Cpu::with_program(&make_program(&[
            Instruction::Ldi { reg: 0, value: 200 },
            Instruction::Ldi { reg: 1, value: 100 },
            Instruction::Add { a: 0, b: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
        ]));

        assert_eq!(run_to_string(&mut cpu), "44\n");
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let mut cpu = Cpu::with_program(&make_program(&[
            Instruction::Ldi { reg: 0, value: 0xAB },
            Instruction::Push { reg: 0 },
            Instruction::Pop { reg: 1 },
            Instruction::Hlt,
        ]));
        cpu.run(&mut std::io::sink()).unwrap();

        assert_eq!(cpu.regs.get(1), 0xAB);
        assert_eq!(cpu.regs.sp(), SP_INIT);
    }

    #[test]
    fn test_call_returns_past_call() {
        // 0: LDI R1,9   3: CALL R1   5: PRN R0   7: HLT   8: (pad)   9: RET
        let mut program = make_program(&[
            Instruction::Ldi { reg: 1, value: 9 },
            Instruction::Call { reg: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
        ]);
        program.push(0);
        program.extend(encode(&Instruction::Ret));
        assert_eq!(program.len(), 10);

        let mut cpu = Cpu::with_program(&program);
        let mut out = Vec::new();

        cpu.step(&mut out).unwrap();
        assert_eq!(cpu.step(&mut out).unwrap(), Instruction::Call { reg: 1 });
        assert_eq!(cpu.regs.pc, 9);
        assert_eq!(cpu.mem.read(SP_INIT - 1), 5);

        assert_eq!(cpu.step(&mut out).unwrap(), Instruction::Ret);
        assert_eq!(cpu.regs.pc, 5);
        assert_eq!(cpu.regs.sp(), SP_INIT);

        cpu.run(&mut out).unwrap();
        assert_eq!(out, b"0\n");
    }

    #[test]
    fn test_unrecognized_opcode_is_error() {
        let mut program = make_program(&[Instruction::Ldi { reg: 0, value: 5 }]);
        program.push(0xFF);
        let mut cpu = Cpu::with_program(&program);

        cpu.step(&mut std::io::sink()).unwrap();
        let regs = cpu.regs.clone();
        let mem = cpu.mem.as_slice().to_vec();

        let err = cpu.run(&mut std::io::sink()).unwrap_err();
        assert!(err.is_unrecognized_instruction());
        assert!(matches!(err, CpuError::Decode { pc: 3, source: DecodeError::Unrecognized(0xFF) }));
        assert_eq!(cpu.state, CpuState::Error);
        assert_eq!(cpu.regs, regs);
        assert_eq!(cpu.mem.as_slice(), &mem[..]);
    }

    #[test]
    fn test_reserved_opcode_is_error() {
        let mut cpu = Cpu::with_program(&[Opcode::JMP.0, 0]);
        let err = cpu.step(&mut std::io::sink()).unwrap_err();

        assert!(err.is_unrecognized_instruction());
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_step_after_halt() {
        let mut cpu = Cpu::with_program(&[Opcode::HLT.0]);
        cpu.run(&mut std::io::sink()).unwrap();

        let err = cpu.step(&mut std::io::sink()).unwrap_err();
        assert!(matches!(err, CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_hlt_still_advances_pc() {
        let mut cpu = Cpu::with_program(&[Opcode::HLT.0]);
        cpu.run(&mut std::io::sink()).unwrap();
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_pc_wraps_at_top_of_memory() {
        let mut cpu = Cpu::new();
        cpu.mem.write(0xFE, Opcode::LDI.0);
        cpu.mem.write(0xFF, 2);
        cpu.mem.write(0x00, 77);
        cpu.mem.write(0x01, Opcode::HLT.0);
        cpu.regs.jump(0xFE);

        cpu.run(&mut std::io::sink()).unwrap();
        assert_eq!(cpu.regs.get(2), 77);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_run_limited() {
        // LDI R1,3; CALL R1 loops forever, pushing return addresses.
        let mut cpu = Cpu::with_program(&make_program(&[
            Instruction::Ldi { reg: 1, value: 3 },
            Instruction::Call { reg: 1 },
        ]));

        let executed = cpu.run_limited(&mut std::io::sink(), 50).unwrap();
        assert_eq!(executed, 50);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_reset() {
        let mut cpu = Cpu::with_program(&[Opcode::HLT.0]);
        cpu.run(&mut std::io::sink()).unwrap();
        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.mem.read(0), 0);
        assert_eq!(cpu.regs.sp(), SP_INIT);
        assert_eq!(cpu.last_instruction(), None);
    }

    #[test]
    fn test_snapshot_with_short_memory_rejected() {
        let cpu = Cpu::with_program(&[Opcode::HLT.0]);
        let mut snapshot = serde_json::to_value(&cpu).unwrap();
        snapshot["mem"] = serde_json::json!([1]);

        assert!(serde_json::from_value::<Cpu>(snapshot).is_err());

        let restored: Cpu = serde_json::from_value(serde_json::to_value(&cpu).unwrap()).unwrap();
        assert_eq!(restored.mem.read(0), Opcode::HLT.0);
    }

    #[test]
    fn test_sample_programs() {
        let cases = [
            (include_str!("../../programs/print8.ls8"), "8\n"),
            (include_str!("../../programs/mult.ls8"), "72\n"),
            (include_str!("../../programs/stack.ls8"), "2\n4\n1\n"),
            (include_str!("../../programs/call.ls8"), "20\n30\n36\n60\n"),
        ];

        for (source, expected) in cases {
            let image = parse_program(source);
            let mut cpu = Cpu::with_program(&image.bytes);
            assert_eq!(run_to_string(&mut cpu), expected);
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::cpu::decode::encode;
    use proptest::prelude::*;

    // Straight-line instructions only, so every generated program halts.
    // Destinations exclude R7 so the stack pointer stays where the test
    // puts it.
    fn straight_line() -> impl Strategy<Value = Instruction> {
        let dst = 0u8..7;
        let src = 0u8..8;
        prop_oneof![
            (dst.clone(), any::<u8>()).prop_map(|(reg, value)| Instruction::Ldi { reg, value }),
            src.clone().prop_map(|reg| Instruction::Prn { reg }),
            (dst.clone(), src.clone()).prop_map(|(a, b)| Instruction::Mul { a, b }),
            (dst.clone(), src.clone()).prop_map(|(a, b)| Instruction::Add { a, b }),
            src.prop_map(|reg| Instruction::Push { reg }),
            dst.prop_map(|reg| Instruction::Pop { reg }),
        ]
    }

    proptest! {
        #[test]
        fn straight_line_programs_halt(instrs in prop::collection::vec(straight_line(), 0..40)) {
            let mut program: Vec<u8> = instrs.iter().flat_map(encode).collect();
            program.push(decode::Opcode::HLT.0);
            let end = program.len() as u8;

            // At most 40 stack operations from 0xC0 never reach the program text.
            let mut cpu = Cpu::with_program(&program);
            cpu.regs.set_sp(0xC0);
            let mut out = Vec::new();
            let executed = cpu.run_limited(&mut out, 1000).unwrap();

            prop_assert!(cpu.is_halted());
            prop_assert_eq!(executed, instrs.len() as u64 + 1);
            prop_assert_eq!(cpu.regs.pc, end);

            let prints = instrs.iter().filter(|i| matches!(i, Instruction::Prn { .. })).count();
            let text = String::from_utf8(out).unwrap();
            prop_assert_eq!(text.lines().count(), prints);
            for line in text.lines() {
                prop_assert!(line.parse::<u8>().is_ok());
            }
        }

        #[test]
        fn push_pop_restores_sp(value in any::<u8>(), sp in any::<u8>()) {
            let mut cpu = Cpu::new();
            cpu.regs.set_sp(sp);

            cpu.push(value);
            prop_assert_eq!(cpu.regs.sp(), sp.wrapping_sub(1));
            prop_assert_eq!(cpu.pop(), value);
            prop_assert_eq!(cpu.regs.sp(), sp);
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut cpu = Cpu::with_program(&bytes);
            let _ = cpu.run_limited(&mut std::io::sink(), 2000);
            prop_assert!(cpu.state != CpuState::Running || cpu.cycles == 2000);
        }
    }
}
