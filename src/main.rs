//! LS8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu <program>` - Run an .ls8 file
//! - `ls8-emu run <program>` - Run with tracing / cycle limit / state dump
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu asm <source>` - Assemble to .ls8
//! - `ls8-emu disasm <program>` - Disassemble .ls8
//! - `ls8-emu test` - Built-in self-test

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::debug;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version)]
#[command(about = "An emulator for the LS8 eight-bit teaching computer")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Path to an .ls8 program to run
    program: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 file to execute
        program: PathBuf,
        /// Stop after this many instructions
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Trace each instruction to stderr
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(short, long)]
        dump_state: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .ls8 file to debug
        program: PathBuf,
    },
    /// Assemble mnemonic source to .ls8
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output .ls8 file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble an .ls8 file
    Disasm {
        /// Path to the .ls8 file
        program: PathBuf,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match (cli.command, cli.program) {
        (Some(Commands::Run { program, max_cycles, trace, dump_state }), _) => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        (Some(Commands::Debug { program }), _) => {
            debug_program(&program);
        }
        (Some(Commands::Asm { source, output }), _) => {
            assemble_file(&source, output);
        }
        (Some(Commands::Disasm { program }), _) => {
            disassemble_file(&program);
        }
        (Some(Commands::Test), _) => {
            run_self_test();
        }
        (None, Some(program)) => {
            run_program(&program, None, false, false);
        }
        (None, None) => {
            println!("usage: ls8-emu <program.ls8>");
            println!();
            println!("Use --help for available commands");
            std::process::exit(1);
        }
    }
}

/// Load an image or exit with status 1.
fn load_or_exit(path: &Path) -> Vec<u8> {
    use ls8::{load_program, ProgramError};

    let image = match load_program(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if image.is_empty() {
        eprintln!("{}: {}", path.display(), ProgramError::Empty);
        std::process::exit(1);
    }

    debug!("loaded {} bytes from {}", image.len(), path.display());
    image.bytes
}

fn run_program(path: &Path, max_cycles: Option<u64>, trace: bool, dump_state: bool) {
    use ls8::Cpu;
    use ls8::asm::disasm::format_instruction;

    let program = load_or_exit(path);
    let mut cpu = Cpu::with_program(&program);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let limit = max_cycles.unwrap_or(u64::MAX);

    while cpu.is_running() && cpu.cycles < limit {
        let pc = cpu.regs.pc;

        match cpu.step(&mut out) {
            Ok(instr) => {
                if trace {
                    eprintln!("{:02X}: {:<12} R={:02X?} SP={:02X}",
                        pc, format_instruction(&instr), cpu.regs.r, cpu.regs.sp());
                }
            }
            Err(e) => {
                debug!("stopped at PC={:02X} after {} cycles", pc, cpu.cycles);
                let _ = report_cpu_error(&e, &mut out, &mut std::io::stderr());
                let _ = out.flush();
                std::process::exit(1);
            }
        }
    }
    let _ = out.flush();

    if cpu.is_running() {
        eprintln!("Reached max cycles limit ({}).", limit);
    }

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Report a fatal CPU error once: the classic message on stdout for an
/// unrecognized instruction, the error text on stderr for anything else.
fn report_cpu_error<O: Write, E: Write>(
    e: &ls8::CpuError,
    out: &mut O,
    err: &mut E,
) -> std::io::Result<()> {
    if e.is_unrecognized_instruction() {
        writeln!(out, "unrecognized instruction")
    } else {
        writeln!(err, "{}", e)
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &Path) {
    let program = load_or_exit(path);

    if let Err(e) = ls8::run_debugger(program) {
        eprintln!("Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &Path) {
    eprintln!("This build does not include the debugger (enable the `tui` feature).");
    std::process::exit(1);
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>) {
    use ls8::{assemble, save_program};

    let out_path = output.unwrap_or_else(|| source_path.with_extension("ls8"));

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", source_path.display(), e);
            std::process::exit(1);
        }
    };

    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = save_program(&out_path, &bytes) {
        eprintln!("Failed to save {}: {}", out_path.display(), e);
        std::process::exit(1);
    }

    println!("Assembled {} bytes → {}", bytes.len(), out_path.display());
}

fn disassemble_file(path: &Path) {
    use ls8::disassemble;

    let program = load_or_exit(path);
    print!("{}", disassemble(&program));
}

/// Assemble a self-test program, naming the check if it does not assemble.
fn assembled(name: &str, source: &str) -> Result<Vec<u8>, String> {
    ls8::assemble(source).map_err(|e| format!("{} failed to assemble: {}", name, e))
}

fn run_self_test() {
    use ls8::{Cpu, Instruction, Opcode};
    use ls8::cpu::decode::encode;

    println!("━━━ LS8 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool, detail: String| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗ ({})", name, detail);
            failed += 1;
        }
    };

    let run = |program: &[u8]| -> (Cpu, Result<u64, ls8::CpuError>, String) {
        let mut cpu = Cpu::with_program(program);
        let mut out = Vec::new();
        let result = cpu.run_limited(&mut out, 10_000);
        (cpu, result, String::from_utf8_lossy(&out).into_owned())
    };

    // LDI / PRN / HLT
    let program: Vec<u8> = [
        Instruction::Ldi { reg: 0, value: 8 },
        Instruction::Prn { reg: 0 },
        Instruction::Hlt,
    ].iter().flat_map(encode).collect();
    let (cpu, _, out) = run(&program);
    check("LDI/PRN/HLT", cpu.is_halted() && out == "8\n", format!("got {:?}", out));

    // Arithmetic wraps modulo 256
    match assembled("ADD", "LDI R0,200\nLDI R1,100\nADD R0,R1\nPRN R0\nHLT") {
        Ok(program) => {
            let (_, _, out) = run(&program);
            check("ADD wraps modulo 256", out == "44\n", format!("got {:?}", out));
        }
        Err(e) => check("ADD wraps modulo 256", false, e),
    }

    match assembled("MUL", "LDI R0,8\nLDI R1,9\nMUL R0,R1\nPRN R0\nHLT") {
        Ok(program) => {
            let (_, _, out) = run(&program);
            check("MUL", out == "72\n", format!("got {:?}", out));
        }
        Err(e) => check("MUL", false, e),
    }

    // Stack
    match assembled("PUSH/POP", "LDI R0,99\nPUSH R0\nPOP R1\nPRN R1\nHLT") {
        Ok(program) => {
            let (cpu, _, out) = run(&program);
            check("PUSH/POP round-trip", out == "99\n" && cpu.regs.sp() == 0xF4,
                format!("got {:?}, SP={:02X}", out, cpu.regs.sp()));
        }
        Err(e) => check("PUSH/POP round-trip", false, e),
    }

    // CALL / RET
    match assembled("CALL/RET", "LDI R1,SUB\nCALL R1\nPRN R0\nHLT\nSUB: LDI R0,7\nRET") {
        Ok(program) => {
            let (_, _, out) = run(&program);
            check("CALL/RET", out == "7\n", format!("got {:?}", out));
        }
        Err(e) => check("CALL/RET", false, e),
    }

    // Unrecognized instruction is a typed error
    let (cpu, result, _) = run(&[Opcode::JMP.0, 0]);
    let ok = matches!(&result, Err(e) if e.is_unrecognized_instruction()) && !cpu.is_running();
    check("Unrecognized instruction", ok, format!("got {:?}", result));

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
