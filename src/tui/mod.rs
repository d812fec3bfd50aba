//! TUI debugger for the LS8 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register file and flags view
//! - Memory hex view with PC and SP highlighted
//! - Step/run/breakpoint controls
//! - Disassembly from the PC and captured program output

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
