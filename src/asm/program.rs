//! `.ls8` program image format.
//!
//! An `.ls8` file is plain text:
//! - Each line that starts with binary digits yields one byte
//! - Anything after the digits (usually a `#` comment) is ignored
//! - Lines with no leading binary digit (blank, comment-only) are skipped
//!   and do not take up an address
//!
//! Bytes are loaded in file order at addresses 0, 1, 2, ...

use std::path::Path;
use std::io::Write;
use thiserror::Error;

/// A parsed program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// The bytes to load, address order.
    pub bytes: Vec<u8>,
    /// Source line each byte came from (for the debugger).
    pub source_lines: Vec<String>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an image from raw bytes with no source text.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            source_lines: bytes.iter().map(|b| format!("{:08b}", b)).collect(),
        }
    }

    /// Add a byte.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse the leading binary literal of a line.
///
/// Leading whitespace is skipped, then the longest run of `0`/`1` is taken
/// as the value and only its low 8 bits are kept. A run too large for 64
/// bits saturates, so it reads as `0xFF`. Returns `None` if the line does
/// not start with a binary digit.
///
/// Works on raw bytes so lines that are not UTF-8 still parse.
pub fn parse_line<L: AsRef<[u8]>>(line: L) -> Option<u8> {
    let line = line.as_ref();
    let start = line
        .iter()
        .position(|&b| !(b.is_ascii_whitespace() || b == 0x0B))
        .unwrap_or(line.len());
    let digits = &line[start..];
    let run = digits
        .iter()
        .take_while(|b| matches!(b, b'0' | b'1'))
        .count();

    if run == 0 {
        return None;
    }

    let significant = digits[..run]
        .iter()
        .skip_while(|&&b| b == b'0')
        .count();
    if significant > 64 {
        return Some(0xFF);
    }

    let value = digits[..run]
        .iter()
        .fold(0u8, |acc, &b| (acc << 1) | (b - b'0'));
    Some(value)
}

/// Parse `.ls8` source text into an image. Never fails: lines that do
/// not parse are skipped.
pub fn parse_program(source: &str) -> ProgramImage {
    let mut image = ProgramImage::new();

    for line in source.lines() {
        if let Some(byte) = parse_line(line) {
            image.push(byte, line.trim());
        }
    }

    image
}

/// Load an `.ls8` file from disk.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ProgramError> {
    let path = path.as_ref();
    let text = std::fs::read(path)
        .map_err(|e| ProgramError::Io(format!("{}: {}", path.display(), e)))?;

    let mut image = ProgramImage::new();
    for line in text.split(|&b| b == b'\n') {
        if let Some(byte) = parse_line(line) {
            image.push(byte, String::from_utf8_lossy(line).trim());
        }
    }

    log::debug!("parsed {} bytes from {}", image.len(), path.display());
    Ok(image)
}

/// Save bytes as an `.ls8` file, one byte per line with its address.
pub fn save_program<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), ProgramError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ProgramError::Io(e.to_string()))?;

    write_program(&mut file, bytes).map_err(|e| ProgramError::Io(e.to_string()))
}

/// Write bytes in `.ls8` format.
pub fn write_program<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writeln!(out, "# LS8 program, {} bytes", bytes.len())?;
    writeln!(out)?;

    for (addr, byte) in bytes.iter().enumerate() {
        writeln!(out, "{:08b} # {:02X}", byte, addr)?;
    }

    Ok(())
}

/// Errors that can occur while reading or writing program images.
#[derive(Debug, Clone, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("program image is empty")]
    Empty,
}
