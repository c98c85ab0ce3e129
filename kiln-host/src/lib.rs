//! Host side of the Kiln VM
//!
//! This crate provides the pieces that surround the interpreter: loading a
//! program image from disk, turning execution events into console text, and
//! formatting register and stack dumps.
#![warn(missing_docs)]
use std::io::Write;

mod console;
pub mod dump;
pub mod image;

pub use console::Console;
pub use image::{ImageLoadError, load};

/// Text accumulated by the [`Console`]
#[derive(Default)]
pub struct Output {
    /// Diagnostic text, one line per reported event
    pub stdout: Vec<u8>,
}

impl Output {
    /// Prints `stdout` to the console
    pub fn print(&self) -> std::io::Result<()> {
        if !self.stdout.is_empty() {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&self.stdout)?;
            stdout.flush()?;
        }
        Ok(())
    }

    /// Returns the accumulated text, replacing invalid UTF-8
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}
