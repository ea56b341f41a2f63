//! Clipboard sinks for "Copy CSV".
//!
//! The terminal clipboard is reached through the OSC 52 escape sequence.
//! When copying fails the caller falls back to showing the CSV for manual
//! copying.

use crate::error::{LedgerError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Write;

/// Many terminals drop OSC 52 payloads beyond this size
pub const OSC52_MAX_PAYLOAD: usize = 100_000;

pub trait Clipboard {
    fn copy(&mut self, text: &str) -> Result<()>;
}

/// Writes `ESC ] 52 ; c ; <base64> BEL` to the terminal
pub struct Osc52Clipboard<W: Write> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn copy(&mut self, text: &str) -> Result<()> {
        let payload = STANDARD.encode(text.as_bytes());
        if payload.len() > OSC52_MAX_PAYLOAD {
            return Err(LedgerError::Clipboard(format!(
                "{} bytes is too large for the terminal clipboard",
                text.len()
            )));
        }

        write!(self.out, "\x1b]52;c;{}\x07", payload)
            .and_then(|_| self.out.flush())
            .map_err(|e| LedgerError::Clipboard(e.to_string()))
    }
}
