use crate::SimResult;
use std::any::Any;
use std::io::{self, Write};

pub const UCSRA: u64 = 0x00;
pub const UDR: u64 = 0x06;
/// Data register empty.
pub const UDRE: u8 = 1 << 5;

/// USART0 transmitter. Bytes written to UDR0 are collected into lines and
/// optionally mirrored to stdout.
#[derive(Debug, Default)]
pub struct Uart {
    echo: bool,
    pending: String,
    lines: Vec<String>,
}

impl Uart {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            ..Default::default()
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Everything transmitted so far, including an unterminated last line.
    pub fn output(&self) -> String {
        let mut out = self.lines.join("\n");
        if !self.pending.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.pending);
        }
        out
    }

    fn transmit(&mut self, byte: u8) {
        if self.echo {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(&[byte]);
            let _ = stdout.flush();
        }

        match byte {
            b'\r' => {}
            b'\n' => self.lines.push(std::mem::take(&mut self.pending)),
            _ => self.pending.push(byte as char),
        }
    }
}

impl crate::Peripheral for Uart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        match offset {
            UCSRA => Ok(UDRE), // Always ready
            _ => Ok(0),
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == UDR {
            self.transmit(value);
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
