// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! UART-like console devices backed by `std::io::Write`.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crashlog::device::{CharDevice, OpenFlags};
use crashlog::error::DeviceResult;

/// A serial console. In `STREAM` mode every `\n` goes out as `\r\n`.
pub struct UartConsole<W> {
    name: String,
    out: Mutex<W>,
    flags: AtomicU16,
}

impl<W: Write + Send> UartConsole<W> {
    pub fn new(name: &str, out: W) -> Self {
        Self {
            name: name.to_string(),
            out: Mutex::new(out),
            flags: AtomicU16::new((OpenFlags::RDWR | OpenFlags::INT_RX).bits()),
        }
    }

    fn emit(&self, buf: &[u8]) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if self.open_flags().contains(OpenFlags::STREAM) {
            for line in buf.split_inclusive(|&b| b == b'\n') {
                match line.split_last() {
                    Some((&b'\n', body)) => {
                        out.write_all(body)?;
                        out.write_all(b"\r\n")?;
                    }
                    _ => out.write_all(line)?,
                }
            }
        } else {
            out.write_all(buf)?;
        }
        out.flush()
    }
}

impl UartConsole<io::Stdout> {
    pub fn stdout(name: &str) -> Self {
        Self::new(name, io::stdout())
    }
}

impl<W: Write + Send> CharDevice for UartConsole<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, _pos: usize, buf: &[u8]) -> usize {
        match self.emit(buf) {
            Ok(()) => buf.len(),
            Err(_) => 0,
        }
    }

    fn open(&self, flags: OpenFlags) -> DeviceResult<()> {
        self.set_open_flags(flags);
        Ok(())
    }

    fn open_flags(&self) -> OpenFlags {
        OpenFlags::from_bits_truncate(self.flags.load(Ordering::SeqCst))
    }

    fn set_open_flags(&self, flags: OpenFlags) {
        self.flags.store(flags.bits(), Ordering::SeqCst);
    }
}

/// Shared in-memory output, used to capture what a console printed.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_mode_translates_newlines() {
        let buf = SharedBuffer::new();
        let uart = UartConsole::new("uart0", buf.clone());

        uart.write(0, b"raw\n");
        uart.set_open_flags(uart.open_flags() | OpenFlags::STREAM);
        assert_eq!(uart.write(0, b"a\nb\n\nc"), 6);

        assert_eq!(buf.contents(), b"raw\na\r\nb\r\n\r\nc".to_vec());
    }

    #[test]
    fn test_open_sets_flags() {
        let uart = UartConsole::new("uart0", SharedBuffer::new());
        assert!(uart.open_flags().contains(OpenFlags::INT_RX));
        uart.open(OpenFlags::WRONLY).unwrap();
        assert_eq!(uart.open_flags(), OpenFlags::WRONLY);
        assert!(uart.read(0, &mut [0u8; 4]).is_err());
    }
}
