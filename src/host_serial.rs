//! UART0's host-side endpoints: the default stdout console and the optional
//! `--serial` bridge to a real host serial device. Both are plain
//! [`UartSink`] implementations — `Uart` itself knows nothing about stdio or
//! serial ports, only about writing a byte somewhere.

use std::io::Write;
use std::path::Path;

use rp2040_core::error::{EmulatorError, Result};
use rp2040_core::peripherals::uart::UartSink;

const DEFAULT_BAUD: u32 = 115_200;

/// Forwards every `DR` write straight to the process's stdout, unbuffered so
/// firmware output appears immediately rather than waiting on a line flush.
#[derive(Default)]
pub struct StdoutSink;

impl UartSink for StdoutSink {
    fn write_byte(&mut self, byte: u8) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(&[byte]);
        let _ = stdout.flush();
    }
}

/// Bridges UART0 to a real host serial device opened from `--serial`.
pub struct HostSerial {
    port: Box<dyn serialport::SerialPort>,
}

impl HostSerial {
    pub fn open(path: &Path) -> Result<Self> {
        let port = serialport::new(path.to_string_lossy(), DEFAULT_BAUD)
            .open()
            .map_err(|source| EmulatorError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, source),
            })?;
        Ok(Self { port })
    }
}

impl UartSink for HostSerial {
    fn write_byte(&mut self, byte: u8) {
        if let Err(error) = self.port.write_all(&[byte]) {
            tracing::warn!(%error, "failed to write a byte to the host serial device");
        }
    }
}
