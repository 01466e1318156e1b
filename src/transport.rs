//! The byte transport a [`Master`](crate::master::Master) talks through.
//!
//! The protocol code never configures the serial line itself, it only needs
//! the handful of operations in [`Transport`]. A `serialport` backed
//! implementation is available with the `serial` feature.

use std::io::{self, ErrorKind, Read};

/// Half-duplex byte transport to one or more devices.
pub trait Transport {
    /// (Re)open the underlying port.
    fn open(&mut self) -> io::Result<()>;

    /// Close the port. Closing a closed port does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Discard any received but unread data.
    fn reset_input_buffer(&mut self) -> io::Result<()>;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read until `terminator` is received, `max_len` bytes have been read
    /// or the transport read timeout expires. The terminator is included in
    /// the returned data. A timeout isn't an error, it returns the data
    /// received so far, which may be empty.
    fn read_until(&mut self, terminator: u8, max_len: usize) -> io::Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> io::Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        (**self).reset_input_buffer()
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read_until(&mut self, terminator: u8, max_len: usize) -> io::Result<Vec<u8>> {
        (**self).read_until(terminator, max_len)
    }
}

/// [`Transport::read_until`] for any blocking reader with a read timeout.
///
/// Reads one byte at a time so nothing after the terminator is consumed.
pub fn read_until<R: Read + ?Sized>(
    reader: &mut R,
    terminator: u8,
    max_len: usize,
) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(max_len);
    let mut byte = [0];
    while data.len() < max_len {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                data.push(byte[0]);
                if byte[0] == terminator {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(data)
}

#[cfg(feature = "serial")]
pub mod serial {
    //! Serial port transport.

    use std::io::{self, ErrorKind, Write};
    use std::time::Duration;

    use log::info;
    use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

    use super::Transport;

    /// Line settings for [`SerialTransport`].
    #[derive(Debug, Clone)]
    pub struct SerialConfig {
        pub path: String,
        pub baud_rate: u32,
        pub data_bits: DataBits,
        pub parity: Parity,
        pub stop_bits: StopBits,
        /// Read timeout, bounds how long a transaction waits for a reply.
        pub timeout: Duration,
    }

    impl SerialConfig {
        pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
            Self {
                path: path.into(),
                baud_rate,
                ..Self::default()
            }
        }
    }

    impl Default for SerialConfig {
        fn default() -> Self {
            Self {
                path: String::from("/dev/ttyUSB0"),
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                parity: Parity::None,
                stop_bits: StopBits::One,
                timeout: Duration::from_secs(1),
            }
        }
    }

    /// A [`Transport`] on a local serial port. Created closed.
    pub struct SerialTransport {
        config: SerialConfig,
        port: Option<Box<dyn SerialPort>>,
    }

    impl SerialTransport {
        pub fn new(config: SerialConfig) -> Self {
            Self { config, port: None }
        }

        pub fn config(&self) -> &SerialConfig {
            &self.config
        }

        fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
            self.port
                .as_mut()
                .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "serial port is closed"))
        }
    }

    impl Transport for SerialTransport {
        fn open(&mut self) -> io::Result<()> {
            let port = serialport::new(&self.config.path, self.config.baud_rate)
                .data_bits(self.config.data_bits)
                .parity(self.config.parity)
                .stop_bits(self.config.stop_bits)
                .timeout(self.config.timeout)
                .open()?;
            info!("Opened port {} at {} baud", self.config.path, self.config.baud_rate);
            self.port = Some(port);
            Ok(())
        }

        fn close(&mut self) {
            if self.port.take().is_some() {
                info!("Closed port {}", self.config.path);
            }
        }

        fn is_open(&self) -> bool {
            self.port.is_some()
        }

        fn reset_input_buffer(&mut self) -> io::Result<()> {
            self.port()?.clear(ClearBuffer::Input)?;
            Ok(())
        }

        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            let port = self.port()?;
            port.write_all(data)?;
            port.flush()
        }

        fn read_until(&mut self, terminator: u8, max_len: usize) -> io::Result<Vec<u8>> {
            super::read_until(self.port()?, terminator, max_len)
        }
    }
}
