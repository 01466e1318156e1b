//! Bus master transaction engine.
//!
//! A [`Master`] owns the transport of one connection. Every call to
//! [`Master::execute`] is one complete transaction: a frame is built and
//! sent, and the reply is read back and validated, all while holding the
//! connection lock. Transactions from different threads never interleave
//! on the bus.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use snafu::{ensure, ResultExt, Snafu};

use crate::frame::{self, Frame, FrameKind, Payload, MAX_RAW_LEN, STOP_MARKER};
use crate::transport::Transport;
use crate::types::{self, Address, AddressLen, NameHash};
use crate::value::UnpackError;

/// Error type for transactions and the device operations built on them.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The transport failed.
    #[snafu(display("Serial I/O error: {}", source))]
    Io { source: io::Error },
    /// The read timed out before any data arrived.
    #[snafu(display("No data received from the device"))]
    NoData,
    /// The reply is for a different parameter than the request.
    #[snafu(display("Hash mismatch, sent {}, received {}", sent, received))]
    HashMismatch { sent: NameHash, received: NameHash },
    /// The reply isn't a valid frame.
    #[snafu(display("Invalid frame: {}", source))]
    Frame { source: frame::Error },
    /// Invalid parameter name or address.
    #[snafu(display("{}", source))]
    Types { source: types::Error },
    /// The reply payload doesn't hold a value of the requested type.
    #[snafu(display("{}", source))]
    Unpack { source: UnpackError },
    /// A setting read from the device has no known meaning.
    #[snafu(display("Value {} of parameter {:?} is out of range", value, name))]
    OutOfRange { name: &'static str, value: i16 },
}

impl Error {
    /// True for structural and transport errors, false for value decoding errors.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::Unpack { .. })
    }

    /// The raw payload of a value decoding error.
    pub fn unpack_data(&self) -> Option<&[u8]> {
        match self {
            Self::Unpack { source } => Some(&source.data),
            _ => None,
        }
    }
}

/// Transaction engine for one connection.
#[derive(Debug)]
pub struct Master<T> {
    transport: Mutex<T>,
    addr_len: AddressLen,
}

impl<T: Transport> Master<T> {
    pub fn new(transport: T, addr_len: AddressLen) -> Self {
        Self {
            transport: Mutex::new(transport),
            addr_len,
        }
    }

    /// The address width used for every frame on this connection.
    pub fn addr_len(&self) -> AddressLen {
        self.addr_len
    }

    /// Perform one transaction with the device at `address`.
    ///
    /// `data` is `None` for a read request, or the payload to write.
    /// Returns the payload of the reply. Nothing is retried, a failed
    /// transaction has to be repeated as a whole by the caller.
    ///
    /// # Errors
    /// [`Error::NoData`] if the device didn't answer within the transport
    /// timeout, [`Error::HashMismatch`] if the reply is for another parameter,
    /// and [`Error::Frame`] for corrupted replies.
    pub fn execute(&self, address: u16, name: &str, data: Option<&[u8]>) -> Result<Payload, Error> {
        let mut transport = self.lock();

        let address = Address::new(address, self.addr_len).context(TypesSnafu)?;
        let hash = NameHash::from_name(name).context(TypesSnafu)?;
        let request = match data {
            None => Frame::request(address, hash),
            Some(data) => Frame::data(address, hash, data).context(FrameSnafu)?,
        };
        let raw = request.to_raw();

        debug!(
            "Sending frame to {} hash {} ({:?}): {:?}",
            address,
            hash,
            name,
            request.payload()
        );

        transport.reset_input_buffer().context(IoSnafu)?;
        transport.write_all(&raw).context(IoSnafu)?;
        let reply = transport.read_until(STOP_MARKER, MAX_RAW_LEN).context(IoSnafu)?;
        ensure!(!reply.is_empty(), NoDataSnafu);
        debug!("Received {} bytes: {:?}", reply.len(), String::from_utf8_lossy(&reply));

        let reply = Frame::from_raw(&reply, self.addr_len).context(FrameSnafu)?;
        ensure!(
            reply.hash == hash,
            HashMismatchSnafu {
                sent: hash,
                received: reply.hash
            }
        );
        debug!("Reply payload: {:?}", reply.payload());

        Ok(match reply.kind {
            FrameKind::Request => Payload::new(),
            FrameKind::Data(payload) => payload,
        })
    }

    /// Read request for parameter `name`.
    pub fn read(&self, address: u16, name: &str) -> Result<Payload, Error> {
        self.execute(address, name, None)
    }

    /// Write `data` to parameter `name`, returning the echoed payload.
    pub fn write(&self, address: u16, name: &str, data: &[u8]) -> Result<Payload, Error> {
        self.execute(address, name, Some(data))
    }

    /// Run `f` with exclusive access to the transport, e.g. to reopen it.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A panic while holding the lock leaves no protocol state behind,
    // the next transaction starts from scratch anyway.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
