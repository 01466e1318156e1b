//! Bus master for the OWEN serial field bus protocol.
//!
//! Frames are addressed to a device and identify a parameter by the hash
//! of its name. They are sent over the line as ASCII, one character per
//! nibble, between `#` and `\r`.
//!
//! The crate is layered:
//!
//! * [`types`], [`crc`], [`frame`] and [`value`] are the pure codec: name
//!   hashing, checksums, framing and the payload encodings.
//! * [`Master`] runs request/reply transactions over a [`Transport`].
//! * [`Device`] reads and writes named parameters of one device.
//! * [`CommandQueue`] and [`Supervisor`] poll a device in the background,
//!   perform queued writes and reconnect after failures.
//!
//! The serial port transport needs the `serial` feature.

pub mod crc;
pub mod device;
pub mod frame;
pub mod master;
mod nom_parser;
pub mod queue;
pub mod supervisor;
pub mod transport;
pub mod types;
pub mod value;

pub use device::{Device, NetworkSettings, Parity};
pub use frame::{Frame, FrameKind, Payload};
pub use master::{Error, Master};
pub use queue::{Command, CommandQueue, QueueFull};
pub use supervisor::{ConnectionState, DeviceInfo, Event, Snapshot, Supervisor, SupervisorConfig};
pub use transport::Transport;
pub use types::{Address, AddressLen, NameHash};
pub use value::{Decoded, UnpackError, Value};
