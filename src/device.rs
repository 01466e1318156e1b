//! Named parameter access to a single device.

use core::convert::TryFrom;
use core::fmt;

use snafu::{OptionExt, ResultExt};

use crate::frame::Payload;
use crate::master::{Error, Master, OutOfRangeSnafu, UnpackSnafu};
use crate::transport::Transport;
use crate::types::AddressLen;
use crate::value::{self, Decoded, Ieee32, Value};

const BAUD_RATES: [u32; 9] = [2400, 4800, 9600, 14400, 19200, 28800, 38400, 57600, 115_200];
const DATA_BITS: [u8; 2] = [7, 8];
const STOP_BITS: [u8; 2] = [1, 2];
const PARITIES: [Parity; 3] = [Parity::None, Parity::Even, Parity::Odd];
const ADDRESS_LENS: [AddressLen; 2] = [AddressLen::Bits8, AddressLen::Bits11];

/// Parity setting of the device serial line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "No",
            // front panel spelling
            Self::Even => "EuEn",
            Self::Odd => "Odd",
        };
        f.write_str(name)
    }
}

/// Network settings as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub base_address: i16,
    pub address_len: AddressLen,
    /// Network error code of the last exchange with the device.
    pub last_error: i16,
    /// Reply delay in milliseconds.
    pub answer_delay: i16,
}

impl fmt::Display for NetworkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Baud rate: {}, Bit length: {}, Parity: {}, Stop bits: {}, \
             Base address: {}, Address length: {}, Last error: {}, Answer delay: {}",
            self.baud_rate,
            self.data_bits,
            self.parity,
            self.stop_bits,
            self.base_address,
            self.address_len.bits(),
            self.last_error,
            self.answer_delay
        )
    }
}

/// A device on the bus, addressed by parameter names.
///
/// Every operation takes an optional address, `None` means the address the
/// device was created with. Reads and writes return a [`Decoded`] so that
/// device fault codes can be handled without matching on errors.
///
/// # Example
///
/// ```no_run
/// # use owen_proto::{AddressLen, Device, Transport};
/// # fn connect() -> Box<dyn Transport + Send> { unimplemented!() }
/// # fn main() -> Result<(), owen_proto::Error> {
/// let device = Device::new(connect(), 1, AddressLen::Bits8);
/// let pv = device.get_float24("PV", None)?;
/// if pv.is_sensor_fault() {
///     println!("Sensor is damaged");
/// }
/// // The returned value is what the device accepted.
/// let sp = device.write_float24("SP", 29.4, None)?.into_result();
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Device<T> {
    master: Master<T>,
    address: u16,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T, address: u16, addr_len: AddressLen) -> Self {
        Self::from_master(Master::new(transport, addr_len), address)
    }

    pub fn from_master(master: Master<T>, address: u16) -> Self {
        Self { master, address }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn master(&self) -> &Master<T> {
        &self.master
    }

    fn read(&self, name: &str, address: Option<u16>) -> Result<Payload, Error> {
        self.master.read(address.unwrap_or(self.address), name)
    }

    fn write_payload(
        &self,
        name: &str,
        data: &[u8],
        address: Option<u16>,
    ) -> Result<Payload, Error> {
        self.master.write(address.unwrap_or(self.address), name, data)
    }

    pub fn get_int16(&self, name: &str, address: Option<u16>) -> Result<Decoded<i16>, Error> {
        Ok(value::unpack_int16(&self.read(name, address)?))
    }

    pub fn get_uint16(&self, name: &str, address: Option<u16>) -> Result<Decoded<u16>, Error> {
        Ok(value::unpack_uint16(&self.read(name, address)?))
    }

    pub fn get_char(&self, name: &str, address: Option<u16>) -> Result<Decoded<i8>, Error> {
        Ok(value::unpack_char(&self.read(name, address)?))
    }

    pub fn get_uchar(&self, name: &str, address: Option<u16>) -> Result<Decoded<u8>, Error> {
        Ok(value::unpack_uchar(&self.read(name, address)?))
    }

    /// Read an IEEE754 parameter, optionally followed by time and index fields.
    pub fn get_ieee32(
        &self,
        name: &str,
        address: Option<u16>,
        with_time: bool,
        with_index: bool,
    ) -> Result<Decoded<Ieee32>, Error> {
        let data = self.read(name, address)?;
        Ok(value::unpack_ieee32(&data, with_time, with_index))
    }

    pub fn get_float24(&self, name: &str, address: Option<u16>) -> Result<Decoded<f32>, Error> {
        Ok(value::unpack_float24(&self.read(name, address)?))
    }

    pub fn get_string(&self, name: &str, address: Option<u16>) -> Result<String, Error> {
        Ok(value::unpack_string(&self.read(name, address)?))
    }

    /// Write a byte parameter, returning the value echoed by the device.
    pub fn write_char(
        &self,
        name: &str,
        value: i8,
        address: Option<u16>,
    ) -> Result<Decoded<i8>, Error> {
        let echo = self.write_payload(name, &[value::pack_char(value)], address)?;
        Ok(value::unpack_char(&echo))
    }

    /// Write a short integer parameter, returning the value echoed by the device.
    pub fn write_int16(
        &self,
        name: &str,
        value: i16,
        address: Option<u16>,
    ) -> Result<Decoded<i16>, Error> {
        let echo = self.write_payload(name, &value::pack_int16(value), address)?;
        Ok(value::unpack_int16(&echo))
    }

    /// Write a float parameter in the truncated 3 byte format, returning the
    /// value echoed by the device.
    pub fn write_float24(
        &self,
        name: &str,
        value: f32,
        address: Option<u16>,
    ) -> Result<Decoded<f32>, Error> {
        let echo = self.write_payload(name, &value::pack_float24(value), address)?;
        Ok(value::unpack_float24(&echo))
    }

    /// Write an IEEE754 parameter, returning the value echoed by the device.
    pub fn write_ieee32(
        &self,
        name: &str,
        value: f32,
        address: Option<u16>,
    ) -> Result<Decoded<f32>, Error> {
        let echo = self.write_payload(name, &value::pack_ieee32(value), address)?;
        Ok(value::unpack_ieee32(&echo, false, false).map(|v| v.value))
    }

    /// Write `value` with the encoding of its type.
    pub fn write(
        &self,
        name: &str,
        value: &Value,
        address: Option<u16>,
    ) -> Result<Decoded<Value>, Error> {
        let echo = self.write_payload(name, &value.pack(), address)?;
        Ok(value.unpack_like(&echo))
    }

    /// Device model name, parameter `dev`.
    pub fn device_name(&self, address: Option<u16>) -> Result<String, Error> {
        self.get_string("dev", address)
    }

    /// Firmware version, parameter `ver`.
    pub fn firmware_version(&self, address: Option<u16>) -> Result<String, Error> {
        self.get_string("ver", address)
    }

    /// Read the serial line and network settings of the device.
    pub fn network_settings(&self, address: Option<u16>) -> Result<NetworkSettings, Error> {
        Ok(NetworkSettings {
            baud_rate: self.setting_from("bps", &BAUD_RATES, address)?,
            data_bits: self.setting_from("Len", &DATA_BITS, address)?,
            parity: self.setting_from("PrtY", &PARITIES, address)?,
            address_len: self.setting_from("A.Len", &ADDRESS_LENS, address)?,
            base_address: self.setting("Addr", address)?,
            stop_bits: self.setting_from("sbit", &STOP_BITS, address)?,
            last_error: self.setting("n.Err", address)?,
            answer_delay: self.setting("rSdL", address)?,
        })
    }

    fn setting(&self, name: &'static str, address: Option<u16>) -> Result<i16, Error> {
        self.get_int16(name, address)?
            .into_result()
            .context(UnpackSnafu)
    }

    /// Read an enumerated setting and look up its meaning in `table`.
    fn setting_from<V: Copy>(
        &self,
        name: &'static str,
        table: &[V],
        address: Option<u16>,
    ) -> Result<V, Error> {
        let value = self.setting(name, address)?;
        usize::try_from(value)
            .ok()
            .and_then(|i| table.get(i))
            .copied()
            .context(OutOfRangeSnafu { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_display() {
        assert_eq!(Parity::None.to_string(), "No");
        assert_eq!(Parity::Even.to_string(), "EuEn");
        assert_eq!(Parity::Odd.to_string(), "Odd");
    }

    #[test]
    fn test_settings_display() {
        let settings = NetworkSettings {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            base_address: 16,
            address_len: AddressLen::Bits8,
            last_error: 0,
            answer_delay: 20,
        };
        assert_eq!(
            settings.to_string(),
            "Baud rate: 115200, Bit length: 8, Parity: No, Stop bits: 1, \
             Base address: 16, Address length: 8, Last error: 0, Answer delay: 20"
        );
    }
}
