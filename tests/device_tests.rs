mod common;

use std::sync::Arc;
use std::thread;

use owen_proto::device::Parity;
use owen_proto::frame::Frame;
use owen_proto::value::{self, Decoded};
use owen_proto::{Address, AddressLen, Device, Error, Transport, Value};

use common::{hash, SimDevice, SimPort};

fn connect(sim: &common::SharedDevice, address: u16, addr_len: AddressLen) -> Device<SimPort> {
    let mut port = SimPort::new(sim);
    port.open().unwrap();
    Device::new(port, address, addr_len)
}

#[test]
fn test_write_reference_frame() {
    let sim = SimDevice::controller(1);
    let device = connect(&sim, 1, AddressLen::Bits8);

    let echo = device.write_float24("SP", 29.4, None).unwrap();
    assert_eq!(echo, Decoded::Value(f32::from_bits(0x41eb_3300)));

    let sim = sim.lock().unwrap();
    assert_eq!(sim.received(), vec![b"#GHGJPHGNKHURJJGRKI\r".to_vec()]);
    assert_eq!(sim.get("SP"), Some(&[0x41, 0xeb, 0x33][..]));
}

#[test]
fn test_read_values() {
    let sim = SimDevice::controller(16);
    let device = connect(&sim, 16, AddressLen::Bits8);

    assert_eq!(device.get_float24("PV", None).unwrap(), Decoded::Value(25.5));
    assert_eq!(device.get_char("r-S", None).unwrap(), Decoded::Value(1));
    assert_eq!(device.get_int16("rSdL", None).unwrap(), Decoded::Value(20));
    assert_eq!(device.device_name(None).unwrap(), "TRM201");
    assert_eq!(device.firmware_version(None).unwrap(), "V1.07");
}

#[test]
fn test_ieee32_with_time() {
    let sim = SimDevice::controller(1);
    sim.lock()
        .unwrap()
        .set("rEAd", &value::pack_ieee32_with(-1.5, Some(0x1234), None));
    let device = connect(&sim, 1, AddressLen::Bits8);

    let read = device
        .get_ieee32("rEAd", None, true, false)
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(read.value, -1.5);
    assert_eq!(read.time, Some(0x1234));
    assert_eq!(read.index, None);
}

#[test]
fn test_network_settings() {
    let sim = SimDevice::controller(16);
    sim.lock().unwrap().set("PrtY", &value::pack_int16(1));
    let device = connect(&sim, 16, AddressLen::Bits8);

    let settings = device.network_settings(None).unwrap();
    assert_eq!(settings.baud_rate, 115_200);
    assert_eq!(settings.data_bits, 8);
    assert_eq!(settings.parity, Parity::Even);
    assert_eq!(settings.stop_bits, 1);
    assert_eq!(settings.base_address, 16);
    assert_eq!(settings.address_len, AddressLen::Bits8);
    assert_eq!(settings.answer_delay, 20);
    assert_eq!(
        settings.to_string(),
        "Baud rate: 115200, Bit length: 8, Parity: EuEn, Stop bits: 1, \
         Base address: 16, Address length: 8, Last error: 0, Answer delay: 20"
    );
}

#[test]
fn test_network_settings_out_of_range() {
    let sim = SimDevice::controller(1);
    sim.lock().unwrap().set("bps", &value::pack_int16(12));
    let device = connect(&sim, 1, AddressLen::Bits8);

    assert!(matches!(
        device.network_settings(None),
        Err(Error::OutOfRange {
            name: "bps",
            value: 12
        })
    ));
}

#[test]
fn test_sensor_fault() {
    let sim = SimDevice::controller(1);
    sim.lock().unwrap().set("PV", &[value::SENSOR_FAULT]);
    let device = connect(&sim, 1, AddressLen::Bits8);

    let pv = device.get_float24("PV", None).unwrap();
    assert!(pv.is_sensor_fault());
    assert_eq!(pv, Decoded::Fault(0xfd));

    let err = pv.into_result().unwrap_err();
    assert_eq!(err.fault_code(), Some(0xfd));
}

#[test]
fn test_malformed_payload() {
    let sim = SimDevice::controller(1);
    sim.lock().unwrap().set("PV", &[0x41, 0xcc]);
    let device = connect(&sim, 1, AddressLen::Bits8);

    assert_eq!(
        device.get_float24("PV", None).unwrap(),
        Decoded::Malformed(vec![0x41, 0xcc])
    );
    assert_eq!(
        device.get_ieee32("PV", None, false, false).unwrap(),
        Decoded::Malformed(vec![0x41, 0xcc])
    );
}

#[test]
fn test_echo_is_authoritative() {
    let sim = SimDevice::controller(1);
    // the device clamps the set point to its upper limit
    let clamped = Frame::data(
        Address::new(1, AddressLen::Bits8).unwrap(),
        hash("SP"),
        &value::pack_float24(100.0),
    )
    .unwrap();
    sim.lock().unwrap().script_reply(&clamped.to_raw());
    let device = connect(&sim, 1, AddressLen::Bits8);

    let echo = device.write("SP", &Value::Float24(250.0), None).unwrap();
    assert_eq!(echo, Decoded::Value(Value::Float24(100.0)));
}

#[test]
fn test_other_address() {
    let sim = SimDevice::controller(1);
    let device = connect(&sim, 1, AddressLen::Bits8);

    assert!(matches!(device.get_float24("PV", Some(2)), Err(Error::NoData)));
    assert!(device.get_float24("PV", Some(1)).is_ok());
}

#[test]
fn test_unknown_parameter() {
    let sim = SimDevice::controller(1);
    let device = connect(&sim, 1, AddressLen::Bits8);

    assert!(matches!(device.get_int16("In.L", None), Err(Error::NoData)));
    assert!(matches!(
        device.get_int16("TOO.LONG", None),
        Err(Error::Types { .. })
    ));
}

#[test]
fn test_11bit_addressing() {
    let sim = SimDevice::new(1000, AddressLen::Bits11);
    sim.lock().unwrap().set("SP", &value::pack_float24(12.5));
    let device = connect(&sim, 1000, AddressLen::Bits11);

    assert_eq!(device.get_float24("SP", None).unwrap(), Decoded::Value(12.5));
    assert_eq!(
        device.write_int16("SP", -300, None).unwrap(),
        Decoded::Value(-300)
    );
    assert!(matches!(
        device.get_float24("SP", Some(2048)),
        Err(Error::Types { .. })
    ));
}

#[test]
fn test_transport_errors() {
    let sim = SimDevice::controller(1);
    let device = connect(&sim, 1, AddressLen::Bits8);

    sim.lock().unwrap().fail_next_writes(1);
    let err = device.get_float24("PV", None).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(err.is_protocol());

    // the next transaction starts clean
    assert_eq!(device.get_float24("PV", None).unwrap(), Decoded::Value(25.5));
}

#[test]
fn test_concurrent_transactions() {
    let sim = SimDevice::controller(1);
    let device = Arc::new(connect(&sim, 1, AddressLen::Bits8));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                for _ in 0..25 {
                    if i % 2 == 0 {
                        assert_eq!(device.get_float24("PV", None).unwrap(), Decoded::Value(25.5));
                    } else {
                        assert_eq!(device.get_char("r-S", None).unwrap(), Decoded::Value(1));
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(sim.lock().unwrap().received().len(), 100);
}
