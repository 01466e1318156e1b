#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, ErrorKind};
use std::sync::{Arc, Mutex, MutexGuard};

use owen_proto::frame::{Frame, FrameKind};
use owen_proto::value;
use owen_proto::{Address, AddressLen, NameHash, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Open,
    Close,
    Write(Vec<u8>),
    Read,
}

/// A device on the other end of a simulated serial line.
///
/// Answers read requests from its registers and stores and echoes writes.
/// Transport errors and unanswered writes can be injected.
pub struct SimDevice {
    address: Address,
    registers: HashMap<NameHash, Vec<u8>>,
    scripted: VecDeque<Vec<u8>>,
    read_only: HashSet<NameHash>,
    pending: Vec<u8>,
    open: bool,
    fail_opens: usize,
    fail_writes: usize,
    pub ops: Vec<Op>,
}

pub type SharedDevice = Arc<Mutex<SimDevice>>;

impl SimDevice {
    pub fn new(address: u16, addr_len: AddressLen) -> SharedDevice {
        Arc::new(Mutex::new(SimDevice {
            address: Address::new(address, addr_len).unwrap(),
            registers: HashMap::new(),
            scripted: VecDeque::new(),
            read_only: HashSet::new(),
            pending: Vec::new(),
            open: false,
            fail_opens: 0,
            fail_writes: 0,
            ops: Vec::new(),
        }))
    }

    /// A temperature controller at `address` with a typical set of parameters.
    pub fn controller(address: u16) -> SharedDevice {
        let sim = SimDevice::new(address, AddressLen::Bits8);
        {
            let mut dev = sim.lock().unwrap();
            dev.set_string("dev", "TRM201");
            dev.set_string("ver", "V1.07");
            dev.set("bps", &value::pack_int16(8));
            dev.set("Len", &value::pack_int16(1));
            dev.set("PrtY", &value::pack_int16(0));
            dev.set("A.Len", &value::pack_int16(0));
            dev.set("Addr", &value::pack_int16(address as i16));
            dev.set("sbit", &value::pack_int16(0));
            dev.set("n.Err", &value::pack_int16(0));
            dev.set("rSdL", &value::pack_int16(20));
            dev.set("r-S", &[value::pack_char(1)]);
            dev.set("PV", &value::pack_float24(25.5));
            dev.set("SP", &value::pack_float24(30.0));
        }
        sim
    }

    pub fn set(&mut self, name: &str, data: &[u8]) {
        self.registers.insert(hash(name), data.to_vec());
    }

    pub fn set_string(&mut self, name: &str, s: &str) {
        self.set(name, &value::pack_string(s.as_bytes()));
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.registers.get(&hash(name)).map(Vec::as_slice)
    }

    /// Answer the next frame with `raw` instead of the register contents.
    pub fn script_reply(&mut self, raw: &[u8]) {
        self.scripted.push_back(raw.to_vec());
    }

    /// Leave writes to parameter `name` unanswered and unapplied. Reads
    /// are still answered.
    pub fn ignore_writes(&mut self, name: &str) {
        self.read_only.insert(hash(name));
    }

    pub fn accept_writes(&mut self, name: &str) {
        self.read_only.remove(&hash(name));
    }

    pub fn fail_next_opens(&mut self, count: usize) {
        self.fail_opens = count;
    }

    pub fn fail_next_writes(&mut self, count: usize) {
        self.fail_writes = count;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Raw frames received, in order.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    fn answer(&mut self, raw: &[u8]) -> Option<Vec<u8>> {
        let frame = Frame::from_raw(raw, self.address.len()).ok()?;
        if frame.address != self.address {
            return None;
        }
        if !frame.is_request() && self.read_only.contains(&frame.hash) {
            return None;
        }
        if let Some(reply) = self.scripted.pop_front() {
            return Some(reply);
        }
        let payload = match &frame.kind {
            FrameKind::Request => self.registers.get(&frame.hash)?.clone(),
            FrameKind::Data(data) => {
                self.registers.insert(frame.hash, data.to_vec());
                data.to_vec()
            }
        };
        let reply = Frame::data(self.address, frame.hash, &payload).ok()?;
        Some(reply.to_raw().to_vec())
    }
}

pub fn hash(name: &str) -> NameHash {
    NameHash::from_name(name).unwrap()
}

/// The master side of the line to a [`SimDevice`].
pub struct SimPort(SharedDevice);

impl SimPort {
    pub fn new(sim: &SharedDevice) -> SimPort {
        SimPort(Arc::clone(sim))
    }

    fn device(&self) -> MutexGuard<'_, SimDevice> {
        self.0.lock().unwrap()
    }
}

fn closed() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "port closed")
}

impl Transport for SimPort {
    fn open(&mut self) -> io::Result<()> {
        let mut dev = self.device();
        dev.ops.push(Op::Open);
        if dev.fail_opens > 0 {
            dev.fail_opens -= 1;
            return Err(io::Error::new(ErrorKind::NotFound, "no such port"));
        }
        dev.open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut dev = self.device();
        dev.ops.push(Op::Close);
        dev.open = false;
        dev.pending.clear();
    }

    fn is_open(&self) -> bool {
        self.device().open
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        let mut dev = self.device();
        if !dev.open {
            return Err(closed());
        }
        dev.pending.clear();
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut dev = self.device();
        if !dev.open {
            return Err(closed());
        }
        dev.ops.push(Op::Write(data.to_vec()));
        if dev.fail_writes > 0 {
            dev.fail_writes -= 1;
            return Err(io::Error::new(ErrorKind::BrokenPipe, "write failed"));
        }
        if let Some(reply) = dev.answer(data) {
            dev.pending.extend(reply);
        }
        Ok(())
    }

    fn read_until(&mut self, terminator: u8, max_len: usize) -> io::Result<Vec<u8>> {
        let mut dev = self.device();
        if !dev.open {
            return Err(closed());
        }
        dev.ops.push(Op::Read);
        let end = dev
            .pending
            .iter()
            .position(|&b| b == terminator)
            .map_or(dev.pending.len(), |i| i + 1)
            .min(max_len);
        Ok(dev.pending.drain(..end).collect())
    }
}
