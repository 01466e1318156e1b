//! Poll a temperature controller and accept set point changes on stdin.
//!
//! Usage: owen_poll [PORT] [ADDRESS] [BAUD]
//!
//! Enter `SP <value>` to change the set point, `run` or `stop` to switch the
//! controller, an empty line to quit.

use std::io::BufRead;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{bail, Context, Result};

use owen_proto::transport::serial::{SerialConfig, SerialTransport};
use owen_proto::{AddressLen, Command, CommandQueue, Device, Event, Supervisor, SupervisorConfig, Value};

fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    Ok(match (words.next(), words.next()) {
        (Some("run"), None) => Command::new("r-S", Value::Char(1)),
        (Some("stop"), None) => Command::new("r-S", Value::Char(0)),
        (Some("SP"), Some(value)) => {
            let value = value.parse().context("Set point must be a number")?;
            Command::new("SP", Value::Float24(value))
        }
        _ => bail!("Unknown command {:?}", line),
    })
}

fn read_commands(queue: &CommandQueue) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) if !line.trim().is_empty() => line,
            _ => break,
        };
        match parse_command(&line) {
            Ok(command) => {
                if let Err(err) = queue.try_put(command) {
                    println!("{}", err);
                }
            }
            Err(err) => println!("{:#}", err),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let path = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let address: u16 = match args.next() {
        Some(a) => a.parse().context("Invalid device address")?,
        None => 16,
    };
    let baud_rate: u32 = match args.next() {
        Some(b) => b.parse().context("Invalid baud rate")?,
        None => 115_200,
    };

    let transport = SerialTransport::new(SerialConfig::new(path, baud_rate));
    let device = Arc::new(Device::new(transport, address, AddressLen::Bits8));
    let queue = Arc::new(CommandQueue::new());
    let (tx, events) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));

    let supervisor = {
        let mut supervisor =
            Supervisor::new(device, Arc::clone(&queue), tx, SupervisorConfig::default());
        let stop = Arc::clone(&stop);
        thread::spawn(move || supervisor.run(&stop))
    };

    let input = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            read_commands(&queue);
            stop.store(true, SeqCst);
        })
    };

    // The channel closes when the supervisor thread exits.
    for event in events {
        match event {
            Event::Connected(info) => {
                println!("Connected to {} {}", info.name, info.firmware);
                println!("{}", info.settings);
            }
            Event::Snapshot(s) => println!(
                "{}  PV {:7.2}  SP {:7.2}",
                if s.is_running() { "RUN " } else { "STOP" },
                s.process_value,
                s.setpoint
            ),
            Event::CommandApplied { command, echo } => {
                println!("{} accepted as {}", command, echo)
            }
            Event::ConnectionLost(reason) => println!("Connection lost: {}", reason),
        }
    }

    let _ = supervisor.join();
    let _ = input.join();
    Ok(())
}
