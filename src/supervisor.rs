//! Background polling of one device, with reconnect on failure.
//!
//! The [`Supervisor`] repeatedly reads a fixed set of parameters and
//! performs queued write [`Command`]s. Any error closes the transport; the
//! next iteration reopens it and announces the device again before polling.
//! Results are reported as [`Event`]s on a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use snafu::ResultExt;

use crate::device::{Device, NetworkSettings};
use crate::master::{Error, IoSnafu, UnpackSnafu};
use crate::queue::{Command, CommandQueue};
use crate::transport::Transport;
use crate::value::Value;

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long each iteration waits for a queued command. This is also
    /// the polling interval when no commands arrive.
    pub command_wait: Duration,
    /// Pause after a failed iteration before reconnecting.
    pub retry_delay: Duration,
    /// Run/stop state flag, read as a byte.
    pub state_param: String,
    /// Measured value, read as a 3 byte float.
    pub process_param: String,
    /// Set point, read as a 3 byte float.
    pub setpoint_param: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command_wait: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            state_param: "r-S".into(),
            process_param: "PV".into(),
            setpoint_param: "SP".into(),
        }
    }
}

/// Identity of the device, read after every (re)connect.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub firmware: String,
    pub settings: NetworkSettings,
}

/// Polled values from one iteration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Snapshot {
    /// Non-zero while the controller is running.
    pub run_state: i8,
    pub process_value: f32,
    pub setpoint: f32,
}

impl Snapshot {
    pub fn is_running(&self) -> bool {
        self.run_state != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The transport was (re)opened and the device answered.
    Connected(DeviceInfo),
    Snapshot(Snapshot),
    /// A queued command was written, `echo` is the value the device accepted.
    CommandApplied { command: Command, echo: Value },
    /// The iteration failed and the transport was closed.
    ConnectionLost(String),
}

/// State kept across iterations.
#[derive(Debug, Default, Clone)]
pub struct ConnectionState {
    /// Set when the last iteration failed.
    pub error: bool,
    pub device: Option<DeviceInfo>,
    pub snapshot: Option<Snapshot>,
}

pub struct Supervisor<T> {
    device: Arc<Device<T>>,
    queue: Arc<CommandQueue>,
    events: Sender<Event>,
    config: SupervisorConfig,
    state: ConnectionState,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(
        device: Arc<Device<T>>,
        queue: Arc<CommandQueue>,
        events: Sender<Event>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            device,
            queue,
            events,
            config,
            state: ConnectionState::default(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Iterate until `stop` is set. Errors never end the loop.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("Supervisor for device {} started", self.device.address());
        while !stop.load(Ordering::SeqCst) {
            if let Err(err) = self.step() {
                self.connection_lost(&err);
                thread::sleep(self.config.retry_delay);
            }
        }
        self.device.master().with_transport(|t| t.close());
        info!("Supervisor for device {} stopped", self.device.address());
    }

    /// One iteration: reconnect if needed, poll, and perform at most one
    /// queued command. The command is removed from the queue only after
    /// the device accepted it.
    ///
    /// # Errors
    /// Any transaction or transport error. The caller is expected to
    /// close the transport, as [`run`](Self::run) does.
    pub fn step(&mut self) -> Result<(), Error> {
        if !self.device.master().with_transport(|t| t.is_open()) {
            self.connect()?;
        }

        let snapshot = self.poll()?;
        debug!("Polled {:?}", snapshot);
        self.state.snapshot = Some(snapshot);
        self.emit(Event::Snapshot(snapshot));

        if let Some(command) = self.queue.preview(self.config.command_wait) {
            let echo = self
                .device
                .write(&command.name, &command.value, None)?
                .into_result()
                .context(UnpackSnafu)?;
            self.queue.remove();
            info!("Applied {}, device accepted {}", command, echo);
            self.emit(Event::CommandApplied { command, echo });
        }

        self.state.error = false;
        Ok(())
    }

    fn connect(&mut self) -> Result<(), Error> {
        self.device
            .master()
            .with_transport(|t| t.open())
            .context(IoSnafu)?;

        let info = DeviceInfo {
            name: self.device.device_name(None)?,
            firmware: self.device.firmware_version(None)?,
            settings: self.device.network_settings(None)?,
        };
        info!("Device: {}, firmware: {}", info.name, info.firmware);
        info!("{}", info.settings);
        self.state.device = Some(info.clone());
        self.emit(Event::Connected(info));
        Ok(())
    }

    fn poll(&self) -> Result<Snapshot, Error> {
        let config = &self.config;
        let run_state = self
            .device
            .get_char(&config.state_param, None)?
            .into_result()
            .context(UnpackSnafu)?;
        let process_value = self
            .device
            .get_float24(&config.process_param, None)?
            .into_result()
            .context(UnpackSnafu)?;
        let setpoint = self
            .device
            .get_float24(&config.setpoint_param, None)?
            .into_result()
            .context(UnpackSnafu)?;
        Ok(Snapshot {
            run_state,
            process_value,
            setpoint,
        })
    }

    /// Mark the connection as failed and close the transport.
    pub fn connection_lost(&mut self, err: &Error) {
        warn!("Connection to device {} lost: {}", self.device.address(), err);
        self.state.error = true;
        self.device.master().with_transport(|t| t.close());
        self.emit(Event::ConnectionLost(err.to_string()));
    }

    fn emit(&self, event: Event) {
        // Nobody listening is fine, polling goes on regardless.
        let _ = self.events.send(event);
    }
}
