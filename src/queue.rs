//! Pending write commands, handed from producers to the supervisor loop.
//!
//! The consumer first [previews](CommandQueue::preview) the head command,
//! performs the write, and [removes](CommandQueue::remove) the command only
//! when the write succeeded. A failed write leaves the command queued for
//! the next attempt.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::warn;

use crate::value::Value;

/// A parameter write waiting to be performed.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub value: Value,
}

impl Command {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// The queue was full, the rejected command is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFull {
    pub command: Command,
}

impl StdError for QueueFull {}

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command queue overflow, dropped {}", self.command)
    }
}

type OverflowHandler = Box<dyn Fn(&Command) + Send + Sync>;

/// Bounded FIFO of [`Command`]s shared between producers and one consumer.
pub struct CommandQueue {
    queue: Mutex<VecDeque<Command>>,
    not_empty: Condvar,
    capacity: usize,
    on_overflow: Option<OverflowHandler>,
}

impl CommandQueue {
    /// A queue holding at most one pending command.
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    /// # Panics
    /// If `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "command queue capacity must be non-zero");
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
            on_overflow: None,
        }
    }

    /// Call `handler` for every command rejected by a full queue.
    pub fn on_overflow(mut self, handler: impl Fn(&Command) + Send + Sync + 'static) -> Self {
        self.on_overflow = Some(Box::new(handler));
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Queue `command` without blocking.
    /// # Errors
    /// Returns [`QueueFull`] with the command if the queue is full.
    pub fn try_put(&self, command: Command) -> Result<(), QueueFull> {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            drop(queue);
            warn!("Command queue overflow, dropping {}", command);
            if let Some(handler) = &self.on_overflow {
                handler(&command);
            }
            return Err(QueueFull { command });
        }
        queue.push_back(command);
        drop(queue);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Return a copy of the head command without removing it, waiting up
    /// to `timeout` for one to arrive.
    pub fn preview(&self, timeout: Duration) -> Option<Command> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if let Some(command) = queue.front() {
                return Some(command.clone());
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining == Duration::from_secs(0) {
                return None;
            }
            queue = self
                .not_empty
                .wait_timeout(queue, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Remove and return the head command.
    pub fn remove(&self) -> Option<Command> {
        self.lock().pop_front()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Command>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("queue", &*self.lock())
            .field("capacity", &self.capacity)
            .finish()
    }
}
