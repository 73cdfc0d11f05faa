//! Host boundary: lifecycle hooks and the side-effect bus
//!
//! The interpreter never draws or prints anything itself. Effects are
//! [`Message`]s collected in a per-session [`MessageQueue`] and published to
//! a [`Bus`]. Hosts observe and pace execution through [`Hooks`]; the
//! per-statement hook is the only place execution yields.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::ast::Command;
use crate::diagnostics::{Result, TurtleError};

/// One side effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Consumer of published messages
pub trait Bus {
    fn publish(&self, message: Message);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl Bus for NullBus {
    fn publish(&self, _message: Message) {}
}

/// Keeps every published message in memory
#[derive(Debug, Default)]
pub struct RecordingBus {
    messages: RefCell<Vec<Message>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    /// Messages published under `topic`, in order
    pub fn with_topic(&self, topic: &str) -> Vec<Message> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn take(&self) -> Vec<Message> {
        self.messages.take()
    }
}

impl Bus for RecordingBus {
    fn publish(&self, message: Message) {
        self.messages.borrow_mut().push(message);
    }
}

/// Forwards messages into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: UnboundedSender<Message>,
}

impl ChannelBus {
    pub fn new() -> (Self, UnboundedReceiver<Message>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Bus for ChannelBus {
    fn publish(&self, message: Message) {
        if let Err(err) = self.sender.send(message) {
            tracing::warn!(topic = %err.0.topic, "message dropped: receiver closed");
        }
    }
}

/// Batches messages for one session
pub struct MessageQueue {
    bus: Rc<dyn Bus>,
    pending: Vec<Message>,
    /// Flush automatically at this many pending messages; 0 never does
    capacity: usize,
}

impl MessageQueue {
    pub fn new(bus: Rc<dyn Bus>, capacity: usize) -> Self {
        Self {
            bus,
            pending: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.pending.push(message);
        if self.capacity > 0 && self.pending.len() >= self.capacity {
            self.flush();
        }
    }

    /// Publish everything pending, returning how many messages went out
    pub fn flush(&mut self) -> usize {
        let count = self.pending.len();
        for message in self.pending.drain(..) {
            self.bus.publish(message);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Message] {
        &self.pending
    }
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("pending", &self.pending.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Host lifecycle callbacks. Every method defaults to doing nothing.
///
/// Returning an error from a hook aborts the session with that error.
#[async_trait(?Send)]
pub trait Hooks {
    async fn before_start_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    /// Called once per session, after success or failure
    async fn after_finish_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn after_error(&self, _session_id: &str, _error: &TurtleError) {}

    /// Called before every statement, including each loop iteration.
    ///
    /// `queue` holds effects not yet published; hosts that animate
    /// typically flush it here and then wait.
    async fn before_run_new_command(
        &self,
        _session_id: &str,
        _command: &Command,
        _queue: &mut MessageQueue,
    ) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

#[async_trait(?Send)]
impl Hooks for NoHooks {}
