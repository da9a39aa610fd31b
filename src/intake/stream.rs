//! Event stream abstraction
//!
//! The intake loop pulls one message at a time and reports back how the
//! message was handled so the transport can acknowledge, redeliver or drop
//! it. [`super::nats::JetStreamSource`] is the production transport;
//! [`MemoryStream`] feeds payloads from memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors. Any of these ends the intake loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Read error: {0}")]
    Read(String),

    #[error("Acknowledge error: {0}")]
    Ack(String),
}

/// How a delivered message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handled (settled, cancelled, or failed for good); do not redeliver
    Ack,
    /// Transient failure; redeliver later
    Nak,
    /// Payload can never be processed; drop it
    Term,
}

/// A delivered message awaiting acknowledgement
#[async_trait]
pub trait StreamMessage: Send {
    fn payload(&self) -> &[u8];

    async fn acknowledge(self, disposition: Disposition) -> Result<(), StreamError>;
}

/// Source of transfer-creation messages
#[async_trait]
pub trait EventStream: Send {
    type Message: StreamMessage;

    /// Block until the next message. `Ok(None)` means the stream ended.
    async fn next_message(&mut self) -> Result<Option<Self::Message>, StreamError>;
}

type DispositionLog = Arc<Mutex<Vec<(u64, Disposition)>>>;

/// In-process stream over a queue of payloads (and injected read failures)
#[derive(Default)]
pub struct MemoryStream {
    queue: VecDeque<Result<Vec<u8>, StreamError>>,
    next_seq: u64,
    log: DispositionLog,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: impl Into<Vec<u8>>) -> &mut Self {
        self.queue.push_back(Ok(payload.into()));
        self
    }

    /// Make the read at this position fail
    pub fn push_error(&mut self, error: StreamError) -> &mut Self {
        self.queue.push_back(Err(error));
        self
    }

    /// `(sequence, disposition)` of every acknowledged message, in order.
    /// Sequences start at 1 and count delivered messages only.
    pub fn dispositions(&self) -> Vec<(u64, Disposition)> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

pub struct MemoryMessage {
    seq: u64,
    payload: Vec<u8>,
    log: DispositionLog,
}

#[async_trait]
impl StreamMessage for MemoryMessage {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn acknowledge(self, disposition: Disposition) -> Result<(), StreamError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((self.seq, disposition));
        Ok(())
    }
}

#[async_trait]
impl EventStream for MemoryStream {
    type Message = MemoryMessage;

    async fn next_message(&mut self) -> Result<Option<MemoryMessage>, StreamError> {
        match self.queue.pop_front() {
            Some(Ok(payload)) => {
                self.next_seq += 1;
                Ok(Some(MemoryMessage {
                    seq: self.next_seq,
                    payload,
                    log: self.log.clone(),
                }))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}
