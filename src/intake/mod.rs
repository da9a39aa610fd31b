//! Transfer-creation event intake
//!
//! - [`event`]: payload decoding and validation
//! - [`stream`]: transport abstraction and in-memory stream
//! - [`nats`]: NATS JetStream transport
//! - [`consumer`]: the intake loop

pub mod consumer;
pub mod event;
pub mod nats;
pub mod stream;

pub use consumer::{IntakeLoop, IntakeStats, IntakeStatsSnapshot};
pub use event::TransferCreatedEvent;
pub use nats::JetStreamSource;
pub use stream::{Disposition, EventStream, MemoryStream, StreamError, StreamMessage};
