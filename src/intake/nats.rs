//! NATS JetStream transport
//!
//! Every worker process binds the same durable pull consumer, so JetStream
//! hands each message to exactly one of them and redelivers anything left
//! unacknowledged after `ack_wait`.

use std::time::Duration;

use async_nats::jetstream::{self, AckKind, consumer, stream};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use super::stream::{Disposition, EventStream, StreamError, StreamMessage};
use crate::config::StreamConfig;

pub struct JetStreamSource {
    messages: consumer::pull::Stream,
}

impl JetStreamSource {
    /// Connect, ensure the stream exists and bind the durable consumer
    pub async fn connect(config: &StreamConfig) -> Result<Self, StreamError> {
        let client = async_nats::connect(&config.nats_url)
            .await
            .map_err(|e| StreamError::Connection(e.to_string()))?;
        info!(url = %config.nats_url, "Connected to NATS");

        let context = jetstream::new(client);
        let stream = context
            .get_or_create_stream(stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![config.subject.clone()],
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;

        let consumer = stream
            .create_consumer(consumer::pull::Config {
                durable_name: Some(config.durable_name.clone()),
                filter_subject: config.subject.clone(),
                ack_policy: consumer::AckPolicy::Explicit,
                ack_wait: Duration::from_secs(config.ack_wait_secs),
                max_deliver: config.max_deliver,
                deliver_policy: consumer::DeliverPolicy::All,
                ..Default::default()
            })
            .await
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;

        info!(
            stream = %config.stream_name,
            subject = %config.subject,
            consumer = %config.durable_name,
            "JetStream consumer bound"
        );
        Ok(Self { messages })
    }
}

pub struct JetStreamMessage(jetstream::Message);

#[async_trait]
impl StreamMessage for JetStreamMessage {
    fn payload(&self) -> &[u8] {
        &self.0.payload
    }

    async fn acknowledge(self, disposition: Disposition) -> Result<(), StreamError> {
        let kind = match disposition {
            Disposition::Ack => AckKind::Ack,
            Disposition::Nak => AckKind::Nak(None),
            Disposition::Term => AckKind::Term,
        };
        self.0
            .ack_with(kind)
            .await
            .map_err(|e| StreamError::Ack(e.to_string()))
    }
}

#[async_trait]
impl EventStream for JetStreamSource {
    type Message = JetStreamMessage;

    async fn next_message(&mut self) -> Result<Option<JetStreamMessage>, StreamError> {
        match self.messages.next().await {
            Some(Ok(msg)) => Ok(Some(JetStreamMessage(msg))),
            Some(Err(e)) => Err(StreamError::Read(e.to_string())),
            None => Ok(None),
        }
    }
}
