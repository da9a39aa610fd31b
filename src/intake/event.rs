//! Transfer-creation event decoding
//!
//! The producer sends every field as a JSON string. Decoding validates each
//! one and yields a typed event; anything unparsable is `MalformedEvent`,
//! never a zero value.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::money::parse_amount;
use crate::settlement::error::SettlementError;
use crate::settlement::types::{AccountNumber, Transfer, TransferId};

/// Wire format, exactly as published
#[derive(Debug, Deserialize)]
struct TransferCreatedMessage {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "SenderAccount")]
    sender_account: String,
    #[serde(rename = "RecipientAccount")]
    recipient_account: String,
    #[serde(rename = "Amount")]
    amount: String,
    timestamp: String,
}

/// Validated transfer-creation event
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCreatedEvent {
    pub id: TransferId,
    pub sender: AccountNumber,
    pub recipient: AccountNumber,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TransferCreatedEvent {
    /// Decode and validate a raw payload. `decimals` is the ledger scale.
    pub fn decode(payload: &[u8], decimals: u32) -> Result<Self, SettlementError> {
        let msg: TransferCreatedMessage = serde_json::from_slice(payload)
            .map_err(|e| malformed(format!("invalid json: {}", e)))?;

        let id = msg
            .id
            .trim()
            .parse::<TransferId>()
            .map_err(|e| malformed(format!("Id {:?}: {}", msg.id, e)))?;

        let amount = parse_amount(&msg.amount, decimals)
            .map_err(|e| malformed(format!("Amount {:?}: {}", msg.amount, e)))?;

        Ok(Self {
            id,
            sender: parse_account_number("SenderAccount", &msg.sender_account)?,
            recipient: parse_account_number("RecipientAccount", &msg.recipient_account)?,
            amount,
            timestamp: parse_timestamp(&msg.timestamp)?,
        })
    }

    /// Whether the event describes the same movement as the stored record
    pub fn matches(&self, transfer: &Transfer) -> bool {
        self.id == transfer.id
            && self.sender == transfer.sender
            && self.recipient == transfer.recipient
            && self.amount == transfer.amount
    }
}

fn malformed(reason: String) -> SettlementError {
    SettlementError::MalformedEvent(reason)
}

fn parse_account_number(field: &str, raw: &str) -> Result<AccountNumber, SettlementError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("{} {:?}: not a number", field, raw)));
    }
    trimmed
        .parse::<i64>()
        .ok()
        .and_then(AccountNumber::new)
        .ok_or_else(|| malformed(format!("{} {:?}: out of range", field, raw)))
}

/// RFC 3339, or an offset-less ISO 8601 timestamp taken as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SettlementError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| malformed(format!("timestamp {:?}: {}", raw, e)))
}
