//! Transfer Status Definitions
//!
//! Status IDs match the `TransactionStatusId` column written by the
//! account service.

use std::fmt;

/// Transfer lifecycle status
///
/// Terminal states: COMPLETED (3), CANCELLED (4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum TransferStatus {
    /// Recorded by the producer, not yet picked up
    Created = 1,

    /// Claimed by a settlement worker (persisted before any balance write)
    Processing = 2,

    /// Terminal: both balances applied
    Completed = 3,

    /// Terminal: rejected, no balance changed
    Cancelled = 4,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }

    /// Forward-only lifecycle edges
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Created, TransferStatus::Processing)
                | (TransferStatus::Processing, TransferStatus::Completed)
                | (TransferStatus::Processing, TransferStatus::Cancelled)
        )
    }

    /// Get the numeric status ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i32 {
        *self as i32
    }

    /// Convert from PostgreSQL status ID
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(TransferStatus::Created),
            2 => Some(TransferStatus::Processing),
            3 => Some(TransferStatus::Completed),
            4 => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Created => "CREATED",
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i32> for TransferStatus {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        TransferStatus::from_id(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransferStatus; 4] = [
        TransferStatus::Created,
        TransferStatus::Processing,
        TransferStatus::Completed,
        TransferStatus::Cancelled,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());

        assert!(!TransferStatus::Created.is_terminal());
        assert!(!TransferStatus::Processing.is_terminal());
    }

    #[test]
    fn test_forward_edges() {
        assert!(TransferStatus::Created.can_transition_to(TransferStatus::Processing));
        assert!(TransferStatus::Processing.can_transition_to(TransferStatus::Completed));
        assert!(TransferStatus::Processing.can_transition_to(TransferStatus::Cancelled));

        // No skipping the claim step
        assert!(!TransferStatus::Created.can_transition_to(TransferStatus::Completed));
        assert!(!TransferStatus::Created.can_transition_to(TransferStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(
                    !from.can_transition_to(to),
                    "{} -> {} must be rejected",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_no_backward_edges() {
        for from in ALL {
            for to in ALL {
                if to <= from {
                    assert!(!from.can_transition_to(to));
                }
            }
        }
    }

    #[test]
    fn test_status_ids_match_storage() {
        assert_eq!(TransferStatus::Created.id(), 1);
        assert_eq!(TransferStatus::Processing.id(), 2);
        assert_eq!(TransferStatus::Completed.id(), 3);
        assert_eq!(TransferStatus::Cancelled.id(), 4);
        assert_eq!(TransferStatus::try_from(3), Ok(TransferStatus::Completed));
    }

    #[test]
    fn test_invalid_status_id() {
        assert!(TransferStatus::from_id(0).is_none());
        assert!(TransferStatus::from_id(5).is_none());
        assert!(TransferStatus::from_id(-1).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferStatus::Created.to_string(), "CREATED");
        assert_eq!(TransferStatus::Cancelled.to_string(), "CANCELLED");
    }
}
