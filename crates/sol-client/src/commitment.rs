//! Commitment levels and confirmation timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default confirmation timeout.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for commitment levels that resolve within a few slots.
pub const FAST_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// How settled a ledger observation must be before it is trusted.
///
/// `Recent`, `Single`, `SingleGossip`, `Root` and `Max` are deprecated
/// spellings kept for older nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
    Recent,
    Single,
    SingleGossip,
    Root,
    Max,
}

/// The status the cluster reports for a signature.
///
/// Ordered from least to most settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionConfirmationStatus {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    /// The least settled status that satisfies this level.
    pub fn required_status(self) -> TransactionConfirmationStatus {
        match self {
            Self::Processed | Self::Recent => TransactionConfirmationStatus::Processed,
            Self::Confirmed | Self::Single | Self::SingleGossip => {
                TransactionConfirmationStatus::Confirmed
            }
            Self::Finalized | Self::Root | Self::Max => TransactionConfirmationStatus::Finalized,
        }
    }

    pub fn is_satisfied_by(self, status: TransactionConfirmationStatus) -> bool {
        status >= self.required_status()
    }

    /// How long the timeout strategy waits. An explicit `initial_timeout`
    /// always wins.
    pub fn confirmation_timeout(self, initial_timeout: Option<Duration>) -> Duration {
        if let Some(timeout) = initial_timeout {
            return timeout;
        }
        match self {
            Self::Processed | Self::Recent | Self::Single | Self::Confirmed | Self::SingleGossip => {
                FAST_CONFIRMATION_TIMEOUT
            }
            Self::Finalized | Self::Root | Self::Max => DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}
