use std::time::Duration;

use serde_json::Value;
use sol_core::{Signature, SolError};
use thiserror::Error;

/// Failures reported by, or on the way to, an RPC node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited by RPC node")]
    RateLimited { retry_after: Option<Duration> },

    /// A JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Response { code: i64, message: String },

    /// `sendTransaction` was rejected, usually by preflight simulation.
    #[error("{message}{}", format_logs(.logs))]
    SendTransaction { message: String, logs: Vec<String> },

    #[error("signature subscription closed")]
    SubscriptionClosed,

    #[error("RPC request cancelled")]
    Cancelled,
}

impl RpcError {
    /// Transport failures and HTTP 429 are worth retrying; everything else is
    /// a definitive answer from the node.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }
}

fn format_logs(logs: &[String]) -> String {
    if logs.is_empty() {
        String::new()
    } else {
        format!("\n{}", logs.join("\n"))
    }
}

/// A transaction that can no longer be confirmed. The caller decides whether
/// to resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionExpired {
    #[error(
        "Transaction was not confirmed in {} seconds. It is unknown if it succeeded or failed. Check signature `{signature}` using the Solana Explorer or CLI tools",
        .timeout.as_secs()
    )]
    Timeout {
        signature: Signature,
        timeout: Duration,
    },

    #[error("Signature {signature} has expired: block height exceeded.")]
    BlockheightExceeded { signature: Signature },

    #[error("Signature {signature} has expired: the nonce is no longer valid.")]
    NonceInvalid { signature: Signature },
}

impl TransactionExpired {
    pub fn signature(&self) -> &Signature {
        match self {
            Self::Timeout { signature, .. }
            | Self::BlockheightExceeded { signature }
            | Self::NonceInvalid { signature } => signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Rpc(RpcError),

    #[error(transparent)]
    Expired(#[from] TransactionExpired),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unable to obtain a new blockhash after {attempts} attempts ({}ms)", .elapsed.as_millis())]
    BlockhashStale { attempts: u32, elapsed: Duration },

    #[error("transaction {signature} failed: {err}")]
    TransactionFailed { signature: Signature, err: Value },

    #[error(transparent)]
    Sol(#[from] SolError),
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Cancelled => Self::Cancelled,
            other => Self::Rpc(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(RpcError::Transport("reset".into()).is_retryable());
        assert!(RpcError::RateLimited { retry_after: None }.is_retryable());
        assert!(!RpcError::Response {
            code: -32602,
            message: "bad params".into()
        }
        .is_retryable());
        assert!(!RpcError::Cancelled.is_retryable());
    }

    #[test]
    fn send_error_appends_logs() {
        let err = RpcError::SendTransaction {
            message: "simulation failed".into(),
            logs: vec!["log a".into(), "log b".into()],
        };
        assert_eq!(err.to_string(), "simulation failed\nlog a\nlog b");
    }

    #[test]
    fn expiry_messages() {
        let signature = Signature::new([1; 64]);
        let text = signature.to_string();
        assert_eq!(
            TransactionExpired::BlockheightExceeded { signature }.to_string(),
            format!("Signature {text} has expired: block height exceeded.")
        );
        let timeout = TransactionExpired::Timeout {
            signature,
            timeout: Duration::from_secs(30),
        };
        assert!(timeout.to_string().starts_with("Transaction was not confirmed in 30 seconds"));
        assert_eq!(timeout.signature(), &signature);
    }

    #[test]
    fn cancelled_rpc_maps_to_cancelled_client_error() {
        assert_eq!(ClientError::from(RpcError::Cancelled), ClientError::Cancelled);
        assert!(matches!(
            ClientError::from(RpcError::SubscriptionClosed),
            ClientError::Rpc(RpcError::SubscriptionClosed)
        ));
    }
}
