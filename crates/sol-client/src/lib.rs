//! Sending Solana transactions and waiting for them to settle.
//!
//! [`Connection`] signs transactions against a shared [`BlockhashCache`],
//! submits them through any [`SolanaRpc`] implementation and confirms them
//! with the [`ConfirmationEngine`]. Every blocking call takes a
//! `tokio_util` [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! Transaction construction lives in `sol-core`.

pub mod blockhash_cache;
pub mod commitment;
pub mod config;
pub mod confirmation;
pub mod connection;
pub mod error;
pub mod retry;
pub mod rpc;

pub use blockhash_cache::BlockhashCache;
pub use commitment::{Commitment, TransactionConfirmationStatus};
pub use config::{ConnectionConfig, RetryConfig};
pub use confirmation::{ConfirmationEngine, ConfirmationStrategy};
pub use connection::Connection;
pub use error::{ClientError, RpcError, TransactionExpired};
pub use retry::RetryingRpc;
pub use rpc::{
    ConfirmOptions, LatestBlockhash, Response, RpcContext, SendOptions, SignatureResult,
    SignatureStatus, SignatureSubscription, SolanaRpc, SubscriptionGuard,
};
