//! The RPC collaborator.
//!
//! [`SolanaRpc`] is the small surface the send and confirmation paths need
//! from a node. Transport, JSON-RPC framing and websocket plumbing live in
//! whatever implements it; this crate only consumes typed results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sol_core::{Address, Hash, NonceAccount, Signature};

use crate::commitment::{Commitment, TransactionConfirmationStatus};
use crate::error::RpcError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// A value paired with the slot it was observed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<T> {
    pub context: RpcContext,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` once the block is rooted.
    pub confirmations: Option<u64>,
    pub err: Option<Value>,
    pub confirmation_status: Option<TransactionConfirmationStatus>,
}

impl SignatureStatus {
    /// The reported status, falling back to `confirmations` for nodes that
    /// predate `confirmationStatus`.
    pub fn confirmation_level(&self) -> TransactionConfirmationStatus {
        match (self.confirmation_status, self.confirmations) {
            (Some(status), _) => status,
            (None, None) => TransactionConfirmationStatus::Finalized,
            (None, Some(0)) => TransactionConfirmationStatus::Processed,
            (None, Some(_)) => TransactionConfirmationStatus::Confirmed,
        }
    }

    pub fn satisfies(&self, commitment: Commitment) -> bool {
        commitment.is_satisfied_by(self.confirmation_level())
    }
}

/// The final outcome delivered to a signature subscriber.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureResult {
    pub err: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub skip_preflight: bool,
    /// Defaults to the connection's commitment when sending.
    pub preflight_commitment: Option<Commitment>,
    pub max_retries: Option<usize>,
    pub min_context_slot: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOptions {
    #[serde(flatten)]
    pub send: SendOptions,
    /// Defaults to the connection's commitment.
    pub commitment: Option<Commitment>,
}

/// A live `signatureSubscribe` stream.
#[async_trait]
pub trait SignatureSubscription: Send {
    /// The next notification, or `None` once the stream has closed.
    async fn recv(&mut self) -> Option<Result<Response<SignatureResult>, RpcError>>;

    async fn unsubscribe(&mut self);
}

/// A node the client can talk to.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    async fn send_raw_transaction(
        &self,
        wire: &[u8],
        options: &SendOptions,
    ) -> Result<Signature, RpcError>;

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash, RpcError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Response<Option<SignatureStatus>>, RpcError>;

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError>;

    /// Reads and decodes a nonce account. `Ok(None)` when the account does
    /// not exist.
    async fn get_nonce_account(
        &self,
        address: &Address,
        commitment: Commitment,
        min_context_slot: Option<u64>,
    ) -> Result<Response<Option<NonceAccount>>, RpcError>;

    async fn signature_subscribe(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Box<dyn SignatureSubscription>, RpcError>;
}

/// Owns a subscription and makes sure it is torn down.
///
/// [`close`](Self::close) unsubscribes in place. A guard dropped without
/// being closed, e.g. because its task was aborted, hands the subscription
/// to the runtime to unsubscribe in the background.
pub struct SubscriptionGuard {
    inner: Option<Box<dyn SignatureSubscription>>,
}

impl SubscriptionGuard {
    pub fn new(subscription: Box<dyn SignatureSubscription>) -> Self {
        Self {
            inner: Some(subscription),
        }
    }

    pub async fn recv(&mut self) -> Option<Result<Response<SignatureResult>, RpcError>> {
        match self.inner.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => None,
        }
    }

    pub async fn close(mut self) {
        if let Some(mut subscription) = self.inner.take() {
            subscription.unsubscribe().await;
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(mut subscription) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { subscription.unsubscribe().await });
            }
            Err(_) => log::warn!("signature subscription dropped outside a runtime; not unsubscribed"),
        }
    }
}
