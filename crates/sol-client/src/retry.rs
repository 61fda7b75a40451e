//! Backoff for transport failures and rate limiting.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use sol_core::{Address, NonceAccount, Signature};
use tokio_util::sync::CancellationToken;

use crate::commitment::Commitment;
use crate::config::RetryConfig;
use crate::error::RpcError;
use crate::rpc::{
    LatestBlockhash, Response, SendOptions, SignatureStatus, SignatureSubscription, SolanaRpc,
};

/// Wraps a [`SolanaRpc`] and retries failures that
/// [`RpcError::is_retryable`] accepts.
///
/// Every call gives up with [`RpcError::Cancelled`] as soon as `cancel`
/// fires, whether it is waiting on the node or sleeping between attempts.
/// `signatureSubscribe` is passed through untouched.
pub struct RetryingRpc<R> {
    inner: R,
    config: RetryConfig,
    cancel: CancellationToken,
}

impl<R: SolanaRpc> RetryingRpc<R> {
    pub fn new(inner: R, config: RetryConfig, cancel: CancellationToken) -> Self {
        Self {
            inner,
            config,
            cancel,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, method: &str, mut call: F) -> Result<T, RpcError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RpcError>> + Send,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RpcError::Cancelled),
                result = call() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => err,
                Err(err) => return Err(err),
            };

            let delay = retry_delay(&err, &self.config, attempt);
            debug!("{method} attempt {attempt}/{max_attempts} failed ({err}); retrying in {delay:?}");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RpcError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

fn retry_delay(err: &RpcError, config: &RetryConfig, attempt: u32) -> Duration {
    match err {
        RpcError::RateLimited {
            retry_after: Some(retry_after),
        } => *retry_after,
        _ => config.backoff(attempt),
    }
}

#[async_trait]
impl<R: SolanaRpc> SolanaRpc for RetryingRpc<R> {
    async fn send_raw_transaction(
        &self,
        wire: &[u8],
        options: &SendOptions,
    ) -> Result<Signature, RpcError> {
        self.with_retry("sendTransaction", || self.inner.send_raw_transaction(wire, options))
            .await
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash, RpcError> {
        self.with_retry("getLatestBlockhash", || self.inner.get_latest_blockhash(commitment))
            .await
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Response<Option<SignatureStatus>>, RpcError> {
        self.with_retry("getSignatureStatuses", || self.inner.get_signature_status(signature))
            .await
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError> {
        self.with_retry("getBlockHeight", || self.inner.get_block_height(commitment))
            .await
    }

    async fn get_nonce_account(
        &self,
        address: &Address,
        commitment: Commitment,
        min_context_slot: Option<u64>,
    ) -> Result<Response<Option<NonceAccount>>, RpcError> {
        self.with_retry("getAccountInfo", || {
            self.inner.get_nonce_account(address, commitment, min_context_slot)
        })
        .await
    }

    async fn signature_subscribe(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Box<dyn SignatureSubscription>, RpcError> {
        self.inner.signature_subscribe(signature, commitment).await
    }
}
