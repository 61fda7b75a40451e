use std::sync::Arc;

use log::debug;
use sol_core::{Signature, Signer, SolError, Transaction, VersionedTransaction};
use tokio_util::sync::CancellationToken;

use crate::blockhash_cache::BlockhashCache;
use crate::commitment::Commitment;
use crate::config::ConnectionConfig;
use crate::confirmation::{ConfirmationEngine, ConfirmationStrategy};
use crate::error::ClientError;
use crate::retry::RetryingRpc;
use crate::rpc::{ConfirmOptions, LatestBlockhash, Response, SendOptions, SignatureResult, SolanaRpc};

/// A client bound to one node: the send path, the blockhash cache and the
/// confirmation engine share it.
pub struct Connection<R> {
    rpc: Arc<R>,
    config: ConnectionConfig,
    blockhash_cache: BlockhashCache,
    engine: ConfirmationEngine<R>,
}

impl<R: SolanaRpc + 'static> Connection<RetryingRpc<R>> {
    /// Wraps `rpc` in [`RetryingRpc`] using `config.retry`. `cancel` aborts
    /// any request or backoff in flight for the life of the connection.
    pub fn with_retry(rpc: R, config: ConnectionConfig, cancel: CancellationToken) -> Self {
        let retrying = RetryingRpc::new(rpc, config.retry.clone(), cancel);
        Self::new(retrying, config)
    }
}

impl<R: SolanaRpc + 'static> Connection<R> {
    pub fn new(rpc: R, config: ConnectionConfig) -> Self {
        let rpc = Arc::new(rpc);
        Self {
            engine: ConfirmationEngine::new(rpc.clone(), config.confirm_transaction_initial_timeout()),
            blockhash_cache: BlockhashCache::new(config.blockhash_cache_ttl()),
            rpc,
            config,
        }
    }

    pub fn commitment(&self) -> Commitment {
        self.config.commitment
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn blockhash_cache(&self) -> &BlockhashCache {
        &self.blockhash_cache
    }

    /// The cached blockhash, refreshed when it is older than the TTL.
    pub async fn latest_blockhash(&self, cancel: &CancellationToken) -> Result<LatestBlockhash, ClientError> {
        self.blockhash_cache
            .get_or_refresh(self.rpc.as_ref(), self.config.disable_blockhash_caching, cancel)
            .await
    }

    /// Signs and sends a legacy transaction.
    ///
    /// A durable-nonce transaction keeps its nonce and is signed only when
    /// `signers` is non-empty. Any other transaction gets the cached
    /// blockhash. If the resulting signature was already sent under that
    /// blockhash, the cache is force-refreshed and the transaction re-signed,
    /// so no two sends on this connection are byte-identical.
    pub async fn send_transaction<S: Signer>(
        &self,
        transaction: &mut Transaction,
        signers: &[S],
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<Signature, ClientError> {
        if transaction.nonce_info.is_some() {
            if !signers.is_empty() {
                transaction.sign(signers)?;
            }
        } else {
            let mut force_refresh = self.config.disable_blockhash_caching;
            loop {
                let latest = self
                    .blockhash_cache
                    .get_or_refresh(self.rpc.as_ref(), force_refresh, cancel)
                    .await?;
                transaction.recent_blockhash = Some(latest.blockhash);
                transaction.last_valid_block_height = Some(latest.last_valid_block_height);
                transaction.sign(signers)?;

                let signature = transaction.signature().ok_or(SolError::FeePayerRequired)?;
                if self.blockhash_cache.record_signature(signature) {
                    break;
                }
                debug!(
                    "{signature} was already sent under blockhash {}; refreshing",
                    latest.blockhash
                );
                force_refresh = true;
            }
        }

        let wire = transaction.serialize()?;
        self.send_raw_transaction(&wire, options, cancel).await
    }

    /// Sends an already signed transaction as is.
    pub async fn send_versioned_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<Signature, ClientError> {
        let wire = transaction.serialize()?;
        self.send_raw_transaction(&wire, options, cancel).await
    }

    /// Submits wire bytes. The preflight commitment defaults to the
    /// connection's commitment.
    pub async fn send_raw_transaction(
        &self,
        wire: &[u8],
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<Signature, ClientError> {
        let mut options = *options;
        options.preflight_commitment.get_or_insert(self.config.commitment);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            sent = self.rpc.send_raw_transaction(wire, &options) => Ok(sent?),
        }
    }

    /// Sends `transaction` and waits for it at `options.commitment`.
    ///
    /// The expiry strategy follows what the transaction carries: its
    /// blockhash's last valid height, else its durable nonce, else a plain
    /// timeout. A transaction that executed with an error yields
    /// [`ClientError::TransactionFailed`].
    pub async fn send_and_confirm_transaction<S: Signer>(
        &self,
        transaction: &mut Transaction,
        signers: &[S],
        options: &ConfirmOptions,
        cancel: &CancellationToken,
    ) -> Result<Signature, ClientError> {
        let signature = self
            .send_transaction(transaction, signers, &options.send, cancel)
            .await?;
        let strategy = strategy_for(transaction, signature)?;

        let response = self
            .confirm_transaction(&strategy, options.commitment, cancel)
            .await?;
        match response.value.err {
            Some(err) => Err(ClientError::TransactionFailed { signature, err }),
            None => Ok(signature),
        }
    }

    /// Waits for a signature using an explicit strategy. `commitment`
    /// defaults to the connection's.
    pub async fn confirm_transaction(
        &self,
        strategy: &ConfirmationStrategy,
        commitment: Option<Commitment>,
        cancel: &CancellationToken,
    ) -> Result<Response<SignatureResult>, ClientError> {
        let commitment = commitment.unwrap_or(self.config.commitment);
        self.engine.confirm(strategy, commitment, cancel).await
    }
}

fn strategy_for(transaction: &Transaction, signature: Signature) -> Result<ConfirmationStrategy, ClientError> {
    if let (Some(_), Some(last_valid_block_height)) =
        (transaction.recent_blockhash, transaction.last_valid_block_height)
    {
        return Ok(ConfirmationStrategy::BlockHeight {
            signature,
            last_valid_block_height,
        });
    }

    if let (Some(nonce_info), Some(min_context_slot)) =
        (&transaction.nonce_info, transaction.min_nonce_context_slot)
    {
        let nonce_account = nonce_info
            .nonce_instruction
            .accounts
            .first()
            .map(|meta| meta.pubkey)
            .ok_or_else(|| {
                SolError::InvalidInstructionData("advance nonce instruction has no accounts".into())
            })?;
        return Ok(ConfirmationStrategy::DurableNonce {
            signature,
            nonce_account,
            nonce_value: nonce_info.nonce,
            min_context_slot,
        });
    }

    Ok(ConfirmationStrategy::Timeout { signature })
}
