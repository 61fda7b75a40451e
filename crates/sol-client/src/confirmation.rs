//! Waiting for a sent transaction to settle.
//!
//! Every strategy races two tasks: one waits on a `signatureSubscribe`
//! stream, the other watches for the transaction becoming impossible to
//! land (a timer, the block height, or the durable nonce advancing). The
//! first to report wins. The loser is stopped, and an abandoned
//! subscription is unsubscribed by its [`SubscriptionGuard`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use sol_core::{Address, Hash, Signature};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commitment::Commitment;
use crate::error::{ClientError, RpcError, TransactionExpired};
use crate::rpc::{Response, SignatureResult, SolanaRpc, SubscriptionGuard};

pub const BLOCK_HEIGHT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const NONCE_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const NONCE_STATUS_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Status polls made after the nonce advances before giving up.
pub const NONCE_STATUS_MAX_POLLS: u32 = 150;

/// How a confirmation wait decides the transaction has expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStrategy {
    /// Give up after a fixed wall-clock timeout.
    Timeout { signature: Signature },
    /// Give up once the chain passes the blockhash's last valid height.
    BlockHeight {
        signature: Signature,
        last_valid_block_height: u64,
    },
    /// Give up once the nonce account no longer holds `nonce_value`.
    DurableNonce {
        signature: Signature,
        nonce_account: Address,
        nonce_value: Hash,
        min_context_slot: u64,
    },
}

impl ConfirmationStrategy {
    pub fn signature(&self) -> &Signature {
        match self {
            Self::Timeout { signature }
            | Self::BlockHeight { signature, .. }
            | Self::DurableNonce { signature, .. } => signature,
        }
    }

    fn watcher_name(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::BlockHeight { .. } => "block height watcher",
            Self::DurableNonce { .. } => "nonce watcher",
        }
    }
}

type Outcome = Result<Response<SignatureResult>, ClientError>;

pub struct ConfirmationEngine<R> {
    rpc: Arc<R>,
    initial_timeout: Option<Duration>,
}

impl<R: SolanaRpc + 'static> ConfirmationEngine<R> {
    /// `initial_timeout` overrides the commitment-derived timeout used by
    /// [`ConfirmationStrategy::Timeout`].
    pub fn new(rpc: Arc<R>, initial_timeout: Option<Duration>) -> Self {
        Self {
            rpc,
            initial_timeout,
        }
    }

    /// Waits until the signature reaches `commitment` or the strategy says
    /// it expired.
    ///
    /// A transaction that executed with an error still counts as settled;
    /// its error is in the returned value. Cancelling `cancel` stops both
    /// racers and returns [`ClientError::Cancelled`]. Cancellation does not
    /// recall the transaction, which may still land.
    pub async fn confirm(
        &self,
        strategy: &ConfirmationStrategy,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> Result<Response<SignatureResult>, ClientError> {
        let signature = *strategy.signature();
        let stop = cancel.child_token();
        let _stop_racers = stop.clone().drop_guard();
        let (tx, mut rx) = mpsc::channel(2);

        debug!("confirming {signature} at {commitment:?} using {}", strategy.watcher_name());

        spawn_racer(
            "subscription",
            stop.clone(),
            tx.clone(),
            wait_for_signature(self.rpc.clone(), signature, commitment),
        );
        let watcher = strategy.watcher_name();
        match strategy.clone() {
            ConfirmationStrategy::Timeout { signature } => {
                let timeout = commitment.confirmation_timeout(self.initial_timeout);
                spawn_racer(watcher, stop.clone(), tx, expire_after(signature, timeout));
            }
            ConfirmationStrategy::BlockHeight {
                signature,
                last_valid_block_height,
            } => {
                spawn_racer(
                    watcher,
                    stop.clone(),
                    tx,
                    watch_block_height(self.rpc.clone(), signature, last_valid_block_height, commitment),
                );
            }
            ConfirmationStrategy::DurableNonce {
                signature,
                nonce_account,
                nonce_value,
                min_context_slot,
            } => {
                let nonce = NonceWatch {
                    signature,
                    nonce_account,
                    nonce_value,
                    min_context_slot,
                    commitment,
                };
                spawn_racer(watcher, stop.clone(), tx, watch_nonce(self.rpc.clone(), nonce));
            }
        }

        let (winner, outcome) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("confirmation of {signature} cancelled");
                return Err(ClientError::Cancelled);
            }
            received = rx.recv() => received.ok_or(ClientError::Cancelled)?,
        };

        match &outcome {
            Ok(_) => debug!("{signature} settled; reported by {winner}"),
            Err(ClientError::Expired(expired)) => info!("{expired}"),
            Err(err) => debug!("confirmation of {signature} failed via {winner}: {err}"),
        }
        outcome
    }
}

fn spawn_racer<F>(
    name: &'static str,
    stop: CancellationToken,
    tx: mpsc::Sender<(&'static str, Outcome)>,
    work: F,
) where
    F: Future<Output = Outcome> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = stop.cancelled() => {}
            outcome = work => {
                let _ = tx.send((name, outcome)).await;
            }
        }
    });
}

/// Subscribes first, then checks the current status, so a status that lands
/// in between is never missed.
async fn wait_for_signature<R: SolanaRpc + ?Sized>(
    rpc: Arc<R>,
    signature: Signature,
    commitment: Commitment,
) -> Outcome {
    let mut subscription = SubscriptionGuard::new(rpc.signature_subscribe(&signature, commitment).await?);

    let outcome = match rpc.get_signature_status(&signature).await {
        Ok(Response {
            context,
            value: Some(status),
        }) if status.satisfies(commitment) => Some(Ok(Response {
            context,
            value: SignatureResult { err: status.err },
        })),
        Ok(_) => None,
        Err(err) => {
            debug!("status check for {signature} failed, waiting on subscription: {err}");
            None
        }
    };

    let outcome = match outcome {
        Some(outcome) => outcome,
        None => match subscription.recv().await {
            Some(notification) => notification.map_err(ClientError::from),
            None => Err(RpcError::SubscriptionClosed.into()),
        },
    };
    subscription.close().await;
    outcome
}

async fn expire_after(signature: Signature, timeout: Duration) -> Outcome {
    tokio::time::sleep(timeout).await;
    Err(TransactionExpired::Timeout { signature, timeout }.into())
}

async fn watch_block_height<R: SolanaRpc + ?Sized>(
    rpc: Arc<R>,
    signature: Signature,
    last_valid_block_height: u64,
    commitment: Commitment,
) -> Outcome {
    loop {
        match rpc.get_block_height(commitment).await {
            Ok(height) if height > last_valid_block_height => {
                return Err(TransactionExpired::BlockheightExceeded { signature }.into());
            }
            Ok(_) => {}
            Err(err) => debug!("block height poll failed: {err}"),
        }
        tokio::time::sleep(BLOCK_HEIGHT_POLL_INTERVAL).await;
    }
}

struct NonceWatch {
    signature: Signature,
    nonce_account: Address,
    nonce_value: Hash,
    min_context_slot: u64,
    commitment: Commitment,
}

/// Polls the nonce account until it no longer holds the value the
/// transaction used, then settles the outcome from the signature status at
/// a slot at least as recent as the last nonce read.
async fn watch_nonce<R: SolanaRpc + ?Sized>(rpc: Arc<R>, watch: NonceWatch) -> Outcome {
    let NonceWatch {
        signature,
        nonce_account,
        nonce_value,
        min_context_slot,
        commitment,
    } = watch;

    let mut last_checked_slot = min_context_slot;
    loop {
        match rpc
            .get_nonce_account(&nonce_account, commitment, Some(min_context_slot))
            .await
        {
            Ok(Response { context, value }) => {
                last_checked_slot = context.slot;
                match value {
                    Some(account) if account.nonce == nonce_value => {}
                    Some(account) => {
                        debug!("nonce {nonce_account} advanced to {}", account.nonce);
                        break;
                    }
                    None => {
                        debug!("nonce account {nonce_account} not found");
                        break;
                    }
                }
            }
            Err(err) => debug!("nonce poll failed: {err}"),
        }
        tokio::time::sleep(NONCE_POLL_INTERVAL).await;
    }

    for _ in 0..NONCE_STATUS_MAX_POLLS {
        match rpc.get_signature_status(&signature).await {
            Ok(Response { context, value }) if context.slot >= last_checked_slot => {
                return match value {
                    Some(status) if status.satisfies(commitment) => Ok(Response {
                        context,
                        value: SignatureResult { err: status.err },
                    }),
                    _ => Err(TransactionExpired::NonceInvalid { signature }.into()),
                };
            }
            Ok(_) => {}
            Err(err) => debug!("status poll for {signature} failed: {err}"),
        }
        tokio::time::sleep(NONCE_STATUS_POLL_INTERVAL).await;
    }
    Err(TransactionExpired::NonceInvalid { signature }.into())
}
