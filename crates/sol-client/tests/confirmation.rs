//! Send and confirmation paths against an in-memory node.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sol_client::{
    ClientError, Commitment, ConfirmOptions, ConfirmationEngine, ConfirmationStrategy, Connection,
    ConnectionConfig, LatestBlockhash, Response, RpcContext, RpcError, SendOptions,
    SignatureResult, SignatureStatus, SignatureSubscription, SolanaRpc,
    TransactionConfirmationStatus, TransactionExpired,
};
use sol_core::programs::system;
use sol_core::{Address, Hash, Keypair, NonceAccount, Signature, Signer, Transaction, VersionedTransaction};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Notification = Result<Response<SignatureResult>, RpcError>;

/// A node whose answers the test sets directly.
#[derive(Default)]
struct FakeNode {
    slot: AtomicU64,
    block_height: AtomicU64,
    status: Mutex<Option<SignatureStatus>>,
    nonce: Mutex<Option<NonceAccount>>,
    /// Served front to back; the last one repeats.
    blockhashes: Mutex<VecDeque<LatestBlockhash>>,
    blockhash_latency: Mutex<Duration>,
    blockhash_calls: AtomicU32,
    rate_limited_sends: AtomicU32,
    sent: Mutex<Vec<Vec<u8>>>,
    /// Delivered to every new subscription straight away.
    preset_notification: Mutex<Option<Notification>>,
    notifiers: Mutex<Vec<mpsc::UnboundedSender<Notification>>>,
    subscriptions: AtomicU32,
    unsubscribes: Arc<AtomicU32>,
}

impl FakeNode {
    fn with_blockhashes(hashes: &[(u8, u64)]) -> Self {
        let node = Self::default();
        *node.blockhashes.lock().unwrap() = hashes
            .iter()
            .map(|&(byte, height)| LatestBlockhash {
                blockhash: Hash::new([byte; 32]),
                last_valid_block_height: height,
            })
            .collect();
        node
    }

    fn set_status(&self, status: TransactionConfirmationStatus, err: Option<serde_json::Value>) {
        *self.status.lock().unwrap() = Some(SignatureStatus {
            slot: self.slot.load(Ordering::SeqCst),
            confirmations: None,
            err,
            confirmation_status: Some(status),
        });
    }

    fn set_nonce(&self, value: Hash) {
        *self.nonce.lock().unwrap() = Some(NonceAccount {
            version: 1,
            state: 1,
            authorized_pubkey: Address::new([5; 32]),
            nonce: value,
            lamports_per_signature: 5_000,
        });
    }

    fn notify(&self, notification: Notification) {
        for sender in self.notifiers.lock().unwrap().iter() {
            let _ = sender.send(notification.clone());
        }
    }

    fn context(&self) -> RpcContext {
        RpcContext {
            slot: self.slot.load(Ordering::SeqCst),
        }
    }

    fn unsubscribes(&self) -> u32 {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

struct FakeSubscription {
    rx: mpsc::UnboundedReceiver<Notification>,
    unsubscribes: Arc<AtomicU32>,
}

#[async_trait]
impl SignatureSubscription for FakeSubscription {
    async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    async fn unsubscribe(&mut self) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SolanaRpc for FakeNode {
    async fn send_raw_transaction(&self, wire: &[u8], _: &SendOptions) -> Result<Signature, RpcError> {
        let limited = self
            .rate_limited_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if limited {
            return Err(RpcError::RateLimited { retry_after: None });
        }

        let transaction = VersionedTransaction::deserialize(wire).map_err(|err| RpcError::Response {
            code: -32602,
            message: err.to_string(),
        })?;
        self.sent.lock().unwrap().push(wire.to_vec());
        Ok(transaction.signatures[0])
    }

    async fn get_latest_blockhash(&self, _: Commitment) -> Result<LatestBlockhash, RpcError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.blockhash_latency.lock().unwrap();
        tokio::time::sleep(latency).await;

        let mut hashes = self.blockhashes.lock().unwrap();
        let latest = if hashes.len() > 1 {
            hashes.pop_front()
        } else {
            hashes.front().copied()
        };
        latest.ok_or_else(|| RpcError::Transport("no blockhash scripted".into()))
    }

    async fn get_signature_status(
        &self,
        _: &Signature,
    ) -> Result<Response<Option<SignatureStatus>>, RpcError> {
        Ok(Response {
            context: self.context(),
            value: self.status.lock().unwrap().clone(),
        })
    }

    async fn get_block_height(&self, _: Commitment) -> Result<u64, RpcError> {
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn get_nonce_account(
        &self,
        _: &Address,
        _: Commitment,
        _: Option<u64>,
    ) -> Result<Response<Option<NonceAccount>>, RpcError> {
        Ok(Response {
            context: self.context(),
            value: self.nonce.lock().unwrap().clone(),
        })
    }

    async fn signature_subscribe(
        &self,
        _: &Signature,
        _: Commitment,
    ) -> Result<Box<dyn SignatureSubscription>, RpcError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(notification) = self.preset_notification.lock().unwrap().clone() {
            let _ = tx.send(notification);
        }
        self.notifiers.lock().unwrap().push(tx);
        Ok(Box::new(FakeSubscription {
            rx,
            unsubscribes: self.unsubscribes.clone(),
        }))
    }
}

fn signature() -> Signature {
    Signature::new([8; 64])
}

fn landed(slot: u64, err: Option<serde_json::Value>) -> Notification {
    Ok(Response {
        context: RpcContext { slot },
        value: SignatureResult { err },
    })
}

/// Lets detached tasks (abandoned racers, background unsubscribes) run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn transfer(payer: &Keypair) -> Transaction {
    let mut tx = Transaction::new();
    tx.add_instruction(system::transfer(&payer.pubkey(), &Address::new([4; 32]), 1_000));
    tx
}

// -- block height strategy ---------------------------------------------------

#[tokio::test(start_paused = true)]
async fn block_height_expiry_beats_a_silent_subscription() {
    let node = Arc::new(FakeNode::default());
    node.block_height.store(1_000, Ordering::SeqCst);
    let engine = ConfirmationEngine::new(node.clone(), None);

    let strategy = ConfirmationStrategy::BlockHeight {
        signature: signature(),
        last_valid_block_height: 500,
    };
    let err = engine
        .confirm(&strategy, Commitment::Confirmed, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Expired(TransactionExpired::BlockheightExceeded {
            signature: signature()
        })
    );

    settle().await;
    assert_eq!(node.subscriptions.load(Ordering::SeqCst), 1);
    assert_eq!(node.unsubscribes(), 1);
}

#[tokio::test(start_paused = true)]
async fn notification_wins_while_height_is_valid() {
    let node = Arc::new(FakeNode::default());
    node.block_height.store(10, Ordering::SeqCst);
    let engine = ConfirmationEngine::new(node.clone(), None);

    let notifier = {
        let node = node.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            node.notify(landed(42, None));
        })
    };

    let strategy = ConfirmationStrategy::BlockHeight {
        signature: signature(),
        last_valid_block_height: 500,
    };
    let started = Instant::now();
    let response = engine
        .confirm(&strategy, Commitment::Confirmed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.context.slot, 42);
    assert_eq!(response.value.err, None);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    notifier.await.unwrap();

    settle().await;
    assert_eq!(node.unsubscribes(), 1);
}

#[tokio::test(start_paused = true)]
async fn current_status_settles_without_a_notification() {
    let node = Arc::new(FakeNode::default());
    node.slot.store(9, Ordering::SeqCst);
    node.set_status(TransactionConfirmationStatus::Finalized, None);
    let engine = ConfirmationEngine::new(node.clone(), None);

    let strategy = ConfirmationStrategy::BlockHeight {
        signature: signature(),
        last_valid_block_height: 500,
    };
    let response = engine
        .confirm(&strategy, Commitment::Confirmed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.context.slot, 9);
}

// -- timeout strategy --------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn processed_status_does_not_satisfy_confirmed() {
    let node = Arc::new(FakeNode::default());
    node.set_status(TransactionConfirmationStatus::Processed, None);
    let engine = ConfirmationEngine::new(node.clone(), None);

    let started = Instant::now();
    let err = engine
        .confirm(
            &ConfirmationStrategy::Timeout {
                signature: signature(),
            },
            Commitment::Confirmed,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Expired(TransactionExpired::Timeout {
            signature: signature(),
            timeout: Duration::from_secs(30),
        })
    );
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_overrides_the_default() {
    let node = Arc::new(FakeNode::default());
    let engine = ConfirmationEngine::new(node, Some(Duration::from_secs(5)));

    let started = Instant::now();
    let err = engine
        .confirm(
            &ConfirmationStrategy::Timeout {
                signature: signature(),
            },
            Commitment::Finalized,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Expired(TransactionExpired::Timeout { .. })
    ));
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

// -- durable nonce strategy --------------------------------------------------

fn nonce_strategy(value: Hash) -> ConfirmationStrategy {
    ConfirmationStrategy::DurableNonce {
        signature: signature(),
        nonce_account: Address::new([6; 32]),
        nonce_value: value,
        min_context_slot: 10,
    }
}

#[tokio::test(start_paused = true)]
async fn advanced_nonce_without_landing_is_invalid() {
    let node = Arc::new(FakeNode::default());
    node.slot.store(12, Ordering::SeqCst);
    node.set_nonce(Hash::new([2; 32]));
    let engine = ConfirmationEngine::new(node.clone(), None);

    let err = engine
        .confirm(
            &nonce_strategy(Hash::new([1; 32])),
            Commitment::Confirmed,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Expired(TransactionExpired::NonceInvalid {
            signature: signature()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn advanced_nonce_settles_from_status_when_subscription_is_silent() {
    let original = Hash::new([1; 32]);
    let node = Arc::new(FakeNode::default());
    node.slot.store(12, Ordering::SeqCst);
    node.set_nonce(original);
    let engine = ConfirmationEngine::new(node.clone(), None);

    // The transaction lands and advances the nonce after the first poll.
    let lander = {
        let node = node.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            node.slot.store(20, Ordering::SeqCst);
            node.set_status(TransactionConfirmationStatus::Confirmed, None);
            node.set_nonce(Hash::new([2; 32]));
        })
    };

    let started = Instant::now();
    let response = engine
        .confirm(&nonce_strategy(original), Commitment::Confirmed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.context.slot, 20);
    // Nonce polls at 0s, 2s and 4s; the change is seen on the third.
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    lander.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_nonce_account_counts_as_advanced() {
    let node = Arc::new(FakeNode::default());
    node.slot.store(12, Ordering::SeqCst);
    let engine = ConfirmationEngine::new(node, None);

    let err = engine
        .confirm(
            &nonce_strategy(Hash::new([1; 32])),
            Commitment::Processed,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Expired(TransactionExpired::NonceInvalid { .. })
    ));
}

// -- cancellation ------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancellation_is_not_expiry() {
    let node = Arc::new(FakeNode::default());
    let engine = ConfirmationEngine::new(node.clone(), None);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancel.cancel();
        })
    };

    let started = Instant::now();
    let err = engine
        .confirm(
            &ConfirmationStrategy::Timeout {
                signature: signature(),
            },
            Commitment::Finalized,
            &cancel,
        )
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Cancelled);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    canceller.await.unwrap();

    settle().await;
    assert_eq!(node.unsubscribes(), 1);
}

// -- connection send path ----------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_sends_share_one_blockhash_fetch() {
    let node = FakeNode::with_blockhashes(&[(1, 300)]);
    *node.blockhash_latency.lock().unwrap() = Duration::from_millis(150);
    let connection = Connection::new(node, ConnectionConfig::default());
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        connection.latest_blockhash(&cancel),
        connection.latest_blockhash(&cancel),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(connection.rpc().blockhash_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn identical_resend_moves_to_a_new_blockhash() {
    let connection = Connection::new(
        FakeNode::with_blockhashes(&[(1, 300), (2, 301)]),
        ConnectionConfig::default(),
    );
    let payer = Keypair::from_seed(&[7; 32]).unwrap();
    let cancel = CancellationToken::new();

    let mut first = transfer(&payer);
    let first_signature = connection
        .send_transaction(&mut first, &[&payer], &SendOptions::default(), &cancel)
        .await
        .unwrap();
    let mut second = transfer(&payer);
    let second_signature = connection
        .send_transaction(&mut second, &[&payer], &SendOptions::default(), &cancel)
        .await
        .unwrap();

    assert_ne!(first_signature, second_signature);
    assert_eq!(first.recent_blockhash, Some(Hash::new([1; 32])));
    assert_eq!(second.recent_blockhash, Some(Hash::new([2; 32])));
    assert_eq!(second.last_valid_block_height, Some(301));

    let node = connection.rpc();
    assert_eq!(node.blockhash_calls.load(Ordering::SeqCst), 2);
    let sent = node.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0], sent[1]);
}

#[tokio::test(start_paused = true)]
async fn send_and_confirm_reports_execution_failure() {
    let node = FakeNode::with_blockhashes(&[(1, 300)]);
    *node.preset_notification.lock().unwrap() = Some(landed(
        50,
        Some(json!({"InstructionError": [0, {"Custom": 1}]})),
    ));
    let connection = Connection::new(node, ConnectionConfig::default());
    let payer = Keypair::from_seed(&[7; 32]).unwrap();

    let mut tx = transfer(&payer);
    let err = connection
        .send_and_confirm_transaction(&mut tx, &[&payer], &ConfirmOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ClientError::TransactionFailed { signature, err } => {
            assert_eq!(Some(signature), tx.signature());
            assert_eq!(err["InstructionError"][0], 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn send_and_confirm_through_rate_limiting() {
    let node = FakeNode::with_blockhashes(&[(1, 300)]);
    node.rate_limited_sends.store(2, Ordering::SeqCst);
    *node.preset_notification.lock().unwrap() = Some(landed(50, None));
    let cancel = CancellationToken::new();
    let connection = Connection::with_retry(node, ConnectionConfig::default(), cancel.clone());
    let payer = Keypair::from_seed(&[7; 32]).unwrap();

    let mut tx = transfer(&payer);
    let started = Instant::now();
    let signature = connection
        .send_and_confirm_transaction(&mut tx, &[&payer], &ConfirmOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(Some(signature), tx.signature());
    // Two 429s: 500ms then 1000ms of backoff.
    assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    assert_eq!(connection.rpc().inner().sent.lock().unwrap().len(), 1);
}
