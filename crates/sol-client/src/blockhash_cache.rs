//! Recent-blockhash cache with single-flight refresh and send-path dedup.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use sol_core::Signature;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::commitment::Commitment;
use crate::error::ClientError;
use crate::rpc::{LatestBlockhash, SolanaRpc};

/// Attempts made to observe a blockhash different from the cached one.
pub const MAX_REFRESH_ATTEMPTS: u32 = 50;

/// Half a slot; the pause between refresh attempts.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(200);

/// How often a caller re-checks while another refresh is in flight.
const BUSY_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    latest: LatestBlockhash,
    fetched_at: Instant,
}

/// Shared by every send on one connection.
///
/// Only one refresh runs at a time. Callers that arrive during a refresh
/// wait on the busy flag and then take whatever it stored. The set of
/// signatures sent under the current blockhash is cleared whenever a new
/// blockhash is stored.
#[derive(Debug)]
pub struct BlockhashCache {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
    polling: AtomicBool,
    sent: Mutex<HashSet<Signature>>,
}

/// Clears the busy flag when the refresh ends, including by cancellation.
struct PollingGuard<'a>(&'a AtomicBool);

impl<'a> PollingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BlockhashCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
            polling: AtomicBool::new(false),
            sent: Mutex::new(HashSet::new()),
        }
    }

    /// The cached blockhash regardless of age.
    pub fn cached(&self) -> Option<LatestBlockhash> {
        self.lock_entry().map(|entry| entry.latest)
    }

    fn fresh(&self) -> Option<LatestBlockhash> {
        self.lock_entry()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.latest)
    }

    fn lock_entry(&self) -> Option<CacheEntry> {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a blockhash younger than the TTL, refreshing if needed.
    ///
    /// With `force_refresh` the blockhash cached at call time is never
    /// returned; the caller gets one stored after it, either by its own
    /// refresh or by one that was already in flight.
    pub async fn get_or_refresh<R: SolanaRpc + ?Sized>(
        &self,
        rpc: &R,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<LatestBlockhash, ClientError> {
        let stale = if force_refresh {
            self.cached().map(|latest| latest.blockhash)
        } else {
            None
        };
        let usable = |latest: &LatestBlockhash| !force_refresh || Some(latest.blockhash) != stale;

        loop {
            if let Some(latest) = self.fresh().filter(usable) {
                return Ok(latest);
            }

            if let Some(_busy) = PollingGuard::acquire(&self.polling) {
                // A refresh may have finished between the check and the acquire.
                if let Some(latest) = self.fresh().filter(usable) {
                    return Ok(latest);
                }
                return self.poll_new_blockhash(rpc, cancel).await;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(BUSY_WAIT) => {}
            }
        }
    }

    async fn poll_new_blockhash<R: SolanaRpc + ?Sized>(
        &self,
        rpc: &R,
        cancel: &CancellationToken,
    ) -> Result<LatestBlockhash, ClientError> {
        let started = Instant::now();
        let previous = self.cached().map(|latest| latest.blockhash);

        for attempt in 1..=MAX_REFRESH_ATTEMPTS {
            let latest = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                latest = rpc.get_latest_blockhash(Commitment::Finalized) => latest?,
            };

            if previous != Some(latest.blockhash) {
                debug!(
                    "blockhash refreshed to {} (valid through height {}) after {attempt} attempt(s)",
                    latest.blockhash, latest.last_valid_block_height
                );
                self.store(latest);
                return Ok(latest);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
            }
        }

        Err(ClientError::BlockhashStale {
            attempts: MAX_REFRESH_ATTEMPTS,
            elapsed: started.elapsed(),
        })
    }

    fn store(&self, latest: LatestBlockhash) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(CacheEntry {
            latest,
            fetched_at: Instant::now(),
        });
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Records a signature about to be sent under the current blockhash.
    /// Returns `false` if the same signature was already sent.
    pub fn record_signature(&self, signature: Signature) -> bool {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature)
    }

    pub fn was_sent(&self, signature: &Signature) -> bool {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::rpc::{Response, SendOptions, SignatureStatus, SignatureSubscription};
    use async_trait::async_trait;
    use sol_core::{Address, Hash, NonceAccount};
    use std::sync::atomic::AtomicU32;

    /// Serves `getLatestBlockhash`, switching to a new hash every
    /// `hold` calls. Each call takes `latency`.
    struct Rotating {
        calls: AtomicU32,
        hold: u32,
        latency: Duration,
    }

    impl Rotating {
        fn new(hold: u32, latency: Duration) -> Self {
            Self {
                calls: AtomicU32::new(0),
                hold,
                latency,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SolanaRpc for Rotating {
        async fn send_raw_transaction(&self, _: &[u8], _: &SendOptions) -> Result<Signature, RpcError> {
            unimplemented!()
        }

        async fn get_latest_blockhash(&self, _: Commitment) -> Result<LatestBlockhash, RpcError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            let generation = (n / self.hold) as u8;
            Ok(LatestBlockhash {
                blockhash: Hash::new([generation + 1; 32]),
                last_valid_block_height: 100 + u64::from(generation),
            })
        }

        async fn get_signature_status(
            &self,
            _: &Signature,
        ) -> Result<Response<Option<SignatureStatus>>, RpcError> {
            unimplemented!()
        }

        async fn get_block_height(&self, _: Commitment) -> Result<u64, RpcError> {
            unimplemented!()
        }

        async fn get_nonce_account(
            &self,
            _: &Address,
            _: Commitment,
            _: Option<u64>,
        ) -> Result<Response<Option<NonceAccount>>, RpcError> {
            unimplemented!()
        }

        async fn signature_subscribe(
            &self,
            _: &Signature,
            _: Commitment,
        ) -> Result<Box<dyn SignatureSubscription>, RpcError> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_value_is_reused_within_ttl() {
        let rpc = Rotating::new(1, Duration::ZERO);
        let cache = BlockhashCache::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let first = cache.get_or_refresh(&rpc, false, &cancel).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        let second = cache.get_or_refresh(&rpc, false, &cancel).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(rpc.calls(), 1);

        tokio::time::advance(Duration::from_secs(25)).await;
        let third = cache.get_or_refresh(&rpc, false, &cancel).await.unwrap();
        assert_ne!(third.blockhash, first.blockhash);
        assert_eq!(rpc.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_fetch() {
        let rpc = Rotating::new(1, Duration::from_millis(250));
        let cache = BlockhashCache::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            cache.get_or_refresh(&rpc, false, &cancel),
            cache.get_or_refresh(&rpc, false, &cancel),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(rpc.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_waits_for_a_different_blockhash() {
        // The node keeps returning the same hash for three calls.
        let rpc = Rotating::new(3, Duration::ZERO);
        let cache = BlockhashCache::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let first = cache.get_or_refresh(&rpc, false, &cancel).await.unwrap();
        let started = Instant::now();
        let forced = cache.get_or_refresh(&rpc, true, &cancel).await.unwrap();
        assert_ne!(forced.blockhash, first.blockhash);
        // Calls 2 and 3 still see the first hash.
        assert_eq!(rpc.calls(), 4);
        assert_eq!(started.elapsed(), REFRESH_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_node_exhausts_attempts() {
        let rpc = Rotating::new(u32::MAX, Duration::ZERO);
        let cache = BlockhashCache::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        cache.get_or_refresh(&rpc, false, &cancel).await.unwrap();
        let err = cache.get_or_refresh(&rpc, true, &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::BlockhashStale {
                attempts: MAX_REFRESH_ATTEMPTS,
                ..
            }
        ));
        assert_eq!(rpc.calls(), 1 + MAX_REFRESH_ATTEMPTS);
        // The busy flag is released for the next caller.
        assert!(!cache.polling.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_resets_sent_signatures() {
        let rpc = Rotating::new(1, Duration::ZERO);
        let cache = BlockhashCache::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let signature = Signature::new([9; 64]);

        cache.get_or_refresh(&rpc, false, &cancel).await.unwrap();
        assert!(cache.record_signature(signature));
        assert!(!cache.record_signature(signature));
        assert!(cache.was_sent(&signature));

        cache.get_or_refresh(&rpc, true, &cancel).await.unwrap();
        assert!(!cache.was_sent(&signature));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_releases_the_busy_flag() {
        let rpc = Rotating::new(1, Duration::from_secs(5));
        let cache = BlockhashCache::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache.get_or_refresh(&rpc, false, &cancel).await.unwrap_err();
        assert_eq!(err, ClientError::Cancelled);
        assert!(!cache.polling.load(Ordering::SeqCst));
    }
}
