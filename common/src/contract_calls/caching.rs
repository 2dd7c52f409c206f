//! Caching and rate limiting around any [`ContractReader`]
//!
//! On-chain view results used here never change once observed, including
//! reverts, so they are cached forever.  The conversion rate is the exception
//! and always goes to the inner reader.

use super::{ContractCallError, ContractReader};
use crate::hash::{Address, Bytes32};
use crate::types::{ChainId, Wad};
use async_trait::async_trait;
use config::Config;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

const DEFAULT_RATE_LIMIT_PER_SECOND: i64 = 10;

pub struct CachingContractReader {
    inner: Arc<dyn ContractReader>,

    slate_members: DashMap<(ChainId, Address, Bytes32, u64), Option<Address>>,
    descriptions: DashMap<(ChainId, Address), Option<String>>,
    expirations: DashMap<(ChainId, Address), Option<u64>>,
    owner_urns: DashMap<(ChainId, Address, Address, u64), Option<Address>>,
    pool_coins: DashMap<(ChainId, Address, u64), Option<Address>>,

    /// Minimum spacing between calls to the inner reader, if limited
    period: Option<Duration>,
    next_call: Mutex<Instant>,

    calls: AtomicU64,
    hits: AtomicU64,
}

impl CachingContractReader {
    pub fn new(inner: Arc<dyn ContractReader>, rate_limit_per_second: u32) -> Self {
        let period = match rate_limit_per_second {
            0 => None,
            rate => Some(Duration::from_secs(1) / rate),
        };
        Self {
            inner,
            slate_members: DashMap::new(),
            descriptions: DashMap::new(),
            expirations: DashMap::new(),
            owner_urns: DashMap::new(),
            pool_coins: DashMap::new(),
            period,
            next_call: Mutex::new(Instant::now()),
            calls: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Rate limit from `contract-calls.rate-limit-per-second`
    pub fn from_config(inner: Arc<dyn ContractReader>, config: &Config) -> Self {
        let rate = config
            .get_int("contract-calls.rate-limit-per-second")
            .unwrap_or(DEFAULT_RATE_LIMIT_PER_SECOND);
        Self::new(inner, rate.clamp(0, u32::MAX as i64) as u32)
    }

    /// (calls made to the inner reader, cache hits)
    pub fn stats(&self) -> (u64, u64) {
        (self.calls.load(Ordering::Relaxed), self.hits.load(Ordering::Relaxed))
    }

    /// Wait for the next slot in the call budget
    async fn throttle(&self) {
        let Some(period) = self.period else {
            return;
        };
        let mut next_call = self.next_call.lock().await;
        let now = Instant::now();
        if *next_call > now {
            sleep_until(*next_call).await;
        }
        *next_call = (*next_call).max(now) + period;
    }

    async fn cached<K, V, F, Fut>(
        &self,
        cache: &DashMap<K, Option<V>>,
        key: K,
        call: F,
    ) -> Result<Option<V>, ContractCallError>
    where
        K: Eq + Hash + Clone,
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, ContractCallError>>,
    {
        if let Some(hit) = cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.value().clone());
        }

        self.throttle().await;
        self.calls.fetch_add(1, Ordering::Relaxed);

        // Errors are not cached, the next event retries
        let result = call().await?;
        cache.insert(key, result.clone());
        Ok(result)
    }
}

#[async_trait]
impl ContractReader for CachingContractReader {
    async fn slate_member(
        &self,
        chain_id: ChainId,
        chief: &Address,
        slate: &Bytes32,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.cached(&self.slate_members, (chain_id, *chief, *slate, index), || {
            self.inner.slate_member(chain_id, chief, slate, index)
        })
        .await
    }

    async fn spell_description(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<String>, ContractCallError> {
        self.cached(&self.descriptions, (chain_id, *spell), || {
            self.inner.spell_description(chain_id, spell)
        })
        .await
    }

    async fn spell_expiration(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<u64>, ContractCallError> {
        self.cached(&self.expirations, (chain_id, *spell), || {
            self.inner.spell_expiration(chain_id, spell)
        })
        .await
    }

    async fn conversion_rate(
        &self,
        chain_id: ChainId,
        converter: &Address,
    ) -> Result<Option<Wad>, ContractCallError> {
        self.throttle().await;
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!("Reading conversion rate of {converter} on chain {chain_id}");
        self.inner.conversion_rate(chain_id, converter).await
    }

    async fn owner_urn(
        &self,
        chain_id: ChainId,
        engine: &Address,
        owner: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.cached(&self.owner_urns, (chain_id, *engine, *owner, index), || {
            self.inner.owner_urn(chain_id, engine, owner, index)
        })
        .await
    }

    async fn pool_coin(
        &self,
        chain_id: ChainId,
        pool: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.cached(&self.pool_coins, (chain_id, *pool, index), || {
            self.inner.pool_coin(chain_id, pool, index)
        })
        .await
    }
}
