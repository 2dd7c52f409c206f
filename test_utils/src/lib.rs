//! Test helpers for Agora modules: a scriptable contract reader, log
//! builders and a throwaway entity database

use agora_common::{
    contract_calls::{ContractCallError, ContractReader},
    store::{EntityDb, InMemoryEntityStore},
    Address, Bytes32, ChainId, LogInfo, TxHash, Wad,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic address whose every byte is `n`
pub fn address(n: u8) -> Address {
    Address::new([n; 20])
}

/// Deterministic slate id whose every byte is `n`
pub fn slate(n: u8) -> Bytes32 {
    Bytes32::new([n; 32])
}

/// Empty in-memory entity database
pub fn memory_db() -> EntityDb {
    EntityDb::new(Arc::new(InMemoryEntityStore::new()))
}

/// Builds [`LogInfo`]s for one emitting contract, advancing the log index on
/// every call
pub struct LogBuilder {
    chain_id: ChainId,
    contract: Address,
    block: u64,
    log_index: u32,
}

impl LogBuilder {
    pub fn new(chain_id: ChainId, contract: Address) -> Self {
        Self {
            chain_id,
            contract,
            block: 1,
            log_index: 0,
        }
    }

    /// Move to a later block
    pub fn at_block(&mut self, block: u64) -> &mut Self {
        self.block = block;
        self
    }

    /// Next log, timestamped 12 seconds per block
    pub fn next(&mut self) -> LogInfo {
        let log_index = self.log_index;
        self.log_index += 1;
        let mut tx = [0u8; 32];
        tx[..8].copy_from_slice(&self.block.to_be_bytes());
        tx[28..].copy_from_slice(&log_index.to_be_bytes());
        LogInfo {
            chain_id: self.chain_id,
            contract: self.contract,
            block_number: self.block,
            block_timestamp: 1_700_000_000 + self.block * 12,
            tx_hash: TxHash::new(tx),
            log_index,
        }
    }
}

/// Spell as the chain would answer for it
#[derive(Clone)]
struct ScriptedSpell {
    description: Option<String>,
    expiration: Option<u64>,
}

/// [`ContractReader`] answering from scripted state, counting every call
#[derive(Default)]
pub struct FakeContractReader {
    slates: DashMap<(Address, Bytes32), Vec<Address>>,
    spells: DashMap<Address, ScriptedSpell>,
    rates: DashMap<Address, Wad>,
    urns: DashMap<(Address, Address, u64), Address>,
    coins: DashMap<(Address, u64), Address>,
    failing_chains: DashSet<ChainId>,

    slate_calls: AtomicUsize,
    spell_calls: AtomicUsize,
    rate_calls: AtomicUsize,
    urn_calls: AtomicUsize,
}

impl FakeContractReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slate members in order, as `slates(slate, i)` returns them
    pub fn with_slate(&self, chief: Address, slate: Bytes32, members: Vec<Address>) -> &Self {
        self.slates.insert((chief, slate), members);
        self
    }

    /// A spell whose `expiration()` succeeds
    pub fn with_spell(&self, spell: Address, description: &str, expiration: u64) -> &Self {
        self.spells.insert(
            spell,
            ScriptedSpell {
                description: Some(description.to_string()),
                expiration: Some(expiration),
            },
        );
        self
    }

    /// A spell whose `expiration()` reverts
    pub fn with_broken_spell(&self, spell: Address) -> &Self {
        self.spells.insert(
            spell,
            ScriptedSpell {
                description: None,
                expiration: None,
            },
        );
        self
    }

    pub fn with_rate(&self, converter: Address, rate: Wad) -> &Self {
        self.rates.insert(converter, rate);
        self
    }

    pub fn with_urn(&self, engine: Address, owner: Address, index: u64, urn: Address) -> &Self {
        self.urns.insert((engine, owner, index), urn);
        self
    }

    pub fn with_coin(&self, pool: Address, index: u64, coin: Address) -> &Self {
        self.coins.insert((pool, index), coin);
        self
    }

    /// Every read on `chain_id` fails as if the chain had no endpoint
    pub fn with_failing_chain(&self, chain_id: ChainId) -> &Self {
        self.failing_chains.insert(chain_id);
        self
    }

    pub fn slate_calls(&self) -> usize {
        self.slate_calls.load(Ordering::SeqCst)
    }

    pub fn spell_calls(&self) -> usize {
        self.spell_calls.load(Ordering::SeqCst)
    }

    pub fn rate_calls(&self) -> usize {
        self.rate_calls.load(Ordering::SeqCst)
    }

    pub fn urn_calls(&self) -> usize {
        self.urn_calls.load(Ordering::SeqCst)
    }

    fn check_chain(&self, chain_id: ChainId) -> Result<(), ContractCallError> {
        if self.failing_chains.contains(&chain_id) {
            return Err(ContractCallError::UnconfiguredChain(chain_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ContractReader for FakeContractReader {
    async fn slate_member(
        &self,
        chain_id: ChainId,
        chief: &Address,
        slate: &Bytes32,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.slate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_chain(chain_id)?;
        Ok(self
            .slates
            .get(&(*chief, *slate))
            .and_then(|members| members.get(index as usize).copied()))
    }

    async fn spell_description(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<String>, ContractCallError> {
        self.spell_calls.fetch_add(1, Ordering::SeqCst);
        self.check_chain(chain_id)?;
        Ok(self.spells.get(spell).and_then(|s| s.description.clone()))
    }

    async fn spell_expiration(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<u64>, ContractCallError> {
        self.spell_calls.fetch_add(1, Ordering::SeqCst);
        self.check_chain(chain_id)?;
        Ok(self.spells.get(spell).and_then(|s| s.expiration))
    }

    async fn conversion_rate(
        &self,
        chain_id: ChainId,
        converter: &Address,
    ) -> Result<Option<Wad>, ContractCallError> {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_chain(chain_id)?;
        Ok(self.rates.get(converter).map(|rate| *rate))
    }

    async fn owner_urn(
        &self,
        chain_id: ChainId,
        engine: &Address,
        owner: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.urn_calls.fetch_add(1, Ordering::SeqCst);
        self.check_chain(chain_id)?;
        Ok(self.urns.get(&(*engine, *owner, index)).map(|urn| *urn))
    }

    async fn pool_coin(
        &self,
        chain_id: ChainId,
        pool: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.check_chain(chain_id)?;
        Ok(self.coins.get(&(*pool, index)).map(|coin| *coin))
    }
}
