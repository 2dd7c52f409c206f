//! Contract reads made while handling events
//!
//! A reverted call is an answer, not a failure: every read returns `Ok(None)`
//! when the contract reverts (slate index out of range, broken spell).
//! `Err` is reserved for an unconfigured chain or a transport failure.

pub mod abi;
pub mod caching;
pub mod rpc;

use crate::hash::{Address, Bytes32};
use crate::types::{ChainId, Wad};
use async_trait::async_trait;
use thiserror::Error;

pub use self::caching::CachingContractReader;
pub use self::rpc::RpcContractReader;

#[derive(Debug, Error)]
pub enum ContractCallError {
    #[error("No RPC endpoint configured for chain {0}")]
    UnconfiguredChain(ChainId),

    #[error("{call} on chain {chain_id} failed: {message}")]
    Transport {
        chain_id: ChainId,
        call: String,
        message: String,
    },

    #[error("{call} on chain {chain_id} returned malformed data: {message}")]
    MalformedResponse {
        chain_id: ChainId,
        call: String,
        message: String,
    },
}

#[async_trait]
pub trait ContractReader: Send + Sync {
    /// `slates(slate, index)` on a chief; `None` past the last member
    async fn slate_member(
        &self,
        chain_id: ChainId,
        chief: &Address,
        slate: &Bytes32,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError>;

    /// `description()` on a spell
    async fn spell_description(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<String>, ContractCallError>;

    /// `expiration()` on a spell
    async fn spell_expiration(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<u64>, ContractCallError>;

    /// `rate()` on a token converter; changes over time so never cached
    async fn conversion_rate(
        &self,
        chain_id: ChainId,
        converter: &Address,
    ) -> Result<Option<Wad>, ContractCallError>;

    /// `ownerUrns(owner, index)` on an engine
    async fn owner_urn(
        &self,
        chain_id: ChainId,
        engine: &Address,
        owner: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError>;

    /// `coins(index)` on a liquidity pool
    async fn pool_coin(
        &self,
        chain_id: ChainId,
        pool: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError>;
}
