//! Reward pools
//!
//! `total_supplied` of a pool is the running sum of its suppliers' amounts.
//! Farm flags record whether each engine currently offers the pool.

use agora_common::{
    contract_calls::ContractReader,
    entities::{Reward, RewardSupplier},
    messages::{FarmEvent, RewardPaidEvent, UrnSelectFarmEvent},
    store::StoreTransaction,
    urns::get_or_create_urn,
    Address, ChainId, EngineKind, EntityId, LogInfo, Wad,
};
use anyhow::Result;
use tracing::warn;

async fn get_or_create_reward(
    tx: &StoreTransaction,
    chain_id: ChainId,
    address: &Address,
) -> Result<Reward> {
    let id = EntityId::for_address(chain_id, address);
    Ok(tx.get::<Reward>(&id).await?.unwrap_or_else(|| Reward::new(chain_id, *address)))
}

/// `Staked` (positive) or `Withdrawn` (negative) on the emitting pool
pub async fn change_supplied(
    tx: &mut StoreTransaction,
    log: &LogInfo,
    user: &Address,
    delta: Wad,
) -> Result<()> {
    let mut reward = get_or_create_reward(tx, log.chain_id, &log.contract).await?;
    let supplier_id = reward.id.child(user);
    let mut supplier =
        tx.get::<RewardSupplier>(&supplier_id).await?.unwrap_or_else(|| RewardSupplier {
            id: supplier_id.clone(),
            reward: reward.id.clone(),
            user: *user,
            amount: 0,
        });

    supplier.amount += delta;
    reward.total_supplied += delta;
    if supplier.amount < 0 {
        warn!("Supplier {user} of {} went negative", reward.address);
    }

    tx.set(&supplier)?;
    tx.set(&reward)
}

pub async fn reward_paid(
    tx: &mut StoreTransaction,
    log: &LogInfo,
    event: &RewardPaidEvent,
) -> Result<()> {
    let mut reward = get_or_create_reward(tx, log.chain_id, &log.contract).await?;
    reward.total_rewards_claimed += event.reward;
    tx.set(&reward)
}

/// `AddFarm` / `DelFarm` on an engine
pub async fn set_farm_active(
    tx: &mut StoreTransaction,
    log: &LogInfo,
    event: &FarmEvent,
    active: bool,
) -> Result<()> {
    let mut reward = get_or_create_reward(tx, log.chain_id, &event.farm).await?;
    match event.engine {
        EngineKind::Lockstake => reward.lockstake_active = active,
        EngineKind::StakingEngine => reward.staking_engine_active = active,
    }
    tx.set(&reward)
}

/// Point an urn at a farm; the zero farm clears the link
pub async fn select_farm(
    tx: &mut StoreTransaction,
    reader: &dyn ContractReader,
    log: &LogInfo,
    event: &UrnSelectFarmEvent,
) -> Result<()> {
    let address = reader
        .owner_urn(log.chain_id, &log.contract, &event.owner, event.index)
        .await?;
    let Some(address) = address else {
        warn!("No urn {} for owner {} on {}", event.index, event.owner, log.contract);
        return Ok(());
    };
    let mut urn =
        get_or_create_urn(tx, log.chain_id, event.engine, &address, &event.owner, event.index)
            .await?;
    urn.reward = (!event.farm.is_zero()).then(|| EntityId::for_address(log.chain_id, &event.farm));
    tx.set(&urn)
}
