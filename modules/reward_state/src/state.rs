//! Reward state: pool events from reward contracts, farm events from engines

use crate::pools::{change_supplied, reward_paid, select_farm, set_farm_active};
use agora_common::{
    contract_calls::ContractReader,
    entities::{Reward, RewardSupplier},
    messages::ChainMessage,
    store::EntityDb,
    LogInfo,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub struct State {
    db: EntityDb,
    reader: Arc<dyn ContractReader>,

    events: u64,
    ignored: u64,
    writes: u64,
}

impl State {
    pub fn new(db: EntityDb, reader: Arc<dyn ContractReader>) -> Self {
        Self {
            db,
            reader,
            events: 0,
            ignored: 0,
            writes: 0,
        }
    }

    /// Apply one reward or farm event atomically
    pub async fn handle(&mut self, log: &LogInfo, message: &ChainMessage) -> Result<()> {
        let mut tx = self.db.begin().await;
        match message {
            ChainMessage::RewardStaked(event) => {
                change_supplied(&mut tx, log, &event.user, event.amount).await?
            }
            ChainMessage::RewardWithdrawn(event) => {
                change_supplied(&mut tx, log, &event.user, -event.amount).await?
            }
            ChainMessage::RewardPaid(event) => reward_paid(&mut tx, log, event).await?,
            ChainMessage::FarmAdded(event) => set_farm_active(&mut tx, log, event, true).await?,
            ChainMessage::FarmRemoved(event) => {
                set_farm_active(&mut tx, log, event, false).await?
            }
            ChainMessage::UrnSelectFarm(event) => {
                select_farm(&mut tx, self.reader.as_ref(), log, event).await?
            }
            // Urn delegation belongs to the delegate state
            _ => {
                self.ignored += 1;
                return Ok(());
            }
        }
        let written = tx.commit().await?;

        self.events += 1;
        self.writes += written as u64;
        Ok(())
    }

    /// Log progress
    pub async fn tick(&self) -> Result<()> {
        let rewards = self.db.count_in::<Reward>(()).await?;
        let suppliers = self.db.count_in::<RewardSupplier>(()).await?;
        info!(
            events = self.events,
            ignored = self.ignored,
            writes = self.writes,
            rewards,
            suppliers,
            "Reward state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::{
        messages::{RewardAmountEvent, UrnAmountEvent},
        EngineKind, EntityId,
    };
    use agora_test_utils::{address, memory_db, FakeContractReader, LogBuilder};

    #[tokio::test]
    async fn stake_then_withdraw_commits_each_event() {
        let db = memory_db();
        let mut state = State::new(db.clone(), Arc::new(FakeContractReader::new()));
        let mut logs = LogBuilder::new(1, address(0x70));
        let staked = ChainMessage::RewardStaked(RewardAmountEvent {
            user: address(1),
            amount: 50,
        });
        let withdrawn = ChainMessage::RewardWithdrawn(RewardAmountEvent {
            user: address(1),
            amount: 20,
        });

        state.handle(&logs.next(), &staked).await.unwrap();
        state.handle(&logs.next(), &withdrawn).await.unwrap();

        let reward_id = EntityId::for_address(1, &address(0x70));
        let reward = db.get::<Reward>(&reward_id).await.unwrap().unwrap();
        assert_eq!(reward.total_supplied, 30);
        let supplier = db.get::<RewardSupplier>(&reward_id.child(address(1))).await.unwrap();
        assert_eq!(supplier.unwrap().amount, 30);
        assert_eq!(state.events, 2);
    }

    #[tokio::test]
    async fn urn_locks_are_ignored() {
        let db = memory_db();
        let mut state = State::new(db.clone(), Arc::new(FakeContractReader::new()));
        let log = LogBuilder::new(1, address(0x2b)).next();
        let lock = ChainMessage::UrnLock(UrnAmountEvent {
            engine: EngineKind::Lockstake,
            owner: address(1),
            index: 0,
            wad: 10,
        });
        state.handle(&log, &lock).await.unwrap();
        assert_eq!(state.ignored, 1);
        assert_eq!(db.count_in::<Reward>(()).await.unwrap(), 0);
    }
}
