//! Delegate state: factories, direct delegation and engine urns

use crate::engines::{SkyConversion, UrnChange, UrnEngines};
use crate::factory::{delegate_created, vote_proxy_created};
use crate::ledger::DelegationLedger;
use agora_common::{
    contract_calls::ContractReader,
    entities::{Delegate, DelegationOrigin, Urn},
    messages::ChainMessage,
    store::{EntityDb, StoreTransaction},
    EntityId, LogInfo,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub struct State {
    db: EntityDb,
    ledger: DelegationLedger,
    engines: UrnEngines,

    events: u64,
    ignored: u64,
    writes: u64,
}

impl State {
    pub fn new(
        db: EntityDb,
        reader: Arc<dyn ContractReader>,
        ledger: DelegationLedger,
        conversion: SkyConversion,
    ) -> Self {
        Self {
            db,
            ledger,
            engines: UrnEngines::new(reader, conversion),
            events: 0,
            ignored: 0,
            writes: 0,
        }
    }

    /// Apply one delegate or engine event atomically
    pub async fn handle(&mut self, log: &LogInfo, message: &ChainMessage) -> Result<()> {
        let mut tx = self.db.begin().await;
        if !self.apply(&mut tx, log, message).await? {
            self.ignored += 1;
            return Ok(());
        }
        let written = tx.commit().await?;

        self.events += 1;
        self.writes += written as u64;
        Ok(())
    }

    /// Stage the effects of `message`; false if it is none of ours
    async fn apply(
        &self,
        tx: &mut StoreTransaction,
        log: &LogInfo,
        message: &ChainMessage,
    ) -> Result<bool> {
        let engines = &self.engines;
        let ledger = &self.ledger;
        match message {
            ChainMessage::DelegateCreated(event) => delegate_created(tx, log, event).await?,
            ChainMessage::VoteProxyCreated(event) => vote_proxy_created(tx, log, event).await?,

            ChainMessage::DelegateLock(event) => {
                let delegate = EntityId::for_address(log.chain_id, &log.contract);
                ledger
                    .lock(tx, &delegate, &event.usr, event.wad, DelegationOrigin::Direct, log)
                    .await?;
            }
            ChainMessage::DelegateFree(event) => {
                let delegate = EntityId::for_address(log.chain_id, &log.contract);
                ledger
                    .free(tx, &delegate, &event.usr, event.wad, DelegationOrigin::Direct, log)
                    .await?;
            }

            ChainMessage::UrnOpened(event) => engines.open(tx, log, event).await?,
            ChainMessage::UrnSelectDelegate(event) => {
                engines.select_delegate(tx, ledger, log, event).await?
            }
            ChainMessage::UrnLock(event) => {
                engines.change_locked(tx, ledger, log, event, UrnChange::Lock).await?
            }
            ChainMessage::UrnLockSky(event) => {
                engines.change_locked(tx, ledger, log, event, UrnChange::LockSky).await?
            }
            ChainMessage::UrnFree(event) => {
                engines.change_locked(tx, ledger, log, event, UrnChange::Free).await?
            }
            ChainMessage::UrnFreeSky(event) => {
                engines.change_locked(tx, ledger, log, event, UrnChange::FreeSky).await?
            }
            ChainMessage::UrnFreeNoFee(event) => {
                engines.change_locked(tx, ledger, log, event, UrnChange::FreeNoFee).await?
            }

            // Farms belong to the reward state
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Log progress
    pub async fn tick(&self) -> Result<()> {
        let delegates = self.db.count_in::<Delegate>(()).await?;
        let urns = self.db.count_in::<Urn>(()).await?;
        info!(
            events = self.events,
            ignored = self.ignored,
            writes = self.writes,
            delegates,
            urns,
            "Delegate state"
        );
        Ok(())
    }
}
