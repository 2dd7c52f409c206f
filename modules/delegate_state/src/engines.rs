//! Lockstake and staking engine urns
//!
//! Engine events name an urn by `(owner, index)`; the urn address is read
//! from the engine's `ownerUrns`.  Whatever an urn has locked is delegated to
//! the urn's selected delegate on behalf of the urn owner.

use crate::ledger::DelegationLedger;
use agora_common::{
    contract_calls::{ContractCallError, ContractReader},
    entities::{Delegate, DelegationOrigin, Milestone},
    messages::{UrnAmountEvent, UrnOpenedEvent, UrnSelectDelegateEvent},
    store::StoreTransaction,
    urns::get_or_create_urn,
    Address, ChainId, EntityId, LogInfo, Wad,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How an urn's locked amount changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrnChange {
    Lock,
    LockSky,
    Free,
    FreeSky,
    FreeNoFee,
}

impl UrnChange {
    fn is_sky(self) -> bool {
        matches!(self, UrnChange::LockSky | UrnChange::FreeSky)
    }

    fn is_lock(self) -> bool {
        matches!(self, UrnChange::Lock | UrnChange::LockSky)
    }
}

/// MKR/SKY conversion rate source
pub struct SkyConversion {
    contracts: HashMap<ChainId, Address>,
    default_rate: Wad,
}

impl SkyConversion {
    pub fn new(contracts: HashMap<ChainId, Address>, default_rate: Wad) -> Self {
        Self {
            contracts,
            default_rate,
        }
    }

    /// SKY per MKR on `chain_id`, read fresh from the converter when the chain
    /// has one
    pub async fn rate(
        &self,
        reader: &dyn ContractReader,
        chain_id: ChainId,
    ) -> Result<Wad, ContractCallError> {
        let Some(converter) = self.contracts.get(&chain_id) else {
            return Ok(self.default_rate);
        };
        match reader.conversion_rate(chain_id, converter).await? {
            Some(rate) if rate > 0 => Ok(rate),
            _ => {
                warn!("No usable rate from converter {converter} on chain {chain_id}");
                Ok(self.default_rate)
            }
        }
    }
}

pub struct UrnEngines {
    reader: Arc<dyn ContractReader>,
    conversion: SkyConversion,
}

impl UrnEngines {
    pub fn new(reader: Arc<dyn ContractReader>, conversion: SkyConversion) -> Self {
        Self { reader, conversion }
    }

    async fn urn_address(
        &self,
        log: &LogInfo,
        owner: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        self.reader.owner_urn(log.chain_id, &log.contract, owner, index).await
    }

    pub async fn open(
        &self,
        tx: &mut StoreTransaction,
        log: &LogInfo,
        event: &UrnOpenedEvent,
    ) -> Result<()> {
        let mut urn = get_or_create_urn(
            tx,
            log.chain_id,
            event.engine,
            &event.urn,
            &event.owner,
            event.index,
        )
        .await?;
        urn.owner = event.owner;
        urn.index = event.index;
        urn.opened = Some(Milestone::from(log));
        tx.set(&urn)
    }

    /// Point the urn at a new delegate, moving its whole locked amount.  The
    /// zero address undelegates.  Re-selecting the current delegate only
    /// rewrites the urn and records no delegation history.
    pub async fn select_delegate(
        &self,
        tx: &mut StoreTransaction,
        ledger: &DelegationLedger,
        log: &LogInfo,
        event: &UrnSelectDelegateEvent,
    ) -> Result<()> {
        let Some(address) = self.urn_address(log, &event.owner, event.index).await? else {
            warn!("No urn {} for owner {} on {}", event.index, event.owner, log.contract);
            return Ok(());
        };
        let mut urn =
            get_or_create_urn(tx, log.chain_id, event.engine, &address, &event.owner, event.index)
                .await?;
        let origin = DelegationOrigin::from(event.engine);
        let previous = urn.delegate.take();

        let next = if event.delegate.is_zero() {
            None
        } else {
            let id = EntityId::for_address(log.chain_id, &event.delegate);
            if !tx.exists_in::<Delegate>((), &id).await? {
                warn!("Urn {address} selected unknown delegate {}", event.delegate);
                return Ok(());
            }
            Some(id)
        };

        urn.delegate = next.clone();
        tx.set(&urn)?;

        if previous == next || urn.locked <= 0 {
            return Ok(());
        }
        if let Some(previous) = previous {
            ledger.free(tx, &previous, &urn.owner, urn.locked, origin, log).await?;
        }
        if let Some(next) = next {
            ledger.lock(tx, &next, &urn.owner, urn.locked, origin, log).await?;
        }
        Ok(())
    }

    /// Adjust the urn's locked amount and forward the change to its delegate.
    /// SKY variants are converted to MKR at the current rate.
    pub async fn change_locked(
        &self,
        tx: &mut StoreTransaction,
        ledger: &DelegationLedger,
        log: &LogInfo,
        event: &UrnAmountEvent,
        change: UrnChange,
    ) -> Result<()> {
        let (address, amount) = if change.is_sky() {
            let (address, rate) = futures::try_join!(
                self.urn_address(log, &event.owner, event.index),
                self.conversion.rate(self.reader.as_ref(), log.chain_id),
            )?;
            (address, event.wad / rate)
        } else {
            (self.urn_address(log, &event.owner, event.index).await?, event.wad)
        };
        let Some(address) = address else {
            warn!("No urn {} for owner {} on {}", event.index, event.owner, log.contract);
            return Ok(());
        };

        let mut urn =
            get_or_create_urn(tx, log.chain_id, event.engine, &address, &event.owner, event.index)
                .await?;
        urn.locked += if change.is_lock() { amount } else { -amount };
        tx.set(&urn)?;
        debug!("Urn {address} {change:?} {amount}, now {}", urn.locked);

        let Some(delegate) = urn.delegate.as_ref() else {
            return Ok(());
        };
        if amount <= 0 {
            return Ok(());
        }
        let origin = DelegationOrigin::from(event.engine);
        if change.is_lock() {
            ledger.lock(tx, delegate, &urn.owner, amount, origin, log).await?;
        } else {
            ledger.free(tx, delegate, &urn.owner, amount, origin, log).await?;
        }
        Ok(())
    }
}
