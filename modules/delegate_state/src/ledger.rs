//! Delegation ledger
//!
//! Tracks what each delegator has delegated to each delegate contract.  For
//! every delegate, `total_delegated` is the sum of its delegations and
//! `delegators` counts the delegations with a non-zero amount.  Aggregator
//! contracts are excluded outright: their delegators are accounted one by
//! one through the engine urns.

use agora_common::{
    entities::{Delegate, Delegation, DelegationHistory, DelegationOrigin, Milestone},
    store::StoreTransaction,
    Address, EntityId, LogInfo, Wad,
};
use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

pub struct DelegationLedger {
    excluded: HashSet<Address>,
}

impl DelegationLedger {
    pub fn new(excluded: impl IntoIterator<Item = Address>) -> Self {
        Self {
            excluded: excluded.into_iter().collect(),
        }
    }

    pub fn is_excluded(&self, delegator: &Address) -> bool {
        self.excluded.contains(delegator)
    }

    /// Add `amount` to the delegation.  Returns whether anything was staged.
    pub async fn lock(
        &self,
        tx: &mut StoreTransaction,
        delegate: &EntityId,
        delegator: &Address,
        amount: Wad,
        origin: DelegationOrigin,
        log: &LogInfo,
    ) -> Result<bool> {
        self.apply(tx, delegate, delegator, amount, origin, log).await
    }

    /// Take `amount` off the delegation.  Returns whether anything was staged.
    pub async fn free(
        &self,
        tx: &mut StoreTransaction,
        delegate: &EntityId,
        delegator: &Address,
        amount: Wad,
        origin: DelegationOrigin,
        log: &LogInfo,
    ) -> Result<bool> {
        self.apply(tx, delegate, delegator, -amount, origin, log).await
    }

    async fn apply(
        &self,
        tx: &mut StoreTransaction,
        delegate_id: &EntityId,
        delegator: &Address,
        change: Wad,
        origin: DelegationOrigin,
        log: &LogInfo,
    ) -> Result<bool> {
        if self.is_excluded(delegator) {
            debug!("Skipping excluded delegator {delegator} on {delegate_id}");
            return Ok(false);
        }
        let Some(mut delegate) = tx.get::<Delegate>(delegate_id).await? else {
            debug!("Skipping delegation to unknown delegate {delegate_id}");
            return Ok(false);
        };

        let delegation_id = delegate_id.child(delegator);
        let mut delegation =
            tx.get::<Delegation>(&delegation_id).await?.unwrap_or_else(|| Delegation {
                id: delegation_id.clone(),
                delegate: delegate_id.clone(),
                delegator: *delegator,
                amount: 0,
                timestamp: log.block_timestamp,
            });

        // Counter moves on the zero crossing, judged against the amount before the change
        let previous = delegation.amount;
        let amount = previous + change;
        if previous == 0 && amount != 0 {
            delegate.delegators += 1;
        } else if previous != 0 && amount == 0 {
            delegate.delegators = delegate.delegators.saturating_sub(1);
        }
        delegate.total_delegated += change;

        delegation.amount = amount;
        delegation.timestamp = log.block_timestamp;

        tx.set(&DelegationHistory {
            id: delegation_id.child(format!("{}-{}", log.block_number, log.log_index)),
            delegate: delegate_id.clone(),
            delegator: *delegator,
            amount: change,
            accumulated_amount: amount,
            origin,
            changed: Milestone::from(log),
        })?;
        tx.set(&delegation)?;
        tx.set(&delegate)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_test_utils::{address, memory_db, LogBuilder};

    const CHAIN: u64 = 1;

    fn delegate(n: u8) -> Delegate {
        Delegate {
            id: EntityId::for_address(CHAIN, &address(n)),
            chain_id: CHAIN,
            address: address(n),
            owner: address(0xee),
            voter: EntityId::for_address(CHAIN, &address(n)),
            delegators: 0,
            total_delegated: 0,
            created: Milestone::default(),
            version: 1,
        }
    }

    async fn stored(tx: &StoreTransaction, id: &EntityId) -> Delegate {
        tx.get::<Delegate>(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn lock_and_free_keep_totals_consistent() {
        let db = memory_db();
        let ledger = DelegationLedger::new(Vec::<Address>::new());
        let mut logs = LogBuilder::new(CHAIN, address(1));
        let d = delegate(1);
        let mut tx = db.begin().await;
        tx.set(&d).unwrap();

        let origin = DelegationOrigin::Direct;
        ledger.lock(&mut tx, &d.id, &address(10), 100, origin, &logs.next()).await.unwrap();
        ledger.lock(&mut tx, &d.id, &address(11), 50, origin, &logs.next()).await.unwrap();
        ledger.lock(&mut tx, &d.id, &address(10), 25, origin, &logs.next()).await.unwrap();
        ledger.free(&mut tx, &d.id, &address(11), 50, origin, &logs.next()).await.unwrap();

        let after = stored(&tx, &d.id).await;
        assert_eq!(after.total_delegated, 125);
        assert_eq!(after.delegators, 1);

        let mut sum = 0;
        let mut non_zero = 0;
        for delegator in [address(10), address(11)] {
            let delegation = tx.get::<Delegation>(&d.id.child(delegator)).await.unwrap().unwrap();
            sum += delegation.amount;
            if delegation.amount > 0 {
                non_zero += 1;
            }
        }
        assert_eq!(sum, after.total_delegated);
        assert_eq!(non_zero, after.delegators);
    }

    #[tokio::test]
    async fn history_records_signed_change_and_running_amount() {
        let db = memory_db();
        let ledger = DelegationLedger::new(Vec::<Address>::new());
        let mut logs = LogBuilder::new(CHAIN, address(1));
        let d = delegate(1);
        let mut tx = db.begin().await;
        tx.set(&d).unwrap();

        let lock_log = logs.next();
        let free_log = logs.next();
        let origin = DelegationOrigin::Lockstake;
        ledger.lock(&mut tx, &d.id, &address(10), 80, origin, &lock_log).await.unwrap();
        ledger.free(&mut tx, &d.id, &address(10), 30, origin, &free_log).await.unwrap();

        let delegation_id = d.id.child(address(10));
        let history_id = delegation_id.child(format!("{}-{}", free_log.block_number, 1));
        let history = tx.get::<DelegationHistory>(&history_id).await.unwrap().unwrap();
        assert_eq!(history.amount, -30);
        assert_eq!(history.accumulated_amount, 50);
        assert!(history.is_lockstake());
        assert!(!history.is_staking_engine());
    }

    #[tokio::test]
    async fn excluded_delegator_changes_nothing() {
        let db = memory_db();
        let engine = address(0x2b);
        let ledger = DelegationLedger::new([engine]);
        let d = delegate(1);
        let mut tx = db.begin().await;
        tx.set(&d).unwrap();
        let staged = tx.staged();

        let log = LogBuilder::new(CHAIN, address(1)).next();
        let applied = ledger
            .lock(&mut tx, &d.id, &engine, 1_000, DelegationOrigin::Direct, &log)
            .await
            .unwrap();

        assert!(!applied);
        assert_eq!(tx.staged(), staged);
        assert!(tx.get::<Delegation>(&d.id.child(engine)).await.unwrap().is_none());
        assert_eq!(stored(&tx, &d.id).await, d);
    }

    #[tokio::test]
    async fn unknown_delegate_is_skipped() {
        let db = memory_db();
        let ledger = DelegationLedger::new(Vec::<Address>::new());
        let mut tx = db.begin().await;
        let log = LogBuilder::new(CHAIN, address(1)).next();
        let unknown = EntityId::for_address(CHAIN, &address(5));

        let applied = ledger
            .free(&mut tx, &unknown, &address(10), 1, DelegationOrigin::Direct, &log)
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(tx.staged(), 0);
    }

    #[tokio::test]
    async fn relock_after_full_free_counts_again() {
        let db = memory_db();
        let ledger = DelegationLedger::new(Vec::<Address>::new());
        let mut logs = LogBuilder::new(CHAIN, address(1));
        let d = delegate(1);
        let mut tx = db.begin().await;
        tx.set(&d).unwrap();

        let origin = DelegationOrigin::StakingEngine;
        ledger.lock(&mut tx, &d.id, &address(10), 10, origin, &logs.next()).await.unwrap();
        ledger.free(&mut tx, &d.id, &address(10), 10, origin, &logs.next()).await.unwrap();
        assert_eq!(stored(&tx, &d.id).await.delegators, 0);

        ledger.lock(&mut tx, &d.id, &address(10), 4, origin, &logs.next()).await.unwrap();
        let after = stored(&tx, &d.id).await;
        assert_eq!(after.delegators, 1);
        assert_eq!(after.total_delegated, 4);
    }
}
