//! Slate resolution and lazy spell materialisation

use agora_common::{
    contract_calls::ContractReader,
    entities::{Milestone, Slate, Spell, SpellState},
    store::StoreTransaction,
    Address, Bytes32, EntityId, LogInfo, Regime,
};
use anyhow::Result;
use tracing::{debug, warn};

/// Stored slate for `slate`, or read its members from the emitting chief and
/// stage it together with any spells seen for the first time.
///
/// Members are read index by index until the chief reverts; the loop has no
/// other termination signal.  The zero address is skipped.  A spell whose
/// `expiration()` reverts keeps its slot in the slate but is never stored.
/// A member listed twice is kept once.
pub async fn resolve_slate(
    tx: &mut StoreTransaction,
    reader: &dyn ContractReader,
    regime: Regime,
    log: &LogInfo,
    slate: &Bytes32,
) -> Result<Slate> {
    let id = EntityId::for_slate(log.chain_id, slate);
    if let Some(existing) = tx.get_in::<Slate>(regime, &id).await? {
        return Ok(existing);
    }

    let mut yays = Vec::new();
    for index in 0u64.. {
        let Some(member) =
            reader.slate_member(log.chain_id, &log.contract, slate, index).await?
        else {
            break;
        };
        if member.is_zero() {
            continue;
        }

        let spell_id = EntityId::for_address(log.chain_id, &member);
        if yays.contains(&spell_id) {
            continue;
        }
        if !tx.exists_in::<Spell>(regime, &spell_id).await? {
            match read_spell(reader, regime, log, member).await? {
                Some(spell) => tx.set(&spell)?,
                None => warn!("Spell {member} has no expiration, not storing it"),
            }
        }
        yays.push(spell_id);
    }

    debug!("Resolved {regime} slate {id} with {} member(s)", yays.len());
    let resolved = Slate {
        id,
        regime,
        chain_id: log.chain_id,
        yays,
        created: Milestone::from(log),
    };
    tx.set(&resolved)?;
    Ok(resolved)
}

/// New spell from its on-chain description and expiration, or `None` when
/// `expiration()` reverts
async fn read_spell(
    reader: &dyn ContractReader,
    regime: Regime,
    log: &LogInfo,
    address: Address,
) -> Result<Option<Spell>> {
    let (description, expiration) = futures::try_join!(
        reader.spell_description(log.chain_id, &address),
        reader.spell_expiration(log.chain_id, &address),
    )?;

    Ok(expiration.map(|expiry_time| Spell {
        id: EntityId::for_address(log.chain_id, &address),
        regime,
        chain_id: log.chain_id,
        address,
        description,
        state: SpellState::Active,
        created: Milestone::from(log),
        expiry_time,
        total_votes: 0,
        total_weighted_votes: 0,
        cast: None,
        scheduled: None,
        lifted: None,
        lifted_with: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_test_utils::{address, memory_db, slate, FakeContractReader, LogBuilder};

    const CHAIN: u64 = 1;

    fn chief() -> Address {
        address(0xc0)
    }

    #[tokio::test]
    async fn members_are_read_in_order_and_zero_is_skipped() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        reader
            .with_slate(chief(), slate(1), vec![address(1), Address::ZERO, address(2)])
            .with_spell(address(1), "first", 100)
            .with_spell(address(2), "second", 200);
        let log = LogBuilder::new(CHAIN, chief()).next();

        let mut tx = db.begin().await;
        let resolved =
            resolve_slate(&mut tx, &reader, Regime::Current, &log, &slate(1)).await.unwrap();

        assert_eq!(
            resolved.yays,
            vec![
                EntityId::for_address(CHAIN, &address(1)),
                EntityId::for_address(CHAIN, &address(2)),
            ]
        );
        // three members plus the out-of-range read
        assert_eq!(reader.slate_calls(), 4);

        let spell = tx
            .get_in::<Spell>(Regime::Current, &resolved.yays[1])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spell.description.as_deref(), Some("second"));
        assert_eq!(spell.expiry_time, 200);
        assert_eq!(spell.state, SpellState::Active);
    }

    #[tokio::test]
    async fn stored_slate_is_not_read_again() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        reader.with_slate(chief(), slate(2), vec![address(1)]).with_spell(address(1), "s", 1);
        let mut logs = LogBuilder::new(CHAIN, chief());

        let mut tx = db.begin().await;
        let first =
            resolve_slate(&mut tx, &reader, Regime::Legacy, &logs.next(), &slate(2)).await.unwrap();
        tx.commit().await.unwrap();
        let slate_calls = reader.slate_calls();
        let spell_calls = reader.spell_calls();

        let mut tx = db.begin().await;
        let second =
            resolve_slate(&mut tx, &reader, Regime::Legacy, &logs.next(), &slate(2)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(reader.slate_calls(), slate_calls);
        assert_eq!(reader.spell_calls(), spell_calls);
        assert_eq!(tx.staged(), 0);
    }

    #[tokio::test]
    async fn spell_without_expiration_keeps_its_slot() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        reader
            .with_slate(chief(), slate(3), vec![address(1), address(9)])
            .with_spell(address(1), "good", 1)
            .with_broken_spell(address(9));
        let log = LogBuilder::new(CHAIN, chief()).next();

        let mut tx = db.begin().await;
        let resolved =
            resolve_slate(&mut tx, &reader, Regime::Legacy, &log, &slate(3)).await.unwrap();
        assert_eq!(resolved.yays.len(), 2);
        assert!(tx.exists_in::<Spell>(Regime::Legacy, &resolved.yays[0]).await.unwrap());
        assert!(!tx.exists_in::<Spell>(Regime::Legacy, &resolved.yays[1]).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_member_is_kept_once() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        reader
            .with_slate(chief(), slate(6), vec![address(1), address(1), address(2)])
            .with_spell(address(1), "first", 1)
            .with_spell(address(2), "second", 2);
        let log = LogBuilder::new(CHAIN, chief()).next();

        let mut tx = db.begin().await;
        let resolved =
            resolve_slate(&mut tx, &reader, Regime::Current, &log, &slate(6)).await.unwrap();
        assert_eq!(
            resolved.yays,
            vec![
                EntityId::for_address(CHAIN, &address(1)),
                EntityId::for_address(CHAIN, &address(2)),
            ]
        );
    }

    #[tokio::test]
    async fn regimes_resolve_independently() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        reader.with_slate(chief(), slate(4), vec![address(1)]).with_spell(address(1), "s", 1);
        let log = LogBuilder::new(CHAIN, chief()).next();

        let mut tx = db.begin().await;
        resolve_slate(&mut tx, &reader, Regime::Legacy, &log, &slate(4)).await.unwrap();
        let id = EntityId::for_slate(CHAIN, &slate(4));
        assert!(tx.get_in::<Slate>(Regime::Current, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_failure_is_propagated() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        reader.with_failing_chain(CHAIN);
        let log = LogBuilder::new(CHAIN, chief()).next();

        let mut tx = db.begin().await;
        assert!(resolve_slate(&mut tx, &reader, Regime::Legacy, &log, &slate(5)).await.is_err());
    }
}
