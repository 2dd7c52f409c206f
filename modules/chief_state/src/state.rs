//! Executive vote accounting
//!
//! Both chiefs drive the same four operations.  The legacy chief reaches them
//! through decoded `LogNote`s and is accounted in the legacy regime; the
//! current chief emits typed events and is accounted in the current regime.
//! Every operation stages its writes on a [`StoreTransaction`] and the event
//! is committed as a whole or not at all.

use crate::log_note::ChiefOperation;
use crate::slates::resolve_slate;
use crate::weights::{add_weight, remove_weight};
use agora_common::{
    contract_calls::ContractReader,
    entities::{ExecutiveVote, Milestone, Slate, Spell, SpellState, Voter, VotingPowerChange},
    messages::ChainMessage,
    store::{EntityDb, StoreTransaction},
    voters::get_or_create_voter,
    Address, Bytes32, EntityId, LogInfo, Regime, Wad,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Regime and operation carried by a chief event, if it moves voting state
pub fn chief_operation(message: &ChainMessage) -> Result<Option<(Regime, ChiefOperation)>> {
    let operation = match message {
        ChainMessage::LogNote(note) => {
            ChiefOperation::from_log_note(note)?.map(|op| (Regime::Legacy, op))
        }
        ChainMessage::ChiefLock(event) => Some((
            Regime::Current,
            ChiefOperation::Lock {
                usr: event.usr,
                wad: event.wad,
            },
        )),
        ChainMessage::ChiefFree(event) => Some((
            Regime::Current,
            ChiefOperation::Free {
                usr: event.usr,
                wad: event.wad,
            },
        )),
        ChainMessage::ChiefVote(event) => Some((
            Regime::Current,
            ChiefOperation::Vote {
                usr: event.usr,
                slate: event.slate,
            },
        )),
        ChainMessage::ChiefLift(event) => {
            Some((Regime::Current, ChiefOperation::Lift { whom: event.whom }))
        }
        _ => None,
    };
    Ok(operation)
}

/// Stage the effects of one chief operation
pub async fn apply_operation(
    tx: &mut StoreTransaction,
    reader: &dyn ContractReader,
    regime: Regime,
    log: &LogInfo,
    operation: ChiefOperation,
) -> Result<()> {
    match operation {
        ChiefOperation::Lock { usr, wad } => change_locked(tx, regime, log, &usr, wad).await,
        ChiefOperation::Free { usr, wad } => change_locked(tx, regime, log, &usr, -wad).await,
        ChiefOperation::Vote { usr, slate } => vote(tx, reader, regime, log, &usr, &slate).await,
        ChiefOperation::Lift { whom } => lift(tx, regime, log, &whom).await,
    }
}

/// Lock (positive `delta`) or free (negative `delta`) chief tokens.
///
/// The literal delta is propagated onto the voter's current spells, not the
/// new total.
async fn change_locked(
    tx: &mut StoreTransaction,
    regime: Regime,
    log: &LogInfo,
    usr: &Address,
    delta: Wad,
) -> Result<()> {
    let mut voter = get_or_create_voter(tx, log.chain_id, usr).await?;
    let previous_balance = voter.weight(regime).locked_raw;
    let new_balance = previous_balance + delta;

    tx.set(&VotingPowerChange {
        id: EntityId::for_log(log),
        regime,
        chain_id: log.chain_id,
        voter: voter.id.clone(),
        token: log.contract,
        amount: delta.abs(),
        previous_balance,
        new_balance,
        log_index: log.log_index,
        changed: Milestone::from(log),
    })?;

    let weight = voter.weight_mut(regime);
    weight.set_locked(new_balance);
    let spells = weight.current_spells.clone();
    tx.set(&voter)?;

    add_weight(tx, regime, &spells, delta).await
}

/// Move the voter's full weight from their previous spells onto the slate
async fn vote(
    tx: &mut StoreTransaction,
    reader: &dyn ContractReader,
    regime: Regime,
    log: &LogInfo,
    usr: &Address,
    slate_id: &Bytes32,
) -> Result<()> {
    let mut voter = get_or_create_voter(tx, log.chain_id, usr).await?;
    let slate: Slate = resolve_slate(tx, reader, regime, log, slate_id).await?;

    let weight = voter.weight(regime).locked_raw;
    let previous = voter.weight(regime).current_spells.clone();
    remove_weight(tx, regime, &previous, weight).await?;

    for spell_id in &slate.yays {
        let Some(mut spell) = tx.get_in::<Spell>(regime, spell_id).await? else {
            continue;
        };
        tx.set(&ExecutiveVote {
            id: spell_id.child(usr),
            regime,
            chain_id: log.chain_id,
            spell: spell_id.clone(),
            voter: voter.id.clone(),
            weight,
            cast: Milestone::from(log),
        })?;
        spell.total_votes += 1;
        spell.total_weighted_votes += weight;
        tx.set(&spell)?;
    }

    let regime_weight = voter.weight_mut(regime);
    regime_weight.current_spells = slate.yays;
    regime_weight.executive_votes += 1;
    voter.last_voted_timestamp = log.block_timestamp;
    tx.set(&voter)
}

/// Mark a spell lifted, snapshotting its weighted support.  Unknown spells
/// are ignored.
async fn lift(
    tx: &mut StoreTransaction,
    regime: Regime,
    log: &LogInfo,
    whom: &Address,
) -> Result<()> {
    let id = EntityId::for_address(log.chain_id, whom);
    let Some(mut spell) = tx.get_in::<Spell>(regime, &id).await? else {
        debug!("Lift of unknown {regime} spell {id}");
        return Ok(());
    };

    spell.state = SpellState::Lifted;
    spell.lifted = Some(Milestone::from(log));
    spell.lifted_with = Some(spell.total_weighted_votes);
    tx.set(&spell)
}

/// Chief event processing state
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

    /// Apply one chief event atomically
    pub async fn handle(&mut self, log: &LogInfo, message: &ChainMessage) -> Result<()> {
        let Some((regime, operation)) = chief_operation(message)? else {
            self.ignored += 1;
            return Ok(());
        };
        debug!("Chief {regime} {operation:?} at block {}", log.block_number);

        let mut tx = self.db.begin().await;
        apply_operation(&mut tx, self.reader.as_ref(), regime, log, operation).await?;
        let written = tx.commit().await?;

        self.events += 1;
        self.writes += written as u64;
        Ok(())
    }

    /// Log progress
    pub async fn tick(&self) -> Result<()> {
        let voters = self.db.count_in::<Voter>(()).await?;
        let legacy_spells = self.db.count_in::<Spell>(Regime::Legacy).await?;
        let current_spells = self.db.count_in::<Spell>(Regime::Current).await?;
        info!(
            events = self.events,
            ignored = self.ignored,
            writes = self.writes,
            voters,
            legacy_spells,
            current_spells,
            "Chief state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_note::{FREE, LIFT, LOCK, VOTE};
    use agora_common::messages::{AmountEvent, ChiefLiftEvent, ChiefVoteEvent, LogNoteEvent};
    use agora_test_utils::{address, memory_db, slate, FakeContractReader, LogBuilder};

    const CHAIN: u64 = 1;

    fn chief() -> Address {
        address(0xc0)
    }

    fn voter_address() -> Address {
        address(0xaa)
    }

    fn spell_id(n: u8) -> EntityId {
        EntityId::for_address(CHAIN, &address(n))
    }

    struct Harness {
        db: EntityDb,
        reader: Arc<FakeContractReader>,
        state: State,
        logs: LogBuilder,
    }

    impl Harness {
        fn new() -> Self {
            let db = memory_db();
            let reader = Arc::new(FakeContractReader::new());
            let state = State::new(db.clone(), reader.clone());
            Self {
                db,
                reader,
                state,
                logs: LogBuilder::new(CHAIN, chief()),
            }
        }

        async fn send(&mut self, message: ChainMessage) -> Result<()> {
            let log = self.logs.next();
            self.state.handle(&log, &message).await
        }

        async fn lock(&mut self, wad: Wad) {
            let usr = voter_address();
            self.send(ChainMessage::ChiefLock(AmountEvent { usr, wad })).await.unwrap();
        }

        async fn free(&mut self, wad: Wad) {
            let usr = voter_address();
            self.send(ChainMessage::ChiefFree(AmountEvent { usr, wad })).await.unwrap();
        }

        async fn vote(&mut self, slate: Bytes32) {
            let usr = voter_address();
            self.send(ChainMessage::ChiefVote(ChiefVoteEvent { usr, slate })).await.unwrap();
        }

        async fn voter(&self) -> Voter {
            let id = EntityId::for_address(CHAIN, &voter_address());
            self.db.get::<Voter>(&id).await.unwrap().unwrap()
        }

        async fn spell(&self, regime: Regime, n: u8) -> Option<Spell> {
            self.db.get_in::<Spell>(regime, &spell_id(n)).await.unwrap()
        }

        async fn weighted(&self, n: u8) -> Wad {
            self.spell(Regime::Current, n).await.unwrap().total_weighted_votes
        }
    }

    #[tokio::test]
    async fn lock_then_vote_then_free() {
        let mut h = Harness::new();
        h.reader
            .with_slate(chief(), slate(1), vec![address(1), address(2)])
            .with_spell(address(1), "p1", 10)
            .with_spell(address(2), "p2", 10);

        h.lock(100).await;
        assert_eq!(h.voter().await.current.locked_raw, 100);

        h.vote(slate(1)).await;
        assert_eq!(h.weighted(1).await, 100);
        assert_eq!(h.weighted(2).await, 100);
        assert_eq!(h.voter().await.current.current_spells, vec![spell_id(1), spell_id(2)]);

        h.free(40).await;
        let voter = h.voter().await;
        assert_eq!(voter.current.locked_raw, 60);
        assert_eq!(h.weighted(1).await, 60);
        assert_eq!(h.weighted(2).await, 60);

        // weight conservation: every supported spell carries exactly the voter's weight
        for id in &voter.current.current_spells {
            let spell = h.db.get_in::<Spell>(Regime::Current, id).await.unwrap().unwrap();
            assert_eq!(spell.total_weighted_votes, voter.current.locked_raw);
        }
    }

    #[tokio::test]
    async fn revote_moves_weight() {
        let mut h = Harness::new();
        h.reader
            .with_slate(chief(), slate(1), vec![address(1)])
            .with_slate(chief(), slate(2), vec![address(2)])
            .with_spell(address(1), "p1", 10)
            .with_spell(address(2), "p2", 10);

        h.lock(50).await;
        h.vote(slate(1)).await;
        assert_eq!(h.weighted(1).await, 50);

        h.vote(slate(2)).await;
        assert_eq!(h.weighted(1).await, 0);
        assert_eq!(h.weighted(2).await, 50);
        let voter = h.voter().await;
        assert_eq!(voter.current.current_spells, vec![spell_id(2)]);
        assert_eq!(voter.current.executive_votes, 2);
    }

    #[tokio::test]
    async fn unmaterialised_spell_is_skipped_everywhere() {
        let mut h = Harness::new();
        h.reader
            .with_slate(chief(), slate(1), vec![address(1), address(9)])
            .with_spell(address(1), "p1", 10)
            .with_broken_spell(address(9));

        h.lock(30).await;
        h.vote(slate(1)).await;

        let slate_key = EntityId::for_slate(CHAIN, &slate(1));
        let stored = h.db.get_in::<Slate>(Regime::Current, &slate_key).await.unwrap();
        assert_eq!(stored.unwrap().yays, vec![spell_id(1), spell_id(9)]);
        assert!(h.spell(Regime::Current, 9).await.is_none());
        assert_eq!(h.db.count_in::<ExecutiveVote>(Regime::Current).await.unwrap(), 1);
        assert_eq!(h.voter().await.current.current_spells, vec![spell_id(1), spell_id(9)]);

        h.free(10).await;
        assert_eq!(h.weighted(1).await, 20);
        assert!(h.spell(Regime::Current, 9).await.is_none());
    }

    #[tokio::test]
    async fn repeated_slate_member_counts_once() {
        let mut h = Harness::new();
        h.reader
            .with_slate(chief(), slate(1), vec![address(1), address(1)])
            .with_spell(address(1), "p1", 10);

        h.lock(100).await;
        h.vote(slate(1)).await;

        let spell = h.spell(Regime::Current, 1).await.unwrap();
        assert_eq!(spell.total_votes, 1);
        assert_eq!(spell.total_weighted_votes, 100);
        assert_eq!(h.voter().await.current.current_spells, vec![spell_id(1)]);

        h.free(100).await;
        assert_eq!(h.weighted(1).await, 0);
    }

    #[tokio::test]
    async fn repeated_vote_overwrites_record() {
        let mut h = Harness::new();
        h.reader.with_slate(chief(), slate(1), vec![address(1)]).with_spell(address(1), "p1", 10);

        h.lock(10).await;
        h.vote(slate(1)).await;
        h.lock(5).await;
        h.vote(slate(1)).await;

        assert_eq!(h.db.count_in::<ExecutiveVote>(Regime::Current).await.unwrap(), 1);
        let record_id = spell_id(1).child(voter_address());
        let record = h.db.get_in::<ExecutiveVote>(Regime::Current, &record_id).await.unwrap();
        assert_eq!(record.unwrap().weight, 15);

        let spell = h.spell(Regime::Current, 1).await.unwrap();
        assert_eq!(spell.total_votes, 2);
        assert_eq!(spell.total_weighted_votes, 15);
    }

    #[tokio::test]
    async fn vote_record_keeps_weight_at_cast() {
        let mut h = Harness::new();
        h.reader.with_slate(chief(), slate(1), vec![address(1)]).with_spell(address(1), "p1", 10);

        h.lock(10).await;
        h.vote(slate(1)).await;
        h.lock(90).await;

        let record_id = spell_id(1).child(voter_address());
        let record = h.db.get_in::<ExecutiveVote>(Regime::Current, &record_id).await.unwrap();
        assert_eq!(record.unwrap().weight, 10);
        assert_eq!(h.weighted(1).await, 100);
    }

    #[tokio::test]
    async fn voting_power_changes_record_balances() {
        let mut h = Harness::new();
        h.lock(70).await;
        h.free(20).await;

        assert_eq!(h.db.count_in::<VotingPowerChange>(Regime::Current).await.unwrap(), 2);
        assert_eq!(h.db.count_in::<VotingPowerChange>(Regime::Legacy).await.unwrap(), 0);

        let mut logs = LogBuilder::new(CHAIN, chief());
        logs.next();
        let free_id = EntityId::for_log(&logs.next());
        let change = h.db.get_in::<VotingPowerChange>(Regime::Current, &free_id).await.unwrap();
        let change = change.unwrap();
        assert_eq!(change.amount, 20);
        assert_eq!(change.previous_balance, 70);
        assert_eq!(change.new_balance, 50);
        assert_eq!(change.token, chief());
    }

    #[tokio::test]
    async fn lift_snapshots_support() {
        let mut h = Harness::new();
        h.reader.with_slate(chief(), slate(1), vec![address(1)]).with_spell(address(1), "p1", 10);
        h.lock(42).await;
        h.vote(slate(1)).await;

        h.send(ChainMessage::ChiefLift(ChiefLiftEvent { whom: address(1) })).await.unwrap();
        h.free(2).await;

        let spell = h.spell(Regime::Current, 1).await.unwrap();
        assert_eq!(spell.state, SpellState::Lifted);
        assert_eq!(spell.lifted_with, Some(42));
        assert_eq!(spell.total_weighted_votes, 40);
        assert!(spell.lifted.is_some());
    }

    #[tokio::test]
    async fn lift_of_unknown_spell_writes_nothing() {
        let db = memory_db();
        let reader = FakeContractReader::new();
        let log = LogBuilder::new(CHAIN, chief()).next();

        let mut tx = db.begin().await;
        let operation = ChiefOperation::Lift { whom: address(7) };
        apply_operation(&mut tx, &reader, Regime::Legacy, &log, operation).await.unwrap();
        assert_eq!(tx.staged(), 0);
    }

    #[tokio::test]
    async fn legacy_log_notes_use_legacy_regime() {
        let mut h = Harness::new();
        h.reader.with_slate(chief(), slate(1), vec![address(1)]).with_spell(address(1), "p1", 10);
        let guy = voter_address();
        let note = |sig, foo| {
            ChainMessage::LogNote(LogNoteEvent {
                sig,
                guy,
                foo,
                bar: Bytes32::ZERO,
            })
        };

        h.send(note(LOCK, Bytes32::from_u64(25))).await.unwrap();
        h.send(note(VOTE, slate(1))).await.unwrap();
        h.send(note(FREE, Bytes32::from_u64(5))).await.unwrap();

        let voter = h.voter().await;
        assert_eq!(voter.legacy.locked_raw, 20);
        assert_eq!(voter.legacy.executive_votes, 1);
        assert_eq!(voter.current.locked_raw, 0);
        assert_eq!(h.spell(Regime::Legacy, 1).await.unwrap().total_weighted_votes, 20);
        assert!(h.spell(Regime::Current, 1).await.is_none());

        h.send(note(LIFT, Bytes32::from_address(&address(1)))).await.unwrap();
        assert_eq!(h.spell(Regime::Legacy, 1).await.unwrap().state, SpellState::Lifted);
    }

    #[tokio::test]
    async fn failed_event_leaves_store_untouched() {
        let mut h = Harness::new();
        h.lock(10).await;
        h.reader.with_failing_chain(CHAIN);

        let usr = voter_address();
        let result = h.send(ChainMessage::ChiefVote(ChiefVoteEvent { usr, slate: slate(1) })).await;
        assert!(result.is_err());

        let voter = h.voter().await;
        assert_eq!(voter.current.executive_votes, 0);
        assert_eq!(h.db.count_in::<Slate>(Regime::Current).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unrelated_messages_are_ignored() {
        let mut h = Harness::new();
        let other = ChainMessage::DelegateLock(AmountEvent {
            usr: voter_address(),
            wad: 1,
        });
        h.send(other).await.unwrap();
        assert_eq!(h.db.count_in::<Voter>(()).await.unwrap(), 0);
    }
}
