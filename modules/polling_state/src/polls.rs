//! Poll lifecycle and poll votes
//!
//! Polls can be voted on before the emitter announces them (a vote may reach
//! a chain before the poll does), so a vote for an unknown poll creates a
//! placeholder that a later `PollCreated` fills in.

use agora_common::{
    entities::{ArbitrumVoter, Milestone, Poll, PollNetwork, PollVote},
    messages::{PollCreatedEvent, PollVotedEvent, PollWithdrawnEvent},
    store::StoreTransaction,
    voters::get_or_create_voter,
    Address, ChainId, EntityId, LogInfo,
};
use anyhow::Result;
use tracing::debug;

fn placeholder_poll(network: PollNetwork, chain_id: ChainId, poll_id: u64) -> Poll {
    Poll {
        id: EntityId::for_poll(chain_id, poll_id),
        network,
        chain_id,
        poll_id,
        creator: None,
        block_created: None,
        start_date: None,
        end_date: None,
        multi_hash: None,
        url: None,
        block_withdrawn: None,
        withdrawn_by: None,
    }
}

async fn get_or_create_poll(
    tx: &StoreTransaction,
    network: PollNetwork,
    chain_id: ChainId,
    poll_id: u64,
) -> Result<Poll> {
    let id = EntityId::for_poll(chain_id, poll_id);
    Ok(tx
        .get_in::<Poll>(network, &id)
        .await?
        .unwrap_or_else(|| placeholder_poll(network, chain_id, poll_id)))
}

pub async fn poll_created(
    tx: &mut StoreTransaction,
    network: PollNetwork,
    log: &LogInfo,
    event: &PollCreatedEvent,
) -> Result<()> {
    let mut poll = get_or_create_poll(tx, network, log.chain_id, event.poll_id).await?;
    poll.creator = Some(event.creator);
    poll.block_created = Some(event.block_created);
    poll.start_date = Some(event.start_date);
    poll.end_date = Some(event.end_date);
    poll.multi_hash = Some(event.multi_hash.clone());
    if event.url.is_some() {
        poll.url = event.url.clone();
    }
    tx.set(&poll)
}

/// Only polls already seen can be withdrawn
pub async fn poll_withdrawn(
    tx: &mut StoreTransaction,
    network: PollNetwork,
    log: &LogInfo,
    event: &PollWithdrawnEvent,
) -> Result<()> {
    let id = EntityId::for_poll(log.chain_id, event.poll_id);
    let Some(mut poll) = tx.get_in::<Poll>(network, &id).await? else {
        debug!("Withdrawal of unknown {network:?} poll {id}");
        return Ok(());
    };
    poll.block_withdrawn = Some(event.block_withdrawn);
    poll.withdrawn_by = Some(event.creator);
    tx.set(&poll)
}

/// Record a vote.  A second vote by the same voter in the same block
/// overwrites the first without counting again.
pub async fn poll_voted(
    tx: &mut StoreTransaction,
    network: PollNetwork,
    log: &LogInfo,
    event: &PollVotedEvent,
) -> Result<()> {
    let poll_entity_id = EntityId::for_poll(log.chain_id, event.poll_id);
    if !tx.exists_in::<Poll>(network, &poll_entity_id).await? {
        tx.set(&placeholder_poll(network, log.chain_id, event.poll_id))?;
    }

    let vote_id = poll_entity_id.child(event.voter).child(log.block_number);
    let first = !tx.exists_in::<PollVote>(network, &vote_id).await?;
    let voter_id = record_voter(tx, network, log, &event.voter, first).await?;

    tx.set(&PollVote {
        id: vote_id,
        network,
        chain_id: log.chain_id,
        voter: voter_id,
        poll: poll_entity_id,
        choice: event.option_id,
        cast: Milestone::from(log),
    })
}

/// Advance the voter's last vote time, counting the vote if it is new
async fn record_voter(
    tx: &mut StoreTransaction,
    network: PollNetwork,
    log: &LogInfo,
    address: &Address,
    first: bool,
) -> Result<EntityId> {
    let counted = u64::from(first);
    match network {
        PollNetwork::Mainnet => {
            let mut voter = get_or_create_voter(tx, log.chain_id, address).await?;
            voter.poll_votes += counted;
            voter.last_voted_timestamp = log.block_timestamp;
            tx.set(&voter)?;
            Ok(voter.id)
        }
        PollNetwork::Arbitrum => {
            let id = EntityId::for_address(log.chain_id, address);
            let mut voter =
                tx.get::<ArbitrumVoter>(&id).await?.unwrap_or_else(|| ArbitrumVoter {
                    id: id.clone(),
                    chain_id: log.chain_id,
                    address: *address,
                    poll_votes: 0,
                    last_voted_timestamp: 0,
                });
            voter.poll_votes += counted;
            voter.last_voted_timestamp = log.block_timestamp;
            tx.set(&voter)?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::entities::Voter;
    use agora_test_utils::{address, memory_db, LogBuilder};

    const MAINNET: u64 = 1;
    const ARBITRUM: u64 = 42161;

    fn created(poll_id: u64) -> PollCreatedEvent {
        PollCreatedEvent {
            creator: address(0xc1),
            block_created: 100,
            poll_id,
            start_date: 1_700_000_000,
            end_date: 1_700_600_000,
            multi_hash: "QmPoll".to_string(),
            url: Some("https://vote.sky.money/polling/QmPoll".to_string()),
        }
    }

    fn voted(voter: Address, poll_id: u64, option_id: u64) -> PollVotedEvent {
        PollVotedEvent {
            voter,
            poll_id,
            option_id,
        }
    }

    #[tokio::test]
    async fn vote_before_creation_fills_in_later() {
        let db = memory_db();
        let mut logs = LogBuilder::new(MAINNET, address(0xe0));
        let mut tx = db.begin().await;

        poll_voted(&mut tx, PollNetwork::Mainnet, &logs.next(), &voted(address(1), 7, 2))
            .await
            .unwrap();
        let id = EntityId::for_poll(MAINNET, 7);
        let placeholder = tx.get_in::<Poll>(PollNetwork::Mainnet, &id).await.unwrap().unwrap();
        assert!(placeholder.creator.is_none());

        poll_created(&mut tx, PollNetwork::Mainnet, &logs.next(), &created(7)).await.unwrap();
        let poll = tx.get_in::<Poll>(PollNetwork::Mainnet, &id).await.unwrap().unwrap();
        assert_eq!(poll.creator, Some(address(0xc1)));
        assert_eq!(poll.multi_hash.as_deref(), Some("QmPoll"));
        assert_eq!(poll.block_created, Some(100));
    }

    #[tokio::test]
    async fn revote_in_same_block_counts_once() {
        let db = memory_db();
        let mut logs = LogBuilder::new(MAINNET, address(0xe0));
        let mut tx = db.begin().await;
        let voter = address(1);

        poll_voted(&mut tx, PollNetwork::Mainnet, &logs.next(), &voted(voter, 7, 1))
            .await
            .unwrap();
        poll_voted(&mut tx, PollNetwork::Mainnet, &logs.next(), &voted(voter, 7, 3))
            .await
            .unwrap();

        let voter_id = EntityId::for_address(MAINNET, &voter);
        let stored = tx.get::<Voter>(&voter_id).await.unwrap().unwrap();
        assert_eq!(stored.poll_votes, 1);

        let vote_id = EntityId::for_poll(MAINNET, 7).child(voter).child(1);
        let vote = tx.get_in::<PollVote>(PollNetwork::Mainnet, &vote_id).await.unwrap().unwrap();
        assert_eq!(vote.choice, 3);

        let later = logs.at_block(9).next();
        poll_voted(&mut tx, PollNetwork::Mainnet, &later, &voted(voter, 7, 2)).await.unwrap();
        let stored = tx.get::<Voter>(&voter_id).await.unwrap().unwrap();
        assert_eq!(stored.poll_votes, 2);
        assert_eq!(stored.last_voted_timestamp, later.block_timestamp);
    }

    #[tokio::test]
    async fn arbitrum_votes_use_separate_voters() {
        let db = memory_db();
        let log = LogBuilder::new(ARBITRUM, address(0xe1)).next();
        let mut tx = db.begin().await;

        poll_voted(&mut tx, PollNetwork::Arbitrum, &log, &voted(address(1), 3, 1)).await.unwrap();

        let voter_id = EntityId::for_address(ARBITRUM, &address(1));
        let voter = tx.get::<ArbitrumVoter>(&voter_id).await.unwrap().unwrap();
        assert_eq!(voter.poll_votes, 1);
        assert!(tx.get::<Voter>(&voter_id).await.unwrap().is_none());

        let poll_id = EntityId::for_poll(ARBITRUM, 3);
        assert!(tx.exists_in::<Poll>(PollNetwork::Arbitrum, &poll_id).await.unwrap());
        assert!(!tx.exists_in::<Poll>(PollNetwork::Mainnet, &poll_id).await.unwrap());
    }

    #[tokio::test]
    async fn withdrawal_needs_known_poll() {
        let db = memory_db();
        let mut logs = LogBuilder::new(MAINNET, address(0xe0));
        let mut tx = db.begin().await;
        let withdrawn = PollWithdrawnEvent {
            creator: address(0xc1),
            block_withdrawn: 200,
            poll_id: 7,
        };

        poll_withdrawn(&mut tx, PollNetwork::Mainnet, &logs.next(), &withdrawn).await.unwrap();
        assert_eq!(tx.staged(), 0);

        poll_created(&mut tx, PollNetwork::Mainnet, &logs.next(), &created(7)).await.unwrap();
        poll_withdrawn(&mut tx, PollNetwork::Mainnet, &logs.next(), &withdrawn).await.unwrap();
        let id = EntityId::for_poll(MAINNET, 7);
        let poll = tx.get_in::<Poll>(PollNetwork::Mainnet, &id).await.unwrap().unwrap();
        assert_eq!(poll.block_withdrawn, Some(200));
        assert_eq!(poll.withdrawn_by, Some(address(0xc1)));
    }
}
