//! Polling state: routes each emitter's events to its network's tables

use crate::polls::{poll_created, poll_voted, poll_withdrawn};
use agora_common::{
    entities::{Poll, PollNetwork, PollVote},
    messages::ChainMessage,
    store::EntityDb,
    ChainId, LogInfo,
};
use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct State {
    db: EntityDb,
    arbitrum_chains: HashSet<ChainId>,

    events: u64,
    ignored: u64,
    writes: u64,
}

impl State {
    pub fn new(db: EntityDb, arbitrum_chains: impl IntoIterator<Item = ChainId>) -> Self {
        Self {
            db,
            arbitrum_chains: arbitrum_chains.into_iter().collect(),
            events: 0,
            ignored: 0,
            writes: 0,
        }
    }

    fn network(&self, chain_id: ChainId) -> PollNetwork {
        if self.arbitrum_chains.contains(&chain_id) {
            PollNetwork::Arbitrum
        } else {
            PollNetwork::Mainnet
        }
    }

    /// Apply one polling event atomically
    pub async fn handle(&mut self, log: &LogInfo, message: &ChainMessage) -> Result<()> {
        let network = self.network(log.chain_id);
        let mut tx = self.db.begin().await;
        match message {
            ChainMessage::PollCreated(event) => {
                debug!("{network:?} poll {} created", event.poll_id);
                poll_created(&mut tx, network, log, event).await?
            }
            ChainMessage::PollWithdrawn(event) => {
                debug!("{network:?} poll {} withdrawn", event.poll_id);
                poll_withdrawn(&mut tx, network, log, event).await?
            }
            ChainMessage::PollVoted(event) => poll_voted(&mut tx, network, log, event).await?,
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
        let polls = self.db.count_in::<Poll>(PollNetwork::Mainnet).await?;
        let votes = self.db.count_in::<PollVote>(PollNetwork::Mainnet).await?;
        let arbitrum_polls = self.db.count_in::<Poll>(PollNetwork::Arbitrum).await?;
        let arbitrum_votes = self.db.count_in::<PollVote>(PollNetwork::Arbitrum).await?;
        info!(
            events = self.events,
            ignored = self.ignored,
            writes = self.writes,
            polls,
            votes,
            arbitrum_polls,
            arbitrum_votes,
            "Polling state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_common::{
        entities::{ArbitrumVoter, Voter},
        messages::{PollVotedEvent, RewardPaidEvent},
        EntityId,
    };
    use agora_test_utils::{address, memory_db, LogBuilder};

    fn vote(poll_id: u64) -> ChainMessage {
        ChainMessage::PollVoted(PollVotedEvent {
            voter: address(1),
            poll_id,
            option_id: 1,
        })
    }

    #[tokio::test]
    async fn chain_selects_network() {
        let db = memory_db();
        let mut state = State::new(db.clone(), [42161]);

        let mainnet_log = LogBuilder::new(1, address(0xe0)).next();
        let arbitrum_log = LogBuilder::new(42161, address(0xe1)).next();
        state.handle(&mainnet_log, &vote(5)).await.unwrap();
        state.handle(&arbitrum_log, &vote(5)).await.unwrap();

        let mainnet_voter = db.get::<Voter>(&EntityId::for_address(1, &address(1))).await;
        assert_eq!(mainnet_voter.unwrap().unwrap().poll_votes, 1);
        let arbitrum_id = EntityId::for_address(42161, &address(1));
        let arbitrum_voter = db.get::<ArbitrumVoter>(&arbitrum_id).await.unwrap().unwrap();
        assert_eq!(arbitrum_voter.poll_votes, 1);

        assert_eq!(db.count_in::<Poll>(PollNetwork::Mainnet).await.unwrap(), 1);
        assert_eq!(db.count_in::<Poll>(PollNetwork::Arbitrum).await.unwrap(), 1);
        assert_eq!(state.events, 2);
    }

    #[tokio::test]
    async fn other_messages_are_ignored() {
        let db = memory_db();
        let mut state = State::new(db.clone(), [42161]);
        let log = LogBuilder::new(1, address(0xe0)).next();
        let message = ChainMessage::RewardPaid(RewardPaidEvent {
            user: address(1),
            reward: 5,
        });
        state.handle(&log, &message).await.unwrap();
        assert_eq!(state.ignored, 1);
        assert_eq!(db.count_in::<Poll>(PollNetwork::Mainnet).await.unwrap(), 0);
    }
}
