//! Voter registry: get-or-create access to the shared per-address voter

use crate::entities::{RegimeWeight, Voter, VoterRole};
use crate::hash::Address;
use crate::store::StoreTransaction;
use crate::types::{ChainId, EntityId};
use anyhow::Result;

/// Zero-valued voter with empty support sets in both regimes
pub fn new_voter(chain_id: ChainId, address: &Address) -> Voter {
    Voter {
        id: EntityId::for_address(chain_id, address),
        chain_id,
        address: *address,
        role: VoterRole::Plain,
        legacy: RegimeWeight::default(),
        current: RegimeWeight::default(),
        poll_votes: 0,
        last_voted_timestamp: 0,
    }
}

/// Stored voter for `address`, or a fresh one.  The caller stages it.
pub async fn get_or_create_voter(
    tx: &StoreTransaction,
    chain_id: ChainId,
    address: &Address,
) -> Result<Voter> {
    let id = EntityId::for_address(chain_id, address);
    Ok(tx.get::<Voter>(&id).await?.unwrap_or_else(|| new_voter(chain_id, address)))
}
