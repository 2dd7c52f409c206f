//! Engine urn registry

use crate::entities::Urn;
use crate::hash::Address;
use crate::store::StoreTransaction;
use crate::types::{ChainId, EngineKind, EntityId};
use anyhow::Result;

/// Stored urn at `address`, or an empty one owned by `owner`.  The caller
/// stages it.
pub async fn get_or_create_urn(
    tx: &StoreTransaction,
    chain_id: ChainId,
    engine: EngineKind,
    address: &Address,
    owner: &Address,
    index: u64,
) -> Result<Urn> {
    let id = EntityId::for_address(chain_id, address);
    Ok(tx.get::<Urn>(&id).await?.unwrap_or_else(|| Urn {
        id,
        chain_id,
        engine,
        address: *address,
        owner: *owner,
        index,
        locked: 0,
        delegate: None,
        reward: None,
        opened: None,
    }))
}
