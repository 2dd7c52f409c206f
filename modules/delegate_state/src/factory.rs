//! Delegate factories and vote proxy links

use agora_common::{
    entities::{Delegate, DelegateAdmin, Milestone, VoteProxy, VoterRole},
    messages::{DelegateCreatedEvent, VoteProxyCreatedEvent},
    store::StoreTransaction,
    voters::get_or_create_voter,
    EntityId, LogInfo,
};
use anyhow::Result;
use tracing::{info, warn};

/// Register a new vote delegate contract and link its owner to it
pub async fn delegate_created(
    tx: &mut StoreTransaction,
    log: &LogInfo,
    event: &DelegateCreatedEvent,
) -> Result<()> {
    let id = EntityId::for_address(log.chain_id, &event.contract);

    let mut voter = get_or_create_voter(tx, log.chain_id, &event.contract).await?;
    if let VoterRole::Proxy { .. } = voter.role {
        warn!("Vote proxy {} re-registered as delegate", voter.id);
    }
    voter.role = VoterRole::Delegate {
        contract: id.clone(),
    };
    tx.set(&voter)?;

    if !tx.exists_in::<Delegate>((), &id).await? {
        info!("New v{} delegate {} owned by {}", event.version, event.contract, event.owner);
        tx.set(&Delegate {
            id: id.clone(),
            chain_id: log.chain_id,
            address: event.contract,
            owner: event.owner,
            voter: voter.id.clone(),
            delegators: 0,
            total_delegated: 0,
            created: Milestone::from(log),
            version: event.version,
        })?;
    }

    tx.set(&DelegateAdmin {
        id: EntityId::for_address(log.chain_id, &event.owner),
        delegate: id,
    })
}

/// Record a confirmed cold/hot link and mark the proxy's voter
pub async fn vote_proxy_created(
    tx: &mut StoreTransaction,
    log: &LogInfo,
    event: &VoteProxyCreatedEvent,
) -> Result<()> {
    let id = EntityId::for_address(log.chain_id, &event.proxy);

    let mut voter = get_or_create_voter(tx, log.chain_id, &event.proxy).await?;
    if let VoterRole::Delegate { .. } = voter.role {
        warn!("Delegate {} re-registered as vote proxy", voter.id);
    }
    voter.role = VoterRole::Proxy {
        contract: id.clone(),
    };
    tx.set(&voter)?;

    tx.set(&VoteProxy {
        id,
        chain_id: log.chain_id,
        cold: event.cold,
        hot: event.hot,
        voter: voter.id,
        created: Milestone::from(log),
    })
}
