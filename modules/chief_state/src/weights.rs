//! Weight propagation onto supported spells

use agora_common::{entities::Spell, store::StoreTransaction, EntityId, Regime, Wad};
use anyhow::Result;

/// Add `delta` to the weighted tally of every stored spell in `spells`.
/// Ids without a stored spell are skipped.
pub async fn add_weight(
    tx: &mut StoreTransaction,
    regime: Regime,
    spells: &[EntityId],
    delta: Wad,
) -> Result<()> {
    for id in spells {
        if let Some(mut spell) = tx.get_in::<Spell>(regime, id).await? {
            spell.total_weighted_votes += delta;
            tx.set(&spell)?;
        }
    }
    Ok(())
}

pub async fn remove_weight(
    tx: &mut StoreTransaction,
    regime: Regime,
    spells: &[EntityId],
    delta: Wad,
) -> Result<()> {
    add_weight(tx, regime, spells, -delta).await
}
