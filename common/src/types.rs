//! Agora common types

use crate::hash::{Address, Bytes32, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EVM chain id (1 mainnet, 42161 Arbitrum, ...)
pub type ChainId = u64;

/// Token amount in base units (18 decimals).  Signed so that history entries
/// can carry negative deltas.
pub type Wad = i128;

/// Provenance of a single contract log, as delivered by the ingestion layer
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInfo {
    /// Chain the log was emitted on
    pub chain_id: ChainId,

    /// Contract that emitted the log
    pub contract: Address,

    /// Block number
    pub block_number: u64,

    /// Block timestamp (UNIX seconds)
    pub block_timestamp: u64,

    /// Transaction hash
    pub tx_hash: TxHash,

    /// Position of the log within its block
    pub log_index: u32,
}

/// Key of an entity within its table.
///
/// Every identifier is derived from the chain id plus the addressed thing, so
/// the same contract address on two chains never collides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// `{chain}-{address}`: voters, spells, delegates, urns, rewards
    pub fn for_address(chain_id: ChainId, address: &Address) -> Self {
        Self(format!("{chain_id}-{address}"))
    }

    /// `{chain}-{slate}`
    pub fn for_slate(chain_id: ChainId, slate: &Bytes32) -> Self {
        Self(format!("{chain_id}-{slate}"))
    }

    /// `{chain}-{poll id}`
    pub fn for_poll(chain_id: ChainId, poll_id: u64) -> Self {
        Self(format!("{chain_id}-{poll_id}"))
    }

    /// `{chain}-{tx}-{log index}`: one record per emitted log
    pub fn for_log(log: &LogInfo) -> Self {
        Self(format!("{}-{}-{}", log.chain_id, log.tx_hash, log.log_index))
    }

    /// `{self}-{part}`: records owned by another entity
    pub fn child(&self, part: impl fmt::Display) -> Self {
        Self(format!("{}-{part}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Governance token regime.  The legacy (MKR) and current (SKY) chiefs run
/// the same vote accounting on separate weight fields and tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Legacy,
    Current,
}

impl Regime {
    pub const ALL: [Regime; 2] = [Regime::Legacy, Regime::Current];
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Legacy => write!(f, "legacy"),
            Regime::Current => write!(f, "current"),
        }
    }
}

impl FromStr for Regime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" | "mkr" => Ok(Regime::Legacy),
            "current" | "sky" => Ok(Regime::Current),
            _ => Err(anyhow::anyhow!("Unknown regime '{s}'")),
        }
    }
}

/// Which engine emitted an urn event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Lockstake engine, locks MKR (SKY locks are converted)
    Lockstake,

    /// Staking engine, locks SKY directly
    StakingEngine,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Lockstake => write!(f, "lockstake"),
            EngineKind::StakingEngine => write!(f, "staking-engine"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> LogInfo {
        LogInfo {
            chain_id: 1,
            tx_hash: TxHash::new([0xab; 32]),
            log_index: 7,
            ..Default::default()
        }
    }

    #[test]
    fn address_ids_are_chain_scoped_and_lowercase() {
        let address: Address = "0xAbCdEf0000000000000000000000000000000001".parse().unwrap();
        assert_eq!(
            EntityId::for_address(1, &address).as_str(),
            "1-0xabcdef0000000000000000000000000000000001"
        );
        assert_ne!(
            EntityId::for_address(1, &address),
            EntityId::for_address(42161, &address)
        );
    }

    #[test]
    fn log_and_child_ids() {
        let id = EntityId::for_log(&log());
        assert!(id.as_str().starts_with("1-0xabab"));
        assert!(id.as_str().ends_with("-7"));
        assert_eq!(EntityId::from("1-0x01").child(42).as_str(), "1-0x01-42");
    }

    #[test]
    fn regime_parses_aliases() {
        assert_eq!("sky".parse::<Regime>().unwrap(), Regime::Current);
        assert_eq!("legacy".parse::<Regime>().unwrap(), Regime::Legacy);
        assert!("dai".parse::<Regime>().is_err());
    }
}
