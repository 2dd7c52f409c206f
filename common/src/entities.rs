//! Persisted entities
//!
//! Every entity is a plain serde value keyed by an [`EntityId`] inside a table.
//! Entities that exist once per governance regime (spells, slates, executive
//! votes, voting power changes) live in a table selected by their [`Regime`];
//! polls are split the same way by [`PollNetwork`].

use crate::hash::{Address, TxHash};
use crate::math::to_decimal;
use crate::types::{ChainId, EngineKind, EntityId, LogInfo, Regime, Wad};
use bigdecimal::BigDecimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A value stored in one of the entity tables
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Selects between parallel tables of the same entity kind
    type Scope: Copy + Send + Sync;

    fn table(scope: Self::Scope) -> &'static str;

    fn scope(&self) -> Self::Scope;

    fn id(&self) -> &EntityId;
}

macro_rules! single_table {
    ($entity:ty, $table:literal) => {
        impl Entity for $entity {
            type Scope = ();

            fn table(_scope: ()) -> &'static str {
                $table
            }

            fn scope(&self) {}

            fn id(&self) -> &EntityId {
                &self.id
            }
        }
    };
}

/// Block, time and transaction at which something happened
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub block: u64,
    pub time: u64,
    pub tx_hash: TxHash,
}

impl From<&LogInfo> for Milestone {
    fn from(log: &LogInfo) -> Self {
        Self {
            block: log.block_number,
            time: log.block_timestamp,
            tx_hash: log.tx_hash,
        }
    }
}

// -- Voters --

/// What kind of account a voter is
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum VoterRole {
    #[default]
    Plain,

    /// The voter is a vote delegate contract
    Delegate { contract: EntityId },

    /// The voter is a vote proxy contract
    Proxy { contract: EntityId },
}

/// Per-regime slice of a voter's executive voting state
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeWeight {
    /// Locked in chief, base units
    pub locked_raw: Wad,

    /// Locked in chief, 18-decimal human value
    pub locked: BigDecimal,

    /// Spell ids from the voter's last vote, materialized or not
    pub current_spells: Vec<EntityId>,

    /// Number of executive votes cast
    pub executive_votes: u64,
}

impl RegimeWeight {
    pub fn set_locked(&mut self, raw: Wad) {
        self.locked_raw = raw;
        self.locked = to_decimal(raw);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: EntityId,
    pub chain_id: ChainId,
    pub address: Address,
    pub role: VoterRole,

    /// MKR chief state
    pub legacy: RegimeWeight,

    /// SKY chief state
    pub current: RegimeWeight,

    pub poll_votes: u64,
    pub last_voted_timestamp: u64,
}

impl Voter {
    pub fn weight(&self, regime: Regime) -> &RegimeWeight {
        match regime {
            Regime::Legacy => &self.legacy,
            Regime::Current => &self.current,
        }
    }

    pub fn weight_mut(&mut self, regime: Regime) -> &mut RegimeWeight {
        match regime {
            Regime::Legacy => &mut self.legacy,
            Regime::Current => &mut self.current,
        }
    }
}

single_table!(Voter, "voters");

// -- Executive voting --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpellState {
    Active,
    Lifted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub id: EntityId,
    pub regime: Regime,
    pub chain_id: ChainId,
    pub address: Address,
    pub description: Option<String>,
    pub state: SpellState,
    pub created: Milestone,
    pub expiry_time: u64,

    /// Number of vote events that included this spell
    pub total_votes: u64,

    /// Sum of the weights of voters currently supporting this spell
    pub total_weighted_votes: Wad,

    pub cast: Option<Milestone>,
    pub scheduled: Option<Milestone>,
    pub lifted: Option<Milestone>,

    /// `total_weighted_votes` at the moment of lift
    pub lifted_with: Option<Wad>,
}

impl Entity for Spell {
    type Scope = Regime;

    fn table(scope: Regime) -> &'static str {
        match scope {
            Regime::Legacy => "spells",
            Regime::Current => "spells-v2",
        }
    }

    fn scope(&self) -> Regime {
        self.regime
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slate {
    pub id: EntityId,
    pub regime: Regime,
    pub chain_id: ChainId,

    /// Ordered member spell ids, including ones that never materialized
    pub yays: Vec<EntityId>,

    pub created: Milestone,
}

impl Entity for Slate {
    type Scope = Regime;

    fn table(scope: Regime) -> &'static str {
        match scope {
            Regime::Legacy => "slates",
            Regime::Current => "slates-v2",
        }
    }

    fn scope(&self) -> Regime {
        self.regime
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// A voter's support for one spell, as of their latest vote including it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutiveVote {
    pub id: EntityId,
    pub regime: Regime,
    pub chain_id: ChainId,
    pub spell: EntityId,
    pub voter: EntityId,

    /// Voter's locked weight when the vote was cast
    pub weight: Wad,

    pub cast: Milestone,
}

impl Entity for ExecutiveVote {
    type Scope = Regime;

    fn table(scope: Regime) -> &'static str {
        match scope {
            Regime::Legacy => "executive-votes",
            Regime::Current => "executive-votes-v2",
        }
    }

    fn scope(&self) -> Regime {
        self.regime
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerChange {
    pub id: EntityId,
    pub regime: Regime,
    pub chain_id: ChainId,
    pub voter: EntityId,

    /// Chief the tokens were locked in
    pub token: Address,

    pub amount: Wad,
    pub previous_balance: Wad,
    pub new_balance: Wad,
    pub log_index: u32,
    pub changed: Milestone,
}

impl Entity for VotingPowerChange {
    type Scope = Regime;

    fn table(scope: Regime) -> &'static str {
        match scope {
            Regime::Legacy => "voting-power-changes",
            Regime::Current => "voting-power-changes-v2",
        }
    }

    fn scope(&self) -> Regime {
        self.regime
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

// -- Delegation --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    pub id: EntityId,
    pub chain_id: ChainId,
    pub address: Address,
    pub owner: Address,
    pub voter: EntityId,

    /// Delegations with a non-zero amount
    pub delegators: u64,

    pub total_delegated: Wad,
    pub created: Milestone,
    pub version: u8,
}

single_table!(Delegate, "delegates");

/// Link from a delegate owner to their delegate contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateAdmin {
    pub id: EntityId,
    pub delegate: EntityId,
}

single_table!(DelegateAdmin, "delegate-admins");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteProxy {
    pub id: EntityId,
    pub chain_id: ChainId,
    pub cold: Address,
    pub hot: Address,
    pub voter: EntityId,
    pub created: Milestone,
}

single_table!(VoteProxy, "vote-proxies");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: EntityId,
    pub delegate: EntityId,
    pub delegator: Address,
    pub amount: Wad,
    pub timestamp: u64,
}

single_table!(Delegation, "delegations");

/// Where a delegated amount came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelegationOrigin {
    /// Locked straight into the delegate contract
    Direct,

    /// Forwarded by a lockstake engine urn
    Lockstake,

    /// Forwarded by a staking engine urn
    StakingEngine,
}

impl From<EngineKind> for DelegationOrigin {
    fn from(engine: EngineKind) -> Self {
        match engine {
            EngineKind::Lockstake => DelegationOrigin::Lockstake,
            EngineKind::StakingEngine => DelegationOrigin::StakingEngine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationHistory {
    pub id: EntityId,
    pub delegate: EntityId,
    pub delegator: Address,

    /// Signed change, negative on free
    pub amount: Wad,

    /// Delegation amount after the change
    pub accumulated_amount: Wad,

    pub origin: DelegationOrigin,
    pub changed: Milestone,
}

impl DelegationHistory {
    pub fn is_lockstake(&self) -> bool {
        self.origin == DelegationOrigin::Lockstake
    }

    pub fn is_staking_engine(&self) -> bool {
        self.origin == DelegationOrigin::StakingEngine
    }
}

single_table!(DelegationHistory, "delegation-history");

/// Engine vault, keyed by its own address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Urn {
    pub id: EntityId,
    pub chain_id: ChainId,
    pub engine: EngineKind,
    pub address: Address,
    pub owner: Address,
    pub index: u64,

    /// Locked amount, MKR for lockstake and SKY for the staking engine
    pub locked: Wad,

    pub delegate: Option<EntityId>,
    pub reward: Option<EntityId>,
    pub opened: Option<Milestone>,
}

single_table!(Urn, "urns");

// -- Polling --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollNetwork {
    Mainnet,
    Arbitrum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: EntityId,
    pub network: PollNetwork,
    pub chain_id: ChainId,
    pub poll_id: u64,
    pub creator: Option<Address>,
    pub block_created: Option<u64>,
    pub start_date: Option<u64>,
    pub end_date: Option<u64>,
    pub multi_hash: Option<String>,
    pub url: Option<String>,
    pub block_withdrawn: Option<u64>,
    pub withdrawn_by: Option<Address>,
}

impl Entity for Poll {
    type Scope = PollNetwork;

    fn table(scope: PollNetwork) -> &'static str {
        match scope {
            PollNetwork::Mainnet => "polls",
            PollNetwork::Arbitrum => "arbitrum-polls",
        }
    }

    fn scope(&self) -> PollNetwork {
        self.network
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollVote {
    pub id: EntityId,
    pub network: PollNetwork,
    pub chain_id: ChainId,
    pub voter: EntityId,
    pub poll: EntityId,
    pub choice: u64,
    pub cast: Milestone,
}

impl Entity for PollVote {
    type Scope = PollNetwork;

    fn table(scope: PollNetwork) -> &'static str {
        match scope {
            PollNetwork::Mainnet => "poll-votes",
            PollNetwork::Arbitrum => "arbitrum-poll-votes",
        }
    }

    fn scope(&self) -> PollNetwork {
        self.network
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Poll-only voter on Arbitrum, separate from the mainnet executive voter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrumVoter {
    pub id: EntityId,
    pub chain_id: ChainId,
    pub address: Address,
    pub poll_votes: u64,
    pub last_voted_timestamp: u64,
}

single_table!(ArbitrumVoter, "arbitrum-voters");

// -- Rewards --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: EntityId,
    pub chain_id: ChainId,
    pub address: Address,
    pub total_supplied: Wad,
    pub total_rewards_claimed: Wad,
    pub lockstake_active: bool,
    pub staking_engine_active: bool,
}

impl Reward {
    /// Zero-valued pool for a reward contract
    pub fn new(chain_id: ChainId, address: Address) -> Self {
        Self {
            id: EntityId::for_address(chain_id, &address),
            chain_id,
            address,
            total_supplied: 0,
            total_rewards_claimed: 0,
            lockstake_active: false,
            staking_engine_active: false,
        }
    }
}

single_table!(Reward, "rewards");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSupplier {
    pub id: EntityId,
    pub reward: EntityId,
    pub user: Address,
    pub amount: Wad,
}

single_table!(RewardSupplier, "reward-suppliers");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_tables_are_distinct() {
        assert_ne!(Spell::table(Regime::Legacy), Spell::table(Regime::Current));
        assert_ne!(Slate::table(Regime::Legacy), Slate::table(Regime::Current));
        assert_ne!(Poll::table(PollNetwork::Mainnet), Poll::table(PollNetwork::Arbitrum));
        assert_eq!(Voter::table(()), "voters");
    }

    #[test]
    fn role_serialises_with_tag() {
        let role = VoterRole::Delegate {
            contract: EntityId::from("1-0x01"),
        };
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["kind"], "delegate");
        assert_eq!(json["contract"], "1-0x01");
    }

    #[test]
    fn set_locked_keeps_decimal_in_step() {
        let mut weight = RegimeWeight::default();
        weight.set_locked(2_000_000_000_000_000_000);
        assert_eq!(weight.locked, BigDecimal::from(2));
    }
}
