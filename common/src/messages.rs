//! Definition of Agora messages

use crate::hash::{Address, Bytes32, Selector};
use crate::types::{EngineKind, LogInfo, Wad};
use serde::{Deserialize, Serialize};

// Caryatid core messages which we re-export
pub use caryatid_module_clock::messages::ClockTickMessage;
pub use caryatid_module_rest_server::messages::{GetRESTResponse, RESTRequest, RESTResponse};

/// Anonymous `LogNote` from the legacy chief: selector plus generic positional words
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNoteEvent {
    /// Method selector of the call
    pub sig: Selector,

    /// Caller
    pub guy: Address,

    /// First argument word
    pub foo: Bytes32,

    /// Second argument word
    pub bar: Bytes32,
}

/// `Lock(usr, wad)` / `Free(usr, wad)` on the current chief or a vote delegate
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountEvent {
    pub usr: Address,
    pub wad: Wad,
}

/// `Vote(usr, slate)` on the current chief
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChiefVoteEvent {
    pub usr: Address,
    pub slate: Bytes32,
}

/// `Lift(whom)` on the current chief
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChiefLiftEvent {
    pub whom: Address,
}

/// Delegate factory `CreateVoteDelegate`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateCreatedEvent {
    /// Owner of the delegate contract
    pub owner: Address,

    /// The new delegate contract
    pub contract: Address,

    /// Factory generation (1, 2 or 3)
    pub version: u8,
}

/// Vote proxy factory `LinkConfirmed`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteProxyCreatedEvent {
    pub cold: Address,
    pub hot: Address,
    pub proxy: Address,
}

/// Engine `Open(owner, index, urn)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrnOpenedEvent {
    pub engine: EngineKind,
    pub owner: Address,
    pub index: u64,
    pub urn: Address,
}

/// Engine `SelectVoteDelegate(owner, index, voteDelegate)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrnSelectDelegateEvent {
    pub engine: EngineKind,
    pub owner: Address,
    pub index: u64,
    pub delegate: Address,
}

/// Engine `SelectFarm(owner, index, farm, ref)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrnSelectFarmEvent {
    pub engine: EngineKind,
    pub owner: Address,
    pub index: u64,
    pub farm: Address,
}

/// Engine lock and free variants: `wad` is in the engine's own token unless
/// the variant says otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrnAmountEvent {
    pub engine: EngineKind,
    pub owner: Address,
    pub index: u64,
    pub wad: Wad,
}

/// Engine `AddFarm(farm)` / `DelFarm(farm)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmEvent {
    pub engine: EngineKind,
    pub farm: Address,
}

/// Polling emitter `PollCreated`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCreatedEvent {
    pub creator: Address,
    pub block_created: u64,
    pub poll_id: u64,
    pub start_date: u64,
    pub end_date: u64,
    pub multi_hash: String,
    pub url: Option<String>,
}

/// Polling emitter `PollWithdrawn`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollWithdrawnEvent {
    pub creator: Address,
    pub block_withdrawn: u64,
    pub poll_id: u64,
}

/// Polling emitter `Voted`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollVotedEvent {
    pub voter: Address,
    pub poll_id: u64,
    pub option_id: u64,
}

/// Reward contract `Staked` / `Withdrawn`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAmountEvent {
    pub user: Address,
    pub amount: Wad,
}

/// Reward contract `RewardPaid`
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPaidEvent {
    pub user: Address,
    pub reward: Wad,
}

/// Decoded contract events, one per log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainMessage {
    // Legacy chief
    LogNote(LogNoteEvent),

    // Current chief
    ChiefLock(AmountEvent),
    ChiefFree(AmountEvent),
    ChiefVote(ChiefVoteEvent),
    ChiefLift(ChiefLiftEvent),

    // Delegate factories and delegate contracts
    DelegateCreated(DelegateCreatedEvent),
    VoteProxyCreated(VoteProxyCreatedEvent),
    DelegateLock(AmountEvent),
    DelegateFree(AmountEvent),

    // Lockstake and staking engines
    UrnOpened(UrnOpenedEvent),
    UrnSelectDelegate(UrnSelectDelegateEvent),
    UrnSelectFarm(UrnSelectFarmEvent),
    UrnLock(UrnAmountEvent),
    UrnLockSky(UrnAmountEvent),
    UrnFree(UrnAmountEvent),
    UrnFreeSky(UrnAmountEvent),
    UrnFreeNoFee(UrnAmountEvent),
    FarmAdded(FarmEvent),
    FarmRemoved(FarmEvent),

    // Polling emitters
    PollCreated(PollCreatedEvent),
    PollWithdrawn(PollWithdrawnEvent),
    PollVoted(PollVotedEvent),

    // Reward contracts
    RewardStaked(RewardAmountEvent),
    RewardWithdrawn(RewardAmountEvent),
    RewardPaid(RewardPaidEvent),
}

// === Global message enum ===
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    None(()), // Just so we have a simple default

    // Caryatid standard messages
    Clock(ClockTickMessage),     // Clock tick
    RESTRequest(RESTRequest),    // REST request
    RESTResponse(RESTResponse),  // REST response

    // Decoded contract log with its provenance
    Chain((LogInfo, ChainMessage)),
}

impl Default for Message {
    fn default() -> Self {
        Self::None(())
    }
}

// Casts from specific Caryatid messages
impl From<ClockTickMessage> for Message {
    fn from(msg: ClockTickMessage) -> Self {
        Message::Clock(msg)
    }
}

impl From<RESTRequest> for Message {
    fn from(msg: RESTRequest) -> Self {
        Message::RESTRequest(msg)
    }
}

impl From<RESTResponse> for Message {
    fn from(msg: RESTResponse) -> Self {
        Message::RESTResponse(msg)
    }
}

// Casts to specific Caryatid messages
impl GetRESTResponse for Message {
    fn get_rest_response(&self) -> Option<RESTResponse> {
        if let Message::RESTResponse(result) = self {
            Some(result.clone())
        } else {
            None
        }
    }
}
