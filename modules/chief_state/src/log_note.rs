//! Legacy chief `LogNote` decoding
//!
//! The legacy chief emits one anonymous `LogNote` for every noted call, with
//! the caller in `guy` and the first argument word in `foo`.  Only four of
//! those calls move voting state; everything else is administrative.

use agora_common::{
    math::{wad_from_word, AmountError},
    messages::LogNoteEvent,
    Address, Bytes32, Selector, Wad,
};

/// `lock(uint256)`
pub const LOCK: Selector = Selector::new([0xdd, 0x46, 0x70, 0x64]);

/// `free(uint256)`
pub const FREE: Selector = Selector::new([0xd8, 0xcc, 0xd0, 0xf3]);

/// `vote(bytes32)`
pub const VOTE: Selector = Selector::new([0xa6, 0x9b, 0xea, 0xba]);

/// `lift(address)`
pub const LIFT: Selector = Selector::new([0x3c, 0x27, 0x8b, 0xd5]);

/// A chief call that changes voting state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChiefOperation {
    Lock { usr: Address, wad: Wad },
    Free { usr: Address, wad: Wad },
    Vote { usr: Address, slate: Bytes32 },
    Lift { whom: Address },
}

impl ChiefOperation {
    /// Typed operation for a `LogNote`, or `None` for calls that do not
    /// affect voting
    pub fn from_log_note(note: &LogNoteEvent) -> Result<Option<Self>, AmountError> {
        let operation = match note.sig {
            LOCK => Self::Lock {
                usr: note.guy,
                wad: wad_from_word(&note.foo)?,
            },
            FREE => Self::Free {
                usr: note.guy,
                wad: wad_from_word(&note.foo)?,
            },
            VOTE => Self::Vote {
                usr: note.guy,
                slate: note.foo,
            },
            LIFT => Self::Lift {
                whom: Address::from_word(&note.foo),
            },
            _ => return Ok(None),
        };
        Ok(Some(operation))
    }
}
