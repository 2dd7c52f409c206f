//! Minimal ABI encoding for the view calls we make

use crate::hash::{Address, Bytes32, Selector};
use crate::math::{wad_from_word, AmountError};
use crate::types::Wad;

/// `slates(bytes32,uint256)`
pub const SLATES: Selector = Selector::new([0xc2, 0xff, 0xc7, 0xbb]);

/// `description()`
pub const DESCRIPTION: Selector = Selector::new([0x72, 0x84, 0xe4, 0x16]);

/// `expiration()`
pub const EXPIRATION: Selector = Selector::new([0x46, 0x65, 0x09, 0x6d]);

/// `rate()`
pub const RATE: Selector = Selector::new([0x2c, 0x4e, 0x72, 0x2e]);

/// `ownerUrns(address,uint256)`
pub const OWNER_URNS: Selector = Selector::new([0xd9, 0xf0, 0x61, 0x92]);

/// `coins(uint256)`
pub const COINS: Selector = Selector::new([0xc6, 0x61, 0x06, 0x57]);

/// Calldata as `0x` hex: selector followed by static 32-byte arguments
pub fn encode_call(selector: &Selector, args: &[Bytes32]) -> String {
    let mut data = selector.to_vec();
    for arg in args {
        data.extend_from_slice(arg.as_ref());
    }
    format!("0x{}", hex::encode(data))
}

/// Split return data into words; empty data means the callee returned nothing
pub fn decode_words(data: &str) -> Result<Vec<Bytes32>, String> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(digits).map_err(|e| e.to_string())?;
    if bytes.len() % 32 != 0 {
        return Err(format!("return data of {} bytes is not word aligned", bytes.len()));
    }
    Ok(bytes
        .chunks(32)
        .filter_map(|chunk| Bytes32::try_from(chunk).ok())
        .collect())
}

pub fn decode_address(words: &[Bytes32]) -> Result<Option<Address>, String> {
    Ok(words.first().map(Address::from_word))
}

pub fn decode_wad(words: &[Bytes32]) -> Result<Option<Wad>, String> {
    words
        .first()
        .map(wad_from_word)
        .transpose()
        .map_err(|e: AmountError| e.to_string())
}

pub fn decode_u64(words: &[Bytes32]) -> Result<Option<u64>, String> {
    match decode_wad(words)? {
        Some(value) => u64::try_from(value).map(Some).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

/// Dynamic `string` return: offset word, length word, padded bytes
pub fn decode_string(words: &[Bytes32]) -> Result<Option<String>, String> {
    let Some(offset) = words.first() else {
        return Ok(None);
    };
    let offset = word_as_usize(offset)?;
    if offset % 32 != 0 {
        return Err(format!("string offset {offset} is not word aligned"));
    }
    let start = offset / 32;
    let length = words
        .get(start)
        .ok_or_else(|| "string length out of range".to_string())
        .and_then(word_as_usize)?;
    let bytes: Vec<u8> =
        words.iter().skip(start + 1).flat_map(|word| word.to_vec()).take(length).collect();
    if bytes.len() < length {
        return Err(format!("string of {length} bytes is truncated"));
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn word_as_usize(word: &Bytes32) -> Result<usize, String> {
    let value = wad_from_word(word).map_err(|e| e.to_string())?;
    usize::try_from(value).map_err(|e| e.to_string())
}
