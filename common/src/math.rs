use crate::hash::Bytes32;
use crate::types::Wad;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use thiserror::Error;

/// Decimals of every governance token amount
pub const WAD_DECIMALS: i64 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount {0} does not fit in 127 bits")]
    TooWide(String),

    #[error("Invalid hex amount '{0}'")]
    InvalidHex(String),
}

/// Scale a raw amount down to its human decimal value
pub fn to_decimal(raw: Wad) -> BigDecimal {
    BigDecimal::new(BigInt::from(raw), WAD_DECIMALS)
}

/// Read a big-endian uint256 word as an amount
pub fn wad_from_word(word: &Bytes32) -> Result<Wad, AmountError> {
    // Top 16 bytes plus the sign bit of the low half must be clear
    if word[..16].iter().any(|b| *b != 0) || word[16] & 0x80 != 0 {
        return Err(AmountError::TooWide(word.to_string()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(i128::from_be_bytes(low))
}

/// Read a `0x` hex quantity of any length as an amount
pub fn wad_from_hex(hex_str: &str) -> Result<Wad, AmountError> {
    let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        return Err(AmountError::TooWide(hex_str.to_string()));
    }
    let value = u128::from_str_radix(digits, 16)
        .map_err(|_| AmountError::InvalidHex(hex_str.to_string()))?;
    Wad::try_from(value).map_err(|_| AmountError::TooWide(hex_str.to_string()))
}
