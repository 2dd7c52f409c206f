use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, ops::Deref, str::FromStr};

/// Fixed-width EVM data of `BYTES` long: addresses, words, hashes and selectors.
///
/// Always rendered as lowercase `0x`-prefixed hex, which is also the form used
/// inside entity identifiers, so two spellings of the same address can never
/// produce two different keys.
///
/// # Examples
///
/// ```ignore
/// use agora_common::Address;
///
/// let chief: Address = "0x0a3f6849f78076aefaDf113F5BED87720274dDC0".parse().unwrap();
/// assert_eq!(chief.to_string(), "0x0a3f6849f78076aefadf113f5bed87720274ddc0");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedBytes<const BYTES: usize>([u8; BYTES]);

/// 20-byte account or contract address
pub type Address = FixedBytes<20>;

/// 32-byte EVM word
pub type Bytes32 = FixedBytes<32>;

/// Transaction hash
pub type TxHash = FixedBytes<32>;

/// 4-byte method selector
pub type Selector = FixedBytes<4>;

impl<const BYTES: usize> Default for FixedBytes<BYTES> {
    fn default() -> Self {
        Self::new([0u8; BYTES])
    }
}

// Implement Serialize/Deserialize manually since generic const arrays don't auto-derive
impl<const BYTES: usize> Serialize for FixedBytes<BYTES> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de, const BYTES: usize> Deserialize<'de> for FixedBytes<BYTES> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<const BYTES: usize> FixedBytes<BYTES> {
    /// Creates a new value from a byte array.
    #[inline]
    pub const fn new(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }

    /// The all-zero value
    pub const ZERO: Self = Self([0u8; BYTES]);

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    #[inline]
    pub fn into_inner(self) -> [u8; BYTES] {
        self.0
    }
}

impl Address {
    /// Take the low 20 bytes of a 32-byte word, the ABI layout of an address argument
    pub fn from_word(word: &Bytes32) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word.0[12..]);
        Self(bytes)
    }
}

impl Bytes32 {
    /// Left-pad an address into a 32-byte word
    pub fn from_address(address: &Address) -> Self {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&address.0);
        Self(bytes)
    }

    /// Encode an unsigned integer as a big-endian word
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl<const BYTES: usize> From<[u8; BYTES]> for FixedBytes<BYTES> {
    #[inline]
    fn from(bytes: [u8; BYTES]) -> Self {
        Self::new(bytes)
    }
}

impl<const BYTES: usize> TryFrom<&[u8]> for FixedBytes<BYTES> {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; BYTES] = value.try_into()?;
        Ok(Self::new(bytes))
    }
}

impl<const BYTES: usize> AsRef<[u8]> for FixedBytes<BYTES> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const BYTES: usize> Deref for FixedBytes<BYTES> {
    type Target = [u8; BYTES];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const BYTES: usize> fmt::Debug for FixedBytes<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("FixedBytes<{BYTES}>")).field(&self.to_string()).finish()
    }
}

impl<const BYTES: usize> fmt::Display for FixedBytes<BYTES> {
    /// Formats as a lowercase `0x`-prefixed hexadecimal string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl<const BYTES: usize> FromStr for FixedBytes<BYTES> {
    type Err = hex::FromHexError;

    /// Parses from a hexadecimal string, with or without `0x` and in any case.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or decodes to the wrong length.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let mut bytes = [0u8; BYTES];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_case_and_displays_lowercase() {
        let address: Address = "0x2b16C07D5fD5cC701a0a871eae2aad6DA5fc8f12".parse().unwrap();
        assert_eq!(
            address.to_string(),
            "0x2b16c07d5fd5cc701a0a871eae2aad6da5fc8f12"
        );

        let unprefixed: Address = "2b16c07d5fd5cc701a0a871eae2aad6da5fc8f12".parse().unwrap();
        assert_eq!(address, unprefixed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz16c07d5fd5cc701a0a871eae2aad6da5fc8f12".parse::<Address>().is_err());
    }

    #[test]
    fn address_round_trips_through_word() {
        let address: Address = "0xce01c90de7fd1bcfa39e237fe6d8d9f569e8a6a3".parse().unwrap();
        let word = Bytes32::from_address(&address);
        assert_eq!(
            word.to_string(),
            "0x000000000000000000000000ce01c90de7fd1bcfa39e237fe6d8d9f569e8a6a3"
        );
        assert_eq!(Address::from_word(&word), address);
    }

    #[test]
    fn zero_detection() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Bytes32::from_u64(1).is_zero());
    }

    #[test]
    fn serde_uses_hex_strings() {
        let selector = Selector::new([0xdd, 0x46, 0x70, 0x64]);
        let json = serde_json::to_string(&selector).unwrap();
        assert_eq!(json, "\"0xdd467064\"");
        let back: Selector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, selector);
    }
}
