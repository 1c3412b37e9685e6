//! Chain primitives: 20-byte addresses and unsigned token amounts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

// ── Address ─────────────────────────────────────────────────────────

/// A 20-byte account or contract address.
///
/// Parsed from `0x`-prefixed hex (case-insensitive), displayed lowercase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse an owner-style field where an empty string, a placeholder, or
    /// the zero address all mean "nobody".
    pub fn parse_optional(raw: &str) -> Option<Address> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<Address>().ok().filter(|addr| !addr.is_zero())
    }

    /// True if `raw` looks like a literal address rather than a symbolic name.
    pub fn looks_like_address(raw: &str) -> bool {
        raw.starts_with("0x") || raw.starts_with("0X")
    }
}

impl FromStr for Address {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ConfigError::InvalidAddress(s.to_string()))?;
        if digits.len() != 40 {
            return Err(ConfigError::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| ConfigError::InvalidAddress(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Amount ──────────────────────────────────────────────────────────

/// Unsigned token amount in the token's smallest unit.
///
/// Descriptors may author amounts as JSON integers or as decimal strings
/// (large values overflow JSON number precision in most tooling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// `units * 10^decimals`, or `None` on overflow.
    pub fn from_units(units: u128, decimals: u8) -> Option<Amount> {
        10u128
            .checked_pow(u32::from(decimals))
            .and_then(|scale| units.checked_mul(scale))
            .map(Amount)
    }

    /// `self * percent / 100`, rounding down. Percentages above 100 clamp.
    pub fn percent(self, percent: u8) -> Amount {
        let percent = percent.min(100);
        Amount(self.0 / 100 * u128::from(percent) + self.0 % 100 * u128::from(percent) / 100)
    }
}

impl FromStr for Amount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| ConfigError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Amount(u128::from(value))),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_and_display_lowercase() {
        let addr: Address = "0xAbCdEf0123456789abcdef0123456789ABCDEF01".parse().unwrap();
        assert_eq!(addr.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!("abcdef0123456789abcdef0123456789abcdef01".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzzcdef0123456789abcdef0123456789abcdef01".parse::<Address>().is_err());
    }

    #[test]
    fn optional_owner_placeholders() {
        assert_eq!(Address::parse_optional(""), None);
        assert_eq!(Address::parse_optional("   "), None);
        assert_eq!(
            Address::parse_optional("0x0000000000000000000000000000000000000000"),
            None
        );
        assert_eq!(Address::parse_optional("<multisig>"), None);
        assert!(Address::parse_optional("0x00000000000000000000000000000000000000aa").is_some());
    }

    #[test]
    fn amount_accepts_int_and_string() {
        let a: Amount = serde_json::from_str("1000").unwrap();
        let b: Amount = serde_json::from_str("\"340282366920938463463374607431768211455\"").unwrap();
        assert_eq!(a, Amount(1000));
        assert_eq!(b, Amount(u128::MAX));
        assert!(serde_json::from_str::<Amount>("\"-5\"").is_err());
    }

    #[test]
    fn amount_scaling() {
        assert_eq!(Amount::from_units(10, 6), Some(Amount(10_000_000)));
        assert_eq!(Amount::from_units(u128::MAX, 18), None);
        assert_eq!(Amount(10_000_000).percent(50), Amount(5_000_000));
        assert_eq!(Amount(u128::MAX).percent(100), Amount(u128::MAX));
        assert_eq!(Amount(3).percent(50), Amount(1));
    }
}
