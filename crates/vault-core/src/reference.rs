//! Contract references: symbolic `<kind>/<name>` or literal addresses.
//!
//! Descriptors refer to other deployments by name so addresses are resolved
//! from the live state store at deploy time instead of being hand-authored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::primitives::Address;
use crate::types::{InvestableKey, Kind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContractRef {
    /// `strategy/Alpha`: resolved through the live state store.
    Symbolic { kind: Kind, name: String },
    /// `0x…`: used as-is.
    Literal(Address),
}

impl ContractRef {
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let raw = raw.trim();
        if Address::looks_like_address(raw) {
            return Ok(ContractRef::Literal(raw.parse()?));
        }
        let (kind, name) = raw.split_once('/').ok_or_else(|| {
            ConfigError::malformed(format!(
                "reference `{raw}` is neither an address nor `<kind>/<name>`"
            ))
        })?;
        let kind: Kind = kind.parse()?;
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::malformed(format!("reference `{raw}` has an invalid name")));
        }
        Ok(ContractRef::Symbolic {
            kind,
            name: name.to_string(),
        })
    }

    /// The live-state key this reference points at, if symbolic.
    pub fn key(&self, network: &str) -> ConfigResult<Option<InvestableKey>> {
        match self {
            ContractRef::Symbolic { kind, name } => InvestableKey::new(network, *kind, name).map(Some),
            ContractRef::Literal(_) => Ok(None),
        }
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractRef::Symbolic { kind, name } => write!(f, "{kind}/{name}"),
            ContractRef::Literal(addr) => write!(f, "{addr}"),
        }
    }
}

impl TryFrom<String> for ContractRef {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContractRef::parse(&value)
    }
}

impl From<ContractRef> for String {
    fn from(value: ContractRef) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbolic() {
        let r = ContractRef::parse("strategy/Alpha").unwrap();
        assert_eq!(
            r,
            ContractRef::Symbolic {
                kind: Kind::Strategy,
                name: "Alpha".to_string()
            }
        );
        let key = r.key("base").unwrap().unwrap();
        assert_eq!(key.to_string(), "base/strategy/Alpha");
    }

    #[test]
    fn parse_literal() {
        let r = ContractRef::parse("0x00000000000000000000000000000000000000aa").unwrap();
        assert!(matches!(r, ContractRef::Literal(_)));
        assert!(r.key("base").unwrap().is_none());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ContractRef::parse("Alpha").is_err());
        assert!(ContractRef::parse("vault/Alpha").is_err());
        assert!(ContractRef::parse("strategy/").is_err());
        assert!(ContractRef::parse("0xnothex").is_err());
    }
}
