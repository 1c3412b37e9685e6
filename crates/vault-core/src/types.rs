//! Shared identifiers used across vaultgrid crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::primitives::Address;

/// Library name → deployed address, supplied as link data when building a
/// contract factory.
pub type LinkTable = BTreeMap<String, Address>;

/// Component kind. Doubles as the middle segment of every live-state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Portfolio,
    Strategy,
    Index,
    Library,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Portfolio, Kind::Strategy, Kind::Index, Kind::Library];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Portfolio => "portfolio",
            Kind::Strategy => "strategy",
            Kind::Index => "index",
            Kind::Library => "library",
        }
    }

    /// Investable kinds are the ones that accept deposits.
    pub fn is_investable(&self) -> bool {
        !matches!(self, Kind::Library)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portfolio" => Ok(Kind::Portfolio),
            "strategy" => Ok(Kind::Strategy),
            "index" => Ok(Kind::Index),
            "library" => Ok(Kind::Library),
            other => Err(ConfigError::malformed(format!("unknown component kind `{other}`"))),
        }
    }
}

/// `(network, kind, name)`: the sole lookup key into the live state store.
///
/// Segments end up as path components on disk, so construction rejects
/// anything that could escape the live root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvestableKey {
    network: String,
    kind: Kind,
    name: String,
}

impl InvestableKey {
    pub fn new(network: &str, kind: Kind, name: &str) -> ConfigResult<Self> {
        validate_segment("network", network)?;
        validate_segment("name", name)?;
        Ok(Self {
            network: network.to_string(),
            kind,
            name: name.to_string(),
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for InvestableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.network, self.kind, self.name)
    }
}

fn validate_segment(field: &str, value: &str) -> ConfigResult<()> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_control)
    {
        return Err(ConfigError::malformed(format!(
            "invalid {field} `{value}` in live-state key"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        let key = InvestableKey::new("arbitrum", Kind::Strategy, "Alpha").unwrap();
        assert_eq!(key.to_string(), "arbitrum/strategy/Alpha");
        assert_eq!(key.kind(), Kind::Strategy);
    }

    #[test]
    fn key_rejects_path_escapes() {
        assert!(InvestableKey::new("", Kind::Index, "a").is_err());
        assert!(InvestableKey::new("net", Kind::Index, "..").is_err());
        assert!(InvestableKey::new("net", Kind::Index, "a/b").is_err());
        assert!(InvestableKey::new("net\\x", Kind::Index, "a").is_err());
    }

    #[test]
    fn kind_roundtrip_text() {
        for kind in Kind::ALL {
            assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
        }
        assert!("vault".parse::<Kind>().is_err());
        assert!(!Kind::Library.is_investable());
    }
}
