//! Typed ABI argument values.
//!
//! Constructor structs and contract calls are lowered into `AbiValue`s before
//! they cross the chain boundary. Descriptors author free-form arguments
//! (`extraArgs`, fee params, oracle args, post-upgrade call args) in the
//! tagged form `{"type": "uint", "value": "1000"}`.

use serde::{Deserialize, Serialize};

use crate::primitives::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AbiValue {
    Address(Address),
    Uint(Amount),
    Int(i128),
    Bool(bool),
    String(String),
    /// Hex-encoded bytes, `0x`-prefixed.
    Bytes(String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: u128) -> Self {
        AbiValue::Uint(Amount(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        AbiValue::String(value.into())
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<Amount> {
        match self {
            AbiValue::Uint(amount) => Some(*amount),
            _ => None,
        }
    }

    /// Short type signature used in logs and call-data encoding.
    pub fn type_name(&self) -> String {
        match self {
            AbiValue::Address(_) => "address".to_string(),
            AbiValue::Uint(_) => "uint256".to_string(),
            AbiValue::Int(_) => "int256".to_string(),
            AbiValue::Bool(_) => "bool".to_string(),
            AbiValue::String(_) => "string".to_string(),
            AbiValue::Bytes(_) => "bytes".to_string(),
            AbiValue::Array(items) => match items.first() {
                Some(first) => format!("{}[]", first.type_name()),
                None => "uint256[]".to_string(),
            },
            AbiValue::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(AbiValue::type_name).collect();
                format!("({})", inner.join(","))
            }
        }
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        AbiValue::Address(value)
    }
}

impl From<Amount> for AbiValue {
    fn from(value: Amount) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

impl From<u32> for AbiValue {
    fn from(value: u32) -> Self {
        AbiValue::Uint(Amount(u128::from(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_descriptor_form() {
        let json = r#"[
            {"type": "uint", "value": "1000"},
            {"type": "address", "value": "0x00000000000000000000000000000000000000aa"},
            {"type": "array", "value": [{"type": "bool", "value": true}]}
        ]"#;
        let values: Vec<AbiValue> = serde_json::from_str(json).unwrap();
        assert_eq!(values[0], AbiValue::uint(1000));
        assert!(values[1].as_address().is_some());
        assert_eq!(values[2], AbiValue::Array(vec![AbiValue::Bool(true)]));
    }

    #[test]
    fn tuple_signature() {
        let value = AbiValue::Tuple(vec![
            AbiValue::Address(Address::ZERO),
            AbiValue::Array(vec![AbiValue::uint(1)]),
            AbiValue::string("x"),
        ]);
        assert_eq!(value.type_name(), "(address,uint256[],string)");
    }
}
