//! Typed deploy and upgrade units.
//!
//! These are the validated, fully dereferenced outputs of the descriptor
//! resolver. Nothing downstream ever sees raw descriptor JSON.

use serde::{Deserialize, Serialize};

use crate::abi::AbiValue;
use crate::primitives::{Address, Amount};
use crate::reference::ContractRef;
use crate::types::Kind;

/// A shared library and the libraries it links against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRef {
    pub name: String,
    pub dependencies: Vec<String>,
}

// ── Deploy units ────────────────────────────────────────────────────

/// One element of a deploy descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployUnit {
    pub name: String,
    pub contract_name: String,
    pub kind: Kind,
    pub subtype: Option<String>,
    /// Libraries to deploy (or reuse) and link, in dependency order.
    pub libraries: Vec<LibraryRef>,
    pub body: UnitBody,
}

/// Kind-specific payload of a deploy unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitBody {
    /// Library-only unit: nothing is deployed beyond `libraries`.
    Library,
    Investable(Box<InvestableSpec>),
}

impl DeployUnit {
    pub fn investable(&self) -> Option<&InvestableSpec> {
        match &self.body {
            UnitBody::Investable(spec) => Some(spec),
            UnitBody::Library => None,
        }
    }
}

/// Everything needed to build one strategy, portfolio, or index.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestableSpec {
    /// Ownership target. `None` leaves the deployer as de facto admin
    /// (role-based strategies).
    pub owner: Option<Address>,
    /// Custody address recorded for later upgrade proposals.
    pub multisig: Option<Address>,
    pub deposit_token: Address,
    pub token_args: TokenArgs,
    pub fee_args: FeeArgs,
    pub investment_limit: InvestmentLimit,
    pub oracle: Option<OracleArgs>,
    pub swap_service: SwapService,
    pub role_to_users: Vec<RoleAssignment>,
    /// Portfolio members, registered in this order.
    pub investables: Vec<ContractRef>,
    /// One allocation vector per entry of `investables`.
    pub allocations: Vec<Vec<u32>>,
    pub extra_args: Vec<AbiValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenArgs {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct FeeArgs {
    pub deposit_fee: u32,
    pub deposit_fee_params: Vec<AbiValue>,
    pub withdrawal_fee: u32,
    pub withdrawal_fee_params: Vec<AbiValue>,
    pub performance_fee: u32,
    pub performance_fee_params: Vec<AbiValue>,
    pub management_fee: u32,
    pub management_fee_params: Vec<AbiValue>,
    pub fee_receiver: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvestmentLimit {
    pub total: Amount,
    pub per_address: Amount,
}

/// Auxiliary price oracle deployed ahead of a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OracleArgs {
    pub contract_name: String,
    #[serde(default)]
    pub args: Vec<AbiValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SwapService {
    pub provider_type: u8,
    pub router: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: String,
    pub users: Vec<Address>,
}

// ── Upgrade units ───────────────────────────────────────────────────

/// One element of an upgrade descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeUnit {
    pub proxy: ContractRef,
    /// Contract name of the new implementation artifact.
    pub new_implementation: String,
    /// Post-upgrade initialisation call; present only when both the function
    /// name and its arguments were given.
    pub post_upgrade_call: Option<PostUpgradeCall>,
    pub libraries: Vec<LibraryRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUpgradeCall {
    pub function_name: String,
    pub args: Vec<AbiValue>,
}
