//! Constructor structs for the three investable archetypes.
//!
//! Each struct is passed to the investable's initializer as a single tuple.
//! Field order is positional on-chain, so the declaration order below is the
//! ABI order and must not change.

use vault_core::{AbiValue, Address, FeeArgs, InvestmentLimit, RoleAssignment, SwapService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyInit {
    pub investment_token: Address,
    pub deposit_token: Address,
    pub price_oracle: Address,
    pub swap_service: SwapService,
    pub fees: FeeArgs,
    pub investment_limit: InvestmentLimit,
    pub role_to_users: Vec<RoleAssignment>,
    pub extra_args: Vec<AbiValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioInit {
    pub investment_token: Address,
    pub deposit_token: Address,
    pub fees: FeeArgs,
    pub investment_limit: InvestmentLimit,
    pub extra_args: Vec<AbiValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInit {
    pub investment_token: Address,
    pub deposit_token: Address,
    pub swap_service: SwapService,
    pub fees: FeeArgs,
    pub investment_limit: InvestmentLimit,
    pub extra_args: Vec<AbiValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitArgs {
    Strategy(StrategyInit),
    Portfolio(PortfolioInit),
    Index(IndexInit),
}

impl InitArgs {
    /// Lower to the initializer's single tuple argument.
    pub fn into_abi(self) -> AbiValue {
        let fields = match self {
            InitArgs::Strategy(s) => vec![
                s.investment_token.into(),
                s.deposit_token.into(),
                s.price_oracle.into(),
                swap_abi(&s.swap_service),
                fees_abi(s.fees),
                limit_abi(&s.investment_limit),
                roles_abi(s.role_to_users),
                AbiValue::Tuple(s.extra_args),
            ],
            InitArgs::Portfolio(p) => vec![
                p.investment_token.into(),
                p.deposit_token.into(),
                fees_abi(p.fees),
                limit_abi(&p.investment_limit),
                AbiValue::Tuple(p.extra_args),
            ],
            InitArgs::Index(i) => vec![
                i.investment_token.into(),
                i.deposit_token.into(),
                swap_abi(&i.swap_service),
                fees_abi(i.fees),
                limit_abi(&i.investment_limit),
                AbiValue::Tuple(i.extra_args),
            ],
        };
        AbiValue::Tuple(fields)
    }
}

fn swap_abi(swap: &SwapService) -> AbiValue {
    AbiValue::Tuple(vec![
        AbiValue::from(u32::from(swap.provider_type)),
        swap.router.into(),
    ])
}

fn fees_abi(fees: FeeArgs) -> AbiValue {
    AbiValue::Tuple(vec![
        fees.deposit_fee.into(),
        AbiValue::Array(fees.deposit_fee_params),
        fees.withdrawal_fee.into(),
        AbiValue::Array(fees.withdrawal_fee_params),
        fees.performance_fee.into(),
        AbiValue::Array(fees.performance_fee_params),
        fees.management_fee.into(),
        AbiValue::Array(fees.management_fee_params),
        fees.fee_receiver.unwrap_or(Address::ZERO).into(),
    ])
}

fn limit_abi(limit: &InvestmentLimit) -> AbiValue {
    AbiValue::Tuple(vec![limit.total.into(), limit.per_address.into()])
}

fn roles_abi(roles: Vec<RoleAssignment>) -> AbiValue {
    AbiValue::Array(
        roles
            .into_iter()
            .map(|r| {
                AbiValue::Tuple(vec![
                    AbiValue::String(r.role),
                    AbiValue::Array(r.users.into_iter().map(AbiValue::Address).collect()),
                ])
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::Amount;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    #[test]
    fn strategy_fields_are_positional() {
        let init = InitArgs::Strategy(StrategyInit {
            investment_token: addr(1),
            deposit_token: addr(2),
            price_oracle: addr(3),
            swap_service: SwapService {
                provider_type: 2,
                router: addr(4),
            },
            fees: FeeArgs {
                deposit_fee: 25,
                ..Default::default()
            },
            investment_limit: InvestmentLimit {
                total: Amount(1_000),
                per_address: Amount(10),
            },
            role_to_users: vec![RoleAssignment {
                role: "KEEPER".to_string(),
                users: vec![addr(5)],
            }],
            extra_args: vec![AbiValue::Bool(true)],
        });

        let AbiValue::Tuple(fields) = init.into_abi() else {
            panic!("expected a tuple");
        };
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[0], AbiValue::Address(addr(1)));
        assert_eq!(fields[1], AbiValue::Address(addr(2)));
        assert_eq!(fields[2], AbiValue::Address(addr(3)));
        assert_eq!(fields[3], AbiValue::Tuple(vec![AbiValue::uint(2), AbiValue::Address(addr(4))]));
        let AbiValue::Tuple(fees) = &fields[4] else {
            panic!("fees should be a tuple");
        };
        assert_eq!(fees[0], AbiValue::uint(25));
        assert_eq!(fees[8], AbiValue::Address(Address::ZERO));
        assert_eq!(fields[5], AbiValue::Tuple(vec![AbiValue::uint(1_000), AbiValue::uint(10)]));
        assert_eq!(fields[7], AbiValue::Tuple(vec![AbiValue::Bool(true)]));
    }

    #[test]
    fn portfolio_and_index_shapes() {
        let portfolio = InitArgs::Portfolio(PortfolioInit {
            investment_token: addr(1),
            deposit_token: addr(2),
            fees: FeeArgs::default(),
            investment_limit: InvestmentLimit::default(),
            extra_args: Vec::new(),
        })
        .into_abi();
        assert_eq!(
            portfolio.type_name(),
            "(address,address,(uint256,uint256[],uint256,uint256[],uint256,uint256[],uint256,uint256[],address),(uint256,uint256),())"
        );

        let index = InitArgs::Index(IndexInit {
            investment_token: addr(1),
            deposit_token: addr(2),
            swap_service: SwapService::default(),
            fees: FeeArgs::default(),
            investment_limit: InvestmentLimit::default(),
            extra_args: Vec::new(),
        })
        .into_abi();
        let AbiValue::Tuple(fields) = index else {
            panic!("expected a tuple");
        };
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[2].type_name(), "(uint256,address)");
    }
}
