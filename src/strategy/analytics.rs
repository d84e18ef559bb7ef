//! Net result of a strategy in USD

use super::reader;
use crate::chain::ChainClient;
use crate::error::AppResult;
use crate::models::{Farm, Strategy};
use crate::utils::{mul_div, to_signed, wad_mul};
use alloy_primitives::{Address, I256, U256};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Components of the net result, USD scaled by 1e18
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetResultInputs {
    pub supplied_usd: U256,
    pub farms_usd: U256,
    pub idle_usd: U256,
    pub borrowed_usd: U256,
    pub storage_usd: U256,
}

impl NetResultInputs {
    /// supplied + farms + idle - borrowed - storage
    pub fn net_result(&self) -> I256 {
        let assets = self
            .supplied_usd
            .saturating_add(self.farms_usd)
            .saturating_add(self.idle_usd);
        let liabilities = self.borrowed_usd.saturating_add(self.storage_usd);
        to_signed(assets).saturating_sub(to_signed(liabilities))
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub inputs: NetResultInputs,
    pub net_usd: I256,
    /// LP value per farm id
    pub farm_values: Vec<(i64, U256)>,
}

impl AnalyticsReport {
    pub async fn compute(
        chain: &dyn ChainClient,
        strategy: &Strategy,
        farms: &[Farm],
    ) -> AppResult<Self> {
        let contracts = &strategy.contracts;
        let logic = contracts.logic;

        let position = reader::lending_position(chain, logic).await?;
        let storage_usd = reader::storage_total_deposit(chain, contracts.storage).await?;

        let mut tokens: BTreeSet<Address> = farms
            .iter()
            .flat_map(|farm| [farm.token1.token, farm.token2.token])
            .collect();
        tokens.insert(contracts.base_asset.token);
        tokens.insert(contracts.reward_token);
        let tokens: Vec<Address> = tokens.into_iter().collect();

        let prices = reader::token_prices(chain, contracts.oracle, &tokens).await?;
        let balances = reader::token_balances(chain, &tokens, logic).await?;
        let price_of = |token: &Address| prices.get(token).copied().unwrap_or(U256::ZERO);

        let idle_usd = balances.iter().fold(U256::ZERO, |acc, (token, amount)| {
            acc.saturating_add(wad_mul(*amount, price_of(token)))
        });

        let mut farm_values = Vec::with_capacity(farms.len());
        let mut farms_usd = U256::ZERO;
        for farm in farms {
            let staked = reader::staked_lp(chain, farm.master_chef, farm.pid, logic).await?;
            if staked.is_zero() {
                farm_values.push((farm.id, U256::ZERO));
                continue;
            }
            let (reserve1, reserve2) =
                reader::pair_reserves(chain, farm.pair, farm.token1.token).await?;
            let supply = reader::total_supply(chain, farm.pair).await?;
            let pool_usd = wad_mul(reserve1, price_of(&farm.token1.token))
                .saturating_add(wad_mul(reserve2, price_of(&farm.token2.token)));
            let value = mul_div(staked, pool_usd, supply);
            farms_usd = farms_usd.saturating_add(value);
            farm_values.push((farm.id, value));
        }

        let inputs = NetResultInputs {
            supplied_usd: position.supplied_usd,
            farms_usd,
            idle_usd,
            borrowed_usd: position.borrowed_usd,
            storage_usd,
        };

        Ok(Self {
            net_usd: inputs.net_result(),
            inputs,
            farm_values,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "netUsd": self.net_usd.to_string(),
            "suppliedUsd": self.inputs.supplied_usd.to_string(),
            "farmsUsd": self.inputs.farms_usd.to_string(),
            "idleUsd": self.inputs.idle_usd.to_string(),
            "borrowedUsd": self.inputs.borrowed_usd.to_string(),
            "storageUsd": self.inputs.storage_usd.to_string(),
            "farms": self
                .farm_values
                .iter()
                .map(|(id, value)| json!({ "farmId": id, "valueUsd": value.to_string() }))
                .collect::<Vec<_>>(),
        })
    }
}
