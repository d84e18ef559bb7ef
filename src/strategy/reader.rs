//! Typed on-chain reads used by the strategy components

use crate::chain::{methods, ChainClient, ChainValue, ReadCall};
use crate::error::AppResult;
use alloy_primitives::{Address, U256};
use std::collections::BTreeMap;

/// Lending position of the logic contract, all values USD scaled by 1e18
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LendingPosition {
    pub supplied_usd: U256,
    pub borrowed_usd: U256,
    pub borrow_limit_usd: U256,
}

pub async fn lending_position(chain: &dyn ChainClient, logic: Address) -> AppResult<LendingPosition> {
    let value = chain
        .call(&ReadCall::new(logic, methods::GET_LENDING_POSITION, vec![]))
        .await?;
    Ok(LendingPosition {
        supplied_usd: value.uint_at(0)?,
        borrowed_usd: value.uint_at(1)?,
        borrow_limit_usd: value.uint_at(2)?,
    })
}

pub async fn token_balance(chain: &dyn ChainClient, token: Address, owner: Address) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(token, methods::BALANCE_OF, vec![owner.into()]))
        .await?;
    Ok(value.as_uint()?)
}

/// Balances of several tokens for one owner, in one batch
pub async fn token_balances(
    chain: &dyn ChainClient,
    tokens: &[Address],
    owner: Address,
) -> AppResult<BTreeMap<Address, U256>> {
    let calls: Vec<ReadCall> = tokens
        .iter()
        .map(|token| ReadCall::new(*token, methods::BALANCE_OF, vec![owner.into()]))
        .collect();
    let values = chain.batch_call(&calls).await?;

    let mut balances = BTreeMap::new();
    for (token, value) in tokens.iter().zip(values) {
        balances.insert(*token, value.as_uint()?);
    }
    Ok(balances)
}

pub async fn allowance(
    chain: &dyn ChainClient,
    token: Address,
    owner: Address,
    spender: Address,
) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(
            token,
            methods::ALLOWANCE,
            vec![owner.into(), spender.into()],
        ))
        .await?;
    Ok(value.as_uint()?)
}

pub async fn total_supply(chain: &dyn ChainClient, token: Address) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(token, methods::TOTAL_SUPPLY, vec![]))
        .await?;
    Ok(value.as_uint()?)
}

/// USD price of one whole token, scaled by 1e18
pub async fn token_price(chain: &dyn ChainClient, oracle: Address, token: Address) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(oracle, methods::GET_TOKEN_PRICE, vec![token.into()]))
        .await?;
    Ok(value.as_uint()?)
}

/// Prices for several tokens, in one batch
pub async fn token_prices(
    chain: &dyn ChainClient,
    oracle: Address,
    tokens: &[Address],
) -> AppResult<BTreeMap<Address, U256>> {
    let calls: Vec<ReadCall> = tokens
        .iter()
        .map(|token| ReadCall::new(oracle, methods::GET_TOKEN_PRICE, vec![(*token).into()]))
        .collect();
    let values = chain.batch_call(&calls).await?;

    let mut prices = BTreeMap::new();
    for (token, value) in tokens.iter().zip(values) {
        prices.insert(*token, value.as_uint()?);
    }
    Ok(prices)
}

/// Outstanding borrow of `account` in the market `v_token`, in underlying units
pub async fn borrow_balance(chain: &dyn ChainClient, v_token: Address, account: Address) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(
            v_token,
            methods::BORROW_BALANCE_CURRENT,
            vec![account.into()],
        ))
        .await?;
    Ok(value.as_uint()?)
}

/// Pair reserves ordered as (`token_a`, `token_b`)
pub async fn pair_reserves(
    chain: &dyn ChainClient,
    pair: Address,
    token_a: Address,
) -> AppResult<(U256, U256)> {
    let calls = [
        ReadCall::new(pair, methods::GET_RESERVES, vec![]),
        ReadCall::new(pair, methods::TOKEN0, vec![]),
    ];
    let values = chain.batch_call(&calls).await?;
    let (reserves, token0) = match values.as_slice() {
        [reserves, token0] => (reserves, token0.as_address()?),
        _ => {
            return Err(crate::chain::ChainError::Decode(
                "getReserves/token0 batch returned wrong arity".to_string(),
            )
            .into())
        }
    };

    let reserve0 = reserves.uint_at(0)?;
    let reserve1 = reserves.uint_at(1)?;
    if token0 == token_a {
        Ok((reserve0, reserve1))
    } else {
        Ok((reserve1, reserve0))
    }
}

/// LP tokens staked by `owner` in pool `pid`
pub async fn staked_lp(
    chain: &dyn ChainClient,
    master_chef: Address,
    pid: u64,
    owner: Address,
) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(
            master_chef,
            methods::USER_INFO,
            vec![ChainValue::from(pid), owner.into()],
        ))
        .await?;
    Ok(value.uint_at(0)?)
}

/// Total user deposits held by the storage contract, USD scaled by 1e18
pub async fn storage_total_deposit(chain: &dyn ChainClient, storage: Address) -> AppResult<U256> {
    let value = chain
        .call(&ReadCall::new(storage, methods::GET_TOTAL_DEPOSIT, vec![]))
        .await?;
    Ok(value.as_uint()?)
}
