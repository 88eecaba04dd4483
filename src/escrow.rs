//! Escrow accounting and the ledgers backing it.
//!
//! User inputs sit in the contract's bank balance between delegation and
//! acknowledgement; the per-channel ledger records which channel's escrow
//! they belong to. LP tokens and pre-placed remote-deposit funds are
//! contract-internal ledgers with the same transfer discipline.

use cosmwasm_std::{BankMsg, Coin, StdResult, Storage, Uint128};
use sha2::{Digest, Sha256};

use crate::state::{ESCROW, LP_BALANCES, REMOTE_FUNDS};
use crate::ContractError;

/// Deterministic escrow account label for a `(port, channel)` pair. Both
/// replicas derive the same label for the same channel end.
pub fn escrow_address(port_id: &str, channel_id: &str) -> String {
    let digest = Sha256::digest(format!("{port_id}/{channel_id}/escrow").as_bytes());
    format!("interchainswap{}", hex::encode(&digest[..20]))
}

/// Records `token` as held in the channel's escrow.
pub fn lock(
    storage: &mut dyn Storage,
    channel_id: &str,
    token: &Coin,
) -> Result<(), ContractError> {
    ESCROW.update(
        storage,
        (channel_id, &token.denom),
        |held| -> Result<_, ContractError> {
            Ok(held.unwrap_or_default().checked_add(token.amount)?)
        },
    )?;
    Ok(())
}

/// Removes `token` from the channel's escrow ledger.
pub fn release(
    storage: &mut dyn Storage,
    channel_id: &str,
    token: &Coin,
) -> Result<(), ContractError> {
    let key = (channel_id, token.denom.as_str());
    let held = ESCROW.may_load(storage, key)?.unwrap_or_default();
    if held < token.amount {
        return Err(ContractError::InsufficientBalance {
            denom: token.denom.clone(),
            required: token.amount,
            available: held,
        });
    }
    let rest = held - token.amount;
    if rest.is_zero() {
        ESCROW.remove(storage, key);
    } else {
        ESCROW.save(storage, key, &rest)?;
    }
    Ok(())
}

/// Releases `token` from escrow and builds the bank transfer delivering it
/// to `recipient`. The transfer commits atomically with the caller's
/// handler.
pub fn pay_out(
    storage: &mut dyn Storage,
    channel_id: &str,
    recipient: &str,
    token: &Coin,
) -> Result<BankMsg, ContractError> {
    release(storage, channel_id, token)?;
    Ok(BankMsg::Send {
        to_address: recipient.to_string(),
        amount: vec![token.clone()],
    })
}

pub fn escrowed(storage: &dyn Storage, channel_id: &str, denom: &str) -> StdResult<Uint128> {
    Ok(ESCROW
        .may_load(storage, (channel_id, denom))?
        .unwrap_or_default())
}

pub fn lp_balance(storage: &dyn Storage, pool_id: &str, owner: &str) -> StdResult<Uint128> {
    Ok(LP_BALANCES
        .may_load(storage, (pool_id, owner))?
        .unwrap_or_default())
}

pub fn mint_lp(
    storage: &mut dyn Storage,
    pool_id: &str,
    owner: &str,
    amount: Uint128,
) -> Result<(), ContractError> {
    LP_BALANCES.update(
        storage,
        (pool_id, owner),
        |held| -> Result<_, ContractError> { Ok(held.unwrap_or_default().checked_add(amount)?) },
    )?;
    Ok(())
}

pub fn burn_lp(
    storage: &mut dyn Storage,
    pool_id: &str,
    owner: &str,
    amount: Uint128,
) -> Result<(), ContractError> {
    let key = (pool_id, owner);
    let held = LP_BALANCES.may_load(storage, key)?.unwrap_or_default();
    if held < amount {
        return Err(ContractError::InsufficientBalance {
            denom: pool_id.to_string(),
            required: amount,
            available: held,
        });
    }
    let rest = held - amount;
    if rest.is_zero() {
        LP_BALANCES.remove(storage, key);
    } else {
        LP_BALANCES.save(storage, key, &rest)?;
    }
    Ok(())
}

pub fn transfer_lp(
    storage: &mut dyn Storage,
    pool_id: &str,
    from: &str,
    to: &str,
    amount: Uint128,
) -> Result<(), ContractError> {
    burn_lp(storage, pool_id, from, amount)?;
    mint_lp(storage, pool_id, to, amount)
}

pub fn remote_funds(storage: &dyn Storage, sender: &str, denom: &str) -> StdResult<Uint128> {
    Ok(REMOTE_FUNDS
        .may_load(storage, (sender, denom))?
        .unwrap_or_default())
}

/// Credits funds a depositor pre-placed for counterparty-initiated double
/// deposits.
pub fn add_remote_funds(
    storage: &mut dyn Storage,
    sender: &str,
    token: &Coin,
) -> Result<(), ContractError> {
    REMOTE_FUNDS.update(
        storage,
        (sender, &token.denom),
        |held| -> Result<_, ContractError> {
            Ok(held.unwrap_or_default().checked_add(token.amount)?)
        },
    )?;
    Ok(())
}

/// Consumes pre-placed funds, failing if the sender never placed enough.
pub fn take_remote_funds(
    storage: &mut dyn Storage,
    sender: &str,
    token: &Coin,
) -> Result<(), ContractError> {
    let key = (sender, token.denom.as_str());
    let held = REMOTE_FUNDS.may_load(storage, key)?.unwrap_or_default();
    if held < token.amount {
        return Err(ContractError::InsufficientBalance {
            denom: token.denom.clone(),
            required: token.amount,
            available: held,
        });
    }
    let rest = held - token.amount;
    if rest.is_zero() {
        REMOTE_FUNDS.remove(storage, key);
    } else {
        REMOTE_FUNDS.save(storage, key, &rest)?;
    }
    Ok(())
}
