//! Execute/query entry points: pre-flight validation, escrow and packet
//! emission on the initiating chain. Pools themselves only change in the
//! IBC handlers (`crate::ibc`), once the counterparty has spoken.

#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_binary, BankMsg, Binary, Coin, Deps, DepsMut, Env, IbcMsg, IbcTimeout, MessageInfo, Order,
    Response, StdError, StdResult, Storage, Uint128,
};
use cw2::set_contract_version;
use cw_storage_plus::Bound;
use cw_utils::{must_pay, nonpayable, one_coin};

use crate::amm::{InterchainMarketMaker, FEE_BASIS};
use crate::escrow;
use crate::msg::{
    ExecuteMsg, InstantiateMsg, InterchainSwapPacket, MsgCreatePool, MsgDoubleDeposit,
    MsgSingleDeposit, MsgSwap, MsgWithdraw, QueryMsg, SwapMessageType,
};
use crate::state::{
    generate_pool_id, Config, Pool, PoolSide, CHANNELS, CHANNEL_BY_COUNTERPARTY, CONFIG, POOLS,
};
use crate::ContractError;

const CONTRACT_NAME: &str = "crates.io:interchain-swap";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_POOLS_LIMIT: u32 = 10;
const MAX_POOLS_LIMIT: u32 = 30;

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    validate_fee_rate(msg.fee_rate)?;
    validate_packet_lifetime(msg.packet_lifetime)?;
    let config = Config {
        admin: info.sender.clone(),
        fee_rate: msg.fee_rate,
        packet_lifetime: msg.packet_lifetime,
    };
    CONFIG.save(deps.storage, &config)?;
    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("admin", info.sender))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::CreatePool(msg) => delegate_create_pool(deps, env, info, msg),
        ExecuteMsg::SingleDeposit(msg) => delegate_single_deposit(deps, env, info, msg),
        ExecuteMsg::DoubleDeposit(msg) => delegate_double_deposit(deps, env, info, msg),
        ExecuteMsg::Withdraw(msg) => delegate_withdraw(deps, env, info, msg),
        ExecuteMsg::LeftSwap(msg) => delegate_swap(deps, env, info, SwapMessageType::LeftSwap, msg),
        ExecuteMsg::RightSwap(msg) => {
            delegate_swap(deps, env, info, SwapMessageType::RightSwap, msg)
        }
        ExecuteMsg::FundRemoteDeposit {} => fund_remote_deposit(deps, info),
        ExecuteMsg::ReclaimRemoteFunds { denom, amount } => {
            reclaim_remote_funds(deps, info, denom, amount)
        }
        ExecuteMsg::UpdateConfig {
            fee_rate,
            packet_lifetime,
            admin,
        } => update_config(deps, info, fee_rate, packet_lifetime, admin),
    }
}

fn validate_fee_rate(fee_rate: u64) -> Result<(), ContractError> {
    if fee_rate >= FEE_BASIS {
        return Err(ContractError::InvalidRequest {
            reason: format!("fee rate {fee_rate} must be below {FEE_BASIS} basis points"),
        });
    }
    Ok(())
}

fn validate_packet_lifetime(packet_lifetime: u64) -> Result<(), ContractError> {
    if packet_lifetime == 0 {
        return Err(ContractError::InvalidRequest {
            reason: "packet lifetime must be positive".to_string(),
        });
    }
    Ok(())
}

/// Wire messages name their sender; it must be the account signing the
/// transaction.
fn ensure_sender(claimed: &str, info: &MessageInfo) -> Result<(), ContractError> {
    if claimed != info.sender.as_str() {
        return Err(ContractError::Unauthorized {});
    }
    Ok(())
}

/// Attached funds must cover the escrowed amount exactly; anything else
/// would strand coins in the contract.
fn ensure_paid(info: &MessageInfo, denom: &str, amount: Uint128) -> Result<(), ContractError> {
    let paid = must_pay(info, denom)?;
    if paid != amount {
        return Err(ContractError::InvalidRequest {
            reason: format!("attached {paid}{denom}, the operation escrows {amount}{denom}"),
        });
    }
    Ok(())
}

/// The local channel whose counterparty end the pool is bound to.
fn local_channel_for(storage: &dyn Storage, pool: &Pool) -> Result<String, ContractError> {
    CHANNEL_BY_COUNTERPARTY
        .may_load(
            storage,
            (&pool.counterparty_port, &pool.counterparty_channel),
        )?
        .ok_or_else(|| ContractError::UnknownChannel {
            channel_id: pool.counterparty_channel.clone(),
        })
}

fn emit_packet(
    storage: &dyn Storage,
    env: &Env,
    channel_id: String,
    data: Binary,
) -> Result<IbcMsg, ContractError> {
    let config = CONFIG.load(storage)?;
    Ok(IbcMsg::SendPacket {
        channel_id,
        data,
        timeout: IbcTimeout::with_timestamp(env.block.time.plus_seconds(config.packet_lifetime)),
    })
}

fn delegate_create_pool(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: MsgCreatePool,
) -> Result<Response, ContractError> {
    msg.validate()?;
    ensure_sender(&msg.sender, &info)?;
    nonpayable(&info)?;
    let channel = CHANNELS
        .may_load(deps.storage, &msg.source_channel)?
        .ok_or_else(|| ContractError::UnknownChannel {
            channel_id: msg.source_channel.clone(),
        })?;
    if msg.source_port != channel.port_id {
        return Err(ContractError::InvalidRequest {
            reason: format!("port {} does not host channel {}", msg.source_port, channel.channel_id),
        });
    }
    let pool_id = generate_pool_id(&msg.denoms);
    if POOLS.has(deps.storage, &pool_id) {
        return Err(ContractError::PoolAlreadyExists { pool_id });
    }
    let data = InterchainSwapPacket::encode(SwapMessageType::CreatePool, &msg)?;
    let packet = emit_packet(deps.storage, &env, msg.source_channel.clone(), data)?;
    Ok(Response::new()
        .add_message(packet)
        .add_attribute("method", "delegate_create_pool")
        .add_attribute("pool_id", pool_id))
}

fn delegate_single_deposit(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: MsgSingleDeposit,
) -> Result<Response, ContractError> {
    let token = msg.validate()?.clone();
    ensure_sender(&msg.sender, &info)?;
    let pool = POOLS
        .may_load(deps.storage, &msg.pool_id)?
        .ok_or_else(|| ContractError::PoolNotFound {
            pool_id: msg.pool_id.clone(),
        })?;
    let asset = pool.find_asset(&token.denom)?;
    if asset.side != PoolSide::Native {
        return Err(ContractError::InvalidRequest {
            reason: "single deposits must supply this chain's native denom".to_string(),
        });
    }
    if pool.supply.amount.is_zero() {
        // An empty pool has no price for a one-sided deposit; liquidity is
        // seeded by the first double deposit.
        return Err(ContractError::EmptyPool {
            denom: token.denom.clone(),
        });
    }
    ensure_paid(&info, &token.denom, token.amount)?;
    let channel_id = local_channel_for(deps.storage, &pool)?;
    escrow::lock(deps.storage, &channel_id, &token)?;
    let data = InterchainSwapPacket::encode(SwapMessageType::SingleDeposit, &msg)?;
    let packet = emit_packet(deps.storage, &env, channel_id, data)?;
    Ok(Response::new()
        .add_message(packet)
        .add_attribute("method", "delegate_single_deposit")
        .add_attribute("pool_id", msg.pool_id))
}

fn delegate_double_deposit(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: MsgDoubleDeposit,
) -> Result<Response, ContractError> {
    msg.validate()?;
    ensure_sender(&msg.local_deposit.sender, &info)?;
    let pool = POOLS
        .may_load(deps.storage, &msg.pool_id)?
        .ok_or_else(|| ContractError::PoolNotFound {
            pool_id: msg.pool_id.clone(),
        })?;
    let local_asset = pool.find_asset(&msg.local_deposit.token.denom)?;
    let remote_asset = pool.find_asset(&msg.remote_deposit.token.denom)?;
    if local_asset.side != PoolSide::Native || remote_asset.side != PoolSide::Remote {
        return Err(ContractError::InvalidRequest {
            reason: "local leg must be native, remote leg must be the counterparty denom"
                .to_string(),
        });
    }
    ensure_paid(
        &info,
        &msg.local_deposit.token.denom,
        msg.local_deposit.token.amount,
    )?;
    let channel_id = local_channel_for(deps.storage, &pool)?;
    escrow::lock(deps.storage, &channel_id, &msg.local_deposit.token)?;
    let data = InterchainSwapPacket::encode(SwapMessageType::DoubleDeposit, &msg)?;
    let packet = emit_packet(deps.storage, &env, channel_id, data)?;
    Ok(Response::new()
        .add_message(packet)
        .add_attribute("method", "delegate_double_deposit")
        .add_attribute("pool_id", msg.pool_id))
}

fn delegate_withdraw(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: MsgWithdraw,
) -> Result<Response, ContractError> {
    msg.validate()?;
    ensure_sender(&msg.sender, &info)?;
    nonpayable(&info)?;
    let pool = POOLS
        .may_load(deps.storage, &msg.pool_coin.denom)?
        .ok_or_else(|| ContractError::PoolNotFound {
            pool_id: msg.pool_coin.denom.clone(),
        })?;
    if !pool.is_ready() {
        return Err(ContractError::PoolNotReady {
            pool_id: pool.id.clone(),
        });
    }
    if msg.pool_coin.amount > pool.supply.amount {
        return Err(ContractError::InsufficientBalance {
            denom: pool.id.clone(),
            required: msg.pool_coin.amount,
            available: pool.supply.amount,
        });
    }
    let out_asset = pool.find_asset(&msg.denom_out)?;
    if out_asset.side != PoolSide::Native {
        return Err(ContractError::InvalidRequest {
            reason: "withdrawals pay out this chain's native denom".to_string(),
        });
    }
    let channel_id = local_channel_for(deps.storage, &pool)?;
    let channel = CHANNELS.load(deps.storage, &channel_id)?;
    // LP moves into the channel escrow until the counterparty acknowledges.
    escrow::transfer_lp(
        deps.storage,
        &pool.id,
        msg.sender.as_str(),
        &channel.escrow_address,
        msg.pool_coin.amount,
    )?;
    let data = InterchainSwapPacket::encode(SwapMessageType::Withdraw, &msg)?;
    let packet = emit_packet(deps.storage, &env, channel_id, data)?;
    Ok(Response::new()
        .add_message(packet)
        .add_attribute("method", "delegate_withdraw")
        .add_attribute("pool_id", pool.id))
}

fn delegate_swap(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg_type: SwapMessageType,
    msg: MsgSwap,
) -> Result<Response, ContractError> {
    msg.validate()?;
    ensure_sender(&msg.sender, &info)?;
    let pool_id = generate_pool_id(&[msg.token_in.denom.clone(), msg.token_out.denom.clone()]);
    let pool = POOLS
        .may_load(deps.storage, &pool_id)?
        .ok_or_else(|| ContractError::PoolNotFound {
            pool_id: pool_id.clone(),
        })?;
    if !pool.is_ready() {
        return Err(ContractError::PoolNotReady { pool_id });
    }
    let in_asset = pool.find_asset(&msg.token_in.denom)?;
    let out_asset = pool.find_asset(&msg.token_out.denom)?;
    if in_asset.side != PoolSide::Native || out_asset.side != PoolSide::Remote {
        return Err(ContractError::InvalidRequest {
            reason: "swaps sell this chain's native denom for the counterparty denom".to_string(),
        });
    }
    // A left swap escrows the exact input; a right swap escrows the quoted
    // cost plus the slippage allowance, refunding the unused part on ack.
    let escrowed = match msg_type {
        SwapMessageType::RightSwap => msg.right_swap_cap()?,
        _ => msg.token_in.amount,
    };
    ensure_paid(&info, &msg.token_in.denom, escrowed)?;
    let channel_id = local_channel_for(deps.storage, &pool)?;
    escrow::lock(
        deps.storage,
        &channel_id,
        &Coin {
            denom: msg.token_in.denom.clone(),
            amount: escrowed,
        },
    )?;
    let method = match msg_type {
        SwapMessageType::LeftSwap => "delegate_left_swap",
        _ => "delegate_right_swap",
    };
    let data = InterchainSwapPacket::encode(msg_type, &msg)?;
    let packet = emit_packet(deps.storage, &env, channel_id, data)?;
    Ok(Response::new()
        .add_message(packet)
        .add_attribute("method", method)
        .add_attribute("pool_id", pool_id))
}

fn fund_remote_deposit(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let token = one_coin(&info)?;
    escrow::add_remote_funds(deps.storage, info.sender.as_str(), &token)?;
    Ok(Response::new()
        .add_attribute("method", "fund_remote_deposit")
        .add_attribute("denom", token.denom)
        .add_attribute("amount", token.amount))
}

fn reclaim_remote_funds(
    deps: DepsMut,
    info: MessageInfo,
    denom: String,
    amount: Uint128,
) -> Result<Response, ContractError> {
    nonpayable(&info)?;
    let token = Coin {
        denom: denom.clone(),
        amount,
    };
    escrow::take_remote_funds(deps.storage, info.sender.as_str(), &token)?;
    let refund = BankMsg::Send {
        to_address: info.sender.to_string(),
        amount: vec![token],
    };
    Ok(Response::new()
        .add_message(refund)
        .add_attribute("method", "reclaim_remote_funds")
        .add_attribute("denom", denom)
        .add_attribute("amount", amount))
}

fn update_config(
    deps: DepsMut,
    info: MessageInfo,
    fee_rate: Option<u64>,
    packet_lifetime: Option<u64>,
    admin: Option<String>,
) -> Result<Response, ContractError> {
    nonpayable(&info)?;
    let mut config = CONFIG.load(deps.storage)?;
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized {});
    }
    if let Some(fee_rate) = fee_rate {
        validate_fee_rate(fee_rate)?;
        config.fee_rate = fee_rate;
    }
    if let Some(packet_lifetime) = packet_lifetime {
        validate_packet_lifetime(packet_lifetime)?;
        config.packet_lifetime = packet_lifetime;
    }
    if let Some(admin) = admin {
        config.admin = deps.api.addr_validate(&admin)?;
    }
    CONFIG.save(deps.storage, &config)?;
    Ok(Response::new().add_attribute("method", "update_config"))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => to_binary(&CONFIG.load(deps.storage)?),
        QueryMsg::Pool { pool_id } => to_binary(&POOLS.load(deps.storage, &pool_id)?),
        QueryMsg::Pools { start_after, limit } => to_binary(&query_pools(deps, start_after, limit)?),
        QueryMsg::PoolId { denom_a, denom_b } => to_binary(&generate_pool_id(&[denom_a, denom_b])),
        QueryMsg::MarketPrice {
            pool_id,
            denom_in,
            denom_out,
        } => {
            let pool = POOLS.load(deps.storage, &pool_id)?;
            let config = CONFIG.load(deps.storage)?;
            let price = InterchainMarketMaker::new(&pool, config.fee_rate)
                .market_price(&denom_in, &denom_out)
                .map_err(|err| StdError::generic_err(err.to_string()))?;
            to_binary(&price)
        }
        QueryMsg::LpBalance { pool_id, owner } => {
            let amount = escrow::lp_balance(deps.storage, &pool_id, &owner)?;
            to_binary(&Coin {
                denom: pool_id,
                amount,
            })
        }
        QueryMsg::EscrowBalance { channel_id, denom } => {
            let amount = escrow::escrowed(deps.storage, &channel_id, &denom)?;
            to_binary(&Coin { denom, amount })
        }
        QueryMsg::RemoteFunds { sender, denom } => {
            let amount = escrow::remote_funds(deps.storage, &sender, &denom)?;
            to_binary(&Coin { denom, amount })
        }
        QueryMsg::Channel { channel_id } => to_binary(&CHANNELS.load(deps.storage, &channel_id)?),
    }
}

fn query_pools(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<Vec<Pool>> {
    let limit = limit.unwrap_or(DEFAULT_POOLS_LIMIT).min(MAX_POOLS_LIMIT) as usize;
    let start = start_after.as_deref().map(Bound::exclusive);
    POOLS
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, pool)| pool))
        .collect()
}
