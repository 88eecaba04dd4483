//! IBC entry points: channel handshake, packet receipt on the destination
//! chain, and acknowledgement/timeout post-processing on the initiator.
//!
//! Receive handlers run the market maker and mutate the local pool; errors
//! are folded into an error acknowledgement rather than aborting the
//! transaction, so the relayer can always deliver something. Ack handlers
//! replay the receiver-computed mutation on the local mirror and settle
//! escrow; error acks and timeouts refund.

#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    from_binary, to_binary, Binary, Coin, DepsMut, Env, Ibc3ChannelOpenResponse, IbcBasicResponse,
    IbcChannel, IbcChannelCloseMsg, IbcChannelConnectMsg, IbcChannelOpenMsg,
    IbcChannelOpenResponse, IbcOrder, IbcPacket, IbcPacketAckMsg, IbcPacketReceiveMsg,
    IbcPacketTimeoutMsg, IbcReceiveResponse, Never, StdResult, Storage, Uint128,
};
use serde::Serialize;

use crate::amm::InterchainMarketMaker;
use crate::escrow::{self, escrow_address};
use crate::msg::{
    InterchainSwapAck, InterchainSwapPacket, MsgCreatePool, MsgCreatePoolResponse,
    MsgDoubleDeposit, MsgDoubleDepositResponse, MsgSingleDeposit, MsgSingleDepositResponse,
    MsgSwap, MsgSwapResponse, MsgWithdraw, MsgWithdrawResponse, SwapMessageType,
};
use crate::state::{
    ChannelInfo, Pool, PoolAsset, PoolSide, CHANNELS, CHANNEL_BY_COUNTERPARTY, CONFIG, IBC_VERSION,
    POOLS, REMOTE_SEQUENCES,
};
use crate::ContractError;

fn ack_success<T: Serialize>(response: &T) -> StdResult<Binary> {
    to_binary(&InterchainSwapAck::Result(to_binary(response)?))
}

fn ack_fail(error: String) -> Binary {
    // Serializing a plain string variant cannot fail.
    to_binary(&InterchainSwapAck::Error(error)).unwrap_or_default()
}

fn enforce_order_and_version(
    channel: &IbcChannel,
    counterparty_version: Option<&str>,
) -> Result<(), ContractError> {
    if channel.version != IBC_VERSION {
        return Err(ContractError::InvalidChannelVersion {
            actual: channel.version.clone(),
            expected: IBC_VERSION.to_string(),
        });
    }
    if let Some(version) = counterparty_version {
        if version != IBC_VERSION {
            return Err(ContractError::InvalidChannelVersion {
                actual: version.to_string(),
                expected: IBC_VERSION.to_string(),
            });
        }
    }
    // Packets must apply at the peer in emission order or the mirrors
    // diverge.
    if channel.order != IbcOrder::Ordered {
        return Err(ContractError::OrderedChannelRequired {});
    }
    Ok(())
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn ibc_channel_open(
    _deps: DepsMut,
    _env: Env,
    msg: IbcChannelOpenMsg,
) -> Result<IbcChannelOpenResponse, ContractError> {
    enforce_order_and_version(msg.channel(), msg.counterparty_version())?;
    Ok(Some(Ibc3ChannelOpenResponse {
        version: IBC_VERSION.to_string(),
    }))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn ibc_channel_connect(
    deps: DepsMut,
    _env: Env,
    msg: IbcChannelConnectMsg,
) -> Result<IbcBasicResponse, ContractError> {
    let channel = msg.channel();
    enforce_order_and_version(channel, msg.counterparty_version())?;
    let info = ChannelInfo {
        channel_id: channel.endpoint.channel_id.clone(),
        port_id: channel.endpoint.port_id.clone(),
        counterparty_endpoint: channel.counterparty_endpoint.clone(),
        connection_id: channel.connection_id.clone(),
        escrow_address: escrow_address(&channel.endpoint.port_id, &channel.endpoint.channel_id),
    };
    CHANNELS.save(deps.storage, &info.channel_id, &info)?;
    CHANNEL_BY_COUNTERPARTY.save(
        deps.storage,
        (
            &info.counterparty_endpoint.port_id,
            &info.counterparty_endpoint.channel_id,
        ),
        &info.channel_id,
    )?;
    Ok(IbcBasicResponse::new()
        .add_attribute("action", "ibc_connect")
        .add_attribute("channel_id", &info.channel_id)
        .add_attribute("escrow_address", &info.escrow_address))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn ibc_channel_close(
    _deps: DepsMut,
    _env: Env,
    msg: IbcChannelCloseMsg,
) -> Result<IbcBasicResponse, ContractError> {
    // Ordered channels close when a packet times out. The registry entry
    // stays so escrow held for the channel remains queryable.
    Ok(IbcBasicResponse::new()
        .add_attribute("action", "ibc_close")
        .add_attribute("channel_id", &msg.channel().endpoint.channel_id))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn ibc_packet_receive(
    deps: DepsMut,
    _env: Env,
    msg: IbcPacketReceiveMsg,
) -> Result<IbcReceiveResponse, Never> {
    let packet = msg.packet;
    Ok(do_ibc_packet_receive(deps, &packet).unwrap_or_else(|err| {
        IbcReceiveResponse::new()
            .set_ack(ack_fail(err.to_string()))
            .add_attribute("action", "receive")
            .add_attribute("success", "false")
            .add_attribute("error", err.to_string())
    }))
}

fn do_ibc_packet_receive(
    deps: DepsMut,
    packet: &IbcPacket,
) -> Result<IbcReceiveResponse, ContractError> {
    let envelope: InterchainSwapPacket = from_binary(&packet.data)?;
    match envelope.msg_type {
        SwapMessageType::CreatePool => {
            receive_create_pool(deps, packet, from_binary(&envelope.data)?)
        }
        SwapMessageType::SingleDeposit => {
            receive_single_deposit(deps, packet, from_binary(&envelope.data)?)
        }
        SwapMessageType::DoubleDeposit => {
            receive_double_deposit(deps, packet, from_binary(&envelope.data)?)
        }
        SwapMessageType::Withdraw => receive_withdraw(deps, packet, from_binary(&envelope.data)?),
        msg_type @ (SwapMessageType::LeftSwap | SwapMessageType::RightSwap) => {
            receive_swap(deps, packet, msg_type, from_binary(&envelope.data)?)
        }
    }
}

/// The pool's recorded counterparty must be the endpoint the packet came
/// from; a pool is bound to one channel for its lifetime.
fn verify_pool_channel(pool: &Pool, packet: &IbcPacket) -> Result<(), ContractError> {
    if pool.counterparty_port != packet.src.port_id
        || pool.counterparty_channel != packet.src.channel_id
    {
        return Err(ContractError::ChannelMismatch {
            pool_id: pool.id.clone(),
        });
    }
    Ok(())
}

/// Side labels are decided by which denom this chain actually issues.
fn classify_side(
    deps: &DepsMut,
    denom: &str,
) -> Result<PoolSide, ContractError> {
    let supply = deps.querier.query_supply(denom)?;
    if supply.amount.is_zero() {
        Ok(PoolSide::Remote)
    } else {
        Ok(PoolSide::Native)
    }
}

fn build_pool(
    deps: &DepsMut,
    msg: &MsgCreatePool,
    weights: [u32; 2],
    counterparty_port: String,
    counterparty_channel: String,
) -> Result<Pool, ContractError> {
    let leg = |i: usize, side: PoolSide| PoolAsset {
        side,
        balance: Coin {
            denom: msg.denoms[i].clone(),
            amount: Uint128::zero(),
        },
        weight: weights[i],
        decimal: msg.decimals[i],
    };
    let assets = [
        leg(0, classify_side(deps, &msg.denoms[0])?),
        leg(1, classify_side(deps, &msg.denoms[1])?),
    ];
    Pool::try_new(assets, counterparty_port, counterparty_channel)
}

fn receive_create_pool(
    deps: DepsMut,
    packet: &IbcPacket,
    msg: MsgCreatePool,
) -> Result<IbcReceiveResponse, ContractError> {
    let weights = msg.validate()?;
    let pool = build_pool(
        &deps,
        &msg,
        weights,
        packet.src.port_id.clone(),
        packet.src.channel_id.clone(),
    )?;
    if POOLS.has(deps.storage, &pool.id) {
        return Err(ContractError::PoolAlreadyExists {
            pool_id: pool.id.clone(),
        });
    }
    POOLS.save(deps.storage, &pool.id, &pool)?;
    let ack = ack_success(&MsgCreatePoolResponse {
        pool_id: pool.id.clone(),
    })?;
    Ok(IbcReceiveResponse::new()
        .set_ack(ack)
        .add_attribute("action", "receive_create_pool")
        .add_attribute("pool_id", pool.id))
}

fn load_pool(storage: &dyn Storage, pool_id: &str) -> Result<Pool, ContractError> {
    POOLS
        .may_load(storage, pool_id)?
        .ok_or_else(|| ContractError::PoolNotFound {
            pool_id: pool_id.to_string(),
        })
}

fn market_maker<'a>(
    storage: &dyn Storage,
    pool: &'a Pool,
) -> Result<InterchainMarketMaker<'a>, ContractError> {
    let config = CONFIG.load(storage)?;
    Ok(InterchainMarketMaker::new(pool, config.fee_rate))
}

fn receive_single_deposit(
    deps: DepsMut,
    packet: &IbcPacket,
    msg: MsgSingleDeposit,
) -> Result<IbcReceiveResponse, ContractError> {
    let token = msg.validate()?.clone();
    let mut pool = load_pool(deps.storage, &msg.pool_id)?;
    verify_pool_channel(&pool, packet)?;
    let issued = market_maker(deps.storage, &pool)?.deposit_single(&token)?;
    pool.apply_single_deposit(&token, issued.amount)?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    let ack = ack_success(&MsgSingleDepositResponse {
        pool_token: issued.clone(),
    })?;
    Ok(IbcReceiveResponse::new()
        .set_ack(ack)
        .add_attribute("action", "receive_single_deposit")
        .add_attribute("pool_id", pool.id)
        .add_attribute("issued", issued.amount))
}

/// Checks the signed order carried with the remote leg: the sequence must be
/// the next expected for the sender and the signature must verify over the
/// canonical order bytes.
fn authenticate_remote_deposit(
    deps: &mut DepsMut,
    msg: &MsgDoubleDeposit,
) -> Result<(), ContractError> {
    let remote = &msg.remote_deposit;
    let expected = REMOTE_SEQUENCES
        .may_load(deps.storage, &remote.sender)?
        .unwrap_or_default();
    if remote.sequence != expected {
        return Err(ContractError::SequenceMismatch {
            expected,
            actual: remote.sequence,
        });
    }
    let hash = remote.sign_doc_hash()?;
    let verified = deps.api.secp256k1_verify(
        &hash,
        remote.signature.as_slice(),
        remote.pub_key.as_slice(),
    )?;
    if !verified {
        return Err(ContractError::SignatureInvalid {});
    }
    REMOTE_SEQUENCES.save(deps.storage, &remote.sender, &(expected + 1))?;
    Ok(())
}

fn receive_double_deposit(
    mut deps: DepsMut,
    packet: &IbcPacket,
    msg: MsgDoubleDeposit,
) -> Result<IbcReceiveResponse, ContractError> {
    msg.validate()?;
    let mut pool = load_pool(deps.storage, &msg.pool_id)?;
    verify_pool_channel(&pool, packet)?;
    // From this chain's perspective the remote leg is the native one.
    let local_asset = pool.find_asset(&msg.local_deposit.token.denom)?;
    let remote_asset = pool.find_asset(&msg.remote_deposit.token.denom)?;
    if local_asset.side != PoolSide::Remote || remote_asset.side != PoolSide::Native {
        return Err(ContractError::InvalidRequest {
            reason: "deposit legs do not match the pool sides".to_string(),
        });
    }
    authenticate_remote_deposit(&mut deps, &msg)?;
    // The signed order lets this chain move the depositor's pre-placed
    // funds into the channel escrow.
    escrow::take_remote_funds(
        deps.storage,
        &msg.remote_deposit.sender,
        &msg.remote_deposit.token,
    )?;
    escrow::lock(
        deps.storage,
        &packet.dest.channel_id,
        &msg.remote_deposit.token,
    )?;
    let issued = market_maker(deps.storage, &pool)?
        .deposit_double(&msg.local_deposit.token, &msg.remote_deposit.token)?;
    let total = issued[0].amount.checked_add(issued[1].amount)?;
    pool.apply_double_deposit(
        &msg.local_deposit.token,
        &msg.remote_deposit.token,
        total,
    )?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    // The remote depositor's LP lives on this chain as a voucher.
    escrow::mint_lp(
        deps.storage,
        &pool.id,
        &msg.remote_deposit.sender,
        issued[1].amount,
    )?;
    let ack = ack_success(&MsgDoubleDepositResponse {
        pool_tokens: issued.clone(),
    })?;
    Ok(IbcReceiveResponse::new()
        .set_ack(ack)
        .add_attribute("action", "receive_double_deposit")
        .add_attribute("pool_id", pool.id)
        .add_attribute("issued_local", issued[0].amount)
        .add_attribute("issued_remote", issued[1].amount))
}

fn receive_withdraw(
    deps: DepsMut,
    packet: &IbcPacket,
    msg: MsgWithdraw,
) -> Result<IbcReceiveResponse, ContractError> {
    msg.validate()?;
    let mut pool = load_pool(deps.storage, &msg.pool_coin.denom)?;
    verify_pool_channel(&pool, packet)?;
    if !pool.is_ready() {
        return Err(ContractError::PoolNotReady {
            pool_id: pool.id.clone(),
        });
    }
    let out = market_maker(deps.storage, &pool)?.withdraw(&msg.pool_coin, &msg.denom_out)?;
    pool.apply_withdraw(msg.pool_coin.amount, &out)?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    // The payout happens on the initiator, whose escrow backs `denom_out`.
    let ack = ack_success(&MsgWithdrawResponse {
        tokens: vec![out.clone()],
    })?;
    Ok(IbcReceiveResponse::new()
        .set_ack(ack)
        .add_attribute("action", "receive_withdraw")
        .add_attribute("pool_id", pool.id)
        .add_attribute("out", out.amount))
}

fn receive_swap(
    deps: DepsMut,
    packet: &IbcPacket,
    msg_type: SwapMessageType,
    msg: MsgSwap,
) -> Result<IbcReceiveResponse, ContractError> {
    msg.validate()?;
    let recipient = deps.api.addr_validate(&msg.recipient)?;
    let pool_id = crate::state::generate_pool_id(&[
        msg.token_in.denom.clone(),
        msg.token_out.denom.clone(),
    ]);
    let mut pool = load_pool(deps.storage, &pool_id)?;
    verify_pool_channel(&pool, packet)?;
    if !pool.is_ready() {
        return Err(ContractError::PoolNotReady { pool_id });
    }
    let amm = market_maker(deps.storage, &pool)?;
    let (settled_in, delivered, action) = match msg_type {
        SwapMessageType::LeftSwap => {
            let out = amm.left_swap(&msg.token_in, &msg.token_out.denom)?;
            let floor = msg.left_swap_floor()?;
            if out.amount < floor {
                return Err(ContractError::SlippageExceeded {
                    expected: floor,
                    actual: out.amount,
                });
            }
            (msg.token_in.clone(), out, "receive_left_swap")
        }
        _ => {
            let actual_in = amm.right_swap(&msg.token_in.denom, &msg.token_out)?;
            let cap = msg.right_swap_cap()?;
            if actual_in.amount > cap {
                return Err(ContractError::SlippageExceeded {
                    expected: cap,
                    actual: actual_in.amount,
                });
            }
            (actual_in, msg.token_out.clone(), "receive_right_swap")
        }
    };
    // The output leaves this chain's escrow for the recipient; the input
    // was escrowed on the initiator and stays there.
    let payout = escrow::pay_out(
        deps.storage,
        &packet.dest.channel_id,
        recipient.as_str(),
        &delivered,
    )?;
    pool.apply_swap(&settled_in, &delivered)?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    // A left swap acks the delivered output; a right swap acks the settled
    // input, which the initiator needs for its mirror and escrow refund.
    let acked = match msg_type {
        SwapMessageType::LeftSwap => delivered.clone(),
        _ => settled_in.clone(),
    };
    let ack = ack_success(&MsgSwapResponse {
        tokens: vec![acked],
    })?;
    Ok(IbcReceiveResponse::new()
        .set_ack(ack)
        .add_message(payout)
        .add_attribute("action", action)
        .add_attribute("pool_id", pool.id)
        .add_attribute("delivered", delivered.amount))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn ibc_packet_ack(
    deps: DepsMut,
    _env: Env,
    msg: IbcPacketAckMsg,
) -> Result<IbcBasicResponse, ContractError> {
    let ack: InterchainSwapAck = from_binary(&msg.acknowledgement.data)?;
    match ack {
        InterchainSwapAck::Result(data) => on_success_ack(deps, &msg.original_packet, data),
        InterchainSwapAck::Error(error) => Ok(refund_packet(deps, &msg.original_packet)?
            .add_attribute("action", "error_ack_refund")
            .add_attribute("error", error)),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn ibc_packet_timeout(
    deps: DepsMut,
    _env: Env,
    msg: IbcPacketTimeoutMsg,
) -> Result<IbcBasicResponse, ContractError> {
    Ok(refund_packet(deps, &msg.packet)?.add_attribute("action", "timeout_refund"))
}

fn on_success_ack(
    deps: DepsMut,
    packet: &IbcPacket,
    data: Binary,
) -> Result<IbcBasicResponse, ContractError> {
    let envelope: InterchainSwapPacket = from_binary(&packet.data)?;
    match envelope.msg_type {
        SwapMessageType::CreatePool => {
            ack_create_pool(deps, packet, from_binary(&envelope.data)?, from_binary(&data)?)
        }
        SwapMessageType::SingleDeposit => {
            ack_single_deposit(deps, from_binary(&envelope.data)?, from_binary(&data)?)
        }
        SwapMessageType::DoubleDeposit => {
            ack_double_deposit(deps, from_binary(&envelope.data)?, from_binary(&data)?)
        }
        SwapMessageType::Withdraw => {
            ack_withdraw(deps, packet, from_binary(&envelope.data)?, from_binary(&data)?)
        }
        msg_type @ (SwapMessageType::LeftSwap | SwapMessageType::RightSwap) => {
            ack_swap(deps, packet, msg_type, from_binary(&envelope.data)?, from_binary(&data)?)
        }
    }
}

fn ack_create_pool(
    deps: DepsMut,
    packet: &IbcPacket,
    msg: MsgCreatePool,
    resp: MsgCreatePoolResponse,
) -> Result<IbcBasicResponse, ContractError> {
    let weights = msg.validate()?;
    // For a sent packet the destination is the counterparty end.
    let pool = build_pool(
        &deps,
        &msg,
        weights,
        packet.dest.port_id.clone(),
        packet.dest.channel_id.clone(),
    )?;
    if pool.id != resp.pool_id {
        return Err(ContractError::InvalidRequest {
            reason: "acknowledged pool id does not match the request".to_string(),
        });
    }
    if POOLS.has(deps.storage, &pool.id) {
        return Err(ContractError::PoolAlreadyExists {
            pool_id: pool.id.clone(),
        });
    }
    POOLS.save(deps.storage, &pool.id, &pool)?;
    Ok(IbcBasicResponse::new()
        .add_attribute("action", "ack_create_pool")
        .add_attribute("pool_id", pool.id))
}

fn ack_single_deposit(
    deps: DepsMut,
    msg: MsgSingleDeposit,
    resp: MsgSingleDepositResponse,
) -> Result<IbcBasicResponse, ContractError> {
    let token = msg.validate()?.clone();
    let mut pool = load_pool(deps.storage, &msg.pool_id)?;
    pool.apply_single_deposit(&token, resp.pool_token.amount)?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    escrow::mint_lp(deps.storage, &pool.id, &msg.sender, resp.pool_token.amount)?;
    Ok(IbcBasicResponse::new()
        .add_attribute("action", "ack_single_deposit")
        .add_attribute("pool_id", pool.id)
        .add_attribute("minted", resp.pool_token.amount))
}

fn ack_double_deposit(
    deps: DepsMut,
    msg: MsgDoubleDeposit,
    resp: MsgDoubleDepositResponse,
) -> Result<IbcBasicResponse, ContractError> {
    let mut pool = load_pool(deps.storage, &msg.pool_id)?;
    let total = resp.pool_tokens[0]
        .amount
        .checked_add(resp.pool_tokens[1].amount)?;
    pool.apply_double_deposit(
        &msg.local_deposit.token,
        &msg.remote_deposit.token,
        total,
    )?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    // Only the local leg mints here; the voucher was minted on the peer.
    escrow::mint_lp(
        deps.storage,
        &pool.id,
        &msg.local_deposit.sender,
        resp.pool_tokens[0].amount,
    )?;
    Ok(IbcBasicResponse::new()
        .add_attribute("action", "ack_double_deposit")
        .add_attribute("pool_id", pool.id)
        .add_attribute("minted", resp.pool_tokens[0].amount))
}

fn ack_withdraw(
    deps: DepsMut,
    packet: &IbcPacket,
    msg: MsgWithdraw,
    resp: MsgWithdrawResponse,
) -> Result<IbcBasicResponse, ContractError> {
    let out = resp
        .tokens
        .first()
        .cloned()
        .ok_or_else(|| ContractError::InvalidRequest {
            reason: "withdraw acknowledgement carries no payout".to_string(),
        })?;
    let mut pool = load_pool(deps.storage, &msg.pool_coin.denom)?;
    pool.apply_withdraw(msg.pool_coin.amount, &out)?;
    POOLS.save(deps.storage, &pool.id, &pool)?;
    // Burn the LP held in escrow since delegation, then settle the payout
    // from this channel's escrow.
    let channel = CHANNELS.load(deps.storage, &packet.src.channel_id)?;
    escrow::burn_lp(
        deps.storage,
        &pool.id,
        &channel.escrow_address,
        msg.pool_coin.amount,
    )?;
    let payout = escrow::pay_out(
        deps.storage,
        &packet.src.channel_id,
        &msg.sender,
        &out,
    )?;
    Ok(IbcBasicResponse::new()
        .add_message(payout)
        .add_attribute("action", "ack_withdraw")
        .add_attribute("pool_id", pool.id)
        .add_attribute("out", out.amount))
}

fn ack_swap(
    deps: DepsMut,
    packet: &IbcPacket,
    msg_type: SwapMessageType,
    msg: MsgSwap,
    resp: MsgSwapResponse,
) -> Result<IbcBasicResponse, ContractError> {
    let acked = resp
        .tokens
        .first()
        .cloned()
        .ok_or_else(|| ContractError::InvalidRequest {
            reason: "swap acknowledgement carries no token".to_string(),
        })?;
    let pool_id = crate::state::generate_pool_id(&[
        msg.token_in.denom.clone(),
        msg.token_out.denom.clone(),
    ]);
    let mut pool = load_pool(deps.storage, &pool_id)?;
    let mut response = IbcBasicResponse::new();
    match msg_type {
        SwapMessageType::LeftSwap => {
            // The full escrowed input enters the mirror; the ack carries the
            // delivered output.
            pool.apply_swap(&msg.token_in, &acked)?;
            response = response.add_attribute("action", "ack_left_swap");
        }
        _ => {
            // The ack carries the settled input; escrow above it flows back.
            pool.apply_swap(&acked, &msg.token_out)?;
            let cap = msg.right_swap_cap()?;
            let excess = cap.checked_sub(acked.amount)?;
            if !excess.is_zero() {
                let refund = escrow::pay_out(
                    deps.storage,
                    &packet.src.channel_id,
                    &msg.sender,
                    &Coin {
                        denom: msg.token_in.denom.clone(),
                        amount: excess,
                    },
                )?;
                response = response.add_message(refund);
            }
            response = response.add_attribute("action", "ack_right_swap");
        }
    }
    POOLS.save(deps.storage, &pool.id, &pool)?;
    Ok(response.add_attribute("pool_id", pool.id))
}

/// Returns whatever the original packet escrowed to its sender. Pools were
/// untouched on this chain, so escrow release is the whole story.
fn refund_packet(
    deps: DepsMut,
    packet: &IbcPacket,
) -> Result<IbcBasicResponse, ContractError> {
    let envelope: InterchainSwapPacket = from_binary(&packet.data)?;
    let channel_id = packet.src.channel_id.as_str();
    let response = IbcBasicResponse::new();
    match envelope.msg_type {
        SwapMessageType::CreatePool => {
            // Nothing was escrowed for a create.
            Ok(response)
        }
        SwapMessageType::SingleDeposit => {
            let msg: MsgSingleDeposit = from_binary(&envelope.data)?;
            let token = msg.validate()?.clone();
            let refund = escrow::pay_out(deps.storage, channel_id, &msg.sender, &token)?;
            Ok(response.add_message(refund))
        }
        SwapMessageType::DoubleDeposit => {
            let msg: MsgDoubleDeposit = from_binary(&envelope.data)?;
            let refund = escrow::pay_out(
                deps.storage,
                channel_id,
                &msg.local_deposit.sender,
                &msg.local_deposit.token,
            )?;
            Ok(response.add_message(refund))
        }
        SwapMessageType::Withdraw => {
            let msg: MsgWithdraw = from_binary(&envelope.data)?;
            let channel = CHANNELS.load(deps.storage, channel_id)?;
            escrow::transfer_lp(
                deps.storage,
                &msg.pool_coin.denom,
                &channel.escrow_address,
                &msg.sender,
                msg.pool_coin.amount,
            )?;
            Ok(response)
        }
        SwapMessageType::LeftSwap => {
            let msg: MsgSwap = from_binary(&envelope.data)?;
            let refund = escrow::pay_out(deps.storage, channel_id, &msg.sender, &msg.token_in)?;
            Ok(response.add_message(refund))
        }
        SwapMessageType::RightSwap => {
            let msg: MsgSwap = from_binary(&envelope.data)?;
            let escrowed = Coin {
                denom: msg.token_in.denom.clone(),
                amount: msg.right_swap_cap()?,
            };
            let refund = escrow::pay_out(deps.storage, channel_id, &msg.sender, &escrowed)?;
            Ok(response.add_message(refund))
        }
    }
}
