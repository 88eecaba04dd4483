//! Messages used to instantiate/execute/query the contract, plus the wire
//! requests, responses and the packet envelope exchanged between replicas.

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{to_binary, Binary, Coin, Decimal256, StdResult, Uint128, Uint256};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::state::{ChannelInfo, Config, Pool};
use crate::ContractError;

/// Arguments to instantiate the contract.
#[cw_serde]
pub struct InstantiateMsg {
    /// Swap fee in basis points, `[0, 10000)`.
    pub fee_rate: u64,
    /// Packet timeout in seconds.
    pub packet_lifetime: u64,
}

/// User-facing entry points. The six pool operations delegate: they
/// validate, escrow and emit a packet; pools only change once the
/// counterparty acknowledges.
#[cw_serde]
pub enum ExecuteMsg {
    /// Register a mirrored pool on both chains.
    CreatePool(MsgCreatePool),
    /// Add liquidity on one side only.
    SingleDeposit(MsgSingleDeposit),
    /// Add liquidity on both sides at once; the remote leg is authorised by
    /// a signed order.
    DoubleDeposit(MsgDoubleDeposit),
    /// Redeem LP tokens for this chain's side of the liquidity.
    Withdraw(MsgWithdraw),
    /// Sell an exact input amount (out-given-in).
    LeftSwap(MsgSwap),
    /// Buy an exact output amount (in-given-out).
    RightSwap(MsgSwap),
    /// Place funds with the contract so a counterparty-initiated double
    /// deposit can draw on them.
    FundRemoteDeposit {},
    /// Take back funds placed with `FundRemoteDeposit` and not yet used.
    ReclaimRemoteFunds { denom: String, amount: Uint128 },
    /// Admin-gated parameter changes.
    UpdateConfig {
        fee_rate: Option<u64>,
        packet_lifetime: Option<u64>,
        admin: Option<String>,
    },
}

/// Request to create a pool over `denoms`, weighted `"a:b"` with
/// `a + b == 100`.
#[cw_serde]
pub struct MsgCreatePool {
    pub source_port: String,
    pub source_channel: String,
    pub sender: String,
    pub denoms: [String; 2],
    pub decimals: [u32; 2],
    /// Percentage split, e.g. `"50:50"`, aligned with `denoms`.
    pub weight: String,
}

/// Request to deposit `tokens` (a single coin) into `pool_id`.
#[cw_serde]
pub struct MsgSingleDeposit {
    pub pool_id: String,
    pub sender: String,
    pub tokens: Vec<Coin>,
}

/// The initiating chain's leg of a double deposit.
#[cw_serde]
pub struct LocalDeposit {
    pub sender: String,
    pub token: Coin,
}

/// The counterparty leg of a double deposit. `signature` covers the
/// canonical order `{sender, sequence, token}` and authorises the receiving
/// chain to apply the sender's pre-placed funds.
#[cw_serde]
pub struct RemoteDeposit {
    pub sender: String,
    pub sequence: u64,
    pub token: Coin,
    pub signature: Binary,
    pub pub_key: Binary,
}

/// Request to deposit on both sides of `pool_id` in one operation.
#[cw_serde]
pub struct MsgDoubleDeposit {
    pub pool_id: String,
    pub local_deposit: LocalDeposit,
    pub remote_deposit: RemoteDeposit,
}

/// Request to redeem `pool_coin` (denom equals the pool id) for `denom_out`.
#[cw_serde]
pub struct MsgWithdraw {
    pub sender: String,
    pub pool_coin: Coin,
    pub denom_out: String,
}

/// Request for either swap direction. For a left swap `token_in` is the
/// exact amount sold and `token_out` the expected proceeds; for a right swap
/// `token_out` is the exact amount bought and `token_in` the expected cost.
/// `slippage` is in basis points of 1/10000.
#[cw_serde]
pub struct MsgSwap {
    pub sender: String,
    pub token_in: Coin,
    pub token_out: Coin,
    pub slippage: u64,
    pub recipient: String,
}

/// The canonical payload a remote depositor signs.
#[cw_serde]
pub struct RemoteDepositOrder {
    pub sender: String,
    pub sequence: u64,
    pub token: Coin,
}

#[cw_serde]
pub struct MsgCreatePoolResponse {
    pub pool_id: String,
}

#[cw_serde]
pub struct MsgSingleDepositResponse {
    pub pool_token: Coin,
}

#[cw_serde]
pub struct MsgDoubleDepositResponse {
    /// `[local leg, remote leg]` LP issuance.
    pub pool_tokens: [Coin; 2],
}

#[cw_serde]
pub struct MsgWithdrawResponse {
    pub tokens: Vec<Coin>,
}

#[cw_serde]
pub struct MsgSwapResponse {
    /// The receiver-computed amount: actual proceeds for a left swap,
    /// actual cost for a right swap.
    pub tokens: Vec<Coin>,
}

/// Tag carried by every packet so a replica can dispatch and reject
/// mismatched payloads.
#[cw_serde]
pub enum SwapMessageType {
    CreatePool,
    SingleDeposit,
    DoubleDeposit,
    Withdraw,
    LeftSwap,
    RightSwap,
}

/// The typed envelope exchanged over the channel. `data` is the canonical
/// JSON encoding of the request named by `msg_type`.
#[cw_serde]
pub struct InterchainSwapPacket {
    pub msg_type: SwapMessageType,
    pub data: Binary,
}

impl InterchainSwapPacket {
    pub fn encode<T: Serialize>(msg_type: SwapMessageType, msg: &T) -> StdResult<Binary> {
        to_binary(&InterchainSwapPacket {
            msg_type,
            data: to_binary(msg)?,
        })
    }
}

/// Acknowledgement envelope: a typed response on success, a printable
/// reason on failure.
#[cw_serde]
pub enum InterchainSwapAck {
    Result(Binary),
    Error(String),
}

/// Query surface.
#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Config)]
    Config {},

    #[returns(Pool)]
    Pool { pool_id: String },

    #[returns(Vec<Pool>)]
    Pools {
        start_after: Option<String>,
        limit: Option<u32>,
    },

    #[returns(String)]
    PoolId { denom_a: String, denom_b: String },

    /// Spot price of `denom_out` in units of `denom_in`.
    #[returns(Decimal256)]
    MarketPrice {
        pool_id: String,
        denom_in: String,
        denom_out: String,
    },

    #[returns(Coin)]
    LpBalance { pool_id: String, owner: String },

    #[returns(Coin)]
    EscrowBalance { channel_id: String, denom: String },

    #[returns(Coin)]
    RemoteFunds { sender: String, denom: String },

    #[returns(ChannelInfo)]
    Channel { channel_id: String },
}

fn require(condition: bool, reason: &str) -> Result<(), ContractError> {
    if condition {
        Ok(())
    } else {
        Err(ContractError::InvalidRequest {
            reason: reason.to_string(),
        })
    }
}

fn require_positive(token: &Coin, what: &str) -> Result<(), ContractError> {
    require(
        !token.denom.is_empty() && !token.amount.is_zero(),
        &format!("{what} must name a denom and a positive amount"),
    )
}

/// Parses a `"a:b"` weight split into the two percentage weights.
pub fn parse_weights(weight: &str) -> Result<[u32; 2], ContractError> {
    let parts: Vec<&str> = weight.split(':').collect();
    if parts.len() != 2 {
        return Err(ContractError::InvalidRequest {
            reason: format!("weight {weight} must be of the form \"a:b\""),
        });
    }
    let mut weights = [0u32; 2];
    for (slot, part) in weights.iter_mut().zip(parts) {
        *slot = part
            .parse::<u32>()
            .map_err(|_| ContractError::InvalidRequest {
                reason: format!("weight component {part} is not an integer"),
            })?;
    }
    require(
        weights.iter().all(|w| (1..=99).contains(w)) && weights[0] + weights[1] == 100,
        "weights must be in [1, 99] and sum to 100",
    )?;
    Ok(weights)
}

impl MsgCreatePool {
    pub fn validate(&self) -> Result<[u32; 2], ContractError> {
        require(!self.sender.is_empty(), "sender is required")?;
        require(!self.source_channel.is_empty(), "source channel is required")?;
        require(
            !self.denoms[0].is_empty() && !self.denoms[1].is_empty(),
            "both denoms are required",
        )?;
        require(self.denoms[0] != self.denoms[1], "denoms must differ")?;
        require(
            self.decimals.iter().all(|d| *d <= 18),
            "decimals must be in [0, 18]",
        )?;
        parse_weights(&self.weight)
    }
}

impl MsgSingleDeposit {
    pub fn validate(&self) -> Result<&Coin, ContractError> {
        require(!self.sender.is_empty(), "sender is required")?;
        require(!self.pool_id.is_empty(), "pool id is required")?;
        require(self.tokens.len() == 1, "exactly one deposit token expected")?;
        require_positive(&self.tokens[0], "deposit token")?;
        Ok(&self.tokens[0])
    }
}

impl MsgDoubleDeposit {
    pub fn validate(&self) -> Result<(), ContractError> {
        require(!self.pool_id.is_empty(), "pool id is required")?;
        require(
            !self.local_deposit.sender.is_empty() && !self.remote_deposit.sender.is_empty(),
            "both senders are required",
        )?;
        require_positive(&self.local_deposit.token, "local deposit token")?;
        require_positive(&self.remote_deposit.token, "remote deposit token")?;
        require(
            self.local_deposit.token.denom != self.remote_deposit.token.denom,
            "deposit legs must cover both denoms",
        )?;
        require(
            !self.remote_deposit.signature.is_empty() && !self.remote_deposit.pub_key.is_empty(),
            "remote deposit signature and key are required",
        )
    }
}

impl RemoteDeposit {
    /// The message hash the remote signature must verify against.
    pub fn sign_doc_hash(&self) -> StdResult<[u8; 32]> {
        let order = RemoteDepositOrder {
            sender: self.sender.clone(),
            sequence: self.sequence,
            token: self.token.clone(),
        };
        let bytes = to_binary(&order)?;
        Ok(Sha256::digest(bytes.as_slice()).into())
    }
}

impl MsgWithdraw {
    pub fn validate(&self) -> Result<(), ContractError> {
        require(!self.sender.is_empty(), "sender is required")?;
        require_positive(&self.pool_coin, "pool coin")?;
        require(!self.denom_out.is_empty(), "output denom is required")?;
        require(
            self.denom_out != self.pool_coin.denom,
            "cannot withdraw into the pool token",
        )
    }
}

impl MsgSwap {
    pub fn validate(&self) -> Result<(), ContractError> {
        require(!self.sender.is_empty(), "sender is required")?;
        require(!self.recipient.is_empty(), "recipient is required")?;
        require_positive(&self.token_in, "input token")?;
        require_positive(&self.token_out, "output token")?;
        require(
            self.token_in.denom != self.token_out.denom,
            "swap denoms must differ",
        )?;
        require(
            self.slippage > 0 && self.slippage <= 10_000,
            "slippage must be in (0, 10000] basis points",
        )
    }

    /// The most input a right swap may consume: the quoted cost grown by
    /// the slippage tolerance, rounded up. This is also the amount the
    /// delegator escrows.
    pub fn right_swap_cap(&self) -> Result<Uint128, ContractError> {
        let numerator =
            Uint256::from(self.token_in.amount) * Uint256::from(10_000u64 + self.slippage);
        let cap = (numerator + Uint256::from(9_999u64)) / Uint256::from(10_000u64);
        Ok(Uint128::try_from(cap)?)
    }

    /// The least proceeds a left swap may deliver under the slippage
    /// tolerance.
    pub fn left_swap_floor(&self) -> Result<Uint128, ContractError> {
        let numerator =
            Uint256::from(self.token_out.amount) * Uint256::from(10_000u64 - self.slippage);
        let floor = numerator / Uint256::from(10_000u64);
        Ok(Uint128::try_from(floor)?)
    }
}
