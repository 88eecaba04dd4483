use cosmwasm_std::{
    CheckedFromRatioError, ConversionOverflowError, DivideByZeroError, OverflowError, StdError,
    Uint128, VerificationError,
};
use cw_utils::PaymentError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    Overflow(#[from] OverflowError),

    #[error("{0}")]
    DivideByZero(#[from] DivideByZeroError),

    #[error("{0}")]
    CheckedFromRatio(#[from] CheckedFromRatioError),

    #[error("{0}")]
    ConversionOverflow(#[from] ConversionOverflowError),

    #[error("{0}")]
    Verification(#[from] VerificationError),

    #[error("Unauthorized")]
    Unauthorized {},

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Only ordered channels are supported")]
    OrderedChannelRequired {},

    #[error("Invalid channel version {actual}, expected {expected}")]
    InvalidChannelVersion { actual: String, expected: String },

    #[error("Channel {channel_id} is not registered")]
    UnknownChannel { channel_id: String },

    #[error("Packet endpoint does not match pool {pool_id}")]
    ChannelMismatch { pool_id: String },

    #[error("Pool {pool_id} not found")]
    PoolNotFound { pool_id: String },

    #[error("Pool {pool_id} already exists")]
    PoolAlreadyExists { pool_id: String },

    #[error("Pool {pool_id} is not ready")]
    PoolNotReady { pool_id: String },

    #[error("Insufficient balance of {denom}: {required} required, {available} available")]
    InsufficientBalance {
        denom: String,
        required: Uint128,
        available: Uint128,
    },

    #[error("Invalid remote deposit signature")]
    SignatureInvalid {},

    #[error("Remote deposit sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    #[error("Pool side {denom} holds no liquidity")]
    EmptyPool { denom: String },

    #[error("Math domain violation: {reason}")]
    MathDomain { reason: String },

    #[error("Slippage exceeded: expected {expected}, actual {actual}")]
    SlippageExceeded { expected: Uint128, actual: Uint128 },
}
