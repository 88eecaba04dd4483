//! Pool store and the rest of the contract's persisted state.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Coin, IbcEndpoint, Uint128};
use cw_storage_plus::{Item, Map};
use sha2::{Digest, Sha256};

use crate::ContractError;

/// Channel version negotiated during the IBC handshake.
pub const IBC_VERSION: &str = "ics101-1";

/// Governance-controlled settings.
#[cw_serde]
pub struct Config {
    /// May adjust fees and packet lifetime.
    pub admin: Addr,
    /// Swap fee in basis points; the effective multiplier is
    /// `(10000 - fee_rate) / 10000`.
    pub fee_rate: u64,
    /// Packet timeout, in seconds from emission.
    pub packet_lifetime: u64,
}

/// Which chain issued the asset, from the perspective of this replica.
#[cw_serde]
pub enum PoolSide {
    Native,
    Remote,
}

/// A pool accepts deposits while `Initial`; swaps and withdrawals require
/// `Ready`. The transition happens the first time supply becomes positive
/// and is never reverted.
#[cw_serde]
pub enum PoolStatus {
    Initial,
    Ready,
}

/// One leg of a mirrored pool.
#[cw_serde]
pub struct PoolAsset {
    pub side: PoolSide,
    pub balance: Coin,
    /// Percentage weight in `[1, 99]`; the two legs sum to 100.
    pub weight: u32,
    /// Display exponent of the denom, `[0, 18]`.
    pub decimal: u32,
}

/// A mirrored liquidity pool. The same pool exists on both chains with the
/// `PoolSide` labels inverted; all other fields agree once in-flight packets
/// have drained.
#[cw_serde]
pub struct Pool {
    pub id: String,
    pub assets: [PoolAsset; 2],
    /// Outstanding LP supply; `supply.denom == id`.
    pub supply: Coin,
    pub status: PoolStatus,
    pub counterparty_port: String,
    pub counterparty_channel: String,
}

/// Deterministic pool identifier, identical on both replicas regardless of
/// the denom order the creator supplied.
pub fn generate_pool_id(denoms: &[String; 2]) -> String {
    let mut sorted = denoms.clone();
    sorted.sort();
    let digest = Sha256::digest(sorted.concat().as_bytes());
    format!("pool{}", hex::encode(digest))
}

impl Pool {
    /// Builds a pool and checks the structural invariants: two distinct
    /// denoms, weights summing to 100, exactly one native side.
    pub fn try_new(
        assets: [PoolAsset; 2],
        counterparty_port: String,
        counterparty_channel: String,
    ) -> Result<Self, ContractError> {
        if assets[0].balance.denom == assets[1].balance.denom {
            return Err(ContractError::InvalidRequest {
                reason: "pool denoms must differ".to_string(),
            });
        }
        if assets[0].weight + assets[1].weight != 100
            || assets.iter().any(|a| a.weight == 0 || a.weight > 99)
        {
            return Err(ContractError::InvalidRequest {
                reason: "asset weights must be in [1, 99] and sum to 100".to_string(),
            });
        }
        if assets.iter().any(|a| a.decimal > 18) {
            return Err(ContractError::InvalidRequest {
                reason: "asset decimals must be in [0, 18]".to_string(),
            });
        }
        let natives = assets
            .iter()
            .filter(|a| a.side == PoolSide::Native)
            .count();
        if natives != 1 {
            return Err(ContractError::InvalidRequest {
                reason: "exactly one pool asset must be native".to_string(),
            });
        }
        let id = generate_pool_id(&[
            assets[0].balance.denom.clone(),
            assets[1].balance.denom.clone(),
        ]);
        let supply = Coin {
            denom: id.clone(),
            amount: Uint128::zero(),
        };
        Ok(Pool {
            id,
            assets,
            supply,
            status: PoolStatus::Initial,
            counterparty_port,
            counterparty_channel,
        })
    }

    pub fn find_asset(&self, denom: &str) -> Result<&PoolAsset, ContractError> {
        self.assets
            .iter()
            .find(|a| a.balance.denom == denom)
            .ok_or_else(|| ContractError::InvalidRequest {
                reason: format!("denom {denom} is not part of the pool"),
            })
    }

    fn find_asset_mut(&mut self, denom: &str) -> Result<&mut PoolAsset, ContractError> {
        self.assets
            .iter_mut()
            .find(|a| a.balance.denom == denom)
            .ok_or_else(|| ContractError::InvalidRequest {
                reason: format!("denom {denom} is not part of the pool"),
            })
    }

    /// The asset carrying the given side label on this replica.
    pub fn side_asset(&self, side: PoolSide) -> &PoolAsset {
        if self.assets[0].side == side {
            &self.assets[0]
        } else {
            &self.assets[1]
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == PoolStatus::Ready
    }

    fn add_amount(&mut self, token: &Coin) -> Result<(), ContractError> {
        let asset = self.find_asset_mut(&token.denom)?;
        asset.balance.amount = asset.balance.amount.checked_add(token.amount)?;
        Ok(())
    }

    fn sub_amount(&mut self, token: &Coin) -> Result<(), ContractError> {
        let asset = self.find_asset_mut(&token.denom)?;
        asset.balance.amount = asset.balance.amount.checked_sub(token.amount)?;
        Ok(())
    }

    fn refresh_status(&mut self) {
        if !self.supply.amount.is_zero() {
            self.status = PoolStatus::Ready;
        }
    }

    /// Mirror mutation for a single-sided deposit. Applied on the receiving
    /// chain inside the packet handler and on the initiating chain when the
    /// success acknowledgement arrives, so both replicas evolve identically.
    pub fn apply_single_deposit(
        &mut self,
        token: &Coin,
        issued: Uint128,
    ) -> Result<(), ContractError> {
        self.add_amount(token)?;
        self.supply.amount = self.supply.amount.checked_add(issued)?;
        self.refresh_status();
        Ok(())
    }

    /// Mirror mutation for both legs of a double-sided deposit.
    pub fn apply_double_deposit(
        &mut self,
        local: &Coin,
        remote: &Coin,
        issued_total: Uint128,
    ) -> Result<(), ContractError> {
        self.add_amount(local)?;
        self.add_amount(remote)?;
        self.supply.amount = self.supply.amount.checked_add(issued_total)?;
        self.refresh_status();
        Ok(())
    }

    /// Mirror mutation for a withdrawal of `redeemed` LP paying `out`.
    pub fn apply_withdraw(&mut self, redeemed: Uint128, out: &Coin) -> Result<(), ContractError> {
        self.sub_amount(out)?;
        self.supply.amount = self.supply.amount.checked_sub(redeemed)?;
        Ok(())
    }

    /// Mirror mutation shared by both swap directions: the input grows one
    /// side, the delivered output shrinks the other. The escrowed input is
    /// never returned; it backs the enlarged balance.
    pub fn apply_swap(&mut self, input: &Coin, output: &Coin) -> Result<(), ContractError> {
        self.add_amount(input)?;
        self.sub_amount(output)?;
        Ok(())
    }
}

/// An IBC channel this contract completed the handshake on.
#[cw_serde]
pub struct ChannelInfo {
    pub channel_id: String,
    pub port_id: String,
    pub counterparty_endpoint: IbcEndpoint,
    pub connection_id: String,
    /// Deterministic escrow account label for this channel.
    pub escrow_address: String,
}

pub const CONFIG: Item<Config> = Item::new("config");

pub const POOLS: Map<&str, Pool> = Map::new("pools");

/// Registered channels by local channel id.
pub const CHANNELS: Map<&str, ChannelInfo> = Map::new("channels");

/// Local channel id by `(counterparty port, counterparty channel)`, so the
/// delegator can route a pool's packets without the pool storing the local
/// endpoint.
pub const CHANNEL_BY_COUNTERPARTY: Map<(&str, &str), String> = Map::new("channel_by_counterparty");

/// LP ledger: `(pool id, owner) -> balance`. LP denoms equal the pool id.
pub const LP_BALANCES: Map<(&str, &str), Uint128> = Map::new("lp_balances");

/// Escrow ledger: `(local channel id, denom) -> amount` of the contract's
/// bank balance held for that channel.
pub const ESCROW: Map<(&str, &str), Uint128> = Map::new("escrow");

/// Funds a remote depositor pre-placed for double deposits:
/// `(sender, denom) -> amount`.
pub const REMOTE_FUNDS: Map<(&str, &str), Uint128> = Map::new("remote_funds");

/// Replay protection for signed remote deposit orders: next expected
/// sequence per remote sender.
pub const REMOTE_SEQUENCES: Map<&str, u64> = Map::new("remote_sequences");
