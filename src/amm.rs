//! Weighted market-maker arithmetic over a pool snapshot.
//!
//! Every function here is pure: handlers decide what to persist. Outputs and
//! LP issuance round toward zero, required inputs round away from zero, so
//! rounding always favours the pool and the existing liquidity providers.

use cosmwasm_std::{Coin, Decimal256, Uint128, Uint256};

use crate::math::{self, ceil_to_uint128, floor_to_uint128, to_decimal};
use crate::state::{Pool, PoolAsset};
use crate::ContractError;

/// Fee and slippage basis: one part in 10000.
pub const FEE_BASIS: u64 = 10_000;

/// A pool snapshot paired with the fee rate in force, mirroring how each
/// replica materialises the market maker lazily per packet.
pub struct InterchainMarketMaker<'a> {
    pub pool: &'a Pool,
    pub fee_rate: u64,
}

impl<'a> InterchainMarketMaker<'a> {
    pub fn new(pool: &'a Pool, fee_rate: u64) -> Self {
        InterchainMarketMaker { pool, fee_rate }
    }

    fn balance_of(&self, asset: &PoolAsset) -> Result<Decimal256, ContractError> {
        if asset.balance.amount.is_zero() {
            return Err(ContractError::EmptyPool {
                denom: asset.balance.denom.clone(),
            });
        }
        Ok(to_decimal(asset.balance.amount))
    }

    fn fee_multiplier(&self) -> Decimal256 {
        Decimal256::from_ratio(FEE_BASIS - self.fee_rate, FEE_BASIS)
    }

    /// Spot price `(B_in / w_in) / (B_out / w_out)` of the output denom in
    /// units of the input denom.
    pub fn market_price(
        &self,
        denom_in: &str,
        denom_out: &str,
    ) -> Result<Decimal256, ContractError> {
        let asset_in = self.pool.find_asset(denom_in)?;
        let asset_out = self.pool.find_asset(denom_out)?;
        if asset_out.balance.amount.is_zero() {
            return Err(ContractError::EmptyPool {
                denom: denom_out.to_string(),
            });
        }
        let numerator =
            Uint256::from(asset_in.balance.amount) * Uint256::from(asset_out.weight as u64);
        let denominator =
            Uint256::from(asset_out.balance.amount) * Uint256::from(asset_in.weight as u64);
        Ok(Decimal256::checked_from_ratio(numerator, denominator)?)
    }

    /// LP issued for a one-sided deposit:
    /// `P = S * ((1 + A/B)^(w/100) - 1)`, floored.
    pub fn deposit_single(&self, token: &Coin) -> Result<Coin, ContractError> {
        let asset = self.pool.find_asset(&token.denom)?;
        let supply = self.pool.supply.amount;
        if supply.is_zero() {
            return Err(ContractError::EmptyPool {
                denom: self.pool.id.clone(),
            });
        }
        let balance = self.balance_of(asset)?;
        let growth = Decimal256::one().checked_add(to_decimal(token.amount).checked_div(balance)?)?;
        let factor = math::pow(growth, Decimal256::percent(asset.weight as u64))?
            .checked_sub(Decimal256::one())?;
        let issued = floor_to_uint128(to_decimal(supply).checked_mul(factor)?)?;
        Ok(Coin {
            denom: self.pool.id.clone(),
            amount: issued,
        })
    }

    /// LP issued per leg of a double deposit, `[local, remote]`.
    ///
    /// A supply of zero seeds the pool: total issuance is the weighted
    /// geometric mean of the two amounts, split between the legs by weight.
    /// Afterwards each leg issues linearly, `P_k = S * A_k / B_k`.
    pub fn deposit_double(&self, local: &Coin, remote: &Coin) -> Result<[Coin; 2], ContractError> {
        let supply = self.pool.supply.amount;
        if supply.is_zero() {
            return self.seed(local, remote);
        }
        let mut issued = [Uint128::zero(), Uint128::zero()];
        for (slot, token) in issued.iter_mut().zip([local, remote]) {
            let asset = self.pool.find_asset(&token.denom)?;
            let balance = self.balance_of(asset)?;
            let share = to_decimal(token.amount).checked_div(balance)?;
            *slot = floor_to_uint128(to_decimal(supply).checked_mul(share)?)?;
        }
        Ok([
            Coin {
                denom: self.pool.id.clone(),
                amount: issued[0],
            },
            Coin {
                denom: self.pool.id.clone(),
                amount: issued[1],
            },
        ])
    }

    fn seed(&self, local: &Coin, remote: &Coin) -> Result<[Coin; 2], ContractError> {
        let asset_local = self.pool.find_asset(&local.denom)?;
        let asset_remote = self.pool.find_asset(&remote.denom)?;
        if local.amount.is_zero() || remote.amount.is_zero() {
            return Err(ContractError::MathDomain {
                reason: "seeding requires liquidity on both sides".to_string(),
            });
        }
        let total = math::pow(
            to_decimal(local.amount),
            Decimal256::percent(asset_local.weight as u64),
        )?
        .checked_mul(math::pow(
            to_decimal(remote.amount),
            Decimal256::percent(asset_remote.weight as u64),
        )?)?;
        let local_issued =
            floor_to_uint128(total.checked_mul(Decimal256::percent(asset_local.weight as u64))?)?;
        let remote_issued =
            floor_to_uint128(total.checked_mul(Decimal256::percent(asset_remote.weight as u64))?)?;
        Ok([
            Coin {
                denom: self.pool.id.clone(),
                amount: local_issued,
            },
            Coin {
                denom: self.pool.id.clone(),
                amount: remote_issued,
            },
        ])
    }

    /// Tokens paid out for redeeming `redeem` LP in `denom_out`:
    /// `A = B * (1 - (1 - R/S)^(100/w))`, floored.
    pub fn withdraw(&self, redeem: &Coin, denom_out: &str) -> Result<Coin, ContractError> {
        if redeem.denom != self.pool.id {
            return Err(ContractError::InvalidRequest {
                reason: format!("redeem denom {} is not the pool token", redeem.denom),
            });
        }
        let supply = self.pool.supply.amount;
        if supply.is_zero() {
            return Err(ContractError::EmptyPool {
                denom: self.pool.id.clone(),
            });
        }
        if redeem.amount > supply {
            return Err(ContractError::InsufficientBalance {
                denom: self.pool.id.clone(),
                required: redeem.amount,
                available: supply,
            });
        }
        let asset = self.pool.find_asset(denom_out)?;
        let balance = self.balance_of(asset)?;
        // Redeeming the entire supply drains the side exactly.
        if redeem.amount == supply {
            return Ok(Coin {
                denom: denom_out.to_string(),
                amount: asset.balance.amount,
            });
        }
        let remaining = Decimal256::from_ratio(supply.checked_sub(redeem.amount)?, supply);
        let exponent = Decimal256::from_ratio(100u64, asset.weight as u64);
        let kept = math::pow(remaining, exponent)?;
        let paid = balance.checked_mul(Decimal256::one().checked_sub(kept)?)?;
        Ok(Coin {
            denom: denom_out.to_string(),
            amount: floor_to_uint128(paid)?,
        })
    }

    /// Out-given-in. The fee is charged on the input up front:
    /// `A_out = B_out * (1 - (B_in / (B_in + A_in * (1 - f)))^(w_in/w_out))`,
    /// floored.
    pub fn left_swap(&self, token_in: &Coin, denom_out: &str) -> Result<Coin, ContractError> {
        let asset_in = self.pool.find_asset(&token_in.denom)?;
        let asset_out = self.pool.find_asset(denom_out)?;
        let balance_in = self.balance_of(asset_in)?;
        let balance_out = self.balance_of(asset_out)?;
        let effective_in = to_decimal(token_in.amount).checked_mul(self.fee_multiplier())?;
        let growth = Decimal256::one().checked_add(effective_in.checked_div(balance_in)?)?;
        let exponent = Decimal256::from_ratio(asset_in.weight as u64, asset_out.weight as u64);
        let grown = math::pow(growth, exponent)?;
        let out_share = Decimal256::one().checked_sub(Decimal256::one().checked_div(grown)?)?;
        Ok(Coin {
            denom: denom_out.to_string(),
            amount: floor_to_uint128(balance_out.checked_mul(out_share)?)?,
        })
    }

    /// In-given-out. The pre-fee input is
    /// `A'_in = B_in * ((B_out / (B_out - A_out))^(w_out/w_in) - 1)` and the
    /// user pays `A'_in / (1 - f)`, rounded up.
    pub fn right_swap(&self, denom_in: &str, token_out: &Coin) -> Result<Coin, ContractError> {
        let asset_in = self.pool.find_asset(denom_in)?;
        let asset_out = self.pool.find_asset(&token_out.denom)?;
        let balance_in = self.balance_of(asset_in)?;
        let balance_out = self.balance_of(asset_out)?;
        if token_out.amount >= asset_out.balance.amount {
            return Err(ContractError::MathDomain {
                reason: "requested output exceeds available liquidity".to_string(),
            });
        }
        let depleted = balance_out.checked_sub(to_decimal(token_out.amount))?;
        let growth = balance_out.checked_div(depleted)?;
        let exponent = Decimal256::from_ratio(asset_out.weight as u64, asset_in.weight as u64);
        let pre_fee = balance_in
            .checked_mul(math::pow(growth, exponent)?.checked_sub(Decimal256::one())?)?;
        let charged = pre_fee.checked_div(self.fee_multiplier())?;
        Ok(Coin {
            denom: denom_in.to_string(),
            amount: ceil_to_uint128(charged)?,
        })
    }
}
