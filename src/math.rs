//! Deterministic fixed-point routines for the weighted pool invariant.
//!
//! All arithmetic runs on [`Decimal256`] (18 decimal places) so that two
//! replicas of a pool compute bit-identical results. Floating point is never
//! used. Whole-number exponents multiply out exactly; fractional exponents
//! go through `exp(exponent * ln(base))` with fixed series bounds, and bases
//! below one are routed through their reciprocal so every intermediate value
//! stays within the unsigned range.

use cosmwasm_std::{Decimal256, Uint128, Uint256};

use crate::ContractError;

/// Largest whole exponent still dispatched to exact multiplication.
const MAX_WHOLE_EXPONENT: u128 = 1000;

/// exp() arguments above this bound overflow `Decimal256`.
const MAX_EXP_ARGUMENT: u64 = 135;

fn euler() -> Decimal256 {
    Decimal256::from_ratio(2_718_281_828_459_045_235u128, 1_000_000_000_000_000_000u128)
}

fn ln_two() -> Decimal256 {
    Decimal256::from_ratio(693_147_180_559_945_309u128, 1_000_000_000_000_000_000u128)
}

fn two() -> Decimal256 {
    Decimal256::from_ratio(2u128, 1u128)
}

/// Lossless widening of a coin amount into the fixed-point domain.
pub fn to_decimal(amount: Uint128) -> Decimal256 {
    Decimal256::from_ratio(amount, 1u128)
}

/// Rounds toward zero. Used for swap/withdraw outputs and LP issuance.
pub fn floor_to_uint128(value: Decimal256) -> Result<Uint128, ContractError> {
    Ok(Uint128::try_from(value.to_uint_floor())?)
}

/// Rounds away from zero. Used for required swap inputs.
pub fn ceil_to_uint128(value: Decimal256) -> Result<Uint128, ContractError> {
    Ok(Uint128::try_from(value.to_uint_ceil())?)
}

/// Exact integer power by repeated squaring.
fn pow_whole(base: Decimal256, mut n: u64) -> Result<Decimal256, ContractError> {
    let mut result = Decimal256::one();
    let mut factor = base;
    while n > 0 {
        if n & 1 == 1 {
            result = result.checked_mul(factor)?;
        }
        n >>= 1;
        if n > 0 {
            factor = factor.checked_mul(factor)?;
        }
    }
    Ok(result)
}

/// Natural logarithm for `x >= 1`.
///
/// The argument is halved down into `[1, 2)` and the remainder evaluated via
/// the artanh series `ln(m) = 2 * (z + z^3/3 + z^5/5 + ...)` with
/// `z = (m - 1) / (m + 1) < 1/3`, which reaches 18 decimals within 60 terms.
pub fn ln(x: Decimal256) -> Result<Decimal256, ContractError> {
    let one = Decimal256::one();
    if x < one {
        return Err(ContractError::MathDomain {
            reason: "logarithm argument below one".to_string(),
        });
    }
    let two = two();
    let mut mantissa = x;
    let mut halvings = 0u64;
    while mantissa >= two {
        mantissa = mantissa.checked_div(two)?;
        halvings += 1;
    }
    let z = (mantissa - one).checked_div(mantissa + one)?;
    let z_squared = z.checked_mul(z)?;
    let mut term = z;
    let mut series = Decimal256::zero();
    let mut denominator = 1u64;
    while !term.is_zero() && denominator < 121 {
        series = series.checked_add(term.checked_div(Decimal256::from_ratio(denominator, 1u64))?)?;
        term = term.checked_mul(z_squared)?;
        denominator += 2;
    }
    let from_halvings = Decimal256::from_ratio(halvings, 1u64).checked_mul(ln_two())?;
    Ok(from_halvings.checked_add(series.checked_mul(two)?)?)
}

/// Exponential for non-negative arguments.
///
/// `e^x = e^floor(x) * e^frac(x)`; the whole part multiplies out exactly and
/// the fractional part uses the Taylor series, which reaches 18 decimals
/// within 25 terms for arguments below one.
pub fn exp(x: Decimal256) -> Result<Decimal256, ContractError> {
    let whole = x.floor();
    let whole_uint = whole.to_uint_floor();
    if whole_uint > Uint256::from(MAX_EXP_ARGUMENT) {
        return Err(ContractError::MathDomain {
            reason: "exponential overflows the fixed-point range".to_string(),
        });
    }
    let n = Uint128::try_from(whole_uint)?.u128() as u64;
    let whole_part = pow_whole(euler(), n)?;

    let frac = x - whole;
    let mut term = Decimal256::one();
    let mut series = Decimal256::one();
    let mut i = 1u64;
    while !term.is_zero() && i < 40 {
        term = term
            .checked_mul(frac)?
            .checked_div(Decimal256::from_ratio(i, 1u64))?;
        series = series.checked_add(term)?;
        i += 1;
    }
    Ok(whole_part.checked_mul(series)?)
}

/// `base ^ exponent` for `base > 0`, `exponent >= 0`.
pub fn pow(base: Decimal256, exponent: Decimal256) -> Result<Decimal256, ContractError> {
    let one = Decimal256::one();
    if base.is_zero() {
        return Err(ContractError::MathDomain {
            reason: "power of zero base".to_string(),
        });
    }
    if exponent.is_zero() || base == one {
        return Ok(one);
    }
    if exponent == exponent.floor() {
        let n = Uint128::try_from(exponent.to_uint_floor())?.u128();
        if n <= MAX_WHOLE_EXPONENT {
            return pow_whole(base, n as u64);
        }
    }
    if base < one {
        // Stay in the >= 1 domain via the reciprocal.
        let inverted = one.checked_div(base)?;
        let grown = exp(exponent.checked_mul(ln(inverted)?)?)?;
        return Ok(one.checked_div(grown)?);
    }
    exp(exponent.checked_mul(ln(base)?)?)
}
