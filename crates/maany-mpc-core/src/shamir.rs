//! Shamir secret sharing over the secp256k1 scalar field
//!
//! A degree t−1 polynomial with the secret as constant term is evaluated at
//! x = 1..=n; any t evaluations recover the secret by Lagrange
//! interpolation at zero, fewer reveal nothing.

use k256::elliptic_curve::Field;
use k256::Scalar;

use crate::context::Context;
use crate::error::{Error, Result};

/// One polynomial evaluation; `index` is the x-coordinate (never zero)
#[derive(Debug, Clone)]
pub struct Share {
    pub index: u16,
    pub value: Scalar,
}

/// Split `secret` into `count` shares, any `threshold` of which recover it
pub fn split(
    ctx: &Context,
    secret: &Scalar,
    threshold: u16,
    count: u16,
) -> Result<Vec<Share>> {
    if threshold == 0 || count == 0 {
        return Err(Error::InvalidArgument(
            "threshold and share count must be positive".into(),
        ));
    }
    if threshold > count {
        return Err(Error::InvalidArgument(format!(
            "threshold {threshold} exceeds share count {count}"
        )));
    }

    // coefficients a0 = secret, a1..a_{t-1} random
    let mut coefficients = Vec::with_capacity(threshold as usize);
    coefficients.push(*secret);
    for _ in 1..threshold {
        coefficients.push(ctx.random_scalar()?);
    }

    let shares = (1..=count)
        .map(|index| Share {
            index,
            value: evaluate(&coefficients, index),
        })
        .collect();
    Ok(shares)
}

/// Horner evaluation at x = index
fn evaluate(coefficients: &[Scalar], index: u16) -> Scalar {
    let x = Scalar::from(index as u64);
    let mut acc = Scalar::ZERO;
    for coefficient in coefficients.iter().rev() {
        acc = acc * x + coefficient;
    }
    acc
}

/// Recover the secret from exactly the shares given
pub fn reconstruct(shares: &[Share]) -> Result<Scalar> {
    if shares.is_empty() {
        return Err(Error::InvalidArgument("no shares provided".into()));
    }
    for share in shares {
        if share.index == 0 {
            return Err(Error::InvalidArgument("share index zero".into()));
        }
    }

    let mut secret = Scalar::ZERO;
    for (j, share_j) in shares.iter().enumerate() {
        let x_j = Scalar::from(share_j.index as u64);
        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (m, share_m) in shares.iter().enumerate() {
            if m == j {
                continue;
            }
            let x_m = Scalar::from(share_m.index as u64);
            numerator *= x_m;
            denominator *= x_m - x_j;
        }
        let denominator_inv = Option::<Scalar>::from(denominator.invert())
            .ok_or_else(|| Error::InvalidArgument("duplicate share index".into()))?;
        secret += share_j.value * numerator * denominator_inv;
    }
    Ok(secret)
}
