use rust_decimal::prelude::*;

/// Convert a UI amount to atomic units using Decimal to avoid float drift.
///
/// The float is taken at its shortest decimal form (0.3 is 0.3, not
/// 0.2999...), so only digits beyond `decimals` are dropped.
pub fn to_atomic(amount: f64, decimals: u8) -> u64 {
    let amount_dec = Decimal::from_f64(amount).unwrap_or(Decimal::ZERO);
    let multiplier = Decimal::from(10u64.pow(decimals as u32));

    amount_dec
        .checked_mul(multiplier)
        .and_then(|atoms| atoms.round_dp(decimals as u32).trunc().to_u64())
        .unwrap_or(0)
}

/// Convert atomic units back to a UI amount for display/DB
pub fn from_atomic(atoms: u64, decimals: u8) -> f64 {
    let atoms_dec = Decimal::from(atoms);
    let divisor = Decimal::from(10u64.pow(decimals as u32));

    (atoms_dec / divisor).to_f64().unwrap_or(0.0)
}

/// Parse an atomic amount that arrives as a decimal string (RPC and Jupiter both do this)
pub fn parse_atomic(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}
