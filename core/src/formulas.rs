//! Single-step commission formulas outside the hierarchical split.

use crate::config::SplitConfig;

/// Commission for a subsequent policy year.
pub fn renewal_commission(first_year_commission: f64, renewal_rate: f64) -> f64 {
    first_year_commission * renewal_rate
}

/// Ongoing annuity commission on account value.
pub fn trail_commission(account_value: f64, trail_rate: f64) -> f64 {
    account_value * trail_rate
}

/// `renewal_commission` at the configured rate.
pub fn configured_renewal(config: &SplitConfig, first_year_commission: f64) -> f64 {
    renewal_commission(first_year_commission, config.renewal_rate)
}

/// `trail_commission` at the configured rate.
pub fn configured_trail(config: &SplitConfig, account_value: f64) -> f64 {
    trail_commission(account_value, config.trail_rate)
}
