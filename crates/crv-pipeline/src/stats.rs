//! Binomial proportion statistics.
//!
//! Wilson score interval for `k/n`, robust near proportions of 0 and 1,
//! matching the `statsmodels` `proportion_confint(method="wilson")`
//! convention used to define the inefficiency uncertainties.

use crv_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Default confidence level for inefficiency uncertainties.
pub const DEFAULT_CONF_LEVEL: f64 = 0.95;

#[inline]
fn standard_normal() -> Normal {
    // Safe by construction for mean=0, sigma=1.
    Normal::new(0.0, 1.0).expect("standard normal should be constructible")
}

/// Wilson score confidence interval for the proportion `k / n`.
///
/// Errors if `k` or `n` is negative or non-finite, if `k > n`, if
/// `n == 0`, or if `conf_level` is outside `(0, 1)`.
pub fn wilson_interval(k: f64, n: f64, conf_level: f64) -> Result<(f64, f64)> {
    if !(k.is_finite() && n.is_finite()) || k < 0.0 || n < 0.0 || k > n {
        return Err(Error::Validation(format!(
            "invalid Wilson interval inputs: k={k}, n={n}"
        )));
    }
    if n == 0.0 {
        return Err(Error::Validation("Wilson interval requires n > 0".into()));
    }
    if !(conf_level.is_finite() && conf_level > 0.0 && conf_level < 1.0) {
        return Err(Error::Validation(format!(
            "conf_level must be in (0,1), got {conf_level}"
        )));
    }

    let alpha = 1.0 - conf_level;
    let z = standard_normal().inverse_cdf(1.0 - alpha / 2.0);
    let p = k / n;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let half = (z / denom) * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
    Ok((center - half, center + half))
}
