//! Fiat → crypto price conversion
//!
//! Fixed-rate table with exact decimal division; stablecoins peg 1:1. The
//! non-fixed mode would require a rate oracle and is rejected at construction
//! time until one exists.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use parley_types::CryptoCurrency;

use crate::error::ChainError;

/// Recognized converter options.
#[derive(Debug, Clone)]
pub struct RateOptions {
    pub use_fixed_rates: bool,
    /// USD per one unit of the native currency.
    pub usd_per_native: f64,
    /// USD per one unit of the stablecoin; 1.0 unless depegged on purpose.
    pub usd_per_stable: f64,
}

impl Default for RateOptions {
    fn default() -> Self {
        Self {
            use_fixed_rates: true,
            usd_per_native: 100.0,
            usd_per_stable: 1.0,
        }
    }
}

#[derive(Debug)]
pub struct PriceConverter {
    usd_per_native: Decimal,
    usd_per_stable: Decimal,
}

impl PriceConverter {
    pub fn new(options: RateOptions) -> Result<Self, ChainError> {
        if !options.use_fixed_rates {
            return Err(ChainError::Config(
                "use_fixed_rates=false is unsupported: no rate oracle is wired".to_string(),
            ));
        }

        let usd_per_native = decimal_rate(options.usd_per_native, "usd_per_native")?;
        let usd_per_stable = decimal_rate(options.usd_per_stable, "usd_per_stable")?;

        Ok(Self {
            usd_per_native,
            usd_per_stable,
        })
    }

    /// Convert a USD amount into the settlement currency.
    pub fn convert(&self, usd_amount: f64, currency: CryptoCurrency) -> Result<f64, ChainError> {
        let usd = Decimal::from_f64_retain(usd_amount)
            .ok_or_else(|| ChainError::Config(format!("non-finite amount {usd_amount}")))?;

        let rate = match currency {
            CryptoCurrency::SOL => self.usd_per_native,
            CryptoCurrency::USDC => self.usd_per_stable,
        };

        let amount = usd / rate;
        amount
            .to_f64()
            .ok_or_else(|| ChainError::Config("conversion overflow".to_string()))
    }
}

fn decimal_rate(value: f64, name: &str) -> Result<Decimal, ChainError> {
    let rate = Decimal::from_f64_retain(value)
        .ok_or_else(|| ChainError::Config(format!("{name} is not a finite number")))?;
    if rate <= Decimal::ZERO {
        return Err(ChainError::Config(format!("{name} must be positive")));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_usd_to_native() {
        let converter = PriceConverter::new(RateOptions::default()).unwrap();
        let sol = converter.convert(160.0, CryptoCurrency::SOL).unwrap();
        assert!((sol - 1.6).abs() < 1e-12);
    }

    #[test]
    fn stablecoin_is_pegged() {
        let converter = PriceConverter::new(RateOptions::default()).unwrap();
        let usdc = converter.convert(150.0, CryptoCurrency::USDC).unwrap();
        assert!((usdc - 150.0).abs() < 1e-12);
    }

    #[test]
    fn custom_native_rate() {
        let converter = PriceConverter::new(RateOptions {
            usd_per_native: 80.0,
            ..Default::default()
        })
        .unwrap();
        let sol = converter.convert(200.0, CryptoCurrency::SOL).unwrap();
        assert!((sol - 2.5).abs() < 1e-12);
    }

    #[test]
    fn oracle_mode_is_rejected() {
        let err = PriceConverter::new(RateOptions {
            use_fixed_rates: false,
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(PriceConverter::new(RateOptions {
            usd_per_native: 0.0,
            ..Default::default()
        })
        .is_err());
    }
}
