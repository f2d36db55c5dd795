//! Currency conversion.
//!
//! The engine is agnostic to where exchange rates come from. A [`RateSource`]
//! hands back the latest quote for a pair or fails; the converter applies it
//! and rounds to the target currency's minor units. Conversion never writes
//! anything, so a failed rate lookup can never leave a half-converted account.

use crate::types::{Amount, Currency};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How long an HTTP rate lookup may take before it is abandoned. Conversions
/// run outside any account lock, but a caller is still waiting.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("rate source unreachable: {0}")]
    Network(String),
    #[error("rate source returned a bad response: {0}")]
    BadResponse(String),
    #[error("no quote for {from}/{to}")]
    UnquotedPair { from: Currency, to: Currency },
}

/// A live exchange-rate lookup. Every call fetches fresh; the converter
/// assumes no caching or staleness contract.
pub trait RateSource: Send + Sync {
    /// Source name, for logging.
    fn name(&self) -> &str;

    /// Units of `to` per one unit of `from`.
    fn fetch_rate(&self, from: Currency, to: Currency) -> Result<Decimal, RateError>;
}

/// In-memory rate table for tests and the simulator.
#[derive(Debug, Default)]
pub struct FixedRateSource {
    rates: RwLock<HashMap<(Currency, Currency), Decimal>>,
}

impl FixedRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote one direction of a pair.
    pub fn with_rate(self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.set_rate(from, to, rate);
        self
    }

    /// Quote both directions of a pair, the reverse as the reciprocal.
    pub fn with_pair(self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.set_rate(from, to, rate);
        self.set_rate(to, from, Decimal::ONE / rate);
        self
    }

    pub fn set_rate(&self, from: Currency, to: Currency, rate: Decimal) {
        debug_assert!(rate > Decimal::ZERO);
        self.rates.write().insert((from, to), rate);
    }

    /// Drop every quote, making all lookups fail.
    pub fn clear(&self) {
        self.rates.write().clear();
    }
}

impl RateSource for FixedRateSource {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch_rate(&self, from: Currency, to: Currency) -> Result<Decimal, RateError> {
        self.rates
            .read()
            .get(&(from, to))
            .copied()
            .ok_or(RateError::UnquotedPair { from, to })
    }
}

#[derive(Debug, Deserialize)]
struct LatestRates {
    rates: HashMap<String, Decimal>,
}

/// REST rate source speaking the frankfurter.app response shape:
/// `GET {base}/latest?base=EUR&symbols=USD` returning `{"rates":{"USD":1.08}}`.
pub struct HttpRateSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_rate(&self, from: Currency, to: Currency) -> Result<Decimal, RateError> {
        let url = format!(
            "{}/latest?base={}&symbols={}",
            self.base_url,
            from.code(),
            to.code()
        );
        debug!(%from, %to, %url, "fetching exchange rate");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| RateError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::BadResponse(format!(
                "status {}",
                response.status()
            )));
        }
        let body: LatestRates = response
            .json()
            .map_err(|e| RateError::BadResponse(e.to_string()))?;

        let rate = body
            .rates
            .get(to.code())
            .copied()
            .ok_or(RateError::UnquotedPair { from, to })?;
        if rate <= Decimal::ZERO {
            return Err(RateError::BadResponse(format!(
                "non-positive rate {rate} for {from}/{to}"
            )));
        }
        Ok(rate)
    }
}

/// Converts amounts between currencies via a pluggable [`RateSource`].
pub struct CurrencyConverter {
    source: Arc<dyn RateSource>,
}

impl CurrencyConverter {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    /// Latest rate for a pair. Same-currency quotes are `1` and skip the
    /// source entirely, so they cannot fail.
    pub fn quote(&self, from: Currency, to: Currency) -> Result<Decimal, RateError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        debug!(source = self.source.name(), %from, %to, "quoting pair");
        self.source.fetch_rate(from, to)
    }

    /// Convert `amount` from one currency to another, rounded to the target
    /// currency's minor units.
    pub fn convert(&self, amount: Amount, from: Currency, to: Currency) -> Result<Amount, RateError> {
        if from == to {
            return Ok(amount);
        }
        let rate = self.quote(from, to)?;
        Ok(Self::apply_rate(amount, rate, to))
    }

    /// Apply an already-fetched rate. Split out so a caller can fetch the
    /// quote before taking a lock and do the arithmetic inside it.
    pub fn apply_rate(amount: Amount, rate: Decimal, to: Currency) -> Amount {
        amount.mul(rate).round_minor(to.minor_units())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct FailingSource;

    impl RateSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn fetch_rate(&self, _from: Currency, _to: Currency) -> Result<Decimal, RateError> {
            Err(RateError::Network("connection refused".into()))
        }
    }

    #[test]
    fn fixed_source_quotes_registered_pairs_only() {
        let source = FixedRateSource::new().with_rate(Currency::Usd, Currency::Eur, dec!(0.92));
        assert_eq!(
            source.fetch_rate(Currency::Usd, Currency::Eur),
            Ok(dec!(0.92))
        );
        assert_eq!(
            source.fetch_rate(Currency::Eur, Currency::Usd),
            Err(RateError::UnquotedPair {
                from: Currency::Eur,
                to: Currency::Usd,
            })
        );
    }

    #[test]
    fn with_pair_registers_the_reciprocal() {
        let source = FixedRateSource::new().with_pair(Currency::Usd, Currency::Eur, dec!(0.8));
        assert_eq!(
            source.fetch_rate(Currency::Eur, Currency::Usd),
            Ok(dec!(1.25))
        );
    }

    #[test]
    #[should_panic]
    fn fixture_rates_must_be_positive() {
        FixedRateSource::new().with_pair(Currency::Usd, Currency::Eur, dec!(0));
    }

    #[test]
    fn convert_multiplies_and_rounds_to_minor_units() {
        let source = FixedRateSource::new().with_rate(Currency::Usd, Currency::Eur, dec!(0.9137));
        let converter = CurrencyConverter::new(Arc::new(source));
        // 100.55 * 0.9137 = 91.872535, rounds to 91.87
        let converted = converter
            .convert(Amount::new(dec!(100.55)), Currency::Usd, Currency::Eur)
            .unwrap();
        assert_eq!(converted, Amount::new(dec!(91.87)));
    }

    #[test]
    fn same_currency_skips_the_source() {
        let converter = CurrencyConverter::new(Arc::new(FailingSource));
        let amount = Amount::new(dec!(42.42));
        assert_eq!(
            converter
                .convert(amount, Currency::Gbp, Currency::Gbp)
                .unwrap(),
            amount
        );
        assert_eq!(converter.quote(Currency::Gbp, Currency::Gbp), Ok(Decimal::ONE));
    }

    #[test]
    fn negative_balances_convert_with_their_sign() {
        let source = FixedRateSource::new().with_rate(Currency::Usd, Currency::Eur, dec!(0.5));
        let converter = CurrencyConverter::new(Arc::new(source));
        let converted = converter
            .convert(Amount::new(dec!(-30)), Currency::Usd, Currency::Eur)
            .unwrap();
        assert_eq!(converted, Amount::new(dec!(-15.00)));
    }

    #[test]
    fn source_failure_surfaces_as_rate_error() {
        let converter = CurrencyConverter::new(Arc::new(FailingSource));
        let err = converter
            .convert(Amount::new(dec!(10)), Currency::Usd, Currency::Eur)
            .unwrap_err();
        assert!(matches!(err, RateError::Network(_)));
    }
}
