use std::collections::BTreeMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Ticker;

/// One broadcast instant's prices, keyed by ticker.
///
/// Feed-generated snapshots cover every supported ticker. Snapshots built by
/// hand (or decoded from a client) may be partial; lookups of a missing
/// ticker price at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot {
    prices: BTreeMap<Ticker, Decimal>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_prices<I>(prices: I) -> Self
    where
        I: IntoIterator<Item = (Ticker, Decimal)>,
    {
        Self {
            prices: prices.into_iter().collect(),
        }
    }

    pub fn price(&self, ticker: Ticker) -> Decimal {
        self.prices.get(&ticker).copied().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_ticker_prices_at_zero() {
        let snapshot = PriceSnapshot::from_prices([(Ticker::Aapl, dec!(500.00))]);
        assert_eq!(snapshot.price(Ticker::Aapl), dec!(500.00));
        assert_eq!(snapshot.price(Ticker::Tsla), Decimal::ZERO);
    }

    #[test]
    fn test_wire_format_is_string_prices() {
        let snapshot = PriceSnapshot::from_prices([
            (Ticker::Aapl, dec!(500.00)),
            (Ticker::Goog, dec!(123.40)),
        ]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json, serde_json::json!({"GOOG": "123.40", "AAPL": "500.00"}));

        let decoded: PriceSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
