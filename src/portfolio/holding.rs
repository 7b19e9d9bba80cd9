use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::market::Ticker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: Ticker,
    pub quantity: u64,
}

impl Holding {
    pub fn new(ticker: Ticker, quantity: u64) -> Self {
        Self { ticker, quantity }
    }
}

/// Buy `quantity` of `ticker`: bumps the existing position or appends a new
/// one, so a portfolio never holds two entries for the same ticker.
pub fn add_holding(holdings: &mut Vec<Holding>, ticker: Ticker, quantity: u64) -> Result<(), AppError> {
    if quantity == 0 {
        return Err(AppError::Validation("Quantity must be a positive integer".to_string()));
    }

    match holdings.iter_mut().find(|h| h.ticker == ticker) {
        Some(existing) => {
            existing.quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| AppError::Validation("Quantity too large".to_string()))?;
        }
        None => holdings.push(Holding::new(ticker, quantity)),
    }
    Ok(())
}

/// Sell the whole position. Returns whether anything was removed; selling a
/// ticker that is not held leaves the list untouched.
pub fn remove_holding(holdings: &mut Vec<Holding>, ticker: Ticker) -> bool {
    let before = holdings.len();
    holdings.retain(|h| h.ticker != ticker);
    holdings.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_additive() {
        let mut holdings = Vec::new();
        add_holding(&mut holdings, Ticker::Tsla, 4).unwrap();
        add_holding(&mut holdings, Ticker::Tsla, 6).unwrap();
        assert_eq!(holdings, vec![Holding::new(Ticker::Tsla, 10)]);
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let mut holdings = Vec::new();
        add_holding(&mut holdings, Ticker::Msft, 1).unwrap();
        add_holding(&mut holdings, Ticker::Goog, 2).unwrap();
        add_holding(&mut holdings, Ticker::Msft, 1).unwrap();
        assert_eq!(
            holdings,
            vec![Holding::new(Ticker::Msft, 2), Holding::new(Ticker::Goog, 2)]
        );
    }

    #[test]
    fn test_add_rejects_zero_quantity() {
        let mut holdings = vec![Holding::new(Ticker::Aapl, 1)];
        assert!(add_holding(&mut holdings, Ticker::Aapl, 0).is_err());
        assert_eq!(holdings, vec![Holding::new(Ticker::Aapl, 1)]);
    }

    #[test]
    fn test_add_overflow_is_rejected() {
        let mut holdings = vec![Holding::new(Ticker::Aapl, u64::MAX)];
        assert!(add_holding(&mut holdings, Ticker::Aapl, 1).is_err());
        assert_eq!(holdings[0].quantity, u64::MAX);
    }

    #[test]
    fn test_remove_absent_ticker_is_noop() {
        let mut holdings = vec![Holding::new(Ticker::Nvda, 3)];
        assert!(!remove_holding(&mut holdings, Ticker::Meta));
        assert_eq!(holdings, vec![Holding::new(Ticker::Nvda, 3)]);
    }

    #[test]
    fn test_buy_buy_sell_scenario() {
        let mut holdings = Vec::new();
        add_holding(&mut holdings, Ticker::Aapl, 3).unwrap();
        assert_eq!(holdings, vec![Holding::new(Ticker::Aapl, 3)]);
        add_holding(&mut holdings, Ticker::Aapl, 2).unwrap();
        assert_eq!(holdings, vec![Holding::new(Ticker::Aapl, 5)]);
        assert!(remove_holding(&mut holdings, Ticker::Aapl));
        assert!(holdings.is_empty());
    }
}
