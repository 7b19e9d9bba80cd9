use std::mem;
use std::sync::Arc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::market::{PriceSnapshot, Ticker};
use crate::portfolio::Holding;

/// Price movement of one ticker between the two latest snapshots.
/// Unchanged prices count as `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn between(previous: Decimal, current: Decimal) -> Self {
        if current >= previous {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    pub ticker: Ticker,
    pub quantity: u64,
    pub price: Decimal,
    pub value: Decimal,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub holdings: Vec<HoldingRow>,
    pub total_value: Decimal,
    pub holding_count: usize,
}

/// Round half away from zero and pin the scale so amounts always render
/// with two fractional digits.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Per-connection valuation state: the holdings list plus the rolling
/// `previous`/`current` snapshot pair.
#[derive(Debug, Clone)]
pub struct PortfolioView {
    holdings: Vec<Holding>,
    previous: Arc<PriceSnapshot>,
    current: Arc<PriceSnapshot>,
}

impl PortfolioView {
    pub fn new(holdings: Vec<Holding>) -> Self {
        let empty = Arc::new(PriceSnapshot::new());
        Self {
            holdings,
            previous: empty.clone(),
            current: empty,
        }
    }

    /// Rotate the pair (old `current` becomes `previous`) and revalue.
    pub fn apply_snapshot(&mut self, snapshot: Arc<PriceSnapshot>) -> Valuation {
        self.previous = mem::replace(&mut self.current, snapshot);
        self.valuation()
    }

    /// Swap in a new holdings list without touching the snapshot pair.
    pub fn replace_holdings(&mut self, holdings: Vec<Holding>) -> Valuation {
        self.holdings = holdings;
        self.valuation()
    }

    pub fn direction(&self, ticker: Ticker) -> Direction {
        Direction::between(self.previous.price(ticker), self.current.price(ticker))
    }

    pub fn valuation(&self) -> Valuation {
        let rows: Vec<HoldingRow> = self
            .holdings
            .iter()
            .map(|holding| {
                let price = self.current.price(holding.ticker);
                HoldingRow {
                    ticker: holding.ticker,
                    quantity: holding.quantity,
                    price: round_money(price),
                    value: round_money(price * Decimal::from(holding.quantity)),
                    direction: self.direction(holding.ticker),
                }
            })
            .collect();

        // Sum unrounded products, round once at the end
        let total: Decimal = self
            .holdings
            .iter()
            .map(|h| self.current.price(h.ticker) * Decimal::from(h.quantity))
            .sum();

        Valuation {
            holding_count: rows.len(),
            holdings: rows,
            total_value: round_money(total),
        }
    }
}
