use serde::Serialize;

use crate::market::PriceSnapshot;
use crate::portfolio::Valuation;

/// Server -> client text frames: `{"event": "...", "data": ...}`.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent<'a> {
    StockUpdate(&'a PriceSnapshot),
    PortfolioUpdate(&'a Valuation),
}

impl ServerEvent<'_> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::market::Ticker;

    #[test]
    fn test_stock_update_frame() {
        let snapshot = PriceSnapshot::from_prices([(Ticker::Aapl, dec!(500.00))]);
        let frame: serde_json::Value =
            serde_json::from_str(&ServerEvent::StockUpdate(&snapshot).to_json().unwrap()).unwrap();
        assert_eq!(frame, serde_json::json!({"event": "stockUpdate", "data": {"AAPL": "500.00"}}));
    }

    #[test]
    fn test_portfolio_update_frame() {
        let valuation = Valuation {
            holdings: Vec::new(),
            total_value: dec!(0.00),
            holding_count: 0,
        };
        let frame: serde_json::Value =
            serde_json::from_str(&ServerEvent::PortfolioUpdate(&valuation).to_json().unwrap()).unwrap();
        assert_eq!(frame["event"], "portfolioUpdate");
        assert_eq!(frame["data"]["total_value"], "0.00");
    }
}
