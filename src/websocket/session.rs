use std::sync::Arc;
use log::error;

use crate::market::PriceSnapshot;
use crate::portfolio::{Holding, HoldingsChanged, PortfolioView};
use crate::websocket::events::ServerEvent;

/// State owned by one WebSocket connection. Anonymous connections only
/// relay prices; authenticated ones also carry a portfolio view.
pub struct ClientSession {
    email: Option<String>,
    view: Option<PortfolioView>,
}

impl ClientSession {
    pub fn anonymous() -> Self {
        Self { email: None, view: None }
    }

    pub fn authenticated(email: String, holdings: Vec<Holding>) -> Self {
        Self {
            email: Some(email),
            view: Some(PortfolioView::new(holdings)),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Frames to send for one price tick, in order: the raw prices, then the
    /// revalued portfolio.
    pub fn on_snapshot(&mut self, snapshot: Arc<PriceSnapshot>) -> Vec<String> {
        let mut frames = Vec::with_capacity(2);
        push_frame(&mut frames, &ServerEvent::StockUpdate(&*snapshot));

        if let Some(view) = self.view.as_mut() {
            let valuation = view.apply_snapshot(snapshot);
            push_frame(&mut frames, &ServerEvent::PortfolioUpdate(&valuation));
        }
        frames
    }

    /// Revalue when this account's holdings changed elsewhere; events for
    /// other accounts are ignored.
    pub fn on_holdings_changed(&mut self, event: &HoldingsChanged) -> Option<String> {
        if self.email.as_deref() != Some(event.email.as_str()) {
            return None;
        }
        let view = self.view.as_mut()?;
        let valuation = view.replace_holdings(event.holdings.clone());

        match ServerEvent::PortfolioUpdate(&valuation).to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Failed to serialize server event: {}", e);
                None
            }
        }
    }
}

fn push_frame(frames: &mut Vec<String>, event: &ServerEvent<'_>) {
    match event.to_json() {
        Ok(json) => frames.push(json),
        Err(e) => error!("Failed to serialize server event: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::market::Ticker;

    fn snapshot(price: rust_decimal::Decimal) -> Arc<PriceSnapshot> {
        Arc::new(PriceSnapshot::from_prices([(Ticker::Aapl, price)]))
    }

    fn parse(frame: &str) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn test_anonymous_session_relays_prices_only() {
        let mut session = ClientSession::anonymous();
        let frames = session.on_snapshot(snapshot(dec!(500.00)));
        assert_eq!(frames.len(), 1);
        assert_eq!(parse(&frames[0])["event"], "stockUpdate");

        let event = HoldingsChanged { email: "a@b.c".into(), holdings: Vec::new() };
        assert!(session.on_holdings_changed(&event).is_none());
    }

    #[test]
    fn test_authenticated_session_tracks_direction() {
        let mut session = ClientSession::authenticated("a@b.c".into(), vec![Holding::new(Ticker::Aapl, 2)]);

        let frames = session.on_snapshot(snapshot(dec!(500.00)));
        assert_eq!(frames.len(), 2);
        let update = parse(&frames[1]);
        assert_eq!(update["event"], "portfolioUpdate");
        assert_eq!(update["data"]["total_value"], "1000.00");

        let frames = session.on_snapshot(snapshot(dec!(500.00)));
        assert_eq!(parse(&frames[1])["data"]["holdings"][0]["direction"], "up");

        let frames = session.on_snapshot(snapshot(dec!(499.99)));
        assert_eq!(parse(&frames[1])["data"]["holdings"][0]["direction"], "down");
    }

    #[test]
    fn test_holdings_change_for_own_account_only() {
        let mut session = ClientSession::authenticated("a@b.c".into(), Vec::new());
        session.on_snapshot(snapshot(dec!(100.00)));

        let other = HoldingsChanged {
            email: "x@y.z".into(),
            holdings: vec![Holding::new(Ticker::Aapl, 9)],
        };
        assert!(session.on_holdings_changed(&other).is_none());

        let own = HoldingsChanged {
            email: "a@b.c".into(),
            holdings: vec![Holding::new(Ticker::Aapl, 3)],
        };
        let frame = parse(&session.on_holdings_changed(&own).unwrap());
        assert_eq!(frame["data"]["total_value"], "300.00");
        assert_eq!(frame["data"]["holding_count"], 1);
    }

    #[test]
    fn test_sessions_do_not_share_snapshot_history() {
        let mut early = ClientSession::authenticated("a@b.c".into(), vec![Holding::new(Ticker::Aapl, 1)]);
        let mut late = ClientSession::authenticated("a@b.c".into(), vec![Holding::new(Ticker::Aapl, 1)]);

        early.on_snapshot(snapshot(dec!(900.00)));
        let early_frames = early.on_snapshot(snapshot(dec!(200.00)));
        let late_frames = late.on_snapshot(snapshot(dec!(200.00)));

        assert_eq!(parse(&early_frames[1])["data"]["holdings"][0]["direction"], "down");
        // First tick for this connection compares against zero
        assert_eq!(parse(&late_frames[1])["data"]["holdings"][0]["direction"], "up");
    }
}
