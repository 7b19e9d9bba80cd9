use std::sync::{Arc, Mutex};
use std::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use log::{debug, info};

use crate::market::{PriceSnapshot, Ticker, SUPPORTED_TICKERS};

// Price range in cents, inclusive on both ends
pub const MIN_PRICE_CENTS: i64 = 10_000;
pub const MAX_PRICE_CENTS: i64 = 100_000;

#[derive(Debug, Clone)]
pub struct PriceBounds {
    pub min_cents: i64,
    pub max_cents: i64,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min_cents: MIN_PRICE_CENTS,
            max_cents: MAX_PRICE_CENTS,
        }
    }
}

/// Synthetic price source for the fixed ticker set.
///
/// Cloning is cheap and every clone shares the same "latest snapshot" slot,
/// so the HTTP layer can read what the broadcast task last produced.
#[derive(Clone)]
pub struct PriceFeed {
    tickers: Arc<Vec<Ticker>>,
    bounds: PriceBounds,
    latest: Arc<Mutex<Option<Arc<PriceSnapshot>>>>,
}

impl PriceFeed {
    pub fn new(bounds: PriceBounds) -> Self {
        Self {
            tickers: Arc::new(SUPPORTED_TICKERS.to_vec()),
            bounds,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Draw one price per ticker, uniformly over whole cents.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> PriceSnapshot {
        PriceSnapshot::from_prices(self.tickers.iter().map(|ticker| {
            let cents = rng.gen_range(self.bounds.min_cents..=self.bounds.max_cents);
            (*ticker, Decimal::new(cents, 2))
        }))
    }

    pub fn latest(&self) -> Option<Arc<PriceSnapshot>> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    /// Generate a snapshot, remember it and fan it out. Returns the number
    /// of receivers it reached; zero subscribers is not an error.
    pub fn tick<R: Rng>(
        &self,
        rng: &mut R,
        tx: &broadcast::Sender<Arc<PriceSnapshot>>,
    ) -> usize {
        let snapshot = Arc::new(self.generate(rng));

        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(snapshot.clone());
        }

        match tx.send(snapshot) {
            Ok(subscriber_count) => {
                debug!("Broadcasted price snapshot to {} subscribers", subscriber_count);
                subscriber_count
            }
            Err(_) => {
                debug!("No active subscribers, price snapshot discarded");
                0
            }
        }
    }

    /// Run the feed for the lifetime of the process.
    pub fn spawn(
        self,
        tx: broadcast::Sender<Arc<PriceSnapshot>>,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval_timer = interval(period);
            let mut rng = StdRng::from_entropy();

            info!("Price feed started for {} tickers every {:?}", self.tickers.len(), period);

            loop {
                interval_timer.tick().await;
                self.tick(&mut rng, &tx);
            }
        })
    }
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new(PriceBounds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_covers_supported_set_within_bounds() {
        let feed = PriceFeed::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let snapshot = feed.generate(&mut rng);

            // A missing ticker would price at zero and fail the range check
            for ticker in SUPPORTED_TICKERS {
                let price = snapshot.price(ticker);
                assert!(price >= dec!(100.00) && price <= dec!(1000.00), "{} out of range", price);
                assert_eq!(price.scale(), 2);
            }
        }
    }

    #[test]
    fn test_degenerate_bounds_yield_fixed_price() {
        let feed = PriceFeed::new(PriceBounds { min_cents: 50_000, max_cents: 50_000 });
        let snapshot = feed.generate(&mut StdRng::seed_from_u64(1));
        assert_eq!(snapshot.price(Ticker::Aapl).to_string(), "500.00");
    }

    #[test]
    fn test_tick_without_subscribers_still_updates_latest() {
        let feed = PriceFeed::default();
        let (tx, rx) = broadcast::channel(4);
        drop(rx);

        assert!(feed.latest().is_none());
        let reached = feed.tick(&mut StdRng::seed_from_u64(3), &tx);
        assert_eq!(reached, 0);
        let latest = feed.latest().unwrap();
        assert!(SUPPORTED_TICKERS.iter().all(|ticker| latest.price(*ticker) >= dec!(100.00)));
    }

    #[tokio::test]
    async fn test_tick_fans_out_to_every_subscriber() {
        let feed = PriceFeed::default();
        let (tx, mut rx1) = broadcast::channel(4);
        let mut rx2 = tx.subscribe();

        let reached = feed.tick(&mut StdRng::seed_from_u64(11), &tx);
        assert_eq!(reached, 2);

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(Some(a), feed.latest());
    }
}
