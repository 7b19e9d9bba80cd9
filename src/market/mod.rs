pub mod feed;
pub mod snapshot;
pub mod ticker;

pub use feed::PriceFeed;
pub use snapshot::PriceSnapshot;
pub use ticker::{Ticker, SUPPORTED_TICKERS};
