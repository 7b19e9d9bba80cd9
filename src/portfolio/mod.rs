pub mod holding;
pub mod service;
pub mod view;

pub use holding::{add_holding, remove_holding, Holding};
pub use service::{require, HoldingsChanged, PortfolioService};
pub use view::{PortfolioView, Valuation};
