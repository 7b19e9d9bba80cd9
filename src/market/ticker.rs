use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// Supported instruments, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ticker {
    Goog,
    Tsla,
    Amzn,
    Meta,
    Nvda,
    Msft,
    Aapl,
}

pub const SUPPORTED_TICKERS: [Ticker; 7] = [
    Ticker::Goog,
    Ticker::Tsla,
    Ticker::Amzn,
    Ticker::Meta,
    Ticker::Nvda,
    Ticker::Msft,
    Ticker::Aapl,
];

impl Ticker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ticker::Goog => "GOOG",
            Ticker::Tsla => "TSLA",
            Ticker::Amzn => "AMZN",
            Ticker::Meta => "META",
            Ticker::Nvda => "NVDA",
            Ticker::Msft => "MSFT",
            Ticker::Aapl => "AAPL",
        }
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ticker {
    type Err = AppError;

    /// Exact, case-sensitive match against the supported set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUPPORTED_TICKERS
            .iter()
            .copied()
            .find(|ticker| ticker.as_str() == s)
            .ok_or_else(|| AppError::Validation("Invalid Stock".to_string()))
    }
}
