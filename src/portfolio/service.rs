use std::sync::Arc;
use serde::Serialize;
use tokio::sync::broadcast;
use log::{info, warn};

use crate::auth::{hash_password, verify_password, JwtGenerator};
use crate::error::{AppError, AppResult};
use crate::market::Ticker;
use crate::portfolio::{add_holding, remove_holding, Holding};
use crate::store::{UserRecord, UserStore};

pub const USER_NOT_FOUND: &str = "User not found. Please register.";

/// Published after every successful holdings write so live connections of
/// the same account can swap in the new list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingsChanged {
    pub email: String,
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub holdings: Vec<Holding>,
    pub token: String,
}

pub struct PortfolioService {
    store: Arc<dyn UserStore>,
    jwt_generator: JwtGenerator,
    events: broadcast::Sender<HoldingsChanged>,
}

pub fn require(field: &str) -> AppResult<()> {
    if field.trim().is_empty() {
        return Err(AppError::Validation("Please fill all fields".to_string()));
    }
    Ok(())
}

impl PortfolioService {
    pub fn new(store: Arc<dyn UserStore>, jwt_generator: JwtGenerator, channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity);
        Self {
            store,
            jwt_generator,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HoldingsChanged> {
        self.events.subscribe()
    }

    pub fn user_count(&self) -> usize {
        self.store.user_count()
    }

    pub fn register(&self, email: &str, password: &str) -> AppResult<()> {
        require(email)?;
        require(password)?;

        // Checked before hashing so duplicates stay cheap; the insert below
        // re-checks under the store lock
        if self.store.find_user(email)?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(password)?;
        if !self.store.insert_user(UserRecord::new(email.to_string(), password_hash))? {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        info!("Registered user {}", email);
        Ok(())
    }

    pub fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        require(email)?;
        require(password)?;

        let user = self
            .store
            .find_user(email)?
            .ok_or_else(|| AppError::Auth(USER_NOT_FOUND.to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            warn!("Failed login for {}", email);
            return Err(AppError::Auth("Invalid credentials".to_string()));
        }

        info!("User {} logged in with {} holdings", email, user.holdings.len());
        Ok(LoginOutcome {
            holdings: user.holdings,
            token: self.jwt_generator.issue(email)?,
        })
    }

    pub fn holdings(&self, email: &str) -> AppResult<Vec<Holding>> {
        self.store
            .find_user(email)?
            .map(|user| user.holdings)
            .ok_or_else(|| AppError::Auth(USER_NOT_FOUND.to_string()))
    }

    pub fn add_stock(&self, email: &str, ticker: &str, quantity: u64) -> AppResult<Vec<Holding>> {
        require(ticker)?;
        let ticker: Ticker = ticker.parse()?;
        require(email)?;

        let mut outcome = Ok(());
        let holdings = self
            .store
            .update_holdings(email, &mut |holdings| {
                outcome = add_holding(holdings, ticker, quantity);
                outcome.is_ok()
            })?
            .ok_or_else(|| AppError::Auth(USER_NOT_FOUND.to_string()))?;
        outcome?;

        info!("User {} bought {} {}", email, quantity, ticker);
        self.publish(email, &holdings);
        Ok(holdings)
    }

    /// Sells the whole position. Unknown or unheld tickers leave the
    /// holdings unchanged.
    pub fn delete_stock(&self, email: &str, ticker: &str) -> AppResult<Vec<Holding>> {
        require(email)?;
        require(ticker)?;
        let ticker = ticker.parse::<Ticker>().ok();

        let mut removed = false;
        let holdings = self
            .store
            .update_holdings(email, &mut |holdings| {
                removed = ticker.map_or(false, |t| remove_holding(holdings, t));
                removed
            })?
            .ok_or_else(|| AppError::Auth(USER_NOT_FOUND.to_string()))?;

        if removed {
            if let Some(ticker) = ticker {
                info!("User {} sold all {}", email, ticker);
            }
            self.publish(email, &holdings);
        }
        Ok(holdings)
    }

    fn publish(&self, email: &str, holdings: &[Holding]) {
        // No live connections is the common case, not a failure
        let _ = self.events.send(HoldingsChanged {
            email: email.to_string(),
            holdings: holdings.to_vec(),
        });
    }
}
