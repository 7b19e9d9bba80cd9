pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::portfolio::Holding;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

impl UserRecord {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            email,
            password_hash,
            holdings: Vec::new(),
        }
    }
}

/// Document store keyed by email.
///
/// `update_holdings` is a single read-modify-write under the store's lock:
/// `mutate` sees the stored list and returns whether it changed anything,
/// so no-op mutations skip the write.
pub trait UserStore: Send + Sync {
    /// Returns `false` without writing when the email is already taken.
    fn insert_user(&self, record: UserRecord) -> Result<bool, StoreError>;

    fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Returns the resulting holdings, or `None` for an unknown email.
    fn update_holdings(
        &self,
        email: &str,
        mutate: &mut dyn FnMut(&mut Vec<Holding>) -> bool,
    ) -> Result<Option<Vec<Holding>>, StoreError>;

    fn user_count(&self) -> usize;
}
