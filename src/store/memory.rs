use std::collections::HashMap;
use std::sync::Mutex;

use crate::portfolio::Holding;
use crate::store::{StoreError, UserRecord, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryStore {
    fn insert_user(&self, record: UserRecord) -> Result<bool, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::LockPoisoned)?;
        if users.contains_key(&record.email) {
            return Ok(false);
        }
        users.insert(record.email.clone(), record);
        Ok(true)
    }

    fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(users.get(email).cloned())
    }

    fn update_holdings(
        &self,
        email: &str,
        mutate: &mut dyn FnMut(&mut Vec<Holding>) -> bool,
    ) -> Result<Option<Vec<Holding>>, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(users.get_mut(email).map(|user| {
            mutate(&mut user.holdings);
            user.holdings.clone()
        }))
    }

    fn user_count(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }
}
