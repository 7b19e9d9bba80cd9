use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use log::{info, warn};

use crate::portfolio::Holding;
use crate::store::{StoreError, UserRecord, UserStore};

/// JSON document store: the whole user collection lives in memory and is
/// rewritten to disk after every change.
pub struct JsonFileStore {
    path: PathBuf,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let users = if path.exists() {
            let contents = fs::read(&path)?;
            let records: Vec<UserRecord> = serde_json::from_slice(&contents)?;
            info!("Loaded {} users from {}", records.len(), path.display());
            records.into_iter().map(|r| (r.email.clone(), r)).collect()
        } else {
            warn!("Store file {} not found, starting with an empty store", path.display());
            HashMap::new()
        };

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    // Called with the lock held so writes land in mutation order
    fn persist(&self, users: &HashMap<String, UserRecord>) -> Result<(), StoreError> {
        let mut records: Vec<&UserRecord> = users.values().collect();
        records.sort_by(|a, b| a.email.cmp(&b.email));

        let json = serde_json::to_vec_pretty(&records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl UserStore for JsonFileStore {
    fn insert_user(&self, record: UserRecord) -> Result<bool, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::LockPoisoned)?;
        if users.contains_key(&record.email) {
            return Ok(false);
        }
        let email = record.email.clone();
        users.insert(email.clone(), record);

        if let Err(e) = self.persist(&users) {
            users.remove(&email);
            return Err(e);
        }
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
        let Some(user) = users.get_mut(email) else {
            return Ok(None);
        };

        let original = user.holdings.clone();
        if !mutate(&mut user.holdings) {
            return Ok(Some(original));
        }
        let updated = user.holdings.clone();

        if let Err(e) = self.persist(&users) {
            if let Some(user) = users.get_mut(email) {
                user.holdings = original;
            }
            return Err(e);
        }
        Ok(Some(updated))
    }

    fn user_count(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }
}
