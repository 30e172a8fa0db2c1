use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use im::Vector;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::StoreError;
use crate::types::{Customer, Session, Transaction, User};

pub const USERS_KEY: &str = "cl_users";
pub const SESSION_KEY: &str = "cl_auth";
pub const CUSTOMERS_KEY: &str = "cl_customers";
pub const TRANSACTIONS_KEY: &str = "cl_transactions";
pub const ONBOARDING_KEY: &str = "cl_onboarding_complete";

pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-record persistence for the ledger. Every save replaces the named record; a
/// record that was never written loads as empty.
pub trait LedgerStore {
    fn load_users(&self) -> StoreResult<Vector<User>>;
    fn save_users(&self, users: &Vector<User>) -> StoreResult<()>;

    fn load_session(&self) -> StoreResult<Option<Session>>;
    fn save_session(&self, session: &Session) -> StoreResult<()>;
    fn clear_session(&self) -> StoreResult<()>;

    fn load_customers(&self) -> StoreResult<Vector<Customer>>;
    fn save_customers(&self, customers: &Vector<Customer>) -> StoreResult<()>;

    fn load_transactions(&self) -> StoreResult<Vector<Transaction>>;
    fn save_transactions(&self, transactions: &Vector<Transaction>) -> StoreResult<()>;

    fn onboarding_complete(&self) -> StoreResult<bool>;
    fn mark_onboarding_complete(&self) -> StoreResult<()>;
}

/// Raw string key-value access. Stores that only need get/set/remove get the typed
/// [`LedgerStore`] for free.
pub trait KeyValue {
    fn get(&self, key: &'static str) -> StoreResult<Option<String>>;
    fn set(&self, key: &'static str, value: String) -> StoreResult<()>;
    fn remove(&self, key: &'static str) -> StoreResult<()>;
}

fn read<T: DeserializeOwned>(kv: &impl KeyValue, key: &'static str) -> StoreResult<Option<T>> {
    match kv.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Serde { key, source }),
        None => Ok(None),
    }
}

fn write<T: Serialize + ?Sized>(kv: &impl KeyValue, key: &'static str, value: &T) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Serde { key, source })?;
    kv.set(key, raw)
}

impl<K: KeyValue> LedgerStore for K {
    fn load_users(&self) -> StoreResult<Vector<User>> {
        Ok(read(self, USERS_KEY)?.unwrap_or_default())
    }

    fn save_users(&self, users: &Vector<User>) -> StoreResult<()> {
        write(self, USERS_KEY, users)
    }

    fn load_session(&self) -> StoreResult<Option<Session>> {
        read(self, SESSION_KEY)
    }

    fn save_session(&self, session: &Session) -> StoreResult<()> {
        write(self, SESSION_KEY, session)
    }

    fn clear_session(&self) -> StoreResult<()> {
        self.remove(SESSION_KEY)
    }

    fn load_customers(&self) -> StoreResult<Vector<Customer>> {
        Ok(read(self, CUSTOMERS_KEY)?.unwrap_or_default())
    }

    fn save_customers(&self, customers: &Vector<Customer>) -> StoreResult<()> {
        write(self, CUSTOMERS_KEY, customers)
    }

    fn load_transactions(&self) -> StoreResult<Vector<Transaction>> {
        Ok(read(self, TRANSACTIONS_KEY)?.unwrap_or_default())
    }

    fn save_transactions(&self, transactions: &Vector<Transaction>) -> StoreResult<()> {
        write(self, TRANSACTIONS_KEY, transactions)
    }

    fn onboarding_complete(&self) -> StoreResult<bool> {
        Ok(self.get(ONBOARDING_KEY)?.is_some())
    }

    fn mark_onboarding_complete(&self) -> StoreResult<()> {
        self.set(ONBOARDING_KEY, String::from("true"))
    }
}

/// Keeps every record in memory. Writes to keys listed by [`InMemoryStore::refuse_writes`]
/// fail, which lets tests exercise partial-write handling.
#[derive(Default)]
pub struct InMemoryStore {
    records: RefCell<HashMap<&'static str, String>>,
    refused: RefCell<HashSet<&'static str>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_writes(&self, key: &'static str) {
        self.refused.borrow_mut().insert(key);
    }

    pub fn allow_writes(&self, key: &'static str) {
        self.refused.borrow_mut().remove(key);
    }

    pub fn raw(&self, key: &'static str) -> Option<String> {
        self.records.borrow().get(key).cloned()
    }
}

impl KeyValue for InMemoryStore {
    fn get(&self, key: &'static str) -> StoreResult<Option<String>> {
        Ok(self.records.borrow().get(key).cloned())
    }

    fn set(&self, key: &'static str, value: String) -> StoreResult<()> {
        if self.refused.borrow().contains(key) {
            return Err(StoreError::WriteRefused(key));
        }
        self.records.borrow_mut().insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &'static str) -> StoreResult<()> {
        self.records.borrow_mut().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per record inside a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: "data directory",
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValue for JsonFileStore {
    fn get(&self, key: &'static str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { key, source }),
        }
    }

    fn set(&self, key: &'static str, value: String) -> StoreResult<()> {
        // replace via rename so a crash never leaves a half-written record
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value).map_err(|source| StoreError::Io { key, source })?;
        fs::rename(&tmp, self.path_for(key)).map_err(|source| StoreError::Io { key, source })
    }

    fn remove(&self, key: &'static str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(StoreError::Io { key, source: e }),
            _ => Ok(()),
        }
    }
}
