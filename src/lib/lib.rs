pub mod config;
pub mod error;
pub mod io;
pub mod ledger;
pub mod reminder;
pub mod service;
pub mod store;
pub mod types;
mod utils;

use std::{error::Error, ffi::OsStr};

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult, StoreError};
pub use service::{CommunityLedger, EntryRoute};
pub use store::{InMemoryStore, JsonFileStore, LedgerStore};
pub use types::{
    Customer, CustomerId, DashboardTotals, MonetaryAmount, Session, Transaction, TransactionType,
    User, UserId,
};

use io::{read_transaction_file, write_statement};

/// Applies the transactions in `csv_path` (if any) for the session's user, then renders
/// that user's customers as a CSV statement.
pub fn process_statement<S: LedgerStore>(
    ledger: &CommunityLedger<S>,
    session: &Session,
    csv_path: Option<&OsStr>,
) -> Result<String, Box<dyn Error>> {
    if let Some(path) = csv_path {
        let requests = read_transaction_file(path)?;
        tracing::info!(rows = requests.len(), "importing transactions");
        ledger.apply_batch(session, requests)?;
    }

    let customers = ledger.customers(session)?;
    let result = write_statement(&customers)?;
    Ok(result)
}
