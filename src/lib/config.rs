use std::path::PathBuf;

pub const DATA_DIR_VAR: &str = "COMMUNITY_LEDGER_DIR";
pub const TOP_DEBTORS_VAR: &str = "COMMUNITY_LEDGER_TOP_DEBTORS";

pub const DEFAULT_DATA_DIR: &str = "ledger-data";
pub const DEFAULT_TOP_DEBTORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Directory holding one JSON file per stored record.
    pub data_dir: PathBuf,
    /// How many customers the dashboard lists as top debtors.
    pub top_debtors_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            top_debtors_limit: DEFAULT_TOP_DEBTORS,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup(DATA_DIR_VAR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            top_debtors_limit: lookup(TOP_DEBTORS_VAR)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.top_debtors_limit),
        }
    }
}
