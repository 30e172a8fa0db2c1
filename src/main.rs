use std::{env, ffi::OsString, process};

use community_ledger_lib::{process_statement, CommunityLedger, JsonFileStore, LedgerConfig};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the statement, so logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(phone: &str, pin: &str, csv_path: Option<OsString>) -> Result<String, Box<dyn std::error::Error>> {
    let config = LedgerConfig::from_env();
    let store = JsonFileStore::open(&config.data_dir)?;
    let ledger = CommunityLedger::new(store, config);
    let session = ledger.log_in(phone, pin)?;
    process_statement(&ledger, &session, csv_path.as_deref())
}

fn main() {
    init_tracing();

    let mut args = env::args().skip(1);
    match (args.next(), args.next()) {
        (Some(phone), Some(pin)) => {
            let csv_path = env::args_os().nth(3);
            match run(&phone, &pin, csv_path) {
                Ok(result) => {
                    print!("{}", result);
                    process::exit(0);
                }
                Err(e) => {
                    eprintln!("an error occurred: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => {
            eprintln!("usage: community_ledger_bin <phone> <pin> [transactions.csv]");
            process::exit(1);
        }
    }
}
