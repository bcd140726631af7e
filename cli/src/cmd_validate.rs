//! `chainfeed validate`: compile a subscribe request and report its filters.

use anyhow::{bail, Result};
use chainfeed_filter::{Filter, SubscribeRequest};
use std::path::Path;

pub fn run(request: &Path, config: Option<&Path>) -> Result<()> {
    let limits = crate::load_config(config)?.limits;
    let request: SubscribeRequest = crate::load(request)?;

    let filter = match Filter::new(&request, &limits) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("✗ Invalid request ({}): {e}", e.reason());
            bail!("request rejected");
        }
    };

    println!("✓ Request valid");
    println!("  Commitment:  {}", filter.commitment());
    print_names("accounts", request.accounts.keys());
    print_names("slots", request.slots.keys());
    print_names("transactions", request.transactions.keys());
    print_names("transactions_status", request.transactions_status.keys());
    print_names("blocks", request.blocks.keys());
    print_names("blocks_meta", request.blocks_meta.keys());
    print_names("entry", request.entry.keys());
    if !request.accounts_data_slice.is_empty() {
        println!("  Data slices: {}", request.accounts_data_slice.len());
    }
    if filter.is_empty() {
        println!("  (no filters: the session will only receive keepalive traffic)");
    }
    Ok(())
}

fn print_names<'a>(kind: &str, names: impl Iterator<Item = &'a String>) {
    let names: Vec<&str> = names.map(String::as_str).collect();
    if !names.is_empty() {
        println!("  {:<20} {}", format!("{kind}:"), names.join(", "));
    }
}
