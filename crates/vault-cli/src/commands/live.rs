use std::path::Path;

use anyhow::{Context, Result};
use vault_core::{InvestableKey, Kind};
use vault_state::{open_live_store, LiveRecord};

use super::load_config;

pub fn live(config: &Path, network: &str, kind: Option<Kind>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let store = open_live_store(&config.paths).context("opening live state")?;
    let records = store
        .list(network, kind)
        .with_context(|| format!("listing live records for {network}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&as_json(&records))?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No live records for {network}");
        return Ok(());
    }
    println!("{:<12} {:<28} {:<44} {}", "KIND", "NAME", "ADDRESS", "AUTHORITY");
    for (key, record) in &records {
        let authority = record
            .upgrade_authority()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<12} {:<28} {:<44} {}", key.kind().as_str(), key.name(), record.address.to_string(), authority);
    }
    Ok(())
}

/// Records keyed by `<kind>/<name>`, in listing order.
fn as_json(records: &[(InvestableKey, LiveRecord)]) -> serde_json::Value {
    let map = records
        .iter()
        .map(|(key, record)| {
            let value = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
            (format!("{}/{}", key.kind(), key.name()), value)
        })
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}
