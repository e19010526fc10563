use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use linktap_client::RestClient;
use linktap_engine::{JsonLinesSink, SyncEngine};
use linktap_state::{InMemoryStateStore, JsonFileStateStore, StateStore};
use linktap_types::catalog::Catalog;
use linktap_types::config::TapConfig;

/// Execute the `sync` command: load config, catalog, and state, then
/// run the engine and report totals.
pub fn execute(config_path: &Path, catalog_path: &Path, state_path: Option<&Path>) -> Result<()> {
    let config: TapConfig = read_json(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
    config.validate()?;

    let catalog: Catalog = read_json(catalog_path)
        .with_context(|| format!("Failed to read catalog: {}", catalog_path.display()))?;

    let state: Box<dyn StateStore> = match state_path {
        Some(path) => Box::new(
            JsonFileStateStore::open(path)
                .with_context(|| format!("Failed to open state: {}", path.display()))?,
        ),
        None => Box::new(InMemoryStateStore::default()),
    };

    let client = RestClient::new(&config)?;
    client.refresh_access_token()?;

    tracing::info!(
        streams = catalog.selected_streams().len(),
        start_date = config.start_date,
        "Starting sync"
    );

    let sink = JsonLinesSink::new(std::io::stdout());
    let engine = SyncEngine::new(&client, &sink, state.as_ref(), &config, &catalog);
    let summary = engine.run()?;

    eprintln!("Sync completed.");
    for (stream, records) in &summary.totals {
        eprintln!("  {stream}: {records} records");
    }
    eprintln!("  Total: {} records", summary.total_records());
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
