//! Persistence layer.
//!
//! Saves and loads the daily risk journal to/from a JSON file so a
//! restart within the same day does not forget notional already traded
//! against the daily ceiling. Cascade results are deliberately not
//! persisted; they live only in the response to one invocation.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::types::RiskJournal;

/// Default journal file path.
const DEFAULT_JOURNAL_FILE: &str = "cascade_risk_journal.json";

/// Save the risk journal to a JSON file.
pub fn save_journal(journal: &RiskJournal, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_JOURNAL_FILE);
    let json = serde_json::to_string_pretty(journal)
        .context("Failed to serialise risk journal")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write risk journal to {path}"))?;

    debug!(path, day = %journal.day, volume = %journal.accumulated_notional, "Risk journal saved");
    Ok(())
}

/// Load the risk journal from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_journal(path: Option<&str>) -> Result<Option<RiskJournal>> {
    let path = path.unwrap_or(DEFAULT_JOURNAL_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved risk journal found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read risk journal from {path}"))?;

    let journal: RiskJournal = serde_json::from_str(&json)
        .context(format!("Failed to parse risk journal from {path}"))?;

    info!(
        path,
        day = %journal.day,
        volume = %journal.accumulated_notional,
        trades = journal.trades.len(),
        "Risk journal loaded from disk"
    );

    Ok(Some(journal))
}

/// Delete the journal file (for testing or reset).
pub fn delete_journal(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_JOURNAL_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete risk journal {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
