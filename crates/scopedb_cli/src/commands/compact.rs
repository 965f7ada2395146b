//! Compact command implementation.

use scopedb_core::{CompactStats, Config, Database};
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting journal at {}", path.display());
    println!();

    let stats = compact(path)?;
    let saved = stats.bytes_before.saturating_sub(stats.bytes_after);

    println!("  Size before: {} bytes", stats.bytes_before);
    println!("  Size after:  {} bytes", stats.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if stats.bytes_before > 0 {
            (saved as f64 / stats.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}

/// Opens the database at `path`, compacts it and closes it.
pub fn compact(path: &Path) -> Result<CompactStats, Box<dyn std::error::Error>> {
    let db = Database::open_with_config(path, Config::default().create_if_missing(false))?;
    let stats = db.compact()?;
    db.close()?;
    Ok(stats)
}
