// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use polizza_app::InvoiceTabPrefs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::APP_NAME;

/// Per-user invoice-tab preferences, one JSON file per user id. Missing or
/// corrupt files fall back to defaults without complaint.
pub fn default_prefs_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("POLIZZA_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let data_root = dirs::data_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set POLIZZA_DATA_DIR to a writable directory")
    })?;
    Ok(data_root.join(APP_NAME))
}

pub fn prefs_path(dir: &Path, user_id: &str) -> PathBuf {
    dir.join(format!("invoice-tab-{user_id}.json"))
}

pub fn load_invoice_prefs(path: &Path) -> InvoiceTabPrefs {
    let Ok(raw) = fs::read_to_string(path) else {
        return InvoiceTabPrefs::default();
    };
    serde_json::from_str(&raw).unwrap_or_default()
}

pub fn save_invoice_prefs(path: &Path, prefs: &InvoiceTabPrefs) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create preferences directory {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(prefs).context("encode invoice preferences")?;
    fs::write(path, raw).with_context(|| format!("write preferences {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{load_invoice_prefs, prefs_path, save_invoice_prefs};
    use anyhow::Result;
    use polizza_app::{FilterOperator, InvoiceTabPrefs, SortFilterParams};

    #[test]
    fn path_follows_invoice_tab_user_pattern() {
        let dir = std::path::Path::new("/data/polizza");
        assert_eq!(
            prefs_path(dir, "agent-7"),
            std::path::PathBuf::from("/data/polizza/invoice-tab-agent-7.json"),
        );
    }

    #[test]
    fn prefs_round_trip_preserves_sort_and_filters() -> Result<()> {
        let (_temp, dir) = polizza_testkit::temp_data_dir()?;
        let path = prefs_path(&dir, "agent-7");

        let mut sort_filters = SortFilterParams::default();
        sort_filters.update_search("overdue premium");
        sort_filters.upsert_filter("status", FilterOperator::Eq, "overdue");
        sort_filters.update_sort(&polizza_app::SortEvent {
            sort_field: Some("due_date".to_owned()),
            sort_order: Some(-1),
            ..polizza_app::SortEvent::default()
        });
        let prefs = InvoiceTabPrefs {
            limit: 50,
            sort_filters,
        };

        save_invoice_prefs(&path, &prefs)?;
        let loaded = load_invoice_prefs(&path);
        assert_eq!(loaded, prefs);
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() {
        let loaded = load_invoice_prefs(std::path::Path::new("/nonexistent/prefs.json"));
        assert_eq!(loaded, InvoiceTabPrefs::default());
    }

    #[test]
    fn corrupt_file_yields_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("invoice-tab-x.json");
        std::fs::write(&path, "{not json")?;
        assert_eq!(load_invoice_prefs(&path), InvoiceTabPrefs::default());
        Ok(())
    }

    #[test]
    fn save_creates_missing_directories() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = prefs_path(&temp.path().join("nested/deeper"), "local");
        save_invoice_prefs(&path, &InvoiceTabPrefs::default())?;
        assert!(path.exists());
        Ok(())
    }
}
