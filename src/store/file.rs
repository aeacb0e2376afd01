//! JSON-file-backed stores for the standalone binary.
//!
//! The settings file is the shared contract with the configuration UI: a single
//! JSON object, rewritten whole. Writes go through a temp file and rename so a
//! reader never observes a torn record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ScheduleStore, Settings, SettingsStore};

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Opens the store, creating a default record if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            store.save(&Settings::default())?;
            log::info!("[Store] created default settings at {}", store.path.display());
        }
        Ok(store)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let body = serde_json::to_string_pretty(settings).context("encoding settings")?;
        write_atomic(&self.path, &body)
    }

    fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut settings = self.load()?;
        apply(&mut settings);
        self.save(&settings.normalized())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Settings> {
        let body = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let settings: Settings = serde_json::from_str(&body).context("decoding settings")?;
        Ok(settings.normalized())
    }

    fn set_last_position(&self, position: i32) -> Result<()> {
        self.update(|s| s.last_position = position)
    }

    fn set_target_temp(&self, target: f64) -> Result<()> {
        self.update(|s| s.target_temp = target)
    }

    fn clear_manual_position(&self) -> Result<()> {
        self.update(|s| s.manual_position = 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScheduleRow {
    time: String,
    target_temp: f64,
}

pub struct JsonScheduleStore {
    path: PathBuf,
}

impl JsonScheduleStore {
    /// Opens the store; an absent file means an empty schedule.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScheduleStore for JsonScheduleStore {
    fn rows(&self) -> Result<Vec<(String, f64)>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let body = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let rows: Vec<ScheduleRow> = serde_json::from_str(&body).context("decoding schedule")?;
        Ok(rows.into_iter().map(|r| (r.time, r.target_temp)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scratch_path(name: &str) -> PathBuf {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "thermovalve-{}-{}-{}.json",
            name,
            std::process::id(),
            n
        ))
    }

    #[test]
    fn creates_default_record_if_absent() {
        let path = scratch_path("defaults");
        let store = JsonSettingsStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), Settings::default());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn field_writes_round_trip() {
        let path = scratch_path("writes");
        let store = JsonSettingsStore::open(&path).unwrap();

        store.set_last_position(9100).unwrap();
        store.set_target_temp(19.5).unwrap();
        let s = store.load().unwrap();
        assert_eq!(s.last_position, 9100);
        assert_eq!(s.target_temp, 19.5);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_normalizes_external_edits() {
        let path = scratch_path("normalize");
        let store = JsonSettingsStore::open(&path).unwrap();
        let tampered = Settings {
            last_position: -5,
            pos_margin: -1,
            ..Settings::default()
        };
        fs::write(&path, serde_json::to_string(&tampered).unwrap()).unwrap();

        let s = store.load().unwrap();
        assert_eq!(s.last_position, s.lower);
        assert_eq!(s.pos_margin, 0);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_schedule_file_is_empty() {
        let store = JsonScheduleStore::open(scratch_path("missing-schedule"));
        assert!(store.rows().unwrap().is_empty());
    }

    #[test]
    fn schedule_rows_decode() {
        let path = scratch_path("schedule");
        fs::write(
            &path,
            r#"[{"time":"06:00","target_temp":18.0},{"time":"22:00","target_temp":16.0}]"#,
        )
        .unwrap();
        let store = JsonScheduleStore::open(&path);
        let rows = store.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("06:00".to_string(), 18.0));
        fs::remove_file(&path).unwrap();
    }
}
