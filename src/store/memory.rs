//! In-memory stores, used by the test suite and by embedders that manage
//! persistence themselves. Writes from another thread model the external
//! configuration UI.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{ScheduleStore, Settings, SettingsStore};

#[derive(Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<Settings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings.normalized())),
        }
    }

    /// Full-record replacement, as the configuration UI would do.
    pub fn replace(&self, settings: Settings) {
        *self.inner.lock() = settings.normalized();
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.lock().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.inner.lock().clone())
    }

    fn set_last_position(&self, position: i32) -> Result<()> {
        let mut s = self.inner.lock();
        s.last_position = position.clamp(s.lower, s.upper);
        Ok(())
    }

    fn set_target_temp(&self, target: f64) -> Result<()> {
        self.inner.lock().target_temp = target;
        Ok(())
    }

    fn clear_manual_position(&self) -> Result<()> {
        self.inner.lock().manual_position = 0;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryScheduleStore {
    rows: Arc<Mutex<Vec<(String, f64)>>>,
}

impl MemoryScheduleStore {
    pub fn new(rows: Vec<(String, f64)>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    /// Bulk delete + reinsert, mirroring how the UI rewrites the table.
    pub fn replace(&self, rows: Vec<(String, f64)>) {
        *self.rows.lock() = rows;
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn rows(&self) -> Result<Vec<(String, f64)>> {
        Ok(self.rows.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_position_write_respects_bounds() {
        let store = MemorySettingsStore::new(Settings::default());
        store.set_last_position(1_000_000).unwrap();
        assert_eq!(store.snapshot().last_position, 24600);
    }

    #[test]
    fn manual_position_read_then_clear() {
        let store = MemorySettingsStore::new(Settings {
            manual_position: 12000,
            ..Settings::default()
        });
        assert_eq!(store.load().unwrap().manual_position, 12000);
        store.clear_manual_position().unwrap();
        assert_eq!(store.load().unwrap().manual_position, 0);
    }
}
