use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DeviceConfig;

/// Writes device output into the dated tree
/// `<base>/<MonthName>/<City>/<DD-MM-YYYY>/<VendorGroup>/<DeviceName>_<DDMMYYYY>.txt`.
pub struct BackupStore {
    base_path: PathBuf,
}

impl BackupStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn device_path(&self, device: &DeviceConfig, date: NaiveDate) -> PathBuf {
        self.base_path
            .join(date.format("%B").to_string())
            .join(&device.city)
            .join(date.format("%d-%m-%Y").to_string())
            .join(&device.group)
            .join(format!("{}_{}.txt", device.name, date.format("%d%m%Y")))
    }

    /// Creates the directory tree on demand and overwrites any file left by
    /// an earlier run on the same day.
    pub fn save(&self, device: &DeviceConfig, date: NaiveDate, output: &str) -> Result<PathBuf> {
        let path = self.device_path(device, date);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, output).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
