use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::DeviceConfig;
use crate::session::DeviceSession;

pub mod storage;

use storage::BackupStore;

/// Outcome of one device's session, decided before anything is written to
/// disk. The driver owns logging and aggregation.
pub enum DeviceOutcome {
    /// Non-empty output collected from the device.
    Succeeded { output: String },
    Failed { reason: String },
}

/// Accumulated result of one run, consumed by the reports and the email.
pub struct RunSummary {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
    pub elapsed: Duration,
}

/// Sequential driver: one session per device, in inventory order. A failed
/// device is logged and skipped; storage errors are fatal.
pub struct BackupRunner<'a, S> {
    session: S,
    commands: &'a BTreeMap<String, Vec<String>>,
    devices: &'a [DeviceConfig],
    store: BackupStore,
}

impl<'a, S: DeviceSession> BackupRunner<'a, S> {
    pub fn new(
        session: S,
        commands: &'a BTreeMap<String, Vec<String>>,
        devices: &'a [DeviceConfig],
        store: BackupStore,
    ) -> Self {
        Self {
            session,
            commands,
            devices,
            store,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let today = Local::now().date_naive();
        self.run_for_date(today, started).await
    }

    async fn run_for_date(&self, date: NaiveDate, started: Instant) -> Result<RunSummary> {
        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for device in self.devices {
            info!(device = %device.name, address = %device.address, "starting backup");
            match self.backup_device(device).await {
                DeviceOutcome::Succeeded { output } => {
                    let path = self.store.save(device, date, &output)?;
                    info!(device = %device.name, path = %path.display(), "backup saved");
                    successful.push(device.name.clone());
                }
                DeviceOutcome::Failed { reason } => {
                    error!(device = %device.name, address = %device.address, "backup failed: {reason}");
                    failed.push(device.name.clone());
                }
            }
        }

        Ok(RunSummary {
            successful,
            failed,
            elapsed: started.elapsed(),
        })
    }

    async fn backup_device(&self, device: &DeviceConfig) -> DeviceOutcome {
        let Some(commands) = self.commands.get(&device.group) else {
            return DeviceOutcome::Failed {
                reason: format!("no command list configured for group {}", device.group),
            };
        };

        match self.session.collect_config(device, commands).await {
            Ok(output) if !output.is_empty() => DeviceOutcome::Succeeded { output },
            Ok(_) => DeviceOutcome::Failed {
                reason: "device returned no output".to_string(),
            },
            Err(e) => DeviceOutcome::Failed {
                reason: format!("{e:#}"),
            },
        }
    }
}
