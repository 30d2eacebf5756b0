mod backup;
mod config;
mod credentials;
mod notify;
mod report;
mod session;

use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::backup::storage::BackupStore;
use crate::backup::BackupRunner;
use crate::config::Config;
use crate::credentials::DeviceCredentials;
use crate::notify::Notifier;
use crate::session::ssh_client::SshSession;
use std::path::Path;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; a missing file gets an example written, a
    // malformed one is left for the user to fix.
    let config = Config::load_or_init("config.toml")?;

    // Directory for logs
    let log_dir = &config.logging.directory;

    // One file per level
    let debug_file = rolling::daily(log_dir, &config.logging.debug_file);
    let info_file = rolling::daily(log_dir, &config.logging.info_file);
    let warn_file = rolling::daily(log_dir, &config.logging.warn_file);
    let error_file = rolling::daily(log_dir, &config.logging.error_file);

    // Build layers, filtering each level
    let debug_layer = fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let info_layer = fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    let warn_layer = fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let error_layer = fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    // Console logger
    let console_layer = fmt::layer()
        .pretty()
        .with_filter(EnvFilter::new(&config.logging.console_level));

    // Compose subscriber
    tracing_subscriber::registry()
        .with(console_layer)
        .with(debug_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();

    config.validate()?;

    // Credentials are decrypted once; a bad key aborts the run before any
    // device is contacted.
    let credentials = DeviceCredentials::load(&config.credentials)?;

    let session = SshSession::new(credentials, &config.session);
    let store = BackupStore::new(&config.backup.base_path);
    let runner = BackupRunner::new(session, &config.commands, &config.devices, store);

    let summary = runner.run().await?;

    let report_path =
        report::write_text_report(Path::new("."), &summary.successful, &summary.failed)?;
    let html_body = report::render_html_summary(&config.commands, &config.devices, &summary.successful);

    let minutes = summary.elapsed.as_secs() / 60;
    let seconds = summary.elapsed.as_secs() % 60;
    let body = format!(
        "OLT configuration backup finished in {minutes} minutes and {seconds} seconds.\n\
         Successful devices: {}\nDevices with errors: {}\n",
        summary.successful.len(),
        summary.failed.len()
    );

    // The backups are already on disk; a send failure is only logged.
    let notifier = Notifier::new(config.smtp.clone());
    if let Err(e) = notifier
        .send_report(
            "Backup of Devices (OLT) Completed",
            &body,
            &html_body,
            &report_path,
        )
        .await
    {
        error!("Failed to send report email: {e:#}");
    }

    info!(
        "Backup completed for {} devices, errors on {}. Took {minutes}m{seconds}s",
        summary.successful.len(),
        summary.failed.len()
    );
    Ok(())
}
