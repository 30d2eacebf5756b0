use crate::config::DeviceConfig;

pub mod ssh_client;

/// One remote administrative session per device. The backup driver only sees
/// this trait, so vendor command lists stay in configuration and tests can
/// substitute a scripted session.
pub trait DeviceSession {
    /// Runs the ordered command list against the device and returns the
    /// concatenated textual output. Any connection or command error abandons
    /// the session; there is no retry and no partial salvage.
    fn collect_config(
        &self,
        device: &DeviceConfig,
        commands: &[String],
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}
