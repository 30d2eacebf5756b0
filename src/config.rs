use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub smtp: SmtpConfig,
    pub credentials: CredentialsConfig,
    pub backup: BackupConfig,
    pub session: SessionConfig,
    /// Vendor group -> ordered command list. BTreeMap so report rows come out
    /// in a stable order.
    pub commands: BTreeMap<String, Vec<String>>,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub directory: String,
    pub debug_file: String,
    pub info_file: String,
    pub warn_file: String,
    pub error_file: String,
    pub console_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub recipient: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CredentialsConfig {
    /// Path to the Fernet key file produced by the encryption helper.
    pub key_file: String,
    pub encrypted_username: String,
    pub encrypted_password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackupConfig {
    /// Root of the dated backup tree.
    pub base_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub port: u16,
    pub connect_timeout_seconds: u64,
    pub command_timeout_seconds: u64,
}

/// One inventory entry. Devices are processed in the order they appear in the
/// config file.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    pub address: String,
    pub name: String,
    pub group: String,
    pub city: String,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads the config, writing a fresh example only when no file exists at
    /// all. A malformed file is left untouched and reported, so user edits
    /// are never clobbered.
    pub fn load_or_init(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            return Self::from_file(path)
                .with_context(|| format!("failed to load {path}; leaving it as is"));
        }
        Self::save_example(path)?;
        bail!("no {path} found; an example was written, edit it and restart");
    }

    pub fn save_example(path: &str) -> Result<()> {
        let example_config = Config {
            logging: LoggingConfig {
                directory: "./logs".to_string(),
                debug_file: "log_debug.log".to_string(),
                info_file: "log_info.log".to_string(),
                warn_file: "log_warn.log".to_string(),
                error_file: "log_error.log".to_string(),
                console_level: "info".to_string(),
            },
            smtp: SmtpConfig {
                server: "REPLACE_WITH_YOUR_SMTP_SERVER".to_string(),
                port: 587,
                username: "REPLACE_WITH_YOUR_SMTP_USERNAME".to_string(),
                password: "REPLACE_WITH_YOUR_SMTP_PASSWORD".to_string(),
                sender: "backup@example.com".to_string(),
                recipient: "noc@example.com".to_string(),
            },
            credentials: CredentialsConfig {
                key_file: "fernet_key.txt".to_string(),
                encrypted_username: "REPLACE_WITH_ENCRYPTED_USERNAME_TOKEN".to_string(),
                encrypted_password: "REPLACE_WITH_ENCRYPTED_PASSWORD_TOKEN".to_string(),
            },
            backup: BackupConfig {
                base_path: "./backups".to_string(),
            },
            session: SessionConfig {
                port: 22,
                connect_timeout_seconds: 30,
                command_timeout_seconds: 120,
            },
            commands: BTreeMap::from([
                (
                    "Zte".to_string(),
                    vec![
                        "terminal length 0".to_string(),
                        "show running-config".to_string(),
                    ],
                ),
                (
                    "Huawei".to_string(),
                    vec![
                        "enable".to_string(),
                        "scroll".to_string(),
                        "display current-configuration".to_string(),
                    ],
                ),
                (
                    "Datacom".to_string(),
                    vec![
                        "enable".to_string(),
                        "scroll".to_string(),
                        "display current-configuration".to_string(),
                    ],
                ),
            ]),
            devices: vec![DeviceConfig {
                address: "10.0.0.1".to_string(),
                name: "OLT-EXAMPLE-01".to_string(),
                group: "Zte".to_string(),
                city: "PortoAlegre".to_string(),
            }],
        };

        let toml_content = toml::to_string_pretty(&example_config)?;
        fs::write(path, toml_content)?;
        Ok(())
    }

    /// Rejects blank required fields before any device is touched. A device
    /// whose group has no command list is reported here too, since it could
    /// never produce output.
    pub fn validate(&self) -> Result<()> {
        let mut missing: Vec<&str> = Vec::new();
        if self.smtp.server.trim().is_empty() || self.smtp.server.starts_with("REPLACE_WITH") {
            missing.push("smtp.server");
        }
        if self.smtp.username.trim().is_empty() || self.smtp.username.starts_with("REPLACE_WITH") {
            missing.push("smtp.username");
        }
        if self.smtp.password.trim().is_empty() || self.smtp.password.starts_with("REPLACE_WITH") {
            missing.push("smtp.password");
        }
        if self.smtp.sender.trim().is_empty() {
            missing.push("smtp.sender");
        }
        if self.smtp.recipient.trim().is_empty() {
            missing.push("smtp.recipient");
        }
        if self.credentials.key_file.trim().is_empty() {
            missing.push("credentials.key_file");
        }
        if self.credentials.encrypted_username.trim().is_empty()
            || self.credentials.encrypted_username.starts_with("REPLACE_WITH")
        {
            missing.push("credentials.encrypted_username");
        }
        if self.credentials.encrypted_password.trim().is_empty()
            || self.credentials.encrypted_password.starts_with("REPLACE_WITH")
        {
            missing.push("credentials.encrypted_password");
        }
        if self.backup.base_path.trim().is_empty() {
            missing.push("backup.base_path");
        }
        if !missing.is_empty() {
            bail!(
                "config.toml is missing required values: {}",
                missing.join(", ")
            );
        }

        if self.devices.is_empty() {
            bail!("config.toml defines no devices");
        }
        for device in &self.devices {
            if !self.commands.contains_key(&device.group) {
                bail!(
                    "device {} has group \"{}\" with no command list in [commands]",
                    device.name,
                    device.group
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        Config::save_example(path).unwrap();
        let config = Config::from_file(path).unwrap();

        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.devices.len(), 1);
        assert_eq!(
            config.commands["Zte"],
            vec!["terminal length 0", "show running-config"]
        );
    }

    /// Example config with every placeholder replaced, as a user would edit it.
    fn filled_config() -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        Config::save_example(path).unwrap();

        let mut config = Config::from_file(path).unwrap();
        config.smtp.server = "smtp.example.com".to_string();
        config.smtp.username = "backup".to_string();
        config.smtp.password = "hunter2".to_string();
        config.credentials.encrypted_username = "gAAAAAB".to_string();
        config.credentials.encrypted_password = "gAAAAAB".to_string();
        config
    }

    #[test]
    fn filled_example_config_passes_validation() {
        filled_config().validate().unwrap();
    }

    #[test]
    fn validate_rejects_placeholder_smtp_server() {
        let mut config = filled_config();
        config.smtp.server = "REPLACE_WITH_YOUR_SMTP_SERVER".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("smtp.server"), "got: {err}");
    }

    #[test]
    fn validate_rejects_placeholder_smtp_login() {
        let mut config = filled_config();
        config.smtp.username = "REPLACE_WITH_YOUR_SMTP_USERNAME".to_string();
        config.smtp.password = "REPLACE_WITH_YOUR_SMTP_PASSWORD".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("smtp.username"), "got: {err}");
        assert!(err.contains("smtp.password"), "got: {err}");
    }

    #[test]
    fn load_or_init_writes_example_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        assert!(Config::load_or_init(path).is_err());
        // An editable example must now exist.
        Config::from_file(path).unwrap();
    }

    #[test]
    fn load_or_init_never_overwrites_a_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[smtp\nserver = ").unwrap();
        let path = path.to_str().unwrap();

        assert!(Config::load_or_init(path).is_err());
        assert_eq!(fs::read_to_string(path).unwrap(), "[smtp\nserver = ");
    }

    #[test]
    fn validate_rejects_device_with_unknown_group() {
        let mut config = filled_config();
        config.devices[0].group = "Nokia".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Nokia"), "got: {err}");
    }
}
