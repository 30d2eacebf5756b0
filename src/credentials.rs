use anyhow::{anyhow, Context, Result};
use fernet::Fernet;
use std::fs;

use crate::config::CredentialsConfig;

/// Decrypted device login, held in memory for the duration of one run and
/// never written anywhere.
#[derive(Clone)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DeviceCredentials {
    /// Loads the Fernet key from disk and decrypts both tokens. Tokens are
    /// produced by the companion encryption helper with the same key, so a
    /// failure here means the key or the config is wrong and the whole run
    /// must stop.
    pub fn load(config: &CredentialsConfig) -> Result<Self> {
        let key = fs::read_to_string(&config.key_file)
            .with_context(|| format!("failed to read Fernet key file {}", config.key_file))?;
        let fernet = Fernet::new(key.trim())
            .ok_or_else(|| anyhow!("{} does not contain a valid Fernet key", config.key_file))?;

        let username = decrypt_token(&fernet, &config.encrypted_username)
            .context("failed to decrypt username")?;
        let password = decrypt_token(&fernet, &config.encrypted_password)
            .context("failed to decrypt password")?;

        Ok(Self { username, password })
    }
}

fn decrypt_token(fernet: &Fernet, token: &str) -> Result<String> {
    let plaintext = fernet
        .decrypt(token.trim())
        .map_err(|e| anyhow!("decryption failed: {e}"))?;
    String::from_utf8(plaintext).context("decrypted credential is not valid UTF-8")
}
