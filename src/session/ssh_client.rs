use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{Channel, ChannelMsg, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{DeviceConfig, SessionConfig};
use crate::credentials::DeviceCredentials;
use crate::session::DeviceSession;

/// SSH-backed session driver. Logs in with the decrypted credential pair,
/// enters privileged mode, then walks the vendor command list over an
/// interactive shell, waiting for the `<device_name>#` prompt after each
/// command.
pub struct SshSession {
    credentials: DeviceCredentials,
    port: u16,
    connect_timeout: Duration,
    command_timeout: Duration,
}

/// Host keys are not pinned on the management network.
struct AcceptAllHostKeys;

#[async_trait]
impl client::Handler for AcceptAllHostKeys {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

impl SshSession {
    pub fn new(credentials: DeviceCredentials, config: &SessionConfig) -> Self {
        Self {
            credentials,
            port: config.port,
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            command_timeout: Duration::from_secs(config.command_timeout_seconds),
        }
    }

    async fn open(&self, device: &DeviceConfig) -> Result<Handle<AcceptAllHostKeys>> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.command_timeout),
            ..Default::default()
        });

        let handle = timeout(
            self.connect_timeout,
            client::connect(
                config,
                (device.address.as_str(), self.port),
                AcceptAllHostKeys,
            ),
        )
        .await
        .with_context(|| format!("connection to {} timed out", device.address))?
        .with_context(|| format!("failed to connect to {}", device.address))?;

        Ok(handle)
    }

    /// Sends `enable` and answers the password prompt with the secret if the
    /// device asks for one. ZTE drops straight back to the prompt, Huawei and
    /// Datacom may challenge first.
    async fn enter_privileged_mode(
        &self,
        channel: &mut Channel<client::Msg>,
        prompt: &str,
    ) -> Result<()> {
        channel.data(&b"enable\n"[..]).await?;

        let mut buffer = String::new();
        let mut secret_sent = false;
        loop {
            append_chunk(channel, &mut buffer, self.command_timeout, prompt).await?;
            if ends_with_prompt(&buffer, prompt) {
                return Ok(());
            }
            if !secret_sent && buffer.to_ascii_lowercase().contains("password") {
                let line = format!("{}\n", self.credentials.password);
                channel.data(line.as_bytes()).await?;
                secret_sent = true;
                buffer.clear();
            }
        }
    }

    async fn run_command(
        &self,
        channel: &mut Channel<client::Msg>,
        command: &str,
        prompt: &str,
    ) -> Result<String> {
        debug!(command, "executing command");
        let line = format!("{command}\n");
        channel.data(line.as_bytes()).await?;

        let mut buffer = String::new();
        while !ends_with_prompt(&buffer, prompt) {
            append_chunk(channel, &mut buffer, self.command_timeout, prompt).await?;
        }
        Ok(clean_output(&buffer, command, prompt))
    }
}

impl DeviceSession for SshSession {
    async fn collect_config(
        &self,
        device: &DeviceConfig,
        commands: &[String],
    ) -> Result<String> {
        let prompt = format!("{}#", device.name);
        let mut handle = self.open(device).await?;

        let authenticated = handle
            .authenticate_password(&self.credentials.username, &self.credentials.password)
            .await
            .with_context(|| format!("authentication error on {}", device.address))?;
        if !authenticated {
            bail!("{} rejected the configured credentials", device.address);
        }

        let mut channel = handle
            .channel_open_session()
            .await
            .context("failed to open session channel")?;
        channel
            .request_pty(false, "vt100", 200, 100, 0, 0, &[])
            .await
            .context("PTY request failed")?;
        channel
            .request_shell(false)
            .await
            .context("shell request failed")?;

        // Swallow the login banner up to the first prompt.
        let mut banner = String::new();
        while !ends_with_prompt(&banner, &prompt) {
            append_chunk(&mut channel, &mut banner, self.command_timeout, &prompt).await?;
        }

        self.enter_privileged_mode(&mut channel, &prompt).await?;

        let mut output = String::new();
        for command in commands {
            output.push_str(&self.run_command(&mut channel, command, &prompt).await?);
        }

        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "backup complete", "en")
            .await
        {
            warn!(device = %device.name, "error closing session: {e}");
        }
        Ok(output)
    }
}

async fn append_chunk(
    channel: &mut Channel<client::Msg>,
    buffer: &mut String,
    read_timeout: Duration,
    prompt: &str,
) -> Result<()> {
    let msg = timeout(read_timeout, channel.wait())
        .await
        .with_context(|| format!("timed out waiting for prompt \"{prompt}\""))?;
    match msg {
        Some(ChannelMsg::Data { data }) => {
            buffer.push_str(&String::from_utf8_lossy(&data));
        }
        Some(ChannelMsg::ExtendedData { data, .. }) => {
            buffer.push_str(&String::from_utf8_lossy(&data));
        }
        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
            bail!("session closed before prompt \"{prompt}\" was seen");
        }
        Some(_) => {}
    }
    Ok(())
}

fn ends_with_prompt(buffer: &str, prompt: &str) -> bool {
    buffer.trim_end().ends_with(prompt)
}

/// Drops the echoed command line and the trailing prompt so the saved file
/// contains only the device's response.
fn clean_output(raw: &str, command: &str, prompt: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    if lines.first().is_some_and(|first| first.trim_end() == command) {
        lines.remove(0);
    }
    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() || trimmed == prompt {
            lines.pop();
        } else {
            break;
        }
    }
    let mut output = lines.join("\n");
    if !output.is_empty() {
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_detected_with_trailing_whitespace() {
        assert!(ends_with_prompt("banner\nOLT-A#  \n", "OLT-A#"));
        assert!(!ends_with_prompt("banner\nOLT-A# show run", "OLT-A#"));
        assert!(!ends_with_prompt("", "OLT-A#"));
    }

    #[test]
    fn clean_output_strips_echo_and_prompt() {
        let raw = "show running-config\r\nversion 1.2\ninterface gpon\nOLT-A#";
        let cleaned = clean_output(raw, "show running-config", "OLT-A#");
        assert_eq!(cleaned, "version 1.2\ninterface gpon\n");
    }

    #[test]
    fn clean_output_keeps_body_without_echo() {
        let raw = "version 1.2\nOLT-A#\n";
        assert_eq!(clean_output(raw, "scroll", "OLT-A#"), "version 1.2\n");
    }

    #[test]
    fn clean_output_of_prompt_only_response_is_empty() {
        assert_eq!(clean_output("scroll\nOLT-A#", "scroll", "OLT-A#"), "");
    }
}
