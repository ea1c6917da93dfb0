//! Interactive SSH shells for switches that only answer on the CLI.
//!
//! Network operating systems rarely support `exec` channels, so commands
//! are typed into a PTY shell and the output is read until the device
//! prints its prompt again.

use std::{
  net::IpAddr,
  sync::{Arc, LazyLock},
  time::Duration,
};

use async_trait::async_trait;
use regex::Regex;
use russh::{ChannelMsg, Disconnect, client};
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result, client::Credentials};

/// `<sw-01>`, `[~HUAWEI]`, `sw-01#`, `sw-01>`.
static PROMPT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\s*[<\[]?[\w.\-~/@:()]+[>#\]]\s*$").expect("valid regex")
});

static PAGER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)-+\s*more\s*-+|--more--").expect("valid regex"));

static ANSI: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid regex"));

/// SSH knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshSettings {
  pub port:                 u16,
  pub connect_timeout_secs: u64,
  /// Upper bound on one command's output, pager included.
  pub command_timeout_secs: u64,
}

impl Default for SshSettings {
  fn default() -> Self { Self { port: 22, connect_timeout_secs: 30, command_timeout_secs: 30 } }
}

/// Switch host keys are not pinned; the management network is trusted.
struct AcceptAnyHost;

#[async_trait]
impl client::Handler for AcceptAnyHost {
  type Error = russh::Error;

  async fn check_server_key(
    &mut self,
    _server_public_key: &russh_keys::key::PublicKey,
  ) -> Result<bool, Self::Error> {
    Ok(true)
  }
}

/// One logged-in shell.
pub struct SshSession {
  address:         IpAddr,
  handle:          client::Handle<AcceptAnyHost>,
  channel:         russh::Channel<client::Msg>,
  command_timeout: Duration,
}

impl SshSession {
  /// Log in, open a PTY shell and wait for the first prompt.
  pub async fn connect(
    address: IpAddr,
    credentials: &Credentials,
    settings: &SshSettings,
  ) -> Result<Self> {
    let config = Arc::new(client::Config {
      inactivity_timeout: Some(Duration::from_secs(settings.command_timeout_secs.max(1) * 4)),
      ..Default::default()
    });

    let connect_timeout = Duration::from_secs(settings.connect_timeout_secs.max(1));
    let mut handle = tokio::time::timeout(
      connect_timeout,
      client::connect(config, (address, settings.port), AcceptAnyHost),
    )
    .await
    .map_err(|_| Error::Timeout { address, attempts: 1 })??;

    let accepted = handle
      .authenticate_password(credentials.username.as_str(), credentials.password.as_str())
      .await?;
    if !accepted {
      return Err(Error::Authentication { address });
    }

    let mut channel = handle.channel_open_session().await?;
    channel
      .request_pty(false, "vt100", 511, 24, 0, 0, &[])
      .await?;
    channel.request_shell(false).await?;

    let mut session = Self {
      address,
      handle,
      channel,
      command_timeout: Duration::from_secs(settings.command_timeout_secs.max(1)),
    };
    session.read_with_timeout().await?;
    debug!(%address, "ssh shell ready");
    Ok(session)
  }

  /// Type `command` and return its cleaned output.
  pub async fn run_command(&mut self, command: &str) -> Result<String> {
    debug!(address = %self.address, command, "ssh command");
    self
      .channel
      .data(format!("{command}\n").as_bytes())
      .await?;
    let raw = self.read_with_timeout().await?;
    Ok(clean_output(&raw, command))
  }

  pub async fn close(self) {
    if let Err(e) = self.channel.eof().await {
      debug!(address = %self.address, error = %e, "ssh channel eof failed");
    }
    if let Err(e) = self
      .handle
      .disconnect(Disconnect::ByApplication, "", "en")
      .await
    {
      debug!(address = %self.address, error = %e, "ssh disconnect failed");
    }
  }

  async fn read_with_timeout(&mut self) -> Result<String> {
    let address = self.address;
    tokio::time::timeout(self.command_timeout, self.read_until_prompt())
      .await
      .map_err(|_| Error::Timeout { address, attempts: 1 })?
  }

  async fn read_until_prompt(&mut self) -> Result<String> {
    let mut raw = String::new();
    loop {
      match self.channel.wait().await {
        Some(ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. }) => {
          raw.push_str(&String::from_utf8_lossy(&data));
          if let Some(rest) = strip_trailing_pager(&raw) {
            raw = rest;
            self.channel.data(&b" "[..]).await?;
            continue;
          }
          if ends_with_prompt(&raw) {
            return Ok(raw);
          }
        }
        Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
          return Err(Error::Transport {
            address: self.address,
            message: "shell closed before prompt".to_owned(),
          });
        }
        Some(_) => {}
      }
    }
  }
}

fn strip_terminal_noise(raw: &str) -> String {
  ANSI
    .replace_all(raw, "")
    .chars()
    .filter(|c| *c != '\r' && *c != '\u{8}')
    .collect()
}

fn ends_with_prompt(raw: &str) -> bool {
  strip_terminal_noise(raw)
    .lines()
    .last()
    .is_some_and(|line| PROMPT.is_match(line))
}

/// When the buffer ends in a pager marker, the buffer without it.
fn strip_trailing_pager(raw: &str) -> Option<String> {
  let tail_start = raw.rfind('\n').map_or(0, |i| i + 1);
  let tail = &raw[tail_start..];
  PAGER
    .is_match(tail)
    .then(|| format!("{}{}", &raw[..tail_start], PAGER.replace_all(tail, "")))
}

/// Drop terminal escapes, the echoed command line, pager residue and the
/// trailing prompt.
pub fn clean_output(raw: &str, command: &str) -> String {
  let text = strip_terminal_noise(raw);
  let mut lines: Vec<&str> = text.lines().collect();

  if let Some(echo) = lines
    .iter()
    .take(3)
    .position(|line| line.contains(command.trim()))
  {
    lines.drain(..=echo);
  }
  if lines.last().is_some_and(|line| PROMPT.is_match(line)) {
    lines.pop();
  }

  lines
    .into_iter()
    .filter_map(|line| {
      if !PAGER.is_match(line) {
        return Some(line.trim_end().to_owned());
      }
      let rest = PAGER.replace_all(line, "");
      let rest = rest.trim();
      (!rest.is_empty()).then(|| rest.to_owned())
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prompts_of_each_family() {
    for p in ["<07_L2_RACK01>", "[~HUAWEI]", "dist-02#", "dist-02>", "  sw.core-1# "] {
      assert!(PROMPT.is_match(p), "{p}");
    }
    for p in ["Total items displayed = 4", "0018-6e35-7631 100/-/- GE0/0/5 dynamic", ""] {
      assert!(!PROMPT.is_match(p), "{p}");
    }
  }

  #[test]
  fn cleans_echo_escapes_and_prompt() {
    let raw = concat!(
      "display mac-address\r\n",
      "0018-6e35-7631 100/-/- GE0/0/5 dynamic\r\n",
      "  ---- More ----\x1b[42D\x1b[42D",
      "0018-6e35-7632 100/-/- GE0/0/6 dynamic\r\n",
      "<07_L2_RACK01>",
    );
    assert_eq!(
      clean_output(raw, "display mac-address"),
      "0018-6e35-7631 100/-/- GE0/0/5 dynamic\n0018-6e35-7632 100/-/- GE0/0/6 dynamic"
    );
  }

  #[test]
  fn output_without_echo_is_kept() {
    assert_eq!(clean_output("Port: Gi1/0/1\r\nsw#", "show etherchannel 1 port"), "Port: Gi1/0/1");
  }

  #[test]
  fn pager_marker_is_detected_only_at_the_tail() {
    let raw = "line one\n  ---- More ----";
    assert_eq!(strip_trailing_pager(raw).as_deref(), Some("line one\n  "));
    assert_eq!(strip_trailing_pager("line one\nline two"), None);
    assert!(strip_trailing_pager(" --More-- ").is_some());
  }

  #[test]
  fn prompt_detection_ignores_escapes() {
    assert!(ends_with_prompt("output\r\n\x1b[0m<sw-01>"));
    assert!(!ends_with_prompt("output\r\nstill printing"));
  }
}
