//! BlueZ command-line backend.
//!
//! Discovery runs `hcitool lescan` under `timeout -s SIGINT` and scrapes its
//! output. A listen attempt runs `gatttool --char-read --listen` against the
//! sensor's data handle under `timeout`, and takes the payload from the first
//! `Notification handle` line. Both utilities need privileges to drive the
//! radio, see [`ToolsConfig::sudo`].

use super::{Bluetooth, ListenError, ScanError};
use crate::address::SensorAddress;
use crate::decode::{DecodeError, RawNotification};
use crate::discovery::parse_scan_output;
use futures::future::BoxFuture;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

/// gatttool marks pushed values with this prefix.
pub const NOTIFICATION_MARKER: &str = "Notification handle";

/// Character offset of the payload in a notification line.
///
/// `Notification handle = 0x0036 value: 46 08 44 c0 0a`
pub const PAYLOAD_OFFSET: usize = 36;

/// Five hex octets separated by single spaces.
pub const PAYLOAD_WIDTH: usize = 14;

/// Characteristic handle the LYWSD03MMC pushes readings on.
pub const DATA_HANDLE: u16 = 0x38;

/// Upper bound of a single listen attempt.
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time given to `timeout` to tear gatttool down before the attempt is abandoned.
const LISTEN_GRACE: Duration = Duration::from_secs(5);

/// Settings for the command-line backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolsConfig {
    /// Prefix both utilities with `sudo`
    pub sudo: bool,
    pub hcitool: PathBuf,
    pub gatttool: PathBuf,
    /// Characteristic handle passed to `gatttool -a`
    pub handle: u16,
    /// Bound applied to every listen attempt
    pub listen_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sudo: false,
            hcitool: PathBuf::from("hcitool"),
            gatttool: PathBuf::from("gatttool"),
            handle: DATA_HANDLE,
            listen_timeout: DEFAULT_LISTEN_TIMEOUT,
        }
    }
}

/// Backend that shells out to `hcitool` and `gatttool`.
#[derive(Debug, Clone, Default)]
pub struct ToolsBackend {
    config: ToolsConfig,
}

impl ToolsBackend {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// Full argument vector of the scan, program first.
    pub fn scan_args(&self, duration: Duration) -> Vec<OsString> {
        let mut args = self.prefix();
        args.extend([
            "timeout".into(),
            "-s".into(),
            "SIGINT".into(),
            whole_seconds(duration).into(),
            self.config.hcitool.clone().into_os_string(),
            "lescan".into(),
        ]);
        args
    }

    /// Full argument vector of one listen attempt, program first.
    pub fn listen_args(&self, address: SensorAddress) -> Vec<OsString> {
        let mut args = self.prefix();
        args.extend([
            "timeout".into(),
            whole_seconds(self.config.listen_timeout).into(),
            self.config.gatttool.clone().into_os_string(),
            "-b".into(),
            address.to_string().into(),
            "--char-read".into(),
            "-a".into(),
            format!("{:#04x}", self.config.handle).into(),
            "--listen".into(),
        ]);
        args
    }

    fn prefix(&self) -> Vec<OsString> {
        if self.config.sudo {
            vec!["sudo".into()]
        } else {
            Vec::new()
        }
    }

    async fn run_scan(&self, duration: Duration) -> Result<Vec<SensorAddress>, ScanError> {
        let args = self.scan_args(duration);
        debug!(command = ?args, "starting scan");

        let output = command(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ScanError::Spawn {
                program: program_name(&args),
                source,
            })?;

        if !output.stderr.is_empty() {
            return Err(ScanError::Diagnostics(diagnostic_text(&output.stderr)));
        }
        // `timeout` reports its own expiry through the exit status
        if !output.status.success() {
            debug!(status = %output.status, "scan command exited");
        }

        Ok(parse_scan_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn run_listen(&self, address: SensorAddress) -> Result<RawNotification, ListenError> {
        let bound = self.config.listen_timeout + LISTEN_GRACE;
        tokio::time::timeout(bound, self.listen_session(address))
            .await
            .map_err(|_| ListenError::TimedOut(self.config.listen_timeout))?
    }

    async fn listen_session(&self, address: SensorAddress) -> Result<RawNotification, ListenError> {
        let args = self.listen_args(address);
        debug!(command = ?args, "starting listen session");

        let spawn_error = |source| ListenError::Spawn {
            program: program_name(&args),
            source,
        };

        let mut child = command(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ListenError::Failed("stdout was not captured".into()))?;

        let mut payload = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ListenError::Failed(e.to_string()))?
        {
            if line.contains(NOTIFICATION_MARKER) {
                payload = Some(extract_payload(&line));
                break;
            }
            trace!(%address, line = %line, "gatttool output");
        }
        // Closing the pipe ends gatttool on its next write, like `grep -m1` would.
        drop(lines);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ListenError::Failed(e.to_string()))?;

        match payload {
            None if !output.status.success() => {
                let reason = if output.stderr.is_empty() {
                    output.status.to_string()
                } else {
                    diagnostic_text(&output.stderr)
                };
                Err(ListenError::Failed(reason))
            }
            _ if !output.stderr.is_empty() => {
                Err(ListenError::Diagnostics(diagnostic_text(&output.stderr)))
            }
            None => Err(ListenError::NoNotification),
            Some(payload) => Ok(payload?),
        }
    }
}

impl Bluetooth for ToolsBackend {
    fn scan(&self, duration: Duration) -> BoxFuture<'_, Result<Vec<SensorAddress>, ScanError>> {
        Box::pin(self.run_scan(duration))
    }

    fn listen_once(
        &self,
        address: SensorAddress,
    ) -> BoxFuture<'_, Result<RawNotification, ListenError>> {
        Box::pin(self.run_listen(address))
    }
}

/// Decode the payload of a gatttool notification line.
///
/// Takes [`PAYLOAD_WIDTH`] characters from [`PAYLOAD_OFFSET`], drops the spaces
/// and decodes the hex.
pub fn extract_payload(line: &str) -> Result<RawNotification, DecodeError> {
    let field: String = line
        .chars()
        .skip(PAYLOAD_OFFSET)
        .take(PAYLOAD_WIDTH)
        .collect();
    RawNotification::from_hex(&field)
}

fn command(args: &[OsString]) -> Command {
    let mut command = Command::new(&args[0]);
    command.args(&args[1..]);
    command
}

fn program_name(args: &[OsString]) -> String {
    args.first()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `timeout 0` disables the bound, so never go below one second.
fn whole_seconds(duration: Duration) -> String {
    duration.as_secs().max(1).to_string()
}

fn diagnostic_text(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr).trim_end().to_string()
}
