//! Authenticated remote sessions.
//!
//! [`SessionOpener`] turns a [`VpsInstance`] into a [`RemoteSession`] that
//! can run shell commands. The default implementation shells out to `ssh`
//! (or `sshpass -e ssh` for password credentials), which keeps the crate
//! free of an SSH protocol implementation.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::process::Command;

use crate::models::{Credential, DEFAULT_SSH_PORT, VpsInstance};

/// Command used to verify a freshly opened session
pub const VERIFY_COMMAND: &str = "echo vpstools-ok";

/// Expected output of [`VERIFY_COMMAND`]
const VERIFY_MARKER: &str = "vpstools-ok";

/// `ssh` exit status for connection-level failures
const SSH_CONNECTION_ERROR: i32 = 255;

/// `sshpass` exit status for a rejected password
const SSHPASS_BAD_PASSWORD: i32 = 5;

/// Errors raised while opening or using a remote session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The host could not be reached
    #[error("Host unreachable: {0}")]
    Unreachable(String),

    /// The session or command exceeded its timeout
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// The remote host rejected the credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The local `ssh`/`sshpass` process could not be started
    #[error("Failed to spawn {program}: {reason}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// OS error text
        reason: String,
    },

    /// A remote command exited unsuccessfully
    #[error("Command '{command}' failed (exit {status}): {stderr}")]
    CommandFailed {
        /// Remote command line
        command: String,
        /// Exit status, or -1 when killed by a signal
        status: i32,
        /// Trimmed stderr
        stderr: String,
    },

    /// A remote command produced unusable output
    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// An authenticated shell on a remote host
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Runs `command` and returns its stdout
    async fn exec(&self, command: &str) -> Result<String, SessionError>;
}

/// Opens authenticated sessions against instances
#[async_trait]
pub trait SessionOpener: Send + Sync {
    /// Opens and verifies a session using the instance's stored credential
    async fn open(&self, instance: &VpsInstance) -> Result<Box<dyn RemoteSession>, SessionError>;
}

/// Options for the `ssh` command-line client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    /// `ssh` binary to run
    pub binary: String,
    /// Whether password credentials go through `sshpass -e`
    pub use_sshpass: bool,
    /// Whether unknown host keys are rejected
    pub strict_host_key_checking: bool,
    /// `ConnectTimeout` passed to ssh, in seconds
    pub connect_timeout_secs: u64,
    /// Upper bound on a single command, including connection setup
    pub command_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            binary: "ssh".to_string(),
            use_sshpass: true,
            strict_host_key_checking: false,
            connect_timeout_secs: 5,
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens sessions by running the system `ssh` client
#[derive(Debug, Clone, Default)]
pub struct SshCommandOpener {
    options: SshOptions,
}

impl SshCommandOpener {
    /// Creates an opener with the given options
    #[must_use]
    pub const fn new(options: SshOptions) -> Self {
        Self { options }
    }

    /// Returns the options in use
    #[must_use]
    pub const fn options(&self) -> &SshOptions {
        &self.options
    }

    /// Builds a session for `instance` without contacting it
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthenticationFailed`] if the credential
    /// cannot be used with the configured options.
    pub fn session_for(&self, instance: &VpsInstance) -> Result<SshCommandSession, SessionError> {
        let auth = match &instance.credential {
            Credential::Password { password } => {
                if !self.options.use_sshpass {
                    return Err(SessionError::AuthenticationFailed(
                        "password authentication requires sshpass".to_string(),
                    ));
                }
                SshAuth::Password(SecretString::from(password.clone()))
            }
            Credential::Key {
                key_path,
                passphrase,
            } => SshAuth::Key {
                identity_file: expand_key_path(key_path),
                passphrase: passphrase.clone().map(SecretString::from),
            },
        };

        Ok(SshCommandSession {
            host: instance.host.clone(),
            port: instance.port,
            username: instance.username.clone(),
            auth,
            options: self.options.clone(),
        })
    }
}

#[async_trait]
impl SessionOpener for SshCommandOpener {
    async fn open(&self, instance: &VpsInstance) -> Result<Box<dyn RemoteSession>, SessionError> {
        let session = self.session_for(instance)?;
        let output = session.exec(VERIFY_COMMAND).await?;
        if output.trim() != VERIFY_MARKER {
            return Err(SessionError::InvalidOutput(format!(
                "unexpected session check output: {}",
                output.trim()
            )));
        }
        Ok(Box::new(session))
    }
}

/// Credential material held by a session
#[derive(Debug)]
enum SshAuth {
    Password(SecretString),
    Key {
        identity_file: String,
        passphrase: Option<SecretString>,
    },
}

/// A session backed by one `ssh` process per command
#[derive(Debug)]
pub struct SshCommandSession {
    host: String,
    port: u16,
    username: String,
    auth: SshAuth,
    options: SshOptions,
}

impl SshCommandSession {
    /// Program that is spawned for each command
    #[must_use]
    pub fn program(&self) -> &str {
        match &self.auth {
            SshAuth::Password(_) => "sshpass",
            SshAuth::Key {
                passphrase: Some(_),
                ..
            } => "sshpass",
            SshAuth::Key { .. } => &self.options.binary,
        }
    }

    /// Arguments for running `command`; secrets never appear here
    #[must_use]
    pub fn args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        match &self.auth {
            SshAuth::Password(_) => {
                args.push("-e".to_string());
                args.push(self.options.binary.clone());
            }
            SshAuth::Key {
                passphrase: Some(_),
                ..
            } => {
                args.extend(["-e", "-P", "passphrase"].map(String::from));
                args.push(self.options.binary.clone());
            }
            SshAuth::Key { .. } => {
                args.extend(["-o", "BatchMode=yes"].map(String::from));
            }
        }

        if !self.options.strict_host_key_checking {
            args.extend(["-o", "StrictHostKeyChecking=no"].map(String::from));
            args.extend(["-o", "UserKnownHostsFile=/dev/null"].map(String::from));
        }
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.options.connect_timeout_secs));
        args.extend(["-o", "LogLevel=ERROR"].map(String::from));

        if self.port != DEFAULT_SSH_PORT {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        if let SshAuth::Key { identity_file, .. } = &self.auth {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        args.push("--".to_string());
        args.push(format!("{}@{}", self.username, self.host));
        args.push(command.to_string());
        args
    }

    fn command(&self, remote: &str) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(self.args(remote));

        let secret = match &self.auth {
            SshAuth::Password(password) => Some(password),
            SshAuth::Key { passphrase, .. } => passphrase.as_ref(),
        };
        // sshpass -e reads the secret from SSHPASS
        if let Some(secret) = secret {
            cmd.env("SSHPASS", secret.expose_secret());
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteSession for SshCommandSession {
    async fn exec(&self, command: &str) -> Result<String, SessionError> {
        let timeout = self.options.command_timeout;
        let mut cmd = self.command(command);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    String::from_utf8(output.stdout)
                        .map_err(|e| SessionError::InvalidOutput(format!("invalid UTF-8: {e}")))
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(classify_failure(
                        command,
                        output.status.code(),
                        stderr.trim(),
                    ))
                }
            }
            Ok(Err(e)) => Err(SessionError::Spawn {
                program: self.program().to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(SessionError::Timeout(timeout.as_secs())),
        }
    }
}

/// Maps a failed `ssh`/`sshpass` run to a session error
#[must_use]
pub fn classify_failure(command: &str, status: Option<i32>, stderr: &str) -> SessionError {
    let lower = stderr.to_lowercase();
    let auth_rejected = lower.contains("permission denied")
        || lower.contains("authentication failed")
        || lower.contains("too many authentication failures");

    match status {
        Some(SSHPASS_BAD_PASSWORD) => {
            SessionError::AuthenticationFailed("password rejected".to_string())
        }
        Some(SSH_CONNECTION_ERROR) if auth_rejected => {
            SessionError::AuthenticationFailed(stderr.to_string())
        }
        Some(SSH_CONNECTION_ERROR) if lower.contains("timed out") => {
            SessionError::Unreachable(stderr.to_string())
        }
        Some(SSH_CONNECTION_ERROR) => SessionError::Unreachable(if stderr.is_empty() {
            "ssh connection error".to_string()
        } else {
            stderr.to_string()
        }),
        _ if auth_rejected => SessionError::AuthenticationFailed(stderr.to_string()),
        code => SessionError::CommandFailed {
            command: command.to_string(),
            status: code.unwrap_or(-1),
            stderr: stderr.to_string(),
        },
    }
}

fn expand_key_path(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}
