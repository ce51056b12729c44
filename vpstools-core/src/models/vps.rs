//! VPS instance model: identity, credentials, services and cached telemetry.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default SSH port for new instances
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Group assigned when a draft leaves it empty
pub const DEFAULT_GROUP: &str = "Default";

/// Declared authentication method of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Password authentication
    Password,
    /// Private key authentication
    Key,
}

impl AuthMethod {
    /// Stable machine identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Key => "key",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "password" => Ok(Self::Password),
            "key" | "publickey" => Ok(Self::Key),
            other => Err(format!("unknown auth method '{other}'")),
        }
    }
}

/// Stored SSH credential.
///
/// Exactly one method is ever populated; the serialized form carries the
/// method under the `auth_method` tag.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_method", rename_all = "lowercase")]
pub enum Credential {
    /// Password authentication
    Password {
        /// Login password
        password: String,
    },
    /// Private key authentication
    Key {
        /// Path to the private key (may start with `~`)
        key_path: String,
        /// Optional key passphrase
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
}

impl Credential {
    /// Returns the authentication method of this credential
    #[must_use]
    pub const fn auth_method(&self) -> AuthMethod {
        match self {
            Self::Password { .. } => AuthMethod::Password,
            Self::Key { .. } => AuthMethod::Key,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Password { password } if password.is_empty() => {
                Err("password must not be empty".to_string())
            }
            Self::Key { key_path, .. } if key_path.trim().is_empty() => {
                Err("key path must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"***")
                .finish(),
            Self::Key {
                key_path,
                passphrase,
            } => f
                .debug_struct("Key")
                .field("key_path", key_path)
                .field("passphrase", &passphrase.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

/// Kind of service deployed on an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Shadowsocks server
    Shadowsocks,
    /// VMess server
    Vmess,
    /// VLESS server
    Vless,
    /// Trojan server
    Trojan,
    /// Hysteria (v1) server
    Hysteria,
    /// Hysteria2 server
    Hysteria2,
    /// TUIC server
    Tuic,
    /// Anything else the deployment collaborator installs
    Other,
}

impl ServiceType {
    /// Stable machine identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shadowsocks => "shadowsocks",
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Hysteria => "hysteria",
            Self::Hysteria2 => "hysteria2",
            Self::Tuic => "tuic",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shadowsocks" | "ss" => Ok(Self::Shadowsocks),
            "vmess" => Ok(Self::Vmess),
            "vless" => Ok(Self::Vless),
            "trojan" => Ok(Self::Trojan),
            "hysteria" => Ok(Self::Hysteria),
            "hysteria2" | "hy2" => Ok(Self::Hysteria2),
            "tuic" => Ok(Self::Tuic),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown service type '{other}'")),
        }
    }
}

/// Runtime status of a deployed service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Service is running
    Running,
    /// Service is installed but stopped
    Stopped,
    /// Service failed
    Error,
    /// Status has not been determined
    #[default]
    Unknown,
}

impl ServiceStatus {
    /// Stable machine identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Error),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown service status '{other}'")),
        }
    }
}

/// A service installed on an instance by the deployment collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpsService {
    /// Identifier, unique within its instance
    pub id: String,
    /// Kind of service
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Human-readable name
    pub display_name: String,
    /// Listening port, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Last known status
    #[serde(default)]
    pub status: ServiceStatus,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl VpsService {
    /// Creates a service entry with unknown status
    #[must_use]
    pub fn new(id: impl Into<String>, service_type: ServiceType, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            service_type,
            display_name: display_name.into(),
            port: None,
            status: ServiceStatus::Unknown,
            updated_at: Utc::now(),
        }
    }

    /// Sets the listening port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the status
    #[must_use]
    pub const fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }
}

/// Point-in-time system snapshot of a remote host.
///
/// Values are raw and normalized: percentages are `0.0..=100.0`, uptime is
/// whole seconds. Formatting for humans happens in the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Distribution name (e.g. "Ubuntu 24.04.1 LTS")
    pub os_name: String,
    /// Kernel release (e.g. "6.8.0-45-generic")
    pub kernel_version: String,
    /// CPU model string
    pub cpu_model: String,
    /// Online CPU count, always greater than zero
    pub cpu_cores: u32,
    /// Memory usage percentage
    pub memory_usage: f64,
    /// Root filesystem usage percentage
    pub disk_usage: f64,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl SystemInfo {
    /// Uptime as a duration
    #[must_use]
    pub const fn uptime(&self) -> Duration {
        Duration::from_secs(self.uptime_secs)
    }
}

/// A managed VPS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpsInstance {
    /// Stable unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Hostname or IP address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// SSH login user
    pub username: String,
    /// SSH credential
    pub credential: Credential,
    /// Free-text group bucket
    pub group: String,
    /// Ordered tag set
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Last successful authenticated session
    #[serde(default)]
    pub last_connected: Option<DateTime<Utc>>,
    /// Cached telemetry snapshot
    #[serde(default)]
    pub system_info: Option<SystemInfo>,
    /// Services installed by the deployment collaborator
    #[serde(default)]
    pub services: Vec<VpsService>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl VpsInstance {
    /// Bumps `updated_at` to now
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns the declared authentication method
    #[must_use]
    pub const fn auth_method(&self) -> AuthMethod {
        self.credential.auth_method()
    }

    /// `host:port` string used for logging and display
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Checks the fields every instance must satisfy
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        validate_host(&self.host)?;
        if self.port == 0 {
            return Err("port must be between 1 and 65535".to_string());
        }
        validate_username(&self.username)?;
        self.credential.validate()
    }
}

fn validate_host(host: &str) -> Result<(), String> {
    if host.trim().is_empty() {
        return Err("host must not be empty".to_string());
    }
    if host.chars().any(char::is_whitespace) {
        return Err(format!("host '{host}' contains whitespace"));
    }
    if host.starts_with('-') {
        return Err(format!("host '{host}' must not start with '-'"));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("username must not be empty".to_string());
    }
    if username.starts_with('-') {
        return Err(format!("username '{username}' must not start with '-'"));
    }
    if username.chars().any(|c| c.is_whitespace() || c == '@') {
        return Err(format!("username '{username}' contains whitespace or '@'"));
    }
    Ok(())
}

/// Fields submitted when adding an instance.
///
/// This is the flattened API-boundary view: the credential arrives as an
/// optional method plus optional password/key fields and is checked for
/// consistency by [`VpsDraft::into_instance`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VpsDraft {
    /// Display name (defaults to the host)
    #[serde(default)]
    pub name: String,
    /// Hostname or IP address
    pub host: String,
    /// SSH port (defaults to 22)
    #[serde(default)]
    pub port: Option<u16>,
    /// SSH login user
    pub username: String,
    /// Declared authentication method (inferred when absent)
    #[serde(default)]
    pub auth_method: Option<AuthMethod>,
    /// Password for password auth
    #[serde(default)]
    pub password: Option<String>,
    /// Private key path for key auth
    #[serde(default)]
    pub key_path: Option<String>,
    /// Group bucket (defaults to [`DEFAULT_GROUP`])
    #[serde(default)]
    pub group: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VpsDraft {
    /// Creates a password-authenticated draft
    #[must_use]
    pub fn with_password(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            username: username.into(),
            auth_method: Some(AuthMethod::Password),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Creates a key-authenticated draft
    #[must_use]
    pub fn with_key(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            username: username.into(),
            auth_method: Some(AuthMethod::Key),
            key_path: Some(key_path.into()),
            ..Self::default()
        }
    }

    /// Sets the display name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Resolves the credential from the flattened fields
    fn credential(&self) -> Result<Credential, String> {
        let password = self.password.as_ref().filter(|p| !p.is_empty());
        let key_path = self.key_path.as_ref().filter(|k| !k.trim().is_empty());

        let method = match (self.auth_method, password, key_path) {
            (_, Some(_), Some(_)) => {
                return Err("both password and key path are set; choose one".to_string());
            }
            (Some(method), _, _) => method,
            (None, Some(_), None) => AuthMethod::Password,
            (None, None, Some(_)) => AuthMethod::Key,
            (None, None, None) => return Err("a password or key path is required".to_string()),
        };

        match (method, password, key_path) {
            (AuthMethod::Password, Some(password), None) => Ok(Credential::Password {
                password: password.clone(),
            }),
            (AuthMethod::Key, None, Some(key_path)) => Ok(Credential::Key {
                key_path: key_path.clone(),
                passphrase: None,
            }),
            (AuthMethod::Password, _, _) => {
                Err("auth method 'password' requires a password".to_string())
            }
            (AuthMethod::Key, _, _) => Err("auth method 'key' requires a key path".to_string()),
        }
    }

    /// Validates the draft and builds an instance with a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn into_instance(self) -> Result<VpsInstance, String> {
        let credential = self.credential()?;
        let host = self.host.trim().to_string();
        validate_host(&host)?;
        let name = if self.name.trim().is_empty() {
            host.clone()
        } else {
            self.name.trim().to_string()
        };
        let group = self
            .group
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let now = Utc::now();

        let instance = VpsInstance {
            id: Uuid::new_v4(),
            name,
            host,
            port: self.port.unwrap_or(DEFAULT_SSH_PORT),
            username: self.username.trim().to_string(),
            credential,
            group,
            tags: self
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            last_connected: None,
            system_info: None,
            services: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        instance.validate()?;
        Ok(instance)
    }
}

/// Field changes applied by `edit_instance`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VpsPatch {
    /// New display name
    pub name: Option<String>,
    /// New host
    pub host: Option<String>,
    /// New SSH port
    pub port: Option<u16>,
    /// New login user
    pub username: Option<String>,
    /// Replacement credential
    pub credential: Option<Credential>,
    /// New group
    pub group: Option<String>,
    /// Replacement tag set
    pub tags: Option<BTreeSet<String>>,
}

impl VpsPatch {
    /// Returns true if the patch changes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.username.is_none()
            && self.credential.is_none()
            && self.group.is_none()
            && self.tags.is_none()
    }

    /// Returns a patched copy of `instance` with `updated_at` bumped.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field; `instance` is untouched.
    pub fn apply_to(&self, instance: &VpsInstance) -> Result<VpsInstance, String> {
        let mut patched = instance.clone();
        if let Some(name) = &self.name {
            patched.name = name.trim().to_string();
        }
        if let Some(host) = &self.host {
            patched.host = host.trim().to_string();
        }
        if let Some(port) = self.port {
            patched.port = port;
        }
        if let Some(username) = &self.username {
            patched.username = username.trim().to_string();
        }
        if let Some(credential) = &self.credential {
            patched.credential = credential.clone();
        }
        if let Some(group) = &self.group {
            let group = group.trim();
            patched.group = if group.is_empty() {
                DEFAULT_GROUP.to_string()
            } else {
                group.to_string()
            };
        }
        if let Some(tags) = &self.tags {
            patched.tags.clone_from(tags);
        }
        patched.validate()?;
        patched.touch();
        Ok(patched)
    }
}
