//! Capability contract for talking to a Viera TV
//!
//! The session layer never speaks the vendor protocol directly. It asks a
//! [`ClientFactory`] for a fresh [`VieraClient`] per operation, plain or
//! credentialed depending on whether a pairing credential pair is configured.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Credential pair issued by the TV during PIN pairing
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub encryption_key: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, encryption_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            encryption_key: encryption_key.into(),
        }
    }

    /// Build a pair only when both halves are present and non-empty
    pub fn from_parts(app_id: Option<&str>, encryption_key: Option<&str>) -> Option<Self> {
        match (app_id, encryption_key) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => Some(Self::new(id, key)),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("encryption_key", &"<redacted>")
            .finish()
    }
}

/// An application reported by the TV's app listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppInfo {
    /// Opaque handle used to launch the app
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl AppInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Errors raised by a vendor client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection timed out: {0}")]
    Timeout(String),

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("connection reset: {0}")]
    Reset(String),

    #[error("encryption required: {0}")]
    EncryptionRequired(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not supported by this client: {0}")]
    Unsupported(&'static str),
}

/// How the session layer should treat a client failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// TV is off or unreachable; resolves on the next good poll
    Unreachable,
    /// TV demands pairing credentials; operator must redo setup
    CredentialRequired,
    /// Anything else
    Other,
}

impl ClientError {
    /// Whether the error signals that the TV wants encrypted credentials
    pub fn requires_encryption(&self) -> bool {
        match self {
            ClientError::EncryptionRequired(_) => true,
            ClientError::Protocol(message) => message.to_ascii_lowercase().contains("encrypt"),
            _ => false,
        }
    }

    pub fn classify(&self) -> FailureClass {
        if self.requires_encryption() {
            return FailureClass::CredentialRequired;
        }

        match self {
            ClientError::Timeout(_) | ClientError::Refused(_) | ClientError::Reset(_) => {
                FailureClass::Unreachable
            }
            _ => FailureClass::Other,
        }
    }
}

/// A session handle to one TV
#[async_trait]
pub trait VieraClient: Send + Sync {
    /// Current volume, `None` when the TV gave no answer
    async fn get_volume(&self) -> Result<Option<u8>, ClientError>;

    /// Current mute flag, `None` when the TV gave no answer
    async fn get_mute(&self) -> Result<Option<bool>, ClientError>;

    async fn set_volume(&self, volume: u8) -> Result<(), ClientError>;

    async fn set_mute(&self, muted: bool) -> Result<(), ClientError>;

    /// Send a raw NRC key code
    async fn send_key(&self, key: &str) -> Result<(), ClientError>;

    async fn turn_on(&self) -> Result<(), ClientError>;

    async fn turn_off(&self) -> Result<(), ClientError>;

    /// Open a URL in the TV browser
    async fn open_webpage(&self, url: &str) -> Result<(), ClientError>;

    /// Launchable applications, in the order the TV reports them
    async fn get_apps(&self) -> Result<Vec<AppInfo>, ClientError>;

    async fn launch_app(&self, app: &AppInfo) -> Result<(), ClientError>;

    /// Ask the TV to display a pairing PIN on screen
    async fn request_pin_code(&self) -> Result<(), ClientError>;

    /// Submit the PIN; on success the handle carries the issued credentials
    async fn authorize_pin_code(&mut self, pin: &str) -> Result<(), ClientError>;

    /// Credentials carried by this handle, if any
    fn credentials(&self) -> Option<Credentials>;
}

/// Factory for creating client handles
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Open a handle, credentialed when a pair is given
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn VieraClient>, ClientError>;
}
