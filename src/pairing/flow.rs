//! Setup-time pairing handshake
//!
//! A TV is probed with a harmless key press. If it refuses, it wants
//! encrypted credentials: the TV is asked to show a PIN and the caller gets a
//! follow-up form. The PIN must be authorized over the very connection that
//! requested it, so that connection is held here between the two calls.

use crate::client::{ClientError, ClientFactory, Credentials, FailureClass, VieraClient};
use crate::config::DeviceConfig;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use viera_shared::{keys, timing, wol};

/// Setup failures, worded for the person doing the setup
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("IP address is required")]
    MissingHost,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Failed to request PIN from TV: {0}")]
    PinRequest(String),

    #[error("PIN authorization failed: {0}. Please verify the PIN is correct and try again.")]
    Authorization(String),

    #[error("Failed to obtain app_id and encryption_key after PIN authorization")]
    IncompleteCredentials,

    #[error("Failed to verify encrypted connection: {0}")]
    Verification(String),

    #[error("Connection timeout to {host}:{port}\nPlease verify TV is powered on and accessible")]
    Timeout { host: String, port: u16 },

    #[error("No pairing in progress for {host}:{port}. Start setup again without a PIN")]
    NoPendingPairing { host: String, port: u16 },

    #[error("Setup failed: {0}")]
    Connection(String),
}

/// Values entered by the user; empty strings mean "not given"
#[derive(Debug, Clone, Default)]
pub struct SetupInput {
    pub name: String,
    pub host: String,
    pub port: String,
    pub pin: String,
    pub mac_address: String,
}

impl SetupInput {
    /// Build from `(field id, value)` pairs as returned by a form
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut input = Self::default();
        for (id, value) in fields {
            let slot = match id {
                "name" => &mut input.name,
                "host" => &mut input.host,
                "port" => &mut input.port,
                "pin" => &mut input.pin,
                "mac_address" => &mut input.mac_address,
                _ => continue,
            };
            *slot = value.to_string();
        }
        input
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputField {
    pub id: String,
    pub label: String,
    pub value: String,
}

impl InputField {
    fn text(id: &str, label: &str, value: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// A form the caller must show to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInputRequest {
    pub title: String,
    pub fields: Vec<InputField>,
}

impl UserInputRequest {
    pub fn field(&self, id: &str) -> Option<&InputField> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// The first form of a manual setup
pub fn manual_entry_form() -> UserInputRequest {
    UserInputRequest {
        title: "Panasonic Viera TV Setup".into(),
        fields: vec![
            InputField::text("name", "TV Name", ""),
            InputField::text("host", "IP Address", ""),
            InputField::text("port", "Port", timing::DEFAULT_PORT.to_string()),
            InputField::text("mac_address", "MAC Address (optional, for power on)", ""),
        ],
    }
}

fn pin_form(host: &str, port: u16, name: &str, mac: &str) -> UserInputRequest {
    UserInputRequest {
        title: "Enter PIN from TV".into(),
        fields: vec![
            InputField::text("host", "IP Address", host),
            InputField::text("port", "Port", port.to_string()),
            InputField::text("name", "TV Name", name),
            InputField::text("mac_address", "MAC Address (optional, for power on)", mac),
            InputField::text("pin", "PIN Code (displayed on TV screen)", ""),
        ],
    }
}

/// Result of one setup step
#[derive(Debug)]
pub enum SetupOutcome {
    Complete(DeviceConfig),
    NeedsPin(UserInputRequest),
}

/// Where the handshake currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingPhase {
    Probing,
    NotRequired,
    AwaitingPin,
    Authorizing,
    Verifying,
    Done,
}

struct HeldConnection {
    host: String,
    port: u16,
    client: Box<dyn VieraClient>,
}

struct PairingSlot {
    phase: PairingPhase,
    held: Option<HeldConnection>,
}

/// Drives the pairing handshake for one setup session
pub struct PairingFlow {
    factory: Arc<dyn ClientFactory>,
    slot: Mutex<PairingSlot>,
}

impl PairingFlow {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(PairingSlot {
                phase: PairingPhase::Probing,
                held: None,
            }),
        }
    }

    pub async fn phase(&self) -> PairingPhase {
        self.slot.lock().await.phase
    }

    /// Whether a PIN-requesting connection is being held
    pub async fn has_pending_pin(&self) -> bool {
        self.slot.lock().await.held.is_some()
    }

    /// Run one step of setup with the values entered so far
    ///
    /// Without a PIN this probes the TV and either completes or asks for a
    /// PIN. With a PIN it authorizes over the held connection and verifies
    /// the issued credentials. Any error drops the held connection.
    pub async fn query_device(&self, input: &SetupInput) -> Result<SetupOutcome, SetupError> {
        let mut slot = self.slot.lock().await;

        let result = self.step(&mut slot, input).await;
        if let Err(e) = &result {
            warn!("Setup failed: {}", e);
            if slot.held.take().is_some() {
                debug!("Discarded pairing connection");
            }
            slot.phase = PairingPhase::Probing;
        }
        result
    }

    async fn step(
        &self,
        slot: &mut PairingSlot,
        input: &SetupInput,
    ) -> Result<SetupOutcome, SetupError> {
        let host = input.host.trim();
        if host.is_empty() {
            return Err(SetupError::MissingHost);
        }

        let port = parse_port(&input.port)?;

        let name = match input.name.trim() {
            "" => format!("Panasonic Viera ({})", host),
            name => name.to_string(),
        };

        let mac = input.mac_address.trim();
        if !mac.is_empty() {
            wol::normalize_mac(mac).map_err(|e| SetupError::InvalidMac(e.to_string()))?;
        }

        let pin = input.pin.trim();
        let device = DeviceConfig::new(name, host, port).with_mac_address(Some(mac.to_string()));

        if pin.is_empty() {
            self.probe(slot, device).await
        } else {
            self.authorize(slot, device, pin).await
        }
    }

    async fn probe(
        &self,
        slot: &mut PairingSlot,
        device: DeviceConfig,
    ) -> Result<SetupOutcome, SetupError> {
        if slot.held.take().is_some() {
            debug!("Discarded stale pairing connection");
        }
        slot.phase = PairingPhase::Probing;
        info!("Setting up Panasonic Viera TV at {}:{}", device.host, device.port);

        let client = self
            .factory
            .connect(&device.host, device.port, None)
            .await
            .map_err(|e| connection_error(e, &device))?;

        let probe = client.send_key(keys::KEY_INFO).await;
        match probe {
            Ok(()) => {
                slot.phase = PairingPhase::NotRequired;
                info!("TV does not require encryption");
                self.finish(slot, device)
            }
            Err(e) if e.classify() == FailureClass::Unreachable => Err(connection_error(e, &device)),
            Err(e) => {
                info!("TV requires encryption, initiating PIN pairing ({})", e);
                client
                    .request_pin_code()
                    .await
                    .map_err(|e| SetupError::PinRequest(e.to_string()))?;
                info!("PIN request sent to TV");

                let form = pin_form(
                    &device.host,
                    device.port,
                    &device.name,
                    device.mac_address.as_deref().unwrap_or_default(),
                );
                slot.held = Some(HeldConnection {
                    host: device.host,
                    port: device.port,
                    client,
                });
                slot.phase = PairingPhase::AwaitingPin;
                Ok(SetupOutcome::NeedsPin(form))
            }
        }
    }

    async fn authorize(
        &self,
        slot: &mut PairingSlot,
        device: DeviceConfig,
        pin: &str,
    ) -> Result<SetupOutcome, SetupError> {
        let mut client = match slot.held.take() {
            Some(held) if held.host == device.host && held.port == device.port => held.client,
            _ => {
                return Err(SetupError::NoPendingPairing {
                    host: device.host,
                    port: device.port,
                })
            }
        };

        slot.phase = PairingPhase::Authorizing;
        client
            .authorize_pin_code(pin)
            .await
            .map_err(|e| SetupError::Authorization(e.to_string()))?;

        let credentials = client
            .credentials()
            .and_then(|c| Credentials::from_parts(Some(c.app_id.as_str()), Some(c.encryption_key.as_str())))
            .ok_or(SetupError::IncompleteCredentials)?;
        drop(client);
        info!("Paired with encrypted TV");

        slot.phase = PairingPhase::Verifying;
        let verifier = self
            .factory
            .connect(&device.host, device.port, Some(&credentials))
            .await
            .map_err(|e| SetupError::Verification(e.to_string()))?;
        verifier
            .get_volume()
            .await
            .map_err(|e| SetupError::Verification(e.to_string()))?;
        info!("Verified encrypted connection");

        self.finish(slot, device.with_credentials(&credentials))
    }

    fn finish(
        &self,
        slot: &mut PairingSlot,
        device: DeviceConfig,
    ) -> Result<SetupOutcome, SetupError> {
        slot.held = None;
        slot.phase = PairingPhase::Done;
        info!("Setup completed for {} ({})", device.name, device.identifier);
        Ok(SetupOutcome::Complete(device))
    }
}

fn parse_port(raw: &str) -> Result<u16, SetupError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(timing::DEFAULT_PORT);
    }
    match raw.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(SetupError::InvalidPort(raw.to_string())),
    }
}

fn connection_error(err: ClientError, device: &DeviceConfig) -> SetupError {
    match err {
        ClientError::Timeout(_) => SetupError::Timeout {
            host: device.host.clone(),
            port: device.port,
        },
        other => SetupError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeFactory, FakeTv, Fault};

    fn input(host: &str, pin: &str) -> SetupInput {
        SetupInput {
            name: "Living Room".into(),
            host: host.into(),
            port: "55000".into(),
            pin: pin.into(),
            mac_address: String::new(),
        }
    }

    fn flow(tv: &Arc<FakeTv>) -> PairingFlow {
        PairingFlow::new(FakeFactory::new(tv.clone()))
    }

    fn pairing_tv() -> Arc<FakeTv> {
        let tv = FakeTv::new();
        tv.require_pairing("1234", Credentials::new("app-1", "key-1"));
        tv
    }

    #[tokio::test]
    async fn test_plain_tv_completes_without_credentials() {
        let tv = FakeTv::new();
        let flow = flow(&tv);

        let outcome = flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        let SetupOutcome::Complete(config) = outcome else {
            panic!("expected a finished configuration");
        };

        assert_eq!(config.identifier, "viera_192_168_1_50_55000");
        assert_eq!(config.name, "Living Room");
        assert!(config.app_id.is_none());
        assert!(config.encryption_key.is_none());
        assert_eq!(flow.phase().await, PairingPhase::Done);
        assert_eq!(tv.call_names(), vec!["send_key:NRC_INFO-ONOFF"]);
    }

    #[tokio::test]
    async fn test_encrypted_tv_asks_for_pin() {
        let tv = pairing_tv();
        let flow = flow(&tv);

        let outcome = flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        let SetupOutcome::NeedsPin(form) = outcome else {
            panic!("expected a PIN form");
        };

        assert_eq!(form.title, "Enter PIN from TV");
        assert_eq!(form.field("host").unwrap().value, "192.168.1.50");
        assert_eq!(form.field("port").unwrap().value, "55000");
        assert_eq!(form.field("name").unwrap().value, "Living Room");
        assert_eq!(form.field("pin").unwrap().value, "");
        assert_eq!(flow.phase().await, PairingPhase::AwaitingPin);
        assert!(flow.has_pending_pin().await);
    }

    #[tokio::test]
    async fn test_pin_completes_pairing_over_held_connection() {
        let tv = pairing_tv();
        let flow = flow(&tv);

        flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        let outcome = flow.query_device(&input("192.168.1.50", "1234")).await.unwrap();
        let SetupOutcome::Complete(config) = outcome else {
            panic!("expected a finished configuration");
        };

        assert_eq!(config.identifier, "viera_192_168_1_50_55000");
        assert_eq!(config.app_id.as_deref(), Some("app-1"));
        assert_eq!(config.encryption_key.as_deref(), Some("key-1"));
        assert!(!flow.has_pending_pin().await);

        let calls = tv.calls();
        let requested_on = calls
            .iter()
            .find(|(_, c)| c == "request_pin_code")
            .map(|(conn, _)| *conn);
        let authorized_on = calls
            .iter()
            .find(|(_, c)| c.starts_with("authorize_pin_code"))
            .map(|(conn, _)| *conn);
        assert!(requested_on.is_some());
        assert_eq!(requested_on, authorized_on);

        // Verification used a second, credentialed connection
        let connections = tv.connections();
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[1], Some(Credentials::new("app-1", "key-1")));
    }

    #[tokio::test]
    async fn test_wrong_pin_discards_held_connection() {
        let tv = pairing_tv();
        let flow = flow(&tv);

        flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        let err = flow
            .query_device(&input("192.168.1.50", "9999"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::Authorization(_)));
        assert!(err.to_string().contains("verify the PIN"));
        assert!(!flow.has_pending_pin().await);
        assert_eq!(flow.phase().await, PairingPhase::Probing);

        let err = flow
            .query_device(&input("192.168.1.50", "1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::NoPendingPairing { .. }));
    }

    #[tokio::test]
    async fn test_incomplete_credentials_fail() {
        let tv = FakeTv::new();
        tv.require_pairing("1234", Credentials::new("app-1", ""));
        let flow = flow(&tv);

        flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        let err = flow
            .query_device(&input("192.168.1.50", "1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::IncompleteCredentials));
    }

    #[tokio::test]
    async fn test_failed_verification_is_reported() {
        let tv = pairing_tv();
        let flow = flow(&tv);

        flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        tv.set_call_fault(Some(Fault::Protocol));

        let err = flow
            .query_device(&input("192.168.1.50", "1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::Verification(_)));
        assert!(!flow.has_pending_pin().await);
    }

    #[tokio::test]
    async fn test_pin_for_other_host_is_rejected() {
        let tv = pairing_tv();
        let flow = flow(&tv);

        flow.query_device(&input("192.168.1.50", "")).await.unwrap();
        let err = flow
            .query_device(&input("192.168.1.51", "1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::NoPendingPairing { .. }));
        assert_eq!(tv.count_calls("authorize_pin_code"), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_with_host() {
        let tv = FakeTv::new();
        tv.set_connect_fault(Some(Fault::Timeout));
        let flow = flow(&tv);

        let err = flow
            .query_device(&input("192.168.1.50", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::Timeout { .. }));
        assert!(err.to_string().starts_with("Connection timeout to 192.168.1.50:55000"));
    }

    #[tokio::test]
    async fn test_unreachable_probe_does_not_request_pin() {
        let tv = FakeTv::new();
        tv.set_call_fault(Some(Fault::Refused));
        let flow = flow(&tv);

        let err = flow
            .query_device(&input("192.168.1.50", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::Connection(_)));
        assert_eq!(tv.count_calls("request_pin_code"), 0);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let flow = flow(&FakeTv::new());

        let err = flow.query_device(&input("  ", "")).await.unwrap_err();
        assert_eq!(err.to_string(), "IP address is required");

        let mut bad_port = input("192.168.1.50", "");
        bad_port.port = "abc".into();
        assert!(matches!(
            flow.query_device(&bad_port).await,
            Err(SetupError::InvalidPort(_))
        ));

        let mut bad_mac = input("192.168.1.50", "");
        bad_mac.mac_address = "12:34".into();
        assert!(matches!(
            flow.query_device(&bad_mac).await,
            Err(SetupError::InvalidMac(_))
        ));
    }

    #[tokio::test]
    async fn test_defaults_for_name_and_port() {
        let flow = flow(&FakeTv::new());
        let input = SetupInput::from_fields([
            ("host", "10.0.0.7"),
            ("mac_address", "aa-bb-cc-dd-ee-ff"),
            ("ignored", "x"),
        ]);

        let SetupOutcome::Complete(config) = flow.query_device(&input).await.unwrap() else {
            panic!("expected a finished configuration");
        };
        assert_eq!(config.name, "Panasonic Viera (10.0.0.7)");
        assert_eq!(config.port, 55000);
        assert_eq!(config.identifier, "viera_10_0_0_7_55000");
        assert_eq!(config.mac_address.as_deref(), Some("aa-bb-cc-dd-ee-ff"));
    }

    #[test]
    fn test_manual_entry_form() {
        let form = manual_entry_form();
        assert_eq!(form.title, "Panasonic Viera TV Setup");
        assert_eq!(form.field("port").unwrap().value, "55000");
        assert!(form.field("host").is_some());
        assert!(form.field("name").is_some());
    }
}
