//! Scripted in-memory TV for tests

use super::traits::{AppInfo, ClientError, ClientFactory, Credentials, VieraClient};
use crate::wake::WakeSender;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Failure injected into every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    Refused,
    Encryption,
    Protocol,
}

impl Fault {
    fn to_error(self) -> ClientError {
        match self {
            Fault::Timeout => ClientError::Timeout("timed out".into()),
            Fault::Refused => ClientError::Refused("connection refused".into()),
            Fault::Encryption => ClientError::EncryptionRequired("pairing needed".into()),
            Fault::Protocol => ClientError::Protocol("unexpected response".into()),
        }
    }
}

#[derive(Debug, Default)]
struct TvState {
    volume: Option<u8>,
    muted: Option<bool>,
    apps: Vec<AppInfo>,
    connect_fault: Option<Fault>,
    call_fault: Option<Fault>,
    require_encryption: bool,
    expected_pin: String,
    issued: Option<Credentials>,
    pin_requested_on: Option<usize>,
    connections: Vec<Option<Credentials>>,
    calls: Vec<(usize, String)>,
}

/// Shared script and call log behind every fake handle
#[derive(Debug, Default)]
pub struct FakeTv {
    state: Mutex<TvState>,
}

impl FakeTv {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut TvState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_volume_reply(&self, volume: Option<u8>) {
        self.with(|s| s.volume = volume);
    }

    pub fn set_mute_reply(&self, muted: Option<bool>) {
        self.with(|s| s.muted = muted);
    }

    pub fn set_apps(&self, apps: Vec<AppInfo>) {
        self.with(|s| s.apps = apps);
    }

    pub fn set_connect_fault(&self, fault: Option<Fault>) {
        self.with(|s| s.connect_fault = fault);
    }

    pub fn set_call_fault(&self, fault: Option<Fault>) {
        self.with(|s| s.call_fault = fault);
    }

    /// Require pairing; `issued` is what a correct PIN yields
    pub fn require_pairing(&self, pin: &str, issued: Credentials) {
        self.with(|s| {
            s.require_encryption = true;
            s.expected_pin = pin.to_string();
            s.issued = Some(issued);
        });
    }

    /// Every call as `(connection index, call)`
    pub fn calls(&self) -> Vec<(usize, String)> {
        self.with(|s| s.calls.clone())
    }

    pub fn call_names(&self) -> Vec<String> {
        self.with(|s| s.calls.iter().map(|(_, c)| c.clone()).collect())
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|(_, c)| c.starts_with(prefix)).count())
    }

    /// Credentials each connection was opened with, in order
    pub fn connections(&self) -> Vec<Option<Credentials>> {
        self.with(|s| s.connections.clone())
    }

    fn open(&self, credentials: Option<&Credentials>) -> Result<usize, ClientError> {
        self.with(|s| {
            if let Some(fault) = s.connect_fault {
                return Err(fault.to_error());
            }
            s.connections.push(credentials.cloned());
            Ok(s.connections.len() - 1)
        })
    }

    fn gate(
        &self,
        conn: usize,
        credentials: Option<&Credentials>,
        call: String,
    ) -> Result<(), ClientError> {
        self.with(|s| {
            s.calls.push((conn, call));
            if let Some(fault) = s.call_fault {
                return Err(fault.to_error());
            }
            if s.require_encryption && (credentials.is_none() || credentials != s.issued.as_ref()) {
                return Err(Fault::Encryption.to_error());
            }
            Ok(())
        })
    }
}

pub struct FakeClient {
    tv: Arc<FakeTv>,
    conn: usize,
    credentials: Option<Credentials>,
}

impl FakeClient {
    fn gate(&self, call: impl Into<String>) -> Result<(), ClientError> {
        self.tv.gate(self.conn, self.credentials.as_ref(), call.into())
    }
}

#[async_trait]
impl VieraClient for FakeClient {
    async fn get_volume(&self) -> Result<Option<u8>, ClientError> {
        self.gate("get_volume")?;
        Ok(self.tv.with(|s| s.volume))
    }

    async fn get_mute(&self) -> Result<Option<bool>, ClientError> {
        self.gate("get_mute")?;
        Ok(self.tv.with(|s| s.muted))
    }

    async fn set_volume(&self, volume: u8) -> Result<(), ClientError> {
        self.gate(format!("set_volume:{}", volume))
    }

    async fn set_mute(&self, muted: bool) -> Result<(), ClientError> {
        self.gate(format!("set_mute:{}", muted))
    }

    async fn send_key(&self, key: &str) -> Result<(), ClientError> {
        self.gate(format!("send_key:{}", key))
    }

    async fn turn_on(&self) -> Result<(), ClientError> {
        self.gate("turn_on")
    }

    async fn turn_off(&self) -> Result<(), ClientError> {
        self.gate("turn_off")
    }

    async fn open_webpage(&self, url: &str) -> Result<(), ClientError> {
        self.gate(format!("open_webpage:{}", url))
    }

    async fn get_apps(&self) -> Result<Vec<AppInfo>, ClientError> {
        self.gate("get_apps")?;
        Ok(self.tv.with(|s| s.apps.clone()))
    }

    async fn launch_app(&self, app: &AppInfo) -> Result<(), ClientError> {
        self.gate(format!("launch_app:{}", app.id))
    }

    async fn request_pin_code(&self) -> Result<(), ClientError> {
        self.tv.with(|s| {
            s.calls.push((self.conn, "request_pin_code".into()));
            if let Some(fault) = s.call_fault {
                return Err(fault.to_error());
            }
            s.pin_requested_on = Some(self.conn);
            Ok(())
        })
    }

    async fn authorize_pin_code(&mut self, pin: &str) -> Result<(), ClientError> {
        let conn = self.conn;
        let issued = self.tv.with(|s| {
            s.calls.push((conn, format!("authorize_pin_code:{}", pin)));
            if s.pin_requested_on != Some(conn) {
                return Err(ClientError::Protocol(
                    "no PIN challenge pending on this connection".into(),
                ));
            }
            if pin != s.expected_pin {
                return Err(ClientError::Protocol("wrong PIN".into()));
            }
            Ok(s.issued.clone())
        })?;
        self.credentials = issued;
        Ok(())
    }

    fn credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}

pub struct FakeFactory {
    tv: Arc<FakeTv>,
}

impl FakeFactory {
    pub fn new(tv: Arc<FakeTv>) -> Arc<Self> {
        Arc::new(Self { tv })
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn VieraClient>, ClientError> {
        let conn = self.tv.open(credentials)?;
        Ok(Box::new(FakeClient {
            tv: self.tv.clone(),
            conn,
            credentials: credentials.cloned(),
        }))
    }
}

/// Records wake requests instead of sending packets
#[derive(Debug, Default)]
pub struct FakeWaker {
    pub calls: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl FakeWaker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WakeSender for FakeWaker {
    async fn wake(&self, mac: &str, host: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((mac.to_string(), host.to_string()));
        !self.fail
    }
}
