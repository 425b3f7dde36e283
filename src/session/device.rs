//! Device session
//!
//! Owns the connection lifecycle of one TV: periodic status polling, command
//! execution and app-list synchronisation. A fresh client handle is opened
//! for every operation; handles are never kept across a TV sleep cycle.
//!
//! Public operations never fail outward. Commands report a `bool` and all
//! diagnostic detail goes to the log.

use crate::client::{AppInfo, ClientError, ClientFactory, FailureClass, VieraClient};
use crate::command::CommandSurface;
use crate::config::DeviceConfig;
use crate::wake::WakeSender;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use viera_shared::{
    keys, media_player_entity_id, remote_entity_id, timing, ConnectionEvent, ConnectionState,
    EntityUpdate, PlayerAttributes, PowerState, RemoteAttributes, SessionStateMachine,
    TransitionResult,
};

/// Timings used by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub poll_interval: Duration,
    /// Delay after a wake packet before the TV is assumed up
    pub wake_settle: Duration,
    /// Delay after a protocol power-on call
    pub power_on_settle: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(timing::POLL_INTERVAL_SECS),
            wake_settle: Duration::from_secs(timing::WAKE_SETTLE_SECS),
            power_on_settle: Duration::from_secs(timing::POWER_ON_SETTLE_SECS),
        }
    }
}

/// Locally cached view of the TV
///
/// Best-effort mirror only: relative volume commands are estimated and the
/// next successful poll reconciles them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TvState {
    pub power: bool,
    pub volume: u8,
    pub muted: bool,
    pub source: String,
    pub source_list: Vec<String>,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: TvState,
    fsm: SessionStateMachine,
    /// Power as last confirmed by a status probe
    confirmed_power: bool,
    apps: Vec<AppInfo>,
    surface: CommandSurface,
    last_emitted: Option<TvState>,
}

/// Runtime object for one configured TV
pub struct DeviceSession {
    config: DeviceConfig,
    factory: Arc<dyn ClientFactory>,
    waker: Arc<dyn WakeSender>,
    timing: SessionTiming,
    inner: RwLock<SessionInner>,
    events: mpsc::UnboundedSender<EntityUpdate>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    log_id: String,
}

impl DeviceSession {
    pub fn new(
        config: DeviceConfig,
        factory: Arc<dyn ClientFactory>,
        waker: Arc<dyn WakeSender>,
        timing: SessionTiming,
        events: mpsc::UnboundedSender<EntityUpdate>,
    ) -> Self {
        let log_id = format!("{} ({})", config.name, config.host);

        Self {
            config,
            factory,
            waker,
            timing,
            inner: RwLock::new(SessionInner::default()),
            events,
            poll_task: Mutex::new(None),
            log_id,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.config.identifier
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    pub fn media_player_id(&self) -> String {
        media_player_entity_id(&self.config.identifier)
    }

    pub fn remote_id(&self) -> String {
        remote_entity_id(&self.config.identifier)
    }

    /// Display name of the remote facet
    pub fn remote_name(&self) -> String {
        format!("{} Remote", self.config.name)
    }

    pub async fn state(&self) -> TvState {
        self.inner.read().await.state.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.read().await.fsm.state()
    }

    pub async fn surface(&self) -> CommandSurface {
        self.inner.read().await.surface.clone()
    }

    pub async fn apps(&self) -> Vec<AppInfo> {
        self.inner.read().await.apps.clone()
    }

    /// App bound to a derived `APP_*` command identifier
    pub async fn app_for_command(&self, cmd_id: &str) -> Option<AppInfo> {
        self.inner.read().await.surface.app_for_command(cmd_id).cloned()
    }

    // ---- lifecycle ----

    /// Open the session and run the first status probe
    ///
    /// Returns true when the TV answered with a defined volume.
    pub async fn connect(&self) -> bool {
        info!("[{}] Connecting", self.log_id);
        self.transition(ConnectionEvent::ConnectRequested).await;
        self.poll().await;

        let state = self.connection_state().await;
        if state == ConnectionState::Connected {
            info!("[{}] Connected", self.log_id);
        } else {
            info!("[{}] TV not reachable, assuming off", self.log_id);
        }
        state == ConnectionState::Connected
    }

    /// Tear the session down and stop polling
    pub async fn disconnect(&self) {
        self.stop_polling().await;
        self.transition(ConnectionEvent::Teardown).await;
        info!("[{}] Disconnected", self.log_id);
    }

    /// Start the periodic poll task
    ///
    /// Returns false when a poll task is already running.
    pub async fn start_polling(self: &Arc<Self>) -> bool {
        let mut task = self.poll_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            warn!("[{}] Polling already active", self.log_id);
            return false;
        }

        let session: Weak<Self> = Arc::downgrade(self);
        let poll_interval = self.timing.poll_interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; connect() already probed
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(strong) = session.upgrade() else {
                    break;
                };
                strong.poll().await;
            }
        }));

        debug!(
            "[{}] Polling every {}s",
            self.log_id,
            poll_interval.as_secs_f32()
        );
        true
    }

    /// Abort the poll task started by the last `start_polling`
    pub async fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
            debug!("[{}] Polling stopped", self.log_id);
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.poll_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    // ---- polling ----

    /// Run one poll cycle
    ///
    /// No-op without a live session. A defined volume means the TV is on;
    /// no answer or any error means it is off.
    pub async fn poll(&self) {
        if !self.inner.read().await.fsm.is_live() {
            debug!("[{}] Poll skipped, no live connection", self.log_id);
            return;
        }

        let client = match self.open().await {
            Ok(client) => client,
            Err(e) => {
                self.poll_failed(e).await;
                return;
            }
        };

        match probe(client.as_ref()).await {
            Ok(Some((volume, muted))) => {
                debug!("[{}] Volume: {} muted: {:?}", self.log_id, volume, muted);
                self.transition(ConnectionEvent::ProbeSucceeded).await;

                let rising = {
                    let mut inner = self.inner.write().await;
                    let rising = !inner.confirmed_power;
                    inner.confirmed_power = true;
                    inner.state.power = true;
                    inner.state.volume = volume.min(timing::VOLUME_MAX);
                    if let Some(muted) = muted {
                        inner.state.muted = muted;
                    }
                    rising
                };

                if rising {
                    debug!("[{}] Power-on detected, refreshing apps", self.log_id);
                    self.sync_apps(client.as_ref()).await;
                }
            }
            Ok(None) => {
                debug!("[{}] Status probe returned nothing, TV is off", self.log_id);
                self.transition(ConnectionEvent::ProbeEmpty).await;
                self.mark_off().await;
            }
            Err(e) => {
                self.poll_failed(e).await;
                return;
            }
        }

        self.emit_if_changed().await;
    }

    async fn poll_failed(&self, err: ClientError) {
        let class = err.classify();
        let event = match class {
            FailureClass::CredentialRequired => ConnectionEvent::CredentialRequired,
            FailureClass::Unreachable => ConnectionEvent::NetworkFailure,
            FailureClass::Other => ConnectionEvent::PollFailed,
        };
        self.transition(event).await;
        let failures = self.inner.read().await.fsm.consecutive_failures();

        match class {
            FailureClass::CredentialRequired => error!(
                "[{}] TV requires encryption credentials, re-run pairing ({} failed in a row): {}",
                self.log_id, failures, err
            ),
            FailureClass::Unreachable => debug!(
                "[{}] Poll error (TV may be off, {} failed in a row): {}",
                self.log_id, failures, err
            ),
            FailureClass::Other => debug!(
                "[{}] Poll error ({} failed in a row): {}",
                self.log_id, failures, err
            ),
        }

        self.mark_off().await;
        self.emit_if_changed().await;
    }

    async fn mark_off(&self) {
        let mut inner = self.inner.write().await;
        inner.confirmed_power = false;
        inner.state.power = false;
    }

    /// Refresh the app list when the TV is believed on
    ///
    /// Returns true when the list changed.
    pub async fn refresh_apps(&self) -> bool {
        if !self.inner.read().await.state.power {
            debug!("[{}] App refresh skipped, TV is off", self.log_id);
            return false;
        }

        let changed = match self.open().await {
            Ok(client) => self.sync_apps(client.as_ref()).await,
            Err(e) => {
                debug!("[{}] App refresh failed: {}", self.log_id, e);
                false
            }
        };
        if changed {
            self.emit_if_changed().await;
        }
        changed
    }

    async fn sync_apps(&self, client: &dyn VieraClient) -> bool {
        let apps = match client.get_apps().await {
            Ok(apps) => apps,
            Err(e) => {
                debug!("[{}] Could not list apps: {}", self.log_id, e);
                return false;
            }
        };

        let mut inner = self.inner.write().await;
        let known: HashSet<&AppInfo> = inner.apps.iter().collect();
        let fresh: HashSet<&AppInfo> = apps.iter().collect();
        if known == fresh {
            return false;
        }

        inner.surface = CommandSurface::build(&apps);
        inner.state.source_list = source_list(&apps);
        inner.apps = apps;

        let preview: Vec<&str> = inner.apps.iter().take(10).map(|a| a.name.as_str()).collect();
        info!(
            "[{}] Updated remote with {} discovered apps: {:?}",
            self.log_id,
            inner.apps.len(),
            preview
        );

        let options = EntityUpdate::options(self.remote_id(), &inner.surface.to_options_json());
        drop(inner);
        let _ = self.events.send(options);
        true
    }

    // ---- commands ----

    pub async fn turn_on(&self) -> bool {
        if !self.ensure_live("Turn on").await {
            return false;
        }
        info!("[{}] Turning on", self.log_id);

        let (success, settle) = match &self.config.mac_address {
            Some(mac) => {
                debug!("[{}] Waking via magic packet to {}", self.log_id, mac);
                let sent = self.waker.wake(mac, &self.config.host).await;
                if !sent {
                    warn!("[{}] Wake packet could not be sent", self.log_id);
                }
                (sent, self.timing.wake_settle)
            }
            None => {
                let result = match self.open().await {
                    Ok(client) => client.turn_on().await,
                    Err(e) => Err(e),
                };
                (self.check("Turn on", result).await, self.timing.power_on_settle)
            }
        };

        // Power-on has no synchronous acknowledgement
        self.update(|s| s.power = true).await;

        if !settle.is_zero() {
            sleep(settle).await;
        }
        success
    }

    pub async fn turn_off(&self) -> bool {
        info!("[{}] Turning off", self.log_id);
        let Some(client) = self.client_for("Turn off").await else {
            return false;
        };
        let result = client.turn_off().await;
        if !self.check("Turn off", result).await {
            return false;
        }

        self.inner.write().await.confirmed_power = false;
        self.update(|s| s.power = false).await;
        true
    }

    pub async fn set_volume(&self, volume: u8) -> bool {
        let volume = volume.min(timing::VOLUME_MAX);
        info!("[{}] Setting volume to {}", self.log_id, volume);
        let Some(client) = self.client_for("Set volume").await else {
            return false;
        };
        let result = client.set_volume(volume).await;
        if !self.check("Set volume", result).await {
            return false;
        }

        self.update(|s| s.volume = volume).await;
        true
    }

    pub async fn volume_up(&self) -> bool {
        info!("[{}] Volume up", self.log_id);
        let Some(client) = self.client_for("Volume up").await else {
            return false;
        };
        let result = client.send_key(keys::KEY_VOLUME_UP).await;
        if !self.check("Volume up", result).await {
            return false;
        }

        self.update(|s| s.volume = step_volume(s.volume, true)).await;
        true
    }

    pub async fn volume_down(&self) -> bool {
        info!("[{}] Volume down", self.log_id);
        let Some(client) = self.client_for("Volume down").await else {
            return false;
        };
        let result = client.send_key(keys::KEY_VOLUME_DOWN).await;
        if !self.check("Volume down", result).await {
            return false;
        }

        self.update(|s| s.volume = step_volume(s.volume, false)).await;
        true
    }

    pub async fn set_mute(&self, muted: bool) -> bool {
        info!("[{}] Setting mute to {}", self.log_id, muted);
        let Some(client) = self.client_for("Set mute").await else {
            return false;
        };
        let result = client.set_mute(muted).await;
        if !self.check("Set mute", result).await {
            return false;
        }

        self.update(|s| s.muted = muted).await;
        true
    }

    /// Send a raw NRC key code
    pub async fn send_key(&self, key: &str) -> bool {
        info!("[{}] Sending key: {}", self.log_id, key);
        let Some(client) = self.client_for("Send key").await else {
            return false;
        };
        let result = client.send_key(key).await;
        if !self.check("Send key", result).await {
            return false;
        }

        self.update(|_| {}).await;
        true
    }

    /// Launch the discovered app whose name matches exactly
    pub async fn select_source(&self, name: &str) -> bool {
        let app = {
            let inner = self.inner.read().await;
            inner.apps.iter().find(|a| a.name == name).cloned()
        };

        match app {
            Some(app) => self.launch_app(&app).await,
            None => {
                warn!("[{}] Unknown source: {}", self.log_id, name);
                false
            }
        }
    }

    pub async fn launch_app(&self, app: &AppInfo) -> bool {
        info!("[{}] Launching app: {}", self.log_id, app.name);
        let Some(client) = self.client_for("Launch app").await else {
            return false;
        };
        let result = client.launch_app(app).await;
        if !self.check("Launch app", result).await {
            return false;
        }

        let name = app.name.clone();
        self.update(move |s| s.source = name).await;
        true
    }

    /// Open a URL in the TV browser
    pub async fn play_media(&self, url: &str) -> bool {
        info!("[{}] Playing media: {}", self.log_id, url);
        let Some(client) = self.client_for("Play media").await else {
            return false;
        };
        let result = client.open_webpage(url).await;
        if !self.check("Play media", result).await {
            return false;
        }

        self.update(|_| {}).await;
        true
    }

    // ---- helpers ----

    async fn open(&self) -> Result<Box<dyn VieraClient>, ClientError> {
        let credentials = self.config.credentials();
        self.factory
            .connect(&self.config.host, self.config.port, credentials.as_ref())
            .await
    }

    async fn ensure_live(&self, action: &str) -> bool {
        if self.inner.read().await.fsm.is_live() {
            return true;
        }
        error!("[{}] {}: no live connection", self.log_id, action);
        false
    }

    /// Open a handle for a command, logging and recording failures
    async fn client_for(&self, action: &str) -> Option<Box<dyn VieraClient>> {
        if !self.ensure_live(action).await {
            return None;
        }
        match self.open().await {
            Ok(client) => Some(client),
            Err(e) => {
                self.check::<()>(action, Err(e)).await;
                None
            }
        }
    }

    /// Collapse a command result into success, logging failures
    async fn check<T>(&self, action: &str, result: Result<T, ClientError>) -> bool {
        let err = match result {
            Ok(_) => return true,
            Err(e) => e,
        };

        if err.classify() == FailureClass::CredentialRequired {
            error!(
                "[{}] {} failed, TV requires encryption credentials, re-run pairing: {}",
                self.log_id, action, err
            );
        } else {
            error!("[{}] {} failed: {}", self.log_id, action, err);
        }
        self.transition(ConnectionEvent::CommandFailed).await;
        false
    }

    async fn transition(&self, event: ConnectionEvent) {
        let mut inner = self.inner.write().await;
        let from = inner.fsm.state();
        match inner.fsm.process_event(event) {
            TransitionResult::Success(to) if from != to => {
                debug!("[{}] {:?} -> {:?} ({:?})", self.log_id, from, to, event);
            }
            TransitionResult::Success(_) => {}
            TransitionResult::Invalid { from, event } => {
                debug!("[{}] Ignoring {:?} while {:?}", self.log_id, event, from);
            }
        }
    }

    /// Apply a local state change and always emit
    async fn update(&self, apply: impl FnOnce(&mut TvState)) {
        let state = {
            let mut inner = self.inner.write().await;
            apply(&mut inner.state);
            inner.last_emitted = Some(inner.state.clone());
            inner.state.clone()
        };
        self.emit(&state);
    }

    /// Emit only when the visible state differs from the last emission
    async fn emit_if_changed(&self) {
        let state = {
            let mut inner = self.inner.write().await;
            if inner.last_emitted.as_ref() == Some(&inner.state) {
                return;
            }
            inner.last_emitted = Some(inner.state.clone());
            inner.state.clone()
        };
        self.emit(&state);
    }

    fn emit(&self, state: &TvState) {
        debug!(
            "[{}] Emitting update: state={:?} volume={} muted={}",
            self.log_id,
            PowerState::from(state.power),
            state.volume,
            state.muted
        );
        for update in self.updates(state) {
            let _ = self.events.send(update);
        }
    }

    fn updates(&self, state: &TvState) -> [EntityUpdate; 2] {
        let power = PowerState::from(state.power);
        let player = PlayerAttributes {
            state: power,
            volume: state.volume,
            muted: state.muted,
            source: state.source.clone(),
            source_list: state.source_list.clone(),
        };
        [
            EntityUpdate::new(self.media_player_id(), &player),
            EntityUpdate::new(self.remote_id(), &RemoteAttributes { state: power }),
        ]
    }
}

/// Volume then mute; mute is only asked when volume answered
async fn probe(client: &dyn VieraClient) -> Result<Option<(u8, Option<bool>)>, ClientError> {
    let Some(volume) = client.get_volume().await? else {
        return Ok(None);
    };
    let muted = client.get_mute().await?;
    Ok(Some((volume, muted)))
}

fn step_volume(volume: u8, up: bool) -> u8 {
    if up {
        volume.saturating_add(timing::VOLUME_STEP).min(timing::VOLUME_MAX)
    } else {
        volume.saturating_sub(timing::VOLUME_STEP)
    }
}

/// Distinct app names in discovery order
fn source_list(apps: &[AppInfo]) -> Vec<String> {
    let mut seen = HashSet::new();
    apps.iter()
        .filter(|app| seen.insert(app.name.as_str()))
        .map(|app| app.name.clone())
        .collect()
}
