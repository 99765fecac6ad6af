//! Device session management.
//!
//! Owns device discovery, the camera permission lifecycle, and exactly one
//! capture session bound to the selected device.

use crate::capture::device::{AuthorizationStatus, CameraInfo, DevicePosition};
use crate::capture::platform::{CameraPlatform, CaptureSession, SessionPreset};
use crate::settings::CameraSettings;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted as the setup panel state changes.
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// A device became the current selection
    DeviceSelected(CameraInfo),
    /// The consent state changed after a prompt
    AuthorizationChanged(AuthorizationStatus),
    /// The capture session is running
    SessionStarted,
    /// The capture session stopped
    SessionStopped,
}

/// Manages device selection, permissions, and the capture session lifecycle.
///
/// All observable state lives on the caller's (UI-owning) task; only the
/// blocking session start is pushed to a background context.
pub struct DeviceSessionManager {
    platform: Arc<dyn CameraPlatform>,
    session: Arc<dyn CaptureSession>,
    settings: CameraSettings,
    devices: Vec<CameraInfo>,
    selected: Option<CameraInfo>,
    event_tx: broadcast::Sender<CameraEvent>,
}

impl DeviceSessionManager {
    pub fn new(platform: Arc<dyn CameraPlatform>, settings: CameraSettings) -> Self {
        let (event_tx, _) = broadcast::channel(32);
        let session = platform.create_session();
        Self {
            platform,
            session,
            settings,
            devices: Vec::new(),
            selected: None,
            event_tx,
        }
    }

    /// Subscribe to setup events.
    pub fn events(&self) -> broadcast::Receiver<CameraEvent> {
        self.event_tx.subscribe()
    }

    /// Devices found by the last [`discover`](Self::discover) call.
    pub fn devices(&self) -> &[CameraInfo] {
        &self.devices
    }

    /// The currently selected device, if any.
    pub fn selected(&self) -> Option<&CameraInfo> {
        self.selected.as_ref()
    }

    /// The settings object backing this manager.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Enumerate capture devices and restore or pick a selection.
    ///
    /// Restores the persisted device if it is still present, else prefers a
    /// front-facing device, else the first enumerated one. Does not touch
    /// authorization and does not persist the resulting selection.
    pub fn discover(&mut self) -> Option<&CameraInfo> {
        self.devices = self.platform.enumerate_devices();
        tracing::debug!("Discovered {} capture device(s)", self.devices.len());

        let stored = self.settings.device_id.get();
        let pick = stored
            .and_then(|id| self.devices.iter().find(|d| d.unique_id == id))
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.position == DevicePosition::Front)
            })
            .or_else(|| self.devices.first())
            .cloned();

        if let Some(device) = &pick {
            let _ = self.event_tx.send(CameraEvent::DeviceSelected(device.clone()));
        }
        self.selected = pick;
        self.selected.as_ref()
    }

    /// Read the current consent state; when already authorized, configure and
    /// start the session immediately without prompting.
    pub fn check_permission(&self) -> AuthorizationStatus {
        let status = self.platform.authorization_status();
        if status == AuthorizationStatus::Authorized {
            self.configure_and_start();
        }
        status
    }

    /// Issue the one-time consent prompt if the user has not been asked yet.
    ///
    /// No-op when the status is already determined, which keeps a double
    /// invocation from showing duplicate prompts. On grant, configures and
    /// starts the session for the current selection.
    pub async fn request_permission(&self) -> AuthorizationStatus {
        let status = self.platform.authorization_status();
        if status.is_determined() {
            tracing::debug!(?status, "permission already determined, not prompting");
            return status;
        }

        let granted = self.platform.request_access().await;
        let status = self.platform.authorization_status();
        let _ = self
            .event_tx
            .send(CameraEvent::AuthorizationChanged(status));
        if granted {
            self.configure_and_start();
        } else {
            tracing::info!("camera access declined");
        }
        status
    }

    /// Make `device` the current selection and persist its identifier.
    ///
    /// The live session is reconfigured only when access is already granted;
    /// otherwise the selection takes effect on the next successful
    /// authorization.
    pub fn switch_device(&mut self, device: CameraInfo) {
        self.settings.device_id.set(Some(device.unique_id.clone()));
        let _ = self.event_tx.send(CameraEvent::DeviceSelected(device.clone()));
        self.selected = Some(device);

        if self.platform.authorization_status() == AuthorizationStatus::Authorized {
            self.configure_and_start();
        }
    }

    /// Stop the running session, if any.
    pub fn stop(&self) {
        if self.session.is_running() {
            self.session.stop();
            let _ = self.event_tx.send(CameraEvent::SessionStopped);
        }
    }

    fn configure_and_start(&self) {
        let Some(device) = self.selected.clone() else {
            tracing::debug!("no device selected, session left unconfigured");
            return;
        };
        if self.configure_session(&device) && !self.session.is_running() {
            self.spawn_session_start();
        }
    }

    /// Rebind the session input inside a configuration transaction.
    ///
    /// An incompatible input aborts by committing the reverted (empty)
    /// configuration; the caller sees "no active input", never an error.
    /// Returns whether the input was attached.
    fn configure_session(&self, device: &CameraInfo) -> bool {
        let session = &self.session;
        session.begin_configuration();
        session.remove_input();
        if session.can_set_preset(SessionPreset::High) {
            session.set_preset(SessionPreset::High);
        }
        if !session.add_input(device) {
            tracing::warn!(device = %device.name, "input incompatible with session");
            session.commit_configuration();
            return false;
        }
        session.commit_configuration();
        true
    }

    /// Session start can block while the capture graph spins up, so it runs
    /// on a blocking-capable background context and is not awaited here.
    ///
    /// `check_permission` and `switch_device` are plain sync entry points and
    /// may be called outside a tokio runtime; fall back to a thread there.
    fn spawn_session_start(&self) {
        let session = Arc::clone(&self.session);
        let event_tx = self.event_tx.clone();
        let start = move || {
            session.start();
            if session.is_running() {
                let _ = event_tx.send(CameraEvent::SessionStarted);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(start);
            }
            Err(_) => {
                std::thread::spawn(start);
            }
        }
    }
}

impl Drop for DeviceSessionManager {
    fn drop(&mut self) {
        // Teardown stops the session; in-flight settings writes are left to
        // the settings writer.
        self.stop();
    }
}
