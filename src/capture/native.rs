//! Native camera platform backed by nokhwa.
//!
//! Enumeration and capture go through the nokhwa crate. Frames are delivered
//! to an optional sink callback; rendering them is the host UI's business.

use crate::capture::device::{AuthorizationStatus, CameraInfo, DevicePosition};
use crate::capture::platform::{CameraPlatform, CaptureSession, SessionPreset};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Get the list of available cameras.
pub fn enumerate_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let unique_id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                let name = info.human_name().to_string();
                let position = position_from_name(&name);
                CameraInfo {
                    unique_id,
                    name,
                    position,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Best-effort placement guess; the native backends do not report position.
fn position_from_name(name: &str) -> DevicePosition {
    let lower = name.to_ascii_lowercase();
    if lower.contains("facetime") || lower.contains("front") || lower.contains("integrated") {
        DevicePosition::Front
    } else if lower.contains("back") || lower.contains("rear") {
        DevicePosition::Back
    } else if lower.contains("usb") {
        DevicePosition::External
    } else {
        DevicePosition::Unspecified
    }
}

fn camera_index_for(unique_id: &str) -> CameraIndex {
    // Numeric IDs are backend indices, anything else is an opaque device path
    if let Ok(idx) = unique_id.parse::<u32>() {
        CameraIndex::Index(idx)
    } else {
        CameraIndex::String(unique_id.to_string())
    }
}

fn requested_format_for(preset: SessionPreset) -> RequestedFormatType {
    match preset {
        SessionPreset::High => RequestedFormatType::AbsoluteHighestResolution,
        SessionPreset::Medium => RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(1280, 720),
            FrameFormat::MJPEG,
            30,
        )),
        SessionPreset::Low => RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(640, 480),
            FrameFormat::MJPEG,
            30,
        )),
    }
}

/// Native camera capability.
///
/// On macOS, consent goes through AVFoundation via nokhwa. Other desktop
/// platforms gate camera access at device-open time, so they report
/// `Authorized` and the prompt resolves immediately.
pub struct NativeCameraPlatform {
    /// Outcome of an issued consent prompt; nokhwa only exposes a granted
    /// bit, so a denial has to be remembered here to keep status monotonic.
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    resolved: Mutex<Option<AuthorizationStatus>>,
}

impl NativeCameraPlatform {
    pub fn new() -> Self {
        Self {
            resolved: Mutex::new(None),
        }
    }
}

impl Default for NativeCameraPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraPlatform for NativeCameraPlatform {
    fn enumerate_devices(&self) -> Vec<CameraInfo> {
        enumerate_cameras()
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        #[cfg(target_os = "macos")]
        {
            if nokhwa::nokhwa_check() {
                AuthorizationStatus::Authorized
            } else {
                self.resolved
                    .lock()
                    .unwrap_or(AuthorizationStatus::NotDetermined)
            }
        }

        #[cfg(not(target_os = "macos"))]
        {
            AuthorizationStatus::Authorized
        }
    }

    async fn request_access(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            let (tx, rx) = tokio::sync::oneshot::channel();
            let tx = Mutex::new(Some(tx));
            nokhwa::nokhwa_initialize(move |granted| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(granted);
                }
            });
            let granted = rx.await.unwrap_or(false);
            *self.resolved.lock() = Some(if granted {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            });
            granted
        }

        #[cfg(not(target_os = "macos"))]
        {
            true
        }
    }

    fn create_session(&self) -> Arc<dyn CaptureSession> {
        Arc::new(NativeCaptureSession::new())
    }
}

/// Callback receiving raw frame bytes from the capture thread.
pub type FrameSink = Box<dyn Fn(&[u8]) + Send + 'static>;

struct SessionConfig {
    configuring: bool,
    pending_input: Option<CameraInfo>,
    active_input: Option<CameraInfo>,
    preset: SessionPreset,
}

/// Capture session driving a nokhwa camera on a dedicated thread.
///
/// The camera is opened inside the worker thread (nokhwa cameras are not
/// `Send`); `start` blocks until the stream is up, mirroring the blocking
/// start call of the platform capture graph.
pub struct NativeCaptureSession {
    state: Mutex<SessionConfig>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    frame_sink: Arc<Mutex<Option<FrameSink>>>,
}

impl NativeCaptureSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionConfig {
                configuring: false,
                pending_input: None,
                active_input: None,
                preset: SessionPreset::High,
            }),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            frame_sink: Arc::new(Mutex::new(None)),
        }
    }

    /// Install a sink for captured frames; `None` drops frames on the floor.
    pub fn set_frame_sink(&self, sink: Option<FrameSink>) {
        *self.frame_sink.lock() = sink;
    }

    fn stop_worker(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for NativeCaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession for NativeCaptureSession {
    fn begin_configuration(&self) {
        let mut cfg = self.state.lock();
        if cfg.configuring {
            tracing::warn!("begin_configuration called inside an open transaction");
            return;
        }
        cfg.configuring = true;
        cfg.pending_input = cfg.active_input.clone();
    }

    fn remove_input(&self) {
        let mut cfg = self.state.lock();
        if !cfg.configuring {
            tracing::warn!("remove_input outside a configuration transaction");
            return;
        }
        cfg.pending_input = None;
    }

    fn can_set_preset(&self, _preset: SessionPreset) -> bool {
        // Every preset maps to a requested capture format
        true
    }

    fn set_preset(&self, preset: SessionPreset) {
        let mut cfg = self.state.lock();
        if !cfg.configuring {
            tracing::warn!("set_preset outside a configuration transaction");
            return;
        }
        cfg.preset = preset;
    }

    fn add_input(&self, device: &CameraInfo) -> bool {
        if !self.state.lock().configuring {
            tracing::warn!("add_input outside a configuration transaction");
            return false;
        }
        // Validate with the lock released; a device query can block. The
        // manager is the session's only configurator, so the transaction
        // cannot change underneath us.
        let known = device.unique_id.parse::<u32>().is_ok()
            || enumerate_cameras()
                .iter()
                .any(|d| d.unique_id == device.unique_id);
        if !known {
            tracing::warn!(device = %device.name, "device not attachable to session");
            return false;
        }
        self.state.lock().pending_input = Some(device.clone());
        true
    }

    fn commit_configuration(&self) {
        let changed = {
            let mut cfg = self.state.lock();
            if !cfg.configuring {
                tracing::warn!("commit_configuration without a transaction");
                return;
            }
            cfg.configuring = false;
            let changed = cfg.pending_input != cfg.active_input;
            cfg.active_input = cfg.pending_input.clone();
            changed
        };
        // A live session must be restarted to pick up a new input
        if changed {
            self.stop_worker();
        }
    }

    fn start(&self) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }
        let (device, preset) = {
            let cfg = self.state.lock();
            match cfg.active_input.clone() {
                Some(d) => (d, cfg.preset),
                None => {
                    tracing::debug!("session start with no active input, nothing to do");
                    return;
                }
            }
        };

        let index = camera_index_for(&device.unique_id);
        let format_type = requested_format_for(preset);
        let running = self.running.clone();
        let sink = self.frame_sink.clone();
        running.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let requested = RequestedFormat::new::<RgbAFormat>(format_type);
            let mut camera = match Camera::new(index.clone(), requested) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to open camera {:?}: {:?}", index, e);
                    running.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(false);
                    return;
                }
            };
            if let Err(e) = camera.open_stream() {
                tracing::error!("Failed to open camera stream: {:?}", e);
                running.store(false, Ordering::SeqCst);
                let _ = ready_tx.send(false);
                return;
            }

            let format = camera.camera_format();
            tracing::info!(
                "Camera stream opened: {}x{} @ {}fps, format={:?}",
                format.resolution().width(),
                format.resolution().height(),
                format.frame_rate(),
                format.format(),
            );
            let _ = ready_tx.send(true);

            while running.load(Ordering::SeqCst) {
                // frame() blocks until the camera delivers, no pacing needed
                match camera.frame() {
                    Ok(frame) => {
                        if let Some(sink) = sink.lock().as_ref() {
                            sink(frame.buffer());
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Failed to capture frame: {:?}", e);
                    }
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
        });

        // Block until the capture graph is up or has failed
        let started = ready_rx.recv().unwrap_or(false);
        if started {
            *self.worker.lock() = Some(handle);
            tracing::info!(device = %device.name, "capture session started");
        } else {
            let _ = handle.join();
        }
    }

    fn stop(&self) {
        self.stop_worker();
        tracing::info!("capture session stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for NativeCaptureSession {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
