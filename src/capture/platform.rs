//! Platform capability traits.
//!
//! The camera platform is treated as an opaque capability the manager depends
//! on but does not implement: device enumeration, authorization query/request,
//! and a session with an explicit begin/commit configuration transaction.
//! Tests substitute fakes for both traits.

use crate::capture::device::{AuthorizationStatus, CameraInfo};
use async_trait::async_trait;
use std::sync::Arc;

/// Capture quality preset applied to a session when supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPreset {
    /// Highest resolution the device offers
    High,
    /// 720p-class capture
    Medium,
    /// 480p-class capture
    Low,
}

/// A configured, startable pipeline from a device input to a sink.
///
/// Configuration changes must be wrapped in `begin_configuration` /
/// `commit_configuration`; the session is exclusively owned by the manager,
/// which is the only caller issuing reconfiguration.
pub trait CaptureSession: Send + Sync {
    /// Open a configuration transaction.
    fn begin_configuration(&self);

    /// Remove the current input, if any. Only valid inside a transaction.
    fn remove_input(&self);

    /// Whether the session supports the given preset.
    fn can_set_preset(&self, preset: SessionPreset) -> bool;

    /// Apply a preset. Only valid inside a transaction.
    fn set_preset(&self, preset: SessionPreset);

    /// Attach the given device as the session input. Returns `false` when the
    /// device is incompatible with the session; the caller is expected to
    /// commit the reverted configuration rather than propagate an error.
    fn add_input(&self, device: &CameraInfo) -> bool;

    /// Commit the transaction, applying all changes atomically.
    fn commit_configuration(&self);

    /// Start the pipeline. May block while the capture graph spins up, so
    /// callers dispatch this to a blocking-capable context.
    fn start(&self);

    /// Stop the pipeline and release the device.
    fn stop(&self);

    /// Whether the pipeline is currently running.
    fn is_running(&self) -> bool;
}

/// Host camera capability: enumeration, authorization, session construction.
#[async_trait]
pub trait CameraPlatform: Send + Sync {
    /// Enumerate available camera devices. Never prompts for access.
    fn enumerate_devices(&self) -> Vec<CameraInfo>;

    /// Current consent state. Never prompts.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Show the one-time consent prompt and resolve with the user's answer.
    /// Callers must only invoke this while status is `NotDetermined`.
    async fn request_access(&self) -> bool;

    /// Create a capture session bound to this platform.
    fn create_session(&self) -> Arc<dyn CaptureSession>;
}
