//! Capture device descriptions and authorization state.

use serde::{Deserialize, Serialize};

/// Physical placement of a camera, as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePosition {
    /// User-facing camera (e.g. a laptop's built-in camera)
    Front,
    /// World-facing camera
    Back,
    /// External device such as a USB webcam
    External,
    /// Placement unknown
    Unspecified,
}

/// Information about a camera/webcam.
///
/// Devices are enumerated from the host platform and are not owned by the
/// application; `unique_id` is stable across launches and is what gets
/// persisted when the user picks a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub unique_id: String,

    /// Human-readable device name
    pub name: String,

    /// Physical placement
    pub position: DevicePosition,
}

/// Platform consent state for camera access.
///
/// Transitions only through an explicit user consent request and is monotonic
/// within a session: there is no in-app path back to `NotDetermined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    /// The user has not yet been asked
    NotDetermined,
    /// Access granted
    Authorized,
    /// Access denied by the user
    Denied,
    /// Access denied by system policy (parental controls, MDM)
    Restricted,
}

impl AuthorizationStatus {
    /// Whether a consent prompt would still be shown for this status.
    pub fn is_determined(self) -> bool {
        !matches!(self, AuthorizationStatus::NotDetermined)
    }
}
