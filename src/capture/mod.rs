//! Capture module
//!
//! Device discovery, camera authorization, and the capture-session lifecycle:
//! - Platform-agnostic traits for the host camera capability
//! - A nokhwa-backed native implementation
//! - The session manager driving the recording-setup panel

pub mod device;
pub mod manager;
pub mod native;
pub mod platform;

pub use device::{AuthorizationStatus, CameraInfo, DevicePosition};
pub use manager::{CameraEvent, DeviceSessionManager};
pub use native::{enumerate_cameras, NativeCameraPlatform, NativeCaptureSession};
pub use platform::{CameraPlatform, CaptureSession, SessionPreset};
