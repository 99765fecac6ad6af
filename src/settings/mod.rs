//! Settings module
//!
//! Persisted, observable preference values:
//! - SettingsStore trait with in-memory and file-backed implementations
//! - SettingsWriter background queue (ordering + dedup)
//! - Persisted<T> reactive cell
//! - CameraSettings configuration object

pub mod camera;
pub mod cell;
pub mod store;
pub mod writer;

pub use camera::{CameraSettings, CAMERA_DEVICE_ID_KEY, CAMERA_ENABLED_KEY};
pub use cell::{Persisted, SubscriptionId};
pub use store::{JsonFileStore, MemoryStore, SettingsStore, StoreError, StoreResult};
pub use writer::SettingsWriter;
