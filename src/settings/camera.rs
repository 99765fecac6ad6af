//! Camera preferences for the recording-setup panel.

use crate::settings::cell::Persisted;
use crate::settings::store::SettingsStore;
use crate::settings::writer::SettingsWriter;
use std::sync::Arc;

/// Store key for the selected camera's unique identifier.
pub const CAMERA_DEVICE_ID_KEY: &str = "cameraDeviceId";

/// Store key for the camera-recording-enabled flag.
pub const CAMERA_ENABLED_KEY: &str = "cameraEnabled";

/// The two persisted camera preferences, sharing one background writer.
#[derive(Clone)]
pub struct CameraSettings {
    /// Unique ID of the selected capture device, if the user picked one.
    pub device_id: Persisted<Option<String>>,

    /// Whether camera recording is enabled.
    pub enabled: Persisted<bool>,

    writer: Arc<SettingsWriter>,
}

impl CameraSettings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let writer = Arc::new(SettingsWriter::new(store.clone()));
        let device_id = Persisted::new(
            CAMERA_DEVICE_ID_KEY,
            None,
            store.as_ref(),
            writer.clone(),
        );
        let enabled = Persisted::new(CAMERA_ENABLED_KEY, false, store.as_ref(), writer.clone());
        Self {
            device_id,
            enabled,
            writer,
        }
    }

    /// Block until all pending preference writes have been persisted.
    pub fn flush(&self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::store::JsonFileStore;
    use crate::settings::testing::CountingStore;
    use tempfile::tempdir;

    #[test]
    fn fresh_store_yields_defaults() {
        let settings = CameraSettings::new(Arc::new(CountingStore::new()));
        assert_eq!(settings.device_id.get(), None);
        assert!(!settings.enabled.get());
    }

    #[test]
    fn preferences_survive_a_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs");

        {
            let store = Arc::new(JsonFileStore::new(&path).unwrap());
            let settings = CameraSettings::new(store);
            settings.device_id.set(Some("cam-7".to_string()));
            settings.enabled.set(true);
            settings.flush();
        }

        let store = Arc::new(JsonFileStore::new(&path).unwrap());
        let settings = CameraSettings::new(store);
        assert_eq!(settings.device_id.get(), Some("cam-7".to_string()));
        assert!(settings.enabled.get());
    }

    #[test]
    fn corrupted_preference_does_not_block_startup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs");
        let store = Arc::new(JsonFileStore::new(&path).unwrap());
        store.write(CAMERA_ENABLED_KEY, Some(b"{]garbage")).unwrap();

        let settings = CameraSettings::new(store);
        assert!(!settings.enabled.get());
    }
}
